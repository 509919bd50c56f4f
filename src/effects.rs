// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//

//! The per-voice effects chain.
//!
//! Every triggered voice runs through the same fixed chain:
//! compression -> 3-band EQ -> delay -> convolution reverb -> pan -> volume.
//! A disabled stage is elided from the chain entirely (the previous stage
//! feeds the next enabled one), so bypassed stages add zero latency and
//! zero numerical error. The chain is fully constructed before playback
//! starts and is consumed by the render, so no stage parameter can change
//! once a voice is running.

mod chain;
mod compressor;
mod convolver;
mod delay;
mod eq;
mod impulse;
mod reverb;

pub use chain::EffectsChain;
pub use impulse::generate_impulse;

use crate::config::EffectSettings;
use crate::model::RawBuffer;

/// Builds the chain for the given settings and renders the buffer through
/// it, producing the stereo voice handed to the mixer.
pub fn build_voice(buffer: &RawBuffer, settings: &EffectSettings) -> RawBuffer {
    EffectsChain::build(settings, buffer.sample_rate()).render(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DelayParams, EqParams, ReverbParams, Stage};
    use crate::testutil;

    #[test]
    fn test_all_stages_disabled_is_identity_for_stereo() {
        let input = testutil::sine_buffer(440.0, 0.05, 44100, 2);
        let settings = EffectSettings::default();

        let output = build_voice(&input, &settings);

        assert_eq!(output.channel_count(), 2);
        assert_eq!(output.frames(), input.frames());
        for ch in 0..2 {
            for (a, b) in input.channels()[ch].iter().zip(&output.channels()[ch]) {
                assert!((a - b).abs() < 1e-6, "expected identity, {a} vs {b}");
            }
        }
    }

    #[test]
    fn test_chain_order_is_fixed_and_elides_disabled() {
        let mut settings = EffectSettings::default();
        settings.set_eq(Stage::Enabled(EqParams::new(3.0, 0.0, -3.0)));
        settings.set_reverb(Stage::Enabled(ReverbParams::new(0.5, 0.3)));

        let chain = EffectsChain::build(&settings, 44100);
        // Compressor and delay are absent, not unity stages.
        assert_eq!(chain.stage_names(), vec!["eq", "reverb", "pan", "volume"]);

        settings.set_delay(Stage::Enabled(DelayParams::new(0.1, 0.3, 0.5)));
        let chain = EffectsChain::build(&settings, 44100);
        assert_eq!(
            chain.stage_names(),
            vec!["eq", "delay", "reverb", "pan", "volume"]
        );
    }

    #[test]
    fn test_zero_length_buffer_passes_through() {
        let input = RawBuffer::empty(1, 44100);
        let mut settings = EffectSettings::default();
        settings.set_reverb(Stage::Enabled(ReverbParams::new(2.0, 1.0)));

        let output = build_voice(&input, &settings);
        assert!(output.is_empty());
    }

    #[test]
    fn test_eq_low_boost_high_cut_shapes_sines() {
        // +6 dB low shelf, -6 dB high shelf (property from the chain contract).
        let mut settings = EffectSettings::default();
        settings.set_eq(Stage::Enabled(EqParams::new(6.0, 0.0, -6.0)));

        let low = testutil::sine_buffer(100.0, 0.5, 44100, 2);
        let boosted = build_voice(&low, &settings);
        assert!(
            testutil::steady_rms(&boosted, 0) > testutil::steady_rms(&low, 0) * 1.2,
            "100 Hz should gain amplitude from the low-shelf boost"
        );

        let high = testutil::sine_buffer(5000.0, 0.5, 44100, 2);
        let cut = build_voice(&high, &settings);
        assert!(
            testutil::steady_rms(&cut, 0) < testutil::steady_rms(&high, 0) * 0.8,
            "5 kHz should lose amplitude from the high-shelf cut"
        );
    }

    #[test]
    fn test_volume_and_pan_apply_last() {
        let input = testutil::sine_buffer(440.0, 0.05, 44100, 2);
        let mut settings = EffectSettings::default();
        settings.set_volume(0.5);

        let output = build_voice(&input, &settings);
        for (a, b) in input.channels()[0].iter().zip(&output.channels()[0]) {
            assert!((a * 0.5 - b).abs() < 1e-6);
        }

        // Hard left: the right channel goes silent for stereo input.
        settings.set_volume(1.0);
        settings.set_pan(-1.0);
        let output = build_voice(&input, &settings);
        assert!(testutil::steady_rms(&output, 1) < 1e-6);
        assert!(testutil::steady_rms(&output, 0) > 0.1);
    }
}
