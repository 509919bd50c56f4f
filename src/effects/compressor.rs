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

//! Dynamics compression: an envelope follower per channel driving a
//! hard-knee gain computer. No knee or makeup gain is exposed.

use super::chain::Effect;
use crate::config::CompressorParams;
use crate::model::RawBuffer;

/// Floor for the envelope so the dB conversion stays finite.
const ENVELOPE_FLOOR: f32 = 1e-6;

pub(super) struct CompressorStage {
    threshold_db: f32,
    ratio: f32,
    attack_coeff: f32,
    release_coeff: f32,
}

impl CompressorStage {
    pub(super) fn new(params: CompressorParams, sample_rate: u32) -> Self {
        Self {
            threshold_db: params.threshold_db(),
            ratio: params.ratio(),
            attack_coeff: smoothing_coeff(params.attack_secs(), sample_rate),
            release_coeff: smoothing_coeff(params.release_secs(), sample_rate),
        }
    }

    /// Gain for the current envelope level: above threshold, the overage
    /// is divided by the ratio.
    fn gain_for(&self, envelope: f32) -> f32 {
        let envelope_db = 20.0 * envelope.max(ENVELOPE_FLOOR).log10();
        let over_db = envelope_db - self.threshold_db;
        if over_db <= 0.0 {
            return 1.0;
        }
        let reduction_db = over_db * (1.0 / self.ratio - 1.0);
        10.0f32.powf(reduction_db / 20.0)
    }
}

impl Effect for CompressorStage {
    fn name(&self) -> &'static str {
        "compressor"
    }

    fn process(&mut self, mut buffer: RawBuffer) -> RawBuffer {
        for channel in buffer.channels_mut() {
            let mut envelope = 0.0f32;
            for sample in channel.iter_mut() {
                let level = sample.abs();
                let coeff = if level > envelope {
                    self.attack_coeff
                } else {
                    self.release_coeff
                };
                envelope = coeff * (envelope - level) + level;
                *sample *= self.gain_for(envelope);
            }
        }
        buffer
    }
}

/// One-pole smoothing coefficient for a time constant in seconds.
fn smoothing_coeff(secs: f32, sample_rate: u32) -> f32 {
    if secs <= 0.0 {
        return 0.0;
    }
    (-1.0 / (secs * sample_rate as f32)).exp()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CompressorParams;

    fn stage(threshold_db: f32, ratio: f32) -> CompressorStage {
        // Instant attack/release keeps the envelope equal to |x|, which
        // makes the gain curve directly observable.
        CompressorStage::new(CompressorParams::new(threshold_db, ratio, 0.0, 0.0), 44100)
    }

    #[test]
    fn test_below_threshold_is_untouched() {
        let mut comp = stage(-6.0, 4.0);
        let input = RawBuffer::new(vec![vec![0.1, -0.2, 0.3]], 44100);
        let output = comp.process(input.clone());
        for (a, b) in input.channels()[0].iter().zip(&output.channels()[0]) {
            assert!((a - b).abs() < 1e-6);
        }
    }

    #[test]
    fn test_above_threshold_is_reduced() {
        let mut comp = stage(-20.0, 4.0);
        let output = comp.process(RawBuffer::new(vec![vec![1.0]], 44100));

        // 0 dBFS input, -20 dB threshold, 4:1 => 20 dB overage becomes
        // 5 dB, i.e. 15 dB of reduction.
        let expected = 10.0f32.powf(-15.0 / 20.0);
        assert!((output.channels()[0][0] - expected).abs() < 1e-4);
    }

    #[test]
    fn test_higher_ratio_reduces_more() {
        let gentle = stage(-20.0, 2.0).process(RawBuffer::new(vec![vec![1.0]], 44100));
        let hard = stage(-20.0, 20.0).process(RawBuffer::new(vec![vec![1.0]], 44100));
        assert!(hard.channels()[0][0] < gentle.channels()[0][0]);
    }

    #[test]
    fn test_release_lets_gain_recover() {
        let mut comp =
            CompressorStage::new(CompressorParams::new(-20.0, 10.0, 0.0, 0.005), 44100);
        // A loud hit followed by silence then a quiet sample: the quiet
        // sample should be close to untouched once the envelope decays.
        let mut samples = vec![1.0f32];
        samples.extend(std::iter::repeat(0.0).take(4410));
        samples.push(0.05);
        let output = comp.process(RawBuffer::new(vec![samples], 44100));

        let last = *output.channels()[0].last().unwrap();
        assert!((last - 0.05).abs() < 0.005, "expected recovery, got {last}");
    }
}
