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

//! Convolution reverb against the synthetic stereo impulse. Wet and dry
//! paths are summed as out = dry * (1 - wet) + convolved * wet; the voice
//! is extended by the impulse tail.

use rand::rngs::SmallRng;

use super::chain::Effect;
use super::convolver::fft_convolve;
use super::impulse::generate_impulse;
use crate::config::ReverbParams;
use crate::model::RawBuffer;

pub(super) struct ReverbStage {
    wet: f32,
    impulse: RawBuffer,
}

impl ReverbStage {
    /// The impulse is generated at construction, so the chain hands a
    /// fully wired stage to the render: the random draw happens once per
    /// voice, never on the render path.
    pub(super) fn new(params: ReverbParams, sample_rate: u32, mut rng: SmallRng) -> Self {
        Self {
            wet: params.wet(),
            impulse: generate_impulse(params.decay_secs(), sample_rate, &mut rng),
        }
    }

    #[cfg(test)]
    pub(super) fn with_impulse(wet: f32, impulse: RawBuffer) -> Self {
        Self {
            wet: wet.clamp(0.0, 1.0),
            impulse,
        }
    }
}

impl Effect for ReverbStage {
    fn name(&self) -> &'static str {
        "reverb"
    }

    fn process(&mut self, buffer: RawBuffer) -> RawBuffer {
        let in_frames = buffer.frames();
        let ir_frames = self.impulse.frames();
        let out_frames = in_frames + ir_frames - 1;
        let sample_rate = buffer.sample_rate();

        let channels = buffer
            .channels()
            .iter()
            .enumerate()
            .map(|(ch, input)| {
                // Mono input spreads across both impulse channels when the
                // pan stage widens it; stereo input keeps one per side.
                let ir_channel = &self.impulse.channels()[ch.min(1)];
                let convolved = fft_convolve(input, ir_channel);

                (0..out_frames)
                    .map(|n| {
                        let dry = input.get(n).copied().unwrap_or(0.0);
                        let wet = convolved.get(n).copied().unwrap_or(0.0);
                        dry * (1.0 - self.wet) + wet * self.wet
                    })
                    .collect()
            })
            .collect();

        RawBuffer::new(channels, sample_rate)
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;

    use super::*;
    use crate::testutil;

    #[test]
    fn test_wet_zero_is_the_dry_path() {
        let input = testutil::sine_buffer(440.0, 0.05, 44100, 1);
        let impulse = {
            let mut rng = SmallRng::seed_from_u64(11);
            generate_impulse(0.2, 44100, &mut rng)
        };
        let mut reverb = ReverbStage::with_impulse(0.0, impulse);
        let output = reverb.process(input.clone());

        // The dry prefix is exact; the extension is silence.
        for (a, b) in input.channels()[0].iter().zip(&output.channels()[0]) {
            assert_eq!(a, b);
        }
        for sample in &output.channels()[0][input.frames()..] {
            assert_eq!(*sample, 0.0);
        }
    }

    #[test]
    fn test_wet_one_is_the_convolved_path() {
        let signal = vec![1.0f32, -0.5, 0.25];
        let input = RawBuffer::new(vec![signal.clone()], 44100);
        let ir = vec![0.5f32, 0.25];
        let impulse = RawBuffer::new(vec![ir.clone(), ir.clone()], 44100);

        let mut reverb = ReverbStage::with_impulse(1.0, impulse);
        let output = reverb.process(input);

        let expected = [0.5, 0.0, 0.0, 0.0625];
        assert_eq!(output.frames(), 4);
        for (a, b) in output.channels()[0].iter().zip(&expected) {
            assert!((a - b).abs() < 1e-5, "{a} vs {b}");
        }
    }

    #[test]
    fn test_output_extends_by_impulse_tail() {
        let input = testutil::sine_buffer(440.0, 0.01, 44100, 2);
        let impulse = {
            let mut rng = SmallRng::seed_from_u64(12);
            generate_impulse(0.1, 44100, &mut rng)
        };
        let ir_frames = impulse.frames();

        let mut reverb = ReverbStage::with_impulse(0.5, impulse);
        let output = reverb.process(input.clone());
        assert_eq!(output.frames(), input.frames() + ir_frames - 1);
    }
}
