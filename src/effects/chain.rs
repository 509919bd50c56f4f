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

//! Chain construction and the always-present pan/volume tail.

use std::f32::consts::FRAC_PI_2;

use rand::rngs::SmallRng;
use rand::SeedableRng;
use tracing::debug;

use super::compressor::CompressorStage;
use super::delay::DelayStage;
use super::eq::EqStage;
use super::reverb::ReverbStage;
use crate::config::EffectSettings;
use crate::model::RawBuffer;

/// One unit in the chain. Stages take ownership of the buffer and may
/// change its length (delay/reverb tails) or channel count (pan).
pub(super) trait Effect: Send {
    fn name(&self) -> &'static str;
    fn process(&mut self, buffer: RawBuffer) -> RawBuffer;
}

/// A fully wired per-voice chain. Build it once, then consume it with
/// [`EffectsChain::render`]; there is no way to mutate a stage after the
/// hand-off, which is what keeps graph construction race-free against the
/// render path.
pub struct EffectsChain {
    stages: Vec<Box<dyn Effect>>,
}

impl EffectsChain {
    /// Constructs the chain for one voice. The stage order is fixed and
    /// significant: compression, EQ, delay, reverb, pan, volume. Disabled
    /// stages are not constructed.
    pub fn build(settings: &EffectSettings, sample_rate: u32) -> Self {
        let mut stages: Vec<Box<dyn Effect>> = Vec::with_capacity(6);

        if let Some(params) = settings.compressor().enabled() {
            stages.push(Box::new(CompressorStage::new(*params, sample_rate)));
        }
        if let Some(params) = settings.eq().enabled() {
            stages.push(Box::new(EqStage::new(*params, sample_rate)));
        }
        if let Some(params) = settings.delay().enabled() {
            stages.push(Box::new(DelayStage::new(*params, sample_rate)));
        }
        if let Some(params) = settings.reverb().enabled() {
            stages.push(Box::new(ReverbStage::new(
                *params,
                sample_rate,
                SmallRng::from_entropy(),
            )));
        }
        stages.push(Box::new(PanStage::new(settings.pan())));
        stages.push(Box::new(VolumeStage::new(settings.volume())));

        debug!(stages = stages.len(), sample_rate, "Effects chain built");
        Self { stages }
    }

    /// Renders a buffer through the chain, consuming it. A zero-length
    /// buffer short-circuits to a pass-through copy.
    pub fn render(mut self, input: &RawBuffer) -> RawBuffer {
        if input.is_empty() {
            return input.clone();
        }
        self.stages
            .iter_mut()
            .fold(input.clone(), |buffer, stage| stage.process(buffer))
    }

    /// The names of the wired stages, in processing order.
    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|s| s.name()).collect()
    }
}

/// Equal-power stereo placement, applied after all time/frequency
/// effects. Output is always two channels.
struct PanStage {
    pan: f32,
}

impl PanStage {
    fn new(pan: f32) -> Self {
        Self {
            pan: pan.clamp(-1.0, 1.0),
        }
    }
}

impl Effect for PanStage {
    fn name(&self) -> &'static str {
        "pan"
    }

    fn process(&mut self, buffer: RawBuffer) -> RawBuffer {
        let sample_rate = buffer.sample_rate();
        let channels = buffer.channels();

        if channels.len() == 1 {
            // Mono placement: x = (pan + 1) / 2.
            let x = (self.pan + 1.0) / 2.0;
            let (gain_l, gain_r) = ((x * FRAC_PI_2).cos(), (x * FRAC_PI_2).sin());
            let left: Vec<f32> = channels[0].iter().map(|s| s * gain_l).collect();
            let right: Vec<f32> = channels[0].iter().map(|s| s * gain_r).collect();
            return RawBuffer::new(vec![left, right], sample_rate);
        }

        // Stereo placement: center is exact pass-through; panning folds
        // one side into the other with equal power.
        let (l, r) = (&channels[0], &channels[1]);
        let frames = l.len();
        let mut left = Vec::with_capacity(frames);
        let mut right = Vec::with_capacity(frames);
        if self.pan <= 0.0 {
            let x = self.pan + 1.0;
            let (gain_l, gain_r) = ((x * FRAC_PI_2).cos(), (x * FRAC_PI_2).sin());
            for i in 0..frames {
                left.push(l[i] + r[i] * gain_l);
                right.push(r[i] * gain_r);
            }
        } else {
            let x = self.pan;
            let (gain_l, gain_r) = ((x * FRAC_PI_2).cos(), (x * FRAC_PI_2).sin());
            for i in 0..frames {
                left.push(l[i] * gain_l);
                right.push(r[i] + l[i] * gain_r);
            }
        }
        RawBuffer::new(vec![left, right], sample_rate)
    }
}

/// Final linear gain, last in the chain.
struct VolumeStage {
    volume: f32,
}

impl VolumeStage {
    fn new(volume: f32) -> Self {
        Self {
            volume: volume.clamp(0.0, 2.0),
        }
    }
}

impl Effect for VolumeStage {
    fn name(&self) -> &'static str {
        "volume"
    }

    fn process(&mut self, mut buffer: RawBuffer) -> RawBuffer {
        for channel in buffer.channels_mut() {
            for sample in channel.iter_mut() {
                *sample *= self.volume;
            }
        }
        buffer
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pan_center_is_identity_for_stereo() {
        let input = RawBuffer::new(vec![vec![0.5, -0.5], vec![0.25, -0.25]], 44100);
        let mut pan = PanStage::new(0.0);
        let output = pan.process(input.clone());
        assert_eq!(output, input);
    }

    #[test]
    fn test_pan_mono_center_is_equal_power() {
        let input = RawBuffer::new(vec![vec![1.0]], 44100);
        let mut pan = PanStage::new(0.0);
        let output = pan.process(input);

        let expected = (std::f32::consts::FRAC_PI_4).cos();
        assert!((output.channels()[0][0] - expected).abs() < 1e-6);
        assert!((output.channels()[1][0] - expected).abs() < 1e-6);
    }

    #[test]
    fn test_pan_hard_right_folds_left_channel() {
        let input = RawBuffer::new(vec![vec![1.0], vec![0.0]], 44100);
        let mut pan = PanStage::new(1.0);
        let output = pan.process(input);

        assert!(output.channels()[0][0].abs() < 1e-6);
        assert!((output.channels()[1][0] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_volume_scales_all_channels() {
        let input = RawBuffer::new(vec![vec![1.0, -1.0], vec![0.5, -0.5]], 44100);
        let mut volume = VolumeStage::new(2.0);
        let output = volume.process(input);

        assert_eq!(output.channels()[0], vec![2.0, -2.0]);
        assert_eq!(output.channels()[1], vec![1.0, -1.0]);
    }
}
