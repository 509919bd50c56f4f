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

//! Shared test fixtures.

use std::f32::consts::TAU;

use crate::model::RawBuffer;

/// A full-scale sine at the given frequency, duplicated across channels.
pub fn sine_buffer(freq: f32, secs: f32, sample_rate: u32, channel_count: usize) -> RawBuffer {
    let frames = (secs * sample_rate as f32) as usize;
    let samples: Vec<f32> = (0..frames)
        .map(|i| (TAU * freq * i as f32 / sample_rate as f32).sin())
        .collect();
    RawBuffer::new(vec![samples; channel_count], sample_rate)
}

/// A linear ramp from 0 to 1, mono.
pub fn ramp_buffer(frames: usize, sample_rate: u32) -> RawBuffer {
    let samples: Vec<f32> = (0..frames)
        .map(|i| i as f32 / frames.max(1) as f32)
        .collect();
    RawBuffer::new(vec![samples], sample_rate)
}

/// RMS over the middle half of a channel, skipping filter transients and
/// effect tails at the edges.
pub fn steady_rms(buffer: &RawBuffer, channel: usize) -> f32 {
    let samples = &buffer.channels()[channel];
    let start = samples.len() / 4;
    let end = (samples.len() * 3 / 4).max(start + 1).min(samples.len());
    let window = &samples[start..end];
    let sum: f32 = window.iter().map(|s| s * s).sum();
    (sum / window.len() as f32).sqrt()
}
