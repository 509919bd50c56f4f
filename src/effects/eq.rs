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

//! Three-band EQ: low shelf, peaking band, high shelf, cascaded in that
//! order. RBJ cookbook biquads.

use std::f32::consts::PI;

use super::chain::Effect;
use crate::config::EqParams;
use crate::model::RawBuffer;

/// Fixed corner frequency of the low shelf.
pub const LOW_SHELF_HZ: f32 = 320.0;
/// Fixed center frequency of the peaking band.
pub const PEAK_HZ: f32 = 1000.0;
/// Fixed corner frequency of the high shelf.
pub const HIGH_SHELF_HZ: f32 = 3200.0;
/// Q of the peaking band.
pub const PEAK_Q: f32 = 0.5;

/// Transposed direct form II biquad.
#[derive(Clone, Copy)]
struct Biquad {
    b0: f32,
    b1: f32,
    b2: f32,
    a1: f32,
    a2: f32,
    z1: f32,
    z2: f32,
}

impl Biquad {
    fn identity() -> Self {
        Self {
            b0: 1.0,
            b1: 0.0,
            b2: 0.0,
            a1: 0.0,
            a2: 0.0,
            z1: 0.0,
            z2: 0.0,
        }
    }

    fn from_coeffs(b0: f32, b1: f32, b2: f32, a0: f32, a1: f32, a2: f32) -> Self {
        Self {
            b0: b0 / a0,
            b1: b1 / a0,
            b2: b2 / a0,
            a1: a1 / a0,
            a2: a2 / a0,
            z1: 0.0,
            z2: 0.0,
        }
    }

    fn low_shelf(sample_rate: f32, freq: f32, gain_db: f32) -> Self {
        if gain_db.abs() < 1e-3 {
            return Self::identity();
        }
        let a = 10.0f32.powf(gain_db / 40.0);
        let w0 = 2.0 * PI * (freq / sample_rate).clamp(0.0, 0.49);
        let (sin, cos) = w0.sin_cos();
        // Shelf slope S = 1.
        let alpha = sin / 2.0 * (2.0f32).sqrt();
        let two_sqrt_a_alpha = 2.0 * a.sqrt() * alpha;

        Self::from_coeffs(
            a * ((a + 1.0) - (a - 1.0) * cos + two_sqrt_a_alpha),
            2.0 * a * ((a - 1.0) - (a + 1.0) * cos),
            a * ((a + 1.0) - (a - 1.0) * cos - two_sqrt_a_alpha),
            (a + 1.0) + (a - 1.0) * cos + two_sqrt_a_alpha,
            -2.0 * ((a - 1.0) + (a + 1.0) * cos),
            (a + 1.0) + (a - 1.0) * cos - two_sqrt_a_alpha,
        )
    }

    fn peaking(sample_rate: f32, freq: f32, q: f32, gain_db: f32) -> Self {
        if gain_db.abs() < 1e-3 {
            return Self::identity();
        }
        let a = 10.0f32.powf(gain_db / 40.0);
        let w0 = 2.0 * PI * (freq / sample_rate).clamp(0.0, 0.49);
        let (sin, cos) = w0.sin_cos();
        let alpha = sin / (2.0 * q.max(0.1));

        Self::from_coeffs(
            1.0 + alpha * a,
            -2.0 * cos,
            1.0 - alpha * a,
            1.0 + alpha / a,
            -2.0 * cos,
            1.0 - alpha / a,
        )
    }

    fn high_shelf(sample_rate: f32, freq: f32, gain_db: f32) -> Self {
        if gain_db.abs() < 1e-3 {
            return Self::identity();
        }
        let a = 10.0f32.powf(gain_db / 40.0);
        let w0 = 2.0 * PI * (freq / sample_rate).clamp(0.0, 0.49);
        let (sin, cos) = w0.sin_cos();
        let alpha = sin / 2.0 * (2.0f32).sqrt();
        let two_sqrt_a_alpha = 2.0 * a.sqrt() * alpha;

        Self::from_coeffs(
            a * ((a + 1.0) + (a - 1.0) * cos + two_sqrt_a_alpha),
            -2.0 * a * ((a - 1.0) + (a + 1.0) * cos),
            a * ((a + 1.0) + (a - 1.0) * cos - two_sqrt_a_alpha),
            (a + 1.0) - (a - 1.0) * cos + two_sqrt_a_alpha,
            2.0 * ((a - 1.0) - (a + 1.0) * cos),
            (a + 1.0) - (a - 1.0) * cos - two_sqrt_a_alpha,
        )
    }

    fn process(&mut self, x: f32) -> f32 {
        let y = self.b0 * x + self.z1;
        self.z1 = self.b1 * x - self.a1 * y + self.z2;
        self.z2 = self.b2 * x - self.a2 * y;
        y
    }

    fn reset(&mut self) {
        self.z1 = 0.0;
        self.z2 = 0.0;
    }
}

pub(super) struct EqStage {
    low: Biquad,
    mid: Biquad,
    high: Biquad,
}

impl EqStage {
    pub(super) fn new(params: EqParams, sample_rate: u32) -> Self {
        let sample_rate = sample_rate as f32;
        Self {
            low: Biquad::low_shelf(sample_rate, LOW_SHELF_HZ, params.low_db()),
            mid: Biquad::peaking(sample_rate, PEAK_HZ, PEAK_Q, params.mid_db()),
            high: Biquad::high_shelf(sample_rate, HIGH_SHELF_HZ, params.high_db()),
        }
    }
}

impl Effect for EqStage {
    fn name(&self) -> &'static str {
        "eq"
    }

    fn process(&mut self, mut buffer: RawBuffer) -> RawBuffer {
        for channel in buffer.channels_mut() {
            // Filter state is per channel.
            self.low.reset();
            self.mid.reset();
            self.high.reset();
            for sample in channel.iter_mut() {
                let mut y = self.low.process(*sample);
                y = self.mid.process(y);
                y = self.high.process(y);
                *sample = y;
            }
        }
        buffer
    }
}
