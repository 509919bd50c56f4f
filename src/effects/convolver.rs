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

//! FFT convolution for the reverb stage. The impulse runs to several
//! seconds, so direct convolution is not an option; one zero-padded
//! forward/inverse pass covers the whole voice on the offline path.

use realfft::RealFftPlanner;

/// Convolves `signal` with `ir`, returning `signal.len() + ir.len() - 1`
/// samples. Either input being empty yields an empty result.
pub(super) fn fft_convolve(signal: &[f32], ir: &[f32]) -> Vec<f32> {
    if signal.is_empty() || ir.is_empty() {
        return Vec::new();
    }

    let conv_len = signal.len() + ir.len() - 1;
    let fft_size = conv_len.next_power_of_two();

    let mut planner = RealFftPlanner::<f32>::new();
    let fft_fwd = planner.plan_fft_forward(fft_size);
    let fft_inv = planner.plan_fft_inverse(fft_size);

    let mut signal_buf = vec![0.0f32; fft_size];
    signal_buf[..signal.len()].copy_from_slice(signal);
    let mut ir_buf = vec![0.0f32; fft_size];
    ir_buf[..ir.len()].copy_from_slice(ir);

    let mut signal_spec = fft_fwd.make_output_vec();
    let mut ir_spec = fft_fwd.make_output_vec();
    let mut scratch = fft_fwd.make_scratch_vec();
    fft_fwd
        .process_with_scratch(&mut signal_buf, &mut signal_spec, &mut scratch)
        .expect("forward FFT on sized buffers");
    fft_fwd
        .process_with_scratch(&mut ir_buf, &mut ir_spec, &mut scratch)
        .expect("forward FFT on sized buffers");

    for (s, i) in signal_spec.iter_mut().zip(&ir_spec) {
        *s = *s * *i;
    }

    let mut result = fft_inv.make_output_vec();
    let mut inv_scratch = fft_inv.make_scratch_vec();
    fft_inv
        .process_with_scratch(&mut signal_spec, &mut result, &mut inv_scratch)
        .expect("inverse FFT on sized buffers");

    // The inverse transform is unnormalized.
    let norm = 1.0 / fft_size as f32;
    for sample in result.iter_mut() {
        *sample *= norm;
    }

    result.truncate(conv_len);
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn naive_convolve(signal: &[f32], ir: &[f32]) -> Vec<f32> {
        let mut out = vec![0.0f32; signal.len() + ir.len() - 1];
        for (i, s) in signal.iter().enumerate() {
            for (j, k) in ir.iter().enumerate() {
                out[i + j] += s * k;
            }
        }
        out
    }

    #[test]
    fn test_matches_naive_convolution() {
        let signal = vec![1.0, 0.5, -0.25, 0.75, 0.0, -1.0];
        let ir = vec![0.5, 0.25, 0.125];

        let fft = fft_convolve(&signal, &ir);
        let naive = naive_convolve(&signal, &ir);

        assert_eq!(fft.len(), naive.len());
        for (a, b) in fft.iter().zip(&naive) {
            assert!((a - b).abs() < 1e-5, "{a} vs {b}");
        }
    }

    #[test]
    fn test_unit_impulse_ir_is_identity() {
        let signal = vec![0.25, -0.5, 1.0, 0.0, 0.125];
        let out = fft_convolve(&signal, &[1.0]);
        assert_eq!(out.len(), signal.len());
        for (a, b) in out.iter().zip(&signal) {
            assert!((a - b).abs() < 1e-6);
        }
    }

    #[test]
    fn test_empty_inputs() {
        assert!(fft_convolve(&[], &[1.0]).is_empty());
        assert!(fft_convolve(&[1.0], &[]).is_empty());
    }
}
