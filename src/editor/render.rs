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

//! The offline render pass: trims, resamples at the coupled playback
//! rate, applies fades and volume, and produces the new canonical
//! buffer. Runs with no real-time deadline.

use tracing::debug;

use super::session::SessionSnapshot;
use crate::model::RawBuffer;

/// Errors from a render pass. On the debounced auto-save path these are
/// logged and swallowed; on explicit actions they surface to the caller.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("working buffer is empty")]
    EmptySource,

    #[error("trim region is empty after clamping")]
    EmptyRegion,
}

pub struct OfflineRenderer;

impl OfflineRenderer {
    /// Renders the session parameters over the working buffer.
    ///
    /// Output length is (end - start) / stretch frames. Reading advances
    /// by the single coupled playback rate, so a pitch shift drags the
    /// read head past the trim end and the tail pads with silence; that
    /// coupling is inherited behavior, kept as-is.
    pub fn render(buffer: &RawBuffer, snapshot: &SessionSnapshot) -> Result<RawBuffer, RenderError> {
        if buffer.is_empty() {
            return Err(RenderError::EmptySource);
        }

        let sample_rate = buffer.sample_rate() as f64;
        let duration = buffer.frames() as f64 / sample_rate;
        let start = snapshot.start_time.clamp(0.0, duration);
        let end = snapshot.end_time.clamp(0.0, duration);
        if end <= start {
            return Err(RenderError::EmptyRegion);
        }

        let stretch = snapshot.time_stretch.clamp(0.5, 2.0);
        let out_frames = ((end - start) / stretch * sample_rate).round() as usize;
        if out_frames == 0 {
            return Err(RenderError::EmptyRegion);
        }

        let rate = snapshot.playback_rate();
        let start_frame = start * sample_rate;

        let mut channels = Vec::with_capacity(buffer.channel_count());
        for input in buffer.channels() {
            let mut out = Vec::with_capacity(out_frames);
            for i in 0..out_frames {
                let pos = start_frame + i as f64 * rate;
                let idx = pos.floor() as usize;
                let frac = pos.fract() as f32;
                let s0 = input.get(idx).copied().unwrap_or(0.0);
                let s1 = input.get(idx + 1).copied().unwrap_or(s0);
                out.push(s0 + (s1 - s0) * frac);
            }
            channels.push(out);
        }

        // Gain ramps over the output timeline, then the session volume.
        let out_secs = out_frames as f64 / sample_rate;
        let fade_in = snapshot.fade_in.clamp(0.0, out_secs / 2.0);
        let fade_out = snapshot.fade_out.clamp(0.0, out_secs / 2.0);
        let volume = snapshot.volume.clamp(0.0, 2.0);
        for channel in channels.iter_mut() {
            for (i, sample) in channel.iter_mut().enumerate() {
                let t = i as f64 / sample_rate;
                let mut gain = volume;
                if fade_in > 0.0 && t < fade_in {
                    gain *= (t / fade_in) as f32;
                }
                if fade_out > 0.0 && t > out_secs - fade_out {
                    gain *= ((out_secs - t) / fade_out).max(0.0) as f32;
                }
                *sample *= gain;
            }
        }

        debug!(
            out_frames,
            rate,
            stretch,
            "Offline render complete"
        );
        Ok(RawBuffer::new(channels, buffer.sample_rate()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::editor::session::EditSession;
    use crate::testutil;

    fn snapshot_for(buffer: &RawBuffer) -> EditSession {
        EditSession::new(buffer.frames() as f64 / buffer.sample_rate() as f64)
    }

    #[test]
    fn test_output_length_matches_trim_over_stretch() {
        let buffer = testutil::sine_buffer(440.0, 2.0, 44100, 1);
        let mut session = snapshot_for(&buffer);
        session.set_trim(0.5, 1.5);
        session.set_time_stretch(0.5);

        let out = OfflineRenderer::render(&buffer, &session.snapshot()).expect("render");
        // (1.5 - 0.5) / 0.5 = 2 seconds, within one frame.
        let expected = (2.0 * 44100.0) as usize;
        assert!((out.frames() as i64 - expected as i64).abs() <= 1);
    }

    #[test]
    fn test_identity_render_is_lossless() {
        let buffer = testutil::ramp_buffer(1000, 44100);
        let session = snapshot_for(&buffer);

        let out = OfflineRenderer::render(&buffer, &session.snapshot()).expect("render");
        assert_eq!(out.frames(), buffer.frames());
        for (a, b) in buffer.channels()[0].iter().zip(&out.channels()[0]) {
            assert!((a - b).abs() < 1e-6);
        }
    }

    #[test]
    fn test_pitch_up_reads_faster_same_length() {
        let buffer = testutil::sine_buffer(440.0, 1.0, 44100, 1);
        let mut session = snapshot_for(&buffer);
        session.set_pitch(12.0, 0.0);

        let out = OfflineRenderer::render(&buffer, &session.snapshot()).expect("render");
        // Length is set by trim/stretch alone; pitch only moves the read
        // head (the coupled-rate contract).
        assert_eq!(out.frames(), buffer.frames());
        // An octave up halves the period: the second half of the output
        // read past the trim end and is silence-padded.
        let tail = &out.channels()[0][buffer.frames() / 2 + 2..];
        assert!(tail.iter().all(|s| s.abs() < 1e-3));
    }

    #[test]
    fn test_fades_ramp_linearly() {
        let frames = 44100;
        let buffer = RawBuffer::new(vec![vec![1.0; frames]], 44100);
        let mut session = snapshot_for(&buffer);
        session.set_fades(0.25, 0.25);

        let out = OfflineRenderer::render(&buffer, &session.snapshot()).expect("render");
        let samples = &out.channels()[0];

        // Mid fade-in: half gain.
        let mid_in = (0.125 * 44100.0) as usize;
        assert!((samples[mid_in] - 0.5).abs() < 0.01);
        // Center: untouched.
        assert!((samples[frames / 2] - 1.0).abs() < 1e-6);
        // Mid fade-out: half gain.
        let mid_out = frames - (0.125 * 44100.0) as usize;
        assert!((samples[mid_out] - 0.5).abs() < 0.01);
    }

    #[test]
    fn test_volume_applies_after_resample() {
        let buffer = RawBuffer::new(vec![vec![0.5; 100]], 44100);
        let mut session = snapshot_for(&buffer);
        session.set_volume(2.0);

        let out = OfflineRenderer::render(&buffer, &session.snapshot()).expect("render");
        assert!((out.channels()[0][50] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_empty_source_is_an_error() {
        let buffer = RawBuffer::empty(1, 44100);
        let session = EditSession::new(1.0);
        assert!(matches!(
            OfflineRenderer::render(&buffer, &session.snapshot()),
            Err(RenderError::EmptySource)
        ));
    }
}
