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

//! WAV byte encode/decode. The export layout is a compatibility
//! contract: RIFF/WAVE container, a PCM `fmt ` chunk, 16-bit signed
//! little-endian interleaved samples, and a `data` chunk of exactly
//! frames * channels * 2 bytes.

use std::io::Cursor;

use crate::model::{DecodeError, RawBuffer};

/// Errors surfaced by the export path. Unlike auto-save render failures,
/// these are user-visible.
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("WAV encode failed: {0}")]
    Wav(#[from] hound::Error),

    #[error("nothing to export: buffer is empty")]
    EmptyBuffer,
}

/// Encodes a buffer as 16-bit PCM WAV bytes.
pub fn encode_wav(buffer: &RawBuffer) -> Result<Vec<u8>, ExportError> {
    if buffer.is_empty() || buffer.channel_count() == 0 {
        return Err(ExportError::EmptyBuffer);
    }

    let spec = hound::WavSpec {
        channels: buffer.channel_count() as u16,
        sample_rate: buffer.sample_rate(),
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec)?;
        for frame in 0..buffer.frames() {
            for channel in buffer.channels() {
                let sample = (channel[frame].clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
                writer.write_sample(sample)?;
            }
        }
        writer.finalize()?;
    }
    Ok(cursor.into_inner())
}

/// Decodes WAV bytes into a planar buffer. Accepts 16/24-bit integer and
/// 32-bit float PCM.
pub fn decode_wav(bytes: &[u8]) -> Result<RawBuffer, DecodeError> {
    let mut reader = hound::WavReader::new(Cursor::new(bytes))?;
    let spec = reader.spec();
    let channel_count = spec.channels as usize;

    let interleaved: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .samples::<f32>()
            .collect::<Result<Vec<f32>, hound::Error>>()?,
        hound::SampleFormat::Int => {
            let scale = ((1i64 << (spec.bits_per_sample - 1)) - 1) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|s| s as f32 / scale))
                .collect::<Result<Vec<f32>, hound::Error>>()?
        }
    };

    Ok(RawBuffer::from_interleaved(
        &interleaved,
        channel_count,
        spec.sample_rate,
    ))
}
