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

//! Core data model: raw PCM buffers, captured samples, and the keyed
//! sample store owned by the deck.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Duration reported for a sample whose buffer could not be decoded.
/// Keeps the surrounding workflow alive instead of aborting it.
pub const FALLBACK_DURATION: Duration = Duration::from_secs(1);

/// A stable identifier for a captured sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SampleId(pub u64);

impl std::fmt::Display for SampleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "sample-{}", self.0)
    }
}

/// Errors raised while turning captured bytes into a usable buffer.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("WAV decode failed: {0}")]
    Wav(#[from] hound::Error),

    #[error("unsupported buffer: {0}")]
    Unsupported(String),
}

/// Raw decoded audio in planar form: one Vec per channel, all the same
/// length, at a fixed sample rate.
#[derive(Debug, Clone, PartialEq)]
pub struct RawBuffer {
    channels: Vec<Vec<f32>>,
    sample_rate: u32,
}

impl RawBuffer {
    /// Creates a buffer from planar channel data. All channels must have
    /// the same frame count; shorter channels are zero-padded to the
    /// longest so a ragged capture can't corrupt downstream indexing.
    pub fn new(mut channels: Vec<Vec<f32>>, sample_rate: u32) -> Self {
        let frames = channels.iter().map(Vec::len).max().unwrap_or(0);
        for channel in channels.iter_mut() {
            channel.resize(frames, 0.0);
        }
        Self {
            channels,
            sample_rate,
        }
    }

    /// An empty buffer, used as the pass-through result for degenerate input.
    pub fn empty(channel_count: usize, sample_rate: u32) -> Self {
        Self {
            channels: vec![Vec::new(); channel_count],
            sample_rate,
        }
    }

    /// Builds a buffer from interleaved samples, the layout WAV data and
    /// capture callbacks deliver.
    pub fn from_interleaved(samples: &[f32], channel_count: usize, sample_rate: u32) -> Self {
        let frames = if channel_count > 0 {
            samples.len() / channel_count
        } else {
            0
        };
        let mut channels = vec![Vec::with_capacity(frames); channel_count];
        for frame in 0..frames {
            for (ch, channel) in channels.iter_mut().enumerate() {
                channel.push(samples[frame * channel_count + ch]);
            }
        }
        Self {
            channels,
            sample_rate,
        }
    }

    /// Returns the planar channel data.
    pub fn channels(&self) -> &[Vec<f32>] {
        &self.channels
    }

    /// Mutable access to the planar channel data, for splice edits.
    pub fn channels_mut(&mut self) -> &mut Vec<Vec<f32>> {
        &mut self.channels
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Frames per channel.
    pub fn frames(&self) -> usize {
        self.channels.first().map(Vec::len).unwrap_or(0)
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn is_empty(&self) -> bool {
        self.frames() == 0
    }

    /// Duration of this buffer. Degenerate buffers report the fallback
    /// duration so editor math never divides by zero.
    pub fn duration(&self) -> Duration {
        if self.is_empty() || self.sample_rate == 0 {
            return FALLBACK_DURATION;
        }
        Duration::from_secs_f64(self.frames() as f64 / self.sample_rate as f64)
    }

    /// Peak absolute amplitude of the given channel.
    pub fn peak(&self, channel: usize) -> f32 {
        self.channels
            .get(channel)
            .map(|c| c.iter().fold(0.0f32, |acc, s| acc.max(s.abs())))
            .unwrap_or(0.0)
    }

    /// Flattens the planar data back to interleaved samples.
    pub fn to_interleaved(&self) -> Vec<f32> {
        let frames = self.frames();
        let mut out = Vec::with_capacity(frames * self.channel_count());
        for frame in 0..frames {
            for channel in &self.channels {
                out.push(channel[frame]);
            }
        }
        out
    }

    /// Memory used by the sample data in bytes.
    pub fn memory_size(&self) -> usize {
        self.channels.iter().map(Vec::len).sum::<usize>() * std::mem::size_of::<f32>()
    }
}

/// A captured sample: an immutable raw buffer plus its metadata. The
/// buffer is replaced, never mutated, when the editor commits a render.
#[derive(Debug, Clone)]
pub struct AudioSample {
    id: SampleId,
    buffer: Arc<RawBuffer>,
    name: Option<String>,
    trigger_note: Option<u8>,
}

impl AudioSample {
    pub fn new(id: SampleId, buffer: RawBuffer) -> Self {
        Self {
            id,
            buffer: Arc::new(buffer),
            name: None,
            trigger_note: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Assigns the MIDI note that triggers this sample. Values above 127
    /// are clamped into the note range.
    pub fn with_trigger_note(mut self, note: u8) -> Self {
        self.trigger_note = Some(note.min(127));
        self
    }

    pub fn id(&self) -> SampleId {
        self.id
    }

    pub fn buffer(&self) -> &Arc<RawBuffer> {
        &self.buffer
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn trigger_note(&self) -> Option<u8> {
        self.trigger_note
    }

    pub fn duration(&self) -> Duration {
        self.buffer.duration()
    }
}

/// The keyed sample store. Owned by the deck and handed to consumers by
/// reference; there are no ambient singletons behind it.
#[derive(Debug, Default)]
pub struct SampleStore {
    samples: HashMap<SampleId, AudioSample>,
    next_id: u64,
}

impl SampleStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a freshly captured buffer and returns its id.
    pub fn insert(&mut self, buffer: RawBuffer) -> SampleId {
        self.next_id += 1;
        let id = SampleId(self.next_id);
        let sample = AudioSample::new(id, buffer);
        debug!(%id, duration_ms = sample.duration().as_millis(), "Sample captured");
        self.samples.insert(id, sample);
        id
    }

    /// Inserts a fully built sample (name, trigger note) under a new id.
    pub fn insert_sample(&mut self, build: impl FnOnce(SampleId) -> AudioSample) -> SampleId {
        self.next_id += 1;
        let id = SampleId(self.next_id);
        self.samples.insert(id, build(id));
        id
    }

    pub fn get(&self, id: SampleId) -> Option<&AudioSample> {
        self.samples.get(&id)
    }

    /// Replaces a sample's buffer with a newly rendered one. The old Arc
    /// stays alive for any voice still playing it.
    pub fn replace_buffer(&mut self, id: SampleId, buffer: RawBuffer) -> bool {
        match self.samples.get_mut(&id) {
            Some(sample) => {
                sample.buffer = Arc::new(buffer);
                debug!(%id, "Sample buffer replaced after render");
                true
            }
            None => false,
        }
    }

    pub fn remove(&mut self, id: SampleId) -> Option<AudioSample> {
        self.samples.remove(&id)
    }

    /// Finds the sample assigned to a MIDI trigger note.
    pub fn find_by_trigger_note(&self, note: u8) -> Option<&AudioSample> {
        self.samples.values().find(|s| s.trigger_note == Some(note))
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn ids(&self) -> Vec<SampleId> {
        let mut ids: Vec<SampleId> = self.samples.keys().copied().collect();
        ids.sort();
        ids
    }

    /// Total memory used by all stored buffers.
    pub fn total_memory_usage(&self) -> usize {
        self.samples.values().map(|s| s.buffer.memory_size()).sum()
    }
}
