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

//! Core mixing logic, independent of any audio backend.
//!
//! Sources arrive over a channel (the control thread never takes the
//! mix-path lock to add one) and carry their scheduling: an optional
//! start sample for sample-accurate triggers and an optional scheduled
//! cancel sample for sample-accurate cuts. The mixer advances a
//! monotonic sample clock as the external device pulls frames.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use crossbeam_channel::{Receiver, Sender, TryRecvError};
use parking_lot::Mutex;

use crate::audio::sample_source::SampleSource;
use crate::model::RawBuffer;
use crate::playsync::CancelHandle;

/// The mix bus is stereo.
pub const OUTPUT_CHANNELS: usize = 2;

/// Sends new sources to the mixer without lock contention.
pub type SourceSender = Sender<ActiveSource>;

/// Represents an active audio source in the mixer.
pub struct ActiveSource {
    /// Unique ID for this source.
    pub id: u64,
    /// The sample source to pull frames from.
    pub source: Box<dyn SampleSource>,
    /// Whether this source has finished playing.
    pub is_finished: Arc<AtomicBool>,
    /// Cancel handle for stopping this source.
    pub cancel_handle: CancelHandle,
    /// Sample position at which this source starts sounding. Until then
    /// it contributes silence but holds its slot.
    pub start_at_sample: Option<u64>,
    /// Scheduled stop position; 0 means no scheduled cancel.
    pub cancel_at_sample: Option<Arc<AtomicU64>>,
}

/// Core audio mixing logic that's independent of any audio backend.
pub struct AudioMixer {
    /// Active audio sources currently playing.
    active_sources: Mutex<Vec<ActiveSource>>,
    /// Incoming sources from trigger paths.
    source_rx: Receiver<ActiveSource>,
    /// Sample rate of the mix bus.
    sample_rate: u32,
    /// Monotonic count of frames pulled so far.
    current_sample: AtomicU64,
}

impl AudioMixer {
    /// Creates a mixer and the sender trigger paths use to add sources.
    pub fn new(sample_rate: u32) -> (Arc<Self>, SourceSender) {
        let (tx, rx) = crossbeam_channel::unbounded();
        (
            Arc::new(Self {
                active_sources: Mutex::new(Vec::new()),
                source_rx: rx,
                sample_rate,
                current_sample: AtomicU64::new(0),
            }),
            tx,
        )
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// The position the next pulled frame will have on the sample clock.
    pub fn current_sample(&self) -> u64 {
        self.current_sample.load(Ordering::SeqCst)
    }

    /// Moves newly delivered sources into the active list.
    fn drain_incoming(&self, sources: &mut Vec<ActiveSource>) {
        loop {
            match self.source_rx.try_recv() {
                Ok(source) => sources.push(source),
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
    }

    /// Mixes one frame into `out` (length [`OUTPUT_CHANNELS`]) and
    /// advances the sample clock. Mono sources are spread to both bus
    /// channels; channels beyond the bus width are dropped.
    pub fn process_frame(&self, out: &mut [f32; OUTPUT_CHANNELS]) {
        out.fill(0.0);
        let now = self.current_sample.fetch_add(1, Ordering::SeqCst);

        let mut sources = self.active_sources.lock();
        self.drain_incoming(&mut sources);

        let mut frame = [0.0f32; OUTPUT_CHANNELS];
        sources.retain_mut(|active| {
            if active.cancel_handle.is_cancelled() {
                return false;
            }
            if let Some(cancel_at) = &active.cancel_at_sample {
                let at = cancel_at.load(Ordering::Relaxed);
                if at != 0 && now >= at {
                    active.is_finished.store(true, Ordering::Relaxed);
                    return false;
                }
            }
            if let Some(start_at) = active.start_at_sample {
                if now < start_at {
                    return true;
                }
            }

            match active.source.next_frame(&mut frame) {
                0 => {
                    active.is_finished.store(true, Ordering::Relaxed);
                    false
                }
                1 => {
                    out[0] += frame[0];
                    out[1] += frame[0];
                    true
                }
                _ => {
                    out[0] += frame[0];
                    out[1] += frame[1];
                    true
                }
            }
        });
    }

    /// Pulls `frames` frames, returning them as a stereo buffer. This is
    /// the offline stand-in for a device callback, and the master-record
    /// path for pattern export.
    pub fn render_frames(&self, frames: usize) -> RawBuffer {
        let mut left = Vec::with_capacity(frames);
        let mut right = Vec::with_capacity(frames);
        let mut frame = [0.0f32; OUTPUT_CHANNELS];
        for _ in 0..frames {
            self.process_frame(&mut frame);
            left.push(frame[0]);
            right.push(frame[1]);
        }
        RawBuffer::new(vec![left, right], self.sample_rate)
    }

    /// The number of sources currently held (sounding or scheduled).
    pub fn active_source_count(&self) -> usize {
        let mut sources = self.active_sources.lock();
        self.drain_incoming(&mut sources);
        sources.len()
    }

    /// Cancels and drops every source, including ones still queued on
    /// the channel. Part of the synchronous stop contract.
    pub fn clear(&self) {
        let mut sources = self.active_sources.lock();
        self.drain_incoming(&mut sources);
        for source in sources.iter() {
            source.cancel_handle.cancel();
            source.is_finished.store(true, Ordering::Relaxed);
        }
        sources.clear();
    }
}

impl std::fmt::Debug for AudioMixer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioMixer")
            .field("sample_rate", &self.sample_rate)
            .field("current_sample", &self.current_sample())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::sample_source::MemorySampleSource;
    use crate::audio::next_source_id;

    fn source_for(buffer: RawBuffer, start_at: Option<u64>) -> ActiveSource {
        ActiveSource {
            id: next_source_id(),
            source: Box::new(MemorySampleSource::new(buffer, 1.0)),
            is_finished: Arc::new(AtomicBool::new(false)),
            cancel_handle: CancelHandle::new(),
            start_at_sample: start_at,
            cancel_at_sample: None,
        }
    }

    #[test]
    fn test_mixes_and_spreads_mono() {
        let (mixer, tx) = AudioMixer::new(44100);
        tx.send(source_for(RawBuffer::new(vec![vec![0.5, 0.25]], 44100), None))
            .unwrap();

        let out = mixer.render_frames(3);
        assert_eq!(out.channels()[0], vec![0.5, 0.25, 0.0]);
        assert_eq!(out.channels()[1], vec![0.5, 0.25, 0.0]);
        assert_eq!(mixer.current_sample(), 3);
    }

    #[test]
    fn test_sums_concurrent_sources() {
        let (mixer, tx) = AudioMixer::new(44100);
        tx.send(source_for(RawBuffer::new(vec![vec![0.5]], 44100), None))
            .unwrap();
        tx.send(source_for(RawBuffer::new(vec![vec![0.25]], 44100), None))
            .unwrap();

        let out = mixer.render_frames(1);
        assert!((out.channels()[0][0] - 0.75).abs() < 1e-6);
    }

    #[test]
    fn test_start_at_sample_delays_playback() {
        let (mixer, tx) = AudioMixer::new(44100);
        tx.send(source_for(
            RawBuffer::new(vec![vec![1.0, 1.0]], 44100),
            Some(2),
        ))
        .unwrap();

        let out = mixer.render_frames(4);
        assert_eq!(out.channels()[0], vec![0.0, 0.0, 1.0, 1.0]);
    }

    #[test]
    fn test_scheduled_cancel_is_sample_accurate() {
        let (mixer, tx) = AudioMixer::new(44100);
        let cancel_at = Arc::new(AtomicU64::new(0));
        let mut source = source_for(RawBuffer::new(vec![vec![1.0; 10]], 44100), None);
        source.cancel_at_sample = Some(cancel_at.clone());
        tx.send(source).unwrap();

        cancel_at.store(3, Ordering::Relaxed);
        let out = mixer.render_frames(6);
        assert_eq!(out.channels()[0], vec![1.0, 1.0, 1.0, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_cancel_handle_stops_source() {
        let (mixer, tx) = AudioMixer::new(44100);
        let source = source_for(RawBuffer::new(vec![vec![1.0; 10]], 44100), None);
        let handle = source.cancel_handle.clone();
        tx.send(source).unwrap();

        mixer.render_frames(2);
        handle.cancel();
        let out = mixer.render_frames(2);
        assert_eq!(out.channels()[0], vec![0.0, 0.0]);
        assert_eq!(mixer.active_source_count(), 0);
    }

    #[test]
    fn test_clear_drops_queued_sources() {
        let (mixer, tx) = AudioMixer::new(44100);
        tx.send(source_for(RawBuffer::new(vec![vec![1.0; 10]], 44100), None))
            .unwrap();
        mixer.clear();

        let out = mixer.render_frames(1);
        assert_eq!(out.channels()[0], vec![0.0]);
    }
}
