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

//! The deck: single owner of every keyed store (samples, per-sample
//! effect settings, the pattern, editor sessions) and the trigger API
//! used by the UI, MIDI input, and the sequencer clock.

use std::error::Error;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crossbeam_channel::Receiver;
use parking_lot::{Mutex, RwLock};
use tracing::{debug, error, info, warn};

use crate::audio::{self, ActiveSource, AudioMixer, MemorySampleSource, SourceSender};
use crate::config::{EffectSettings, SequencerPattern, SettingsStore};
use crate::editor::SampleEditorEngine;
use crate::effects;
use crate::midi::{parse_note_event, NoteEvent};
use crate::model::{RawBuffer, SampleId, SampleStore};
use crate::playsync::CancelHandle;
use crate::sequencer::{SequencerClock, SequencerError, StepEvent, TriggerTarget};

/// Fixed trigger delay in samples. Immediate triggers are scheduled this
/// far ahead of the mix position so chain construction always finishes
/// before the frames are pulled.
const FIXED_DELAY_SAMPLES: u64 = 256;

/// A sounding (or scheduled) voice.
struct VoiceHandle {
    sample: SampleId,
    cancel: CancelHandle,
    finished: Arc<AtomicBool>,
}

/// Owns the stores and routes triggers through per-sample chains into
/// the mixer. Consumers receive the deck by `Arc`, never through a
/// global.
pub struct Deck {
    mixer: Arc<AudioMixer>,
    source_tx: SourceSender,
    samples: Arc<RwLock<SampleStore>>,
    settings: RwLock<SettingsStore>,
    pattern: Arc<RwLock<SequencerPattern>>,
    clock: Mutex<Option<SequencerClock>>,
    voices: Mutex<Vec<VoiceHandle>>,
}

impl Deck {
    pub fn new(sample_rate: u32) -> Arc<Self> {
        let (mixer, source_tx) = AudioMixer::new(sample_rate);
        Arc::new(Self {
            mixer,
            source_tx,
            samples: Arc::new(RwLock::new(SampleStore::new())),
            settings: RwLock::new(SettingsStore::new()),
            pattern: Arc::new(RwLock::new(SequencerPattern::default())),
            clock: Mutex::new(None),
            voices: Mutex::new(Vec::new()),
        })
    }

    pub fn mixer(&self) -> &Arc<AudioMixer> {
        &self.mixer
    }

    /// Registers a captured buffer and returns its id.
    pub fn capture(&self, buffer: RawBuffer) -> SampleId {
        self.samples.write().insert(buffer)
    }

    /// Registers a captured buffer with a name and trigger note.
    pub fn capture_named(
        &self,
        buffer: RawBuffer,
        name: &str,
        trigger_note: Option<u8>,
    ) -> SampleId {
        let name = name.to_string();
        self.samples.write().insert_sample(|id| {
            let sample = crate::model::AudioSample::new(id, buffer).with_name(name);
            match trigger_note {
                Some(note) => sample.with_trigger_note(note),
                None => sample,
            }
        })
    }

    /// Deletes a sample and every keyed record attached to it.
    pub fn delete_sample(&self, id: SampleId) {
        self.samples.write().remove(id);
        self.settings.write().remove(id);
        self.pattern.write().remove_row(id);
        info!(%id, "Sample deleted");
    }

    pub fn sample_ids(&self) -> Vec<SampleId> {
        self.samples.read().ids()
    }

    /// Runs a closure over a sample's settings, creating defaults on
    /// first use (the effect-panel interaction path), then returns the
    /// updated copy for persistence.
    pub fn update_settings(
        &self,
        id: SampleId,
        update: impl FnOnce(&mut EffectSettings),
    ) -> EffectSettings {
        let mut settings = self.settings.write();
        let entry = settings.get_or_default(id);
        update(entry);
        *entry
    }

    /// The settings used when a sample is triggered: its stored record,
    /// or pass-through defaults if the effect panel was never opened.
    fn settings_for(&self, id: SampleId) -> EffectSettings {
        self.settings
            .read()
            .get(id)
            .copied()
            .unwrap_or_default()
    }

    /// Triggers a sample now (one fixed delay ahead of the mix position).
    pub fn trigger(&self, id: SampleId) {
        self.trigger_at(id, self.mixer.current_sample() + FIXED_DELAY_SAMPLES);
    }

    /// Consumes raw MIDI bytes. Note on triggers the matching sample at
    /// full level; note off is ignored, one-shot voices ring out.
    pub fn handle_midi_event(&self, raw: &[u8]) {
        match parse_note_event(raw) {
            Some(NoteEvent::On { note }) => {
                let id = self.samples.read().find_by_trigger_note(note).map(|s| s.id());
                match id {
                    Some(id) => self.trigger(id),
                    None => debug!(note, "No sample assigned to trigger note"),
                }
            }
            Some(NoteEvent::Off { .. }) | None => {}
        }
    }

    /// Stops everything, synchronously: the sequencer schedule, every
    /// sounding voice, and anything still queued toward the mixer.
    pub fn stop_all(&self) {
        self.stop_sequencer();

        let mut voices = self.voices.lock();
        let stopped = voices.len();
        for voice in voices.drain(..) {
            voice.cancel.cancel();
        }
        drop(voices);
        self.mixer.clear();

        if stopped > 0 {
            info!(stopped, "All voices stopped");
        }
    }

    /// The number of voices still sounding or scheduled.
    pub fn active_voice_count(&self) -> usize {
        let mut voices = self.voices.lock();
        voices.retain(|v| !v.finished.load(Ordering::Relaxed) && !v.cancel.is_cancelled());
        voices.len()
    }

    /// The number of active voices for one sample.
    pub fn active_voices_for(&self, id: SampleId) -> usize {
        let mut voices = self.voices.lock();
        voices.retain(|v| !v.finished.load(Ordering::Relaxed) && !v.cancel.is_cancelled());
        voices.iter().filter(|v| v.sample == id).count()
    }

    // ---- Sequencer ----------------------------------------------------

    /// Starts the sequencer clock over the current pattern.
    pub fn start_sequencer(self: &Arc<Self>) -> Result<Receiver<StepEvent>, SequencerError> {
        let mut clock = self.clock.lock();
        let clock = clock.get_or_insert_with(|| {
            SequencerClock::new(
                self.mixer.clone(),
                self.clone() as Arc<dyn TriggerTarget>,
                self.pattern.clone(),
            )
        });
        clock.start()
    }

    /// Stops the sequencer clock. Sounding voices ring out.
    pub fn stop_sequencer(&self) {
        if let Some(clock) = self.clock.lock().as_mut() {
            clock.stop();
        }
    }

    /// Live tempo change: takes effect at the clock's next tick.
    pub fn set_bpm(&self, bpm: f64) {
        self.pattern.write().set_bpm(bpm);
    }

    /// Live step toggle.
    pub fn set_step(&self, id: SampleId, step: usize, active: bool) {
        self.pattern.write().set_step(id, step, active);
    }

    /// Structural change: step count. If the clock is running this is a
    /// stop-then-rebuild; a rebuild failure leaves the sequencer stopped
    /// and is surfaced for an explicit restart.
    pub fn set_step_count(
        self: &Arc<Self>,
        step_count: usize,
    ) -> Result<Option<Receiver<StepEvent>>, SequencerError> {
        self.pattern.write().set_step_count(step_count);
        self.rebuild_if_running()
    }

    /// Structural change: subdivision. Same rebuild contract as
    /// [`Deck::set_step_count`].
    pub fn set_subdivision(
        self: &Arc<Self>,
        subdivision: crate::config::Subdivision,
    ) -> Result<Option<Receiver<StepEvent>>, SequencerError> {
        self.pattern.write().set_subdivision(subdivision);
        self.rebuild_if_running()
    }

    fn rebuild_if_running(&self) -> Result<Option<Receiver<StepEvent>>, SequencerError> {
        let mut clock = self.clock.lock();
        match clock.as_mut() {
            Some(clock) if clock.state() == crate::sequencer::ClockState::Running => {
                match clock.rebuild() {
                    Ok(events) => Ok(Some(events)),
                    Err(err) => {
                        // Fatal to the run: the clock is already stopped
                        // and stays that way until an explicit start.
                        error!(%err, "Sequencer rebuild failed");
                        Err(err)
                    }
                }
            }
            _ => Ok(None),
        }
    }

    /// Read access to the pattern record for persistence.
    pub fn pattern(&self) -> SequencerPattern {
        self.pattern.read().clone()
    }

    /// Replaces the pattern record, e.g. when loading a project.
    pub fn load_pattern(&self, pattern: SequencerPattern) {
        *self.pattern.write() = pattern;
    }

    /// Serializes every per-sample settings record for persistence.
    pub fn settings_json(&self) -> Result<String, crate::config::ConfigError> {
        self.settings.read().to_json()
    }

    /// Restores persisted per-sample settings records.
    pub fn load_settings(&self, json: &str) -> Result<(), crate::config::ConfigError> {
        *self.settings.write() = SettingsStore::from_json(json)?;
        Ok(())
    }

    // ---- Editor -------------------------------------------------------

    /// Opens an editor over a sample. Commits from the editor's render
    /// passes replace the canonical buffer; voices already playing the
    /// old buffer keep their own Arc. Must be called inside a tokio
    /// runtime.
    pub fn open_editor(&self, id: SampleId) -> Option<SampleEditorEngine> {
        let buffer = {
            let samples = self.samples.read();
            (**samples.get(id)?.buffer()).clone()
        };
        let samples = self.samples.clone();
        let commit = Arc::new(move |id: SampleId, rendered: RawBuffer| {
            if !samples.write().replace_buffer(id, rendered) {
                warn!(%id, "Render commit for a deleted sample, dropped");
            }
        });
        Some(SampleEditorEngine::new(id, buffer, commit))
    }

    // ---- Export -------------------------------------------------------

    /// Renders one sample through its effects chain and returns WAV
    /// bytes. Failures here are explicit-action failures: surfaced, not
    /// swallowed.
    pub fn export_sample_wav(&self, id: SampleId) -> Result<Vec<u8>, Box<dyn Error>> {
        let buffer = {
            let samples = self.samples.read();
            samples
                .get(id)
                .map(|s| s.buffer().clone())
                .ok_or_else(|| format!("no sample {id}"))?
        };
        let settings = self.settings_for(id);
        let voice = effects::build_voice(&buffer, &settings);
        Ok(audio::encode_wav(&voice)?)
    }

    /// Renders `loops` passes of the pattern offline into a stereo
    /// master buffer, with every trigger at its exact scheduled sample
    /// and the tail rung out.
    pub fn render_pattern(&self, loops: usize) -> RawBuffer {
        let (step_count, interval_secs) = {
            let pattern = self.pattern.read();
            (pattern.step_count(), pattern.step_interval().as_secs_f64())
        };
        let sample_rate = self.mixer.sample_rate() as f64;
        let interval_samples = interval_secs * sample_rate;
        let anchor = self.mixer.current_sample() + FIXED_DELAY_SAMPLES;

        let mut at = anchor as f64;
        for loop_index in 0..loops {
            for step in 0..step_count {
                let ids = self.pattern.read().active_samples_at(step);
                for id in ids {
                    self.trigger_at(id, at.round() as u64);
                }
                debug!(loop_index, step, at = at.round() as u64, "Step scheduled");
                at += interval_samples;
            }
        }

        let body_frames = (at - anchor as f64).ceil() as usize + FIXED_DELAY_SAMPLES as usize;
        let mut master = self.mixer.render_frames(body_frames);

        // Ring out delay/reverb tails.
        while self.mixer.active_source_count() > 0 {
            let tail = self.mixer.render_frames(4096);
            let channels = master.channels_mut();
            for (ch, tail_channel) in tail.channels().iter().enumerate() {
                channels[ch].extend_from_slice(tail_channel);
            }
        }
        master
    }
}

impl TriggerTarget for Deck {
    /// Builds the chain and hands the finished voice to the mixer,
    /// scheduled at an exact sample position. Construction happens here
    /// on the control path; by the time the mixer pulls the voice it is
    /// immutable.
    fn trigger_at(&self, id: SampleId, at_sample: u64) {
        let buffer = {
            let samples = self.samples.read();
            match samples.get(id) {
                Some(sample) => sample.buffer().clone(),
                None => {
                    warn!(%id, "Trigger for unknown sample");
                    return;
                }
            }
        };
        let settings = self.settings_for(id);

        let voice_buffer = effects::build_voice(&buffer, &settings);
        let source = MemorySampleSource::from_shared(Arc::new(voice_buffer), 1.0);

        let cancel = CancelHandle::new();
        let finished = Arc::new(AtomicBool::new(false));
        let active = ActiveSource {
            id: audio::next_source_id(),
            source: Box::new(source),
            is_finished: finished.clone(),
            cancel_handle: cancel.clone(),
            start_at_sample: Some(at_sample),
            cancel_at_sample: None,
        };

        let mut voices = self.voices.lock();
        voices.retain(|v| !v.finished.load(Ordering::Relaxed) && !v.cancel.is_cancelled());
        voices.push(VoiceHandle {
            sample: id,
            cancel,
            finished,
        });
        drop(voices);

        if let Err(err) = self.source_tx.send(active) {
            error!(%err, "Failed to send voice to mixer");
            return;
        }
        debug!(%id, at_sample, "Voice triggered");
    }
}

impl std::fmt::Debug for Deck {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Deck")
            .field("samples", &self.samples.read().len())
            .field("settings", &self.settings.read().len())
            .field("memory_kb", &(self.samples.read().total_memory_usage() / 1024))
            .finish()
    }
}
