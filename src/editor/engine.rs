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

//! The editing engine for one open sample: parameter setters that arm
//! the debounced auto-render, splice edits over the working copy, and
//! the explicit render/flush paths.

use std::sync::Arc;

use tracing::{info, warn};

use super::debounce::AutoRenderer;
use super::render::{OfflineRenderer, RenderError};
use super::session::EditSession;
use crate::model::{RawBuffer, SampleId};

/// Receives committed canonical buffers for the sample being edited.
pub type CommitSink = Arc<dyn Fn(SampleId, RawBuffer) + Send + Sync>;

/// Errors from explicit editor operations. Setter-style operations never
/// raise these; only cut/copy/paste preconditions and explicit renders do.
#[derive(Debug, thiserror::Error)]
pub enum EditError {
    #[error("cut/copy requires a selection of at least one sample")]
    EmptySelection,

    #[error("clipboard is empty")]
    ClipboardEmpty,

    #[error(transparent)]
    Render(#[from] RenderError),
}

/// Edits one sample. Owns the mutable working copy of the buffer and the
/// session parameters; the canonical buffer in the store is only touched
/// through the commit sink, so live voices keep their own Arc.
///
/// Must be created inside a tokio runtime: the auto-render scheduler
/// spawns its timer task on construction.
pub struct SampleEditorEngine {
    sample_id: SampleId,
    working: RawBuffer,
    session: EditSession,
    auto: AutoRenderer,
    commit: CommitSink,
    dirty: bool,
}

impl SampleEditorEngine {
    pub fn new(sample_id: SampleId, buffer: RawBuffer, commit: CommitSink) -> Self {
        let session = EditSession::new(buffer.duration().as_secs_f64());
        let auto_commit = {
            let commit = commit.clone();
            Arc::new(move |rendered| commit(sample_id, rendered))
        };
        Self {
            sample_id,
            working: buffer,
            session,
            auto: AutoRenderer::new(auto_commit),
            commit,
            dirty: false,
        }
    }

    #[cfg(test)]
    pub(crate) fn with_debounce(
        sample_id: SampleId,
        buffer: RawBuffer,
        commit: CommitSink,
        debounce: std::time::Duration,
    ) -> Self {
        let session = EditSession::new(buffer.duration().as_secs_f64());
        let auto_commit = {
            let commit = commit.clone();
            Arc::new(move |rendered| commit(sample_id, rendered))
        };
        Self {
            sample_id,
            working: buffer,
            session,
            auto: AutoRenderer::with_debounce(auto_commit, debounce),
            commit,
            dirty: false,
        }
    }

    pub fn sample_id(&self) -> SampleId {
        self.sample_id
    }

    pub fn session(&self) -> &EditSession {
        &self.session
    }

    pub fn working(&self) -> &RawBuffer {
        &self.working
    }

    /// Marks the state dirty and re-arms the idle timer with the newest
    /// working copy and parameters.
    fn touch(&mut self) {
        self.dirty = true;
        self.auto
            .schedule(self.working.clone(), self.session.snapshot());
    }

    pub fn set_trim(&mut self, start: f64, end: f64) {
        self.session.set_trim(start, end);
        self.touch();
    }

    pub fn set_volume(&mut self, volume: f32) {
        self.session.set_volume(volume);
        self.touch();
    }

    pub fn set_pitch(&mut self, semitones: f32, cents: f32) {
        self.session.set_pitch(semitones, cents);
        self.touch();
    }

    pub fn set_fades(&mut self, fade_in: f64, fade_out: f64) {
        self.session.set_fades(fade_in, fade_out);
        self.touch();
    }

    pub fn set_time_stretch(&mut self, stretch: f64) {
        self.session.set_time_stretch(stretch);
        self.touch();
    }

    /// Sets the transient selection. Selection changes alone do not arm
    /// the auto-render.
    pub fn select(&mut self, start: f64, end: f64) {
        self.session.select(start, end);
    }

    pub fn clear_selection(&mut self) {
        self.session.clear_selection();
    }

    /// The active selection as a frame range, if it spans at least one
    /// sample.
    fn selection_frames(&self) -> Option<(usize, usize)> {
        let selection = self.session.selection()?;
        let sample_rate = self.working.sample_rate() as f64;
        let start = (selection.start * sample_rate).round() as usize;
        let end = ((selection.end * sample_rate).round() as usize).min(self.working.frames());
        (end > start).then_some((start, end))
    }

    /// Copies the selection into the clipboard, then removes it from the
    /// working buffer, shifting everything after it left. Each channel
    /// is spliced independently.
    pub fn cut(&mut self) -> Result<(), EditError> {
        let (start, end) = self.selection_frames().ok_or(EditError::EmptySelection)?;

        let region: Vec<Vec<f32>> = self
            .working
            .channels_mut()
            .iter_mut()
            .map(|channel| channel.drain(start..end).collect())
            .collect();
        self.session.set_clipboard(region);

        let sample_rate = self.working.sample_rate() as f64;
        self.session
            .set_duration(self.working.frames() as f64 / sample_rate);
        // Collapse the selection to its start so an immediate paste puts
        // the region straight back.
        let start_secs = start as f64 / sample_rate;
        self.session.select(start_secs, start_secs);

        info!(id = %self.sample_id, frames = end - start, "Cut region to clipboard");
        self.touch();
        Ok(())
    }

    /// Copies the selection into the clipboard. The working buffer is
    /// untouched.
    pub fn copy(&mut self) -> Result<(), EditError> {
        let (start, end) = self.selection_frames().ok_or(EditError::EmptySelection)?;

        let region: Vec<Vec<f32>> = self
            .working
            .channels()
            .iter()
            .map(|channel| channel[start..end].to_vec())
            .collect();
        self.session.set_clipboard(region);
        Ok(())
    }

    /// Inserts the clipboard at the selection start, or at the trim end
    /// when nothing is selected, shifting everything after it right. The
    /// clipboard is kept, so paste repeats.
    pub fn paste(&mut self) -> Result<(), EditError> {
        if self.session.clipboard().is_none() {
            return Err(EditError::ClipboardEmpty);
        }

        let sample_rate = self.working.sample_rate() as f64;
        let at_secs = self
            .session
            .selection()
            .map(|s| s.start)
            .unwrap_or_else(|| self.session.end_time());
        let at = ((at_secs * sample_rate).round() as usize).min(self.working.frames());

        let clipboard = self.session.clipboard().cloned().unwrap_or_default();
        let inserted = clipboard.first().map(Vec::len).unwrap_or(0);
        for (ch, channel) in self.working.channels_mut().iter_mut().enumerate() {
            match clipboard.get(ch) {
                Some(region) => drop(channel.splice(at..at, region.iter().copied())),
                None => drop(channel.splice(at..at, std::iter::repeat(0.0).take(inserted))),
            }
        }

        self.session
            .set_duration(self.working.frames() as f64 / sample_rate);
        info!(id = %self.sample_id, frames = inserted, "Pasted clipboard");
        self.touch();
        Ok(())
    }

    /// Scans channel 0 for the peak amplitude and sets the session
    /// volume to 1/peak. Silence is a no-op.
    pub fn normalize(&mut self) {
        let peak = self.working.peak(0);
        if peak == 0.0 {
            return;
        }
        self.session.set_volume(1.0 / peak);
        self.touch();
    }

    /// Resets every parametric field to the session baseline. Splices
    /// already made to the working buffer are not undone; revert is
    /// parametric-only, matching the inherited behavior.
    pub fn revert(&mut self) {
        self.session.revert();
        self.touch();
    }

    /// Renders immediately, bypassing the debounce, and commits the
    /// result as the new canonical buffer. Any pending or in-flight
    /// auto-render is superseded.
    pub fn render_now(&mut self) -> Result<RawBuffer, EditError> {
        self.auto.invalidate();
        let rendered = OfflineRenderer::render(&self.working, &self.session.snapshot())?;
        (self.commit)(self.sample_id, rendered.clone());
        self.dirty = false;
        info!(id = %self.sample_id, frames = rendered.frames(), "Explicit render committed");
        Ok(rendered)
    }

    /// Closes the editor. A pending render is flushed first so no edit
    /// is lost; a flush failure is logged, since there is no caller left
    /// to surface it to.
    pub fn close(mut self) {
        if self.dirty {
            if let Err(err) = self.render_now() {
                warn!(id = %self.sample_id, %err, "Flush on close failed");
            }
        }
    }
}

impl std::fmt::Debug for SampleEditorEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SampleEditorEngine")
            .field("sample_id", &self.sample_id)
            .field("working_frames", &self.working.frames())
            .field("dirty", &self.dirty)
            .finish()
    }
}
