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

//! Edit-session parameters. Every setter clamps; none of them error on
//! out-of-range numeric input.

/// Minimum trim span in seconds: start must stay below end.
pub const MIN_TRIM_SPAN_SECS: f64 = 0.001;

/// The parametric fields of a session, frozen at session start for
/// `revert` and cloned into every render request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SessionSnapshot {
    pub start_time: f64,
    pub end_time: f64,
    pub volume: f32,
    pub pitch_semitones: f32,
    pub pitch_cents: f32,
    pub fade_in: f64,
    pub fade_out: f64,
    pub time_stretch: f64,
}

impl SessionSnapshot {
    /// The single coupled playback rate: pitch and time-stretch share it.
    /// There is no independent time-stretch algorithm behind this.
    pub fn playback_rate(&self) -> f64 {
        let semitones = (self.pitch_semitones + self.pitch_cents / 100.0) as f64;
        (2.0f64).powf(semitones / 12.0) * self.time_stretch
    }

    /// The rendered output duration in seconds.
    pub fn output_secs(&self) -> f64 {
        (self.end_time - self.start_time) / self.time_stretch
    }
}

/// A selection over the working buffer, in seconds. Transient: only
/// cut/copy/paste consume it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Selection {
    pub start: f64,
    pub end: f64,
}

/// One sample's edit session: trim/pitch/fade/stretch over the working
/// buffer, plus the selection, the single-slot clipboard, and the frozen
/// baseline the explicit revert restores.
#[derive(Debug, Clone)]
pub struct EditSession {
    duration: f64,
    start_time: f64,
    end_time: f64,
    volume: f32,
    pitch_semitones: f32,
    pitch_cents: f32,
    fade_in: f64,
    fade_out: f64,
    time_stretch: f64,
    selection: Option<Selection>,
    clipboard: Option<Vec<Vec<f32>>>,
    baseline: SessionSnapshot,
}

impl EditSession {
    /// Opens a session over a buffer of the given duration. The baseline
    /// snapshot is captured here, once.
    pub fn new(duration_secs: f64) -> Self {
        let duration = duration_secs.max(MIN_TRIM_SPAN_SECS);
        let baseline = SessionSnapshot {
            start_time: 0.0,
            end_time: duration,
            volume: 1.0,
            pitch_semitones: 0.0,
            pitch_cents: 0.0,
            fade_in: 0.0,
            fade_out: 0.0,
            time_stretch: 1.0,
        };
        Self {
            duration,
            start_time: baseline.start_time,
            end_time: baseline.end_time,
            volume: baseline.volume,
            pitch_semitones: baseline.pitch_semitones,
            pitch_cents: baseline.pitch_cents,
            fade_in: baseline.fade_in,
            fade_out: baseline.fade_out,
            time_stretch: baseline.time_stretch,
            selection: None,
            clipboard: None,
            baseline,
        }
    }

    pub fn duration(&self) -> f64 {
        self.duration
    }

    /// Tracks a working-buffer length change after a splice. Trim and
    /// fades are re-clamped to the new duration.
    pub fn set_duration(&mut self, duration_secs: f64) {
        self.duration = duration_secs.max(MIN_TRIM_SPAN_SECS);
        self.set_trim(self.start_time, self.end_time.min(self.duration));
    }

    pub fn start_time(&self) -> f64 {
        self.start_time
    }

    pub fn end_time(&self) -> f64 {
        self.end_time
    }

    /// Sets the trim region. Inputs clamp to [0, duration] and the start
    /// is kept strictly below the end.
    pub fn set_trim(&mut self, start: f64, end: f64) {
        let mut start = start.clamp(0.0, self.duration);
        let mut end = end.clamp(0.0, self.duration);
        if end - start < MIN_TRIM_SPAN_SECS {
            end = (start + MIN_TRIM_SPAN_SECS).min(self.duration);
            start = (end - MIN_TRIM_SPAN_SECS).max(0.0);
        }
        self.start_time = start;
        self.end_time = end;
        // Fades can never exceed half the trimmed span.
        self.set_fades(self.fade_in, self.fade_out);
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }

    pub fn set_volume(&mut self, volume: f32) {
        self.volume = volume.clamp(0.0, 2.0);
    }

    pub fn pitch_semitones(&self) -> f32 {
        self.pitch_semitones
    }

    pub fn pitch_cents(&self) -> f32 {
        self.pitch_cents
    }

    pub fn set_pitch(&mut self, semitones: f32, cents: f32) {
        self.pitch_semitones = semitones.clamp(-12.0, 12.0);
        self.pitch_cents = cents.clamp(-100.0, 100.0);
    }

    pub fn fade_in(&self) -> f64 {
        self.fade_in
    }

    pub fn fade_out(&self) -> f64 {
        self.fade_out
    }

    pub fn set_fades(&mut self, fade_in: f64, fade_out: f64) {
        let max_fade = (self.end_time - self.start_time) / 2.0;
        self.fade_in = fade_in.clamp(0.0, max_fade);
        self.fade_out = fade_out.clamp(0.0, max_fade);
    }

    pub fn time_stretch(&self) -> f64 {
        self.time_stretch
    }

    pub fn set_time_stretch(&mut self, stretch: f64) {
        self.time_stretch = stretch.clamp(0.5, 2.0);
    }

    pub fn selection(&self) -> Option<Selection> {
        self.selection
    }

    /// Sets the selection used by cut/copy/paste, clamped to the buffer.
    pub fn select(&mut self, start: f64, end: f64) {
        let start = start.clamp(0.0, self.duration);
        let end = end.clamp(0.0, self.duration);
        self.selection = Some(Selection {
            start: start.min(end),
            end: start.max(end),
        });
    }

    pub fn clear_selection(&mut self) {
        self.selection = None;
    }

    pub fn clipboard(&self) -> Option<&Vec<Vec<f32>>> {
        self.clipboard.as_ref()
    }

    /// Fills the single clipboard slot, replacing whatever was there.
    pub fn set_clipboard(&mut self, region: Vec<Vec<f32>>) {
        self.clipboard = Some(region);
    }

    /// Restores every parametric field from the frozen baseline and
    /// drops the selection. The clipboard and any splices already made
    /// to the working buffer are left alone.
    pub fn revert(&mut self) {
        let baseline = self.baseline;
        self.start_time = baseline.start_time.min(self.duration);
        self.end_time = baseline.end_time.min(self.duration);
        self.volume = baseline.volume;
        self.pitch_semitones = baseline.pitch_semitones;
        self.pitch_cents = baseline.pitch_cents;
        self.fade_in = baseline.fade_in;
        self.fade_out = baseline.fade_out;
        self.time_stretch = baseline.time_stretch;
        self.selection = None;
        self.set_trim(self.start_time, self.end_time);
    }

    /// The current parametric state, for the renderer.
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            start_time: self.start_time,
            end_time: self.end_time,
            volume: self.volume,
            pitch_semitones: self.pitch_semitones,
            pitch_cents: self.pitch_cents,
            fade_in: self.fade_in,
            fade_out: self.fade_out,
            time_stretch: self.time_stretch,
        }
    }
}
