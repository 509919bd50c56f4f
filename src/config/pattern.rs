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

//! The persisted step-sequencer pattern: step geometry, tempo, and one
//! step row per assigned sample.

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::model::SampleId;

/// Smallest accepted step count.
pub const MIN_STEP_COUNT: usize = 1;
/// Largest accepted step count. 8/16/24/32 are the usual preset lengths.
pub const MAX_STEP_COUNT: usize = 32;
/// Default step count.
pub const DEFAULT_STEP_COUNT: usize = 16;
/// Tempo bounds in beats per minute.
pub const MIN_BPM: f64 = 20.0;
pub const MAX_BPM: f64 = 300.0;
/// Default tempo.
pub const DEFAULT_BPM: f64 = 120.0;

/// Step subdivision, as a fraction of a quarter note.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Subdivision {
    Quarter,
    Eighth,
    #[default]
    Sixteenth,
    ThirtySecond,
}

impl Subdivision {
    /// The fraction of a quarter note one step covers.
    pub fn fraction(&self) -> f64 {
        match self {
            Subdivision::Quarter => 1.0,
            Subdivision::Eighth => 0.5,
            Subdivision::Sixteenth => 0.25,
            Subdivision::ThirtySecond => 0.125,
        }
    }

    /// The step interval at the given tempo: (60 / bpm) * fraction.
    pub fn interval(&self, bpm: f64) -> Duration {
        Duration::from_secs_f64(60.0 / bpm.clamp(MIN_BPM, MAX_BPM) * self.fraction())
    }
}

/// A step pattern: which samples fire on which steps, and the geometry
/// and tempo that drive the clock.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SequencerPattern {
    #[serde(default = "default_step_count")]
    step_count: usize,
    #[serde(default)]
    subdivision: Subdivision,
    #[serde(default = "default_bpm")]
    bpm: f64,
    #[serde(default)]
    rows: HashMap<SampleId, Vec<bool>>,
}

fn default_step_count() -> usize {
    DEFAULT_STEP_COUNT
}

fn default_bpm() -> f64 {
    DEFAULT_BPM
}

impl Default for SequencerPattern {
    fn default() -> Self {
        Self {
            step_count: DEFAULT_STEP_COUNT,
            subdivision: Subdivision::default(),
            bpm: DEFAULT_BPM,
            rows: HashMap::new(),
        }
    }
}

impl SequencerPattern {
    pub fn new(step_count: usize, subdivision: Subdivision, bpm: f64) -> Self {
        let mut pattern = Self::default();
        pattern.set_step_count(step_count);
        pattern.set_subdivision(subdivision);
        pattern.set_bpm(bpm);
        pattern
    }

    pub fn step_count(&self) -> usize {
        self.step_count
    }

    /// Changes the step geometry. Every row is resynchronized to the new
    /// length: truncated, or zero-padded with inactive steps.
    pub fn set_step_count(&mut self, step_count: usize) {
        self.step_count = step_count.clamp(MIN_STEP_COUNT, MAX_STEP_COUNT);
        let step_count = self.step_count;
        for row in self.rows.values_mut() {
            row.resize(step_count, false);
        }
    }

    pub fn subdivision(&self) -> Subdivision {
        self.subdivision
    }

    pub fn set_subdivision(&mut self, subdivision: Subdivision) {
        self.subdivision = subdivision;
    }

    pub fn bpm(&self) -> f64 {
        self.bpm.clamp(MIN_BPM, MAX_BPM)
    }

    pub fn set_bpm(&mut self, bpm: f64) {
        self.bpm = bpm.clamp(MIN_BPM, MAX_BPM);
    }

    /// The step interval implied by the current tempo and subdivision.
    pub fn step_interval(&self) -> Duration {
        self.subdivision.interval(self.bpm())
    }

    /// Returns the step row for a sample, creating an all-inactive row on
    /// first use.
    pub fn row_mut(&mut self, id: SampleId) -> &mut Vec<bool> {
        let step_count = self.step_count;
        self.rows.entry(id).or_insert_with(|| vec![false; step_count])
    }

    pub fn row(&self, id: SampleId) -> Option<&[bool]> {
        self.rows.get(&id).map(Vec::as_slice)
    }

    /// Toggles one step for one sample. Out-of-range steps are ignored.
    pub fn set_step(&mut self, id: SampleId, step: usize, active: bool) {
        if step >= self.step_count {
            return;
        }
        self.row_mut(id)[step] = active;
    }

    /// Drops the row for a deleted sample.
    pub fn remove_row(&mut self, id: SampleId) {
        self.rows.remove(&id);
    }

    /// The samples whose rows mark the given step active.
    pub fn active_samples_at(&self, step: usize) -> Vec<SampleId> {
        let mut ids: Vec<SampleId> = self
            .rows
            .iter()
            .filter(|(_, row)| row.get(step).copied().unwrap_or(false))
            .map(|(id, _)| *id)
            .collect();
        ids.sort();
        ids
    }

    pub fn assigned_samples(&self) -> usize {
        self.rows.len()
    }
}
