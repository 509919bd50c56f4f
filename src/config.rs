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

//! Serializable configuration records: per-sample effect settings and the
//! sequencer pattern. These are the records the host persists and
//! round-trips, keyed by sample/project id.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::model::SampleId;

pub mod effects;
pub mod error;
pub mod pattern;

pub use effects::{
    CompressorParams, DelayParams, EffectSettings, EqParams, ReverbParams, Stage,
};
pub use error::ConfigError;
pub use pattern::{SequencerPattern, Subdivision};

/// Per-sample effect settings, keyed by sample id. Settings are created
/// lazily with documented defaults on first access and are never shared
/// across samples.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct SettingsStore {
    settings: HashMap<SampleId, EffectSettings>,
}

impl SettingsStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the settings for a sample, if any have been created.
    pub fn get(&self, id: SampleId) -> Option<&EffectSettings> {
        self.settings.get(&id)
    }

    /// Returns the settings for a sample, creating defaults on first use.
    pub fn get_or_default(&mut self, id: SampleId) -> &mut EffectSettings {
        self.settings.entry(id).or_default()
    }

    /// Drops the settings for a deleted sample.
    pub fn remove(&mut self, id: SampleId) {
        self.settings.remove(&id);
    }

    pub fn len(&self) -> usize {
        self.settings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.settings.is_empty()
    }

    /// Serializes the store for external persistence.
    pub fn to_json(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Restores a store from persisted JSON.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_created_lazily_with_defaults() {
        let mut store = SettingsStore::new();
        let id = SampleId(1);

        assert!(store.get(id).is_none());
        let settings = store.get_or_default(id);
        assert!((settings.volume() - 1.0).abs() < f32::EPSILON);
        assert!(settings.pan().abs() < f32::EPSILON);
        assert!(!settings.compressor().is_enabled());
        assert!(!settings.reverb().is_enabled());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_settings_round_trip() {
        let mut store = SettingsStore::new();
        let id = SampleId(7);
        let settings = store.get_or_default(id);
        settings.set_volume(1.5);
        settings.set_pan(-0.25);
        settings.set_delay(Stage::Enabled(DelayParams::new(0.4, 0.6, 0.8)));

        let json = store.to_json().expect("serialize");
        let restored = SettingsStore::from_json(&json).expect("deserialize");

        let settings = restored.get(id).expect("settings for id");
        assert!((settings.volume() - 1.5).abs() < f32::EPSILON);
        assert!((settings.pan() + 0.25).abs() < f32::EPSILON);
        let delay = settings.delay().enabled().expect("delay enabled");
        assert!((delay.time_secs() - 0.4).abs() < f32::EPSILON);
    }

    #[test]
    fn test_remove_settings() {
        let mut store = SettingsStore::new();
        let id = SampleId(3);
        store.get_or_default(id);
        store.remove(id);
        assert!(store.get(id).is_none());
    }
}
