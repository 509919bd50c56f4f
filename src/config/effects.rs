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

//! Per-sample effect settings. Each stage is a tagged variant rather than
//! a boolean + parameter struct: a disabled stage carries no parameters,
//! so the chain builder cannot wire it in at all.

use serde::{Deserialize, Serialize};

/// Default compressor threshold in dBFS.
pub const DEFAULT_COMPRESSOR_THRESHOLD_DB: f32 = -24.0;
/// Default compressor ratio.
pub const DEFAULT_COMPRESSOR_RATIO: f32 = 12.0;
/// Default compressor attack in seconds.
pub const DEFAULT_COMPRESSOR_ATTACK_SECS: f32 = 0.003;
/// Default compressor release in seconds.
pub const DEFAULT_COMPRESSOR_RELEASE_SECS: f32 = 0.25;
/// Default delay time in seconds.
pub const DEFAULT_DELAY_TIME_SECS: f32 = 0.3;
/// Default delay feedback.
pub const DEFAULT_DELAY_FEEDBACK: f32 = 0.35;
/// Default delay wet mix.
pub const DEFAULT_DELAY_WET: f32 = 0.5;
/// Default reverb decay in seconds.
pub const DEFAULT_REVERB_DECAY_SECS: f32 = 1.5;
/// Default reverb wet mix.
pub const DEFAULT_REVERB_WET: f32 = 0.4;

/// One effect stage: either absent from the chain or present with its
/// parameters. `Disabled` means elided, not unity-gain.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub enum Stage<T> {
    #[default]
    Disabled,
    Enabled(T),
}

impl<T> Stage<T> {
    pub fn is_enabled(&self) -> bool {
        matches!(self, Stage::Enabled(_))
    }

    pub fn enabled(&self) -> Option<&T> {
        match self {
            Stage::Enabled(params) => Some(params),
            Stage::Disabled => None,
        }
    }
}

/// Dynamics compressor parameters. No knee or makeup gain is exposed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CompressorParams {
    threshold_db: f32,
    ratio: f32,
    attack_secs: f32,
    release_secs: f32,
}

impl CompressorParams {
    /// Out-of-range values are clamped, never rejected.
    pub fn new(threshold_db: f32, ratio: f32, attack_secs: f32, release_secs: f32) -> Self {
        Self {
            threshold_db: threshold_db.clamp(-60.0, 0.0),
            ratio: ratio.clamp(1.0, 20.0),
            attack_secs: attack_secs.max(0.0),
            release_secs: release_secs.max(0.0),
        }
    }

    pub fn threshold_db(&self) -> f32 {
        self.threshold_db.clamp(-60.0, 0.0)
    }

    pub fn ratio(&self) -> f32 {
        self.ratio.clamp(1.0, 20.0)
    }

    pub fn attack_secs(&self) -> f32 {
        self.attack_secs.max(0.0)
    }

    pub fn release_secs(&self) -> f32 {
        self.release_secs.max(0.0)
    }
}

impl Default for CompressorParams {
    fn default() -> Self {
        Self::new(
            DEFAULT_COMPRESSOR_THRESHOLD_DB,
            DEFAULT_COMPRESSOR_RATIO,
            DEFAULT_COMPRESSOR_ATTACK_SECS,
            DEFAULT_COMPRESSOR_RELEASE_SECS,
        )
    }
}

/// Three-band EQ gains in dB at the fixed 320/1000/3200 Hz corners.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct EqParams {
    low_db: f32,
    mid_db: f32,
    high_db: f32,
}

impl EqParams {
    pub fn new(low_db: f32, mid_db: f32, high_db: f32) -> Self {
        Self {
            low_db: low_db.clamp(-12.0, 12.0),
            mid_db: mid_db.clamp(-12.0, 12.0),
            high_db: high_db.clamp(-12.0, 12.0),
        }
    }

    pub fn low_db(&self) -> f32 {
        self.low_db.clamp(-12.0, 12.0)
    }

    pub fn mid_db(&self) -> f32 {
        self.mid_db.clamp(-12.0, 12.0)
    }

    pub fn high_db(&self) -> f32 {
        self.high_db.clamp(-12.0, 12.0)
    }
}

/// Feedback delay parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DelayParams {
    time_secs: f32,
    feedback: f32,
    wet: f32,
}

impl DelayParams {
    pub fn new(time_secs: f32, feedback: f32, wet: f32) -> Self {
        Self {
            time_secs: time_secs.clamp(0.01, 2.0),
            feedback: feedback.clamp(0.0, 0.9),
            wet: wet.clamp(0.0, 1.0),
        }
    }

    pub fn time_secs(&self) -> f32 {
        self.time_secs.clamp(0.01, 2.0)
    }

    pub fn feedback(&self) -> f32 {
        self.feedback.clamp(0.0, 0.9)
    }

    pub fn wet(&self) -> f32 {
        self.wet.clamp(0.0, 1.0)
    }
}

impl Default for DelayParams {
    fn default() -> Self {
        Self::new(DEFAULT_DELAY_TIME_SECS, DEFAULT_DELAY_FEEDBACK, DEFAULT_DELAY_WET)
    }
}

/// Convolution reverb parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReverbParams {
    decay_secs: f32,
    wet: f32,
}

impl ReverbParams {
    pub fn new(decay_secs: f32, wet: f32) -> Self {
        Self {
            decay_secs: decay_secs.clamp(0.1, 5.0),
            wet: wet.clamp(0.0, 1.0),
        }
    }

    pub fn decay_secs(&self) -> f32 {
        self.decay_secs.clamp(0.1, 5.0)
    }

    pub fn wet(&self) -> f32 {
        self.wet.clamp(0.0, 1.0)
    }
}

impl Default for ReverbParams {
    fn default() -> Self {
        Self::new(DEFAULT_REVERB_DECAY_SECS, DEFAULT_REVERB_WET)
    }
}

/// The full per-sample settings record. Volume and pan always apply;
/// the four processing stages are individually toggleable.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EffectSettings {
    #[serde(default = "default_volume")]
    volume: f32,
    #[serde(default)]
    pan: f32,
    #[serde(default)]
    compressor: Stage<CompressorParams>,
    #[serde(default)]
    eq: Stage<EqParams>,
    #[serde(default)]
    delay: Stage<DelayParams>,
    #[serde(default)]
    reverb: Stage<ReverbParams>,
}

fn default_volume() -> f32 {
    1.0
}

impl Default for EffectSettings {
    fn default() -> Self {
        Self {
            volume: default_volume(),
            pan: 0.0,
            compressor: Stage::Disabled,
            eq: Stage::Disabled,
            delay: Stage::Disabled,
            reverb: Stage::Disabled,
        }
    }
}

impl EffectSettings {
    pub fn volume(&self) -> f32 {
        self.volume.clamp(0.0, 2.0)
    }

    /// Sets the final gain. Clamped to [0, 2].
    pub fn set_volume(&mut self, volume: f32) {
        self.volume = volume.clamp(0.0, 2.0);
    }

    pub fn pan(&self) -> f32 {
        self.pan.clamp(-1.0, 1.0)
    }

    /// Sets the stereo position. Clamped to [-1, 1].
    pub fn set_pan(&mut self, pan: f32) {
        self.pan = pan.clamp(-1.0, 1.0);
    }

    pub fn compressor(&self) -> &Stage<CompressorParams> {
        &self.compressor
    }

    pub fn set_compressor(&mut self, stage: Stage<CompressorParams>) {
        self.compressor = stage;
    }

    pub fn eq(&self) -> &Stage<EqParams> {
        &self.eq
    }

    pub fn set_eq(&mut self, stage: Stage<EqParams>) {
        self.eq = stage;
    }

    pub fn delay(&self) -> &Stage<DelayParams> {
        &self.delay
    }

    pub fn set_delay(&mut self, stage: Stage<DelayParams>) {
        self.delay = stage;
    }

    pub fn reverb(&self) -> &Stage<ReverbParams> {
        &self.reverb
    }

    pub fn set_reverb(&mut self, stage: Stage<ReverbParams>) {
        self.reverb = stage;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_out_of_range_parameters_clamp() {
        let comp = CompressorParams::new(-90.0, 50.0, -1.0, -1.0);
        assert!((comp.threshold_db() + 60.0).abs() < f32::EPSILON);
        assert!((comp.ratio() - 20.0).abs() < f32::EPSILON);
        assert_eq!(comp.attack_secs(), 0.0);

        let delay = DelayParams::new(5.0, 1.5, -0.2);
        assert!((delay.time_secs() - 2.0).abs() < f32::EPSILON);
        assert!((delay.feedback() - 0.9).abs() < f32::EPSILON);
        assert_eq!(delay.wet(), 0.0);

        let mut settings = EffectSettings::default();
        settings.set_volume(3.0);
        settings.set_pan(-2.0);
        assert!((settings.volume() - 2.0).abs() < f32::EPSILON);
        assert!((settings.pan() + 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_disabled_stage_carries_no_parameters() {
        let settings = EffectSettings::default();
        assert!(settings.compressor().enabled().is_none());
        assert!(settings.eq().enabled().is_none());
        assert!(settings.delay().enabled().is_none());
        assert!(settings.reverb().enabled().is_none());
    }

    #[test]
    fn test_stage_serde_shape_round_trips() {
        let mut settings = EffectSettings::default();
        settings.set_eq(Stage::Enabled(EqParams::new(6.0, 0.0, -6.0)));

        let json = serde_json::to_string(&settings).expect("serialize");
        let restored: EffectSettings = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(settings, restored);
        assert!(restored.eq().is_enabled());
        assert!(!restored.delay().is_enabled());
    }
}
