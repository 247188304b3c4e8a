use serde::{Deserialize, Serialize};

use crate::TtsError;

pub const MIN_RATE: f32 = 0.1;
pub const MAX_RATE: f32 = 2.0;
pub const MIN_PITCH: f32 = 0.5;
pub const MAX_PITCH: f32 = 2.0;
pub const DEFAULT_RATE: f32 = 1.0;
pub const DEFAULT_PITCH: f32 = 1.0;

/// Per-call speech overrides. `None` fields fall back to the session defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpeechOptions {
    pub voice_id: Option<String>,
    /// Speaking rate multiplier, 1.0 is normal. Clamped to 0.1–2.0.
    pub rate: Option<f32>,
    /// Pitch multiplier, 1.0 is normal. Clamped to 0.5–2.0.
    pub pitch: Option<f32>,
    /// BCP 47 language tag such as `"en-US"`.
    pub language: Option<String>,
}

impl SpeechOptions {
    pub fn with_voice(mut self, voice_id: impl Into<String>) -> Self {
        self.voice_id = Some(voice_id.into());
        self
    }

    pub fn with_rate(mut self, rate: f32) -> Self {
        self.rate = Some(rate);
        self
    }

    pub fn with_pitch(mut self, pitch: f32) -> Self {
        self.pitch = Some(pitch);
        self
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }
}

/// Fully merged options handed to the engine for one utterance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedOptions {
    /// `None` lets the platform pick its default voice.
    pub voice_id: Option<String>,
    pub rate: f32,
    pub pitch: f32,
    pub language: Option<String>,
}

impl Default for ResolvedOptions {
    fn default() -> Self {
        Self {
            voice_id: None,
            rate: DEFAULT_RATE,
            pitch: DEFAULT_PITCH,
            language: None,
        }
    }
}

impl ResolvedOptions {
    /// Apply per-call overrides over these defaults. Overrides win.
    pub fn merged(&self, overrides: Option<&SpeechOptions>) -> ResolvedOptions {
        let Some(o) = overrides else {
            return self.clone();
        };
        ResolvedOptions {
            voice_id: o.voice_id.clone().or_else(|| self.voice_id.clone()),
            rate: o.rate.map(clamp_rate).unwrap_or(self.rate),
            pitch: o.pitch.map(clamp_pitch).unwrap_or(self.pitch),
            language: o.language.clone().or_else(|| self.language.clone()),
        }
    }
}

/// Clamp a rate into range. Non-finite input yields the default rate.
pub fn clamp_rate(rate: f32) -> f32 {
    if rate.is_finite() {
        rate.clamp(MIN_RATE, MAX_RATE)
    } else {
        DEFAULT_RATE
    }
}

/// Clamp a pitch into range. Non-finite input yields the default pitch.
pub fn clamp_pitch(pitch: f32) -> f32 {
    if pitch.is_finite() {
        pitch.clamp(MIN_PITCH, MAX_PITCH)
    } else {
        DEFAULT_PITCH
    }
}

/// Reject NaN and infinities before they reach stored defaults.
pub(crate) fn check_finite(name: &str, value: Option<f32>) -> Result<(), TtsError> {
    match value {
        Some(v) if !v.is_finite() => Err(TtsError::Validation(format!(
            "{name} must be a finite number, got {v}"
        ))),
        _ => Ok(()),
    }
}
