use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::{KeyValueStore, StoreError};
use crate::options::{check_finite, clamp_pitch, clamp_rate, DEFAULT_PITCH, DEFAULT_RATE};
use crate::{SpeechOptions, TtsError};

pub const SETTINGS_KEY: &str = "tts_settings";

/// Persisted speech preferences.
///
/// Fields missing from stored JSON fall back to their defaults one by one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TtsSettings {
    pub default_voice_id: Option<String>,
    pub default_rate: f32,
    pub default_pitch: f32,
    /// Save spoken text to favorites automatically.
    pub auto_save: bool,
}

impl Default for TtsSettings {
    fn default() -> Self {
        Self {
            default_voice_id: None,
            default_rate: DEFAULT_RATE,
            default_pitch: DEFAULT_PITCH,
            auto_save: false,
        }
    }
}

impl TtsSettings {
    /// Session defaults described by these settings.
    pub fn speech_options(&self) -> SpeechOptions {
        SpeechOptions {
            voice_id: self.default_voice_id.clone(),
            rate: Some(self.default_rate),
            pitch: Some(self.default_pitch),
            language: None,
        }
    }
}

/// Partial update for [`SettingsStore::save`]. `None` keeps the stored value.
#[derive(Debug, Clone, Default)]
pub struct SettingsPatch {
    /// `Some(None)` clears the default voice.
    pub default_voice_id: Option<Option<String>>,
    pub default_rate: Option<f32>,
    pub default_pitch: Option<f32>,
    pub auto_save: Option<bool>,
}

impl SettingsPatch {
    fn apply(self, settings: &mut TtsSettings) {
        if let Some(voice) = self.default_voice_id {
            settings.default_voice_id = voice;
        }
        if let Some(rate) = self.default_rate {
            settings.default_rate = clamp_rate(rate);
        }
        if let Some(pitch) = self.default_pitch {
            settings.default_pitch = clamp_pitch(pitch);
        }
        if let Some(auto_save) = self.auto_save {
            settings.auto_save = auto_save;
        }
    }
}

pub struct SettingsStore {
    store: Arc<dyn KeyValueStore>,
}

impl SettingsStore {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Stored settings merged over the defaults.
    ///
    /// Unreadable stored JSON is logged and replaced by the defaults.
    pub async fn get(&self) -> Result<TtsSettings, TtsError> {
        let Some(raw) = self.store.get(SETTINGS_KEY).await? else {
            return Ok(TtsSettings::default());
        };
        match serde_json::from_str::<TtsSettings>(&raw) {
            Ok(mut settings) => {
                settings.default_rate = clamp_rate(settings.default_rate);
                settings.default_pitch = clamp_pitch(settings.default_pitch);
                Ok(settings)
            }
            Err(err) => {
                log::warn!("Stored settings are unreadable, using defaults: {err}");
                Ok(TtsSettings::default())
            }
        }
    }

    /// Merge `patch` into the stored settings and return the result.
    pub async fn save(&self, patch: SettingsPatch) -> Result<TtsSettings, TtsError> {
        check_finite("default rate", patch.default_rate)?;
        check_finite("default pitch", patch.default_pitch)?;

        let mut settings = self.get().await?;
        patch.apply(&mut settings);
        let json = serde_json::to_string(&settings).map_err(StoreError::from)?;
        self.store.set(SETTINGS_KEY, json).await?;
        Ok(settings)
    }

    /// Forget stored settings; `get` returns the defaults afterwards.
    pub async fn reset(&self) -> Result<(), TtsError> {
        self.store.remove(SETTINGS_KEY).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{SettingsPatch, SettingsStore, TtsSettings, SETTINGS_KEY};
    use crate::store::{KeyValueStore, MemoryStore};
    use crate::ErrorKind;
    use std::sync::Arc;

    fn store() -> (SettingsStore, Arc<MemoryStore>) {
        let backend = Arc::new(MemoryStore::new());
        (SettingsStore::new(backend.clone()), backend)
    }

    #[tokio::test]
    async fn first_access_returns_defaults() {
        let (settings, _) = store();
        let s = settings.get().await.expect("get");
        assert_eq!(s, TtsSettings::default());
        assert_eq!(s.default_rate, 1.0);
        assert_eq!(s.default_pitch, 1.0);
        assert!(!s.auto_save);
        assert_eq!(s.default_voice_id, None);
    }

    #[tokio::test]
    async fn partial_save_keeps_other_fields() {
        let (settings, _) = store();
        settings
            .save(SettingsPatch {
                default_voice_id: Some(Some("samantha".into())),
                auto_save: Some(true),
                ..Default::default()
            })
            .await
            .expect("save");

        settings
            .save(SettingsPatch {
                default_rate: Some(1.5),
                ..Default::default()
            })
            .await
            .expect("save");

        let s = settings.get().await.expect("get");
        assert_eq!(s.default_rate, 1.5);
        assert_eq!(s.default_pitch, 1.0);
        assert_eq!(s.default_voice_id.as_deref(), Some("samantha"));
        assert!(s.auto_save);
    }

    #[tokio::test]
    async fn missing_fields_fall_back_individually() {
        let (settings, backend) = store();
        backend
            .set(SETTINGS_KEY, r#"{"defaultPitch":1.4}"#.into())
            .await
            .expect("set");
        let s = settings.get().await.expect("get");
        assert_eq!(s.default_pitch, 1.4);
        assert_eq!(s.default_rate, 1.0);
        assert!(!s.auto_save);
    }

    #[tokio::test]
    async fn unreadable_settings_yield_defaults() {
        let (settings, backend) = store();
        backend.set(SETTINGS_KEY, "nope".into()).await.expect("set");
        assert_eq!(settings.get().await.expect("get"), TtsSettings::default());
    }

    #[tokio::test]
    async fn clamps_and_validates_rate_and_pitch() {
        let (settings, _) = store();
        let s = settings
            .save(SettingsPatch {
                default_rate: Some(9.0),
                default_pitch: Some(0.0),
                ..Default::default()
            })
            .await
            .expect("save");
        assert_eq!(s.default_rate, 2.0);
        assert_eq!(s.default_pitch, 0.5);

        let err = settings
            .save(SettingsPatch {
                default_rate: Some(f32::NAN),
                ..Default::default()
            })
            .await
            .expect_err("nan");
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[tokio::test]
    async fn clearing_the_voice_and_resetting() {
        let (settings, _) = store();
        settings
            .save(SettingsPatch {
                default_voice_id: Some(Some("v".into())),
                ..Default::default()
            })
            .await
            .expect("save");
        let s = settings
            .save(SettingsPatch {
                default_voice_id: Some(None),
                ..Default::default()
            })
            .await
            .expect("save");
        assert_eq!(s.default_voice_id, None);

        settings
            .save(SettingsPatch {
                auto_save: Some(true),
                ..Default::default()
            })
            .await
            .expect("save");
        settings.reset().await.expect("reset");
        assert_eq!(settings.get().await.expect("get"), TtsSettings::default());
    }
}
