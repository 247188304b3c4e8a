use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::store::{FavoritesStore, KeyValueStore, SettingsPatch, SettingsStore, TtsSettings};
use crate::{
    ErrorKind, NarrationSummary, SessionConfig, SpeechEngine, SpeechOptions, SpeechSession,
    TtsError,
};

/// Speech session plus the favorites and settings stores, wired together.
///
/// Settings seed the session defaults on [`initialize`](TtsService::initialize)
/// and again after every [`save_settings`](TtsService::save_settings).
/// `speak` initializes first, so stored settings apply from the first call.
pub struct TtsService {
    session: SpeechSession,
    favorites: FavoritesStore,
    settings: SettingsStore,
    /// Stored settings have been applied to the session.
    ready: AtomicBool,
}

impl TtsService {
    pub fn new(
        engine: Arc<dyn SpeechEngine>,
        store: Arc<dyn KeyValueStore>,
        config: SessionConfig,
    ) -> Self {
        Self {
            session: SpeechSession::new(engine, config),
            favorites: FavoritesStore::new(store.clone()),
            settings: SettingsStore::new(store),
            ready: AtomicBool::new(false),
        }
    }

    pub fn session(&self) -> &SpeechSession {
        &self.session
    }

    pub fn favorites(&self) -> &FavoritesStore {
        &self.favorites
    }

    pub fn settings(&self) -> &SettingsStore {
        &self.settings
    }

    /// Initialize the session and apply the stored settings. Runs once until
    /// [`dispose`](TtsService::dispose).
    pub async fn initialize(&self) -> Result<(), TtsError> {
        if self.ready.load(Ordering::Acquire) {
            return Ok(());
        }
        self.session.initialize().await?;
        let settings = self.settings.get().await?;
        self.apply_settings(&settings).await?;
        self.ready.store(true, Ordering::Release);
        Ok(())
    }

    pub async fn dispose(&self) {
        self.session.dispose().await;
        self.ready.store(false, Ordering::Release);
    }

    /// Speak `text`, saving it to favorites first when auto-save is on.
    ///
    /// Texts that are too long for one utterance are narrated in chunks.
    pub async fn speak(
        &self,
        text: &str,
        options: Option<SpeechOptions>,
    ) -> Result<Option<NarrationSummary>, TtsError> {
        self.initialize().await?;
        if self.settings.get().await?.auto_save {
            self.auto_save(text).await;
        }
        if crate::validate::needs_chunking(text.trim()) {
            let summary = self.session.speak_long_text(text, options).await?;
            return Ok(Some(summary));
        }
        self.session.speak(text, options).await?;
        Ok(None)
    }

    pub async fn save_settings(&self, patch: SettingsPatch) -> Result<TtsSettings, TtsError> {
        let settings = self.settings.save(patch).await?;
        self.apply_settings(&settings).await?;
        Ok(settings)
    }

    async fn apply_settings(&self, settings: &TtsSettings) -> Result<(), TtsError> {
        if settings.default_voice_id.is_none() {
            self.session.clear_default_voice();
        }
        let defaults = self
            .session
            .set_default_options(settings.speech_options())
            .await?;
        log::debug!("Session defaults now {defaults:?}");
        Ok(())
    }

    async fn auto_save(&self, text: &str) {
        match self.favorites.save(text, None).await {
            Ok(favorite) => log::debug!("Auto-saved favorite {}", favorite.id),
            Err(err) if matches!(err.kind(), ErrorKind::Duplicate | ErrorKind::Validation) => {
                log::debug!("Not auto-saving spoken text: {err}");
            }
            Err(err) => log::warn!("Could not auto-save spoken text: {err}"),
        }
    }
}
