use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::SpeechEngine;

/// Synthesis quality tier reported by the platform.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoiceQuality {
    #[default]
    Default,
    Enhanced,
}

/// A voice exposed by the host speech engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Voice {
    pub id: String,
    pub name: String,
    /// Language tag, e.g. `"en-US"`.
    pub language: String,
    #[serde(default)]
    pub quality: VoiceQuality,
}

impl Voice {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        language: impl Into<String>,
        quality: VoiceQuality,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            language: language.into(),
            quality,
        }
    }

    /// Primary language subtag: `"en"` for `"en-US"`.
    pub fn language_code(&self) -> &str {
        split_tag(&self.language).0
    }

    /// Region subtag: `Some("US")` for `"en-US"`, `None` for `"en"`.
    pub fn region(&self) -> Option<&str> {
        split_tag(&self.language).1
    }
}

fn split_tag(tag: &str) -> (&str, Option<&str>) {
    match tag.split_once(['-', '_']) {
        Some((lang, rest)) => {
            let region = rest.split(['-', '_']).next().filter(|r| !r.is_empty());
            (lang, region)
        }
        None => (tag, None),
    }
}

/// Cached catalog of the voices available on the engine.
///
/// The catalog is queried once and kept until [`refresh_voices`] or
/// [`invalidate`]. A failed query is cached as an empty list so callers
/// don't keep retrying; speech then uses the platform default voice.
///
/// [`refresh_voices`]: VoiceRegistry::refresh_voices
/// [`invalidate`]: VoiceRegistry::invalidate
pub struct VoiceRegistry {
    engine: Arc<dyn SpeechEngine>,
    voices: Mutex<Option<Vec<Voice>>>,
}

impl VoiceRegistry {
    pub fn new(engine: Arc<dyn SpeechEngine>) -> Self {
        Self {
            engine,
            voices: Mutex::new(None),
        }
    }

    /// Query the engine unless the catalog is already cached.
    pub async fn load_voices(&self) {
        let mut voices = self.voices.lock().await;
        if voices.is_none() {
            *voices = Some(self.query().await);
        }
    }

    pub async fn is_loaded(&self) -> bool {
        self.voices.lock().await.is_some()
    }

    /// All cached voices, loading them first if needed.
    pub async fn available_voices(&self) -> Vec<Voice> {
        let mut voices = self.voices.lock().await;
        if voices.is_none() {
            *voices = Some(self.query().await);
        }
        voices.clone().unwrap_or_default()
    }

    /// Drop the cache and query the engine again.
    pub async fn refresh_voices(&self) -> Vec<Voice> {
        let mut voices = self.voices.lock().await;
        let fresh = self.query().await;
        *voices = Some(fresh.clone());
        fresh
    }

    pub async fn invalidate(&self) {
        *self.voices.lock().await = None;
    }

    pub async fn find(&self, id: &str) -> Option<Voice> {
        self.voices
            .lock()
            .await
            .as_ref()
            .and_then(|voices| voices.iter().find(|v| v.id == id).cloned())
    }

    /// `None` while the catalog has not been loaded.
    pub async fn is_known(&self, id: &str) -> Option<bool> {
        self.voices
            .lock()
            .await
            .as_ref()
            .map(|voices| voices.iter().any(|v| v.id == id))
    }

    /// Cached voices whose primary language matches `code` (case-insensitive).
    pub async fn voices_for_language(&self, code: &str) -> Vec<Voice> {
        self.filtered(|v| v.language_code().eq_ignore_ascii_case(code))
            .await
    }

    /// Cached voices whose region matches `region` (case-insensitive).
    pub async fn voices_for_region(&self, region: &str) -> Vec<Voice> {
        self.filtered(|v| v.region().is_some_and(|r| r.eq_ignore_ascii_case(region)))
            .await
    }

    async fn filtered(&self, keep: impl Fn(&Voice) -> bool) -> Vec<Voice> {
        self.voices
            .lock()
            .await
            .as_deref()
            .unwrap_or_default()
            .iter()
            .filter(|v| keep(v))
            .cloned()
            .collect()
    }

    async fn query(&self) -> Vec<Voice> {
        match self.engine.voices().await {
            Ok(mut voices) => {
                voices.sort_by(|a, b| a.language.cmp(&b.language).then(a.name.cmp(&b.name)));
                log::info!("Loaded {} voices from {}", voices.len(), self.engine.name());
                voices
            }
            Err(err) => {
                log::warn!(
                    "Could not list voices from {}: {err}; using the platform default voice",
                    self.engine.name()
                );
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Voice, VoiceQuality, VoiceRegistry};
    use crate::{EngineError, ResolvedOptions, SpeechEngine, UtteranceEvents};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct CatalogEngine {
        catalog: Result<Vec<Voice>, EngineError>,
        queries: AtomicUsize,
    }

    impl CatalogEngine {
        fn new(catalog: Result<Vec<Voice>, EngineError>) -> Arc<Self> {
            Arc::new(Self {
                catalog,
                queries: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl SpeechEngine for CatalogEngine {
        fn name(&self) -> &str {
            "catalog"
        }

        fn is_available(&self) -> bool {
            true
        }

        fn speak(
            &self,
            _text: &str,
            _options: &ResolvedOptions,
            events: UtteranceEvents,
        ) -> Result<(), EngineError> {
            events.done();
            Ok(())
        }

        fn stop(&self) -> Result<(), EngineError> {
            Ok(())
        }

        fn pause(&self) -> Result<(), EngineError> {
            Ok(())
        }

        fn resume(&self) -> Result<(), EngineError> {
            Ok(())
        }

        async fn voices(&self) -> Result<Vec<Voice>, EngineError> {
            self.queries.fetch_add(1, Ordering::SeqCst);
            self.catalog.clone()
        }
    }

    fn catalog() -> Vec<Voice> {
        vec![
            Voice::new("samantha", "Samantha", "en-US", VoiceQuality::Enhanced),
            Voice::new("daniel", "Daniel", "en-GB", VoiceQuality::Default),
            Voice::new("amelie", "Amélie", "fr_CA", VoiceQuality::Default),
            Voice::new("generic", "Generic", "de", VoiceQuality::Default),
        ]
    }

    #[test]
    fn derives_language_and_region_from_tag() {
        let voices = catalog();
        assert_eq!(voices[0].language_code(), "en");
        assert_eq!(voices[0].region(), Some("US"));
        assert_eq!(voices[2].language_code(), "fr");
        assert_eq!(voices[2].region(), Some("CA"));
        assert_eq!(voices[3].region(), None);
    }

    #[tokio::test]
    async fn queries_the_engine_once_until_refreshed() {
        let engine = CatalogEngine::new(Ok(catalog()));
        let registry = VoiceRegistry::new(engine.clone());

        assert_eq!(registry.is_known("samantha").await, None);
        registry.load_voices().await;
        registry.load_voices().await;
        assert_eq!(registry.available_voices().await.len(), 4);
        assert_eq!(engine.queries.load(Ordering::SeqCst), 1);

        registry.refresh_voices().await;
        assert_eq!(engine.queries.load(Ordering::SeqCst), 2);
        assert_eq!(registry.is_known("samantha").await, Some(true));
        assert_eq!(registry.is_known("nobody").await, Some(false));
    }

    #[tokio::test]
    async fn failed_query_caches_an_empty_catalog() {
        let engine = CatalogEngine::new(Err(EngineError::Failed("no catalog".into())));
        let registry = VoiceRegistry::new(engine.clone());

        assert!(registry.available_voices().await.is_empty());
        assert!(registry.is_loaded().await);
        registry.load_voices().await;
        assert_eq!(engine.queries.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn filters_by_language_and_region() {
        let registry = VoiceRegistry::new(CatalogEngine::new(Ok(catalog())));
        registry.load_voices().await;

        let english: Vec<_> = registry
            .voices_for_language("EN")
            .await
            .into_iter()
            .map(|v| v.id)
            .collect();
        assert_eq!(english, vec!["daniel", "samantha"]);

        let canada = registry.voices_for_region("ca").await;
        assert_eq!(canada.len(), 1);
        assert_eq!(canada[0].id, "amelie");
        assert_eq!(registry.find("generic").await.map(|v| v.language), Some("de".into()));
    }

    #[tokio::test]
    async fn invalidate_forgets_the_catalog() {
        let registry = VoiceRegistry::new(CatalogEngine::new(Ok(catalog())));
        registry.load_voices().await;
        registry.invalidate().await;
        assert!(!registry.is_loaded().await);
    }
}
