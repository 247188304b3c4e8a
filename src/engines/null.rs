use async_trait::async_trait;

use crate::{EngineError, ResolvedOptions, SpeechEngine, UtteranceEvents, Voice};

/// Engine for hosts without text-to-speech.
///
/// Sessions built on it fail `initialize` with `NotSupported`, which lets an
/// application keep one code path when speech is unavailable.
#[derive(Debug, Clone, Default)]
pub struct NullEngine;

impl NullEngine {
    pub fn new() -> Self {
        Self
    }
}

fn unsupported() -> EngineError {
    EngineError::Unsupported("no speech engine is available on this host".to_string())
}

#[async_trait]
impl SpeechEngine for NullEngine {
    fn name(&self) -> &str {
        "null"
    }

    fn is_available(&self) -> bool {
        false
    }

    fn speak(
        &self,
        _text: &str,
        _options: &ResolvedOptions,
        _events: UtteranceEvents,
    ) -> Result<(), EngineError> {
        Err(unsupported())
    }

    fn stop(&self) -> Result<(), EngineError> {
        Ok(())
    }

    fn pause(&self) -> Result<(), EngineError> {
        Err(unsupported())
    }

    fn resume(&self) -> Result<(), EngineError> {
        Err(unsupported())
    }

    async fn voices(&self) -> Result<Vec<Voice>, EngineError> {
        Ok(Vec::new())
    }
}
