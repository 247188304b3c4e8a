//! # tts-session
//!
//! A Rust library that turns a platform speech engine into a playback
//! session: one utterance at a time, long-text narration, voice discovery,
//! and persisted favorites and settings.
//!
//! ## Features
//!
//! - **Speech session**: `Idle → Speaking ⇄ Paused → Idle` state machine with
//!   change notifications
//! - **Long-text narration**: sentence-bounded chunking spoken strictly in order
//! - **Voice registry**: cached voice catalog with language/region filters
//! - **Favorites & settings**: validated stores over any key-value backend
//!
//! ## Quick Start
//!
//! ```toml
//! [dependencies]
//! tts-session = { version = "2026.10", features = ["native"] }
//! ```
//!
//! ```ignore
//! use std::sync::Arc;
//! use tts_session::{engines::native::NativeEngine, store::MemoryStore, TtsService};
//!
//! let engine = Arc::new(NativeEngine::new()?);
//! let service = TtsService::new(engine, Arc::new(MemoryStore::new()), Default::default());
//! service.initialize().await?;
//! service.speak("Hello, world!", None).await?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod chunk;
pub mod engines;
pub mod error;
pub mod options;
pub mod service;
pub mod session;
pub mod store;
pub mod utterance;
pub mod validate;
pub mod voices;

use async_trait::async_trait;

pub use error::{EngineError, ErrorKind, Recovery, TtsError};
pub use options::{ResolvedOptions, SpeechOptions};
pub use service::TtsService;
pub use session::{
    NarrationSummary, PlaybackState, SessionConfig, SessionConfigBuilder, SessionSnapshot,
    SpeechSession,
};
pub use utterance::{UtteranceEvents, UtteranceOutcome};
pub use voices::{Voice, VoiceQuality, VoiceRegistry};

/// Common interface for host speech engines.
///
/// The session is a client of this trait; it never synthesizes audio itself.
/// `speak` only dispatches: it must return promptly and report how the
/// utterance ended through `events`, from any thread, at any later time (or
/// before returning).
#[async_trait]
pub trait SpeechEngine: Send + Sync {
    /// Engine name for log messages.
    fn name(&self) -> &str;

    /// Whether the host has any speech capability at all.
    fn is_available(&self) -> bool;

    /// Start speaking `text`. Completion is reported through `events`.
    fn speak(
        &self,
        text: &str,
        options: &ResolvedOptions,
        events: UtteranceEvents,
    ) -> Result<(), EngineError>;

    /// Stop any ongoing speech.
    fn stop(&self) -> Result<(), EngineError>;

    fn pause(&self) -> Result<(), EngineError>;

    fn resume(&self) -> Result<(), EngineError>;

    /// List the voices installed on the host.
    async fn voices(&self) -> Result<Vec<Voice>, EngineError>;
}
