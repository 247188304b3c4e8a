use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use derive_builder::Builder;
use tokio::sync::{oneshot, watch};

use crate::chunk::{self, DEFAULT_MAX_CHUNK_SIZE};
use crate::options::check_finite;
use crate::validate::{self, MAX_SPEECH_CHARS};
use crate::{
    EngineError, ResolvedOptions, SpeechEngine, SpeechOptions, TtsError, UtteranceEvents,
    UtteranceOutcome, Voice, VoiceRegistry,
};

/// Parameters for configuring a [`SpeechSession`].
///
/// ```
/// use std::time::Duration;
/// use tts_session::SessionConfigBuilder;
///
/// let config = SessionConfigBuilder::default()
///     .max_chunk_size(500)
///     .chunk_pause(Duration::from_millis(100))
///     .build()
///     .unwrap();
/// assert_eq!(config.max_speech_chars, 4000);
/// ```
#[derive(Debug, Clone, Builder)]
#[builder(default)]
pub struct SessionConfig {
    /// Largest chunk, in characters, spoken by `speak_long_text`.
    pub max_chunk_size: usize,
    /// Silence inserted between narrated chunks.
    pub chunk_pause: Duration,
    /// Longest text accepted by a single `speak` call.
    pub max_speech_chars: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_chunk_size: DEFAULT_MAX_CHUNK_SIZE,
            chunk_pause: Duration::from_millis(200),
            max_speech_chars: MAX_SPEECH_CHARS,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PlaybackState {
    #[default]
    Idle,
    Speaking,
    Paused,
}

/// Observable state of a session.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionSnapshot {
    pub state: PlaybackState,
    /// Text of the current utterance, empty when idle.
    pub current_text: String,
    /// Options of the current (or most recent) utterance.
    pub current_options: ResolvedOptions,
}

impl SessionSnapshot {
    /// True while an utterance is active, paused or not.
    pub fn is_speaking(&self) -> bool {
        self.state != PlaybackState::Idle
    }

    pub fn is_paused(&self) -> bool {
        self.state == PlaybackState::Paused
    }

    fn reset(&mut self) -> bool {
        let changed = self.state != PlaybackState::Idle || !self.current_text.is_empty();
        self.state = PlaybackState::Idle;
        self.current_text.clear();
        changed
    }
}

/// Result of one `speak_long_text` run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NarrationSummary {
    pub chunks: usize,
    /// Chunks the engine spoke to the end.
    pub spoken: usize,
    /// Chunks that failed with a non-fatal error and were skipped.
    pub failed: usize,
    /// The narration was stopped or superseded before it finished.
    pub cancelled: bool,
}

enum Completion {
    Finished,
    Stopped,
}

struct SessionInner {
    initialized: bool,
    defaults: ResolvedOptions,
    next_id: u64,
    current: Option<UtteranceEvents>,
    narration: Option<u64>,
}

/// Playback session over a [`SpeechEngine`].
///
/// At most one utterance is active: a new `speak` stops the previous one.
/// `speak` resolves when the utterance ends, so awaiting it sequences speech.
/// Observers follow state changes through [`subscribe`](SpeechSession::subscribe).
pub struct SpeechSession {
    engine: Arc<dyn SpeechEngine>,
    registry: VoiceRegistry,
    config: SessionConfig,
    inner: Mutex<SessionInner>,
    state: watch::Sender<SessionSnapshot>,
}

impl SpeechSession {
    pub fn new(engine: Arc<dyn SpeechEngine>, config: SessionConfig) -> Self {
        let (state, _) = watch::channel(SessionSnapshot::default());
        Self {
            registry: VoiceRegistry::new(engine.clone()),
            engine,
            config,
            inner: Mutex::new(SessionInner {
                initialized: false,
                defaults: ResolvedOptions::default(),
                next_id: 0,
                current: None,
                narration: None,
            }),
            state,
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn voices(&self) -> &VoiceRegistry {
        &self.registry
    }

    /// Check engine support and load the voice catalog. Safe to call repeatedly.
    pub async fn initialize(&self) -> Result<(), TtsError> {
        let initialized = self.lock().initialized;
        if initialized {
            return Ok(());
        }
        if !self.engine.is_available() {
            return Err(TtsError::NotSupported(format!(
                "{} reports no speech capability",
                self.engine.name()
            )));
        }
        self.registry.load_voices().await;
        self.lock().initialized = true;
        log::info!("Speech session initialized on {}", self.engine.name());
        Ok(())
    }

    /// Stop playback and forget cached voices. `initialize` runs again on next use.
    pub async fn dispose(&self) {
        if let Err(err) = self.stop() {
            log::warn!("Engine failed to stop while disposing the session: {err}");
        }
        self.registry.invalidate().await;
        self.lock().initialized = false;
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.state.borrow().clone()
    }

    pub fn state(&self) -> PlaybackState {
        self.state.borrow().state
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.state.subscribe()
    }

    pub fn default_options(&self) -> ResolvedOptions {
        self.lock().defaults.clone()
    }

    /// Speak `text` and wait until the utterance ends.
    ///
    /// Returns `Ok` when the utterance finished or was stopped.
    pub async fn speak(&self, text: &str, options: Option<SpeechOptions>) -> Result<(), TtsError> {
        let text = validate::validate_speech_text(text, self.config.max_speech_chars)?;
        self.initialize().await?;
        self.cancel_narration();
        self.speak_utterance(text, options.as_ref()).await.map(|_| ())
    }

    /// Narrate text of any length as a sequence of sentence-bounded chunks.
    ///
    /// Chunks are spoken one after another with `chunk_pause` in between.
    /// `stop()` or a new `speak` ends the narration at the next chunk boundary.
    /// Chunks that fail are logged and skipped, except when the engine turns
    /// out not to support speech, which aborts the narration.
    pub async fn speak_long_text(
        &self,
        text: &str,
        options: Option<SpeechOptions>,
    ) -> Result<NarrationSummary, TtsError> {
        let text = validate::validate_text(text)?;
        self.initialize().await?;

        let chunks = chunk::chunk_text(text, self.config.max_chunk_size);
        let total = chunks.len();
        let narration = self.begin_narration();
        let mut summary = NarrationSummary {
            chunks: total,
            ..Default::default()
        };

        for (index, chunk) in chunks.iter().enumerate() {
            if index > 0 && !self.config.chunk_pause.is_zero() {
                tokio::time::sleep(self.config.chunk_pause).await;
            }
            if !self.is_narrating(narration) {
                log::info!("Narration stopped before chunk {}/{}", index + 1, total);
                summary.cancelled = true;
                break;
            }
            match self.speak_utterance(chunk, options.as_ref()).await {
                Ok(Completion::Finished) => summary.spoken += 1,
                Ok(Completion::Stopped) => {}
                Err(err) if err.is_fatal() => {
                    self.end_narration(narration);
                    return Err(err);
                }
                Err(err) => {
                    log::warn!("Chunk {}/{} failed, continuing: {err}", index + 1, total);
                    summary.failed += 1;
                }
            }
        }

        if !summary.cancelled && !self.is_narrating(narration) {
            summary.cancelled = true;
        }
        self.end_narration(narration);
        log::info!(
            "Narration finished: {}/{} chunks spoken, {} failed{}",
            summary.spoken,
            total,
            summary.failed,
            if summary.cancelled { ", cancelled" } else { "" }
        );
        Ok(summary)
    }

    /// Stop playback from any state. Idempotent.
    pub fn stop(&self) -> Result<(), TtsError> {
        self.cancel_narration();
        self.halt().map_err(TtsError::from)
    }

    /// Pause the current utterance. No-op unless speaking.
    pub fn pause(&self) -> Result<(), TtsError> {
        if self.state() != PlaybackState::Speaking {
            return Ok(());
        }
        self.engine.pause()?;
        self.transition(PlaybackState::Speaking, PlaybackState::Paused);
        Ok(())
    }

    /// Resume a paused utterance. No-op unless paused.
    pub fn resume(&self) -> Result<(), TtsError> {
        if self.state() != PlaybackState::Paused {
            return Ok(());
        }
        self.engine.resume()?;
        self.transition(PlaybackState::Paused, PlaybackState::Speaking);
        Ok(())
    }

    /// All voices in the catalog.
    pub async fn available_voices(&self) -> Result<Vec<Voice>, TtsError> {
        self.initialize().await?;
        Ok(self.registry.available_voices().await)
    }

    pub async fn refresh_voices(&self) -> Result<Vec<Voice>, TtsError> {
        self.initialize().await?;
        Ok(self.registry.refresh_voices().await)
    }

    /// Update the defaults used when a call doesn't override them.
    ///
    /// Rate and pitch are clamped into range. A voice is only taken when the
    /// catalog knows it, or when the catalog hasn't been loaded yet. Returns
    /// the defaults now in effect.
    pub async fn set_default_options(
        &self,
        options: SpeechOptions,
    ) -> Result<ResolvedOptions, TtsError> {
        check_finite("rate", options.rate)?;
        check_finite("pitch", options.pitch)?;

        let accept_voice = match options.voice_id.as_deref() {
            Some(id) => match self.registry.is_known(id).await {
                Some(false) => {
                    log::warn!("Ignoring unknown default voice '{id}'");
                    false
                }
                _ => true,
            },
            None => false,
        };

        let mut inner = self.lock();
        let mut next = inner.defaults.merged(Some(&options));
        if !accept_voice {
            next.voice_id = inner.defaults.voice_id.clone();
        }
        inner.defaults = next.clone();
        Ok(next)
    }

    /// Go back to the platform default voice.
    pub fn clear_default_voice(&self) {
        self.lock().defaults.voice_id = None;
    }

    async fn speak_utterance(
        &self,
        text: &str,
        options: Option<&SpeechOptions>,
    ) -> Result<Completion, TtsError> {
        let merged = self.lock().defaults.merged(options);
        let mut resolved = self.resolve_voice(merged).await;

        loop {
            // No await between here and dispatch: the previous utterance is
            // stopped in the same step that makes this one current.
            let (events, completion) = self.begin_utterance(text, &resolved);
            let id = events.id();

            if let Err(err) = self.dispatch(text, &mut resolved, &events) {
                self.end_utterance(id);
                return Err(err);
            }

            let outcome = completion.await.unwrap_or_else(|_| {
                UtteranceOutcome::Failed(EngineError::Failed(
                    "engine dropped the utterance without reporting how it ended".to_string(),
                ))
            });
            let was_current = self.end_utterance(id);

            match outcome {
                UtteranceOutcome::Done => return Ok(Completion::Finished),
                UtteranceOutcome::Stopped => return Ok(Completion::Stopped),
                UtteranceOutcome::Failed(EngineError::VoiceUnavailable(voice))
                    if was_current && resolved.voice_id.is_some() =>
                {
                    log::warn!(
                        "{} lost voice '{voice}', retrying with the platform default voice",
                        self.engine.name()
                    );
                    resolved.voice_id = None;
                }
                UtteranceOutcome::Failed(err) => {
                    log::warn!("Utterance {id} failed on {}: {err}", self.engine.name());
                    return Err(err.into());
                }
            }
        }
    }

    async fn resolve_voice(&self, mut options: ResolvedOptions) -> ResolvedOptions {
        if let Some(voice_id) = options.voice_id.as_deref() {
            if self.registry.is_known(voice_id).await == Some(false) {
                log::warn!("Voice '{voice_id}' is unavailable, using the platform default voice");
                options.voice_id = None;
            }
        }
        options
    }

    /// Hand the utterance to the engine. A rejected voice is retried once
    /// without it, and `options` is updated to what was actually used.
    fn dispatch(
        &self,
        text: &str,
        options: &mut ResolvedOptions,
        events: &UtteranceEvents,
    ) -> Result<(), TtsError> {
        match self.engine.speak(text, options, events.clone()) {
            Err(EngineError::VoiceUnavailable(voice)) if options.voice_id.is_some() => {
                log::warn!(
                    "{} rejected voice '{voice}', retrying with the platform default voice",
                    self.engine.name()
                );
                options.voice_id = None;
                self.state.send_modify(|s| s.current_options = options.clone());
                self.engine
                    .speak(text, options, events.clone())
                    .map_err(TtsError::from)
            }
            other => other.map_err(TtsError::from),
        }
    }

    /// Make a new utterance current, stopping the one it replaces.
    fn begin_utterance(
        &self,
        text: &str,
        options: &ResolvedOptions,
    ) -> (UtteranceEvents, oneshot::Receiver<UtteranceOutcome>) {
        let (events, completion, previous) = {
            let mut inner = self.lock();
            inner.next_id += 1;
            let (events, completion) = UtteranceEvents::channel(inner.next_id);
            let previous = inner.current.replace(events.clone());
            self.state.send_modify(|s| {
                s.state = PlaybackState::Speaking;
                s.current_text = text.to_string();
                s.current_options = options.clone();
            });
            (events, completion, previous)
        };

        if let Some(previous) = previous {
            log::debug!("Utterance {} replaces {}", events.id(), previous.id());
            if let Err(err) = self.engine.stop() {
                log::warn!("Engine failed to stop the previous utterance: {err}");
            }
            previous.stopped();
        }
        log::debug!(
            "Utterance {} started ({} chars)",
            events.id(),
            text.chars().count()
        );
        (events, completion)
    }

    /// Return to idle if `id` is still the current utterance.
    fn end_utterance(&self, id: u64) -> bool {
        let mut inner = self.lock();
        if inner.current.as_ref().is_some_and(|events| events.id() == id) {
            inner.current = None;
            self.state.send_if_modified(SessionSnapshot::reset);
            true
        } else {
            false
        }
    }

    /// Force idle, resolve the current utterance as stopped and stop the engine.
    fn halt(&self) -> Result<(), EngineError> {
        let current = {
            let mut inner = self.lock();
            let current = inner.current.take();
            self.state.send_if_modified(SessionSnapshot::reset);
            current
        };
        let result = self.engine.stop();
        if let Some(events) = current {
            events.stopped();
        }
        result
    }

    fn transition(&self, from: PlaybackState, to: PlaybackState) {
        self.state.send_if_modified(|s| {
            if s.state == from {
                s.state = to;
                true
            } else {
                false
            }
        });
    }

    fn begin_narration(&self) -> u64 {
        let mut inner = self.lock();
        inner.next_id += 1;
        inner.narration = Some(inner.next_id);
        inner.next_id
    }

    fn is_narrating(&self, narration: u64) -> bool {
        self.lock().narration == Some(narration)
    }

    fn end_narration(&self, narration: u64) {
        let mut inner = self.lock();
        if inner.narration == Some(narration) {
            inner.narration = None;
        }
    }

    fn cancel_narration(&self) {
        self.lock().narration = None;
    }

    fn lock(&self) -> MutexGuard<'_, SessionInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
