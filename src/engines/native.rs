//! Host platform speech engine built on the [`tts`] crate.
//!
//! # System Requirements
//!
//! - **Linux**: Speech Dispatcher (`sudo apt-get install speech-dispatcher`)
//! - **macOS / iOS**: AVFoundation, no setup needed
//! - **Windows**: WinRT / SAPI, no setup needed
//!
//! # Rate and pitch
//!
//! Session rates (0.1–2.0) and pitches (0.5–2.0) use 1.0 as normal. They are
//! mapped piecewise-linearly onto the platform range so that 1.0 lands on the
//! platform's normal value and the bounds land on its min and max.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tts::{Tts, UtteranceId};

use crate::options::{MAX_PITCH, MAX_RATE, MIN_PITCH, MIN_RATE};
use crate::{EngineError, ResolvedOptions, SpeechEngine, UtteranceEvents, Voice, VoiceQuality};

/// Polling interval for backends without utterance callbacks.
const SPEAKING_POLL: Duration = Duration::from_millis(100);

/// Early completions remembered for utterances not yet registered.
const EARLY_CAPACITY: usize = 16;

type Pending = Arc<Mutex<Completions<UtteranceId>>>;

/// How a backend reported that an utterance ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Ending {
    Done,
    Stopped,
}

impl Ending {
    fn signal(self, events: &UtteranceEvents) {
        match self {
            Ending::Done => events.done(),
            Ending::Stopped => events.stopped(),
        };
    }
}

/// Matches backend callbacks to the utterances waiting on them.
///
/// A callback may fire on the backend's thread before `speak` has recorded
/// the utterance id. Such endings are kept until the id is registered.
struct Completions<K> {
    waiting: Vec<(K, UtteranceEvents)>,
    early: VecDeque<(K, Ending)>,
}

impl<K> Default for Completions<K> {
    fn default() -> Self {
        Self {
            waiting: Vec::new(),
            early: VecDeque::new(),
        }
    }
}

impl<K: PartialEq> Completions<K> {
    fn register(&mut self, id: K, events: UtteranceEvents) {
        match self.early.iter().position(|(early, _)| *early == id) {
            Some(pos) => {
                if let Some((_, ending)) = self.early.remove(pos) {
                    ending.signal(&events);
                }
            }
            None => self.waiting.push((id, events)),
        }
    }

    fn resolve(&mut self, id: K, ending: Ending) {
        match self.waiting.iter().position(|(waiting, _)| *waiting == id) {
            Some(pos) => {
                let (_, events) = self.waiting.remove(pos);
                ending.signal(&events);
            }
            None => {
                if self.early.len() == EARLY_CAPACITY {
                    self.early.pop_front();
                }
                self.early.push_back((id, ending));
            }
        }
    }

    fn stop_all(&mut self) {
        for (_, events) in self.waiting.drain(..) {
            events.stopped();
        }
        self.early.clear();
    }
}

/// Text-to-speech through the operating system's synthesizer.
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use tts_session::{engines::native::NativeEngine, SessionConfig, SpeechSession};
///
/// # async fn run() -> Result<(), Box<dyn std::error::Error>> {
/// let session = SpeechSession::new(Arc::new(NativeEngine::new()?), SessionConfig::default());
/// session.speak("Hello from the system voice.", None).await?;
/// # Ok(())
/// # }
/// ```
pub struct NativeEngine {
    tts: Mutex<Tts>,
    pending: Pending,
    callbacks: bool,
    polls_speaking: bool,
    rate: bool,
    pitch: bool,
    voice: bool,
}

impl NativeEngine {
    /// Connect to the platform synthesizer.
    pub fn new() -> Result<Self, EngineError> {
        let tts = Tts::default().map_err(|e| EngineError::Unsupported(e.to_string()))?;
        let features = tts.supported_features();
        let pending: Pending = Arc::default();

        if features.utterance_callbacks {
            let done = pending.clone();
            tts.on_utterance_end(Some(Box::new(move |utterance| {
                resolve(&done, utterance, Ending::Done);
            })))
            .map_err(failed)?;

            let stopped = pending.clone();
            tts.on_utterance_stop(Some(Box::new(move |utterance| {
                resolve(&stopped, utterance, Ending::Stopped);
            })))
            .map_err(failed)?;
        }

        log::info!(
            "Native speech engine ready (callbacks={}, rate={}, pitch={}, voices={})",
            features.utterance_callbacks,
            features.rate,
            features.pitch,
            features.voice
        );

        Ok(Self {
            tts: Mutex::new(tts),
            pending,
            callbacks: features.utterance_callbacks,
            polls_speaking: features.is_speaking,
            rate: features.rate,
            pitch: features.pitch,
            voice: features.voice,
        })
    }

    fn tts(&self) -> MutexGuard<'_, Tts> {
        self.tts.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn apply_options(&self, tts: &mut Tts, options: &ResolvedOptions) -> Result<(), EngineError> {
        if self.rate {
            let rate = to_platform(
                options.rate,
                (MIN_RATE, MAX_RATE),
                (tts.min_rate(), tts.normal_rate(), tts.max_rate()),
            );
            tts.set_rate(rate).map_err(failed)?;
        }
        if self.pitch {
            let pitch = to_platform(
                options.pitch,
                (MIN_PITCH, MAX_PITCH),
                (tts.min_pitch(), tts.normal_pitch(), tts.max_pitch()),
            );
            tts.set_pitch(pitch).map_err(failed)?;
        }
        if !self.voice {
            return Ok(());
        }

        let wanted = match (&options.voice_id, &options.language) {
            (None, None) => return Ok(()),
            (Some(id), _) => {
                let voices = tts.voices().map_err(failed)?;
                let voice = voices
                    .into_iter()
                    .find(|v| v.id() == *id)
                    .ok_or_else(|| EngineError::VoiceUnavailable(id.clone()))?;
                Some(voice)
            }
            (None, Some(language)) => {
                let voices = tts.voices().map_err(failed)?;
                voices.into_iter().find(|v| {
                    v.language()
                        .to_string()
                        .to_ascii_lowercase()
                        .starts_with(&language.to_ascii_lowercase())
                })
            }
        };
        if let Some(voice) = wanted {
            tts.set_voice(&voice).map_err(failed)?;
        }
        Ok(())
    }

    /// Complete `events` once the backend goes silent.
    fn watch_until_silent(&self, tts: &Tts, events: UtteranceEvents) {
        let handle = match tokio::runtime::Handle::try_current() {
            Ok(handle) if self.polls_speaking => handle,
            _ => {
                events.done();
                return;
            }
        };
        let tts = tts.clone();
        handle.spawn(async move {
            loop {
                tokio::time::sleep(SPEAKING_POLL).await;
                if events.is_finished() {
                    break;
                }
                match tts.is_speaking() {
                    Ok(true) => continue,
                    Ok(false) => {
                        events.done();
                        break;
                    }
                    Err(e) => {
                        events.failed(failed(e));
                        break;
                    }
                }
            }
        });
    }

    fn pending(&self) -> MutexGuard<'_, Completions<UtteranceId>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for NativeEngine {
    fn drop(&mut self) {
        if self.callbacks {
            let tts = self.tts();
            let _ = tts.on_utterance_end(None);
            let _ = tts.on_utterance_stop(None);
        }
    }
}

#[async_trait]
impl SpeechEngine for NativeEngine {
    fn name(&self) -> &str {
        "native"
    }

    fn is_available(&self) -> bool {
        true
    }

    fn speak(
        &self,
        text: &str,
        options: &ResolvedOptions,
        events: UtteranceEvents,
    ) -> Result<(), EngineError> {
        let mut tts = self.tts();
        self.apply_options(&mut tts, options)?;
        let utterance = tts.speak(text, true).map_err(failed)?;
        match utterance {
            Some(id) if self.callbacks => self.pending().register(id, events),
            _ => self.watch_until_silent(&tts, events),
        }
        Ok(())
    }

    fn stop(&self) -> Result<(), EngineError> {
        self.tts().stop().map_err(failed)?;
        self.pending().stop_all();
        Ok(())
    }

    fn pause(&self) -> Result<(), EngineError> {
        Err(EngineError::Failed(
            "pausing is not supported by the native backend".to_string(),
        ))
    }

    fn resume(&self) -> Result<(), EngineError> {
        Err(EngineError::Failed(
            "resuming is not supported by the native backend".to_string(),
        ))
    }

    async fn voices(&self) -> Result<Vec<Voice>, EngineError> {
        let voices = self.tts().voices().map_err(failed)?;
        Ok(voices
            .into_iter()
            .map(|v| {
                let id = v.id().to_string();
                Voice {
                    quality: quality_from_id(&id),
                    name: v.name().to_string(),
                    language: v.language().to_string(),
                    id,
                }
            })
            .collect())
    }
}

fn failed(err: tts::Error) -> EngineError {
    EngineError::Failed(err.to_string())
}

fn resolve(pending: &Pending, utterance: UtteranceId, ending: Ending) {
    pending
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .resolve(utterance, ending);
}

/// Voice identifiers on Apple platforms carry the quality tier
/// (`com.apple.voice.enhanced.en-US.Ava`).
fn quality_from_id(id: &str) -> VoiceQuality {
    let id = id.to_ascii_lowercase();
    if id.contains("enhanced") || id.contains("premium") {
        VoiceQuality::Enhanced
    } else {
        VoiceQuality::Default
    }
}

/// Map a session value with 1.0 as normal onto `(min, normal, max)`.
fn to_platform(value: f32, (lo, hi): (f32, f32), (min, normal, max): (f32, f32, f32)) -> f32 {
    let value = value.clamp(lo, hi);
    if value <= 1.0 {
        min + (normal - min) * (value - lo) / (1.0 - lo)
    } else {
        normal + (max - normal) * (value - 1.0) / (hi - 1.0)
    }
}
