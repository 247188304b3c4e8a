#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tts_session::{
    EngineError, ResolvedOptions, SpeechEngine, UtteranceEvents, Voice, VoiceQuality,
};

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn catalog() -> Vec<Voice> {
    vec![
        Voice::new("samantha", "Samantha", "en-US", VoiceQuality::Enhanced),
        Voice::new("daniel", "Daniel", "en-GB", VoiceQuality::Default),
    ]
}

/// Five 499-character sentences separated by spaces, 2500 characters in all.
pub fn five_sentences() -> String {
    let sentence = format!("{}.", "a".repeat(498));
    format!("{} ", vec![sentence; 5].join(" "))
}

#[derive(Debug, Clone)]
pub struct Call {
    pub text: String,
    pub options: ResolvedOptions,
}

/// A dispatched utterance handed to the test in manual mode.
pub struct Dispatched {
    pub text: String,
    pub options: ResolvedOptions,
    pub events: UtteranceEvents,
}

enum Mode {
    /// Complete each utterance after `delay` (immediately when zero).
    Auto(Duration),
    /// Hand each utterance to the test, which decides how it ends.
    Manual,
}

enum Failure {
    Dispatch(EngineError),
    Async(EngineError),
}

/// Controllable [`SpeechEngine`] for driving sessions in tests.
pub struct ScriptedEngine {
    mode: Mode,
    available: bool,
    catalog: Result<Vec<Voice>, EngineError>,
    failures: Mutex<HashMap<usize, Failure>>,
    rejected_voices: Mutex<HashSet<String>>,
    lost_voices: Mutex<HashSet<String>>,
    voice_delay: Duration,
    in_flight: Mutex<Vec<UtteranceEvents>>,
    calls: Mutex<Vec<Call>>,
    active: Arc<AtomicUsize>,
    max_active: Arc<AtomicUsize>,
    stops: AtomicUsize,
    pauses: AtomicUsize,
    resumes: AtomicUsize,
    voice_queries: AtomicUsize,
    tx: mpsc::UnboundedSender<Dispatched>,
    rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<Dispatched>>,
}

impl ScriptedEngine {
    fn with_mode(mode: Mode) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            mode,
            available: true,
            catalog: Ok(catalog()),
            failures: Mutex::new(HashMap::new()),
            rejected_voices: Mutex::new(HashSet::new()),
            lost_voices: Mutex::new(HashSet::new()),
            voice_delay: Duration::ZERO,
            in_flight: Mutex::new(Vec::new()),
            calls: Mutex::new(Vec::new()),
            active: Arc::new(AtomicUsize::new(0)),
            max_active: Arc::new(AtomicUsize::new(0)),
            stops: AtomicUsize::new(0),
            pauses: AtomicUsize::new(0),
            resumes: AtomicUsize::new(0),
            voice_queries: AtomicUsize::new(0),
            tx,
            rx: tokio::sync::Mutex::new(rx),
        }
    }

    pub fn auto() -> Self {
        Self::with_mode(Mode::Auto(Duration::ZERO))
    }

    pub fn delayed(delay: Duration) -> Self {
        Self::with_mode(Mode::Auto(delay))
    }

    pub fn manual() -> Self {
        Self::with_mode(Mode::Manual)
    }

    pub fn unavailable(mut self) -> Self {
        self.available = false;
        self
    }

    pub fn with_voices(mut self, voices: Vec<Voice>) -> Self {
        self.catalog = Ok(voices);
        self
    }

    pub fn failing_voice_query(mut self) -> Self {
        self.catalog = Err(EngineError::Failed("catalog unavailable".into()));
        self
    }

    /// Call `index` (0-based) is rejected by `speak` itself.
    pub fn reject_call(self, index: usize, err: EngineError) -> Self {
        self.failures.lock().unwrap().insert(index, Failure::Dispatch(err));
        self
    }

    /// Call `index` (0-based) is accepted, then fails through its events.
    pub fn fail_call(self, index: usize, err: EngineError) -> Self {
        self.failures.lock().unwrap().insert(index, Failure::Async(err));
        self
    }

    pub fn reject_voice(self, id: &str) -> Self {
        self.rejected_voices.lock().unwrap().insert(id.to_string());
        self
    }

    /// Utterances with voice `id` are accepted, then fail with `VoiceUnavailable`.
    pub fn lose_voice(self, id: &str) -> Self {
        self.lost_voices.lock().unwrap().insert(id.to_string());
        self
    }

    /// Every voice query takes `delay` to answer.
    pub fn slow_voice_query(mut self, delay: Duration) -> Self {
        self.voice_delay = delay;
        self
    }

    pub fn build(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn texts(&self) -> Vec<String> {
        self.calls().into_iter().map(|c| c.text).collect()
    }

    pub fn stops(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }

    pub fn pauses(&self) -> usize {
        self.pauses.load(Ordering::SeqCst)
    }

    pub fn resumes(&self) -> usize {
        self.resumes.load(Ordering::SeqCst)
    }

    pub fn voice_queries(&self) -> usize {
        self.voice_queries.load(Ordering::SeqCst)
    }

    pub fn max_active(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }

    /// Wait for the next utterance in manual mode.
    pub async fn next(&self) -> Dispatched {
        self.rx
            .lock()
            .await
            .recv()
            .await
            .expect("engine sender lives as long as the engine")
    }

    /// The next utterance if one has already been dispatched.
    pub async fn try_next(&self) -> Option<Dispatched> {
        self.rx.lock().await.try_recv().ok()
    }
}

#[async_trait]
impl SpeechEngine for ScriptedEngine {
    fn name(&self) -> &str {
        "scripted"
    }

    fn is_available(&self) -> bool {
        self.available
    }

    fn speak(
        &self,
        text: &str,
        options: &ResolvedOptions,
        events: UtteranceEvents,
    ) -> Result<(), EngineError> {
        let index = {
            let mut calls = self.calls.lock().unwrap();
            calls.push(Call {
                text: text.to_string(),
                options: options.clone(),
            });
            calls.len() - 1
        };

        if let Some(voice) = &options.voice_id {
            if self.rejected_voices.lock().unwrap().contains(voice) {
                return Err(EngineError::VoiceUnavailable(voice.clone()));
            }
        }

        if let Some(voice) = &options.voice_id {
            if self.lost_voices.lock().unwrap().contains(voice) {
                events.failed(EngineError::VoiceUnavailable(voice.clone()));
                return Ok(());
            }
        }

        let failure = self.failures.lock().unwrap().remove(&index);
        match failure {
            Some(Failure::Dispatch(err)) => return Err(err),
            Some(Failure::Async(err)) => {
                events.failed(err);
                return Ok(());
            }
            None => {}
        }

        match self.mode {
            Mode::Auto(delay) if delay.is_zero() => {
                events.done();
            }
            Mode::Auto(delay) => {
                let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
                self.max_active.fetch_max(now, Ordering::SeqCst);
                self.in_flight.lock().unwrap().push(events.clone());
                let active = self.active.clone();
                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    if events.done() {
                        active.fetch_sub(1, Ordering::SeqCst);
                    }
                });
            }
            Mode::Manual => {
                let _ = self.tx.send(Dispatched {
                    text: text.to_string(),
                    options: options.clone(),
                    events,
                });
            }
        }
        Ok(())
    }

    fn stop(&self) -> Result<(), EngineError> {
        self.stops.fetch_add(1, Ordering::SeqCst);
        for events in self.in_flight.lock().unwrap().drain(..) {
            if events.stopped() {
                self.active.fetch_sub(1, Ordering::SeqCst);
            }
        }
        Ok(())
    }

    fn pause(&self) -> Result<(), EngineError> {
        self.pauses.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn resume(&self) -> Result<(), EngineError> {
        self.resumes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn voices(&self) -> Result<Vec<Voice>, EngineError> {
        self.voice_queries.fetch_add(1, Ordering::SeqCst);
        if !self.voice_delay.is_zero() {
            tokio::time::sleep(self.voice_delay).await;
        }
        self.catalog.clone()
    }
}
