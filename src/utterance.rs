use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::oneshot;

use crate::EngineError;

/// How an utterance ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UtteranceOutcome {
    /// The engine spoke the whole text.
    Done,
    /// Playback was stopped before the end.
    Stopped,
    /// The engine failed after the utterance was dispatched.
    Failed(EngineError),
}

/// Completion handle given to a [`SpeechEngine`](crate::SpeechEngine) with each utterance.
///
/// Platform engines usually report completion through several callbacks
/// (finished, stopped, error). Every callback can hold a clone of this handle;
/// whichever fires first resolves the utterance and the rest are ignored.
#[derive(Debug, Clone)]
pub struct UtteranceEvents {
    id: u64,
    tx: Arc<Mutex<Option<oneshot::Sender<UtteranceOutcome>>>>,
}

impl UtteranceEvents {
    pub(crate) fn channel(id: u64) -> (Self, oneshot::Receiver<UtteranceOutcome>) {
        let (tx, rx) = oneshot::channel();
        let events = Self {
            id,
            tx: Arc::new(Mutex::new(Some(tx))),
        };
        (events, rx)
    }

    /// Session-unique identifier of the utterance.
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn done(&self) -> bool {
        self.finish(UtteranceOutcome::Done)
    }

    pub fn stopped(&self) -> bool {
        self.finish(UtteranceOutcome::Stopped)
    }

    pub fn failed(&self, err: EngineError) -> bool {
        self.finish(UtteranceOutcome::Failed(err))
    }

    pub fn is_finished(&self) -> bool {
        self.tx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }

    /// Returns `true` if this call resolved the utterance.
    fn finish(&self, outcome: UtteranceOutcome) -> bool {
        let tx = self.tx.lock().unwrap_or_else(PoisonError::into_inner).take();
        match tx {
            Some(tx) => {
                log::debug!("Utterance {} finished: {:?}", self.id, outcome);
                // The receiver is gone when the session already moved on.
                let _ = tx.send(outcome);
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{UtteranceEvents, UtteranceOutcome};
    use crate::EngineError;

    #[tokio::test]
    async fn first_signal_wins() {
        let (events, rx) = UtteranceEvents::channel(7);
        let stop_callback = events.clone();

        assert!(events.done());
        assert!(!stop_callback.stopped());
        assert!(!events.failed(EngineError::Failed("late".into())));

        assert_eq!(rx.await.expect("outcome"), UtteranceOutcome::Done);
        assert!(stop_callback.is_finished());
    }

    #[tokio::test]
    async fn failure_carries_the_engine_error() {
        let (events, rx) = UtteranceEvents::channel(1);
        events.failed(EngineError::Interrupted("phone call".into()));
        assert_eq!(
            rx.await.expect("outcome"),
            UtteranceOutcome::Failed(EngineError::Interrupted("phone call".into()))
        );
    }

    #[test]
    fn signalling_after_the_receiver_is_dropped_is_harmless() {
        let (events, rx) = UtteranceEvents::channel(2);
        drop(rx);
        assert!(events.stopped());
        assert!(events.is_finished());
    }
}
