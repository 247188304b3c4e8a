use crate::store::StoreError;

/// Failure reported by a [`SpeechEngine`](crate::SpeechEngine).
///
/// Engines return these from `speak`/`stop`/`pause`/`resume` or hand them to
/// [`UtteranceEvents::failed`](crate::UtteranceEvents::failed) when an
/// utterance fails after dispatch.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("speech engine unsupported: {0}")]
    Unsupported(String),
    #[error("voice '{0}' is not available on this engine")]
    VoiceUnavailable(String),
    #[error("audio interrupted: {0}")]
    Interrupted(String),
    #[error("{0}")]
    Failed(String),
}

/// Errors surfaced by the session, the voice registry and the stores.
#[derive(thiserror::Error, Debug)]
pub enum TtsError {
    #[error("Text-to-speech is not supported on this platform: {0}")]
    NotSupported(String),
    #[error("Voice '{0}' is unavailable")]
    VoiceUnavailable(String),
    #[error("Speech synthesis failed: {0}")]
    SynthesisFailed(#[source] EngineError),
    #[error("Audio was interrupted: {0}")]
    AudioInterrupted(String),
    #[error("Invalid input: {0}")]
    Validation(String),
    #[error("Favorites are limited to {0} entries")]
    Capacity(usize),
    #[error("This text is already saved as a favorite")]
    Duplicate,
    #[error("Favorite '{0}' not found")]
    NotFound(String),
    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),
}

/// Stable discriminant of a [`TtsError`], useful for matching in UI code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotSupported,
    VoiceUnavailable,
    SynthesisFailed,
    AudioInterrupted,
    Validation,
    Capacity,
    Duplicate,
    NotFound,
    Storage,
}

/// What the caller should offer the user after an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recovery {
    /// The same call may succeed if repeated.
    Retry,
    /// Already handled by falling back to a default; nothing to do.
    FallbackAndContinue,
    /// The input or environment has to change first.
    UserMustAct,
}

impl TtsError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            TtsError::NotSupported(_) => ErrorKind::NotSupported,
            TtsError::VoiceUnavailable(_) => ErrorKind::VoiceUnavailable,
            TtsError::SynthesisFailed(_) => ErrorKind::SynthesisFailed,
            TtsError::AudioInterrupted(_) => ErrorKind::AudioInterrupted,
            TtsError::Validation(_) => ErrorKind::Validation,
            TtsError::Capacity(_) => ErrorKind::Capacity,
            TtsError::Duplicate => ErrorKind::Duplicate,
            TtsError::NotFound(_) => ErrorKind::NotFound,
            TtsError::Storage(_) => ErrorKind::Storage,
        }
    }

    pub fn recovery(&self) -> Recovery {
        match self.kind() {
            ErrorKind::SynthesisFailed | ErrorKind::AudioInterrupted | ErrorKind::Storage => {
                Recovery::Retry
            }
            ErrorKind::VoiceUnavailable => Recovery::FallbackAndContinue,
            ErrorKind::NotSupported
            | ErrorKind::Validation
            | ErrorKind::Capacity
            | ErrorKind::Duplicate
            | ErrorKind::NotFound => Recovery::UserMustAct,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.recovery() == Recovery::Retry
    }

    /// Fatal errors abort a narration instead of skipping to the next chunk.
    pub fn is_fatal(&self) -> bool {
        matches!(self, TtsError::NotSupported(_))
    }

    /// Short message suitable for showing to the person using the app.
    pub fn user_message(&self) -> &'static str {
        match self.kind() {
            ErrorKind::NotSupported => {
                "Text-to-speech isn't available on this device. Check the system speech settings."
            }
            ErrorKind::VoiceUnavailable => {
                "The selected voice isn't available, so the default voice was used."
            }
            ErrorKind::SynthesisFailed => "Speech could not be generated. Please try again.",
            ErrorKind::AudioInterrupted => "Playback was interrupted. Tap to try again.",
            ErrorKind::Validation => "Please enter some text to speak.",
            ErrorKind::Capacity => "You've reached the favorites limit. Remove one to add more.",
            ErrorKind::Duplicate => "This text is already in your favorites.",
            ErrorKind::NotFound => "That favorite no longer exists.",
            ErrorKind::Storage => "Your saved data couldn't be read or written. Please try again.",
        }
    }
}

impl From<EngineError> for TtsError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::Unsupported(reason) => TtsError::NotSupported(reason),
            EngineError::VoiceUnavailable(voice) => TtsError::VoiceUnavailable(voice),
            EngineError::Interrupted(reason) => TtsError::AudioInterrupted(reason),
            err @ EngineError::Failed(_) => TtsError::SynthesisFailed(err),
        }
    }
}
