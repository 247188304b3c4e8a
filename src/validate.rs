//! Input checks applied before text reaches the engine.

use crate::TtsError;

/// Longest text accepted by a single `speak` call.
pub const MAX_SPEECH_CHARS: usize = 4000;

/// Above this length callers should narrate with `speak_long_text`.
pub const CHUNK_THRESHOLD: usize = 1000;

/// Check that `text` has content once surrounding whitespace is removed.
///
/// Returns the trimmed text.
pub fn validate_text(text: &str) -> Result<&str, TtsError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(TtsError::Validation(
            "text must not be empty or whitespace".to_string(),
        ));
    }
    warn_on_unusual_chars(trimmed);
    Ok(trimmed)
}

/// [`validate_text`] plus the length limit for direct speech.
pub fn validate_speech_text(text: &str, max_chars: usize) -> Result<&str, TtsError> {
    let trimmed = validate_text(text)?;
    let len = trimmed.chars().count();
    if len > max_chars {
        return Err(TtsError::Validation(format!(
            "text is {len} characters, the limit for direct speech is {max_chars}; \
             use speak_long_text for longer passages"
        )));
    }
    Ok(trimmed)
}

/// Whether `text` is long enough that it should be chunked.
pub fn needs_chunking(text: &str) -> bool {
    text.chars().count() > CHUNK_THRESHOLD
}

fn is_safe_char(ch: char) -> bool {
    ch.is_alphanumeric()
        || ch == '_'
        || ch.is_whitespace()
        || matches!(
            ch,
            '.' | ',' | '!' | '?' | ';' | ':' | '\'' | '"' | '(' | ')' | '-' | '\u{2019}'
        )
}

fn warn_on_unusual_chars(text: &str) {
    let unusual = text.chars().filter(|&ch| !is_safe_char(ch)).count();
    if unusual > 0 {
        log::warn!("Text contains {unusual} character(s) the engine may not pronounce");
    }
}
