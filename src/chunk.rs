//! Sentence-bounded splitting of long text for narration.

/// Default upper bound on a chunk, in characters.
pub const DEFAULT_MAX_CHUNK_SIZE: usize = 1000;

/// Split `text` into chunks of at most `max_chunk_size` characters.
///
/// Text that already fits is returned unchanged as a single chunk. Longer
/// text is split into sentences at runs of `.`, `!` and `?`, and each
/// sentence is packed greedily with a trailing period, joined by a single
/// space. The terminator run is replaced by that period, so `"Really?!"`
/// becomes `"Really."`. A sentence longer than the limit cannot be split and
/// becomes a chunk on its own.
///
/// A `.` between two digits (`2.5`) does not end a sentence. Abbreviations
/// and quoted punctuation are not treated specially.
pub fn chunk_text(text: &str, max_chunk_size: usize) -> Vec<String> {
    if text.chars().count() <= max_chunk_size {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0usize;

    for sentence in split_sentences(text) {
        let len = sentence.chars().count();
        if current.is_empty() {
            current = sentence;
            current_len = len;
        } else if current_len + 1 + len <= max_chunk_size {
            current.push(' ');
            current.push_str(&sentence);
            current_len += 1 + len;
        } else {
            chunks.push(std::mem::replace(&mut current, sentence));
            current_len = len;
        }
    }
    if !current.is_empty() {
        chunks.push(current);
    }

    if chunks.is_empty() {
        log::warn!("No sentences found in {} characters of text, speaking it whole", text.len());
        return vec![text.to_string()];
    }

    log::debug!("Split {} characters into {} chunks", text.len(), chunks.len());
    chunks
}

fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut current = String::new();
    let mut chars = text.char_indices().peekable();

    while let Some((idx, ch)) = chars.next() {
        current.push(ch);
        if !is_terminator(ch) || is_decimal_point(text, idx, ch) {
            continue;
        }
        // The whole run ("?!", "...") ends one sentence.
        while chars.next_if(|&(_, next)| is_terminator(next)).is_some() {}
        flush_sentence(&mut sentences, &mut current);
    }
    flush_sentence(&mut sentences, &mut current);

    sentences
}

fn flush_sentence(sentences: &mut Vec<String>, current: &mut String) {
    let body = current.trim().trim_end_matches(is_terminator).trim_end();
    if !body.is_empty() {
        sentences.push(format!("{body}."));
    }
    current.clear();
}

fn is_terminator(ch: char) -> bool {
    matches!(ch, '.' | '!' | '?')
}

fn is_decimal_point(text: &str, idx: usize, ch: char) -> bool {
    if ch != '.' {
        return false;
    }

    let prev = text[..idx].chars().next_back();
    let next = text[idx + ch.len_utf8()..].chars().next();

    matches!(
        (prev, next),
        (Some(left), Some(right)) if left.is_ascii_digit() && right.is_ascii_digit()
    )
}
