/// Default chunk budget, roughly 3.5-4k tokens of chat log.
pub const DEFAULT_CHUNK_CHARS: usize = 15_000;
/// A line break is only used as a cut if the chunk keeps more than this many characters.
pub const MIN_BREAK_CHARS: usize = 1_000;

pub fn normalize_newlines(text: &str) -> String {
    text.replace("\r\n", "\n")
}

/// Splits `text` into chunks of at most `max_chars` characters, preferring to
/// cut right after a newline. Concatenating the chunks yields the
/// newline-normalized input.
pub fn chunk_text(text: &str, max_chars: usize) -> Vec<String> {
    chunk_text_with_floor(text, max_chars, MIN_BREAK_CHARS)
}

pub fn chunk_text_with_floor(text: &str, max_chars: usize, min_break_chars: usize) -> Vec<String> {
    let text = normalize_newlines(text);
    let max_chars = max_chars.max(1);
    let chars: Vec<char> = text.chars().collect();
    if chars.len() <= max_chars {
        return vec![text];
    }

    let mut chunks = Vec::with_capacity(chars.len() / max_chars + 1);
    let mut start = 0usize;
    while start < chars.len() {
        let mut end = (start + max_chars).min(chars.len());
        if end < chars.len() {
            let newline = chars[start..end].iter().rposition(|&c| c == '\n').map(|i| start + i);
            if let Some(nl) = newline {
                // avoid tiny fragments: keep the hard cut when the break is too early
                if nl > start + min_break_chars {
                    end = nl + 1;
                }
            }
        }
        chunks.push(chars[start..end].iter().collect());
        start = end;
    }
    chunks
}
