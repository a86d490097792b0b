//! Sentence-aware splitting of lesson bodies into overlapping spans.

use super::ChunkingConfig;
use regex::Regex;

/// Words that end with a period without ending a sentence.
const ABBREVIATIONS: &[&str] = &[
    "dr", "mr", "mrs", "ms", "prof", "sr", "jr", "st", "vs", "etc", "inc", "ltd", "fig", "eg",
    "ie", "approx", "dept",
];

/// A raw slice of a lesson body, in byte offsets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkSpan {
    pub start: usize,
    pub end: usize,
}

impl ChunkSpan {
    /// The slice of `body` covered by this span.
    pub fn text<'a>(&self, body: &'a str) -> &'a str {
        &body[self.start..self.end]
    }
}

/// Splits text into spans that prefer to end on sentence boundaries.
pub struct SentenceSplitter {
    terminator: Regex,
}

impl SentenceSplitter {
    pub fn new() -> Self {
        Self {
            terminator: Regex::new(r"[.!?]+\s+").expect("Invalid regex"),
        }
    }

    /// Char offsets just past each sentence terminator in `text`.
    fn sentence_ends(&self, text: &str, byte_to_char: impl Fn(usize) -> usize) -> Vec<usize> {
        self.terminator
            .find_iter(text)
            .filter_map(|m| {
                let matched = m.as_str();
                let punct_len = matched.trim_end().len();
                let whitespace = &matched[punct_len..];
                let end = m.start() + punct_len;
                let next = text[m.end()..].chars().next();

                let paragraph_break = whitespace.matches('\n').count() >= 2;
                let next_starts_sentence = next.map_or(true, |c| {
                    c.is_uppercase() || c.is_ascii_digit() || matches!(c, '"' | '\'' | '(' | '[')
                });

                if matched.starts_with('.') && ends_with_abbreviation(&text[..m.start()]) {
                    return None;
                }
                (paragraph_break || next_starts_sentence).then(|| byte_to_char(end))
            })
            .collect()
    }

    /// Split `body` into spans of at most `chunk_size` characters.
    ///
    /// Consecutive spans share exactly `chunk_overlap` characters. A body that
    /// fits in one chunk yields a single span and an empty body yields none.
    pub fn split(&self, body: &str, config: &ChunkingConfig) -> Vec<ChunkSpan> {
        let size = config.chunk_size();
        let overlap = config.chunk_overlap();

        // char index -> byte offset, with a trailing entry for the end of text
        let offsets: Vec<usize> = body
            .char_indices()
            .map(|(i, _)| i)
            .chain(std::iter::once(body.len()))
            .collect();
        let total = offsets.len() - 1;
        if total == 0 {
            return Vec::new();
        }

        let to_char = |byte: usize| offsets.partition_point(|&o| o < byte);
        let boundaries = self.sentence_ends(body, to_char);
        let chars: Vec<char> = body.chars().collect();

        let mut spans = Vec::new();
        let mut start = 0;
        loop {
            if total - start <= size {
                spans.push(ChunkSpan {
                    start: offsets[start],
                    end: offsets[total],
                });
                break;
            }

            let limit = start + size;
            let min_end = start + overlap + 1;

            let end = boundaries
                .iter()
                .rev()
                .copied()
                .find(|&b| b >= min_end && b <= limit)
                .or_else(|| {
                    (min_end..=limit).rev().find(|&i| {
                        chars[i].is_whitespace()
                            && !ends_with_abbreviation(&body[..offsets[i]])
                    })
                })
                .unwrap_or(limit);

            spans.push(ChunkSpan {
                start: offsets[start],
                end: offsets[end],
            });
            start = end - overlap;
        }

        spans
    }
}

impl Default for SentenceSplitter {
    fn default() -> Self {
        Self::new()
    }
}

/// Whether `prefix` ends in an abbreviation such as "Dr.", "Mt." or "U.S.".
fn ends_with_abbreviation(prefix: &str) -> bool {
    let prefix = prefix.strip_suffix('.').unwrap_or(prefix);
    let word = prefix
        .rsplit(|c: char| c.is_whitespace() || c == '(' || c == '"')
        .next()
        .unwrap_or("");
    if word.is_empty() {
        return false;
    }

    // Initials and dotted forms: "J.", "U.S", "e.g"
    if word.chars().count() == 1 && word.chars().all(char::is_alphabetic) {
        return true;
    }
    if word.contains('.') && word.split('.').all(|p| p.chars().count() <= 2) {
        return true;
    }

    // Capitalized two-letter forms: "Mt.", "Co.", "Lt.", "No."
    let mut chars = word.chars();
    if let (Some(first), Some(second), None) = (chars.next(), chars.next(), chars.next()) {
        if first.is_uppercase() && second.is_lowercase() {
            return true;
        }
    }

    let lowered = word.to_lowercase();
    ABBREVIATIONS.contains(&lowered.as_str())
}
