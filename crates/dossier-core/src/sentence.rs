//! Sentence context for entity mentions.

use std::ops::Range;

/// Characters taken on each side of a match when no sentence contains it.
pub const CONTEXT_CHARS: usize = 50;

/// Sentence boundaries of one page, computed once and looked up per match.
///
/// Sentences end at `.`, `!` or `?` followed by whitespace. Offsets count
/// `char`s.
#[derive(Debug, Clone)]
pub struct SentenceIndex {
    chars: Vec<char>,
    /// Half-open char ranges, ascending and disjoint.
    sentences: Vec<Range<usize>>,
}

impl SentenceIndex {
    pub fn new(text: &str) -> Self {
        let chars: Vec<char> = text.chars().collect();
        let n = chars.len();
        let mut sentences = Vec::new();

        let mut begin = 0;
        let mut i = 0;
        while i < n {
            if matches!(chars[i], '.' | '!' | '?') && i + 1 < n && chars[i + 1].is_whitespace() {
                sentences.push(begin..i + 1);
                let mut next = i + 1;
                while next < n && chars[next].is_whitespace() {
                    next += 1;
                }
                begin = next;
                i = next;
                continue;
            }
            i += 1;
        }
        if begin < n {
            sentences.push(begin..n);
        }

        Self { chars, sentences }
    }

    pub fn char_len(&self) -> usize {
        self.chars.len()
    }

    /// The sentence containing the char at `char_start`.
    ///
    /// When the offset falls between sentences, a window of
    /// [`CONTEXT_CHARS`] on either side of the match is returned instead.
    /// Past the end of the text the result is empty.
    pub fn sentence_around(&self, char_start: usize, char_length: usize) -> String {
        let n = self.chars.len();
        if char_start >= n {
            return String::new();
        }

        let idx = self.sentences.partition_point(|r| r.start <= char_start);
        if idx > 0 && self.sentences[idx - 1].contains(&char_start) {
            let range = self.sentences[idx - 1].clone();
            return self.collect(range.start, range.end);
        }

        let from = char_start.saturating_sub(CONTEXT_CHARS);
        let to = char_start
            .saturating_add(char_length)
            .saturating_add(CONTEXT_CHARS)
            .min(n);
        self.collect(from, to)
    }

    fn collect(&self, from: usize, to: usize) -> String {
        self.chars[from..to]
            .iter()
            .collect::<String>()
            .trim()
            .to_string()
    }
}
