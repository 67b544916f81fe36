//! Accumulated call transcript with overlap removal
//!
//! Consecutive audio chunks usually overlap, so the start of a new segment
//! repeats the end of the previous one. The longest run of words that is
//! both a suffix of the previous segment and a prefix of the new one is
//! dropped from the new segment before it is appended.

use crate::types::TranscriptSegment;

/// Ordered segments plus their deduplicated concatenation.
#[derive(Debug, Clone)]
pub struct TranscriptAccumulator {
    segments: Vec<TranscriptSegment>,
    text: String,
    overlap_window_words: usize,
    min_overlap_words: usize,
}

impl TranscriptAccumulator {
    pub fn new(overlap_window_words: usize, min_overlap_words: usize) -> Self {
        Self {
            segments: Vec::new(),
            text: String::new(),
            overlap_window_words,
            min_overlap_words: min_overlap_words.max(1),
        }
    }

    /// Append a segment and return the text actually added.
    ///
    /// The accumulated text only ever grows.
    pub fn append(&mut self, segment: TranscriptSegment) -> String {
        let added = match self.previous_text() {
            Some(previous) => {
                let new_words: Vec<&str> = segment.text.split_whitespace().collect();
                let overlap = self.overlap_len(previous, &new_words);
                new_words[overlap..].join(" ")
            }
            None => segment.text.split_whitespace().collect::<Vec<_>>().join(" "),
        };

        if !added.is_empty() {
            if !self.text.is_empty() {
                self.text.push(' ');
            }
            self.text.push_str(&added);
        }

        self.segments.push(segment);
        added
    }

    /// Text of the most recent segment that had any
    fn previous_text(&self) -> Option<&str> {
        self.segments
            .iter()
            .rev()
            .find(|s| !s.is_blank())
            .map(|s| s.text.as_str())
    }

    /// Number of leading words of `new_words` that repeat the tail of `previous`
    fn overlap_len(&self, previous: &str, new_words: &[&str]) -> usize {
        let prev: Vec<String> = previous.split_whitespace().map(normalize_word).collect();
        let next: Vec<String> = new_words.iter().map(|w| normalize_word(w)).collect();

        let longest = self
            .overlap_window_words
            .min(prev.len())
            .min(next.len());

        (self.min_overlap_words..=longest)
            .rev()
            .find(|&k| prev[prev.len() - k..] == next[..k])
            .unwrap_or(0)
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn segments(&self) -> &[TranscriptSegment] {
        &self.segments
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }
}

/// Lowercase with punctuation removed, for overlap comparison only
fn normalize_word(word: &str) -> String {
    word.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}
