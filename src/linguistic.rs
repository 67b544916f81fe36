//! Structural feature extraction for call transcripts.
//!
//! Counts are taken over lowercase word tokens. A token is a maximal run of
//! alphanumeric characters, so "$500," yields "500" and "don't" yields
//! "don" and "t".

use crate::types::LinguisticFeatures;
use std::collections::HashSet;

const URGENCY_TERMS: &[&str] = &[
    "urgent",
    "urgently",
    "emergency",
    "immediately",
    "immediate",
    "now",
    "quickly",
    "hurry",
    "asap",
    "deadline",
    "expires",
];

const MONEY_TERMS: &[&str] = &[
    "money", "cash", "dollar", "dollars", "payment", "transfer", "send", "pay", "wire", "funds",
    "bitcoin", "fee",
];

const PERSONAL_INFO_TERMS: &[&str] = &[
    "ssn", "social", "security", "password", "pin", "account", "number", "otp", "passcode",
    "birth",
];

const EMOTIONAL_TERMS: &[&str] = &[
    "afraid",
    "scared",
    "trouble",
    "arrest",
    "arrested",
    "jail",
    "worried",
    "dear",
    "sweetheart",
    "warrant",
    "lawsuit",
    "accident",
    "hospital",
    "panic",
    "secret",
];

/// Derives [`LinguisticFeatures`] from raw text.
///
/// Stateless apart from its fixed lexicons; safe to share behind an `Arc`.
#[derive(Debug, Clone)]
pub struct LinguisticAnalyzer {
    urgency: HashSet<&'static str>,
    money: HashSet<&'static str>,
    personal_info: HashSet<&'static str>,
    emotional: HashSet<&'static str>,
}

impl LinguisticAnalyzer {
    pub fn new() -> Self {
        Self {
            urgency: URGENCY_TERMS.iter().copied().collect(),
            money: MONEY_TERMS.iter().copied().collect(),
            personal_info: PERSONAL_INFO_TERMS.iter().copied().collect(),
            emotional: EMOTIONAL_TERMS.iter().copied().collect(),
        }
    }

    /// Analyze `text`. Never fails; empty input yields all-zero features.
    pub fn analyze(&self, text: &str) -> LinguisticFeatures {
        let tokens = tokenize(text);

        let mut features = LinguisticFeatures {
            word_count: tokens.len(),
            sentence_count: count_sentences(text),
            ..LinguisticFeatures::default()
        };

        for token in &tokens {
            let token = token.as_str();
            if self.urgency.contains(token) {
                features.urgency_word_count += 1;
            }
            if self.money.contains(token) {
                features.money_word_count += 1;
            }
            if self.personal_info.contains(token) {
                features.personal_info_word_count += 1;
            }
            if self.emotional.contains(token) {
                features.emotional_manipulation_count += 1;
            }
        }

        let mut alphabetic = 0usize;
        let mut uppercase = 0usize;
        for c in text.chars() {
            match c {
                '!' => features.exclamation_count += 1,
                '?' => features.question_count += 1,
                c if c.is_ascii_digit() => features.digit_count += 1,
                c if c.is_alphabetic() => {
                    alphabetic += 1;
                    if c.is_uppercase() {
                        uppercase += 1;
                    }
                }
                _ => {}
            }
        }

        if alphabetic > 0 {
            features.uppercase_ratio = uppercase as f64 / alphabetic as f64;
        }
        if !tokens.is_empty() {
            let total_chars: usize = tokens.iter().map(|t| t.chars().count()).sum();
            features.avg_word_length = total_chars as f64 / tokens.len() as f64;
        }

        features
    }
}

impl Default for LinguisticAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

/// Lowercase word tokens of `text`.
pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
        .collect()
}

fn count_sentences(text: &str) -> usize {
    text.split(['.', '!', '?'])
        .filter(|s| !s.trim().is_empty())
        .count()
}
