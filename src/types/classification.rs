//! Classification verdicts and the features behind them

use super::pattern::{PatternCategory, PatternMatch};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Verdict assigned to a transcript.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Label {
    Safe,
    Suspicious,
    Scam,
}

impl Label {
    /// Fixed advice shown to the call recipient for this label.
    pub fn recommendation(&self) -> &'static str {
        match self {
            Label::Scam => {
                "HIGH RISK: This appears to be a scam call. Do NOT provide personal information, \
                 money, or access to your devices. Hang up immediately and report the call."
            }
            Label::Suspicious => {
                "SUSPICIOUS: This call shows warning signs. Be cautious, verify the caller's \
                 identity independently, and avoid sharing sensitive information."
            }
            Label::Safe => {
                "SAFE: This call appears legitimate, but always verify caller identity \
                 for sensitive requests."
            }
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Label::Safe => "Safe",
            Label::Suspicious => "Suspicious",
            Label::Scam => "Scam",
        };
        f.write_str(s)
    }
}

/// Structural features of a transcript.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LinguisticFeatures {
    pub word_count: usize,
    pub sentence_count: usize,
    pub urgency_word_count: usize,
    pub money_word_count: usize,
    pub personal_info_word_count: usize,
    pub emotional_manipulation_count: usize,
    pub exclamation_count: usize,
    pub question_count: usize,
    pub digit_count: usize,
    /// Share of alphabetic characters that are uppercase
    pub uppercase_ratio: f64,
    pub avg_word_length: f64,
}

/// Immutable verdict produced for one transcript.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub label: Label,
    /// Certainty of the label assignment (0.0 - 1.0)
    pub confidence: f64,
    /// Normalized aggregate risk (0.0 - 1.0)
    pub risk_score: f64,
    pub rationale: String,
    /// Every pattern that fired, in catalog order
    pub matched_patterns: Vec<PatternMatch>,
    pub linguistic_features: LinguisticFeatures,
    pub recommendation: String,
    /// Auxiliary model probability, when the model took part
    pub model_score: Option<f64>,
    pub catalog_version: String,
    pub timestamp: DateTime<Utc>,
}

impl ClassificationResult {
    /// Distinct categories among the matched patterns.
    pub fn categories(&self) -> BTreeSet<PatternCategory> {
        self.matched_patterns.iter().map(|m| m.category).collect()
    }

    /// "category: description" strings for every match.
    pub fn indicators(&self) -> Vec<String> {
        self.matched_patterns.iter().map(|m| m.indicator()).collect()
    }
}

// Timestamps record when a verdict was produced, not what it says.
impl PartialEq for ClassificationResult {
    fn eq(&self, other: &Self) -> bool {
        self.label == other.label
            && self.confidence == other.confidence
            && self.risk_score == other.risk_score
            && self.rationale == other.rationale
            && self.matched_patterns == other.matched_patterns
            && self.linguistic_features == other.linguistic_features
            && self.recommendation == other.recommendation
            && self.model_score == other.model_score
            && self.catalog_version == other.catalog_version
    }
}
