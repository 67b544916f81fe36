//! Fraud pattern rule definitions

use serde::{Deserialize, Serialize};
use std::fmt;

/// Scam tactic a pattern indicates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternCategory {
    Financial,
    Verification,
    AuthorityImpersonation,
    Urgency,
    TechSupport,
    Romance,
    Investment,
    Prize,
    Other,
}

impl PatternCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            PatternCategory::Financial => "financial",
            PatternCategory::Verification => "verification",
            PatternCategory::AuthorityImpersonation => "authority_impersonation",
            PatternCategory::Urgency => "urgency",
            PatternCategory::TechSupport => "tech_support",
            PatternCategory::Romance => "romance",
            PatternCategory::Investment => "investment",
            PatternCategory::Prize => "prize",
            PatternCategory::Other => "other",
        }
    }
}

impl fmt::Display for PatternCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a pattern's matcher text is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatcherKind {
    /// Case-insensitive substring
    Keyword,
    /// Case-insensitive regular expression
    Regex,
}

/// A pattern as written in a catalog file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternSpec {
    pub id: String,
    pub kind: MatcherKind,
    pub pattern: String,
    pub category: PatternCategory,
    pub weight: f64,
    pub description: String,
}

impl PatternSpec {
    pub fn keyword(
        id: &str,
        keyword: &str,
        category: PatternCategory,
        weight: f64,
        description: &str,
    ) -> Self {
        Self {
            id: id.to_string(),
            kind: MatcherKind::Keyword,
            pattern: keyword.to_string(),
            category,
            weight,
            description: description.to_string(),
        }
    }

    pub fn regex(
        id: &str,
        regex: &str,
        category: PatternCategory,
        weight: f64,
        description: &str,
    ) -> Self {
        Self {
            kind: MatcherKind::Regex,
            ..Self::keyword(id, regex, category, weight, description)
        }
    }
}

/// A pattern that fired on a piece of text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternMatch {
    pub pattern_id: String,
    pub category: PatternCategory,
    pub weight: f64,
    pub description: String,
}

impl PatternMatch {
    /// "category: description", the form used in indicator lists.
    pub fn indicator(&self) -> String {
        format!("{}: {}", self.category, self.description)
    }
}
