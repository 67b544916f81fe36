//! Per-segment keyword screening.
//!
//! Runs on each newly appended segment, independent of the accumulated
//! transcript score, so a single blatant line ("read me your social
//! security number") raises an alert straight away.

use crate::linguistic::tokenize;
use crate::types::RiskLevel;

const FRAUD_KEYWORDS: &[&str] = &[
    "urgent",
    "immediate",
    "limited time",
    "act now",
    "verify account",
    "suspended",
    "blocked",
    "security breach",
    "unauthorized",
    "confirm identity",
    "send money",
    "wire transfer",
    "gift card",
    "cryptocurrency",
    "bitcoin",
    "social security",
    "bank account",
    "credit card",
    "password",
    "pin",
    "irs",
    "government agency",
    "arrest warrant",
    "legal action",
    "refund",
    "prize",
    "lottery",
    "winner",
    "congratulations",
    "inheritance",
];

const CRITICAL_KEYWORDS: &[&str] = &[
    "suspended",
    "blocked",
    "verify account",
    "confirm identity",
    "irs",
];

const HIGH_KEYWORDS: &[&str] = &[
    "send money",
    "wire transfer",
    "gift card",
    "bitcoin",
    "social security",
    "arrest warrant",
];

/// Keywords found in one segment and the severity they imply
#[derive(Debug, Clone, PartialEq)]
pub struct KeywordHit {
    pub keywords: Vec<String>,
    pub severity: RiskLevel,
}

impl KeywordHit {
    /// Only high and critical hits are worth interrupting the call for
    pub fn is_alert(&self) -> bool {
        self.severity >= RiskLevel::High
    }
}

/// Whole-word keyword screen over a single segment.
#[derive(Debug, Clone, Default)]
pub struct KeywordScreen;

impl KeywordScreen {
    pub fn new() -> Self {
        Self
    }

    /// Keywords in `text`, in lexicon order. `None` if nothing matched.
    pub fn screen(&self, text: &str) -> Option<KeywordHit> {
        let tokens = tokenize(text);
        if tokens.is_empty() {
            return None;
        }
        // Padded so multi-word keywords only match on word boundaries
        let haystack = format!(" {} ", tokens.join(" "));

        let keywords: Vec<&str> = FRAUD_KEYWORDS
            .iter()
            .copied()
            .filter(|keyword| haystack.contains(&format!(" {} ", keyword)))
            .collect();
        if keywords.is_empty() {
            return None;
        }

        Some(KeywordHit {
            severity: severity(&keywords),
            keywords: keywords.into_iter().map(str::to_string).collect(),
        })
    }
}

fn severity(keywords: &[&str]) -> RiskLevel {
    let any_of = |tier: &[&str]| keywords.iter().any(|k| tier.contains(k));

    if any_of(CRITICAL_KEYWORDS) {
        RiskLevel::Critical
    } else if any_of(HIGH_KEYWORDS) {
        RiskLevel::High
    } else if keywords.len() >= 3 {
        RiskLevel::Medium
    } else {
        RiskLevel::Low
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_critical_keyword() {
        let hit = KeywordScreen::new()
            .screen("This is the IRS calling about your return")
            .unwrap();
        assert_eq!(hit.keywords, vec!["irs"]);
        assert_eq!(hit.severity, RiskLevel::Critical);
        assert!(hit.is_alert());
    }

    #[test]
    fn test_high_keyword_across_punctuation() {
        let hit = KeywordScreen::new()
            .screen("Pay with a Gift-Card, or send money today.")
            .unwrap();
        assert_eq!(hit.keywords, vec!["send money", "gift card"]);
        assert_eq!(hit.severity, RiskLevel::High);
    }

    #[test]
    fn test_severity_by_count() {
        let screen = KeywordScreen::new();

        let medium = screen
            .screen("Congratulations, you are the winner of our lottery")
            .unwrap();
        assert_eq!(medium.severity, RiskLevel::Medium);
        assert!(!medium.is_alert());

        let low = screen.screen("You are due a refund").unwrap();
        assert_eq!(low.severity, RiskLevel::Low);
    }

    #[test]
    fn test_whole_words_only() {
        let screen = KeywordScreen::new();
        assert!(screen.screen("Going shopping, ping me later").is_none());
        assert!(screen.screen("The first prizes went to spinning").is_none());
        assert!(screen.screen("").is_none());
    }
}
