//! Risk alert data structures

use super::classification::{ClassificationResult, Label};
use super::transcript::SessionId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Risk level classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    /// Determine risk level from score and thresholds
    pub fn from_score(score: f64, thresholds: &RiskLevelThresholds) -> Self {
        if score >= thresholds.critical {
            RiskLevel::Critical
        } else if score >= thresholds.high {
            RiskLevel::High
        } else if score >= thresholds.medium {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        }
    }

    /// Closing advice for a call that ended at this level
    pub fn final_recommendations(&self) -> Vec<String> {
        let lines: &[&str] = match self {
            RiskLevel::Critical => &[
                "HIGH FRAUD RISK: Immediately hang up and report this call",
                "Do not provide any personal or financial information",
                "Contact the organization directly using official phone numbers",
            ],
            RiskLevel::High => &[
                "SUSPICIOUS CALL: Exercise extreme caution",
                "Verify caller identity through official channels",
                "Do not make immediate decisions or payments",
            ],
            RiskLevel::Medium => &[
                "POTENTIAL RISK: Stay vigilant during this call",
                "Be cautious about sharing personal information",
            ],
            RiskLevel::Low => &["LOW RISK: Call appears legitimate but remain cautious"],
        };
        lines.iter().map(|s| s.to_string()).collect()
    }
}

/// Configurable risk level thresholds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskLevelThresholds {
    pub medium: f64,
    pub high: f64,
    pub critical: f64,
}

impl Default for RiskLevelThresholds {
    fn default() -> Self {
        Self {
            medium: 0.4,
            high: 0.6,
            critical: 0.8,
        }
    }
}

/// What raised an alert
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    /// Accumulated risk jumped between chunks
    Escalation,
    /// A single segment carried high-risk keywords
    ScamKeywords,
}

const KEYWORD_ALERT_ACTION: &str = "IMMEDIATE ATTENTION REQUIRED: possible scam call";

/// Alert raised on a sharp risk jump or a high-risk segment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskAlert {
    /// Unique alert identifier
    pub alert_id: String,

    pub kind: AlertKind,

    /// Session the alert belongs to
    pub session_id: SessionId,

    /// Risk score before the chunk that triggered the alert
    pub previous_risk_score: f64,

    /// Risk score after it (0.0 - 1.0)
    pub risk_score: f64,

    /// Risk level classification
    pub risk_level: RiskLevel,

    /// Label of the triggering classification
    pub label: Label,

    /// Indicators that contributed to the alert
    pub indicators: Vec<String>,

    /// Advice attached to the triggering label
    pub recommendation: String,

    /// Segment text that triggered a keyword alert
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub segment_text: Option<String>,

    /// Alert generation timestamp
    pub timestamp: DateTime<Utc>,
}

impl RiskAlert {
    /// Create a new escalation alert
    pub fn new(
        session_id: SessionId,
        previous_risk_score: f64,
        result: &ClassificationResult,
        thresholds: &RiskLevelThresholds,
    ) -> Self {
        Self {
            alert_id: uuid::Uuid::new_v4().to_string(),
            kind: AlertKind::Escalation,
            session_id,
            previous_risk_score,
            risk_score: result.risk_score,
            risk_level: RiskLevel::from_score(result.risk_score, thresholds),
            label: result.label,
            indicators: Vec::new(),
            recommendation: result.recommendation.clone(),
            segment_text: None,
            timestamp: Utc::now(),
        }
    }

    /// Alert for a single segment whose keywords imply `severity`.
    ///
    /// The score is fixed per severity: 0.9 for critical, 0.7 otherwise.
    pub fn keywords(
        session_id: SessionId,
        previous_risk_score: f64,
        severity: RiskLevel,
        segment_text: &str,
        label: Label,
    ) -> Self {
        let risk_score = if severity == RiskLevel::Critical { 0.9 } else { 0.7 };
        Self {
            alert_id: uuid::Uuid::new_v4().to_string(),
            kind: AlertKind::ScamKeywords,
            session_id,
            previous_risk_score,
            risk_score,
            risk_level: severity,
            label,
            indicators: Vec::new(),
            recommendation: KEYWORD_ALERT_ACTION.to_string(),
            segment_text: Some(segment_text.to_string()),
            timestamp: Utc::now(),
        }
    }

    /// Add indicators to the alert
    pub fn with_indicators(mut self, indicators: Vec<String>) -> Self {
        self.indicators = indicators;
        self
    }
}
