//! Events emitted by the session pipeline

use super::alert::{RiskAlert, RiskLevel};
use super::classification::ClassificationResult;
use super::transcript::{SessionId, TranscriptSegment};
use crate::error::PipelineError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Emitted once per processed chunk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassificationEvent {
    pub session_id: SessionId,
    /// The segment this chunk contributed
    pub segment: TranscriptSegment,
    pub accumulated_transcript: String,
    pub result: ClassificationResult,
    pub timestamp: DateTime<Utc>,
}

/// Sequence numbers skipped after the reorder window expired.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GapNotice {
    pub session_id: SessionId,
    /// First missing sequence number (inclusive)
    pub missing_from: u64,
    /// Last missing sequence number (inclusive)
    pub missing_to: u64,
    pub timestamp: DateTime<Utc>,
}

impl GapNotice {
    pub fn missing_count(&self) -> u64 {
        self.missing_to - self.missing_from + 1
    }
}

/// Why a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndReason {
    /// Caller sent a stop signal
    Stopped,
    /// Inbound or outbound channel went away
    ChannelClosed,
}

/// Final report for a finished session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSummary {
    pub session_id: SessionId,
    pub end_reason: EndReason,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub final_transcript: String,
    pub chunks_processed: u64,
    pub gaps: u64,
    pub escalations: u64,
    pub keyword_alerts: u64,
    pub final_result: Option<ClassificationResult>,
    pub peak_risk_score: f64,
    pub final_risk_level: RiskLevel,
    pub key_indicators: Vec<String>,
    pub recommendations: Vec<String>,
}

/// Everything the pipeline sends out.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PipelineEvent {
    Classification(ClassificationEvent),
    GapDetected(GapNotice),
    RiskEscalated(RiskAlert),
    KeywordsDetected(RiskAlert),
    SessionEnded(SessionSummary),
}

impl PipelineEvent {
    pub fn session_id(&self) -> &SessionId {
        match self {
            PipelineEvent::Classification(e) => &e.session_id,
            PipelineEvent::GapDetected(g) => &g.session_id,
            PipelineEvent::RiskEscalated(a) | PipelineEvent::KeywordsDetected(a) => &a.session_id,
            PipelineEvent::SessionEnded(s) => &s.session_id,
        }
    }
}

/// Wire form of a chunk submission result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmitOutcome {
    pub accepted: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl SubmitOutcome {
    pub fn accepted() -> Self {
        Self {
            accepted: true,
            reason: None,
            message: None,
        }
    }

    pub fn rejected(error: &PipelineError) -> Self {
        Self {
            accepted: false,
            reason: Some(error.reason_code().to_string()),
            message: Some(error.to_string()),
        }
    }
}

impl From<&Result<(), PipelineError>> for SubmitOutcome {
    fn from(result: &Result<(), PipelineError>) -> Self {
        match result {
            Ok(()) => SubmitOutcome::accepted(),
            Err(e) => SubmitOutcome::rejected(e),
        }
    }
}
