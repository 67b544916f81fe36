//! Call reports and the sink they are saved to

use crate::types::{ClassificationResult, SessionId, SessionSummary};
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Where a report's transcript came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReportSource {
    LiveSession { session_id: SessionId },
    Text,
}

/// Persisted record of one classified call or text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallReport {
    pub report_id: String,
    pub created_at: DateTime<Utc>,
    pub source: ReportSource,
    pub transcript: String,
    /// Final verdict; absent for sessions that never processed a chunk
    pub result: Option<ClassificationResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<SessionSummary>,
}

impl CallReport {
    fn new(source: ReportSource, transcript: String) -> Self {
        Self {
            report_id: uuid::Uuid::new_v4().to_string(),
            created_at: Utc::now(),
            source,
            transcript,
            result: None,
            summary: None,
        }
    }

    /// Report for a one-shot text classification
    pub fn from_text(text: &str, result: ClassificationResult) -> Self {
        Self {
            result: Some(result),
            ..Self::new(ReportSource::Text, text.to_string())
        }
    }

    /// Report for a finished live session
    pub fn from_summary(summary: SessionSummary) -> Self {
        let source = ReportSource::LiveSession {
            session_id: summary.session_id.clone(),
        };
        let mut report = Self::new(source, summary.final_transcript.clone());
        report.result = summary.final_result.clone();
        report.summary = Some(summary);
        report
    }
}

/// Storage for call reports.
#[async_trait]
pub trait ReportSink: Send + Sync {
    /// Persist a report and return its id
    async fn save_result(&self, report: &CallReport) -> Result<String>;
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::types::{EndReason, Label, LinguisticFeatures, RiskLevel};
    use std::sync::Mutex;

    /// Sink that keeps reports in memory
    #[derive(Default)]
    pub(crate) struct MemorySink {
        pub reports: Mutex<Vec<CallReport>>,
    }

    #[async_trait]
    impl ReportSink for MemorySink {
        async fn save_result(&self, report: &CallReport) -> Result<String> {
            self.reports.lock().unwrap().push(report.clone());
            Ok(report.report_id.clone())
        }
    }

    fn result() -> ClassificationResult {
        ClassificationResult {
            label: Label::Safe,
            confidence: 1.0,
            risk_score: 0.0,
            rationale: "No significant fraud indicators detected.".to_string(),
            matched_patterns: Vec::new(),
            linguistic_features: LinguisticFeatures::default(),
            recommendation: Label::Safe.recommendation().to_string(),
            model_score: None,
            catalog_version: "test".to_string(),
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_text_report() {
        let report = CallReport::from_text("hello", result());
        assert_eq!(report.source, ReportSource::Text);
        assert!(report.result.is_some());

        let json = serde_json::to_string(&report).unwrap();
        assert!(json.contains("\"kind\":\"text\""));
        assert!(!json.contains("summary"));
    }

    #[tokio::test]
    async fn test_session_report_saved() {
        let summary = SessionSummary {
            session_id: SessionId::from("call-1"),
            end_reason: EndReason::Stopped,
            started_at: Utc::now(),
            ended_at: Utc::now(),
            duration_ms: 10,
            final_transcript: "hi there".to_string(),
            chunks_processed: 1,
            gaps: 0,
            escalations: 0,
            keyword_alerts: 0,
            final_result: Some(result()),
            peak_risk_score: 0.0,
            final_risk_level: RiskLevel::Low,
            key_indicators: Vec::new(),
            recommendations: RiskLevel::Low.final_recommendations(),
        };

        let report = CallReport::from_summary(summary);
        assert_eq!(report.transcript, "hi there");
        assert_eq!(
            report.source,
            ReportSource::LiveSession {
                session_id: SessionId::from("call-1")
            }
        );

        let sink = MemorySink::default();
        let id = sink.save_result(&report).await.unwrap();
        assert_eq!(id, report.report_id);
        assert_eq!(sink.reports.lock().unwrap().len(), 1);
    }
}
