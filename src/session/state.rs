//! Per-call session state, owned by the session's worker

use super::transcript::TranscriptAccumulator;
use crate::config::SessionConfig;
use crate::models::FraudClassifier;
use crate::types::{
    ClassificationResult, EndReason, SessionId, SessionSummary, TranscriptSegment,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle of a call session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    Idle,
    Active,
    Stopped,
}

/// One live call.
#[derive(Debug)]
pub struct CallSession {
    session_id: SessionId,
    state: SessionState,
    transcript: TranscriptAccumulator,
    last_result: Option<ClassificationResult>,
    created_at: DateTime<Utc>,
    chunks_processed: u64,
    gaps: u64,
    escalations: u64,
    keyword_alerts: u64,
    peak_risk_score: f64,
}

impl CallSession {
    pub fn new(session_id: SessionId, config: &SessionConfig) -> Self {
        Self {
            session_id,
            state: SessionState::Idle,
            transcript: TranscriptAccumulator::new(
                config.overlap_window_words,
                config.min_overlap_words,
            ),
            last_result: None,
            created_at: Utc::now(),
            chunks_processed: 0,
            gaps: 0,
            escalations: 0,
            keyword_alerts: 0,
            peak_risk_score: 0.0,
        }
    }

    pub fn activate(&mut self) {
        if self.state == SessionState::Idle {
            self.state = SessionState::Active;
        }
    }

    /// Add a transcribed segment; returns the text that was appended
    pub fn apply_segment(&mut self, segment: TranscriptSegment) -> String {
        self.chunks_processed += 1;
        self.transcript.append(segment)
    }

    /// Store a fresh verdict, returning the previous risk score
    pub fn record_result(&mut self, result: ClassificationResult) -> f64 {
        let previous = self.current_risk();
        self.peak_risk_score = self.peak_risk_score.max(result.risk_score);
        self.last_result = Some(result);
        previous
    }

    pub fn record_gap(&mut self) {
        self.gaps += 1;
    }

    pub fn record_escalation(&mut self) {
        self.escalations += 1;
    }

    pub fn record_keyword_alert(&mut self) {
        self.keyword_alerts += 1;
    }

    pub fn stop(&mut self) {
        self.state = SessionState::Stopped;
    }

    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn accumulated_transcript(&self) -> &str {
        self.transcript.text()
    }

    pub fn segments(&self) -> &[TranscriptSegment] {
        self.transcript.segments()
    }

    pub fn last_result(&self) -> Option<&ClassificationResult> {
        self.last_result.as_ref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Risk of the latest verdict, 0 before the first one
    pub fn current_risk(&self) -> f64 {
        self.last_result.as_ref().map_or(0.0, |r| r.risk_score)
    }

    /// End-of-call report
    pub fn summary(&self, end_reason: EndReason, classifier: &FraudClassifier) -> SessionSummary {
        let ended_at = Utc::now();
        let final_risk_level = classifier.risk_level(self.current_risk());

        SessionSummary {
            session_id: self.session_id.clone(),
            end_reason,
            started_at: self.created_at,
            ended_at,
            duration_ms: (ended_at - self.created_at).num_milliseconds().max(0) as u64,
            final_transcript: self.transcript.text().to_string(),
            chunks_processed: self.chunks_processed,
            gaps: self.gaps,
            escalations: self.escalations,
            keyword_alerts: self.keyword_alerts,
            final_result: self.last_result.clone(),
            peak_risk_score: self.peak_risk_score,
            final_risk_level,
            key_indicators: self
                .last_result
                .as_ref()
                .map(|r| r.indicators())
                .unwrap_or_default(),
            recommendations: final_risk_level.final_recommendations(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ScoringConfig;
    use crate::linguistic::LinguisticAnalyzer;
    use crate::models::PatternCatalog;
    use crate::types::RiskLevel;
    use std::sync::Arc;

    fn classifier() -> FraudClassifier {
        FraudClassifier::new(
            Arc::new(PatternCatalog::builtin().unwrap()),
            LinguisticAnalyzer::new(),
            ScoringConfig::default(),
        )
        .unwrap()
    }

    #[test]
    fn test_lifecycle() {
        let mut session = CallSession::new(SessionId::from("s1"), &SessionConfig::default());
        assert_eq!(session.state(), SessionState::Idle);
        session.activate();
        assert_eq!(session.state(), SessionState::Active);
        session.stop();
        session.activate();
        assert_eq!(session.state(), SessionState::Stopped);
    }

    #[test]
    fn test_summary_tracks_peak_and_final() {
        let classifier = classifier();
        let mut session = CallSession::new(SessionId::from("s2"), &SessionConfig::default());
        session.activate();

        session.apply_segment(TranscriptSegment::accepted(
            1,
            "this is the IRS, there is a warrant for your arrest",
            0.9,
            "text",
        ));
        let result = classifier.classify(session.accumulated_transcript());
        let high = result.risk_score;
        assert_eq!(session.record_result(result), 0.0);

        let calm = classifier.classify("hello");
        assert_eq!(session.record_result(calm), high);

        let summary = session.summary(EndReason::Stopped, &classifier);
        assert_eq!(summary.chunks_processed, 1);
        assert_eq!(summary.peak_risk_score, high);
        assert_eq!(summary.final_risk_level, RiskLevel::Low);
        assert!(summary.final_transcript.contains("IRS"));
        assert!(!summary.recommendations.is_empty());
    }
}
