//! Live-call pipeline
//!
//! Chunks for a session are reordered, transcribed, folded into the
//! session's transcript and re-classified. Results go out on a single event
//! channel returned by [`SessionPipeline::new`]; events of one session keep
//! their order.

use super::registry::{SessionHandle, SessionRegistry};
use super::worker::{relay_events, SessionCommand, SessionWorker, WorkerContext};
use crate::config::SessionConfig;
use crate::error::{PipelineError, PipelineResult};
use crate::metrics::PipelineMetrics;
use crate::models::FraudClassifier;
use crate::report::ReportSink;
use crate::transcription::TranscriptionGateway;
use crate::types::{ChunkPayload, ClassificationResult, PipelineEvent, SessionId};
use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info};

/// Entry point for live sessions and one-shot text classification
pub struct SessionPipeline {
    ctx: WorkerContext,
    events: mpsc::Sender<PipelineEvent>,
}

impl SessionPipeline {
    /// Create a pipeline and the receiver for its events
    pub fn new(
        classifier: Arc<FraudClassifier>,
        gateway: Arc<TranscriptionGateway>,
        config: SessionConfig,
        metrics: Arc<PipelineMetrics>,
    ) -> (Self, mpsc::Receiver<PipelineEvent>) {
        let (events, events_rx) = mpsc::channel(config.event_buffer.max(1));
        let registry = Arc::new(SessionRegistry::new(Duration::from_secs(
            config.stopped_retention_secs,
        )));

        let pipeline = Self {
            ctx: WorkerContext {
                classifier,
                gateway,
                config,
                metrics,
                registry,
                report_sink: None,
            },
            events,
        };
        (pipeline, events_rx)
    }

    /// Save a report for every session that ends
    pub fn with_report_sink(mut self, sink: Arc<dyn ReportSink>) -> Self {
        self.ctx.report_sink = Some(sink);
        self
    }

    /// Open a new session and start its worker
    pub fn start_session(&self) -> SessionId {
        let session_id = SessionId::generate();

        let (inbox, inbox_rx) = mpsc::channel(self.ctx.config.inbox_capacity.max(1));
        let (stop, stop_rx) = oneshot::channel();
        let (outbox, outbox_rx) = mpsc::channel(self.ctx.config.session_event_buffer.max(1));
        tokio::spawn(relay_events(outbox_rx, self.events.clone()));

        let worker = SessionWorker::new(session_id.clone(), self.ctx.clone(), outbox);
        let task = tokio::spawn(worker.run(inbox_rx, stop_rx));

        self.ctx
            .registry
            .insert(session_id.clone(), SessionHandle { inbox, stop, task });
        self.ctx.metrics.session_started();

        info!(session_id = %session_id, "Session started");
        session_id
    }

    /// Queue a chunk for a session.
    ///
    /// Returns once the chunk has been accepted into the session's reorder
    /// buffer, not once it has been transcribed.
    pub async fn submit_chunk(
        &self,
        session_id: &SessionId,
        sequence_number: u64,
        payload: ChunkPayload,
    ) -> PipelineResult<()> {
        let inbox = self.ctx.registry.inbox(session_id).map_err(|e| {
            self.ctx.metrics.record_rejection();
            debug!(session_id = %session_id, sequence_number, error = %e, "Chunk refused");
            e
        })?;

        let (reply, reply_rx) = oneshot::channel();
        inbox
            .send(SessionCommand::Chunk {
                sequence_number,
                payload,
                reply,
            })
            .await
            .map_err(|_| PipelineError::stopped_session(session_id))?;

        // Worker went away before answering
        reply_rx
            .await
            .map_err(|_| PipelineError::stopped_session(session_id))?
    }

    /// Stop a session and wait for its final event.
    ///
    /// Stopping an already stopped session is a no-op.
    pub async fn stop_session(&self, session_id: &SessionId) -> PipelineResult<()> {
        match self.ctx.registry.begin_stop(session_id)? {
            Some(handle) => {
                handle.shutdown().await;
                info!(session_id = %session_id, "Session stopped");
            }
            None => debug!(session_id = %session_id, "Session already stopped"),
        }
        Ok(())
    }

    /// Classify a standalone piece of text without touching any session
    pub fn classify_text(&self, text: &str) -> ClassificationResult {
        let result = self.ctx.classifier.classify(text);
        self.ctx
            .metrics
            .record_text_classification(result.label, result.risk_score);
        result
    }

    pub fn active_sessions(&self) -> usize {
        self.ctx.registry.active_count()
    }

    pub fn classifier(&self) -> &FraudClassifier {
        &self.ctx.classifier
    }

    /// Stop every active session
    pub async fn shutdown(&self) {
        let handles = self.ctx.registry.drain_active();
        if handles.is_empty() {
            return;
        }
        info!(sessions = handles.len(), "Stopping active sessions");
        join_all(handles.into_iter().map(SessionHandle::shutdown)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ScoringConfig;
    use crate::error::{ChunkRejection, SessionPresence};
    use crate::linguistic::LinguisticAnalyzer;
    use crate::models::PatternCatalog;
    use crate::report::tests::MemorySink;
    use crate::report::ReportSource;
    use crate::transcription::gateway::tests::MockEngine;
    use crate::types::{AlertKind, ClassificationEvent, EndReason, Label, RiskLevel, SegmentQuality};
    use std::time::Instant;
    use tokio::time::timeout;

    const WAIT: Duration = Duration::from_secs(5);

    fn classifier() -> Arc<FraudClassifier> {
        Arc::new(
            FraudClassifier::new(
                Arc::new(PatternCatalog::builtin().unwrap()),
                LinguisticAnalyzer::new(),
                ScoringConfig::default(),
            )
            .unwrap(),
        )
    }

    fn session_config(reorder_window_ms: u64) -> SessionConfig {
        SessionConfig {
            reorder_window_ms,
            ..SessionConfig::default()
        }
    }

    fn pipeline_with(
        gateway: TranscriptionGateway,
        config: SessionConfig,
    ) -> (SessionPipeline, mpsc::Receiver<PipelineEvent>) {
        SessionPipeline::new(
            classifier(),
            Arc::new(gateway),
            config,
            Arc::new(PipelineMetrics::new()),
        )
    }

    fn text_pipeline() -> (SessionPipeline, mpsc::Receiver<PipelineEvent>) {
        pipeline_with(TranscriptionGateway::new(0.6), session_config(10_000))
    }

    async fn next_event(events: &mut mpsc::Receiver<PipelineEvent>) -> PipelineEvent {
        timeout(WAIT, events.recv())
            .await
            .expect("timed out waiting for event")
            .expect("event channel closed")
    }

    async fn next_classification(
        events: &mut mpsc::Receiver<PipelineEvent>,
    ) -> ClassificationEvent {
        loop {
            if let PipelineEvent::Classification(event) = next_event(events).await {
                return event;
            }
        }
    }

    async fn submit_text(pipeline: &SessionPipeline, id: &SessionId, seq: u64, text: &str) {
        pipeline
            .submit_chunk(id, seq, ChunkPayload::text(text))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_out_of_order_matches_in_order() {
        let chunks = [
            "hello this is your bank",
            "your account has been suspended",
            "please verify your password now",
        ];

        let (pipeline, mut events) = text_pipeline();

        let ordered = pipeline.start_session();
        for (i, text) in chunks.iter().enumerate() {
            submit_text(&pipeline, &ordered, i as u64 + 1, text).await;
        }
        let mut ordered_events = Vec::new();
        for _ in 0..3 {
            ordered_events.push(next_classification(&mut events).await);
        }

        let shuffled = pipeline.start_session();
        for seq in [2u64, 1, 3] {
            submit_text(&pipeline, &shuffled, seq, chunks[seq as usize - 1]).await;
        }
        let mut shuffled_events = Vec::new();
        for _ in 0..3 {
            shuffled_events.push(next_classification(&mut events).await);
        }

        let sequences: Vec<u64> = shuffled_events
            .iter()
            .map(|e| e.segment.sequence_number)
            .collect();
        assert_eq!(sequences, vec![1, 2, 3]);

        let ordered_last = ordered_events.last().unwrap();
        let shuffled_last = shuffled_events.last().unwrap();
        assert_eq!(
            ordered_last.accumulated_transcript,
            shuffled_last.accumulated_transcript
        );
        assert_eq!(ordered_last.result, shuffled_last.result);
        assert_eq!(shuffled_last.session_id, shuffled);
    }

    #[tokio::test]
    async fn test_overlapping_chunks_deduplicated() {
        let (pipeline, mut events) = text_pipeline();
        let id = pipeline.start_session();

        submit_text(&pipeline, &id, 1, "please send a wire transfer now").await;
        submit_text(&pipeline, &id, 2, "transfer now to this account").await;

        next_classification(&mut events).await;
        let event = next_classification(&mut events).await;
        assert_eq!(
            event.accumulated_transcript,
            "please send a wire transfer now to this account"
        );
    }

    #[tokio::test]
    async fn test_unknown_session_rejected() {
        let (pipeline, _events) = text_pipeline();
        let id = SessionId::from("nope");

        let err = pipeline
            .submit_chunk(&id, 1, ChunkPayload::text("hi"))
            .await
            .unwrap_err();
        assert_eq!(err, PipelineError::unknown_session(&id));

        let err = pipeline.stop_session(&id).await.unwrap_err();
        assert_eq!(err.reason_code(), "unknown_session");
    }

    #[tokio::test]
    async fn test_stop_is_idempotent_and_final() {
        let sink = Arc::new(MemorySink::default());
        let (pipeline, mut events) = text_pipeline();
        let pipeline = pipeline.with_report_sink(sink.clone());

        let id = pipeline.start_session();
        submit_text(&pipeline, &id, 1, "hi mom, dinner at six?").await;
        next_classification(&mut events).await;

        pipeline.stop_session(&id).await.unwrap();
        pipeline.stop_session(&id).await.unwrap();
        assert_eq!(pipeline.active_sessions(), 0);

        let err = pipeline
            .submit_chunk(&id, 2, ChunkPayload::text("more"))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            PipelineError::InvalidSessionState {
                session_id: id.clone(),
                state: SessionPresence::Stopped,
            }
        );

        let summary = match next_event(&mut events).await {
            PipelineEvent::SessionEnded(summary) => summary,
            other => panic!("expected session end, got {:?}", other),
        };
        assert_eq!(summary.end_reason, EndReason::Stopped);
        assert_eq!(summary.chunks_processed, 1);
        assert_eq!(summary.final_transcript, "hi mom, dinner at six?");

        let start = Instant::now();
        loop {
            if !sink.reports.lock().unwrap().is_empty() {
                break;
            }
            assert!(start.elapsed() < WAIT, "report was never saved");
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        let reports = sink.reports.lock().unwrap();
        assert_eq!(
            reports[0].source,
            ReportSource::LiveSession {
                session_id: id.clone()
            }
        );
    }

    #[tokio::test]
    async fn test_duplicate_chunk_rejected() {
        let (pipeline, _events) = text_pipeline();
        let id = pipeline.start_session();

        submit_text(&pipeline, &id, 3, "out of order").await;
        let err = pipeline
            .submit_chunk(&id, 3, ChunkPayload::text("again"))
            .await
            .unwrap_err();
        assert_eq!(err.reason_code(), "duplicate_sequence");
    }

    #[tokio::test]
    async fn test_gap_skipped_then_late_chunk_rejected() {
        let (pipeline, mut events) =
            pipeline_with(TranscriptionGateway::new(0.6), session_config(50));
        let id = pipeline.start_session();

        submit_text(&pipeline, &id, 1, "hello").await;
        submit_text(&pipeline, &id, 3, "are you there").await;

        let mut saw_gap = false;
        let mut classified = Vec::new();
        while classified.len() < 2 {
            match next_event(&mut events).await {
                PipelineEvent::GapDetected(gap) => {
                    assert_eq!((gap.missing_from, gap.missing_to), (2, 2));
                    saw_gap = true;
                }
                PipelineEvent::Classification(event) => {
                    classified.push(event.segment.sequence_number)
                }
                other => panic!("unexpected event {:?}", other),
            }
        }
        assert!(saw_gap);
        assert_eq!(classified, vec![1, 3]);

        let err = pipeline
            .submit_chunk(&id, 2, ChunkPayload::text("late"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            PipelineError::ChunkRejected {
                reason: ChunkRejection::Late,
                sequence_number: 2,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_all_engines_failing_still_emits() {
        let gateway = TranscriptionGateway::new(0.6)
            .with_engine(
                Arc::new(MockEngine::failing("primary")),
                Duration::from_millis(100),
                None,
            )
            .with_engine(
                Arc::new(MockEngine::failing("backup")),
                Duration::from_millis(100),
                None,
            );
        let (pipeline, mut events) = pipeline_with(gateway, session_config(10_000));
        let id = pipeline.start_session();

        pipeline
            .submit_chunk(&id, 1, ChunkPayload::audio(16000, vec![1, 2, 3]))
            .await
            .unwrap();

        let event = next_classification(&mut events).await;
        assert_eq!(event.segment.quality, SegmentQuality::Unavailable);
        assert_eq!(event.result.label, Label::Safe);
        assert_eq!(event.accumulated_transcript, "");
    }

    #[tokio::test]
    async fn test_escalation_alert() {
        let (pipeline, mut events) = text_pipeline();
        let id = pipeline.start_session();

        submit_text(&pipeline, &id, 1, "hello, how are you today").await;
        submit_text(
            &pipeline,
            &id,
            2,
            "this is the IRS, you must wire transfer money immediately or face arrest. \
             verify your social security number now",
        )
        .await;

        let mut alert = None;
        while alert.is_none() {
            if let PipelineEvent::RiskEscalated(a) = next_event(&mut events).await {
                alert = Some(a);
            }
        }
        let alert = alert.unwrap();
        assert_eq!(alert.session_id, id);
        assert_eq!(alert.previous_risk_score, 0.0);
        assert!(alert.risk_score > 0.5);
        assert!(!alert.indicators.is_empty());
    }

    #[tokio::test]
    async fn test_slow_engine_does_not_block_intake() {
        let engine = MockEngine::ok("slow", "hello there", 0.9).slow(Duration::from_secs(2));
        let gateway = TranscriptionGateway::new(0.6).with_engine(
            Arc::new(engine),
            Duration::from_secs(10),
            None,
        );
        let (pipeline, _events) = pipeline_with(gateway, session_config(10_000));
        let id = pipeline.start_session();

        let audio = || ChunkPayload::audio(16000, vec![1, 2, 3]);
        pipeline.submit_chunk(&id, 1, audio()).await.unwrap();

        let accepted = timeout(
            Duration::from_millis(500),
            pipeline.submit_chunk(&id, 2, audio()),
        )
        .await
        .expect("intake blocked behind transcription");
        assert!(accepted.is_ok());
    }

    #[tokio::test]
    async fn test_stop_drops_in_flight_transcription() {
        let engine = MockEngine::ok("stuck", "never arrives", 0.9).slow(Duration::from_secs(30));
        let gateway = TranscriptionGateway::new(0.6).with_engine(
            Arc::new(engine),
            Duration::from_secs(60),
            None,
        );
        let (pipeline, mut events) = pipeline_with(gateway, session_config(10_000));
        let id = pipeline.start_session();

        pipeline
            .submit_chunk(&id, 1, ChunkPayload::audio(16000, vec![1, 2, 3]))
            .await
            .unwrap();
        // Let the worker pick the chunk up
        tokio::time::sleep(Duration::from_millis(50)).await;

        timeout(Duration::from_millis(500), pipeline.stop_session(&id))
            .await
            .expect("stop waited on the transcription")
            .unwrap();

        match next_event(&mut events).await {
            PipelineEvent::SessionEnded(summary) => {
                assert_eq!(summary.end_reason, EndReason::Stopped);
                assert_eq!(summary.chunks_processed, 0);
                assert_eq!(summary.final_transcript, "");
            }
            other => panic!("expected session end, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_keyword_alert_on_single_segment() {
        let (pipeline, mut events) = text_pipeline();
        let id = pipeline.start_session();

        submit_text(&pipeline, &id, 1, "hello, this is the IRS calling").await;

        let alert = match next_event(&mut events).await {
            PipelineEvent::KeywordsDetected(alert) => alert,
            other => panic!("expected keyword alert, got {:?}", other),
        };
        assert_eq!(alert.kind, AlertKind::ScamKeywords);
        assert_eq!(alert.session_id, id);
        assert_eq!(alert.risk_level, RiskLevel::Critical);
        assert_eq!(alert.indicators, vec!["irs".to_string()]);
        assert_eq!(
            alert.segment_text.as_deref(),
            Some("hello, this is the IRS calling")
        );

        let event = next_classification(&mut events).await;
        assert_eq!(event.segment.sequence_number, 1);

        // Low-severity keywords classify without alerting
        submit_text(&pipeline, &id, 2, "you may be due a refund").await;
        let event = next_classification(&mut events).await;
        assert_eq!(event.segment.sequence_number, 2);

        pipeline.stop_session(&id).await.unwrap();
        loop {
            match next_event(&mut events).await {
                PipelineEvent::KeywordsDetected(a) => panic!("unexpected alert {:?}", a),
                PipelineEvent::SessionEnded(summary) => {
                    assert_eq!(summary.keyword_alerts, 1);
                    break;
                }
                _ => {}
            }
        }
    }

    #[tokio::test]
    async fn test_keyword_alerts_can_be_disabled() {
        let config = SessionConfig {
            keyword_alerts: false,
            ..session_config(10_000)
        };
        let (pipeline, mut events) = pipeline_with(TranscriptionGateway::new(0.6), config);
        let id = pipeline.start_session();

        submit_text(&pipeline, &id, 1, "this is the IRS").await;
        match next_event(&mut events).await {
            PipelineEvent::Classification(event) => assert_eq!(event.segment.sequence_number, 1),
            other => panic!("expected classification, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_backlogged_session_does_not_stall_others() {
        let config = SessionConfig {
            event_buffer: 1,
            session_event_buffer: 2,
            keyword_alerts: false,
            ..session_config(10_000)
        };
        let (pipeline, mut events) = pipeline_with(TranscriptionGateway::new(0.6), config);
        let pipeline = Arc::new(pipeline);

        // Nobody reads events yet, so this session backs up
        let noisy = pipeline.start_session();
        {
            let pipeline = pipeline.clone();
            let noisy = noisy.clone();
            tokio::spawn(async move {
                for seq in 1..=20 {
                    let _ = pipeline
                        .submit_chunk(&noisy, seq, ChunkPayload::text("hello again"))
                        .await;
                }
            });
        }
        tokio::time::sleep(Duration::from_millis(100)).await;

        let quiet = pipeline.start_session();
        for seq in 1..=2 {
            timeout(
                Duration::from_millis(500),
                pipeline.submit_chunk(&quiet, seq, ChunkPayload::text("hi mom")),
            )
            .await
            .expect("intake stalled behind another session's events")
            .unwrap();
        }

        let mut quiet_sequences = Vec::new();
        while quiet_sequences.len() < 2 {
            if let PipelineEvent::Classification(event) = next_event(&mut events).await {
                if event.session_id == quiet {
                    quiet_sequences.push(event.segment.sequence_number);
                }
            }
        }
        assert_eq!(quiet_sequences, vec![1, 2]);
    }

    #[tokio::test]
    async fn test_classify_text_is_stateless() {
        let (pipeline, _events) = text_pipeline();
        let scam = pipeline.classify_text(
            "This is the IRS. Give me your social security number and wire the money now.",
        );
        assert_eq!(scam.label, Label::Scam);

        let safe = pipeline.classify_text("Hi mom, see you at dinner.");
        assert_eq!(safe.label, Label::Safe);
        assert_eq!(pipeline.active_sessions(), 0);
    }

    #[tokio::test]
    async fn test_shutdown_stops_all_sessions() {
        let (pipeline, mut events) = text_pipeline();
        pipeline.start_session();
        pipeline.start_session();
        assert_eq!(pipeline.active_sessions(), 2);

        pipeline.shutdown().await;
        assert_eq!(pipeline.active_sessions(), 0);

        let mut ended = 0;
        while ended < 2 {
            if let PipelineEvent::SessionEnded(_) = next_event(&mut events).await {
                ended += 1;
            }
        }
    }
}
