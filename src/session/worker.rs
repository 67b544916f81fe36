//! Per-session worker task
//!
//! Each live call runs in its own task that exclusively owns the
//! [`CallSession`]. The task multiplexes four things: the stop signal, the
//! transcription currently in flight, chunk intake, and the gap timer of
//! the reorder buffer. Intake is answered even while a transcription is
//! running, so a slow engine never blocks callers.
//!
//! Events go into a small per-session outbox that a relay task drains onto
//! the pipeline's shared channel. A slow consumer fills one session's
//! outbox at a time instead of stalling every worker on the shared channel.

use super::registry::SessionRegistry;
use super::reorder::ReorderBuffer;
use super::state::CallSession;
use crate::config::SessionConfig;
use crate::error::{ChunkRejection, PipelineError, PipelineResult};
use crate::metrics::PipelineMetrics;
use crate::models::FraudClassifier;
use crate::report::{CallReport, ReportSink};
use crate::screening::KeywordScreen;
use crate::transcription::TranscriptionGateway;
use crate::types::{
    ChunkPayload, ClassificationEvent, ClassificationResult, EndReason, GapNotice, PipelineEvent,
    RiskAlert, SessionId, TranscriptSegment,
};
use chrono::Utc;
use futures::future::BoxFuture;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

/// Messages accepted by a session worker
#[derive(Debug)]
pub(crate) enum SessionCommand {
    Chunk {
        sequence_number: u64,
        payload: ChunkPayload,
        reply: oneshot::Sender<PipelineResult<()>>,
    },
}

/// Shared collaborators handed to every worker
#[derive(Clone)]
pub(crate) struct WorkerContext {
    pub classifier: Arc<FraudClassifier>,
    pub gateway: Arc<TranscriptionGateway>,
    pub config: SessionConfig,
    pub metrics: Arc<PipelineMetrics>,
    pub registry: Arc<SessionRegistry>,
    pub report_sink: Option<Arc<dyn ReportSink>>,
}

/// The event receiver went away
struct EventsClosed;

type InFlight = BoxFuture<'static, (TranscriptSegment, Instant)>;

pub(crate) struct SessionWorker {
    ctx: WorkerContext,
    session: CallSession,
    reorder: ReorderBuffer<ChunkPayload>,
    screen: KeywordScreen,
    outbox: mpsc::Sender<PipelineEvent>,
}

impl SessionWorker {
    pub fn new(
        session_id: SessionId,
        ctx: WorkerContext,
        outbox: mpsc::Sender<PipelineEvent>,
    ) -> Self {
        let session = CallSession::new(session_id, &ctx.config);
        let reorder = ReorderBuffer::new(
            ctx.config.first_sequence,
            ctx.config.max_pending_chunks,
            Duration::from_millis(ctx.config.reorder_window_ms),
        );
        Self {
            ctx,
            session,
            reorder,
            screen: KeywordScreen::new(),
            outbox,
        }
    }

    fn session_id(&self) -> &SessionId {
        self.session.session_id()
    }

    /// Drive the session until it is stopped or its channels close
    pub async fn run(
        mut self,
        mut inbox: mpsc::Receiver<SessionCommand>,
        mut stop: oneshot::Receiver<()>,
    ) {
        self.session.activate();
        debug!(session_id = %self.session_id(), "Session worker started");

        let mut in_flight: Option<InFlight> = None;

        let end_reason = loop {
            if in_flight.is_none() {
                in_flight = self.next_transcription();
            }
            let gap_deadline = self.reorder.gap_deadline();

            tokio::select! {
                biased;

                signal = &mut stop => {
                    break match signal {
                        Ok(()) => EndReason::Stopped,
                        Err(_) => EndReason::ChannelClosed,
                    };
                }

                (segment, started) = wait_for(&mut in_flight) => {
                    in_flight = None;
                    if self.on_segment(segment, started).await.is_err() {
                        break EndReason::ChannelClosed;
                    }
                }

                command = inbox.recv() => match command {
                    Some(command) => self.handle_command(command),
                    None => break EndReason::ChannelClosed,
                },

                _ = wait_until(gap_deadline) => {
                    if self.on_gap_timeout().await.is_err() {
                        break EndReason::ChannelClosed;
                    }
                }
            }
        };

        if in_flight.take().is_some() {
            debug!(session_id = %self.session_id(), "Dropping in-flight transcription");
        }
        self.finish(end_reason).await;
    }

    fn handle_command(&mut self, command: SessionCommand) {
        match command {
            SessionCommand::Chunk {
                sequence_number,
                payload,
                reply,
            } => {
                let result = self
                    .reorder
                    .offer(sequence_number, payload, Instant::now())
                    .map_err(|reason| self.rejected(sequence_number, reason));
                // The caller may have given up waiting
                let _ = reply.send(result);
            }
        }
    }

    fn rejected(&self, sequence_number: u64, reason: ChunkRejection) -> PipelineError {
        self.ctx.metrics.record_rejection();
        match reason {
            ChunkRejection::Late => warn!(
                session_id = %self.session_id(),
                sequence_number,
                "Late chunk rejected, its slot was already skipped"
            ),
            _ => debug!(
                session_id = %self.session_id(),
                sequence_number,
                reason = %reason,
                "Chunk rejected"
            ),
        }
        PipelineError::ChunkRejected {
            session_id: self.session_id().clone(),
            sequence_number,
            reason,
        }
    }

    /// Start transcribing the next in-order chunk, if it has arrived
    fn next_transcription(&mut self) -> Option<InFlight> {
        let (sequence_number, payload) = self.reorder.pop_ready()?;
        let gateway = self.ctx.gateway.clone();
        let started = Instant::now();
        Some(Box::pin(async move {
            (gateway.transcribe(sequence_number, payload).await, started)
        }))
    }

    async fn on_segment(
        &mut self,
        segment: TranscriptSegment,
        started: Instant,
    ) -> Result<(), EventsClosed> {
        let quality = segment.quality;
        let sequence_number = segment.sequence_number;
        let appended = self.session.apply_segment(segment.clone());

        let result = self
            .ctx
            .classifier
            .classify(self.session.accumulated_transcript());
        let previous_risk = self.session.record_result(result.clone());

        if self.ctx.config.keyword_alerts {
            self.screen_segment(&appended, previous_risk, &result).await?;
        }

        self.ctx
            .metrics
            .record_chunk(started.elapsed(), result.label, result.risk_score, quality);

        debug!(
            session_id = %self.session_id(),
            sequence_number,
            quality = ?quality,
            label = %result.label,
            risk_score = result.risk_score,
            "Chunk classified"
        );

        let escalated = result.risk_score > self.ctx.config.escalation_threshold
            && result.risk_score > previous_risk + self.ctx.config.escalation_delta;
        let alert = escalated.then(|| {
            RiskAlert::new(
                self.session_id().clone(),
                previous_risk,
                &result,
                self.ctx.classifier.risk_thresholds(),
            )
            .with_indicators(result.indicators())
        });

        self.emit(PipelineEvent::Classification(ClassificationEvent {
            session_id: self.session_id().clone(),
            segment,
            accumulated_transcript: self.session.accumulated_transcript().to_string(),
            result,
            timestamp: Utc::now(),
        }))
        .await?;

        if let Some(alert) = alert {
            self.session.record_escalation();
            self.ctx.metrics.record_escalation();
            warn!(
                session_id = %self.session_id(),
                previous_risk = alert.previous_risk_score,
                risk_score = alert.risk_score,
                risk_level = ?alert.risk_level,
                "Risk escalated"
            );
            self.emit(PipelineEvent::RiskEscalated(alert)).await?;
        }

        Ok(())
    }

    /// Alert on high-risk keywords in the text this segment added
    async fn screen_segment(
        &mut self,
        appended: &str,
        previous_risk: f64,
        result: &ClassificationResult,
    ) -> Result<(), EventsClosed> {
        let Some(hit) = self.screen.screen(appended).filter(|hit| hit.is_alert()) else {
            return Ok(());
        };

        self.session.record_keyword_alert();
        self.ctx.metrics.record_keyword_alert();
        warn!(
            session_id = %self.session_id(),
            severity = ?hit.severity,
            keywords = ?hit.keywords,
            "Fraud keywords detected in segment"
        );

        let alert = RiskAlert::keywords(
            self.session_id().clone(),
            previous_risk,
            hit.severity,
            appended,
            result.label,
        )
        .with_indicators(hit.keywords);
        self.emit(PipelineEvent::KeywordsDetected(alert)).await
    }

    async fn on_gap_timeout(&mut self) -> Result<(), EventsClosed> {
        let Some((missing_from, missing_to)) = self.reorder.skip_gap() else {
            return Ok(());
        };

        self.session.record_gap();
        self.ctx.metrics.record_gap();
        warn!(
            session_id = %self.session_id(),
            missing_from,
            missing_to,
            "Sequence gap skipped after reorder window"
        );

        self.emit(PipelineEvent::GapDetected(GapNotice {
            session_id: self.session_id().clone(),
            missing_from,
            missing_to,
            timestamp: Utc::now(),
        }))
        .await
    }

    async fn emit(&self, event: PipelineEvent) -> Result<(), EventsClosed> {
        let event = match self.outbox.try_send(event) {
            Ok(()) => return Ok(()),
            Err(TrySendError::Full(event)) => event,
            Err(TrySendError::Closed(_)) => return Err(self.events_closed()),
        };

        // Only this session waits; other outboxes keep draining
        self.ctx.metrics.record_event_backlog();
        warn!(session_id = %self.session_id(), "Event buffer full, waiting for consumer");
        self.outbox
            .send(event)
            .await
            .map_err(|_| self.events_closed())
    }

    fn events_closed(&self) -> EventsClosed {
        warn!(session_id = %self.session_id(), "Event receiver closed");
        EventsClosed
    }

    async fn finish(mut self, end_reason: EndReason) {
        let dropped = self.reorder.clear();
        self.session.stop();
        self.ctx.registry.mark_stopped(self.session.session_id());
        self.ctx.metrics.session_ended();

        let summary = self.session.summary(end_reason, &self.ctx.classifier);

        info!(
            session_id = %summary.session_id,
            end_reason = ?end_reason,
            chunks = summary.chunks_processed,
            dropped_chunks = dropped,
            peak_risk = summary.peak_risk_score,
            final_level = ?summary.final_risk_level,
            "Session ended"
        );

        if let Some(sink) = self.ctx.report_sink.clone() {
            let report = CallReport::from_summary(summary.clone());
            tokio::spawn(async move {
                match sink.save_result(&report).await {
                    Ok(report_id) => debug!(report_id = %report_id, "Session report saved"),
                    Err(e) => error!(report_id = %report.report_id, error = %e, "Failed to save session report"),
                }
            });
        }

        if end_reason == EndReason::Stopped {
            let _ = self.outbox.send(PipelineEvent::SessionEnded(summary)).await;
        } else {
            // Receiver may already be gone; never wait on it
            let _ = self.outbox.try_send(PipelineEvent::SessionEnded(summary));
        }
    }
}

/// Forward one session's events onto the shared channel, in order
pub(crate) async fn relay_events(
    mut outbox: mpsc::Receiver<PipelineEvent>,
    events: mpsc::Sender<PipelineEvent>,
) {
    while let Some(event) = outbox.recv().await {
        if events.send(event).await.is_err() {
            break;
        }
    }
}

/// Resolve with the in-flight transcription, or never if there is none
async fn wait_for(in_flight: &mut Option<InFlight>) -> (TranscriptSegment, Instant) {
    match in_flight {
        Some(future) => future.await,
        None => std::future::pending().await,
    }
}

/// Sleep until the gap deadline, or forever if there is none
async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
