//! NATS publishers for pipeline events, replies and call reports

use crate::report::{CallReport, ReportSink};
use crate::types::{PipelineEvent, SessionId};
use anyhow::Result;
use async_nats::{Client, Subject};
use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, error};

/// Publishes pipeline events, one subject per session
#[derive(Clone)]
pub struct EventProducer {
    client: Client,
    subject_prefix: String,
}

impl EventProducer {
    /// Create a new event producer
    pub fn new(client: Client, subject_prefix: &str) -> Self {
        Self {
            client,
            subject_prefix: subject_prefix.trim_end_matches('.').to_string(),
        }
    }

    /// Subject events for `session_id` are published on
    pub fn subject_for(&self, session_id: &SessionId) -> String {
        event_subject(&self.subject_prefix, session_id)
    }

    /// Publish a pipeline event
    pub async fn publish(&self, event: &PipelineEvent) -> Result<()> {
        let payload = serde_json::to_vec(event)?;
        let subject = self.subject_for(event.session_id());

        self.client.publish(subject.clone(), payload.into()).await?;

        debug!(subject = %subject, "Published pipeline event");
        Ok(())
    }

    /// Publish multiple events in order
    pub async fn publish_batch(&self, events: &[PipelineEvent]) -> Result<()> {
        for event in events {
            if let Err(e) = self.publish(event).await {
                error!(
                    session_id = %event.session_id(),
                    error = %e,
                    "Failed to publish event"
                );
            }
        }
        Ok(())
    }

    /// Answer a request-reply message
    pub async fn reply<T: Serialize>(&self, reply_to: Subject, body: &T) -> Result<()> {
        let payload = serde_json::to_vec(body)?;
        self.client.publish(reply_to, payload.into()).await?;
        Ok(())
    }

    /// Get the subject prefix
    pub fn subject_prefix(&self) -> &str {
        &self.subject_prefix
    }
}

fn event_subject(prefix: &str, session_id: &SessionId) -> String {
    format!("{}.{}", prefix, session_id)
}

/// Report sink that publishes reports for an external store to persist
pub struct NatsReportSink {
    client: Client,
    subject: String,
}

impl NatsReportSink {
    pub fn new(client: Client, subject: &str) -> Self {
        Self {
            client,
            subject: subject.to_string(),
        }
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }
}

#[async_trait]
impl ReportSink for NatsReportSink {
    async fn save_result(&self, report: &CallReport) -> Result<String> {
        let payload = serde_json::to_vec(report)?;
        self.client
            .publish(self.subject.clone(), payload.into())
            .await?;

        debug!(report_id = %report.report_id, subject = %self.subject, "Published call report");
        Ok(report.report_id.clone())
    }
}
