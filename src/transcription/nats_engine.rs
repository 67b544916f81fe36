//! Speech-to-text worker reached over NATS request/reply

use super::{EngineOutput, TranscriptionEngine};
use crate::types::AudioChunk;
use anyhow::{Context, Result};
use async_nats::Client;
use async_trait::async_trait;
use tracing::debug;

/// Engine that forwards audio to an external worker subscribed on `subject`.
///
/// The request body is the JSON-encoded [`AudioChunk`]; the worker replies
/// with `{"text": ..., "confidence": ...}`.
pub struct NatsEngine {
    client: Client,
    name: String,
    subject: String,
}

impl NatsEngine {
    pub fn new(client: Client, name: &str, subject: &str) -> Self {
        Self {
            client,
            name: name.to_string(),
            subject: subject.to_string(),
        }
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }
}

#[async_trait]
impl TranscriptionEngine for NatsEngine {
    fn name(&self) -> &str {
        &self.name
    }

    async fn transcribe(&self, audio: &AudioChunk) -> Result<EngineOutput> {
        let payload = serde_json::to_vec(audio)?;

        let reply = self
            .client
            .request(self.subject.clone(), payload.into())
            .await
            .with_context(|| format!("Request to {} failed", self.subject))?;

        let output: EngineOutput = serde_json::from_slice(&reply.payload)
            .with_context(|| format!("Malformed reply from {}", self.name))?;

        debug!(
            engine = %self.name,
            confidence = output.confidence,
            chars = output.text.len(),
            "Engine reply received"
        );

        Ok(output)
    }
}
