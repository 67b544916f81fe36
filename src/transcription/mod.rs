//! Speech-to-text backends and the fallback gateway in front of them

pub mod gateway;
pub mod nats_engine;

use crate::types::AudioChunk;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use gateway::TranscriptionGateway;
pub use nats_engine::NatsEngine;

/// Text recognized by one engine for one chunk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineOutput {
    pub text: String,
    /// Engine-reported confidence (0.0 - 1.0)
    pub confidence: f64,
}

/// A speech-to-text backend.
#[async_trait]
pub trait TranscriptionEngine: Send + Sync {
    /// Engine name, recorded on every segment it produces
    fn name(&self) -> &str;

    /// Transcribe one chunk of audio
    async fn transcribe(&self, audio: &AudioChunk) -> anyhow::Result<EngineOutput>;
}
