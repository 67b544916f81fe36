//! Session identifiers, inbound chunks and transcribed segments

use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque unique token identifying one live call session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Generate a fresh random session id.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SessionId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for SessionId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Raw audio captured for one chunk of a call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioChunk {
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Encoded audio bytes, opaque to the core
    pub data: Vec<u8>,
}

impl AudioChunk {
    pub fn new(sample_rate: u32, data: Vec<u8>) -> Self {
        Self { sample_rate, data }
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Content of a submitted chunk: audio still to be transcribed, or text
/// that was already transcribed upstream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ChunkPayload {
    Text { text: String },
    Audio(AudioChunk),
}

impl ChunkPayload {
    pub fn text(text: impl Into<String>) -> Self {
        ChunkPayload::Text { text: text.into() }
    }

    pub fn audio(sample_rate: u32, data: Vec<u8>) -> Self {
        ChunkPayload::Audio(AudioChunk::new(sample_rate, data))
    }
}

/// How trustworthy a transcribed segment is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SegmentQuality {
    /// An engine met its confidence floor.
    Accepted,
    /// Best-effort text from an engine that fell below its floor.
    LowConfidence,
    /// No engine produced anything.
    Unavailable,
}

impl SegmentQuality {
    pub fn is_degraded(&self) -> bool {
        !matches!(self, SegmentQuality::Accepted)
    }
}

/// Text produced for one chunk, tagged with its position in the call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptSegment {
    pub text: String,
    /// Engine confidence (0.0 - 1.0)
    pub confidence: f64,
    pub source_engine: String,
    pub sequence_number: u64,
    pub quality: SegmentQuality,
}

impl TranscriptSegment {
    pub fn accepted(
        sequence_number: u64,
        text: impl Into<String>,
        confidence: f64,
        source_engine: impl Into<String>,
    ) -> Self {
        Self {
            text: text.into(),
            confidence: confidence.clamp(0.0, 1.0),
            source_engine: source_engine.into(),
            sequence_number,
            quality: SegmentQuality::Accepted,
        }
    }

    pub fn low_confidence(
        sequence_number: u64,
        text: impl Into<String>,
        confidence: f64,
        source_engine: impl Into<String>,
    ) -> Self {
        Self {
            quality: SegmentQuality::LowConfidence,
            ..Self::accepted(sequence_number, text, confidence, source_engine)
        }
    }

    pub fn unavailable(sequence_number: u64) -> Self {
        Self {
            text: String::new(),
            confidence: 0.0,
            source_engine: "none".to_string(),
            sequence_number,
            quality: SegmentQuality::Unavailable,
        }
    }

    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }
}
