//! Error taxonomy for the classification core and session pipeline.

use crate::types::SessionId;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Result alias for core operations.
pub type PipelineResult<T> = std::result::Result<T, PipelineError>;

/// Errors surfaced by the catalog, classifier and session pipeline.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum PipelineError {
    /// Malformed pattern catalog, model file or scoring parameters.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Chunk or stop addressed to a session that cannot take it.
    #[error("session {session_id} is {state}")]
    InvalidSessionState {
        session_id: SessionId,
        state: SessionPresence,
    },

    /// Chunk refused by the session's reorder buffer.
    #[error("chunk {sequence_number} rejected for session {session_id}: {reason}")]
    ChunkRejected {
        session_id: SessionId,
        sequence_number: u64,
        reason: ChunkRejection,
    },

    /// Auxiliary statistical model could not produce a score.
    #[error("classification model unavailable: {0}")]
    ClassificationUnavailable(String),
}

impl PipelineError {
    pub fn unknown_session(session_id: &SessionId) -> Self {
        Self::InvalidSessionState {
            session_id: session_id.clone(),
            state: SessionPresence::Unknown,
        }
    }

    pub fn stopped_session(session_id: &SessionId) -> Self {
        Self::InvalidSessionState {
            session_id: session_id.clone(),
            state: SessionPresence::Stopped,
        }
    }

    /// Short machine-readable reason, used on the wire.
    pub fn reason_code(&self) -> &'static str {
        match self {
            PipelineError::Configuration(_) => "configuration",
            PipelineError::InvalidSessionState {
                state: SessionPresence::Unknown,
                ..
            } => "unknown_session",
            PipelineError::InvalidSessionState {
                state: SessionPresence::Stopped,
                ..
            } => "session_stopped",
            PipelineError::ChunkRejected { reason, .. } => reason.code(),
            PipelineError::ClassificationUnavailable(_) => "classification_unavailable",
        }
    }
}

/// Why a session lookup failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPresence {
    Unknown,
    Stopped,
}

impl fmt::Display for SessionPresence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionPresence::Unknown => f.write_str("unknown"),
            SessionPresence::Stopped => f.write_str("stopped"),
        }
    }
}

/// Why the reorder buffer refused a chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkRejection {
    /// Sequence number already applied or already buffered.
    Duplicate,
    /// Slot was skipped as a gap before the chunk arrived.
    Late,
    /// Too many out-of-order chunks are waiting.
    BufferFull,
    /// Sequence number outside the accepted range.
    OutOfRange,
}

impl ChunkRejection {
    pub fn code(&self) -> &'static str {
        match self {
            ChunkRejection::Duplicate => "duplicate_sequence",
            ChunkRejection::Late => "late_chunk",
            ChunkRejection::BufferFull => "reorder_buffer_full",
            ChunkRejection::OutOfRange => "sequence_out_of_range",
        }
    }
}

impl fmt::Display for ChunkRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChunkRejection::Duplicate => f.write_str("duplicate sequence number"),
            ChunkRejection::Late => f.write_str("arrived after the reorder window closed"),
            ChunkRejection::BufferFull => f.write_str("reorder buffer full"),
            ChunkRejection::OutOfRange => f.write_str("sequence number out of range"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reason_codes() {
        let id = SessionId::from("abc");
        assert_eq!(
            PipelineError::unknown_session(&id).reason_code(),
            "unknown_session"
        );
        assert_eq!(
            PipelineError::stopped_session(&id).reason_code(),
            "session_stopped"
        );

        let rejected = PipelineError::ChunkRejected {
            session_id: id,
            sequence_number: 4,
            reason: ChunkRejection::Late,
        };
        assert_eq!(rejected.reason_code(), "late_chunk");
        assert!(rejected.to_string().contains("reorder window"));
    }
}
