//! Request and reply payloads carried over the message bus

use super::transcript::{ChunkPayload, SessionId};
use serde::{Deserialize, Serialize};

/// Session lifecycle request on the control subject.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum ControlRequest {
    Start,
    Stop { session_id: SessionId },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlResponse {
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<SessionId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ControlResponse {
    pub fn started(session_id: SessionId) -> Self {
        Self {
            ok: true,
            session_id: Some(session_id),
            error: None,
        }
    }

    pub fn ok() -> Self {
        Self {
            ok: true,
            session_id: None,
            error: None,
        }
    }

    pub fn failed(error: impl ToString) -> Self {
        Self {
            ok: false,
            session_id: None,
            error: Some(error.to_string()),
        }
    }
}

/// One chunk of a live call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkMessage {
    pub session_id: SessionId,
    pub sequence_number: u64,
    pub payload: ChunkPayload,
}

/// Stateless classification request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyzeRequest {
    pub text: String,
}
