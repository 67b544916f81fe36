//! Type definitions for the call classification pipeline

pub mod alert;
pub mod classification;
pub mod event;
pub mod message;
pub mod pattern;
pub mod transcript;

pub use alert::{AlertKind, RiskAlert, RiskLevel, RiskLevelThresholds};
pub use classification::{ClassificationResult, Label, LinguisticFeatures};
pub use event::{
    ClassificationEvent, EndReason, GapNotice, PipelineEvent, SessionSummary, SubmitOutcome,
};
pub use message::{AnalyzeRequest, ChunkMessage, ControlRequest, ControlResponse};
pub use pattern::{MatcherKind, PatternCategory, PatternMatch, PatternSpec};
pub use transcript::{AudioChunk, ChunkPayload, SegmentQuality, SessionId, TranscriptSegment};
