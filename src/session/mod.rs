//! Live call sessions: reordering, transcript accumulation and per-session workers

pub mod pipeline;
mod registry;
pub mod reorder;
pub mod state;
pub mod transcript;
mod worker;

pub use pipeline::SessionPipeline;
pub use reorder::ReorderBuffer;
pub use state::{CallSession, SessionState};
pub use transcript::TranscriptAccumulator;
