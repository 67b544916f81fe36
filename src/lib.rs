//! Voice Scam Shield Library
//!
//! Real-time fraud-risk classification of live phone calls. Audio or text
//! chunks are reordered per session, transcribed through a fallback chain
//! of speech-to-text engines, accumulated into a running transcript and
//! re-scored against a catalog of weighted scam patterns plus linguistic
//! signals.

pub mod config;
pub mod consumer;
pub mod error;
pub mod linguistic;
pub mod metrics;
pub mod models;
pub mod producer;
pub mod report;
pub mod screening;
pub mod session;
pub mod transcription;
pub mod types;

pub use config::AppConfig;
pub use consumer::CallConsumer;
pub use error::{PipelineError, PipelineResult};
pub use linguistic::LinguisticAnalyzer;
pub use models::{FraudClassifier, PatternCatalog};
pub use producer::EventProducer;
pub use session::SessionPipeline;
pub use transcription::TranscriptionGateway;
pub use types::{ClassificationResult, Label, PipelineEvent, SessionId};
