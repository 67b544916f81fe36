//! Configuration management for the call classification service

use crate::error::{PipelineError, PipelineResult};
use crate::types::alert::RiskLevelThresholds;
use anyhow::{bail, Context, Result};
use config::{Config, Environment, File};
use serde::Deserialize;
use std::path::Path;

/// Main application configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub nats: NatsConfig,
    #[serde(default)]
    pub catalog: CatalogConfig,
    #[serde(default)]
    pub scoring: ScoringConfig,
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub transcription: TranscriptionConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// NATS connection configuration
#[derive(Debug, Clone, Deserialize)]
pub struct NatsConfig {
    /// NATS server URL
    #[serde(default = "default_nats_url")]
    pub url: String,
    /// Request/reply subject for session start and stop
    #[serde(default = "default_control_subject")]
    pub control_subject: String,
    /// Subject for incoming call chunks
    #[serde(default = "default_chunk_subject")]
    pub chunk_subject: String,
    /// Request/reply subject for one-shot text analysis
    #[serde(default = "default_analyze_subject")]
    pub analyze_subject: String,
    /// Events go to `<prefix>.<session_id>`
    #[serde(default = "default_event_subject_prefix")]
    pub event_subject_prefix: String,
    /// Subject for saved call reports
    #[serde(default = "default_report_subject")]
    pub report_subject: String,
}

fn default_nats_url() -> String {
    "nats://localhost:4222".to_string()
}

fn default_control_subject() -> String {
    "calls.control".to_string()
}

fn default_chunk_subject() -> String {
    "calls.chunks".to_string()
}

fn default_analyze_subject() -> String {
    "calls.analyze".to_string()
}

fn default_event_subject_prefix() -> String {
    "calls.events".to_string()
}

fn default_report_subject() -> String {
    "calls.reports".to_string()
}

impl Default for NatsConfig {
    fn default() -> Self {
        Self {
            url: default_nats_url(),
            control_subject: default_control_subject(),
            chunk_subject: default_chunk_subject(),
            analyze_subject: default_analyze_subject(),
            event_subject_prefix: default_event_subject_prefix(),
            report_subject: default_report_subject(),
        }
    }
}

/// Pattern catalog source
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CatalogConfig {
    /// Operator catalog file; the built-in catalog is used when unset
    #[serde(default)]
    pub path: Option<String>,
}

/// Risk scoring parameters
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ScoringConfig {
    /// Normalization constant k in `1 - exp(-raw / k)`
    #[serde(default = "default_normalization_k")]
    pub normalization_k: f64,
    /// Risk at or above which a transcript is Suspicious
    #[serde(default = "default_suspicious_threshold")]
    pub suspicious_threshold: f64,
    /// Risk at or above which a transcript is Scam
    #[serde(default = "default_scam_threshold")]
    pub scam_threshold: f64,
    /// Pattern descriptions quoted in the rationale
    #[serde(default = "default_rationale_top_n")]
    pub rationale_top_n: usize,
    #[serde(default)]
    pub linguistic: LinguisticWeights,
    #[serde(default)]
    pub risk_levels: RiskLevelThresholds,
}

fn default_normalization_k() -> f64 {
    4.0
}

fn default_suspicious_threshold() -> f64 {
    0.4
}

fn default_scam_threshold() -> f64 {
    0.7
}

fn default_rationale_top_n() -> usize {
    3
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            normalization_k: default_normalization_k(),
            suspicious_threshold: default_suspicious_threshold(),
            scam_threshold: default_scam_threshold(),
            rationale_top_n: default_rationale_top_n(),
            linguistic: LinguisticWeights::default(),
            risk_levels: RiskLevelThresholds::default(),
        }
    }
}

impl ScoringConfig {
    /// Check threshold ordering and the normalization constant.
    pub fn validate(&self) -> PipelineResult<()> {
        let (t_susp, t_scam) = (self.suspicious_threshold, self.scam_threshold);
        if !(t_susp > 0.0 && t_susp < t_scam && t_scam < 1.0) {
            return Err(PipelineError::Configuration(format!(
                "scoring thresholds must satisfy 0 < suspicious ({}) < scam ({}) < 1",
                t_susp, t_scam
            )));
        }
        if !(self.normalization_k.is_finite() && self.normalization_k > 0.0) {
            return Err(PipelineError::Configuration(format!(
                "normalization_k must be positive, got {}",
                self.normalization_k
            )));
        }
        if self.rationale_top_n == 0 {
            return Err(PipelineError::Configuration(
                "rationale_top_n must be at least 1".to_string(),
            ));
        }
        self.linguistic.validate()
    }
}

/// Per-mention weights of the linguistic bonus
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LinguisticWeights {
    #[serde(default = "default_urgency_weight")]
    pub urgency: f64,
    #[serde(default = "default_money_weight")]
    pub money: f64,
    #[serde(default = "default_personal_info_weight")]
    pub personal_info: f64,
    #[serde(default = "default_emotional_weight")]
    pub emotional: f64,
    /// Mentions beyond this count add nothing
    #[serde(default = "default_max_counted_mentions")]
    pub max_counted_mentions: usize,
}

fn default_urgency_weight() -> f64 {
    0.3
}

fn default_money_weight() -> f64 {
    0.3
}

fn default_personal_info_weight() -> f64 {
    0.4
}

fn default_emotional_weight() -> f64 {
    0.3
}

fn default_max_counted_mentions() -> usize {
    3
}

impl Default for LinguisticWeights {
    fn default() -> Self {
        Self {
            urgency: default_urgency_weight(),
            money: default_money_weight(),
            personal_info: default_personal_info_weight(),
            emotional: default_emotional_weight(),
            max_counted_mentions: default_max_counted_mentions(),
        }
    }
}

impl LinguisticWeights {
    fn validate(&self) -> PipelineResult<()> {
        for (name, w) in [
            ("urgency", self.urgency),
            ("money", self.money),
            ("personal_info", self.personal_info),
            ("emotional", self.emotional),
        ] {
            if !w.is_finite() || w < 0.0 {
                return Err(PipelineError::Configuration(format!(
                    "linguistic weight '{}' must be non-negative, got {}",
                    name, w
                )));
            }
        }
        Ok(())
    }
}

/// Auxiliary keyword model configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ModelConfig {
    #[serde(default = "default_model_enabled")]
    pub enabled: bool,
    /// Model definition file
    #[serde(default = "default_model_path")]
    pub path: String,
    /// Weight w of the model probability in the final risk
    #[serde(default = "default_blend_weight")]
    pub blend_weight: f64,
}

fn default_model_enabled() -> bool {
    true
}

fn default_model_path() -> String {
    "models/keyword_model.toml".to_string()
}

fn default_blend_weight() -> f64 {
    0.25
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            enabled: default_model_enabled(),
            path: default_model_path(),
            blend_weight: default_blend_weight(),
        }
    }
}

impl ModelConfig {
    pub fn validate(&self) -> PipelineResult<()> {
        if !(0.0..1.0).contains(&self.blend_weight) {
            return Err(PipelineError::Configuration(format!(
                "model blend_weight must be in [0, 1), got {}",
                self.blend_weight
            )));
        }
        Ok(())
    }
}

/// Transcription engine chain
#[derive(Debug, Clone, Deserialize)]
pub struct TranscriptionConfig {
    /// Floor used by engines without their own
    #[serde(default = "default_min_confidence")]
    pub min_confidence: f64,
    /// Engines in fallback order
    #[serde(default)]
    pub engines: Vec<EngineConfig>,
}

fn default_min_confidence() -> f64 {
    0.6
}

impl Default for TranscriptionConfig {
    fn default() -> Self {
        Self {
            min_confidence: default_min_confidence(),
            engines: Vec::new(),
        }
    }
}

/// One speech-to-text backend reached over request/reply
#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    pub name: String,
    pub subject: String,
    #[serde(default = "default_engine_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default)]
    pub min_confidence: Option<f64>,
}

fn default_engine_timeout_ms() -> u64 {
    5000
}

/// Live session behaviour
#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    /// How long a sequence gap may block the reorder buffer
    #[serde(default = "default_reorder_window_ms")]
    pub reorder_window_ms: u64,
    #[serde(default = "default_max_pending_chunks")]
    pub max_pending_chunks: usize,
    /// Trailing words of the previous segment compared for overlap
    #[serde(default = "default_overlap_window_words")]
    pub overlap_window_words: usize,
    #[serde(default = "default_min_overlap_words")]
    pub min_overlap_words: usize,
    /// Sequence number of a session's first chunk
    #[serde(default = "default_first_sequence")]
    pub first_sequence: u64,
    #[serde(default = "default_inbox_capacity")]
    pub inbox_capacity: usize,
    /// Capacity of the shared event channel
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,
    /// Events a single session may have queued ahead of the shared channel
    #[serde(default = "default_session_event_buffer")]
    pub session_event_buffer: usize,
    /// Raise an alert when a single segment carries high-risk keywords
    #[serde(default = "default_keyword_alerts")]
    pub keyword_alerts: bool,
    /// Risk an escalation must exceed
    #[serde(default = "default_escalation_threshold")]
    pub escalation_threshold: f64,
    /// Minimum jump over the previous risk for an escalation
    #[serde(default = "default_escalation_delta")]
    pub escalation_delta: f64,
    /// How long stopped sessions are remembered
    #[serde(default = "default_stopped_retention_secs")]
    pub stopped_retention_secs: u64,
}

fn default_reorder_window_ms() -> u64 {
    1500
}

fn default_max_pending_chunks() -> usize {
    64
}

fn default_overlap_window_words() -> usize {
    12
}

fn default_min_overlap_words() -> usize {
    2
}

fn default_first_sequence() -> u64 {
    1
}

fn default_inbox_capacity() -> usize {
    128
}

fn default_event_buffer() -> usize {
    1024
}

fn default_session_event_buffer() -> usize {
    32
}

fn default_keyword_alerts() -> bool {
    true
}

fn default_escalation_threshold() -> f64 {
    0.3
}

fn default_escalation_delta() -> f64 {
    0.2
}

fn default_stopped_retention_secs() -> u64 {
    600
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            reorder_window_ms: default_reorder_window_ms(),
            max_pending_chunks: default_max_pending_chunks(),
            overlap_window_words: default_overlap_window_words(),
            min_overlap_words: default_min_overlap_words(),
            first_sequence: default_first_sequence(),
            inbox_capacity: default_inbox_capacity(),
            event_buffer: default_event_buffer(),
            session_event_buffer: default_session_event_buffer(),
            keyword_alerts: default_keyword_alerts(),
            escalation_threshold: default_escalation_threshold(),
            escalation_delta: default_escalation_delta(),
            stopped_retention_secs: default_stopped_retention_secs(),
        }
    }
}

/// Service pipeline configuration
#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    /// Concurrent message handlers
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// Seconds between metric summaries
    #[serde(default = "default_metrics_interval_secs")]
    pub metrics_interval_secs: u64,
}

fn default_workers() -> usize {
    8
}

fn default_metrics_interval_secs() -> u64 {
    30
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            metrics_interval_secs: default_metrics_interval_secs(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Log format (json, pretty)
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl AppConfig {
    /// Load configuration from file
    pub fn load() -> Result<Self> {
        Self::load_from_path("config/config.toml")
    }

    /// Load configuration from a specific path, then apply
    /// `VOICE_SHIELD__SECTION__KEY` environment overrides
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config = Config::builder()
            .add_source(File::from(path.as_ref()))
            .add_source(
                Environment::with_prefix("VOICE_SHIELD")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to build configuration")?;

        let config: AppConfig = config
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the pipeline cannot run with
    pub fn validate(&self) -> Result<()> {
        self.scoring
            .validate()
            .context("Invalid [scoring] section")?;
        self.model.validate().context("Invalid [model] section")?;

        let floor = self.transcription.min_confidence;
        if !(0.0..=1.0).contains(&floor) {
            bail!("transcription.min_confidence must be in [0, 1], got {}", floor);
        }
        for engine in &self.transcription.engines {
            if engine.timeout_ms == 0 {
                bail!("engine '{}' needs a non-zero timeout_ms", engine.name);
            }
            if let Some(floor) = engine.min_confidence {
                if !(0.0..=1.0).contains(&floor) {
                    bail!(
                        "engine '{}' min_confidence must be in [0, 1], got {}",
                        engine.name,
                        floor
                    );
                }
            }
        }

        let session = &self.session;
        if session.min_overlap_words == 0 {
            bail!("session.min_overlap_words must be at least 1");
        }
        if session.max_pending_chunks == 0 || session.inbox_capacity == 0 {
            bail!("session buffers must hold at least one chunk");
        }
        if session.event_buffer == 0 || session.session_event_buffer == 0 {
            bail!("session event buffers must hold at least one event");
        }
        if self.pipeline.workers == 0 {
            bail!("pipeline.workers must be at least 1");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.nats.url, "nats://localhost:4222");
        assert_eq!(config.scoring.suspicious_threshold, 0.4);
        assert_eq!(config.scoring.scam_threshold, 0.7);
        assert_eq!(config.model.blend_weight, 0.25);
        assert_eq!(config.session.first_sequence, 1);
        assert!(config.session.keyword_alerts);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_session_event_buffer_must_be_positive() {
        let mut config = AppConfig::default();
        config.session.session_event_buffer = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_threshold_ordering_enforced() {
        let mut scoring = ScoringConfig::default();
        scoring.suspicious_threshold = 0.8;
        assert!(scoring.validate().is_err());

        let mut scoring = ScoringConfig::default();
        scoring.scam_threshold = 1.0;
        assert!(scoring.validate().is_err());

        let mut scoring = ScoringConfig::default();
        scoring.suspicious_threshold = 0.0;
        assert!(scoring.validate().is_err());

        let mut scoring = ScoringConfig::default();
        scoring.normalization_k = 0.0;
        assert!(matches!(
            scoring.validate(),
            Err(PipelineError::Configuration(_))
        ));
    }

    #[test]
    fn test_blend_weight_range() {
        let mut model = ModelConfig::default();
        model.blend_weight = 1.0;
        assert!(model.validate().is_err());
        model.blend_weight = 0.0;
        assert!(model.validate().is_ok());
    }

    #[test]
    fn test_load_partial_file_fills_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[scoring]
normalization_k = 5.0

[session]
reorder_window_ms = 250

[[transcription.engines]]
name = "primary"
subject = "stt.primary"
timeout_ms = 800

[[transcription.engines]]
name = "fallback"
subject = "stt.fallback"
min_confidence = 0.5
"#
        )
        .unwrap();

        let config = AppConfig::load_from_path(file.path()).unwrap();
        assert_eq!(config.scoring.normalization_k, 5.0);
        assert_eq!(config.scoring.scam_threshold, 0.7);
        assert_eq!(config.session.reorder_window_ms, 250);
        assert_eq!(config.session.max_pending_chunks, 64);
        assert_eq!(config.transcription.engines.len(), 2);
        assert_eq!(config.transcription.engines[1].timeout_ms, 5000);
        assert_eq!(config.transcription.engines[1].min_confidence, Some(0.5));
    }

    #[test]
    fn test_load_rejects_invalid_scoring() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[scoring]
suspicious_threshold = 0.9
scam_threshold = 0.5
"#
        )
        .unwrap();

        assert!(AppConfig::load_from_path(file.path()).is_err());
    }
}
