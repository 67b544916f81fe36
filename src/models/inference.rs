//! Fraud classifier: catalog matches, linguistic features and the optional
//! keyword model combined into one verdict

use crate::config::{AppConfig, ScoringConfig};
use crate::error::{PipelineError, PipelineResult};
use crate::linguistic::LinguisticAnalyzer;
use crate::models::aggregator::ScoreAggregator;
use crate::models::catalog::PatternCatalog;
use crate::models::keyword_model::AuxiliaryModel;
use crate::models::loader::ModelLoader;
use crate::types::alert::{RiskLevel, RiskLevelThresholds};
use crate::types::ClassificationResult;
use anyhow::{Context, Result};
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Stateless transcript classifier shared by every session
pub struct FraudClassifier {
    catalog: Arc<PatternCatalog>,
    analyzer: LinguisticAnalyzer,
    aggregator: ScoreAggregator,
    /// Optional statistical layer
    model: Option<Arc<dyn AuxiliaryModel>>,
    /// Weight of the model probability in the final score
    blend_weight: f64,
}

impl FraudClassifier {
    /// Create a classifier without a statistical model
    pub fn new(
        catalog: Arc<PatternCatalog>,
        analyzer: LinguisticAnalyzer,
        scoring: ScoringConfig,
    ) -> PipelineResult<Self> {
        Ok(Self {
            catalog,
            analyzer,
            aggregator: ScoreAggregator::new(scoring)?,
            model: None,
            blend_weight: 0.0,
        })
    }

    /// Attach a statistical model blended in with weight `blend_weight`
    pub fn with_model(
        mut self,
        model: Arc<dyn AuxiliaryModel>,
        blend_weight: f64,
    ) -> PipelineResult<Self> {
        if !(0.0..1.0).contains(&blend_weight) {
            return Err(PipelineError::Configuration(format!(
                "model blend weight must be in [0, 1), got {}",
                blend_weight
            )));
        }
        self.model = Some(model);
        self.blend_weight = blend_weight;
        Ok(self)
    }

    /// Build the classifier described by the service configuration
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let catalog = match &config.catalog.path {
            Some(path) => PatternCatalog::load(path),
            None => PatternCatalog::builtin(),
        }
        .context("Failed to load pattern catalog")?;

        info!(
            version = %catalog.version(),
            patterns = catalog.len(),
            "Pattern catalog loaded"
        );

        let classifier = Self::new(
            Arc::new(catalog),
            LinguisticAnalyzer::new(),
            config.scoring.clone(),
        )
        .context("Invalid scoring configuration")?;

        match ModelLoader::load_configured(&config.model) {
            Some(model) => {
                info!(
                    model = %model.name(),
                    blend_weight = config.model.blend_weight,
                    "Keyword model attached"
                );
                classifier
                    .with_model(model, config.model.blend_weight)
                    .context("Invalid model configuration")
            }
            None => Ok(classifier),
        }
    }

    /// Classify a full transcript.
    ///
    /// Never fails: a model error only drops the model from this verdict.
    pub fn classify(&self, text: &str) -> ClassificationResult {
        let matched_patterns = self.catalog.matches(text);
        let linguistic_features = self.analyzer.analyze(text);

        let raw_score = self
            .aggregator
            .raw_score(&matched_patterns, &linguistic_features);
        let pattern_risk = self.aggregator.normalize(raw_score);

        let model_score = self.model.as_ref().and_then(|model| {
            match model.scam_probability(text) {
                Ok(p) => Some(p),
                Err(e) => {
                    warn!(
                        model = %model.name(),
                        error = %e,
                        "Model unavailable, using pattern scoring only"
                    );
                    None
                }
            }
        });

        let risk_score = match model_score {
            Some(p) => ScoreAggregator::blend(pattern_risk, p, self.blend_weight),
            None => pattern_risk,
        };

        let label = self.aggregator.label(risk_score);
        let confidence = self.aggregator.confidence(risk_score);
        let rationale = self.aggregator.rationale(&matched_patterns);

        debug!(
            label = %label,
            risk_score = risk_score,
            raw_score = raw_score,
            matches = matched_patterns.len(),
            model_score = ?model_score,
            "Transcript classified"
        );

        ClassificationResult {
            label,
            confidence,
            risk_score,
            rationale,
            matched_patterns,
            linguistic_features,
            recommendation: label.recommendation().to_string(),
            model_score,
            catalog_version: self.catalog.version().to_string(),
            timestamp: Utc::now(),
        }
    }

    pub fn risk_level(&self, risk_score: f64) -> RiskLevel {
        self.aggregator.risk_level(risk_score)
    }

    pub fn risk_thresholds(&self) -> &RiskLevelThresholds {
        &self.aggregator.config().risk_levels
    }

    pub fn scoring(&self) -> &ScoringConfig {
        self.aggregator.config()
    }

    pub fn catalog(&self) -> &PatternCatalog {
        &self.catalog
    }

    pub fn has_model(&self) -> bool {
        self.model.is_some()
    }
}
