//! Keyword-frequency scam model

use crate::error::{PipelineError, PipelineResult};
use crate::linguistic::tokenize;
use serde::Deserialize;

/// Optional statistical layer consulted by the classifier.
///
/// Implementations must be pure: the same text always yields the same
/// probability.
pub trait AuxiliaryModel: Send + Sync {
    fn name(&self) -> &str;

    /// Probability in [0, 1] that `text` comes from a scam call.
    fn scam_probability(&self, text: &str) -> PipelineResult<f64>;
}

/// Model file layout.
#[derive(Debug, Clone, Deserialize)]
pub struct KeywordModelDefinition {
    #[serde(default = "default_model_name")]
    pub name: String,
    /// Divisor applied to the weighted term sum before saturation
    pub scale: f64,
    /// Occurrences of one term beyond this count add nothing
    #[serde(default = "default_max_term_count")]
    pub max_term_count: usize,
    pub terms: Vec<TermWeight>,
}

fn default_model_name() -> String {
    "keyword_model".to_string()
}

fn default_max_term_count() -> usize {
    3
}

#[derive(Debug, Clone, Deserialize)]
pub struct TermWeight {
    pub term: String,
    pub weight: f64,
}

#[derive(Debug, Clone)]
struct CompiledTerm {
    tokens: Vec<String>,
    weight: f64,
}

/// Saturating weighted count of known scam phrases.
///
/// `p = 1 - exp(-sum(weight * min(count, max_term_count)) / scale)`.
/// Weights are non-negative, so appending text never lowers `p`.
#[derive(Debug, Clone)]
pub struct KeywordModel {
    name: String,
    scale: f64,
    max_term_count: usize,
    terms: Vec<CompiledTerm>,
}

impl KeywordModel {
    pub fn from_definition(definition: KeywordModelDefinition) -> PipelineResult<Self> {
        if !(definition.scale.is_finite() && definition.scale > 0.0) {
            return Err(PipelineError::Configuration(format!(
                "model scale must be positive, got {}",
                definition.scale
            )));
        }
        if definition.terms.is_empty() {
            return Err(PipelineError::Configuration(
                "model defines no terms".to_string(),
            ));
        }

        let mut terms = Vec::with_capacity(definition.terms.len());
        for TermWeight { term, weight } in definition.terms {
            if !weight.is_finite() || weight < 0.0 {
                return Err(PipelineError::Configuration(format!(
                    "term '{}' has invalid weight {}",
                    term, weight
                )));
            }
            let tokens = tokenize(&term);
            if tokens.is_empty() {
                return Err(PipelineError::Configuration(format!(
                    "term '{}' has no words",
                    term
                )));
            }
            terms.push(CompiledTerm { tokens, weight });
        }

        Ok(Self {
            name: definition.name,
            scale: definition.scale,
            max_term_count: definition.max_term_count,
            terms,
        })
    }

    pub fn term_count(&self) -> usize {
        self.terms.len()
    }

    fn weighted_sum(&self, tokens: &[String]) -> f64 {
        self.terms
            .iter()
            .map(|term| {
                let count = count_phrase(tokens, &term.tokens).min(self.max_term_count);
                term.weight * count as f64
            })
            .sum()
    }
}

impl AuxiliaryModel for KeywordModel {
    fn name(&self) -> &str {
        &self.name
    }

    fn scam_probability(&self, text: &str) -> PipelineResult<f64> {
        let tokens = tokenize(text);
        let p = 1.0 - (-self.weighted_sum(&tokens) / self.scale).exp();
        if !p.is_finite() {
            return Err(PipelineError::ClassificationUnavailable(format!(
                "{} produced a non-finite score",
                self.name
            )));
        }
        Ok(p.clamp(0.0, 1.0))
    }
}

/// Non-overlapping occurrences of `phrase` as a contiguous token run.
fn count_phrase(tokens: &[String], phrase: &[String]) -> usize {
    if phrase.is_empty() || tokens.len() < phrase.len() {
        return 0;
    }

    let mut count = 0;
    let mut i = 0;
    while i + phrase.len() <= tokens.len() {
        if tokens[i..i + phrase.len()] == *phrase {
            count += 1;
            i += phrase.len();
        } else {
            i += 1;
        }
    }
    count
}
