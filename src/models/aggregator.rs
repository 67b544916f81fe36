//! Score aggregation: pattern weights and linguistic signals into one risk score

use crate::config::ScoringConfig;
use crate::error::PipelineResult;
use crate::types::alert::RiskLevel;
use crate::types::{Label, LinguisticFeatures, PatternMatch};

/// Turns pattern matches and linguistic features into a bounded risk score,
/// a label and a confidence.
///
/// All arithmetic is unrounded so that label thresholds agree exactly with
/// the reported score.
#[derive(Debug, Clone)]
pub struct ScoreAggregator {
    config: ScoringConfig,
}

impl ScoreAggregator {
    /// Create an aggregator after validating the scoring parameters.
    pub fn new(config: ScoringConfig) -> PipelineResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }

    /// Bounded bonus for urgency, money, personal-info and emotional terms.
    pub fn linguistic_bonus(&self, features: &LinguisticFeatures) -> f64 {
        let weights = &self.config.linguistic;
        let cap = weights.max_counted_mentions;
        let capped = |count: usize| count.min(cap) as f64;

        weights.urgency * capped(features.urgency_word_count)
            + weights.money * capped(features.money_word_count)
            + weights.personal_info * capped(features.personal_info_word_count)
            + weights.emotional * capped(features.emotional_manipulation_count)
    }

    /// Sum of matched pattern weights plus the linguistic bonus.
    pub fn raw_score(&self, matches: &[PatternMatch], features: &LinguisticFeatures) -> f64 {
        let pattern_weight: f64 = matches.iter().map(|m| m.weight).sum();
        pattern_weight + self.linguistic_bonus(features)
    }

    /// Saturating map of a raw score onto [0, 1).
    pub fn normalize(&self, raw_score: f64) -> f64 {
        let risk = 1.0 - (-raw_score.max(0.0) / self.config.normalization_k).exp();
        risk.clamp(0.0, 1.0)
    }

    /// Mix the pattern risk with an auxiliary model probability.
    pub fn blend(pattern_risk: f64, model_probability: f64, weight: f64) -> f64 {
        ((1.0 - weight) * pattern_risk + weight * model_probability.clamp(0.0, 1.0))
            .clamp(0.0, 1.0)
    }

    /// Label for a risk score.
    pub fn label(&self, risk_score: f64) -> Label {
        if risk_score >= self.config.scam_threshold {
            Label::Scam
        } else if risk_score >= self.config.suspicious_threshold {
            Label::Suspicious
        } else {
            Label::Safe
        }
    }

    /// `0.5 + 0.5 * d`, where `d` is the normalized distance from the score
    /// to the nearest threshold bounding its label band.
    pub fn confidence(&self, risk_score: f64) -> f64 {
        let t_susp = self.config.suspicious_threshold;
        let t_scam = self.config.scam_threshold;

        let distance = match self.label(risk_score) {
            Label::Safe => (t_susp - risk_score) / t_susp,
            Label::Scam => (risk_score - t_scam) / (1.0 - t_scam),
            Label::Suspicious => {
                let half_band = (t_scam - t_susp) / 2.0;
                (risk_score - t_susp).min(t_scam - risk_score) / half_band
            }
        };

        0.5 + 0.5 * distance.clamp(0.0, 1.0)
    }

    /// Human-readable summary of the strongest matches.
    pub fn rationale(&self, matches: &[PatternMatch]) -> String {
        if matches.is_empty() {
            return "No significant fraud indicators detected.".to_string();
        }

        // Stable sort keeps catalog order among equal weights
        let mut ranked: Vec<&PatternMatch> = matches.iter().collect();
        ranked.sort_by(|a, b| b.weight.total_cmp(&a.weight));

        let top_n = self.config.rationale_top_n;
        let listed: Vec<&str> = ranked
            .iter()
            .take(top_n)
            .map(|m| m.description.as_str())
            .collect();

        let mut rationale = format!(
            "Detected {} fraud indicators: {}",
            matches.len(),
            listed.join(", ")
        );
        if matches.len() > top_n {
            rationale.push_str(&format!(" and {} more", matches.len() - top_n));
        }
        rationale.push('.');
        rationale
    }

    /// Graded risk level used by alerts and summaries.
    pub fn risk_level(&self, risk_score: f64) -> RiskLevel {
        RiskLevel::from_score(risk_score, &self.config.risk_levels)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PatternCategory;

    fn pattern(id: &str, weight: f64) -> PatternMatch {
        PatternMatch {
            pattern_id: id.to_string(),
            category: PatternCategory::Other,
            weight,
            description: format!("desc {}", id),
        }
    }

    fn aggregator() -> ScoreAggregator {
        ScoreAggregator::new(ScoringConfig::default()).unwrap()
    }

    #[test]
    fn test_linguistic_bonus_is_capped() {
        let aggregator = aggregator();
        let features = LinguisticFeatures {
            urgency_word_count: 10,
            money_word_count: 1,
            ..Default::default()
        };

        // 0.3 * 3 + 0.3 * 1
        let bonus = aggregator.linguistic_bonus(&features);
        assert!((bonus - 1.2).abs() < 1e-9);
    }

    #[test]
    fn test_normalize_bounds() {
        let aggregator = aggregator();
        assert_eq!(aggregator.normalize(0.0), 0.0);
        assert!(aggregator.normalize(1000.0) <= 1.0);
        assert!(aggregator.normalize(2.0) < aggregator.normalize(3.0));
        assert_eq!(aggregator.normalize(-5.0), 0.0);
    }

    #[test]
    fn test_label_boundaries() {
        let aggregator = aggregator();
        let t_susp = aggregator.config().suspicious_threshold;
        let t_scam = aggregator.config().scam_threshold;

        assert_eq!(aggregator.label(0.0), Label::Safe);
        assert_eq!(aggregator.label(t_susp - 1e-9), Label::Safe);
        assert_eq!(aggregator.label(t_susp), Label::Suspicious);
        assert_eq!(aggregator.label(t_scam - 1e-9), Label::Suspicious);
        assert_eq!(aggregator.label(t_scam), Label::Scam);
        assert_eq!(aggregator.label(1.0), Label::Scam);
    }

    #[test]
    fn test_confidence_is_low_near_boundaries() {
        let aggregator = aggregator();
        let t_susp = aggregator.config().suspicious_threshold;
        let t_scam = aggregator.config().scam_threshold;

        assert!((aggregator.confidence(t_susp) - 0.5).abs() < 1e-9);
        assert!((aggregator.confidence(t_scam) - 0.5).abs() < 1e-9);
        assert!((aggregator.confidence(0.0) - 1.0).abs() < 1e-9);
        assert!((aggregator.confidence(1.0) - 1.0).abs() < 1e-9);

        let middle = (t_susp + t_scam) / 2.0;
        assert!((aggregator.confidence(middle) - 1.0).abs() < 1e-9);

        for i in 0..=100 {
            let c = aggregator.confidence(i as f64 / 100.0);
            assert!((0.5..=1.0).contains(&c));
        }
    }

    #[test]
    fn test_rationale_orders_by_weight_then_catalog() {
        let aggregator = aggregator();
        let matches = vec![
            pattern("a", 1.0),
            pattern("b", 2.5),
            pattern("c", 1.0),
            pattern("d", 2.5),
            pattern("e", 0.5),
        ];

        assert_eq!(
            aggregator.rationale(&matches),
            "Detected 5 fraud indicators: desc b, desc d, desc a and 2 more."
        );
    }

    #[test]
    fn test_rationale_short_and_empty() {
        let aggregator = aggregator();
        assert_eq!(
            aggregator.rationale(&[pattern("x", 1.0)]),
            "Detected 1 fraud indicators: desc x."
        );
        assert_eq!(
            aggregator.rationale(&[]),
            "No significant fraud indicators detected."
        );
    }

    #[test]
    fn test_blend() {
        assert!((ScoreAggregator::blend(0.8, 0.4, 0.25) - 0.7).abs() < 1e-9);
        assert_eq!(ScoreAggregator::blend(0.6, 0.9, 0.0), 0.6);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = ScoringConfig {
            suspicious_threshold: 0.7,
            scam_threshold: 0.4,
            ..ScoringConfig::default()
        };
        assert!(ScoreAggregator::new(config).is_err());
    }
}
