//! Versioned fraud pattern catalog
//!
//! Every matcher is compiled into a single case-insensitive [`RegexSet`], so a
//! transcript is scanned once per lookup no matter how many patterns exist.

use crate::error::{PipelineError, PipelineResult};
use crate::types::{MatcherKind, PatternMatch, PatternSpec};
use config::{Config, File, FileFormat};
use regex::{RegexBuilder, RegexSet, RegexSetBuilder};
use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;
use tracing::{debug, info};

const BUILTIN_CATALOG: &str = include_str!("../../config/patterns.toml");

/// On-disk catalog layout.
#[derive(Debug, Deserialize)]
struct CatalogFile {
    version: String,
    #[serde(default)]
    patterns: Vec<PatternSpec>,
}

/// Immutable set of fraud indicator rules.
#[derive(Debug, Clone)]
pub struct PatternCatalog {
    version: String,
    patterns: Vec<PatternSpec>,
    matcher: RegexSet,
}

impl PatternCatalog {
    /// Catalog compiled into the binary.
    pub fn builtin() -> PipelineResult<Self> {
        let source = File::from_str(BUILTIN_CATALOG, FileFormat::Toml);
        Self::from_source(source, "builtin")
    }

    /// Load an operator-provided catalog file.
    pub fn load(path: impl AsRef<Path>) -> PipelineResult<Self> {
        let path = path.as_ref();
        info!(path = %path.display(), "Loading pattern catalog");
        let source = File::from(path).format(FileFormat::Toml).required(true);
        Self::from_source(source, &path.display().to_string())
    }

    fn from_source<T>(source: T, origin: &str) -> PipelineResult<Self>
    where
        T: config::Source + Send + Sync + 'static,
    {
        let file: CatalogFile = Config::builder()
            .add_source(source)
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(|e| {
                PipelineError::Configuration(format!("pattern catalog {}: {}", origin, e))
            })?;

        Self::from_specs(file.version, file.patterns)
    }

    /// Validate and compile a list of pattern definitions.
    pub fn from_specs(
        version: impl Into<String>,
        patterns: Vec<PatternSpec>,
    ) -> PipelineResult<Self> {
        let version = version.into();
        let mut seen = HashSet::with_capacity(patterns.len());
        let mut sources = Vec::with_capacity(patterns.len());

        for spec in &patterns {
            if spec.id.trim().is_empty() {
                return Err(PipelineError::Configuration(
                    "pattern with empty id".to_string(),
                ));
            }
            if !seen.insert(spec.id.as_str()) {
                return Err(PipelineError::Configuration(format!(
                    "duplicate pattern id '{}'",
                    spec.id
                )));
            }
            if spec.pattern.trim().is_empty() {
                return Err(PipelineError::Configuration(format!(
                    "pattern '{}' has an empty matcher",
                    spec.id
                )));
            }
            if !spec.weight.is_finite() || spec.weight <= 0.0 {
                return Err(PipelineError::Configuration(format!(
                    "pattern '{}' has invalid weight {}",
                    spec.id, spec.weight
                )));
            }

            let source = match spec.kind {
                MatcherKind::Keyword => regex::escape(&spec.pattern),
                MatcherKind::Regex => spec.pattern.clone(),
            };

            // Compiled on its own first so the error names the offending pattern
            RegexBuilder::new(&source)
                .case_insensitive(true)
                .build()
                .map_err(|e| {
                    PipelineError::Configuration(format!(
                        "pattern '{}' does not compile: {}",
                        spec.id, e
                    ))
                })?;

            sources.push(source);
        }

        let matcher = RegexSetBuilder::new(&sources)
            .case_insensitive(true)
            .build()
            .map_err(|e| PipelineError::Configuration(format!("pattern set: {}", e)))?;

        debug!(
            version = %version,
            patterns = patterns.len(),
            "Pattern catalog compiled"
        );

        Ok(Self {
            version,
            patterns,
            matcher,
        })
    }

    /// Every pattern that fires on `text`, in catalog order.
    pub fn matches(&self, text: &str) -> Vec<PatternMatch> {
        self.matcher
            .matches(text)
            .into_iter()
            .map(|idx| {
                let spec = &self.patterns[idx];
                PatternMatch {
                    pattern_id: spec.id.clone(),
                    category: spec.category,
                    weight: spec.weight,
                    description: spec.description.clone(),
                }
            })
            .collect()
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn patterns(&self) -> &[PatternSpec] {
        &self.patterns
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PatternCategory;
    use std::io::Write;

    #[test]
    fn test_builtin_catalog_loads() {
        let catalog = PatternCatalog::builtin().unwrap();
        assert!(catalog.len() > 30);
        assert!(!catalog.version().is_empty());
    }

    #[test]
    fn test_keyword_match_is_case_insensitive_substring() {
        let catalog = PatternCatalog::from_specs(
            "t",
            vec![PatternSpec::keyword(
                "gift",
                "gift card",
                PatternCategory::Financial,
                1.0,
                "Gift card",
            )],
        )
        .unwrap();

        assert_eq!(catalog.matches("Buy some GIFT CARDS today").len(), 1);
        assert!(catalog.matches("a gift for you").is_empty());
    }

    #[test]
    fn test_keywords_are_literal() {
        let catalog = PatternCatalog::from_specs(
            "t",
            vec![PatternSpec::keyword(
                "dollar",
                "$5.00",
                PatternCategory::Financial,
                1.0,
                "Five dollars",
            )],
        )
        .unwrap();

        assert_eq!(catalog.matches("pay $5.00 now").len(), 1);
        assert!(catalog.matches("pay $5x00 now").is_empty());
    }

    #[test]
    fn test_matches_in_catalog_order() {
        let catalog = PatternCatalog::builtin().unwrap();
        let matches = catalog.matches(
            "Please provide your social security number and wire $500 immediately or your account will be suspended",
        );

        let ids: Vec<&str> = matches.iter().map(|m| m.pattern_id.as_str()).collect();
        assert!(ids.contains(&"ssn_request"));
        assert!(ids.contains(&"wire_amount"));
        assert!(ids.contains(&"account_status_threat"));

        let positions: Vec<usize> = ids
            .iter()
            .map(|id| catalog.patterns().iter().position(|p| p.id == *id).unwrap())
            .collect();
        let mut sorted = positions.clone();
        sorted.sort();
        assert_eq!(positions, sorted);
    }

    #[test]
    fn test_deadline_and_notice_patterns() {
        let catalog = PatternCatalog::builtin().unwrap();
        let ids = |text: &str| -> Vec<String> {
            catalog
                .matches(text)
                .into_iter()
                .map(|m| m.pattern_id)
                .collect()
        };

        assert!(ids("You have to pay within 24 hours").contains(&"deadline_window".to_string()));
        assert!(ids("This offer expires at midnight tonight").contains(&"expiry_pressure".to_string()));
        assert!(ids("You must call us back right now").contains(&"immediate_demand".to_string()));
        assert!(ids("This is your FINAL NOTICE").contains(&"final_notice".to_string()));

        for m in catalog.matches("this is your last chance, you need to act asap") {
            assert_eq!(m.category, PatternCategory::Urgency);
        }
        assert!(ids("I finished it within the week").is_empty());
    }

    #[test]
    fn test_benign_text_matches_nothing() {
        let catalog = PatternCatalog::builtin().unwrap();
        assert!(catalog
            .matches("Hi mom, just checking in, call me back when you can")
            .is_empty());
        assert!(catalog.matches("What a wonderful day").is_empty());
        assert!(catalog.matches("").is_empty());
    }

    #[test]
    fn test_bad_regex_is_configuration_error() {
        let err = PatternCatalog::from_specs(
            "t",
            vec![PatternSpec::regex(
                "broken",
                r"(unclosed",
                PatternCategory::Other,
                1.0,
                "Broken",
            )],
        )
        .unwrap_err();

        assert!(matches!(err, PipelineError::Configuration(ref msg) if msg.contains("broken")));
    }

    #[test]
    fn test_duplicate_id_is_configuration_error() {
        let spec = PatternSpec::keyword("dup", "x", PatternCategory::Other, 1.0, "X");
        let err = PatternCatalog::from_specs("t", vec![spec.clone(), spec]).unwrap_err();
        assert!(matches!(err, PipelineError::Configuration(ref msg) if msg.contains("duplicate")));
    }

    #[test]
    fn test_invalid_weight_and_empty_matcher_rejected() {
        for weight in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            let spec = PatternSpec::keyword("w", "x", PatternCategory::Other, weight, "X");
            assert!(PatternCatalog::from_specs("t", vec![spec]).is_err());
        }

        let spec = PatternSpec::keyword("e", "  ", PatternCategory::Other, 1.0, "Empty");
        assert!(PatternCatalog::from_specs("t", vec![spec]).is_err());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
version = "test-1"

[[patterns]]
id = "remote"
kind = "regex"
pattern = '\bremote\s+access'
category = "tech_support"
weight = 2.3
description = "Remote access request"
"#
        )
        .unwrap();

        let catalog = PatternCatalog::load(file.path()).unwrap();
        assert_eq!(catalog.version(), "test-1");
        let matches = catalog.matches("Give me REMOTE access to your PC");
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].category, PatternCategory::TechSupport);
    }

    #[test]
    fn test_load_missing_file_fails() {
        let err = PatternCatalog::load("/nonexistent/patterns.toml").unwrap_err();
        assert!(matches!(err, PipelineError::Configuration(_)));
    }
}
