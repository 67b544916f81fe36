//! Classification components: pattern catalog, scoring and the keyword model

pub mod aggregator;
pub mod catalog;
pub mod inference;
pub mod keyword_model;
pub mod loader;

pub use aggregator::ScoreAggregator;
pub use catalog::PatternCatalog;
pub use inference::FraudClassifier;
pub use keyword_model::{AuxiliaryModel, KeywordModel};
pub use loader::ModelLoader;
