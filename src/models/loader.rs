//! Auxiliary model loader

use crate::config::ModelConfig;
use crate::models::keyword_model::{AuxiliaryModel, KeywordModel, KeywordModelDefinition};
use anyhow::{Context, Result};
use config::{Config, File, FileFormat};
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

/// Loads the optional keyword model from disk
pub struct ModelLoader;

impl ModelLoader {
    /// Load a keyword model definition file
    pub fn load_keyword_model<P: AsRef<Path>>(path: P) -> Result<KeywordModel> {
        let path = path.as_ref();

        info!(path = %path.display(), "Loading keyword model");

        let definition: KeywordModelDefinition = Config::builder()
            .add_source(File::from(path).format(FileFormat::Toml).required(true))
            .build()
            .context(format!("Failed to read model from {:?}", path))?
            .try_deserialize()
            .context(format!("Malformed model definition in {:?}", path))?;

        let model = KeywordModel::from_definition(definition)?;

        info!(
            model = %model.name(),
            terms = model.term_count(),
            "Model loaded successfully"
        );

        Ok(model)
    }

    /// Load the configured model, or `None` when it is disabled or cannot be
    /// loaded. Classification then runs on patterns and linguistics alone.
    pub fn load_configured(config: &ModelConfig) -> Option<Arc<dyn AuxiliaryModel>> {
        if !config.enabled {
            info!("Keyword model disabled");
            return None;
        }

        let path = Path::new(&config.path);
        if !path.exists() {
            warn!(path = %path.display(), "Model file not found, continuing without model");
            return None;
        }

        match Self::load_keyword_model(path) {
            Ok(model) => Some(Arc::new(model)),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to load model, continuing without model");
                None
            }
        }
    }
}
