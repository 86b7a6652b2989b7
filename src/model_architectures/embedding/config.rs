//! Construction parameters shared by both embedding variants

use std::path::Path;

use crate::core::{config_errors, UnifiedError, UnifiedResult};

/// ASEN model configuration
#[derive(Debug, Clone)]
pub struct AsenConfig {
    /// Width of the final embedding projection (used by ASENet_V2; ASENet's
    /// final projection is fixed at 1024 regardless, matching the reference
    /// weights).
    pub embedding_size: usize,
    /// Number of selectable attributes; fixes the one-hot width and the
    /// attribute embedding table height.
    pub n_attributes: usize,
}

impl Default for AsenConfig {
    fn default() -> Self {
        Self {
            embedding_size: 1024,
            n_attributes: 8,
        }
    }
}

impl AsenConfig {
    /// Load configuration from a pretrained model directory
    pub fn from_pretrained<P: AsRef<Path>>(model_path: P) -> UnifiedResult<Self> {
        let config_path = model_path.as_ref().join("config.json");

        if !config_path.exists() {
            return Err(config_errors::file_not_found(
                &config_path.display().to_string(),
            ));
        }

        let config_str = std::fs::read_to_string(&config_path)
            .map_err(|_| config_errors::file_not_found(&config_path.display().to_string()))?;

        let config_json: serde_json::Value = serde_json::from_str(&config_str).map_err(|e| {
            config_errors::invalid_json(&config_path.display().to_string(), &e.to_string())
        })?;

        let config = Self {
            embedding_size: config_json["embedding_size"].as_u64().unwrap_or(1024) as usize,
            n_attributes: config_json["n_attributes"].as_u64().unwrap_or(8) as usize,
        };
        config.validate()?;
        Ok(config)
    }

    /// Reject parameter values no layer shape can be built from.
    pub fn validate(&self) -> UnifiedResult<()> {
        if self.embedding_size == 0 {
            return Err(UnifiedError::Validation {
                field: "embedding_size".to_string(),
                expected: "a positive integer".to_string(),
                actual: "0".to_string(),
                context: None,
            });
        }
        if self.n_attributes == 0 {
            return Err(UnifiedError::Validation {
                field: "n_attributes".to_string(),
                expected: "a positive integer".to_string(),
                actual: "0".to_string(),
                context: None,
            });
        }
        Ok(())
    }
}
