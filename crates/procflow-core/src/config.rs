//! Configuration for the process definition registry
//!
//! Defaults can be overridden by a YAML fragment or by environment variables.

use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use tracing::{info, warn};

use crate::error::CoreError;

/// Environment variable overriding [`RegistryConfig::definitions_dir`]
pub const ENV_DEFINITIONS_DIR: &str = "PROCFLOW_DEFINITIONS_DIR";
/// Environment variable overriding [`RegistryConfig::definition_extension`]
pub const ENV_DEFINITION_EXTENSION: &str = "PROCFLOW_DEFINITION_EXTENSION";
/// Environment variable overriding [`RegistryConfig::skip_malformed`]
pub const ENV_SKIP_MALFORMED: &str = "PROCFLOW_SKIP_MALFORMED";

/// Registry configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Directory scanned for definition sources
    #[serde(default = "default_definitions_dir")]
    pub definitions_dir: PathBuf,

    /// File extension of definition sources, without the dot
    #[serde(default = "default_definition_extension")]
    pub definition_extension: String,

    /// Keep loading the remaining definitions when one is malformed
    #[serde(default = "default_skip_malformed")]
    pub skip_malformed: bool,
}

fn default_definitions_dir() -> PathBuf {
    PathBuf::from("./process/definitions")
}

fn default_definition_extension() -> String {
    "yaml".to_string()
}

fn default_skip_malformed() -> bool {
    true
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            definitions_dir: default_definitions_dir(),
            definition_extension: default_definition_extension(),
            skip_malformed: default_skip_malformed(),
        }
    }
}

impl RegistryConfig {
    /// Load configuration from defaults overlaid with environment variables
    pub fn load() -> Result<Self, CoreError> {
        let mut config = Self::default();
        config.apply_env();
        config.validate()?;

        info!(
            definitions_dir = %config.definitions_dir.display(),
            extension = %config.definition_extension,
            skip_malformed = config.skip_malformed,
            "Loaded registry configuration"
        );
        Ok(config)
    }

    /// Read configuration from a YAML fragment. Missing keys take their defaults.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, CoreError> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    fn apply_env(&mut self) {
        if let Ok(dir) = env::var(ENV_DEFINITIONS_DIR) {
            self.definitions_dir = PathBuf::from(dir);
        }

        if let Ok(extension) = env::var(ENV_DEFINITION_EXTENSION) {
            self.definition_extension = extension.trim_start_matches('.').to_string();
        }

        if let Ok(skip) = env::var(ENV_SKIP_MALFORMED) {
            match skip.to_lowercase().as_str() {
                "true" | "1" | "yes" => self.skip_malformed = true,
                "false" | "0" | "no" => self.skip_malformed = false,
                _ => warn!("Invalid {} value: {}", ENV_SKIP_MALFORMED, skip),
            }
        }
    }

    fn validate(&self) -> Result<(), CoreError> {
        if self.definition_extension.trim().is_empty() {
            return Err(CoreError::ConfigurationError(
                "definition_extension must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}
