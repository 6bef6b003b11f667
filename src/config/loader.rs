//! Configuration loading from disk.

use std::fs;
use std::path::Path;

use crate::config::schema::EdgeConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Toml(toml::de::Error),
    Json(serde_json::Error),
    Validation(Vec<ValidationError>),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "IO error: {}", e),
            ConfigError::Toml(e) => write!(f, "TOML parse error: {}", e),
            ConfigError::Json(e) => write!(f, "JSON parse error: {}", e),
            ConfigError::Validation(errors) => {
                write!(f, "Validation failed: ")?;
                for (i, err) in errors.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", err)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Load and validate configuration. `.json` files are read as JSON, anything
/// else as TOML.
pub fn load_config(path: &Path) -> Result<EdgeConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(ConfigError::Io)?;
    let is_json = path.extension().is_some_and(|e| e == "json");
    parse_config(&content, is_json)
}

/// Parse and validate configuration text.
pub fn parse_config(content: &str, is_json: bool) -> Result<EdgeConfig, ConfigError> {
    let config: EdgeConfig = if is_json {
        serde_json::from_str(content).map_err(ConfigError::Json)?
    } else {
        toml::from_str(content).map_err(ConfigError::Toml)?
    };

    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}
