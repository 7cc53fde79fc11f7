//! Configuration file support for LendScore
//!
//! Supports both YAML and TOML configuration files.
//!
//! # Example YAML configuration:
//! ```yaml
//! # LendScore configuration file
//!
//! # Server settings
//! server:
//!   port: 8000
//!   bind: "0.0.0.0"
//!
//! # Model artifacts
//! model:
//!   path: /app/model.json
//!   metadata_path: /app/preprocessing.json
//!   max_batch_size: 100
//!
//! # Logging settings
//! logging:
//!   level: info
//!   format: json
//! ```

use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::{Path, PathBuf};

use lendscore_core::{ModelLoader, DEFAULT_MAX_BATCH_SIZE};

/// Main configuration structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    /// Server configuration
    pub server: ServerConfig,

    /// Model artifact configuration
    pub model: ModelConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Server configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Server port
    pub port: u16,

    /// Bind address
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8000,
            bind: "0.0.0.0".to_string(),
        }
    }
}

/// Model artifact configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Path to the model artifact
    pub path: PathBuf,

    /// Path to the preprocessing metadata (JSON or YAML)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata_path: Option<PathBuf>,

    /// Maximum number of requests in one batch
    pub max_batch_size: usize,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("model.json"),
            metadata_path: None,
            max_batch_size: DEFAULT_MAX_BATCH_SIZE,
        }
    }
}

impl ModelConfig {
    /// Loader for the configured artifacts
    pub fn loader(&self) -> ModelLoader {
        let loader = ModelLoader::new(&self.path);
        match &self.metadata_path {
            Some(path) => loader.with_metadata(path),
            None => loader,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (text, json)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "text".to_string(),
        }
    }
}

/// Command-line and environment values that take precedence over the file
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub port: Option<u16>,
    pub bind: Option<String>,
    pub model_path: Option<PathBuf>,
    pub metadata_path: Option<PathBuf>,
    pub max_batch_size: Option<usize>,
}

impl Config {
    /// Load the file when given, defaults otherwise
    pub fn resolve(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    /// Apply explicitly set overrides
    pub fn apply(&mut self, overrides: Overrides) {
        if let Some(port) = overrides.port {
            self.server.port = port;
        }
        if let Some(bind) = overrides.bind {
            self.server.bind = bind;
        }
        if let Some(path) = overrides.model_path {
            self.model.path = path;
        }
        if let Some(path) = overrides.metadata_path {
            self.model.metadata_path = Some(path);
        }
        if let Some(size) = overrides.max_batch_size {
            self.model.max_batch_size = size;
        }
    }

    /// Load configuration from a file (YAML or TOML, auto-detected by extension)
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::IoError(path.to_path_buf(), e.to_string()))?;

        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_lowercase();

        match extension.as_str() {
            "yaml" | "yml" => Self::from_yaml(&content),
            "toml" => Self::from_toml(&content),
            _ => {
                // Try YAML first, then TOML
                Self::from_yaml(&content).or_else(|_| Self::from_toml(&content))
            }
        }
    }

    /// Parse configuration from YAML string
    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        serde_yaml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Parse configuration from TOML string
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Check values that would otherwise fail after startup
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.model.max_batch_size == 0 {
            return Err(ConfigError::Invalid(
                "model.max_batch_size must be at least 1".to_string(),
            ));
        }
        self.bind_addr()?;
        match self.logging.format.as_str() {
            "text" | "json" => Ok(()),
            other => Err(ConfigError::Invalid(format!(
                "logging.format must be 'text' or 'json', got '{}'",
                other
            ))),
        }
    }

    /// Parsed bind address
    pub fn bind_addr(&self) -> Result<IpAddr, ConfigError> {
        self.server.bind.parse().map_err(|_| {
            ConfigError::Invalid(format!(
                "server.bind '{}' is not an IP address",
                self.server.bind
            ))
        })
    }

    /// Create an example configuration
    pub fn example() -> Self {
        Self {
            server: ServerConfig {
                port: 8000,
                bind: "0.0.0.0".to_string(),
            },
            model: ModelConfig {
                path: PathBuf::from("/app/model.json"),
                metadata_path: Some(PathBuf::from("/app/preprocessing.json")),
                max_batch_size: DEFAULT_MAX_BATCH_SIZE,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                format: "json".to_string(),
            },
        }
    }

    /// Generate example YAML configuration
    pub fn example_yaml() -> String {
        serde_yaml::to_string(&Self::example()).unwrap_or_default()
    }

    /// Generate example TOML configuration
    pub fn example_toml() -> String {
        toml::to_string_pretty(&Self::example()).unwrap_or_default()
    }
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {0}: {1}")]
    IoError(PathBuf, String),

    #[error("Failed to parse config: {0}")]
    ParseError(String),

    #[error("Invalid config: {0}")]
    Invalid(String),
}
