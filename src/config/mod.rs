//! [`GatewayConfig`] — the ambient, process-wide, load-once configuration
//! record for the gateway.
//!
//! Distinct from [`crate::active_set::DetectionConfig`]: that one records
//! which libraries are active and is rewritten by the running process every
//! time `set_active` is called; this one is read once at startup and never
//! rewritten — changing it requires a process restart.
//!
//! ## Configuration hierarchy
//!
//! Resolved in this order (later wins), mirroring the precedence model this
//! codebase has historically used for its own policy configuration:
//!
//! 1. Compiled defaults
//! 2. A config file (`.toml`, `.yaml`/`.yml`, or `.json`, sniffed by extension)
//! 3. Environment variables (fixed names, not a prefix scan, so overrides are
//!    self-documenting rather than implicit)
//!
//! ```rust,ignore
//! use sensitive_gateway::config::GatewayConfigBuilder;
//!
//! let config = GatewayConfigBuilder::new()
//!     .with_file("gateway.toml")?
//!     .with_env()
//!     .build()?;
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use validator::Validate;

/// Errors raised while loading or validating a [`GatewayConfig`].
///
/// Distinct from [`crate::active_set::ActiveSetError`]'s notion of a corrupt
/// `detection_config.json`: that case is recoverable (fall back to "all
/// libraries"); a bad `GatewayConfig` is a startup-time fatal condition.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("failed to read config file at {path}: {source}")]
    FileRead {
        /// Path that failed to read.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Failed to parse the configuration file in its sniffed format.
    #[error("failed to parse {format} config: {source}")]
    ParseError {
        /// Format that failed to parse (YAML, TOML, JSON).
        format: String,
        /// Underlying parse error.
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// The config file's extension isn't one of `.toml`, `.yaml`/`.yml`, `.json`.
    #[error("unsupported config file format: {message}")]
    UnsupportedFormat {
        /// Description of the problem.
        message: String,
    },

    /// The loaded config failed field-level validation.
    #[error("gateway config validation failed: {0}")]
    Validation(#[from] validator::ValidationErrors),

    /// An environment-variable override could not be parsed into its field's type.
    #[error("failed to parse environment variable {key}: {message}")]
    EnvParse {
        /// Environment variable name.
        key: String,
        /// Parse-failure message.
        message: String,
    },
}

/// LLM backend settings, layered under `GatewayConfig.llm`.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct LlmConfig {
    /// Base URL of the generation endpoint.
    #[validate(length(min = 1))]
    pub base_url: String,
    /// Model name passed through to the backend.
    #[validate(length(min = 1))]
    pub model: String,
    /// Per-call timeout, in seconds. Default: 30.
    pub timeout_secs: u64,
    /// Benign probe strings issued once at startup to warm up the backend.
    pub warmup_probes: Vec<String>,
}

impl LlmConfig {
    /// The configured timeout as a [`Duration`].
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "http://172.17.0.1:11434".to_string(),
            model: "qwen:1.8b".to_string(),
            timeout_secs: 30,
            warmup_probes: vec!["你好".to_string()],
        }
    }
}

/// Per-mode character caps enforced at the edge (not by the core itself —
/// see [`crate::orchestrator::Orchestrator::detect`]), plus the upload-size
/// cap for `detect_document`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Validate)]
pub struct TextLimits {
    /// Character cap for the default (non-extended) prompt. Default: 500.
    pub default_chars: usize,
    /// Character cap for the extended prompt. Default: 10,000.
    pub extended_chars: usize,
    /// Byte cap for uploaded documents. Default: 10 MB.
    pub max_document_bytes: u64,
}

impl Default for TextLimits {
    fn default() -> Self {
        Self {
            default_chars: 500,
            extended_chars: 10_000,
            max_document_bytes: 10 * 1024 * 1024,
        }
    }
}

/// The ambient, process-wide, load-once configuration record.
///
/// Loaded once at startup and handed down by reference to whatever
/// constructs the gateway's components; it is not itself a piece of shared
/// mutable state and has no hot-reload path (unlike `DetectionConfig`).
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct GatewayConfig {
    /// Directory holding persisted word-library files.
    pub libraries_root: PathBuf,
    /// Path to the persisted `detection_config.json`.
    pub detection_config_path: PathBuf,
    /// LLM backend settings.
    #[validate(nested)]
    pub llm: LlmConfig,
    /// Text/document size caps enforced at the edge.
    #[validate(nested)]
    pub text_limits: TextLimits,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            libraries_root: PathBuf::from("libraries"),
            detection_config_path: PathBuf::from("detection_config.json"),
            llm: LlmConfig::default(),
            text_limits: TextLimits::default(),
        }
    }
}

/// Builder for constructing a [`GatewayConfig`] from defaults, an optional
/// config file, and optional environment-variable overrides.
#[derive(Debug, Default)]
pub struct GatewayConfigBuilder {
    base: GatewayConfig,
    use_env: bool,
}

impl GatewayConfigBuilder {
    /// Start from compiled defaults.
    #[must_use]
    pub fn new() -> Self {
        Self {
            base: GatewayConfig::default(),
            use_env: false,
        }
    }

    /// Load the base configuration from `path` (`.toml`, `.yaml`/`.yml`, or
    /// `.json`, sniffed by extension), overriding compiled defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::FileRead`], [`ConfigError::ParseError`], or
    /// [`ConfigError::UnsupportedFormat`].
    pub fn with_file(mut self, path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::FileRead {
            path: path.to_path_buf(),
            source,
        })?;

        self.base = match path.extension().and_then(|e| e.to_str()) {
            Some("yaml" | "yml") => {
                serde_yaml::from_str(&content).map_err(|e| ConfigError::ParseError {
                    format: "YAML".to_string(),
                    source: Box::new(e),
                })?
            }
            Some("toml") => toml::from_str(&content).map_err(|e| ConfigError::ParseError {
                format: "TOML".to_string(),
                source: Box::new(e),
            })?,
            Some("json") => {
                serde_json::from_str(&content).map_err(|e| ConfigError::ParseError {
                    format: "JSON".to_string(),
                    source: Box::new(e),
                })?
            }
            _ => {
                return Err(ConfigError::UnsupportedFormat {
                    message: "file extension must be .toml, .yaml, .yml, or .json".to_string(),
                });
            }
        };
        Ok(self)
    }

    /// Enable environment-variable overrides. Recognized names, mirroring
    /// the ones this system's historical deployment has always read
    /// directly: `SENSITIVE_WORDS_PATH` (`libraries_root`),
    /// `OLLAMA_BASE_URL`, `OLLAMA_MODEL`.
    #[must_use]
    pub fn with_env(mut self) -> Self {
        self.use_env = true;
        self
    }

    /// Resolve the final configuration and validate it.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] if the resolved config fails
    /// field-level validation.
    pub fn build(mut self) -> Result<GatewayConfig, ConfigError> {
        if self.use_env {
            dotenvy::dotenv().ok();

            if let Ok(path) = std::env::var("SENSITIVE_WORDS_PATH") {
                self.base.libraries_root = PathBuf::from(path);
            }
            if let Ok(url) = std::env::var("OLLAMA_BASE_URL") {
                self.base.llm.base_url = url;
            }
            if let Ok(model) = std::env::var("OLLAMA_MODEL") {
                self.base.llm.model = model;
            }
        }

        self.base.validate()?;
        Ok(self.base)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        let config = GatewayConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.llm.timeout(), Duration::from_secs(30));
    }

    #[test]
    fn builder_with_no_file_or_env_returns_defaults() {
        let config = GatewayConfigBuilder::new().build().unwrap();
        assert_eq!(config.libraries_root, PathBuf::from("libraries"));
    }

    #[test]
    fn toml_file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gateway.toml");
        std::fs::write(
            &path,
            r#"
            libraries_root = "custom_libs"
            detection_config_path = "custom_libs/detection_config.json"

            [llm]
            base_url = "http://example:9999"
            model = "custom-model"
            timeout_secs = 15
            warmup_probes = ["hi"]

            [text_limits]
            default_chars = 500
            extended_chars = 10000
            max_document_bytes = 1048576
            "#,
        )
        .unwrap();

        let config = GatewayConfigBuilder::new().with_file(&path).unwrap().build().unwrap();
        assert_eq!(config.libraries_root, PathBuf::from("custom_libs"));
        assert_eq!(config.llm.base_url, "http://example:9999");
        assert_eq!(config.llm.timeout_secs, 15);
    }

    #[test]
    fn unsupported_extension_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gateway.ini");
        std::fs::write(&path, "irrelevant").unwrap();
        let err = GatewayConfigBuilder::new().with_file(&path).unwrap_err();
        assert!(matches!(err, ConfigError::UnsupportedFormat { .. }));
    }

    #[test]
    fn env_overrides_base_url_and_model() {
        // SAFETY: test runs single-threaded with respect to this env var pair;
        // no other test in this module reads or writes them.
        unsafe {
            std::env::set_var("OLLAMA_BASE_URL", "http://overridden:1234");
            std::env::set_var("OLLAMA_MODEL", "overridden-model");
        }
        let config = GatewayConfigBuilder::new().with_env().build().unwrap();
        assert_eq!(config.llm.base_url, "http://overridden:1234");
        assert_eq!(config.llm.model, "overridden-model");
        unsafe {
            std::env::remove_var("OLLAMA_BASE_URL");
            std::env::remove_var("OLLAMA_MODEL");
        }
    }
}
