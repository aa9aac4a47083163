//! Configuration types for pdfquiz.
//!
//! Configuration is read from an optional `pdfquiz.json` file. Every field
//! has a default, so a missing file yields a usable configuration.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{QuizError, Result};

/// The default config file name.
const CONFIG_FILE_NAME: &str = "pdfquiz.json";

/// Default extraction service endpoint.
fn default_endpoint() -> String {
    "http://127.0.0.1:8080/extract".to_string()
}

/// Default environment variable holding the extraction service API key.
fn default_api_key_env() -> String {
    "PDFQUIZ_API_KEY".to_string()
}

/// Default timeout in seconds for a single extraction call.
const fn default_extraction_timeout() -> u64 {
    120
}

/// Default maximum document size in bytes (20 MiB).
const fn default_max_document_size() -> u64 {
    20 * 1024 * 1024
}

/// Default host the HTTP adapter binds to.
fn default_host() -> String {
    "127.0.0.1".to_string()
}

/// Default port for the HTTP adapter.
const fn default_port() -> u16 {
    3000
}

/// Main configuration for pdfquiz.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Settings for the extraction gateway.
    #[serde(default)]
    pub extraction: ExtractionConfig,

    /// Largest document accepted, in bytes.
    #[serde(default = "default_max_document_size")]
    pub max_document_size: u64,

    /// Settings for the HTTP adapter.
    #[serde(default)]
    pub server: ServerConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            extraction: ExtractionConfig::default(),
            max_document_size: default_max_document_size(),
            server: ServerConfig::default(),
        }
    }
}

impl Config {
    /// Loads configuration from the current working directory.
    ///
    /// Looks for `pdfquiz.json` in the current directory and falls back to
    /// defaults when it is absent.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but contains invalid JSON.
    pub fn load() -> Result<Self> {
        let current_dir = std::env::current_dir().map_err(|e| {
            QuizError::config_parse(
                "<current directory>",
                format!("cannot determine current directory: {e}"),
            )
        })?;
        Self::load_from_dir(&current_dir)
    }

    /// Loads configuration from `pdfquiz.json` in a specific directory.
    pub fn load_from_dir(dir: &Path) -> Result<Self> {
        let config_path = dir.join(CONFIG_FILE_NAME);
        Self::load_from_file(&config_path)
    }

    /// Loads configuration from a specific file path.
    ///
    /// If the file does not exist, returns default configuration.
    ///
    /// # Errors
    ///
    /// Returns `QuizError::ConfigParseError` if the file exists but contains
    /// invalid JSON, and `QuizError::ConfigValidationError` if the values
    /// are out of range.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let config = Self::default();
                config.validate()?;
                return Ok(config);
            }
            Err(e) => {
                return Err(QuizError::config_parse(
                    path,
                    format!("failed to read file: {e}"),
                ));
            }
        };

        let config: Self = serde_json::from_str(&contents)
            .map_err(|e| QuizError::config_parse(path, e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration values.
    ///
    /// - `extraction.endpoint` must be an `http://` or `https://` URL
    /// - `extraction.timeoutSecs` must be greater than 0
    /// - `maxDocumentSize` must be greater than 0
    /// - `server.host` must not be empty
    pub fn validate(&self) -> Result<()> {
        let endpoint = self.extraction.endpoint.trim();
        if !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) {
            return Err(QuizError::config_validation(
                format!("extraction.endpoint must be an http(s) URL, got '{endpoint}'"),
                "Set extraction.endpoint to the URL of your extraction service in pdfquiz.json",
            ));
        }

        if self.extraction.timeout_secs == 0 {
            return Err(QuizError::config_validation(
                "extraction.timeoutSecs must be greater than 0",
                "Set extraction.timeoutSecs to at least 1 second in your pdfquiz.json",
            ));
        }

        if self.max_document_size == 0 {
            return Err(QuizError::config_validation(
                "maxDocumentSize must be greater than 0",
                "Set maxDocumentSize to the largest PDF size in bytes you want to accept",
            ));
        }

        if self.server.host.trim().is_empty() {
            return Err(QuizError::config_validation(
                "server.host must not be empty",
                "Use '127.0.0.1' to serve on the local machine only",
            ));
        }

        Ok(())
    }
}

/// Extraction gateway settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionConfig {
    /// URL the document is posted to.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Name of the environment variable holding a bearer token, if any.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Upper bound for a single extraction call, in seconds.
    #[serde(default = "default_extraction_timeout")]
    pub timeout_secs: u64,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            api_key_env: default_api_key_env(),
            timeout_secs: default_extraction_timeout(),
        }
    }
}

impl ExtractionConfig {
    /// The extraction timeout as a [`Duration`].
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// HTTP adapter settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerConfig {
    /// Address to bind.
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to bind.
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}
