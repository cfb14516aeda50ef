//! Client configuration.
//!
//! Configuration is read from a TOML file under the user config directory,
//! with environment variables taking precedence over file values:
//!
//! 1. `~/.config/docchat/config.toml`
//! 2. Environment variables (`DOCCHAT_BASE_URL`, `DOCCHAT_AUTH_TOKEN`,
//!    `DOCCHAT_TIMEOUT_SECS`)
//!
//! Every field has a default, so a missing file yields a working
//! configuration pointed at a local backend.

use crate::error::Result;
use crate::upload::UploadConstraints;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Root configuration for the docchat client.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// RAG backend endpoint settings
    #[serde(default)]
    pub backend: BackendConfig,
    /// Bulk upload settings
    #[serde(default)]
    pub upload: UploadSettings,
}

/// Where and how to reach the RAG backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Base URL of the backend, no trailing slash
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Per-request deadline in seconds
    #[serde(default = "default_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Static bearer token for the gateway, if the deployment uses one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_token: Option<String>,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            request_timeout_secs: default_timeout_secs(),
            auth_token: None,
        }
    }
}

impl BackendConfig {
    /// The per-request deadline as a `Duration`.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Bulk upload limits and pacing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadSettings {
    /// Maximum file size in bytes
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,
    /// Accepted extensions, lowercase and dot-prefixed
    #[serde(default = "default_accepted_extensions")]
    pub accepted_extensions: Vec<String>,
    /// Maximum number of files per batch
    #[serde(default = "default_max_files")]
    pub max_files: usize,
    /// Delay between progress steps while staging a file, in milliseconds
    #[serde(default = "default_progress_step_ms")]
    pub progress_step_ms: u64,
}

impl Default for UploadSettings {
    fn default() -> Self {
        Self {
            max_file_size: default_max_file_size(),
            accepted_extensions: default_accepted_extensions(),
            max_files: default_max_files(),
            progress_step_ms: default_progress_step_ms(),
        }
    }
}

impl UploadSettings {
    /// The validation constraints derived from these settings.
    pub fn constraints(&self) -> UploadConstraints {
        UploadConstraints {
            max_file_size: self.max_file_size,
            accepted_extensions: self.accepted_extensions.clone(),
            max_files: self.max_files,
        }
    }
}

fn default_base_url() -> String {
    "http://127.0.0.1:8006".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_max_file_size() -> u64 {
    50 * 1024 * 1024
}

fn default_accepted_extensions() -> Vec<String> {
    [".pdf", ".docx", ".txt", ".csv", ".xlsx", ".pptx"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_max_files() -> usize {
    10
}

fn default_progress_step_ms() -> u64 {
    100
}

impl ClientConfig {
    /// The default config file location under the user config directory.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("docchat").join("config.toml"))
    }

    /// Loads configuration from a TOML file.
    ///
    /// A missing file yields the defaults.
    ///
    /// # Errors
    ///
    /// Returns an `Io` error if the file cannot be read, or a
    /// `Serialization` error if it is not valid TOML.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Loads configuration with the standard priority: explicit path (or the
    /// default location), then environment overrides.
    pub fn resolve(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::load(path)?,
            None => match Self::default_path() {
                Some(path) => Self::load(&path)?,
                None => Self::default(),
            },
        };
        config.apply_env();
        Ok(config)
    }

    /// Applies environment-variable overrides on top of the file values.
    pub fn apply_env(&mut self) {
        if let Ok(base_url) = std::env::var("DOCCHAT_BASE_URL") {
            self.backend.base_url = base_url.trim_end_matches('/').to_string();
        }
        if let Ok(token) = std::env::var("DOCCHAT_AUTH_TOKEN") {
            self.backend.auth_token = Some(token);
        }
        if let Ok(secs) = std::env::var("DOCCHAT_TIMEOUT_SECS") {
            match secs.parse() {
                Ok(secs) => self.backend.request_timeout_secs = secs,
                Err(_) => {
                    tracing::warn!("Ignoring unparsable DOCCHAT_TIMEOUT_SECS: {:?}", secs);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_point_at_local_backend() {
        let config = ClientConfig::default();
        assert_eq!(config.backend.base_url, "http://127.0.0.1:8006");
        assert_eq!(config.backend.request_timeout_secs, 30);
        assert_eq!(config.upload.max_files, 10);
        assert_eq!(config.upload.max_file_size, 50 * 1024 * 1024);
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = ClientConfig::load(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config, ClientConfig::default());
    }

    #[test]
    fn test_partial_file_keeps_defaults_for_unset_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "[backend]").unwrap();
        writeln!(file, "base_url = \"https://rag.internal:9000\"").unwrap();

        let config = ClientConfig::load(&path).unwrap();
        assert_eq!(config.backend.base_url, "https://rag.internal:9000");
        assert_eq!(config.backend.request_timeout_secs, 30);
        assert_eq!(config.upload.max_files, 10);
    }

    #[test]
    fn test_invalid_toml_is_a_serialization_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "backend = not toml").unwrap();

        let err = ClientConfig::load(&path).unwrap_err();
        assert!(matches!(
            err,
            crate::error::DocChatError::Serialization { .. }
        ));
    }

    #[test]
    fn test_upload_settings_build_constraints() {
        let settings = UploadSettings::default();
        let constraints = settings.constraints();
        assert_eq!(constraints.max_files, 10);
        assert!(constraints.accepted_extensions.contains(&".pdf".to_string()));
    }
}
