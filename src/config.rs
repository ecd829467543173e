//! Configuration for Smartfarm.
//!
//! Reads optional settings from `~/.config/smartfarm/config.json`; environment
//! variables (`GEMINI_API_KEY`, `SMARTFARM_MODEL`, `SMARTFARM_DB_PATH`) win over
//! the file.

use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::gemini::DEFAULT_GEMINI_MODEL;

pub const DEFAULT_TEMPERATURE: f32 = 0.5;
pub const DEFAULT_MAX_OUTPUT_TOKENS: u32 = 2000;
const DB_FILE: &str = "farmers.db";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Gemini API key not configured (set GEMINI_API_KEY or api_key in {0})")]
    MissingApiKey(String),
    #[error("Failed to read configuration file at {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("Failed to parse configuration file at {path}: {source}")]
    Parse {
        path: String,
        source: serde_json::Error,
    },
}

/// Shape of config.json; every field is optional.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FileConfig {
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub db_path: Option<PathBuf>,
    #[serde(default)]
    pub log_dir: Option<PathBuf>,
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default)]
    pub max_output_tokens: Option<u32>,
    #[serde(default)]
    pub cache_responses: Option<bool>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub api_key: String,
    pub model: String,
    pub db_path: PathBuf,
    pub log_dir: PathBuf,
    pub temperature: f32,
    pub max_output_tokens: u32,
    pub cache_responses: bool,
}

impl AppConfig {
    /// Load from the default config file (if present) and the environment.
    pub fn load() -> Result<Self, ConfigError> {
        let path = config_path();
        let file = match &path {
            Some(path) if path.exists() => read_config_file(path)?,
            _ => FileConfig::default(),
        };
        let source = path
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "config.json".to_string());

        Self::resolve(file, |key| std::env::var(key).ok(), &source)
    }

    /// Merge file settings with overrides looked up through `env`.
    pub fn resolve<F>(file: FileConfig, env: F, source: &str) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |value: Option<String>| value.filter(|v| !v.trim().is_empty());

        let api_key = non_empty(env("GEMINI_API_KEY"))
            .or_else(|| non_empty(file.api_key))
            .ok_or_else(|| ConfigError::MissingApiKey(source.to_string()))?;
        let model = non_empty(env("SMARTFARM_MODEL"))
            .or_else(|| non_empty(file.model))
            .unwrap_or_else(|| DEFAULT_GEMINI_MODEL.to_string());
        let db_path = non_empty(env("SMARTFARM_DB_PATH"))
            .map(PathBuf::from)
            .or(file.db_path)
            .unwrap_or_else(|| data_dir().join(DB_FILE));

        Ok(Self {
            api_key,
            model,
            db_path,
            log_dir: file.log_dir.unwrap_or_else(crate::logging::default_log_dir),
            temperature: file.temperature.unwrap_or(DEFAULT_TEMPERATURE),
            max_output_tokens: file.max_output_tokens.unwrap_or(DEFAULT_MAX_OUTPUT_TOKENS),
            cache_responses: file.cache_responses.unwrap_or(true),
        })
    }
}

pub fn read_config_file(path: &Path) -> Result<FileConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.display().to_string(),
        source,
    })?;

    serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.display().to_string(),
        source,
    })
}

/// ~/.config/smartfarm/config.json
fn config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".config").join("smartfarm").join("config.json"))
}

fn data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("smartfarm")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_with_env_key() {
        let config =
            AppConfig::resolve(FileConfig::default(), env_from(&[("GEMINI_API_KEY", "abc")]), "test")
                .unwrap();

        assert_eq!(config.api_key, "abc");
        assert_eq!(config.model, DEFAULT_GEMINI_MODEL);
        assert_eq!(config.temperature, DEFAULT_TEMPERATURE);
        assert_eq!(config.max_output_tokens, DEFAULT_MAX_OUTPUT_TOKENS);
        assert!(config.cache_responses);
        assert!(config.db_path.ends_with("farmers.db"));
    }

    #[test]
    fn test_env_overrides_file() {
        let file = FileConfig {
            api_key: Some("from-file".to_string()),
            model: Some("gemini-2.0-flash".to_string()),
            db_path: Some(PathBuf::from("/tmp/file.db")),
            ..FileConfig::default()
        };
        let config = AppConfig::resolve(
            file,
            env_from(&[("GEMINI_API_KEY", "from-env"), ("SMARTFARM_DB_PATH", "/tmp/env.db")]),
            "test",
        )
        .unwrap();

        assert_eq!(config.api_key, "from-env");
        assert_eq!(config.model, "gemini-2.0-flash");
        assert_eq!(config.db_path, PathBuf::from("/tmp/env.db"));
    }

    #[test]
    fn test_missing_or_blank_key_is_error() {
        let file = FileConfig {
            api_key: Some("   ".to_string()),
            ..FileConfig::default()
        };
        let result = AppConfig::resolve(file, env_from(&[]), "config.json");
        assert!(matches!(result, Err(ConfigError::MissingApiKey(_))));
    }

    #[test]
    fn test_read_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"api_key": "k", "temperature": 0.2, "cache_responses": false}"#).unwrap();

        let file = read_config_file(&path).unwrap();
        assert_eq!(file.api_key.as_deref(), Some("k"));
        assert_eq!(file.temperature, Some(0.2));
        assert_eq!(file.cache_responses, Some(false));

        fs::write(&path, "not json").unwrap();
        assert!(matches!(read_config_file(&path), Err(ConfigError::Parse { .. })));
    }
}
