//! # Configuration Module
//!
//! Application configuration loaded from YAML, TOML or JSON, with environment
//! overrides applied on top.
//!
//! ## Environment Variables
//!
//! ### `STARLING_SCHEMA_CACHE`
//!
//! `lazy` (default) generates plugin schema models on first use. `eager`
//! generates the general and request body schema of every registered model at
//! startup, so the first request for a model does not pay for generation.
//!
//! ### `STARLING_LOG_LEVEL`
//!
//! Read when logging is installed; see [`crate::logging`].
//!
//! ## Example
//!
//! ```yaml
//! schema_cache: eager
//! templates:
//!   directory: [templates, shared/templates]
//! logging:
//!   root:
//!     level: DEBUG
//!     handlers: [queue_listener]
//! ```

use crate::logging::LoggingConfig;
use crate::template::TemplateConfig;
use anyhow::{bail, Context, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

/// Environment variable selecting [`SchemaCacheMode`].
pub const SCHEMA_CACHE_ENV: &str = "STARLING_SCHEMA_CACHE";

/// When plugin schema models are generated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchemaCacheMode {
    #[default]
    Lazy,
    Eager,
}

impl SchemaCacheMode {
    pub fn parse(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "lazy" | "on" => Ok(SchemaCacheMode::Lazy),
            "eager" | "preload" => Ok(SchemaCacheMode::Eager),
            other => bail!("{SCHEMA_CACHE_ENV}: expected 'lazy' or 'eager', got '{other}'"),
        }
    }
}

/// Top-level application configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub logging: LoggingConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub templates: Option<TemplateConfig>,
    pub schema_cache: SchemaCacheMode,
}

impl AppConfig {
    /// Load from `path` and apply environment overrides.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let mut config: AppConfig = load_file(path.as_ref())?;
        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Apply overrides looked up by variable name.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(mode) = lookup(SCHEMA_CACHE_ENV) {
            self.schema_cache = SchemaCacheMode::parse(&mode)?;
            debug!(schema_cache = ?self.schema_cache, "Schema cache mode overridden from environment");
        }
        Ok(())
    }
}

/// Deserialize a configuration file, choosing the format by extension.
/// Files without a recognised extension are read as YAML.
pub fn load_file<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    let parsed = match extension.as_deref() {
        Some("json") => serde_json::from_str(&content).map_err(anyhow::Error::from),
        Some("toml") => toml::from_str(&content).map_err(anyhow::Error::from),
        _ => serde_yaml::from_str(&content).map_err(anyhow::Error::from),
    };
    parsed.with_context(|| format!("Invalid config file {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::LogLevel;
    use std::fs;

    #[test]
    fn test_yaml_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.yaml");
        fs::write(
            &path,
            "schema_cache: eager\ntemplates:\n  directory: templates\nlogging:\n  root:\n    level: DEBUG\n    handlers: [console]\n",
        )
        .unwrap();
        let config: AppConfig = load_file(&path).unwrap();
        assert_eq!(config.schema_cache, SchemaCacheMode::Eager);
        assert_eq!(config.logging.root.level, Some(LogLevel::Debug));
        // unspecified sections keep their defaults
        assert!(config.logging.handlers.contains_key("queue_listener"));
        assert_eq!(config.templates.unwrap().directory.len(), 1);
    }

    #[test]
    fn test_toml_and_json_config() {
        let dir = tempfile::tempdir().unwrap();
        let toml_path = dir.path().join("app.toml");
        fs::write(&toml_path, "schema_cache = \"lazy\"\n[logging.root]\nlevel = \"WARNING\"\n").unwrap();
        let config: AppConfig = load_file(&toml_path).unwrap();
        assert_eq!(config.logging.root.level, Some(LogLevel::Warning));

        let json_path = dir.path().join("app.json");
        fs::write(&json_path, r#"{"schema_cache": "eager"}"#).unwrap();
        let config: AppConfig = load_file(&json_path).unwrap();
        assert_eq!(config.schema_cache, SchemaCacheMode::Eager);
    }

    #[test]
    fn test_invalid_file_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        fs::write(&path, "{").unwrap();
        let err = load_file::<AppConfig>(&path).unwrap_err();
        assert!(format!("{err:#}").contains("broken.json"));
    }

    #[test]
    fn test_env_override() {
        let mut config = AppConfig::default();
        config
            .apply_overrides(|key| (key == SCHEMA_CACHE_ENV).then(|| "EAGER".to_string()))
            .unwrap();
        assert_eq!(config.schema_cache, SchemaCacheMode::Eager);
        assert!(config
            .apply_overrides(|_| Some("sometimes".to_string()))
            .is_err());
    }
}
