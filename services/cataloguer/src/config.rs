//! Cataloguer configuration.

use std::env;
use std::path::Path;
use std::str::FromStr;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use catalog::DEFAULT_CACHE_SIZE;
use meta_common::DEFAULT_RELATIVE_TOLERANCE;

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Json,
    Text,
}

impl FromStr for LogFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "text" => Ok(Self::Text),
            other => bail!("Unknown log format '{other}', expected 'json' or 'text'"),
        }
    }
}

/// Top-level cataloguer configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CataloguerConfig {
    /// Path of the SQLite catalogue
    pub database_url: String,

    /// Relative tolerance for matching grid origins and steps
    pub grid_tolerance: f64,

    /// Number of variables whose derived geometry is cached
    pub geometry_cache_size: usize,

    pub log_level: String,

    pub log_format: LogFormat,
}

impl Default for CataloguerConfig {
    fn default() -> Self {
        Self {
            database_url: "modelmeta.sqlite".to_string(),
            grid_tolerance: DEFAULT_RELATIVE_TOLERANCE,
            geometry_cache_size: DEFAULT_CACHE_SIZE,
            log_level: "info".to_string(),
            log_format: LogFormat::Json,
        }
    }
}

impl CataloguerConfig {
    /// Load configuration from a YAML file. Missing keys take their defaults.
    pub fn from_yaml<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Self = serde_yaml::from_str(&text)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let grid_tolerance = match lookup("MODELMETA_GRID_TOLERANCE") {
            Some(v) => v
                .parse()
                .with_context(|| format!("Invalid MODELMETA_GRID_TOLERANCE '{v}'"))?,
            None => defaults.grid_tolerance,
        };
        let geometry_cache_size = match lookup("MODELMETA_CACHE_SIZE") {
            Some(v) => v
                .parse()
                .with_context(|| format!("Invalid MODELMETA_CACHE_SIZE '{v}'"))?,
            None => defaults.geometry_cache_size,
        };
        let log_format = match lookup("LOG_FORMAT") {
            Some(v) => v.parse()?,
            None => defaults.log_format,
        };

        let config = Self {
            database_url: lookup("MODELMETA_DATABASE").unwrap_or(defaults.database_url),
            grid_tolerance,
            geometry_cache_size,
            log_level: lookup("LOG_LEVEL").unwrap_or(defaults.log_level),
            log_format,
        };
        config.validate()?;
        Ok(config)
    }

    /// Apply command-line overrides.
    pub fn with_overrides(mut self, database: Option<String>, log_level: Option<String>) -> Self {
        if let Some(database) = database {
            self.database_url = database;
        }
        if let Some(log_level) = log_level {
            self.log_level = log_level;
        }
        self
    }

    fn validate(&self) -> Result<()> {
        if self.grid_tolerance.is_nan() || self.grid_tolerance <= 0.0 {
            bail!("grid_tolerance must be positive, got {}", self.grid_tolerance);
        }
        if self.geometry_cache_size == 0 {
            bail!("geometry_cache_size must be at least 1");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_env_defaults() {
        let config = CataloguerConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, CataloguerConfig::default());
        assert_eq!(config.geometry_cache_size, 4);
        assert_eq!(config.grid_tolerance, 1e-6);
    }

    #[test]
    fn test_env_values() {
        let config = CataloguerConfig::from_lookup(lookup(&[
            ("MODELMETA_DATABASE", "/tmp/mm.sqlite"),
            ("MODELMETA_GRID_TOLERANCE", "1e-5"),
            ("MODELMETA_CACHE_SIZE", "16"),
            ("LOG_LEVEL", "debug"),
            ("LOG_FORMAT", "TEXT"),
        ]))
        .unwrap();

        assert_eq!(config.database_url, "/tmp/mm.sqlite");
        assert_eq!(config.grid_tolerance, 1e-5);
        assert_eq!(config.geometry_cache_size, 16);
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.log_format, LogFormat::Text);
    }

    #[test]
    fn test_env_rejects_bad_values() {
        assert!(CataloguerConfig::from_lookup(lookup(&[("MODELMETA_CACHE_SIZE", "many")])).is_err());
        assert!(CataloguerConfig::from_lookup(lookup(&[("MODELMETA_CACHE_SIZE", "0")])).is_err());
        assert!(CataloguerConfig::from_lookup(lookup(&[("MODELMETA_GRID_TOLERANCE", "-1")])).is_err());
        assert!(CataloguerConfig::from_lookup(lookup(&[("LOG_FORMAT", "xml")])).is_err());
    }

    #[test]
    fn test_yaml_partial() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cataloguer.yaml");
        std::fs::write(&path, "database_url: /data/modelmeta.sqlite\nlog_format: text\n").unwrap();

        let config = CataloguerConfig::from_yaml(&path).unwrap();
        assert_eq!(config.database_url, "/data/modelmeta.sqlite");
        assert_eq!(config.log_format, LogFormat::Text);
        assert_eq!(config.geometry_cache_size, DEFAULT_CACHE_SIZE);
    }

    #[test]
    fn test_yaml_missing_file() {
        let err = CataloguerConfig::from_yaml("/nonexistent/cataloguer.yaml").unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }

    #[test]
    fn test_overrides() {
        let config = CataloguerConfig::default()
            .with_overrides(Some("other.sqlite".to_string()), None);
        assert_eq!(config.database_url, "other.sqlite");
        assert_eq!(config.log_level, "info");
    }
}
