
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Config {
    #[serde(default)]
    pub analysis: AnalysisConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub query: QueryConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(skip)]
    pub base_dir: PathBuf,
}

/// Thresholds driving the relational vs. document decision
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Presence ratio at or above which a path counts as common
    pub common_presence_ratio: f64,
    /// Stability score at or above which a batch goes relational
    pub stability_threshold: f64,
}

impl Default for AnalysisConfig {
    #[inline]
    fn default() -> Self {
        Self {
            common_presence_ratio: 0.8,
            stability_threshold: 0.15,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StorageConfig {
    pub relational_file: String,
    pub document_file: String,
    pub max_connections: u32,
    pub top_table: String,
    pub default_namespace: String,
}

impl Default for StorageConfig {
    #[inline]
    fn default() -> Self {
        Self {
            relational_file: "relational.db".to_string(),
            document_file: "documents.db".to_string(),
            max_connections: 5,
            top_table: "items".to_string(),
            default_namespace: "default".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct QueryConfig {
    pub default_limit: i64,
}

impl Default for QueryConfig {
    #[inline]
    fn default() -> Self {
        Self { default_limit: 100 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SearchConfig {
    pub default_top_k: usize,
}

impl Default for SearchConfig {
    #[inline]
    fn default() -> Self {
        Self { default_top_k: 5 }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Data directory not found or could not be created")]
    DirectoryError,
    #[error("Invalid common presence ratio: {0} (must be in (0, 1])")]
    InvalidPresenceRatio(f64),
    #[error("Invalid stability threshold: {0} (must be between -10 and 1)")]
    InvalidStabilityThreshold(f64),
    #[error("Invalid max connections: {0} (must be between 1 and 64)")]
    InvalidMaxConnections(u32),
    #[error("Invalid {field}: cannot be empty")]
    EmptyName { field: &'static str },
    #[error("Invalid default limit: {0} (must be between 1 and 100000)")]
    InvalidDefaultLimit(i64),
    #[error("Invalid default top_k: {0} (must be between 1 and 1000)")]
    InvalidTopK(usize),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parsing error: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

impl Config {
    /// Default data directory, `<platform data dir>/polystore`
    #[inline]
    pub fn default_dir() -> Result<PathBuf, ConfigError> {
        dirs::data_dir()
            .or_else(dirs::home_dir)
            .map(|dir| dir.join("polystore"))
            .ok_or(ConfigError::DirectoryError)
    }

    #[inline]
    pub fn load<P: AsRef<Path>>(config_dir: P) -> Result<Self> {
        let config_path = config_dir.as_ref().join("config.toml");

        if !config_path.exists() {
            return Ok(Self {
                base_dir: config_dir.as_ref().to_path_buf(),
                ..Self::default()
            });
        }

        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        let mut config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", config_path.display()))?;
        config.base_dir = config_dir.as_ref().to_path_buf();

        config
            .validate()
            .with_context(|| "Configuration validation failed")?;

        Ok(config)
    }

    #[inline]
    pub fn save(&self) -> Result<()> {
        self.validate()
            .context("Configuration validation failed before saving")?;

        let config_dir = self.get_base_dir();

        fs::create_dir_all(config_dir).with_context(|| {
            format!("Failed to create data directory: {}", config_dir.display())
        })?;

        let config_path = self.config_file_path();
        let content = toml::to_string_pretty(self).context("Failed to serialize config to TOML")?;

        fs::write(&config_path, content)
            .with_context(|| format!("Failed to write config file: {}", config_path.display()))?;

        Ok(())
    }

    #[inline]
    pub fn get_base_dir(&self) -> &Path {
        &self.base_dir
    }

    #[inline]
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.analysis.validate()?;
        self.storage.validate()?;

        if !(1..=100_000).contains(&self.query.default_limit) {
            return Err(ConfigError::InvalidDefaultLimit(self.query.default_limit));
        }

        if !(1..=1000).contains(&self.search.default_top_k) {
            return Err(ConfigError::InvalidTopK(self.search.default_top_k));
        }

        Ok(())
    }

    #[inline]
    pub fn config_file_path(&self) -> PathBuf {
        self.get_base_dir().join("config.toml")
    }

    /// Path of the SQLite file backing the relational store
    #[inline]
    pub fn relational_path(&self) -> PathBuf {
        self.get_base_dir().join(&self.storage.relational_file)
    }

    /// Path of the SQLite file backing the document store
    #[inline]
    pub fn document_path(&self) -> PathBuf {
        self.get_base_dir().join(&self.storage.document_file)
    }
}

impl AnalysisConfig {
    #[inline]
    pub fn validate(&self) -> Result<(), ConfigError> {
        let ratio = self.common_presence_ratio;
        if !(ratio > 0.0 && ratio <= 1.0) {
            return Err(ConfigError::InvalidPresenceRatio(ratio));
        }

        let threshold = self.stability_threshold;
        if !(-10.0..=1.0).contains(&threshold) {
            return Err(ConfigError::InvalidStabilityThreshold(threshold));
        }

        Ok(())
    }
}

impl StorageConfig {
    #[inline]
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=64).contains(&self.max_connections) {
            return Err(ConfigError::InvalidMaxConnections(self.max_connections));
        }

        let names = [
            ("relational_file", &self.relational_file),
            ("document_file", &self.document_file),
            ("top_table", &self.top_table),
            ("default_namespace", &self.default_namespace),
        ];
        for (field, value) in names {
            if value.trim().is_empty() {
                return Err(ConfigError::EmptyName { field });
            }
        }

        Ok(())
    }
}
