// Configuration management module
// Handles TOML configuration and the data directory layout

pub mod settings;

pub use settings::{AnalysisConfig, Config, ConfigError, QueryConfig, SearchConfig, StorageConfig};

/// Get the default data directory path
#[inline]
pub fn get_data_dir() -> Result<std::path::PathBuf, ConfigError> {
    Config::default_dir()
}
