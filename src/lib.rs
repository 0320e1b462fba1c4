use thiserror::Error;

pub type Result<T> = std::result::Result<T, PolyError>;

#[derive(Error, Debug)]
pub enum PolyError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Storage error at document {index}: {message}")]
    Insert { index: usize, message: String },

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

impl PolyError {
    #[inline]
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    #[inline]
    pub fn is_storage(&self) -> bool {
        matches!(self, Self::Insert { .. } | Self::Storage(_))
    }
}

pub mod analysis;
pub mod commands;
pub mod config;
pub mod database;
pub mod pipeline;
pub mod registry;
pub mod retriever;
pub mod router;
pub mod value;
