// Database module
// Dual storage: a dynamically shaped relational SQLite file and an
// append-only document SQLite file

pub mod document;
pub mod relational;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::path::Path;
use tracing::debug;

use crate::{PolyError, Result};

pub use document::{DocQuery, DocumentFailure, DocumentInsertReport, DocumentStore, StoredDocument};
pub use relational::{
    ColumnType, InsertSummary, RelationalStore, SchemaReport, SchemaWarning, SqlQuery, SqlRows,
};

pub type DbPool = Pool<Sqlite>;

/// Open (creating if needed) a pooled SQLite database file
#[inline]
pub async fn connect_pool<P: AsRef<Path>>(path: P, max_connections: u32) -> Result<DbPool> {
    let path = path.as_ref();

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    let options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(SqliteJournalMode::Wal);

    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .connect_with(options)
        .await
        .map_err(|e| {
            PolyError::Storage(format!(
                "Failed to open database {}: {}",
                path.display(),
                e
            ))
        })?;

    debug!("Opened database pool at {}", path.display());
    Ok(pool)
}
