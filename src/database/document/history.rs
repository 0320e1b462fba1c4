use chrono::{DateTime, Utc};
use sqlx::FromRow;
use tracing::debug;

use super::{DocumentStore, storage_error};
use crate::Result;
use crate::registry::{HistoryRecord, StoredSchema};

#[derive(Debug, FromRow)]
struct HistoryRow {
    name: String,
    recorded_at: DateTime<Utc>,
    schema_json: String,
    notes: String,
}

impl DocumentStore {
    /// Persist one registry history record
    #[inline]
    pub async fn record_schema(&self, record: &HistoryRecord) -> Result<()> {
        let schema_json = serde_json::to_string(&record.schema)?;

        sqlx::query(
            "INSERT INTO schema_history (name, recorded_at, schema_json, notes) VALUES (?, ?, ?, ?)",
        )
        .bind(&record.name)
        .bind(record.timestamp)
        .bind(schema_json)
        .bind(&record.notes)
        .execute(&self.pool)
        .await
        .map_err(|e| storage_error(&e))?;

        debug!("Persisted schema history record for '{}'", record.name);
        Ok(())
    }

    /// Every persisted history record in the order it was written
    #[inline]
    pub async fn schema_history(&self) -> Result<Vec<HistoryRecord>> {
        let rows: Vec<HistoryRow> = sqlx::query_as(
            "SELECT name, recorded_at, schema_json, notes FROM schema_history ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| storage_error(&e))?;

        rows.into_iter()
            .map(|row| -> Result<HistoryRecord> {
                let schema: StoredSchema = serde_json::from_str(&row.schema_json)?;
                Ok(HistoryRecord {
                    timestamp: row.recorded_at,
                    name: row.name,
                    schema,
                    notes: row.notes,
                })
            })
            .collect()
    }

    #[inline]
    pub async fn clear_schema_history(&self) -> Result<()> {
        sqlx::query("DELETE FROM schema_history")
            .execute(&self.pool)
            .await
            .map_err(|e| storage_error(&e))?;
        Ok(())
    }
}
