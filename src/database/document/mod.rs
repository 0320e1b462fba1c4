#[cfg(test)]
mod tests;

mod history;

use std::path::Path;

use futures::TryStreamExt;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use super::{DbPool, connect_pool};
use crate::value::{Document, get_path, scalar_text, values_match};
use crate::{PolyError, Result};

/// Namespaced equality filter over stored documents
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocQuery {
    pub namespace: String,
    pub filters: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredDocument {
    pub id: i64,
    pub namespace: String,
    pub payload: Value,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentFailure {
    pub index: usize,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentInsertReport {
    pub ids: Vec<i64>,
    pub failures: Vec<DocumentFailure>,
}

/// Append-only document storage with a top-level scalar key index
#[derive(Debug, Clone)]
pub struct DocumentStore {
    pool: DbPool,
}

impl DocumentStore {
    #[inline]
    pub async fn open<P: AsRef<Path>>(path: P, max_connections: u32) -> Result<Self> {
        let pool = connect_pool(path, max_connections).await?;
        let store = Self { pool };
        store.run_migrations().await?;
        Ok(store)
    }

    #[inline]
    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    #[inline]
    pub async fn run_migrations(&self) -> Result<()> {
        info!("Running document store migrations");

        sqlx::migrate!("src/database/document/migrations")
            .run(&self.pool)
            .await
            .map_err(|e| PolyError::Storage(format!("Failed to run migrations: {e}")))?;

        debug!("Document store migrations completed successfully");
        Ok(())
    }

    /// Append documents to a namespace.
    ///
    /// Each document is written in its own transaction together with its
    /// index rows. A failing document is recorded and skipped; the rest of
    /// the batch is still stored.
    #[inline]
    pub async fn insert(&self, docs: &[&Document], namespace: &str) -> DocumentInsertReport {
        let mut report = DocumentInsertReport::default();

        for (index, doc) in docs.iter().enumerate() {
            match self.insert_one(doc, namespace).await {
                Ok(id) => report.ids.push(id),
                Err(e) => {
                    warn!("Failed to store document {} in '{}': {}", index, namespace, e);
                    report.failures.push(DocumentFailure {
                        index,
                        message: e.to_string(),
                    });
                }
            }
        }

        info!(
            "Stored {} documents in namespace '{}' ({} failed)",
            report.ids.len(),
            namespace,
            report.failures.len()
        );
        report
    }

    async fn insert_one(&self, doc: &Document, namespace: &str) -> Result<i64> {
        let raw = serde_json::to_string(doc)?;
        let mut tx = self.pool.begin().await.map_err(|e| storage_error(&e))?;

        let id = sqlx::query("INSERT INTO documents (namespace, raw_json) VALUES (?, ?)")
            .bind(namespace)
            .bind(&raw)
            .execute(&mut *tx)
            .await
            .map_err(|e| storage_error(&e))?
            .last_insert_rowid();

        for (key, value) in doc {
            let Some(text) = scalar_text(value) else {
                continue;
            };
            sqlx::query("INSERT INTO key_index (doc_id, key, value_text) VALUES (?, ?, ?)")
                .bind(id)
                .bind(key)
                .bind(text)
                .execute(&mut *tx)
                .await
                .map_err(|e| storage_error(&e))?;
        }

        tx.commit().await.map_err(|e| storage_error(&e))?;
        Ok(id)
    }

    /// Documents in a namespace whose dotted fields equal every filter value.
    ///
    /// Matching runs over the raw payloads; the key index is not consulted.
    #[inline]
    pub async fn query(&self, query: &DocQuery) -> Result<Vec<StoredDocument>> {
        let mut rows = sqlx::query_as::<_, (i64, String)>(
            "SELECT id, raw_json FROM documents WHERE namespace = ? ORDER BY id",
        )
        .bind(&query.namespace)
        .fetch(&self.pool);

        let mut matches = Vec::new();
        while let Some((id, raw)) = rows.try_next().await.map_err(|e| storage_error(&e))? {
            let payload: Value = serde_json::from_str(&raw)?;
            let keep = query.filters.iter().all(|(field, expected)| {
                get_path(&payload, field).is_some_and(|actual| values_match(actual, expected))
            });
            if keep {
                matches.push(StoredDocument {
                    id,
                    namespace: query.namespace.clone(),
                    payload,
                });
            }
        }

        debug!(
            "Document query on '{}' with {} filters matched {} documents",
            query.namespace,
            query.filters.len(),
            matches.len()
        );
        Ok(matches)
    }

    #[inline]
    pub async fn count(&self, namespace: &str) -> Result<i64> {
        sqlx::query_scalar("SELECT COUNT(*) FROM documents WHERE namespace = ?")
            .bind(namespace)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| storage_error(&e))
    }

    /// Index rows written for one document, in key order of insertion
    #[inline]
    pub async fn index_entries(&self, doc_id: i64) -> Result<Vec<(String, String)>> {
        sqlx::query_as("SELECT key, value_text FROM key_index WHERE doc_id = ? ORDER BY rowid")
            .bind(doc_id)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| storage_error(&e))
    }
}

fn storage_error(error: &sqlx::Error) -> PolyError {
    PolyError::Storage(error.to_string())
}
