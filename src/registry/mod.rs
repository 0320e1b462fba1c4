//! Schema registry
//!
//! Name -> current schema catalog with an append-only, timestamped history.
//! The registry is a plain owned value; callers share it by reference and
//! decide how to synchronize access.

#[cfg(test)]
mod tests;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::analysis::RelationalModel;

/// Shape registered for a document-store batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentSchema {
    pub paths: Vec<String>,
    pub namespace: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum StoredSchema {
    Relational(RelationalModel),
    Document(DocumentSchema),
}

impl StoredSchema {
    #[inline]
    pub fn is_relational(&self) -> bool {
        matches!(self, Self::Relational(_))
    }

    #[inline]
    pub fn as_relational(&self) -> Option<&RelationalModel> {
        match self {
            Self::Relational(model) => Some(model),
            Self::Document(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaEntry {
    pub name: String,
    pub schema: StoredSchema,
    pub notes: String,
}

/// Immutable snapshot written on every registration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub timestamp: DateTime<Utc>,
    pub name: String,
    pub schema: StoredSchema,
    pub notes: String,
}

#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    /// Current schemas in first-registration order
    entries: Vec<SchemaEntry>,
    history: Vec<HistoryRecord>,
}

impl SchemaRegistry {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Upsert the current schema for `name` and append a history record
    #[inline]
    pub fn register(&mut self, name: &str, schema: StoredSchema, notes: &str) -> HistoryRecord {
        let record = HistoryRecord {
            timestamp: Utc::now(),
            name: name.to_string(),
            schema,
            notes: notes.to_string(),
        };
        self.apply(record.clone());
        record
    }

    /// Rebuild state from previously written history, preserving timestamps
    #[inline]
    pub fn restore(&mut self, records: impl IntoIterator<Item = HistoryRecord>) {
        for record in records {
            self.apply(record);
        }
    }

    fn apply(&mut self, record: HistoryRecord) {
        let entry = SchemaEntry {
            name: record.name.clone(),
            schema: record.schema.clone(),
            notes: record.notes.clone(),
        };

        let previous = self.entries.iter().position(|e| e.name == record.name);
        self.entries.push(entry);
        // Moves the new entry into the replaced slot
        if let Some(index) = previous {
            self.entries.swap_remove(index);
        }

        debug!(
            "Registered schema '{}' ({} history records)",
            record.name,
            self.history.len() + 1
        );
        self.history.push(record);
    }

    /// All current schemas in first-registration order
    #[inline]
    pub fn list(&self) -> &[SchemaEntry] {
        &self.entries
    }

    #[inline]
    pub fn get(&self, name: &str) -> Option<&SchemaEntry> {
        self.entries.iter().find(|e| e.name == name)
    }

    /// History records for `name`, oldest first
    #[inline]
    pub fn history(&self, name: &str) -> Vec<&HistoryRecord> {
        self.history.iter().filter(|r| r.name == name).collect()
    }

    #[inline]
    pub fn all_history(&self) -> &[HistoryRecord] {
        &self.history
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every schema and history record
    #[inline]
    pub fn reset(&mut self) {
        self.entries.clear();
        self.history.clear();
    }
}
