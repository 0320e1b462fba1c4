//! Relational store
//!
//! Materializes a [`RelationalModel`] as SQLite tables and inserts batches
//! with parent/child linkage. Every row keeps its full source JSON in the
//! `_raw` column so the original document can always be reconstructed.


use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};
use sqlx::query::Query;
use sqlx::sqlite::SqliteRow;
use sqlx::{Column, Row, Sqlite, SqliteConnection, TypeInfo, ValueRef};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::{DbPool, connect_pool};
use crate::analysis::RelationalModel;
use crate::value::{Document, ValueKind, render_text, resolve_relation};
use crate::{PolyError, Result};

/// Auto-generated row key
pub const ID_COLUMN: &str = "_id";
/// Foreign key from a child row to its top-table row
pub const PARENT_COLUMN: &str = "_parent_id";
/// Full JSON payload of the row's source value
pub const RAW_COLUMN: &str = "_raw";

const RESERVED_COLUMNS: [&str; 3] = [ID_COLUMN, PARENT_COLUMN, RAW_COLUMN];

type SqliteQuery<'q> = Query<'q, Sqlite, <Sqlite as sqlx::Database>::Arguments<'q>>;

/// Declared SQLite type of a data column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColumnType {
    Integer,
    Real,
    Text,
    Boolean,
}

impl ColumnType {
    /// Column type implied by a sample value; `None` when there is nothing to infer from
    #[inline]
    pub fn infer(value: Option<&Value>) -> Option<Self> {
        match ValueKind::of(value?) {
            ValueKind::Null => None,
            ValueKind::Bool => Some(Self::Boolean),
            ValueKind::Int => Some(Self::Integer),
            ValueKind::Float => Some(Self::Real),
            ValueKind::Text | ValueKind::Sequence | ValueKind::Mapping => Some(Self::Text),
        }
    }

    #[inline]
    pub fn as_sql(self) -> &'static str {
        match self {
            Self::Integer => "INTEGER",
            Self::Real => "REAL",
            Self::Text => "TEXT",
            Self::Boolean => "BOOLEAN",
        }
    }

    /// Map a declared type from `PRAGMA table_info` back to a column type
    #[inline]
    pub fn from_declared(declared: &str) -> Self {
        let declared = declared.to_ascii_uppercase();
        if declared.contains("INT") {
            Self::Integer
        } else if declared.contains("BOOL") {
            Self::Boolean
        } else if declared.contains("REAL") || declared.contains("FLOA") || declared.contains("DOUB")
        {
            Self::Real
        } else {
            Self::Text
        }
    }

    fn accepts(self, kind: ValueKind) -> bool {
        match self {
            Self::Integer => kind == ValueKind::Int,
            Self::Real => matches!(kind, ValueKind::Int | ValueKind::Float),
            Self::Text => kind == ValueKind::Text,
            Self::Boolean => kind == ValueKind::Bool,
        }
    }
}

/// Non-fatal findings from [`RelationalStore::ensure_schema`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SchemaWarning {
    IndexExists {
        index: String,
    },
    IndexFailed {
        index: String,
        message: String,
    },
    TypeConflict {
        table: String,
        column: String,
        existing: ColumnType,
        proposed: ColumnType,
    },
    ReservedColumn {
        table: String,
        column: String,
    },
}

impl SchemaWarning {
    /// Whether this warning points at a genuine backend problem
    #[inline]
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::IndexFailed { .. })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaReport {
    pub created_tables: Vec<String>,
    pub added_columns: Vec<(String, String)>,
    pub warnings: Vec<SchemaWarning>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InsertSummary {
    pub top_rows: usize,
    pub child_rows: BTreeMap<String, usize>,
    pub parent_ids: Vec<i64>,
}

/// A parameterized statement for the relational backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SqlQuery {
    pub sql: String,
    pub params: Vec<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SqlRows {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

#[derive(Debug, Clone)]
struct ColumnSpec {
    name: String,
    column_type: Option<ColumnType>,
}

/// Quote an identifier for SQLite, doubling embedded quotes
#[inline]
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

#[inline]
pub fn is_reserved_column(name: &str) -> bool {
    RESERVED_COLUMNS.contains(&name)
}

#[derive(Debug)]
pub struct RelationalStore {
    pool: DbPool,
    ddl_lock: Mutex<()>,
}

impl RelationalStore {
    #[inline]
    pub async fn open<P: AsRef<Path>>(path: P, max_connections: u32) -> Result<Self> {
        let pool = connect_pool(path, max_connections).await?;
        Ok(Self::from_pool(pool))
    }

    #[inline]
    pub fn from_pool(pool: DbPool) -> Self {
        Self {
            pool,
            ddl_lock: Mutex::new(()),
        }
    }

    #[inline]
    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    /// Create or extend the tables a model needs.
    ///
    /// Column types come from `sample`; child columns come from the first
    /// element of the sample's array at each child root. Existing columns
    /// keep their declared type. Index creation problems are reported as
    /// warnings and never abort.
    #[inline]
    pub async fn ensure_schema(
        &self,
        model: &RelationalModel,
        sample: &Document,
    ) -> Result<SchemaReport> {
        let _guard = self.ddl_lock.lock().await;
        let mut report = SchemaReport::default();

        let top_columns: Vec<ColumnSpec> = model
            .top_cols
            .iter()
            .map(|name| ColumnSpec {
                name: name.clone(),
                column_type: ColumnType::infer(sample.get(name)),
            })
            .collect();
        self.ensure_table(&model.top_table, None, top_columns, &mut report)
            .await?;

        for child in &model.child_tables {
            let first = resolve_relation(sample, &child.root_path)
                .into_iter()
                .next()
                .and_then(Value::as_object);

            let columns: Vec<ColumnSpec> = first
                .map(|element| {
                    element
                        .iter()
                        .map(|(key, value)| ColumnSpec {
                            name: key.replace('.', "_"),
                            column_type: ColumnType::infer(Some(value)),
                        })
                        .collect()
                })
                .unwrap_or_default();

            if columns.is_empty() {
                debug!(
                    "No sample element for child table '{}', keeping raw payload only",
                    child.name
                );
            }

            self.ensure_table(&child.name, Some(&model.top_table), columns, &mut report)
                .await?;
        }

        for warning in &report.warnings {
            if warning.is_failure() {
                warn!("Schema warning: {:?}", warning);
            } else {
                debug!("Schema warning: {:?}", warning);
            }
        }

        info!(
            "Schema for '{}' ready: {} tables created, {} columns added, {} warnings",
            model.top_table,
            report.created_tables.len(),
            report.added_columns.len(),
            report.warnings.len()
        );

        Ok(report)
    }

    async fn ensure_table(
        &self,
        table: &str,
        parent: Option<&str>,
        columns: Vec<ColumnSpec>,
        report: &mut SchemaReport,
    ) -> Result<()> {
        let mut wanted: Vec<ColumnSpec> = Vec::with_capacity(columns.len());
        for column in columns {
            if is_reserved_column(&column.name) {
                report.warnings.push(SchemaWarning::ReservedColumn {
                    table: table.to_string(),
                    column: column.name,
                });
            } else if !wanted.iter().any(|c| c.name == column.name) {
                wanted.push(column);
            }
        }

        let existing = read_columns(&self.pool, table)
            .await
            .map_err(|e| storage_error(&format!("Failed to inspect table '{table}'"), &e))?;

        let is_child_table = existing.contains_key(PARENT_COLUMN);
        if !existing.is_empty() && is_child_table != parent.is_some() {
            return Err(PolyError::Storage(format!(
                "Table '{}' already exists as a {} table",
                table,
                if is_child_table { "child" } else { "top-level" }
            )));
        }

        if existing.is_empty() {
            let sql = create_table_sql(table, parent, &wanted);
            debug!("Creating table: {}", sql);
            sqlx::query(&sql)
                .execute(&self.pool)
                .await
                .map_err(|e| storage_error(&format!("Failed to create table '{table}'"), &e))?;
            report.created_tables.push(table.to_string());
        } else {
            for column in &wanted {
                let proposed = column.column_type.unwrap_or(ColumnType::Text);
                match existing.get(&column.name) {
                    Some(&current) => {
                        if column.column_type.is_some_and(|t| t != current) {
                            report.warnings.push(SchemaWarning::TypeConflict {
                                table: table.to_string(),
                                column: column.name.clone(),
                                existing: current,
                                proposed,
                            });
                        }
                    }
                    None => {
                        let sql = format!(
                            "ALTER TABLE {} ADD COLUMN {} {}",
                            quote_ident(table),
                            quote_ident(&column.name),
                            proposed.as_sql()
                        );
                        debug!("Extending table: {}", sql);
                        sqlx::query(&sql).execute(&self.pool).await.map_err(|e| {
                            storage_error(
                                &format!("Failed to add column '{}' to '{table}'", column.name),
                                &e,
                            )
                        })?;
                        report
                            .added_columns
                            .push((table.to_string(), column.name.clone()));
                    }
                }
            }
        }

        for column in &wanted {
            let index = format!("ix_{}_{}", table, column.name);
            let sql = format!(
                "CREATE INDEX {} ON {} ({})",
                quote_ident(&index),
                quote_ident(table),
                quote_ident(&column.name)
            );
            if let Err(e) = sqlx::query(&sql).execute(&self.pool).await {
                report.warnings.push(classify_index_error(index, &e));
            }
        }

        Ok(())
    }

    /// Insert a batch in one transaction.
    ///
    /// Each document yields one top row and one child row per element of
    /// every child root. Any failure rolls back the whole batch and reports
    /// the index of the document that failed.
    #[inline]
    pub async fn insert(&self, model: &RelationalModel, docs: &[&Document]) -> Result<InsertSummary> {
        // Layouts are read before the transaction so its first statement is a write
        let mut layouts: HashMap<String, HashMap<String, ColumnType>> = HashMap::new();
        for table in std::iter::once(&model.top_table)
            .chain(model.child_tables.iter().map(|child| &child.name))
        {
            layouts.insert(table.clone(), self.table_columns(table).await?);
        }

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| storage_error("Failed to begin insert transaction", &e))?;

        let mut summary = InsertSummary::default();
        for (index, doc) in docs.iter().enumerate() {
            match insert_document(&mut tx, model, doc, &layouts, &mut summary).await {
                Ok(parent_id) => {
                    summary.top_rows += 1;
                    summary.parent_ids.push(parent_id);
                }
                Err(e) => {
                    if let Err(rollback) = tx.rollback().await {
                        warn!("Rollback after failed insert also failed: {}", rollback);
                    }
                    warn!("Insert into '{}' failed at document {}: {:#}", model.top_table, index, e);
                    return Err(PolyError::Insert {
                        index,
                        message: format!("{e:#}"),
                    });
                }
            }
        }

        tx.commit()
            .await
            .map_err(|e| storage_error("Failed to commit insert transaction", &e))?;

        info!(
            "Inserted {} rows into '{}' ({} child rows)",
            summary.top_rows,
            model.top_table,
            summary.child_rows.values().sum::<usize>()
        );
        Ok(summary)
    }

    /// Raw payloads of a table in insertion order
    #[inline]
    pub async fn fetch_raw(&self, table: &str) -> Result<Vec<Value>> {
        let sql = format!(
            "SELECT {} FROM {} ORDER BY {}",
            quote_ident(RAW_COLUMN),
            quote_ident(table),
            quote_ident(ID_COLUMN)
        );
        let payloads: Vec<String> = sqlx::query_scalar(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| storage_error(&format!("Failed to read raw payloads from '{table}'"), &e))?;

        payloads
            .iter()
            .map(|raw| serde_json::from_str(raw).map_err(PolyError::from))
            .collect()
    }

    /// Column names and declared types of a table, empty when it does not exist
    #[inline]
    pub async fn table_columns(&self, table: &str) -> Result<HashMap<String, ColumnType>> {
        read_columns(&self.pool, table)
            .await
            .map_err(|e| storage_error(&format!("Failed to inspect table '{table}'"), &e))
    }

    /// Run a routed query and decode every row
    #[inline]
    pub async fn execute(&self, query: &SqlQuery) -> Result<SqlRows> {
        let mut statement = sqlx::query(&query.sql);
        for param in &query.params {
            statement = bind_literal(statement, param);
        }

        let rows = statement
            .fetch_all(&self.pool)
            .await
            .map_err(|e| storage_error("Failed to execute query", &e))?;

        let columns = rows
            .first()
            .map(|row| row.columns().iter().map(|c| c.name().to_string()).collect())
            .unwrap_or_default();

        let rows = rows
            .iter()
            .map(|row| (0..row.len()).map(|i| decode_column(row, i)).collect())
            .collect::<std::result::Result<Vec<Vec<Value>>, sqlx::Error>>()
            .map_err(|e| storage_error("Failed to decode query results", &e))?;

        debug!("Query returned {} rows", rows.len());
        Ok(SqlRows { columns, rows })
    }
}

async fn insert_document(
    conn: &mut SqliteConnection,
    model: &RelationalModel,
    doc: &Document,
    layouts: &HashMap<String, HashMap<String, ColumnType>>,
    summary: &mut InsertSummary,
) -> anyhow::Result<i64> {
    let top_layout = layouts.get(&model.top_table).cloned().unwrap_or_default();
    let columns: Vec<(&str, Option<&Value>, ColumnType)> = model
        .top_cols
        .iter()
        .filter(|name| !is_reserved_column(name))
        .filter_map(|name| {
            top_layout
                .get(name)
                .map(|column_type| (name.as_str(), doc.get(name), *column_type))
        })
        .collect();

    let raw = serde_json::to_string(doc).context("Failed to serialize document")?;
    let sql = insert_sql(&model.top_table, None, columns.iter().map(|(name, _, _)| *name));
    let mut statement = sqlx::query(&sql);
    for (_, value, column_type) in &columns {
        statement = bind_column(statement, *value, *column_type);
    }
    let parent_id = statement
        .bind(raw)
        .execute(&mut *conn)
        .await
        .with_context(|| format!("Failed to insert row into '{}'", model.top_table))?
        .last_insert_rowid();

    for child in &model.child_tables {
        let layout = layouts.get(&child.name).cloned().unwrap_or_default();
        for element in resolve_relation(doc, &child.root_path) {
            let mapped: Vec<(String, &Value, ColumnType)> = element
                .as_object()
                .map(|fields| {
                    fields
                        .iter()
                        .map(|(key, value)| (key.replace('.', "_"), value))
                        .filter(|(name, _)| !is_reserved_column(name))
                        .filter_map(|(name, value)| {
                            let column_type = *layout.get(&name)?;
                            Some((name, value, column_type))
                        })
                        .collect()
                })
                .unwrap_or_default();

            let raw = serde_json::to_string(element).context("Failed to serialize element")?;
            let sql = insert_sql(
                &child.name,
                Some(PARENT_COLUMN),
                mapped.iter().map(|(name, _, _)| name.as_str()),
            );
            let mut statement = sqlx::query(&sql).bind(parent_id);
            for (_, value, column_type) in &mapped {
                statement = bind_column(statement, Some(*value), *column_type);
            }
            statement
                .bind(raw)
                .execute(&mut *conn)
                .await
                .with_context(|| format!("Failed to insert row into '{}'", child.name))?;

            *summary.child_rows.entry(child.name.clone()).or_default() += 1;
        }
    }

    Ok(parent_id)
}

fn create_table_sql(table: &str, parent: Option<&str>, columns: &[ColumnSpec]) -> String {
    let mut definitions = vec![format!(
        "{} INTEGER PRIMARY KEY AUTOINCREMENT",
        quote_ident(ID_COLUMN)
    )];
    if let Some(parent) = parent {
        definitions.push(format!(
            "{} INTEGER NOT NULL REFERENCES {}({})",
            quote_ident(PARENT_COLUMN),
            quote_ident(parent),
            quote_ident(ID_COLUMN)
        ));
    }
    definitions.extend(columns.iter().map(|column| {
        format!(
            "{} {}",
            quote_ident(&column.name),
            column.column_type.unwrap_or(ColumnType::Text).as_sql()
        )
    }));
    definitions.push(format!("{} TEXT NOT NULL", quote_ident(RAW_COLUMN)));

    format!(
        "CREATE TABLE IF NOT EXISTS {} ({})",
        quote_ident(table),
        definitions.join(", ")
    )
}

fn insert_sql<'a>(
    table: &str,
    parent: Option<&'a str>,
    columns: impl Iterator<Item = &'a str>,
) -> String {
    let names: Vec<String> = parent
        .into_iter()
        .chain(columns)
        .chain(std::iter::once(RAW_COLUMN))
        .map(quote_ident)
        .collect();
    let placeholders = vec!["?"; names.len()].join(", ");

    format!(
        "INSERT INTO {} ({}) VALUES ({})",
        quote_ident(table),
        names.join(", "),
        placeholders
    )
}

async fn read_columns(
    pool: &DbPool,
    table: &str,
) -> std::result::Result<HashMap<String, ColumnType>, sqlx::Error> {
    let sql = format!("PRAGMA table_info({})", quote_ident(table));
    let rows = sqlx::query(&sql).fetch_all(pool).await?;

    rows.iter()
        .map(|row| {
            let name: String = row.try_get("name")?;
            let declared: String = row.try_get("type")?;
            Ok((name, ColumnType::from_declared(&declared)))
        })
        .collect()
}

/// Bind a document value into a typed column.
///
/// Values whose kind the column does not accept are widened to their text
/// rendering; nested values always land as JSON text.
fn bind_column<'q>(
    statement: SqliteQuery<'q>,
    value: Option<&Value>,
    column_type: ColumnType,
) -> SqliteQuery<'q> {
    let Some(value) = value.filter(|v| !v.is_null()) else {
        return statement.bind(None::<String>);
    };

    if column_type.accepts(ValueKind::of(value)) {
        bind_literal(statement, value)
    } else {
        statement.bind(render_text(value))
    }
}

/// Bind a JSON literal using its natural SQLite storage class
fn bind_literal<'q>(statement: SqliteQuery<'q>, value: &Value) -> SqliteQuery<'q> {
    match value {
        Value::Null => statement.bind(None::<String>),
        Value::Bool(b) => statement.bind(*b),
        Value::Number(n) => match (n.as_i64(), n.as_f64()) {
            (Some(i), _) => statement.bind(i),
            (None, Some(f)) if n.is_f64() => statement.bind(f),
            _ => statement.bind(n.to_string()),
        },
        Value::String(s) => statement.bind(s.clone()),
        Value::Array(_) | Value::Object(_) => statement.bind(value.to_string()),
    }
}

fn decode_column(row: &SqliteRow, index: usize) -> std::result::Result<Value, sqlx::Error> {
    let raw = row.try_get_raw(index)?;
    if raw.is_null() {
        return Ok(Value::Null);
    }
    let storage_class = raw.type_info().name().to_string();

    let value = match storage_class.as_str() {
        "INTEGER" | "BOOLEAN" => Value::from(row.try_get_unchecked::<i64, _>(index)?),
        "REAL" => {
            let float = row.try_get_unchecked::<f64, _>(index)?;
            Number::from_f64(float).map_or(Value::Null, Value::Number)
        }
        "BLOB" => {
            let bytes = row.try_get_unchecked::<Vec<u8>, _>(index)?;
            Value::String(String::from_utf8_lossy(&bytes).into_owned())
        }
        _ => Value::String(row.try_get_unchecked::<String, _>(index)?),
    };

    Ok(value)
}

fn classify_index_error(index: String, error: &sqlx::Error) -> SchemaWarning {
    match error {
        sqlx::Error::Database(db) if db.message().contains("already exists") => {
            SchemaWarning::IndexExists { index }
        }
        other => SchemaWarning::IndexFailed {
            index,
            message: other.to_string(),
        },
    }
}

fn storage_error(context: &str, error: &sqlx::Error) -> PolyError {
    PolyError::Storage(format!("{context}: {error}"))
}
