
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use console::style;
use serde_json::Value;
use tracing::info;

use crate::config::Config;
use crate::pipeline::{IngestOutcome, Pipeline, QueryResult};
use crate::registry::StoredSchema;
use crate::router::QueryRequest;

/// Load configuration from `data_dir`, or from the platform default directory
#[inline]
pub fn load_config(data_dir: Option<&Path>) -> Result<Config> {
    let dir = match data_dir {
        Some(dir) => dir.to_path_buf(),
        None => Config::default_dir().context("Failed to resolve data directory")?,
    };
    Config::load(&dir).with_context(|| format!("Failed to load configuration from {}", dir.display()))
}

async fn open_pipeline(data_dir: Option<&Path>) -> Result<Pipeline> {
    let config = load_config(data_dir)?;
    Pipeline::open(config)
        .await
        .context("Failed to open storage")
}

/// Read a JSON file holding either an array of documents or a single document
#[inline]
pub fn read_batch(path: &Path) -> Result<Vec<Value>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read batch file: {}", path.display()))?;
    let value: Value = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse JSON in {}", path.display()))?;

    Ok(match value {
        Value::Array(items) => items,
        single => vec![single],
    })
}

/// Parse a `key=value` filter; the value is a JSON literal or else a plain string
#[inline]
pub fn parse_filter(raw: &str) -> Result<(String, Value)> {
    let Some((key, value)) = raw.split_once('=') else {
        bail!("Invalid filter '{}': expected key=value", raw);
    };
    if key.is_empty() {
        bail!("Invalid filter '{}': key cannot be empty", raw);
    }

    let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
    Ok((key.to_string(), value))
}

/// Ingest a JSON batch file
#[inline]
pub async fn ingest_file(
    data_dir: Option<&Path>,
    file: &Path,
    notes: &str,
    name: Option<&str>,
) -> Result<()> {
    let values = read_batch(file)?;
    info!("Ingesting {} documents from {}", values.len(), file.display());

    let pipeline = open_pipeline(data_dir).await?;
    let report = match name {
        Some(name) => pipeline.ingest_named(&values, notes, name).await?,
        None => pipeline.ingest(&values, notes).await?,
    };

    println!("Batch {}", style(report.batch_id).dim());
    println!("  Decision: {}", style(report.decision).bold().cyan());
    println!("  Stability: {:.4}", report.stability_score);
    println!("  Registered as: {}", style(&report.target).green());

    match &report.outcome {
        IngestOutcome::Relational { schema, rows } => {
            if !schema.created_tables.is_empty() {
                println!("  Created tables: {}", schema.created_tables.join(", "));
            }
            for (table, column) in &schema.added_columns {
                println!("  Added column: {}.{}", table, column);
            }
            for warning in &schema.warnings {
                let label = if warning.is_failure() {
                    style("warning").red()
                } else {
                    style("note").yellow()
                };
                println!("  {}: {:?}", label, warning);
            }
            println!("  Rows: {}", rows.top_rows);
            for (table, count) in &rows.child_rows {
                println!("  Child rows in {}: {}", table, count);
            }
        }
        IngestOutcome::Document { report } => {
            println!("  Documents stored: {}", report.ids.len());
            for failure in &report.failures {
                println!(
                    "  {} document {}: {}",
                    style("Failed").red(),
                    failure.index,
                    failure.message
                );
            }
        }
    }

    Ok(())
}

/// Run a routed query and print the results as JSON
#[inline]
pub async fn run_query(
    data_dir: Option<&Path>,
    target: &str,
    filters: &[String],
    fields: &[String],
    limit: Option<i64>,
) -> Result<()> {
    let mut request = QueryRequest::new(target);
    for raw in filters {
        let (key, value) = parse_filter(raw)?;
        request = request.filter(key, value);
    }
    if !fields.is_empty() {
        request = request.fields(fields.iter().cloned());
    }
    request.limit = limit;

    let pipeline = open_pipeline(data_dir).await?;
    let result = pipeline.query(&request).await?;

    eprintln!(
        "{} {} results",
        style(format!("[{}]", result.backend())).bold().cyan(),
        result.len()
    );

    match result {
        QueryResult::Sql { rows } => {
            for row in rows.rows {
                let object: serde_json::Map<String, Value> =
                    rows.columns.iter().cloned().zip(row).collect();
                println!("{}", Value::Object(object));
            }
        }
        QueryResult::Doc { docs } => {
            for doc in docs {
                println!("{}", doc.payload);
            }
        }
    }

    Ok(())
}

/// Rank registered schemas against free text
#[inline]
pub async fn search_schemas(data_dir: Option<&Path>, text: &str, top_k: Option<usize>) -> Result<()> {
    let pipeline = open_pipeline(data_dir).await?;
    let matches = pipeline.search_schema(text, top_k).await;

    if matches.is_empty() {
        println!("No schemas registered yet.");
        return Ok(());
    }

    for (rank, found) in matches.iter().enumerate() {
        println!(
            "{:>2}. {} ({:.4})",
            rank + 1,
            style(&found.name).green(),
            found.score
        );
    }

    Ok(())
}

#[inline]
pub async fn list_schemas(data_dir: Option<&Path>) -> Result<()> {
    let pipeline = open_pipeline(data_dir).await?;
    let schemas = pipeline.schemas().await;

    if schemas.is_empty() {
        println!("No schemas registered yet.");
        println!("Use 'polystore ingest <file>' to ingest a batch.");
        return Ok(());
    }

    println!("Schemas ({} total):", schemas.len());
    println!();

    for entry in &schemas {
        match &entry.schema {
            StoredSchema::Relational(model) => {
                println!("{} {}", style(&entry.name).bold().green(), style("[SQL]").cyan());
                println!("   Table: {}", model.top_table);
                println!("   Columns: {}", model.top_cols.join(", "));
                for child in &model.child_tables {
                    println!("   Child: {} <- {}", child.name, child.root_path);
                }
            }
            StoredSchema::Document(schema) => {
                println!("{} {}", style(&entry.name).bold().green(), style("[DOC]").cyan());
                println!("   Namespace: {}", schema.namespace);
                println!("   Paths: {}", schema.paths.join(", "));
            }
        }
        if !entry.notes.is_empty() {
            println!("   Notes: {}", entry.notes);
        }
        println!();
    }

    Ok(())
}

#[inline]
pub async fn show_history(data_dir: Option<&Path>, name: &str) -> Result<()> {
    let pipeline = open_pipeline(data_dir).await?;
    let history = pipeline.history(name).await;

    if history.is_empty() {
        println!("No history for '{}'.", name);
        return Ok(());
    }

    for record in &history {
        let kind = if record.schema.is_relational() { "SQL" } else { "DOC" };
        println!(
            "{} {} {}",
            style(record.timestamp.to_rfc3339()).dim(),
            style(kind).cyan(),
            record.notes
        );
    }

    Ok(())
}

/// Print the effective configuration
#[inline]
pub fn show_config(data_dir: Option<&Path>) -> Result<()> {
    let config = load_config(data_dir)?;

    println!("{}", style("Current Configuration").bold().cyan());
    println!();
    println!("{}", style("Analysis:").bold().yellow());
    println!("  Common presence ratio: {}", config.analysis.common_presence_ratio);
    println!("  Stability threshold: {}", config.analysis.stability_threshold);
    println!("{}", style("Storage:").bold().yellow());
    println!("  Relational file: {}", config.relational_path().display());
    println!("  Document file: {}", config.document_path().display());
    println!("  Max connections: {}", config.storage.max_connections);
    println!("  Top table: {}", config.storage.top_table);
    println!("  Default namespace: {}", config.storage.default_namespace);
    println!("{}", style("Query:").bold().yellow());
    println!("  Default limit: {}", config.query.default_limit);
    println!("{}", style("Search:").bold().yellow());
    println!("  Default top_k: {}", config.search.default_top_k);
    println!();
    println!("Config file: {}", style(config.config_file_path().display()).dim());

    Ok(())
}

/// Write the effective configuration to `config.toml`
#[inline]
pub fn write_config(data_dir: Option<&Path>) -> Result<PathBuf> {
    let config = load_config(data_dir)?;
    config.save()?;

    let path = config.config_file_path();
    println!("Configuration written to {}", style(path.display()).green());
    Ok(path)
}
