// Batch analysis module
// Aggregates per-document path observations into a storage decision

pub mod flatten;
pub mod proposer;


use std::collections::BTreeMap;

use itertools::Itertools;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::config::AnalysisConfig;
use crate::value::{Document, RELATION_MARKER};
use crate::{PolyError, Result};

pub use flatten::{ObservedType, flatten_paths};
pub use proposer::{ChildTable, RelationalModel, propose_relational_model};

/// Which backend a batch should be materialized into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum StorageDecision {
    Sql,
    Doc,
}

impl std::fmt::Display for StorageDecision {
    #[inline]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match *self {
            StorageDecision::Sql => write!(f, "SQL"),
            StorageDecision::Doc => write!(f, "DOC"),
        }
    }
}

/// Presence and type histogram for one path over a batch
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathStats {
    pub types: BTreeMap<ObservedType, usize>,
    pub presence: usize,
}

impl PathStats {
    #[inline]
    pub fn record(&mut self, observed: ObservedType) {
        *self.types.entry(observed).or_default() += 1;
        self.presence += 1;
    }

    #[inline]
    pub fn distinct_types(&self) -> usize {
        self.types.len()
    }

    #[inline]
    pub fn is_relation(&self) -> bool {
        self.types.contains_key(&ObservedType::ObjList)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub decision: StorageDecision,
    pub stability_score: f64,
    pub batch_size: usize,
    /// Every path seen, in first-seen order
    pub paths: Vec<String>,
    pub common_paths: Vec<String>,
    pub optionality: BTreeMap<String, f64>,
    pub type_variability: BTreeMap<String, usize>,
    pub relation_paths: Vec<String>,
    pub path_stats: BTreeMap<String, PathStats>,
}

impl AnalysisResult {
    /// Sorted distinct paths, the shape registered for document batches
    #[inline]
    pub fn distinct_paths(&self) -> Vec<String> {
        self.paths.iter().sorted().cloned().collect()
    }

    #[inline]
    pub fn is_common(&self, path: &str) -> bool {
        self.common_paths.iter().any(|p| p == path)
    }
}

/// Check that a batch is non-empty and made only of objects
#[inline]
pub fn as_documents(values: &[Value]) -> Result<Vec<&Document>> {
    if values.is_empty() {
        return Err(PolyError::Validation("batch is empty".to_string()));
    }

    values
        .iter()
        .enumerate()
        .map(|(index, value)| {
            value.as_object().ok_or_else(|| {
                PolyError::Validation(format!("document {index} is not an object"))
            })
        })
        .collect()
}

/// Analyze a batch and decide between relational and document storage.
///
/// `stability = |common| / |paths| - Σvariability / (10·|paths|) - Σoptionality / |paths|`.
/// The batch goes relational when the score reaches the configured threshold
/// or when any relation path exists.
#[inline]
pub fn analyze_batch(values: &[Value], config: &AnalysisConfig) -> Result<AnalysisResult> {
    let documents = as_documents(values)?;
    let total = documents.len();

    let mut paths: Vec<String> = Vec::new();
    let mut path_stats: BTreeMap<String, PathStats> = BTreeMap::new();
    for document in &documents {
        for (path, observed) in flatten_paths(document) {
            let stats = path_stats.entry(path.clone()).or_insert_with(|| {
                paths.push(path);
                PathStats::default()
            });
            stats.record(observed);
        }
    }

    let presence_ratio = |stats: &PathStats| stats.presence as f64 / total as f64;

    let common_paths: Vec<String> = paths
        .iter()
        .filter(|p| presence_ratio(&path_stats[*p]) >= config.common_presence_ratio)
        .cloned()
        .collect();

    let optionality: BTreeMap<String, f64> = path_stats
        .iter()
        .map(|(p, stats)| (p.clone(), 1.0 - presence_ratio(stats)))
        .collect();

    let type_variability: BTreeMap<String, usize> = path_stats
        .iter()
        .map(|(p, stats)| (p.clone(), stats.distinct_types()))
        .collect();

    let relation_paths: Vec<String> = paths
        .iter()
        .filter(|p| p.ends_with(RELATION_MARKER))
        .cloned()
        .collect();

    let denominator = paths.len().max(1) as f64;
    let stability_score = common_paths.len() as f64 / denominator
        - type_variability.values().sum::<usize>() as f64 / (10.0 * denominator)
        - optionality.values().sum::<f64>() / denominator;

    let decision = decide(stability_score, !relation_paths.is_empty(), config);

    debug!(
        "Analyzed batch of {} documents: {} paths, {} common, {} relations, score {:.4} -> {}",
        total,
        paths.len(),
        common_paths.len(),
        relation_paths.len(),
        stability_score,
        decision
    );

    Ok(AnalysisResult {
        decision,
        stability_score,
        batch_size: total,
        paths,
        common_paths,
        optionality,
        type_variability,
        relation_paths,
        path_stats,
    })
}

/// Relation presence wins regardless of the score
#[inline]
pub fn decide(stability_score: f64, has_relations: bool, config: &AnalysisConfig) -> StorageDecision {
    if has_relations || stability_score >= config.stability_threshold {
        StorageDecision::Sql
    } else {
        StorageDecision::Doc
    }
}
