//! Free-text schema retrieval
//!
//! Each registered schema is rendered to a short text document. A tf-idf
//! vector space over unigrams and bigrams is rebuilt from scratch on every
//! [`SchemaRetriever::build`]; queries are scored by cosine similarity.

#[cfg(test)]
mod tests;

use std::collections::HashMap;
use std::sync::LazyLock;

use fancy_regex::Regex;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::registry::{SchemaEntry, SchemaRegistry, StoredSchema};

static TOKEN_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b\w\w+\b").expect("valid regex"));

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaMatch {
    pub name: String,
    pub score: f64,
}

/// Sparse, L2-normalized term vector
type TermVector = Vec<(usize, f64)>;

#[derive(Debug, Clone, Default)]
pub struct SchemaRetriever {
    names: Vec<String>,
    vocabulary: HashMap<String, usize>,
    idf: Vec<f64>,
    vectors: Vec<TermVector>,
}

/// Text rendering of a registry entry used for retrieval
#[inline]
pub fn render_schema_text(entry: &SchemaEntry) -> String {
    let mut parts = vec![format!("name: {}", entry.name), entry.notes.clone()];

    match &entry.schema {
        StoredSchema::Relational(model) => {
            parts.push(format!("top_table: {}", model.top_table));
            parts.push(format!("top_cols: {}", model.top_cols.join(" ")));
            for child in &model.child_tables {
                parts.push(format!(
                    "child_table: {} root: {}",
                    child.name, child.root_path
                ));
            }
        }
        StoredSchema::Document(schema) => {
            let paths = schema.paths.iter().sorted().dedup().join(" ");
            parts.push(format!("namespace: {}", schema.namespace));
            parts.push(format!("paths: {paths}"));
        }
    }

    parts.join("\n")
}

/// Lowercased word tokens plus adjacent-pair bigrams
fn analyze(text: &str) -> Vec<String> {
    let lowered = text.to_lowercase();
    let tokens: Vec<&str> = TOKEN_REGEX
        .find_iter(&lowered)
        .filter_map(|m| m.ok().map(|m| m.as_str()))
        .collect();

    let bigrams = tokens
        .iter()
        .tuple_windows()
        .map(|(a, b)| format!("{a} {b}"));

    tokens
        .iter()
        .map(|t| (*t).to_string())
        .chain(bigrams)
        .collect()
}

fn term_counts(terms: &[String], vocabulary: &HashMap<String, usize>) -> HashMap<usize, f64> {
    let mut counts = HashMap::new();
    for term in terms {
        if let Some(&column) = vocabulary.get(term) {
            *counts.entry(column).or_insert(0.0) += 1.0;
        }
    }
    counts
}

fn normalize(counts: HashMap<usize, f64>, idf: &[f64]) -> TermVector {
    let mut weighted: TermVector = counts
        .into_iter()
        .map(|(column, count)| (column, count * idf[column]))
        .collect();
    let norm = weighted.iter().map(|(_, w)| w * w).sum::<f64>().sqrt();
    if norm > 0.0 {
        for (_, weight) in &mut weighted {
            *weight /= norm;
        }
    }
    weighted.sort_by_key(|(column, _)| *column);
    weighted
}

impl SchemaRetriever {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild the whole vector space from the registry's current schemas
    #[inline]
    pub fn build(&mut self, registry: &SchemaRegistry) {
        *self = Self::default();

        let documents: Vec<Vec<String>> = registry
            .list()
            .iter()
            .map(|entry| analyze(&render_schema_text(entry)))
            .collect();

        for terms in &documents {
            for term in terms {
                let next = self.vocabulary.len();
                self.vocabulary.entry(term.clone()).or_insert(next);
            }
        }

        if self.vocabulary.is_empty() {
            debug!("Retriever vocabulary is empty, searches will return nothing");
            return;
        }

        let mut document_frequency = vec![0usize; self.vocabulary.len()];
        for terms in &documents {
            for term in terms.iter().unique() {
                document_frequency[self.vocabulary[term]] += 1;
            }
        }

        let n = documents.len() as f64;
        self.idf = document_frequency
            .iter()
            .map(|&df| ((1.0 + n) / (1.0 + df as f64)).ln() + 1.0)
            .collect();

        self.vectors = documents
            .iter()
            .map(|terms| normalize(term_counts(terms, &self.vocabulary), &self.idf))
            .collect();
        self.names = registry.list().iter().map(|e| e.name.clone()).collect();

        info!(
            "Rebuilt schema retriever: {} schemas, {} terms",
            self.names.len(),
            self.vocabulary.len()
        );
    }

    /// Top `top_k` schemas by cosine similarity, ties kept in registration order
    #[inline]
    pub fn search(&self, query: &str, top_k: usize) -> Vec<SchemaMatch> {
        if self.names.is_empty() || top_k == 0 {
            return Vec::new();
        }

        let query_vector = normalize(term_counts(&analyze(query), &self.vocabulary), &self.idf);
        let query_weights: HashMap<usize, f64> = query_vector.into_iter().collect();

        let mut matches: Vec<SchemaMatch> = self
            .names
            .iter()
            .zip(&self.vectors)
            .map(|(name, vector)| SchemaMatch {
                name: name.clone(),
                score: vector
                    .iter()
                    .filter_map(|(column, weight)| query_weights.get(column).map(|q| q * weight))
                    .sum(),
            })
            .collect();

        // stable sort keeps registration order among equal scores
        matches.sort_by(|a, b| b.score.total_cmp(&a.score));
        matches.truncate(top_k);
        matches
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}
