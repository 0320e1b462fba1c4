
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::AnalysisResult;
use crate::value::{PATH_SEPARATOR, RELATION_MARKER};

/// Relational shape proposed for a batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationalModel {
    pub top_table: String,
    pub top_cols: Vec<String>,
    pub child_tables: Vec<ChildTable>,
}

impl RelationalModel {
    /// Prefix child table names with the top table name
    #[inline]
    #[must_use]
    pub fn with_scoped_children(mut self) -> Self {
        for child in &mut self.child_tables {
            child.name = format!("{}_{}", self.top_table, child.name);
        }
        self
    }
}

/// One child table, fed by the array found at `root_path`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChildTable {
    pub name: String,
    pub root_path: String,
}

impl ChildTable {
    /// Build a child table from a relation path such as `profile.addresses[]`
    #[inline]
    pub fn from_relation_path(relation_path: &str) -> Self {
        let root_path = relation_path
            .strip_suffix(RELATION_MARKER)
            .unwrap_or(relation_path)
            .to_string();
        let name = root_path
            .replace(RELATION_MARKER, "")
            .replace(PATH_SEPARATOR, "_");
        Self { name, root_path }
    }
}

/// Child table name distinct from the top table and every earlier child.
///
/// A name equal to the top table is prefixed with it; a name already taken
/// gets the first free numeric suffix.
fn unique_child_name(base: &str, top_table: &str, taken: &[ChildTable]) -> String {
    let is_taken = |name: &str| name == top_table || taken.iter().any(|c| c.name == name);

    let base = if base == top_table {
        format!("{top_table}_{base}")
    } else {
        base.to_string()
    };

    let mut candidate = base.clone();
    let mut suffix = 2;
    while is_taken(&candidate) {
        candidate = format!("{base}_{suffix}");
        suffix += 1;
    }
    candidate
}

/// Turn an analysis into top-level columns plus one child table per relation path.
///
/// Top columns are un-nested paths that are not relation roots; a key whose
/// array became a child table is not also a column.
#[inline]
pub fn propose_relational_model(analysis: &AnalysisResult, top_table: &str) -> RelationalModel {
    let mut child_tables: Vec<ChildTable> = Vec::with_capacity(analysis.relation_paths.len());
    for path in &analysis.relation_paths {
        let mut child = ChildTable::from_relation_path(path);
        child.name = unique_child_name(&child.name, top_table, &child_tables);
        child_tables.push(child);
    }

    let top_cols: Vec<String> = analysis
        .paths
        .iter()
        .filter(|path| !path.contains(PATH_SEPARATOR) && !path.contains(RELATION_MARKER))
        .filter(|path| !child_tables.iter().any(|child| &child.root_path == *path))
        .cloned()
        .collect();

    debug!(
        "Proposed table '{}' with columns {:?} and {} child tables",
        top_table,
        top_cols,
        child_tables.len()
    );

    RelationalModel {
        top_table: top_table.to_string(),
        top_cols,
        child_tables,
    }
}
