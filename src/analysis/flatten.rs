#[cfg(test)]
mod tests;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::value::{Document, PATH_SEPARATOR, RELATION_MARKER, ValueKind};

/// Type observed at a path inside one document
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObservedType {
    Null,
    Bool,
    Int,
    Float,
    Str,
    List,
    Obj,
    ObjList,
}

impl ObservedType {
    #[inline]
    pub fn of(value: &Value) -> Self {
        match ValueKind::of(value) {
            ValueKind::Null => Self::Null,
            ValueKind::Bool => Self::Bool,
            ValueKind::Int => Self::Int,
            ValueKind::Float => Self::Float,
            ValueKind::Text => Self::Str,
            ValueKind::Sequence => Self::List,
            ValueKind::Mapping => Self::Obj,
        }
    }
}

impl std::fmt::Display for ObservedType {
    #[inline]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match *self {
            ObservedType::Null => write!(f, "null"),
            ObservedType::Bool => write!(f, "bool"),
            ObservedType::Int => write!(f, "int"),
            ObservedType::Float => write!(f, "float"),
            ObservedType::Str => write!(f, "str"),
            ObservedType::List => write!(f, "list"),
            ObservedType::Obj => write!(f, "obj"),
            ObservedType::ObjList => write!(f, "obj_list"),
        }
    }
}

/// Walk one document and collect `path -> observed type` pairs in document order.
///
/// Nested maps recurse with `.`-joined paths. A non-empty array whose first
/// element is a map is additionally recorded as a relation root (`path[]`)
/// and that first element is flattened beneath it.
#[inline]
pub fn flatten_paths(document: &Document) -> Vec<(String, ObservedType)> {
    let mut paths = Vec::new();
    flatten_into(document, "", &mut paths);
    paths
}

fn flatten_into(map: &Document, parent: &str, paths: &mut Vec<(String, ObservedType)>) {
    for (key, value) in map {
        let path = if parent.is_empty() {
            key.clone()
        } else {
            format!("{parent}{PATH_SEPARATOR}{key}")
        };
        paths.push((path.clone(), ObservedType::of(value)));

        match value {
            Value::Object(nested) => flatten_into(nested, &path, paths),
            Value::Array(items) => {
                if let Some(Value::Object(first)) = items.first() {
                    let root = format!("{path}{RELATION_MARKER}");
                    paths.push((root.clone(), ObservedType::ObjList));
                    flatten_into(first, &root, paths);
                }
            }
            Value::Null | Value::Bool(_) | Value::Number(_) | Value::String(_) => {}
        }
    }
}
