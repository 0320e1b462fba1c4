//! Helpers over the generic JSON value model.
//!
//! Documents are `serde_json::Value` trees with insertion-ordered maps. This
//! module classifies values, walks dotted paths and compares literals the way
//! the stores need to.

#[cfg(test)]
mod tests;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A single object-shaped document
pub type Document = Map<String, Value>;

/// Marker appended to a path that names an array-of-objects root
pub const RELATION_MARKER: &str = "[]";

/// Separator between nested map keys inside a path
pub const PATH_SEPARATOR: char = '.';

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValueKind {
    Null,
    Bool,
    Int,
    Float,
    Text,
    Sequence,
    Mapping,
}

impl ValueKind {
    #[inline]
    pub fn of(value: &Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(_) => Self::Bool,
            Value::Number(n) if n.is_i64() || n.is_u64() => Self::Int,
            Value::Number(_) => Self::Float,
            Value::String(_) => Self::Text,
            Value::Array(_) => Self::Sequence,
            Value::Object(_) => Self::Mapping,
        }
    }

    #[inline]
    pub fn is_scalar(self) -> bool {
        matches!(self, Self::Bool | Self::Int | Self::Float | Self::Text)
    }
}

/// Look up a dotted path (`user.address.city`) through nested maps
#[inline]
pub fn get_path<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    path.split(PATH_SEPARATOR)
        .try_fold(value, |current, key| current.as_object()?.get(key))
}

/// Resolve a relation root path to the elements it names.
///
/// Segments are map keys. A segment carrying the relation marker fans out
/// over every element of the sequence it names, so `orders[].lines` yields
/// the concatenated `lines` elements of every order. The final segment must
/// name a sequence; anything else resolves to nothing.
#[inline]
pub fn resolve_relation<'a>(document: &'a Document, root_path: &str) -> Vec<&'a Value> {
    let mut frontier: Vec<&Value> = Vec::new();
    let mut segments = root_path.split(PATH_SEPARATOR).peekable();

    let Some(first) = segments.next() else {
        return Vec::new();
    };
    let (key, fan_out) = split_marker(first);
    if let Some(value) = document.get(key) {
        push_segment(&mut frontier, value, fan_out);
    }

    while let Some(segment) = segments.next() {
        let (key, fan_out) = split_marker(segment);
        let mut next = Vec::new();
        for value in frontier {
            if let Some(child) = value.as_object().and_then(|map| map.get(key)) {
                push_segment(&mut next, child, fan_out);
            }
        }
        frontier = next;
        if frontier.is_empty() && segments.peek().is_some() {
            return Vec::new();
        }
    }

    frontier
        .into_iter()
        .filter_map(Value::as_array)
        .flatten()
        .collect()
}

fn split_marker(segment: &str) -> (&str, bool) {
    segment
        .strip_suffix(RELATION_MARKER)
        .map_or((segment, false), |key| (key, true))
}

fn push_segment<'a>(frontier: &mut Vec<&'a Value>, value: &'a Value, fan_out: bool) {
    match (fan_out, value) {
        (true, Value::Array(items)) => frontier.extend(items.iter()),
        (true, _) => {}
        (false, value) => frontier.push(value),
    }
}

/// Stringified form of a top-level scalar, `None` for nulls and nested values
#[inline]
pub fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

/// Text rendering used when a value is widened into a text column
#[inline]
pub fn render_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Structural equality where any two numbers compare by numeric value
#[inline]
pub fn values_match(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => match (a.as_i64(), b.as_i64()) {
            (Some(x), Some(y)) => x == y,
            _ => a.as_f64() == b.as_f64(),
        },
        (Value::Array(a), Value::Array(b)) => {
            a.len() == b.len() && a.iter().zip(b).all(|(x, y)| values_match(x, y))
        }
        (Value::Object(a), Value::Object(b)) => {
            a.len() == b.len()
                && a
                    .iter()
                    .all(|(key, x)| b.get(key).is_some_and(|y| values_match(x, y)))
        }
        (a, b) => a == b,
    }
}
