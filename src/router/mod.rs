//! Query routing
//!
//! Resolves a structured request against the schema registry and builds the
//! backend-native query. Unknown targets fail open to the document backend.

#[cfg(test)]
mod tests;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use crate::analysis::RelationalModel;
use crate::database::relational::quote_ident;
use crate::database::{DocQuery, SqlQuery};
use crate::registry::SchemaRegistry;
use crate::{PolyError, Result};

/// Equality-filter request addressed to a registered schema name
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryRequest {
    pub target: String,
    #[serde(default)]
    pub filters: Map<String, Value>,
    #[serde(default)]
    pub fields: Option<Vec<String>>,
    #[serde(default)]
    pub limit: Option<i64>,
}

impl QueryRequest {
    #[inline]
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            ..Self::default()
        }
    }

    #[inline]
    pub fn filter(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filters.insert(field.into(), value.into());
        self
    }

    #[inline]
    pub fn fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields = Some(fields.into_iter().map(Into::into).collect());
        self
    }

    #[inline]
    pub fn limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Backend {
    Sql,
    Doc,
}

impl std::fmt::Display for Backend {
    #[inline]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match *self {
            Backend::Sql => write!(f, "SQL"),
            Backend::Doc => write!(f, "DOC"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum BackendQuery {
    Sql(SqlQuery),
    Doc(DocQuery),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryRoute {
    pub backend: Backend,
    pub query: BackendQuery,
}

#[derive(Debug, Clone, Copy)]
pub struct QueryRouter<'a> {
    registry: &'a SchemaRegistry,
    default_limit: i64,
    default_namespace: &'a str,
}

impl<'a> QueryRouter<'a> {
    #[inline]
    pub fn new(registry: &'a SchemaRegistry, default_limit: i64, default_namespace: &'a str) -> Self {
        Self {
            registry,
            default_limit,
            default_namespace,
        }
    }

    /// Backend for a request's target
    #[inline]
    pub fn backend_for(&self, request: &QueryRequest) -> Backend {
        match self.registry.get(&request.target) {
            Some(entry) if entry.schema.is_relational() => Backend::Sql,
            Some(_) => Backend::Doc,
            None => {
                debug!("No schema registered for '{}', routing to documents", request.target);
                Backend::Doc
            }
        }
    }

    /// Resolve a request; fails only for a negative limit on a relational target
    #[inline]
    pub fn route(&self, request: &QueryRequest) -> Result<QueryRoute> {
        let model = self
            .registry
            .get(&request.target)
            .and_then(|entry| entry.schema.as_relational());

        let route = match model {
            Some(model) => QueryRoute {
                backend: Backend::Sql,
                query: BackendQuery::Sql(build_sql_query(model, request, self.default_limit)?),
            },
            None => QueryRoute {
                backend: self.backend_for(request),
                query: BackendQuery::Doc(build_doc_query(request, self.default_namespace)),
            },
        };

        debug!("Routed query for '{}' to {}", request.target, route.backend);
        Ok(route)
    }
}

/// `SELECT` over the model's top table with bound equality filters.
///
/// An absent limit takes `default_limit`; an explicit one is used as given.
#[inline]
pub fn build_sql_query(
    model: &RelationalModel,
    request: &QueryRequest,
    default_limit: i64,
) -> Result<SqlQuery> {
    let limit = request.limit.unwrap_or(default_limit);
    if limit < 0 {
        return Err(PolyError::Validation(format!(
            "limit must not be negative, got {limit}"
        )));
    }

    let projection = match request.fields.as_deref() {
        Some(fields) if !fields.is_empty() => fields
            .iter()
            .map(|f| quote_ident(f))
            .collect::<Vec<_>>()
            .join(", "),
        _ => "*".to_string(),
    };

    let mut params = Vec::with_capacity(request.filters.len());
    let conditions: Vec<String> = request
        .filters
        .iter()
        .map(|(field, value)| {
            params.push(value.clone());
            format!("{} = ?", quote_ident(field))
        })
        .collect();
    let selection = if conditions.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", conditions.join(" AND "))
    };

    let sql = format!(
        "SELECT {projection} FROM {}{selection} LIMIT {limit}",
        quote_ident(&model.top_table)
    );

    Ok(SqlQuery { sql, params })
}

#[inline]
pub fn build_doc_query(request: &QueryRequest, default_namespace: &str) -> DocQuery {
    let namespace = if request.target.is_empty() {
        default_namespace
    } else {
        &request.target
    };

    DocQuery {
        namespace: namespace.to_string(),
        filters: request.filters.clone(),
    }
}
