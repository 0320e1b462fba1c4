// Pipeline module
// Coordinates analysis, storage, schema registration and retrieval


use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::info;
use uuid::Uuid;

use crate::{PolyError, Result};
use crate::analysis::{StorageDecision, analyze_batch, as_documents, propose_relational_model};
use crate::config::Config;
use crate::database::{
    DocumentInsertReport, DocumentStore, InsertSummary, RelationalStore, SchemaReport, SqlRows,
    StoredDocument,
};
use crate::registry::{DocumentSchema, HistoryRecord, SchemaEntry, SchemaRegistry, StoredSchema};
use crate::retriever::{SchemaMatch, SchemaRetriever};
use crate::router::{Backend, BackendQuery, QueryRequest, QueryRoute, QueryRouter};

/// Registry and the retriever built from it, always updated together
#[derive(Debug, Default)]
struct Catalog {
    registry: SchemaRegistry,
    retriever: SchemaRetriever,
}

impl Catalog {
    fn register(&mut self, name: &str, schema: StoredSchema, notes: &str) -> HistoryRecord {
        let record = self.registry.register(name, schema, notes);
        self.retriever.build(&self.registry);
        record
    }

    fn reset(&mut self) {
        self.registry.reset();
        self.retriever.build(&self.registry);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum IngestOutcome {
    #[serde(rename = "SQL")]
    Relational {
        schema: SchemaReport,
        rows: InsertSummary,
    },
    #[serde(rename = "DOC")]
    Document { report: DocumentInsertReport },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestReport {
    pub batch_id: Uuid,
    pub decision: StorageDecision,
    pub stability_score: f64,
    /// Registry name the batch was registered under
    pub target: String,
    pub outcome: IngestOutcome,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum QueryResult {
    #[serde(rename = "SQL")]
    Sql { rows: SqlRows },
    #[serde(rename = "DOC")]
    Doc { docs: Vec<StoredDocument> },
}

impl QueryResult {
    #[inline]
    pub fn backend(&self) -> Backend {
        match self {
            Self::Sql { .. } => Backend::Sql,
            Self::Doc { .. } => Backend::Doc,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        match self {
            Self::Sql { rows } => rows.rows.len(),
            Self::Doc { docs } => docs.len(),
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Ingestion orchestrator over both stores and the schema catalog.
///
/// Registration and the retriever rebuild share one write lock so readers
/// never see a registry the retriever has not indexed yet. Store writes run
/// outside that lock.
#[derive(Debug)]
pub struct Pipeline {
    config: Config,
    relational: RelationalStore,
    documents: DocumentStore,
    catalog: RwLock<Catalog>,
}

impl Pipeline {
    /// Open both stores and replay persisted schema history
    #[inline]
    pub async fn open(config: Config) -> Result<Self> {
        config
            .validate()
            .map_err(|e| PolyError::Config(e.to_string()))?;

        let max_connections = config.storage.max_connections;
        let relational = RelationalStore::open(config.relational_path(), max_connections).await?;
        let documents = DocumentStore::open(config.document_path(), max_connections).await?;

        let mut catalog = Catalog::default();
        let history = documents.schema_history().await?;
        let replayed = history.len();
        catalog.registry.restore(history);
        catalog.retriever.build(&catalog.registry);

        info!(
            "Opened pipeline at {} ({} schemas from {} history records)",
            config.get_base_dir().display(),
            catalog.registry.len(),
            replayed
        );

        Ok(Self {
            config,
            relational,
            documents,
            catalog: RwLock::new(catalog),
        })
    }

    #[inline]
    pub fn config(&self) -> &Config {
        &self.config
    }

    #[inline]
    pub fn relational(&self) -> &RelationalStore {
        &self.relational
    }

    #[inline]
    pub fn documents(&self) -> &DocumentStore {
        &self.documents
    }

    /// Ingest under the configured default table or namespace
    #[inline]
    pub async fn ingest(&self, values: &[Value], metadata: &str) -> Result<IngestReport> {
        self.ingest_with(values, metadata, None).await
    }

    /// Ingest under an explicit top-table or namespace name
    #[inline]
    pub async fn ingest_named(
        &self,
        values: &[Value],
        metadata: &str,
        name: &str,
    ) -> Result<IngestReport> {
        self.ingest_with(values, metadata, Some(name)).await
    }

    async fn ingest_with(
        &self,
        values: &[Value],
        metadata: &str,
        name: Option<&str>,
    ) -> Result<IngestReport> {
        let batch_id = Uuid::new_v4();
        let analysis = analyze_batch(values, &self.config.analysis)?;
        let docs = as_documents(values)?;

        info!(
            "Batch {}: {} documents, stability {:.4}, decision {}",
            batch_id, analysis.batch_size, analysis.stability_score, analysis.decision
        );

        let (target, schema, outcome) = match analysis.decision {
            StorageDecision::Sql => {
                let top_table = name.unwrap_or(&self.config.storage.top_table);
                let mut model = propose_relational_model(&analysis, top_table);
                if top_table != self.config.storage.top_table {
                    model = model.with_scoped_children();
                }

                let schema_report = self.relational.ensure_schema(&model, docs[0]).await?;
                let rows = self.relational.insert(&model, &docs).await?;
                (
                    top_table.to_string(),
                    StoredSchema::Relational(model),
                    IngestOutcome::Relational {
                        schema: schema_report,
                        rows,
                    },
                )
            }
            StorageDecision::Doc => {
                let namespace = name.unwrap_or(&self.config.storage.default_namespace);
                let report = self.documents.insert(&docs, namespace).await;
                (
                    namespace.to_string(),
                    StoredSchema::Document(DocumentSchema {
                        paths: analysis.distinct_paths(),
                        namespace: namespace.to_string(),
                    }),
                    IngestOutcome::Document { report },
                )
            }
        };

        {
            let mut catalog = self.catalog.write().await;
            let record = catalog.register(&target, schema, metadata);
            self.documents.record_schema(&record).await?;
        }

        info!("Batch {} registered as '{}'", batch_id, target);
        Ok(IngestReport {
            batch_id,
            decision: analysis.decision,
            stability_score: analysis.stability_score,
            target,
            outcome,
        })
    }

    /// Resolve a request to its backend without running it
    #[inline]
    pub async fn route(&self, request: &QueryRequest) -> Result<QueryRoute> {
        let catalog = self.catalog.read().await;
        self.router(&catalog.registry).route(request)
    }

    #[inline]
    pub async fn query(&self, request: &QueryRequest) -> Result<QueryResult> {
        let route = self.route(request).await?;

        match route.query {
            BackendQuery::Sql(query) => {
                let rows = self.relational.execute(&query).await?;
                Ok(QueryResult::Sql { rows })
            }
            BackendQuery::Doc(query) => {
                let docs = self.documents.query(&query).await?;
                Ok(QueryResult::Doc { docs })
            }
        }
    }

    /// Schemas ranked by relevance to free text
    #[inline]
    pub async fn search_schema(&self, text: &str, top_k: Option<usize>) -> Vec<SchemaMatch> {
        let top_k = top_k.unwrap_or(self.config.search.default_top_k);
        self.catalog.read().await.retriever.search(text, top_k)
    }

    #[inline]
    pub async fn schemas(&self) -> Vec<SchemaEntry> {
        self.catalog.read().await.registry.list().to_vec()
    }

    #[inline]
    pub async fn schema(&self, name: &str) -> Option<SchemaEntry> {
        self.catalog.read().await.registry.get(name).cloned()
    }

    #[inline]
    pub async fn history(&self, name: &str) -> Vec<HistoryRecord> {
        self.catalog
            .read()
            .await
            .registry
            .history(name)
            .into_iter()
            .cloned()
            .collect()
    }

    /// Forget every registered schema, in memory and on disk. Stored rows
    /// and documents are left in place.
    #[inline]
    pub async fn reset(&self) -> Result<()> {
        let mut catalog = self.catalog.write().await;
        self.documents.clear_schema_history().await?;
        catalog.reset();
        info!("Schema registry reset");
        Ok(())
    }

    fn router<'a>(&'a self, registry: &'a SchemaRegistry) -> QueryRouter<'a> {
        QueryRouter::new(
            registry,
            self.config.query.default_limit,
            &self.config.storage.default_namespace,
        )
    }
}
