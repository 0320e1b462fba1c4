use super::*;
use crate::registry::{DocumentSchema, SchemaRegistry, StoredSchema};
use serde_json::json;
use std::collections::HashSet;
use tempfile::TempDir;

async fn create_test_store() -> (TempDir, DocumentStore) {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let store = DocumentStore::open(temp_dir.path().join("documents.db"), 1)
        .await
        .expect("Failed to open document store");
    (temp_dir, store)
}

fn documents(values: Value) -> Vec<Document> {
    let Value::Array(items) = values else {
        panic!("fixture must be an array");
    };
    items
        .into_iter()
        .map(|item| match item {
            Value::Object(map) => map,
            other => panic!("fixture element must be an object, got {other}"),
        })
        .collect()
}

fn filters(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        other => panic!("filters must be an object, got {other}"),
    }
}

#[tokio::test]
async fn insert_then_unfiltered_query_returns_every_document() {
    let (_temp_dir, store) = create_test_store().await;
    let docs = documents(json!([
        {"event": "click", "user": {"id": 99}},
        {"event": "view", "meta": {"page": "product"}, "score": 0.87},
        {"event": "click"}
    ]));
    let refs: Vec<&Document> = docs.iter().collect();

    let report = store.insert(&refs, "events").await;
    assert_eq!(report.ids.len(), 3);
    assert!(report.failures.is_empty());

    let found = store
        .query(&DocQuery {
            namespace: "events".to_string(),
            filters: Map::new(),
        })
        .await
        .expect("query should succeed");

    assert_eq!(found.len(), 3);
    let ids: HashSet<i64> = found.iter().map(|d| d.id).collect();
    assert_eq!(ids.len(), 3);
    assert_eq!(found[1].payload, Value::Object(docs[1].clone()));
    assert_eq!(store.count("events").await.expect("count"), 3);
}

#[tokio::test]
async fn namespaces_are_isolated() {
    let (_temp_dir, store) = create_test_store().await;
    let docs = documents(json!([{"a": 1}, {"a": 2}]));
    let refs: Vec<&Document> = docs.iter().collect();

    store.insert(&refs[..1], "left").await;
    store.insert(&refs[1..], "right").await;

    let left = store
        .query(&DocQuery {
            namespace: "left".to_string(),
            filters: Map::new(),
        })
        .await
        .expect("query left");
    assert_eq!(left.len(), 1);
    assert_eq!(left[0].payload, json!({"a": 1}));
    assert_eq!(left[0].namespace, "left");

    let empty = store
        .query(&DocQuery {
            namespace: "nowhere".to_string(),
            filters: Map::new(),
        })
        .await
        .expect("query nowhere");
    assert!(empty.is_empty());
}

#[tokio::test]
async fn filters_match_nested_paths_conjunctively() {
    let (_temp_dir, store) = create_test_store().await;
    let docs = documents(json!([
        {"event": "click", "user": {"id": 99}},
        {"event": "click", "user": {"id": 7}},
        {"event": "view", "user": {"id": 99}},
        {"event": "click"}
    ]));
    let refs: Vec<&Document> = docs.iter().collect();
    store.insert(&refs, "default").await;

    let found = store
        .query(&DocQuery {
            namespace: "default".to_string(),
            filters: filters(json!({"event": "click", "user.id": 99})),
        })
        .await
        .expect("query should succeed");

    assert_eq!(found.len(), 1);
    assert_eq!(found[0].payload, json!({"event": "click", "user": {"id": 99}}));

    let numeric = store
        .query(&DocQuery {
            namespace: "default".to_string(),
            filters: filters(json!({"user.id": 7.0})),
        })
        .await
        .expect("numeric query should succeed");
    assert_eq!(numeric.len(), 1);
}

#[tokio::test]
async fn key_index_holds_top_level_scalars_only() {
    let (_temp_dir, store) = create_test_store().await;
    let docs = documents(json!([
        {"event": "view", "meta": {"page": "product"}, "score": 0.87, "ok": true, "gone": null, "tags": ["a"]}
    ]));
    let refs: Vec<&Document> = docs.iter().collect();
    let report = store.insert(&refs, "default").await;

    let entries = store
        .index_entries(report.ids[0])
        .await
        .expect("index entries");
    assert_eq!(
        entries,
        vec![
            ("event".to_string(), "view".to_string()),
            ("score".to_string(), "0.87".to_string()),
            ("ok".to_string(), "true".to_string()),
        ]
    );
}

#[tokio::test]
async fn schema_history_round_trips() {
    let (_temp_dir, store) = create_test_store().await;
    let mut registry = SchemaRegistry::new();

    let first = registry.register(
        "default",
        StoredSchema::Document(DocumentSchema {
            paths: vec!["event".to_string()],
            namespace: "default".to_string(),
        }),
        "click stream",
    );
    store.record_schema(&first).await.expect("persist first");

    let second = registry.register(
        "default",
        StoredSchema::Document(DocumentSchema {
            paths: vec!["event".to_string(), "score".to_string()],
            namespace: "default".to_string(),
        }),
        "with scores",
    );
    store.record_schema(&second).await.expect("persist second");

    let loaded = store.schema_history().await.expect("load history");
    assert_eq!(loaded, vec![first, second]);

    store.clear_schema_history().await.expect("clear history");
    assert!(store.schema_history().await.expect("reload").is_empty());
}
