use super::*;
use crate::analysis::{ChildTable, RelationalModel};
use crate::registry::DocumentSchema;

fn orders_schema() -> StoredSchema {
    StoredSchema::Relational(RelationalModel {
        top_table: "items".to_string(),
        top_cols: vec!["id".to_string(), "name".to_string(), "country".to_string()],
        child_tables: vec![ChildTable {
            name: "orders".to_string(),
            root_path: "orders".to_string(),
        }],
    })
}

fn events_schema() -> StoredSchema {
    StoredSchema::Document(DocumentSchema {
        paths: vec![
            "user.id".to_string(),
            "event".to_string(),
            "meta.page".to_string(),
            "event".to_string(),
        ],
        namespace: "events".to_string(),
    })
}

fn sample_registry() -> SchemaRegistry {
    let mut registry = SchemaRegistry::new();
    registry.register("orders", orders_schema(), "customer purchase records");
    registry.register("events", events_schema(), "click stream from the web shop");
    registry
}

#[test]
fn relational_rendering_lists_tables_and_columns() {
    let registry = sample_registry();
    let text = render_schema_text(registry.get("orders").expect("orders registered"));

    assert_eq!(
        text,
        "name: orders\ncustomer purchase records\ntop_table: items\n\
         top_cols: id name country\nchild_table: orders root: orders"
    );
}

#[test]
fn document_rendering_sorts_and_dedups_paths() {
    let registry = sample_registry();
    let text = render_schema_text(registry.get("events").expect("events registered"));

    assert!(text.ends_with("paths: event meta.page user.id"));
    assert!(text.contains("namespace: events"));
}

#[test]
fn analyzer_emits_unigrams_then_bigrams() {
    let terms = analyze("Customer Purchase, a records!");
    assert_eq!(
        terms,
        vec![
            "customer",
            "purchase",
            "records",
            "customer purchase",
            "purchase records",
        ]
    );
}

#[test]
fn notes_drive_relevance() {
    let mut retriever = SchemaRetriever::new();
    retriever.build(&sample_registry());

    let matches = retriever.search("customer purchase", 5);
    assert_eq!(matches.len(), 2);
    assert_eq!(matches[0].name, "orders");
    assert!(matches[0].score > 0.0);
    assert!(matches[0].score > matches[1].score);
}

#[test]
fn scores_are_cosine_bounded() {
    let mut retriever = SchemaRetriever::new();
    retriever.build(&sample_registry());

    for found in retriever.search("click stream web shop events", 5) {
        assert!((0.0..=1.0 + 1e-9).contains(&found.score), "{found:?}");
    }
}

#[test]
fn top_k_truncates_results() {
    let mut retriever = SchemaRetriever::new();
    retriever.build(&sample_registry());

    assert_eq!(retriever.search("name", 1).len(), 1);
    assert!(retriever.search("name", 0).is_empty());
}

#[test]
fn unknown_terms_score_zero_and_keep_registration_order() {
    let mut retriever = SchemaRetriever::new();
    retriever.build(&sample_registry());

    let matches = retriever.search("zebra giraffe", 5);
    let names: Vec<&str> = matches.iter().map(|m| m.name.as_str()).collect();
    assert_eq!(names, vec!["orders", "events"]);
    assert!(matches.iter().all(|m| m.score == 0.0));
}

#[test]
fn empty_registry_returns_nothing() {
    let mut retriever = SchemaRetriever::new();
    retriever.build(&SchemaRegistry::new());

    assert!(retriever.is_empty());
    assert!(retriever.search("anything", 5).is_empty());
}

#[test]
fn rebuild_reflects_upserted_notes() {
    let mut registry = sample_registry();
    let mut retriever = SchemaRetriever::new();
    retriever.build(&registry);
    assert_eq!(retriever.search("invoices ledger", 1)[0].score, 0.0);

    registry.register("events", events_schema(), "invoices ledger");
    retriever.build(&registry);

    let matches = retriever.search("invoices ledger", 1);
    assert_eq!(matches[0].name, "events");
    assert!(matches[0].score > 0.0);
    assert_eq!(retriever.len(), 2);
}
