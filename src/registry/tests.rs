use super::*;
use crate::analysis::ChildTable;

fn orders_model() -> StoredSchema {
    StoredSchema::Relational(RelationalModel {
        top_table: "orders".to_string(),
        top_cols: vec!["id".to_string(), "total".to_string()],
        child_tables: vec![ChildTable {
            name: "lines".to_string(),
            root_path: "lines".to_string(),
        }],
    })
}

fn events_schema() -> StoredSchema {
    StoredSchema::Document(DocumentSchema {
        paths: vec!["event".to_string(), "user.id".to_string()],
        namespace: "default".to_string(),
    })
}

#[test]
fn register_and_get() {
    let mut registry = SchemaRegistry::new();
    assert!(registry.is_empty());
    assert!(registry.get("orders").is_none());

    registry.register("orders", orders_model(), "customer purchase records");

    let entry = registry.get("orders").expect("orders should be registered");
    assert_eq!(entry.notes, "customer purchase records");
    assert!(entry.schema.is_relational());
    assert_eq!(registry.len(), 1);
}

#[test]
fn upsert_keeps_position_and_appends_history() {
    let mut registry = SchemaRegistry::new();
    registry.register("orders", orders_model(), "v1");
    registry.register("events", events_schema(), "");
    registry.register("orders", events_schema(), "v2");

    let names: Vec<_> = registry.list().iter().map(|e| e.name.as_str()).collect();
    assert_eq!(names, vec!["orders", "events"]);
    assert_eq!(registry.get("orders").map(|e| e.notes.as_str()), Some("v2"));

    let history = registry.history("orders");
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].notes, "v1");
    assert!(history[0].schema.is_relational());
    assert_eq!(history[1].notes, "v2");
    assert!(history[0].timestamp <= history[1].timestamp);
    assert_eq!(registry.all_history().len(), 3);
}

#[test]
fn restore_replays_records_verbatim() {
    let mut original = SchemaRegistry::new();
    original.register("orders", orders_model(), "first");
    original.register("events", events_schema(), "second");

    let mut restored = SchemaRegistry::new();
    restored.restore(original.all_history().to_vec());

    assert_eq!(restored.list(), original.list());
    assert_eq!(restored.all_history(), original.all_history());
}

#[test]
fn reset_is_explicit() {
    let mut registry = SchemaRegistry::new();
    registry.register("orders", orders_model(), "");
    registry.reset();

    assert!(registry.is_empty());
    assert!(registry.history("orders").is_empty());
}

#[test]
fn schema_serializes_with_kind_tag() {
    let json = serde_json::to_value(events_schema()).expect("should serialize");
    assert_eq!(json["kind"], "document");
    assert_eq!(json["namespace"], "default");

    let back: StoredSchema = serde_json::from_value(json).expect("should deserialize");
    assert_eq!(back, events_schema());

    let relational = serde_json::to_value(orders_model()).expect("should serialize");
    assert_eq!(relational["kind"], "relational");
    assert_eq!(relational["top_table"], "orders");
}
