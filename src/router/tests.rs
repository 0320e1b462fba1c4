use super::*;
use crate::analysis::ChildTable;
use crate::registry::{DocumentSchema, StoredSchema};
use serde_json::json;

fn registry() -> SchemaRegistry {
    let mut registry = SchemaRegistry::new();
    registry.register(
        "items",
        StoredSchema::Relational(RelationalModel {
            top_table: "items".to_string(),
            top_cols: vec!["id".to_string(), "name".to_string(), "country".to_string()],
            child_tables: vec![ChildTable {
                name: "orders".to_string(),
                root_path: "orders".to_string(),
            }],
        }),
        "customers",
    );
    registry.register(
        "events",
        StoredSchema::Document(DocumentSchema {
            paths: vec!["event".to_string()],
            namespace: "events".to_string(),
        }),
        "clicks",
    );
    registry
}

#[test]
fn relational_entries_route_to_sql() {
    let registry = registry();
    let router = QueryRouter::new(&registry, 100, "default");
    let request = QueryRequest::new("items").filter("country", "NL");

    let route = router.route(&request).expect("route");
    assert_eq!(route.backend, Backend::Sql);
    assert_eq!(
        route.query,
        BackendQuery::Sql(SqlQuery {
            sql: r#"SELECT * FROM "items" WHERE "country" = ? LIMIT 100"#.to_string(),
            params: vec![json!("NL")],
        })
    );
}

#[test]
fn document_entries_route_to_doc() {
    let registry = registry();
    let router = QueryRouter::new(&registry, 100, "default");
    let request = QueryRequest::new("events").filter("event", "click");

    let route = router.route(&request).expect("route");
    assert_eq!(route.backend, Backend::Doc);
    let BackendQuery::Doc(query) = route.query else {
        panic!("expected a document query");
    };
    assert_eq!(query.namespace, "events");
    assert_eq!(query.filters.get("event"), Some(&json!("click")));
}

#[test]
fn unknown_targets_fail_open_to_doc() {
    let registry = registry();
    let router = QueryRouter::new(&registry, 100, "default");
    let request = QueryRequest::new("never_registered");

    assert_eq!(router.backend_for(&request), Backend::Doc);
    let route = router.route(&request).expect("route");
    assert_eq!(route.backend, Backend::Doc);
    assert_eq!(
        route.query,
        BackendQuery::Doc(DocQuery {
            namespace: "never_registered".to_string(),
            filters: Map::new(),
        })
    );
}

#[test]
fn empty_target_uses_default_namespace() {
    let query = build_doc_query(&QueryRequest::default(), "default");
    assert_eq!(query.namespace, "default");
    assert!(query.filters.is_empty());
}

#[test]
fn sql_query_projects_fields_and_binds_filters_in_order() {
    let registry = registry();
    let model = registry
        .get("items")
        .and_then(|entry| entry.schema.as_relational())
        .expect("relational entry");
    let request = QueryRequest::new("items")
        .filter("country", "NL")
        .filter("id", 2)
        .fields(["name", "id"])
        .limit(10);

    let query = build_sql_query(model, &request, 100).expect("valid query");
    assert_eq!(
        query.sql,
        r#"SELECT "name", "id" FROM "items" WHERE "country" = ? AND "id" = ? LIMIT 10"#
    );
    assert_eq!(query.params, vec![json!("NL"), json!(2)]);
}

#[test]
fn hostile_values_stay_out_of_sql_text() {
    let registry = registry();
    let model = registry
        .get("items")
        .and_then(|entry| entry.schema.as_relational())
        .expect("relational entry");
    let payload = "x' OR '1'='1";
    let request = QueryRequest::new("items").filter("name", payload);

    let query = build_sql_query(model, &request, 100).expect("valid query");
    assert!(!query.sql.contains(payload));
    assert_eq!(query.params, vec![json!(payload)]);
}

#[test]
fn identifiers_are_quoted() {
    let model = RelationalModel {
        top_table: "items".to_string(),
        top_cols: vec![],
        child_tables: vec![],
    };
    let request = QueryRequest::new("items").fields([r#"a"b"#]);

    let query = build_sql_query(&model, &request, 100).expect("valid query");
    assert_eq!(query.sql, r#"SELECT "a""b" FROM "items" LIMIT 100"#);
}

#[test]
fn absent_limit_uses_default_and_explicit_limit_is_kept() {
    let model = RelationalModel {
        top_table: "items".to_string(),
        top_cols: vec![],
        child_tables: vec![],
    };

    let defaulted = build_sql_query(&model, &QueryRequest::new("items"), 42).expect("valid query");
    assert!(defaulted.sql.ends_with("LIMIT 42"), "{}", defaulted.sql);

    let zero = build_sql_query(&model, &QueryRequest::new("items").limit(0), 42)
        .expect("zero is a valid limit");
    assert!(zero.sql.ends_with("LIMIT 0"), "{}", zero.sql);
}

#[test]
fn negative_limit_is_rejected() {
    let registry = registry();
    let router = QueryRouter::new(&registry, 100, "default");

    let err = router
        .route(&QueryRequest::new("items").limit(-5))
        .expect_err("negative limit must fail");
    assert!(err.is_validation());
}

#[test]
fn request_deserializes_with_defaults() {
    let request: QueryRequest =
        serde_json::from_value(json!({"target": "items"})).expect("valid request");
    assert_eq!(request, QueryRequest::new("items"));
}
