use super::*;
use serde_json::json;

fn document(value: Value) -> Document {
    match value {
        Value::Object(map) => map,
        other => panic!("expected an object, got {other}"),
    }
}

#[test]
fn kind_classification() {
    assert_eq!(ValueKind::of(&json!(null)), ValueKind::Null);
    assert_eq!(ValueKind::of(&json!(true)), ValueKind::Bool);
    assert_eq!(ValueKind::of(&json!(42)), ValueKind::Int);
    assert_eq!(ValueKind::of(&json!(u64::MAX)), ValueKind::Int);
    assert_eq!(ValueKind::of(&json!(0.87)), ValueKind::Float);
    assert_eq!(ValueKind::of(&json!("x")), ValueKind::Text);
    assert_eq!(ValueKind::of(&json!([1])), ValueKind::Sequence);
    assert_eq!(ValueKind::of(&json!({"a": 1})), ValueKind::Mapping);
    assert!(ValueKind::Float.is_scalar());
    assert!(!ValueKind::Null.is_scalar());
}

#[test]
fn dotted_path_lookup() {
    let value = json!({"user": {"address": {"city": "Pune"}}, "tags": ["a"]});
    assert_eq!(get_path(&value, "user.address.city"), Some(&json!("Pune")));
    assert_eq!(get_path(&value, "user.missing"), None);
    assert_eq!(get_path(&value, "tags.0"), None);
}

#[test]
fn relation_resolution_walks_nested_maps() {
    let doc = document(json!({
        "profile": {"addresses": [{"city": "A"}, {"city": "B"}]},
        "orders": "not-a-list"
    }));

    let addresses = resolve_relation(&doc, "profile.addresses");
    assert_eq!(addresses.len(), 2);
    assert_eq!(addresses[1], &json!({"city": "B"}));

    assert!(resolve_relation(&doc, "orders").is_empty());
    assert!(resolve_relation(&doc, "missing.path").is_empty());
}

#[test]
fn relation_resolution_fans_out_over_marked_segments() {
    let doc = document(json!({
        "orders": [
            {"lines": [{"sku": "A"}, {"sku": "B"}]},
            {"lines": [{"sku": "C"}]},
            {"note": "no lines"}
        ]
    }));

    let lines = resolve_relation(&doc, "orders[].lines");
    let skus: Vec<_> = lines
        .iter()
        .filter_map(|line| line.get("sku"))
        .collect();
    assert_eq!(skus, vec![&json!("A"), &json!("B"), &json!("C")]);
}

#[test]
fn scalar_text_skips_nested_and_null() {
    assert_eq!(scalar_text(&json!("click")), Some("click".to_string()));
    assert_eq!(scalar_text(&json!(0.87)), Some("0.87".to_string()));
    assert_eq!(scalar_text(&json!(false)), Some("false".to_string()));
    assert_eq!(scalar_text(&json!(null)), None);
    assert_eq!(scalar_text(&json!({"id": 99})), None);
}

#[test]
fn numeric_match_ignores_representation() {
    assert!(values_match(&json!(1), &json!(1.0)));
    assert!(values_match(&json!({"a": [1, 2]}), &json!({"a": [1.0, 2]})));
    assert!(!values_match(&json!(1), &json!("1")));
    assert!(!values_match(&json!({"a": 1}), &json!({"a": 1, "b": 2})));
}

#[test]
fn text_rendering_keeps_strings_bare() {
    assert_eq!(render_text(&json!("IN")), "IN");
    assert_eq!(render_text(&json!(3.5)), "3.5");
    assert_eq!(render_text(&json!({"k": true})), r#"{"k":true}"#);
}
