use super::*;
use serde_json::json;

fn flatten(value: Value) -> Vec<(String, ObservedType)> {
    let Value::Object(doc) = value else {
        panic!("fixture must be an object");
    };
    flatten_paths(&doc)
}

#[test]
fn flat_document_keeps_key_order() {
    let paths = flatten(json!({"id": 1, "name": "Alice", "score": 0.5, "ok": true, "x": null}));
    assert_eq!(
        paths,
        vec![
            ("id".to_string(), ObservedType::Int),
            ("name".to_string(), ObservedType::Str),
            ("score".to_string(), ObservedType::Float),
            ("ok".to_string(), ObservedType::Bool),
            ("x".to_string(), ObservedType::Null),
        ]
    );
}

#[test]
fn nested_maps_recurse() {
    let paths = flatten(json!({"user": {"id": 99, "geo": {"lat": 1.5}}}));
    let names: Vec<_> = paths.iter().map(|(p, _)| p.as_str()).collect();
    assert_eq!(names, vec!["user", "user.id", "user.geo", "user.geo.lat"]);
    assert_eq!(paths[0].1, ObservedType::Obj);
}

#[test]
fn arrays_of_objects_become_relation_roots() {
    let paths = flatten(json!({
        "orders": [{"sku": "A1", "qty": 2}, {"sku": "B1", "extra": true}]
    }));
    assert_eq!(
        paths,
        vec![
            ("orders".to_string(), ObservedType::List),
            ("orders[]".to_string(), ObservedType::ObjList),
            ("orders[].sku".to_string(), ObservedType::Str),
            ("orders[].qty".to_string(), ObservedType::Int),
        ]
    );
}

#[test]
fn scalar_and_empty_arrays_are_plain_lists() {
    let paths = flatten(json!({"tags": ["a", "b"], "empty": []}));
    assert_eq!(
        paths,
        vec![
            ("tags".to_string(), ObservedType::List),
            ("empty".to_string(), ObservedType::List),
        ]
    );
}

#[test]
fn type_names_display() {
    assert_eq!(ObservedType::ObjList.to_string(), "obj_list");
    assert_eq!(ObservedType::Str.to_string(), "str");
}
