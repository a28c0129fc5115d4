use pex_core::{stable_hash_string, to_canonical_json_bytes, RunProvenance};
use serde_json::json;

#[test]
fn canonical_json_orders_keys() {
    let value = json!({"b": 1, "a": {"d": 2, "c": 3}});
    let bytes = to_canonical_json_bytes(&value).expect("json");
    assert_eq!(String::from_utf8(bytes).unwrap(), r#"{"a":{"c":3,"d":2},"b":1}"#);
}

#[test]
fn stable_hash_ignores_insertion_order() {
    let a = json!({"x": 1, "y": [1, 2]});
    let b = json!({"y": [1, 2], "x": 1});
    assert_eq!(stable_hash_string(&a).unwrap(), stable_hash_string(&b).unwrap());
}

#[test]
fn provenance_round_trips() {
    let provenance = RunProvenance::now("study".into(), "doc".into(), 9);
    assert!(provenance.created_at.ends_with('Z'));
    let json = serde_json::to_string(&provenance).expect("serialize");
    let decoded: RunProvenance = serde_json::from_str(&json).expect("deserialize");
    assert_eq!(decoded, provenance);
}
