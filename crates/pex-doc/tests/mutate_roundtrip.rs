use pex_doc::{apply, apply_all, Document, Node, NodeKind, PathAddress, ResolveError};
use proptest::prelude::*;

fn base() -> Document {
    Document::new(
        serde_json::from_str(
            r#"{"name":"s","speed":1.0,"count":3,"flag":true,
                "agents":[{"id":1,"radius":0.2},{"id":2,"radius":0.3}],
                "nested":{"deeper":{"label":"x"}}}"#,
        )
        .unwrap(),
    )
}

fn addr(raw: &str) -> PathAddress {
    PathAddress::parse(raw).unwrap()
}

#[test]
fn apply_returns_new_document_and_leaves_base_untouched() {
    let doc = base();
    let applied = apply(&doc, &addr("speed"), Node::Float(1.2)).unwrap();
    assert_eq!(doc.resolve_leaf(&addr("speed")).unwrap().value, &Node::Float(1.0));
    assert_eq!(
        applied.document.resolve_leaf(&addr("speed")).unwrap().value,
        &Node::Float(1.2)
    );
    assert!(applied.warnings.is_empty());
}

#[test]
fn numeric_cross_cast_is_recorded() {
    let applied = apply(&base(), &addr("count"), Node::Float(2.5)).unwrap();
    assert_eq!(applied.warnings.len(), 1);
    assert_eq!(applied.warnings[0].from, NodeKind::Int);
    assert_eq!(applied.warnings[0].to, NodeKind::Float);
}

#[test]
fn type_change_is_rejected() {
    let err = apply(&base(), &addr("flag"), Node::String("yes".into())).unwrap_err();
    assert!(matches!(
        err,
        ResolveError::TypeMismatch {
            found: NodeKind::Bool,
            expected: NodeKind::String,
            ..
        }
    ));
}

#[test]
fn missing_keys_are_never_created() {
    let err = apply(&base(), &addr("nonexistent"), Node::Int(1)).unwrap_err();
    assert!(matches!(err, ResolveError::NotFound { .. }));
}

#[test]
fn apply_all_is_all_or_nothing() {
    let speed = addr("speed");
    let flag = addr("flag");
    let result = apply_all(
        &base(),
        vec![(&speed, Node::Float(9.0)), (&flag, Node::Int(1))],
    );
    assert!(result.is_err());
}

#[test]
fn document_round_trips_through_yaml_and_json() {
    let dir = tempfile::tempdir().unwrap();
    let yaml_path = dir.path().join("doc.yaml");
    let doc = base();
    let as_yaml = Document::with_format(doc.root().clone(), pex_doc::DocumentFormat::Yaml);
    as_yaml.save(&yaml_path).unwrap();
    let loaded = Document::load(&yaml_path).unwrap();
    assert_eq!(loaded.root(), doc.root());
}

proptest! {
    #[test]
    fn resolve_after_apply_returns_written_value(
        speed in -1.0e6f64..1.0e6,
        count in any::<i64>(),
        radius in 0.0f64..10.0,
        label in "[a-z]{0,12}",
    ) {
        let doc = base();
        let cases = vec![
            (addr("speed"), Node::Float(speed)),
            (addr("count"), Node::Int(count)),
            (addr("agents.[id==2].radius"), Node::Float(radius)),
            (addr("deeper.label"), Node::String(label)),
        ];
        for (address, value) in cases {
            let applied = apply(&doc, &address, value.clone()).unwrap();
            let reread = applied.document.resolve_leaf(&address).unwrap();
            prop_assert_eq!(reread.value, &value);
        }
    }
}
