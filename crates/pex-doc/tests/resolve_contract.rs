use pex_doc::{resolve, resolve_leaf, Node, PathAddress, ResolveError};

fn doc(json: &str) -> Node {
    serde_json::from_str(json).expect("parse document")
}

fn addr(raw: &str) -> PathAddress {
    PathAddress::parse(raw).expect("parse address")
}

#[test]
fn predicate_selects_unique_list_element() {
    let root = doc(r#"{"a":[{"id":1,"value":10},{"id":2,"value":20}]}"#);
    let resolved = resolve_leaf(&root, &addr("a.[id==2].value")).unwrap();
    assert_eq!(resolved.value, &Node::Int(20));
    assert_eq!(resolved.path.to_string(), "a[1].value");
}

#[test]
fn predicate_without_match_is_not_found() {
    let root = doc(r#"{"a":[{"id":1,"value":10},{"id":2,"value":20}]}"#);
    let err = resolve(&root, &addr("a.[id==9].value")).unwrap_err();
    assert!(matches!(err, ResolveError::NotFound { .. }), "{err:?}");
}

#[test]
fn predicate_with_two_matches_is_ambiguous() {
    let root = doc(r#"{"a":[{"id":1,"v":1},{"id":1,"v":2}]}"#);
    let err = resolve(&root, &addr("a.[id==1].v")).unwrap_err();
    match err {
        ResolveError::AmbiguousKey { candidates, .. } => {
            assert_eq!(candidates, vec!["a[0]".to_string(), "a[1]".to_string()]);
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn closest_match_wins_over_deeper_matches() {
    let root = doc(r#"{"outer":{"inner":{"speed":3}},"speed":1}"#);
    let resolved = resolve_leaf(&root, &addr("speed")).unwrap();
    assert_eq!(resolved.value, &Node::Int(1));
    assert_eq!(resolved.path.to_string(), "speed");
}

#[test]
fn matches_at_the_same_depth_are_ambiguous() {
    let root = doc(r#"{"x":{"speed":1},"y":{"speed":2}}"#);
    let err = resolve(&root, &addr("speed")).unwrap_err();
    assert!(matches!(err, ResolveError::AmbiguousKey { .. }));
}

#[test]
fn chain_disambiguates_by_parent() {
    let root = doc(r#"{"x":{"speed":1},"y":{"deep":{"speed":2}}}"#);
    let resolved = resolve_leaf(&root, &addr("y.speed")).unwrap();
    assert_eq!(resolved.value, &Node::Int(2));
    assert_eq!(resolved.path.to_string(), "y.deep.speed");
}

#[test]
fn leading_dot_accepts_first_match() {
    let root = doc(r#"{"x":{"speed":1},"y":{"speed":2}}"#);
    let resolved = resolve_leaf(&root, &addr(".speed")).unwrap();
    assert_eq!(resolved.value, &Node::Int(1));
}

#[test]
fn search_descends_into_lists() {
    let root = doc(r#"{"sources":[{"spawnNumber":5}]}"#);
    let resolved = resolve_leaf(&root, &addr("spawnNumber")).unwrap();
    assert_eq!(resolved.path.to_string(), "sources[0].spawnNumber");
}

#[test]
fn subtree_is_not_a_leaf() {
    let root = doc(r#"{"a":{"b":1}}"#);
    let err = resolve_leaf(&root, &addr("a")).unwrap_err();
    assert!(matches!(err, ResolveError::NotALeaf { .. }));
    assert!(resolve(&root, &addr("a")).is_ok());
}

#[test]
fn predicate_on_non_list_is_not_found() {
    let root = doc(r#"{"a":{"id":1}}"#);
    let err = resolve(&root, &addr("a.[id==1]")).unwrap_err();
    assert!(matches!(err, ResolveError::NotFound { .. }));
}

#[test]
fn nested_predicates_resolve_recursively() {
    let root = doc(
        r#"{"targets":[{"id":1,"shapes":[{"kind":"rect","w":2.0},{"kind":"circle","r":1.5}]}]}"#,
    );
    let resolved = resolve_leaf(&root, &addr("targets.[id==1].shapes.[kind==circle].r")).unwrap();
    assert_eq!(resolved.value, &Node::Float(1.5));
}

#[test]
fn errors_convert_into_pex_errors_with_codes() {
    let root = doc(r#"{"a":1}"#);
    let err: pex_core::PexError = resolve(&root, &addr("b")).unwrap_err().into();
    assert_eq!(err.info().code, "path.not_found");
    assert_eq!(err.info().context.get("address").map(String::as_str), Some("b"));
}
