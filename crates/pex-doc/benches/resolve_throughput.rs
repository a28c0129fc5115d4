use criterion::{black_box, criterion_group, criterion_main, Criterion};
use indexmap::IndexMap;
use pex_doc::{apply, resolve_leaf, Document, Node, PathAddress};

fn wide_document(width: usize) -> Node {
    let mut root = IndexMap::new();
    let mut items = Vec::with_capacity(width);
    for id in 0..width {
        let mut item = IndexMap::new();
        item.insert("id".to_string(), Node::Int(id as i64));
        item.insert("radius".to_string(), Node::Float(0.2));
        let mut attrs = IndexMap::new();
        attrs.insert(format!("attr{id}"), Node::Float(id as f64));
        item.insert("attributes".to_string(), Node::Map(attrs));
        items.push(Node::Map(item));
    }
    root.insert("agents".to_string(), Node::List(items));
    Node::Map(root)
}

fn resolve_bench(c: &mut Criterion) {
    let root = wide_document(2_000);
    let predicate = PathAddress::parse("agents.[id==1500].radius").unwrap();
    let deep_key = PathAddress::parse("attr1999").unwrap();

    c.bench_function("resolve_predicate", |b| {
        b.iter(|| black_box(resolve_leaf(&root, &predicate).unwrap()));
    });

    c.bench_function("resolve_breadth_first", |b| {
        b.iter(|| black_box(resolve_leaf(&root, &deep_key).unwrap()));
    });

    let doc = Document::new(root.clone());
    c.bench_function("apply_leaf", |b| {
        b.iter(|| black_box(apply(&doc, &predicate, Node::Float(0.5)).unwrap()));
    });
}

criterion_group!(benches, resolve_bench);
criterion_main!(benches);
