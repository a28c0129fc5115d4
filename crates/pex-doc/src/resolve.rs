//! Breadth-first resolution of [`PathAddress`]es against a document tree.

use crate::address::{PathAddress, Segment};
use crate::error::ResolveError;
use crate::node::{KeyPath, Node, PathStep};

/// Outcome of resolving an address: the node and its absolute location.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolved<'a> {
    /// Resolved node.
    pub value: &'a Node,
    /// Absolute key-path from the document root.
    pub path: KeyPath,
}

/// Uniqueness policy for a single key lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lookup {
    /// Closest match wins; another match at the same depth is ambiguous.
    Closest,
    /// First match in breadth-first order wins.
    First,
}

/// Resolves `address` inside `root`, returning any node kind.
pub fn resolve<'a>(root: &'a Node, address: &PathAddress) -> Result<Resolved<'a>, ResolveError> {
    let mut current = root;
    let mut path = KeyPath::default();
    for (idx, segment) in address.segments().iter().enumerate() {
        match segment {
            Segment::Key(key) => {
                let lookup = if idx == 0 && address.first_match() {
                    Lookup::First
                } else {
                    Lookup::Closest
                };
                let (node, relative) = find_key(current, key, lookup, address, &path)?;
                current = node;
                path = path.joined(&relative);
            }
            Segment::Select {
                key,
                value,
                literal,
            } => {
                let (index, node) = select_element(current, key, value, literal, address, &path)?;
                current = node;
                path.0.push(PathStep::Index(index));
            }
        }
    }
    Ok(Resolved {
        value: current,
        path,
    })
}

/// Resolves `address` and requires the result to be a scalar leaf.
pub fn resolve_leaf<'a>(
    root: &'a Node,
    address: &PathAddress,
) -> Result<Resolved<'a>, ResolveError> {
    let resolved = resolve(root, address)?;
    if !resolved.value.is_leaf() {
        return Err(ResolveError::NotALeaf {
            address: address.to_string(),
            path: resolved.path.to_string(),
            kind: resolved.value.kind(),
        });
    }
    Ok(resolved)
}

fn find_key<'a>(
    start: &'a Node,
    key: &str,
    lookup: Lookup,
    address: &PathAddress,
    scope: &KeyPath,
) -> Result<(&'a Node, KeyPath), ResolveError> {
    let mut frontier: Vec<(&Node, Vec<PathStep>)> = vec![(start, Vec::new())];
    while !frontier.is_empty() {
        let mut matches: Vec<(&Node, Vec<PathStep>)> = Vec::new();
        let mut next = Vec::new();
        for (node, steps) in frontier {
            match node {
                Node::Map(map) => {
                    for (child_key, child) in map {
                        let mut child_steps = steps.clone();
                        child_steps.push(PathStep::Key(child_key.clone()));
                        if child_key == key {
                            matches.push((child, child_steps.clone()));
                        }
                        next.push((child, child_steps));
                    }
                }
                Node::List(items) => {
                    for (index, child) in items.iter().enumerate() {
                        let mut child_steps = steps.clone();
                        child_steps.push(PathStep::Index(index));
                        next.push((child, child_steps));
                    }
                }
                _ => {}
            }
        }
        if !matches.is_empty() {
            if matches.len() > 1 && lookup == Lookup::Closest {
                return Err(ResolveError::AmbiguousKey {
                    address: address.to_string(),
                    segment: key.to_string(),
                    candidates: matches
                        .iter()
                        .map(|(_, steps)| scope.joined(&KeyPath(steps.clone())).to_string())
                        .collect(),
                });
            }
            let (node, steps) = matches.swap_remove(0);
            return Ok((node, KeyPath(steps)));
        }
        frontier = next;
    }
    Err(ResolveError::NotFound {
        address: address.to_string(),
        segment: key.to_string(),
        scope: display_scope(scope),
    })
}

fn select_element<'a>(
    list: &'a Node,
    key: &str,
    value: &Node,
    literal: &str,
    address: &PathAddress,
    scope: &KeyPath,
) -> Result<(usize, &'a Node), ResolveError> {
    let segment = format!("[{key}=={literal}]");
    let Node::List(items) = list else {
        return Err(ResolveError::NotFound {
            address: address.to_string(),
            segment,
            scope: format!("{} (a {}, not a list)", display_scope(scope), list.kind()),
        });
    };
    let matching: Vec<(usize, &Node)> = items
        .iter()
        .enumerate()
        .filter(|(_, item)| match item {
            Node::Map(map) => map
                .get(key)
                .map(|candidate| candidate.loosely_equals(value, literal))
                .unwrap_or(false),
            _ => false,
        })
        .collect();
    match matching.as_slice() {
        [] => Err(ResolveError::NotFound {
            address: address.to_string(),
            segment,
            scope: display_scope(scope),
        }),
        [single] => Ok(*single),
        several => Err(ResolveError::AmbiguousKey {
            address: address.to_string(),
            segment,
            candidates: several
                .iter()
                .map(|(index, _)| {
                    let mut steps = scope.clone();
                    steps.0.push(PathStep::Index(*index));
                    steps.to_string()
                })
                .collect(),
        }),
    }
}

fn display_scope(scope: &KeyPath) -> String {
    if scope.steps().is_empty() {
        "<root>".to_string()
    } else {
        scope.to_string()
    }
}
