use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::address::PathAddress;
use crate::document::Document;
use crate::error::ResolveError;
use crate::node::{Node, NodeKind};
use crate::resolve::resolve_leaf;

/// Recorded when an integer leaf receives a float value or vice versa.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CastWarning {
    /// Address that was mutated.
    pub address: String,
    /// Absolute key-path of the leaf.
    pub path: String,
    /// Kind of the leaf in the base document.
    pub from: NodeKind,
    /// Kind of the written value.
    pub to: NodeKind,
}

/// A new document together with the numeric cross-casts that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct Applied {
    /// Mutated copy of the input document.
    pub document: Document,
    /// Cross-cast warnings, in application order.
    pub warnings: Vec<CastWarning>,
}

/// Replaces the leaf at `address` with `value`, returning a new document.
///
/// The address must already resolve to a leaf of the same kind as `value`;
/// integer and float leaves accept each other with a [`CastWarning`]. After
/// writing, the address is resolved again and must return `value`.
pub fn apply(doc: &Document, address: &PathAddress, value: Node) -> Result<Applied, ResolveError> {
    apply_all(doc, std::iter::once((address, value)))
}

/// Applies several substitutions in order on a single copy of `doc`.
///
/// Either every substitution succeeds or the error is returned and no
/// document is produced.
pub fn apply_all<'a, I>(doc: &Document, substitutions: I) -> Result<Applied, ResolveError>
where
    I: IntoIterator<Item = (&'a PathAddress, Node)>,
{
    let format = doc.format();
    let mut root = doc.clone().into_root();
    let mut warnings = Vec::new();
    for (address, value) in substitutions {
        if let Some(warning) = apply_in_place(&mut root, address, value)? {
            warnings.push(warning);
        }
    }
    Ok(Applied {
        document: Document::with_format(root, format),
        warnings,
    })
}

fn apply_in_place(
    root: &mut Node,
    address: &PathAddress,
    value: Node,
) -> Result<Option<CastWarning>, ResolveError> {
    let resolved = resolve_leaf(root, address)?;
    let found = resolved.value.kind();
    let expected = value.kind();
    let path = resolved.path;

    let warning = if found == expected {
        None
    } else if found.is_numeric() && expected.is_numeric() {
        warn!(
            address = %address,
            path = %path,
            from = %found,
            to = %expected,
            "numeric cross-cast during mutation"
        );
        Some(CastWarning {
            address: address.to_string(),
            path: path.to_string(),
            from: found,
            to: expected,
        })
    } else {
        return Err(ResolveError::TypeMismatch {
            address: address.to_string(),
            found,
            expected,
        });
    };

    let slot = root
        .get_at_mut(&path)
        .ok_or_else(|| ResolveError::PostconditionFailed {
            address: address.to_string(),
        })?;
    *slot = value.clone();

    let reread = resolve_leaf(root, address)?;
    if !same_leaf(reread.value, &value) || reread.path != path {
        return Err(ResolveError::PostconditionFailed {
            address: address.to_string(),
        });
    }
    Ok(warning)
}

fn same_leaf(written: &Node, expected: &Node) -> bool {
    match (written, expected) {
        (Node::Float(a), Node::Float(b)) if a.is_nan() && b.is_nan() => true,
        (a, b) => a == b,
    }
}
