use pex_core::{ErrorInfo, PexError};
use thiserror::Error;

use crate::node::NodeKind;

/// Failures raised while parsing addresses, resolving them, or mutating documents.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    /// The address string does not follow the address grammar.
    #[error("invalid address `{address}`: {reason}")]
    InvalidAddress {
        /// Offending address.
        address: String,
        /// What is wrong with it.
        reason: String,
    },
    /// No location matches a segment of the address.
    #[error("address `{address}` not found: no match for `{segment}` under `{scope}`")]
    NotFound {
        /// Offending address.
        address: String,
        /// Segment that failed to match.
        segment: String,
        /// Absolute path the search was rooted at.
        scope: String,
    },
    /// More than one location matches where uniqueness is required.
    #[error("address `{address}` is ambiguous: `{segment}` matches {}", candidates.join(", "))]
    AmbiguousKey {
        /// Offending address.
        address: String,
        /// Segment with several matches.
        segment: String,
        /// Absolute paths of the competing matches.
        candidates: Vec<String>,
    },
    /// A scalar was required but the address resolves to a subtree.
    #[error("address `{address}` resolves to a {kind} at `{path}`, not a leaf")]
    NotALeaf {
        /// Offending address.
        address: String,
        /// Absolute path of the resolved node.
        path: String,
        /// Kind of the resolved node.
        kind: NodeKind,
    },
    /// The replacement value has a different type than the existing leaf.
    #[error("cannot replace {found} at `{address}` with a {expected} value")]
    TypeMismatch {
        /// Offending address.
        address: String,
        /// Kind of the existing leaf.
        found: NodeKind,
        /// Kind of the rejected replacement.
        expected: NodeKind,
    },
    /// Re-resolving the address after mutation did not return the new value.
    #[error("address `{address}` does not resolve to the written value after mutation")]
    PostconditionFailed {
        /// Offending address.
        address: String,
    },
}

impl ResolveError {
    /// Stable code used when converting into [`PexError`].
    pub fn code(&self) -> &'static str {
        match self {
            ResolveError::InvalidAddress { .. } => "path.invalid_address",
            ResolveError::NotFound { .. } => "path.not_found",
            ResolveError::AmbiguousKey { .. } => "path.ambiguous_key",
            ResolveError::NotALeaf { .. } => "path.not_a_leaf",
            ResolveError::TypeMismatch { .. } => "mutation.type_mismatch",
            ResolveError::PostconditionFailed { .. } => "mutation.postcondition",
        }
    }

    fn address(&self) -> &str {
        match self {
            ResolveError::InvalidAddress { address, .. }
            | ResolveError::NotFound { address, .. }
            | ResolveError::AmbiguousKey { address, .. }
            | ResolveError::NotALeaf { address, .. }
            | ResolveError::TypeMismatch { address, .. }
            | ResolveError::PostconditionFailed { address } => address,
        }
    }
}

impl From<ResolveError> for PexError {
    fn from(err: ResolveError) -> Self {
        let info = ErrorInfo::new(err.code(), err.to_string()).with_context("address", err.address());
        match err {
            ResolveError::TypeMismatch { .. } | ResolveError::PostconditionFailed { .. } => {
                PexError::Mutation(info)
            }
            ResolveError::AmbiguousKey { .. } => PexError::Path(
                info.with_hint("qualify the key with a parent segment or a [key==value] predicate"),
            ),
            _ => PexError::Path(info),
        }
    }
}
