#![deny(missing_docs)]
#![doc = "Configuration documents for pex: the `Node` tree, string path addresses, breadth-first resolution and type-checked mutation."]

/// Address grammar and parser.
pub mod address;
/// Document loading and serialization.
pub mod document;
/// Typed resolution and mutation failures.
pub mod error;
/// Leaf substitution with type checks.
pub mod mutate;
/// Node tree and absolute key-paths.
pub mod node;
/// Per-job substitutions applied after sampling.
pub mod post;
pub mod resolve;

pub use address::{PathAddress, Segment};
pub use document::{Document, DocumentFormat};
pub use error::ResolveError;
pub use mutate::{apply, apply_all, Applied, CastWarning};
pub use node::{KeyPath, Node, NodeKind, PathStep};
pub use post::{job_seed, JobContext, PostChange};
pub use resolve::{resolve, resolve_leaf, Resolved};
