use std::fs;
use std::path::Path;

use pex_core::{ErrorInfo, PexError};
use serde::{Deserialize, Serialize};

use crate::address::PathAddress;
use crate::error::ResolveError;
use crate::node::Node;
use crate::resolve::{resolve, resolve_leaf, Resolved};

/// On-disk encoding of a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DocumentFormat {
    /// JSON (`.json` and anything unrecognised).
    #[default]
    Json,
    /// YAML (`.yaml`, `.yml`).
    Yaml,
}

impl DocumentFormat {
    /// Picks the format from a file extension.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("yaml") | Some("yml") => DocumentFormat::Yaml,
            _ => DocumentFormat::Json,
        }
    }
}

/// Immutable configuration document.
///
/// Mutation goes through [`crate::apply`], which always returns a new
/// document; a `Document` is never edited in place once loaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    root: Node,
    #[serde(default)]
    format: DocumentFormat,
}

impl Document {
    /// Wraps a node tree as a JSON document.
    pub fn new(root: Node) -> Self {
        Self {
            root,
            format: DocumentFormat::Json,
        }
    }

    /// Wraps a node tree with an explicit encoding.
    pub fn with_format(root: Node, format: DocumentFormat) -> Self {
        Self { root, format }
    }

    /// Root node of the document.
    pub fn root(&self) -> &Node {
        &self.root
    }

    /// Encoding used by [`Document::to_bytes`].
    pub fn format(&self) -> DocumentFormat {
        self.format
    }

    /// Parses document bytes in the given format.
    pub fn from_slice(bytes: &[u8], format: DocumentFormat) -> Result<Self, PexError> {
        let root: Node = match format {
            DocumentFormat::Json => serde_json::from_slice(bytes).map_err(|err| {
                PexError::Serde(ErrorInfo::new("document.json_parse", err.to_string()))
            })?,
            DocumentFormat::Yaml => serde_yaml::from_slice(bytes).map_err(|err| {
                PexError::Serde(ErrorInfo::new("document.yaml_parse", err.to_string()))
            })?,
        };
        Ok(Self { root, format })
    }

    /// Loads a document, choosing JSON or YAML by extension.
    pub fn load(path: &Path) -> Result<Self, PexError> {
        let bytes = fs::read(path).map_err(|err| PexError::io("document_read", path, err))?;
        Self::from_slice(&bytes, DocumentFormat::from_path(path)).map_err(|err| match err {
            PexError::Serde(info) => {
                PexError::Serde(info.with_context("path", path.display().to_string()))
            }
            other => other,
        })
    }

    /// Serializes the document in its own format (pretty JSON or YAML).
    pub fn to_bytes(&self) -> Result<Vec<u8>, PexError> {
        match self.format {
            DocumentFormat::Json => serde_json::to_vec_pretty(&self.root).map_err(|err| {
                PexError::Serde(ErrorInfo::new("document.json_write", err.to_string()))
            }),
            DocumentFormat::Yaml => serde_yaml::to_string(&self.root)
                .map(String::into_bytes)
                .map_err(|err| {
                    PexError::Serde(ErrorInfo::new("document.yaml_write", err.to_string()))
                }),
        }
    }

    /// Writes the document to `path`.
    pub fn save(&self, path: &Path) -> Result<(), PexError> {
        let bytes = self.to_bytes()?;
        fs::write(path, bytes).map_err(|err| PexError::io("document_write", path, err))
    }

    /// Resolves an address to any node kind.
    pub fn resolve(&self, address: &PathAddress) -> Result<Resolved<'_>, ResolveError> {
        resolve(&self.root, address)
    }

    /// Resolves an address that must point at a scalar leaf.
    pub fn resolve_leaf(&self, address: &PathAddress) -> Result<Resolved<'_>, ResolveError> {
        resolve_leaf(&self.root, address)
    }

    pub(crate) fn into_root(self) -> Node {
        self.root
    }
}
