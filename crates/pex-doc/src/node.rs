use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// A single node of a configuration document.
///
/// Maps keep their insertion order so a mutated document serializes with the
/// same key layout as the base document it was derived from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Node {
    /// Explicit null leaf.
    Null,
    /// Boolean leaf.
    Bool(bool),
    /// Integer leaf.
    Int(i64),
    /// Floating point leaf.
    Float(f64),
    /// String leaf.
    String(String),
    /// Ordered list of nodes.
    List(Vec<Node>),
    /// Ordered map from keys to nodes.
    Map(IndexMap<String, Node>),
}

/// Discriminant of a [`Node`], used for type checks during mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    /// [`Node::Null`].
    Null,
    /// [`Node::Bool`].
    Bool,
    /// [`Node::Int`].
    Int,
    /// [`Node::Float`].
    Float,
    /// [`Node::String`].
    String,
    /// [`Node::List`].
    List,
    /// [`Node::Map`].
    Map,
}

impl NodeKind {
    /// True for integer and floating point kinds.
    pub fn is_numeric(self) -> bool {
        matches!(self, NodeKind::Int | NodeKind::Float)
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            NodeKind::Null => "null",
            NodeKind::Bool => "bool",
            NodeKind::Int => "int",
            NodeKind::Float => "float",
            NodeKind::String => "string",
            NodeKind::List => "list",
            NodeKind::Map => "map",
        };
        f.write_str(label)
    }
}

/// One step of an absolute path into a document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PathStep {
    /// Map key.
    Key(String),
    /// List index.
    Index(usize),
}

/// Absolute location of a node, from the document root.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KeyPath(pub Vec<PathStep>);

impl KeyPath {
    /// Returns the steps making up the path.
    pub fn steps(&self) -> &[PathStep] {
        &self.0
    }

    pub(crate) fn joined(&self, tail: &KeyPath) -> KeyPath {
        let mut steps = self.0.clone();
        steps.extend(tail.0.iter().cloned());
        KeyPath(steps)
    }
}

impl fmt::Display for KeyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, step) in self.0.iter().enumerate() {
            match step {
                PathStep::Key(key) if idx == 0 => write!(f, "{key}")?,
                PathStep::Key(key) => write!(f, ".{key}")?,
                PathStep::Index(index) => write!(f, "[{index}]")?,
            }
        }
        Ok(())
    }
}

impl Node {
    /// Returns the discriminant of this node.
    pub fn kind(&self) -> NodeKind {
        match self {
            Node::Null => NodeKind::Null,
            Node::Bool(_) => NodeKind::Bool,
            Node::Int(_) => NodeKind::Int,
            Node::Float(_) => NodeKind::Float,
            Node::String(_) => NodeKind::String,
            Node::List(_) => NodeKind::List,
            Node::Map(_) => NodeKind::Map,
        }
    }

    /// True for scalar nodes (everything except lists and maps).
    pub fn is_leaf(&self) -> bool {
        !matches!(self, Node::List(_) | Node::Map(_))
    }

    /// Numeric view of integer and float leaves.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Node::Int(value) => Some(*value as f64),
            Node::Float(value) => Some(*value),
            _ => None,
        }
    }

    /// Follows an absolute path from this node.
    pub fn get_at(&self, path: &KeyPath) -> Option<&Node> {
        let mut current = self;
        for step in path.steps() {
            current = match (current, step) {
                (Node::Map(map), PathStep::Key(key)) => map.get(key)?,
                (Node::List(items), PathStep::Index(index)) => items.get(*index)?,
                _ => return None,
            };
        }
        Some(current)
    }

    /// Mutable variant of [`Node::get_at`].
    pub fn get_at_mut(&mut self, path: &KeyPath) -> Option<&mut Node> {
        let mut current = self;
        for step in path.steps() {
            current = match (current, step) {
                (Node::Map(map), PathStep::Key(key)) => map.get_mut(key)?,
                (Node::List(items), PathStep::Index(index)) => items.get_mut(*index)?,
                _ => return None,
            };
        }
        Some(current)
    }

    /// Parses a command line or predicate literal into a scalar node.
    ///
    /// `null`, `true`, `false`, integers and floats are recognised; a value in
    /// single or double quotes is always a string, as is anything else.
    pub fn parse_literal(text: &str) -> Node {
        let trimmed = text.trim();
        for quote in ['"', '\''] {
            if trimmed.len() >= 2 && trimmed.starts_with(quote) && trimmed.ends_with(quote) {
                return Node::String(trimmed[1..trimmed.len() - 1].to_string());
            }
        }
        match trimmed {
            "null" => return Node::Null,
            "true" => return Node::Bool(true),
            "false" => return Node::Bool(false),
            _ => {}
        }
        if let Ok(value) = trimmed.parse::<i64>() {
            return Node::Int(value);
        }
        if let Ok(value) = trimmed.parse::<f64>() {
            return Node::Float(value);
        }
        Node::String(trimmed.to_string())
    }

    /// Renders a leaf as plain text (strings without quotes), used for table cells.
    pub fn to_cell(&self) -> String {
        match self {
            Node::Null => String::new(),
            Node::Bool(value) => value.to_string(),
            Node::Int(value) => value.to_string(),
            Node::Float(value) => format_float(*value),
            Node::String(value) => value.clone(),
            other => serde_json::to_string(other).unwrap_or_default(),
        }
    }

    /// Equality used by list-selection predicates: numbers compare by value
    /// across int and float, strings compare against the literal text.
    pub(crate) fn loosely_equals(&self, literal: &Node, literal_text: &str) -> bool {
        match (self, literal) {
            (a, b) if a.kind().is_numeric() && b.kind().is_numeric() => a.as_f64() == b.as_f64(),
            (Node::String(value), Node::String(expected)) => value == expected,
            (Node::String(value), _) => value == literal_text.trim(),
            (a, b) => a == b,
        }
    }
}

fn format_float(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{value:.1}")
    } else {
        value.to_string()
    }
}

impl From<f64> for Node {
    fn from(value: f64) -> Self {
        Node::Float(value)
    }
}

impl From<i64> for Node {
    fn from(value: i64) -> Self {
        Node::Int(value)
    }
}

impl From<bool> for Node {
    fn from(value: bool) -> Self {
        Node::Bool(value)
    }
}

impl From<&str> for Node {
    fn from(value: &str) -> Self {
        Node::String(value.to_string())
    }
}

impl From<String> for Node {
    fn from(value: String) -> Self {
        Node::String(value)
    }
}
