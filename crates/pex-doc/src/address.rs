use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::ResolveError;
use crate::node::Node;

/// One segment of a [`PathAddress`].
#[derive(Debug, Clone, PartialEq)]
pub enum Segment {
    /// Breadth-first search for a key below the current node.
    Key(String),
    /// Select the unique list element whose `key` equals `value`.
    Select {
        /// Key looked up in each list element.
        key: String,
        /// Parsed comparison value.
        value: Node,
        /// Literal text as written in the address.
        literal: String,
    },
}

/// Parsed string address into a nested document.
///
/// Grammar: segments separated by `.`; a segment is either a plain key or a
/// list predicate `[key==value]`. A leading `.` makes the first key lookup
/// accept the first breadth-first match instead of requiring uniqueness.
/// `\.` escapes a dot that belongs to a key.
#[derive(Debug, Clone, PartialEq)]
pub struct PathAddress {
    raw: String,
    first_match: bool,
    segments: Vec<Segment>,
}

impl PathAddress {
    /// Parses an address string.
    pub fn parse(raw: &str) -> Result<Self, ResolveError> {
        let invalid = |reason: &str| ResolveError::InvalidAddress {
            address: raw.to_string(),
            reason: reason.to_string(),
        };
        let (first_match, body) = match raw.strip_prefix('.') {
            Some(rest) => (true, rest),
            None => (false, raw),
        };
        if body.is_empty() {
            return Err(invalid("address is empty"));
        }

        let mut segments = Vec::new();
        let mut current = String::new();
        let mut chars = body.chars().peekable();
        // Tracks whether the previous token ended with a `]` so `a.[k==v].b`
        // and `a[k==v].b` both parse without producing empty keys.
        let mut after_predicate = false;
        while let Some(ch) = chars.next() {
            match ch {
                '\\' => match chars.next() {
                    Some(escaped) => current.push(escaped),
                    None => return Err(invalid("dangling escape")),
                },
                '.' => {
                    if current.is_empty() {
                        if !after_predicate {
                            return Err(invalid("empty segment"));
                        }
                    } else {
                        segments.push(Segment::Key(std::mem::take(&mut current)));
                    }
                    after_predicate = false;
                    if chars.peek().is_none() {
                        return Err(invalid("trailing separator"));
                    }
                }
                '[' => {
                    if !current.is_empty() {
                        segments.push(Segment::Key(std::mem::take(&mut current)));
                    }
                    let mut predicate = String::new();
                    let mut closed = false;
                    for inner in chars.by_ref() {
                        if inner == ']' {
                            closed = true;
                            break;
                        }
                        predicate.push(inner);
                    }
                    if !closed {
                        return Err(invalid("unterminated predicate"));
                    }
                    segments.push(parse_predicate(&predicate).ok_or_else(|| {
                        invalid("predicate must have the form [key==value]")
                    })?);
                    after_predicate = true;
                }
                ']' => return Err(invalid("unexpected `]`")),
                other => {
                    if after_predicate {
                        return Err(invalid("missing `.` after predicate"));
                    }
                    current.push(other);
                }
            }
        }
        if !current.is_empty() {
            segments.push(Segment::Key(current));
        }
        if first_match && !matches!(segments.first(), Some(Segment::Key(_))) {
            return Err(invalid("a leading `.` must be followed by a key"));
        }
        Ok(Self {
            raw: raw.to_string(),
            first_match,
            segments,
        })
    }

    /// The address exactly as written.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Parsed segments in order.
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Whether the first key lookup accepts the first match.
    pub fn first_match(&self) -> bool {
        self.first_match
    }
}

fn parse_predicate(text: &str) -> Option<Segment> {
    let (key, literal) = text.split_once("==")?;
    let key = key.trim();
    if key.is_empty() || literal.trim().is_empty() {
        return None;
    }
    Some(Segment::Select {
        key: key.to_string(),
        value: Node::parse_literal(literal),
        literal: literal.trim().to_string(),
    })
}

impl fmt::Display for PathAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl FromStr for PathAddress {
    type Err = ResolveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PathAddress::parse(s)
    }
}

impl Serialize for PathAddress {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.raw)
    }
}

impl<'de> Deserialize<'de> for PathAddress {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        PathAddress::parse(&raw).map_err(serde::de::Error::custom)
    }
}
