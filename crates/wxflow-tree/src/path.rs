//! Dotted key-paths for navigating trees.

use crate::Node;
use std::fmt;
use thiserror::Error;

/// A key-path failed to resolve in a tree.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Bad config path: {path}")]
pub struct PathError {
    /// The longest prefix of the requested path that failed.
    pub path: String,
}

/// A dotted navigation string identifying a node within a tree.
///
/// `a.b.c` names the value reached by descending through mapping keys
/// `a`, `b`, then `c`.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct KeyPath {
    segments: Vec<String>,
}

impl KeyPath {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a dotted path. Empty input yields the root path.
    pub fn parse(s: &str) -> Self {
        if s.is_empty() {
            return Self::new();
        }
        Self {
            segments: s.split('.').map(str::to_string).collect(),
        }
    }

    pub fn from_segments(segments: Vec<String>) -> Self {
        Self { segments }
    }

    pub fn push(&mut self, segment: impl Into<String>) {
        self.segments.push(segment.into());
    }

    pub fn pop(&mut self) -> Option<String> {
        self.segments.pop()
    }

    /// A copy of this path with one more segment.
    pub fn child(&self, segment: impl Into<String>) -> KeyPath {
        let mut path = self.clone();
        path.push(segment);
        path
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// Descend through `tree` along this path.
    ///
    /// # Errors
    ///
    /// Returns a [`PathError`] naming the longest failing prefix when a
    /// segment is missing or lands on a non-mapping node.
    pub fn descend<'a>(&self, tree: &'a Node) -> Result<&'a Node, PathError> {
        let mut current = tree;
        for (i, segment) in self.segments.iter().enumerate() {
            current = match current.get(segment) {
                Some(child) => child,
                None => {
                    return Err(PathError {
                        path: self.segments[..=i].join("."),
                    });
                }
            };
        }
        Ok(current)
    }
}

impl fmt::Display for KeyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.segments.join("."))
    }
}

impl From<&str> for KeyPath {
    fn from(s: &str) -> Self {
        KeyPath::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree() -> Node {
        Node::from([(
            "a",
            Node::from([("b", Node::from([("c", Node::from(42))]))]),
        )])
    }

    #[test]
    fn test_descend() {
        let t = tree();
        let node = KeyPath::parse("a.b.c").descend(&t).unwrap();
        assert_eq!(node, &Node::from(42));
    }

    #[test]
    fn test_descend_root() {
        let t = tree();
        assert_eq!(KeyPath::new().descend(&t).unwrap(), &t);
    }

    #[test]
    fn test_descend_missing_reports_failing_prefix() {
        let t = tree();
        let err = KeyPath::parse("a.x.c").descend(&t).unwrap_err();
        assert_eq!(err.path, "a.x");
    }

    #[test]
    fn test_descend_through_scalar_fails() {
        let t = tree();
        let err = KeyPath::parse("a.b.c.d").descend(&t).unwrap_err();
        assert_eq!(err.path, "a.b.c.d");
    }

    #[test]
    fn test_display() {
        assert_eq!(KeyPath::parse("a.b").to_string(), "a.b");
        assert_eq!(KeyPath::new().to_string(), "");
    }
}
