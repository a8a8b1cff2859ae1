//! The `Node` tree type and its accessors.

use indexmap::IndexMap;
use std::fmt;

/// Ordered string-keyed mapping of child nodes.
///
/// `IndexMap` preserves insertion order for iteration and serialization
/// while its `PartialEq` ignores order, which is exactly the equality the
/// configuration model needs.
pub type Mapping = IndexMap<String, Node>;

/// A node in a normalized configuration tree.
///
/// Every parsed configuration, regardless of source format, normalizes to
/// this shape: mappings from string keys, sequences, and scalars. Tagged
/// scalars carry a typed YAML tag and its raw string payload between parse
/// and dereference; after dereferencing they collapse to their coerced
/// value (or disappear, for `!remove`).
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Tagged(Tagged),
    Seq(Vec<Node>),
    Map(Mapping),
}

/// A typed YAML tag applied to a scalar leaf.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tag {
    Int,
    Float,
    Bool,
    Datetime,
    Remove,
    Glob,
}

impl Tag {
    /// The tag as written in YAML source, without the leading `!`.
    pub fn name(&self) -> &'static str {
        match self {
            Tag::Int => "int",
            Tag::Float => "float",
            Tag::Bool => "bool",
            Tag::Datetime => "datetime",
            Tag::Remove => "remove",
            Tag::Glob => "glob",
        }
    }

    /// Look up a tag by its YAML suffix (the part after `!`).
    pub fn from_suffix(suffix: &str) -> Option<Tag> {
        match suffix {
            "int" => Some(Tag::Int),
            "float" => Some(Tag::Float),
            "bool" => Some(Tag::Bool),
            "datetime" => Some(Tag::Datetime),
            "remove" => Some(Tag::Remove),
            "glob" => Some(Tag::Glob),
            _ => None,
        }
    }
}

/// A tagged scalar: tag plus raw (possibly template-bearing) payload.
#[derive(Debug, Clone, PartialEq)]
pub struct Tagged {
    pub tag: Tag,
    pub payload: String,
}

impl Tagged {
    pub fn new(tag: Tag, payload: impl Into<String>) -> Self {
        Self {
            tag,
            payload: payload.into(),
        }
    }
}

impl Node {
    /// An empty mapping node.
    pub fn map() -> Node {
        Node::Map(Mapping::new())
    }

    /// An empty sequence node.
    pub fn seq() -> Node {
        Node::Seq(Vec::new())
    }

    /// The depth of this tree: the length of the longest root-to-scalar
    /// path through nested mappings. Sequences are transparent and do not
    /// add depth; a leaf has depth 0 and `{a: 1}` has depth 1.
    pub fn depth(&self) -> usize {
        match self {
            Node::Map(m) => 1 + m.values().map(Node::depth).max().unwrap_or(0),
            Node::Seq(items) => items.iter().map(Node::depth).max().unwrap_or(0),
            _ => 0,
        }
    }

    /// A short type name for diagnostics ("mapping", "integer", ...).
    pub fn type_name(&self) -> &'static str {
        match self {
            Node::Null => "null",
            Node::Bool(_) => "boolean",
            Node::Int(_) => "integer",
            Node::Float(_) => "float",
            Node::Str(_) => "string",
            Node::Tagged(_) => "tagged",
            Node::Seq(_) => "sequence",
            Node::Map(_) => "mapping",
        }
    }

    pub fn is_map(&self) -> bool {
        matches!(self, Node::Map(_))
    }

    pub fn is_seq(&self) -> bool {
        matches!(self, Node::Seq(_))
    }

    /// True for every non-container node, tagged scalars included.
    pub fn is_scalar(&self) -> bool {
        !matches!(self, Node::Map(_) | Node::Seq(_))
    }

    pub fn as_map(&self) -> Option<&Mapping> {
        match self {
            Node::Map(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_map_mut(&mut self) -> Option<&mut Mapping> {
        match self {
            Node::Map(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_seq(&self) -> Option<&[Node]> {
        match self {
            Node::Seq(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Node::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Node::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Node::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Node::Float(f) => Some(*f),
            Node::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    /// Get a child of a mapping node by key.
    pub fn get(&self, key: &str) -> Option<&Node> {
        self.as_map().and_then(|m| m.get(key))
    }

    /// Insert into a mapping node. No-op on non-mapping nodes.
    pub fn insert(&mut self, key: impl Into<String>, value: Node) {
        if let Node::Map(m) = self {
            m.insert(key.into(), value);
        }
    }

    /// True iff this is a string leaf containing a templating marker
    /// (`{{` expression substitution or `{%` control block).
    pub fn is_template_bearing(&self) -> bool {
        match self {
            Node::Str(s) => contains_template_marker(s),
            Node::Tagged(t) => contains_template_marker(&t.payload),
            _ => false,
        }
    }
}

/// Whether a string contains either templating marker.
pub(crate) fn contains_template_marker(s: &str) -> bool {
    s.contains("{{") || s.contains("{%")
}

/// Format a float so that it round-trips as a float.
///
/// `format!("{}", 1.0)` yields `"1"`, which would re-parse as an integer;
/// integral values are forced to keep a decimal point.
pub fn fmt_float(f: f64) -> String {
    if f.is_finite() && f.fract() == 0.0 && f.abs() < 1e16 {
        format!("{f:.1}")
    } else {
        format!("{f}")
    }
}

impl fmt::Display for Node {
    /// Compact flow-style rendering, used in diff tables and log lines.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Node::Null => write!(f, "None"),
            Node::Bool(b) => write!(f, "{b}"),
            Node::Int(i) => write!(f, "{i}"),
            Node::Float(x) => write!(f, "{}", fmt_float(*x)),
            Node::Str(s) => write!(f, "{s}"),
            Node::Tagged(t) => write!(f, "!{} {}", t.tag.name(), t.payload),
            Node::Seq(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
            Node::Map(m) => {
                write!(f, "{{")?;
                for (i, (k, v)) in m.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{k}: {v}")?;
                }
                write!(f, "}}")
            }
        }
    }
}

impl From<bool> for Node {
    fn from(b: bool) -> Node {
        Node::Bool(b)
    }
}

impl From<i64> for Node {
    fn from(i: i64) -> Node {
        Node::Int(i)
    }
}

impl From<f64> for Node {
    fn from(f: f64) -> Node {
        Node::Float(f)
    }
}

impl From<&str> for Node {
    fn from(s: &str) -> Node {
        Node::Str(s.to_string())
    }
}

impl From<String> for Node {
    fn from(s: String) -> Node {
        Node::Str(s)
    }
}

impl<const N: usize> From<[(&str, Node); N]> for Node {
    fn from(entries: [(&str, Node); N]) -> Node {
        Node::Map(
            entries
                .into_iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect(),
        )
    }
}

impl From<Vec<Node>> for Node {
    fn from(items: Vec<Node>) -> Node {
        Node::Seq(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_depth() {
        assert_eq!(Node::from(1).depth(), 0);
        assert_eq!(Node::from([("a", Node::from(1))]).depth(), 1);
        assert_eq!(
            Node::from([("a", Node::from([("b", Node::from(1))]))]).depth(),
            2
        );
    }

    #[test]
    fn test_depth_ignores_sequences() {
        let tree = Node::from([(
            "a",
            Node::Seq(vec![Node::from([("b", Node::from(1))])]),
        )]);
        assert_eq!(tree.depth(), 2);
    }

    #[test]
    fn test_empty_map_depth() {
        assert_eq!(Node::map().depth(), 1);
    }

    #[test]
    fn test_equality_ignores_key_order() {
        let a = Node::from([("x", Node::from(1)), ("y", Node::from(2))]);
        let b = Node::from([("y", Node::from(2)), ("x", Node::from(1))]);
        assert_eq!(a, b);
    }

    #[test]
    fn test_template_bearing() {
        assert!(Node::from("{{ x }}").is_template_bearing());
        assert!(Node::from("{% if x %}y{% endif %}").is_template_bearing());
        assert!(!Node::from("plain").is_template_bearing());
        assert!(!Node::from(42).is_template_bearing());
    }

    #[test]
    fn test_fmt_float() {
        assert_eq!(fmt_float(1.0), "1.0");
        assert_eq!(fmt_float(2.5), "2.5");
        assert_eq!(fmt_float(-3.0), "-3.0");
    }

    #[test]
    fn test_display_flow_style() {
        let tree = Node::from([
            ("a", Node::from(1)),
            ("b", Node::Seq(vec![Node::from("x"), Node::Null])),
        ]);
        assert_eq!(tree.to_string(), "{a: 1, b: [x, None]}");
    }
}
