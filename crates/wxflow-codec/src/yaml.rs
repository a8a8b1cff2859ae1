//! YAML codec: event-stream parsing into `Node` trees and a block-style
//! emitter.
//!
//! Parsing is built on `yaml-rust2`'s marked event stream rather than its
//! DOM so that tags can be intercepted as they appear: `!INCLUDE` on a
//! sequence normalizes to the canonical include-directive string, the
//! typed tags (`!int`, `!float`, `!bool`, `!datetime`, `!remove`, `!glob`)
//! become [`Tagged`] scalars for the dereferencer to resolve, and any
//! other local tag is rejected as an unregistered constructor.

use std::collections::BTreeMap;

use crate::{Codec, CodecError, Format};
use wxflow_tree::{Mapping, Node, Tag, Tagged, fmt_float};
use yaml_rust2::parser::{Event, MarkedEventReceiver, Parser, Tag as YamlTag};
use yaml_rust2::scanner::{Marker, TScalarStyle};

/// The YAML codec. Depth-unbounded.
pub struct YamlCodec;

impl Codec for YamlCodec {
    fn format(&self) -> Format {
        Format::Yaml
    }

    fn parse(&self, text: &str) -> Result<Node, CodecError> {
        parse(text)
    }

    fn serialize(&self, tree: &Node, out: &mut String) -> Result<(), CodecError> {
        for line in node_lines(tree, 0) {
            out.push_str(&line);
            out.push('\n');
        }
        Ok(())
    }
}

/// Parse a single YAML document into a tree.
///
/// An empty document yields an empty mapping.
pub fn parse(text: &str) -> Result<Node, CodecError> {
    if text.trim().is_empty() {
        return Ok(Node::map());
    }

    let mut parser = Parser::new_from_str(text);
    let mut builder = NodeBuilder::new();

    parser.load(&mut builder, false).map_err(|e| {
        // Builder-detected errors (bad tags, composite keys) abort the
        // event stream; prefer their diagnostics over the scanner's.
        builder
            .error
            .take()
            .unwrap_or_else(|| CodecError::parse("yaml", e.to_string()))
    })?;

    builder.result()
}

/// Infer the YAML scalar type of a rendered string.
///
/// This is both the parser's plain-scalar typing and the dereferencer's
/// reifier: a string that reads as an integer, float, boolean, or null
/// becomes that scalar, anything else stays a string.
pub fn scalar_from_str(value: &str) -> Node {
    if let Ok(i) = value.parse::<i64>() {
        return Node::Int(i);
    }

    if value.bytes().any(|b| b.is_ascii_digit())
        && let Ok(f) = value.parse::<f64>()
    {
        return Node::Float(f);
    }

    match value {
        "true" | "True" | "TRUE" => return Node::Bool(true),
        "false" | "False" | "FALSE" => return Node::Bool(false),
        "null" | "Null" | "NULL" | "~" | "" => return Node::Null,
        _ => {}
    }

    Node::Str(value.to_string())
}

/// A node under construction during the event walk.
enum BuildNode {
    Sequence {
        items: Vec<Node>,
        /// Set when the sequence carries the `!INCLUDE` tag.
        include: bool,
        anchor: usize,
    },
    Mapping {
        entries: Vec<(Node, Option<Node>)>,
        anchor: usize,
    },
}

/// Event receiver that assembles `Node` trees.
///
/// `MarkedEventReceiver::on_event` cannot return errors, so failures are
/// parked in `error` and the rest of the stream is ignored; `parse`
/// surfaces them after the load aborts.
struct NodeBuilder {
    stack: Vec<BuildNode>,
    root: Option<Node>,
    error: Option<CodecError>,
    /// Completed nodes by anchor id, replayed when an alias names them.
    anchors: BTreeMap<usize, Node>,
}

impl NodeBuilder {
    fn new() -> Self {
        Self {
            stack: Vec::new(),
            root: None,
            error: None,
            anchors: BTreeMap::new(),
        }
    }

    fn result(self) -> Result<Node, CodecError> {
        if let Some(err) = self.error {
            return Err(err);
        }
        self.root
            .ok_or_else(|| CodecError::parse("yaml", "no YAML document found"))
    }

    fn fail(&mut self, err: CodecError) {
        if self.error.is_none() {
            self.error = Some(err);
        }
    }

    fn record_anchor(&mut self, anchor: usize, node: &Node) {
        // Anchor id 0 means the node carried no anchor.
        if anchor > 0 {
            self.anchors.insert(anchor, node.clone());
        }
    }

    fn push_complete(&mut self, node: Node) {
        match self.stack.last_mut() {
            None => self.root = Some(node),
            Some(BuildNode::Sequence { items, .. }) => items.push(node),
            Some(BuildNode::Mapping { entries, .. }) => match entries.last_mut() {
                Some((_, slot @ None)) => *slot = Some(node),
                _ => entries.push((node, None)),
            },
        }
    }

    fn scalar_node(
        &mut self,
        value: String,
        style: TScalarStyle,
        tag: Option<&YamlTag>,
    ) -> Option<Node> {
        if let Some(t) = tag {
            if t.handle == "tag:yaml.org,2002:" {
                return Some(core_schema_scalar(&value, &t.suffix));
            }
            return match t.suffix.as_str() {
                "INCLUDE" => Some(Node::Str(format!("!INCLUDE [{value}]"))),
                suffix => match Tag::from_suffix(suffix) {
                    Some(tag) => Some(Node::Tagged(Tagged::new(tag, value))),
                    None => {
                        self.fail(CodecError::UnregisteredConstructor {
                            tag: suffix.to_string(),
                        });
                        None
                    }
                },
            };
        }

        Some(match style {
            TScalarStyle::Plain => scalar_from_str(&value),
            _ => Node::Str(value),
        })
    }
}

/// Resolve an explicit `tag:yaml.org,2002:*` tag on a scalar.
fn core_schema_scalar(value: &str, suffix: &str) -> Node {
    match suffix {
        "str" => Node::Str(value.to_string()),
        "null" => Node::Null,
        "int" | "float" | "bool" => scalar_from_str(value),
        _ => Node::Str(value.to_string()),
    }
}

impl MarkedEventReceiver for NodeBuilder {
    fn on_event(&mut self, ev: Event, marker: Marker) {
        if self.error.is_some() {
            return;
        }

        match ev {
            Event::Nothing
            | Event::StreamStart
            | Event::StreamEnd
            | Event::DocumentStart
            | Event::DocumentEnd => {}

            Event::Scalar(value, style, anchor_id, tag) => {
                if let Some(node) = self.scalar_node(value, style, tag.as_ref()) {
                    self.record_anchor(anchor_id, &node);
                    self.push_complete(node);
                }
            }

            Event::SequenceStart(anchor_id, tag) => {
                let mut include = false;
                if let Some(t) = tag.as_ref()
                    && t.handle != "tag:yaml.org,2002:"
                {
                    if t.suffix == "INCLUDE" {
                        include = true;
                    } else {
                        self.fail(CodecError::UnregisteredConstructor {
                            tag: t.suffix.clone(),
                        });
                        return;
                    }
                }
                self.stack.push(BuildNode::Sequence {
                    items: Vec::new(),
                    include,
                    anchor: anchor_id,
                });
            }

            Event::SequenceEnd => {
                let Some(BuildNode::Sequence {
                    items,
                    include,
                    anchor,
                }) = self.stack.pop()
                else {
                    self.fail(CodecError::parse(
                        "yaml",
                        format!("unbalanced sequence end at line {}", marker.line()),
                    ));
                    return;
                };
                let node = if include {
                    let paths: Vec<String> = items.iter().map(Node::to_string).collect();
                    Node::Str(format!("!INCLUDE [{}]", paths.join(", ")))
                } else {
                    Node::Seq(items)
                };
                self.record_anchor(anchor, &node);
                self.push_complete(node);
            }

            Event::MappingStart(anchor_id, tag) => {
                if let Some(t) = tag.as_ref()
                    && t.handle != "tag:yaml.org,2002:"
                {
                    self.fail(CodecError::UnregisteredConstructor {
                        tag: t.suffix.clone(),
                    });
                    return;
                }
                self.stack.push(BuildNode::Mapping {
                    entries: Vec::new(),
                    anchor: anchor_id,
                });
            }

            Event::MappingEnd => {
                let Some(BuildNode::Mapping { entries, anchor }) = self.stack.pop() else {
                    self.fail(CodecError::parse(
                        "yaml",
                        format!("unbalanced mapping end at line {}", marker.line()),
                    ));
                    return;
                };

                let mut map = Mapping::new();
                for (key, value) in entries {
                    if !key.is_scalar() {
                        self.fail(CodecError::UnhashableValue {
                            message: format!(
                                "key {} near line {}",
                                key,
                                marker.line()
                            ),
                        });
                        return;
                    }
                    let value = value.unwrap_or(Node::Null);
                    map.insert(key.to_string(), value);
                }
                let node = Node::Map(map);
                self.record_anchor(anchor, &node);
                self.push_complete(node);
            }

            Event::Alias(anchor_id) => match self.anchors.get(&anchor_id) {
                Some(node) => {
                    let node = node.clone();
                    self.push_complete(node);
                }
                // The scanner resolves alias names, so this only fires
                // for an alias inside its own anchored collection.
                None => self.fail(CodecError::parse(
                    "yaml",
                    format!("cannot resolve alias at line {}", marker.line()),
                )),
            },
        }
    }
}

// --- serialization ---------------------------------------------------------

const INDENT: &str = "  ";

fn node_lines(node: &Node, indent: usize) -> Vec<String> {
    match node {
        Node::Map(m) if !m.is_empty() => map_lines(m, indent),
        Node::Seq(items) if !items.is_empty() => seq_lines(items, indent),
        leaf => vec![format!("{}{}", INDENT.repeat(indent), scalar_repr(leaf))],
    }
}

fn map_lines(m: &Mapping, indent: usize) -> Vec<String> {
    let pad = INDENT.repeat(indent);
    let mut lines = Vec::new();
    for (key, value) in m {
        let key_repr = string_repr(key);
        match value {
            Node::Map(child) if !child.is_empty() => {
                lines.push(format!("{pad}{key_repr}:"));
                lines.extend(map_lines(child, indent + 1));
            }
            Node::Seq(items) if !items.is_empty() => {
                lines.push(format!("{pad}{key_repr}:"));
                lines.extend(seq_lines(items, indent + 1));
            }
            leaf => lines.push(format!("{pad}{key_repr}: {}", scalar_repr(leaf))),
        }
    }
    lines
}

fn seq_lines(items: &[Node], indent: usize) -> Vec<String> {
    let pad = INDENT.repeat(indent);
    let mut lines = Vec::new();
    for item in items {
        match item {
            Node::Map(m) if !m.is_empty() => {
                // Render the mapping one level deeper, then fold the dash
                // into its first line's indentation.
                let mut inner = map_lines(m, indent + 1);
                inner[0].replace_range(..pad.len() + INDENT.len(), &format!("{pad}- "));
                lines.extend(inner);
            }
            Node::Seq(nested) if !nested.is_empty() => {
                lines.push(format!("{pad}-"));
                lines.extend(seq_lines(nested, indent + 1));
            }
            leaf => lines.push(format!("{pad}- {}", scalar_repr(leaf))),
        }
    }
    lines
}

fn scalar_repr(node: &Node) -> String {
    match node {
        Node::Null => "null".to_string(),
        Node::Bool(b) => b.to_string(),
        Node::Int(i) => i.to_string(),
        Node::Float(f) => fmt_float(*f),
        Node::Str(s) => string_repr(s),
        Node::Tagged(t) => format!("!{} {}", t.tag.name(), quote_single(&t.payload)),
        Node::Map(_) => "{}".to_string(),
        Node::Seq(_) => "[]".to_string(),
    }
}

/// Render a string scalar, quoting only when a plain scalar would be
/// ambiguous or ill-formed.
fn string_repr(s: &str) -> String {
    if s.contains('\n') {
        return quote_double(s);
    }
    if needs_quotes(s) {
        return quote_single(s);
    }
    s.to_string()
}

fn needs_quotes(s: &str) -> bool {
    if s.is_empty() {
        return true;
    }
    // Would re-parse as a non-string scalar.
    if !matches!(scalar_from_str(s), Node::Str(_)) {
        return true;
    }
    if s.starts_with(char::is_whitespace) || s.ends_with(char::is_whitespace) {
        return true;
    }
    let first = s.chars().next().unwrap_or(' ');
    if "!&*?|>%@`\"'#{}[],-".contains(first) {
        return true;
    }
    s.contains(": ")
        || s.ends_with(':')
        || s.contains(" #")
        || s.contains("{{")
        || s.contains("{%")
}

fn quote_single(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

fn quote_double(s: &str) -> String {
    format!(
        "\"{}\"",
        s.replace('\\', "\\\\")
            .replace('"', "\\\"")
            .replace('\n', "\\n")
    )
}
