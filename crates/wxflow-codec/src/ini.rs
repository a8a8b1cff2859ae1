//! Sectioned `key = value` codec.
//!
//! All values are strings. A source with no `[section]` header is treated
//! as the body of a single synthesized section named `top`.

use crate::{Codec, CodecError, Format};
use wxflow_tree::{Mapping, Node};

/// Name given to the synthesized section of a headerless source.
pub const TOP_SECTION: &str = "top";

/// The ini codec. Depth exactly 2.
pub struct IniCodec;

impl Codec for IniCodec {
    fn format(&self) -> Format {
        Format::Ini
    }

    fn parse(&self, text: &str) -> Result<Node, CodecError> {
        let mut sections = Mapping::new();
        let mut current: Option<String> = None;

        for (lineno, raw) in text.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with(';') || line.starts_with('#') {
                continue;
            }
            if let Some(name) = line.strip_prefix('[') {
                let name = name.strip_suffix(']').ok_or_else(|| {
                    CodecError::parse("ini", format!("line {}: unclosed section header", lineno + 1))
                })?;
                let name = name.trim().to_string();
                sections.entry(name.clone()).or_insert_with(Node::map);
                current = Some(name);
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                return Err(CodecError::parse(
                    "ini",
                    format!("line {}: expected 'key = value', got '{line}'", lineno + 1),
                ));
            };
            let section = current.get_or_insert_with(|| {
                sections.insert(TOP_SECTION.to_string(), Node::map());
                TOP_SECTION.to_string()
            });
            if let Some(body) = sections.get_mut(section) {
                body.insert(key.trim(), Node::from(value.trim()));
            }
        }

        Ok(Node::Map(sections))
    }

    fn serialize(&self, tree: &Node, out: &mut String) -> Result<(), CodecError> {
        let sections = tree
            .as_map()
            .ok_or_else(|| CodecError::serialize("ini", "top level must be a mapping"))?;
        for (name, body) in sections {
            let entries = body.as_map().ok_or_else(|| {
                CodecError::serialize("ini", format!("section '{name}' must be a mapping"))
            })?;
            out.push_str(&format!("[{name}]\n"));
            for (key, value) in entries {
                match value {
                    Node::Map(_) | Node::Seq(_) => {
                        return Err(CodecError::serialize(
                            "ini",
                            format!("value '{name}.{key}' must be a scalar"),
                        ));
                    }
                    Node::Null => out.push_str(&format!("{key} =\n")),
                    scalar => out.push_str(&format!("{key} = {scalar}\n")),
                }
            }
        }
        Ok(())
    }
}
