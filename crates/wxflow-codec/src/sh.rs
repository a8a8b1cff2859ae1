//! Shell-style flat assignment codec.
//!
//! A single flat mapping of string keys to string values, tolerant of
//! comments, blank lines, and `export` prefixes on input. Serialization
//! emits `key=value` with no spaces around the `=`.

use crate::{Codec, CodecError, Format};
use wxflow_tree::{Mapping, Node};

/// The sh codec. Depth exactly 1.
pub struct ShCodec;

impl Codec for ShCodec {
    fn format(&self) -> Format {
        Format::Sh
    }

    fn parse(&self, text: &str) -> Result<Node, CodecError> {
        let mut map = Mapping::new();
        for (lineno, raw) in text.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let line = line.strip_prefix("export ").unwrap_or(line).trim_start();
            let Some((key, value)) = line.split_once('=') else {
                return Err(CodecError::parse(
                    "sh",
                    format!("line {}: expected 'key=value', got '{line}'", lineno + 1),
                ));
            };
            map.insert(key.trim().to_string(), Node::from(unquote(value.trim())));
        }
        Ok(Node::Map(map))
    }

    fn serialize(&self, tree: &Node, out: &mut String) -> Result<(), CodecError> {
        let map = tree
            .as_map()
            .ok_or_else(|| CodecError::serialize("sh", "top level must be a mapping"))?;
        for (key, value) in map {
            match value {
                Node::Map(_) | Node::Seq(_) => {
                    return Err(CodecError::serialize(
                        "sh",
                        format!("value '{key}' must be a scalar"),
                    ));
                }
                Node::Null => out.push_str(&format!("{key}=\n")),
                scalar => {
                    let repr = scalar.to_string();
                    if repr.chars().any(char::is_whitespace) {
                        out.push_str(&format!("{key}='{}'\n", repr.replace('\'', "'\\''")));
                    } else {
                        out.push_str(&format!("{key}={repr}\n"));
                    }
                }
            }
        }
        Ok(())
    }
}

/// Strip one level of matching surrounding quotes.
fn unquote(value: &str) -> &str {
    for quote in ['\'', '"'] {
        if value.len() >= 2 && value.starts_with(quote) && value.ends_with(quote) {
            return &value[1..value.len() - 1];
        }
    }
    value
}
