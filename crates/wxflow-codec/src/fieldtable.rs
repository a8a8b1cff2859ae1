//! Field-table codec.
//!
//! A specialized serializer for the tracer field table consumed by model
//! physics: each outer key opens a quoted-identifier header line, plain
//! properties emit as `"key", "value"` pairs, mapping-valued properties
//! expand to method lines with their attributes flattened to `k=v`
//! strings, and each block's final line is terminated with ` /`.
//!
//! Inputs to this codec arrive via YAML, so parsing delegates to the YAML
//! parser; the depth-3 constraint is enforced by the config layer.

use crate::{Codec, CodecError, Format, yaml};
use wxflow_tree::{Node, fmt_float};

/// The field-table codec. Depth exactly 3.
pub struct FieldTableCodec;

impl Codec for FieldTableCodec {
    fn format(&self) -> Format {
        Format::FieldTable
    }

    fn parse(&self, text: &str) -> Result<Node, CodecError> {
        yaml::parse(text)
    }

    fn serialize(&self, tree: &Node, out: &mut String) -> Result<(), CodecError> {
        let tracers = tree
            .as_map()
            .ok_or_else(|| CodecError::serialize("fieldtable", "top level must be a mapping"))?;

        for (tracer, properties) in tracers {
            let properties = properties.as_map().ok_or_else(|| {
                CodecError::serialize(
                    "fieldtable",
                    format!("tracer '{tracer}' must be a mapping of properties"),
                )
            })?;

            let mut lines = vec![format!(" \"TRACER\", \"atmos_mod\", \"{tracer}\"")];
            for (key, value) in properties {
                match value {
                    Node::Map(attrs) => {
                        // Method line: the 'name' attribute identifies the
                        // method, the rest flatten to k=v strings.
                        let name = attrs
                            .get("name")
                            .map(scalar_text)
                            .ok_or_else(|| {
                                CodecError::serialize(
                                    "fieldtable",
                                    format!("method '{tracer}.{key}' is missing a 'name'"),
                                )
                            })?;
                        let mut line = format!("{:11}\"{key}\", \"{name}\"", "");
                        let attrs: Vec<String> = attrs
                            .iter()
                            .filter(|(k, _)| k.as_str() != "name")
                            .map(|(k, v)| format!("{k}={}", scalar_text(v)))
                            .collect();
                        if !attrs.is_empty() {
                            line.push_str(&format!(", \"{}\"", attrs.join(", ")));
                        }
                        lines.push(line);
                    }
                    Node::Seq(_) => {
                        return Err(CodecError::serialize(
                            "fieldtable",
                            format!("property '{tracer}.{key}' must be scalar or mapping"),
                        ));
                    }
                    scalar => {
                        lines.push(format!("{:11}\"{key}\", \"{}\"", "", scalar_text(scalar)));
                    }
                }
            }
            if let Some(last) = lines.last_mut() {
                last.push_str(" /");
            }
            for line in lines {
                out.push_str(&line);
                out.push('\n');
            }
        }
        Ok(())
    }
}

fn scalar_text(node: &Node) -> String {
    match node {
        Node::Float(f) => fmt_float(*f),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec_for;

    #[test]
    fn test_serialize_block_shape() {
        let tree = Node::from([(
            "sphum",
            Node::from([
                ("longname", Node::from("specific humidity")),
                ("units", Node::from("kg/kg")),
                (
                    "profile_type",
                    Node::from([
                        ("name", Node::from("fixed")),
                        ("surface_value", Node::Float(3e-6)),
                    ]),
                ),
            ]),
        )]);
        let text = codec_for(Format::FieldTable).to_text(&tree).unwrap();
        let expected = concat!(
            " \"TRACER\", \"atmos_mod\", \"sphum\"\n",
            "           \"longname\", \"specific humidity\"\n",
            "           \"units\", \"kg/kg\"\n",
            "           \"profile_type\", \"fixed\", \"surface_value=0.000003\" /\n",
        );
        assert_eq!(text, expected);
    }

    #[test]
    fn test_parse_accepts_yaml() {
        let tree = codec_for(Format::FieldTable)
            .parse("sphum:\n  units: kg/kg\n")
            .unwrap();
        assert_eq!(
            tree.get("sphum").unwrap().get("units"),
            Some(&Node::from("kg/kg"))
        );
    }

    #[test]
    fn test_method_without_name_rejected() {
        let tree = Node::from([(
            "t",
            Node::from([("profile_type", Node::from([("x", Node::from(1))]))]),
        )]);
        assert!(codec_for(Format::FieldTable).to_text(&tree).is_err());
    }

    #[test]
    fn test_multiple_tracers_each_terminated() {
        let tree = Node::from([
            ("a", Node::from([("units", Node::from("K"))])),
            ("b", Node::from([("units", Node::from("m"))])),
        ]);
        let text = codec_for(Format::FieldTable).to_text(&tree).unwrap();
        assert_eq!(text.matches(" /\n").count(), 2);
    }
}
