//! # wxflow-codec
//!
//! Format codecs for wxflow: each supported configuration format pairs a
//! parser (textual stream to normalized [`Node`] tree) with a serializer
//! (tree back to the format's canonical text), and declares the maximum
//! mapping depth the format can legally represent.
//!
//! Codecs are selected through a closed dispatch table keyed by
//! [`Format`]; higher layers never reach for a concrete codec type.
//!
//! ```rust
//! use wxflow_codec::{Format, codec_for};
//!
//! let codec = codec_for(Format::Yaml);
//! let tree = codec.parse("a: 1\nb: two\n").unwrap();
//! assert_eq!(tree.get("a").and_then(|n| n.as_int()), Some(1));
//! ```

mod error;
mod fieldtable;
mod ini;
mod nml;
mod sh;
pub mod yaml;

pub use error::CodecError;
pub use fieldtable::FieldTableCodec;
pub use ini::IniCodec;
pub use nml::NmlCodec;
pub use sh::ShCodec;
pub use yaml::YamlCodec;

use std::fmt;
use std::path::Path;
use std::str::FromStr;
use wxflow_tree::Node;

/// The supported configuration formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Format {
    Yaml,
    Nml,
    Ini,
    Sh,
    FieldTable,
}

impl Format {
    /// The format's name tag as used on command lines and in messages.
    pub fn name(self) -> &'static str {
        match self {
            Format::Yaml => "yaml",
            Format::Nml => "nml",
            Format::Ini => "ini",
            Format::Sh => "sh",
            Format::FieldTable => "fieldtable",
        }
    }

    /// The maximum legal mapping depth, or `None` when unbounded.
    pub fn max_depth(self) -> Option<usize> {
        match self {
            Format::Yaml => None,
            Format::Nml | Format::Ini => Some(2),
            Format::Sh => Some(1),
            Format::FieldTable => Some(3),
        }
    }

    /// Guess a format from a file extension. Streamed sources have no
    /// extension and must name their format explicitly.
    pub fn from_ext(path: &Path) -> Option<Format> {
        match path.extension()?.to_str()? {
            "yaml" | "yml" => Some(Format::Yaml),
            "nml" => Some(Format::Nml),
            "ini" | "cfg" => Some(Format::Ini),
            "sh" | "bash" => Some(Format::Sh),
            _ => None,
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A format name that matches none of the supported codecs.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown config format: {0}")]
pub struct UnknownFormat(pub String);

impl FromStr for Format {
    type Err = UnknownFormat;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "yaml" => Ok(Format::Yaml),
            "nml" => Ok(Format::Nml),
            "ini" => Ok(Format::Ini),
            "sh" => Ok(Format::Sh),
            "fieldtable" => Ok(Format::FieldTable),
            other => Err(UnknownFormat(other.to_string())),
        }
    }
}

/// A parse/serialize pair plus depth constraint for one format.
pub trait Codec: Sync {
    /// The format this codec handles.
    fn format(&self) -> Format;

    /// The format's maximum legal mapping depth, `None` when unbounded.
    fn max_depth(&self) -> Option<usize> {
        self.format().max_depth()
    }

    /// Parse a textual source into a normalized tree.
    ///
    /// # Errors
    ///
    /// Returns a parse error when the source is not well-formed for this
    /// format; the YAML codec additionally reports unregistered
    /// constructors and unhashable mapping keys.
    fn parse(&self, text: &str) -> Result<Node, CodecError>;

    /// Write a tree to a text sink in the codec's canonical form.
    ///
    /// # Errors
    ///
    /// Fails when the tree's shape cannot be expressed in this format.
    fn serialize(&self, tree: &Node, out: &mut String) -> Result<(), CodecError>;

    /// Serialize to a fresh string.
    fn to_text(&self, tree: &Node) -> Result<String, CodecError> {
        let mut out = String::new();
        self.serialize(tree, &mut out)?;
        Ok(out)
    }
}

/// Dispatch table over the closed variant set of formats.
pub fn codec_for(format: Format) -> &'static dyn Codec {
    match format {
        Format::Yaml => &YamlCodec,
        Format::Nml => &NmlCodec,
        Format::Ini => &IniCodec,
        Format::Sh => &ShCodec,
        Format::FieldTable => &FieldTableCodec,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_from_ext() {
        assert_eq!(Format::from_ext(Path::new("a.yml")), Some(Format::Yaml));
        assert_eq!(Format::from_ext(Path::new("b.nml")), Some(Format::Nml));
        assert_eq!(Format::from_ext(Path::new("c.cfg")), Some(Format::Ini));
        assert_eq!(Format::from_ext(Path::new("d.bash")), Some(Format::Sh));
        assert_eq!(Format::from_ext(Path::new("e.txt")), None);
        assert_eq!(Format::from_ext(Path::new("noext")), None);
    }

    #[test]
    fn test_format_from_str() {
        assert_eq!("fieldtable".parse::<Format>(), Ok(Format::FieldTable));
        assert!("toml".parse::<Format>().is_err());
    }

    #[test]
    fn test_max_depths() {
        assert_eq!(Format::Yaml.max_depth(), None);
        assert_eq!(Format::Nml.max_depth(), Some(2));
        assert_eq!(Format::Ini.max_depth(), Some(2));
        assert_eq!(Format::Sh.max_depth(), Some(1));
        assert_eq!(Format::FieldTable.max_depth(), Some(3));
    }

    #[test]
    fn test_dispatch_agrees_with_format() {
        for format in [
            Format::Yaml,
            Format::Nml,
            Format::Ini,
            Format::Sh,
            Format::FieldTable,
        ] {
            assert_eq!(codec_for(format).format(), format);
        }
    }
}
