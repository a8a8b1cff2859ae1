//! Error kinds for the config layer.

use std::path::PathBuf;

use thiserror::Error;

use wxflow_codec::{CodecError, Format, UnknownFormat};
use wxflow_template::TemplateError;
use wxflow_tree::PathError;
use wxflow_validation::SchemaError;

/// Everything that can go wrong between reading a source and writing a
/// realized config. Each variant is a distinct, catchable category;
/// codec- and template-level kinds are nested rather than flattened so
/// callers can still match on them.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Parse errors, unregistered constructors, unhashable values, and
    /// serialization failures from a codec
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// Template parse errors and unregistered filters
    #[error(transparent)]
    Template(#[from] TemplateError),

    /// Tree depth incompatible with the codec at construction
    #[error("Cannot instantiate depth-{expected} {format} config with depth-{actual} tree")]
    DepthMismatch {
        format: Format,
        expected: usize,
        actual: usize,
    },

    /// Relative include from a stream, or an include target that cannot
    /// be loaded
    #[error("Bad include: {message}")]
    BadInclude { message: String },

    /// A key-path that does not resolve in the tree
    #[error(transparent)]
    BadPath(#[from] PathError),

    /// Total-mode realization left template-bearing leaves
    #[error("Config could not be totally realized; unrendered values at: {}", paths.join(", "))]
    Incomplete { paths: Vec<String> },

    /// One or more schema violations
    #[error("{count} schema-validation error(s) found")]
    ValidationFailed { count: usize },

    /// Realized tree deeper than the output format allows
    #[error("Cannot realize depth-{depth} config to depth-{max_depth} {format}")]
    DepthExceedsOutput {
        format: Format,
        max_depth: usize,
        depth: usize,
    },

    /// A schema document that does not compile
    #[error(transparent)]
    Schema(#[from] SchemaError),

    /// A JSON schema document that does not parse
    #[error("Cannot parse schema document: {0}")]
    SchemaJson(#[from] serde_json::Error),

    /// A format name or extension matching no codec
    #[error(transparent)]
    UnknownFormat(#[from] UnknownFormat),

    /// A path with no recognized extension where a format was not given
    #[error("Cannot deduce format of '{}' from its extension", path.display())]
    UndeducibleFormat { path: PathBuf },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type ConfigResult<T> = Result<T, ConfigError>;
