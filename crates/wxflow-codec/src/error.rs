//! Error types for the format codecs.

use thiserror::Error;

/// Errors raised while parsing or serializing a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    /// The textual source is not well-formed for the declared format.
    #[error("Invalid {format} source: {message}")]
    Parse { format: &'static str, message: String },

    /// A YAML source used a tag no constructor is registered for.
    #[error(
        "Unregistered YAML constructor !{tag}; supported tags are \
         !INCLUDE, !int, !float, !bool, !datetime, !remove, !glob"
    )]
    UnregisteredConstructor { tag: String },

    /// A YAML mapping key resolved to a composite value, typically an
    /// unquoted Jinja expression.
    #[error(
        "Found a composite value where a scalar key was expected. If the \
         document uses Jinja syntax like {{{{ var }}}} outside quotes, quote \
         the value: {message}"
    )]
    UnhashableValue { message: String },

    /// The tree cannot be expressed in the target format.
    #[error("Cannot serialize to {format}: {message}")]
    Serialize { format: &'static str, message: String },
}

impl CodecError {
    pub(crate) fn parse(format: &'static str, message: impl Into<String>) -> Self {
        CodecError::Parse {
            format,
            message: message.into(),
        }
    }

    pub(crate) fn serialize(format: &'static str, message: impl Into<String>) -> Self {
        CodecError::Serialize {
            format,
            message: message.into(),
        }
    }
}
