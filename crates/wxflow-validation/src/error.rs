// Error types for schema validation

use std::fmt;
use thiserror::Error;

/// Errors raised while compiling a schema document.
#[derive(Debug, Error)]
pub enum SchemaError {
    /// Unknown value for the `type` keyword
    #[error("Invalid schema type: {0}")]
    InvalidType(String),

    /// Keyword present with the wrong shape
    #[error("Invalid schema structure: {message}")]
    InvalidStructure { message: String },

    /// `pattern` keyword that is not a valid regular expression
    #[error("Invalid schema pattern '{pattern}': {message}")]
    InvalidPattern { pattern: String, message: String },
}

/// Result type for schema compilation.
pub type SchemaResult<T> = Result<T, SchemaError>;

/// Structured violation kinds
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(tag = "type", content = "data")]
pub enum ViolationKind {
    /// Type mismatch
    TypeMismatch { expected: String, got: String },

    /// Missing required property
    MissingRequiredProperty { property: String },

    /// Unknown property in closed object
    UnknownProperty { property: String },

    /// Value not in enum
    InvalidEnumValue { value: String, allowed: Vec<String> },

    /// Number out of range
    NumberOutOfRange {
        value: f64,
        minimum: Option<f64>,
        maximum: Option<f64>,
    },

    /// String length invalid
    StringLengthInvalid {
        length: usize,
        min_length: Option<usize>,
        max_length: Option<usize>,
    },

    /// String doesn't match pattern
    StringPatternMismatch { value: String, pattern: String },

    /// Array length invalid
    ArrayLengthInvalid {
        length: usize,
        min_items: Option<usize>,
        max_items: Option<usize>,
    },

    /// Value matched none of the `anyOf` alternatives
    NoAlternativeMatched { alternatives: usize },

    /// Value matched a wrong number of `oneOf` alternatives
    NotExactlyOneMatch { matched: usize },

    /// Unresolved schema reference
    UnresolvedReference { ref_id: String },

    /// Schema reference that resolves back into itself
    CircularReference { ref_id: String },
}

impl ViolationKind {
    /// Format a human-readable message from this violation kind
    pub fn message(&self) -> String {
        match self {
            ViolationKind::TypeMismatch { expected, got } => {
                format!("Expected {expected}, got {got}")
            }
            ViolationKind::MissingRequiredProperty { property } => {
                format!("Missing required property '{property}'")
            }
            ViolationKind::UnknownProperty { property } => {
                format!("Unknown property '{property}'")
            }
            ViolationKind::InvalidEnumValue { value, allowed } => {
                format!("Value must be one of: {}, got {value}", allowed.join(", "))
            }
            ViolationKind::NumberOutOfRange {
                value,
                minimum,
                maximum,
            } => {
                if let Some(min) = minimum {
                    format!("Number {value} is less than minimum {min}")
                } else if let Some(max) = maximum {
                    format!("Number {value} is greater than maximum {max}")
                } else {
                    format!("Number {value} is out of range")
                }
            }
            ViolationKind::StringLengthInvalid {
                length,
                min_length,
                max_length,
            } => {
                if let Some(min) = min_length {
                    format!("String length {length} is less than minimum {min}")
                } else if let Some(max) = max_length {
                    format!("String length {length} is greater than maximum {max}")
                } else {
                    format!("String length {length} is invalid")
                }
            }
            ViolationKind::StringPatternMismatch { value, pattern } => {
                format!("String '{value}' does not match pattern '{pattern}'")
            }
            ViolationKind::ArrayLengthInvalid {
                length,
                min_items,
                max_items,
            } => {
                if let Some(min) = min_items {
                    format!("Array length {length} is less than minimum {min}")
                } else if let Some(max) = max_items {
                    format!("Array length {length} is greater than maximum {max}")
                } else {
                    format!("Array length {length} is invalid")
                }
            }
            ViolationKind::NoAlternativeMatched { alternatives } => {
                format!("Value matches none of the {alternatives} allowed alternatives")
            }
            ViolationKind::NotExactlyOneMatch { matched } => {
                format!("Value matches {matched} alternatives, expected exactly one")
            }
            ViolationKind::UnresolvedReference { ref_id } => {
                format!("Unresolved schema reference: {ref_id}")
            }
            ViolationKind::CircularReference { ref_id } => {
                format!("Circular schema reference: {ref_id}")
            }
        }
    }
}

/// A single validation failure with the path where it occurred.
#[derive(Debug, Clone, PartialEq, Error)]
pub struct Violation {
    /// The structured violation kind
    pub kind: ViolationKind,
    /// Instance path where the violation occurred (e.g., ["fcst", "length"])
    pub instance_path: InstancePath,
}

impl Violation {
    pub fn new(kind: ViolationKind, instance_path: InstancePath) -> Self {
        Self {
            kind,
            instance_path,
        }
    }

    /// Get the human-readable message for this violation
    pub fn message(&self) -> String {
        self.kind.message()
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "at {}: {}", self.instance_path, self.kind.message())
    }
}

/// Instance path (e.g., ["fcst", "length"])
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstancePath {
    segments: Vec<PathSegment>,
}

impl InstancePath {
    pub fn new() -> Self {
        Self {
            segments: Vec::new(),
        }
    }

    /// Push a key segment onto the path
    pub fn push_key(&mut self, key: impl Into<String>) {
        self.segments.push(PathSegment::Key(key.into()));
    }

    /// Push an index segment onto the path
    pub fn push_index(&mut self, index: usize) {
        self.segments.push(PathSegment::Index(index));
    }

    pub fn pop(&mut self) -> Option<PathSegment> {
        self.segments.pop()
    }

    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }
}

impl fmt::Display for InstancePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.segments.is_empty() {
            write!(f, "(root)")
        } else {
            for (i, segment) in self.segments.iter().enumerate() {
                if i > 0 {
                    write!(f, ".")?;
                }
                write!(f, "{segment}")?;
            }
            Ok(())
        }
    }
}

/// A segment in an instance path
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSegment {
    /// Object key
    Key(String),
    /// Array index
    Index(usize),
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathSegment::Key(key) => write!(f, "{key}"),
            PathSegment::Index(index) => write!(f, "[{index}]"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_instance_path_display() {
        let mut path = InstancePath::new();
        assert_eq!(path.to_string(), "(root)");

        path.push_key("fcst");
        assert_eq!(path.to_string(), "fcst");

        path.push_key("length");
        assert_eq!(path.to_string(), "fcst.length");

        path.push_index(0);
        assert_eq!(path.to_string(), "fcst.length.[0]");
    }

    #[test]
    fn test_violation_message() {
        let mut path = InstancePath::new();
        path.push_key("fcst");

        let violation = Violation::new(
            ViolationKind::TypeMismatch {
                expected: "number".to_string(),
                got: "string".to_string(),
            },
            path,
        );
        assert_eq!(violation.message(), "Expected number, got string");
        assert_eq!(violation.to_string(), "at fcst: Expected number, got string");
    }
}
