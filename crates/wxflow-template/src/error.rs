//! Error types for template compilation and rendering.

use thiserror::Error;

pub type TemplateResult<T> = Result<T, TemplateError>;

/// Errors raised while compiling or rendering a template.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TemplateError {
    /// The template source is syntactically malformed.
    #[error("Template parse error: {message}")]
    Parse { message: String },

    /// An expression referenced a name the context does not define.
    #[error("Undefined variable '{name}'")]
    Undefined { name: String },

    /// An operation was applied to values of unsupported types.
    #[error("Type error: {message}")]
    Type { message: String },

    /// Division or modulo by zero.
    #[error("Division by zero")]
    ZeroDivision,

    /// An expression named a filter outside the fixed registry. Filters
    /// are syntactic, not data-dependent, so this is always fatal.
    #[error("Unregistered filter: {name}")]
    UnregisteredFilter { name: String },
}

impl TemplateError {
    /// Whether the dereferencer may suppress this error, leaving the
    /// offending leaf unchanged.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            TemplateError::Undefined { .. }
                | TemplateError::Type { .. }
                | TemplateError::ZeroDivision
        )
    }
}
