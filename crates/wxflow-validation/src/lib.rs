//! Schema validation for config trees.
//!
//! Schemas are a JSON Schema subset compiled from `serde_json::Value`
//! documents: type checks, object property rules, array item rules,
//! enumerations, numeric ranges, string constraints, the `anyOf` /
//! `allOf` / `oneOf` combinators, and `$ref` into `$defs`.
//!
//! Validation never stops at the first problem; every violation in the
//! tree is collected and reported together.

pub mod error;
pub mod schema;
pub mod validator;

pub use error::{InstancePath, PathSegment, SchemaError, SchemaResult, Violation, ViolationKind};
pub use schema::{Schema, SchemaRegistry, compile};
pub use validator::validate;
