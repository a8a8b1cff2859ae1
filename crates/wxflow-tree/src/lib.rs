//! # wxflow-tree
//!
//! The normalized in-memory form of a configuration: an ordered tree of
//! mappings, sequences, and scalars, plus the structural operations the
//! rest of wxflow builds on (depth measurement, key-path navigation, deep
//! merge-update, structural diffing, and leaf classification).
//!
//! Mappings preserve insertion order but compare order-insensitively, so
//! serialization reproduces source order while `==` answers the structural
//! question.
//!
//! ## Example
//!
//! ```rust
//! use wxflow_tree::Node;
//!
//! let mut tree = Node::map();
//! tree.insert("model", Node::from("gfs"));
//! tree.insert("cycle_hours", Node::from(6));
//!
//! assert_eq!(tree.depth(), 1);
//! assert_eq!(tree.get("model").and_then(Node::as_str), Some("gfs"));
//! ```

mod characterize;
mod diff;
mod merge;
mod node;
mod path;

pub use characterize::{Characterization, characterize};
pub use diff::{DiffRow, diff};
pub use merge::deep_update;
pub use node::{Mapping, Node, Tag, Tagged, fmt_float};
pub use path::{KeyPath, PathError};
