//! # wxflow-template
//!
//! The templating layer of wxflow: a renderer for `{{ expr }}`
//! substitutions and `{% ... %}` control blocks, and the fixpoint
//! dereferencer that rewrites a configuration tree until every renderable
//! expression has been replaced.
//!
//! The renderer distinguishes recoverable failures (undefined variables,
//! type errors, division by zero — the dereferencer leaves such leaves
//! unchanged) from fatal ones (syntax errors and unknown filters, which
//! are authoring mistakes independent of the data).
//!
//! ```rust
//! use wxflow_template::{Context, Template, Value};
//!
//! let template = Template::compile("{{ greeting }}, {{ name | upper }}!").unwrap();
//! let mut ctx = Context::new();
//! ctx.insert("greeting", Value::from("hello"));
//! ctx.insert("name", Value::from("world"));
//! assert_eq!(template.render(&ctx).unwrap(), "hello, WORLD!");
//! ```

mod ast;
mod deref;
mod error;
mod eval;
mod filters;
mod parser;
mod value;

pub use ast::{BinaryOp, Expr, TemplateNode, UnaryOp};
pub use deref::dereference;
pub use error::{TemplateError, TemplateResult};
pub use filters::FILTER_NAMES;
pub use parser::Template;
pub use value::{Context, Value};
