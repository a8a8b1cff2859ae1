//! # wxflow-config
//!
//! The config model and pipeline: construct a [`Config`] from a file,
//! stream, or tree; expand `!INCLUDE` directives; merge-update configs;
//! dereference templates to a fixpoint; validate against a schema; and
//! realize the result as text in any supported format or as filesystem
//! actions.
//!
//! ```no_run
//! use std::path::Path;
//! use wxflow_codec::Format;
//! use wxflow_config::{Config, RealizeOptions, Realized, realize};
//!
//! # fn main() -> Result<(), wxflow_config::ConfigError> {
//! let input = Config::from_file(Path::new("experiment.yaml"), None)?;
//! let update = Config::from_file(Path::new("overrides.yaml"), None)?;
//! let options = RealizeOptions {
//!     update: Some(update),
//!     ..Default::default()
//! };
//! if let Realized::Text(text) = realize(input, Format::Nml, options)? {
//!     println!("{text}");
//! }
//! # Ok(())
//! # }
//! ```

mod config;
mod error;
pub mod fs;
mod realize;
mod stdin;
mod validate;

pub use config::Config;
pub use error::{ConfigError, ConfigResult};
pub use fs::{StageReport, copy, link, makedirs};
pub use realize::{RealizeOptions, Realized, realize};
pub use stdin::{read_stdin, reset_stdin_cache, seed_stdin_cache};
pub use validate::{json_from_node, load_schema, validate_config};
