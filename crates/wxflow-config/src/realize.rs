//! The realize pipeline: compose parse, dereference, update, depth
//! checks, and output rendering.

use tracing::{debug, info};

use wxflow_codec::{Format, codec_for};
use wxflow_tree::{Characterization, KeyPath};

use crate::config::Config;
use crate::error::{ConfigError, ConfigResult};

/// Optional stages of a realize run.
#[derive(Debug, Default)]
pub struct RealizeOptions {
    /// A config whose values override the input after both dereference
    pub update: Option<Config>,
    /// Drill into this sub-tree before rendering output
    pub key_path: Option<KeyPath>,
    /// Report leaf classification instead of writing output
    pub values_needed: bool,
    /// Fail if any template-bearing leaf survives
    pub total: bool,
    /// Log the rendered output instead of returning it for writing
    pub dry_run: bool,
}

/// What a realize run produced.
#[derive(Debug, PartialEq)]
pub enum Realized {
    /// Serialized text ready for the output file or stdout
    Text(String),
    /// Leaf classification, values-needed mode
    ValuesNeeded(Characterization),
    /// Output was logged, nothing to write
    DryRun,
}

/// Run the full pipeline over an already-constructed input config.
///
/// # Errors
///
/// Propagates template and codec failures, *bad-path* for an
/// unresolvable key-path, *incomplete* in total mode, and
/// *depth-exceeds-output* when the realized tree is too deep for the
/// output format.
pub fn realize(
    mut input: Config,
    output_format: Format,
    options: RealizeOptions,
) -> ConfigResult<Realized> {
    input.dereference(None)?;

    if let Some(update) = options.update {
        let mut update = update;
        update.dereference(None)?;
        input.update_from(&update);
        input.dereference(None)?;
    }

    let tree = match &options.key_path {
        Some(key_path) => key_path.descend(input.tree())?.clone(),
        None => input.into_tree(),
    };

    let characterization = wxflow_tree::characterize(&tree);
    if options.total && !characterization.is_fully_rendered() {
        return Err(ConfigError::Incomplete {
            paths: characterization
                .template
                .iter()
                .map(ToString::to_string)
                .collect(),
        });
    }

    if let Some(max_depth) = output_format.max_depth() {
        let depth = tree.depth();
        if depth > max_depth {
            return Err(ConfigError::DepthExceedsOutput {
                format: output_format,
                max_depth,
                depth,
            });
        }
    }

    if options.values_needed {
        report_values_needed(&characterization);
        return Ok(Realized::ValuesNeeded(characterization));
    }

    let text = codec_for(output_format).to_text(&tree)?;

    if options.dry_run {
        for line in text.lines() {
            info!("{line}");
        }
        return Ok(Realized::DryRun);
    }

    Ok(Realized::Text(text))
}

fn report_values_needed(characterization: &Characterization) {
    info!("Keys that are complete:");
    for path in &characterization.complete {
        info!("    {path}");
    }
    info!("Keys with unset or empty values:");
    for path in &characterization.empty {
        info!("    {path}");
    }
    info!("Keys that have unrendered templates:");
    for path in &characterization.template {
        info!("    {path}");
    }
    debug!(
        complete = characterization.complete.len(),
        empty = characterization.empty.len(),
        template = characterization.template.len(),
        "values-needed report"
    );
}
