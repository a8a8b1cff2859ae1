//! Schema-validation entry points: load a schema document, scope it and
//! the tree by key-path, run the validator, and report.

use std::fs;
use std::path::Path;

use serde_json::Value;
use tracing::{error, info};

use wxflow_codec::{Format, codec_for};
use wxflow_tree::{KeyPath, Node};
use wxflow_validation::{Violation, compile, validate};

use crate::config::Config;
use crate::error::{ConfigError, ConfigResult};

/// Load a schema document: `.json` through serde, anything else as YAML
/// converted to JSON values.
pub fn load_schema(path: &Path) -> ConfigResult<Value> {
    let text = fs::read_to_string(path)?;
    if path.extension().and_then(|e| e.to_str()) == Some("json") {
        return Ok(serde_json::from_str(&text)?);
    }
    let tree = codec_for(Format::Yaml).parse(&text)?;
    Ok(json_from_node(&tree))
}

/// Validate a config against a schema document, optionally scoped to a
/// key-path (which must resolve in both the tree and the schema's
/// `properties` chain).
///
/// # Errors
///
/// *bad-path* when the key-path does not resolve, *validation-failed*
/// carrying the violation count when the tree does not conform.
pub fn validate_config(
    config: &Config,
    schema_doc: &Value,
    key_path: Option<&KeyPath>,
) -> ConfigResult<()> {
    let (tree, doc) = match key_path {
        Some(key_path) => (
            key_path.descend(config.tree())?,
            scope_schema(schema_doc, key_path),
        ),
        None => (config.tree(), schema_doc.clone()),
    };

    let (schema, registry) = compile(&doc)?;
    let mut violations = validate(tree, &schema, &registry);
    if violations.is_empty() {
        return Ok(());
    }

    violations.sort_by_key(|v| v.instance_path.to_string());
    report(&violations);
    Err(ConfigError::ValidationFailed {
        count: violations.len(),
    })
}

fn report(violations: &[Violation]) {
    error!("{} schema-validation error(s) found", violations.len());
    for violation in violations {
        info!("{violation}");
    }
}

/// Follow a key-path through the schema's nested `properties` blocks.
/// Where the schema runs out, the sub-tree is unconstrained.
fn scope_schema(doc: &Value, key_path: &KeyPath) -> Value {
    let mut current = doc;
    for segment in key_path.segments() {
        match current.get("properties").and_then(|p| p.get(segment)) {
            Some(nested) => current = nested,
            None => return Value::Bool(true),
        }
    }
    // $defs live at the document root; carry them into the scoped view
    // so $refs keep resolving.
    let mut scoped = current.clone();
    if let (Some(defs), Value::Object(obj)) = (doc.get("$defs"), &mut scoped) {
        obj.entry("$defs".to_string()).or_insert_with(|| defs.clone());
    }
    scoped
}

/// Convert a tree to JSON values, for schema documents written in YAML.
/// Tagged scalars carry over as their payload strings; non-finite floats
/// have no JSON form and become null.
pub fn json_from_node(node: &Node) -> Value {
    match node {
        Node::Null => Value::Null,
        Node::Bool(b) => Value::Bool(*b),
        Node::Int(i) => Value::Number((*i).into()),
        Node::Float(f) => serde_json::Number::from_f64(*f)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        Node::Str(s) => Value::String(s.clone()),
        Node::Tagged(tagged) => Value::String(tagged.payload.clone()),
        Node::Seq(items) => Value::Array(items.iter().map(json_from_node).collect()),
        Node::Map(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), json_from_node(v)))
                .collect(),
        ),
    }
}
