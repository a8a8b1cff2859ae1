//! Tree dereferencing: render template expressions embedded in a config
//! tree against the tree itself, repeating until a fixed point.

use chrono::{NaiveDate, NaiveDateTime};
use indexmap::IndexMap;
use tracing::debug;

use wxflow_codec::yaml::scalar_from_str;
use wxflow_tree::{Mapping, Node, Tag, Tagged};

use crate::error::TemplateResult;
use crate::parser::Template;
use crate::value::{Context, Value};

/// Render every template-bearing value in `tree` against the tree's own
/// values, `extra` entries overriding top-level keys of the same name.
///
/// Values whose expressions cannot be resolved yet (undefined names,
/// type mismatches, division by zero) are left as they are; a later
/// `update_from` may supply the missing names. Malformed templates and
/// unknown filters are reported as errors.
///
/// Each pass renders with the values the previous pass produced, so
/// chains like `a: {{ b }}` / `b: {{ c }}` / `c: 1` converge. The loop
/// stops when a pass changes nothing.
pub fn dereference(tree: &Node, extra: Option<&Mapping>) -> TemplateResult<Node> {
    let mut current = tree.clone();
    // Circular references never settle; the pass count is capped at one
    // more than the number of leaves that could possibly resolve.
    let max_passes = count_template_leaves(&current) + 1;
    for _ in 0..max_passes {
        let mut ctx = base_context(&current, extra);
        let next = deref_node(&current, &mut ctx)?.unwrap_or(Node::Null);
        if next == current {
            break;
        }
        current = next;
    }
    Ok(current)
}

fn count_template_leaves(node: &Node) -> usize {
    match node {
        Node::Str(s) => usize::from(has_markers(s)),
        Node::Tagged(tagged) => usize::from(has_markers(&tagged.payload)),
        Node::Seq(items) => items.iter().map(count_template_leaves).sum(),
        Node::Map(map) => map.values().map(count_template_leaves).sum(),
        _ => 0,
    }
}

fn base_context(tree: &Node, extra: Option<&Mapping>) -> Context {
    let mut ctx = Context::from_node(tree);
    if let Some(extra) = extra {
        // Supplied entries must beat tree keys of the same name, even
        // after mapping scopes are pushed on top.
        for (key, value) in extra {
            ctx.insert_override(key.clone(), Value::from(value));
        }
    }
    ctx
}

/// Returns `Ok(None)` when the node asked to be removed from its parent.
fn deref_node(node: &Node, ctx: &mut Context) -> TemplateResult<Option<Node>> {
    match node {
        Node::Str(text) => render_str(text, ctx).map(Some),
        Node::Tagged(tagged) => deref_tagged(tagged, ctx),
        Node::Seq(items) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                if let Some(rendered) = deref_node(item, ctx)? {
                    out.push(rendered);
                }
            }
            Ok(Some(Node::Seq(out)))
        }
        Node::Map(map) => {
            // A mapping's own entries shadow names from enclosing scopes.
            let mut scope = IndexMap::new();
            for (key, value) in map {
                scope.insert(key.clone(), Value::from(value));
            }
            ctx.push_scope(scope);
            let result = deref_map(map, ctx);
            ctx.pop_scope();
            result.map(|m| Some(Node::Map(m)))
        }
        other => Ok(Some(other.clone())),
    }
}

fn deref_map(map: &Mapping, ctx: &mut Context) -> TemplateResult<Mapping> {
    let mut out = Mapping::new();
    for (key, value) in map {
        let key = match render_str(key, ctx)? {
            Node::Str(s) => s,
            rendered => rendered.to_string(),
        };
        match deref_node(value, ctx)? {
            Some(rendered) => {
                out.insert(key, rendered);
            }
            None => {
                debug!(key, "removing tagged entry");
            }
        }
    }
    Ok(out)
}

/// Render a string if it carries template markers; otherwise pass it
/// through. An unresolvable expression keeps the original text; a
/// rendered one is reparsed so `"{{ n * 2 }}"` can come back an integer.
fn render_str(text: &str, ctx: &Context) -> TemplateResult<Node> {
    if !has_markers(text) {
        return Ok(Node::Str(text.to_string()));
    }
    match render_fatal(text, ctx)? {
        Some(rendered) if rendered != text => Ok(scalar_from_str(&rendered)),
        Some(rendered) => Ok(Node::Str(rendered)),
        None => Ok(Node::Str(text.to_string())),
    }
}

/// Render, distinguishing recoverable misses (Ok(None)) from fatal
/// template errors.
fn render_fatal(text: &str, ctx: &Context) -> TemplateResult<Option<String>> {
    let template = Template::compile(text)?;
    match template.render(ctx) {
        Ok(rendered) => Ok(Some(rendered)),
        Err(err) if err.is_recoverable() => {
            debug!(text, %err, "cannot render value yet");
            Ok(None)
        }
        Err(err) => Err(err),
    }
}

fn deref_tagged(tagged: &Tagged, ctx: &Context) -> TemplateResult<Option<Node>> {
    let payload = if has_markers(&tagged.payload) {
        match render_fatal(&tagged.payload, ctx)? {
            Some(rendered) => rendered,
            None => return Ok(Some(Node::Tagged(tagged.clone()))),
        }
    } else {
        tagged.payload.clone()
    };

    // Coercion waits for a fully rendered payload.
    if has_markers(&payload) {
        return Ok(Some(Node::Tagged(Tagged::new(tagged.tag, payload))));
    }

    let coerced = match tagged.tag {
        Tag::Remove => return Ok(None),
        Tag::Glob => Some(Node::Tagged(Tagged::new(Tag::Glob, payload.clone()))),
        Tag::Int => payload.trim().parse::<i64>().ok().map(Node::Int),
        Tag::Float => payload.trim().parse::<f64>().ok().map(Node::Float),
        Tag::Bool => match payload.trim() {
            "true" | "True" | "TRUE" => Some(Node::Bool(true)),
            "false" | "False" | "FALSE" => Some(Node::Bool(false)),
            _ => None,
        },
        Tag::Datetime => parse_datetime(payload.trim()).map(Node::Str),
    };

    match coerced {
        Some(node) => Ok(Some(node)),
        None => {
            debug!(
                tag = tagged.tag.name(),
                payload, "cannot coerce tagged value"
            );
            Ok(Some(Node::Tagged(Tagged::new(tagged.tag, payload))))
        }
    }
}

/// Accept ISO-8601 datetimes (with `T` or space separator) and bare
/// dates, normalized to `YYYY-MM-DDTHH:MM:SS`.
fn parse_datetime(text: &str) -> Option<String> {
    for format in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(text, format) {
            return Some(dt.format("%Y-%m-%dT%H:%M:%S").to_string());
        }
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .map(|d| d.format("%Y-%m-%dT00:00:00").to_string())
}

fn has_markers(text: &str) -> bool {
    text.contains("{{") || text.contains("{%")
}
