//! The fixed filter registry.
//!
//! Filters are looked up by name at compile time, so rendering never
//! encounters an unknown filter.

use std::path::PathBuf;

use crate::error::{TemplateError, TemplateResult};
use crate::value::Value;

/// Every filter a template may name. Checked during compilation.
pub const FILTER_NAMES: &[&str] = &[
    "bool", "default", "env", "float", "int", "lower", "path_join", "string", "trim", "upper",
];

/// Apply a registered filter. Callers guarantee `name` came through the
/// compile-time check, so an unknown name here is a logic error and is
/// still reported rather than panicking.
pub(crate) fn apply(name: &str, input: Value, args: &[Value]) -> TemplateResult<Value> {
    match name {
        "bool" => to_bool(input),
        "default" => Ok(default(input, args)),
        "env" => env(input),
        "float" => to_float(input),
        "int" => to_int(input),
        "lower" => map_str(input, "lower", |s| s.to_lowercase()),
        "path_join" => path_join(input),
        "string" => Ok(Value::Str(input.render())),
        "trim" => map_str(input, "trim", |s| s.trim().to_string()),
        "upper" => map_str(input, "upper", |s| s.to_uppercase()),
        _ => Err(TemplateError::UnregisteredFilter {
            name: name.to_string(),
        }),
    }
}

fn map_str(input: Value, name: &str, f: impl Fn(&str) -> String) -> TemplateResult<Value> {
    match input {
        Value::Str(s) => Ok(Value::Str(f(&s))),
        other => Err(TemplateError::Type {
            message: format!("filter '{name}' expects a string, got {}", other.type_name()),
        }),
    }
}

fn to_int(input: Value) -> TemplateResult<Value> {
    match input {
        Value::Int(i) => Ok(Value::Int(i)),
        Value::Float(f) => Ok(Value::Int(f as i64)),
        Value::Bool(b) => Ok(Value::Int(i64::from(b))),
        Value::Str(s) => s.trim().parse::<i64>().map(Value::Int).map_err(|_| {
            TemplateError::Type {
                message: format!("cannot convert '{s}' to int"),
            }
        }),
        other => Err(TemplateError::Type {
            message: format!("cannot convert {} to int", other.type_name()),
        }),
    }
}

fn to_float(input: Value) -> TemplateResult<Value> {
    match input {
        Value::Int(i) => Ok(Value::Float(i as f64)),
        Value::Float(f) => Ok(Value::Float(f)),
        Value::Str(s) => s.trim().parse::<f64>().map(Value::Float).map_err(|_| {
            TemplateError::Type {
                message: format!("cannot convert '{s}' to float"),
            }
        }),
        other => Err(TemplateError::Type {
            message: format!("cannot convert {} to float", other.type_name()),
        }),
    }
}

fn to_bool(input: Value) -> TemplateResult<Value> {
    match input {
        Value::Bool(b) => Ok(Value::Bool(b)),
        Value::Str(s) => match s.to_ascii_lowercase().as_str() {
            "true" | "yes" | "1" => Ok(Value::Bool(true)),
            "false" | "no" | "0" => Ok(Value::Bool(false)),
            _ => Err(TemplateError::Type {
                message: format!("cannot convert '{s}' to bool"),
            }),
        },
        Value::Int(i) => Ok(Value::Bool(i != 0)),
        other => Err(TemplateError::Type {
            message: format!("cannot convert {} to bool", other.type_name()),
        }),
    }
}

/// `{{ name | env }}` reads the process environment.
fn env(input: Value) -> TemplateResult<Value> {
    let Value::Str(name) = input else {
        return Err(TemplateError::Type {
            message: format!(
                "filter 'env' expects a variable name, got {}",
                input.type_name()
            ),
        });
    };
    match std::env::var(&name) {
        Ok(v) => Ok(Value::Str(v)),
        Err(_) => Err(TemplateError::Undefined {
            name: format!("environment variable '{name}'"),
        }),
    }
}

/// Join list elements with the platform path separator.
fn path_join(input: Value) -> TemplateResult<Value> {
    let Value::List(parts) = input else {
        return Err(TemplateError::Type {
            message: format!(
                "filter 'path_join' expects a list, got {}",
                input.type_name()
            ),
        });
    };
    let mut path = PathBuf::new();
    for part in parts {
        path.push(part.render());
    }
    Ok(Value::Str(path.to_string_lossy().into_owned()))
}

/// First argument replaces null or undefined-placeholder inputs.
fn default(input: Value, args: &[Value]) -> Value {
    match input {
        Value::Null => args.first().cloned().unwrap_or(Value::Null),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_is_sorted() {
        let mut sorted = FILTER_NAMES.to_vec();
        sorted.sort_unstable();
        assert_eq!(sorted, FILTER_NAMES);
    }

    #[test]
    fn test_int_conversions() {
        assert_eq!(
            apply("int", Value::Str("42".into()), &[]).unwrap(),
            Value::Int(42)
        );
        assert_eq!(apply("int", Value::Float(3.9), &[]).unwrap(), Value::Int(3));
        assert!(apply("int", Value::Str("abc".into()), &[]).is_err());
    }

    #[test]
    fn test_case_filters() {
        assert_eq!(
            apply("upper", Value::Str("gfs".into()), &[]).unwrap(),
            Value::Str("GFS".into())
        );
        assert_eq!(
            apply("lower", Value::Str("GFS".into()), &[]).unwrap(),
            Value::Str("gfs".into())
        );
    }

    #[test]
    fn test_path_join() {
        let parts = Value::List(vec![
            Value::Str("/data".into()),
            Value::Str("runs".into()),
            Value::Str("gfs".into()),
        ]);
        assert_eq!(
            apply("path_join", parts, &[]).unwrap(),
            Value::Str("/data/runs/gfs".into())
        );
    }

    #[test]
    fn test_default() {
        assert_eq!(
            apply("default", Value::Null, &[Value::Int(6)]).unwrap(),
            Value::Int(6)
        );
        assert_eq!(
            apply("default", Value::Int(12), &[Value::Int(6)]).unwrap(),
            Value::Int(12)
        );
    }

    #[test]
    fn test_env_missing_is_undefined() {
        let err = apply("env", Value::Str("WXFLOW_NO_SUCH_VAR".into()), &[]).unwrap_err();
        assert!(matches!(err, TemplateError::Undefined { .. }));
    }

    #[test]
    fn test_bool_conversions() {
        assert_eq!(
            apply("bool", Value::Str("yes".into()), &[]).unwrap(),
            Value::Bool(true)
        );
        assert_eq!(apply("bool", Value::Int(0), &[]).unwrap(), Value::Bool(false));
    }
}
