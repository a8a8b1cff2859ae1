//! Schema compilation from JSON documents.

use indexmap::IndexMap;
use regex::Regex;
use serde_json::Value;

use crate::error::{SchemaError, SchemaResult};

/// A compiled schema.
#[derive(Debug, Clone)]
pub enum Schema {
    /// `true` or `{}`: accepts anything
    Any,
    /// `false`: accepts nothing
    Never,
    Boolean,
    Null,
    Integer(NumberSchema),
    Number(NumberSchema),
    String(StringSchema),
    Array(ArraySchema),
    Object(ObjectSchema),
    Enum(EnumSchema),
    AnyOf(Vec<Schema>),
    AllOf(Vec<Schema>),
    OneOf(Vec<Schema>),
    /// `$ref` into the registry, e.g. `#/$defs/task`
    Ref(String),
}

#[derive(Debug, Clone, Default)]
pub struct NumberSchema {
    pub minimum: Option<f64>,
    pub maximum: Option<f64>,
}

#[derive(Debug, Clone, Default)]
pub struct StringSchema {
    pub pattern: Option<Regex>,
    pub min_length: Option<usize>,
    pub max_length: Option<usize>,
}

#[derive(Debug, Clone, Default)]
pub struct ArraySchema {
    pub items: Option<Box<Schema>>,
    pub min_items: Option<usize>,
    pub max_items: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct ObjectSchema {
    pub properties: IndexMap<String, Schema>,
    pub required: Vec<String>,
    pub additional: AdditionalProperties,
}

/// What an object schema says about properties it does not name.
#[derive(Debug, Clone)]
pub enum AdditionalProperties {
    Allowed,
    Forbidden,
    Schema(Box<Schema>),
}

#[derive(Debug, Clone)]
pub struct EnumSchema {
    pub allowed: Vec<Value>,
}

/// Named schemas from the document's `$defs` block, for `$ref` lookup.
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    defs: IndexMap<String, Schema>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self {
            defs: IndexMap::new(),
        }
    }

    /// Resolve a reference of the form `#/$defs/<name>`.
    pub fn resolve(&self, reference: &str) -> Option<&Schema> {
        let name = reference.strip_prefix("#/$defs/")?;
        self.defs.get(name)
    }
}

/// Compile a schema document: the root schema plus its `$defs` registry.
pub fn compile(doc: &Value) -> SchemaResult<(Schema, SchemaRegistry)> {
    let mut registry = SchemaRegistry::new();
    if let Some(defs) = doc.get("$defs") {
        let Value::Object(defs) = defs else {
            return Err(SchemaError::InvalidStructure {
                message: "$defs must be an object".to_string(),
            });
        };
        for (name, def) in defs {
            registry.defs.insert(name.clone(), compile_schema(def)?);
        }
    }
    let root = compile_schema(doc)?;
    Ok((root, registry))
}

/// Compile a single schema value, recursively.
pub fn compile_schema(value: &Value) -> SchemaResult<Schema> {
    let obj = match value {
        Value::Bool(true) => return Ok(Schema::Any),
        Value::Bool(false) => return Ok(Schema::Never),
        Value::Object(obj) => obj,
        other => {
            return Err(SchemaError::InvalidStructure {
                message: format!("schema must be an object or boolean, got {other}"),
            });
        }
    };

    if let Some(reference) = obj.get("$ref") {
        let Value::String(reference) = reference else {
            return Err(SchemaError::InvalidStructure {
                message: "$ref must be a string".to_string(),
            });
        };
        return Ok(Schema::Ref(reference.clone()));
    }

    if let Some(allowed) = obj.get("enum") {
        let Value::Array(allowed) = allowed else {
            return Err(SchemaError::InvalidStructure {
                message: "enum must be an array".to_string(),
            });
        };
        return Ok(Schema::Enum(EnumSchema {
            allowed: allowed.clone(),
        }));
    }

    for (keyword, combinator) in [
        ("anyOf", Schema::AnyOf as fn(Vec<Schema>) -> Schema),
        ("oneOf", Schema::OneOf),
        ("allOf", Schema::AllOf),
    ] {
        if let Some(alternatives) = obj.get(keyword) {
            let Value::Array(alternatives) = alternatives else {
                return Err(SchemaError::InvalidStructure {
                    message: format!("{keyword} must be an array"),
                });
            };
            let compiled = alternatives
                .iter()
                .map(compile_schema)
                .collect::<SchemaResult<Vec<_>>>()?;
            return Ok(combinator(compiled));
        }
    }

    match obj.get("type") {
        Some(Value::String(ty)) => compile_typed(ty, obj),
        Some(Value::Array(types)) => {
            let mut alternatives = Vec::with_capacity(types.len());
            for ty in types {
                let Value::String(ty) = ty else {
                    return Err(SchemaError::InvalidStructure {
                        message: "type array entries must be strings".to_string(),
                    });
                };
                alternatives.push(compile_typed(ty, obj)?);
            }
            Ok(Schema::AnyOf(alternatives))
        }
        Some(other) => Err(SchemaError::InvalidStructure {
            message: format!("type must be a string or array of strings, got {other}"),
        }),
        // An untyped schema with object keywords still constrains objects.
        None if obj.contains_key("properties")
            || obj.contains_key("required")
            || obj.contains_key("additionalProperties") =>
        {
            compile_typed("object", obj)
        }
        None if obj.contains_key("items") => compile_typed("array", obj),
        None => Ok(Schema::Any),
    }
}

fn compile_typed(ty: &str, obj: &serde_json::Map<String, Value>) -> SchemaResult<Schema> {
    match ty {
        "boolean" => Ok(Schema::Boolean),
        "null" => Ok(Schema::Null),
        "integer" => Ok(Schema::Integer(number_schema(obj)?)),
        "number" => Ok(Schema::Number(number_schema(obj)?)),
        "string" => Ok(Schema::String(string_schema(obj)?)),
        "array" => Ok(Schema::Array(array_schema(obj)?)),
        "object" => Ok(Schema::Object(object_schema(obj)?)),
        other => Err(SchemaError::InvalidType(other.to_string())),
    }
}

fn number_schema(obj: &serde_json::Map<String, Value>) -> SchemaResult<NumberSchema> {
    Ok(NumberSchema {
        minimum: opt_f64(obj, "minimum")?,
        maximum: opt_f64(obj, "maximum")?,
    })
}

fn string_schema(obj: &serde_json::Map<String, Value>) -> SchemaResult<StringSchema> {
    let pattern = match obj.get("pattern") {
        None => None,
        Some(Value::String(pattern)) => {
            Some(
                Regex::new(pattern).map_err(|e| SchemaError::InvalidPattern {
                    pattern: pattern.clone(),
                    message: e.to_string(),
                })?,
            )
        }
        Some(other) => {
            return Err(SchemaError::InvalidStructure {
                message: format!("pattern must be a string, got {other}"),
            });
        }
    };
    Ok(StringSchema {
        pattern,
        min_length: opt_usize(obj, "minLength")?,
        max_length: opt_usize(obj, "maxLength")?,
    })
}

fn array_schema(obj: &serde_json::Map<String, Value>) -> SchemaResult<ArraySchema> {
    let items = match obj.get("items") {
        None => None,
        Some(items) => Some(Box::new(compile_schema(items)?)),
    };
    Ok(ArraySchema {
        items,
        min_items: opt_usize(obj, "minItems")?,
        max_items: opt_usize(obj, "maxItems")?,
    })
}

fn object_schema(obj: &serde_json::Map<String, Value>) -> SchemaResult<ObjectSchema> {
    let mut properties = IndexMap::new();
    if let Some(props) = obj.get("properties") {
        let Value::Object(props) = props else {
            return Err(SchemaError::InvalidStructure {
                message: "properties must be an object".to_string(),
            });
        };
        for (name, prop) in props {
            properties.insert(name.clone(), compile_schema(prop)?);
        }
    }

    let mut required = Vec::new();
    if let Some(names) = obj.get("required") {
        let Value::Array(names) = names else {
            return Err(SchemaError::InvalidStructure {
                message: "required must be an array".to_string(),
            });
        };
        for name in names {
            let Value::String(name) = name else {
                return Err(SchemaError::InvalidStructure {
                    message: "required entries must be strings".to_string(),
                });
            };
            required.push(name.clone());
        }
    }

    let additional = match obj.get("additionalProperties") {
        None | Some(Value::Bool(true)) => AdditionalProperties::Allowed,
        Some(Value::Bool(false)) => AdditionalProperties::Forbidden,
        Some(schema) => AdditionalProperties::Schema(Box::new(compile_schema(schema)?)),
    };

    Ok(ObjectSchema {
        properties,
        required,
        additional,
    })
}

fn opt_f64(obj: &serde_json::Map<String, Value>, keyword: &str) -> SchemaResult<Option<f64>> {
    match obj.get(keyword) {
        None => Ok(None),
        Some(Value::Number(n)) => Ok(n.as_f64()),
        Some(other) => Err(SchemaError::InvalidStructure {
            message: format!("{keyword} must be a number, got {other}"),
        }),
    }
}

fn opt_usize(obj: &serde_json::Map<String, Value>, keyword: &str) -> SchemaResult<Option<usize>> {
    match obj.get(keyword) {
        None => Ok(None),
        Some(Value::Number(n)) => match n.as_u64() {
            Some(n) => Ok(Some(n as usize)),
            None => Err(SchemaError::InvalidStructure {
                message: format!("{keyword} must be a non-negative integer, got {n}"),
            }),
        },
        Some(other) => Err(SchemaError::InvalidStructure {
            message: format!("{keyword} must be a number, got {other}"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_compile_typed_schema() {
        let doc = json!({
            "type": "object",
            "properties": {
                "length": {"type": "integer", "minimum": 0},
                "grid": {"type": "string", "pattern": "^c[0-9]+$"}
            },
            "required": ["length"],
            "additionalProperties": false
        });
        let (schema, _) = compile(&doc).unwrap();
        let Schema::Object(obj) = schema else {
            panic!("expected object schema");
        };
        assert_eq!(obj.required, vec!["length"]);
        assert!(matches!(obj.additional, AdditionalProperties::Forbidden));
        assert!(matches!(obj.properties["length"], Schema::Integer(_)));
    }

    #[test]
    fn test_compile_defs_and_ref() {
        let doc = json!({
            "$defs": {"res": {"type": "string"}},
            "type": "object",
            "properties": {"grid": {"$ref": "#/$defs/res"}}
        });
        let (schema, registry) = compile(&doc).unwrap();
        let Schema::Object(obj) = schema else {
            panic!("expected object schema");
        };
        let Schema::Ref(reference) = &obj.properties["grid"] else {
            panic!("expected ref schema");
        };
        assert!(registry.resolve(reference).is_some());
        assert!(registry.resolve("#/$defs/missing").is_none());
    }

    #[test]
    fn test_compile_type_array_is_any_of() {
        let doc = json!({"type": ["string", "integer"]});
        let (schema, _) = compile(&doc).unwrap();
        let Schema::AnyOf(alternatives) = schema else {
            panic!("expected anyOf schema");
        };
        assert_eq!(alternatives.len(), 2);
    }

    #[test]
    fn test_compile_bad_pattern() {
        let doc = json!({"type": "string", "pattern": "["});
        assert!(matches!(
            compile(&doc),
            Err(SchemaError::InvalidPattern { .. })
        ));
    }

    #[test]
    fn test_compile_unknown_type() {
        let doc = json!({"type": "datetime"});
        assert!(matches!(compile(&doc), Err(SchemaError::InvalidType(_))));
    }

    #[test]
    fn test_untyped_with_properties_is_object() {
        let doc = json!({"properties": {"a": true}});
        let (schema, _) = compile(&doc).unwrap();
        assert!(matches!(schema, Schema::Object(_)));
    }
}
