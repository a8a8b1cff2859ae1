// Config tree validation engine

use serde_json::Value;

use wxflow_tree::Node;

use crate::error::{InstancePath, Violation, ViolationKind};
use crate::schema::{
    AdditionalProperties, ArraySchema, EnumSchema, NumberSchema, ObjectSchema, Schema,
    SchemaRegistry, StringSchema,
};

/// Validate a config tree against a schema, collecting every violation.
///
/// An empty result means the tree is valid.
pub fn validate(node: &Node, schema: &Schema, registry: &SchemaRegistry) -> Vec<Violation> {
    let mut context = ValidationContext::new(registry);
    validate_node(node, schema, &mut context);
    context.violations
}

/// Validation context tracks state during validation
struct ValidationContext<'a> {
    /// Reference to the schema registry for $ref resolution
    registry: &'a SchemaRegistry,
    /// Current instance path (e.g., ["fcst", "length"])
    instance_path: InstancePath,
    /// Collected violations
    violations: Vec<Violation>,
    /// `$ref` names currently being expanded at this instance location;
    /// re-entering one without consuming input is a cycle.
    active_refs: Vec<String>,
}

impl<'a> ValidationContext<'a> {
    fn new(registry: &'a SchemaRegistry) -> Self {
        Self {
            registry,
            instance_path: InstancePath::new(),
            violations: Vec::new(),
            active_refs: Vec::new(),
        }
    }

    fn add(&mut self, kind: ViolationKind) {
        self.violations
            .push(Violation::new(kind, self.instance_path.clone()));
    }

    /// Execute a function with a key segment pushed onto the path
    fn with_key<F>(&mut self, key: &str, f: F)
    where
        F: FnOnce(&mut Self),
    {
        self.instance_path.push_key(key);
        let saved = std::mem::take(&mut self.active_refs);
        f(self);
        self.active_refs = saved;
        self.instance_path.pop();
    }

    /// Execute a function with an index segment pushed onto the path
    fn with_index<F>(&mut self, index: usize, f: F)
    where
        F: FnOnce(&mut Self),
    {
        self.instance_path.push_index(index);
        let saved = std::mem::take(&mut self.active_refs);
        f(self);
        self.active_refs = saved;
        self.instance_path.pop();
    }
}

/// Main validation dispatcher
fn validate_node(node: &Node, schema: &Schema, context: &mut ValidationContext) {
    match schema {
        Schema::Any => {}
        Schema::Never => {
            context.add(ViolationKind::TypeMismatch {
                expected: "nothing".to_string(),
                got: json_type_name(node).to_string(),
            });
        }
        Schema::Boolean => {
            if !matches!(node, Node::Bool(_)) {
                context.add(type_mismatch("boolean", node));
            }
        }
        Schema::Null => {
            if !matches!(node, Node::Null) {
                context.add(type_mismatch("null", node));
            }
        }
        Schema::Integer(s) => validate_integer(node, s, context),
        Schema::Number(s) => validate_number(node, s, context),
        Schema::String(s) => validate_string(node, s, context),
        Schema::Array(s) => validate_array(node, s, context),
        Schema::Object(s) => validate_object(node, s, context),
        Schema::Enum(s) => validate_enum(node, s, context),
        Schema::AnyOf(alternatives) => validate_any_of(node, alternatives, context),
        Schema::OneOf(alternatives) => validate_one_of(node, alternatives, context),
        Schema::AllOf(alternatives) => {
            for alternative in alternatives {
                validate_node(node, alternative, context);
            }
        }
        Schema::Ref(reference) => {
            // A ref re-entered at the same instance location would never
            // consume input; descending into a child clears the set.
            if context.active_refs.iter().any(|r| r == reference) {
                context.add(ViolationKind::CircularReference {
                    ref_id: reference.clone(),
                });
                return;
            }
            match context.registry.resolve(reference) {
                Some(resolved) => {
                    // Clone breaks the borrow on the registry; schemas are
                    // small compiled trees.
                    let resolved = resolved.clone();
                    context.active_refs.push(reference.clone());
                    validate_node(node, &resolved, context);
                    context.active_refs.pop();
                }
                None => context.add(ViolationKind::UnresolvedReference {
                    ref_id: reference.clone(),
                }),
            }
        }
    }
}

fn type_mismatch(expected: &str, node: &Node) -> ViolationKind {
    ViolationKind::TypeMismatch {
        expected: expected.to_string(),
        got: json_type_name(node).to_string(),
    }
}

/// The JSON-Schema type name for a node. Tagged scalars validate as the
/// string they carry.
fn json_type_name(node: &Node) -> &'static str {
    match node {
        Node::Null => "null",
        Node::Bool(_) => "boolean",
        Node::Int(_) => "integer",
        Node::Float(_) => "number",
        Node::Str(_) | Node::Tagged(_) => "string",
        Node::Seq(_) => "array",
        Node::Map(_) => "object",
    }
}

fn validate_integer(node: &Node, schema: &NumberSchema, context: &mut ValidationContext) {
    let value = match node {
        Node::Int(i) => *i as f64,
        Node::Float(f) if f.fract() == 0.0 => *f,
        _ => {
            context.add(type_mismatch("integer", node));
            return;
        }
    };
    check_range(value, schema, context);
}

fn validate_number(node: &Node, schema: &NumberSchema, context: &mut ValidationContext) {
    let value = match node {
        Node::Int(i) => *i as f64,
        Node::Float(f) => *f,
        _ => {
            context.add(type_mismatch("number", node));
            return;
        }
    };
    check_range(value, schema, context);
}

fn check_range(value: f64, schema: &NumberSchema, context: &mut ValidationContext) {
    if let Some(minimum) = schema.minimum
        && value < minimum
    {
        context.add(ViolationKind::NumberOutOfRange {
            value,
            minimum: Some(minimum),
            maximum: None,
        });
    }
    if let Some(maximum) = schema.maximum
        && value > maximum
    {
        context.add(ViolationKind::NumberOutOfRange {
            value,
            minimum: None,
            maximum: Some(maximum),
        });
    }
}

fn validate_string(node: &Node, schema: &StringSchema, context: &mut ValidationContext) {
    let text = match node {
        Node::Str(s) => s.as_str(),
        Node::Tagged(tagged) => tagged.payload.as_str(),
        _ => {
            context.add(type_mismatch("string", node));
            return;
        }
    };

    let length = text.chars().count();
    if let Some(min) = schema.min_length
        && length < min
    {
        context.add(ViolationKind::StringLengthInvalid {
            length,
            min_length: Some(min),
            max_length: None,
        });
    }
    if let Some(max) = schema.max_length
        && length > max
    {
        context.add(ViolationKind::StringLengthInvalid {
            length,
            min_length: None,
            max_length: Some(max),
        });
    }
    if let Some(pattern) = &schema.pattern
        && !pattern.is_match(text)
    {
        context.add(ViolationKind::StringPatternMismatch {
            value: text.to_string(),
            pattern: pattern.as_str().to_string(),
        });
    }
}

fn validate_array(node: &Node, schema: &ArraySchema, context: &mut ValidationContext) {
    let Node::Seq(items) = node else {
        context.add(type_mismatch("array", node));
        return;
    };

    if let Some(min) = schema.min_items
        && items.len() < min
    {
        context.add(ViolationKind::ArrayLengthInvalid {
            length: items.len(),
            min_items: Some(min),
            max_items: None,
        });
    }
    if let Some(max) = schema.max_items
        && items.len() > max
    {
        context.add(ViolationKind::ArrayLengthInvalid {
            length: items.len(),
            min_items: None,
            max_items: Some(max),
        });
    }

    if let Some(item_schema) = &schema.items {
        for (index, item) in items.iter().enumerate() {
            context.with_index(index, |ctx| validate_node(item, item_schema, ctx));
        }
    }
}

fn validate_object(node: &Node, schema: &ObjectSchema, context: &mut ValidationContext) {
    let Node::Map(map) = node else {
        context.add(type_mismatch("object", node));
        return;
    };

    for property in &schema.required {
        if !map.contains_key(property) {
            context.add(ViolationKind::MissingRequiredProperty {
                property: property.clone(),
            });
        }
    }

    for (key, value) in map {
        if let Some(prop_schema) = schema.properties.get(key) {
            context.with_key(key, |ctx| validate_node(value, prop_schema, ctx));
            continue;
        }
        match &schema.additional {
            AdditionalProperties::Allowed => {}
            AdditionalProperties::Forbidden => {
                context.add(ViolationKind::UnknownProperty {
                    property: key.clone(),
                });
            }
            AdditionalProperties::Schema(extra_schema) => {
                context.with_key(key, |ctx| validate_node(value, extra_schema, ctx));
            }
        }
    }
}

fn validate_enum(node: &Node, schema: &EnumSchema, context: &mut ValidationContext) {
    if schema.allowed.iter().any(|v| node_matches_json(node, v)) {
        return;
    }
    context.add(ViolationKind::InvalidEnumValue {
        value: node.to_string(),
        allowed: schema.allowed.iter().map(json_display).collect(),
    });
}

fn validate_any_of(node: &Node, alternatives: &[Schema], context: &mut ValidationContext) {
    for alternative in alternatives {
        if matches_quietly(node, alternative, context) {
            return;
        }
    }
    context.add(ViolationKind::NoAlternativeMatched {
        alternatives: alternatives.len(),
    });
}

fn validate_one_of(node: &Node, alternatives: &[Schema], context: &mut ValidationContext) {
    let matched = alternatives
        .iter()
        .filter(|alternative| matches_quietly(node, alternative, context))
        .count();
    if matched != 1 {
        context.add(ViolationKind::NotExactlyOneMatch { matched });
    }
}

/// Run a sub-validation without contributing to the caller's violations.
/// The caller's active refs carry over so combinator cycles still trip
/// the guard.
fn matches_quietly(node: &Node, schema: &Schema, context: &ValidationContext) -> bool {
    let mut scratch = ValidationContext::new(context.registry);
    scratch.active_refs = context.active_refs.clone();
    validate_node(node, schema, &mut scratch);
    scratch.violations.is_empty()
}

/// Structural equality between a tree node and a JSON value, with
/// integers and floats compared numerically.
pub fn node_matches_json(node: &Node, value: &Value) -> bool {
    match (node, value) {
        (Node::Null, Value::Null) => true,
        (Node::Bool(a), Value::Bool(b)) => a == b,
        (Node::Int(a), Value::Number(b)) => b.as_f64() == Some(*a as f64),
        (Node::Float(a), Value::Number(b)) => b.as_f64() == Some(*a),
        (Node::Str(a), Value::String(b)) => a == b,
        (Node::Seq(a), Value::Array(b)) => {
            a.len() == b.len()
                && a.iter()
                    .zip(b.iter())
                    .all(|(n, v)| node_matches_json(n, v))
        }
        (Node::Map(a), Value::Object(b)) => {
            a.len() == b.len()
                && a.iter().all(|(key, n)| {
                    b.get(key).is_some_and(|v| node_matches_json(n, v))
                })
        }
        _ => false,
    }
}

fn json_display(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::compile;
    use serde_json::json;
    use wxflow_tree::Node;

    fn check(doc: Value, tree: Node) -> Vec<Violation> {
        let (schema, registry) = compile(&doc).unwrap();
        validate(&tree, &schema, &registry)
    }

    fn fcst_schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "length": {"type": "integer", "minimum": 1},
                "grid": {"type": "string", "pattern": "^c[0-9]+$"},
                "output": {"enum": ["netcdf", "grib2"]}
            },
            "required": ["length", "grid"],
            "additionalProperties": false
        })
    }

    #[test]
    fn test_valid_tree() {
        let tree = Node::from([
            ("length", Node::Int(12)),
            ("grid", Node::Str("c384".into())),
            ("output", Node::Str("netcdf".into())),
        ]);
        assert!(check(fcst_schema(), tree).is_empty());
    }

    #[test]
    fn test_all_violations_collected() {
        // Missing required, bad type, bad enum, unknown key: all four
        // reported at once.
        let tree = Node::from([
            ("length", Node::Str("twelve".into())),
            ("output", Node::Str("csv".into())),
            ("oops", Node::Int(1)),
        ]);
        let violations = check(fcst_schema(), tree);
        assert_eq!(violations.len(), 4);
        assert!(violations.iter().any(|v| matches!(
            v.kind,
            ViolationKind::MissingRequiredProperty { ref property } if property == "grid"
        )));
        assert!(violations.iter().any(|v| matches!(
            v.kind,
            ViolationKind::UnknownProperty { ref property } if property == "oops"
        )));
    }

    #[test]
    fn test_violation_paths() {
        let tree = Node::from([
            ("length", Node::Int(0)),
            ("grid", Node::Str("C384".into())),
        ]);
        let violations = check(fcst_schema(), tree);
        let paths: Vec<String> = violations
            .iter()
            .map(|v| v.instance_path.to_string())
            .collect();
        assert!(paths.contains(&"length".to_string()));
        assert!(paths.contains(&"grid".to_string()));
    }

    #[test]
    fn test_nested_array_path() {
        let doc = json!({
            "type": "object",
            "properties": {
                "members": {"type": "array", "items": {"type": "integer"}}
            }
        });
        let tree = Node::from([(
            "members",
            Node::Seq(vec![Node::Int(1), Node::Str("two".into()), Node::Int(3)]),
        )]);
        let violations = check(doc, tree);
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].instance_path.to_string(), "members.[1]");
    }

    #[test]
    fn test_any_of() {
        let doc = json!({"anyOf": [{"type": "integer"}, {"type": "string"}]});
        assert!(check(doc.clone(), Node::Int(1)).is_empty());
        assert!(check(doc.clone(), Node::Str("x".into())).is_empty());
        let violations = check(doc, Node::Bool(true));
        assert!(matches!(
            violations[0].kind,
            ViolationKind::NoAlternativeMatched { alternatives: 2 }
        ));
    }

    #[test]
    fn test_ref_resolution() {
        let doc = json!({
            "$defs": {"hours": {"type": "integer", "minimum": 0, "maximum": 384}},
            "type": "object",
            "properties": {"length": {"$ref": "#/$defs/hours"}}
        });
        assert!(check(doc.clone(), Node::from([("length", Node::Int(120))])).is_empty());
        let violations = check(doc, Node::from([("length", Node::Int(999))]));
        assert_eq!(violations.len(), 1);
    }

    #[test]
    fn test_unresolved_ref() {
        let doc = json!({"$ref": "#/$defs/nope"});
        let violations = check(doc, Node::Null);
        assert!(matches!(
            violations[0].kind,
            ViolationKind::UnresolvedReference { .. }
        ));
    }

    #[test]
    fn test_self_referential_ref_reports_cycle() {
        let doc = json!({
            "$defs": {"a": {"$ref": "#/$defs/a"}},
            "$ref": "#/$defs/a"
        });
        let violations = check(doc, Node::Int(1));
        assert!(matches!(
            &violations[0].kind,
            ViolationKind::CircularReference { ref_id } if ref_id == "#/$defs/a"
        ));
    }

    #[test]
    fn test_cycle_through_any_of_reported() {
        let doc = json!({
            "$defs": {"a": {"anyOf": [{"$ref": "#/$defs/a"}]}},
            "$ref": "#/$defs/a"
        });
        // The cycle never matches, so the combinator reports a miss
        // instead of overflowing the stack.
        assert!(!check(doc, Node::Int(1)).is_empty());
    }

    #[test]
    fn test_recursive_schema_on_nested_data() {
        // Recursion that consumes input is legitimate.
        let doc = json!({
            "$defs": {
                "task": {
                    "type": "object",
                    "properties": {
                        "name": {"type": "string"},
                        "deps": {"type": "array", "items": {"$ref": "#/$defs/task"}}
                    },
                    "required": ["name"]
                }
            },
            "$ref": "#/$defs/task"
        });
        let tree = Node::from([
            ("name", Node::Str("post".into())),
            (
                "deps",
                Node::Seq(vec![Node::from([("name", Node::Str("fcst".into()))])]),
            ),
        ]);
        assert!(check(doc.clone(), tree).is_empty());
        let bad = Node::from([
            ("name", Node::Str("post".into())),
            ("deps", Node::Seq(vec![Node::from([("n", Node::Int(1))])])),
        ]);
        assert!(!check(doc, bad).is_empty());
    }

    #[test]
    fn test_integral_float_is_integer() {
        let doc = json!({"type": "integer"});
        assert!(check(doc.clone(), Node::Float(3.0)).is_empty());
        assert!(!check(doc, Node::Float(3.5)).is_empty());
    }

    #[test]
    fn test_unrendered_template_is_string() {
        let doc = json!({"type": "integer"});
        let violations = check(doc, Node::Str("{{ n }}".into()));
        assert!(matches!(
            &violations[0].kind,
            ViolationKind::TypeMismatch { got, .. } if got == "string"
        ));
    }
}
