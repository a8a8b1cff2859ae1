//! Template values and evaluation contexts.

use indexmap::IndexMap;
use wxflow_tree::{Node, fmt_float};

/// A value bound to a name during template evaluation.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<Value>),
    Map(IndexMap<String, Value>),
}

impl Value {
    /// Truthiness for conditional evaluation: false, zero, null, and
    /// empty strings/lists/maps are falsy; everything else is truthy.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Float(f) => *f != 0.0,
            Value::Str(s) => !s.is_empty(),
            Value::List(items) => !items.is_empty(),
            Value::Map(m) => !m.is_empty(),
        }
    }

    /// Render this value into template output.
    pub fn render(&self) -> String {
        match self {
            Value::Null => "None".to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Int(i) => i.to_string(),
            Value::Float(f) => fmt_float(*f),
            Value::Str(s) => s.clone(),
            Value::List(items) => {
                let parts: Vec<String> = items.iter().map(Value::render).collect();
                format!("[{}]", parts.join(", "))
            }
            Value::Map(m) => {
                let parts: Vec<String> = m
                    .iter()
                    .map(|(k, v)| format!("{k}: {}", v.render()))
                    .collect();
                format!("{{{}}}", parts.join(", "))
            }
        }
    }

    /// A short type name for diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Int(_) => "integer",
            Value::Float(_) => "float",
            Value::Str(_) => "string",
            Value::List(_) => "list",
            Value::Map(_) => "map",
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }
}

impl From<&Node> for Value {
    fn from(node: &Node) -> Value {
        match node {
            Node::Null => Value::Null,
            Node::Bool(b) => Value::Bool(*b),
            Node::Int(i) => Value::Int(*i),
            Node::Float(f) => Value::Float(*f),
            Node::Str(s) => Value::Str(s.clone()),
            // A tagged scalar seen through the context is its raw payload.
            Node::Tagged(t) => Value::Str(t.payload.clone()),
            Node::Seq(items) => Value::List(items.iter().map(Value::from).collect()),
            Node::Map(m) => Value::Map(
                m.iter()
                    .map(|(k, v)| (k.clone(), Value::from(v)))
                    .collect(),
            ),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Value {
        Value::Str(s.to_string())
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Value {
        Value::Int(i)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Value {
        Value::Bool(b)
    }
}

/// A stack of variable scopes; inner scopes shadow outer ones.
///
/// The dereferencer pushes each mapping it descends into, so sibling keys
/// resolve before anything further out. Names bound through
/// [`Context::insert_override`] sit above the whole stack: supplied
/// context beats any scope, however deep.
#[derive(Debug, Clone, Default)]
pub struct Context {
    scopes: Vec<IndexMap<String, Value>>,
    overrides: IndexMap<String, Value>,
}

impl Context {
    pub fn new() -> Self {
        Self {
            scopes: vec![IndexMap::new()],
            overrides: IndexMap::new(),
        }
    }

    /// Build a context whose base scope is a tree's mapping entries.
    pub fn from_node(node: &Node) -> Self {
        let mut base = IndexMap::new();
        if let Node::Map(m) = node {
            for (k, v) in m {
                base.insert(k.clone(), Value::from(v));
            }
        }
        Self {
            scopes: vec![base],
            overrides: IndexMap::new(),
        }
    }

    /// Bind a name in the innermost scope.
    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(key.into(), value);
        }
    }

    /// Bind a name that wins over every scope, pushed or yet to be pushed.
    pub fn insert_override(&mut self, key: impl Into<String>, value: Value) {
        self.overrides.insert(key.into(), value);
    }

    /// Push a new innermost scope.
    pub fn push_scope(&mut self, scope: IndexMap<String, Value>) {
        self.scopes.push(scope);
    }

    pub fn pop_scope(&mut self) {
        self.scopes.pop();
    }

    /// Look up a name: overrides first, then innermost scope outward.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.overrides
            .get(name)
            .or_else(|| self.scopes.iter().rev().find_map(|scope| scope.get(name)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truthiness() {
        assert!(!Value::Null.is_truthy());
        assert!(!Value::Int(0).is_truthy());
        assert!(!Value::Str(String::new()).is_truthy());
        assert!(Value::Str("false".into()).is_truthy());
        assert!(Value::Int(-1).is_truthy());
    }

    #[test]
    fn test_render() {
        assert_eq!(Value::Int(42).render(), "42");
        assert_eq!(Value::Float(2.0).render(), "2.0");
        assert_eq!(Value::Bool(true).render(), "true");
        assert_eq!(
            Value::List(vec![Value::Int(1), Value::from("a")]).render(),
            "[1, a]"
        );
    }

    #[test]
    fn test_scope_shadowing() {
        let mut ctx = Context::new();
        ctx.insert("x", Value::Int(1));
        let mut inner = IndexMap::new();
        inner.insert("x".to_string(), Value::Int(2));
        ctx.push_scope(inner);
        assert_eq!(ctx.get("x"), Some(&Value::Int(2)));
        ctx.pop_scope();
        assert_eq!(ctx.get("x"), Some(&Value::Int(1)));
    }

    #[test]
    fn test_overrides_beat_pushed_scopes() {
        let mut ctx = Context::new();
        ctx.insert("x", Value::Int(1));
        ctx.insert_override("x", Value::Int(9));
        let mut inner = IndexMap::new();
        inner.insert("x".to_string(), Value::Int(2));
        ctx.push_scope(inner);
        assert_eq!(ctx.get("x"), Some(&Value::Int(9)));
        ctx.pop_scope();
        assert_eq!(ctx.get("x"), Some(&Value::Int(9)));
    }
}
