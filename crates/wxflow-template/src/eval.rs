//! Template evaluation over a [`Context`].

use indexmap::IndexMap;

use crate::ast::{BinaryOp, Expr, TemplateNode, UnaryOp};
use crate::error::{TemplateError, TemplateResult};
use crate::filters;
use crate::value::{Context, Value};

pub(crate) fn render_nodes(nodes: &[TemplateNode], context: &Context) -> TemplateResult<String> {
    let mut ctx = context.clone();
    let mut out = String::new();
    render_into(nodes, &mut ctx, &mut out)?;
    Ok(out)
}

fn render_into(
    nodes: &[TemplateNode],
    ctx: &mut Context,
    out: &mut String,
) -> TemplateResult<()> {
    for node in nodes {
        match node {
            TemplateNode::Literal(text) => out.push_str(text),
            TemplateNode::Expr(expr) => {
                let value = eval_expr(expr, ctx)?;
                out.push_str(&value.render());
            }
            TemplateNode::If {
                branches,
                else_branch,
            } => {
                let mut taken = false;
                for (cond, body) in branches {
                    if eval_expr(cond, ctx)?.is_truthy() {
                        render_into(body, ctx, out)?;
                        taken = true;
                        break;
                    }
                }
                if !taken && let Some(body) = else_branch {
                    render_into(body, ctx, out)?;
                }
            }
            TemplateNode::For {
                var,
                iterable,
                body,
            } => {
                let items = match eval_expr(iterable, ctx)? {
                    Value::List(items) => items,
                    Value::Map(map) => map.into_keys().map(Value::Str).collect(),
                    other => {
                        return Err(TemplateError::Type {
                            message: format!("cannot iterate over {}", other.type_name()),
                        });
                    }
                };
                for item in items {
                    let mut scope = IndexMap::new();
                    scope.insert(var.clone(), item);
                    ctx.push_scope(scope);
                    let result = render_into(body, ctx, out);
                    ctx.pop_scope();
                    result?;
                }
            }
        }
    }
    Ok(())
}

pub(crate) fn eval_expr(expr: &Expr, ctx: &Context) -> TemplateResult<Value> {
    match expr {
        Expr::Int(i) => Ok(Value::Int(*i)),
        Expr::Float(f) => Ok(Value::Float(*f)),
        Expr::Str(s) => Ok(Value::Str(s.clone())),
        Expr::Bool(b) => Ok(Value::Bool(*b)),
        Expr::Null => Ok(Value::Null),
        Expr::Var(path) => lookup(path, ctx),
        Expr::Unary(op, inner) => {
            let value = eval_expr(inner, ctx)?;
            match op {
                UnaryOp::Not => Ok(Value::Bool(!value.is_truthy())),
                UnaryOp::Neg => match value {
                    Value::Int(i) => Ok(Value::Int(-i)),
                    Value::Float(f) => Ok(Value::Float(-f)),
                    other => Err(TemplateError::Type {
                        message: format!("cannot negate {}", other.type_name()),
                    }),
                },
            }
        }
        Expr::Binary(op, lhs, rhs) => eval_binary(*op, lhs, rhs, ctx),
        Expr::Filter { input, name, args } => {
            let input = eval_expr(input, ctx)?;
            let args = args
                .iter()
                .map(|a| eval_expr(a, ctx))
                .collect::<TemplateResult<Vec<_>>>()?;
            filters::apply(name, input, &args)
        }
    }
}

fn lookup(path: &[String], ctx: &Context) -> TemplateResult<Value> {
    let undefined = || TemplateError::Undefined {
        name: path.join("."),
    };
    let mut current = ctx.get(&path[0]).ok_or_else(undefined)?.clone();
    for segment in &path[1..] {
        let Value::Map(map) = current else {
            return Err(undefined());
        };
        current = map.get(segment).ok_or_else(undefined)?.clone();
    }
    Ok(current)
}

fn eval_binary(op: BinaryOp, lhs: &Expr, rhs: &Expr, ctx: &Context) -> TemplateResult<Value> {
    // Short-circuit the logical operators: the untaken side may
    // reference names the context does not hold yet.
    match op {
        BinaryOp::And => {
            let lhs = eval_expr(lhs, ctx)?;
            if !lhs.is_truthy() {
                return Ok(lhs);
            }
            return eval_expr(rhs, ctx);
        }
        BinaryOp::Or => {
            let lhs = eval_expr(lhs, ctx)?;
            if lhs.is_truthy() {
                return Ok(lhs);
            }
            return eval_expr(rhs, ctx);
        }
        _ => {}
    }

    let lhs = eval_expr(lhs, ctx)?;
    let rhs = eval_expr(rhs, ctx)?;

    match op {
        BinaryOp::Add => arith(lhs, rhs, "+", |a, b| a.checked_add(b), |a, b| a + b),
        BinaryOp::Sub => arith(lhs, rhs, "-", |a, b| a.checked_sub(b), |a, b| a - b),
        BinaryOp::Mul => arith(lhs, rhs, "*", |a, b| a.checked_mul(b), |a, b| a * b),
        BinaryOp::Div => {
            // True division always yields a float, as in Jinja2.
            let (a, b) = float_pair(lhs, rhs, "/")?;
            if b == 0.0 {
                return Err(TemplateError::ZeroDivision);
            }
            Ok(Value::Float(a / b))
        }
        BinaryOp::FloorDiv => match (lhs, rhs) {
            (Value::Int(_), Value::Int(0)) => Err(TemplateError::ZeroDivision),
            (Value::Int(a), Value::Int(b)) => Ok(Value::Int(a.div_euclid(b))),
            (a, b) => {
                let (a, b) = float_pair(a, b, "//")?;
                if b == 0.0 {
                    return Err(TemplateError::ZeroDivision);
                }
                Ok(Value::Float((a / b).floor()))
            }
        },
        BinaryOp::Mod => match (lhs, rhs) {
            (Value::Int(_), Value::Int(0)) => Err(TemplateError::ZeroDivision),
            (Value::Int(a), Value::Int(b)) => Ok(Value::Int(a.rem_euclid(b))),
            (a, b) => {
                let (a, b) = float_pair(a, b, "%")?;
                if b == 0.0 {
                    return Err(TemplateError::ZeroDivision);
                }
                Ok(Value::Float(a.rem_euclid(b)))
            }
        },
        BinaryOp::Concat => Ok(Value::Str(format!("{}{}", lhs.render(), rhs.render()))),
        BinaryOp::Eq => Ok(Value::Bool(values_equal(&lhs, &rhs))),
        BinaryOp::Ne => Ok(Value::Bool(!values_equal(&lhs, &rhs))),
        BinaryOp::Lt => compare(lhs, rhs, "<", |o| o == std::cmp::Ordering::Less),
        BinaryOp::Le => compare(lhs, rhs, "<=", |o| o != std::cmp::Ordering::Greater),
        BinaryOp::Gt => compare(lhs, rhs, ">", |o| o == std::cmp::Ordering::Greater),
        BinaryOp::Ge => compare(lhs, rhs, ">=", |o| o != std::cmp::Ordering::Less),
        BinaryOp::And | BinaryOp::Or => unreachable!("handled above"),
    }
}

fn arith(
    lhs: Value,
    rhs: Value,
    op: &str,
    int_op: impl Fn(i64, i64) -> Option<i64>,
    float_op: impl Fn(f64, f64) -> f64,
) -> TemplateResult<Value> {
    match (&lhs, &rhs) {
        (Value::Int(a), Value::Int(b)) => {
            int_op(*a, *b).map(Value::Int).ok_or_else(|| TemplateError::Type {
                message: format!("integer overflow in '{a} {op} {b}'"),
            })
        }
        _ => {
            let (a, b) = float_pair(lhs, rhs, op)?;
            Ok(Value::Float(float_op(a, b)))
        }
    }
}

fn float_pair(lhs: Value, rhs: Value, op: &str) -> TemplateResult<(f64, f64)> {
    match (lhs.as_f64(), rhs.as_f64()) {
        (Some(a), Some(b)) => Ok((a, b)),
        _ => Err(TemplateError::Type {
            message: format!(
                "unsupported operand types for '{op}': {} and {}",
                lhs.type_name(),
                rhs.type_name()
            ),
        }),
    }
}

fn values_equal(lhs: &Value, rhs: &Value) -> bool {
    match (lhs.as_f64(), rhs.as_f64()) {
        (Some(a), Some(b)) => a == b,
        _ => lhs == rhs,
    }
}

fn compare(
    lhs: Value,
    rhs: Value,
    op: &str,
    check: impl Fn(std::cmp::Ordering) -> bool,
) -> TemplateResult<Value> {
    let ordering = match (&lhs, &rhs) {
        (Value::Str(a), Value::Str(b)) => Some(a.cmp(b)),
        _ => match (lhs.as_f64(), rhs.as_f64()) {
            (Some(a), Some(b)) => a.partial_cmp(&b),
            _ => None,
        },
    };
    match ordering {
        Some(ordering) => Ok(Value::Bool(check(ordering))),
        None => Err(TemplateError::Type {
            message: format!(
                "cannot compare {} {op} {}",
                lhs.type_name(),
                rhs.type_name()
            ),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::Template;

    fn ctx(pairs: &[(&str, Value)]) -> Context {
        let mut ctx = Context::new();
        for (k, v) in pairs {
            ctx.insert(*k, v.clone());
        }
        ctx
    }

    fn render(src: &str, ctx: &Context) -> TemplateResult<String> {
        Template::compile(src)?.render(ctx)
    }

    #[test]
    fn test_variable_substitution() {
        let ctx = ctx(&[("cycle", Value::Str("2024052512".into()))]);
        assert_eq!(
            render("gfs.t{{ cycle }}z", &ctx).unwrap(),
            "gfs.t2024052512z"
        );
    }

    #[test]
    fn test_nested_lookup() {
        let mut inner = IndexMap::new();
        inner.insert("res".to_string(), Value::Str("c384".into()));
        let ctx = ctx(&[("grid", Value::Map(inner))]);
        assert_eq!(render("{{ grid.res }}", &ctx).unwrap(), "c384");
    }

    #[test]
    fn test_undefined_variable() {
        let err = render("{{ missing }}", &Context::new()).unwrap_err();
        assert_eq!(
            err,
            TemplateError::Undefined {
                name: "missing".into()
            }
        );
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_int_division_yields_float() {
        let ctx = Context::new();
        assert_eq!(render("{{ 7 / 2 }}", &ctx).unwrap(), "3.5");
        assert_eq!(render("{{ 7 // 2 }}", &ctx).unwrap(), "3");
    }

    #[test]
    fn test_zero_division() {
        let err = render("{{ 1 / 0 }}", &Context::new()).unwrap_err();
        assert_eq!(err, TemplateError::ZeroDivision);
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_concat_renders_operands() {
        let ctx = ctx(&[("n", Value::Int(3))]);
        assert_eq!(render("{{ 'mem' ~ n }}", &ctx).unwrap(), "mem3");
    }

    #[test]
    fn test_if_branches() {
        let t = "{% if hours > 6 %}long{% else %}short{% endif %}";
        assert_eq!(
            render(t, &ctx(&[("hours", Value::Int(12))])).unwrap(),
            "long"
        );
        assert_eq!(
            render(t, &ctx(&[("hours", Value::Int(3))])).unwrap(),
            "short"
        );
    }

    #[test]
    fn test_for_over_list() {
        let ctx = ctx(&[(
            "members",
            Value::List(vec![Value::Int(1), Value::Int(2), Value::Int(3)]),
        )]);
        assert_eq!(
            render("{% for m in members %}mem{{ m }} {% endfor %}", &ctx).unwrap(),
            "mem1 mem2 mem3 "
        );
    }

    #[test]
    fn test_loop_variable_scoped() {
        let ctx = ctx(&[
            ("m", Value::Str("outer".into())),
            ("xs", Value::List(vec![Value::Int(1)])),
        ]);
        assert_eq!(
            render("{% for m in xs %}{{ m }}{% endfor %}{{ m }}", &ctx).unwrap(),
            "1outer"
        );
    }

    #[test]
    fn test_logical_short_circuit() {
        // `missing` must not be evaluated when the left side decides.
        let ctx = ctx(&[("ready", Value::Bool(true))]);
        assert_eq!(render("{{ ready or missing }}", &ctx).unwrap(), "true");
    }

    #[test]
    fn test_filter_in_expression() {
        let ctx = ctx(&[("name", Value::Str("gfs".into()))]);
        assert_eq!(render("{{ name | upper }}", &ctx).unwrap(), "GFS");
    }

    #[test]
    fn test_type_error_is_recoverable() {
        let ctx = ctx(&[("a", Value::Str("x".into()))]);
        let err = render("{{ a - 1 }}", &ctx).unwrap_err();
        assert!(matches!(err, TemplateError::Type { .. }));
        assert!(err.is_recoverable());
    }
}
