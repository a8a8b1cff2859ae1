//! Template compilation: segmentation, expression lexing, and a
//! recursive-descent parser producing the AST in `ast.rs`.

use crate::ast::{BinaryOp, Expr, TemplateNode, UnaryOp};
use crate::error::{TemplateError, TemplateResult};
use crate::eval;
use crate::filters;
use crate::value::Context;

/// A compiled template ready for evaluation.
#[derive(Debug, Clone, PartialEq)]
pub struct Template {
    pub(crate) nodes: Vec<TemplateNode>,
}

impl Template {
    /// Compile template source.
    ///
    /// Filter names are checked here: filters are part of the template's
    /// syntax, so an unknown one fails compilation rather than rendering.
    ///
    /// # Errors
    ///
    /// Returns a parse error for malformed markers, expressions, or
    /// unbalanced control blocks, and an unregistered-filter error for a
    /// filter outside the fixed registry.
    pub fn compile(source: &str) -> TemplateResult<Self> {
        let segments = segment(source)?;
        let mut stream = segments.into_iter().peekable();
        let nodes = parse_nodes(&mut stream, None)?;
        let template = Template { nodes };
        check_filters(&template.nodes)?;
        Ok(template)
    }

    /// Render this template against a context.
    pub fn render(&self, context: &Context) -> TemplateResult<String> {
        eval::render_nodes(&self.nodes, context)
    }

    pub fn nodes(&self) -> &[TemplateNode] {
        &self.nodes
    }
}

/// Raw segments produced by scanning for `{{ }}` and `{% %}` markers.
#[derive(Debug)]
enum Segment {
    Literal(String),
    Expr(String),
    Stmt(String),
}

fn segment(source: &str) -> TemplateResult<Vec<Segment>> {
    let mut segments = Vec::new();
    let mut rest = source;

    while !rest.is_empty() {
        let next_expr = rest.find("{{");
        let next_stmt = rest.find("{%");
        let (start, close, is_expr) = match (next_expr, next_stmt) {
            (None, None) => {
                segments.push(Segment::Literal(rest.to_string()));
                break;
            }
            (Some(e), Some(s)) if e < s => (e, "}}", true),
            (Some(e), None) => (e, "}}", true),
            (_, Some(s)) => (s, "%}", false),
        };

        if start > 0 {
            segments.push(Segment::Literal(rest[..start].to_string()));
        }
        let after = &rest[start + 2..];
        let Some(end) = after.find(close) else {
            return Err(TemplateError::Parse {
                message: format!("unclosed '{}' marker", &rest[start..start + 2]),
            });
        };
        let body = after[..end].trim_matches('-').trim().to_string();
        segments.push(if is_expr {
            Segment::Expr(body)
        } else {
            Segment::Stmt(body)
        });
        rest = &after[end + 2..];
    }

    Ok(segments)
}

type SegmentStream = std::iter::Peekable<std::vec::IntoIter<Segment>>;

/// Parse segments into nodes until one of `until` keywords (or stream
/// end, when `until` is None). Returns with the terminating statement
/// still identifiable by the caller via `last_stmt`.
fn parse_nodes(
    stream: &mut SegmentStream,
    until: Option<&[&str]>,
) -> TemplateResult<Vec<TemplateNode>> {
    let mut nodes = Vec::new();

    while let Some(segment) = stream.peek() {
        match segment {
            Segment::Literal(_) => {
                if let Some(Segment::Literal(text)) = stream.next() {
                    nodes.push(TemplateNode::Literal(text));
                }
            }
            Segment::Expr(_) => {
                if let Some(Segment::Expr(body)) = stream.next() {
                    nodes.push(TemplateNode::Expr(parse_expr_str(&body)?));
                }
            }
            Segment::Stmt(body) => {
                let keyword = body.split_whitespace().next().unwrap_or("");
                if let Some(terminators) = until
                    && terminators.contains(&keyword)
                {
                    return Ok(nodes);
                }
                let Some(Segment::Stmt(body)) = stream.next() else {
                    unreachable!("peeked a statement")
                };
                nodes.push(parse_stmt(&body, stream)?);
            }
        }
    }

    if let Some(terminators) = until {
        return Err(TemplateError::Parse {
            message: format!("missing closing block (expected one of {terminators:?})"),
        });
    }
    Ok(nodes)
}

fn parse_stmt(body: &str, stream: &mut SegmentStream) -> TemplateResult<TemplateNode> {
    let keyword = body.split_whitespace().next().unwrap_or("");
    match keyword {
        "if" => parse_if(body, stream),
        "for" => parse_for(body, stream),
        other => Err(TemplateError::Parse {
            message: format!("unexpected block '{{% {other} %}}'"),
        }),
    }
}

fn parse_if(first_cond: &str, stream: &mut SegmentStream) -> TemplateResult<TemplateNode> {
    let mut branches = Vec::new();
    let mut else_branch = None;
    let mut cond_src = first_cond
        .strip_prefix("if")
        .unwrap_or(first_cond)
        .to_string();

    loop {
        let cond = parse_expr_str(cond_src.trim())?;
        let body = parse_nodes(stream, Some(&["elif", "else", "endif"]))?;
        branches.push((cond, body));

        let Some(Segment::Stmt(terminator)) = stream.next() else {
            return Err(TemplateError::Parse {
                message: "missing '{% endif %}'".to_string(),
            });
        };
        let keyword = terminator.split_whitespace().next().unwrap_or("");
        match keyword {
            "elif" => {
                cond_src = terminator
                    .strip_prefix("elif")
                    .unwrap_or(&terminator)
                    .to_string();
            }
            "else" => {
                else_branch = Some(parse_nodes(stream, Some(&["endif"]))?);
                stream.next(); // consume endif
                break;
            }
            "endif" => break,
            other => {
                return Err(TemplateError::Parse {
                    message: format!("expected 'elif', 'else', or 'endif', found '{other}'"),
                });
            }
        }
    }

    Ok(TemplateNode::If {
        branches,
        else_branch,
    })
}

fn parse_for(body: &str, stream: &mut SegmentStream) -> TemplateResult<TemplateNode> {
    let header = body.strip_prefix("for").unwrap_or(body).trim();
    let Some((var, iterable_src)) = header.split_once(" in ") else {
        return Err(TemplateError::Parse {
            message: format!("malformed loop '{{% for {header} %}}'"),
        });
    };
    let var = var.trim();
    if var.is_empty() || !var.chars().all(|c| c.is_alphanumeric() || c == '_') {
        return Err(TemplateError::Parse {
            message: format!("bad loop variable '{var}'"),
        });
    }

    let iterable = parse_expr_str(iterable_src.trim())?;
    let loop_body = parse_nodes(stream, Some(&["endfor"]))?;
    stream.next(); // consume endfor

    Ok(TemplateNode::For {
        var: var.to_string(),
        iterable,
        body: loop_body,
    })
}

/// Reject unknown filter names at compile time.
fn check_filters(nodes: &[TemplateNode]) -> TemplateResult<()> {
    for node in nodes {
        match node {
            TemplateNode::Literal(_) => {}
            TemplateNode::Expr(expr) => check_filters_expr(expr)?,
            TemplateNode::If {
                branches,
                else_branch,
            } => {
                for (cond, body) in branches {
                    check_filters_expr(cond)?;
                    check_filters(body)?;
                }
                if let Some(body) = else_branch {
                    check_filters(body)?;
                }
            }
            TemplateNode::For { iterable, body, .. } => {
                check_filters_expr(iterable)?;
                check_filters(body)?;
            }
        }
    }
    Ok(())
}

fn check_filters_expr(expr: &Expr) -> TemplateResult<()> {
    match expr {
        Expr::Filter { input, name, args } => {
            if !filters::FILTER_NAMES.contains(&name.as_str()) {
                return Err(TemplateError::UnregisteredFilter { name: name.clone() });
            }
            check_filters_expr(input)?;
            for arg in args {
                check_filters_expr(arg)?;
            }
            Ok(())
        }
        Expr::Unary(_, inner) => check_filters_expr(inner),
        Expr::Binary(_, lhs, rhs) => {
            check_filters_expr(lhs)?;
            check_filters_expr(rhs)
        }
        _ => Ok(()),
    }
}

// --- expression lexer -------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Int(i64),
    Float(f64),
    Str(String),
    Op(&'static str),
}

fn lex(src: &str) -> TemplateResult<Vec<Token>> {
    let mut tokens = Vec::new();
    let bytes = src.as_bytes();
    let mut i = 0;

    while i < bytes.len() {
        let c = bytes[i] as char;
        match c {
            ' ' | '\t' | '\n' | '\r' => i += 1,
            '\'' | '"' => {
                let quote = c;
                let start = i + 1;
                let mut j = start;
                while j < bytes.len() && bytes[j] as char != quote {
                    j += 1;
                }
                if j >= bytes.len() {
                    return Err(TemplateError::Parse {
                        message: format!("unterminated string in '{src}'"),
                    });
                }
                tokens.push(Token::Str(src[start..j].to_string()));
                i = j + 1;
            }
            '0'..='9' => {
                let start = i;
                let mut is_float = false;
                while i < bytes.len() {
                    match bytes[i] as char {
                        '0'..='9' => i += 1,
                        '.' if !is_float
                            && bytes
                                .get(i + 1)
                                .is_some_and(|b| b.is_ascii_digit()) =>
                        {
                            is_float = true;
                            i += 1;
                        }
                        _ => break,
                    }
                }
                let text = &src[start..i];
                if is_float {
                    tokens.push(Token::Float(text.parse().map_err(|_| {
                        TemplateError::Parse {
                            message: format!("bad number '{text}'"),
                        }
                    })?));
                } else {
                    tokens.push(Token::Int(text.parse().map_err(|_| {
                        TemplateError::Parse {
                            message: format!("bad number '{text}'"),
                        }
                    })?));
                }
            }
            c if c.is_alphabetic() || c == '_' => {
                let start = i;
                while i < bytes.len()
                    && ((bytes[i] as char).is_alphanumeric() || bytes[i] as char == '_')
                {
                    i += 1;
                }
                tokens.push(Token::Ident(src[start..i].to_string()));
            }
            _ => {
                let two = src.get(i..i + 2);
                let op = match two {
                    Some("==") => Some("=="),
                    Some("!=") => Some("!="),
                    Some("<=") => Some("<="),
                    Some(">=") => Some(">="),
                    Some("//") => Some("//"),
                    _ => None,
                };
                if let Some(op) = op {
                    tokens.push(Token::Op(op));
                    i += 2;
                } else {
                    let op = match c {
                        '+' => "+",
                        '-' => "-",
                        '*' => "*",
                        '/' => "/",
                        '%' => "%",
                        '~' => "~",
                        '<' => "<",
                        '>' => ">",
                        '|' => "|",
                        '(' => "(",
                        ')' => ")",
                        ',' => ",",
                        '.' => ".",
                        _ => {
                            return Err(TemplateError::Parse {
                                message: format!("unexpected character '{c}' in '{src}'"),
                            });
                        }
                    };
                    tokens.push(Token::Op(op));
                    i += 1;
                }
            }
        }
    }
    Ok(tokens)
}

// --- expression parser ------------------------------------------------------

struct ExprParser {
    tokens: Vec<Token>,
    pos: usize,
}

pub(crate) fn parse_expr_str(src: &str) -> TemplateResult<Expr> {
    if src.trim().is_empty() {
        return Err(TemplateError::Parse {
            message: "empty expression".to_string(),
        });
    }
    let mut parser = ExprParser {
        tokens: lex(src)?,
        pos: 0,
    };
    let expr = parser.or_expr()?;
    if parser.pos < parser.tokens.len() {
        return Err(TemplateError::Parse {
            message: format!("trailing tokens in expression '{src}'"),
        });
    }
    Ok(expr)
}

impl ExprParser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn peek_op(&self) -> Option<&'static str> {
        match self.peek() {
            Some(Token::Op(op)) => Some(*op),
            _ => None,
        }
    }

    fn peek_keyword(&self, kw: &str) -> bool {
        matches!(self.peek(), Some(Token::Ident(id)) if id.as_str() == kw)
    }

    fn or_expr(&mut self) -> TemplateResult<Expr> {
        let mut lhs = self.and_expr()?;
        while self.peek_keyword("or") {
            self.pos += 1;
            let rhs = self.and_expr()?;
            lhs = Expr::Binary(BinaryOp::Or, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn and_expr(&mut self) -> TemplateResult<Expr> {
        let mut lhs = self.not_expr()?;
        while self.peek_keyword("and") {
            self.pos += 1;
            let rhs = self.not_expr()?;
            lhs = Expr::Binary(BinaryOp::And, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn not_expr(&mut self) -> TemplateResult<Expr> {
        if self.peek_keyword("not") {
            self.pos += 1;
            let inner = self.not_expr()?;
            return Ok(Expr::Unary(UnaryOp::Not, Box::new(inner)));
        }
        self.comparison()
    }

    fn comparison(&mut self) -> TemplateResult<Expr> {
        let lhs = self.additive()?;
        let op = match self.peek_op() {
            Some("==") => BinaryOp::Eq,
            Some("!=") => BinaryOp::Ne,
            Some("<=") => BinaryOp::Le,
            Some(">=") => BinaryOp::Ge,
            Some("<") => BinaryOp::Lt,
            Some(">") => BinaryOp::Gt,
            _ => return Ok(lhs),
        };
        self.pos += 1;
        let rhs = self.additive()?;
        Ok(Expr::Binary(op, Box::new(lhs), Box::new(rhs)))
    }

    fn additive(&mut self) -> TemplateResult<Expr> {
        let mut lhs = self.multiplicative()?;
        loop {
            let op = match self.peek_op() {
                Some("+") => BinaryOp::Add,
                Some("-") => BinaryOp::Sub,
                Some("~") => BinaryOp::Concat,
                _ => break,
            };
            self.pos += 1;
            let rhs = self.multiplicative()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn multiplicative(&mut self) -> TemplateResult<Expr> {
        let mut lhs = self.unary()?;
        loop {
            let op = match self.peek_op() {
                Some("*") => BinaryOp::Mul,
                Some("//") => BinaryOp::FloorDiv,
                Some("/") => BinaryOp::Div,
                Some("%") => BinaryOp::Mod,
                _ => break,
            };
            self.pos += 1;
            let rhs = self.unary()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn unary(&mut self) -> TemplateResult<Expr> {
        if self.peek_op() == Some("-") {
            self.pos += 1;
            let inner = self.unary()?;
            return Ok(Expr::Unary(UnaryOp::Neg, Box::new(inner)));
        }
        self.postfix()
    }

    /// Filter chains bind tighter than arithmetic: `a + b | f` applies
    /// `f` to `b` alone.
    fn postfix(&mut self) -> TemplateResult<Expr> {
        let mut expr = self.primary()?;
        while self.peek_op() == Some("|") {
            self.pos += 1;
            let Some(Token::Ident(name)) = self.next() else {
                return Err(TemplateError::Parse {
                    message: "expected filter name after '|'".to_string(),
                });
            };
            let mut args = Vec::new();
            if self.peek_op() == Some("(") {
                self.pos += 1;
                if self.peek_op() != Some(")") {
                    loop {
                        args.push(self.or_expr()?);
                        if self.peek_op() == Some(",") {
                            self.pos += 1;
                        } else {
                            break;
                        }
                    }
                }
                if self.peek_op() != Some(")") {
                    return Err(TemplateError::Parse {
                        message: format!("missing ')' after filter '{name}' arguments"),
                    });
                }
                self.pos += 1;
            }
            expr = Expr::Filter {
                input: Box::new(expr),
                name,
                args,
            };
        }
        Ok(expr)
    }

    fn primary(&mut self) -> TemplateResult<Expr> {
        match self.next() {
            Some(Token::Int(i)) => Ok(Expr::Int(i)),
            Some(Token::Float(f)) => Ok(Expr::Float(f)),
            Some(Token::Str(s)) => Ok(Expr::Str(s)),
            Some(Token::Ident(id)) => match id.as_str() {
                "true" | "True" => Ok(Expr::Bool(true)),
                "false" | "False" => Ok(Expr::Bool(false)),
                "null" | "none" | "None" => Ok(Expr::Null),
                _ => {
                    let mut path = vec![id];
                    while self.peek_op() == Some(".") {
                        self.pos += 1;
                        let Some(Token::Ident(segment)) = self.next() else {
                            return Err(TemplateError::Parse {
                                message: "expected attribute name after '.'".to_string(),
                            });
                        };
                        path.push(segment);
                    }
                    Ok(Expr::Var(path))
                }
            },
            Some(Token::Op("(")) => {
                let inner = self.or_expr()?;
                if self.peek_op() != Some(")") {
                    return Err(TemplateError::Parse {
                        message: "missing ')'".to_string(),
                    });
                }
                self.pos += 1;
                Ok(inner)
            }
            other => Err(TemplateError::Parse {
                message: format!("unexpected token {other:?} in expression"),
            }),
        }
    }
}
