//! Fortran namelist codec.
//!
//! Parses `&group ... /` blocks into a depth-2 tree, preserving group and
//! key order, with scalar typing for logicals, integers, and floats
//! (including `d` exponents). Serialization writes the standard form back.

use crate::{Codec, CodecError, Format};
use wxflow_tree::{Mapping, Node, fmt_float};

/// The Fortran namelist codec. Depth exactly 2.
pub struct NmlCodec;

impl Codec for NmlCodec {
    fn format(&self) -> Format {
        Format::Nml
    }

    fn parse(&self, text: &str) -> Result<Node, CodecError> {
        parse(text)
    }

    fn serialize(&self, tree: &Node, out: &mut String) -> Result<(), CodecError> {
        let groups = tree
            .as_map()
            .ok_or_else(|| CodecError::serialize("nml", "top level must be a mapping"))?;
        for (group, body) in groups {
            let entries = body.as_map().ok_or_else(|| {
                CodecError::serialize("nml", format!("group '{group}' must be a mapping"))
            })?;
            out.push_str(&format!("&{group}\n"));
            for (key, value) in entries {
                out.push_str(&format!("    {key} = {}\n", value_repr(value, group, key)?));
            }
            out.push_str("/\n");
        }
        Ok(())
    }
}

fn value_repr(value: &Node, group: &str, key: &str) -> Result<String, CodecError> {
    match value {
        Node::Null => Ok(String::new()),
        Node::Bool(true) => Ok(".true.".to_string()),
        Node::Bool(false) => Ok(".false.".to_string()),
        Node::Int(i) => Ok(i.to_string()),
        Node::Float(f) => Ok(fmt_float(*f)),
        Node::Str(s) => Ok(format!("'{}'", s.replace('\'', "''"))),
        Node::Tagged(t) => Ok(format!("'{}'", t.payload.replace('\'', "''"))),
        Node::Seq(items) => {
            let parts: Result<Vec<String>, CodecError> = items
                .iter()
                .map(|item| match item {
                    Node::Seq(_) | Node::Map(_) => Err(CodecError::serialize(
                        "nml",
                        format!("array '{group}.{key}' must hold scalars"),
                    )),
                    scalar => value_repr(scalar, group, key),
                })
                .collect();
            Ok(parts?.join(", "))
        }
        Node::Map(_) => Err(CodecError::serialize(
            "nml",
            format!("value '{group}.{key}' nests too deeply for a namelist"),
        )),
    }
}

/// Parse Fortran namelist text into a depth-2 tree.
pub fn parse(text: &str) -> Result<Node, CodecError> {
    let tokens = scan(text)?;
    let mut groups = Mapping::new();
    let mut i = 0;

    while i < tokens.len() {
        let Token::GroupStart(name) = &tokens[i] else {
            return Err(CodecError::parse(
                "nml",
                format!("expected '&group', found {}", tokens[i].describe()),
            ));
        };
        i += 1;

        let mut body = Mapping::new();
        loop {
            match tokens.get(i) {
                Some(Token::GroupEnd) => {
                    i += 1;
                    break;
                }
                Some(Token::Word(key)) if matches!(tokens.get(i + 1), Some(Token::Eq)) => {
                    let key = key.clone();
                    i += 2;
                    let value = parse_values(&tokens, &mut i);
                    body.insert(key, value);
                }
                Some(other) => {
                    return Err(CodecError::parse(
                        "nml",
                        format!("in group '{name}': expected 'key =' or '/', found {}",
                            other.describe()),
                    ));
                }
                None => {
                    return Err(CodecError::parse(
                        "nml",
                        format!("group '{name}' is not terminated with '/'"),
                    ));
                }
            }
        }
        groups.insert(name.clone(), Node::Map(body));
    }

    Ok(Node::Map(groups))
}

/// Collect the value tokens of one `key = ...` statement. Stops at the
/// next `key =`, the group terminator, or end of input.
fn parse_values(tokens: &[Token], i: &mut usize) -> Node {
    let mut values = Vec::new();
    loop {
        match tokens.get(*i) {
            Some(Token::Comma) => {
                *i += 1;
            }
            Some(Token::Word(w)) => {
                if matches!(tokens.get(*i + 1), Some(Token::Eq)) {
                    break;
                }
                values.push(scalar_from_word(w));
                *i += 1;
            }
            Some(Token::Quoted(s)) => {
                values.push(Node::Str(s.clone()));
                *i += 1;
            }
            _ => break,
        }
    }
    match values.len() {
        0 => Node::Null,
        1 => values.pop().unwrap_or(Node::Null),
        _ => Node::Seq(values),
    }
}

/// Type a bareword namelist value: logical, integer, float, else string.
fn scalar_from_word(word: &str) -> Node {
    match word.to_ascii_lowercase().as_str() {
        ".true." | ".t." => return Node::Bool(true),
        ".false." | ".f." => return Node::Bool(false),
        _ => {}
    }
    if let Ok(i) = word.parse::<i64>() {
        return Node::Int(i);
    }
    // Fortran real literals may use d/D exponents.
    let normalized = if word.bytes().any(|b| b == b'd' || b == b'D') {
        word.replace(['d', 'D'], "e")
    } else {
        word.to_string()
    };
    if normalized.bytes().any(|b| b.is_ascii_digit())
        && let Ok(f) = normalized.parse::<f64>()
    {
        return Node::Float(f);
    }
    Node::Str(word.to_string())
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    GroupStart(String),
    GroupEnd,
    Word(String),
    Quoted(String),
    Eq,
    Comma,
}

impl Token {
    fn describe(&self) -> String {
        match self {
            Token::GroupStart(name) => format!("'&{name}'"),
            Token::GroupEnd => "'/'".to_string(),
            Token::Word(w) => format!("'{w}'"),
            Token::Quoted(s) => format!("'{s}'"),
            Token::Eq => "'='".to_string(),
            Token::Comma => "','".to_string(),
        }
    }
}

fn scan(text: &str) -> Result<Vec<Token>, CodecError> {
    let mut tokens = Vec::new();
    let mut chars = text.chars().peekable();

    while let Some(&c) = chars.peek() {
        match c {
            '!' => {
                // Comment to end of line.
                for ch in chars.by_ref() {
                    if ch == '\n' {
                        break;
                    }
                }
            }
            '&' => {
                chars.next();
                let name = read_word(&mut chars);
                if name.is_empty() {
                    return Err(CodecError::parse("nml", "'&' without a group name"));
                }
                tokens.push(Token::GroupStart(name));
            }
            '/' => {
                chars.next();
                tokens.push(Token::GroupEnd);
            }
            '=' => {
                chars.next();
                tokens.push(Token::Eq);
            }
            ',' => {
                chars.next();
                tokens.push(Token::Comma);
            }
            '\'' | '"' => {
                let quote = c;
                chars.next();
                let mut s = String::new();
                loop {
                    match chars.next() {
                        Some(ch) if ch == quote => {
                            // Doubled quote escapes itself.
                            if chars.peek() == Some(&quote) {
                                chars.next();
                                s.push(quote);
                            } else {
                                break;
                            }
                        }
                        Some(ch) => s.push(ch),
                        None => {
                            return Err(CodecError::parse("nml", "unterminated string"));
                        }
                    }
                }
                tokens.push(Token::Quoted(s));
            }
            c if c.is_whitespace() => {
                chars.next();
            }
            _ => {
                let word = read_word(&mut chars);
                tokens.push(Token::Word(word));
            }
        }
    }
    Ok(tokens)
}

fn read_word(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) -> String {
    let mut word = String::new();
    while let Some(&c) = chars.peek() {
        if c.is_whitespace() || matches!(c, '=' | ',' | '/' | '!' | '&' | '\'' | '"') {
            break;
        }
        word.push(c);
        chars.next();
    }
    word
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec_for;

    #[test]
    fn test_parse_basic_group() {
        let tree = parse("&setup\n  nx = 96\n  dt = 0.5\n  restart = .true.\n/\n").unwrap();
        let setup = tree.get("setup").unwrap();
        assert_eq!(setup.get("nx"), Some(&Node::Int(96)));
        assert_eq!(setup.get("dt"), Some(&Node::Float(0.5)));
        assert_eq!(setup.get("restart"), Some(&Node::Bool(true)));
    }

    #[test]
    fn test_parse_strings_and_arrays() {
        let tree = parse("&files\n  base = 'out.nc'\n  levels = 1, 2, 3\n/\n").unwrap();
        let files = tree.get("files").unwrap();
        assert_eq!(files.get("base"), Some(&Node::from("out.nc")));
        assert_eq!(
            files.get("levels"),
            Some(&Node::Seq(vec![Node::Int(1), Node::Int(2), Node::Int(3)]))
        );
    }

    #[test]
    fn test_parse_d_exponent() {
        let tree = parse("&p\n x = 3.0d-2\n/\n").unwrap();
        assert_eq!(tree.get("p").unwrap().get("x"), Some(&Node::Float(0.03)));
    }

    #[test]
    fn test_parse_comments_and_compact_form() {
        let tree = parse("! header\n&s a=1 /\n").unwrap();
        assert_eq!(tree.get("s").unwrap().get("a"), Some(&Node::Int(1)));
    }

    #[test]
    fn test_parse_empty_value_is_null() {
        let tree = parse("&s\n a =\n b = 2\n/\n").unwrap();
        let s = tree.get("s").unwrap();
        assert_eq!(s.get("a"), Some(&Node::Null));
        assert_eq!(s.get("b"), Some(&Node::Int(2)));
    }

    #[test]
    fn test_unterminated_group() {
        assert!(parse("&s\n a = 1\n").is_err());
    }

    #[test]
    fn test_serialize_form() {
        let tree = Node::from([(
            "s",
            Node::from([
                ("a", Node::Int(2)),
                ("name", Node::from("it's")),
                ("on", Node::Bool(false)),
            ]),
        )]);
        let text = codec_for(Format::Nml).to_text(&tree).unwrap();
        assert_eq!(
            text,
            "&s\n    a = 2\n    name = 'it''s'\n    on = .false.\n/\n"
        );
    }

    #[test]
    fn test_serialize_rejects_depth_three() {
        let tree = Node::from([(
            "s",
            Node::from([("a", Node::from([("b", Node::from(1))]))]),
        )]);
        assert!(codec_for(Format::Nml).to_text(&tree).is_err());
    }

    #[test]
    fn test_roundtrip() {
        let tree = Node::from([
            (
                "model",
                Node::from([
                    ("nx", Node::Int(128)),
                    ("dt", Node::Float(1.5)),
                    ("grid", Node::from("gaussian")),
                    ("flags", Node::Seq(vec![Node::Bool(true), Node::Bool(false)])),
                ]),
            ),
            ("io", Node::from([("path", Node::from("/tmp/run"))])),
        ]);
        let text = codec_for(Format::Nml).to_text(&tree).unwrap();
        assert_eq!(parse(&text).unwrap(), tree);
    }
}
