//! Minimal S-expression reader for KiCad files.
//!
//! KiCad netlists (`kicadsexpr`) and schematics (`.kicad_sch`) share the same
//! lexical structure: parenthesised lists of bare symbols and quoted strings.

use std::fmt;
use std::iter::Peekable;
use std::str::CharIndices;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum ParseError {
    #[error("Unexpected end of input")]
    UnexpectedEof,
    #[error("Unexpected token at byte {0}: {1}")]
    UnexpectedToken(usize, String),
    #[error("Unterminated string starting at byte {0}")]
    UnterminatedString(usize),
}

#[derive(Debug, Clone, PartialEq)]
pub enum SExp {
    Atom(String),
    List(Vec<SExp>),
}

impl SExp {
    pub fn as_atom(&self) -> Option<&str> {
        match self {
            SExp::Atom(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[SExp]> {
        match self {
            SExp::List(items) => Some(items),
            _ => None,
        }
    }

    /// Leading symbol of a list: `net` for `(net (code 1) ...)`.
    pub fn head(&self) -> Option<&str> {
        self.as_list()
            .and_then(|items| items.first())
            .and_then(|first| first.as_atom())
    }

    /// Items after the head symbol.
    pub fn args(&self) -> &[SExp] {
        match self.as_list() {
            Some(items) if !items.is_empty() => &items[1..],
            _ => &[],
        }
    }

    /// First direct child list whose head is `key`.
    pub fn child(&self, key: &str) -> Option<&SExp> {
        self.args().iter().find(|item| item.head() == Some(key))
    }

    /// All direct child lists whose head is `key`, in document order.
    pub fn children(&self, key: &str) -> Vec<&SExp> {
        self.args()
            .iter()
            .filter(|item| item.head() == Some(key))
            .collect()
    }

    /// Atom following the head of the first `(key value ...)` child.
    pub fn value(&self, key: &str) -> Option<&str> {
        self.child(key)
            .and_then(|c| c.args().first())
            .and_then(|v| v.as_atom())
    }

    /// `true` if a bare `(key)` flag or `key` atom is present among the children.
    pub fn has_flag(&self, key: &str) -> bool {
        self.args()
            .iter()
            .any(|item| item.as_atom() == Some(key) || item.head() == Some(key))
    }
}

impl fmt::Display for SExp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SExp::Atom(s) => {
                let needs_quotes = s.is_empty()
                    || s.chars()
                        .any(|c| c.is_whitespace() || c == '(' || c == ')' || c == '"');
                if needs_quotes {
                    write!(f, "\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\""))
                } else {
                    write!(f, "{}", s)
                }
            }
            SExp::List(items) => {
                write!(f, "(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, ")")
            }
        }
    }
}

pub struct SExpParser<'a> {
    chars: Peekable<CharIndices<'a>>,
    len: usize,
}

impl<'a> SExpParser<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            chars: input.char_indices().peekable(),
            len: input.len(),
        }
    }

    /// Parse a single top-level expression. Trailing content is ignored.
    pub fn parse(&mut self) -> Result<SExp, ParseError> {
        self.skip_whitespace();
        match self.chars.peek() {
            None => Err(ParseError::UnexpectedEof),
            Some(_) => self.parse_sexp(),
        }
    }

    fn parse_sexp(&mut self) -> Result<SExp, ParseError> {
        self.skip_whitespace();
        match self.chars.peek().copied() {
            None => Err(ParseError::UnexpectedEof),
            Some((_, '(')) => self.parse_list(),
            Some((pos, ')')) => Err(ParseError::UnexpectedToken(pos, ")".to_string())),
            Some((pos, '"')) => self.parse_string(pos),
            Some(_) => self.parse_symbol(),
        }
    }

    fn parse_list(&mut self) -> Result<SExp, ParseError> {
        self.chars.next();
        let mut items = Vec::new();

        loop {
            self.skip_whitespace();
            match self.chars.peek() {
                None => return Err(ParseError::UnexpectedEof),
                Some((_, ')')) => {
                    self.chars.next();
                    return Ok(SExp::List(items));
                }
                Some(_) => items.push(self.parse_sexp()?),
            }
        }
    }

    fn parse_string(&mut self, start: usize) -> Result<SExp, ParseError> {
        self.chars.next();
        let mut s = String::new();

        while let Some((_, ch)) = self.chars.next() {
            match ch {
                '"' => return Ok(SExp::Atom(s)),
                '\\' => match self.chars.next() {
                    Some((_, 'n')) => s.push('\n'),
                    Some((_, 't')) => s.push('\t'),
                    Some((_, 'r')) => s.push('\r'),
                    Some((_, other)) => s.push(other),
                    None => break,
                },
                _ => s.push(ch),
            }
        }

        Err(ParseError::UnterminatedString(start))
    }

    fn parse_symbol(&mut self) -> Result<SExp, ParseError> {
        let mut s = String::new();

        while let Some(&(_, ch)) = self.chars.peek() {
            if ch.is_whitespace() || ch == '(' || ch == ')' || ch == '"' {
                break;
            }
            s.push(ch);
            self.chars.next();
        }

        if s.is_empty() {
            let pos = self.chars.peek().map(|(p, _)| *p).unwrap_or(self.len);
            Err(ParseError::UnexpectedToken(pos, "empty symbol".to_string()))
        } else {
            Ok(SExp::Atom(s))
        }
    }

    fn skip_whitespace(&mut self) {
        while let Some(&(_, ch)) = self.chars.peek() {
            if !ch.is_whitespace() {
                break;
            }
            self.chars.next();
        }
    }
}

/// Parse a whole document into its root expression.
pub fn parse_document(input: &str) -> Result<SExp, ParseError> {
    SExpParser::new(input).parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_atom_and_string() {
        assert_eq!(parse_document("hello").unwrap(), SExp::Atom("hello".to_string()));
        assert_eq!(
            parse_document("\"hello world\"").unwrap(),
            SExp::Atom("hello world".to_string())
        );
    }

    #[test]
    fn test_parse_escapes() {
        let sexp = parse_document(r#""a \"quoted\" \\ value""#).unwrap();
        assert_eq!(sexp.as_atom(), Some(r#"a "quoted" \ value"#));
    }

    #[test]
    fn test_parse_nested_and_accessors() {
        let sexp = parse_document(
            r#"(net (code "1") (name "GND") (node (ref "C1") (pin "2")) (node (ref "U1") (pin "8")))"#,
        )
        .unwrap();

        assert_eq!(sexp.head(), Some("net"));
        assert_eq!(sexp.value("name"), Some("GND"));
        assert_eq!(sexp.value("code"), Some("1"));
        let refs: Vec<&str> = sexp
            .children("node")
            .into_iter()
            .filter_map(|n| n.value("ref")).collect();
        assert_eq!(refs, vec!["C1", "U1"]);
        assert!(sexp.child("missing").is_none());
    }

    #[test]
    fn test_has_flag() {
        let sexp = parse_document(r#"(symbol "power:GND" (power) (in_bom no))"#).unwrap();
        assert!(sexp.has_flag("power"));
        assert!(!sexp.has_flag("exclude_from_sim"));
    }

    #[test]
    fn test_unbalanced_input() {
        assert_eq!(parse_document("(a (b c)"), Err(ParseError::UnexpectedEof));
        assert!(matches!(
            parse_document(")"),
            Err(ParseError::UnexpectedToken(0, _))
        ));
        assert_eq!(
            parse_document("(a \"open"),
            Err(ParseError::UnterminatedString(3))
        );
        assert_eq!(parse_document("   "), Err(ParseError::UnexpectedEof));
    }

    #[test]
    fn test_display_round_trip_quotes() {
        let sexp = parse_document(r#"(name "Net-(C1-Pad1)")"#).unwrap();
        assert_eq!(sexp.to_string(), r#"(name "Net-(C1-Pad1)")"#);
    }
}
