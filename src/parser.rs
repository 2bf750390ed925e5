// src/parser.rs
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("invalid token syntax: {0}")]
    InvalidSyntax(String),
    #[error("token has no category")]
    MissingCategory,
}

/// A matched token and its segments. Lives for one substitution only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub raw: String,
    pub segments: Vec<String>,
}

impl Token {
    pub fn category(&self) -> &str {
        &self.segments[0]
    }
}

/// `{{metadata::<category>[=<instance>]::<field>}}` after parsing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamespacedToken {
    pub raw: String,
    pub category: String,
    pub instance: Option<u64>,
    pub field: String,
}

/// Split a simple-grammar body on `_`.
pub fn parse_simple(raw: &str, body: &str) -> Result<Token, ParseError> {
    let mut p = Parser::new(body);
    let mut segments = Vec::new();
    loop {
        let seg = p.capture_until_str("_");
        segments.push(seg.trim().to_string());
        if !p.consume_str("_") {
            break;
        }
    }
    if segments.first().map_or(true, |c| c.is_empty()) {
        return Err(ParseError::MissingCategory);
    }
    Ok(Token { raw: raw.to_string(), segments })
}

/// Parse the two captures of a namespaced token.
pub fn parse_namespaced(raw: &str, context: &str, field: &str) -> Result<NamespacedToken, ParseError> {
    let mut p = Parser::new(context.trim());
    let category = p.parse_name().map_err(|_| ParseError::MissingCategory)?;
    let instance = if p.consume_char('=') { Some(p.parse_uint()?) } else { None };
    if !p.eof() {
        return Err(ParseError::InvalidSyntax(format!("trailing input in `{context}`")));
    }

    let mut p = Parser::new(field.trim());
    let name = p.parse_identifier()?;
    if !p.eof() {
        return Err(ParseError::InvalidSyntax(format!("trailing input in `{field}`")));
    }
    Ok(NamespacedToken { raw: raw.to_string(), category, instance, field: name })
}

pub struct Parser<'a> {
    s: &'a str,
    i: usize,
}

impl<'a> Parser<'a> {
    pub fn new(s: &'a str) -> Self {
        Self { s, i: 0 }
    }

    pub fn parse_identifier(&mut self) -> Result<String, ParseError> {
        self.take_while(|c| c == '_' || c.is_ascii_alphanumeric(), "identifier expected")
    }

    /// Letters and underscores only, the shape of a context name.
    pub fn parse_name(&mut self) -> Result<String, ParseError> {
        self.take_while(|c| c == '_' || c.is_ascii_alphabetic(), "name expected")
    }

    pub fn parse_uint(&mut self) -> Result<u64, ParseError> {
        let digits = self.take_while(|c| c.is_ascii_digit(), "expected integer")?;
        digits
            .parse::<u64>()
            .map_err(|_| ParseError::InvalidSyntax("bad integer".into()))
    }

    /// Everything up to `end` (or the rest of the input); never fails.
    pub fn capture_until_str(&mut self, end: &str) -> &'a str {
        let start = self.i;
        let len = self.s[start..].find(end).unwrap_or(self.s.len() - start);
        self.i += len;
        &self.s[start..self.i]
    }

    pub fn consume_char(&mut self, c: char) -> bool {
        if self.peek_char() == Some(c) {
            self.i += c.len_utf8();
            true
        } else {
            false
        }
    }

    pub fn consume_str(&mut self, lit: &str) -> bool {
        if self.peek_str(lit) {
            self.i += lit.len();
            true
        } else {
            false
        }
    }

    pub fn peek_char(&self) -> Option<char> {
        self.s[self.i..].chars().next()
    }

    pub fn peek_str(&self, lit: &str) -> bool {
        self.s[self.i..].starts_with(lit)
    }

    pub fn eof(&self) -> bool {
        self.i >= self.s.len()
    }

    fn take_while<F>(&mut self, pred: F, what: &str) -> Result<String, ParseError>
    where
        F: Fn(char) -> bool,
    {
        let start = self.i;
        while let Some(c) = self.peek_char() {
            if pred(c) {
                self.i += c.len_utf8();
            } else {
                break;
            }
        }
        if self.i == start {
            return Err(ParseError::InvalidSyntax(what.into()));
        }
        Ok(self.s[start..self.i].to_string())
    }
}
