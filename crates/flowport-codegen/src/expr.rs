//! Expression translation
//!
//! Rewrites workflow expressions into pandas/numpy expressions that the
//! generated pipeline evaluates against a frame's columns:
//!
//! | Source | Target |
//! |---|---|
//! | `[Unit Price]` | `Unit_Price` |
//! | `a AND b`, `a && b` | `(a) & (b)` |
//! | `a OR b`, `a \|\| b` | `(a) \| (b)` |
//! | `NOT a`, `!a` | `~(a)` |
//! | `=`, `<>` | `==`, `!=` |
//! | `IIF(c, a, b)`, `IF c THEN a ELSE b ENDIF` | `np.where(c, a, b)` |
//! | `Null()` | `np.nan` |
//!
//! Output is printed from the syntax tree in one canonical form, and that
//! form parses back to the same tree, so translating translated text is a
//! no-op. Text that does not parse goes through [`lexical_rewrite`], which
//! is idempotent as well.

use std::fmt;

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use thiserror::Error;

/// Names a sanitized identifier may not take, compared case-insensitively
///
/// Python keywords, the expression keywords and the `np` module name. The
/// generated `evaluate` helper renders the same list.
pub const RESERVED_IDENTIFIERS: &[&str] = &[
    "and", "as", "assert", "async", "await", "break", "class", "continue", "def", "del", "elif",
    "else", "except", "false", "finally", "for", "from", "global", "if", "import", "in", "is",
    "lambda", "none", "nonlocal", "not", "or", "pass", "raise", "return", "true", "try", "while",
    "with", "yield", "then", "elseif", "endif", "iif", "null", "np",
];

/// An expression that could not be parsed
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message} at offset {offset}")]
pub struct SyntaxError {
    /// What went wrong
    pub message: String,
    /// Byte offset into the expression
    pub offset: usize,
}

impl SyntaxError {
    fn new(message: impl Into<String>, offset: usize) -> Self {
        Self {
            message: message.into(),
            offset,
        }
    }
}

/// Turn a column name into the identifier expressions refer to it by
///
/// Characters outside `[A-Za-z0-9_]` become `_`, a leading digit gets a `_`
/// prefix and reserved names get a `_` suffix.
pub fn sanitize_identifier(name: &str) -> String {
    let mut ident: String = name
        .trim()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    if ident.is_empty() || ident.starts_with(|c: char| c.is_ascii_digit()) {
        ident.insert(0, '_');
    }
    if RESERVED_IDENTIFIERS.contains(&ident.to_ascii_lowercase().as_str()) {
        ident.push('_');
    }
    ident
}

/// Translate an expression, falling back to a lexical rewrite
pub fn translate(expression: &str) -> String {
    if expression.trim().is_empty() {
        return String::new();
    }
    match try_translate(expression) {
        Ok(code) => code,
        Err(e) => {
            tracing::warn!("Could not parse expression '{}' ({}); using lexical rewrite", expression, e);
            lexical_rewrite(expression)
        }
    }
}

/// Translate an expression, failing on anything the grammar does not cover
pub fn try_translate(expression: &str) -> Result<String, SyntaxError> {
    let tokens = tokenize(expression)?;
    if tokens.is_empty() {
        return Err(SyntaxError::new("empty expression", 0));
    }

    let mut parser = ExprParser {
        tokens,
        pos: 0,
        end: expression.len(),
    };
    let node = parser.parse_or()?;
    if let Some(trailing) = parser.tokens.get(parser.pos) {
        return Err(SyntaxError::new("unexpected trailing input", trailing.offset));
    }

    Ok(node.to_string())
}

static FIELD_REF: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[([^\]]*)\]").expect("field reference pattern must compile"));
static WORD_AND: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bAND\b").expect("AND pattern must compile"));
static WORD_OR: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bOR\b").expect("OR pattern must compile"));
static WORD_NOT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bNOT\b").expect("NOT pattern must compile"));

/// Token-level rewrite for text the parser rejects
///
/// Strips field brackets, swaps logical keywords for element-wise operators
/// and normalizes equality, leaving quoted strings untouched. No
/// parenthesization is attempted.
pub fn lexical_rewrite(expression: &str) -> String {
    let mut out = String::with_capacity(expression.len());
    for (quoted, segment) in split_quoted(expression) {
        if quoted {
            out.push_str(segment);
            continue;
        }
        let s = FIELD_REF.replace_all(segment, |c: &Captures<'_>| sanitize_identifier(&c[1]));
        let s = WORD_AND.replace_all(&s, "&");
        let s = WORD_OR.replace_all(&s, "|");
        let s = WORD_NOT.replace_all(&s, "~");
        let s = s.replace("&&", "&").replace("||", "|").replace("<>", "!=");
        out.push_str(&normalize_equals(&s));
    }
    out.trim().to_string()
}

/// Split into `(quoted, text)` segments
///
/// Quote characters inside a `[...]` field reference do not open a string.
pub(crate) fn split_quoted(text: &str) -> Vec<(bool, &str)> {
    let mut parts = Vec::new();
    let mut start = 0;
    let mut quote: Option<char> = None;
    let mut in_field = false;
    for (i, c) in text.char_indices() {
        match quote {
            None if in_field => in_field = c != ']',
            None if c == '[' => in_field = true,
            None if c == '"' || c == '\'' => {
                if start < i {
                    parts.push((false, &text[start..i]));
                }
                start = i;
                quote = Some(c);
            }
            Some(q) if c == q => {
                parts.push((true, &text[start..=i]));
                start = i + 1;
                quote = None;
            }
            _ => {}
        }
    }
    if start < text.len() {
        parts.push((quote.is_some(), &text[start..]));
    }
    parts
}

/// Single `=` becomes `==`; `==`, `!=`, `<=`, `>=` are kept
fn normalize_equals(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len() + 4);
    for (i, &c) in chars.iter().enumerate() {
        let prev = i.checked_sub(1).map(|p| chars[p]);
        let next = chars.get(i + 1).copied();
        if c == '=' && !matches!(prev, Some('=' | '!' | '<' | '>')) && next != Some('=') {
            out.push_str("==");
        } else {
            out.push(c);
        }
    }
    out
}

// =============================================================================
// Tokens
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Field(String),
    Str(String),
    Number(String),
    Ident(String),
    Op(&'static str),
    LParen,
    RParen,
    Comma,
}

#[derive(Debug, Clone)]
struct Spanned {
    token: Token,
    offset: usize,
}

const TWO_CHAR_OPS: &[&str] = &["==", "!=", "<>", "<=", ">=", "&&", "||"];
const ONE_CHAR_OPS: &[&str] = &["=", "<", ">", "+", "-", "*", "/", "%", "!", "&", "|", "~"];

fn tokenize(text: &str) -> Result<Vec<Spanned>, SyntaxError> {
    let chars: Vec<(usize, char)> = text.char_indices().collect();
    let collect = |from: usize, to: usize| -> String { chars[from..to].iter().map(|&(_, c)| c).collect() };
    let find = |from: usize, stop: char| chars[from..].iter().position(|&(_, c)| c == stop).map(|p| from + p);

    let mut tokens = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        let (offset, c) = chars[i];
        let next = chars.get(i + 1).map(|&(_, n)| n);

        if c.is_whitespace() {
            i += 1;
            continue;
        }
        // Line comment
        if c == '/' && next == Some('/') {
            while i < chars.len() && chars[i].1 != '\n' {
                i += 1;
            }
            continue;
        }

        let token = match c {
            '[' => {
                let end = find(i + 1, ']')
                    .ok_or_else(|| SyntaxError::new("unterminated field reference", offset))?;
                let name = collect(i + 1, end);
                i = end + 1;
                Token::Field(name)
            }
            '"' | '\'' => {
                let end = find(i + 1, c)
                    .ok_or_else(|| SyntaxError::new("unterminated string literal", offset))?;
                let literal = collect(i, end + 1);
                i = end + 1;
                Token::Str(literal)
            }
            c if c.is_ascii_digit() || (c == '.' && next.is_some_and(|n| n.is_ascii_digit())) => {
                let start = i;
                while i < chars.len() && (chars[i].1.is_ascii_digit() || chars[i].1 == '.') {
                    i += 1;
                }
                Token::Number(collect(start, i))
            }
            c if c.is_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len()
                    && (chars[i].1.is_alphanumeric() || chars[i].1 == '_' || chars[i].1 == '.')
                {
                    i += 1;
                }
                Token::Ident(collect(start, i))
            }
            '(' => {
                i += 1;
                Token::LParen
            }
            ')' => {
                i += 1;
                Token::RParen
            }
            ',' => {
                i += 1;
                Token::Comma
            }
            _ => {
                let two = next.and_then(|n| {
                    TWO_CHAR_OPS
                        .iter()
                        .find(|op| op.chars().eq([c, n]))
                        .copied()
                });
                if let Some(op) = two {
                    i += 2;
                    Token::Op(op)
                } else if let Some(op) = ONE_CHAR_OPS.iter().find(|op| op.chars().eq([c])) {
                    i += 1;
                    Token::Op(*op)
                } else {
                    return Err(SyntaxError::new(format!("unexpected character '{}'", c), offset));
                }
            }
        };
        tokens.push(Spanned { token, offset });
    }
    Ok(tokens)
}

// =============================================================================
// Syntax tree
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
enum Node {
    Name(String),
    Str(String),
    Number(String),
    Bool(bool),
    Null,
    Paren(Box<Node>),
    Neg(Box<Node>),
    Not(Box<Node>),
    Binary {
        op: &'static str,
        lhs: Box<Node>,
        rhs: Box<Node>,
    },
    Logical {
        op: &'static str,
        lhs: Box<Node>,
        rhs: Box<Node>,
    },
    Cond {
        cond: Box<Node>,
        then: Box<Node>,
        otherwise: Box<Node>,
    },
    Call {
        name: String,
        args: Vec<Node>,
    },
}

const COMPARISONS: &[&str] = &["==", "!=", "<", "<=", ">", ">="];

impl Node {
    fn is_comparison(&self) -> bool {
        matches!(self, Node::Binary { op, .. } if COMPARISONS.contains(op))
    }
}

/// Prints a node in parentheses unless it already is a parenthesized group
struct Grouped<'a>(&'a Node);

impl fmt::Display for Grouped<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Node::Paren(_) => write!(f, "{}", self.0),
            other => write!(f, "({})", other),
        }
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Node::Name(s) | Node::Str(s) | Node::Number(s) => f.write_str(s),
            Node::Bool(true) => f.write_str("True"),
            Node::Bool(false) => f.write_str("False"),
            Node::Null => f.write_str("np.nan"),
            Node::Paren(inner) => write!(f, "({})", inner),
            Node::Neg(inner) => write!(f, "-{}", inner),
            Node::Not(inner) => write!(f, "~{}", Grouped(inner)),
            Node::Logical { op, lhs, rhs } => {
                write!(f, "{} {} {}", Grouped(lhs), op, Grouped(rhs))
            }
            Node::Binary { op, lhs, rhs } if COMPARISONS.contains(op) => {
                // Python would chain `a == b == c`
                let side = |n: &Node, f: &mut fmt::Formatter<'_>| {
                    if n.is_comparison() {
                        write!(f, "{}", Grouped(n))
                    } else {
                        write!(f, "{}", n)
                    }
                };
                side(&**lhs, f)?;
                write!(f, " {} ", op)?;
                side(&**rhs, f)
            }
            Node::Binary { op, lhs, rhs } => write!(f, "{} {} {}", lhs, op, rhs),
            Node::Cond {
                cond,
                then,
                otherwise,
            } => write!(f, "np.where({}, {}, {})", cond, then, otherwise),
            Node::Call { name, args } => {
                write!(f, "{}(", name)?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", arg)?;
                }
                f.write_str(")")
            }
        }
    }
}

// =============================================================================
// Parser
// =============================================================================

struct ExprParser {
    tokens: Vec<Spanned>,
    pos: usize,
    end: usize,
}

impl ExprParser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|s| &s.token)
    }

    fn offset(&self) -> usize {
        self.tokens.get(self.pos).map_or(self.end, |s| s.offset)
    }

    fn error(&self, message: &str) -> SyntaxError {
        SyntaxError::new(message, self.offset())
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).map(|s| s.token.clone());
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn is_keyword(&self, keyword: &str) -> bool {
        matches!(self.peek(), Some(Token::Ident(s)) if s.eq_ignore_ascii_case(keyword))
    }

    fn eat_keyword(&mut self, keyword: &str) -> bool {
        let hit = self.is_keyword(keyword);
        if hit {
            self.pos += 1;
        }
        hit
    }

    fn eat_op(&mut self, ops: &[&str]) -> Option<&'static str> {
        match self.peek() {
            Some(Token::Op(op)) if ops.contains(op) => {
                let op = *op;
                self.pos += 1;
                Some(op)
            }
            _ => None,
        }
    }

    fn expect(&mut self, token: Token, what: &str) -> Result<(), SyntaxError> {
        if self.peek() == Some(&token) {
            self.pos += 1;
            Ok(())
        } else {
            Err(self.error(&format!("expected {}", what)))
        }
    }

    fn parse_or(&mut self) -> Result<Node, SyntaxError> {
        let mut lhs = self.parse_and()?;
        while self.eat_keyword("OR") || self.eat_op(&["||", "|"]).is_some() {
            let rhs = self.parse_and()?;
            lhs = Node::Logical {
                op: "|",
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> Result<Node, SyntaxError> {
        let mut lhs = self.parse_not()?;
        while self.eat_keyword("AND") || self.eat_op(&["&&", "&"]).is_some() {
            let rhs = self.parse_not()?;
            lhs = Node::Logical {
                op: "&",
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        Ok(lhs)
    }

    fn parse_not(&mut self) -> Result<Node, SyntaxError> {
        if self.eat_keyword("NOT") || self.eat_op(&["!", "~"]).is_some() {
            return Ok(Node::Not(Box::new(self.parse_not()?)));
        }
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> Result<Node, SyntaxError> {
        let mut lhs = self.parse_additive()?;
        while let Some(op) = self.eat_op(&["=", "==", "!=", "<>", "<", "<=", ">", ">="]) {
            let op = match op {
                "=" | "==" => "==",
                "!=" | "<>" => "!=",
                other => other,
            };
            let rhs = self.parse_additive()?;
            lhs = Node::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        Ok(lhs)
    }

    fn parse_additive(&mut self) -> Result<Node, SyntaxError> {
        let mut lhs = self.parse_multiplicative()?;
        while let Some(op) = self.eat_op(&["+", "-"]) {
            let rhs = self.parse_multiplicative()?;
            lhs = Node::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        Ok(lhs)
    }

    fn parse_multiplicative(&mut self) -> Result<Node, SyntaxError> {
        let mut lhs = self.parse_unary()?;
        while let Some(op) = self.eat_op(&["*", "/", "%"]) {
            let rhs = self.parse_unary()?;
            lhs = Node::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> Result<Node, SyntaxError> {
        if self.eat_op(&["-"]).is_some() {
            return Ok(Node::Neg(Box::new(self.parse_unary()?)));
        }
        if self.eat_op(&["+"]).is_some() {
            return self.parse_unary();
        }
        if self.eat_keyword("NOT") || self.eat_op(&["!", "~"]).is_some() {
            return Ok(Node::Not(Box::new(self.parse_unary()?)));
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<Node, SyntaxError> {
        let offset = self.offset();
        match self.advance() {
            Some(Token::Field(name)) => Ok(Node::Name(sanitize_identifier(&name))),
            Some(Token::Str(literal)) => Ok(Node::Str(literal)),
            Some(Token::Number(number)) => Ok(Node::Number(number)),
            Some(Token::LParen) => {
                let inner = self.parse_or()?;
                self.expect(Token::RParen, "')'")?;
                Ok(match inner {
                    Node::Paren(_) => inner,
                    other => Node::Paren(Box::new(other)),
                })
            }
            Some(Token::Ident(ident)) => self.parse_identifier(ident, offset),
            Some(_) => Err(SyntaxError::new("unexpected token", offset)),
            None => Err(SyntaxError::new("unexpected end of expression", offset)),
        }
    }

    fn parse_identifier(&mut self, ident: String, offset: usize) -> Result<Node, SyntaxError> {
        let upper = ident.to_ascii_uppercase();
        match upper.as_str() {
            "IF" => return self.parse_if(),
            "TRUE" => return Ok(Node::Bool(true)),
            "FALSE" => return Ok(Node::Bool(false)),
            "AND" | "OR" | "NOT" | "THEN" | "ELSEIF" | "ELSE" | "ENDIF" => {
                return Err(SyntaxError::new(format!("unexpected keyword {}", upper), offset));
            }
            _ => {}
        }

        if self.peek() != Some(&Token::LParen) {
            return Ok(Node::Name(ident));
        }
        self.pos += 1;

        let mut args = Vec::new();
        if self.peek() != Some(&Token::RParen) {
            loop {
                args.push(self.parse_or()?);
                if self.peek() == Some(&Token::Comma) {
                    self.pos += 1;
                } else {
                    break;
                }
            }
        }
        self.expect(Token::RParen, "')' after arguments")?;

        let is_conditional = upper == "IIF" || ident == "np.where";
        if is_conditional && args.len() == 3 {
            let mut args = args.into_iter();
            if let (Some(cond), Some(then), Some(otherwise)) = (args.next(), args.next(), args.next()) {
                return Ok(Node::Cond {
                    cond: Box::new(cond),
                    then: Box::new(then),
                    otherwise: Box::new(otherwise),
                });
            }
            return Err(SyntaxError::new("conditional needs three arguments", offset));
        }
        if upper == "NULL" && args.is_empty() {
            return Ok(Node::Null);
        }

        Ok(Node::Call { name: ident, args })
    }

    /// `IF c THEN a [ELSEIF c THEN a]* [ELSE b] ENDIF`
    fn parse_if(&mut self) -> Result<Node, SyntaxError> {
        let mut branches = Vec::new();

        let cond = self.parse_or()?;
        if !self.eat_keyword("THEN") {
            return Err(self.error("expected THEN"));
        }
        branches.push((cond, self.parse_or()?));

        while self.eat_keyword("ELSEIF") {
            let cond = self.parse_or()?;
            if !self.eat_keyword("THEN") {
                return Err(self.error("expected THEN"));
            }
            branches.push((cond, self.parse_or()?));
        }

        let mut otherwise = if self.eat_keyword("ELSE") {
            self.parse_or()?
        } else {
            Node::Null
        };
        if !self.eat_keyword("ENDIF") {
            return Err(self.error("expected ENDIF"));
        }

        while let Some((cond, then)) = branches.pop() {
            otherwise = Node::Cond {
                cond: Box::new(cond),
                then: Box::new(then),
                otherwise: Box::new(otherwise),
            };
        }
        Ok(otherwise)
    }
}
