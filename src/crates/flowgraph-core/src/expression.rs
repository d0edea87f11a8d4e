//! Condition expressions - compiled predicates over workflow state
//!
//! Edge conditions, routing rules, and interrupt conditions can be written as
//! short textual expressions instead of closures. An expression is parsed once
//! into a typed AST when it is declared, so syntax errors surface while the
//! graph is being built rather than during execution.
//!
//! # Grammar
//!
//! ```text
//! expr       := or
//! or         := and (("or" | "||") and)*
//! and        := unary (("and" | "&&") unary)*
//! unary      := ("not" | "!") unary | comparison
//! comparison := operand (op operand)?
//! op         := == | != | < | <= | > | >= | in | not in | contains | matches
//! operand    := literal | list | path | len "(" expr ")" | "(" expr ")"
//! path       := state ("." ident | "[" string | integer "]")*
//! literal    := number | "string" | 'string' | true | false | null
//! list       := "[" (expr ("," expr)*)? "]"
//! ```
//!
//! Nesting of parentheses, lists, `len(..)` and negation is capped at
//! [`MAX_DEPTH`] levels. `and` / `or` chains are flat and have no cap.
//!
//! `state` is the only name in scope. Any other identifier is rejected at
//! parse time. `matches` takes a string literal regex, compiled at parse time.
//!
//! # Evaluation
//!
//! - A path that does not resolve evaluates to `null`
//! - `==` / `!=` compare numbers numerically and everything else structurally
//! - Ordering comparisons need two numbers or two strings, otherwise
//!   [`PredicateError::TypeMismatch`]
//! - A non-boolean result is read by truthiness: `null`, `false`, `0`, `""`,
//!   `[]` and `{}` are false
//!
//! # Example
//!
//! ```rust,ignore
//! use flowgraph_core::expression::Expression;
//!
//! let expr = Expression::parse(r#"state.value > 100 and state.user.tier in ["gold", "platinum"]"#)?;
//! assert!(expr.evaluate(&state)?);
//! ```

use std::fmt;

use regex::Regex;
use serde_json::{Number, Value};
use thiserror::Error;

use flowgraph_state::WorkflowState;

use crate::predicate::PredicateError;

/// Error raised while compiling an expression
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExpressionError {
    #[error("Unexpected character '{ch}' at position {pos}")]
    UnexpectedChar { pos: usize, ch: char },

    #[error("Unterminated string starting at position {pos}")]
    UnterminatedString { pos: usize },

    #[error("Invalid number '{text}' at position {pos}")]
    InvalidNumber { pos: usize, text: String },

    #[error("Expected {expected} at position {pos}, found {found}")]
    UnexpectedToken {
        pos: usize,
        expected: String,
        found: String,
    },

    #[error("Unexpected end of expression, expected {expected}")]
    UnexpectedEnd { expected: String },

    #[error("Unknown identifier '{name}', only 'state' is in scope")]
    UnknownIdentifier { name: String },

    #[error("Invalid regex '{pattern}': {reason}")]
    InvalidRegex { pattern: String, reason: String },

    #[error("Expression nests deeper than {limit} levels")]
    TooDeep { limit: usize },
}

/// Deepest nesting of `(`, `[`, `len(` and `not` the parser accepts
pub const MAX_DEPTH: usize = 128;

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(Number),
    Str(String),
    Ident(String),
    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
    Dot,
    EqEq,
    NotEq,
    Lt,
    Le,
    Gt,
    Ge,
    AndAnd,
    OrOr,
    Bang,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Number(n) => write!(f, "number {}", n),
            Token::Str(s) => write!(f, "string \"{}\"", s),
            Token::Ident(name) => write!(f, "'{}'", name),
            Token::LParen => f.write_str("'('"),
            Token::RParen => f.write_str("')'"),
            Token::LBracket => f.write_str("'['"),
            Token::RBracket => f.write_str("']'"),
            Token::Comma => f.write_str("','"),
            Token::Dot => f.write_str("'.'"),
            Token::EqEq => f.write_str("'=='"),
            Token::NotEq => f.write_str("'!='"),
            Token::Lt => f.write_str("'<'"),
            Token::Le => f.write_str("'<='"),
            Token::Gt => f.write_str("'>'"),
            Token::Ge => f.write_str("'>='"),
            Token::AndAnd => f.write_str("'&&'"),
            Token::OrOr => f.write_str("'||'"),
            Token::Bang => f.write_str("'!'"),
        }
    }
}

fn tokenize(source: &str) -> Result<Vec<(usize, Token)>, ExpressionError> {
    let chars: Vec<char> = source.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        let start = i;

        if c.is_whitespace() {
            i += 1;
            continue;
        }

        let next = chars.get(i + 1).copied();
        let token = match c {
            '(' => Token::LParen,
            ')' => Token::RParen,
            '[' => Token::LBracket,
            ']' => Token::RBracket,
            ',' => Token::Comma,
            '.' => Token::Dot,
            '=' if next == Some('=') => {
                i += 1;
                Token::EqEq
            }
            '!' if next == Some('=') => {
                i += 1;
                Token::NotEq
            }
            '!' => Token::Bang,
            '<' if next == Some('=') => {
                i += 1;
                Token::Le
            }
            '<' => Token::Lt,
            '>' if next == Some('=') => {
                i += 1;
                Token::Ge
            }
            '>' => Token::Gt,
            '&' if next == Some('&') => {
                i += 1;
                Token::AndAnd
            }
            '|' if next == Some('|') => {
                i += 1;
                Token::OrOr
            }
            '"' | '\'' => {
                let quote = c;
                let mut text = String::new();
                i += 1;
                loop {
                    match chars.get(i) {
                        None => return Err(ExpressionError::UnterminatedString { pos: start }),
                        Some('\\') => {
                            match chars.get(i + 1) {
                                Some('n') => text.push('\n'),
                                Some('t') => text.push('\t'),
                                Some(escaped) => text.push(*escaped),
                                None => {
                                    return Err(ExpressionError::UnterminatedString { pos: start })
                                }
                            }
                            i += 2;
                        }
                        Some(ch) if *ch == quote => break,
                        Some(ch) => {
                            text.push(*ch);
                            i += 1;
                        }
                    }
                }
                Token::Str(text)
            }
            '-' | '0'..='9' => {
                let mut end = i + 1;
                while end < chars.len() && (chars[end].is_ascii_digit() || chars[end] == '.') {
                    end += 1;
                }
                let text: String = chars[i..end].iter().collect();
                i = end - 1;
                Token::Number(parse_number(&text).ok_or(ExpressionError::InvalidNumber {
                    pos: start,
                    text,
                })?)
            }
            c if c.is_alphabetic() || c == '_' => {
                let mut end = i + 1;
                while end < chars.len() && (chars[end].is_alphanumeric() || chars[end] == '_') {
                    end += 1;
                }
                let name: String = chars[i..end].iter().collect();
                i = end - 1;
                Token::Ident(name)
            }
            other => return Err(ExpressionError::UnexpectedChar { pos: start, ch: other }),
        };

        tokens.push((start, token));
        i += 1;
    }

    Ok(tokens)
}

fn parse_number(text: &str) -> Option<Number> {
    if let Ok(int) = text.parse::<i64>() {
        return Some(Number::from(int));
    }
    text.parse::<f64>().ok().and_then(Number::from_f64)
}

/// Comparison operator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    In,
    NotIn,
    Contains,
}

impl CompareOp {
    fn symbol(&self) -> &'static str {
        match self {
            CompareOp::Eq => "==",
            CompareOp::Ne => "!=",
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
            CompareOp::Gt => ">",
            CompareOp::Ge => ">=",
            CompareOp::In => "in",
            CompareOp::NotIn => "not in",
            CompareOp::Contains => "contains",
        }
    }
}

/// One step of a `state` path
#[derive(Debug, Clone, PartialEq)]
pub enum PathSegment {
    Key(String),
    Index(usize),
}

/// Parsed expression tree
#[derive(Debug, Clone)]
pub enum Expr {
    Literal(Value),
    List(Vec<Expr>),
    Path(Vec<PathSegment>),
    Len(Box<Expr>),
    Not(Box<Expr>),
    And(Vec<Expr>),
    Or(Vec<Expr>),
    Compare(CompareOp, Box<Expr>, Box<Expr>),
    Matches(Box<Expr>, Regex),
}

struct Parser {
    tokens: Vec<(usize, Token)>,
    pos: usize,
    depth: usize,
}

impl Parser {
    fn new(tokens: Vec<(usize, Token)>) -> Self {
        Self {
            tokens,
            pos: 0,
            depth: 0,
        }
    }

    /// Run `parse` one nesting level down, failing past [`MAX_DEPTH`]
    fn nested<T>(
        &mut self,
        parse: impl FnOnce(&mut Self) -> Result<T, ExpressionError>,
    ) -> Result<T, ExpressionError> {
        if self.depth >= MAX_DEPTH {
            return Err(ExpressionError::TooDeep { limit: MAX_DEPTH });
        }
        self.depth += 1;
        let result = parse(self);
        self.depth -= 1;
        result
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(_, t)| t)
    }

    fn peek_at(&self, offset: usize) -> Option<&Token> {
        self.tokens.get(self.pos + offset).map(|(_, t)| t)
    }

    fn next(&mut self) -> Option<(usize, Token)> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn peek_keyword(&self, keyword: &str) -> bool {
        matches!(self.peek(), Some(Token::Ident(name)) if name == keyword)
    }

    fn expect(&mut self, expected: Token) -> Result<(), ExpressionError> {
        match self.next() {
            Some((_, token)) if token == expected => Ok(()),
            Some((pos, token)) => Err(ExpressionError::UnexpectedToken {
                pos,
                expected: expected.to_string(),
                found: token.to_string(),
            }),
            None => Err(ExpressionError::UnexpectedEnd {
                expected: expected.to_string(),
            }),
        }
    }

    fn parse_or(&mut self) -> Result<Expr, ExpressionError> {
        let first = self.parse_and()?;
        let mut terms = Vec::new();
        while matches!(self.peek(), Some(Token::OrOr)) || self.peek_keyword("or") {
            self.pos += 1;
            terms.push(self.parse_and()?);
        }
        if terms.is_empty() {
            return Ok(first);
        }
        terms.insert(0, first);
        Ok(Expr::Or(terms))
    }

    fn parse_and(&mut self) -> Result<Expr, ExpressionError> {
        let first = self.parse_unary()?;
        let mut terms = Vec::new();
        while matches!(self.peek(), Some(Token::AndAnd)) || self.peek_keyword("and") {
            self.pos += 1;
            terms.push(self.parse_unary()?);
        }
        if terms.is_empty() {
            return Ok(first);
        }
        terms.insert(0, first);
        Ok(Expr::And(terms))
    }

    fn parse_unary(&mut self) -> Result<Expr, ExpressionError> {
        if matches!(self.peek(), Some(Token::Bang)) || self.peek_keyword("not") {
            self.pos += 1;
            let inner = self.nested(Self::parse_unary)?;
            return Ok(Expr::Not(Box::new(inner)));
        }
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> Result<Expr, ExpressionError> {
        let left = self.parse_operand()?;

        let op = match self.peek().cloned() {
            Some(Token::EqEq) => CompareOp::Eq,
            Some(Token::NotEq) => CompareOp::Ne,
            Some(Token::Lt) => CompareOp::Lt,
            Some(Token::Le) => CompareOp::Le,
            Some(Token::Gt) => CompareOp::Gt,
            Some(Token::Ge) => CompareOp::Ge,
            Some(Token::Ident(name)) if name == "in" => CompareOp::In,
            Some(Token::Ident(name)) if name == "contains" => CompareOp::Contains,
            Some(Token::Ident(name))
                if name == "not"
                    && matches!(self.peek_at(1), Some(Token::Ident(next)) if next == "in") =>
            {
                self.pos += 1;
                CompareOp::NotIn
            }
            Some(Token::Ident(name)) if name == "matches" => {
                self.pos += 1;
                return self.parse_matches(left);
            }
            _ => return Ok(left),
        };
        self.pos += 1;

        let right = self.parse_operand()?;
        Ok(Expr::Compare(op, Box::new(left), Box::new(right)))
    }

    fn parse_matches(&mut self, left: Expr) -> Result<Expr, ExpressionError> {
        match self.next() {
            Some((_, Token::Str(pattern))) => {
                let regex = Regex::new(&pattern).map_err(|e| ExpressionError::InvalidRegex {
                    pattern: pattern.clone(),
                    reason: e.to_string(),
                })?;
                Ok(Expr::Matches(Box::new(left), regex))
            }
            Some((pos, token)) => Err(ExpressionError::UnexpectedToken {
                pos,
                expected: "regex string literal".to_string(),
                found: token.to_string(),
            }),
            None => Err(ExpressionError::UnexpectedEnd {
                expected: "regex string literal".to_string(),
            }),
        }
    }

    fn parse_operand(&mut self) -> Result<Expr, ExpressionError> {
        let (pos, token) = self.next().ok_or_else(|| ExpressionError::UnexpectedEnd {
            expected: "operand".to_string(),
        })?;

        match token {
            Token::Number(n) => Ok(Expr::Literal(Value::Number(n))),
            Token::Str(s) => Ok(Expr::Literal(Value::String(s))),
            Token::LParen => {
                let inner = self.nested(Self::parse_or)?;
                self.expect(Token::RParen)?;
                Ok(inner)
            }
            Token::LBracket => self.nested(Self::parse_list),
            Token::Ident(name) => match name.as_str() {
                "true" => Ok(Expr::Literal(Value::Bool(true))),
                "false" => Ok(Expr::Literal(Value::Bool(false))),
                "null" => Ok(Expr::Literal(Value::Null)),
                "state" => self.parse_path(),
                "len" => {
                    self.expect(Token::LParen)?;
                    let inner = self.nested(Self::parse_or)?;
                    self.expect(Token::RParen)?;
                    Ok(Expr::Len(Box::new(inner)))
                }
                _ => Err(ExpressionError::UnknownIdentifier { name }),
            },
            other => Err(ExpressionError::UnexpectedToken {
                pos,
                expected: "operand".to_string(),
                found: other.to_string(),
            }),
        }
    }

    fn parse_list(&mut self) -> Result<Expr, ExpressionError> {
        let mut items = Vec::new();
        if matches!(self.peek(), Some(Token::RBracket)) {
            self.pos += 1;
            return Ok(Expr::List(items));
        }
        loop {
            items.push(self.parse_or()?);
            match self.next() {
                Some((_, Token::Comma)) => continue,
                Some((_, Token::RBracket)) => break,
                Some((pos, token)) => {
                    return Err(ExpressionError::UnexpectedToken {
                        pos,
                        expected: "',' or ']'".to_string(),
                        found: token.to_string(),
                    })
                }
                None => {
                    return Err(ExpressionError::UnexpectedEnd {
                        expected: "']'".to_string(),
                    })
                }
            }
        }
        Ok(Expr::List(items))
    }

    fn parse_path(&mut self) -> Result<Expr, ExpressionError> {
        let mut segments = Vec::new();
        loop {
            match self.peek() {
                Some(Token::Dot) => {
                    self.pos += 1;
                    match self.next() {
                        Some((_, Token::Ident(name))) => segments.push(PathSegment::Key(name)),
                        Some((pos, token)) => {
                            return Err(ExpressionError::UnexpectedToken {
                                pos,
                                expected: "field name".to_string(),
                                found: token.to_string(),
                            })
                        }
                        None => {
                            return Err(ExpressionError::UnexpectedEnd {
                                expected: "field name".to_string(),
                            })
                        }
                    }
                }
                Some(Token::LBracket) => {
                    self.pos += 1;
                    match self.next() {
                        Some((_, Token::Str(key))) => segments.push(PathSegment::Key(key)),
                        Some((pos, Token::Number(n))) => {
                            let index = n.as_u64().ok_or_else(|| ExpressionError::InvalidNumber {
                                pos,
                                text: n.to_string(),
                            })?;
                            segments.push(PathSegment::Index(index as usize));
                        }
                        Some((pos, token)) => {
                            return Err(ExpressionError::UnexpectedToken {
                                pos,
                                expected: "string key or index".to_string(),
                                found: token.to_string(),
                            })
                        }
                        None => {
                            return Err(ExpressionError::UnexpectedEnd {
                                expected: "string key or index".to_string(),
                            })
                        }
                    }
                    self.expect(Token::RBracket)?;
                }
                _ => return Ok(Expr::Path(segments)),
            }
        }
    }
}

/// Compiled condition expression
#[derive(Debug, Clone)]
pub struct Expression {
    source: String,
    root: Expr,
}

impl Expression {
    /// Compile `source` into an expression tree
    pub fn parse(source: &str) -> Result<Self, ExpressionError> {
        let tokens = tokenize(source)?;
        let mut parser = Parser::new(tokens);
        let root = parser.parse_or()?;

        if let Some((pos, token)) = parser.next() {
            return Err(ExpressionError::UnexpectedToken {
                pos,
                expected: "end of expression".to_string(),
                found: token.to_string(),
            });
        }

        Ok(Self {
            source: source.to_string(),
            root,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn ast(&self) -> &Expr {
        &self.root
    }

    /// Evaluate to a boolean by truthiness
    pub fn evaluate(&self, state: &WorkflowState) -> Result<bool, PredicateError> {
        Ok(truthy(&eval(&self.root, state)?))
    }

    /// Evaluate to the raw JSON value
    pub fn evaluate_value(&self, state: &WorkflowState) -> Result<Value, PredicateError> {
        eval(&self.root, state)
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

impl std::str::FromStr for Expression {
    type Err = ExpressionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// JSON truthiness used for boolean positions
pub fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(false),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

/// Equality with numbers compared by value, so `1 == 1.0`
pub fn json_eq(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => a.as_f64() == b.as_f64(),
        (Value::Array(a), Value::Array(b)) => {
            a.len() == b.len() && a.iter().zip(b).all(|(x, y)| json_eq(x, y))
        }
        _ => left == right,
    }
}

fn resolve<'a>(state: &'a WorkflowState, segments: &[PathSegment]) -> Option<Value> {
    let Some((first, rest)) = segments.split_first() else {
        return Some(state.to_value());
    };
    let PathSegment::Key(key) = first else {
        return None;
    };

    let mut current: &'a Value = state.get(key)?;
    for segment in rest {
        current = match (segment, current) {
            (PathSegment::Key(k), Value::Object(map)) => map.get(k)?,
            (PathSegment::Index(i), Value::Array(items)) => items.get(*i)?,
            _ => return None,
        };
    }
    Some(current.clone())
}

fn mismatch(op: &str, left: &Value, right: &Value) -> PredicateError {
    PredicateError::TypeMismatch {
        operation: op.to_string(),
        left: flowgraph_state::state::type_name(left).to_string(),
        right: flowgraph_state::state::type_name(right).to_string(),
    }
}

fn eval(expr: &Expr, state: &WorkflowState) -> Result<Value, PredicateError> {
    match expr {
        Expr::Literal(value) => Ok(value.clone()),
        Expr::List(items) => items
            .iter()
            .map(|item| eval(item, state))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        Expr::Path(segments) => Ok(resolve(state, segments).unwrap_or(Value::Null)),
        Expr::Len(inner) => {
            let value = eval(inner, state)?;
            let len = match &value {
                Value::Null => 0,
                Value::String(s) => s.chars().count(),
                Value::Array(items) => items.len(),
                Value::Object(map) => map.len(),
                other => return Err(mismatch("len", other, &Value::Null)),
            };
            Ok(Value::from(len))
        }
        Expr::Not(inner) => Ok(Value::Bool(!truthy(&eval(inner, state)?))),
        Expr::And(terms) => {
            for term in terms {
                if !truthy(&eval(term, state)?) {
                    return Ok(Value::Bool(false));
                }
            }
            Ok(Value::Bool(true))
        }
        Expr::Or(terms) => {
            for term in terms {
                if truthy(&eval(term, state)?) {
                    return Ok(Value::Bool(true));
                }
            }
            Ok(Value::Bool(false))
        }
        Expr::Compare(op, left, right) => {
            let left = eval(left, state)?;
            let right = eval(right, state)?;
            compare(*op, &left, &right).map(Value::Bool)
        }
        Expr::Matches(inner, regex) => match eval(inner, state)? {
            Value::String(s) => Ok(Value::Bool(regex.is_match(&s))),
            other => Err(mismatch("matches", &other, &Value::String(regex.to_string()))),
        },
    }
}

fn ordering(op: CompareOp, left: &Value, right: &Value) -> Result<std::cmp::Ordering, PredicateError> {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => {
            let (a, b) = (a.as_f64(), b.as_f64());
            a.zip(b)
                .and_then(|(a, b)| a.partial_cmp(&b))
                .ok_or_else(|| mismatch(op.symbol(), left, right))
        }
        (Value::String(a), Value::String(b)) => Ok(a.cmp(b)),
        _ => Err(mismatch(op.symbol(), left, right)),
    }
}

fn membership(op: CompareOp, needle: &Value, haystack: &Value) -> Result<bool, PredicateError> {
    match (needle, haystack) {
        (_, Value::Array(items)) => Ok(items.iter().any(|item| json_eq(item, needle))),
        (Value::String(n), Value::String(h)) => Ok(h.contains(n.as_str())),
        (Value::String(n), Value::Object(map)) => Ok(map.contains_key(n)),
        _ => Err(mismatch(op.symbol(), needle, haystack)),
    }
}

fn compare(op: CompareOp, left: &Value, right: &Value) -> Result<bool, PredicateError> {
    use std::cmp::Ordering;

    match op {
        CompareOp::Eq => Ok(json_eq(left, right)),
        CompareOp::Ne => Ok(!json_eq(left, right)),
        CompareOp::Lt => Ok(ordering(op, left, right)? == Ordering::Less),
        CompareOp::Le => Ok(ordering(op, left, right)? != Ordering::Greater),
        CompareOp::Gt => Ok(ordering(op, left, right)? == Ordering::Greater),
        CompareOp::Ge => Ok(ordering(op, left, right)? != Ordering::Less),
        CompareOp::In => membership(op, left, right),
        CompareOp::NotIn => membership(op, left, right).map(|found| !found),
        CompareOp::Contains => membership(op, right, left),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn state(value: Value) -> WorkflowState {
        WorkflowState::from_value(value).unwrap()
    }

    fn eval_bool(source: &str, value: Value) -> Result<bool, PredicateError> {
        Expression::parse(source).unwrap().evaluate(&state(value))
    }

    #[test]
    fn test_numeric_comparisons() {
        assert!(eval_bool("state.value > 100", json!({"value": 150})).unwrap());
        assert!(!eval_bool("state.value > 100", json!({"value": 50})).unwrap());
        assert!(eval_bool("state.value >= 1.5", json!({"value": 1.5})).unwrap());
        assert!(eval_bool("state.value == 2", json!({"value": 2.0})).unwrap());
        assert!(eval_bool("state.delta < -3", json!({"delta": -4})).unwrap());
    }

    #[test]
    fn test_nested_paths_and_indexing() {
        let value = json!({"user": {"tier": "gold"}, "items": [{"id": 7}], "odd key": 1});
        assert!(eval_bool("state.user.tier == 'gold'", value.clone()).unwrap());
        assert!(eval_bool("state.items[0].id == 7", value.clone()).unwrap());
        assert!(eval_bool(r#"state["odd key"] == 1"#, value).unwrap());
    }

    #[test]
    fn test_missing_field_is_null() {
        assert!(eval_bool("state.missing == null", json!({})).unwrap());
        assert!(!eval_bool("state.missing", json!({})).unwrap());
        assert!(eval_bool("not state.missing.deeper", json!({"missing": 3})).unwrap());
    }

    #[test]
    fn test_boolean_operators() {
        let value = json!({"a": true, "b": false});
        assert!(eval_bool("state.a and not state.b", value.clone()).unwrap());
        assert!(eval_bool("state.b || state.a", value.clone()).unwrap());
        assert!(!eval_bool("!(state.a && state.a)", value.clone()).unwrap());
        assert!(eval_bool("state.b or (state.a and true)", value).unwrap());
    }

    #[test]
    fn test_short_circuit_skips_type_errors() {
        assert!(!eval_bool("false and state.s > 1", json!({"s": "x"})).unwrap());
        assert!(eval_bool("true or state.s > 1", json!({"s": "x"})).unwrap());
    }

    #[test]
    fn test_membership_operators() {
        let value = json!({"tier": "gold", "tags": ["a", "b"], "text": "hello world"});
        assert!(eval_bool("state.tier in ['gold', 'platinum']", value.clone()).unwrap());
        assert!(eval_bool("state.tier not in ['bronze']", value.clone()).unwrap());
        assert!(eval_bool("state.tags contains 'b'", value.clone()).unwrap());
        assert!(eval_bool("state.text contains 'world'", value.clone()).unwrap());
        assert!(eval_bool("'tier' in state", value).unwrap());
    }

    #[test]
    fn test_matches_and_len() {
        let value = json!({"email": "ops@example.com", "items": [1, 2, 3]});
        assert!(eval_bool(r#"state.email matches "^[a-z]+@example\\.com$""#, value.clone()).unwrap());
        assert!(eval_bool("len(state.items) == 3", value.clone()).unwrap());
        assert!(eval_bool("len(state.nothing) == 0", value).unwrap());
    }

    #[test]
    fn test_type_mismatch_is_error() {
        let err = eval_bool("state.name > 5", json!({"name": "x"})).unwrap_err();
        assert!(matches!(err, PredicateError::TypeMismatch { .. }));
        assert!(eval_bool("state.missing > 5", json!({})).is_err());
    }

    #[test]
    fn test_unknown_identifier_rejected() {
        let err = Expression::parse("os.system == 1").unwrap_err();
        assert_eq!(
            err,
            ExpressionError::UnknownIdentifier {
                name: "os".to_string()
            }
        );
        assert!(Expression::parse("__import__('os')").is_err());
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(
            Expression::parse("state.a =="),
            Err(ExpressionError::UnexpectedEnd { .. })
        ));
        assert!(matches!(
            Expression::parse("state.a == 'open"),
            Err(ExpressionError::UnterminatedString { .. })
        ));
        assert!(matches!(
            Expression::parse("state.a @ 1"),
            Err(ExpressionError::UnexpectedChar { ch: '@', .. })
        ));
        assert!(matches!(
            Expression::parse("state.a matches '('"),
            Err(ExpressionError::InvalidRegex { .. })
        ));
        assert!(matches!(
            Expression::parse("state.a == 1 2"),
            Err(ExpressionError::UnexpectedToken { .. })
        ));
    }

    #[test]
    fn test_source_round_trips() {
        let expr: Expression = "state.v > 1".parse().unwrap();
        assert_eq!(expr.source(), "state.v > 1");
        assert_eq!(expr.to_string(), "state.v > 1");
    }

    #[test]
    fn test_deep_nesting_is_rejected() {
        let parens = format!("{}true{}", "(".repeat(10_000), ")".repeat(10_000));
        assert_eq!(
            Expression::parse(&parens).unwrap_err(),
            ExpressionError::TooDeep { limit: MAX_DEPTH }
        );

        let negations = format!("{}true", "!".repeat(200_000));
        assert!(matches!(
            Expression::parse(&negations),
            Err(ExpressionError::TooDeep { .. })
        ));

        let lists = format!("state.a in {}1{}", "[".repeat(5_000), "]".repeat(5_000));
        assert!(matches!(
            Expression::parse(&lists),
            Err(ExpressionError::TooDeep { .. })
        ));
    }

    #[test]
    fn test_moderate_nesting_and_long_chains() {
        let nested = format!("{}state.v == 1{}", "(".repeat(50), ")".repeat(50));
        assert!(eval_bool(&nested, json!({"v": 1})).unwrap());

        let chain = vec!["state.v == 1"; 50_000].join(" and ");
        assert!(eval_bool(&chain, json!({"v": 1})).unwrap());
        assert!(!eval_bool(&chain, json!({"v": 2})).unwrap());
    }
}
