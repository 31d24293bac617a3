//! Restricted condition grammar for conditional events.
//!
//! The only primitives are `events['id'].active`, `events['id'].state == 'X'`
//! and `events['id'].state != 'X'`, combined with `&&`, `||`, unary `!`, and
//! parentheses. This is a closed, deterministic little language — not a
//! general expression evaluator — so authored content can never execute
//! anything beyond these lookups.
//!
//! References to an event id absent from the active set resolve to
//! `active = false` / `state = ""` rather than failing: optional
//! dependencies combined with `||` still work, and with `&&` correctly
//! suppress.

use std::collections::BTreeMap;

use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
#[error("invalid condition expression: {0}")]
pub struct ConditionError(String);

#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// `events['id'].active`
    Active(String),
    /// `events['id'].state == 'X'`
    StateEq(String, String),
    /// `events['id'].state != 'X'`
    StateNe(String, String),
    Not(Box<Condition>),
    And(Box<Condition>, Box<Condition>),
    Or(Box<Condition>, Box<Condition>),
}

impl Condition {
    pub fn parse(input: &str) -> Result<Self, ConditionError> {
        let tokens = tokenize(input)?;
        let mut parser = Parser { tokens, pos: 0 };
        let expr = parser.parse_or()?;
        match parser.peek() {
            None => Ok(expr),
            Some(tok) => Err(ConditionError(format!("unexpected trailing {tok:?}"))),
        }
    }

    /// Evaluate against the map of already-active events (id → state label).
    pub fn eval(&self, active: &BTreeMap<String, String>) -> bool {
        match self {
            Condition::Active(id) => active.contains_key(id),
            Condition::StateEq(id, want) => {
                active.get(id).map(String::as_str).unwrap_or("") == want
            }
            Condition::StateNe(id, want) => {
                active.get(id).map(String::as_str).unwrap_or("") != want
            }
            Condition::Not(inner) => !inner.eval(active),
            Condition::And(a, b) => a.eval(active) && b.eval(active),
            Condition::Or(a, b) => a.eval(active) || b.eval(active),
        }
    }

    /// Every event id the expression references, in source order.
    pub fn referenced_ids(&self) -> Vec<&str> {
        let mut ids = Vec::new();
        self.collect_ids(&mut ids);
        ids
    }

    fn collect_ids<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Condition::Active(id) | Condition::StateEq(id, _) | Condition::StateNe(id, _) => {
                out.push(id);
            }
            Condition::Not(inner) => inner.collect_ids(out),
            Condition::And(a, b) | Condition::Or(a, b) => {
                a.collect_ids(out);
                b.collect_ids(out);
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Events,
    LBracket,
    RBracket,
    LParen,
    RParen,
    Dot,
    Active,
    State,
    EqEq,
    NotEq,
    AndAnd,
    OrOr,
    Bang,
    Str(String),
}

fn tokenize(input: &str) -> Result<Vec<Token>, ConditionError> {
    let mut tokens = Vec::new();
    let mut chars = input.chars().peekable();
    while let Some(&c) = chars.peek() {
        match c {
            ' ' | '\t' | '\n' | '\r' => {
                chars.next();
            }
            '[' => {
                chars.next();
                tokens.push(Token::LBracket);
            }
            ']' => {
                chars.next();
                tokens.push(Token::RBracket);
            }
            '(' => {
                chars.next();
                tokens.push(Token::LParen);
            }
            ')' => {
                chars.next();
                tokens.push(Token::RParen);
            }
            '.' => {
                chars.next();
                tokens.push(Token::Dot);
            }
            '\'' | '"' => {
                let quote = c;
                chars.next();
                let mut s = String::new();
                loop {
                    match chars.next() {
                        Some(ch) if ch == quote => break,
                        Some(ch) => s.push(ch),
                        None => return Err(ConditionError("unterminated string".into())),
                    }
                }
                tokens.push(Token::Str(s));
            }
            '=' => {
                chars.next();
                if chars.next_if_eq(&'=').is_none() {
                    return Err(ConditionError("expected '=='".into()));
                }
                tokens.push(Token::EqEq);
            }
            '&' => {
                chars.next();
                if chars.next_if_eq(&'&').is_none() {
                    return Err(ConditionError("expected '&&'".into()));
                }
                tokens.push(Token::AndAnd);
            }
            '|' => {
                chars.next();
                if chars.next_if_eq(&'|').is_none() {
                    return Err(ConditionError("expected '||'".into()));
                }
                tokens.push(Token::OrOr);
            }
            '!' => {
                chars.next();
                if chars.next_if_eq(&'=').is_some() {
                    tokens.push(Token::NotEq);
                } else {
                    tokens.push(Token::Bang);
                }
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let mut word = String::new();
                while let Some(&ch) = chars.peek() {
                    if ch.is_ascii_alphanumeric() || ch == '_' {
                        word.push(ch);
                        chars.next();
                    } else {
                        break;
                    }
                }
                match word.as_str() {
                    "events" => tokens.push(Token::Events),
                    "active" => tokens.push(Token::Active),
                    "state" => tokens.push(Token::State),
                    other => {
                        return Err(ConditionError(format!("unknown identifier '{other}'")));
                    }
                }
            }
            other => return Err(ConditionError(format!("unexpected character '{other}'"))),
        }
    }
    Ok(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let tok = self.tokens.get(self.pos).cloned();
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    fn expect(&mut self, want: &Token) -> Result<(), ConditionError> {
        match self.next() {
            Some(ref tok) if tok == want => Ok(()),
            other => Err(ConditionError(format!("expected {want:?}, found {other:?}"))),
        }
    }

    fn parse_or(&mut self) -> Result<Condition, ConditionError> {
        let mut left = self.parse_and()?;
        while self.peek() == Some(&Token::OrOr) {
            self.next();
            let right = self.parse_and()?;
            left = Condition::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Condition, ConditionError> {
        let mut left = self.parse_unary()?;
        while self.peek() == Some(&Token::AndAnd) {
            self.next();
            let right = self.parse_unary()?;
            left = Condition::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Condition, ConditionError> {
        if self.peek() == Some(&Token::Bang) {
            self.next();
            return Ok(Condition::Not(Box::new(self.parse_unary()?)));
        }
        if self.peek() == Some(&Token::LParen) {
            self.next();
            let inner = self.parse_or()?;
            self.expect(&Token::RParen)?;
            return Ok(inner);
        }
        self.parse_predicate()
    }

    fn parse_predicate(&mut self) -> Result<Condition, ConditionError> {
        self.expect(&Token::Events)?;
        self.expect(&Token::LBracket)?;
        let id = match self.next() {
            Some(Token::Str(id)) => id,
            other => return Err(ConditionError(format!("expected event id, found {other:?}"))),
        };
        self.expect(&Token::RBracket)?;
        self.expect(&Token::Dot)?;
        match self.next() {
            Some(Token::Active) => Ok(Condition::Active(id)),
            Some(Token::State) => {
                let negated = match self.next() {
                    Some(Token::EqEq) => false,
                    Some(Token::NotEq) => true,
                    other => {
                        return Err(ConditionError(format!(
                            "expected '==' or '!=', found {other:?}"
                        )));
                    }
                };
                let value = match self.next() {
                    Some(Token::Str(v)) => v,
                    other => {
                        return Err(ConditionError(format!(
                            "expected state name, found {other:?}"
                        )));
                    }
                };
                Ok(if negated {
                    Condition::StateNe(id, value)
                } else {
                    Condition::StateEq(id, value)
                })
            }
            other => Err(ConditionError(format!(
                "expected 'active' or 'state', found {other:?}"
            ))),
        }
    }
}
