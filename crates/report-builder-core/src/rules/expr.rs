//! Boolean expressions over "literal is contained in the page text" predicates.
//!
//! Grammar (`and` binds tighter than `or`, keywords are case-insensitive):
//!
//! ```text
//! expr   := term ( "or" term )*
//! term   := factor ( "and" factor )*
//! factor := LITERAL | "(" expr ")"
//! ```
//!
//! Literals are delimited by single or double quotes and have no escape
//! sequences, so a literal may not contain either quote character.

use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Literal(String),
    And,
    Or,
    Open,
    Close,
}

/// A compiled rule expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    Contains(String),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
}

impl Expr {
    /// Compile rule text.
    ///
    /// Text without quote characters is a single substring predicate on the
    /// trimmed text.
    pub fn parse(rule: &str) -> Result<Self> {
        let trimmed = rule.trim();
        if trimmed.is_empty() {
            return Err(invalid(rule, "rule is empty"));
        }
        if !trimmed.contains(['\'', '"']) {
            return Ok(Self::Contains(trimmed.to_string()));
        }

        let tokens = tokenize(rule)?;
        let mut parser = Parser {
            rule,
            tokens: &tokens,
            pos: 0,
        };
        let expr = parser.expr()?;
        if let Some(token) = parser.peek() {
            return Err(invalid(rule, &format!("unexpected {}", describe(token))));
        }
        Ok(expr)
    }

    pub fn matches(&self, subject: &str) -> bool {
        match self {
            Self::Contains(literal) => subject.contains(literal.as_str()),
            Self::And(a, b) => a.matches(subject) && b.matches(subject),
            Self::Or(a, b) => a.matches(subject) || b.matches(subject),
        }
    }
}

/// Compile `rule` and test it against `subject`.
pub fn evaluate(rule: &str, subject: &str) -> Result<bool> {
    Ok(Expr::parse(rule)?.matches(subject))
}

fn invalid(rule: &str, reason: &str) -> Error {
    Error::InvalidRule {
        rule: rule.to_string(),
        reason: reason.to_string(),
    }
}

fn describe(token: &Token) -> String {
    match token {
        Token::Literal(s) => format!("literal '{s}'"),
        Token::And => "'and'".to_string(),
        Token::Or => "'or'".to_string(),
        Token::Open => "'('".to_string(),
        Token::Close => "')'".to_string(),
    }
}

fn tokenize(rule: &str) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut chars = rule.char_indices().peekable();

    while let Some(&(start, c)) = chars.peek() {
        match c {
            c if c.is_whitespace() => {
                chars.next();
            }
            '(' => {
                chars.next();
                tokens.push(Token::Open);
            }
            ')' => {
                chars.next();
                tokens.push(Token::Close);
            }
            '\'' | '"' => {
                chars.next();
                let mut literal = String::new();
                let mut closed = false;
                for (_, ch) in chars.by_ref() {
                    if ch == c {
                        closed = true;
                        break;
                    }
                    if ch == '\'' || ch == '"' {
                        return Err(invalid(rule, "quote characters inside a literal are not supported"));
                    }
                    literal.push(ch);
                }
                if !closed {
                    return Err(invalid(rule, &format!("unterminated literal starting at {start}")));
                }
                tokens.push(Token::Literal(literal));
            }
            _ => {
                let mut word = String::new();
                while let Some(&(_, ch)) = chars.peek() {
                    if ch.is_whitespace() || matches!(ch, '(' | ')' | '\'' | '"') {
                        break;
                    }
                    word.push(ch);
                    chars.next();
                }
                match word.to_ascii_lowercase().as_str() {
                    "and" => tokens.push(Token::And),
                    "or" => tokens.push(Token::Or),
                    _ => {
                        return Err(invalid(rule, &format!("unknown token '{word}' outside quotes")));
                    }
                }
            }
        }
    }

    Ok(tokens)
}

struct Parser<'a> {
    rule: &'a str,
    tokens: &'a [Token],
    pos: usize,
}

impl Parser<'_> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<&Token> {
        let token = self.tokens.get(self.pos);
        self.pos += 1;
        token
    }

    fn expr(&mut self) -> Result<Expr> {
        let mut lhs = self.term()?;
        while self.peek() == Some(&Token::Or) {
            self.pos += 1;
            let rhs = self.term()?;
            lhs = Expr::Or(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn term(&mut self) -> Result<Expr> {
        let mut lhs = self.factor()?;
        while self.peek() == Some(&Token::And) {
            self.pos += 1;
            let rhs = self.factor()?;
            lhs = Expr::And(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn factor(&mut self) -> Result<Expr> {
        let rule = self.rule;
        match self.next() {
            Some(Token::Literal(s)) => Ok(Expr::Contains(s.clone())),
            Some(Token::Open) => {
                let inner = self.expr()?;
                match self.next() {
                    Some(Token::Close) => Ok(inner),
                    _ => Err(invalid(rule, "missing closing parenthesis")),
                }
            }
            Some(token) => {
                let token = describe(token);
                Err(invalid(rule, &format!("expected a literal, found {token}")))
            }
            None => Err(invalid(rule, "expression ends early")),
        }
    }
}
