//! Condition expressions
//!
//! A small boolean language over event fields, parsed once at load time:
//!
//! ```text
//! tool_name == "Bash" && (command ^= "rm " || command ~= "git\s+push\s+--force")
//! not file_path *= "/node_modules/"
//! ```
//!
//! Operators: `==` equal, `!=` not equal, `^=` starts with, `*=` contains,
//! `~=` regex match. `&&`/`and`, `||`/`or`, `!`/`not` and parentheses
//! combine comparisons. A field the event does not have never equals,
//! starts with, contains, or matches anything.

use std::fmt;

use regex::Regex;
use tracing::debug;

use crate::events::Event;

/// Parse failures
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConditionError {
    /// An operator the language does not have
    UnknownOperator(String),
    /// Malformed expression
    Syntax(String),
    /// A `~=` literal is not a valid regex
    Regex(String),
}

impl fmt::Display for ConditionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConditionError::UnknownOperator(op) => write!(f, "unknown operator '{}'", op),
            ConditionError::Syntax(msg) => f.write_str(msg),
            ConditionError::Regex(msg) => write!(f, "invalid regex: {}", msg),
        }
    }
}

/// Comparison operator
#[derive(Debug, Clone)]
pub enum CompareOp {
    Eq,
    Ne,
    Prefix,
    Contains,
    Matches(Regex),
}

impl CompareOp {
    fn symbol(&self) -> &'static str {
        match self {
            CompareOp::Eq => "==",
            CompareOp::Ne => "!=",
            CompareOp::Prefix => "^=",
            CompareOp::Contains => "*=",
            CompareOp::Matches(_) => "~=",
        }
    }
}

/// Parsed condition tree
#[derive(Debug, Clone)]
pub enum Condition {
    Compare {
        field: String,
        op: CompareOp,
        value: String,
    },
    Not(Box<Condition>),
    And(Box<Condition>, Box<Condition>),
    Or(Box<Condition>, Box<Condition>),
}

impl Condition {
    /// Parse a condition expression
    pub fn parse(input: &str) -> Result<Condition, ConditionError> {
        let tokens = tokenize(input)?;
        if tokens.is_empty() {
            return Err(ConditionError::Syntax("empty condition".to_string()));
        }

        let mut parser = Parser { tokens, pos: 0 };
        let condition = parser.parse_or()?;
        match parser.peek() {
            None => Ok(condition),
            Some(token) => Err(ConditionError::Syntax(format!(
                "unexpected {} after end of expression",
                token.describe()
            ))),
        }
    }

    /// Evaluate against an event
    pub fn evaluate(&self, event: &Event) -> bool {
        match self {
            Condition::Compare { field, op, value } => {
                let actual = event.field(field);
                let result = match (op, actual.as_deref()) {
                    (CompareOp::Ne, None) => true,
                    (_, None) => false,
                    (CompareOp::Eq, Some(actual)) => actual == value,
                    (CompareOp::Ne, Some(actual)) => actual != value,
                    (CompareOp::Prefix, Some(actual)) => actual.starts_with(value.as_str()),
                    (CompareOp::Contains, Some(actual)) => actual.contains(value.as_str()),
                    (CompareOp::Matches(regex), Some(actual)) => regex.is_match(actual),
                };
                debug!(field = %field, op = op.symbol(), result, "Evaluated comparison");
                result
            }
            Condition::Not(inner) => !inner.evaluate(event),
            Condition::And(left, right) => left.evaluate(event) && right.evaluate(event),
            Condition::Or(left, right) => left.evaluate(event) || right.evaluate(event),
        }
    }

    /// Every field the condition reads
    pub fn fields(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_fields(&mut out);
        out
    }

    fn collect_fields<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Condition::Compare { field, .. } => {
                if !out.contains(&field.as_str()) {
                    out.push(field);
                }
            }
            Condition::Not(inner) => inner.collect_fields(out),
            Condition::And(left, right) | Condition::Or(left, right) => {
                left.collect_fields(out);
                right.collect_fields(out);
            }
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Condition::Compare { field, op, value } => {
                write!(f, "{} {} {:?}", field, op.symbol(), value)
            }
            Condition::Not(inner) => write!(f, "!({})", inner),
            Condition::And(left, right) => write!(f, "({} && {})", left, right),
            Condition::Or(left, right) => write!(f, "({} || {})", left, right),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Str(String),
    Bool(bool),
    Op(String),
    And,
    Or,
    Not,
    LParen,
    RParen,
}

impl Token {
    fn describe(&self) -> String {
        match self {
            Token::Ident(name) => format!("'{}'", name),
            Token::Str(value) => format!("string {:?}", value),
            Token::Bool(value) => format!("'{}'", value),
            Token::Op(op) => format!("'{}'", op),
            Token::And => "'&&'".to_string(),
            Token::Or => "'||'".to_string(),
            Token::Not => "'!'".to_string(),
            Token::LParen => "'('".to_string(),
            Token::RParen => "')'".to_string(),
        }
    }
}

// Longest match wins, so `&&!` is `&&` followed by `!`
const TWO_CHAR_OPERATORS: &[&str] = &["&&", "||", "==", "!=", "^=", "*=", "~="];

const OPERATOR_CHARS: &[char] = &['=', '!', '^', '~', '*', '<', '>', '&', '|', '%', '$', '?', '+', '-', '@', '#'];

fn tokenize(input: &str) -> Result<Vec<Token>, ConditionError> {
    let chars: Vec<char> = input.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];

        if c.is_whitespace() {
            i += 1;
        } else if c == '(' {
            tokens.push(Token::LParen);
            i += 1;
        } else if c == ')' {
            tokens.push(Token::RParen);
            i += 1;
        } else if c == '"' {
            let mut value = String::new();
            i += 1;
            loop {
                match chars.get(i) {
                    None => {
                        return Err(ConditionError::Syntax("unterminated string literal".to_string()))
                    }
                    Some('"') => {
                        i += 1;
                        break;
                    }
                    Some('\\') => {
                        match chars.get(i + 1) {
                            Some('"') => value.push('"'),
                            Some('\\') => value.push('\\'),
                            Some('n') => value.push('\n'),
                            Some('t') => value.push('\t'),
                            // Unknown escapes stay verbatim so regex classes like \s survive
                            Some(other) => {
                                value.push('\\');
                                value.push(*other);
                            }
                            None => {
                                return Err(ConditionError::Syntax(
                                    "unterminated string literal".to_string(),
                                ))
                            }
                        }
                        i += 2;
                    }
                    Some(other) => {
                        value.push(*other);
                        i += 1;
                    }
                }
            }
            tokens.push(Token::Str(value));
        } else if c.is_ascii_alphabetic() || c == '_' {
            let start = i;
            while i < chars.len()
                && (chars[i].is_ascii_alphanumeric() || chars[i] == '_' || chars[i] == '.')
            {
                i += 1;
            }
            let word: String = chars[start..i].iter().collect();
            tokens.push(match word.as_str() {
                "and" | "AND" => Token::And,
                "or" | "OR" => Token::Or,
                "not" | "NOT" => Token::Not,
                "true" => Token::Bool(true),
                "false" => Token::Bool(false),
                _ => Token::Ident(word),
            });
        } else if OPERATOR_CHARS.contains(&c) {
            let pair: String = chars[i..chars.len().min(i + 2)].iter().collect();
            if let Some(op) = TWO_CHAR_OPERATORS.iter().find(|op| **op == pair) {
                tokens.push(match *op {
                    "&&" => Token::And,
                    "||" => Token::Or,
                    _ => Token::Op(op.to_string()),
                });
                i += 2;
            } else if c == '!' {
                tokens.push(Token::Not);
                i += 1;
            } else {
                let start = i;
                while i < chars.len() && OPERATOR_CHARS.contains(&chars[i]) {
                    i += 1;
                }
                let op: String = chars[start..i].iter().collect();
                return Err(ConditionError::UnknownOperator(op));
            }
        } else {
            return Err(ConditionError::Syntax(format!(
                "unexpected character '{}' at offset {}",
                c, i
            )));
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
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn parse_or(&mut self) -> Result<Condition, ConditionError> {
        let mut left = self.parse_and()?;
        while self.peek() == Some(&Token::Or) {
            self.pos += 1;
            let right = self.parse_and()?;
            left = Condition::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Condition, ConditionError> {
        let mut left = self.parse_unary()?;
        while self.peek() == Some(&Token::And) {
            self.pos += 1;
            let right = self.parse_unary()?;
            left = Condition::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Condition, ConditionError> {
        match self.next() {
            Some(Token::Not) => Ok(Condition::Not(Box::new(self.parse_unary()?))),
            Some(Token::LParen) => {
                let inner = self.parse_or()?;
                match self.next() {
                    Some(Token::RParen) => Ok(inner),
                    Some(token) => Err(ConditionError::Syntax(format!(
                        "expected ')' but found {}",
                        token.describe()
                    ))),
                    None => Err(ConditionError::Syntax("missing ')'".to_string())),
                }
            }
            Some(Token::Ident(field)) => self.parse_compare(field),
            Some(token) => Err(ConditionError::Syntax(format!(
                "expected a field name but found {}",
                token.describe()
            ))),
            None => Err(ConditionError::Syntax("unexpected end of expression".to_string())),
        }
    }

    fn parse_compare(&mut self, field: String) -> Result<Condition, ConditionError> {
        let op = match self.next() {
            Some(Token::Op(op)) => op,
            // A word in operator position is an operator this language lacks
            Some(Token::Ident(word)) => return Err(ConditionError::UnknownOperator(word)),
            Some(token) => {
                return Err(ConditionError::Syntax(format!(
                    "expected an operator after '{}' but found {}",
                    field,
                    token.describe()
                )))
            }
            None => {
                return Err(ConditionError::Syntax(format!(
                    "expected an operator after '{}'",
                    field
                )))
            }
        };

        let (value, is_bool) = match self.next() {
            Some(Token::Str(value)) => (value, false),
            Some(Token::Bool(value)) => (value.to_string(), true),
            Some(token) => {
                return Err(ConditionError::Syntax(format!(
                    "expected a literal after '{}' but found {}",
                    op,
                    token.describe()
                )))
            }
            None => {
                return Err(ConditionError::Syntax(format!(
                    "expected a literal after '{}'",
                    op
                )))
            }
        };

        let op = match op.as_str() {
            "==" => CompareOp::Eq,
            "!=" => CompareOp::Ne,
            other if is_bool => {
                return Err(ConditionError::Syntax(format!(
                    "operator '{}' needs a string literal",
                    other
                )))
            }
            "^=" => CompareOp::Prefix,
            "*=" => CompareOp::Contains,
            "~=" => CompareOp::Matches(
                Regex::new(&value).map_err(|e| ConditionError::Regex(e.to_string()))?,
            ),
            other => return Err(ConditionError::UnknownOperator(other.to_string())),
        };

        Ok(Condition::Compare { field, op, value })
    }
}
