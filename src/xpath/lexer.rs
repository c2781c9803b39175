//! Tokenizer for `XPath` expressions.
//!
//! Works on characters, so names may use any XML name character, and reports
//! byte offsets into the expression. The lexical ambiguities of `XPath` 1.0
//! §3.7 are resolved here: after an operand, `*` is multiplication and a
//! bare name is an operator name (`and`, `or`, `mod`, `div`); a name followed
//! by `(` is a function or node type; a name followed by `::` is an axis.

use std::fmt;

use crate::chars::{is_name_char, is_name_start_char};

use super::types::XPathError;

const NODE_TYPES: &[&str] = &["comment", "text", "processing-instruction", "node"];

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    LeftParen,
    RightParen,
    LeftBracket,
    RightBracket,
    Dot,
    DotDot,
    At,
    Comma,
    ColonColon,
    Slash,
    DoubleSlash,
    Pipe,
    Plus,
    Minus,
    Equal,
    NotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    /// An operator name or `*` as multiplication.
    Operator(OperatorName),
    Number(f64),
    Literal(String),
    Variable(String),
    /// A name test: `*`, `prefix:*`, `name` or `prefix:name`.
    NameTest(String),
    FunctionName(String),
    NodeType(String),
    AxisName(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatorName {
    And,
    Or,
    Mod,
    Div,
    Multiply,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LeftParen => f.write_str("("),
            Self::RightParen => f.write_str(")"),
            Self::LeftBracket => f.write_str("["),
            Self::RightBracket => f.write_str("]"),
            Self::Dot => f.write_str("."),
            Self::DotDot => f.write_str(".."),
            Self::At => f.write_str("@"),
            Self::Comma => f.write_str(","),
            Self::ColonColon => f.write_str("::"),
            Self::Slash => f.write_str("/"),
            Self::DoubleSlash => f.write_str("//"),
            Self::Pipe => f.write_str("|"),
            Self::Plus => f.write_str("+"),
            Self::Minus => f.write_str("-"),
            Self::Equal => f.write_str("="),
            Self::NotEqual => f.write_str("!="),
            Self::Less => f.write_str("<"),
            Self::LessEqual => f.write_str("<="),
            Self::Greater => f.write_str(">"),
            Self::GreaterEqual => f.write_str(">="),
            Self::Operator(op) => f.write_str(match op {
                OperatorName::And => "and",
                OperatorName::Or => "or",
                OperatorName::Mod => "mod",
                OperatorName::Div => "div",
                OperatorName::Multiply => "*",
            }),
            Self::Number(n) => write!(f, "{n}"),
            Self::Literal(s) => write!(f, "'{s}'"),
            Self::Variable(s) => write!(f, "${s}"),
            Self::NameTest(s) | Self::FunctionName(s) | Self::NodeType(s) | Self::AxisName(s) => {
                f.write_str(s)
            }
        }
    }
}

/// A token and the byte offset it starts at.
#[derive(Debug, Clone, PartialEq)]
pub struct Spanned {
    pub token: Token,
    pub position: usize,
}

/// Splits `input` into tokens.
///
/// # Errors
///
/// Returns [`XPathError::Syntax`] for characters that cannot start a token,
/// unterminated literals and malformed operators.
pub fn tokenize(input: &str) -> Result<Vec<Spanned>, XPathError> {
    let mut lexer = Lexer {
        input,
        pos: 0,
        tokens: Vec::new(),
    };
    lexer.run()?;
    Ok(lexer.tokens)
}

struct Lexer<'a> {
    input: &'a str,
    pos: usize,
    tokens: Vec<Spanned>,
}

impl Lexer<'_> {
    fn run(&mut self) -> Result<(), XPathError> {
        loop {
            self.skip_whitespace();
            let Some(c) = self.peek() else {
                return Ok(());
            };
            let start = self.pos;
            let token = match c {
                '(' => self.single(Token::LeftParen),
                ')' => self.single(Token::RightParen),
                '[' => self.single(Token::LeftBracket),
                ']' => self.single(Token::RightBracket),
                '@' => self.single(Token::At),
                ',' => self.single(Token::Comma),
                '|' => self.single(Token::Pipe),
                '+' => self.single(Token::Plus),
                '-' => self.single(Token::Minus),
                '=' => self.single(Token::Equal),
                '$' => self.variable()?,
                '"' | '\'' => self.literal(c)?,
                '*' => {
                    self.pos += 1;
                    if self.operator_expected() {
                        Token::Operator(OperatorName::Multiply)
                    } else {
                        Token::NameTest("*".to_string())
                    }
                }
                '/' => {
                    self.pos += 1;
                    if self.eat('/') {
                        Token::DoubleSlash
                    } else {
                        Token::Slash
                    }
                }
                '.' => {
                    if self.peek_at(1).is_some_and(|d| d.is_ascii_digit()) {
                        self.number()?
                    } else {
                        self.pos += 1;
                        if self.eat('.') {
                            Token::DotDot
                        } else {
                            Token::Dot
                        }
                    }
                }
                ':' => {
                    self.pos += 1;
                    if !self.eat(':') {
                        return Err(self.error(start, "expected '::'"));
                    }
                    Token::ColonColon
                }
                '!' => {
                    self.pos += 1;
                    if !self.eat('=') {
                        return Err(self.error(start, "expected '!='"));
                    }
                    Token::NotEqual
                }
                '<' => {
                    self.pos += 1;
                    if self.eat('=') {
                        Token::LessEqual
                    } else {
                        Token::Less
                    }
                }
                '>' => {
                    self.pos += 1;
                    if self.eat('=') {
                        Token::GreaterEqual
                    } else {
                        Token::Greater
                    }
                }
                '0'..='9' => self.number()?,
                c if is_ncname_start(c) => self.name()?,
                c => return Err(self.error(start, format!("unexpected character '{c}'"))),
            };
            self.tokens.push(Spanned {
                token,
                position: start,
            });
        }
    }

    fn peek(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn peek_at(&self, n: usize) -> Option<char> {
        self.input[self.pos..].chars().nth(n)
    }

    fn eat(&mut self, c: char) -> bool {
        if self.peek() == Some(c) {
            self.pos += c.len_utf8();
            true
        } else {
            false
        }
    }

    fn single(&mut self, token: Token) -> Token {
        self.pos += 1;
        token
    }

    fn skip_whitespace(&mut self) {
        while let Some(c) = self.peek().filter(|c| matches!(c, ' ' | '\t' | '\n' | '\r')) {
            self.pos += c.len_utf8();
        }
    }

    fn take_ncname(&mut self) -> &str {
        let start = self.pos;
        while let Some(c) = self.peek().filter(|&c| c != ':' && is_name_char(c as u32)) {
            self.pos += c.len_utf8();
        }
        &self.input[start..self.pos]
    }

    /// Whether the previous token ends an operand, in which case `*` and
    /// operator names are operators (XPath 1.0 §3.7).
    fn operator_expected(&self) -> bool {
        self.tokens.last().is_some_and(|prev| {
            !matches!(
                prev.token,
                Token::At
                    | Token::ColonColon
                    | Token::LeftParen
                    | Token::LeftBracket
                    | Token::Comma
                    | Token::Operator(_)
                    | Token::Slash
                    | Token::DoubleSlash
                    | Token::Pipe
                    | Token::Plus
                    | Token::Minus
                    | Token::Equal
                    | Token::NotEqual
                    | Token::Less
                    | Token::LessEqual
                    | Token::Greater
                    | Token::GreaterEqual
            )
        })
    }

    fn variable(&mut self) -> Result<Token, XPathError> {
        let start = self.pos;
        self.pos += 1;
        if !self.peek().is_some_and(is_ncname_start) {
            return Err(self.error(start, "expected variable name after '$'"));
        }
        let mut name = self.take_ncname().to_string();
        if self.peek() == Some(':') && self.peek_at(1).is_some_and(is_ncname_start) {
            self.pos += 1;
            name.push(':');
            name.push_str(self.take_ncname());
        }
        Ok(Token::Variable(name))
    }

    fn literal(&mut self, quote: char) -> Result<Token, XPathError> {
        let start = self.pos;
        self.pos += 1;
        let Some(len) = self.input[self.pos..].find(quote) else {
            return Err(self.error(start, "unterminated string literal"));
        };
        let value = self.input[self.pos..self.pos + len].to_string();
        self.pos += len + 1;
        Ok(Token::Literal(value))
    }

    fn number(&mut self) -> Result<Token, XPathError> {
        let start = self.pos;
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.pos += 1;
        }
        if self.eat('.') {
            while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                self.pos += 1;
            }
        }
        let text = &self.input[start..self.pos];
        text.parse::<f64>()
            .map(Token::Number)
            .map_err(|_| self.error(start, format!("invalid number '{text}'")))
    }

    fn name(&mut self) -> Result<Token, XPathError> {
        let first = self.take_ncname().to_string();

        if self.operator_expected() {
            return match first.as_str() {
                "and" => Ok(Token::Operator(OperatorName::And)),
                "or" => Ok(Token::Operator(OperatorName::Or)),
                "mod" => Ok(Token::Operator(OperatorName::Mod)),
                "div" => Ok(Token::Operator(OperatorName::Div)),
                _ => Err(self.error(
                    self.pos - first.len(),
                    format!("expected an operator, found '{first}'"),
                )),
            };
        }

        // prefix:* and prefix:local; '::' belongs to the axis.
        let mut name = first;
        if self.peek() == Some(':') {
            match self.peek_at(1) {
                Some('*') => {
                    self.pos += 2;
                    return Ok(Token::NameTest(format!("{name}:*")));
                }
                Some(c) if is_ncname_start(c) => {
                    self.pos += 1;
                    name.push(':');
                    name.push_str(self.take_ncname());
                }
                _ => {}
            }
        }

        let rest = self.input[self.pos..].trim_start_matches([' ', '\t', '\n', '\r']);
        if rest.starts_with("::") {
            Ok(Token::AxisName(name))
        } else if rest.starts_with('(') {
            if NODE_TYPES.contains(&name.as_str()) {
                Ok(Token::NodeType(name))
            } else {
                Ok(Token::FunctionName(name))
            }
        } else {
            Ok(Token::NameTest(name))
        }
    }

    fn error(&self, position: usize, message: impl Into<String>) -> XPathError {
        XPathError::Syntax {
            message: message.into(),
            position,
        }
    }
}

fn is_ncname_start(c: char) -> bool {
    c != ':' && is_name_start_char(c as u32)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn tokens(input: &str) -> Vec<Token> {
        tokenize(input)
            .unwrap()
            .into_iter()
            .map(|s| s.token)
            .collect()
    }

    #[test]
    fn test_star_disambiguation() {
        assert_eq!(
            tokens("* * *"),
            vec![
                Token::NameTest("*".to_string()),
                Token::Operator(OperatorName::Multiply),
                Token::NameTest("*".to_string()),
            ]
        );
        assert_eq!(
            tokens("@*"),
            vec![Token::At, Token::NameTest("*".to_string())]
        );
    }

    #[test]
    fn test_operator_names() {
        assert_eq!(
            tokens("div div div"),
            vec![
                Token::NameTest("div".to_string()),
                Token::Operator(OperatorName::Div),
                Token::NameTest("div".to_string()),
            ]
        );
        assert_eq!(
            tokens("a and b"),
            vec![
                Token::NameTest("a".to_string()),
                Token::Operator(OperatorName::And),
                Token::NameTest("b".to_string()),
            ]
        );
    }

    #[test]
    fn test_qualified_names() {
        assert_eq!(
            tokens("svg:* | svg:rect"),
            vec![
                Token::NameTest("svg:*".to_string()),
                Token::Pipe,
                Token::NameTest("svg:rect".to_string()),
            ]
        );
        assert_eq!(
            tokens("child::x"),
            vec![
                Token::AxisName("child".to_string()),
                Token::ColonColon,
                Token::NameTest("x".to_string()),
            ]
        );
    }

    #[test]
    fn test_functions_and_node_types() {
        assert_eq!(
            tokens("count (text())"),
            vec![
                Token::FunctionName("count".to_string()),
                Token::LeftParen,
                Token::NodeType("text".to_string()),
                Token::LeftParen,
                Token::RightParen,
                Token::RightParen,
            ]
        );
    }

    #[test]
    fn test_non_ascii_names_and_positions() {
        let spanned = tokenize("//été[@ñ='x']").unwrap();
        assert_eq!(spanned[1].token, Token::NameTest("été".to_string()));
        assert_eq!(spanned[3].position, "//été[".len());
    }

    #[test]
    fn test_numbers() {
        assert_eq!(
            tokens("1.5 + .5"),
            vec![Token::Number(1.5), Token::Plus, Token::Number(0.5)]
        );
    }

    #[test]
    fn test_errors_carry_positions() {
        match tokenize("a = 'open").unwrap_err() {
            XPathError::Syntax { position, .. } => assert_eq!(position, 4),
            other => panic!("unexpected error {other:?}"),
        }
        match tokenize("a # b").unwrap_err() {
            XPathError::Syntax { position, .. } => assert_eq!(position, 2),
            other => panic!("unexpected error {other:?}"),
        }
    }
}
