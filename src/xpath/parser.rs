//! Recursive descent parser for `XPath` 1.0 expressions.
//!
//! One method per grammar production of `XPath` 1.0 §3, from `OrExpr` down
//! to `PrimaryExpr` and `Step`. Errors report the byte offset of the
//! offending token.

use super::ast::{Axis, BinaryOp, Expr, LocationPath, NodeTest, Step};
use super::lexer::{tokenize, OperatorName, Spanned, Token};
use super::types::XPathError;

/// Deepest expression tree the parser builds.
const MAX_NESTING: usize = 256;

/// Parses an expression string into an AST.
///
/// # Errors
///
/// Returns [`XPathError::Syntax`] if the expression is empty or malformed.
pub fn parse(input: &str) -> Result<Expr, XPathError> {
    let tokens = tokenize(input)?;
    let mut parser = Parser {
        tokens,
        pos: 0,
        end: input.len(),
        depth: 0,
    };
    if parser.tokens.is_empty() {
        return Err(parser.error("empty expression"));
    }
    let expr = parser.parse_or()?;
    if let Some(token) = parser.peek() {
        return Err(parser.error(format!("unexpected '{token}' after expression")));
    }
    Ok(expr)
}

struct Parser {
    tokens: Vec<Spanned>,
    pos: usize,
    /// Length of the input, reported for errors at the end.
    end: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|s| &s.token)
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.peek() == Some(token) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: &Token) -> Result<(), XPathError> {
        if self.eat(token) {
            Ok(())
        } else {
            Err(self.error(format!("expected '{token}', found {}", self.describe())))
        }
    }

    fn describe(&self) -> String {
        self.peek()
            .map_or_else(|| "end of expression".to_string(), |t| format!("'{t}'"))
    }

    fn error(&self, message: impl Into<String>) -> XPathError {
        XPathError::Syntax {
            message: message.into(),
            position: self.tokens.get(self.pos).map_or(self.end, |s| s.position),
        }
    }

    fn binary(op: BinaryOp, left: Expr, right: Expr) -> Expr {
        Expr::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    /// Enters one level of the expression tree.
    fn descend(&mut self) -> Result<(), XPathError> {
        if self.depth >= MAX_NESTING {
            return Err(self.error("expression nested too deeply"));
        }
        self.depth += 1;
        Ok(())
    }

    // --- Operators, lowest precedence first ---
    //
    // Every operator application deepens the tree, so chains count against
    // the nesting limit as well.

    fn parse_or(&mut self) -> Result<Expr, XPathError> {
        let saved = self.depth;
        let mut left = self.parse_and()?;
        while self.eat(&Token::Operator(OperatorName::Or)) {
            self.descend()?;
            let right = self.parse_and()?;
            left = Self::binary(BinaryOp::Or, left, right);
        }
        self.depth = saved;
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr, XPathError> {
        let saved = self.depth;
        let mut left = self.parse_equality()?;
        while self.eat(&Token::Operator(OperatorName::And)) {
            self.descend()?;
            let right = self.parse_equality()?;
            left = Self::binary(BinaryOp::And, left, right);
        }
        self.depth = saved;
        Ok(left)
    }

    fn parse_equality(&mut self) -> Result<Expr, XPathError> {
        let saved = self.depth;
        let mut left = self.parse_relational()?;
        while let Some(op) = match self.peek() {
            Some(Token::Equal) => Some(BinaryOp::Eq),
            Some(Token::NotEqual) => Some(BinaryOp::Neq),
            _ => None,
        } {
            self.pos += 1;
            self.descend()?;
            let right = self.parse_relational()?;
            left = Self::binary(op, left, right);
        }
        self.depth = saved;
        Ok(left)
    }

    fn parse_relational(&mut self) -> Result<Expr, XPathError> {
        let saved = self.depth;
        let mut left = self.parse_additive()?;
        while let Some(op) = match self.peek() {
            Some(Token::Less) => Some(BinaryOp::Lt),
            Some(Token::LessEqual) => Some(BinaryOp::Lte),
            Some(Token::Greater) => Some(BinaryOp::Gt),
            Some(Token::GreaterEqual) => Some(BinaryOp::Gte),
            _ => None,
        } {
            self.pos += 1;
            self.descend()?;
            let right = self.parse_additive()?;
            left = Self::binary(op, left, right);
        }
        self.depth = saved;
        Ok(left)
    }

    fn parse_additive(&mut self) -> Result<Expr, XPathError> {
        let saved = self.depth;
        let mut left = self.parse_multiplicative()?;
        while let Some(op) = match self.peek() {
            Some(Token::Plus) => Some(BinaryOp::Add),
            Some(Token::Minus) => Some(BinaryOp::Sub),
            _ => None,
        } {
            self.pos += 1;
            self.descend()?;
            let right = self.parse_multiplicative()?;
            left = Self::binary(op, left, right);
        }
        self.depth = saved;
        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> Result<Expr, XPathError> {
        let saved = self.depth;
        let mut left = self.parse_unary()?;
        while let Some(op) = match self.peek() {
            Some(Token::Operator(OperatorName::Multiply)) => Some(BinaryOp::Mul),
            Some(Token::Operator(OperatorName::Div)) => Some(BinaryOp::Div),
            Some(Token::Operator(OperatorName::Mod)) => Some(BinaryOp::Mod),
            _ => None,
        } {
            self.pos += 1;
            self.descend()?;
            let right = self.parse_unary()?;
            left = Self::binary(op, left, right);
        }
        self.depth = saved;
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expr, XPathError> {
        let saved = self.depth;
        self.descend()?;
        let expr = if self.eat(&Token::Minus) {
            Expr::Negate(Box::new(self.parse_unary()?))
        } else {
            self.parse_union()?
        };
        self.depth = saved;
        Ok(expr)
    }

    fn parse_union(&mut self) -> Result<Expr, XPathError> {
        let saved = self.depth;
        let mut left = self.parse_path()?;
        while self.eat(&Token::Pipe) {
            self.descend()?;
            let right = self.parse_path()?;
            left = Expr::Union(Box::new(left), Box::new(right));
        }
        self.depth = saved;
        Ok(left)
    }

    // --- Paths ---

    /// `PathExpr ::= LocationPath | FilterExpr (('/' | '//') RelativeLocationPath)?`
    fn parse_path(&mut self) -> Result<Expr, XPathError> {
        match self.peek() {
            Some(
                Token::Variable(_)
                | Token::Literal(_)
                | Token::Number(_)
                | Token::LeftParen
                | Token::FunctionName(_),
            ) => {
                let filter = self.parse_filter()?;
                let mut steps = Vec::new();
                if self.eat(&Token::DoubleSlash) {
                    steps.push(Step::descendant_or_self());
                } else if !self.eat(&Token::Slash) {
                    return Ok(filter);
                }
                self.parse_relative_path(&mut steps)?;
                Ok(Expr::FilterPath {
                    filter: Box::new(filter),
                    steps,
                })
            }
            Some(Token::Slash) => {
                self.pos += 1;
                let mut steps = Vec::new();
                if self.at_step_start() {
                    self.parse_relative_path(&mut steps)?;
                }
                Ok(Expr::Path(LocationPath {
                    absolute: true,
                    steps,
                }))
            }
            Some(Token::DoubleSlash) => {
                self.pos += 1;
                let mut steps = vec![Step::descendant_or_self()];
                self.parse_relative_path(&mut steps)?;
                Ok(Expr::Path(LocationPath {
                    absolute: true,
                    steps,
                }))
            }
            _ if self.at_step_start() => {
                let mut steps = Vec::new();
                self.parse_relative_path(&mut steps)?;
                Ok(Expr::Path(LocationPath {
                    absolute: false,
                    steps,
                }))
            }
            _ => Err(self.error(format!("expected expression, found {}", self.describe()))),
        }
    }

    fn parse_filter(&mut self) -> Result<Expr, XPathError> {
        let primary = self.parse_primary()?;
        let predicates = self.parse_predicates()?;
        if predicates.is_empty() {
            Ok(primary)
        } else {
            Ok(Expr::Filter {
                primary: Box::new(primary),
                predicates,
            })
        }
    }

    fn parse_primary(&mut self) -> Result<Expr, XPathError> {
        let Some(token) = self.peek().cloned() else {
            return Err(self.error("unexpected end of expression"));
        };
        self.pos += 1;
        match token {
            Token::Variable(name) => Ok(Expr::Variable(name)),
            Token::Literal(value) => Ok(Expr::Literal(value)),
            Token::Number(value) => Ok(Expr::Number(value)),
            Token::LeftParen => {
                let expr = self.parse_or()?;
                self.expect(&Token::RightParen)?;
                Ok(expr)
            }
            Token::FunctionName(name) => {
                self.expect(&Token::LeftParen)?;
                let mut args = Vec::new();
                if !self.eat(&Token::RightParen) {
                    loop {
                        args.push(self.parse_or()?);
                        if self.eat(&Token::RightParen) {
                            break;
                        }
                        self.expect(&Token::Comma)?;
                    }
                }
                Ok(Expr::Call { name, args })
            }
            _ => {
                self.pos -= 1;
                Err(self.error(format!("expected primary expression, found {}", self.describe())))
            }
        }
    }

    fn at_step_start(&self) -> bool {
        matches!(
            self.peek(),
            Some(
                Token::Dot
                    | Token::DotDot
                    | Token::At
                    | Token::AxisName(_)
                    | Token::NodeType(_)
                    | Token::NameTest(_)
            )
        )
    }

    fn parse_relative_path(&mut self, steps: &mut Vec<Step>) -> Result<(), XPathError> {
        steps.push(self.parse_step()?);
        loop {
            if self.eat(&Token::Slash) {
                steps.push(self.parse_step()?);
            } else if self.eat(&Token::DoubleSlash) {
                steps.push(Step::descendant_or_self());
                steps.push(self.parse_step()?);
            } else {
                return Ok(());
            }
        }
    }

    fn parse_step(&mut self) -> Result<Step, XPathError> {
        if self.eat(&Token::Dot) {
            return Ok(Step::new(Axis::SelfAxis, NodeTest::Node));
        }
        if self.eat(&Token::DotDot) {
            return Ok(Step::new(Axis::Parent, NodeTest::Node));
        }

        let axis = if self.eat(&Token::At) {
            Axis::Attribute
        } else if let Some(Token::AxisName(name)) = self.peek() {
            let Some(axis) = Axis::from_name(name) else {
                return Err(self.error(format!("unknown axis '{name}'")));
            };
            self.pos += 1;
            self.expect(&Token::ColonColon)?;
            axis
        } else {
            Axis::Child
        };

        let test = self.parse_node_test()?;
        let predicates = self.parse_predicates()?;
        Ok(Step {
            axis,
            test,
            predicates,
        })
    }

    fn parse_node_test(&mut self) -> Result<NodeTest, XPathError> {
        match self.peek().cloned() {
            Some(Token::NameTest(name)) => {
                self.pos += 1;
                Ok(if name == "*" {
                    NodeTest::Any
                } else if let Some(prefix) = name.strip_suffix(":*") {
                    NodeTest::AnyInNamespace(prefix.to_string())
                } else if let Some((prefix, local)) = name.split_once(':') {
                    NodeTest::Name {
                        prefix: Some(prefix.to_string()),
                        local: local.to_string(),
                    }
                } else {
                    NodeTest::Name {
                        prefix: None,
                        local: name,
                    }
                })
            }
            Some(Token::NodeType(kind)) => {
                self.pos += 1;
                self.expect(&Token::LeftParen)?;
                let test = match kind.as_str() {
                    "node" => NodeTest::Node,
                    "text" => NodeTest::Text,
                    "comment" => NodeTest::Comment,
                    _ => match self.peek().cloned() {
                        Some(Token::Literal(target)) => {
                            self.pos += 1;
                            NodeTest::ProcessingInstruction(Some(target))
                        }
                        _ => NodeTest::ProcessingInstruction(None),
                    },
                };
                self.expect(&Token::RightParen)?;
                Ok(test)
            }
            _ => Err(self.error(format!("expected node test, found {}", self.describe()))),
        }
    }

    fn parse_predicates(&mut self) -> Result<Vec<Expr>, XPathError> {
        let mut predicates = Vec::new();
        while self.eat(&Token::LeftBracket) {
            predicates.push(self.parse_or()?);
            self.expect(&Token::RightBracket)?;
        }
        Ok(predicates)
    }
}
