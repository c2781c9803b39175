//! Abstract syntax tree for compiled `XPath` expressions.
//!
//! Produced by [`super::parser`] and walked by [`super::eval`]. Abbreviated
//! syntax is expanded while parsing: `//` becomes a
//! `descendant-or-self::node()` step, `.` is `self::node()`, `..` is
//! `parent::node()` and `@` selects the attribute axis.

use std::fmt;

/// An `XPath` expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Numeric literal.
    Number(f64),
    /// String literal.
    Literal(String),
    /// `$name`.
    Variable(String),
    /// Binary operator application.
    Binary {
        /// The operator.
        op: BinaryOp,
        /// Left operand.
        left: Box<Expr>,
        /// Right operand.
        right: Box<Expr>,
    },
    /// Unary minus.
    Negate(Box<Expr>),
    /// Function call.
    Call {
        /// Function name as written.
        name: String,
        /// Argument expressions.
        args: Vec<Expr>,
    },
    /// A location path, evaluated against the context node or, when
    /// absolute, the document node.
    Path(LocationPath),
    /// A primary expression followed by predicates, e.g. `(//a)[1]`.
    Filter {
        /// The expression producing the node-set.
        primary: Box<Expr>,
        /// Predicates, applied in document order.
        predicates: Vec<Expr>,
    },
    /// A filter expression followed by location steps, e.g. `$v//x`.
    FilterPath {
        /// The expression producing the starting node-set.
        filter: Box<Expr>,
        /// Steps applied to every node of the starting set.
        steps: Vec<Step>,
    },
    /// `left | right`.
    Union(Box<Expr>, Box<Expr>),
}

/// A sequence of location steps.
#[derive(Debug, Clone, PartialEq)]
pub struct LocationPath {
    /// Starts at the document node instead of the context node.
    pub absolute: bool,
    /// Steps, applied left to right. Empty for the bare `/` path.
    pub steps: Vec<Step>,
}

/// Binary operators in precedence groups from lowest to highest:
/// `or`, `and`, equality, relational, additive, multiplicative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Or,
    And,
    Eq,
    Neq,
    Lt,
    Lte,
    Gt,
    Gte,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Or => "or",
            Self::And => "and",
            Self::Eq => "=",
            Self::Neq => "!=",
            Self::Lt => "<",
            Self::Lte => "<=",
            Self::Gt => ">",
            Self::Gte => ">=",
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "div",
            Self::Mod => "mod",
        })
    }
}

/// One location step: `axis::node-test[predicate]*`.
#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    pub axis: Axis,
    pub test: NodeTest,
    pub predicates: Vec<Expr>,
}

impl Step {
    /// A step without predicates.
    #[must_use]
    pub fn new(axis: Axis, test: NodeTest) -> Self {
        Self {
            axis,
            test,
            predicates: Vec::new(),
        }
    }

    /// The `descendant-or-self::node()` step that `//` abbreviates.
    #[must_use]
    pub fn descendant_or_self() -> Self {
        Self::new(Axis::DescendantOrSelf, NodeTest::Node)
    }
}

/// The thirteen `XPath` axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Axis {
    Ancestor,
    AncestorOrSelf,
    Attribute,
    Child,
    Descendant,
    DescendantOrSelf,
    Following,
    FollowingSibling,
    Namespace,
    Parent,
    Preceding,
    PrecedingSibling,
    SelfAxis,
}

impl Axis {
    /// Returns the axis name as written in expressions.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ancestor => "ancestor",
            Self::AncestorOrSelf => "ancestor-or-self",
            Self::Attribute => "attribute",
            Self::Child => "child",
            Self::Descendant => "descendant",
            Self::DescendantOrSelf => "descendant-or-self",
            Self::Following => "following",
            Self::FollowingSibling => "following-sibling",
            Self::Namespace => "namespace",
            Self::Parent => "parent",
            Self::Preceding => "preceding",
            Self::PrecedingSibling => "preceding-sibling",
            Self::SelfAxis => "self",
        }
    }

    /// Looks up an axis by name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "ancestor" => Self::Ancestor,
            "ancestor-or-self" => Self::AncestorOrSelf,
            "attribute" => Self::Attribute,
            "child" => Self::Child,
            "descendant" => Self::Descendant,
            "descendant-or-self" => Self::DescendantOrSelf,
            "following" => Self::Following,
            "following-sibling" => Self::FollowingSibling,
            "namespace" => Self::Namespace,
            "parent" => Self::Parent,
            "preceding" => Self::Preceding,
            "preceding-sibling" => Self::PrecedingSibling,
            "self" => Self::SelfAxis,
            _ => return None,
        })
    }

    /// Reverse axes list nodes nearest-first, against document order.
    /// Positions in predicates count in that direction.
    #[must_use]
    pub fn is_reverse(self) -> bool {
        matches!(
            self,
            Self::Ancestor | Self::AncestorOrSelf | Self::Preceding | Self::PrecedingSibling
        )
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The node test of a step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeTest {
    /// `name` or `prefix:name`.
    Name {
        prefix: Option<String>,
        local: String,
    },
    /// `*`: any node of the axis' principal type.
    Any,
    /// `prefix:*`.
    AnyInNamespace(String),
    /// `node()`.
    Node,
    /// `text()`, which also matches CDATA sections.
    Text,
    /// `comment()`.
    Comment,
    /// `processing-instruction()` with an optional target literal.
    ProcessingInstruction(Option<String>),
}

impl fmt::Display for NodeTest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Name {
                prefix: Some(p),
                local,
            } => write!(f, "{p}:{local}"),
            Self::Name { prefix: None, local } => f.write_str(local),
            Self::Any => f.write_str("*"),
            Self::AnyInNamespace(p) => write!(f, "{p}:*"),
            Self::Node => f.write_str("node()"),
            Self::Text => f.write_str("text()"),
            Self::Comment => f.write_str("comment()"),
            Self::ProcessingInstruction(None) => f.write_str("processing-instruction()"),
            Self::ProcessingInstruction(Some(t)) => write!(f, "processing-instruction('{t}')"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_axis_names() {
        for name in [
            "ancestor",
            "ancestor-or-self",
            "attribute",
            "child",
            "descendant",
            "descendant-or-self",
            "following",
            "following-sibling",
            "namespace",
            "parent",
            "preceding",
            "preceding-sibling",
            "self",
        ] {
            assert_eq!(Axis::from_name(name).map(Axis::as_str), Some(name));
        }
        assert_eq!(Axis::from_name("children"), None);
    }

    #[test]
    fn test_reverse_axes() {
        assert!(Axis::Ancestor.is_reverse());
        assert!(Axis::PrecedingSibling.is_reverse());
        assert!(!Axis::FollowingSibling.is_reverse());
        assert!(!Axis::Attribute.is_reverse());
    }

    #[test]
    fn test_node_test_display() {
        let test = NodeTest::Name {
            prefix: Some("svg".to_string()),
            local: "rect".to_string(),
        };
        assert_eq!(test.to_string(), "svg:rect");
        assert_eq!(NodeTest::AnyInNamespace("svg".to_string()).to_string(), "svg:*");
        assert_eq!(
            NodeTest::ProcessingInstruction(Some("style".to_string())).to_string(),
            "processing-instruction('style')"
        );
    }
}
