//! `XPath` 1.0 data model: node references, the four value types and the
//! error type.

use std::fmt;

use crate::tree::NodeId;

/// A node as `XPath` sees it.
///
/// Tree nodes are referenced directly. Attributes and namespace nodes are
/// not tree children, so they are addressed through their owning element:
/// an attribute by its index in the element's attribute list, a namespace
/// node by its index in the element's in-scope namespace list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeRef {
    /// A document, element, text, CDATA, comment or PI node.
    Node(NodeId),
    /// The `index`th attribute of `element`.
    Attribute { element: NodeId, index: usize },
    /// The `index`th in-scope namespace of `element`.
    Namespace { element: NodeId, index: usize },
}

impl NodeRef {
    /// Returns the tree node, or `None` for attributes and namespace nodes.
    #[must_use]
    pub fn as_node(self) -> Option<NodeId> {
        match self {
            Self::Node(id) => Some(id),
            _ => None,
        }
    }

    /// Returns the tree node this reference lives on: the node itself, or
    /// the owning element of an attribute or namespace node.
    #[must_use]
    pub fn owner(self) -> NodeId {
        match self {
            Self::Node(id)
            | Self::Attribute { element: id, .. }
            | Self::Namespace { element: id, .. } => id,
        }
    }
}

impl From<NodeId> for NodeRef {
    fn from(id: NodeId) -> Self {
        Self::Node(id)
    }
}

/// An `XPath` 1.0 value.
#[derive(Debug, Clone)]
pub enum Value {
    /// A boolean.
    Boolean(bool),
    /// An IEEE 754 double, including NaN and the infinities.
    Number(f64),
    /// A string.
    String(String),
    /// Nodes without duplicates, in document order.
    NodeSet(Vec<NodeRef>),
}

impl Value {
    /// Converts to a boolean (`XPath` 1.0 §4.3). Needs no document: a
    /// node-set is true when non-empty.
    #[must_use]
    pub fn to_boolean(&self) -> bool {
        match self {
            Self::Boolean(b) => *b,
            Self::Number(n) => *n != 0.0 && !n.is_nan(),
            Self::String(s) => !s.is_empty(),
            Self::NodeSet(nodes) => !nodes.is_empty(),
        }
    }

    /// Returns the node-set, if this is one.
    #[must_use]
    pub fn as_node_set(&self) -> Option<&[NodeRef]> {
        match self {
            Self::NodeSet(nodes) => Some(nodes),
            _ => None,
        }
    }

    /// Type name for error messages.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Boolean(_) => "boolean",
            Self::Number(_) => "number",
            Self::String(_) => "string",
            Self::NodeSet(_) => "node-set",
        }
    }
}

impl PartialEq for Value {
    #[allow(clippy::float_cmp)]
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Boolean(a), Self::Boolean(b)) => a == b,
            (Self::Number(a), Self::Number(b)) => a == b,
            (Self::String(a), Self::String(b)) => a == b,
            (Self::NodeSet(a), Self::NodeSet(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Boolean(b) => write!(f, "{b}"),
            Self::Number(n) => f.write_str(&format_xpath_number(*n)),
            Self::String(s) => f.write_str(s),
            Self::NodeSet(nodes) => write!(f, "<node-set of {} nodes>", nodes.len()),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Boolean(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Self::Number(f64::from(n))
    }
}

impl From<u32> for Value {
    fn from(n: u32) -> Self {
        Self::Number(f64::from(n))
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<Vec<NodeRef>> for Value {
    fn from(nodes: Vec<NodeRef>) -> Self {
        Self::NodeSet(nodes)
    }
}

impl From<NodeId> for Value {
    fn from(id: NodeId) -> Self {
        Self::NodeSet(vec![NodeRef::Node(id)])
    }
}

/// Formats a number the way `string()` does (`XPath` 1.0 §4.2): integers
/// without a decimal point, no exponent, `NaN`, `Infinity`, `-Infinity`,
/// and negative zero as `0`.
#[must_use]
pub fn format_xpath_number(n: f64) -> String {
    if n.is_nan() {
        return "NaN".to_owned();
    }
    if n.is_infinite() {
        return if n > 0.0 { "Infinity" } else { "-Infinity" }.to_owned();
    }
    if n == 0.0 {
        return "0".to_owned();
    }
    #[allow(clippy::float_cmp, clippy::cast_possible_truncation)]
    if n.fract() == 0.0 && n.abs() < 1e18 {
        return format!("{}", n as i64);
    }
    // Display never uses an exponent for f64 and is round-trip exact.
    format!("{n}")
}

/// Converts a string with `number()` semantics: optional whitespace, an
/// optional minus sign, digits with an optional fraction. Anything else,
/// including exponents and a leading `+`, is NaN.
#[must_use]
pub fn parse_xpath_number(s: &str) -> f64 {
    let trimmed = s.trim_matches([' ', '\t', '\n', '\r']);
    let digits = trimmed.strip_prefix('-').unwrap_or(trimmed);
    let mut parts = digits.splitn(2, '.');
    let int = parts.next().unwrap_or("");
    let frac = parts.next();
    let well_formed = int.bytes().all(|b| b.is_ascii_digit())
        && frac.map_or(true, |f| f.bytes().all(|b| b.is_ascii_digit()))
        && !(int.is_empty() && frac.map_or(true, str::is_empty));
    if !well_formed {
        return f64::NAN;
    }
    trimmed.parse::<f64>().unwrap_or(f64::NAN)
}

/// Rounds half up towards positive infinity, keeping NaN, the infinities
/// and negative zero (`XPath` 1.0 §4.4 `round()`).
#[must_use]
pub fn xpath_round(n: f64) -> f64 {
    if n.is_nan() || n.is_infinite() || n == 0.0 {
        return n;
    }
    if (-0.5..0.0).contains(&n) {
        return -0.0;
    }
    (n + 0.5).floor()
}

/// Errors from compiling or evaluating an expression.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum XPathError {
    /// The expression is not valid `XPath`. `position` is a byte offset.
    #[error("syntax error at position {position}: {message}")]
    Syntax { message: String, position: usize },

    /// An operation needed a node-set and got something else.
    #[error("type error: expected {expected}, found {found}")]
    TypeError { expected: String, found: String },

    /// `$name` has no binding in the context.
    #[error("undefined variable: ${name}")]
    UndefinedVariable { name: String },

    /// The function is not part of the core library.
    #[error("undefined function: {name}()")]
    UndefinedFunction { name: String },

    /// A core function was called with the wrong number of arguments.
    #[error("invalid argument count for {function}(): expected {expected}, found {found}")]
    InvalidArgCount {
        function: String,
        expected: String,
        found: usize,
    },

    /// The expression is well-formed but cannot be evaluated, e.g. an
    /// unbound namespace prefix in a name test.
    #[error("invalid XPath expression: {message}")]
    InvalidExpression { message: String },
}

#[cfg(test)]
#[allow(clippy::float_cmp)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_format_xpath_number() {
        assert_eq!(format_xpath_number(3.0), "3");
        assert_eq!(format_xpath_number(-0.0), "0");
        assert_eq!(format_xpath_number(0.5), "0.5");
        assert_eq!(format_xpath_number(-2.25), "-2.25");
        assert_eq!(format_xpath_number(1e21), "1000000000000000000000");
        assert_eq!(format_xpath_number(f64::NAN), "NaN");
        assert_eq!(format_xpath_number(f64::NEG_INFINITY), "-Infinity");
    }

    #[test]
    fn test_parse_xpath_number() {
        assert_eq!(parse_xpath_number(" 12 "), 12.0);
        assert_eq!(parse_xpath_number("-1.5"), -1.5);
        assert_eq!(parse_xpath_number(".5"), 0.5);
        assert_eq!(parse_xpath_number("5."), 5.0);
        assert!(parse_xpath_number("1e3").is_nan());
        assert!(parse_xpath_number("+1").is_nan());
        assert!(parse_xpath_number("").is_nan());
        assert!(parse_xpath_number(".").is_nan());
        assert!(parse_xpath_number("Infinity").is_nan());
    }

    #[test]
    fn test_round() {
        assert_eq!(xpath_round(2.5), 3.0);
        assert_eq!(xpath_round(-2.5), -2.0);
        assert!(xpath_round(-0.2).is_sign_negative());
        assert!(xpath_round(f64::NAN).is_nan());
    }

    #[test]
    fn test_boolean_conversion() {
        assert!(!Value::Number(f64::NAN).to_boolean());
        assert!(Value::from("x").to_boolean());
        assert!(!Value::NodeSet(Vec::new()).to_boolean());
    }

    #[test]
    fn test_error_display() {
        let err = XPathError::UndefinedVariable {
            name: "ns".to_string(),
        };
        assert_eq!(err.to_string(), "undefined variable: $ns");
        let err = XPathError::InvalidArgCount {
            function: "substring".to_string(),
            expected: "2 or 3".to_string(),
            found: 1,
        };
        assert_eq!(
            err.to_string(),
            "invalid argument count for substring(): expected 2 or 3, found 1"
        );
    }
}
