//! `XPath` 1.0 query language.
//!
//! Expressions are compiled once into an [`XPath`] and can then be evaluated
//! against any node of any document.
//!
//! ```
//! use quillxml::Document;
//! use quillxml::xpath::{Value, XPath};
//!
//! let doc = Document::parse_str("<root><a>1</a><b>2</b></root>").unwrap();
//! let root = doc.root_element().unwrap();
//!
//! let count = XPath::new("count(*)").unwrap();
//! assert_eq!(count.evaluate(&doc, root).unwrap(), Value::Number(2.0));
//!
//! let b = XPath::new("//b").unwrap().select_elements(&doc, doc.root()).unwrap();
//! assert_eq!(doc.text_content(b[0]), "2");
//! ```
//!
//! Node-sets hold [`NodeRef`]s into the document. They are only meaningful
//! while the document is alive and unmodified.

pub mod ast;
pub mod eval;
pub mod lexer;
pub mod parser;
pub mod types;

use std::fmt;
use std::str::FromStr;
use std::time::Instant;

pub use eval::Context;
pub use types::{NodeRef, Value, XPathError};

use crate::tree::{Document, NodeId};
use ast::Expr;
use eval::Evaluator;

/// A compiled `XPath` expression.
#[derive(Debug, Clone, PartialEq)]
pub struct XPath {
    source: String,
    expr: Expr,
}

impl XPath {
    /// Compiles `expr`.
    ///
    /// # Errors
    ///
    /// Returns [`XPathError::Syntax`] with the byte position of the first
    /// offending token.
    pub fn new(expr: &str) -> Result<Self, XPathError> {
        Ok(Self {
            source: expr.to_string(),
            expr: parser::parse(expr)?,
        })
    }

    /// The expression text as compiled.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// The parsed syntax tree.
    #[must_use]
    pub fn expr(&self) -> &Expr {
        &self.expr
    }

    /// Evaluates with `node` as the context node and no variables.
    ///
    /// # Errors
    ///
    /// Fails on unbound variables or namespace prefixes, unknown functions,
    /// wrong argument counts and operations that need a node-set.
    pub fn evaluate(&self, doc: &Document, node: impl Into<NodeRef>) -> Result<Value, XPathError> {
        self.evaluate_with(doc, node, &Context::new())
    }

    /// Evaluates with variable and namespace bindings from `context`.
    ///
    /// # Errors
    ///
    /// See [`evaluate`](Self::evaluate).
    pub fn evaluate_with(
        &self,
        doc: &Document,
        node: impl Into<NodeRef>,
        context: &Context,
    ) -> Result<Value, XPathError> {
        let node = node.into();
        let start = Instant::now();
        let result = Evaluator::new(doc, context, node).evaluate(&self.expr, node);
        let kind = match &result {
            Ok(value) => value.type_name(),
            Err(_) => "error",
        };
        let elapsed_us = u64::try_from(start.elapsed().as_micros()).unwrap_or(u64::MAX);
        tracing::debug!(
            expr = %self.source,
            result = kind,
            elapsed_us,
            "evaluated xpath"
        );
        result
    }

    /// Evaluates and returns the resulting node-set in document order.
    ///
    /// # Errors
    ///
    /// Returns [`XPathError::TypeError`] when the expression does not
    /// produce a node-set.
    pub fn select_nodes(
        &self,
        doc: &Document,
        node: impl Into<NodeRef>,
    ) -> Result<Vec<NodeRef>, XPathError> {
        self.select_nodes_with(doc, node, &Context::new())
    }

    /// [`select_nodes`](Self::select_nodes) with bindings.
    ///
    /// # Errors
    ///
    /// See [`select_nodes`](Self::select_nodes).
    pub fn select_nodes_with(
        &self,
        doc: &Document,
        node: impl Into<NodeRef>,
        context: &Context,
    ) -> Result<Vec<NodeRef>, XPathError> {
        match self.evaluate_with(doc, node, context)? {
            Value::NodeSet(nodes) => Ok(nodes),
            other => Err(XPathError::TypeError {
                expected: "node-set".to_string(),
                found: other.type_name().to_string(),
            }),
        }
    }

    /// The element nodes of the resulting node-set. Other nodes, including
    /// attributes, are skipped.
    ///
    /// # Errors
    ///
    /// See [`select_nodes`](Self::select_nodes).
    pub fn select_elements(
        &self,
        doc: &Document,
        node: impl Into<NodeRef>,
    ) -> Result<Vec<NodeId>, XPathError> {
        Ok(self
            .select_nodes(doc, node)?
            .into_iter()
            .filter_map(NodeRef::as_node)
            .filter(|&id| doc.is_element(id))
            .collect())
    }

    /// Returns `true` if `node` is selected when the expression is evaluated
    /// from the root of the tree `node` belongs to. Scalar results never match.
    ///
    /// # Errors
    ///
    /// See [`evaluate`](Self::evaluate).
    pub fn matches(&self, doc: &Document, node: impl Into<NodeRef>) -> Result<bool, XPathError> {
        let node = node.into();
        let top = doc.ancestors(node.owner()).last().unwrap_or(doc.root());
        Ok(match self.evaluate(doc, top)? {
            Value::NodeSet(nodes) => nodes.contains(&node),
            _ => false,
        })
    }
}

impl FromStr for XPath {
    type Err = XPathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl fmt::Display for XPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

/// Compiles and evaluates `expr` in one call.
///
/// # Errors
///
/// Returns any compile or evaluation error.
pub fn evaluate(doc: &Document, node: impl Into<NodeRef>, expr: &str) -> Result<Value, XPathError> {
    XPath::new(expr)?.evaluate(doc, node)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const PERSONS: &str = "<persons>\
        <person id=\"1\"><firstname>John</firstname><lastname>Doe</lastname></person>\
        <person id=\"2\"><firstname>Jane</firstname><lastname>Jones</lastname></person>\
        </persons>";

    #[test]
    fn test_select_persons() {
        let doc = Document::parse_str(PERSONS).unwrap();
        let all = XPath::new("//person").unwrap().select_elements(&doc, doc.root()).unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(doc.get_attribute(all[0], "id"), Some("1"));

        let jane = XPath::new("//person[@id='2']/firstname")
            .unwrap()
            .select_elements(&doc, doc.root())
            .unwrap();
        assert_eq!(jane.len(), 1);
        assert_eq!(doc.text_content(jane[0]), "Jane");
    }

    #[test]
    fn test_compile_error_position() {
        let err = XPath::new("//person[").unwrap_err();
        assert!(matches!(err, XPathError::Syntax { position: 9, .. }));
        assert!("1 +".parse::<XPath>().is_err());
    }

    #[test]
    fn test_display_keeps_source() {
        let path: XPath = "//a[1]".parse().unwrap();
        assert_eq!(path.to_string(), "//a[1]");
        assert_eq!(path.as_str(), "//a[1]");
    }

    #[test]
    fn test_select_nodes_needs_node_set() {
        let doc = Document::parse_str("<a/>").unwrap();
        let err = XPath::new("1 + 1").unwrap().select_nodes(&doc, doc.root()).unwrap_err();
        assert!(matches!(err, XPathError::TypeError { .. }));
    }

    #[test]
    fn test_matches() {
        let doc = Document::parse_str(PERSONS).unwrap();
        let people = XPath::new("//person").unwrap().select_elements(&doc, doc.root()).unwrap();
        let second = XPath::new("person[@id = '2']").unwrap();
        // Evaluated from the document node, which has no person children.
        assert!(!second.matches(&doc, people[1]).unwrap());
        let anywhere = XPath::new("//person[@id = '2']").unwrap();
        assert!(anywhere.matches(&doc, people[1]).unwrap());
        assert!(!anywhere.matches(&doc, people[0]).unwrap());
        assert!(!XPath::new("true()").unwrap().matches(&doc, people[0]).unwrap());
    }

    #[test]
    fn test_evaluate_from_attribute() {
        let doc = Document::parse_str(PERSONS).unwrap();
        let ids = XPath::new("//@id").unwrap().select_nodes(&doc, doc.root()).unwrap();
        assert_eq!(ids.len(), 2);
        let owner = evaluate(&doc, ids[1], "string(../firstname)").unwrap();
        assert_eq!(owner, Value::from("Jane"));
    }

    #[test]
    fn test_detached_subtree_root() {
        let mut doc = Document::parse_str(PERSONS).unwrap();
        let people = XPath::new("//person").unwrap().select_elements(&doc, doc.root()).unwrap();
        doc.detach(people[1]);
        let first = doc.first_child(people[1]).unwrap();
        // `/` is the top of the detached subtree, not the document node.
        assert_eq!(
            evaluate(&doc, first, "name(/)").unwrap(),
            Value::from("person")
        );
        assert_eq!(
            evaluate(&doc, doc.root(), "count(//person)").unwrap(),
            Value::Number(1.0)
        );
    }
}
