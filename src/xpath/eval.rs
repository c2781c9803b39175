//! Expression evaluation against a [`Document`].
//!
//! Location steps enumerate each axis in axis order (nearest node first for
//! reverse axes), apply the node test and then the step's predicates, so
//! `ancestor::*[1]` is the parent. The per-context results are merged and
//! sorted into document order before the next step.

use std::collections::HashMap;

use crate::chars::is_xml_space;
use crate::tree::{Document, NodeId, NodeKind};

use super::ast::{Axis, BinaryOp, Expr, LocationPath, NodeTest, Step};
use super::types::{format_xpath_number, parse_xpath_number, xpath_round, NodeRef, Value, XPathError};

/// Variable bindings and namespace prefixes for evaluation.
///
/// ```
/// use quillxml::xpath::{Context, XPath};
/// use quillxml::Document;
///
/// let doc = Document::parse_str(r#"<r><a n="1"/><a n="2"/></r>"#).unwrap();
/// let mut ctx = Context::new();
/// ctx.set("n", 2.0);
/// let path = XPath::new("//a[@n = $n]").unwrap();
/// let found = path.select_nodes_with(&doc, doc.root(), &ctx).unwrap();
/// assert_eq!(found.len(), 1);
/// ```
#[derive(Debug, Clone, Default)]
pub struct Context {
    variables: HashMap<String, Value>,
    namespaces: HashMap<String, String>,
}

impl Context {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `$name`, replacing any previous binding.
    ///
    /// A [`Value::NodeSet`] holds bare arena ids, so it is only meaningful
    /// against the document it was selected from. Evaluating against another
    /// document is rejected when an id is out of that document's range or
    /// removed; an id that happens to be in range silently names whatever
    /// node sits in that slot.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.variables.insert(name.into(), value.into());
    }

    /// Returns the value bound to `$name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.variables.get(name)
    }

    /// Maps `prefix` to `uri` for name tests such as `p:item` or `p:*`.
    /// Takes precedence over the declarations in scope at the context node.
    pub fn set_namespace(&mut self, prefix: impl Into<String>, uri: impl Into<String>) {
        self.namespaces.insert(prefix.into(), uri.into());
    }
}

/// The context position and size alongside the context node.
#[derive(Clone, Copy)]
struct Focus {
    node: NodeRef,
    position: usize,
    size: usize,
}

/// Which kind of node `*` and name tests select on an axis.
#[derive(Clone, Copy, PartialEq, Eq)]
enum Principal {
    Element,
    Attribute,
    Namespace,
}

/// A node test with its prefix resolved to a namespace URI.
enum Test<'t> {
    Name { uri: Option<String>, local: &'t str },
    Any,
    AnyInNamespace(String),
    Node,
    Text,
    Comment,
    ProcessingInstruction(Option<&'t str>),
}

pub(crate) struct Evaluator<'a> {
    doc: &'a Document,
    context: &'a Context,
    /// Node whose in-scope declarations resolve prefixes the context lacks.
    origin: NodeId,
    /// Preorder rank per arena slot.
    order: Vec<u32>,
}

impl<'a> Evaluator<'a> {
    pub fn new(doc: &'a Document, context: &'a Context, origin: NodeRef) -> Self {
        Self {
            doc,
            context,
            origin: origin.owner(),
            order: doc.document_order(),
        }
    }

    pub fn evaluate(&self, expr: &Expr, node: NodeRef) -> Result<Value, XPathError> {
        self.eval(
            expr,
            Focus {
                node,
                position: 1,
                size: 1,
            },
        )
    }

    fn eval(&self, expr: &Expr, focus: Focus) -> Result<Value, XPathError> {
        match expr {
            Expr::Number(n) => Ok(Value::Number(*n)),
            Expr::Literal(s) => Ok(Value::String(s.clone())),
            Expr::Variable(name) => {
                let value = self
                    .context
                    .get(name)
                    .ok_or_else(|| XPathError::UndefinedVariable { name: name.clone() })?;
                if let Value::NodeSet(nodes) = value {
                    if nodes.iter().any(|n| !self.doc.contains(n.owner())) {
                        return Err(XPathError::InvalidExpression {
                            message: format!("${name} holds nodes from another document"),
                        });
                    }
                }
                Ok(value.clone())
            }
            Expr::Negate(inner) => Ok(Value::Number(-self.number(&self.eval(inner, focus)?))),
            Expr::Binary { op, left, right } => self.eval_binary(*op, left, right, focus),
            Expr::Call { name, args } => self.call(name, args, focus),
            Expr::Path(path) => self.eval_path(path, focus),
            Expr::Filter {
                primary,
                predicates,
            } => {
                let mut nodes = self.node_set(self.eval(primary, focus)?)?;
                for predicate in predicates {
                    nodes = self.filter(nodes, predicate)?;
                }
                Ok(Value::NodeSet(nodes))
            }
            Expr::FilterPath { filter, steps } => {
                let start = self.node_set(self.eval(filter, focus)?)?;
                Ok(Value::NodeSet(self.apply_steps(start, steps)?))
            }
            Expr::Union(left, right) => {
                let mut nodes = self.node_set(self.eval(left, focus)?)?;
                nodes.extend(self.node_set(self.eval(right, focus)?)?);
                Ok(Value::NodeSet(self.sorted(nodes)))
            }
        }
    }

    fn node_set(&self, value: Value) -> Result<Vec<NodeRef>, XPathError> {
        match value {
            Value::NodeSet(nodes) => Ok(nodes),
            other => Err(XPathError::TypeError {
                expected: "node-set".to_string(),
                found: other.type_name().to_string(),
            }),
        }
    }

    // --- Location paths ---

    fn eval_path(&self, path: &LocationPath, focus: Focus) -> Result<Value, XPathError> {
        let start = if path.absolute {
            // The root of whatever tree the context node is in, so paths
            // work inside detached subtrees too.
            let top = self.doc.ancestors(focus.node.owner()).last();
            vec![NodeRef::Node(top.unwrap_or(self.doc.root()))]
        } else {
            vec![focus.node]
        };
        Ok(Value::NodeSet(self.apply_steps(start, &path.steps)?))
    }

    fn apply_steps(&self, start: Vec<NodeRef>, steps: &[Step]) -> Result<Vec<NodeRef>, XPathError> {
        let mut current = start;
        for step in steps {
            let test = self.resolve_test(&step.test)?;
            let principal = match step.axis {
                Axis::Attribute => Principal::Attribute,
                Axis::Namespace => Principal::Namespace,
                _ => Principal::Element,
            };
            let mut next = Vec::new();
            for &node in &current {
                let mut selected: Vec<NodeRef> = self
                    .axis(node, step.axis)
                    .into_iter()
                    .filter(|&n| self.matches_test(n, &test, principal))
                    .collect();
                for predicate in &step.predicates {
                    selected = self.filter(selected, predicate)?;
                }
                next.extend(selected);
            }
            current = self.sorted(next);
        }
        Ok(current)
    }

    /// Keeps the nodes for which `predicate` holds. `nodes` is in the order
    /// positions are counted in.
    fn filter(&self, nodes: Vec<NodeRef>, predicate: &Expr) -> Result<Vec<NodeRef>, XPathError> {
        let size = nodes.len();
        let mut kept = Vec::new();
        for (i, node) in nodes.into_iter().enumerate() {
            let focus = Focus {
                node,
                position: i + 1,
                size,
            };
            let keep = match self.eval(predicate, focus)? {
                #[allow(clippy::float_cmp, clippy::cast_precision_loss)]
                Value::Number(n) => n == (i + 1) as f64,
                other => other.to_boolean(),
            };
            if keep {
                kept.push(node);
            }
        }
        Ok(kept)
    }

    fn order_key(&self, node: NodeRef) -> (u32, u8, usize) {
        let rank = |id: NodeId| self.order.get(id.as_index()).copied().unwrap_or(u32::MAX);
        match node {
            NodeRef::Node(id) => (rank(id), 0, 0),
            NodeRef::Namespace { element, index } => (rank(element), 1, index),
            NodeRef::Attribute { element, index } => (rank(element), 2, index),
        }
    }

    fn sorted(&self, mut nodes: Vec<NodeRef>) -> Vec<NodeRef> {
        nodes.sort_by_key(|&n| self.order_key(n));
        nodes.dedup();
        nodes
    }

    /// Nodes on `axis` from `node`, in axis order.
    fn axis(&self, node: NodeRef, axis: Axis) -> Vec<NodeRef> {
        let doc = self.doc;
        let id = match node {
            NodeRef::Node(id) => id,
            // Attributes and namespace nodes have a parent but no children
            // or siblings.
            NodeRef::Attribute { element, .. } | NodeRef::Namespace { element, .. } => {
                return match axis {
                    Axis::SelfAxis | Axis::DescendantOrSelf => vec![node],
                    Axis::Parent => vec![NodeRef::Node(element)],
                    Axis::Ancestor => doc.ancestors(element).map(NodeRef::Node).collect(),
                    Axis::AncestorOrSelf => std::iter::once(node)
                        .chain(doc.ancestors(element).map(NodeRef::Node))
                        .collect(),
                    Axis::Following => doc
                        .descendants(element)
                        .map(NodeRef::Node)
                        .chain(self.following(element))
                        .collect(),
                    Axis::Preceding => self.preceding(element),
                    _ => Vec::new(),
                };
            }
        };

        match axis {
            Axis::Child => doc.children(id).map(NodeRef::Node).collect(),
            Axis::Descendant => doc.descendants(id).map(NodeRef::Node).collect(),
            Axis::DescendantOrSelf => std::iter::once(id)
                .chain(doc.descendants(id))
                .map(NodeRef::Node)
                .collect(),
            Axis::Parent => doc.parent(id).map(NodeRef::Node).into_iter().collect(),
            Axis::Ancestor => doc.ancestors(id).skip(1).map(NodeRef::Node).collect(),
            Axis::AncestorOrSelf => doc.ancestors(id).map(NodeRef::Node).collect(),
            Axis::FollowingSibling => {
                std::iter::successors(doc.next_sibling(id), |&s| doc.next_sibling(s))
                    .map(NodeRef::Node)
                    .collect()
            }
            Axis::PrecedingSibling => {
                std::iter::successors(doc.prev_sibling(id), |&s| doc.prev_sibling(s))
                    .map(NodeRef::Node)
                    .collect()
            }
            Axis::Following => self.following(id),
            Axis::Preceding => self.preceding(id),
            Axis::SelfAxis => vec![node],
            Axis::Attribute => doc
                .attributes(id)
                .iter()
                .enumerate()
                .filter(|(_, a)| !a.is_namespace_decl())
                .map(|(index, _)| NodeRef::Attribute { element: id, index })
                .collect(),
            Axis::Namespace => {
                if !doc.is_element(id) {
                    return Vec::new();
                }
                (0..doc.in_scope_namespaces(id).len())
                    .map(|index| NodeRef::Namespace { element: id, index })
                    .collect()
            }
        }
    }

    /// Everything after `id` in document order except its descendants.
    fn following(&self, id: NodeId) -> Vec<NodeRef> {
        let doc = self.doc;
        let mut out = Vec::new();
        for ancestor in doc.ancestors(id) {
            let mut sibling = doc.next_sibling(ancestor);
            while let Some(s) = sibling {
                out.push(NodeRef::Node(s));
                out.extend(doc.descendants(s).map(NodeRef::Node));
                sibling = doc.next_sibling(s);
            }
        }
        out
    }

    /// Everything before `id` except its ancestors, nearest first.
    fn preceding(&self, id: NodeId) -> Vec<NodeRef> {
        let doc = self.doc;
        let mut out = Vec::new();
        for ancestor in doc.ancestors(id) {
            let mut sibling = doc.prev_sibling(ancestor);
            while let Some(s) = sibling {
                let inner: Vec<NodeId> = doc.descendants(s).collect();
                out.extend(inner.into_iter().rev().map(NodeRef::Node));
                out.push(NodeRef::Node(s));
                sibling = doc.prev_sibling(s);
            }
        }
        out
    }

    // --- Node tests ---

    fn resolve_prefix(&self, prefix: &str) -> Result<String, XPathError> {
        if let Some(uri) = self.context.namespaces.get(prefix) {
            return Ok(uri.clone());
        }
        self.doc
            .namespace_for_prefix(self.origin, Some(prefix))
            .map(str::to_string)
            .ok_or_else(|| XPathError::InvalidExpression {
                message: format!("unbound namespace prefix '{prefix}'"),
            })
    }

    fn resolve_test<'t>(&self, test: &'t NodeTest) -> Result<Test<'t>, XPathError> {
        Ok(match test {
            NodeTest::Name { prefix, local } => Test::Name {
                uri: prefix.as_deref().map(|p| self.resolve_prefix(p)).transpose()?,
                local,
            },
            NodeTest::Any => Test::Any,
            NodeTest::AnyInNamespace(prefix) => Test::AnyInNamespace(self.resolve_prefix(prefix)?),
            NodeTest::Node => Test::Node,
            NodeTest::Text => Test::Text,
            NodeTest::Comment => Test::Comment,
            NodeTest::ProcessingInstruction(target) => {
                Test::ProcessingInstruction(target.as_deref())
            }
        })
    }

    fn matches_test(&self, node: NodeRef, test: &Test<'_>, principal: Principal) -> bool {
        let kind = match node {
            NodeRef::Node(id) => Some(self.doc.kind(id)),
            _ => None,
        };
        let is_principal = match (node, principal) {
            (NodeRef::Node(id), Principal::Element) => self.doc.is_element(id),
            (NodeRef::Attribute { .. }, Principal::Attribute)
            | (NodeRef::Namespace { .. }, Principal::Namespace) => true,
            _ => false,
        };
        match test {
            Test::Node => true,
            Test::Text => matches!(kind, Some(NodeKind::Text { .. } | NodeKind::CData { .. })),
            Test::Comment => matches!(kind, Some(NodeKind::Comment { .. })),
            Test::ProcessingInstruction(want) => match kind {
                Some(NodeKind::ProcessingInstruction { target, .. }) => {
                    want.map_or(true, |w| w == target)
                }
                _ => false,
            },
            Test::Any => is_principal,
            Test::AnyInNamespace(uri) => {
                is_principal && self.namespace_uri(node) == Some(uri.as_str())
            }
            Test::Name { uri, local } => {
                is_principal
                    && self.local_name(node) == *local
                    && self.namespace_uri(node) == uri.as_deref()
            }
        }
    }

    // --- Node properties ---

    fn string_value(&self, node: NodeRef) -> String {
        match node {
            NodeRef::Node(id) => self.doc.text_content(id),
            NodeRef::Attribute { element, index } => self
                .doc
                .attributes(element)
                .get(index)
                .map(|a| a.value.clone())
                .unwrap_or_default(),
            NodeRef::Namespace { element, index } => self
                .doc
                .in_scope_namespaces(element)
                .into_iter()
                .nth(index)
                .map(|(_, uri)| uri)
                .unwrap_or_default(),
        }
    }

    fn local_name(&self, node: NodeRef) -> String {
        match node {
            NodeRef::Node(id) => match self.doc.kind(id) {
                NodeKind::Element { name, .. } => name.clone(),
                NodeKind::ProcessingInstruction { target, .. } => target.clone(),
                _ => String::new(),
            },
            NodeRef::Attribute { element, index } => self
                .doc
                .attributes(element)
                .get(index)
                .map(|a| a.name.clone())
                .unwrap_or_default(),
            NodeRef::Namespace { element, index } => self
                .doc
                .in_scope_namespaces(element)
                .into_iter()
                .nth(index)
                .and_then(|(prefix, _)| prefix)
                .unwrap_or_default(),
        }
    }

    fn qualified_name(&self, node: NodeRef) -> String {
        match node {
            NodeRef::Node(id) => match self.doc.kind(id) {
                NodeKind::Element { .. } => self.doc.qualified_name(id).unwrap_or_default(),
                _ => self.local_name(node),
            },
            NodeRef::Attribute { element, index } => self
                .doc
                .attributes(element)
                .get(index)
                .map(|a| a.qualified_name())
                .unwrap_or_default(),
            NodeRef::Namespace { .. } => self.local_name(node),
        }
    }

    fn namespace_uri(&self, node: NodeRef) -> Option<&str> {
        match node {
            NodeRef::Node(id) => self.doc.namespace_uri(id),
            NodeRef::Attribute { element, index } => {
                let attr = self.doc.attributes(element).get(index)?;
                self.doc.attribute_namespace(element, attr)
            }
            NodeRef::Namespace { .. } => None,
        }
    }

    // --- Conversions ---

    fn string(&self, value: &Value) -> String {
        match value {
            Value::String(s) => s.clone(),
            Value::Boolean(b) => b.to_string(),
            Value::Number(n) => format_xpath_number(*n),
            Value::NodeSet(nodes) => nodes
                .first()
                .map(|&n| self.string_value(n))
                .unwrap_or_default(),
        }
    }

    fn number(&self, value: &Value) -> f64 {
        match value {
            Value::Number(n) => *n,
            Value::Boolean(b) => f64::from(u8::from(*b)),
            Value::String(s) => parse_xpath_number(s),
            Value::NodeSet(_) => parse_xpath_number(&self.string(value)),
        }
    }

    // --- Operators ---

    fn eval_binary(
        &self,
        op: BinaryOp,
        left: &Expr,
        right: &Expr,
        focus: Focus,
    ) -> Result<Value, XPathError> {
        match op {
            BinaryOp::And => Ok(Value::Boolean(
                self.eval(left, focus)?.to_boolean() && self.eval(right, focus)?.to_boolean(),
            )),
            BinaryOp::Or => Ok(Value::Boolean(
                self.eval(left, focus)?.to_boolean() || self.eval(right, focus)?.to_boolean(),
            )),
            BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Mod => {
                let l = self.number(&self.eval(left, focus)?);
                let r = self.number(&self.eval(right, focus)?);
                Ok(Value::Number(match op {
                    BinaryOp::Add => l + r,
                    BinaryOp::Sub => l - r,
                    BinaryOp::Mul => l * r,
                    BinaryOp::Div => l / r,
                    _ => l % r,
                }))
            }
            _ => {
                let l = self.eval(left, focus)?;
                let r = self.eval(right, focus)?;
                Ok(Value::Boolean(self.compare(op, &l, &r)))
            }
        }
    }

    /// Comparison with the node-set rules of `XPath` 1.0 §3.4: a node-set
    /// compares true if any of its nodes does.
    #[allow(clippy::float_cmp)]
    fn compare(&self, op: BinaryOp, l: &Value, r: &Value) -> bool {
        match (l, r) {
            (Value::NodeSet(a), Value::NodeSet(b)) => {
                let right: Vec<String> = b.iter().map(|&n| self.string_value(n)).collect();
                a.iter().any(|&n| {
                    let left = self.string_value(n);
                    right.iter().any(|r| self.compare_atoms(op, &Value::String(left.clone()), &Value::String(r.clone())))
                })
            }
            (Value::NodeSet(nodes), Value::Boolean(_)) => {
                self.compare_atoms(op, &Value::Boolean(!nodes.is_empty()), r)
            }
            (Value::Boolean(_), Value::NodeSet(nodes)) => {
                self.compare_atoms(op, l, &Value::Boolean(!nodes.is_empty()))
            }
            (Value::NodeSet(nodes), other) => nodes.iter().any(|&n| {
                let atom = match other {
                    Value::Number(_) => Value::Number(parse_xpath_number(&self.string_value(n))),
                    _ => Value::String(self.string_value(n)),
                };
                self.compare_atoms(op, &atom, other)
            }),
            (other, Value::NodeSet(nodes)) => nodes.iter().any(|&n| {
                let atom = match other {
                    Value::Number(_) => Value::Number(parse_xpath_number(&self.string_value(n))),
                    _ => Value::String(self.string_value(n)),
                };
                self.compare_atoms(op, other, &atom)
            }),
            _ => self.compare_atoms(op, l, r),
        }
    }

    #[allow(clippy::float_cmp)]
    fn compare_atoms(&self, op: BinaryOp, l: &Value, r: &Value) -> bool {
        match op {
            BinaryOp::Eq | BinaryOp::Neq => {
                let equal = match (l, r) {
                    (Value::Boolean(_), _) | (_, Value::Boolean(_)) => {
                        l.to_boolean() == r.to_boolean()
                    }
                    (Value::Number(_), _) | (_, Value::Number(_)) => {
                        self.number(l) == self.number(r)
                    }
                    _ => self.string(l) == self.string(r),
                };
                equal == (op == BinaryOp::Eq)
            }
            _ => {
                let (a, b) = (self.number(l), self.number(r));
                match op {
                    BinaryOp::Lt => a < b,
                    BinaryOp::Lte => a <= b,
                    BinaryOp::Gt => a > b,
                    _ => a >= b,
                }
            }
        }
    }

    // --- Function library (XPath 1.0 §4) ---

    #[allow(clippy::cast_precision_loss)]
    fn call(&self, name: &str, args: &[Expr], focus: Focus) -> Result<Value, XPathError> {
        let arg = |i: usize| self.eval(&args[i], focus);
        let string_arg = |i: usize| -> Result<String, XPathError> { Ok(self.string(&arg(i)?)) };
        // Zero-or-one argument functions default to the context node.
        let node_arg = || -> Result<Option<NodeRef>, XPathError> {
            if args.is_empty() {
                Ok(Some(focus.node))
            } else {
                Ok(self.node_set(arg(0)?)?.first().copied())
            }
        };
        let string_or_context = || -> Result<String, XPathError> {
            if args.is_empty() {
                Ok(self.string_value(focus.node))
            } else {
                string_arg(0)
            }
        };

        let value = match name {
            // Node-set functions
            "last" => {
                arity(name, args, 0, 0)?;
                Value::Number(focus.size as f64)
            }
            "position" => {
                arity(name, args, 0, 0)?;
                Value::Number(focus.position as f64)
            }
            "count" => {
                arity(name, args, 1, 1)?;
                Value::Number(self.node_set(arg(0)?)?.len() as f64)
            }
            "id" => {
                arity(name, args, 1, 1)?;
                let tokens = match arg(0)? {
                    Value::NodeSet(nodes) => nodes
                        .iter()
                        .map(|&n| self.string_value(n))
                        .collect::<Vec<_>>()
                        .join(" "),
                    other => self.string(&other),
                };
                let found = tokens
                    .split(is_xml_space)
                    .filter(|t| !t.is_empty())
                    .filter_map(|t| self.doc.element_by_id(t))
                    .map(NodeRef::Node)
                    .collect();
                Value::NodeSet(self.sorted(found))
            }
            "local-name" => {
                arity(name, args, 0, 1)?;
                Value::String(node_arg()?.map(|n| self.local_name(n)).unwrap_or_default())
            }
            "namespace-uri" => {
                arity(name, args, 0, 1)?;
                Value::String(
                    node_arg()?
                        .and_then(|n| self.namespace_uri(n))
                        .unwrap_or_default()
                        .to_string(),
                )
            }
            "name" => {
                arity(name, args, 0, 1)?;
                Value::String(node_arg()?.map(|n| self.qualified_name(n)).unwrap_or_default())
            }

            // String functions
            "string" => {
                arity(name, args, 0, 1)?;
                Value::String(string_or_context()?)
            }
            "concat" => {
                arity(name, args, 2, usize::MAX)?;
                let mut out = String::new();
                for i in 0..args.len() {
                    out.push_str(&string_arg(i)?);
                }
                Value::String(out)
            }
            "starts-with" => {
                arity(name, args, 2, 2)?;
                Value::Boolean(string_arg(0)?.starts_with(string_arg(1)?.as_str()))
            }
            "contains" => {
                arity(name, args, 2, 2)?;
                Value::Boolean(string_arg(0)?.contains(string_arg(1)?.as_str()))
            }
            "substring-before" => {
                arity(name, args, 2, 2)?;
                let (s, pat) = (string_arg(0)?, string_arg(1)?);
                Value::String(s.find(&pat).map(|i| s[..i].to_string()).unwrap_or_default())
            }
            "substring-after" => {
                arity(name, args, 2, 2)?;
                let (s, pat) = (string_arg(0)?, string_arg(1)?);
                Value::String(
                    s.find(&pat)
                        .map(|i| s[i + pat.len()..].to_string())
                        .unwrap_or_default(),
                )
            }
            "substring" => {
                arity(name, args, 2, 3)?;
                let s = string_arg(0)?;
                let start = xpath_round(self.number(&arg(1)?));
                let end = if args.len() == 3 {
                    start + xpath_round(self.number(&arg(2)?))
                } else {
                    f64::INFINITY
                };
                // Comparisons against NaN are false, which empties the result
                // as required.
                Value::String(
                    s.chars()
                        .enumerate()
                        .filter(|&(i, _)| {
                            let p = (i + 1) as f64;
                            p >= start && p < end
                        })
                        .map(|(_, c)| c)
                        .collect(),
                )
            }
            "string-length" => {
                arity(name, args, 0, 1)?;
                Value::Number(string_or_context()?.chars().count() as f64)
            }
            "normalize-space" => {
                arity(name, args, 0, 1)?;
                let s = string_or_context()?;
                Value::String(
                    s.split(is_xml_space)
                        .filter(|w| !w.is_empty())
                        .collect::<Vec<_>>()
                        .join(" "),
                )
            }
            "translate" => {
                arity(name, args, 3, 3)?;
                let s = string_arg(0)?;
                let from: Vec<char> = string_arg(1)?.chars().collect();
                let to: Vec<char> = string_arg(2)?.chars().collect();
                Value::String(
                    s.chars()
                        .filter_map(|c| match from.iter().position(|&f| f == c) {
                            Some(i) => to.get(i).copied(),
                            None => Some(c),
                        })
                        .collect(),
                )
            }

            // Boolean functions
            "boolean" => {
                arity(name, args, 1, 1)?;
                Value::Boolean(arg(0)?.to_boolean())
            }
            "not" => {
                arity(name, args, 1, 1)?;
                Value::Boolean(!arg(0)?.to_boolean())
            }
            "true" | "false" => {
                arity(name, args, 0, 0)?;
                Value::Boolean(name == "true")
            }
            "lang" => {
                arity(name, args, 1, 1)?;
                let wanted = string_arg(0)?.to_ascii_lowercase();
                let element = match focus.node {
                    NodeRef::Node(id) if !self.doc.is_element(id) => self.doc.parent(id),
                    other => Some(other.owner()),
                };
                let matched = element.and_then(|e| self.doc.lang(e)).is_some_and(|lang| {
                    let lang = lang.to_ascii_lowercase();
                    lang == wanted
                        || lang
                            .strip_prefix(wanted.as_str())
                            .is_some_and(|rest| rest.starts_with('-'))
                });
                Value::Boolean(matched)
            }

            // Number functions
            "number" => {
                arity(name, args, 0, 1)?;
                if args.is_empty() {
                    Value::Number(parse_xpath_number(&self.string_value(focus.node)))
                } else {
                    Value::Number(self.number(&arg(0)?))
                }
            }
            "sum" => {
                arity(name, args, 1, 1)?;
                let nodes = self.node_set(arg(0)?)?;
                Value::Number(
                    nodes
                        .iter()
                        .map(|&n| parse_xpath_number(&self.string_value(n)))
                        .sum(),
                )
            }
            "floor" => {
                arity(name, args, 1, 1)?;
                Value::Number(self.number(&arg(0)?).floor())
            }
            "ceiling" => {
                arity(name, args, 1, 1)?;
                Value::Number(self.number(&arg(0)?).ceil())
            }
            "round" => {
                arity(name, args, 1, 1)?;
                Value::Number(xpath_round(self.number(&arg(0)?)))
            }
            _ => {
                return Err(XPathError::UndefinedFunction {
                    name: name.to_string(),
                })
            }
        };
        Ok(value)
    }
}

fn arity(function: &str, args: &[Expr], min: usize, max: usize) -> Result<(), XPathError> {
    if (min..=max).contains(&args.len()) {
        return Ok(());
    }
    let expected = if min == max {
        min.to_string()
    } else if max == usize::MAX {
        format!("at least {min}")
    } else {
        format!("{min} or {max}")
    };
    Err(XPathError::InvalidArgCount {
        function: function.to_string(),
        expected,
        found: args.len(),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use crate::xpath::parser::parse;
    use pretty_assertions::assert_eq;

    fn eval_in(doc: &Document, ctx: &Context, expr: &str) -> Result<Value, XPathError> {
        let expr = parse(expr)?;
        let origin = NodeRef::Node(doc.root_element().unwrap());
        Evaluator::new(doc, ctx, origin).evaluate(&expr, origin)
    }

    fn eval(xml: &str, expr: &str) -> Value {
        let doc = Document::parse_str(xml).unwrap();
        eval_in(&doc, &Context::new(), expr).unwrap()
    }

    fn strings(xml: &str, expr: &str) -> Vec<String> {
        let doc = Document::parse_str(xml).unwrap();
        let ctx = Context::new();
        let Value::NodeSet(nodes) = eval_in(&doc, &ctx, expr).unwrap() else {
            panic!("expected a node-set");
        };
        let evaluator = Evaluator::new(&doc, &ctx, NodeRef::Node(doc.root()));
        nodes.into_iter().map(|n| evaluator.string_value(n)).collect()
    }

    #[test]
    fn test_arithmetic() {
        assert_eq!(eval("<r/>", "1 + 2 * 3"), Value::Number(7.0));
        assert_eq!(eval("<r/>", "7 mod -3"), Value::Number(1.0));
        assert_eq!(eval("<r/>", "-7 mod 3"), Value::Number(-1.0));
        assert_eq!(eval("<r/>", "1 div 0"), Value::Number(f64::INFINITY));
        assert!(matches!(eval("<r/>", "0 div 0"), Value::Number(n) if n.is_nan()));
    }

    #[test]
    fn test_reverse_axis_positions() {
        let xml = "<a><b><c><d/></c></b></a>";
        assert_eq!(eval(xml, "name(//d/ancestor::*[1])"), Value::from("c"));
        assert_eq!(eval(xml, "name(//d/ancestor::*[last()])"), Value::from("a"));
        assert_eq!(
            strings("<r><x>1</x><x>2</x><x>3</x></r>", "x[3]/preceding-sibling::x[1]"),
            vec!["2"]
        );
        // The result itself is in document order.
        assert_eq!(
            strings("<r><x>1</x><x>2</x><x>3</x></r>", "x[3]/preceding-sibling::x"),
            vec!["1", "2"]
        );
    }

    #[test]
    fn test_attribute_nodes() {
        let xml = r#"<r xmlns:p="urn:p"><e a="1" p:b="2" xmlns="urn:d"/></r>"#;
        assert_eq!(strings(xml, "*/@*"), vec!["1", "2"]);
        assert_eq!(strings(xml, "*/@p:b"), vec!["2"]);
        assert_eq!(eval(xml, "count(//@*)"), Value::Number(2.0));
        assert_eq!(eval(xml, "name(*/@*[2])"), Value::from("p:b"));
        assert_eq!(eval(xml, "namespace-uri(*/@p:b)"), Value::from("urn:p"));
        assert_eq!(eval(xml, "local-name(*/@p:b/..)"), Value::from("e"));
    }

    #[test]
    fn test_namespace_axis() {
        let xml = r#"<r xmlns:p="urn:p"><e xmlns="urn:d"/></r>"#;
        let mut found = strings(xml, "*/namespace::*");
        found.sort();
        assert_eq!(
            found,
            vec!["http://www.w3.org/XML/1998/namespace", "urn:d", "urn:p"]
        );
        assert_eq!(eval(xml, "string(*/namespace::p)"), Value::from("urn:p"));
    }

    #[test]
    fn test_name_tests_use_namespaces() {
        let xml = r#"<r xmlns:p="urn:p"><p:a/><a/><q:a xmlns:q="urn:p"/></r>"#;
        assert_eq!(eval(xml, "count(p:a)"), Value::Number(2.0));
        assert_eq!(eval(xml, "count(a)"), Value::Number(1.0));
        assert_eq!(eval(xml, "count(p:*)"), Value::Number(2.0));

        let doc = Document::parse_str(xml).unwrap();
        let mut ctx = Context::new();
        ctx.set_namespace("x", "urn:p");
        assert_eq!(eval_in(&doc, &ctx, "count(x:a)").unwrap(), Value::Number(2.0));
        assert!(matches!(
            eval_in(&doc, &Context::new(), "y:a"),
            Err(XPathError::InvalidExpression { .. })
        ));
    }

    #[test]
    fn test_variables() {
        let doc = Document::parse_str("<r><a>1</a><a>2</a></r>").unwrap();
        let mut ctx = Context::new();
        ctx.set("n", "2");
        assert_eq!(eval_in(&doc, &ctx, "count(a[. = $n])").unwrap(), Value::Number(1.0));
        assert_eq!(
            eval_in(&doc, &Context::new(), "$n").unwrap_err(),
            XPathError::UndefinedVariable {
                name: "n".to_string()
            }
        );
    }

    #[test]
    fn test_node_set_comparisons() {
        let xml = "<r><a>1</a><a>5</a><b>5</b></r>";
        assert_eq!(eval(xml, "a = b"), Value::Boolean(true));
        assert_eq!(eval(xml, "a != b"), Value::Boolean(true));
        assert_eq!(eval(xml, "a > 4"), Value::Boolean(true));
        assert_eq!(eval(xml, "a > 5"), Value::Boolean(false));
        assert_eq!(eval(xml, "none = true()"), Value::Boolean(false));
        assert_eq!(eval(xml, "a = '5'"), Value::Boolean(true));
    }

    #[test]
    fn test_string_functions() {
        assert_eq!(eval("<r/>", "substring('12345', 1.5, 2.6)"), Value::from("234"));
        assert_eq!(eval("<r/>", "substring('12345', 0, 3)"), Value::from("12"));
        assert_eq!(eval("<r/>", "substring('12345', 0 div 0, 3)"), Value::from(""));
        assert_eq!(eval("<r/>", "substring('12345', -42, 1 div 0)"), Value::from("12345"));
        assert_eq!(eval("<r/>", "normalize-space('  a \n b ')"), Value::from("a b"));
        assert_eq!(eval("<r/>", "translate('bar', 'abc', 'ABC')"), Value::from("BAr"));
        assert_eq!(eval("<r/>", "translate('--aaa--', 'abc-', 'ABC')"), Value::from("AAA"));
        assert_eq!(eval("<r/>", "substring-after('1999/04/01', '/')"), Value::from("04/01"));
        assert_eq!(eval("<r/>", "concat('a', 1, true())"), Value::from("a1true"));
        assert_eq!(eval("<r>héllo</r>", "string-length()"), Value::Number(5.0));
    }

    #[test]
    fn test_number_functions() {
        assert_eq!(eval("<r><a>1</a><a>2.5</a></r>", "sum(a)"), Value::Number(3.5));
        assert_eq!(eval("<r/>", "round(-1.5)"), Value::Number(-1.0));
        assert_eq!(eval("<r/>", "floor(-1.5) + ceiling(1.2)"), Value::Number(0.0));
        assert!(matches!(eval("<r/>", "number('x')"), Value::Number(n) if n.is_nan()));
    }

    #[test]
    fn test_id_and_lang() {
        let xml = r#"<r xml:lang="en-GB"><a id="x"/><b xml:id="y"><c/></b></r>"#;
        assert_eq!(strings(xml, "id('y x')").len(), 2);
        assert_eq!(eval(xml, "name(id('x'))"), Value::from("a"));
        assert_eq!(eval(xml, "boolean(b/c[lang('en')])"), Value::Boolean(true));
        assert_eq!(eval(xml, "lang('fr')"), Value::Boolean(false));
    }

    #[test]
    fn test_argument_errors() {
        let doc = Document::parse_str("<r/>").unwrap();
        assert!(matches!(
            eval_in(&doc, &Context::new(), "count()"),
            Err(XPathError::InvalidArgCount { found: 0, .. })
        ));
        assert!(matches!(
            eval_in(&doc, &Context::new(), "nope()"),
            Err(XPathError::UndefinedFunction { .. })
        ));
        assert!(matches!(
            eval_in(&doc, &Context::new(), "count('a')"),
            Err(XPathError::TypeError { .. })
        ));
    }

    #[test]
    fn test_union_and_filter_paths() {
        let xml = "<r><a><x>1</x></a><b><x>2</x></b></r>";
        assert_eq!(strings(xml, "b | a"), vec!["1", "2"]);
        assert_eq!(strings(xml, "(//x)[2]"), vec!["2"]);
        assert_eq!(strings(xml, "(a | b)[1]/x"), vec!["1"]);
        assert_eq!(strings(xml, "//x[1]"), vec!["1", "2"]);
    }

    #[test]
    fn test_following_and_preceding() {
        let xml = "<r><a><a1/></a><b/><c><c1/></c></r>";
        assert_eq!(eval(xml, "count(b/following::*)"), Value::Number(2.0));
        assert_eq!(eval(xml, "count(b/preceding::*)"), Value::Number(2.0));
        assert_eq!(eval(xml, "name(b/preceding::*[1])"), Value::from("a1"));
        assert_eq!(eval(xml, "count(//c1/ancestor::*)"), Value::Number(2.0));
    }

    #[test]
    fn test_text_matches_cdata() {
        use crate::parser::{parse_str_with_options, ParseOptions};
        let options = ParseOptions::default().preserve_cdata(true);
        let doc = parse_str_with_options("<r>a<![CDATA[b]]></r>", &options).unwrap();
        assert_eq!(
            eval_in(&doc, &Context::new(), "count(text())").unwrap(),
            Value::Number(2.0)
        );
    }

    #[test]
    fn test_node_set_variables_belong_to_their_document() {
        let big = Document::parse_str("<r><a/><a/><a/><a/><a/><a/></r>").unwrap();
        let small = Document::parse_str("<r/>").unwrap();
        let ctx = {
            let mut ctx = Context::new();
            let last = big.find("//a[last()]").unwrap();
            ctx.set("picked", Value::NodeSet(last.into_iter().map(NodeRef::Node).collect()));
            ctx
        };
        assert_eq!(eval_in(&big, &ctx, "count($picked)").unwrap(), Value::Number(1.0));
        assert!(matches!(
            eval_in(&small, &ctx, "count($picked)"),
            Err(XPathError::InvalidExpression { .. })
        ));
    }
}
