//! Arena-based XML document tree.
//!
//! All nodes live in a contiguous `Vec<NodeData>` owned by the [`Document`]
//! and are referenced by [`NodeId`], a newtype over `NonZeroU32`. Parent links
//! are plain indices used for lookups only; ownership always flows from the
//! document to every node it has ever allocated, so there are no reference
//! cycles and no per-node heap allocation.
//!
//! Removing or detaching a node unlinks it from its parent. The slot stays in
//! the arena (and the id stays valid) until the document is dropped, so a
//! detached subtree can be re-attached elsewhere in the same document or
//! copied into another one with [`Document::import`].
//!
//! `NodeId`s handed out by XPath evaluation are observers: after a mutation
//! they still index a live slot, but the node may have moved, so results must
//! be recomputed rather than reused.

mod element;
mod equality;
mod node;

pub use equality::Equality;
pub use node::{NodeKind, QName};

use std::fmt;
use std::num::NonZeroU32;

use crate::error::TreeError;
use crate::parser::ParseOptions;

/// The namespace URI bound to the `xml` prefix.
pub const XML_NAMESPACE: &str = "http://www.w3.org/XML/1998/namespace";

/// The namespace URI of `xmlns` declarations themselves.
pub const XMLNS_NAMESPACE: &str = "http://www.w3.org/2000/xmlns/";

/// A typed index into the document's node arena.
///
/// `Option<NodeId>` has the same size as `NodeId` thanks to the non-zero niche.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct NodeId(NonZeroU32);

impl NodeId {
    /// Creates a `NodeId` from an arena index. Index 0 is the placeholder
    /// slot and is never handed out.
    #[allow(clippy::cast_possible_truncation)]
    fn from_index(index: usize) -> Self {
        Self(NonZeroU32::MIN.saturating_add(index.saturating_sub(1) as u32))
    }

    /// Returns the raw index as a `usize` for indexing into the arena.
    pub(crate) fn as_index(self) -> usize {
        self.0.get() as usize
    }
}

/// Storage for a single node in the document arena.
#[derive(Debug, Clone)]
pub struct NodeData {
    /// What kind of node this is and its payload.
    pub kind: NodeKind,
    /// Parent node. `None` for the document node and for detached nodes.
    pub parent: Option<NodeId>,
    /// First child node.
    pub first_child: Option<NodeId>,
    /// Last child node (for O(1) append).
    pub last_child: Option<NodeId>,
    /// Next sibling.
    pub next_sibling: Option<NodeId>,
    /// Previous sibling.
    pub prev_sibling: Option<NodeId>,
    /// Set by [`Document::remove`]. The slot stays allocated but the node is
    /// gone.
    pub(crate) removed: bool,
}

impl NodeData {
    fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            parent: None,
            first_child: None,
            last_child: None,
            next_sibling: None,
            prev_sibling: None,
            removed: false,
        }
    }
}

/// An attribute on an element.
///
/// Namespace declarations (`xmlns`, `xmlns:p`) are stored as attributes too,
/// in the order they appeared. They are skipped by the XPath attribute axis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    /// Local part of the name (`lang` for `xml:lang`).
    pub name: String,
    /// Prefix, if any (`xml` for `xml:lang`).
    pub prefix: Option<String>,
    /// The value with references expanded.
    pub value: String,
}

impl Attribute {
    /// Creates an attribute from a possibly prefixed name.
    pub fn new(qname: impl Into<String>, value: impl Into<String>) -> Self {
        let (prefix, name) = QName::split_owned(qname.into());
        Self {
            name,
            prefix,
            value: value.into(),
        }
    }

    /// Returns the qualified name (`prefix:local` or `local`).
    #[must_use]
    pub fn qualified_name(&self) -> String {
        self.qname().to_string()
    }

    /// Borrowed view of the name.
    #[must_use]
    pub fn qname(&self) -> QName<'_> {
        QName {
            prefix: self.prefix.as_deref(),
            local: &self.name,
        }
    }

    /// Returns `true` if `name` matches this attribute's qualified name.
    #[must_use]
    pub fn has_name(&self, name: &str) -> bool {
        let q = QName::parse(name);
        q.local == self.name && q.prefix == self.prefix.as_deref()
    }

    /// Returns `true` for `xmlns` and `xmlns:p` declarations.
    #[must_use]
    pub fn is_namespace_decl(&self) -> bool {
        self.declared_prefix().is_some()
    }

    /// For a namespace declaration, returns the prefix it binds (`None` for
    /// the default namespace). Returns `None` for ordinary attributes.
    #[must_use]
    pub fn declared_prefix(&self) -> Option<Option<&str>> {
        match self.prefix.as_deref() {
            Some("xmlns") => Some(Some(self.name.as_str())),
            None if self.name == "xmlns" => Some(None),
            _ => None,
        }
    }
}

/// The XML version a document declares and is written as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum XmlVersion {
    /// XML 1.0.
    #[default]
    V1_0,
    /// XML 1.1.
    V1_1,
}

impl XmlVersion {
    /// The version number as it appears in an XML declaration.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::V1_0 => "1.0",
            Self::V1_1 => "1.1",
        }
    }
}

impl fmt::Display for XmlVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A document type declaration as read from, or written to, the prolog.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DocType {
    /// Name of the root element the DOCTYPE declares.
    pub root: String,
    /// The PUBLIC identifier, if any.
    pub public_id: Option<String>,
    /// The SYSTEM identifier (the DTD location), if any.
    pub system_id: Option<String>,
}

/// An XML document.
///
/// The document owns every node. Navigation goes through `&Document`,
/// mutation through `&mut Document`. A document is `Send` and `Sync`;
/// concurrent reads (including XPath evaluation) are fine, concurrent
/// mutation needs external locking.
///
/// ```
/// use quillxml::Document;
///
/// let doc = Document::parse_str("<root><child/></root>").unwrap();
/// let root = doc.root_element().unwrap();
/// assert_eq!(doc.local_name(root), Some("root"));
/// ```
#[derive(Debug, Clone)]
pub struct Document {
    /// The node arena. Index 0 is unused (placeholder for `NonZeroU32`).
    nodes: Vec<NodeData>,
    /// The document node id (not the root element).
    root: NodeId,
    /// Version from the XML declaration.
    pub version: XmlVersion,
    /// Encoding from the XML declaration.
    pub encoding: Option<String>,
    /// Standalone flag from the XML declaration.
    pub standalone: Option<bool>,
    /// DOCTYPE from the prolog, if any.
    pub doctype: Option<DocType>,
    /// Options used by [`Document::read`].
    pub(crate) options: ParseOptions,
    /// Arena slots released by [`Document::remove`].
    removed: usize,
}

impl Document {
    /// Creates an empty document containing only the document node.
    #[must_use]
    pub fn new() -> Self {
        Self::with_options(ParseOptions::default())
    }

    /// Creates an empty document that will use `options` when reading input.
    #[must_use]
    pub fn with_options(options: ParseOptions) -> Self {
        let mut nodes = Vec::with_capacity(64);
        nodes.push(NodeData::new(NodeKind::Document));
        nodes.push(NodeData::new(NodeKind::Document));
        Self {
            nodes,
            root: NodeId::from_index(1),
            version: XmlVersion::V1_0,
            encoding: None,
            standalone: None,
            doctype: None,
            options,
            removed: 0,
        }
    }

    /// Returns the parse options this document reads with.
    #[must_use]
    pub fn options(&self) -> &ParseOptions {
        &self.options
    }

    /// Returns the document node id.
    #[must_use]
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Returns the single top-level element, if there is one.
    #[must_use]
    pub fn root_element(&self) -> Option<NodeId> {
        self.child_elements(self.root).next()
    }

    /// Returns the node data for `id`.
    ///
    /// # Panics
    ///
    /// Panics if `id` was not produced by this document.
    #[must_use]
    pub fn node(&self, id: NodeId) -> &NodeData {
        &self.nodes[id.as_index()]
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> &mut NodeData {
        &mut self.nodes[id.as_index()]
    }

    /// Returns the payload of `id`.
    #[must_use]
    pub fn kind(&self, id: NodeId) -> &NodeKind {
        &self.node(id).kind
    }

    /// Returns `true` if `id` is an element.
    #[must_use]
    pub fn is_element(&self, id: NodeId) -> bool {
        matches!(self.kind(id), NodeKind::Element { .. })
    }

    /// Local name of an element, or the target of a processing instruction.
    #[must_use]
    pub fn local_name(&self, id: NodeId) -> Option<&str> {
        match self.kind(id) {
            NodeKind::Element { name, .. }
            | NodeKind::ProcessingInstruction { target: name, .. } => Some(name),
            _ => None,
        }
    }

    /// Namespace prefix of an element, if it has one.
    #[must_use]
    pub fn prefix(&self, id: NodeId) -> Option<&str> {
        match self.kind(id) {
            NodeKind::Element { prefix, .. } => prefix.as_deref(),
            _ => None,
        }
    }

    /// Qualified name of an element (`p:local`), or a PI target.
    #[must_use]
    pub fn qualified_name(&self, id: NodeId) -> Option<String> {
        match self.kind(id) {
            NodeKind::Element { name, prefix, .. } => Some(
                QName {
                    prefix: prefix.as_deref(),
                    local: name,
                }
                .to_string(),
            ),
            NodeKind::ProcessingInstruction { target, .. } => Some(target.clone()),
            _ => None,
        }
    }

    /// Text of a text, CDATA or comment node, or the data of a PI.
    #[must_use]
    pub fn node_text(&self, id: NodeId) -> Option<&str> {
        match self.kind(id) {
            NodeKind::Text { content }
            | NodeKind::Comment { content }
            | NodeKind::CData { content } => Some(content),
            NodeKind::ProcessingInstruction { data, .. } => data.as_deref(),
            _ => None,
        }
    }

    /// The string value of a node: all descendant character data in document
    /// order for elements and the document, the node's own text otherwise.
    #[must_use]
    pub fn text_content(&self, id: NodeId) -> String {
        match self.kind(id) {
            NodeKind::Document | NodeKind::Element { .. } => {
                let mut out = String::new();
                for d in self.descendants(id) {
                    if let NodeKind::Text { content } | NodeKind::CData { content } = self.kind(d) {
                        out.push_str(content);
                    }
                }
                out
            }
            _ => self.node_text(id).unwrap_or_default().to_string(),
        }
    }

    /// Attributes of an element, namespace declarations included. Empty for
    /// every other kind.
    #[must_use]
    pub fn attributes(&self, id: NodeId) -> &[Attribute] {
        match self.kind(id) {
            NodeKind::Element { attributes, .. } => attributes,
            _ => &[],
        }
    }

    // --- Navigation ---

    /// Returns the parent of a node.
    #[must_use]
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).parent
    }

    /// Returns the first child of a node.
    #[must_use]
    pub fn first_child(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).first_child
    }

    /// Returns the last child of a node.
    #[must_use]
    pub fn last_child(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).last_child
    }

    /// Returns the next sibling of a node.
    #[must_use]
    pub fn next_sibling(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).next_sibling
    }

    /// Returns the previous sibling of a node.
    #[must_use]
    pub fn prev_sibling(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).prev_sibling
    }

    /// Iterates over the children of a node in document order.
    pub fn children(&self, id: NodeId) -> Children<'_> {
        Children {
            doc: self,
            next: self.node(id).first_child,
        }
    }

    /// Iterates over the element children of a node.
    pub fn child_elements(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.children(id).filter(|&c| self.is_element(c))
    }

    /// Iterates over a node and its ancestors, innermost first.
    pub fn ancestors(&self, id: NodeId) -> Ancestors<'_> {
        Ancestors {
            doc: self,
            next: Some(id),
        }
    }

    /// Iterates over all descendants of a node, depth-first, excluding the
    /// node itself.
    pub fn descendants(&self, id: NodeId) -> Descendants<'_> {
        Descendants {
            doc: self,
            root: id,
            next: self.first_child(id),
        }
    }

    /// Returns `true` if `ancestor` is `node` or one of its ancestors.
    #[must_use]
    pub fn is_ancestor_or_self(&self, ancestor: NodeId, node: NodeId) -> bool {
        self.ancestors(node).any(|a| a == ancestor)
    }

    // --- Construction ---

    /// Allocates a detached node in the arena.
    pub fn create_node(&mut self, kind: NodeKind) -> NodeId {
        let index = self.nodes.len();
        self.nodes.push(NodeData::new(kind));
        NodeId::from_index(index)
    }

    /// Allocates a detached element named `qname` (`local` or `prefix:local`).
    ///
    /// # Errors
    ///
    /// Returns [`TreeError::InvalidName`] if `qname` is not a valid `QName`.
    pub fn create_element(&mut self, qname: &str) -> Result<NodeId, TreeError> {
        if !element::is_valid_qname(qname) {
            return Err(TreeError::InvalidName(qname.to_string()));
        }
        let (prefix, name) = QName::split_owned(qname.to_string());
        Ok(self.create_node(NodeKind::Element {
            name,
            prefix,
            attributes: Vec::new(),
        }))
    }

    /// Allocates a detached text node.
    pub fn create_text(&mut self, content: impl Into<String>) -> NodeId {
        self.create_node(NodeKind::Text {
            content: content.into(),
        })
    }

    /// Allocates a detached CDATA section.
    pub fn create_cdata(&mut self, content: impl Into<String>) -> NodeId {
        self.create_node(NodeKind::CData {
            content: content.into(),
        })
    }

    /// Allocates a detached comment.
    pub fn create_comment(&mut self, content: impl Into<String>) -> NodeId {
        self.create_node(NodeKind::Comment {
            content: content.into(),
        })
    }

    /// Allocates a detached processing instruction.
    pub fn create_processing_instruction(
        &mut self,
        target: impl Into<String>,
        data: Option<String>,
    ) -> NodeId {
        self.create_node(NodeKind::ProcessingInstruction {
            target: target.into(),
            data,
        })
    }

    // --- Mutation ---

    /// Appends `child` as the last child of `parent`.
    ///
    /// A child that is attached elsewhere is moved.
    ///
    /// # Errors
    ///
    /// Fails if `child` is `parent` or one of its ancestors, or if the edit
    /// would give the document a second root element.
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), TreeError> {
        self.check_insert(parent, child)?;
        self.detach(child);
        self.link_child(parent, child);
        Ok(())
    }

    /// Prepends `child` as the first child of `parent`.
    ///
    /// # Errors
    ///
    /// Same conditions as [`append_child`](Self::append_child).
    pub fn prepend_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), TreeError> {
        match self.first_child(parent) {
            Some(first) if first != child => self.insert_before(first, child),
            Some(_) => Ok(()),
            None => self.append_child(parent, child),
        }
    }

    /// Inserts `new_child` immediately before `reference`.
    ///
    /// # Errors
    ///
    /// Fails if `reference` has no parent, or for the same conditions as
    /// [`append_child`](Self::append_child).
    pub fn insert_before(&mut self, reference: NodeId, new_child: NodeId) -> Result<(), TreeError> {
        let parent = self.parent(reference).ok_or(TreeError::NoParent)?;
        if reference == new_child {
            return Ok(());
        }
        self.check_insert(parent, new_child)?;
        self.detach(new_child);

        self.node_mut(new_child).parent = Some(parent);
        match self.node(reference).prev_sibling {
            Some(prev) => {
                self.node_mut(prev).next_sibling = Some(new_child);
                self.node_mut(new_child).prev_sibling = Some(prev);
            }
            None => self.node_mut(parent).first_child = Some(new_child),
        }
        self.node_mut(new_child).next_sibling = Some(reference);
        self.node_mut(reference).prev_sibling = Some(new_child);
        Ok(())
    }

    /// Removes a node and its subtree from the document for good.
    ///
    /// The subtree's payloads are dropped and its ids become tombstones: they
    /// no longer count in [`node_count`](Self::node_count), never show up in
    /// node-sets and cannot be inserted again. Use [`detach`](Self::detach)
    /// to keep a subtree for re-insertion.
    pub fn remove(&mut self, id: NodeId) {
        if id == self.root || self.node(id).removed {
            return;
        }
        self.detach(id);
        let mut doomed = vec![id];
        while let Some(node) = doomed.pop() {
            doomed.extend(self.children(node));
            let data = self.node_mut(node);
            data.kind = NodeKind::Text {
                content: String::new(),
            };
            data.parent = None;
            data.first_child = None;
            data.last_child = None;
            data.next_sibling = None;
            data.prev_sibling = None;
            data.removed = true;
            self.removed += 1;
        }
    }

    /// Returns `true` if `id` names a live slot of this document's arena.
    #[must_use]
    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.get(id.as_index()).is_some_and(|n| !n.removed)
    }

    /// Returns `true` once `id` has been dropped by [`remove`](Self::remove).
    #[must_use]
    pub fn is_removed(&self, id: NodeId) -> bool {
        self.node(id).removed
    }

    /// Unlinks a node from its parent, keeping its subtree intact so it can
    /// be re-attached.
    pub fn detach(&mut self, id: NodeId) {
        let Some(parent) = self.node(id).parent else {
            return;
        };

        let prev = self.node(id).prev_sibling;
        let next = self.node(id).next_sibling;

        match prev {
            Some(p) => self.node_mut(p).next_sibling = next,
            None => self.node_mut(parent).first_child = next,
        }
        match next {
            Some(n) => self.node_mut(n).prev_sibling = prev,
            None => self.node_mut(parent).last_child = prev,
        }

        let node = self.node_mut(id);
        node.parent = None;
        node.prev_sibling = None;
        node.next_sibling = None;
    }

    /// Removes every child of `id`.
    pub fn clear_children(&mut self, id: NodeId) {
        while let Some(child) = self.first_child(id) {
            self.remove(child);
        }
    }

    /// Appends without the cycle and root checks. The caller guarantees
    /// that `child` is freshly created or detached.
    pub(crate) fn link_child(&mut self, parent: NodeId, child: NodeId) {
        self.node_mut(child).parent = Some(parent);
        if let Some(last) = self.node(parent).last_child {
            self.node_mut(last).next_sibling = Some(child);
            self.node_mut(child).prev_sibling = Some(last);
        } else {
            self.node_mut(parent).first_child = Some(child);
        }
        self.node_mut(parent).last_child = Some(child);
    }

    fn check_insert(&self, parent: NodeId, child: NodeId) -> Result<(), TreeError> {
        if self.node(parent).removed || self.node(child).removed {
            return Err(TreeError::Removed);
        }
        if matches!(self.kind(child), NodeKind::Document) || self.is_ancestor_or_self(child, parent)
        {
            return Err(TreeError::Cycle);
        }
        if parent == self.root && self.is_element(child) {
            if let Some(existing) = self.root_element() {
                if existing != child {
                    return Err(TreeError::DuplicateRoot);
                }
            }
        }
        Ok(())
    }

    /// Deep-copies the subtree at `node` in `source` into this document.
    ///
    /// Returns the detached copy. Namespace declarations that the subtree
    /// relied on from ancestors in `source` are copied onto the new top
    /// element so prefixes keep resolving to the same URIs.
    pub fn import(&mut self, source: &Document, node: NodeId) -> NodeId {
        let top = self.create_node(source.kind(node).clone());
        if source.is_element(node) {
            for (prefix, uri) in source.in_scope_namespaces(node) {
                let declared = self
                    .attributes(top)
                    .iter()
                    .any(|a| a.declared_prefix() == Some(prefix.as_deref()));
                if !declared && prefix.as_deref() != Some("xml") {
                    let attr = match prefix {
                        Some(p) => Attribute::new(format!("xmlns:{p}"), uri),
                        None => Attribute::new("xmlns", uri),
                    };
                    if let NodeKind::Element { attributes, .. } = &mut self.node_mut(top).kind {
                        attributes.push(attr);
                    }
                }
            }
        }

        // Explicit work list keeps deep subtrees off the call stack.
        let mut work = vec![(node, top)];
        while let Some((src, dst)) = work.pop() {
            for child in source.children(src) {
                let copy = self.create_node(source.kind(child).clone());
                self.link_child(dst, copy);
                work.push((child, copy));
            }
        }
        top
    }

    /// Removes the subtree at `node` and returns it as a new document whose
    /// root is a copy of `node`.
    ///
    /// # Errors
    ///
    /// Returns [`TreeError::NotAnElement`] unless `node` is an element.
    pub fn extract(&mut self, node: NodeId) -> Result<Document, TreeError> {
        if !self.is_element(node) {
            return Err(TreeError::NotAnElement);
        }
        let mut out = Document::with_options(self.options.clone());
        out.version = self.version;
        let copy = out.import(self, node);
        let out_root = out.root;
        out.link_child(out_root, copy);
        self.detach(node);
        Ok(out)
    }

    /// Returns the number of live nodes, including detached ones and the
    /// document node. Removed nodes are not counted.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len() - 1 - self.removed
    }

    /// Preorder position of every arena slot, used to sort node-sets into
    /// document order. Detached subtrees are numbered after the document, in
    /// allocation order of their top node. Removed slots keep `u32::MAX`.
    pub(crate) fn document_order(&self) -> Vec<u32> {
        let mut order = vec![u32::MAX; self.nodes.len()];
        let mut next = 0u32;
        let tops = std::iter::once(self.root).chain(
            (2..self.nodes.len())
                .map(NodeId::from_index)
                .filter(|&id| self.node(id).parent.is_none() && !self.node(id).removed),
        );
        for top in tops {
            order[top.as_index()] = next;
            next += 1;
            for d in self.descendants(top) {
                order[d.as_index()] = next;
                next += 1;
            }
        }
        order
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for Document {
    /// Documents are equal when their root elements are equal ignoring
    /// insignificant whitespace.
    fn eq(&self, other: &Self) -> bool {
        match (self.root_element(), other.root_element()) {
            (Some(a), Some(b)) => self.equals(a, other, b, Equality::IgnoreWhitespace),
            (None, None) => true,
            _ => false,
        }
    }
}

// --- Iterators ---

/// Iterator over the children of a node.
pub struct Children<'a> {
    doc: &'a Document,
    next: Option<NodeId>,
}

impl Iterator for Children<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next?;
        self.next = self.doc.node(current).next_sibling;
        Some(current)
    }
}

/// Iterator over a node and its ancestors.
pub struct Ancestors<'a> {
    doc: &'a Document,
    next: Option<NodeId>,
}

impl Iterator for Ancestors<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next?;
        self.next = self.doc.node(current).parent;
        Some(current)
    }
}

/// Depth-first iterator over all descendants of a node.
pub struct Descendants<'a> {
    doc: &'a Document,
    root: NodeId,
    next: Option<NodeId>,
}

impl Iterator for Descendants<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next?;

        if let Some(child) = self.doc.first_child(current) {
            self.next = Some(child);
            return Some(current);
        }
        if let Some(sibling) = self.doc.next_sibling(current) {
            self.next = Some(sibling);
            return Some(current);
        }

        let mut ancestor = self.doc.parent(current);
        while let Some(anc) = ancestor {
            if anc == self.root {
                break;
            }
            if let Some(sibling) = self.doc.next_sibling(anc) {
                self.next = Some(sibling);
                return Some(current);
            }
            ancestor = self.doc.parent(anc);
        }

        self.next = None;
        Some(current)
    }
}
