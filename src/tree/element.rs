//! Element-level operations: attributes, text content and namespaces.
//!
//! These are `Document` methods taking the element's [`NodeId`]. Calling
//! a getter on a non-element returns the empty answer; calling a setter
//! returns [`TreeError::NotAnElement`].

use crate::chars::is_valid_name;
use crate::error::TreeError;

use super::{Attribute, Document, NodeId, NodeKind, QName, XML_NAMESPACE};

/// A `Name` with at most one colon, and that colon between two non-empty
/// parts.
pub(crate) fn is_valid_qname(name: &str) -> bool {
    is_valid_name(name)
        && match name.split_once(':') {
            Some((prefix, local)) => !prefix.is_empty() && !local.is_empty() && !local.contains(':'),
            None => true,
        }
}

impl Document {
    fn attributes_mut(&mut self, id: NodeId) -> Result<&mut Vec<Attribute>, TreeError> {
        match &mut self.node_mut(id).kind {
            NodeKind::Element { attributes, .. } => Ok(attributes),
            _ => Err(TreeError::NotAnElement),
        }
    }

    /// Returns the value of the attribute with qualified name `name`.
    ///
    /// `None` means the attribute is absent; `Some("")` means it is present
    /// with an empty value.
    #[must_use]
    pub fn get_attribute(&self, id: NodeId, name: &str) -> Option<&str> {
        self.attributes(id)
            .iter()
            .find(|a| a.has_name(name))
            .map(|a| a.value.as_str())
    }

    /// Returns `true` if the element carries an attribute named `name`.
    #[must_use]
    pub fn has_attribute(&self, id: NodeId, name: &str) -> bool {
        self.get_attribute(id, name).is_some()
    }

    /// Sets an attribute. An existing attribute with the same qualified name
    /// keeps its position and gets the new value.
    ///
    /// # Errors
    ///
    /// Fails if `id` is not an element or `name` is not a valid XML name.
    pub fn set_attribute(
        &mut self,
        id: NodeId,
        name: &str,
        value: impl Into<String>,
    ) -> Result<(), TreeError> {
        if !is_valid_qname(name) {
            return Err(TreeError::InvalidName(name.to_string()));
        }
        let value = value.into();
        let attributes = self.attributes_mut(id)?;
        match attributes.iter_mut().find(|a| a.has_name(name)) {
            Some(existing) => existing.value = value,
            None => attributes.push(Attribute::new(name, value)),
        }
        Ok(())
    }

    /// Removes an attribute, returning its value if it was present.
    pub fn remove_attribute(&mut self, id: NodeId, name: &str) -> Option<String> {
        let attributes = self.attributes_mut(id).ok()?;
        let index = attributes.iter().position(|a| a.has_name(name))?;
        Some(attributes.remove(index).value)
    }

    /// Concatenated text of the direct text and CDATA children.
    #[must_use]
    pub fn content(&self, id: NodeId) -> String {
        self.children(id)
            .filter_map(|c| match self.kind(c) {
                NodeKind::Text { content } | NodeKind::CData { content } => Some(content.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Replaces all direct text and CDATA children with a single text node
    /// appended after the remaining children.
    ///
    /// # Errors
    ///
    /// Returns [`TreeError::NotAnElement`] unless `id` is an element.
    pub fn set_content(&mut self, id: NodeId, text: impl Into<String>) -> Result<(), TreeError> {
        if !self.is_element(id) {
            return Err(TreeError::NotAnElement);
        }
        let stale: Vec<NodeId> = self
            .children(id)
            .filter(|&c| self.kind(c).is_character_data())
            .collect();
        for child in stale {
            self.detach(child);
        }
        let node = self.create_text(text);
        self.link_child(id, node);
        Ok(())
    }

    /// Appends text, extending the last child if it is a text node.
    ///
    /// # Errors
    ///
    /// Returns [`TreeError::NotAnElement`] unless `id` is an element.
    pub fn add_text(&mut self, id: NodeId, text: &str) -> Result<(), TreeError> {
        if !self.is_element(id) {
            return Err(TreeError::NotAnElement);
        }
        if let Some(last) = self.last_child(id) {
            if let NodeKind::Text { content } = &mut self.node_mut(last).kind {
                content.push_str(text);
                return Ok(());
            }
        }
        let node = self.create_text(text);
        self.link_child(id, node);
        Ok(())
    }

    /// Merges runs of adjacent text nodes among the direct children.
    pub fn flatten_text(&mut self, id: NodeId) {
        let mut cursor = self.first_child(id);
        while let Some(current) = cursor {
            let next = self.next_sibling(current);
            let merge = match (next, &self.kind(current)) {
                (Some(n), NodeKind::Text { .. }) => match self.kind(n) {
                    NodeKind::Text { content } => Some((n, content.clone())),
                    _ => None,
                },
                _ => None,
            };
            match merge {
                Some((n, tail)) => {
                    if let NodeKind::Text { content } = &mut self.node_mut(current).kind {
                        content.push_str(&tail);
                    }
                    self.detach(n);
                }
                None => cursor = next,
            }
        }
    }

    /// The `xml:lang` in effect for `id`, inherited from the nearest ancestor
    /// that declares one.
    #[must_use]
    pub fn lang(&self, id: NodeId) -> Option<&str> {
        self.ancestors(id)
            .find_map(|a| self.get_attribute(a, "xml:lang"))
    }

    /// The element's ID: its `xml:id` attribute, or else its `id` attribute.
    #[must_use]
    pub fn element_id(&self, id: NodeId) -> Option<&str> {
        self.get_attribute(id, "xml:id")
            .or_else(|| self.get_attribute(id, "id"))
    }

    /// Returns the element whose [`element_id`](Self::element_id) equals
    /// `value`, searching in document order.
    #[must_use]
    pub fn element_by_id(&self, value: &str) -> Option<NodeId> {
        self.descendants(self.root())
            .find(|&d| self.element_id(d) == Some(value))
    }

    // --- Namespaces ---

    /// Resolves `prefix` (or the default namespace for `None`) from the
    /// declarations on `id` and its ancestors.
    #[must_use]
    pub fn namespace_for_prefix(&self, id: NodeId, prefix: Option<&str>) -> Option<&str> {
        if prefix == Some("xml") {
            return Some(XML_NAMESPACE);
        }
        for ancestor in self.ancestors(id) {
            let found = self
                .attributes(ancestor)
                .iter()
                .find(|a| a.declared_prefix() == Some(prefix));
            if let Some(decl) = found {
                // xmlns="" undeclares the default namespace.
                return (!decl.value.is_empty()).then_some(decl.value.as_str());
            }
        }
        None
    }

    /// Returns the prefix bound to `uri` in scope at `id`. The default
    /// namespace yields `Some("")`.
    #[must_use]
    pub fn prefix_for_namespace(&self, id: NodeId, uri: &str) -> Option<&str> {
        if uri == XML_NAMESPACE {
            return Some("xml");
        }
        for ancestor in self.ancestors(id) {
            for decl in self.attributes(ancestor) {
                let Some(prefix) = decl.declared_prefix() else {
                    continue;
                };
                // A closer declaration of the same prefix shadows this one.
                if decl.value == uri && self.namespace_for_prefix(id, prefix) == Some(uri) {
                    return Some(prefix.unwrap_or(""));
                }
            }
        }
        None
    }

    /// Namespace URI of an element, resolved from its prefix.
    #[must_use]
    pub fn namespace_uri(&self, id: NodeId) -> Option<&str> {
        match self.kind(id) {
            NodeKind::Element { prefix, .. } => self.namespace_for_prefix(id, prefix.as_deref()),
            _ => None,
        }
    }

    /// Namespace URI of an attribute of `element`. Unprefixed attributes are
    /// in no namespace.
    #[must_use]
    pub fn attribute_namespace(&self, element: NodeId, attr: &Attribute) -> Option<&str> {
        match attr.prefix.as_deref() {
            Some("xmlns") => Some(super::XMLNS_NAMESPACE),
            Some(p) => self.namespace_for_prefix(element, Some(p)),
            None if attr.name == "xmlns" => Some(super::XMLNS_NAMESPACE),
            None => None,
        }
    }

    /// All bindings in scope at `id`, innermost declaration winning, with
    /// the implicit `xml` binding last. Undeclared default namespaces are
    /// omitted.
    #[must_use]
    pub fn in_scope_namespaces(&self, id: NodeId) -> Vec<(Option<String>, String)> {
        let mut seen: Vec<Option<&str>> = Vec::new();
        let mut out = Vec::new();
        for ancestor in self.ancestors(id) {
            for attr in self.attributes(ancestor) {
                let Some(prefix) = attr.declared_prefix() else {
                    continue;
                };
                if seen.contains(&prefix) {
                    continue;
                }
                seen.push(prefix);
                if !attr.value.is_empty() {
                    out.push((prefix.map(str::to_string), attr.value.clone()));
                }
            }
        }
        out.push((Some("xml".to_string()), XML_NAMESPACE.to_string()));
        out
    }

    /// Declares `prefix` (or the default namespace) on `id`.
    ///
    /// # Errors
    ///
    /// Fails if `id` is not an element or the prefix is not a valid name.
    pub fn set_namespace_declaration(
        &mut self,
        id: NodeId,
        prefix: Option<&str>,
        uri: &str,
    ) -> Result<(), TreeError> {
        match prefix {
            Some(p) if !p.is_empty() => self.set_attribute(id, &format!("xmlns:{p}"), uri),
            _ => self.set_attribute(id, "xmlns", uri),
        }
    }

    /// Moves an element (and optionally its attributes and descendants) into
    /// the namespace `uri`, using `prefix` (empty for the default namespace).
    ///
    /// A declaration is added to `id` unless `uri` is already bound to
    /// `prefix` in scope.
    ///
    /// # Errors
    ///
    /// Returns [`TreeError::PrefixInUse`] if `uri` is already bound to a
    /// different prefix in scope, and [`TreeError::NotAnElement`] if `id` is
    /// not an element.
    pub fn move_to_namespace(
        &mut self,
        id: NodeId,
        prefix: &str,
        uri: &str,
        recursive: bool,
        including_attributes: bool,
    ) -> Result<(), TreeError> {
        let mut work = vec![id];
        while let Some(current) = work.pop() {
            if !self.is_element(current) {
                return Err(TreeError::NotAnElement);
            }
            match self.prefix_for_namespace(current, uri) {
                Some(known) if known != prefix => {
                    return Err(TreeError::PrefixInUse {
                        prefix: known.to_string(),
                    })
                }
                Some(_) => {}
                None => {
                    let declared = (!prefix.is_empty()).then_some(prefix);
                    self.set_namespace_declaration(current, declared, uri)?;
                }
            }

            let new_prefix = (!prefix.is_empty()).then(|| prefix.to_string());
            let NodeKind::Element {
                prefix: element_prefix,
                attributes,
                ..
            } = &mut self.node_mut(current).kind
            else {
                return Err(TreeError::NotAnElement);
            };
            *element_prefix = new_prefix.clone();
            if including_attributes && new_prefix.is_some() {
                for attr in attributes.iter_mut() {
                    if !attr.is_namespace_decl() && attr.prefix.is_none() {
                        attr.prefix.clone_from(&new_prefix);
                    }
                }
            }

            if recursive {
                let children: Vec<NodeId> = self.child_elements(current).collect();
                work.extend(children.into_iter().rev());
            }
        }
        Ok(())
    }

    /// Borrowed qualified name of an element.
    #[must_use]
    pub fn qname(&self, id: NodeId) -> Option<QName<'_>> {
        match self.kind(id) {
            NodeKind::Element { name, prefix, .. } => Some(QName {
                prefix: prefix.as_deref(),
                local: name,
            }),
            _ => None,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn root_of(xml: &str) -> (Document, NodeId) {
        let doc = Document::parse_str(xml).unwrap();
        let root = doc.root_element().unwrap();
        (doc, root)
    }

    #[test]
    fn test_absent_vs_empty_attribute() {
        let (doc, r) = root_of(r#"<r a="" b="x"/>"#);
        assert_eq!(doc.get_attribute(r, "a"), Some(""));
        assert_eq!(doc.get_attribute(r, "b"), Some("x"));
        assert_eq!(doc.get_attribute(r, "c"), None);
    }

    #[test]
    fn test_set_attribute_replaces_in_place() {
        let (mut doc, r) = root_of(r#"<r a="1" b="2"/>"#);
        doc.set_attribute(r, "a", "3").unwrap();
        doc.set_attribute(r, "c", "4").unwrap();
        let names: Vec<String> = doc.attributes(r).iter().map(Attribute::qualified_name).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
        assert_eq!(doc.get_attribute(r, "a"), Some("3"));
        assert_eq!(doc.remove_attribute(r, "b").as_deref(), Some("2"));
        assert!(!doc.has_attribute(r, "b"));
        assert!(doc.set_attribute(r, "bad name", "x").is_err());
    }

    #[test]
    fn test_set_attribute_rejects_empty_qname_parts() {
        let (mut doc, r) = root_of("<r/>");
        for name in ["a:", ":a", "a:b:c", ":"] {
            assert_eq!(
                doc.set_attribute(r, name, "x"),
                Err(TreeError::InvalidName(name.to_string())),
                "accepted {name:?}"
            );
        }
        assert!(doc.attributes(r).is_empty());
        doc.set_attribute(r, "xml:lang", "en").unwrap();
        assert_eq!(doc.get_attribute(r, "xml:lang"), Some("en"));
    }

    #[test]
    fn test_content_and_set_content() {
        let (mut doc, r) = root_of("<r>a<b>x</b>c</r>");
        assert_eq!(doc.content(r), "ac");
        doc.set_content(r, "z").unwrap();
        assert_eq!(doc.content(r), "z");
        assert_eq!(doc.text_content(r), "xz");
    }

    #[test]
    fn test_add_text_extends_trailing_text() {
        let (mut doc, r) = root_of("<r>a</r>");
        doc.add_text(r, "b").unwrap();
        assert_eq!(doc.children(r).count(), 1);
        let b = doc.create_element("b").unwrap();
        doc.append_child(r, b).unwrap();
        doc.add_text(r, "c").unwrap();
        assert_eq!(doc.children(r).count(), 3);
        assert_eq!(doc.content(r), "abc");
    }

    #[test]
    fn test_flatten_text() {
        let (mut doc, r) = root_of("<r/>");
        for t in ["a", "b", "c"] {
            let n = doc.create_text(t);
            doc.append_child(r, n).unwrap();
        }
        doc.flatten_text(r);
        assert_eq!(doc.children(r).count(), 1);
        assert_eq!(doc.content(r), "abc");
    }

    #[test]
    fn test_lang_is_inherited() {
        let (doc, r) = root_of(r#"<r xml:lang="en"><a><b xml:lang="fr"/></a></r>"#);
        let a = doc.first_child(r).unwrap();
        let b = doc.first_child(a).unwrap();
        assert_eq!(doc.lang(a), Some("en"));
        assert_eq!(doc.lang(b), Some("fr"));
    }

    #[test]
    fn test_element_id() {
        let (doc, r) = root_of(r#"<r><a xml:id="x1"/><b id="x2"/></r>"#);
        let a = doc.first_child(r).unwrap();
        assert_eq!(doc.element_id(a), Some("x1"));
        assert_eq!(doc.element_by_id("x2"), doc.last_child(r));
        assert_eq!(doc.element_by_id("nope"), None);
    }

    #[test]
    fn test_namespace_lookup() {
        let (doc, r) = root_of(r#"<r xmlns="urn:d" xmlns:p="urn:p"><p:a><b xmlns=""/></p:a></r>"#);
        let a = doc.first_child(r).unwrap();
        let b = doc.first_child(a).unwrap();
        assert_eq!(doc.namespace_uri(r), Some("urn:d"));
        assert_eq!(doc.namespace_uri(a), Some("urn:p"));
        assert_eq!(doc.namespace_uri(b), None);
        assert_eq!(doc.prefix_for_namespace(a, "urn:p"), Some("p"));
        assert_eq!(doc.prefix_for_namespace(a, "urn:d"), Some(""));
        assert_eq!(doc.prefix_for_namespace(b, "urn:d"), None);
        assert_eq!(doc.namespace_for_prefix(b, Some("xml")), Some(XML_NAMESPACE));
    }

    #[test]
    fn test_in_scope_namespaces() {
        let (doc, r) = root_of(r#"<r xmlns:p="urn:outer"><a xmlns:p="urn:inner" xmlns:q="urn:q"/></r>"#);
        let a = doc.first_child(r).unwrap();
        let scope = doc.in_scope_namespaces(a);
        assert_eq!(
            scope,
            vec![
                (Some("p".to_string()), "urn:inner".to_string()),
                (Some("q".to_string()), "urn:q".to_string()),
                (Some("xml".to_string()), XML_NAMESPACE.to_string()),
            ]
        );
    }

    #[test]
    fn test_move_to_namespace() {
        let (mut doc, r) = root_of(r#"<r a="1"><c/></r>"#);
        doc.move_to_namespace(r, "ns", "urn:ns", true, true).unwrap();
        let c = doc.first_child(r).unwrap();
        assert_eq!(doc.qualified_name(r).as_deref(), Some("ns:r"));
        assert_eq!(doc.namespace_uri(c), Some("urn:ns"));
        assert_eq!(doc.get_attribute(r, "ns:a"), Some("1"));
        assert_eq!(doc.get_attribute(r, "xmlns:ns"), Some("urn:ns"));
        assert!(!doc.has_attribute(c, "xmlns:ns"));
    }

    #[test]
    fn test_move_to_namespace_prefix_conflict() {
        let (mut doc, r) = root_of(r#"<r xmlns:a="urn:x"><c/></r>"#);
        let c = doc.first_child(r).unwrap();
        assert_eq!(
            doc.move_to_namespace(c, "b", "urn:x", false, false),
            Err(TreeError::PrefixInUse {
                prefix: "a".to_string()
            })
        );
    }
}
