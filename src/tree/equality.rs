//! Structural comparison of subtrees.

use super::{Document, NodeId, NodeKind};
use crate::chars::is_xml_space;

/// How strictly [`Document::equals`] compares two subtrees.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Equality {
    /// Every child counts, including whitespace-only text and comments.
    Exact,
    /// Whitespace-only text nodes and comments are skipped.
    #[default]
    IgnoreWhitespace,
}

impl Document {
    /// Compares the subtree at `a` in `self` with the subtree at `b` in
    /// `other`.
    ///
    /// Elements match on local name and namespace URI, not on prefix.
    /// Attributes are compared as an unordered set; namespace declarations
    /// take part only through the URIs they bind.
    #[must_use]
    pub fn equals(&self, a: NodeId, other: &Document, b: NodeId, mode: Equality) -> bool {
        let mut work = vec![(a, b)];
        while let Some((x, y)) = work.pop() {
            if !self.shallow_equals(x, other, y) {
                return false;
            }
            let left: Vec<NodeId> = self.significant_children(x, mode).collect();
            let right: Vec<NodeId> = other.significant_children(y, mode).collect();
            if left.len() != right.len() {
                return false;
            }
            work.extend(left.into_iter().zip(right));
        }
        true
    }

    fn significant_children(
        &self,
        id: NodeId,
        mode: Equality,
    ) -> impl Iterator<Item = NodeId> + '_ {
        self.children(id).filter(move |&c| match (mode, self.kind(c)) {
            (Equality::Exact, _) => true,
            (_, NodeKind::Comment { .. }) => false,
            (_, NodeKind::Text { content }) => !content.chars().all(is_xml_space),
            _ => true,
        })
    }

    fn shallow_equals(&self, x: NodeId, other: &Document, y: NodeId) -> bool {
        match (self.kind(x), other.kind(y)) {
            (NodeKind::Document, NodeKind::Document) => true,
            (NodeKind::Element { name: n1, .. }, NodeKind::Element { name: n2, .. }) => {
                n1 == n2
                    && self.namespace_uri(x) == other.namespace_uri(y)
                    && self.same_attributes(x, other, y)
            }
            (NodeKind::Text { content: c1 }, NodeKind::Text { content: c2 })
            | (NodeKind::CData { content: c1 }, NodeKind::CData { content: c2 })
            | (NodeKind::Comment { content: c1 }, NodeKind::Comment { content: c2 }) => c1 == c2,
            (
                NodeKind::ProcessingInstruction {
                    target: t1,
                    data: d1,
                },
                NodeKind::ProcessingInstruction {
                    target: t2,
                    data: d2,
                },
            ) => t1 == t2 && d1 == d2,
            _ => false,
        }
    }

    fn same_attributes(&self, x: NodeId, other: &Document, y: NodeId) -> bool {
        let ours: Vec<_> = self
            .attributes(x)
            .iter()
            .filter(|a| !a.is_namespace_decl())
            .map(|a| (self.attribute_namespace(x, a), a.name.as_str(), a.value.as_str()))
            .collect();
        let theirs: Vec<_> = other
            .attributes(y)
            .iter()
            .filter(|a| !a.is_namespace_decl())
            .map(|a| (other.attribute_namespace(y, a), a.name.as_str(), a.value.as_str()))
            .collect();
        if ours.len() != theirs.len() || !ours.iter().all(|t| theirs.contains(t)) {
            return false;
        }

        let mut bound_here: Vec<&str> = self
            .attributes(x)
            .iter()
            .filter(|a| a.is_namespace_decl())
            .map(|a| a.value.as_str())
            .collect();
        let mut bound_there: Vec<&str> = other
            .attributes(y)
            .iter()
            .filter(|a| a.is_namespace_decl())
            .map(|a| a.value.as_str())
            .collect();
        bound_here.sort_unstable();
        bound_there.sort_unstable();
        bound_here == bound_there
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn same(a: &str, b: &str, mode: Equality) -> bool {
        let x = Document::parse_str(a).unwrap();
        let y = Document::parse_str(b).unwrap();
        x.equals(
            x.root_element().unwrap(),
            &y,
            y.root_element().unwrap(),
            mode,
        )
    }

    #[test]
    fn test_attribute_order_is_ignored() {
        assert!(same(r#"<a x="1" y="2"/>"#, r#"<a y="2" x="1"/>"#, Equality::Exact));
        assert!(!same(r#"<a x="1"/>"#, r#"<a x="2"/>"#, Equality::Exact));
        assert!(!same(r#"<a x="1"/>"#, r#"<a x="1" y="2"/>"#, Equality::Exact));
    }

    #[test]
    fn test_prefixes_do_not_matter() {
        assert!(same(
            r#"<p:a xmlns:p="urn:x"><p:b/></p:a>"#,
            r#"<q:a xmlns:q="urn:x"><q:b/></q:a>"#,
            Equality::Exact
        ));
        assert!(!same(
            r#"<p:a xmlns:p="urn:x"/>"#,
            r#"<p:a xmlns:p="urn:y"/>"#,
            Equality::Exact
        ));
    }

    #[test]
    fn test_whitespace_modes() {
        let a = "<a>\n  <b>t</b>\n  <!-- note -->\n</a>";
        let b = "<a><b>t</b></a>";
        assert!(same(a, b, Equality::IgnoreWhitespace));
        assert!(!same(a, b, Equality::Exact));
        assert!(!same("<a><b>t</b></a>", "<a><b>u</b></a>", Equality::IgnoreWhitespace));
    }

    #[test]
    fn test_document_partial_eq() {
        let x = Document::parse_str("<a>\n <b/>\n</a>").unwrap();
        let y = Document::parse_str("<a><b/></a>").unwrap();
        let z = Document::parse_str("<a><c/></a>").unwrap();
        assert!(x == y);
        assert!(x != z);
    }
}
