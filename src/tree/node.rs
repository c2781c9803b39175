//! Node payloads.
//!
//! [`NodeKind`] is a closed set: exhaustive matches over it are how the
//! writer, the equality check and the XPath engine stay in sync when a kind is
//! added. Navigation links live in [`NodeData`](super::NodeData), not here.

use std::fmt;

use super::Attribute;

/// The kind of an XML node and its associated data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    /// The document node. There is exactly one per `Document` and it is
    /// never a child.
    Document,

    /// An element, e.g. `<svg:rect width="3">`.
    ///
    /// Only the prefix is stored. The namespace URI is derived on demand by
    /// walking the ancestors for an in-scope declaration, so it stays correct
    /// when the element is moved.
    Element {
        /// Local part of the name (`rect`).
        name: String,
        /// Prefix (`svg`), if any.
        prefix: Option<String>,
        /// Attributes in document order, namespace declarations included.
        attributes: Vec<Attribute>,
    },

    /// Character data with references already expanded.
    Text {
        /// The decoded text.
        content: String,
    },

    /// A CDATA section. Only produced when CDATA preservation is enabled;
    /// otherwise CDATA content is merged into the surrounding text.
    CData {
        /// The raw section content.
        content: String,
    },

    /// A comment, without the `<!--` and `-->` delimiters.
    Comment {
        /// The comment text.
        content: String,
    },

    /// A processing instruction, e.g. `<?xml-stylesheet href="a.xsl"?>`.
    ProcessingInstruction {
        /// The PI target.
        target: String,
        /// Everything after the target and the separating whitespace.
        data: Option<String>,
    },
}

impl NodeKind {
    /// Short lowercase label used in diagnostics.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Document => "document",
            Self::Element { .. } => "element",
            Self::Text { .. } => "text",
            Self::CData { .. } => "cdata",
            Self::Comment { .. } => "comment",
            Self::ProcessingInstruction { .. } => "processing-instruction",
        }
    }

    /// Returns `true` for text and CDATA nodes.
    #[must_use]
    pub fn is_character_data(&self) -> bool {
        matches!(self, Self::Text { .. } | Self::CData { .. })
    }
}

/// A qualified name split into prefix and local part.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QName<'a> {
    /// The prefix before the colon, if any.
    pub prefix: Option<&'a str>,
    /// The part after the colon (or the whole name).
    pub local: &'a str,
}

impl<'a> QName<'a> {
    /// Splits `name` at its first colon.
    ///
    /// ```
    /// use quillxml::tree::QName;
    ///
    /// let q = QName::parse("xs:element");
    /// assert_eq!(q.prefix, Some("xs"));
    /// assert_eq!(q.local, "element");
    /// ```
    #[must_use]
    pub fn parse(name: &'a str) -> Self {
        match name.split_once(':') {
            Some((prefix, local)) => Self {
                prefix: Some(prefix),
                local,
            },
            None => Self {
                prefix: None,
                local: name,
            },
        }
    }

    /// Splits an owned name without reallocating the common unprefixed case.
    #[must_use]
    pub(crate) fn split_owned(name: String) -> (Option<String>, String) {
        match name.find(':') {
            Some(pos) => (Some(name[..pos].to_string()), name[pos + 1..].to_string()),
            None => (None, name),
        }
    }
}

impl fmt::Display for QName<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.prefix {
            Some(p) => write!(f, "{p}:{}", self.local),
            None => f.write_str(self.local),
        }
    }
}
