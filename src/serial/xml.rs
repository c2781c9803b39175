//! XML writer.

use std::io;

use crate::chars::{is_valid_xml_1_0_char, is_valid_xml_1_1_char};
use crate::error::WriteError;
use crate::tree::{DocType, Document, NodeId, NodeKind, XmlVersion};

/// Options controlling XML output.
///
/// ```
/// use quillxml::Document;
/// use quillxml::serial::{to_string_with, WriteOptions};
///
/// let doc = Document::parse_str("<root><child>Hello</child></root>").unwrap();
/// let xml = to_string_with(&doc, &WriteOptions::default().indent(true)).unwrap();
/// assert!(xml.contains("\n  <child>Hello</child>\n"));
/// ```
#[derive(Debug, Clone)]
pub struct WriteOptions {
    /// Pretty-print element-only content. Mixed content is always written
    /// as is.
    pub indent: bool,
    /// Spaces per nesting level when indenting. Defaults to 2.
    pub indent_width: usize,
    /// Write childless elements as `<a/>` instead of `<a></a>`. Defaults to
    /// `true`.
    pub collapse_empty: bool,
    /// Leave comments out of the output.
    pub suppress_comments: bool,
    /// Write TAB and LF as character references in text too. Attribute
    /// values always get them, and CR is always escaped.
    pub escape_whitespace: bool,
    /// Write `"` as `&quot;` in text. Attribute values always escape it.
    pub escape_double_quote: bool,
    /// Start with an XML declaration. Defaults to `true`. XML 1.1 output
    /// always gets one.
    pub xml_decl: bool,
    /// Put a newline after the XML declaration, the DOCTYPE and every other
    /// top-level node. Defaults to `true`.
    pub wrap_prolog: bool,
    /// Output version. `None` uses the document's own.
    pub version: Option<XmlVersion>,
    /// DOCTYPE to write. `None` uses the document's own, if any.
    pub doctype: Option<DocType>,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            indent: false,
            indent_width: 2,
            collapse_empty: true,
            suppress_comments: false,
            escape_whitespace: false,
            escape_double_quote: false,
            xml_decl: true,
            wrap_prolog: true,
            version: None,
            doctype: None,
        }
    }
}

impl WriteOptions {
    #[must_use]
    pub fn indent(mut self, yes: bool) -> Self {
        self.indent = yes;
        self
    }

    #[must_use]
    pub fn indent_width(mut self, width: usize) -> Self {
        self.indent_width = width;
        self
    }

    #[must_use]
    pub fn collapse_empty(mut self, yes: bool) -> Self {
        self.collapse_empty = yes;
        self
    }

    #[must_use]
    pub fn suppress_comments(mut self, yes: bool) -> Self {
        self.suppress_comments = yes;
        self
    }

    #[must_use]
    pub fn escape_whitespace(mut self, yes: bool) -> Self {
        self.escape_whitespace = yes;
        self
    }

    #[must_use]
    pub fn escape_double_quote(mut self, yes: bool) -> Self {
        self.escape_double_quote = yes;
        self
    }

    #[must_use]
    pub fn xml_decl(mut self, yes: bool) -> Self {
        self.xml_decl = yes;
        self
    }

    #[must_use]
    pub fn wrap_prolog(mut self, yes: bool) -> Self {
        self.wrap_prolog = yes;
        self
    }

    #[must_use]
    pub fn version(mut self, version: XmlVersion) -> Self {
        self.version = Some(version);
        self
    }

    #[must_use]
    pub fn doctype(mut self, doctype: DocType) -> Self {
        self.doctype = Some(doctype);
        self
    }
}

/// Writes `doc` to `out`.
///
/// # Errors
///
/// Returns [`WriteError::InvalidCharacter`] for characters the output
/// version cannot represent, and [`WriteError::Io`] if `out` fails. Nothing
/// is written when a character is rejected.
pub fn write<W: io::Write + ?Sized>(
    doc: &Document,
    out: &mut W,
    options: &WriteOptions,
) -> Result<(), WriteError> {
    let text = to_string_with(doc, options)?;
    out.write_all(text.as_bytes())?;
    Ok(())
}

/// Writes `doc` with default options.
///
/// # Errors
///
/// See [`write`].
pub fn to_string(doc: &Document) -> Result<String, WriteError> {
    to_string_with(doc, &WriteOptions::default())
}

/// Writes `doc` with the given options.
///
/// # Errors
///
/// See [`write`].
pub fn to_string_with(doc: &Document, options: &WriteOptions) -> Result<String, WriteError> {
    let mut writer = XmlWriter::new(doc, options);
    writer.write_document()?;
    Ok(writer.out)
}

/// Writes the subtree rooted at `node` without a prolog.
///
/// # Errors
///
/// See [`write`].
pub fn node_to_string(
    doc: &Document,
    node: NodeId,
    options: &WriteOptions,
) -> Result<String, WriteError> {
    let mut writer = XmlWriter::new(doc, options);
    if node == doc.root() {
        for child in doc.children(node) {
            writer.write_node(child, 0, false)?;
        }
    } else {
        writer.write_node(node, 0, false)?;
    }
    Ok(writer.out)
}

/// Work left for the writer: an unopened node or an element awaiting its
/// end tag.
enum Step {
    Open {
        id: NodeId,
        depth: usize,
        indented: bool,
    },
    Close {
        qname: String,
        depth: usize,
        element_only: bool,
    },
}

struct XmlWriter<'a> {
    doc: &'a Document,
    options: &'a WriteOptions,
    version: XmlVersion,
    out: String,
}

impl<'a> XmlWriter<'a> {
    fn new(doc: &'a Document, options: &'a WriteOptions) -> Self {
        Self {
            doc,
            options,
            version: options.version.unwrap_or(doc.version),
            out: String::new(),
        }
    }

    fn write_document(&mut self) -> Result<(), WriteError> {
        let doc = self.doc;
        let options = self.options;
        if options.xml_decl || self.version == XmlVersion::V1_1 {
            self.out.push_str("<?xml version=\"");
            self.out.push_str(self.version.as_str());
            self.out.push('"');
            if let Some(standalone) = doc.standalone {
                self.out.push_str(" standalone=\"");
                self.out.push_str(if standalone { "yes" } else { "no" });
                self.out.push('"');
            }
            self.out.push_str("?>");
            self.wrap();
        }

        if let Some(doctype) = options.doctype.as_ref().or(doc.doctype.as_ref()) {
            self.write_doctype(doctype)?;
            self.wrap();
        }

        let mut first = true;
        for child in doc.children(doc.root()) {
            if self.options.suppress_comments && matches!(doc.kind(child), NodeKind::Comment { .. }) {
                continue;
            }
            if !first {
                self.wrap();
            }
            first = false;
            self.write_node(child, 0, false)?;
        }
        Ok(())
    }

    fn wrap(&mut self) {
        if self.options.wrap_prolog {
            self.out.push('\n');
        }
    }

    fn write_doctype(&mut self, doctype: &DocType) -> Result<(), WriteError> {
        self.out.push_str("<!DOCTYPE ");
        let root = if doctype.root.is_empty() {
            self.doc
                .root_element()
                .and_then(|r| self.doc.qualified_name(r))
                .unwrap_or_default()
        } else {
            doctype.root.clone()
        };
        self.out.push_str(&root);
        match (&doctype.public_id, &doctype.system_id) {
            (Some(public), Some(system)) => {
                self.out.push_str(" PUBLIC \"");
                self.write_raw(public)?;
                self.out.push_str("\" \"");
                self.write_raw(system)?;
                self.out.push('"');
            }
            (None, Some(system)) => {
                self.out.push_str(" SYSTEM \"");
                self.write_raw(system)?;
                self.out.push('"');
            }
            _ => {}
        }
        self.out.push('>');
        Ok(())
    }

    fn newline_indent(&mut self, depth: usize) {
        self.out.push('\n');
        for _ in 0..depth * self.options.indent_width {
            self.out.push(' ');
        }
    }

    /// Elements whose children are only elements, comments, PIs and
    /// whitespace text get indented.
    fn is_element_only(&self, id: NodeId) -> bool {
        let mut has_element = false;
        for child in self.doc.children(id) {
            match self.doc.kind(child) {
                NodeKind::Element { .. } => has_element = true,
                NodeKind::Text { content } => {
                    if !content.chars().all(crate::chars::is_xml_space) {
                        return false;
                    }
                }
                NodeKind::CData { .. } => return false,
                _ => {}
            }
        }
        has_element
    }

    /// Writes `id` and its subtree. Open elements wait on `pending`, so
    /// nesting depth never reaches the call stack.
    fn write_node(&mut self, id: NodeId, depth: usize, indented: bool) -> Result<(), WriteError> {
        let mut pending = vec![Step::Open { id, depth, indented }];
        while let Some(step) = pending.pop() {
            match step {
                Step::Open { id, depth, indented } => {
                    self.write_open(id, depth, indented, &mut pending)?;
                }
                Step::Close {
                    qname,
                    depth,
                    element_only,
                } => {
                    if element_only {
                        self.newline_indent(depth);
                    }
                    self.out.push_str("</");
                    self.out.push_str(&qname);
                    self.out.push('>');
                }
            }
        }
        Ok(())
    }

    /// Writes everything of `id` up to its children, which are queued on
    /// `pending` in reverse so they pop in document order.
    fn write_open(
        &mut self,
        id: NodeId,
        depth: usize,
        indented: bool,
        pending: &mut Vec<Step>,
    ) -> Result<(), WriteError> {
        let doc = self.doc;
        match doc.kind(id) {
            NodeKind::Element { attributes, .. } => {
                if indented {
                    self.newline_indent(depth);
                }
                let qname = doc.qualified_name(id).unwrap_or_default();
                self.out.push('<');
                self.out.push_str(&qname);
                for attr in attributes {
                    self.out.push(' ');
                    self.out.push_str(&attr.qualified_name());
                    self.out.push_str("=\"");
                    self.write_escaped(&attr.value, true)?;
                    self.out.push('"');
                }

                if doc.first_child(id).is_none() && self.options.collapse_empty {
                    self.out.push_str("/>");
                    return Ok(());
                }
                self.out.push('>');

                let element_only = self.options.indent && self.is_element_only(id);
                pending.push(Step::Close {
                    qname,
                    depth,
                    element_only,
                });
                let children: Vec<NodeId> = doc
                    .children(id)
                    .filter(|&child| {
                        !(element_only && matches!(doc.kind(child), NodeKind::Text { .. }))
                    })
                    .collect();
                pending.extend(children.into_iter().rev().map(|child| Step::Open {
                    id: child,
                    depth: depth + 1,
                    indented: element_only,
                }));
            }
            NodeKind::Text { content } => self.write_escaped(content, false)?,
            NodeKind::CData { content } => {
                self.out.push_str("<![CDATA[");
                // A literal `]]>` ends the section, so split it across two.
                let mut parts = content.split("]]>");
                if let Some(first) = parts.next() {
                    self.write_raw(first)?;
                }
                for part in parts {
                    self.out.push_str("]]]]><![CDATA[>");
                    self.write_raw(part)?;
                }
                self.out.push_str("]]>");
            }
            NodeKind::Comment { content } => {
                if self.options.suppress_comments {
                    return Ok(());
                }
                if indented {
                    self.newline_indent(depth);
                }
                self.out.push_str("<!--");
                let mut last_was_hyphen = false;
                for c in content.chars() {
                    if c == '-' && last_was_hyphen {
                        self.out.push(' ');
                    }
                    self.write_raw_char(c)?;
                    last_was_hyphen = c == '-';
                }
                if last_was_hyphen {
                    self.out.push(' ');
                }
                self.out.push_str("-->");
            }
            NodeKind::ProcessingInstruction { target, data } => {
                if indented {
                    self.newline_indent(depth);
                }
                self.out.push_str("<?");
                self.out.push_str(target);
                if let Some(data) = data {
                    self.out.push(' ');
                    self.write_raw(data)?;
                }
                self.out.push_str("?>");
            }
            NodeKind::Document => {
                let children: Vec<NodeId> = doc.children(id).collect();
                pending.extend(children.into_iter().rev().map(|child| Step::Open {
                    id: child,
                    depth,
                    indented,
                }));
            }
        }
        Ok(())
    }

    fn invalid(&self, c: char) -> WriteError {
        WriteError::InvalidCharacter(u32::from(c), self.version.as_str())
    }

    fn is_literal(&self, c: char) -> bool {
        match self.version {
            XmlVersion::V1_0 => is_valid_xml_1_0_char(u32::from(c)),
            XmlVersion::V1_1 => is_valid_xml_1_1_char(u32::from(c)),
        }
    }

    /// Writes a character that cannot be escaped, in comments, PIs, CDATA
    /// and DOCTYPE literals.
    fn write_raw_char(&mut self, c: char) -> Result<(), WriteError> {
        if !self.is_literal(c) {
            return Err(self.invalid(c));
        }
        self.out.push(c);
        Ok(())
    }

    fn write_raw(&mut self, s: &str) -> Result<(), WriteError> {
        s.chars().try_for_each(|c| self.write_raw_char(c))
    }

    fn write_escaped(&mut self, s: &str, in_attribute: bool) -> Result<(), WriteError> {
        let escape_whitespace = self.options.escape_whitespace;
        for c in s.chars() {
            match c {
                '&' => self.out.push_str("&amp;"),
                '<' => self.out.push_str("&lt;"),
                '>' => self.out.push_str("&gt;"),
                '"' if in_attribute || self.options.escape_double_quote => {
                    self.out.push_str("&quot;");
                }
                // Attribute values are normalized on read, so their line
                // ends and tabs survive only as references.
                '\n' if escape_whitespace || in_attribute => self.out.push_str("&#10;"),
                '\t' if escape_whitespace || in_attribute => self.out.push_str("&#9;"),
                // A literal CR would be normalized away on the next read.
                '\r' => self.out.push_str("&#13;"),
                // NEL and LS are line ends to a 1.1 reader.
                '\u{85}' | '\u{2028}' if self.version == XmlVersion::V1_1 => {
                    self.out.push_str(&format!("&#{};", u32::from(c)));
                }
                '\0' => return Err(self.invalid(c)),
                c if self.is_literal(c) => self.out.push(c),
                // XML 1.1 restricted characters may only appear as references.
                c if self.version == XmlVersion::V1_1
                    && matches!(u32::from(c), 0x01..=0x1F | 0x7F..=0x9F) =>
                {
                    self.out.push_str(&format!("&#{};", u32::from(c)));
                }
                c => return Err(self.invalid(c)),
            }
        }
        Ok(())
    }
}
