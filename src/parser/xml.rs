//! Document scanner.
//!
//! Element nesting is tracked with an explicit stack of open elements, so
//! input nesting depth never turns into call-stack depth. Character data is
//! buffered and flushed into a single text node whenever markup starts, which
//! also merges text produced by references and (unless CDATA is preserved)
//! CDATA sections with the surrounding text.
//!
//! Entity replacement text containing markup is scanned with the same state
//! machine over a nested [`ParserInput`]; the only recursion is through
//! entity references, which is bounded by the recursion check and the
//! expansion limit.

use std::collections::{HashMap, HashSet};

use crate::encoding::decode_to_utf8;
use crate::error::{ParseError, SourceLocation};
use crate::tree::{Attribute, DocType, Document, NodeId, NodeKind, XmlVersion};
use crate::tree::{XMLNS_NAMESPACE, XML_NAMESPACE};

use super::dtd::{parse_external_id, resolve_base, Declarations, Entity, EntityTable, SubsetEnd};
use super::input::{
    is_qname, looking_at_xml_decl, parse_cdata_content, parse_comment_content, parse_pi_content,
    parse_xml_decl, NamespaceResolver, ParserInput,
};
use super::ParseOptions;

/// An element whose end tag has not been seen yet.
struct OpenElement {
    id: NodeId,
    qname: String,
}

/// The tree-building parser.
pub(crate) struct XmlParser<'o> {
    doc: Document,
    pub(super) options: &'o ParseOptions,
    ns: NamespaceResolver,
    stack: Vec<OpenElement>,
    /// Character data not yet flushed into a text node.
    text: String,
    pub(super) entities: EntityTable,
    pub(super) declarations: Declarations,
    /// `ID` values seen so far, when validating.
    pub(super) ids: HashSet<String>,
    /// `IDREF` values to resolve once the document is complete.
    pub(super) idrefs: Vec<(String, SourceLocation)>,
    /// Entities currently being expanded, innermost last.
    open_entities: Vec<String>,
    /// Replacement text of external entities already fetched.
    loaded: HashMap<String, String>,
    expansions: u32,
}

fn predefined_entity(name: &str) -> Option<char> {
    match name {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "apos" => Some('\''),
        "quot" => Some('"'),
        _ => None,
    }
}

impl<'o> XmlParser<'o> {
    pub fn new(options: &'o ParseOptions) -> Self {
        Self {
            doc: Document::with_options(options.clone()),
            options,
            ns: NamespaceResolver::new(),
            stack: Vec::new(),
            text: String::new(),
            entities: EntityTable::default(),
            declarations: Declarations::default(),
            ids: HashSet::new(),
            idrefs: Vec::new(),
            open_entities: Vec::new(),
            loaded: HashMap::new(),
            expansions: 0,
        }
    }

    /// Parses a complete document.
    pub fn parse(mut self, text: &str) -> Result<Document, ParseError> {
        let mut input = ParserInput::new(text);
        input.set_max_name_length(self.options.max_name_length);

        if looking_at_xml_decl(&input) {
            let decl = parse_xml_decl(&mut input, false)?;
            let version = decl.version.unwrap_or_default();
            self.doc.version = version;
            self.doc.encoding = decl.encoding;
            self.doc.standalone = decl.standalone;
            input.set_version(version);
        }

        self.parse_misc(&mut input)?;
        if input.looking_at(b"<!DOCTYPE") {
            self.parse_doctype(&mut input)?;
            self.parse_misc(&mut input)?;
        }

        if !input.looking_at_start_tag() {
            return Err(input.fatal(if input.at_end() {
                "missing root element"
            } else {
                "expected root element"
            }));
        }
        self.parse_start_tag(&mut input)?;
        while !self.stack.is_empty() {
            self.step(&mut input)?;
        }

        self.parse_misc(&mut input)?;
        if !input.at_end() {
            return Err(input.fatal("content after document element"));
        }
        self.check_idrefs()?;
        Ok(self.doc)
    }

    pub(super) fn document(&self) -> &Document {
        &self.doc
    }

    pub(super) fn doctype(&self) -> Option<&DocType> {
        self.doc.doctype.as_ref()
    }

    /// No element is open yet, so the next start tag is the root.
    pub(super) fn at_root(&self) -> bool {
        self.stack.is_empty()
    }

    fn current_parent(&self) -> NodeId {
        self.stack.last().map_or(self.doc.root(), |open| open.id)
    }

    fn append(&mut self, kind: NodeKind) -> NodeId {
        let parent = self.current_parent();
        let id = self.doc.create_node(kind);
        self.doc.link_child(parent, id);
        id
    }

    fn flush_text(&mut self) {
        if !self.text.is_empty() {
            let content = std::mem::take(&mut self.text);
            self.append(NodeKind::Text { content });
        }
    }

    // --- Prolog and epilog ---

    /// Comments, processing instructions and whitespace outside the root
    /// element. Whitespace here is not content and is dropped.
    fn parse_misc(&mut self, input: &mut ParserInput<'_>) -> Result<(), ParseError> {
        loop {
            input.skip_whitespace();
            if input.looking_at(b"<!--") {
                let content = parse_comment_content(input)?;
                self.append(NodeKind::Comment { content });
            } else if input.looking_at(b"<?") {
                let (target, data) = parse_pi_content(input)?;
                self.append(NodeKind::ProcessingInstruction { target, data });
            } else {
                return Ok(());
            }
        }
    }

    // --- DOCTYPE (XML 1.0 §2.8 [28]) ---

    fn parse_doctype(&mut self, input: &mut ParserInput<'_>) -> Result<(), ParseError> {
        input.expect_str(b"<!DOCTYPE")?;
        input.skip_whitespace_required()?;
        let root = input.parse_name()?;
        input.skip_whitespace();
        let external = parse_external_id(input)?;
        input.skip_whitespace();

        let base = self.options.base_dir.clone();
        if input.peek() == Some(b'[') {
            input.advance(1);
            self.parse_subset(input, SubsetEnd::Bracket, true, &base)?;
            input.expect_byte(b']')?;
            input.skip_whitespace();
        }
        input.expect_byte(b'>')?;

        let (public_id, system_id) = match external {
            Some((public_id, system_id)) => (public_id, Some(system_id)),
            None => (None, None),
        };

        // Declarations in the internal subset take precedence, so the
        // external subset is read after it.
        if let (Some(system_id), Some(_)) = (&system_id, &self.options.entity_loader) {
            match self.load_external(&base, public_id.as_deref(), system_id) {
                Ok(dtd) => {
                    let dtd_base = resolve_base(&base, system_id);
                    let mut sub = ParserInput::new(&dtd);
                    sub.set_version(input.version());
                    self.parse_subset(&mut sub, SubsetEnd::Eof, false, &dtd_base)
                        .map_err(|e| {
                            ParseError::new(
                                format!("in external DTD '{system_id}': {}", e.message),
                                e.location,
                            )
                        })?;
                }
                Err(reason) => {
                    tracing::warn!(system_id = %system_id, %reason, "external DTD not loaded");
                }
            }
        }

        self.doc.doctype = Some(DocType {
            root,
            public_id,
            system_id,
        });
        Ok(())
    }

    // --- Content ---

    /// Consumes one construct of element content.
    fn step(&mut self, input: &mut ParserInput<'_>) -> Result<(), ParseError> {
        match input.peek() {
            None => {
                let open = self.stack.last().map_or("", |open| open.qname.as_str());
                Err(input.fatal(format!(
                    "unexpected end of input: element <{open}> is not closed"
                )))
            }
            Some(b'<') => {
                if input.looking_at(b"</") {
                    self.parse_end_tag(input)
                } else if input.looking_at(b"<!--") {
                    let content = parse_comment_content(input)?;
                    self.flush_text();
                    self.append(NodeKind::Comment { content });
                    Ok(())
                } else if input.looking_at(b"<![CDATA[") {
                    let content = parse_cdata_content(input)?;
                    if self.options.preserve_cdata {
                        self.flush_text();
                        self.append(NodeKind::CData { content });
                    } else {
                        self.text.push_str(&content);
                    }
                    Ok(())
                } else if input.looking_at(b"<?") {
                    let (target, data) = parse_pi_content(input)?;
                    self.flush_text();
                    self.append(NodeKind::ProcessingInstruction { target, data });
                    Ok(())
                } else if input.looking_at(b"<!") {
                    Err(input.fatal("markup declaration not allowed in element content"))
                } else {
                    self.parse_start_tag(input)
                }
            }
            Some(b'&') => self.parse_content_reference(input),
            Some(_) => self.parse_char_data(input),
        }
    }

    /// Character data up to the next `<` or `&` (XML 1.0 §2.4 [14]).
    fn parse_char_data(&mut self, input: &mut ParserInput<'_>) -> Result<(), ParseError> {
        while let Some(b) = input.peek() {
            if b == b'<' || b == b'&' {
                break;
            }
            if b == b']' && input.looking_at(b"]]>") {
                return Err(input.fatal("']]>' not allowed in character data"));
            }
            let ch = input.next_char()?;
            self.text.push(ch);
        }
        if self.text.len() > self.options.max_text_length {
            return Err(input.fatal(format!(
                "text node length exceeds maximum ({})",
                self.options.max_text_length
            )));
        }
        Ok(())
    }

    // --- Start and end tags (XML 1.0 §3.1) ---

    fn parse_start_tag(&mut self, input: &mut ParserInput<'_>) -> Result<(), ParseError> {
        let location = input.location();
        input.expect_byte(b'<')?;
        let qname = input.parse_name()?;
        if !is_qname(&qname) {
            return Err(ParseError::new(
                format!("invalid element name '{qname}'"),
                location,
            ));
        }

        let mut attributes: Vec<Attribute> = Vec::new();
        loop {
            let had_ws = input.skip_whitespace();
            if input.peek() == Some(b'>') || input.looking_at(b"/>") {
                break;
            }
            if !had_ws {
                return Err(input.fatal("whitespace required between attributes"));
            }
            let attr_location = input.location();
            let name = input.parse_name()?;
            if !is_qname(&name) {
                return Err(ParseError::new(
                    format!("invalid attribute name '{name}'"),
                    attr_location,
                ));
            }
            input.skip_whitespace();
            input.expect_byte(b'=')?;
            input.skip_whitespace();
            let value = self.parse_attribute_value(input)?;

            if attributes.iter().any(|a| a.has_name(&name)) {
                return Err(ParseError::new(
                    format!("duplicate attribute: '{name}'"),
                    attr_location,
                ));
            }
            if attributes.len() >= self.options.max_attributes as usize {
                return Err(ParseError::new(
                    format!(
                        "too many attributes on element <{qname}> (maximum {})",
                        self.options.max_attributes
                    ),
                    attr_location,
                ));
            }
            attributes.push(Attribute::new(name, value));
        }

        self.check_element_declared(&qname, location)?;
        self.apply_attribute_declarations(&qname, &mut attributes, location)?;
        self.bind_namespaces(&qname, &attributes, input.version(), location)?;

        self.flush_text();
        let (prefix, name) = crate::tree::QName::split_owned(qname.clone());
        let id = self.append(NodeKind::Element {
            name,
            prefix,
            attributes,
        });

        if input.looking_at(b"/>") {
            input.advance(2);
            self.ns.pop_scope();
            return self.check_content(id, &qname, location);
        }
        input.expect_byte(b'>')?;

        self.stack.push(OpenElement { id, qname });
        if self.stack.len() > self.options.max_depth as usize {
            return Err(ParseError::new(
                format!("maximum nesting depth exceeded ({})", self.options.max_depth),
                location,
            ));
        }
        Ok(())
    }

    /// Opens a namespace scope for a start tag and checks its bindings and
    /// prefixes (Namespaces in XML §3, §5, §6.3).
    fn bind_namespaces(
        &mut self,
        qname: &str,
        attributes: &[Attribute],
        version: XmlVersion,
        location: SourceLocation,
    ) -> Result<(), ParseError> {
        let fail = |message: String| Err(ParseError::new(message, location));
        self.ns.push_scope();

        for attr in attributes {
            let Some(prefix) = attr.declared_prefix() else {
                continue;
            };
            let uri = attr.value.as_str();
            match prefix {
                Some("xmlns") => return fail("the 'xmlns' prefix must not be declared".into()),
                Some("xml") if uri != XML_NAMESPACE => {
                    return fail("the 'xml' prefix must be bound to the XML namespace".into())
                }
                Some(p) if p != "xml" && uri == XML_NAMESPACE => {
                    return fail(format!("prefix '{p}' must not be bound to the XML namespace"))
                }
                Some(p) if uri.is_empty() && version == XmlVersion::V1_0 => {
                    return fail(format!("namespace prefix '{p}' cannot be undeclared"))
                }
                None if uri == XML_NAMESPACE => {
                    return fail("the XML namespace must not be the default namespace".into())
                }
                _ if uri == XMLNS_NAMESPACE => {
                    return fail("the xmlns namespace must not be bound".into())
                }
                _ => {}
            }
            self.ns.bind(prefix.map(str::to_string), attr.value.clone());
        }

        if let Some((prefix, _)) = qname.split_once(':') {
            if prefix == "xmlns" {
                return fail("element names must not use the 'xmlns' prefix".into());
            }
            if self.ns.resolve(Some(prefix)).is_none() {
                return fail(format!("unbound namespace prefix '{prefix}'"));
            }
        }

        let mut expanded: Vec<(&str, &str)> = Vec::new();
        for attr in attributes.iter().filter(|a| !a.is_namespace_decl()) {
            let Some(prefix) = attr.prefix.as_deref() else {
                continue;
            };
            let Some(uri) = self.ns.resolve(Some(prefix)) else {
                return fail(format!("unbound namespace prefix '{prefix}'"));
            };
            if expanded.contains(&(uri, attr.name.as_str())) {
                return fail(format!("duplicate attribute: '{}'", attr.qualified_name()));
            }
            expanded.push((uri, attr.name.as_str()));
        }
        Ok(())
    }

    fn parse_end_tag(&mut self, input: &mut ParserInput<'_>) -> Result<(), ParseError> {
        let location = input.location();
        input.expect_str(b"</")?;
        let name = input.parse_name()?;
        input.skip_whitespace();
        input.expect_byte(b'>')?;

        match self.stack.last() {
            Some(open) if open.qname == name => {}
            Some(open) => {
                return Err(ParseError::new(
                    format!(
                        "mismatched end tag: expected </{}>, found </{name}>",
                        open.qname
                    ),
                    location,
                ))
            }
            None => {
                return Err(ParseError::new(
                    format!("unexpected end tag </{name}>"),
                    location,
                ))
            }
        }
        self.flush_text();
        if let Some(open) = self.stack.pop() {
            self.check_content(open.id, &open.qname, location)?;
        }
        self.ns.pop_scope();
        Ok(())
    }

    // --- Attribute values (XML 1.0 §3.3.3) ---

    pub(super) fn parse_attribute_value(
        &mut self,
        input: &mut ParserInput<'_>,
    ) -> Result<String, ParseError> {
        let quote = input.next_byte()?;
        if quote != b'"' && quote != b'\'' {
            return Err(input.fatal("attribute value must be quoted"));
        }
        let mut value = String::new();
        loop {
            match input.peek() {
                None => return Err(input.fatal("unexpected end of input in attribute value")),
                Some(b) if b == quote => {
                    input.advance(1);
                    break;
                }
                _ => self.attribute_value_char(input, &mut value)?,
            }
            if value.len() > self.options.max_attribute_length {
                return Err(input.fatal(format!(
                    "attribute value length exceeds maximum ({})",
                    self.options.max_attribute_length
                )));
            }
        }
        Ok(value)
    }

    /// Appends one character or reference of an attribute value, applying
    /// whitespace normalization to literal characters.
    fn attribute_value_char(
        &mut self,
        input: &mut ParserInput<'_>,
        out: &mut String,
    ) -> Result<(), ParseError> {
        match input.peek() {
            Some(b'<') => Err(input.fatal("'<' not allowed in attribute values")),
            Some(b'&') => {
                let location = input.location();
                input.advance(1);
                if input.peek() == Some(b'#') {
                    input.advance(1);
                    out.push(input.parse_char_ref()?);
                    return Ok(());
                }
                let name = input.parse_name()?;
                input.expect_byte(b';')?;
                if let Some(c) = predefined_entity(&name) {
                    out.push(c);
                    return Ok(());
                }
                self.count_expansion(location)?;
                match self.entities.general(&name).cloned() {
                    Some(Entity::Internal(text)) => {
                        self.with_entity(name, location, |parser| {
                            let mut sub = ParserInput::new(&text);
                            while !sub.at_end() {
                                parser.attribute_value_char(&mut sub, out)?;
                            }
                            Ok(())
                        })
                    }
                    Some(Entity::External { .. } | Entity::Unparsed) => Err(ParseError::new(
                        format!("external entity reference '&{name};' in attribute value"),
                        location,
                    )),
                    None => Err(ParseError::new(
                        format!("undefined entity '&{name};'"),
                        location,
                    )),
                }
            }
            _ => {
                let c = input.next_char()?;
                out.push(if matches!(c, '\t' | '\n' | '\r') { ' ' } else { c });
                Ok(())
            }
        }
    }

    // --- References in content (XML 1.0 §4.4) ---

    fn parse_content_reference(&mut self, input: &mut ParserInput<'_>) -> Result<(), ParseError> {
        let location = input.location();
        input.advance(1);
        if input.peek() == Some(b'#') {
            input.advance(1);
            let c = input.parse_char_ref()?;
            self.text.push(c);
            return Ok(());
        }
        let name = input.parse_name()?;
        input.expect_byte(b';')?;
        if let Some(c) = predefined_entity(&name) {
            self.text.push(c);
            return Ok(());
        }

        self.count_expansion(location)?;
        let replacement = self.general_entity_text(&name, location)?;
        tracing::trace!(entity = %name, len = replacement.len(), "expanding entity");

        if !replacement.contains(['<', '&']) {
            self.text.push_str(&replacement);
            return Ok(());
        }
        let version = input.version();
        self.with_entity(name, location, |parser| {
            let depth = parser.stack.len();
            let mut sub = ParserInput::new(&replacement);
            sub.set_version(version);
            sub.set_max_name_length(parser.options.max_name_length);
            while !sub.at_end() {
                if sub.looking_at(b"</") && parser.stack.len() == depth {
                    return Err(sub.fatal("end tag without a start tag in entity replacement text"));
                }
                parser.step(&mut sub)?;
            }
            match parser.stack.get(depth) {
                Some(open) => Err(sub.fatal(format!(
                    "element <{}> is not closed in entity replacement text",
                    open.qname
                ))),
                None => Ok(()),
            }
        })
    }

    /// Returns the replacement text of a general entity, fetching external
    /// entities through the loader.
    fn general_entity_text(
        &mut self,
        name: &str,
        location: SourceLocation,
    ) -> Result<String, ParseError> {
        match self.entities.general(name).cloned() {
            Some(Entity::Internal(text)) => Ok(text),
            Some(Entity::External {
                public_id,
                system_id,
                base,
            }) => {
                if let Some(text) = self.loaded.get(name) {
                    return Ok(text.clone());
                }
                let text = self
                    .load_external(&base, public_id.as_deref(), &system_id)
                    .map_err(|reason| {
                        ParseError::new(
                            format!("unresolved external entity '&{name};': {reason}"),
                            location,
                        )
                    })?;
                self.loaded.insert(name.to_string(), text.clone());
                Ok(text)
            }
            Some(Entity::Unparsed) => Err(ParseError::new(
                format!("reference to unparsed entity '&{name};'"),
                location,
            )),
            None => Err(ParseError::new(
                format!("undefined entity '&{name};'"),
                location,
            )),
        }
    }

    // --- Entity bookkeeping ---

    pub(super) fn count_expansion(&mut self, location: SourceLocation) -> Result<(), ParseError> {
        self.expansions += 1;
        if self.expansions > self.options.max_entity_expansions {
            return Err(ParseError::new(
                format!(
                    "entity expansion limit exceeded ({})",
                    self.options.max_entity_expansions
                ),
                location,
            ));
        }
        Ok(())
    }

    /// Runs `f` with `name` marked as being expanded. Errors inside the
    /// replacement text are reported at the reference.
    pub(super) fn with_entity<T>(
        &mut self,
        name: String,
        location: SourceLocation,
        f: impl FnOnce(&mut Self) -> Result<T, ParseError>,
    ) -> Result<T, ParseError> {
        if self.open_entities.contains(&name) {
            return Err(ParseError::new(
                format!("recursive entity reference '{name}'"),
                location,
            ));
        }
        self.open_entities.push(name);
        let result = f(self);
        self.open_entities.pop();
        result.map_err(|e| ParseError::new(e.message, location))
    }

    /// Fetches an external entity or DTD through the loader and strips its
    /// text declaration. The error is a reason suitable for a message.
    pub(super) fn load_external(
        &mut self,
        base: &str,
        public_id: Option<&str>,
        system_id: &str,
    ) -> Result<String, String> {
        let Some(loader) = self.options.entity_loader.as_ref() else {
            return Err("no entity loader configured".to_string());
        };
        tracing::trace!(base, public_id = public_id.unwrap_or(""), system_id, "calling entity loader");
        let bytes = loader(base, public_id.unwrap_or(""), system_id).map_err(|e| e.to_string())?;
        let text = decode_to_utf8(&bytes).map_err(|e| e.to_string())?;

        let mut input = ParserInput::new(&text);
        if looking_at_xml_decl(&input) {
            parse_xml_decl(&mut input, true).map_err(|e| e.message)?;
        }
        Ok(text[input.pos()..].to_string())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn parse(text: &str) -> Result<Document, ParseError> {
        XmlParser::new(&ParseOptions::default()).parse(text)
    }

    #[test]
    fn test_minimal_document() {
        let doc = parse("<root/>").unwrap();
        let root = doc.root_element().unwrap();
        assert_eq!(doc.local_name(root), Some("root"));
        assert_eq!(doc.children(doc.root()).count(), 1);
    }

    #[test]
    fn test_text_is_merged_across_references() {
        let doc = parse("<a>x &amp; y&#33;<![CDATA[<z>]]></a>").unwrap();
        let a = doc.root_element().unwrap();
        assert_eq!(doc.children(a).count(), 1);
        assert_eq!(doc.content(a), "x & y!<z>");
    }

    #[test]
    fn test_cdata_preserved_on_request() {
        let options = ParseOptions::default().preserve_cdata(true);
        let doc = XmlParser::new(&options)
            .parse("<a>x<![CDATA[<z>]]></a>")
            .unwrap();
        let a = doc.root_element().unwrap();
        let kinds: Vec<&str> = doc.children(a).map(|c| doc.kind(c).type_name()).collect();
        assert_eq!(kinds, vec!["text", "cdata"]);
    }

    #[test]
    fn test_whitespace_between_elements_is_kept() {
        let doc = parse("<a>\n  <b/>\n</a>").unwrap();
        let a = doc.root_element().unwrap();
        assert_eq!(doc.children(a).count(), 3);
    }

    #[test]
    fn test_prolog_and_epilog_nodes() {
        let doc = parse("<?xml version=\"1.0\"?>\n<!-- c -->\n<?pi x?><r/>\n<!-- end -->").unwrap();
        let kinds: Vec<&str> = doc
            .children(doc.root())
            .map(|c| doc.kind(c).type_name())
            .collect();
        assert_eq!(
            kinds,
            vec!["comment", "processing-instruction", "element", "comment"]
        );
    }

    #[test]
    fn test_mismatched_end_tag() {
        let err = parse("<a><b></a>").unwrap_err();
        assert_eq!(err.message, "mismatched end tag: expected </b>, found </a>");
        assert_eq!(err.location.line, 1);
        assert_eq!(err.location.column, 7);
    }

    #[test]
    fn test_unterminated_start_tag() {
        assert!(parse("<a attr=\"v\"").is_err());
        assert!(parse("<a attr=\"v").is_err());
        let err = parse("<a><b>").unwrap_err();
        assert!(err.message.contains("<b> is not closed"));
    }

    #[test]
    fn test_duplicate_attribute() {
        let err = parse(r#"<a x="1" x="2"/>"#).unwrap_err();
        assert_eq!(err.message, "duplicate attribute: 'x'");
        let err = parse(r#"<a xmlns:p="u" xmlns:q="u" p:x="1" q:x="2"/>"#).unwrap_err();
        assert_eq!(err.message, "duplicate attribute: 'q:x'");
    }

    #[test]
    fn test_unbound_prefix() {
        let err = parse("<p:a/>").unwrap_err();
        assert_eq!(err.message, "unbound namespace prefix 'p'");
        assert!(parse(r#"<a p:x="1"/>"#).is_err());
        assert!(parse(r#"<a xml:lang="en"/>"#).is_ok());
    }

    #[test]
    fn test_depth_limit_is_an_error() {
        let options = ParseOptions::default().max_depth(3);
        let err = XmlParser::new(&options)
            .parse("<a><b><c><d/></c></b></a>")
            .unwrap_err();
        assert_eq!(err.message, "maximum nesting depth exceeded (3)");
    }

    #[test]
    fn test_deep_nesting_does_not_recurse() {
        let depth = 20_000;
        let text = format!("{}{}", "<a>".repeat(depth), "</a>".repeat(depth));
        let options = ParseOptions::default().max_depth(depth as u32);
        let doc = XmlParser::new(&options).parse(&text).unwrap();
        assert_eq!(doc.descendants(doc.root()).count(), depth);
    }

    #[test]
    fn test_internal_entities() {
        let doc = parse(
            "<!DOCTYPE r [<!ENTITY who \"world\"><!ENTITY greet \"hello &who;\">]><r>&greet;!</r>",
        )
        .unwrap();
        let r = doc.root_element().unwrap();
        assert_eq!(doc.content(r), "hello world!");
        assert_eq!(doc.doctype.as_ref().unwrap().root, "r");
    }

    #[test]
    fn test_entity_with_markup() {
        let doc = parse("<!DOCTYPE r [<!ENTITY b \"<b>bold</b>\">]><r>a&b;c</r>").unwrap();
        let r = doc.root_element().unwrap();
        let kinds: Vec<&str> = doc.children(r).map(|c| doc.kind(c).type_name()).collect();
        assert_eq!(kinds, vec!["text", "element", "text"]);
        assert_eq!(doc.text_content(r), "aboldc");
    }

    #[test]
    fn test_entity_must_balance_tags() {
        let err = parse("<!DOCTYPE r [<!ENTITY b \"<b>\">]><r>&b;</b></r>").unwrap_err();
        assert!(err.message.contains("not closed in entity"));
    }

    #[test]
    fn test_entity_in_attribute() {
        let doc = parse("<!DOCTYPE r [<!ENTITY e \"a&#9;b\">]><r x=\"&e;\" y=\"a&#9;b\"/>").unwrap();
        let r = doc.root_element().unwrap();
        assert_eq!(doc.get_attribute(r, "x"), Some("a b"));
        assert_eq!(doc.get_attribute(r, "y"), Some("a\tb"));
    }

    #[test]
    fn test_recursive_entity() {
        let err = parse("<!DOCTYPE r [<!ENTITY a \"&b;\"><!ENTITY b \"&a;\">]><r>&a;</r>").unwrap_err();
        assert!(err.message.starts_with("recursive entity reference"));
    }

    #[test]
    fn test_undefined_entity() {
        let err = parse("<r>&nope;</r>").unwrap_err();
        assert_eq!(err.message, "undefined entity '&nope;'");
    }

    #[test]
    fn test_external_entity_without_loader() {
        let err = parse("<!DOCTYPE r [<!ENTITY x SYSTEM \"x.xml\">]><r>&x;</r>").unwrap_err();
        assert!(err.message.starts_with("unresolved external entity '&x;'"));
    }

    #[test]
    fn test_external_entity_with_loader() {
        let options = ParseOptions::default().entity_loader(|base, pubid, sysid| {
            assert_eq!((base, pubid, sysid), ("", "", "x.xml"));
            Ok(b"<?xml encoding=\"UTF-8\"?><i>inside</i>".to_vec())
        });
        let doc = XmlParser::new(&options)
            .parse("<!DOCTYPE r [<!ENTITY x SYSTEM \"x.xml\">]><r>&x;</r>")
            .unwrap();
        let r = doc.root_element().unwrap();
        assert_eq!(doc.text_content(r), "inside");
    }

    #[test]
    fn test_external_dtd_declares_entities() {
        let options = ParseOptions::default().entity_loader(|_, pubid, sysid| {
            assert_eq!((pubid, sysid), ("-//T//X", "t.dtd"));
            Ok(b"<!ENTITY % p \"<!ENTITY e 'from dtd'>\"> %p; <!ELEMENT r ANY>".to_vec())
        });
        let doc = XmlParser::new(&options)
            .parse("<!DOCTYPE r PUBLIC \"-//T//X\" \"t.dtd\"><r>&e;</r>")
            .unwrap();
        let r = doc.root_element().unwrap();
        assert_eq!(doc.content(r), "from dtd");
        assert_eq!(
            doc.doctype.as_ref().unwrap().public_id.as_deref(),
            Some("-//T//X")
        );
    }

    #[test]
    fn test_billion_laughs_is_stopped() {
        let mut dtd = String::from("<!ENTITY l0 \"ha\">");
        for i in 1..10 {
            let prev = format!("&l{};", i - 1);
            dtd.push_str(&format!("<!ENTITY l{i} \"{}\">", prev.repeat(10)));
        }
        let text = format!("<!DOCTYPE r [{dtd}]><r>&l9;</r>");
        let err = parse(&text).unwrap_err();
        assert!(err.message.starts_with("entity expansion limit exceeded"));
    }

    #[test]
    fn test_invalid_characters() {
        assert!(parse("<a>\u{1}</a>").is_err());
        assert!(parse("<a>&#0;</a>").is_err());
        assert!(parse("<a>]]></a>").is_err());
        assert!(parse("<?xml version=\"1.1\"?><a>&#1;</a>").is_ok());
    }

    #[test]
    fn test_trailing_content() {
        let err = parse("<a/><b/>").unwrap_err();
        assert_eq!(err.message, "content after document element");
        assert_eq!(parse("").unwrap_err().message, "missing root element");
    }
}
