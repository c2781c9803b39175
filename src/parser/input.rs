//! Low-level input handling shared by the document and DTD scanners.
//!
//! [`ParserInput`] wraps one source text (the document itself, an entity's
//! replacement text or an external DTD), tracks line, column and byte offset,
//! and provides the lexical primitives: peeking, advancing, names, quoted
//! literals, character references and the small self-contained constructs
//! (comments, CDATA sections, processing instructions, the XML declaration).

use crate::chars::{
    is_name_char, is_name_start_char, is_valid_xml_1_0_char, is_valid_xml_1_1_char,
};
use crate::error::{ParseError, SourceLocation};
use crate::tree::{XmlVersion, XML_NAMESPACE};

// -------------------------------------------------------------------------
// Security defaults
// -------------------------------------------------------------------------

/// Default maximum element nesting depth.
pub(crate) const DEFAULT_MAX_DEPTH: u32 = 256;

/// Default maximum number of attributes on a single element.
pub(crate) const DEFAULT_MAX_ATTRIBUTES: u32 = 256;

/// Default maximum length (in bytes) of an attribute value.
pub(crate) const DEFAULT_MAX_ATTRIBUTE_LENGTH: usize = 10 * 1024 * 1024; // 10 MB

/// Default maximum length (in bytes) of a text node.
pub(crate) const DEFAULT_MAX_TEXT_LENGTH: usize = 10 * 1024 * 1024; // 10 MB

/// Default maximum length (in bytes) of an element or attribute name.
pub(crate) const DEFAULT_MAX_NAME_LENGTH: usize = 50_000;

/// Default maximum number of entity expansions per document.
pub(crate) const DEFAULT_MAX_ENTITY_EXPANSIONS: u32 = 10_000;

/// Checks the `QName` shape required by Namespaces in XML: at most one
/// colon, and neither side of it empty.
pub(crate) fn is_qname(name: &str) -> bool {
    match name.split_once(':') {
        Some((prefix, local)) => !prefix.is_empty() && !local.is_empty() && !local.contains(':'),
        None => true,
    }
}

// -------------------------------------------------------------------------
// ParserInput
// -------------------------------------------------------------------------

/// Cursor over one source text.
pub(crate) struct ParserInput<'a> {
    input: &'a [u8],
    pos: usize,
    line: u32,
    column: u32,
    /// Selects the literal-character table and the line-end rules.
    version: XmlVersion,
    max_name_length: usize,
}

impl<'a> ParserInput<'a> {
    /// Creates a cursor at the start of `input`.
    pub fn new(input: &'a str) -> Self {
        Self {
            input: input.as_bytes(),
            pos: 0,
            line: 1,
            column: 1,
            version: XmlVersion::V1_0,
            max_name_length: DEFAULT_MAX_NAME_LENGTH,
        }
    }

    pub fn set_version(&mut self, version: XmlVersion) {
        self.version = version;
    }

    pub fn version(&self) -> XmlVersion {
        self.version
    }

    pub fn set_max_name_length(&mut self, max: usize) {
        self.max_name_length = max;
    }

    // -- Position queries --

    pub fn location(&self) -> SourceLocation {
        SourceLocation {
            line: self.line,
            column: self.column,
            byte_offset: self.pos,
        }
    }

    pub fn at_end(&self) -> bool {
        self.pos >= self.input.len()
    }

    pub fn pos(&self) -> usize {
        self.pos
    }

    /// Returns the source text between two byte offsets.
    pub fn slice_str(&self, start: usize, end: usize) -> &'a str {
        std::str::from_utf8(&self.input[start..end]).unwrap_or_default()
    }

    // -- Peek operations --

    pub fn peek(&self) -> Option<u8> {
        self.input.get(self.pos).copied()
    }

    pub fn peek_at(&self, offset: usize) -> Option<u8> {
        self.input.get(self.pos + offset).copied()
    }

    pub fn peek_char(&self) -> Option<char> {
        self.char_at(self.pos)
    }

    fn char_at(&self, pos: usize) -> Option<char> {
        let rest = self.input.get(pos..)?;
        let len = match *rest.first()? {
            b if b < 0x80 => 1,
            b if b >= 0xF0 => 4,
            b if b >= 0xE0 => 3,
            _ => 2,
        };
        std::str::from_utf8(rest.get(..len)?)
            .ok()
            .and_then(|s| s.chars().next())
    }

    // -- Advance operations --

    /// Advances over `count` ASCII bytes.
    pub fn advance(&mut self, count: usize) {
        for _ in 0..count {
            if let Some(&b) = self.input.get(self.pos) {
                if b == b'\n' {
                    self.line += 1;
                    self.column = 1;
                } else if b & 0xC0 != 0x80 {
                    self.column += 1;
                }
                self.pos += 1;
            }
        }
    }

    pub fn advance_char(&mut self, ch: char) {
        if ch == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        self.pos += ch.len_utf8();
    }

    pub fn next_byte(&mut self) -> Result<u8, ParseError> {
        let b = self
            .peek()
            .ok_or_else(|| self.fatal("unexpected end of input"))?;
        self.advance(1);
        Ok(b)
    }

    /// Consumes the next character, normalizing line ends (XML 1.0 §2.11,
    /// plus NEL and LINE SEPARATOR for XML 1.1) and rejecting characters
    /// that may not appear literally.
    pub fn next_char(&mut self) -> Result<char, ParseError> {
        let ch = self
            .peek_char()
            .ok_or_else(|| self.fatal("unexpected end of input"))?;
        self.advance_char(ch);
        match ch {
            '\r' => {
                if self.peek() == Some(b'\n') {
                    self.advance(1);
                } else if self.version == XmlVersion::V1_1 && self.peek_char() == Some('\u{85}') {
                    self.advance_char('\u{85}');
                }
                Ok('\n')
            }
            '\u{85}' | '\u{2028}' if self.version == XmlVersion::V1_1 => Ok('\n'),
            _ if self.is_literal_char(ch) => Ok(ch),
            _ => Err(self.fatal(format!("invalid character U+{:04X}", ch as u32))),
        }
    }

    fn is_literal_char(&self, ch: char) -> bool {
        match self.version {
            XmlVersion::V1_0 => is_valid_xml_1_0_char(ch as u32),
            XmlVersion::V1_1 => is_valid_xml_1_1_char(ch as u32),
        }
    }

    // -- Expect operations --

    pub fn expect_byte(&mut self, expected: u8) -> Result<(), ParseError> {
        match self.peek() {
            Some(b) if b == expected => {
                self.advance(1);
                Ok(())
            }
            Some(_) => {
                let found = self.peek_char().unwrap_or('?');
                Err(self.fatal(format!(
                    "expected '{}', found '{found}'",
                    expected as char
                )))
            }
            None => Err(self.fatal(format!(
                "expected '{}', found end of input",
                expected as char
            ))),
        }
    }

    pub fn expect_str(&mut self, expected: &[u8]) -> Result<(), ParseError> {
        for &b in expected {
            self.expect_byte(b)?;
        }
        Ok(())
    }

    // -- Lookahead --

    pub fn looking_at(&self, s: &[u8]) -> bool {
        self.input[self.pos..].starts_with(s)
    }

    /// Returns `true` if the input continues with `<` followed by a name
    /// start character, i.e. a start tag.
    pub fn looking_at_start_tag(&self) -> bool {
        if self.peek() != Some(b'<') {
            return false;
        }
        self.char_at(self.pos + 1)
            .is_some_and(|c| is_name_start_char(c as u32))
    }

    // -- Whitespace --

    /// Skips whitespace characters. Returns `true` if any were consumed.
    pub fn skip_whitespace(&mut self) -> bool {
        let start = self.pos;
        while let Some(b' ' | b'\t' | b'\r' | b'\n') = self.peek() {
            self.advance(1);
        }
        self.pos > start
    }

    pub fn skip_whitespace_required(&mut self) -> Result<(), ParseError> {
        if !self.skip_whitespace() {
            return Err(self.fatal("whitespace required"));
        }
        Ok(())
    }

    /// Consumes ASCII bytes while `pred` holds.
    pub fn take_while(&mut self, pred: impl Fn(u8) -> bool) -> &'a str {
        let start = self.pos;
        while let Some(b) = self.peek() {
            if !b.is_ascii() || !pred(b) {
                break;
            }
            self.advance(1);
        }
        self.slice_str(start, self.pos)
    }

    // -- Names (XML 1.0 §2.3) --

    pub fn parse_name(&mut self) -> Result<String, ParseError> {
        let start = self.pos;
        let first = self
            .peek_char()
            .ok_or_else(|| self.fatal("expected name, found end of input"))?;
        if !is_name_start_char(first as u32) {
            return Err(self.fatal(format!("invalid name start character '{first}'")));
        }
        self.advance_char(first);

        while let Some(ch) = self.peek_char() {
            if !is_name_char(ch as u32) {
                break;
            }
            self.advance_char(ch);
        }

        let len = self.pos - start;
        if len > self.max_name_length {
            return Err(self.fatal(format!(
                "name length ({len}) exceeds maximum ({})",
                self.max_name_length
            )));
        }
        Ok(self.slice_str(start, self.pos).to_string())
    }

    // -- References (XML 1.0 §4.1) --

    /// Parses the remainder of a character reference. The `&#` has already
    /// been consumed.
    pub fn parse_char_ref(&mut self) -> Result<char, ParseError> {
        let value = if self.peek() == Some(b'x') {
            self.advance(1);
            let hex = self.take_while(|b| b.is_ascii_hexdigit());
            u32::from_str_radix(hex, 16)
                .map_err(|_| self.fatal("invalid hexadecimal character reference"))?
        } else {
            let dec = self.take_while(|b| b.is_ascii_digit());
            dec.parse::<u32>()
                .map_err(|_| self.fatal("invalid decimal character reference"))?
        };
        self.expect_byte(b';')?;

        let allowed = match self.version {
            XmlVersion::V1_0 => is_valid_xml_1_0_char(value),
            XmlVersion::V1_1 => {
                matches!(value, 0x1..=0xD7FF | 0xE000..=0xFFFD | 0x1_0000..=0x10_FFFF)
            }
        };
        char::from_u32(value).filter(|_| allowed).ok_or_else(|| {
            self.fatal(format!(
                "character reference &#x{value:X}; is not a valid XML character"
            ))
        })
    }

    // -- Literals --

    /// Parses a quoted literal without any reference handling.
    pub fn parse_quoted_value(&mut self) -> Result<String, ParseError> {
        let quote = self.next_byte()?;
        if quote != b'"' && quote != b'\'' {
            return Err(self.fatal("expected quoted value"));
        }
        let mut value = String::new();
        loop {
            match self.peek() {
                None => return Err(self.fatal("unexpected end of input in quoted value")),
                Some(b) if b == quote => {
                    self.advance(1);
                    return Ok(value);
                }
                Some(_) => value.push(self.next_char()?),
            }
        }
    }

    // -- Errors --

    pub fn fatal(&self, message: impl Into<String>) -> ParseError {
        ParseError::new(message, self.location())
    }
}

// -------------------------------------------------------------------------
// Namespace resolver
// -------------------------------------------------------------------------

/// Namespace scopes mirroring the open elements.
///
/// Each frame holds the `xmlns` declarations of one element; resolution
/// walks the frames from innermost to outermost.
pub(crate) struct NamespaceResolver {
    stack: Vec<Vec<(Option<String>, String)>>,
}

impl NamespaceResolver {
    /// Creates a resolver with the `xml` prefix pre-bound.
    pub fn new() -> Self {
        Self {
            stack: vec![vec![(Some("xml".to_string()), XML_NAMESPACE.to_string())]],
        }
    }

    pub fn push_scope(&mut self) {
        self.stack.push(Vec::new());
    }

    pub fn pop_scope(&mut self) {
        if self.stack.len() > 1 {
            self.stack.pop();
        }
    }

    /// Binds a prefix (`None` for the default namespace) in the innermost scope.
    pub fn bind(&mut self, prefix: Option<String>, uri: String) {
        if let Some(frame) = self.stack.last_mut() {
            frame.push((prefix, uri));
        }
    }

    /// Resolves a prefix. An empty binding (`xmlns=""`) resolves to `None`.
    pub fn resolve(&self, prefix: Option<&str>) -> Option<&str> {
        self.stack
            .iter()
            .rev()
            .flat_map(|frame| frame.iter().rev())
            .find(|(p, _)| p.as_deref() == prefix)
            .and_then(|(_, uri)| (!uri.is_empty()).then_some(uri.as_str()))
    }
}

// -------------------------------------------------------------------------
// Self-contained constructs
// -------------------------------------------------------------------------

/// Parses a comment (`<!-- ... -->`) and returns its text. The opening
/// `<!--` has not been consumed yet.
pub(crate) fn parse_comment_content(input: &mut ParserInput<'_>) -> Result<String, ParseError> {
    input.expect_str(b"<!--")?;
    let mut content = String::new();
    loop {
        if input.at_end() {
            return Err(input.fatal("unexpected end of input in comment"));
        }
        if input.looking_at(b"-->") {
            input.advance(3);
            return Ok(content);
        }
        if input.looking_at(b"--") {
            return Err(input.fatal("'--' not allowed inside comments"));
        }
        content.push(input.next_char()?);
    }
}

/// Parses a CDATA section and returns its content. The opening
/// `<![CDATA[` has not been consumed yet.
pub(crate) fn parse_cdata_content(input: &mut ParserInput<'_>) -> Result<String, ParseError> {
    input.expect_str(b"<![CDATA[")?;
    let mut content = String::new();
    loop {
        if input.at_end() {
            return Err(input.fatal("unexpected end of input in CDATA section"));
        }
        if input.looking_at(b"]]>") {
            input.advance(3);
            return Ok(content);
        }
        content.push(input.next_char()?);
    }
}

/// Parses a processing instruction and returns `(target, data)`. The
/// opening `<?` has not been consumed yet.
pub(crate) fn parse_pi_content(
    input: &mut ParserInput<'_>,
) -> Result<(String, Option<String>), ParseError> {
    input.expect_str(b"<?")?;
    let target = input.parse_name()?;
    if target.eq_ignore_ascii_case("xml") {
        return Err(input.fatal("processing instruction target 'xml' is reserved"));
    }
    if target.contains(':') {
        return Err(input.fatal("processing instruction target must not contain a colon"));
    }

    if !input.skip_whitespace() {
        input.expect_str(b"?>")?;
        return Ok((target, None));
    }
    let mut data = String::new();
    loop {
        if input.at_end() {
            return Err(input.fatal("unexpected end of input in processing instruction"));
        }
        if input.looking_at(b"?>") {
            input.advance(2);
            break;
        }
        data.push(input.next_char()?);
    }
    Ok((target, (!data.is_empty()).then_some(data)))
}

/// The pseudo-attributes of an XML or text declaration.
#[derive(Debug, Clone, Default)]
pub(crate) struct XmlDeclaration {
    pub version: Option<XmlVersion>,
    pub encoding: Option<String>,
    pub standalone: Option<bool>,
}

/// Returns `true` at `<?xml` followed by whitespace.
pub(crate) fn looking_at_xml_decl(input: &ParserInput<'_>) -> bool {
    input.looking_at(b"<?xml")
        && matches!(input.peek_at(5), Some(b' ' | b'\t' | b'\r' | b'\n'))
}

/// Parses an XML declaration (XML 1.0 §2.8 `[23]`) or, with
/// `text_decl`, the text declaration of an external entity (§4.3.1), where
/// `version` is optional and `encoding` required.
pub(crate) fn parse_xml_decl(
    input: &mut ParserInput<'_>,
    text_decl: bool,
) -> Result<XmlDeclaration, ParseError> {
    input.expect_str(b"<?xml")?;
    let mut decl = XmlDeclaration::default();
    let mut seen_any = false;

    loop {
        let had_ws = input.skip_whitespace();
        if input.looking_at(b"?>") {
            input.advance(2);
            break;
        }
        if !had_ws {
            return Err(input.fatal("whitespace required in XML declaration"));
        }
        let name = input.take_while(|b| b.is_ascii_alphabetic());
        input.skip_whitespace();
        input.expect_byte(b'=')?;
        input.skip_whitespace();
        let value = input.parse_quoted_value()?;

        match name {
            "version" if !seen_any => {
                decl.version = Some(match value.as_str() {
                    "1.0" => XmlVersion::V1_0,
                    "1.1" => XmlVersion::V1_1,
                    v if is_valid_version_num(v) => XmlVersion::V1_0,
                    _ => return Err(input.fatal(format!("invalid version number: '{value}'"))),
                });
            }
            "encoding" if decl.encoding.is_none() && decl.standalone.is_none() => {
                if !is_valid_encoding_name(&value) {
                    return Err(input.fatal(format!("invalid encoding name: '{value}'")));
                }
                decl.encoding = Some(value);
            }
            "standalone" if !text_decl && decl.standalone.is_none() => {
                decl.standalone = Some(match value.as_str() {
                    "yes" => true,
                    "no" => false,
                    _ => return Err(input.fatal("standalone must be 'yes' or 'no'")),
                });
            }
            _ => return Err(input.fatal(format!("unexpected '{name}' in XML declaration"))),
        }
        seen_any = true;
    }

    if !text_decl && decl.version.is_none() {
        return Err(input.fatal("XML declaration requires a version"));
    }
    if text_decl && decl.encoding.is_none() {
        return Err(input.fatal("text declaration requires an encoding"));
    }
    Ok(decl)
}

/// `VersionNum ::= '1.' [0-9]+`
fn is_valid_version_num(s: &str) -> bool {
    s.strip_prefix("1.")
        .is_some_and(|rest| !rest.is_empty() && rest.bytes().all(|b| b.is_ascii_digit()))
}

/// `EncName ::= [A-Za-z] ([A-Za-z0-9._] | '-')*`
fn is_valid_encoding_name(s: &str) -> bool {
    let mut bytes = s.bytes();
    bytes.next().is_some_and(|b| b.is_ascii_alphabetic())
        && bytes.all(|b| b.is_ascii_alphanumeric() || matches!(b, b'.' | b'_' | b'-'))
}
