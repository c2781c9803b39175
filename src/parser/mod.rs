//! XML 1.0/1.1 parser.
//!
//! A hand-rolled scanner that builds a [`Document`] directly. Element
//! nesting is kept on an explicit stack so deeply nested input cannot
//! overflow the call stack; the nesting limit is an ordinary parse error.
//!
//! Internal and external general entities are expanded in place. The DTD
//! supplies entities and attribute defaults; with
//! [`ParseOptions::validate`] it is also enforced.

mod dtd;
pub(crate) mod input;
mod validate;
mod xml;

use std::io;
use std::sync::Arc;

use crate::encoding::decode_to_utf8;
use crate::error::{ParseError, SourceLocation};
use crate::tree::Document;

use input::{
    DEFAULT_MAX_ATTRIBUTES, DEFAULT_MAX_ATTRIBUTE_LENGTH, DEFAULT_MAX_DEPTH,
    DEFAULT_MAX_ENTITY_EXPANSIONS, DEFAULT_MAX_NAME_LENGTH, DEFAULT_MAX_TEXT_LENGTH,
};

/// A callback that fetches external entities and DTDs.
///
/// Called with `(base, public_id, system_id)`: `base` is the directory the
/// referencing entity was loaded from (the configured base directory at top
/// level), `public_id` is empty when the declaration has none. Returns the
/// raw bytes, which are decoded like a document.
///
/// # Security
///
/// Loading external entities lets a document read whatever the loader can
/// reach. Only install a loader for trusted input, or restrict what it
/// fetches.
pub type EntityLoader = Arc<dyn Fn(&str, &str, &str) -> io::Result<Vec<u8>> + Send + Sync>;

/// Parse options controlling parser behavior and security limits.
///
/// ```
/// use quillxml::parser::ParseOptions;
///
/// let opts = ParseOptions::default()
///     .preserve_cdata(true)
///     .max_depth(128);
/// ```
pub struct ParseOptions {
    /// Keep CDATA sections as their own nodes instead of merging them into
    /// the surrounding text.
    pub preserve_cdata: bool,
    /// Directory passed to the entity loader as the base of top-level
    /// references.
    pub base_dir: String,
    /// Check the document against its DTD: declared elements and
    /// attributes, content models, required and fixed attributes, attribute
    /// types and ID references. The first violation fails the parse.
    pub validate: bool,

    // -- Security limits --
    /// Maximum element nesting depth (default: 256).
    pub max_depth: u32,
    /// Maximum number of attributes on a single element (default: 256).
    pub max_attributes: u32,
    /// Maximum length in bytes of a single attribute value (default: 10 MB).
    pub max_attribute_length: usize,
    /// Maximum length in bytes of a single text node (default: 10 MB).
    pub max_text_length: usize,
    /// Maximum length in bytes of an element or attribute name (default: 50,000).
    pub max_name_length: usize,
    /// Maximum number of entity reference expansions per document (default: 10,000).
    pub max_entity_expansions: u32,
    /// Loader for external entities and the external DTD subset.
    ///
    /// Without one, references to external entities are errors and the
    /// external subset is not read.
    pub entity_loader: Option<EntityLoader>,
}

impl Clone for ParseOptions {
    fn clone(&self) -> Self {
        Self {
            preserve_cdata: self.preserve_cdata,
            base_dir: self.base_dir.clone(),
            validate: self.validate,
            max_depth: self.max_depth,
            max_attributes: self.max_attributes,
            max_attribute_length: self.max_attribute_length,
            max_text_length: self.max_text_length,
            max_name_length: self.max_name_length,
            max_entity_expansions: self.max_entity_expansions,
            entity_loader: self.entity_loader.clone(),
        }
    }
}

impl std::fmt::Debug for ParseOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParseOptions")
            .field("preserve_cdata", &self.preserve_cdata)
            .field("base_dir", &self.base_dir)
            .field("validate", &self.validate)
            .field("max_depth", &self.max_depth)
            .field("max_attributes", &self.max_attributes)
            .field("max_attribute_length", &self.max_attribute_length)
            .field("max_text_length", &self.max_text_length)
            .field("max_name_length", &self.max_name_length)
            .field("max_entity_expansions", &self.max_entity_expansions)
            .field("entity_loader", &self.entity_loader.as_ref().map(|_| "..."))
            .finish()
    }
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            preserve_cdata: false,
            base_dir: String::new(),
            validate: false,
            max_depth: DEFAULT_MAX_DEPTH,
            max_attributes: DEFAULT_MAX_ATTRIBUTES,
            max_attribute_length: DEFAULT_MAX_ATTRIBUTE_LENGTH,
            max_text_length: DEFAULT_MAX_TEXT_LENGTH,
            max_name_length: DEFAULT_MAX_NAME_LENGTH,
            max_entity_expansions: DEFAULT_MAX_ENTITY_EXPANSIONS,
            entity_loader: None,
        }
    }
}

impl ParseOptions {
    /// Keeps CDATA sections as separate nodes.
    #[must_use]
    pub fn preserve_cdata(mut self, yes: bool) -> Self {
        self.preserve_cdata = yes;
        self
    }

    /// Sets the base directory handed to the entity loader.
    #[must_use]
    pub fn base_dir(mut self, dir: impl Into<String>) -> Self {
        self.base_dir = dir.into();
        self
    }

    /// Validates the document against its DTD.
    #[must_use]
    pub fn validate(mut self, yes: bool) -> Self {
        self.validate = yes;
        self
    }

    /// Sets the maximum element nesting depth.
    #[must_use]
    pub fn max_depth(mut self, max: u32) -> Self {
        self.max_depth = max;
        self
    }

    /// Sets the maximum number of attributes per element.
    #[must_use]
    pub fn max_attributes(mut self, max: u32) -> Self {
        self.max_attributes = max;
        self
    }

    /// Sets the maximum attribute value length in bytes.
    #[must_use]
    pub fn max_attribute_length(mut self, max: usize) -> Self {
        self.max_attribute_length = max;
        self
    }

    /// Sets the maximum text node length in bytes.
    #[must_use]
    pub fn max_text_length(mut self, max: usize) -> Self {
        self.max_text_length = max;
        self
    }

    /// Sets the maximum element/attribute name length in bytes.
    #[must_use]
    pub fn max_name_length(mut self, max: usize) -> Self {
        self.max_name_length = max;
        self
    }

    /// Sets the maximum number of entity reference expansions.
    #[must_use]
    pub fn max_entity_expansions(mut self, max: u32) -> Self {
        self.max_entity_expansions = max;
        self
    }

    /// Installs the external entity loader.
    ///
    /// # Security
    ///
    /// See [`EntityLoader`].
    #[must_use]
    pub fn entity_loader(
        mut self,
        loader: impl Fn(&str, &str, &str) -> io::Result<Vec<u8>> + Send + Sync + 'static,
    ) -> Self {
        self.entity_loader = Some(Arc::new(loader));
        self
    }
}

/// Parses an XML string with default options.
///
/// # Errors
///
/// Returns `ParseError` if the input is not well-formed XML.
pub fn parse_str(input: &str) -> Result<Document, ParseError> {
    parse_str_with_options(input, &ParseOptions::default())
}

/// Parses an XML string with the given options.
///
/// # Errors
///
/// Returns `ParseError` if the input is not well-formed XML or an entity
/// cannot be resolved.
pub fn parse_str_with_options(input: &str, options: &ParseOptions) -> Result<Document, ParseError> {
    let started = std::time::Instant::now();
    tracing::debug!(bytes = input.len(), "parsing document");
    let result = xml::XmlParser::new(options).parse(input);
    match &result {
        Ok(doc) => tracing::debug!(
            nodes = doc.node_count(),
            elapsed_us = started.elapsed().as_micros() as u64,
            "document parsed"
        ),
        Err(e) => tracing::debug!(error = %e, "parse failed"),
    }
    result
}

/// Parses raw bytes, detecting the encoding from a BOM or the XML
/// declaration.
///
/// # Errors
///
/// Returns `ParseError` if the bytes cannot be decoded or the document is
/// not well-formed.
pub fn parse_bytes(bytes: &[u8], options: &ParseOptions) -> Result<Document, ParseError> {
    let text = decode_to_utf8(bytes)
        .map_err(|e| ParseError::new(e.to_string(), SourceLocation::default()))?;
    parse_str_with_options(&text, options)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_bytes_utf16() {
        let mut bytes = vec![0xFF, 0xFE];
        for unit in "<a>\u{e9}</a>".encode_utf16() {
            bytes.extend_from_slice(&unit.to_le_bytes());
        }
        let doc = parse_bytes(&bytes, &ParseOptions::default()).unwrap();
        assert_eq!(doc.text_content(doc.root()), "\u{e9}");
    }

    #[test]
    fn test_parse_bytes_declared_encoding() {
        let bytes = b"<?xml version=\"1.0\" encoding=\"ISO-8859-1\"?><a>\xE9</a>";
        let doc = parse_bytes(bytes, &ParseOptions::default()).unwrap();
        assert_eq!(doc.text_content(doc.root()), "\u{e9}");
        assert_eq!(doc.encoding.as_deref(), Some("ISO-8859-1"));
    }

    #[test]
    fn test_options_are_kept_on_document() {
        let options = ParseOptions::default().preserve_cdata(true).base_dir("dtd");
        let doc = parse_str_with_options("<a/>", &options).unwrap();
        assert!(doc.options().preserve_cdata);
        assert_eq!(doc.options().base_dir, "dtd");
    }

    #[test]
    fn test_debug_hides_loader() {
        let options = ParseOptions::default().entity_loader(|_, _, _| Ok(Vec::new()));
        let text = format!("{options:?}");
        assert!(text.contains("entity_loader: Some(\"...\")"));
    }
}
