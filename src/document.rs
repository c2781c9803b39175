//! Convenience entry points on [`Document`]: reading, writing, querying and
//! object mapping in one place.

use std::io::{self, Read, Write};
use std::str::FromStr;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::bridge::{self, Error as BridgeError};
use crate::error::{Error, ParseError, WriteError};
use crate::parser::{self, ParseOptions};
use crate::serial::{self, WriteOptions};
use crate::tree::{Document, NodeId};
use crate::xpath::{XPath, XPathError};

impl Document {
    /// Parses a UTF-8 string.
    ///
    /// ```
    /// use quillxml::Document;
    ///
    /// let doc = Document::parse_str("<greeting>hello</greeting>").unwrap();
    /// assert_eq!(doc.text_content(doc.root()), "hello");
    /// ```
    ///
    /// # Errors
    ///
    /// Returns [`ParseError`] for malformed input.
    pub fn parse_str(input: &str) -> Result<Self, ParseError> {
        parser::parse_str(input)
    }

    /// Parses a UTF-8 string with custom options, which the document keeps
    /// for later [`read`](Self::read) calls.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError`] for malformed input or unresolved entities.
    pub fn parse_str_with_options(input: &str, options: &ParseOptions) -> Result<Self, ParseError> {
        parser::parse_str_with_options(input, options)
    }

    /// Parses bytes in any encoding the BOM or XML declaration names.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError`] for undecodable or malformed input.
    pub fn parse_bytes(input: &[u8]) -> Result<Self, ParseError> {
        parser::parse_bytes(input, &ParseOptions::default())
    }

    /// Reads and parses everything from `reader`.
    ///
    /// # Errors
    ///
    /// Fails if reading fails or the input is not well-formed.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self, Error> {
        let mut doc = Self::new();
        doc.read(reader)?;
        Ok(doc)
    }

    /// Replaces the content of this document with what `reader` yields,
    /// parsed with this document's options.
    ///
    /// On failure the document is left unchanged.
    ///
    /// # Errors
    ///
    /// Fails if reading fails or the input is not well-formed.
    pub fn read<R: Read>(&mut self, mut reader: R) -> Result<(), Error> {
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes)?;
        *self = parser::parse_bytes(&bytes, &self.options)?;
        Ok(())
    }

    /// Installs the callback used to fetch external entities and the
    /// external DTD subset on the next [`read`](Self::read).
    pub fn set_entity_loader(
        &mut self,
        loader: impl Fn(&str, &str, &str) -> io::Result<Vec<u8>> + Send + Sync + 'static,
    ) {
        self.options.entity_loader = Some(Arc::new(loader));
    }

    /// Keep CDATA sections as separate nodes on the next
    /// [`read`](Self::read).
    pub fn set_preserve_cdata(&mut self, yes: bool) {
        self.options.preserve_cdata = yes;
    }

    /// Writes the document with default [`WriteOptions`].
    ///
    /// # Errors
    ///
    /// See [`serial::write`].
    pub fn write<W: Write + ?Sized>(&self, out: &mut W) -> Result<(), WriteError> {
        serial::write(self, out, &WriteOptions::default())
    }

    /// Writes the document with the given options.
    ///
    /// # Errors
    ///
    /// See [`serial::write`].
    pub fn write_with<W: Write + ?Sized>(
        &self,
        out: &mut W,
        options: &WriteOptions,
    ) -> Result<(), WriteError> {
        serial::write(self, out, options)
    }

    /// Returns the document as XML text with default options.
    ///
    /// # Errors
    ///
    /// See [`serial::write`].
    pub fn to_string(&self) -> Result<String, WriteError> {
        serial::to_string(self)
    }

    /// Returns the document as XML text.
    ///
    /// # Errors
    ///
    /// See [`serial::write`].
    pub fn to_string_with(&self, options: &WriteOptions) -> Result<String, WriteError> {
        serial::to_string_with(self, options)
    }

    /// Elements selected by `path`, evaluated from the document node.
    ///
    /// ```
    /// use quillxml::Document;
    ///
    /// let doc = Document::parse_str("<a><b/><c><b/></c></a>").unwrap();
    /// assert_eq!(doc.find("//b").unwrap().len(), 2);
    /// ```
    ///
    /// # Errors
    ///
    /// Returns [`XPathError`] if `path` does not compile or does not
    /// produce a node-set.
    pub fn find(&self, path: &str) -> Result<Vec<NodeId>, XPathError> {
        self.find_from(self.root(), path)
    }

    /// The first element selected by `path`, in document order.
    ///
    /// # Errors
    ///
    /// See [`find`](Self::find).
    pub fn find_first(&self, path: &str) -> Result<Option<NodeId>, XPathError> {
        Ok(self.find(path)?.into_iter().next())
    }

    /// Elements selected by `path` with `node` as the context node.
    ///
    /// # Errors
    ///
    /// See [`find`](Self::find).
    pub fn find_from(&self, node: NodeId, path: &str) -> Result<Vec<NodeId>, XPathError> {
        XPath::new(path)?.select_elements(self, node)
    }

    /// [`find_first`](Self::find_first) with `node` as the context node.
    ///
    /// # Errors
    ///
    /// See [`find`](Self::find).
    pub fn find_first_from(&self, node: NodeId, path: &str) -> Result<Option<NodeId>, XPathError> {
        Ok(self.find_from(node, path)?.into_iter().next())
    }

    /// Replaces the root element with `value` written as `<name>`.
    ///
    /// The value is built in a scratch document first, so on error the
    /// current root element is left untouched.
    ///
    /// # Errors
    ///
    /// Fails with [`BridgeError::Shape`] for a top-level sequence and for
    /// values with no element representation.
    pub fn serialize<T: Serialize + ?Sized>(&mut self, name: &str, value: &T) -> Result<(), BridgeError> {
        let mut scratch = Document::new();
        let scratch_root = scratch.root();
        bridge::to_element(&mut scratch, scratch_root, name, value)?;
        let Some(built) = scratch.root_element() else {
            return Err(BridgeError::Shape(format!("<{name}> produced no element")));
        };

        if let Some(old) = self.root_element() {
            self.remove(old);
        }
        let copy = self.import(&scratch, built);
        let root = self.root();
        self.append_child(root, copy)?;
        Ok(())
    }

    /// Reads the root element, which must be called `name`, as a `T`.
    ///
    /// # Errors
    ///
    /// Fails with [`BridgeError::EmptyDocument`] when there is no root
    /// element and [`BridgeError::RootMismatch`] when it has another name.
    pub fn deserialize<T: DeserializeOwned>(&self, name: &str) -> Result<T, BridgeError> {
        let root = self.root_element().ok_or(BridgeError::EmptyDocument)?;
        let found = self.qualified_name(root).unwrap_or_default();
        if found != name {
            return Err(BridgeError::RootMismatch {
                expected: name.to_string(),
                found,
            });
        }
        bridge::from_element(self, root)
    }
}

impl FromStr for Document {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse_str(s)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Name {
        firstname: String,
        lastname: String,
    }

    #[test]
    fn test_failed_serialize_keeps_the_old_root() {
        let mut doc = Document::parse_str("<keep>me</keep>").unwrap();
        let err = doc.serialize("items", &vec![1, 2]).unwrap_err();
        assert!(matches!(err, BridgeError::Shape(_)));
        let root = doc.root_element().unwrap();
        assert_eq!(doc.local_name(root), Some("keep"));
        assert_eq!(doc.text_content(root), "me");

        let name = Name {
            firstname: "Jane".into(),
            lastname: "Jones".into(),
        };
        doc.serialize("name", &name).unwrap();
        assert_eq!(doc.deserialize::<Name>("name").unwrap(), name);
        assert_eq!(doc.child_elements(doc.root()).count(), 1);
    }

    #[test]
    fn test_read_replaces_content_and_keeps_options() {
        let mut doc = Document::new();
        doc.set_preserve_cdata(true);
        doc.read("<a><![CDATA[x]]></a>".as_bytes()).unwrap();
        let a = doc.root_element().unwrap();
        assert_eq!(doc.kind(doc.first_child(a).unwrap()).type_name(), "cdata");
        assert!(doc.options().preserve_cdata);

        doc.read("<b/>".as_bytes()).unwrap();
        assert_eq!(doc.local_name(doc.root_element().unwrap()), Some("b"));
    }

    #[test]
    fn test_read_failure_keeps_document() {
        let mut doc: Document = "<keep/>".parse().unwrap();
        assert!(matches!(doc.read("<a>".as_bytes()), Err(Error::Parse(_))));
        assert_eq!(doc.local_name(doc.root_element().unwrap()), Some("keep"));
    }

    #[test]
    fn test_entity_loader_on_read() {
        let mut doc = Document::new();
        doc.set_entity_loader(|_base, _public, system| {
            assert_eq!(system, "chapter.xml");
            Ok(b"<p>loaded</p>".to_vec())
        });
        doc.read(
            "<!DOCTYPE book [<!ENTITY ch SYSTEM \"chapter.xml\">]><book>&ch;</book>".as_bytes(),
        )
        .unwrap();
        assert_eq!(doc.find("/book/p").unwrap().len(), 1);
    }

    #[test]
    fn test_find() {
        let doc = Document::parse_str("<a><b id='1'/><c><b id='2'/></c></a>").unwrap();
        let first = doc.find_first("//b").unwrap().unwrap();
        assert_eq!(doc.get_attribute(first, "id"), Some("1"));
        let c = doc.find_first("/a/c").unwrap().unwrap();
        assert_eq!(doc.find_from(c, "b").unwrap().len(), 1);
        assert_eq!(doc.find_first("//missing").unwrap(), None);
        assert!(doc.find("count(//b)").is_err());
    }

    #[test]
    fn test_serialize_round_trip() {
        let name = Name {
            firstname: "Jane".to_string(),
            lastname: "Doe".to_string(),
        };
        let mut doc = Document::parse_str("<old/>").unwrap();
        doc.serialize("name", &name).unwrap();
        assert_eq!(
            doc.to_string().unwrap(),
            "<?xml version=\"1.0\"?>\n<name><firstname>Jane</firstname><lastname>Doe</lastname></name>"
        );
        assert_eq!(doc.deserialize::<Name>("name").unwrap(), name);
    }

    #[test]
    fn test_deserialize_errors() {
        assert_eq!(
            Document::new().deserialize::<Name>("name").unwrap_err(),
            BridgeError::EmptyDocument
        );
        let doc = Document::parse_str("<person/>").unwrap();
        assert_eq!(
            doc.deserialize::<Name>("name").unwrap_err().to_string(),
            "root mismatch: expected <name>, found <person>"
        );
    }

    #[test]
    fn test_top_level_sequence() {
        let mut doc = Document::new();
        let err = doc.serialize("n", &vec![1, 2, 3]).unwrap_err();
        assert!(matches!(err, BridgeError::Shape(_)));
    }

    #[test]
    fn test_write_to_vec() {
        let doc = Document::parse_str("<a>1</a>").unwrap();
        let mut out = Vec::new();
        doc.write_with(&mut out, &WriteOptions::default().xml_decl(false))
            .unwrap();
        assert_eq!(out, b"<a>1</a>");
    }
}
