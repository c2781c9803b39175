//! Serde bridge between Rust values and element subtrees.
//!
//! Any type implementing [`serde::Serialize`] can be written as an element,
//! and any [`serde::de::DeserializeOwned`] type read back from one. The
//! mapping is:
//!
//! - a struct becomes an element with one child element per field;
//! - a field named `@name` (via `#[serde(rename = "@name")]`) becomes an
//!   attribute, and a field named `$value` becomes the element's text;
//! - `None` is omitted, and absent elements read back as `None`;
//! - a sequence becomes repeated sibling elements with the field's name;
//! - unit enum variants are written as text, other variants as a child
//!   element named after the variant;
//! - a map becomes one child element per entry, named by the key;
//! - leaves are written as text: `true`/`false`, decimal integers and
//!   shortest round-trip floats with `NaN`, `INF` and `-INF`.
//!
//! Absent sequences need `#[serde(default)]` on the field, as with any
//! other field that may be missing.
//!
//! ```
//! use quillxml::Document;
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Debug, PartialEq, Serialize, Deserialize)]
//! struct Person {
//!     #[serde(rename = "@id")]
//!     id: u32,
//!     firstname: String,
//!     lastname: String,
//! }
//!
//! let person = Person { id: 7, firstname: "John".into(), lastname: "Doe".into() };
//! let mut doc = Document::new();
//! doc.serialize("person", &person).unwrap();
//! assert_eq!(
//!     doc.to_string_with(&quillxml::WriteOptions::default().xml_decl(false)).unwrap(),
//!     r#"<person id="7"><firstname>John</firstname><lastname>Doe</lastname></person>"#
//! );
//! let back: Person = doc.deserialize("person").unwrap();
//! assert_eq!(back, person);
//! ```

mod de;
mod ser;

use std::fmt;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::TreeError;
use crate::tree::{Document, NodeId};

/// Errors from mapping values to and from elements.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// A message from a `Serialize` or `Deserialize` implementation, such as
    /// a missing struct field.
    #[error("{0}")]
    Message(String),
    /// The value's shape has no element representation, or the elements do
    /// not have the shape the type needs.
    #[error("{0}")]
    Shape(String),
    /// The document has no root element to read from.
    #[error("empty document")]
    EmptyDocument,
    /// The root element does not have the requested name.
    #[error("root mismatch: expected <{expected}>, found <{found}>")]
    RootMismatch { expected: String, found: String },
    /// Text that does not parse as the requested type.
    #[error("invalid {expected} in <{element}>: '{text}'")]
    InvalidValue {
        element: String,
        text: String,
        expected: &'static str,
    },
    /// Building the tree failed, e.g. a map key that is not an XML name.
    #[error(transparent)]
    Tree(#[from] TreeError),
}

impl serde::ser::Error for Error {
    fn custom<T: fmt::Display>(msg: T) -> Self {
        Self::Message(msg.to_string())
    }
}

impl serde::de::Error for Error {
    fn custom<T: fmt::Display>(msg: T) -> Self {
        Self::Message(msg.to_string())
    }
}

/// Writes `value` as element(s) named `name` under `parent`.
///
/// Sequences produce one sibling per item and `None` produces nothing.
/// Directly under the document node only a single element is allowed, so a
/// sequence there is a [`Error::Shape`] error.
///
/// # Errors
///
/// Fails for values without an element representation and for names that
/// are not valid XML names.
pub fn to_element<T: Serialize + ?Sized>(
    doc: &mut Document,
    parent: NodeId,
    name: &str,
    value: &T,
) -> Result<(), Error> {
    let top_level = parent == doc.root();
    value.serialize(ser::ElementSerializer::new(doc, parent, name, top_level))
}

/// Reads a value from `element`.
///
/// # Errors
///
/// Fails when the subtree does not have the shape `T` needs or text does
/// not parse as the expected leaf type.
pub fn from_element<T: DeserializeOwned>(doc: &Document, element: NodeId) -> Result<T, Error> {
    T::deserialize(de::ElementDeserializer::new(doc, element))
}

/// Formats a float the way the bridge writes it.
pub(crate) fn format_float(v: f64) -> String {
    if v.is_nan() {
        "NaN".to_string()
    } else if v.is_infinite() {
        if v > 0.0 { "INF" } else { "-INF" }.to_string()
    } else {
        v.to_string()
    }
}

pub(crate) fn parse_float(text: &str) -> Option<f64> {
    match text {
        "NaN" => Some(f64::NAN),
        "INF" => Some(f64::INFINITY),
        "-INF" => Some(f64::NEG_INFINITY),
        _ => text.parse().ok(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_float_text() {
        assert_eq!(format_float(0.1), "0.1");
        assert_eq!(format_float(-2.0), "-2");
        assert_eq!(format_float(f64::NEG_INFINITY), "-INF");
        assert_eq!(format_float(1e300), 1e300.to_string());
        assert_eq!(parse_float("INF"), Some(f64::INFINITY));
        assert!(parse_float("NaN").unwrap().is_nan());
        assert_eq!(parse_float("1.5e3"), Some(1500.0));
        assert_eq!(parse_float("abc"), None);
    }

    #[test]
    fn test_error_display() {
        let err = Error::RootMismatch {
            expected: "a".to_string(),
            found: "b".to_string(),
        };
        assert_eq!(err.to_string(), "root mismatch: expected <a>, found <b>");
        let err = Error::InvalidValue {
            element: "age".to_string(),
            text: "old".to_string(),
            expected: "u32",
        };
        assert_eq!(err.to_string(), "invalid u32 in <age>: 'old'");
    }
}
