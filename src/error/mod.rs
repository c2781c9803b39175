//! Error types.
//!
//! Parse errors carry a [`SourceLocation`] (line, column and byte offset) so a
//! message alone is enough to find the offending markup. Every other layer has
//! its own error enum; [`Error`] unifies them for callers that go through the
//! [`Document`](crate::Document) façade.

use std::fmt;

pub use crate::bridge::Error as BridgeError;
pub use crate::encoding::EncodingError;
pub use crate::xpath::XPathError;

/// Source location within an XML document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SourceLocation {
    /// 1-based line number.
    pub line: u32,
    /// 1-based column number (in characters, not bytes).
    pub column: u32,
    /// 0-based byte offset from the start of the input.
    pub byte_offset: usize,
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// A well-formedness or entity-resolution failure.
///
/// Parsing stops at the first error; no partial document is returned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    /// Human-readable description of the violation.
    pub message: String,
    /// Where in the source the error was detected.
    pub location: SourceLocation,
}

impl ParseError {
    /// Creates an error at the given location.
    pub fn new(message: impl Into<String>, location: SourceLocation) -> Self {
        Self {
            message: message.into(),
            location,
        }
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "parse error at {}: {}", self.location, self.message)
    }
}

impl std::error::Error for ParseError {}

/// Errors from programmatic tree edits.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TreeError {
    /// The namespace URI of a namespace move is already bound to another prefix.
    #[error("Invalid prefix in move_to_name_space, already known as '{prefix}'")]
    PrefixInUse {
        /// The prefix the namespace URI is already bound to.
        prefix: String,
    },
    /// A name that is not a valid XML `Name` was supplied.
    #[error("invalid XML name: '{0}'")]
    InvalidName(String),
    /// The operation requires an element node.
    #[error("node is not an element")]
    NotAnElement,
    /// The edit would make a node its own ancestor.
    #[error("cannot insert a node into its own subtree")]
    Cycle,
    /// The reference node has no parent to insert next to.
    #[error("reference node has no parent")]
    NoParent,
    /// A document may only have one root element.
    #[error("document already has a root element")]
    DuplicateRoot,
    /// The node was dropped by `Document::remove`.
    #[error("node has been removed")]
    Removed,
}

/// Errors raised while writing a document.
#[derive(Debug, thiserror::Error)]
pub enum WriteError {
    /// The underlying writer failed.
    #[error("write failed: {0}")]
    Io(#[from] std::io::Error),
    /// A character that cannot be represented in XML, even as a reference.
    #[error("character U+{0:04X} cannot be written in XML {1}")]
    InvalidCharacter(u32, &'static str),
}

/// Any error the crate can produce.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Malformed XML or an unresolved entity.
    #[error(transparent)]
    Parse(#[from] ParseError),
    /// XPath compile or evaluation failure.
    #[error(transparent)]
    XPath(#[from] XPathError),
    /// Invalid tree edit.
    #[error(transparent)]
    Tree(#[from] TreeError),
    /// Output failure.
    #[error(transparent)]
    Write(#[from] WriteError),
    /// Object/XML shape mismatch in the serde bridge.
    #[error(transparent)]
    Bridge(#[from] BridgeError),
    /// Input could not be transcoded to UTF-8.
    #[error(transparent)]
    Encoding(#[from] EncodingError),
    /// Reading the input failed.
    #[error("read failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Result alias using the crate-wide [`Error`].
pub type Result<T, E = Error> = std::result::Result<T, E>;
