//! # quillxml
//!
//! An XML document model with a stack-based parser, an `XPath` 1.0 engine,
//! a writer and a serde bridge for mapping Rust values to elements.
//!
//! ## Quick Start
//!
//! ```
//! use quillxml::Document;
//!
//! let doc = Document::parse_str(
//!     "<persons><person id='1'><name>John</name></person>\
//!      <person id='2'><name>Jane</name></person></persons>",
//! )
//! .unwrap();
//!
//! let jane = doc.find_first("//person[@id='2']/name").unwrap().unwrap();
//! assert_eq!(doc.text_content(jane), "Jane");
//! ```
//!
//! Documents own their nodes in an arena and hand out [`NodeId`] handles.
//! Reading is lock-free and a `&Document` can be shared across threads;
//! mutation needs `&mut Document`.

pub mod bridge;
pub mod chars;
mod document;
pub mod encoding;
pub mod error;
pub mod parser;
pub mod serial;
pub mod tree;
pub mod xpath;

// Re-export primary types at the crate root for convenience.
pub use error::{Error, ParseError, Result};
pub use parser::ParseOptions;
pub use serial::WriteOptions;
pub use tree::{Attribute, DocType, Document, Equality, NodeId, NodeKind, XmlVersion};
pub use xpath::{Context, XPath};
