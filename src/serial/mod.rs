//! Writing documents back to XML text.
//!
//! The writer escapes text and attribute values, keeps comments and CDATA
//! sections well-formed and can pretty-print element-only content. Output is
//! always UTF-8 and is a pure function of the tree and the [`WriteOptions`].

pub mod xml;

pub use xml::{node_to_string, to_string, to_string_with, write, WriteOptions};
