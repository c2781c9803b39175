//! Input decoding.
//!
//! Documents arrive as bytes. The encoding is taken from the byte order mark
//! if there is one, otherwise from the `encoding` pseudo-attribute of the XML
//! declaration, otherwise UTF-8 (XML 1.0 §4.3.3, Appendix F). Transcoding is
//! delegated to `encoding_rs`.

use encoding_rs::{Encoding, UTF_8};

/// The input bytes could not be turned into UTF-8 text.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EncodingError {
    /// The declared encoding label is not known to `encoding_rs`.
    #[error("unsupported encoding: {0}")]
    Unsupported(String),
    /// The bytes are not valid in the detected encoding.
    #[error("malformed byte sequence for encoding {0}")]
    Malformed(&'static str),
}

/// Sniffs a byte order mark.
///
/// Returns the encoding and the number of BOM bytes to skip, or `None` when
/// the input starts without a BOM.
///
/// ```
/// use quillxml::encoding::detect_bom;
///
/// let (enc, skip) = detect_bom(b"\xEF\xBB\xBF<a/>").unwrap();
/// assert_eq!(enc.name(), "UTF-8");
/// assert_eq!(skip, 3);
/// assert!(detect_bom(b"<a/>").is_none());
/// ```
#[must_use]
pub fn detect_bom(bytes: &[u8]) -> Option<(&'static Encoding, usize)> {
    Encoding::for_bom(bytes)
}

/// Decodes a document into UTF-8 text, stripping any BOM.
///
/// # Errors
///
/// Returns [`EncodingError`] if the declared encoding is unknown or the bytes
/// are malformed for the chosen encoding.
pub fn decode_to_utf8(bytes: &[u8]) -> Result<String, EncodingError> {
    let (encoding, skip) = match detect_bom(bytes) {
        Some(found) => found,
        None => match declared_encoding(bytes) {
            Some(label) => (
                Encoding::for_label(label.as_bytes())
                    .ok_or_else(|| EncodingError::Unsupported(label.clone()))?,
                0,
            ),
            None => (UTF_8, 0),
        },
    };

    let body = &bytes[skip..];
    if encoding == UTF_8 {
        return std::str::from_utf8(body)
            .map(str::to_string)
            .map_err(|_| EncodingError::Malformed(UTF_8.name()));
    }

    let (text, had_errors) = encoding.decode_without_bom_handling(body);
    if had_errors {
        return Err(EncodingError::Malformed(encoding.name()));
    }
    tracing::debug!(encoding = encoding.name(), bytes = body.len(), "transcoded input");
    Ok(text.into_owned())
}

/// Reads the `encoding` pseudo-attribute from an ASCII-compatible XML
/// declaration at the very start of `bytes`.
fn declared_encoding(bytes: &[u8]) -> Option<String> {
    let head = &bytes[..bytes.len().min(256)];
    if !head.starts_with(b"<?xml") {
        return None;
    }
    let end = head.windows(2).position(|w| w == b"?>")?;
    let decl = &head[..end];
    let at = decl.windows(8).position(|w| w == b"encoding")?;
    let rest = trim_ascii_start(&decl[at + 8..]);
    let rest = trim_ascii_start(rest.strip_prefix(b"=")?);
    let quote = *rest.first()?;
    if quote != b'"' && quote != b'\'' {
        return None;
    }
    let value = &rest[1..];
    let close = value.iter().position(|&b| b == quote)?;
    std::str::from_utf8(&value[..close]).ok().map(str::to_string)
}

fn trim_ascii_start(bytes: &[u8]) -> &[u8] {
    let skip = bytes
        .iter()
        .take_while(|b| matches!(b, b' ' | b'\t' | b'\r' | b'\n'))
        .count();
    &bytes[skip..]
}
