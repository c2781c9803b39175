//! XML character classes.
//!
//! Every predicate takes a raw `u32` code point rather than a `char` so it is
//! defined for all 32-bit inputs, including surrogates and values above
//! `U+10FFFF` that a byte-level decoder may hand us.
//!
//! Ranges follow XML 1.0 (Fifth Edition) §2.2 `[2]`, §2.3 `[4]`/`[4a]`,
//! `[11]`/`[13]` and XML 1.1 §2.2 `[2]`.

/// Returns `true` if `uc` is a `NameStartChar` (XML 1.0 §2.3 `[4]`).
#[must_use]
pub fn is_name_start_char(uc: u32) -> bool {
    matches!(uc,
        0x3A /* ':' */ | 0x41..=0x5A | 0x5F /* '_' */ | 0x61..=0x7A |
        0xC0..=0xD6 | 0xD8..=0xF6 | 0xF8..=0x2FF |
        0x370..=0x37D | 0x37F..=0x1FFF |
        0x200C..=0x200D | 0x2070..=0x218F |
        0x2C00..=0x2FEF | 0x3001..=0xD7FF |
        0xF900..=0xFDCF | 0xFDF0..=0xFFFD |
        0x1_0000..=0xE_FFFF
    )
}

/// Returns `true` if `uc` is a `NameChar` (XML 1.0 §2.3 `[4a]`).
#[must_use]
pub fn is_name_char(uc: u32) -> bool {
    is_name_start_char(uc)
        || matches!(uc,
            0x2D /* '-' */ | 0x2E /* '.' */ | 0x30..=0x39 | 0xB7 |
            0x300..=0x36F | 0x203F..=0x2040
        )
}

/// Returns `true` if `uc` may appear literally in an XML 1.0 document.
///
/// `#x9 | #xA | #xD | [#x20-#xD7FF] | [#xE000-#xFFFD] | [#x10000-#x10FFFF]`
#[must_use]
pub fn is_valid_xml_1_0_char(uc: u32) -> bool {
    matches!(uc,
        0x09 | 0x0A | 0x0D | 0x20..=0xD7FF | 0xE000..=0xFFFD | 0x1_0000..=0x10_FFFF
    )
}

/// Returns `true` if `uc` may appear literally in an XML 1.1 document.
///
/// XML 1.1 restricts the C1 controls (`#x7F-#x84`, `#x86-#x9F`) to character
/// references; `NEL` (`#x85`) is allowed as a line end.
#[must_use]
pub fn is_valid_xml_1_1_char(uc: u32) -> bool {
    matches!(uc,
        0x09 | 0x0A | 0x0D | 0x20..=0x7E | 0x85 | 0xA0..=0xD7FF |
        0xE000..=0xFFFD | 0x1_0000..=0x10_FFFF
    )
}

/// Returns `true` if `uc` may appear in a system literal we are willing to
/// hand to an entity loader.
#[must_use]
pub fn is_valid_system_literal_char(uc: u32) -> bool {
    uc > 0x1F && !matches!(uc, 0x20 | 0x3C /* '<' */ | 0x3E /* '>' */ | 0x22 /* '"' */ | 0x23 /* '#' */)
}

/// Returns `true` if every character of `s` is a valid system literal character.
#[must_use]
pub fn is_valid_system_literal(s: &str) -> bool {
    s.chars().all(|c| is_valid_system_literal_char(c as u32))
}

/// Returns `true` if `uc` is a `PubidChar` (XML 1.0 §2.3 `[13]`).
///
/// `PubidChar ::= #x20 | #xD | #xA | [a-zA-Z0-9] | [-'()+,./:=?;!*#@$_%]`
#[must_use]
pub fn is_valid_public_id_char(uc: u32) -> bool {
    match char::from_u32(uc) {
        Some(c) => matches!(c,
            ' ' | '\r' | '\n' |
            'a'..='z' | 'A'..='Z' | '0'..='9' |
            '-' | '\'' | '(' | ')' | '+' | ',' | '.' | '/' | ':' |
            '=' | '?' | ';' | '!' | '*' | '#' | '@' | '$' | '_' | '%'
        ),
        None => false,
    }
}

/// Returns `true` if every character of `s` is a `PubidChar`.
#[must_use]
pub fn is_valid_public_id(s: &str) -> bool {
    s.chars().all(|c| is_valid_public_id_char(c as u32))
}

/// Returns `true` if `s` is a non-empty XML `Name`.
#[must_use]
pub fn is_valid_name(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) if is_name_start_char(first as u32) => {
            chars.all(|c| is_name_char(c as u32))
        }
        _ => false,
    }
}

/// Returns `true` for the four XML whitespace characters.
#[must_use]
pub(crate) fn is_xml_space(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\n' | '\r')
}
