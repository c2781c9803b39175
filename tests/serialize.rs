//! Writing documents and reading them back.

#![allow(clippy::unwrap_used)]

use pretty_assertions::assert_eq;
use quillxml::serial::{to_string_with, WriteOptions};
use quillxml::parser::parse_str_with_options;
use quillxml::{Document, Equality, ParseOptions, XmlVersion};

const SAMPLES: &[&str] = &[
    "<a/>",
    "<a x='1' y=\"two &amp; three\">text &lt; more</a>",
    "<?xml version='1.0' standalone='no'?><!--lead--><r><?pi data?><c>1</c><c>2</c></r>",
    "<r xmlns='urn:d' xmlns:p='urn:p'><p:e p:a='v'>mixed <b>bold</b> tail</p:e></r>",
    "<a>line one\nline two\ttabbed</a>",
    "<a q='&quot;quoted&quot;' s=\"it's\"/>",
    "<!DOCTYPE r [<!ENTITY e 'expanded'>]><r>&e;</r>",
    "<a v='1&#10;2&#9;3'/>",
];

fn exact_round_trip(input: &str, options: &WriteOptions) {
    let doc = Document::parse_str(input).unwrap();
    let written = to_string_with(&doc, options).unwrap();
    let reparsed = Document::parse_str(&written).unwrap();
    assert!(
        doc.equals(doc.root(), &reparsed, reparsed.root(), Equality::Exact),
        "round trip changed {input:?} into {written:?}"
    );
}

#[test]
fn test_round_trip_is_structurally_equal() {
    for input in SAMPLES {
        exact_round_trip(input, &WriteOptions::default());
    }
}

#[test]
fn test_round_trip_with_escaped_whitespace() {
    let options = WriteOptions::default()
        .escape_whitespace(true)
        .escape_double_quote(true);
    for input in SAMPLES {
        exact_round_trip(input, &options);
    }
}

#[test]
fn test_indented_round_trip_ignores_layout() {
    let options = WriteOptions::default().indent(true).indent_width(4);
    for input in SAMPLES {
        let doc = Document::parse_str(input).unwrap();
        let written = to_string_with(&doc, &options).unwrap();
        let reparsed = Document::parse_str(&written).unwrap();
        assert_eq!(doc, reparsed, "indenting changed {input:?}");
    }
}

#[test]
fn test_writing_is_deterministic() {
    let options = WriteOptions::default().indent(true);
    for input in SAMPLES {
        let doc = Document::parse_str(input).unwrap();
        let first = to_string_with(&doc, &options).unwrap();
        let second = to_string_with(&doc, &options).unwrap();
        assert_eq!(first, second);

        let mut bytes = Vec::new();
        doc.write_with(&mut bytes, &options).unwrap();
        assert_eq!(String::from_utf8(bytes).unwrap(), first);
    }
}

#[test]
fn test_indented_output() {
    let doc = Document::parse_str("<r><a><b>x</b></a><c/></r>").unwrap();
    let written = to_string_with(&doc, &WriteOptions::default().indent(true).xml_decl(false)).unwrap();
    assert_eq!(written, "<r>\n  <a>\n    <b>x</b>\n  </a>\n  <c/>\n</r>");
}

#[test]
fn test_carriage_return_survives() {
    let mut doc = Document::parse_str("<a/>").unwrap();
    let a = doc.root_element().unwrap();
    doc.set_content(a, "one\r\ntwo").unwrap();
    let written = doc.to_string().unwrap();
    let reparsed = Document::parse_str(&written).unwrap();
    assert_eq!(reparsed.text_content(reparsed.root()), "one\r\ntwo");
}

#[test]
fn test_version_1_1_round_trip() {
    let mut doc = Document::parse_str("<a/>").unwrap();
    let a = doc.root_element().unwrap();
    doc.set_content(a, "bell\u{7} nel\u{85} ls\u{2028}").unwrap();

    assert!(doc.to_string().is_err());

    let written = to_string_with(&doc, &WriteOptions::default().version(XmlVersion::V1_1)).unwrap();
    let reparsed = Document::parse_str(&written).unwrap();
    assert_eq!(reparsed.version, XmlVersion::V1_1);
    assert_eq!(reparsed.text_content(reparsed.root()), "bell\u{7} nel\u{85} ls\u{2028}");
}

#[test]
fn test_comment_text_is_made_well_formed() {
    let mut doc = Document::parse_str("<a/>").unwrap();
    let a = doc.root_element().unwrap();
    let comment = doc.create_comment("x--y-");
    doc.append_child(a, comment).unwrap();
    let written = to_string_with(&doc, &WriteOptions::default().xml_decl(false)).unwrap();
    assert_eq!(written, "<a><!--x- -y- --></a>");
    assert!(Document::parse_str(&written).is_ok());
}

#[test]
fn test_cdata_with_terminator_round_trips() {
    let mut doc = Document::parse_str("<a/>").unwrap();
    let a = doc.root_element().unwrap();
    let cdata = doc.create_cdata("x]]>y");
    doc.append_child(a, cdata).unwrap();
    let written = doc.to_string().unwrap();
    let reparsed = Document::parse_str(&written).unwrap();
    assert_eq!(reparsed.text_content(reparsed.root()), "x]]>y");
}

#[test]
fn test_deep_documents_write_on_a_small_stack() {
    let depth = 20_000;
    let text = format!("{}{}", "<a>".repeat(depth), "</a>".repeat(depth));
    let options = ParseOptions::default().max_depth(depth as u32);
    let doc = parse_str_with_options(&text, &options).unwrap();

    let written = std::thread::Builder::new()
        .stack_size(128 * 1024)
        .spawn(move || {
            let flat = to_string_with(&doc, &WriteOptions::default().xml_decl(false)).unwrap();
            let indented = to_string_with(&doc, &WriteOptions::default().indent(true)).unwrap();
            (flat, indented)
        })
        .unwrap()
        .join()
        .unwrap();

    let expected = format!("{}<a/>{}", "<a>".repeat(depth - 1), "</a>".repeat(depth - 1));
    assert_eq!(written.0, expected);
    let reparsed = parse_str_with_options(&written.1, &options).unwrap();
    assert_eq!(reparsed.descendants(reparsed.root()).count(), depth);
}
