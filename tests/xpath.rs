//! `XPath` evaluation against parsed documents.

#![allow(clippy::unwrap_used)]

use pretty_assertions::assert_eq;
use quillxml::xpath::{NodeRef, Value, XPathError};
use quillxml::{Context, Document, XPath};

const PERSONS: &str = r#"<persons>
  <person id="1"><firstname>John</firstname><lastname>Doe</lastname></person>
  <person id="2"><firstname>Jane</firstname><lastname>Jones</lastname></person>
</persons>"#;

fn persons() -> Document {
    Document::parse_str(PERSONS).unwrap()
}

fn eval(doc: &Document, expr: &str) -> Value {
    XPath::new(expr).unwrap().evaluate(doc, doc.root()).unwrap()
}

#[test]
fn test_descendant_persons_in_document_order() {
    let doc = persons();
    let found = XPath::new("//person").unwrap().select_elements(&doc, doc.root()).unwrap();
    assert_eq!(found.len(), 2);
    let ids: Vec<_> = found.iter().map(|&p| doc.get_attribute(p, "id").unwrap()).collect();
    assert_eq!(ids, vec!["1", "2"]);
}

#[test]
fn test_attribute_predicate() {
    let doc = persons();
    let found = doc.find("//person[@id='2']/firstname").unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(doc.text_content(found[0]), "Jane");
}

#[test]
fn test_variable_namespace_filter() {
    let doc = Document::parse_str(
        "<root xmlns:e='https://example.org'><e:a/><b/><e:c><d/></e:c></root>",
    )
    .unwrap();
    let path = XPath::new("//*[namespace-uri() = $ns]").unwrap();

    let mut context = Context::new();
    context.set("ns", "https://example.org");
    let nodes = path.select_nodes_with(&doc, doc.root(), &context).unwrap();
    let names: Vec<_> = nodes
        .iter()
        .map(|n| doc.local_name(n.as_node().unwrap()).unwrap())
        .collect();
    assert_eq!(names, vec!["a", "c"]);

    let err = path.select_nodes(&doc, doc.root()).unwrap_err();
    assert_eq!(
        err,
        XPathError::UndefinedVariable {
            name: "ns".to_string()
        }
    );
}

#[test]
fn test_compile_errors_are_reported_at_construction() {
    for expr in ["//person[", "1 +", "foo(", "@", "child::", "'open"] {
        assert!(
            matches!(XPath::new(expr), Err(XPathError::Syntax { .. })),
            "compiled {expr:?}"
        );
    }
}

#[test]
fn test_reverse_axis_positions_count_from_context() {
    let doc = Document::parse_str("<a><b><c><d/></c></b></a>").unwrap();
    let d = doc.find_first("//d").unwrap().unwrap();

    let nearest = XPath::new("ancestor::*[1]").unwrap().select_elements(&doc, d).unwrap();
    assert_eq!(doc.local_name(nearest[0]), Some("c"));

    let farthest = XPath::new("ancestor::*[last()]").unwrap().select_elements(&doc, d).unwrap();
    assert_eq!(doc.local_name(farthest[0]), Some("a"));

    // Whole result sets still come back in document order.
    let all = XPath::new("ancestor::*").unwrap().select_elements(&doc, d).unwrap();
    let names: Vec<_> = all.iter().map(|&n| doc.local_name(n).unwrap()).collect();
    assert_eq!(names, vec!["a", "b", "c"]);
}

#[test]
fn test_preceding_sibling_positions() {
    let doc = Document::parse_str("<r><x n='1'/><x n='2'/><x n='3'/><y/></r>").unwrap();
    let y = doc.find_first("//y").unwrap().unwrap();
    let first = XPath::new("string(preceding-sibling::x[1]/@n)").unwrap().evaluate(&doc, y).unwrap();
    assert_eq!(first, Value::String("3".into()));
    let nearest_two = XPath::new("preceding-sibling::x[position() < 3]")
        .unwrap()
        .select_elements(&doc, y)
        .unwrap();
    let labels: Vec<_> = nearest_two.iter().map(|&x| doc.get_attribute(x, "n").unwrap()).collect();
    assert_eq!(labels, vec!["2", "3"]);
}

#[test]
fn test_scalar_results() {
    let doc = persons();
    assert_eq!(eval(&doc, "count(//person)"), Value::Number(2.0));
    assert_eq!(eval(&doc, "string(//person[2]/lastname)"), Value::String("Jones".into()));
    assert_eq!(eval(&doc, "//person/@id = 2"), Value::Boolean(true));
    assert_eq!(eval(&doc, "sum(//person/@id) div 2"), Value::Number(1.5));
    assert_eq!(
        eval(&doc, "concat(//firstname, ' ', //lastname)"),
        Value::String("John Doe".into())
    );
}

#[test]
fn test_empty_results_are_not_errors() {
    let doc = persons();
    assert_eq!(eval(&doc, "//nobody/parent::*"), Value::NodeSet(Vec::new()));
    assert_eq!(eval(&doc, "string(//nobody)"), Value::String(String::new()));
    assert_eq!(eval(&doc, "boolean(//nobody)"), Value::Boolean(false));
}

#[test]
fn test_matches() {
    let doc = persons();
    let jane = doc.find_first("//person[@id='2']").unwrap().unwrap();
    let john = doc.find_first("//person[@id='1']").unwrap().unwrap();
    let path = XPath::new("//person[firstname='Jane']").unwrap();
    assert!(path.matches(&doc, jane).unwrap());
    assert!(!path.matches(&doc, john).unwrap());
}

#[test]
fn test_attribute_nodes_have_parents() {
    let doc = persons();
    let attrs = XPath::new("//@id").unwrap().select_nodes(&doc, doc.root()).unwrap();
    assert_eq!(attrs.len(), 2);
    assert!(matches!(attrs[0], NodeRef::Attribute { .. }));
    let owner = XPath::new("..").unwrap().select_elements(&doc, attrs[1]).unwrap();
    assert_eq!(doc.get_attribute(owner[0], "id"), Some("2"));
}

#[test]
fn test_prefix_resolution_through_context() {
    let doc = Document::parse_str("<r xmlns='urn:x'><item/><item/></r>").unwrap();
    // Unprefixed name tests never match a default namespace.
    assert_eq!(doc.find("//item").unwrap().len(), 0);

    let mut context = Context::new();
    context.set_namespace("x", "urn:x");
    let nodes = XPath::new("//x:item")
        .unwrap()
        .select_nodes_with(&doc, doc.root(), &context)
        .unwrap();
    assert_eq!(nodes.len(), 2);
}

#[test]
fn test_concurrent_readers() {
    let doc = persons();
    let path = XPath::new("count(//person)").unwrap();
    std::thread::scope(|s| {
        for _ in 0..4 {
            s.spawn(|| {
                assert_eq!(path.evaluate(&doc, doc.root()).unwrap(), Value::Number(2.0));
            });
        }
    });
}
