#![no_main]
use libfuzzer_sys::fuzz_target;
use quillxml::xpath::XPath;
use quillxml::Document;

const SAMPLE: &str = "<root xmlns:p='urn:p' xml:lang='en'>\
    <child id='c1' attr='val'>text<p:leaf/></child>\
    <!--note--><?pi data?><child id='c2'>42</child></root>";

fuzz_target!(|data: &[u8]| {
    let Ok(expr) = std::str::from_utf8(data) else {
        return;
    };
    let Ok(path) = XPath::new(expr) else {
        return;
    };
    let Ok(doc) = Document::parse_str(SAMPLE) else {
        return;
    };
    let _ = path.evaluate(&doc, doc.root());
    if let Some(root) = doc.root_element() {
        let _ = path.evaluate(&doc, root);
        let _ = path.matches(&doc, root);
    }
});
