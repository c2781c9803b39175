#![no_main]
use libfuzzer_sys::fuzz_target;
use quillxml::{Document, Equality};

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    let Ok(doc) = Document::parse_str(text) else {
        return;
    };
    // Trees the writer cannot represent are a write error, not a crash.
    let Ok(written) = doc.to_string() else {
        return;
    };
    let reparsed = Document::parse_str(&written).expect("written output must parse");
    assert!(
        doc.equals(doc.root(), &reparsed, reparsed.root(), Equality::Exact),
        "round trip changed the tree"
    );
    assert_eq!(reparsed.to_string().ok().as_deref(), Some(written.as_str()));
});
