#![no_main]
use libfuzzer_sys::fuzz_target;
use quillxml::parser::{parse_bytes, ParseOptions};

fuzz_target!(|data: &[u8]| {
    // Malformed input must come back as an error, never a panic.
    let _ = parse_bytes(data, &ParseOptions::default());
});
