#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use shiguredo_multipart::part::PartParser;

#[derive(Arbitrary, Debug)]
struct FuzzInput {
    max_header_size: u16,
    chunks: Vec<Vec<u8>>,
}

fuzz_target!(|input: FuzzInput| {
    let mut parser = PartParser::with_max_header_size(input.max_header_size as usize);

    for chunk in &input.chunks {
        if parser.feed(chunk).is_err() {
            return;
        }
        if parser.headers_complete() {
            let _ = parser.take_body();
        }
    }

    if let Ok(part) = parser.end(None) {
        for (name, _) in part.headers().iter() {
            assert_eq!(name, name.to_ascii_lowercase());
        }
    }
});
