#![no_main]

use std::sync::Arc;

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use shiguredo_multipart::{MemoryStorage, MultipartDecoder, MultipartLimits};

#[derive(Arbitrary, Debug)]
struct FuzzLimits {
    max_header_size: u16,
    max_field_size: u16,
    max_file_size: u16,
    max_parts: u8,
    chunk_size: u8,
    data: Vec<u8>,
}

fn build_limits(input: &FuzzLimits) -> MultipartLimits {
    MultipartLimits {
        max_header_size: input.max_header_size as usize,
        max_field_size: input.max_field_size as usize,
        max_file_size: input.max_file_size as u64,
        max_parts: input.max_parts as usize,
    }
}

fuzz_target!(|input: FuzzLimits| {
    let storage = MemoryStorage::new();
    let Ok(mut decoder) =
        MultipartDecoder::with_limits("boundary", Arc::new(storage.clone()), build_limits(&input))
    else {
        return;
    };

    let chunk_size = (input.chunk_size as usize).max(1);
    for chunk in input.data.chunks(chunk_size) {
        if decoder.feed(chunk).is_err() {
            decoder.abort();
            assert!(storage.is_empty());
            return;
        }
    }

    if let Ok(form) = decoder.end() {
        for file in form.files().values() {
            assert!(file.size <= input.max_file_size as u64);
        }
        for field in form.fields().values() {
            assert!(field.value.len() <= input.max_field_size as usize * 3);
        }
    }
    assert!(storage.is_empty());
});
