#![no_main]

use std::sync::Arc;

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use shiguredo_multipart::{FormData, MemoryStorage, MultipartDecoder};

#[derive(Arbitrary, Debug)]
struct FuzzInput {
    boundary: u8,
    split: u16,
    data: Vec<u8>,
}

fn decode(boundary: &str, chunks: &[&[u8]], storage: &MemoryStorage) -> Option<FormData> {
    let mut decoder = MultipartDecoder::new(boundary, Arc::new(storage.clone())).ok()?;
    for chunk in chunks {
        decoder.feed(chunk).ok()?;
    }
    decoder.end().ok()
}

fn summarize(form: &FormData) -> Vec<(String, Vec<u8>)> {
    let mut out: Vec<(String, Vec<u8>)> = form
        .fields()
        .values()
        .map(|f| (f.name.clone(), f.value.as_bytes().to_vec()))
        .collect();
    for file in form.files().values() {
        out.push((file.field_name.clone(), file.read_to_vec().unwrap()));
    }
    out.sort();
    out
}

fuzz_target!(|input: FuzzInput| {
    let boundaries = ["boundary", "----WebKitFormBoundary", "abc123", "-", "a b"];
    let boundary = boundaries[input.boundary as usize % boundaries.len()];

    let whole_storage = MemoryStorage::new();
    let whole = decode(boundary, &[&input.data], &whole_storage);

    // 2 分割しても結果は変わらない
    let at = input.split as usize % (input.data.len() + 1);
    let (a, b) = input.data.split_at(at);
    let split_storage = MemoryStorage::new();
    let split = decode(boundary, &[a, b], &split_storage);

    match (&whole, &split) {
        (Some(whole), Some(split)) => assert_eq!(summarize(whole), summarize(split)),
        (None, None) => {}
        _ => panic!("split changed decode result"),
    }

    drop(whole);
    drop(split);
    assert!(whole_storage.is_empty());
    assert!(split_storage.is_empty());
});
