//! 分割受信のテスト
//!
//! 同じボディを 1 回で feed した場合と、任意の位置で分割して feed した場合で
//! 結果が一致することを確認する。分割位置が区切りの途中に来るケースを網羅するため、
//! 2 分割はすべての位置を、3 分割は区切り周辺のすべての組み合わせを試す。

use std::collections::BTreeMap;
use std::sync::Arc;

use shiguredo_multipart::{
    DecoderState, DiskStorage, FormData, MemoryStorage, MultipartBuilder, MultipartDecoder,
    MultipartError, MultipartLimits,
};

/// 比較用に結果を正規化する (フィールド名 → 値、ファイル名 → (filename, content_type, 中身))
type Snapshot = (
    BTreeMap<String, String>,
    BTreeMap<String, (String, Option<String>, Vec<u8>)>,
);

fn snapshot(form: &FormData) -> Snapshot {
    let fields = form
        .fields()
        .iter()
        .map(|(k, v)| (k.clone(), v.value.clone()))
        .collect();
    let files = form
        .files()
        .iter()
        .map(|(k, f)| {
            let data = f.read_to_vec().unwrap();
            assert_eq!(f.size, data.len() as u64);
            (
                k.clone(),
                (f.filename.clone(), f.content_type.clone(), data),
            )
        })
        .collect();
    (fields, files)
}

fn decode_chunks(boundary: &str, chunks: &[&[u8]]) -> Snapshot {
    let storage = MemoryStorage::new();
    let mut decoder = MultipartDecoder::new(boundary, Arc::new(storage.clone())).unwrap();
    for chunk in chunks {
        decoder.feed(chunk).unwrap();
    }
    let form = decoder.end().unwrap();
    let result = snapshot(&form);
    drop(form);
    assert!(storage.is_empty(), "temporary objects must be released");
    result
}

fn sample_body(boundary: &str) -> Vec<u8> {
    let mut body = b"this is the preamble\r\n".to_vec();
    body.extend_from_slice(
        &MultipartBuilder::with_boundary(boundary)
            .text_field("x", "hello")
            .file_field("f", "a.txt", "text/plain", b"line1\r\nline2\r\n--not-a-boundary")
            .text_field("empty", "")
            .file_field("bin", "b.bin", "application/octet-stream", &[0, 13, 10, 45, 45, 255])
            .build(),
    );
    body.extend_from_slice(b"this is the epilogue");
    body
}

#[test]
fn every_two_way_split_matches_single_feed() {
    let boundary = "----WebKitFormBoundary7MA4YWxk";
    let body = sample_body(boundary);
    let expected = decode_chunks(boundary, &[&body]);

    assert_eq!(expected.0.get("x").map(String::as_str), Some("hello"));
    assert_eq!(expected.0.get("empty").map(String::as_str), Some(""));
    assert_eq!(expected.1.len(), 2);

    for i in 0..=body.len() {
        let (a, b) = body.split_at(i);
        assert_eq!(decode_chunks(boundary, &[a, b]), expected, "split at {}", i);
    }
}

#[test]
fn three_way_splits_around_delimiters_match_single_feed() {
    let boundary = "XyZ";
    let body = sample_body(boundary);
    let expected = decode_chunks(boundary, &[&body]);

    // 区切り "\r\n--XyZ" の周辺だけを対象にする
    let delimiter = b"\r\n--XyZ";
    let positions: Vec<usize> = body
        .windows(delimiter.len())
        .enumerate()
        .filter(|(_, w)| *w == delimiter)
        .map(|(i, _)| i)
        .collect();
    assert!(!positions.is_empty());

    for pos in positions {
        let lo = pos.saturating_sub(2);
        let hi = (pos + delimiter.len() + 3).min(body.len());
        for i in lo..=hi {
            for j in i..=hi {
                let chunks = [&body[..i], &body[i..j], &body[j..]];
                assert_eq!(
                    decode_chunks(boundary, &chunks),
                    expected,
                    "split at {} and {}",
                    i,
                    j
                );
            }
        }
    }
}

#[test]
fn one_byte_chunks_match_single_feed() {
    let boundary = "b";
    let body = sample_body(boundary);
    let expected = decode_chunks(boundary, &[&body]);
    let chunks: Vec<&[u8]> = body.chunks(1).collect();
    assert_eq!(decode_chunks(boundary, &chunks), expected);
}

#[test]
fn duplicate_field_name_last_wins() {
    let body = MultipartBuilder::with_boundary("B")
        .text_field("x", "first")
        .text_field("x", "second")
        .build();
    let (fields, _) = decode_chunks("B", &[&body]);
    assert_eq!(fields.len(), 1);
    assert_eq!(fields.get("x").map(String::as_str), Some("second"));
}

#[test]
fn bytes_after_final_boundary_are_ignored() {
    let body = MultipartBuilder::with_boundary("B")
        .text_field("x", "kept")
        .build();
    let trailer = MultipartBuilder::with_boundary("B")
        .text_field("x", "overwritten?")
        .text_field("y", "added?")
        .build();

    let storage = MemoryStorage::new();
    let mut decoder = MultipartDecoder::new("B", Arc::new(storage)).unwrap();
    decoder.feed(&body).unwrap();
    assert_eq!(decoder.state(), DecoderState::Finished);
    decoder.feed(&trailer).unwrap();

    let form = decoder.end().unwrap();
    assert_eq!(form.field("x"), Some("kept"));
    assert_eq!(form.field("y"), None);
}

#[test]
fn missing_final_boundary_keeps_completed_parts() {
    let body = MultipartBuilder::with_boundary("B")
        .text_field("x", "complete")
        .text_field("y", "incomplete")
        .build();
    // 2 つ目のパートの途中で切断
    let cut = body.len() - 20;

    let storage = MemoryStorage::new();
    let mut decoder = MultipartDecoder::new("B", Arc::new(storage)).unwrap();
    decoder.feed(&body[..cut]).unwrap();
    assert_eq!(decoder.state(), DecoderState::InPart);

    let form = decoder.end().unwrap();
    assert_eq!(form.field("x"), Some("complete"));
    assert_eq!(form.field("y"), None);
}

#[test]
fn boundary_never_seen_yields_empty_form() {
    let storage = MemoryStorage::new();
    let mut decoder = MultipartDecoder::new("B", Arc::new(storage)).unwrap();
    decoder.feed(b"no boundary here at all").unwrap();
    assert_eq!(decoder.state(), DecoderState::Preamble);
    assert!(decoder.end().unwrap().is_empty());
}

#[test]
fn disk_storage_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let storage = DiskStorage::new(dir.path());

    let builder = MultipartBuilder::with_boundary("----disk")
        .file_field("f", "a.txt", "text/plain", b"stored on disk");
    let body = builder.build();

    let mut decoder =
        MultipartDecoder::from_content_type(&builder.content_type(), Arc::new(storage)).unwrap();
    for chunk in body.chunks(5) {
        decoder.feed(chunk).unwrap();
    }
    let mut form = decoder.end().unwrap();
    let file = form.take_file("f").unwrap();
    assert_eq!(file.filename, "a.txt");
    assert_eq!(file.content_type.as_deref(), Some("text/plain"));
    assert_eq!(file.size, 14);

    let path = file.stored.path().unwrap();
    assert!(path.starts_with(dir.path()));
    assert_eq!(std::fs::read(&path).unwrap(), b"stored on disk");

    file.release().unwrap();
    assert!(!path.exists());
}

#[test]
fn persisted_file_survives_drop() {
    let storage = MemoryStorage::new();
    let body = MultipartBuilder::with_boundary("B")
        .file_field("f", "a.txt", "text/plain", b"keep me")
        .build();

    let mut decoder = MultipartDecoder::new("B", Arc::new(storage.clone())).unwrap();
    decoder.feed(&body).unwrap();
    let mut form = decoder.end().unwrap();
    let name = form.take_file("f").unwrap().stored.persist();
    drop(form);

    assert_eq!(storage.get(&name), Some(b"keep me".to_vec()));
}

#[test]
fn file_limit_error_releases_spool() {
    let storage = MemoryStorage::new();
    let limits = MultipartLimits {
        max_file_size: 8,
        ..MultipartLimits::default()
    };
    let body = MultipartBuilder::with_boundary("B")
        .file_field("f", "big.bin", "application/octet-stream", &[7u8; 64])
        .build();

    let mut decoder = MultipartDecoder::with_limits("B", Arc::new(storage.clone()), limits).unwrap();
    let mut result = Ok(());
    for chunk in body.chunks(16) {
        result = decoder.feed(chunk);
        if result.is_err() {
            break;
        }
    }
    assert!(matches!(result, Err(MultipartError::FileTooLarge { limit: 8, .. })));

    drop(decoder);
    assert!(storage.is_empty());
}
