//! PBT テスト共通ユーティリティ

use proptest::prelude::*;

// ========================================
// multipart ボディ生成
// ========================================

/// 境界文字列: トークン文字のみ (1-40 文字)
pub fn boundary() -> impl Strategy<Value = String> {
    "[A-Za-z0-9'()+_,./:=?-]{1,40}".prop_map(|s| s)
}

/// フィールド名
pub fn field_name() -> impl Strategy<Value = String> {
    "[a-zA-Z][a-zA-Z0-9_]{0,15}".prop_map(|s| s)
}

/// ファイル名
pub fn filename() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9_-]{1,16}\\.[a-z]{1,4}".prop_map(|s| s)
}

/// テキスト値 (改行を含む)
///
/// 区切りと一致しないように '-' は含めない。
pub fn text_value() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9 .,!?\r\n]{0,64}".prop_map(|s| s)
}

/// MIME タイプ
pub fn mime_type() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("text/plain".to_string()),
        Just("application/json".to_string()),
        Just("application/octet-stream".to_string()),
        Just("image/png".to_string()),
    ]
}

/// 生成するパート
#[derive(Debug, Clone)]
pub enum GenPart {
    Field {
        name: String,
        value: String,
    },
    File {
        name: String,
        filename: String,
        content_type: String,
        data: Vec<u8>,
    },
}

impl GenPart {
    /// フィールド名を取得
    pub fn name(&self) -> &str {
        match self {
            GenPart::Field { name, .. } | GenPart::File { name, .. } => name,
        }
    }
}

/// パート (テキストかファイル)
pub fn part() -> impl Strategy<Value = GenPart> {
    prop_oneof![
        (field_name(), text_value()).prop_map(|(name, value)| GenPart::Field { name, value }),
        (
            field_name(),
            filename(),
            mime_type(),
            proptest::collection::vec(any::<u8>(), 0..256)
        )
            .prop_map(|(name, filename, content_type, data)| GenPart::File {
                name,
                filename,
                content_type,
                data,
            }),
    ]
}

/// 名前が重複しないパート列
///
/// 名前の末尾にインデックスを付けて一意にする。
pub fn unique_parts(max: usize) -> impl Strategy<Value = Vec<GenPart>> {
    proptest::collection::vec(part(), 0..=max).prop_map(|parts| {
        parts
            .into_iter()
            .enumerate()
            .map(|(i, part)| match part {
                GenPart::Field { name, value } => GenPart::Field {
                    name: format!("{}_{}", name, i),
                    value,
                },
                GenPart::File {
                    name,
                    filename,
                    content_type,
                    data,
                } => GenPart::File {
                    name: format!("{}_{}", name, i),
                    filename,
                    content_type,
                    data,
                },
            })
            .collect()
    })
}

/// 分割位置 (ボディ長で剰余をとって使う)
pub fn split_points() -> impl Strategy<Value = Vec<usize>> {
    proptest::collection::vec(any::<usize>(), 0..16)
}

/// 分割位置を正規化して、チャンクに分ける
pub fn split_at_points<'a>(body: &'a [u8], points: &[usize]) -> Vec<&'a [u8]> {
    let mut cuts: Vec<usize> = points.iter().map(|p| p % (body.len() + 1)).collect();
    cuts.sort_unstable();
    cuts.dedup();

    let mut chunks = Vec::new();
    let mut prev = 0;
    for cut in cuts {
        chunks.push(&body[prev..cut]);
        prev = cut;
    }
    chunks.push(&body[prev..]);
    chunks
}
