//! multipart/form-data ボディの生成
//!
//! ```rust
//! use shiguredo_multipart::MultipartBuilder;
//!
//! let builder = MultipartBuilder::with_boundary("boundary")
//!     .text_field("field1", "value1")
//!     .file_field("file", "a.txt", "text/plain", b"content");
//! assert_eq!(builder.content_type(), "multipart/form-data; boundary=boundary");
//! let body = builder.build();
//! assert!(body.starts_with(b"--boundary\r\n"));
//! ```

use crate::header_params::is_token_char;

/// 生成するパート
#[derive(Debug, Clone, PartialEq, Eq)]
struct BuilderPart {
    name: String,
    filename: Option<String>,
    content_type: Option<String>,
    body: Vec<u8>,
}

/// multipart ボディビルダー
#[derive(Debug, Clone)]
pub struct MultipartBuilder {
    /// 境界文字列
    boundary: String,
    /// パート
    parts: Vec<BuilderPart>,
}

impl MultipartBuilder {
    /// 乱数値を受け取って境界を生成する
    ///
    /// 乱数生成は呼び出し側の責任となる。
    ///
    /// ```
    /// use shiguredo_multipart::MultipartBuilder;
    ///
    /// let builder = MultipartBuilder::new(12345678901234567890);
    /// assert!(builder.boundary().starts_with("----FormBoundary"));
    /// ```
    pub fn new(random_value: u64) -> Self {
        Self::with_boundary(&format!("----FormBoundary{}", random_value))
    }

    /// 境界を指定して作成
    pub fn with_boundary(boundary: &str) -> Self {
        MultipartBuilder {
            boundary: boundary.to_string(),
            parts: Vec::new(),
        }
    }

    /// 境界文字列を取得
    pub fn boundary(&self) -> &str {
        &self.boundary
    }

    /// Content-Type ヘッダー値を取得
    pub fn content_type(&self) -> String {
        if self.boundary.bytes().all(is_token_char) {
            format!("multipart/form-data; boundary={}", self.boundary)
        } else {
            format!(
                "multipart/form-data; boundary=\"{}\"",
                escape_quoted(&self.boundary)
            )
        }
    }

    /// テキストフィールドを追加
    pub fn text_field(mut self, name: &str, value: &str) -> Self {
        self.parts.push(BuilderPart {
            name: name.to_string(),
            filename: None,
            content_type: None,
            body: value.as_bytes().to_vec(),
        });
        self
    }

    /// ファイルフィールドを追加
    pub fn file_field(mut self, name: &str, filename: &str, content_type: &str, data: &[u8]) -> Self {
        self.parts.push(BuilderPart {
            name: name.to_string(),
            filename: Some(filename.to_string()),
            content_type: Some(content_type.to_string()),
            body: data.to_vec(),
        });
        self
    }

    /// ボディをビルド
    pub fn build(&self) -> Vec<u8> {
        let mut result = Vec::new();

        for part in &self.parts {
            // 境界
            result.extend_from_slice(b"--");
            result.extend_from_slice(self.boundary.as_bytes());
            result.extend_from_slice(b"\r\n");

            // Content-Disposition
            result.extend_from_slice(b"Content-Disposition: form-data; name=\"");
            result.extend_from_slice(escape_quoted(&part.name).as_bytes());
            result.push(b'"');
            if let Some(filename) = &part.filename {
                result.extend_from_slice(b"; filename=\"");
                result.extend_from_slice(escape_quoted(filename).as_bytes());
                result.push(b'"');
            }
            result.extend_from_slice(b"\r\n");

            // Content-Type
            if let Some(content_type) = &part.content_type {
                result.extend_from_slice(b"Content-Type: ");
                result.extend_from_slice(content_type.as_bytes());
                result.extend_from_slice(b"\r\n");
            }

            // ヘッダーとボディの区切り
            result.extend_from_slice(b"\r\n");

            // ボディ
            result.extend_from_slice(&part.body);
            result.extend_from_slice(b"\r\n");
        }

        // 終了境界
        result.extend_from_slice(b"--");
        result.extend_from_slice(self.boundary.as_bytes());
        result.extend_from_slice(b"--\r\n");

        result
    }
}

/// 引用符と改行をエスケープ
fn escape_quoted(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\\' | '"' => {
                out.push('\\');
                out.push(c);
            }
            // ヘッダー行を壊さないように改行は空白にする
            '\r' | '\n' => out.push(' '),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_simple() {
        let body = MultipartBuilder::with_boundary("boundary")
            .text_field("field1", "value1")
            .build();

        let expected = b"--boundary\r\n\
            Content-Disposition: form-data; name=\"field1\"\r\n\r\n\
            value1\r\n\
            --boundary--\r\n";

        assert_eq!(body, expected);
    }

    #[test]
    fn test_builder_with_file() {
        let body = MultipartBuilder::with_boundary("boundary")
            .file_field("file", "test.txt", "text/plain", b"content")
            .build();

        let body_str = String::from_utf8_lossy(&body);
        assert!(
            body_str
                .contains("Content-Disposition: form-data; name=\"file\"; filename=\"test.txt\"")
        );
        assert!(body_str.contains("Content-Type: text/plain"));
        assert!(body_str.contains("content"));
    }

    #[test]
    fn test_content_type() {
        let builder = MultipartBuilder::with_boundary("abc123");
        assert_eq!(
            builder.content_type(),
            "multipart/form-data; boundary=abc123"
        );

        let builder = MultipartBuilder::with_boundary("a b");
        assert_eq!(
            builder.content_type(),
            "multipart/form-data; boundary=\"a b\""
        );
    }

    #[test]
    fn test_escape_quoted() {
        assert_eq!(escape_quoted("a\"b\\c"), "a\\\"b\\\\c");
        assert_eq!(escape_quoted("line\r\nbreak"), "line  break");
    }
}
