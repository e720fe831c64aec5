//! パート単位のヘッダー/ボディ パース
//!
//! 1 パート分のバイト列を受け取り、空行までをヘッダーブロック、
//! 残りをボディとして分離します。境界の検出は行いません。
//!
//! ```rust
//! use shiguredo_multipart::part::PartParser;
//!
//! let mut parser = PartParser::new();
//! parser.start();
//! parser.feed(b"Content-Disposition: form-data; name=\"x\"\r\n").unwrap();
//! parser.feed(b"\r\nhel").unwrap();
//! let part = parser.end(Some(b"lo")).unwrap();
//! assert_eq!(
//!     part.headers().get("content-disposition"),
//!     Some("form-data; name=\"x\"")
//! );
//! assert_eq!(part.body(), b"hello");
//! ```

use crate::error::MultipartError;

/// パートヘッダー (名前は小文字化済み)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PartHeaders {
    entries: Vec<(String, String)>,
}

impl PartHeaders {
    /// ヘッダー値を取得 (名前は小文字で保持しているので大文字小文字を区別しない)
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// すべてのヘッダーを取得
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 同名のヘッダーは後勝ち
    fn insert(&mut self, name: String, value: String) {
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = value,
            None => self.entries.push((name, value)),
        }
    }
}

/// パース済みパート
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Part {
    headers: PartHeaders,
    body: Vec<u8>,
}

impl Part {
    /// ヘッダーを取得
    pub fn headers(&self) -> &PartHeaders {
        &self.headers
    }

    /// ボディを取得
    ///
    /// [`PartParser::take_body`] で取り出し済みのバイトは含まれない。
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// ボディを取り出す
    pub fn into_body(self) -> Vec<u8> {
        self.body
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Headers,
    Body,
}

/// パートのヘッダー/ボディ パーサー
///
/// `start()` で初期化し、`feed()` を繰り返し、`end()` で完成したパートを返す。
/// 同じインスタンスを次のパートに再利用できる。
#[derive(Debug, Clone)]
pub struct PartParser {
    phase: Phase,
    /// 改行待ちのヘッダー行
    line: Vec<u8>,
    /// 値の確定待ちのヘッダー (継続行を連結する)
    pending: Option<(String, String)>,
    headers: PartHeaders,
    body: Vec<u8>,
    /// ヘッダーブロックの累計バイト数
    header_size: usize,
    max_header_size: usize,
}

impl Default for PartParser {
    fn default() -> Self {
        Self::new()
    }
}

impl PartParser {
    /// 新しいパーサーを作成
    pub fn new() -> Self {
        Self::with_max_header_size(usize::MAX)
    }

    /// ヘッダーブロックの最大サイズを指定して作成
    pub fn with_max_header_size(max_header_size: usize) -> Self {
        PartParser {
            phase: Phase::Headers,
            line: Vec::new(),
            pending: None,
            headers: PartHeaders::default(),
            body: Vec::new(),
            header_size: 0,
            max_header_size,
        }
    }

    /// 次のパートに向けて状態をリセット
    pub fn start(&mut self) {
        self.phase = Phase::Headers;
        self.line.clear();
        self.pending = None;
        self.headers = PartHeaders::default();
        self.body.clear();
        self.header_size = 0;
    }

    /// データを追加
    pub fn feed(&mut self, mut data: &[u8]) -> Result<(), MultipartError> {
        while self.phase == Phase::Headers && !data.is_empty() {
            let Some(lf) = data.iter().position(|b| *b == b'\n') else {
                self.grow_header(data.len())?;
                self.line.extend_from_slice(data);
                return Ok(());
            };
            self.grow_header(lf + 1)?;
            self.line.extend_from_slice(&data[..lf]);
            data = &data[lf + 1..];
            self.finish_line();
        }

        if self.phase == Phase::Body {
            self.body.extend_from_slice(data);
        }
        Ok(())
    }

    /// パートを終了し、ヘッダーとボディを返す
    ///
    /// 空行に到達しないまま終了した場合は、読み取り済みのヘッダー行を確定し、ボディは空になる。
    pub fn end(&mut self, data: Option<&[u8]>) -> Result<Part, MultipartError> {
        if let Some(data) = data {
            self.feed(data)?;
        }
        if self.phase == Phase::Headers {
            if !self.line.is_empty() {
                self.finish_line();
            }
            self.flush_pending();
        }

        let part = Part {
            headers: std::mem::take(&mut self.headers),
            body: std::mem::take(&mut self.body),
        };
        self.start();
        Ok(part)
    }

    /// ヘッダーブロックが完了したかどうか
    pub fn headers_complete(&self) -> bool {
        self.phase == Phase::Body
    }

    /// 確定済みのヘッダーを取得
    pub fn headers(&self) -> &PartHeaders {
        &self.headers
    }

    /// これまでに蓄積されたボディを取り出す
    pub fn take_body(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.body)
    }

    /// 蓄積中のボディのバイト数
    pub fn body_len(&self) -> usize {
        self.body.len()
    }

    fn grow_header(&mut self, n: usize) -> Result<(), MultipartError> {
        let size = self.header_size.saturating_add(n);
        if size > self.max_header_size {
            return Err(MultipartError::HeaderTooLarge {
                size,
                limit: self.max_header_size,
            });
        }
        self.header_size = size;
        Ok(())
    }

    fn finish_line(&mut self) {
        let mut line = std::mem::take(&mut self.line);
        if line.last() == Some(&b'\r') {
            line.pop();
        }

        if line.is_empty() {
            self.flush_pending();
            self.phase = Phase::Body;
            return;
        }

        let line = String::from_utf8_lossy(&line);

        // 継続行
        if line.starts_with(' ') || line.starts_with('\t') {
            if let Some((_, value)) = self.pending.as_mut() {
                let folded = line.trim();
                if !folded.is_empty() {
                    if !value.is_empty() {
                        value.push(' ');
                    }
                    value.push_str(folded);
                }
            }
            return;
        }

        // コロンのない行は無視する
        let Some((name, value)) = line.split_once(':') else {
            return;
        };
        self.flush_pending();
        self.pending = Some((name.trim().to_ascii_lowercase(), value.trim().to_string()));
    }

    fn flush_pending(&mut self) {
        if let Some((name, value)) = self.pending.take() {
            self.headers.insert(name, value);
        }
    }
}
