//! multipart/form-data ストリーミングデコーダー (RFC 7578)
//!
//! ## 概要
//!
//! 任意の位置で分割されて届くボディを `feed()` で受け取り、境界でパートに分割します。
//! フィールドは文字列として、ファイルは一時ストレージへ書き出して記録します。
//!
//! ```text
//! Preamble --"--B\r\n"--> InPart --"\r\n--B\r\n"--> InPart
//!                                --"\r\n--B--"---> Finished
//! ```
//!
//! 区切りが 2 回の受信にまたがる場合に備えて、
//! 区切りの長さ - 1 バイトは常にバッファに残してからパートへ流します。
//!
//! ## 使い方
//!
//! ```rust
//! use std::sync::Arc;
//! use shiguredo_multipart::{MemoryStorage, MultipartDecoder};
//!
//! let storage = MemoryStorage::new();
//! let mut decoder = MultipartDecoder::new("XyZ", Arc::new(storage.clone())).unwrap();
//!
//! decoder.feed(b"--XyZ\r\nContent-Disposition: form-data; name=\"x\"\r\n\r\nhel").unwrap();
//! decoder.feed(b"lo\r\n--X").unwrap();
//! decoder.feed(b"yZ--\r\n").unwrap();
//! assert!(decoder.is_finished());
//!
//! let form = decoder.end().unwrap();
//! assert_eq!(form.field("x"), Some("hello"));
//! ```

use std::sync::Arc;

use crate::dispatch::{Dispatcher, FormData};
use crate::error::MultipartError;
use crate::header_params::HeaderParameters;
use crate::limits::MultipartLimits;
use crate::log::{debug, trace};
use crate::part::PartParser;
use crate::storage::TempStorage;

/// デコード状態
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecoderState {
    /// 最初の境界待ち
    Preamble,
    /// パートを読み取り中
    InPart,
    /// 終了境界を検出済み (以降の入力は無視する)
    Finished,
}

/// 区切りの探索結果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scan {
    /// 区切りを検出
    Delimiter {
        /// 区切りの開始位置
        start: usize,
        /// 区切りの直後の位置
        end: usize,
        /// 終了境界かどうか
        last: bool,
    },
    /// 区切りなし。`safe` より前は区切りの一部になりえない
    Pending { safe: usize },
}

/// multipart/form-data デコーダー
#[derive(Debug)]
pub struct MultipartDecoder {
    /// "--" + boundary
    dash_boundary: Vec<u8>,
    /// "\r\n--" + boundary
    delimiter: Vec<u8>,
    /// 受信済みでパートに流していないバイト列
    buffer: Vec<u8>,
    state: DecoderState,
    parser: PartParser,
    dispatcher: Dispatcher,
}

impl MultipartDecoder {
    /// 境界を指定して作成
    pub fn new(boundary: &str, storage: Arc<dyn TempStorage>) -> Result<Self, MultipartError> {
        Self::with_limits(boundary, storage, MultipartLimits::default())
    }

    /// 境界と制限を指定して作成
    pub fn with_limits(
        boundary: &str,
        storage: Arc<dyn TempStorage>,
        limits: MultipartLimits,
    ) -> Result<Self, MultipartError> {
        if boundary.is_empty() {
            return Err(MultipartError::InvalidBoundary);
        }

        let mut dash_boundary = b"--".to_vec();
        dash_boundary.extend_from_slice(boundary.as_bytes());
        let mut delimiter = b"\r\n".to_vec();
        delimiter.extend_from_slice(&dash_boundary);

        Ok(MultipartDecoder {
            dash_boundary,
            delimiter,
            buffer: Vec::new(),
            state: DecoderState::Preamble,
            parser: PartParser::with_max_header_size(limits.max_header_size),
            dispatcher: Dispatcher::new(storage, limits),
        })
    }

    /// リクエストの Content-Type ヘッダー値から作成
    ///
    /// multipart/form-data 以外の場合は [`MultipartError::NotFormData`]、
    /// boundary パラメータがない場合は [`MultipartError::MissingBoundary`] を返す。
    pub fn from_content_type(
        content_type: &str,
        storage: Arc<dyn TempStorage>,
    ) -> Result<Self, MultipartError> {
        Self::from_content_type_with_limits(content_type, storage, MultipartLimits::default())
    }

    /// リクエストの Content-Type ヘッダー値と制限を指定して作成
    pub fn from_content_type_with_limits(
        content_type: &str,
        storage: Arc<dyn TempStorage>,
        limits: MultipartLimits,
    ) -> Result<Self, MultipartError> {
        let content_type = HeaderParameters::parse("content-type", content_type);
        if !content_type.is_media_type("multipart", "form-data") {
            return Err(MultipartError::NotFormData);
        }
        match content_type.boundary() {
            Some(boundary) if !boundary.is_empty() => Self::with_limits(boundary, storage, limits),
            _ => Err(MultipartError::MissingBoundary),
        }
    }

    /// 境界文字列を取得
    pub fn boundary(&self) -> &[u8] {
        &self.dash_boundary[2..]
    }

    /// 現在の状態を取得
    pub fn state(&self) -> DecoderState {
        self.state
    }

    /// 終了境界を検出したかどうか
    pub fn is_finished(&self) -> bool {
        self.state == DecoderState::Finished
    }

    /// 制限設定を取得
    pub fn limits(&self) -> &MultipartLimits {
        self.dispatcher.limits()
    }

    /// これまでに完成したフィールドとファイル
    pub fn form(&self) -> &FormData {
        self.dispatcher.form()
    }

    /// バッファに保持しているバイト数
    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    /// データを追加
    ///
    /// エラーを返した後のデコーダーは再利用せずに破棄すること。
    pub fn feed(&mut self, data: &[u8]) -> Result<(), MultipartError> {
        if self.state == DecoderState::Finished {
            return Ok(());
        }
        self.buffer.extend_from_slice(data);
        self.process()
    }

    /// 入力の終了を通知し、結果を返す
    ///
    /// 終了境界に到達していない場合、読み取り途中のパートは記録されない。
    pub fn end(mut self) -> Result<FormData, MultipartError> {
        if self.state != DecoderState::Finished {
            debug!(
                "multipart: input ended before final boundary (state={:?})",
                self.state
            );
        }
        self.buffer.clear();
        Ok(self.into_form())
    }

    /// 処理を中断する
    ///
    /// 書き出し中のファイルと完成済みのファイルの一時オブジェクトはすべて削除される。
    pub fn abort(self) {
        debug!("multipart: aborted in state {:?}", self.state);
        drop(self.into_form());
    }

    fn into_form(self) -> FormData {
        self.dispatcher.into_form()
    }

    fn process(&mut self) -> Result<(), MultipartError> {
        loop {
            match self.state {
                DecoderState::Preamble => {
                    match scan(&self.buffer, &self.dash_boundary) {
                        Scan::Delimiter { end, last, .. } => {
                            self.buffer.drain(..end);
                            if last {
                                debug!("multipart: final boundary in preamble");
                                self.finish();
                                return Ok(());
                            }
                            debug!("multipart: first boundary found");
                            self.start_part()?;
                        }
                        Scan::Pending { safe } => {
                            // プリアンブルは区切りになりえない部分から捨てる
                            self.buffer.drain(..safe);
                            return Ok(());
                        }
                    }
                }
                DecoderState::InPart => match scan(&self.buffer, &self.delimiter) {
                    Scan::Delimiter { start, end, last } => {
                        let part = self.parser.end(Some(&self.buffer[..start]))?;
                        self.dispatcher.complete_part(part)?;
                        self.buffer.drain(..end);
                        if last {
                            debug!("multipart: final boundary found");
                            self.finish();
                            return Ok(());
                        }
                        self.start_part()?;
                    }
                    Scan::Pending { safe } => {
                        if safe > 0 {
                            trace!(
                                "multipart: {} bytes to part, {} retained",
                                safe,
                                self.buffer.len() - safe
                            );
                            self.parser.feed(&self.buffer[..safe])?;
                            self.dispatcher.pump(&mut self.parser)?;
                            self.buffer.drain(..safe);
                        }
                        return Ok(());
                    }
                },
                DecoderState::Finished => {
                    self.buffer.clear();
                    return Ok(());
                }
            }
        }
    }

    fn start_part(&mut self) -> Result<(), MultipartError> {
        self.state = DecoderState::InPart;
        self.parser.start();
        self.dispatcher.begin_part()
    }

    fn finish(&mut self) {
        self.state = DecoderState::Finished;
        self.buffer.clear();
    }
}

/// `prefix` に続けて "\r\n" (次のパート) または "--" (終了) が来る位置を探す
///
/// 区切りが見つからない場合、`prefix` の長さ + 1 バイトを末尾に残した位置までを安全とする。
/// これは "\r\n" 付きの区切り全体の長さ - 1 にあたる。
fn scan(haystack: &[u8], prefix: &[u8]) -> Scan {
    let mut from = 0;
    while let Some(pos) = find_bytes(&haystack[from..], prefix).map(|p| p + from) {
        let after = pos + prefix.len();
        match haystack.get(after..after + 2) {
            Some(b"\r\n") => {
                return Scan::Delimiter {
                    start: pos,
                    end: after + 2,
                    last: false,
                };
            }
            Some(b"--") => {
                return Scan::Delimiter {
                    start: pos,
                    end: after + 2,
                    last: true,
                };
            }
            // 区切りではない (ボディ中の偶然の一致)
            Some(_) => from = pos + 1,
            // 後続の 2 バイトが未着
            None => return Scan::Pending { safe: pos },
        }
    }
    Scan::Pending {
        safe: haystack.len().saturating_sub(prefix.len() + 1),
    }
}

/// バイト列から部分列を検索
fn find_bytes(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() {
        return Some(0);
    }
    if needle.len() > haystack.len() {
        return None;
    }

    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}
