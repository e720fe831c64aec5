//! # shiguredo_multipart
//!
//! ストリーミング multipart/form-data デコーダー
//!
//! ## 特徴
//!
//! - **依存なし**: 標準ライブラリのみ使用 (`log` feature を除く)
//! - **ストリーミング**: 任意の位置で分割されたボディをそのまま `feed()` できる
//! - **逐次書き出し**: ファイルパートは到着した順に一時ストレージへ書き出す
//!
//! ## 使い方
//!
//! ```rust
//! use std::sync::Arc;
//! use shiguredo_multipart::{MemoryStorage, MultipartBuilder, MultipartDecoder};
//!
//! let builder = MultipartBuilder::with_boundary("----abc123")
//!     .text_field("x", "hello")
//!     .file_field("f", "a.txt", "text/plain", b"file body");
//! let body = builder.build();
//!
//! // リクエストの Content-Type ヘッダーから boundary を取り出す
//! let storage = MemoryStorage::new();
//! let mut decoder =
//!     MultipartDecoder::from_content_type(&builder.content_type(), Arc::new(storage.clone()))
//!         .unwrap();
//!
//! // 受信したチャンクを順番に feed する
//! for chunk in body.chunks(7) {
//!     decoder.feed(chunk).unwrap();
//! }
//! let form = decoder.end().unwrap();
//!
//! assert_eq!(form.field("x"), Some("hello"));
//! let file = form.file("f").unwrap();
//! assert_eq!(file.filename, "a.txt");
//! assert_eq!(file.read_to_vec().unwrap(), b"file body");
//!
//! // 一時オブジェクトは release() かドロップで削除される
//! form.release().unwrap();
//! assert!(storage.is_empty());
//! ```

mod builder;
mod decoder;
mod dispatch;
mod error;
pub mod header_params;
mod limits;
mod log;
pub mod part;
pub mod storage;

pub use builder::MultipartBuilder;
pub use decoder::{DecoderState, MultipartDecoder};
pub use dispatch::{FieldRecord, FileRecord, FormData, PartRecord};
pub use error::MultipartError;
pub use header_params::HeaderParameters;
pub use limits::MultipartLimits;
pub use storage::{DiskStorage, MemoryStorage, SpoolWriter, StoredFile, TempStorage};
