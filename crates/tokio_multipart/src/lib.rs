//! tokio_multipart - Tokio integration for shiguredo_multipart
//!
//! `tokio::io::AsyncRead` から multipart/form-data ボディを読み取り、
//! 受信した順にデコーダーへ渡すライブラリ。
//!
//! ## 使い方
//!
//! ```ignore
//! use std::sync::Arc;
//! use shiguredo_multipart::DiskStorage;
//! use tokio_multipart::FormDataReader;
//!
//! let reader = FormDataReader::new(Arc::new(DiskStorage::default()))
//!     .read_timeout(Duration::from_secs(30));
//! let form = reader.read(content_type, &mut body).await?;
//! println!("{:?}", form.field("name"));
//! ```

pub mod error;
pub mod reader;

pub use error::{Error, Result};
pub use reader::FormDataReader;

// shiguredo_multipart の型を re-export
pub use shiguredo_multipart::{FileRecord, FormData, MultipartLimits};
