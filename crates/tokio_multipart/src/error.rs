//! tokio-multipart エラー型

use std::fmt;

/// tokio-multipart エラー
#[derive(Debug)]
pub enum Error {
    /// I/O エラー
    Io(std::io::Error),
    /// multipart デコードエラー
    Multipart(shiguredo_multipart::MultipartError),
    /// 読み取りタイムアウト
    Timeout,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(e) => write!(f, "I/O error: {}", e),
            Error::Multipart(e) => write!(f, "multipart error: {}", e),
            Error::Timeout => write!(f, "read timeout"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            Error::Multipart(e) => Some(e),
            Error::Timeout => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}

impl From<shiguredo_multipart::MultipartError> for Error {
    fn from(e: shiguredo_multipart::MultipartError) -> Self {
        Error::Multipart(e)
    }
}

impl From<tokio::time::error::Elapsed> for Error {
    fn from(_: tokio::time::error::Elapsed) -> Self {
        Error::Timeout
    }
}

/// Result 型エイリアス
pub type Result<T> = std::result::Result<T, Error>;
