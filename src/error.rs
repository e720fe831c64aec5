use std::fmt;

/// multipart デコードエラー
#[derive(Debug)]
pub enum MultipartError {
    /// 不正な境界 (空文字列など)
    InvalidBoundary,
    /// Content-Type に boundary パラメータがない
    MissingBoundary,
    /// Content-Type が multipart/form-data ではない
    NotFormData,
    /// パートヘッダーが大きすぎる
    HeaderTooLarge { size: usize, limit: usize },
    /// フィールド値が大きすぎる
    FieldTooLarge { size: usize, limit: usize },
    /// ファイルが大きすぎる
    FileTooLarge { size: u64, limit: u64 },
    /// パート数超過
    TooManyParts { count: usize, limit: usize },
    /// 一時ストレージの I/O エラー
    Io(std::io::Error),
}

impl fmt::Display for MultipartError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MultipartError::InvalidBoundary => write!(f, "invalid boundary"),
            MultipartError::MissingBoundary => write!(f, "missing boundary parameter"),
            MultipartError::NotFormData => write!(f, "content type is not multipart/form-data"),
            MultipartError::HeaderTooLarge { size, limit } => {
                write!(f, "part header too large: {} > {}", size, limit)
            }
            MultipartError::FieldTooLarge { size, limit } => {
                write!(f, "field too large: {} > {}", size, limit)
            }
            MultipartError::FileTooLarge { size, limit } => {
                write!(f, "file too large: {} > {}", size, limit)
            }
            MultipartError::TooManyParts { count, limit } => {
                write!(f, "too many parts: {} > {}", count, limit)
            }
            MultipartError::Io(e) => write!(f, "storage error: {}", e),
        }
    }
}

impl std::error::Error for MultipartError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            MultipartError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for MultipartError {
    fn from(e: std::io::Error) -> Self {
        MultipartError::Io(e)
    }
}
