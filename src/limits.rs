/// multipart デコーダーの制限設定
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultipartLimits {
    /// パートごとのヘッダーブロック最大サイズ (デフォルト: 8KB)
    pub max_header_size: usize,
    /// フィールド値の最大サイズ (デフォルト: 1MB)
    pub max_field_size: usize,
    /// ファイルの最大サイズ (デフォルト: 制限なし)
    ///
    /// ファイルは一時ストレージに逐次書き出されるため、
    /// この値はメモリ使用量ではなくストレージ使用量の上限になる。
    pub max_file_size: u64,
    /// 最大パート数 (デフォルト: 1000)
    pub max_parts: usize,
}

impl Default for MultipartLimits {
    fn default() -> Self {
        Self {
            max_header_size: 8 * 1024,    // 8KB
            max_field_size: 1024 * 1024, // 1MB
            max_file_size: u64::MAX,
            max_parts: 1000,
        }
    }
}

impl MultipartLimits {
    /// 制限なしの設定を作成
    pub fn unlimited() -> Self {
        Self {
            max_header_size: usize::MAX,
            max_field_size: usize::MAX,
            max_file_size: u64::MAX,
            max_parts: usize::MAX,
        }
    }
}
