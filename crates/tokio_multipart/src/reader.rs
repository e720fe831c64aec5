//! 非同期ボディリーダー
//!
//! ```ignore
//! let reader = FormDataReader::new(Arc::new(MemoryStorage::new()))
//!     .read_buffer_size(16 * 1024)
//!     .read_timeout(Duration::from_secs(10));
//!
//! let form = reader.read("multipart/form-data; boundary=xyz", &mut stream).await?;
//! ```

use std::sync::Arc;
use std::time::Duration;

use shiguredo_multipart::{FormData, MultipartDecoder, MultipartLimits, TempStorage};
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::error::Result;

/// multipart/form-data ボディリーダー
///
/// 読み取りの途中でエラーになった場合やタイムアウトした場合、
/// 書き出し済みの一時オブジェクトはすべて削除される。
#[derive(Debug, Clone)]
pub struct FormDataReader {
    storage: Arc<dyn TempStorage>,
    limits: MultipartLimits,
    read_buffer_size: usize,
    read_timeout: Duration,
}

impl FormDataReader {
    /// 一時ストレージを指定して作成
    pub fn new(storage: Arc<dyn TempStorage>) -> Self {
        Self {
            storage,
            limits: MultipartLimits::default(),
            read_buffer_size: 8192,
            read_timeout: Duration::from_secs(60),
        }
    }

    /// 制限を設定
    pub fn limits(mut self, limits: MultipartLimits) -> Self {
        self.limits = limits;
        self
    }

    /// 読み取りバッファサイズを設定
    pub fn read_buffer_size(mut self, size: usize) -> Self {
        self.read_buffer_size = size.max(1);
        self
    }

    /// 1 回の読み取りのタイムアウトを設定
    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    /// Content-Type ヘッダー値から境界を取り出してボディを読み取る
    pub async fn read<R>(&self, content_type: &str, reader: &mut R) -> Result<FormData>
    where
        R: AsyncRead + Unpin,
    {
        let decoder = MultipartDecoder::from_content_type_with_limits(
            content_type,
            Arc::clone(&self.storage),
            self.limits.clone(),
        )?;
        self.decode(decoder, reader).await
    }

    /// 境界を指定してボディを読み取る
    pub async fn read_with_boundary<R>(&self, boundary: &str, reader: &mut R) -> Result<FormData>
    where
        R: AsyncRead + Unpin,
    {
        let decoder = MultipartDecoder::with_limits(
            boundary,
            Arc::clone(&self.storage),
            self.limits.clone(),
        )?;
        self.decode(decoder, reader).await
    }

    /// EOF または終了境界まで読み取ってデコーダーに渡す
    ///
    /// 終了境界を検出した時点で読み取りをやめるため、エピローグは読み残される。
    pub async fn decode<R>(&self, mut decoder: MultipartDecoder, reader: &mut R) -> Result<FormData>
    where
        R: AsyncRead + Unpin,
    {
        let mut buf = vec![0u8; self.read_buffer_size];
        let mut total = 0u64;

        while !decoder.is_finished() {
            let n = tokio::time::timeout(self.read_timeout, reader.read(&mut buf)).await??;
            if n == 0 {
                log::debug!("multipart body ended without final boundary after {} bytes", total);
                break;
            }
            total += n as u64;
            log::trace!("multipart body read {} bytes (total {})", n, total);
            decoder.feed(&buf[..n])?;
        }

        Ok(decoder.end()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use shiguredo_multipart::{MemoryStorage, MultipartBuilder, MultipartError};
    use tokio::io::AsyncWriteExt;

    fn sample() -> MultipartBuilder {
        MultipartBuilder::with_boundary("----tokio")
            .text_field("x", "hello")
            .file_field("f", "a.txt", "text/plain", b"async file body")
    }

    #[tokio::test]
    async fn test_read_slice() {
        let storage = MemoryStorage::new();
        let builder = sample();
        let body = builder.build();

        let reader = FormDataReader::new(Arc::new(storage.clone())).read_buffer_size(3);
        let form = reader
            .read(&builder.content_type(), &mut body.as_slice())
            .await
            .unwrap();

        assert_eq!(form.field("x"), Some("hello"));
        let file = form.file("f").unwrap();
        assert_eq!(file.read_to_vec().unwrap(), b"async file body");

        drop(form);
        assert!(storage.is_empty());
    }

    #[tokio::test]
    async fn test_read_chunked_writer() {
        let storage = MemoryStorage::new();
        let body = sample().build();
        let (mut client, mut server) = tokio::io::duplex(64);

        let writer = tokio::spawn(async move {
            for chunk in body.chunks(11) {
                client.write_all(chunk).await.unwrap();
            }
            // 終了境界の後もストリームは開いたまま
            client
        });

        let reader = FormDataReader::new(Arc::new(storage));
        let form = reader
            .read_with_boundary("----tokio", &mut server)
            .await
            .unwrap();
        assert_eq!(form.field("x"), Some("hello"));
        assert!(form.file("f").is_some());

        drop(writer.await.unwrap());
    }

    #[tokio::test]
    async fn test_timeout_releases_spool() {
        let storage = MemoryStorage::new();
        let (mut client, mut server) = tokio::io::duplex(1024);
        client
            .write_all(
                b"--B\r\nContent-Disposition: form-data; name=\"f\"; filename=\"a\"\r\n\r\npartial data",
            )
            .await
            .unwrap();

        let reader = FormDataReader::new(Arc::new(storage.clone()))
            .read_timeout(Duration::from_millis(20));
        let result = reader.read_with_boundary("B", &mut server).await;

        assert!(matches!(result, Err(Error::Timeout)));
        assert!(storage.is_empty());
        drop(client);
    }

    #[tokio::test]
    async fn test_not_form_data() {
        let reader = FormDataReader::new(Arc::new(MemoryStorage::new()));
        let result = reader
            .read("application/json", &mut &b"{}"[..])
            .await;
        assert!(matches!(
            result,
            Err(Error::Multipart(MultipartError::NotFormData))
        ));
    }

    #[tokio::test]
    async fn test_eof_without_final_boundary() {
        let reader = FormDataReader::new(Arc::new(MemoryStorage::new()));
        let form = reader
            .read_with_boundary(
                "B",
                &mut &b"--B\r\nContent-Disposition: form-data; name=\"x\"\r\n\r\n1\r\n--B\r\n"[..],
            )
            .await
            .unwrap();
        assert_eq!(form.field("x"), Some("1"));
    }
}
