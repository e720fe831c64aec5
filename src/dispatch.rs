//! 完成したパートの振り分け
//!
//! パートの `Content-Disposition` を見て、フィールドかファイルかを判定します。
//!
//! - `form-data` で `name` と `filename` がある: ファイル (一時ストレージへ書き出す)
//! - `form-data` で `name` のみ: フィールド (ボディを文字列として保持する)
//! - それ以外: 破棄
//!
//! 同じ名前のパートが複数ある場合は後勝ちです。

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::error::MultipartError;
use crate::header_params::HeaderParameters;
use crate::limits::MultipartLimits;
use crate::log::{debug, warning};
use crate::part::{Part, PartHeaders, PartParser};
use crate::storage::{SpoolWriter, StoredFile, TempStorage, unique_name};

/// フィールド
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldRecord {
    /// フィールド名
    pub name: String,
    /// 値 (UTF-8 として解釈できないバイトは置換文字になる)
    pub value: String,
}

/// ファイル
#[derive(Debug)]
pub struct FileRecord {
    /// フィールド名
    pub field_name: String,
    /// クライアントが申告したファイル名
    pub filename: String,
    /// パートの Content-Type ヘッダー値
    pub content_type: Option<String>,
    /// 書き出したバイト数
    pub size: u64,
    /// 一時オブジェクト
    pub stored: StoredFile,
}

impl FileRecord {
    /// 一時オブジェクトの内容をすべて読み取る
    pub fn read_to_vec(&self) -> std::io::Result<Vec<u8>> {
        self.stored.read_to_vec()
    }

    /// 一時オブジェクトを削除する
    pub fn release(self) -> std::io::Result<()> {
        self.stored.release()
    }
}

/// パートの振り分け結果
#[derive(Debug)]
pub enum PartRecord {
    Field(FieldRecord),
    File(FileRecord),
}

/// デコード結果
#[derive(Debug, Default)]
pub struct FormData {
    fields: HashMap<String, FieldRecord>,
    files: HashMap<String, FileRecord>,
}

impl FormData {
    /// フィールド値を取得
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(|f| f.value.as_str())
    }

    /// ファイルを取得
    pub fn file(&self, name: &str) -> Option<&FileRecord> {
        self.files.get(name)
    }

    /// ファイルを取り出す
    pub fn take_file(&mut self, name: &str) -> Option<FileRecord> {
        self.files.remove(name)
    }

    /// すべてのフィールド
    pub fn fields(&self) -> &HashMap<String, FieldRecord> {
        &self.fields
    }

    /// すべてのファイル
    pub fn files(&self) -> &HashMap<String, FileRecord> {
        &self.files
    }

    /// フィールドとファイルに分解する
    pub fn into_parts(self) -> (HashMap<String, FieldRecord>, HashMap<String, FileRecord>) {
        (self.fields, self.files)
    }

    /// すべての一時オブジェクトを削除する
    ///
    /// 最初に失敗した削除のエラーを返すが、残りの削除は続行する。
    pub fn release(self) -> std::io::Result<()> {
        let mut result = Ok(());
        for (_, file) in self.files {
            if let Err(e) = file.release() {
                if result.is_ok() {
                    result = Err(e);
                }
            }
        }
        result
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty() && self.files.is_empty()
    }

    /// 記録を追加する (同名は後勝ち、置き換えられたファイルはドロップ時に削除される)
    pub fn insert(&mut self, record: PartRecord) {
        match record {
            PartRecord::Field(field) => {
                self.fields.insert(field.name.clone(), field);
            }
            PartRecord::File(file) => {
                self.files.insert(file.field_name.clone(), file);
            }
        }
    }
}

/// 書き出し中のファイル
///
/// 完了前にドロップされた場合は一時オブジェクトを削除する。
struct Spool {
    storage: Arc<dyn TempStorage>,
    object_name: String,
    writer: Option<Box<dyn SpoolWriter>>,
    field_name: String,
    filename: String,
    content_type: Option<String>,
    size: u64,
}

impl fmt::Debug for Spool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Spool")
            .field("object_name", &self.object_name)
            .field("field_name", &self.field_name)
            .field("size", &self.size)
            .finish()
    }
}

impl Spool {
    fn write(&mut self, data: &[u8], limit: u64) -> Result<(), MultipartError> {
        if data.is_empty() {
            return Ok(());
        }
        let size = self.size.saturating_add(data.len() as u64);
        if size > limit {
            return Err(MultipartError::FileTooLarge { size, limit });
        }
        if let Some(writer) = self.writer.as_mut() {
            writer.write(data)?;
        }
        self.size = size;
        Ok(())
    }

    fn finish(mut self) -> Result<FileRecord, MultipartError> {
        if let Some(writer) = self.writer.take() {
            writer.close()?;
        }
        let stored = StoredFile::new(
            Arc::clone(&self.storage),
            std::mem::take(&mut self.object_name),
        );
        Ok(FileRecord {
            field_name: std::mem::take(&mut self.field_name),
            filename: std::mem::take(&mut self.filename),
            content_type: self.content_type.take(),
            size: self.size,
            stored,
        })
    }
}

impl Drop for Spool {
    fn drop(&mut self) {
        // finish() 済みなら名前は空になっている
        if self.object_name.is_empty() {
            return;
        }
        drop(self.writer.take());
        if let Err(_e) = self.storage.delete(&self.object_name) {
            warning!(
                "failed to delete incomplete temporary object {}: {}",
                self.object_name,
                _e
            );
        }
    }
}

/// 現在のパートの行き先
#[derive(Debug)]
enum Sink {
    Field { name: String },
    File(Spool),
    Discard,
}

/// パートの振り分け
#[derive(Debug)]
pub(crate) struct Dispatcher {
    storage: Arc<dyn TempStorage>,
    limits: MultipartLimits,
    /// 現在のパートの行き先 (ヘッダー確定前は None)
    sink: Option<Sink>,
    parts: usize,
    form: FormData,
}

impl Dispatcher {
    pub(crate) fn new(storage: Arc<dyn TempStorage>, limits: MultipartLimits) -> Self {
        Dispatcher {
            storage,
            limits,
            sink: None,
            parts: 0,
            form: FormData::default(),
        }
    }

    pub(crate) fn limits(&self) -> &MultipartLimits {
        &self.limits
    }

    pub(crate) fn form(&self) -> &FormData {
        &self.form
    }

    /// 新しいパートの開始
    pub(crate) fn begin_part(&mut self) -> Result<(), MultipartError> {
        self.sink = None;
        self.parts += 1;
        if self.parts > self.limits.max_parts {
            return Err(MultipartError::TooManyParts {
                count: self.parts,
                limit: self.limits.max_parts,
            });
        }
        Ok(())
    }

    /// feed 後に蓄積されたボディを行き先へ流す
    pub(crate) fn pump(&mut self, parser: &mut PartParser) -> Result<(), MultipartError> {
        if !parser.headers_complete() {
            return Ok(());
        }
        if self.sink.is_none() {
            self.sink = Some(self.open_sink(parser.headers())?);
        }
        match self.sink.as_mut() {
            Some(Sink::File(spool)) => spool.write(&parser.take_body(), self.limits.max_file_size),
            Some(Sink::Discard) => {
                parser.take_body();
                Ok(())
            }
            Some(Sink::Field { .. }) => check_field_size(parser.body_len(), &self.limits),
            None => Ok(()),
        }
    }

    /// 完成したパートを記録する
    pub(crate) fn complete_part(&mut self, part: Part) -> Result<(), MultipartError> {
        let sink = match self.sink.take() {
            Some(sink) => sink,
            None => self.open_sink(part.headers())?,
        };
        match sink {
            Sink::Field { name } => {
                check_field_size(part.body().len(), &self.limits)?;
                let value = String::from_utf8_lossy(part.body()).into_owned();
                debug!("multipart: field {:?} ({} bytes)", name, part.body().len());
                self.form
                    .insert(PartRecord::Field(FieldRecord { name, value }));
            }
            Sink::File(mut spool) => {
                spool.write(part.body(), self.limits.max_file_size)?;
                let file = spool.finish()?;
                debug!(
                    "multipart: file {:?} filename={:?} ({} bytes)",
                    file.field_name, file.filename, file.size
                );
                self.form.insert(PartRecord::File(file));
            }
            Sink::Discard => {}
        }
        Ok(())
    }

    /// 書き出し中のファイルを破棄する
    pub(crate) fn abort_part(&mut self) {
        self.sink = None;
    }

    pub(crate) fn into_form(mut self) -> FormData {
        self.abort_part();
        std::mem::take(&mut self.form)
    }

    fn open_sink(&self, headers: &PartHeaders) -> Result<Sink, MultipartError> {
        let Some(raw) = headers.get("content-disposition") else {
            debug!("multipart: part without content-disposition dropped");
            return Ok(Sink::Discard);
        };
        let disposition = HeaderParameters::parse("content-disposition", raw);
        let is_form_data = disposition
            .value()
            .is_some_and(|v| v.eq_ignore_ascii_case("form-data"));
        let (true, Some(name)) = (is_form_data, disposition.name()) else {
            debug!("multipart: part with unusable content-disposition dropped: {}", raw);
            return Ok(Sink::Discard);
        };

        let Some(filename) = disposition.filename() else {
            return Ok(Sink::Field {
                name: name.to_string(),
            });
        };

        let object_name = unique_name();
        let writer = self.storage.create(&object_name)?;
        Ok(Sink::File(Spool {
            storage: Arc::clone(&self.storage),
            object_name,
            writer: Some(writer),
            field_name: name.to_string(),
            filename: filename.to_string(),
            content_type: headers.get("content-type").map(str::to_string),
            size: 0,
        }))
    }
}

fn check_field_size(size: usize, limits: &MultipartLimits) -> Result<(), MultipartError> {
    if size > limits.max_field_size {
        return Err(MultipartError::FieldTooLarge {
            size,
            limit: limits.max_field_size,
        });
    }
    Ok(())
}
