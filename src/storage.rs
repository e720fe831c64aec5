//! ファイルパートの一時ストレージ
//!
//! ファイルパートのボディは到着した順に一時ストレージへ書き出されます。
//! ストレージは [`TempStorage`] トレイトで抽象化されており、
//! ディスク上のディレクトリ ([`DiskStorage`]) とメモリ ([`MemoryStorage`]) の実装を提供します。
//!
//! 書き出されたオブジェクトは [`StoredFile`] が所有し、
//! `release()` を呼ぶか、スコープを抜けた時点で削除されます。

use std::collections::HashMap;
use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::log::warning;

/// 一時オブジェクトへの書き込みハンドル
pub trait SpoolWriter: Send {
    /// データを書き込む
    fn write(&mut self, data: &[u8]) -> io::Result<()>;

    /// 書き込みを完了してハンドルを閉じる
    fn close(self: Box<Self>) -> io::Result<()>;
}

/// 一時ストレージ
pub trait TempStorage: fmt::Debug + Send + Sync {
    /// 名前を指定して一時オブジェクトを作成する
    ///
    /// 同名のオブジェクトが既に存在する場合は `AlreadyExists` を返す。
    fn create(&self, name: &str) -> io::Result<Box<dyn SpoolWriter>>;

    /// 一時オブジェクトを読み取り用に開く
    fn open(&self, name: &str) -> io::Result<Box<dyn Read + Send>>;

    /// 一時オブジェクトを削除する
    fn delete(&self, name: &str) -> io::Result<()>;

    /// ファイルシステム上のパス (存在する場合)
    fn path(&self, _name: &str) -> Option<PathBuf> {
        None
    }
}

static SPOOL_COUNTER: AtomicU64 = AtomicU64::new(1);

/// プロセス内で一意な一時オブジェクト名を生成する
pub fn unique_name() -> String {
    let counter = SPOOL_COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("shiguredo-multipart-{}-{}.tmp", std::process::id(), counter)
}

// ========================================
// DiskStorage
// ========================================

/// ディレクトリ上の一時ファイルを使うストレージ
#[derive(Debug, Clone)]
pub struct DiskStorage {
    dir: PathBuf,
}

impl Default for DiskStorage {
    fn default() -> Self {
        Self::new(std::env::temp_dir())
    }
}

impl DiskStorage {
    /// 一時ファイルを置くディレクトリを指定して作成
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        DiskStorage { dir: dir.into() }
    }

    /// 一時ファイルを置くディレクトリを取得
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

struct DiskWriter {
    file: BufWriter<File>,
}

impl SpoolWriter for DiskWriter {
    fn write(&mut self, data: &[u8]) -> io::Result<()> {
        self.file.write_all(data)
    }

    fn close(mut self: Box<Self>) -> io::Result<()> {
        self.file.flush()
    }
}

impl TempStorage for DiskStorage {
    fn create(&self, name: &str) -> io::Result<Box<dyn SpoolWriter>> {
        let file = OpenOptions::new()
            .create_new(true)
            .write(true)
            .open(self.dir.join(name))?;
        Ok(Box::new(DiskWriter {
            file: BufWriter::new(file),
        }))
    }

    fn open(&self, name: &str) -> io::Result<Box<dyn Read + Send>> {
        Ok(Box::new(File::open(self.dir.join(name))?))
    }

    fn delete(&self, name: &str) -> io::Result<()> {
        std::fs::remove_file(self.dir.join(name))
    }

    fn path(&self, name: &str) -> Option<PathBuf> {
        Some(self.dir.join(name))
    }
}

// ========================================
// MemoryStorage
// ========================================

/// メモリ上のストレージ
///
/// クローンは同じ領域を共有する。
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    objects: Arc<Mutex<HashMap<String, Vec<u8>>>>,
}

impl MemoryStorage {
    /// 新しいストレージを作成
    pub fn new() -> Self {
        Self::default()
    }

    /// 保持しているオブジェクト数
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// オブジェクトを保持していないかどうか
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// オブジェクトの内容を取得
    pub fn get(&self, name: &str) -> Option<Vec<u8>> {
        self.lock().get(name).cloned()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Vec<u8>>> {
        lock_objects(&self.objects)
    }
}

fn lock_objects(
    objects: &Mutex<HashMap<String, Vec<u8>>>,
) -> MutexGuard<'_, HashMap<String, Vec<u8>>> {
    // 書き込み途中で panic しても map 自体は壊れない
    objects.lock().unwrap_or_else(|e| e.into_inner())
}

struct MemoryWriter {
    objects: Arc<Mutex<HashMap<String, Vec<u8>>>>,
    name: String,
}

impl SpoolWriter for MemoryWriter {
    fn write(&mut self, data: &[u8]) -> io::Result<()> {
        let mut objects = lock_objects(&self.objects);
        let object = objects
            .get_mut(&self.name)
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "object deleted"))?;
        object.extend_from_slice(data);
        Ok(())
    }

    fn close(self: Box<Self>) -> io::Result<()> {
        Ok(())
    }
}

impl TempStorage for MemoryStorage {
    fn create(&self, name: &str) -> io::Result<Box<dyn SpoolWriter>> {
        let mut objects = self.lock();
        if objects.contains_key(name) {
            return Err(io::Error::new(
                io::ErrorKind::AlreadyExists,
                "object already exists",
            ));
        }
        objects.insert(name.to_string(), Vec::new());
        Ok(Box::new(MemoryWriter {
            objects: Arc::clone(&self.objects),
            name: name.to_string(),
        }))
    }

    fn open(&self, name: &str) -> io::Result<Box<dyn Read + Send>> {
        let data = self
            .get(name)
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "object not found"))?;
        Ok(Box::new(io::Cursor::new(data)))
    }

    fn delete(&self, name: &str) -> io::Result<()> {
        self.lock()
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "object not found"))
    }
}

// ========================================
// StoredFile
// ========================================

/// 書き出し済みの一時オブジェクト
///
/// ドロップ時にオブジェクトを削除する。削除せずに残す場合は [`StoredFile::persist`] を使う。
pub struct StoredFile {
    storage: Arc<dyn TempStorage>,
    name: String,
    armed: bool,
}

impl fmt::Debug for StoredFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoredFile")
            .field("name", &self.name)
            .field("storage", &self.storage)
            .finish()
    }
}

impl StoredFile {
    pub(crate) fn new(storage: Arc<dyn TempStorage>, name: String) -> Self {
        StoredFile {
            storage,
            name,
            armed: true,
        }
    }

    /// ストレージ上の名前を取得
    pub fn name(&self) -> &str {
        &self.name
    }

    /// ファイルシステム上のパスを取得 (ディスクストレージの場合)
    pub fn path(&self) -> Option<PathBuf> {
        self.storage.path(&self.name)
    }

    /// 読み取り用に開く
    pub fn open(&self) -> io::Result<Box<dyn Read + Send>> {
        self.storage.open(&self.name)
    }

    /// 内容をすべて読み取る
    pub fn read_to_vec(&self) -> io::Result<Vec<u8>> {
        let mut data = Vec::new();
        self.open()?.read_to_end(&mut data)?;
        Ok(data)
    }

    /// オブジェクトを削除する
    pub fn release(mut self) -> io::Result<()> {
        self.armed = false;
        self.storage.delete(&self.name)
    }

    /// 削除せずに残し、名前を返す
    ///
    /// 以後の削除は呼び出し側の責任となる。
    pub fn persist(mut self) -> String {
        self.armed = false;
        std::mem::take(&mut self.name)
    }
}

impl Drop for StoredFile {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        if let Err(_e) = self.storage.delete(&self.name) {
            warning!("failed to delete temporary object {}: {}", self.name, _e);
        }
    }
}
