use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use folio_core::{BookmarkStorage, StorageError, BOOKMARKS_KEY};
use folio_logging::folio_debug;
use tempfile::NamedTempFile;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("storage directory missing or not writable: {0}")]
    StorageDir(String),
    #[error("invalid storage key {0:?}")]
    InvalidKey(String),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

/// Ensure the storage directory exists; create if missing.
pub fn ensure_storage_dir(dir: &Path) -> Result<(), PersistError> {
    if dir.exists() {
        let meta = fs::metadata(dir).map_err(|e| PersistError::StorageDir(e.to_string()))?;
        if !meta.is_dir() {
            return Err(PersistError::StorageDir("path is not a directory".into()));
        }
    } else {
        fs::create_dir_all(dir).map_err(|e| PersistError::StorageDir(e.to_string()))?;
    }
    Ok(())
}

/// Writes `{dir}/{filename}` through a temp file and a rename, so readers
/// see either the old or the new content.
#[derive(Debug, Clone)]
pub struct AtomicFileWriter {
    dir: PathBuf,
}

impl AtomicFileWriter {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn write(&self, filename: &str, content: &str) -> Result<PathBuf, PersistError> {
        ensure_storage_dir(&self.dir)?;

        let target = self.dir.join(filename);
        let mut tmp = NamedTempFile::new_in(&self.dir)?;
        tmp.write_all(content.as_bytes())?;
        tmp.flush()?;
        tmp.as_file_mut().sync_all()?;
        tmp.persist(&target).map_err(|e| PersistError::Io(e.error))?;
        Ok(target)
    }
}

/// String values stored one file per key, `{dir}/{key}.json`.
#[derive(Debug, Clone)]
pub struct KeyValueDir {
    writer: AtomicFileWriter,
}

impl KeyValueDir {
    pub fn new(dir: PathBuf) -> Self {
        Self {
            writer: AtomicFileWriter::new(dir),
        }
    }

    pub fn path_for(&self, key: &str) -> Result<PathBuf, PersistError> {
        Ok(self.writer.dir().join(file_name(key)?))
    }

    /// `Ok(None)` when the key was never written.
    pub fn get(&self, key: &str) -> Result<Option<String>, PersistError> {
        match fs::read_to_string(self.path_for(key)?) {
            Ok(value) => Ok(Some(value)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    pub fn put(&self, key: &str, value: &str) -> Result<PathBuf, PersistError> {
        let path = self.writer.write(&file_name(key)?, value)?;
        folio_debug!("stored {} ({} bytes)", path.display(), value.len());
        Ok(path)
    }
}

fn file_name(key: &str) -> Result<String, PersistError> {
    let valid = !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if !valid {
        return Err(PersistError::InvalidKey(key.to_string()));
    }
    Ok(format!("{key}.json"))
}

/// Bookmark tree kept under the `bookmarks` key of a [`KeyValueDir`].
#[derive(Debug, Clone)]
pub struct FileBookmarkStorage {
    store: KeyValueDir,
}

impl FileBookmarkStorage {
    pub fn new(dir: PathBuf) -> Self {
        Self {
            store: KeyValueDir::new(dir),
        }
    }
}

impl BookmarkStorage for FileBookmarkStorage {
    fn load(&self) -> Result<Option<String>, StorageError> {
        self.store
            .get(BOOKMARKS_KEY)
            .map_err(|err| StorageError::Read(err.to_string()))
    }

    fn save(&mut self, serialized: &str) -> Result<(), StorageError> {
        self.store
            .put(BOOKMARKS_KEY, serialized)
            .map(|_| ())
            .map_err(|err| StorageError::Write(err.to_string()))
    }
}
