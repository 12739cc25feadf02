// Generic record store with atomic writes

use serde::{de::DeserializeOwned, Serialize};
use std::fs::{self, File};
use std::io::Write;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use super::{StorageFormat, RECORD_EXTENSIONS};
use crate::error::StoreError;

/// A persisted entity with a stable string id
pub trait Record: Serialize + DeserializeOwned + Send + Sync {
    /// Directory name under the data dir
    const COLLECTION: &'static str;

    fn id(&self) -> &str;
}

/// One collection of records, one file per record
///
/// Writes go to a hidden temp file, are fsynced, then renamed over the
/// target. There is no locking: concurrent writers to the same id are last
/// write wins.
pub struct FileStore<T> {
    dir: PathBuf,
    format: StorageFormat,
    _record: PhantomData<fn() -> T>,
}

impl<T> Clone for FileStore<T> {
    fn clone(&self) -> Self {
        Self {
            dir: self.dir.clone(),
            format: self.format,
            _record: PhantomData,
        }
    }
}

impl<T> std::fmt::Debug for FileStore<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileStore")
            .field("dir", &self.dir)
            .field("format", &self.format)
            .finish()
    }
}

impl<T: Record> FileStore<T> {
    /// Open (creating if needed) the collection directory under `data_dir`
    pub fn open(data_dir: &Path, format: StorageFormat) -> Result<Self, StoreError> {
        let dir = data_dir.join(T::COLLECTION);
        fs::create_dir_all(&dir).map_err(|e| StoreError::io(&dir, e))?;
        Ok(Self {
            dir,
            format,
            _record: PhantomData,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn format(&self) -> StorageFormat {
        self.format
    }

    /// Write (create or replace) a record
    pub fn save(&self, record: &T) -> Result<(), StoreError> {
        let id = record.id();
        if !is_safe_id(id) {
            return Err(StoreError::Serialize {
                path: self.dir.clone(),
                detail: format!("record id '{}' is not a valid file name", id),
            });
        }

        let path = self.path_for(id, self.format);
        let body = encode(record, self.format, &path)?;

        let tmp_path = self.dir.join(format!(".{}.{}.tmp", id, self.format.extension()));
        let mut tmp_file = File::create(&tmp_path).map_err(|e| StoreError::io(&tmp_path, e))?;
        tmp_file
            .write_all(body.as_bytes())
            .and_then(|_| tmp_file.sync_all())
            .map_err(|e| StoreError::io(&tmp_path, e))?;
        drop(tmp_file);

        fs::rename(&tmp_path, &path).map_err(|e| StoreError::io(&path, e))?;

        // A copy under any other extension must not shadow this one
        for stale in self.candidate_paths(id).into_iter().filter(|p| *p != path) {
            if stale.exists() {
                fs::remove_file(&stale).map_err(|e| StoreError::io(&stale, e))?;
            }
        }

        tracing::debug!("Saved {} record {}", T::COLLECTION, id);
        Ok(())
    }

    /// Load a record by id; files in either format are accepted
    pub fn load(&self, id: &str) -> Result<T, StoreError> {
        let path = self.find(id).ok_or_else(|| self.not_found(id))?;
        read_record(&path)
    }

    pub fn exists(&self, id: &str) -> bool {
        self.find(id).is_some()
    }

    pub fn delete(&self, id: &str) -> Result<(), StoreError> {
        let path = self.find(id).ok_or_else(|| self.not_found(id))?;
        fs::remove_file(&path).map_err(|e| StoreError::io(&path, e))?;
        tracing::debug!("Deleted {} record {}", T::COLLECTION, id);
        Ok(())
    }

    /// All readable records; unreadable files are logged and skipped
    pub fn list(&self) -> Result<Vec<T>, StoreError> {
        let mut records = Vec::new();
        for path in self.record_paths()? {
            match read_record::<T>(&path) {
                Ok(record) => records.push(record),
                Err(e) => tracing::warn!("Skipping unreadable record: {}", e),
            }
        }
        Ok(records)
    }

    /// Number of record files in the collection
    pub fn count(&self) -> Result<usize, StoreError> {
        Ok(self.record_paths()?.len())
    }

    fn record_paths(&self) -> Result<Vec<PathBuf>, StoreError> {
        let entries = fs::read_dir(&self.dir).map_err(|e| StoreError::io(&self.dir, e))?;
        let mut paths: Vec<PathBuf> = entries
            .flatten()
            .map(|entry| entry.path())
            .filter(|path| is_record_file(path))
            .collect();
        paths.sort();
        Ok(paths)
    }

    fn find(&self, id: &str) -> Option<PathBuf> {
        if !is_safe_id(id) {
            return None;
        }
        self.candidate_paths(id)
            .into_iter()
            .find(|path| path.is_file())
    }

    /// Paths a record may live at, the configured format first
    fn candidate_paths(&self, id: &str) -> Vec<PathBuf> {
        let preferred = self.format.extension();
        std::iter::once(preferred)
            .chain(RECORD_EXTENSIONS.iter().copied().filter(|ext| *ext != preferred))
            .map(|ext| self.dir.join(format!("{}.{}", id, ext)))
            .collect()
    }

    fn path_for(&self, id: &str, format: StorageFormat) -> PathBuf {
        self.dir.join(format!("{}.{}", id, format.extension()))
    }

    fn not_found(&self, id: &str) -> StoreError {
        StoreError::NotFound {
            collection: T::COLLECTION.to_string(),
            id: id.to_string(),
        }
    }
}

/// Ids become file names, so anything that could escape the directory is rejected
fn is_safe_id(id: &str) -> bool {
    !id.is_empty()
        && !id.starts_with('.')
        && !id.contains(['/', '\\'])
        && !id.contains("..")
}

pub(crate) fn is_record_file(path: &Path) -> bool {
    let hidden = path
        .file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.starts_with('.'))
        .unwrap_or(true);
    let known_ext = path
        .extension()
        .and_then(|e| e.to_str())
        .and_then(StorageFormat::from_extension)
        .is_some();
    path.is_file() && !hidden && known_ext
}

fn encode<T: Serialize>(record: &T, format: StorageFormat, path: &Path) -> Result<String, StoreError> {
    let result = match format {
        StorageFormat::Json => serde_json::to_string_pretty(record).map_err(|e| e.to_string()),
        StorageFormat::Yaml => serde_yaml::to_string(record).map_err(|e| e.to_string()),
    };
    result.map_err(|detail| StoreError::Serialize {
        path: path.to_path_buf(),
        detail,
    })
}

fn read_record<T: DeserializeOwned>(path: &Path) -> Result<T, StoreError> {
    let contents = fs::read_to_string(path).map_err(|e| StoreError::io(path, e))?;
    let format = path
        .extension()
        .and_then(|e| e.to_str())
        .and_then(StorageFormat::from_extension)
        .unwrap_or_default();

    let result = match format {
        StorageFormat::Json => serde_json::from_str(&contents).map_err(|e| e.to_string()),
        StorageFormat::Yaml => serde_yaml::from_str(&contents).map_err(|e| e.to_string()),
    };
    result.map_err(|detail| StoreError::Deserialize {
        path: path.to_path_buf(),
        detail,
    })
}
