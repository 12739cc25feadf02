// Backups and usage statistics for the data dir

use chrono::Utc;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

use super::file_store::is_record_file;
use super::{BACKUP_DIR, COLLECTIONS};
use crate::error::StoreError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CollectionStats {
    pub name: String,
    pub records: usize,
    pub bytes: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StorageStats {
    pub data_dir: PathBuf,
    pub collections: Vec<CollectionStats>,
    pub backups: usize,
}

impl StorageStats {
    pub fn total_records(&self) -> usize {
        self.collections.iter().map(|c| c.records).sum()
    }

    pub fn total_bytes(&self) -> u64 {
        self.collections.iter().map(|c| c.bytes).sum()
    }
}

/// Record counts and sizes per collection
pub fn storage_stats(data_dir: &Path) -> Result<StorageStats, StoreError> {
    let mut collections = Vec::with_capacity(COLLECTIONS.len());

    for name in COLLECTIONS {
        let dir = data_dir.join(name);
        let mut stats = CollectionStats {
            name: name.to_string(),
            records: 0,
            bytes: 0,
        };
        if dir.is_dir() {
            for entry in fs::read_dir(&dir).map_err(|e| StoreError::io(&dir, e))?.flatten() {
                let path = entry.path();
                if is_record_file(&path) {
                    stats.records += 1;
                    stats.bytes += entry.metadata().map(|m| m.len()).unwrap_or(0);
                }
            }
        }
        collections.push(stats);
    }

    let backup_root = data_dir.join(BACKUP_DIR);
    let backups = if backup_root.is_dir() {
        fs::read_dir(&backup_root)
            .map_err(|e| StoreError::io(&backup_root, e))?
            .flatten()
            .filter(|e| e.path().is_dir())
            .count()
    } else {
        0
    };

    Ok(StorageStats {
        data_dir: data_dir.to_path_buf(),
        collections,
        backups,
    })
}

/// Copy every collection into `backups/<timestamp>/`; returns the backup dir
pub fn create_backup(data_dir: &Path) -> Result<PathBuf, StoreError> {
    let stamp = Utc::now().format("%Y%m%d_%H%M%S%.3f").to_string();
    let target = data_dir.join(BACKUP_DIR).join(stamp);
    fs::create_dir_all(&target).map_err(|e| StoreError::io(&target, e))?;

    let mut copied = 0usize;
    for name in COLLECTIONS {
        let source = data_dir.join(name);
        if !source.is_dir() {
            continue;
        }
        let dest = target.join(name);
        fs::create_dir_all(&dest).map_err(|e| StoreError::io(&dest, e))?;

        for entry in fs::read_dir(&source).map_err(|e| StoreError::io(&source, e))?.flatten() {
            let path = entry.path();
            if !is_record_file(&path) {
                continue;
            }
            let to = dest.join(entry.file_name());
            fs::copy(&path, &to).map_err(|e| StoreError::io(&to, e))?;
            copied += 1;
        }
    }

    tracing::info!("Backed up {} records to {}", copied, target.display());
    Ok(target)
}
