// File-backed persistence
//
// One directory per collection under the data dir, one human-readable
// file per record. Every mutation is written through immediately.

mod file_store;
mod maintenance;

pub use file_store::{FileStore, Record};
pub use maintenance::{create_backup, storage_stats, CollectionStats, StorageStats};

use serde::{Deserialize, Serialize};
use std::fmt;

/// Collections managed under the data dir, in display order
pub const COLLECTIONS: &[&str] = &[
    "characters",
    "dialogues",
    "explorations",
    "validations",
    "reports",
];

/// Directory under the data dir holding timestamped backups
pub const BACKUP_DIR: &str = "backups";

/// Every file extension a record may be stored under
pub const RECORD_EXTENSIONS: &[&str] = &["json", "yaml", "yml"];

/// On-disk record encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageFormat {
    #[default]
    Json,
    Yaml,
}

impl StorageFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Yaml => "yaml",
        }
    }

    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext {
            "json" => Some(Self::Json),
            "yaml" | "yml" => Some(Self::Yaml),
            _ => None,
        }
    }
}

impl fmt::Display for StorageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}
