// Character CRUD over the file store

use chrono::Utc;
use serde::Serialize;
use serde_json::{Map, Value};
use std::path::Path;

use super::types::{Character, CharacterDraft, CharacterType};
use crate::error::{Error, Result, StoreError};
use crate::storage::{FileStore, StorageFormat};

/// Fields a patch may never change
const PROTECTED_FIELDS: &[&str] = &["id", "created_at", "updated_at"];

/// Typed convenience for the common edits; converts to a JSON merge patch
#[derive(Debug, Clone, Default, Serialize)]
pub struct CharacterPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub character_type: Option<CharacterType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "InfoPatch::is_empty")]
    pub info: InfoPatch,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct InfoPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub age: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub background: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub experience: Option<String>,
}

impl InfoPatch {
    pub fn is_empty(&self) -> bool {
        self.age.is_none()
            && self.position.is_none()
            && self.background.is_none()
            && self.experience.is_none()
    }
}

impl CharacterPatch {
    pub fn to_merge_patch(&self) -> Value {
        serde_json::to_value(self).unwrap_or_else(|_| Value::Object(Map::new()))
    }
}

/// File-backed character collection
#[derive(Debug, Clone)]
pub struct CharacterStore {
    records: FileStore<Character>,
}

impl CharacterStore {
    pub fn open(data_dir: &Path, format: StorageFormat) -> Result<Self> {
        Ok(Self {
            records: FileStore::open(data_dir, format)?,
        })
    }

    /// Assign an id and persist
    pub fn create(&self, draft: CharacterDraft) -> Result<Character> {
        if draft.name.trim().is_empty() {
            return Err(Error::InvalidInput("character name must not be empty".into()));
        }
        let character = Character::from_draft(draft);
        self.records.save(&character)?;
        tracing::info!(
            "Created {} character '{}' ({})",
            character.character_type,
            character.name,
            character.id
        );
        Ok(character)
    }

    pub fn get(&self, id: &str) -> Result<Character> {
        Ok(self.records.load(id)?)
    }

    /// All characters, oldest first
    pub fn list(&self) -> Result<Vec<Character>> {
        let mut characters = self.records.list()?;
        characters.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(characters)
    }

    pub fn list_by_type(&self, character_type: CharacterType) -> Result<Vec<Character>> {
        Ok(self
            .list()?
            .into_iter()
            .filter(|c| c.character_type == character_type)
            .collect())
    }

    pub fn search(&self, query: &str) -> Result<Vec<Character>> {
        Ok(self.list()?.into_iter().filter(|c| c.matches(query)).collect())
    }

    /// Merge `patch` (RFC 7396 JSON merge patch) into the stored record
    ///
    /// `null` resets a field to its default. Identity and timestamps are
    /// never taken from the patch.
    pub fn update(&self, id: &str, patch: &Value) -> Result<Character> {
        let current = self.get(id)?;
        let mut document = serde_json::to_value(&current).map_err(|e| StoreError::Serialize {
            path: self.records.dir().to_path_buf(),
            detail: e.to_string(),
        })?;

        let mut patch = patch.clone();
        if let Value::Object(fields) = &mut patch {
            for key in PROTECTED_FIELDS {
                fields.remove(*key);
            }
        } else {
            return Err(Error::InvalidInput("character patch must be a JSON object".into()));
        }
        merge_patch(&mut document, &patch);

        let mut updated: Character = serde_json::from_value(document)
            .map_err(|e| Error::InvalidInput(format!("patch produces an invalid character: {}", e)))?;
        if updated.name.trim().is_empty() {
            return Err(Error::InvalidInput("character name must not be empty".into()));
        }
        updated.id = current.id;
        updated.created_at = current.created_at;
        updated.updated_at = Utc::now();

        self.records.save(&updated)?;
        tracing::info!("Updated character {}", updated.id);
        Ok(updated)
    }

    pub fn delete(&self, id: &str) -> Result<()> {
        self.records.delete(id)?;
        tracing::info!("Deleted character {}", id);
        Ok(())
    }

    pub fn exists(&self, id: &str) -> bool {
        self.records.exists(id)
    }

    /// Key fields still empty on a stored character
    pub fn completeness(&self, id: &str) -> Result<Vec<&'static str>> {
        Ok(self.get(id)?.missing_fields())
    }
}

/// RFC 7396 merge: objects merge recursively, `null` deletes, anything else replaces
fn merge_patch(target: &mut Value, patch: &Value) {
    match patch {
        Value::Object(patch_fields) => {
            if !target.is_object() {
                *target = Value::Object(Map::new());
            }
            if let Value::Object(target_fields) = target {
                for (key, value) in patch_fields {
                    if value.is_null() {
                        target_fields.remove(key);
                    } else {
                        merge_patch(
                            target_fields.entry(key.clone()).or_insert(Value::Null),
                            value,
                        );
                    }
                }
            }
        }
        other => *target = other.clone(),
    }
}
