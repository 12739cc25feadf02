// Validation session data model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

use crate::characters::CharacterType;
use crate::storage::Record;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationMode {
    #[default]
    Concurrent,
    Sequential,
}

impl fmt::Display for ValidationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Concurrent => "concurrent",
            Self::Sequential => "sequential",
        })
    }
}

/// One character's answer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CharacterResponse {
    pub character_name: String,
    pub character_type: CharacterType,
    pub content: String,
    pub elapsed_ms: u64,
}

/// Why a character produced no answer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationFailure {
    /// Short label such as `timeout`, `not_found` or `auth`
    pub kind: String,
    pub message: String,
}

impl ValidationFailure {
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.kind, self.message)
    }
}

/// One question put to several characters
///
/// Responses and failures are keyed by character id; every participant
/// ends up in exactly one of the two maps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationSession {
    pub id: String,
    pub question: String,
    pub participants: Vec<String>,
    #[serde(default)]
    pub responses: BTreeMap<String, CharacterResponse>,
    #[serde(default)]
    pub failures: BTreeMap<String, ValidationFailure>,
    #[serde(default)]
    pub notes: Vec<String>,
    #[serde(default)]
    pub mode: ValidationMode,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
}

impl ValidationSession {
    pub fn new(question: impl Into<String>, participants: Vec<String>, mode: ValidationMode) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            question: question.into(),
            participants,
            responses: BTreeMap::new(),
            failures: BTreeMap::new(),
            notes: Vec::new(),
            mode,
            created_at: Utc::now(),
            completed_at: None,
        }
    }

    /// Every participant answered
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty() && self.responses.len() == self.participants.len()
    }

    /// Participant ids without a response, in participant order
    pub fn missing(&self) -> Vec<&str> {
        self.participants
            .iter()
            .filter(|id| !self.responses.contains_key(*id))
            .map(String::as_str)
            .collect()
    }

    /// Responses sorted by character name, then id, for display
    pub fn ordered_responses(&self) -> Vec<(&str, &CharacterResponse)> {
        let mut ordered: Vec<(&str, &CharacterResponse)> = self
            .responses
            .iter()
            .map(|(id, r)| (id.as_str(), r))
            .collect();
        ordered.sort_by(|a, b| {
            a.1.character_name
                .to_lowercase()
                .cmp(&b.1.character_name.to_lowercase())
                .then_with(|| a.0.cmp(b.0))
        });
        ordered
    }
}

impl Record for ValidationSession {
    const COLLECTION: &'static str = "validations";

    fn id(&self) -> &str {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(name: &str) -> CharacterResponse {
        CharacterResponse {
            character_name: name.into(),
            character_type: CharacterType::User,
            content: format!("{} says hi", name),
            elapsed_ms: 1,
        }
    }

    #[test]
    fn test_missing_and_complete() {
        let mut s = ValidationSession::new(
            "q",
            vec!["a".into(), "b".into(), "c".into()],
            ValidationMode::Concurrent,
        );
        s.responses.insert("a".into(), response("Ana"));
        s.responses.insert("c".into(), response("Cy"));
        s.failures.insert("b".into(), ValidationFailure::new("timeout", "slow"));

        assert!(!s.is_complete());
        assert_eq!(s.missing(), vec!["b"]);

        s.failures.clear();
        s.responses.insert("b".into(), response("Bo"));
        assert!(s.is_complete());
    }

    #[test]
    fn test_ordered_responses_sorted_by_name() {
        let mut s = ValidationSession::new("q", vec![], ValidationMode::Concurrent);
        s.responses.insert("z1".into(), response("alice"));
        s.responses.insert("a1".into(), response("Zed"));
        s.responses.insert("m1".into(), response("Bob"));
        let names: Vec<&str> = s
            .ordered_responses()
            .iter()
            .map(|(_, r)| r.character_name.as_str())
            .collect();
        assert_eq!(names, vec!["alice", "Bob", "Zed"]);
    }
}
