// Concurrent validation
//
// The same question goes to every participating character. Calls run as
// spawned tasks behind a semaphore so at most `max_concurrency` are in
// flight, each bounded by its own timeout. A failing character is recorded
// against its own id and never aborts the others.

use serde_json::json;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;

use super::types::{CharacterResponse, ValidationFailure, ValidationMode, ValidationSession};
use crate::characters::{Character, CharacterType};
use crate::config::ValidationSettings;
use crate::dialogue::DialogueEngine;
use crate::error::{Error, Result};
use crate::storage::FileStore;
use crate::templates::{self, TemplateRenderer};

type Outcome = std::result::Result<CharacterResponse, ValidationFailure>;

pub struct ConcurrentValidator {
    dialogue: Arc<DialogueEngine>,
    templates: Arc<TemplateRenderer>,
    sessions: FileStore<ValidationSession>,
    settings: ValidationSettings,
}

impl ConcurrentValidator {
    pub fn new(
        dialogue: Arc<DialogueEngine>,
        templates: Arc<TemplateRenderer>,
        sessions: FileStore<ValidationSession>,
        settings: ValidationSettings,
    ) -> Self {
        Self {
            dialogue,
            templates,
            sessions,
            settings,
        }
    }

    /// Ask every character the question and persist the collected session
    ///
    /// Duplicate ids are asked once. The session is written a single time,
    /// after all calls have finished.
    #[tracing::instrument(skip(self, question, character_ids), fields(characters = character_ids.len()))]
    pub async fn validate(
        &self,
        question: &str,
        character_ids: &[String],
        mode: ValidationMode,
    ) -> Result<ValidationSession> {
        let question = question.trim();
        if question.is_empty() {
            return Err(Error::InvalidInput("validation question must not be empty".into()));
        }

        let mut seen = HashSet::new();
        let participants: Vec<String> = character_ids
            .iter()
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty() && seen.insert(id.clone()))
            .collect();
        if participants.is_empty() {
            return Err(Error::InvalidInput("at least one character id is required".into()));
        }

        let mut session = ValidationSession::new(question, participants.clone(), mode);
        tracing::info!(
            "Validating with {} character(s), mode {}",
            participants.len(),
            mode
        );

        let outcomes = match mode {
            ValidationMode::Concurrent => self.fan_out(question, &participants).await,
            ValidationMode::Sequential => {
                let mut outcomes = Vec::with_capacity(participants.len());
                for id in &participants {
                    let outcome = self.ask_one(id, question).await;
                    outcomes.push((id.clone(), outcome));
                }
                outcomes
            }
        };

        for (id, outcome) in outcomes {
            match outcome {
                Ok(response) => {
                    session.responses.insert(id, response);
                }
                Err(failure) => {
                    tracing::warn!("Character {} failed: {}", id, failure);
                    session.failures.insert(id, failure);
                }
            }
        }

        session.notes = derive_notes(&session);
        session.completed_at = Some(chrono::Utc::now());
        self.sessions.save(&session)?;

        tracing::info!(
            "Validation {} collected {}/{} response(s)",
            session.id,
            session.responses.len(),
            session.participants.len()
        );
        Ok(session)
    }

    async fn fan_out(&self, question: &str, participants: &[String]) -> Vec<(String, Outcome)> {
        let semaphore = Arc::new(Semaphore::new(self.settings.max_concurrency.max(1)));
        let mut handles = Vec::with_capacity(participants.len());

        for id in participants {
            let permit = Arc::clone(&semaphore);
            let worker = Worker {
                dialogue: Arc::clone(&self.dialogue),
                templates: Arc::clone(&self.templates),
                settings: self.settings.clone(),
            };
            let task_id = id.clone();
            let question = question.to_string();

            let handle = tokio::spawn(async move {
                let _permit = match permit.acquire_owned().await {
                    Ok(p) => p,
                    Err(e) => return Err(ValidationFailure::new("cancelled", e.to_string())),
                };
                worker.ask(&task_id, &question).await
            });
            handles.push((id.clone(), handle));
        }

        let mut outcomes = Vec::with_capacity(handles.len());
        for (id, handle) in handles {
            let outcome = match handle.await {
                Ok(outcome) => outcome,
                Err(e) => Err(ValidationFailure::new("panic", e.to_string())),
            };
            outcomes.push((id, outcome));
        }
        outcomes
    }

    async fn ask_one(&self, character_id: &str, question: &str) -> Outcome {
        Worker {
            dialogue: Arc::clone(&self.dialogue),
            templates: Arc::clone(&self.templates),
            settings: self.settings.clone(),
        }
        .ask(character_id, question)
        .await
    }

    pub fn get(&self, validation_id: &str) -> Result<ValidationSession> {
        Ok(self.sessions.load(validation_id)?)
    }

    /// All sessions, newest first
    pub fn list(&self) -> Result<Vec<ValidationSession>> {
        let mut sessions = self.sessions.list()?;
        sessions.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(sessions)
    }
}

/// Owned state for one spawned call
struct Worker {
    dialogue: Arc<DialogueEngine>,
    templates: Arc<TemplateRenderer>,
    settings: ValidationSettings,
}

impl Worker {
    async fn ask(&self, character_id: &str, question: &str) -> Outcome {
        let character = self
            .dialogue
            .characters()
            .get(character_id)
            .map_err(|e| failure_from(&e))?;

        let prompt = self
            .templates
            .render(
                templates::VALIDATION,
                &json!({
                    "character_name": character.name,
                    "character_type": character.character_type.as_str(),
                    "background": character.background_line(),
                    "question": question,
                }),
            )
            .map_err(|e| ValidationFailure::new("template", e.to_string()))?;

        let timeout = self.settings.call_timeout();
        let started = Instant::now();
        let reply = tokio::time::timeout(
            timeout,
            self.dialogue
                .consult(&character, &prompt, self.settings.max_tokens, timeout),
        )
        .await
        .map_err(|_| ValidationFailure::new("timeout", format!("no reply within {:?}", timeout)))?
        .map_err(|e| failure_from(&e))?;

        Ok(response_for(&character, reply, started))
    }
}

fn response_for(character: &Character, content: String, started: Instant) -> CharacterResponse {
    CharacterResponse {
        character_name: character.name.clone(),
        character_type: character.character_type,
        content,
        elapsed_ms: started.elapsed().as_millis() as u64,
    }
}

fn failure_from(err: &Error) -> ValidationFailure {
    let kind = match err {
        Error::Provider(e) => e.kind(),
        Error::Store(_) if err.is_not_found() => "not_found",
        Error::Store(_) => "store",
        Error::Template(_) => "template",
        Error::Parse(_) => "parse",
        _ => "error",
    };
    ValidationFailure::new(kind, err.to_string())
}

/// Deterministic observations about coverage; judging content is left to analysis
fn derive_notes(session: &ValidationSession) -> Vec<String> {
    let mut notes = Vec::new();

    let missing = session.missing();
    if !missing.is_empty() {
        let labels: Vec<String> = missing
            .iter()
            .map(|id| match session.failures.get(*id) {
                Some(f) => format!("{} ({})", id, f.kind),
                None => (*id).to_string(),
            })
            .collect();
        notes.push(format!(
            "Incomplete: {} of {} character(s) did not respond: {}",
            missing.len(),
            session.participants.len(),
            labels.join(", ")
        ));
    }

    let types: HashSet<CharacterType> = session
        .responses
        .values()
        .map(|r| r.character_type)
        .collect();
    if session.responses.len() > 1 && types.len() == 1 {
        if let Some(only) = types.into_iter().next() {
            notes.push(format!(
                "All responses come from {} characters; other perspectives are not represented",
                only
            ));
        }
    }

    notes
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(name: &str, t: CharacterType) -> CharacterResponse {
        CharacterResponse {
            character_name: name.into(),
            character_type: t,
            content: "answer".into(),
            elapsed_ms: 5,
        }
    }

    #[test]
    fn test_notes_flag_missing_and_single_type() {
        let mut s = ValidationSession::new(
            "q",
            vec!["a".into(), "b".into(), "c".into()],
            ValidationMode::Concurrent,
        );
        s.responses.insert("a".into(), response("Ana", CharacterType::User));
        s.responses.insert("b".into(), response("Bo", CharacterType::User));
        s.failures.insert("c".into(), ValidationFailure::new("timeout", "slow"));

        let notes = derive_notes(&s);
        assert_eq!(notes.len(), 2);
        assert!(notes[0].contains("c (timeout)"));
        assert!(notes[1].contains("user characters"));
    }

    #[test]
    fn test_notes_empty_for_complete_mixed_session() {
        let mut s = ValidationSession::new("q", vec!["a".into(), "b".into()], ValidationMode::Concurrent);
        s.responses.insert("a".into(), response("Ana", CharacterType::User));
        s.responses.insert("b".into(), response("Dr. Lin", CharacterType::Expert));
        assert!(derive_notes(&s).is_empty());
    }

    #[test]
    fn test_failure_kind_for_missing_character() {
        let err = Error::Store(crate::error::StoreError::NotFound {
            collection: "characters".into(),
            id: "ghost".into(),
        });
        assert_eq!(failure_from(&err).kind, "not_found");
    }
}
