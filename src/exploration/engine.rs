// Iterative idea exploration
//
// Each round renders the running findings plus the latest input into a
// prompt, asks the model for a JSON update and folds it into the session.
// A reply that does not parse is returned as an error and the session is
// left exactly as it was.

use serde_json::json;
use std::sync::Arc;

use super::types::{ExplorationRound, ExplorationSession, ExplorationSummary, ExplorationUpdate, QuestionFocus};
use crate::config::GenerationSettings;
use crate::error::{Error, Result};
use crate::parsing::extract_json;
use crate::providers::{ChatMessage, LlmProvider, ProviderRequest};
use crate::storage::FileStore;
use crate::templates::{self, TemplateRenderer};

const EXPLORER_SYSTEM_PROMPT: &str = "You are a product strategist who helps people develop rough ideas. \
     Always answer with a single JSON object in the requested shape.";

pub struct ExplorationEngine {
    provider: Arc<dyn LlmProvider>,
    templates: Arc<TemplateRenderer>,
    sessions: FileStore<ExplorationSession>,
    generation: GenerationSettings,
}

impl ExplorationEngine {
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        templates: Arc<TemplateRenderer>,
        sessions: FileStore<ExplorationSession>,
        generation: GenerationSettings,
    ) -> Self {
        Self {
            provider,
            templates,
            sessions,
            generation,
        }
    }

    /// Create and persist a session for a seed idea
    pub fn start(&self, initial_idea: &str) -> Result<ExplorationSession> {
        let idea = initial_idea.trim();
        if idea.is_empty() {
            return Err(Error::InvalidInput("initial idea must not be empty".into()));
        }
        let session = ExplorationSession::new(idea);
        self.sessions.save(&session)?;
        tracing::info!("Started exploration {}", session.id);
        Ok(session)
    }

    /// Run one round with free-form input from the idea owner
    #[tracing::instrument(skip(self, user_input), fields(session = %session_id))]
    pub async fn explore(&self, session_id: &str, user_input: &str) -> Result<ExplorationRound> {
        let user_input = user_input.trim();
        if user_input.is_empty() {
            return Err(Error::InvalidInput("exploration input must not be empty".into()));
        }
        let session = self.load_open(session_id)?;

        let prompt = self.templates.render(
            templates::EXPLORE,
            &json!({
                "initial_idea": session.initial_idea,
                "summary": session.findings,
                "rounds": session.rounds,
                "user_input": user_input,
            }),
        )?;

        self.run_round(session, prompt, user_input.to_string(), None)
            .await
    }

    /// Run a focused round where the model drives the question
    #[tracing::instrument(skip(self), fields(session = %session_id))]
    pub async fn ask_question(&self, session_id: &str, focus: QuestionFocus) -> Result<ExplorationRound> {
        let session = self.load_open(session_id)?;

        let prompt = self.templates.render(
            templates::EXPLORE_QUESTION,
            &json!({
                "initial_idea": session.initial_idea,
                "summary": session.findings,
                "focus": focus.as_str(),
                "focus_hint": focus.hint(),
            }),
        )?;

        let input = format!("[{} analysis]", focus);
        self.run_round(session, prompt, input, Some(focus)).await
    }

    async fn run_round(
        &self,
        mut session: ExplorationSession,
        prompt: String,
        user_input: String,
        focus: Option<QuestionFocus>,
    ) -> Result<ExplorationRound> {
        let request = ProviderRequest::new(vec![ChatMessage::user(prompt)])
            .with_system(EXPLORER_SYSTEM_PROMPT)
            .with_max_tokens(self.generation.max_tokens)
            .with_temperature(self.generation.temperature)
            .with_timeout(self.generation.timeout());

        let response = self.provider.chat_completion(&request).await?;

        let update: ExplorationUpdate = extract_json(response.text()).map_err(|e| {
            tracing::warn!("Exploration reply did not parse: {}", e);
            e
        })?;

        let round = session.apply(user_input, focus, update);
        self.sessions.save(&session)?;
        tracing::info!(
            "Exploration {} round {} added {} finding(s)",
            session.id,
            round.index,
            round.new_items
        );
        Ok(round)
    }

    pub fn summary(&self, session_id: &str) -> Result<ExplorationSummary> {
        Ok(self.sessions.load(session_id)?.summary())
    }

    /// Mark the session complete; later rounds fail with `SessionFinalized`
    pub fn finalize(&self, session_id: &str) -> Result<ExplorationSummary> {
        let mut session = self.sessions.load(session_id)?;
        if session.finalize() {
            self.sessions.save(&session)?;
            tracing::info!("Finalized exploration {} ({})", session.id, session.readiness());
        }
        Ok(session.summary())
    }

    /// Link a generated character back to its source session
    pub fn record_generated_character(&self, session_id: &str, character_id: &str) -> Result<()> {
        let mut session = self.sessions.load(session_id)?;
        if !session.generated_characters.iter().any(|id| id == character_id) {
            session.generated_characters.push(character_id.to_string());
            session.updated_at = chrono::Utc::now();
            self.sessions.save(&session)?;
        }
        Ok(())
    }

    pub fn get(&self, session_id: &str) -> Result<ExplorationSession> {
        Ok(self.sessions.load(session_id)?)
    }

    /// All sessions, newest first
    pub fn list(&self) -> Result<Vec<ExplorationSession>> {
        let mut sessions = self.sessions.list()?;
        sessions.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(sessions)
    }

    pub fn delete(&self, session_id: &str) -> Result<()> {
        Ok(self.sessions.delete(session_id)?)
    }

    fn load_open(&self, session_id: &str) -> Result<ExplorationSession> {
        let session = self.sessions.load(session_id)?;
        if session.is_finalized() {
            return Err(Error::SessionFinalized(session.id));
        }
        Ok(session)
    }
}
