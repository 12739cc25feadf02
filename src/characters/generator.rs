// Persona generation from exploration findings

use serde_json::{json, Value};
use std::sync::Arc;

use super::store::CharacterStore;
use super::types::{Character, CharacterDraft, CharacterType};
use crate::config::GenerationSettings;
use crate::error::Result;
use crate::exploration::ExplorationSummary;
use crate::parsing::extract_json;
use crate::providers::{ChatMessage, LlmProvider, ProviderRequest};
use crate::templates::{self, TemplateRenderer};

const GENERATOR_SYSTEM_PROMPT: &str =
    "You design realistic personas for product research. Reply with JSON only.";

/// Drafts personas with the model and stores them
pub struct CharacterGenerator {
    provider: Arc<dyn LlmProvider>,
    templates: Arc<TemplateRenderer>,
    characters: CharacterStore,
    generation: GenerationSettings,
}

impl CharacterGenerator {
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        templates: Arc<TemplateRenderer>,
        characters: CharacterStore,
        generation: GenerationSettings,
    ) -> Self {
        Self {
            provider,
            templates,
            characters,
            generation,
        }
    }

    /// Ask the model for a persona grounded in `summary` and persist it
    ///
    /// The requested type always wins over whatever the model returned.
    /// `name_hint` is used when the model leaves the name blank.
    #[tracing::instrument(skip(self, summary), fields(session = %summary.session_id))]
    pub async fn generate(
        &self,
        summary: &ExplorationSummary,
        character_type: CharacterType,
        name_hint: Option<&str>,
    ) -> Result<Character> {
        let name_hint = name_hint.map(str::trim).filter(|n| !n.is_empty());
        let prompt = self.templates.render(
            templates::CHARACTER_GENERATION,
            &json!({
                "exploration": summary,
                "character_type": character_type.as_str(),
                "name_hint": name_hint,
            }),
        )?;

        let request = ProviderRequest::new(vec![ChatMessage::user(prompt)])
            .with_system(GENERATOR_SYSTEM_PROMPT)
            .with_max_tokens(self.generation.max_tokens)
            .with_temperature(self.generation.temperature)
            .with_timeout(self.generation.timeout());
        let response = self.provider.chat_completion(&request).await?;

        let mut draft: CharacterDraft = extract_json(response.text())?;
        draft.character_type = character_type;
        if draft.name.trim().is_empty() {
            draft.name = name_hint
                .map(str::to_string)
                .unwrap_or_else(|| format!("Generated {}", character_type));
        }
        draft.metadata.insert(
            "source_exploration".into(),
            Value::String(summary.session_id.clone()),
        );
        draft.metadata.insert(
            "generated_by".into(),
            Value::String(format!("{}/{}", response.provider, response.model)),
        );

        let character = self.characters.create(draft)?;
        tracing::debug!(
            "Generated '{}' with {} empty field(s)",
            character.name,
            character.missing_fields().len()
        );
        Ok(character)
    }
}
