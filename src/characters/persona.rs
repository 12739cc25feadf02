// Persona system prompts

use serde_json::json;

use super::types::Character;
use crate::error::TemplateError;
use crate::templates::TemplateRenderer;

/// Render the system prompt that puts the model in character
pub fn persona_prompt(
    templates: &TemplateRenderer,
    character: &Character,
) -> Result<String, TemplateError> {
    templates.render(
        character.character_type.persona_template(),
        &json!({ "character": character }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::characters::{CharacterDraft, CharacterType};

    #[test]
    fn test_each_type_renders_with_sparse_fields() {
        let templates = TemplateRenderer::builtin().unwrap();
        for t in CharacterType::ALL {
            let character = Character::from_draft(CharacterDraft::new("Sparse", t));
            let prompt = persona_prompt(&templates, &character).unwrap();
            assert!(prompt.contains("Sparse"), "{} prompt lacks name", t);
            assert!(prompt.contains("not specified"));
        }
    }

    #[test]
    fn test_expert_prompt_embeds_persona_fields() {
        let templates = TemplateRenderer::builtin().unwrap();
        let mut draft = CharacterDraft::new("Dr. Lin", CharacterType::Expert)
            .with_position("data scientist");
        draft.response.focus_areas = vec!["model risk".into(), "data quality".into()];
        let character = Character::from_draft(draft);

        let prompt = persona_prompt(&templates, &character).unwrap();
        assert!(prompt.starts_with("You are Dr. Lin, data scientist."));
        assert!(prompt.contains("Focus on: model risk, data quality."));
    }
}
