// Prompt templates
//
// Built-in templates are compiled in from data/templates and registered once
// at startup. Rendering is strict: a template that references a variable the
// caller did not supply fails instead of rendering an empty string.

use minijinja::{Environment, ErrorKind, UndefinedBehavior};
use serde::Serialize;
use std::fs;
use std::path::Path;

use crate::error::TemplateError;

pub const PERSONA_USER: &str = "persona_user";
pub const PERSONA_EXPERT: &str = "persona_expert";
pub const PERSONA_ORGANIZATION: &str = "persona_organization";
pub const DIALOGUE_TURN: &str = "dialogue_turn";
pub const DIALOGUE_SUMMARY: &str = "dialogue_summary";
pub const EXPLORE: &str = "explore";
pub const EXPLORE_QUESTION: &str = "explore_question";
pub const CHARACTER_GENERATION: &str = "character_generation";
pub const VALIDATION: &str = "validation";
pub const ANALYSIS: &str = "analysis";

const TEMPLATE_EXT: &str = "j2";

const BUILTIN_TEMPLATES: &[(&str, &str)] = &[
    (PERSONA_USER, include_str!("../../data/templates/persona_user.j2")),
    (PERSONA_EXPERT, include_str!("../../data/templates/persona_expert.j2")),
    (
        PERSONA_ORGANIZATION,
        include_str!("../../data/templates/persona_organization.j2"),
    ),
    (DIALOGUE_TURN, include_str!("../../data/templates/dialogue_turn.j2")),
    (DIALOGUE_SUMMARY, include_str!("../../data/templates/dialogue_summary.j2")),
    (EXPLORE, include_str!("../../data/templates/explore.j2")),
    (EXPLORE_QUESTION, include_str!("../../data/templates/explore_question.j2")),
    (
        CHARACTER_GENERATION,
        include_str!("../../data/templates/character_generation.j2"),
    ),
    (VALIDATION, include_str!("../../data/templates/validation.j2")),
    (ANALYSIS, include_str!("../../data/templates/analysis.j2")),
];

/// Named prompt templates with strict variable checking
pub struct TemplateRenderer {
    env: Environment<'static>,
}

impl std::fmt::Debug for TemplateRenderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TemplateRenderer")
            .field("templates", &self.names())
            .finish()
    }
}

impl TemplateRenderer {
    /// Renderer with only the built-in templates
    pub fn builtin() -> Result<Self, TemplateError> {
        let mut env = Environment::new();
        env.set_undefined_behavior(UndefinedBehavior::Strict);
        env.set_trim_blocks(true);

        for &(name, source) in BUILTIN_TEMPLATES {
            env.add_template(name, source)
                .map_err(|e| classify(name, e))?;
        }

        Ok(Self { env })
    }

    /// Built-ins plus `<name>.j2` files from `dir`, which replace built-ins of the same name
    pub fn load(dir: Option<&Path>) -> Result<Self, TemplateError> {
        let mut renderer = Self::builtin()?;
        if let Some(dir) = dir {
            renderer.add_overrides(dir)?;
        }
        Ok(renderer)
    }

    fn add_overrides(&mut self, dir: &Path) -> Result<(), TemplateError> {
        let entries = fs::read_dir(dir).map_err(|e| TemplateError::Render {
            template: dir.display().to_string(),
            detail: format!("cannot read template directory: {}", e),
        })?;

        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(TEMPLATE_EXT) {
                continue;
            }
            let Some(name) = path.file_stem().and_then(|s| s.to_str()).map(str::to_string) else {
                continue;
            };
            let source = fs::read_to_string(&path).map_err(|e| TemplateError::Render {
                template: name.clone(),
                detail: format!("cannot read {}: {}", path.display(), e),
            })?;

            tracing::info!("Template override: {} ({})", name, path.display());
            self.env
                .add_template_owned(name.clone(), source)
                .map_err(|e| classify(&name, e))?;
        }
        Ok(())
    }

    /// Render `name` with the given context
    pub fn render<S: Serialize>(&self, name: &str, context: &S) -> Result<String, TemplateError> {
        let template = self.env.get_template(name).map_err(|e| classify(name, e))?;
        template.render(context).map_err(|e| classify(name, e))
    }

    /// Registered template names, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .env
            .templates()
            .map(|(name, _)| name.to_string())
            .collect();
        names.sort();
        names
    }
}

fn classify(template: &str, err: minijinja::Error) -> TemplateError {
    let detail = err.to_string();
    match err.kind() {
        ErrorKind::TemplateNotFound => TemplateError::NotFound {
            name: template.to_string(),
        },
        ErrorKind::UndefinedError => TemplateError::MissingVariable {
            template: template.to_string(),
            detail,
        },
        ErrorKind::SyntaxError => TemplateError::Syntax {
            template: template.to_string(),
            detail,
        },
        _ => TemplateError::Render {
            template: template.to_string(),
            detail,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn renderer() -> TemplateRenderer {
        TemplateRenderer::builtin().unwrap()
    }

    #[test]
    fn test_all_builtins_registered() {
        let names = renderer().names();
        for (name, _) in BUILTIN_TEMPLATES {
            assert!(names.contains(&name.to_string()), "missing {}", name);
        }
    }

    #[test]
    fn test_render_with_all_variables() {
        let out = renderer()
            .render(
                VALIDATION,
                &json!({
                    "character_name": "Dr. Lin",
                    "character_type": "expert",
                    "question": "Should we launch?",
                    "background": "ten years in data science",
                }),
            )
            .unwrap();
        assert!(out.contains("Dr. Lin (expert)"));
        assert!(out.contains("Should we launch?"));
    }

    #[test]
    fn test_missing_variable_fails_every_time() {
        let r = renderer();
        let context = json!({ "character_name": "Dr. Lin", "character_type": "expert" });
        for _ in 0..5 {
            let err = r.render(VALIDATION, &context).unwrap_err();
            match err {
                TemplateError::MissingVariable { template, .. } => {
                    assert_eq!(template, VALIDATION)
                }
                other => panic!("expected MissingVariable, got {:?}", other),
            }
        }
    }

    #[test]
    fn test_unknown_template() {
        let err = renderer().render("nope", &json!({})).unwrap_err();
        assert!(matches!(err, TemplateError::NotFound { name } if name == "nope"));
    }

    #[test]
    fn test_directory_override() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("validation.j2"), "Q: {{ question }}").unwrap();
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let r = TemplateRenderer::load(Some(dir.path())).unwrap();
        let out = r.render(VALIDATION, &json!({ "question": "why?" })).unwrap();
        assert_eq!(out, "Q: why?");
        assert!(!r.names().contains(&"notes".to_string()));
    }

    #[test]
    fn test_override_syntax_error_reported() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("broken.j2"), "{% if %}").unwrap();
        let err = TemplateRenderer::load(Some(dir.path())).unwrap_err();
        assert!(matches!(err, TemplateError::Syntax { template, .. } if template == "broken"));
    }
}
