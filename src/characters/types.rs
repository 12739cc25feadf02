// Character persona data model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::parsing::lenient_list;
use crate::storage::Record;
use crate::templates;

/// Kind of persona, which selects the system prompt template
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CharacterType {
    User,
    Expert,
    Organization,
}

impl CharacterType {
    pub const ALL: [CharacterType; 3] = [Self::User, Self::Expert, Self::Organization];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Expert => "expert",
            Self::Organization => "organization",
        }
    }

    /// Template rendering this type's system prompt
    pub fn persona_template(&self) -> &'static str {
        match self {
            Self::User => templates::PERSONA_USER,
            Self::Expert => templates::PERSONA_EXPERT,
            Self::Organization => templates::PERSONA_ORGANIZATION,
        }
    }
}

impl fmt::Display for CharacterType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CharacterType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "user" => Ok(Self::User),
            "expert" => Ok(Self::Expert),
            "organization" | "organisation" | "org" => Ok(Self::Organization),
            other => Err(format!(
                "unknown character type '{}' (expected user, expert or organization)",
                other
            )),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CharacterInfo {
    pub age: Option<u32>,
    pub position: Option<String>,
    pub background: Option<String>,
    pub experience: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CharacterContext {
    pub current_situation: Option<String>,
    #[serde(deserialize_with = "lenient_list")]
    pub goals: Vec<String>,
    #[serde(deserialize_with = "lenient_list")]
    pub challenges: Vec<String>,
    #[serde(deserialize_with = "lenient_list")]
    pub resource_constraints: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CharacterExpertise {
    pub professional_field: Option<String>,
    #[serde(deserialize_with = "lenient_list")]
    pub special_skills: Vec<String>,
    pub experience_level: Option<String>,
    #[serde(deserialize_with = "lenient_list")]
    pub industry_insights: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CharacterBehavior {
    pub decision_style: Option<String>,
    pub risk_preference: Option<String>,
    pub communication_style: Option<String>,
    #[serde(deserialize_with = "lenient_list")]
    pub values: Vec<String>,
}

/// How the persona shapes its answers
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResponsePattern {
    #[serde(deserialize_with = "lenient_list")]
    pub focus_areas: Vec<String>,
    #[serde(deserialize_with = "lenient_list")]
    pub avoidance_areas: Vec<String>,
    pub expression_style: Option<String>,
    #[serde(deserialize_with = "lenient_list")]
    pub expected_outcomes: Vec<String>,
}

/// Everything about a persona except identity and timestamps
///
/// Used for manual creation and as the parse target for generated personas.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CharacterDraft {
    pub name: String,
    #[serde(rename = "type", default = "default_character_type")]
    pub character_type: CharacterType,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub info: CharacterInfo,
    #[serde(default)]
    pub context: CharacterContext,
    #[serde(default)]
    pub expertise: CharacterExpertise,
    #[serde(default)]
    pub behavior: CharacterBehavior,
    #[serde(default)]
    pub response: ResponsePattern,
    #[serde(default, deserialize_with = "lenient_list")]
    pub tags: Vec<String>,
    #[serde(default)]
    pub metadata: BTreeMap<String, serde_json::Value>,
}

fn default_character_type() -> CharacterType {
    CharacterType::User
}

impl CharacterDraft {
    pub fn new(name: impl Into<String>, character_type: CharacterType) -> Self {
        Self {
            name: name.into(),
            character_type,
            description: String::new(),
            info: CharacterInfo::default(),
            context: CharacterContext::default(),
            expertise: CharacterExpertise::default(),
            behavior: CharacterBehavior::default(),
            response: ResponsePattern::default(),
            tags: Vec::new(),
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_position(mut self, position: impl Into<String>) -> Self {
        self.info.position = Some(position.into());
        self
    }
}

/// A stored persona
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Character {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub character_type: CharacterType,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub info: CharacterInfo,
    #[serde(default)]
    pub context: CharacterContext,
    #[serde(default)]
    pub expertise: CharacterExpertise,
    #[serde(default)]
    pub behavior: CharacterBehavior,
    #[serde(default)]
    pub response: ResponsePattern,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub metadata: BTreeMap<String, serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Character {
    /// Assign a fresh id and timestamps to a draft
    pub fn from_draft(draft: CharacterDraft) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            name: draft.name,
            character_type: draft.character_type,
            description: draft.description,
            info: draft.info,
            context: draft.context,
            expertise: draft.expertise,
            behavior: draft.behavior,
            response: draft.response,
            tags: draft.tags,
            metadata: draft.metadata,
            created_at: now,
            updated_at: now,
        }
    }

    /// One-line background used in validation prompts
    pub fn background_line(&self) -> String {
        let parts: Vec<&str> = [
            self.info.position.as_deref(),
            self.expertise.professional_field.as_deref(),
            self.info.background.as_deref(),
            self.info.experience.as_deref(),
        ]
        .into_iter()
        .flatten()
        .filter(|s| !s.trim().is_empty())
        .collect();

        if parts.is_empty() {
            self.description.clone()
        } else {
            parts.join("; ")
        }
    }

    /// Key fields that are still empty
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.description.trim().is_empty() {
            missing.push("description");
        }
        if is_blank(&self.info.position) {
            missing.push("info.position");
        }
        if is_blank(&self.info.background) {
            missing.push("info.background");
        }
        if self.context.goals.is_empty() {
            missing.push("context.goals");
        }
        if self.character_type == CharacterType::Expert && is_blank(&self.expertise.professional_field) {
            missing.push("expertise.professional_field");
        }
        if is_blank(&self.behavior.decision_style) {
            missing.push("behavior.decision_style");
        }
        if self.response.focus_areas.is_empty() {
            missing.push("response.focus_areas");
        }
        missing
    }

    /// Case-insensitive match over name, description, position, field and tags
    pub fn matches(&self, query: &str) -> bool {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return true;
        }
        let haystacks = [
            Some(self.name.as_str()),
            Some(self.description.as_str()),
            self.info.position.as_deref(),
            self.expertise.professional_field.as_deref(),
        ];
        haystacks
            .into_iter()
            .flatten()
            .chain(self.tags.iter().map(String::as_str))
            .any(|h| h.to_lowercase().contains(&needle))
    }
}

fn is_blank(value: &Option<String>) -> bool {
    value.as_deref().map(|s| s.trim().is_empty()).unwrap_or(true)
}

impl Record for Character {
    const COLLECTION: &'static str = "characters";

    fn id(&self) -> &str {
        &self.id
    }
}
