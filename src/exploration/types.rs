// Exploration session data model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::parsing::lenient_list;
use crate::storage::Record;

/// Rounds needed before a session can be `Ready`
pub const READY_MIN_ROUNDS: usize = 3;

/// Angle for a focused follow-up round
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuestionFocus {
    Stakeholders,
    Scenarios,
    Feasibility,
    Value,
    Risks,
    General,
}

impl QuestionFocus {
    pub const ALL: [QuestionFocus; 6] = [
        Self::Stakeholders,
        Self::Scenarios,
        Self::Feasibility,
        Self::Value,
        Self::Risks,
        Self::General,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Stakeholders => "stakeholders",
            Self::Scenarios => "scenarios",
            Self::Feasibility => "feasibility",
            Self::Value => "value",
            Self::Risks => "risks",
            Self::General => "general",
        }
    }

    /// Instruction embedded in the focused prompt
    pub fn hint(&self) -> &'static str {
        match self {
            Self::Stakeholders => {
                "Identify everyone affected by the idea: direct users, buyers, operators, \
                 regulators and anyone who loses if it succeeds."
            }
            Self::Scenarios => {
                "Describe the concrete situations in which the idea would be used, \
                 including the moment of need and what people do today instead."
            }
            Self::Feasibility => {
                "Assess what it would take to build and run: skills, data, technology, \
                 time and money. Name the hardest part."
            }
            Self::Value => {
                "Explain who gains what, how much it is worth to them and how that value \
                 could be captured."
            }
            Self::Risks => {
                "List what could make the idea fail: market, technical, legal, \
                 operational and reputational risks."
            }
            Self::General => {
                "Point out the biggest gap in our current understanding and how to close it."
            }
        }
    }
}

impl fmt::Display for QuestionFocus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QuestionFocus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|f| f.as_str() == s.trim().to_lowercase())
            .ok_or_else(|| {
                format!(
                    "unknown focus '{}' (expected one of: stakeholders, scenarios, feasibility, value, risks, general)",
                    s
                )
            })
    }
}

/// Structured fields the model returns for one round
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ExplorationUpdate {
    pub reply: String,
    #[serde(default, deserialize_with = "lenient_list")]
    pub stakeholders: Vec<String>,
    #[serde(default, deserialize_with = "lenient_list")]
    pub domains: Vec<String>,
    #[serde(default, deserialize_with = "lenient_list")]
    pub constraints: Vec<String>,
    #[serde(default, deserialize_with = "lenient_list")]
    pub environment_notes: Vec<String>,
    #[serde(default, deserialize_with = "lenient_list")]
    pub insights: Vec<String>,
    #[serde(default)]
    pub follow_up_question: Option<String>,
}

/// Running summary accumulated across rounds
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExplorationFindings {
    pub stakeholders: Vec<String>,
    pub domains: Vec<String>,
    pub constraints: Vec<String>,
    pub environment_notes: Vec<String>,
    pub insights: Vec<String>,
}

impl ExplorationFindings {
    /// Append items not already present (case-insensitive); returns how many were new
    pub fn merge(&mut self, update: &ExplorationUpdate) -> usize {
        merge_unique(&mut self.stakeholders, &update.stakeholders)
            + merge_unique(&mut self.domains, &update.domains)
            + merge_unique(&mut self.constraints, &update.constraints)
            + merge_unique(&mut self.environment_notes, &update.environment_notes)
            + merge_unique(&mut self.insights, &update.insights)
    }
}

fn merge_unique(existing: &mut Vec<String>, incoming: &[String]) -> usize {
    let mut added = 0;
    for item in incoming {
        let item = item.trim();
        if item.is_empty() {
            continue;
        }
        let lowered = item.to_lowercase();
        if !existing.iter().any(|e| e.to_lowercase() == lowered) {
            existing.push(item.to_string());
            added += 1;
        }
    }
    added
}

/// One question/answer exchange
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExplorationRound {
    pub index: usize,
    /// Set for rounds started with `ask_question`
    #[serde(default)]
    pub focus: Option<QuestionFocus>,
    pub user_input: String,
    pub reply: String,
    #[serde(default)]
    pub follow_up_question: Option<String>,
    /// Summary items this round contributed
    #[serde(default)]
    pub new_items: usize,
    pub timestamp: DateTime<Utc>,
}

/// An iterative idea-exploration session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExplorationSession {
    pub id: String,
    pub initial_idea: String,
    #[serde(default)]
    pub rounds: Vec<ExplorationRound>,
    #[serde(default)]
    pub findings: ExplorationFindings,
    /// Characters generated from this session
    #[serde(default)]
    pub generated_characters: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub finalized_at: Option<DateTime<Utc>>,
}

impl ExplorationSession {
    pub fn new(initial_idea: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            initial_idea: initial_idea.into(),
            rounds: Vec::new(),
            findings: ExplorationFindings::default(),
            generated_characters: Vec::new(),
            created_at: now,
            updated_at: now,
            finalized_at: None,
        }
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized_at.is_some()
    }

    /// Mark complete; returns false when it already was
    pub fn finalize(&mut self) -> bool {
        if self.is_finalized() {
            return false;
        }
        let now = Utc::now();
        self.finalized_at = Some(now);
        self.updated_at = now;
        true
    }

    /// Record a round and fold its findings into the summary
    pub fn apply(
        &mut self,
        user_input: String,
        focus: Option<QuestionFocus>,
        update: ExplorationUpdate,
    ) -> ExplorationRound {
        let new_items = self.findings.merge(&update);
        let round = ExplorationRound {
            index: self.rounds.len(),
            focus,
            user_input,
            reply: update.reply,
            follow_up_question: update.follow_up_question.filter(|q| !q.trim().is_empty()),
            new_items,
            timestamp: Utc::now(),
        };
        self.rounds.push(round.clone());
        self.updated_at = round.timestamp;
        round
    }

    pub fn readiness(&self) -> Readiness {
        let present = [
            !self.findings.stakeholders.is_empty(),
            !self.findings.domains.is_empty(),
            !self.findings.constraints.is_empty(),
        ]
        .into_iter()
        .filter(|p| *p)
        .count();

        if present == 3 && self.rounds.len() >= READY_MIN_ROUNDS {
            Readiness::Ready
        } else if present >= 2 {
            Readiness::Partial
        } else {
            Readiness::Insufficient
        }
    }

    pub fn summary(&self) -> ExplorationSummary {
        ExplorationSummary {
            session_id: self.id.clone(),
            initial_idea: self.initial_idea.clone(),
            stakeholders: self.findings.stakeholders.clone(),
            domains: self.findings.domains.clone(),
            constraints: self.findings.constraints.clone(),
            environment_notes: self.findings.environment_notes.clone(),
            insights: self.findings.insights.clone(),
            rounds: self.rounds.len(),
            readiness: self.readiness(),
            open_question: self
                .rounds
                .last()
                .and_then(|r| r.follow_up_question.clone()),
            finalized: self.is_finalized(),
        }
    }
}

impl Record for ExplorationSession {
    const COLLECTION: &'static str = "explorations";

    fn id(&self) -> &str {
        &self.id
    }
}

/// How well understood the idea is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Readiness {
    Ready,
    Partial,
    Insufficient,
}

impl fmt::Display for Readiness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Ready => "ready",
            Self::Partial => "partial",
            Self::Insufficient => "insufficient",
        })
    }
}

/// Snapshot of what an exploration has established
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExplorationSummary {
    pub session_id: String,
    pub initial_idea: String,
    pub stakeholders: Vec<String>,
    pub domains: Vec<String>,
    pub constraints: Vec<String>,
    pub environment_notes: Vec<String>,
    pub insights: Vec<String>,
    pub rounds: usize,
    pub readiness: Readiness,
    pub open_question: Option<String>,
    pub finalized: bool,
}
