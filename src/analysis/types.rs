// Analysis report

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::parsing::lenient_list;
use crate::storage::Record;

/// Shape the model is asked to return
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ReportBody {
    #[serde(default)]
    pub summary: String,
    #[serde(default, deserialize_with = "lenient_list")]
    pub consensus: Vec<String>,
    #[serde(default, deserialize_with = "lenient_list")]
    pub conflicts: Vec<String>,
    #[serde(default, deserialize_with = "lenient_list")]
    pub opportunities: Vec<String>,
    #[serde(default, deserialize_with = "lenient_list")]
    pub risks: Vec<String>,
    #[serde(default, deserialize_with = "lenient_list")]
    pub recommendations: Vec<String>,
    #[serde(default, deserialize_with = "lenient_list")]
    pub next_steps: Vec<String>,
}

impl ReportBody {
    /// Nothing usable came back
    pub fn is_empty(&self) -> bool {
        self.summary.trim().is_empty()
            && self.consensus.is_empty()
            && self.conflicts.is_empty()
            && self.opportunities.is_empty()
            && self.risks.is_empty()
            && self.recommendations.is_empty()
            && self.next_steps.is_empty()
    }
}

/// Synthesized report over one validation session, stored under its id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub validation_id: String,
    pub question: String,
    pub summary: String,
    #[serde(default)]
    pub consensus: Vec<String>,
    #[serde(default)]
    pub conflicts: Vec<String>,
    #[serde(default)]
    pub opportunities: Vec<String>,
    #[serde(default)]
    pub risks: Vec<String>,
    #[serde(default)]
    pub recommendations: Vec<String>,
    #[serde(default)]
    pub next_steps: Vec<String>,
    /// Some participants had no response
    #[serde(default)]
    pub incomplete: bool,
    /// Ids of those participants
    #[serde(default)]
    pub missing_characters: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl AnalysisReport {
    pub fn from_body(
        validation_id: impl Into<String>,
        question: impl Into<String>,
        body: ReportBody,
        missing_characters: Vec<String>,
    ) -> Self {
        Self {
            validation_id: validation_id.into(),
            question: question.into(),
            summary: body.summary,
            consensus: body.consensus,
            conflicts: body.conflicts,
            opportunities: body.opportunities,
            risks: body.risks,
            recommendations: body.recommendations,
            next_steps: body.next_steps,
            incomplete: !missing_characters.is_empty(),
            missing_characters,
            created_at: Utc::now(),
        }
    }
}

impl Record for AnalysisReport {
    const COLLECTION: &'static str = "reports";

    fn id(&self) -> &str {
        &self.validation_id
    }
}
