// Integration analysis over a finished validation

use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

use super::types::{AnalysisReport, ReportBody};
use crate::config::AnalysisSettings;
use crate::error::{Error, ParseError, Result};
use crate::parsing::extract_json;
use crate::providers::{ChatMessage, LlmProvider, ProviderRequest};
use crate::storage::FileStore;
use crate::templates::{self, TemplateRenderer};
use crate::validation::ValidationSession;

const ANALYST_SYSTEM_PROMPT: &str =
    "You synthesize stakeholder feedback into decision reports. Reply with JSON only.";

pub struct IntegrationAnalyzer {
    provider: Arc<dyn LlmProvider>,
    templates: Arc<TemplateRenderer>,
    validations: FileStore<ValidationSession>,
    reports: FileStore<AnalysisReport>,
    settings: AnalysisSettings,
    timeout: Duration,
}

impl IntegrationAnalyzer {
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        templates: Arc<TemplateRenderer>,
        validations: FileStore<ValidationSession>,
        reports: FileStore<AnalysisReport>,
        settings: AnalysisSettings,
        timeout: Duration,
    ) -> Self {
        Self {
            provider,
            templates,
            validations,
            reports,
            settings,
            timeout,
        }
    }

    /// Analyze a validation session and store the report under its id
    ///
    /// Re-running replaces the previous report. A reply that does not parse
    /// is an error; no empty report is written in its place.
    #[tracing::instrument(skip(self), fields(validation = %validation_id))]
    pub async fn report(&self, validation_id: &str) -> Result<AnalysisReport> {
        let session = self.validations.load(validation_id)?;
        if session.responses.is_empty() {
            return Err(Error::NoResponses(session.id));
        }

        let responses: Vec<_> = session
            .ordered_responses()
            .into_iter()
            .map(|(_, r)| {
                json!({
                    "character_name": r.character_name,
                    "character_type": r.character_type.as_str(),
                    "response": r.content,
                })
            })
            .collect();
        let missing: Vec<String> = session.missing().into_iter().map(str::to_string).collect();

        let prompt = self.templates.render(
            templates::ANALYSIS,
            &json!({
                "question": session.question,
                "responses": responses,
                "missing": missing,
            }),
        )?;

        let request = ProviderRequest::new(vec![ChatMessage::user(prompt)])
            .with_system(ANALYST_SYSTEM_PROMPT)
            .with_max_tokens(self.settings.max_tokens)
            .with_temperature(self.settings.temperature)
            .with_timeout(self.timeout);
        let response = self.provider.chat_completion(&request).await?;

        let body: ReportBody = extract_json(response.text())?;
        if body.is_empty() {
            return Err(ParseError::Shape {
                raw: response.content,
                detail: "reply contains none of the report fields".into(),
            }
            .into());
        }

        let report = AnalysisReport::from_body(&session.id, &session.question, body, missing);
        self.reports.save(&report)?;
        tracing::info!(
            "Report for {}: {} conflict(s), {} risk(s){}",
            session.id,
            report.conflicts.len(),
            report.risks.len(),
            if report.incomplete { ", incomplete" } else { "" }
        );
        Ok(report)
    }

    pub fn get_report(&self, validation_id: &str) -> Result<AnalysisReport> {
        Ok(self.reports.load(validation_id)?)
    }
}
