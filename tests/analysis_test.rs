// Integration tests for report synthesis

mod common;

use anyhow::Result;
use serde_json::json;
use std::path::Path;
use std::sync::Arc;

use common::{as_dyn, test_config, ScriptedProvider};
use rolecast::analysis::AnalysisReport;
use rolecast::characters::CharacterType;
use rolecast::error::Error;
use rolecast::storage::{FileStore, StorageFormat};
use rolecast::validation::{CharacterResponse, ValidationFailure, ValidationMode, ValidationSession};
use rolecast::Toolkit;

fn response(name: &str, t: CharacterType, content: &str) -> CharacterResponse {
    CharacterResponse {
        character_name: name.into(),
        character_type: t,
        content: content.into(),
        elapsed_ms: 120,
    }
}

/// Persist a finished validation: "a" and "b" answered, "c" timed out
fn seed_validation(data_dir: &Path) -> Result<ValidationSession> {
    let store: FileStore<ValidationSession> = FileStore::open(data_dir, StorageFormat::Json)?;
    let mut session = ValidationSession::new(
        "Would you pay $10/month for shared delivery?",
        vec!["a".into(), "b".into(), "c".into()],
        ValidationMode::Concurrent,
    );
    session.responses.insert(
        "a".into(),
        response("Alice", CharacterType::User, "Only if it saves me an hour a day."),
    );
    session.responses.insert(
        "b".into(),
        response("Dr. Lin", CharacterType::Expert, "Route density decides the unit economics."),
    );
    session
        .failures
        .insert("c".into(), ValidationFailure::new("timeout", "no reply within 30s"));
    store.save(&session)?;
    Ok(session)
}

fn report_reply() -> String {
    json!({
        "summary": "Interest exists but depends on time savings and route density.",
        "consensus": ["time savings drive willingness to pay"],
        "conflicts": "Alice wants a flat fee; Dr. Lin expects usage pricing",
        "risks": ["low route density in suburbs"],
        "recommendations": ["pilot in one dense district"],
        "next_steps": ["interview five more bakery owners", "map delivery routes"]
    })
    .to_string()
}

#[tokio::test]
async fn test_report_on_partial_validation_is_marked_incomplete() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let session = seed_validation(dir.path())?;
    let provider = Arc::new(ScriptedProvider::new().reply(report_reply()));
    let toolkit = Toolkit::with_provider(test_config(dir.path()), as_dyn(&provider))?;

    let report = toolkit.analyzer.report(&session.id).await?;
    assert_eq!(report.validation_id, session.id);
    assert_eq!(report.question, session.question);
    assert!(report.incomplete);
    assert_eq!(report.missing_characters, vec!["c"]);
    assert_eq!(report.consensus, vec!["time savings drive willingness to pay"]);
    // A delimited string is split into list entries
    assert_eq!(report.conflicts.len(), 2);
    assert!(report.opportunities.is_empty());
    assert_eq!(report.next_steps.len(), 2);

    assert_eq!(toolkit.analyzer.get_report(&session.id)?, report);

    let prompt = &provider.last_request().messages[0].content;
    assert!(prompt.contains("### Alice (user)"));
    assert!(prompt.contains("### Dr. Lin (expert)"));
    assert!(prompt.contains("Route density decides the unit economics."));
    assert!(prompt.contains("no answer was collected from c"));

    Ok(())
}

#[tokio::test]
async fn test_rerunning_replaces_report() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let session = seed_validation(dir.path())?;
    let provider = Arc::new(
        ScriptedProvider::new()
            .reply(report_reply())
            .reply(json!({ "summary": "Second pass." }).to_string()),
    );
    let toolkit = Toolkit::with_provider(test_config(dir.path()), as_dyn(&provider))?;

    toolkit.analyzer.report(&session.id).await?;
    toolkit.analyzer.report(&session.id).await?;

    let stored = toolkit.analyzer.get_report(&session.id)?;
    assert_eq!(stored.summary, "Second pass.");
    assert!(stored.risks.is_empty());

    let reports: FileStore<AnalysisReport> = FileStore::open(dir.path(), StorageFormat::Json)?;
    assert_eq!(reports.count()?, 1);

    Ok(())
}

#[tokio::test]
async fn test_malformed_reply_stores_nothing() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let session = seed_validation(dir.path())?;
    let provider = Arc::new(
        ScriptedProvider::new()
            .reply("Overall the personas are positive about the idea.")
            .reply(json!({ "verdict": "go" }).to_string()),
    );
    let toolkit = Toolkit::with_provider(test_config(dir.path()), as_dyn(&provider))?;

    let err = toolkit.analyzer.report(&session.id).await.unwrap_err();
    match &err {
        Error::Parse(e) => assert!(e.raw().contains("personas are positive")),
        other => panic!("expected parse error, got {:?}", other),
    }

    // Valid JSON without any report field is rejected too
    let err = toolkit.analyzer.report(&session.id).await.unwrap_err();
    assert!(matches!(err, Error::Parse(_)));

    assert!(toolkit.analyzer.get_report(&session.id).unwrap_err().is_not_found());

    Ok(())
}

#[tokio::test]
async fn test_validation_without_responses_is_rejected() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let store: FileStore<ValidationSession> = FileStore::open(dir.path(), StorageFormat::Json)?;
    let mut session = ValidationSession::new("Anyone?", vec!["a".into()], ValidationMode::Concurrent);
    session
        .failures
        .insert("a".into(), ValidationFailure::new("auth", "bad key"));
    store.save(&session)?;

    let provider = Arc::new(ScriptedProvider::new().default_reply(report_reply()));
    let toolkit = Toolkit::with_provider(test_config(dir.path()), as_dyn(&provider))?;

    let err = toolkit.analyzer.report(&session.id).await.unwrap_err();
    assert!(matches!(err, Error::NoResponses(_)));
    assert!(provider.requests().is_empty());

    let err = toolkit.analyzer.report("missing").await.unwrap_err();
    assert!(err.is_not_found());

    Ok(())
}
