// Integration tests for idea exploration and character generation

mod common;

use anyhow::Result;
use serde_json::json;
use std::sync::Arc;

use common::{as_dyn, test_config, ScriptedProvider};
use rolecast::characters::CharacterType;
use rolecast::error::Error;
use rolecast::exploration::{QuestionFocus, Readiness};
use rolecast::Toolkit;

fn round_reply(stakeholders: &[&str], domains: &[&str], constraints: &[&str]) -> String {
    json!({
        "reply": "Good start. Tell me who would use it first.",
        "stakeholders": stakeholders,
        "domains": domains,
        "constraints": constraints,
        "insights": ["price sensitivity matters"],
        "follow_up_question": "Who pays for it?"
    })
    .to_string()
}

#[tokio::test]
async fn test_rounds_accumulate_findings_and_readiness() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let provider = Arc::new(
        ScriptedProvider::new()
            .reply(round_reply(&["small bakeries"], &[], &[]))
            .reply(format!(
                "Here is my take:\n```json\n{}\n```",
                round_reply(&["Small Bakeries", "suppliers"], &["food logistics"], &[])
            ))
            .reply(round_reply(&[], &[], &["tight margins"])),
    );
    let toolkit = Toolkit::with_provider(test_config(dir.path()), as_dyn(&provider))?;

    let session = toolkit.exploration.start("Shared delivery vans for bakeries")?;
    assert_eq!(toolkit.exploration.summary(&session.id)?.readiness, Readiness::Insufficient);

    let first = toolkit.exploration.explore(&session.id, "Bakeries waste money on delivery").await?;
    assert_eq!(first.index, 0);
    assert_eq!(first.follow_up_question.as_deref(), Some("Who pays for it?"));

    let second = toolkit.exploration.explore(&session.id, "Suppliers also deliver").await?;
    // "Small Bakeries" duplicates an earlier stakeholder
    assert_eq!(second.new_items, 2);
    assert_eq!(toolkit.exploration.summary(&session.id)?.readiness, Readiness::Partial);

    toolkit.exploration.explore(&session.id, "Margins are thin").await?;
    let summary = toolkit.exploration.summary(&session.id)?;
    assert_eq!(summary.rounds, 3);
    assert_eq!(summary.stakeholders, vec!["small bakeries", "suppliers"]);
    assert_eq!(summary.domains, vec!["food logistics"]);
    assert_eq!(summary.constraints, vec!["tight margins"]);
    assert_eq!(summary.insights, vec!["price sensitivity matters"]);
    assert_eq!(summary.readiness, Readiness::Ready);

    // The third prompt carries what earlier rounds established
    let prompt = &provider.last_request().messages[0].content;
    assert!(prompt.contains("food logistics"));
    assert!(prompt.contains("Margins are thin"));

    Ok(())
}

#[tokio::test]
async fn test_malformed_reply_leaves_session_unchanged() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let provider = Arc::new(
        ScriptedProvider::new()
            .reply(round_reply(&["bakers"], &[], &[]))
            .reply("I think this idea has potential, but I need more detail."),
    );
    let toolkit = Toolkit::with_provider(test_config(dir.path()), as_dyn(&provider))?;

    let session = toolkit.exploration.start("Shared delivery vans")?;
    toolkit.exploration.explore(&session.id, "first").await?;
    let before = toolkit.exploration.get(&session.id)?;

    let err = toolkit.exploration.explore(&session.id, "second").await.unwrap_err();
    match err {
        Error::Parse(e) => assert!(e.raw().contains("has potential")),
        other => panic!("expected parse error, got {:?}", other),
    }
    assert_eq!(toolkit.exploration.get(&session.id)?, before);

    Ok(())
}

#[tokio::test]
async fn test_finalized_session_rejects_new_rounds() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let provider = Arc::new(ScriptedProvider::new().default_reply(round_reply(&["bakers"], &[], &[])));
    let toolkit = Toolkit::with_provider(test_config(dir.path()), as_dyn(&provider))?;

    let session = toolkit.exploration.start("Shared delivery vans")?;
    toolkit.exploration.explore(&session.id, "first").await?;

    let summary = toolkit.exploration.finalize(&session.id)?;
    assert!(summary.finalized);
    // Finalizing twice is harmless
    assert!(toolkit.exploration.finalize(&session.id)?.finalized);

    let err = toolkit.exploration.explore(&session.id, "more").await.unwrap_err();
    assert!(matches!(err, Error::SessionFinalized(_)));
    let err = toolkit
        .exploration
        .ask_question(&session.id, QuestionFocus::Risks)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::SessionFinalized(_)));
    assert_eq!(toolkit.exploration.get(&session.id)?.rounds.len(), 1);

    Ok(())
}

#[tokio::test]
async fn test_ask_question_records_focus() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let provider = Arc::new(ScriptedProvider::new().reply(round_reply(&[], &[], &["cold chain rules"])));
    let toolkit = Toolkit::with_provider(test_config(dir.path()), as_dyn(&provider))?;

    let session = toolkit.exploration.start("Shared delivery vans")?;
    let round = toolkit
        .exploration
        .ask_question(&session.id, QuestionFocus::Feasibility)
        .await?;

    assert_eq!(round.focus, Some(QuestionFocus::Feasibility));
    assert_eq!(round.user_input, "[feasibility analysis]");
    assert!(provider.last_request().messages[0].content.contains("## Focus: feasibility"));
    assert_eq!(
        toolkit.exploration.summary(&session.id)?.constraints,
        vec!["cold chain rules"]
    );

    Ok(())
}

#[tokio::test]
async fn test_start_rejects_blank_idea() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let provider = Arc::new(ScriptedProvider::new());
    let toolkit = Toolkit::with_provider(test_config(dir.path()), as_dyn(&provider))?;

    assert!(matches!(
        toolkit.exploration.start("   ").unwrap_err(),
        Error::InvalidInput(_)
    ));
    assert!(toolkit.exploration.list()?.is_empty());

    Ok(())
}

#[tokio::test]
async fn test_generated_character_keeps_requested_type() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let generated = json!({
        "name": "Maria Chen",
        "type": "organization",
        "description": "Owns two bakeries in the suburbs",
        "info": { "age": 41, "position": "owner" },
        "context": { "goals": "cut delivery costs" },
        "behavior": { "decision_style": "cautious" },
        "tags": ["bakery", "smb"]
    });
    let provider = Arc::new(
        ScriptedProvider::new()
            .reply(round_reply(&["bakery owners"], &["food logistics"], &["thin margins"]))
            .reply(format!("Sure! {}", generated)),
    );
    let toolkit = Toolkit::with_provider(test_config(dir.path()), as_dyn(&provider))?;

    let session = toolkit.exploration.start("Shared delivery vans")?;
    toolkit.exploration.explore(&session.id, "Bakeries deliver daily").await?;
    let summary = toolkit.exploration.summary(&session.id)?;

    let character = toolkit
        .generator
        .generate(&summary, CharacterType::User, None)
        .await?;
    assert_eq!(character.name, "Maria Chen");
    assert_eq!(character.character_type, CharacterType::User);
    assert_eq!(character.info.age, Some(41));
    assert_eq!(character.context.goals, vec!["cut delivery costs"]);
    assert_eq!(character.metadata["source_exploration"], json!(session.id));
    assert_eq!(character.metadata["generated_by"], json!("scripted/scripted-model"));

    // Generation prompt is grounded in the session findings
    assert!(provider.last_request().messages[0].content.contains("bakery owners"));

    toolkit
        .exploration
        .record_generated_character(&session.id, &character.id)?;
    toolkit
        .exploration
        .record_generated_character(&session.id, &character.id)?;
    assert_eq!(
        toolkit.exploration.get(&session.id)?.generated_characters,
        vec![character.id.clone()]
    );
    assert_eq!(toolkit.characters.get(&character.id)?, character);

    Ok(())
}

#[tokio::test]
async fn test_generated_character_falls_back_to_name_hint() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let provider = Arc::new(
        ScriptedProvider::new().reply(json!({ "name": "", "description": "A courier" }).to_string()),
    );
    let toolkit = Toolkit::with_provider(test_config(dir.path()), as_dyn(&provider))?;

    let session = toolkit.exploration.start("Shared delivery vans")?;
    let summary = toolkit.exploration.summary(&session.id)?;
    let character = toolkit
        .generator
        .generate(&summary, CharacterType::Expert, Some("Sam"))
        .await?;

    assert_eq!(character.name, "Sam");
    assert_eq!(character.character_type, CharacterType::Expert);
    assert!(character.missing_fields().contains(&"expertise.professional_field"));

    Ok(())
}
