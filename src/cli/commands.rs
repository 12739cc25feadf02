// Command handlers
//
// Read-only and record-management commands work from the stores alone and
// need no API key. Anything that calls a model builds the full toolkit.

use anyhow::{bail, Context, Result};
use crossterm::style::Stylize;
use serde_json::Value;
use std::io::Write;

use super::output;
use super::repl::{dialogue_help, explore_help, ReplCommand, SessionRepl};
use super::{
    AnalysisCommand, CharacterCommand, Cli, Command, ConfigCommand, CreateCharacterArgs,
    DialogueCommand, ExploreCommand, StorageCommand, UpdateCharacterArgs, ValidateCommand,
};
use crate::analysis::AnalysisReport;
use crate::app::Toolkit;
use crate::characters::{CharacterDraft, CharacterPatch, CharacterStore, InfoPatch};
use crate::config::{default_config_path, AppConfig};
use crate::dialogue::Dialogue;
use crate::exploration::ExplorationSession;
use crate::storage::{create_backup, storage_stats, FileStore, Record};
use crate::validation::{ValidationMode, ValidationSession};

/// Execute a parsed command line against a loaded config
pub async fn run(cli: Cli, config: AppConfig) -> Result<()> {
    match cli.command {
        Command::Character(cmd) => character(&config, cmd).await,
        Command::Dialogue(cmd) => dialogue(&config, cmd).await,
        Command::Explore(cmd) => explore(&config, cmd).await,
        Command::Validate(cmd) => validate(&config, cmd).await,
        Command::Analysis(cmd) => analysis(&config, cmd).await,
        Command::Storage(cmd) => storage(&config, cmd),
        Command::Config(cmd) => show_config(&config, cli.config.as_deref(), cmd),
        Command::Models => models(&config),
        Command::Version => {
            println!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn toolkit(config: &AppConfig) -> Result<Toolkit> {
    config.validate()?;
    Toolkit::new(config.clone()).context("Failed to initialize")
}

fn characters(config: &AppConfig) -> Result<CharacterStore> {
    Ok(CharacterStore::open(
        &config.storage.data_dir,
        config.storage.format,
    )?)
}

fn records<T: Record>(config: &AppConfig) -> Result<FileStore<T>> {
    Ok(FileStore::open(&config.storage.data_dir, config.storage.format)?)
}

// ─── character ───

async fn character(config: &AppConfig, cmd: CharacterCommand) -> Result<()> {
    match cmd {
        CharacterCommand::Create(args) => {
            let created = characters(config)?.create(draft_from(args))?;
            output::success(&format!("Created {} ({})", created.name, created.id));
            output::character(&created);
        }
        CharacterCommand::List { character_type } => {
            let store = characters(config)?;
            let list = match character_type {
                Some(t) => store.list_by_type(t)?,
                None => store.list()?,
            };
            if list.is_empty() {
                println!("No characters yet. Create one with `rolecast character create`.");
            }
            for c in &list {
                output::character_row(c);
            }
        }
        CharacterCommand::Show { id, json } => {
            let c = characters(config)?.get(&id)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&c)?);
            } else {
                output::character(&c);
            }
        }
        CharacterCommand::Update(args) => {
            let id = args.id.clone();
            let patch = patch_from(args)?;
            let updated = characters(config)?.update(&id, &patch)?;
            output::success(&format!("Updated {}", updated.name));
            output::character(&updated);
        }
        CharacterCommand::Delete { id } => {
            characters(config)?.delete(&id)?;
            output::success(&format!("Deleted {}", id));
        }
        CharacterCommand::Search { query } => {
            let found = characters(config)?.search(&query)?;
            if found.is_empty() {
                println!("No characters match '{}'", query);
            }
            for c in &found {
                output::character_row(c);
            }
        }
        CharacterCommand::Generate {
            session,
            character_type,
            name,
        } => {
            let kit = toolkit(config)?;
            let summary = kit.exploration.summary(&session)?;
            println!("{}", "Generating character...".dark_grey());
            let generated = kit
                .generator
                .generate(&summary, character_type, name.as_deref())
                .await?;
            kit.exploration
                .record_generated_character(&session, &generated.id)?;
            output::success(&format!("Generated {} ({})", generated.name, generated.id));
            output::character(&generated);
        }
    }
    Ok(())
}

fn draft_from(args: CreateCharacterArgs) -> CharacterDraft {
    let mut draft = CharacterDraft::new(args.name, args.character_type);
    draft.description = args.description.unwrap_or_default();
    draft.info.age = args.age;
    draft.info.position = args.position;
    draft.info.background = args.background;
    draft.info.experience = args.experience;
    draft.tags = args.tags;
    draft
}

fn patch_from(args: UpdateCharacterArgs) -> Result<Value> {
    let typed = CharacterPatch {
        name: args.name,
        character_type: args.character_type,
        description: args.description,
        info: InfoPatch {
            age: args.age,
            position: args.position,
            background: args.background,
            experience: args.experience,
        },
        tags: args.tags,
    };
    let mut patch = typed.to_merge_patch();

    if let Some(raw) = args.patch {
        let extra: Value = serde_json::from_str(&raw).context("--patch is not valid JSON")?;
        let Value::Object(extra) = extra else {
            bail!("--patch must be a JSON object");
        };
        if let Value::Object(fields) = &mut patch {
            fields.extend(extra);
        }
    }

    if patch.as_object().map_or(true, |o| o.is_empty()) {
        bail!("Nothing to update. Pass at least one field flag or --patch.");
    }
    Ok(patch)
}

// ─── dialogue ───

async fn dialogue(config: &AppConfig, cmd: DialogueCommand) -> Result<()> {
    match cmd {
        DialogueCommand::Start {
            character,
            title,
            message,
            interactive,
        } => {
            let kit = toolkit(config)?;
            let started = kit.dialogue.start(&character, title.as_deref())?;
            let name = kit.characters.get(&started.character_id)?.name;
            output::success(&format!("Started '{}' ({})", started.title, started.id));

            if let Some(text) = message {
                send_streamed(&kit, &started.id, &text, &name).await?;
            }
            if interactive {
                dialogue_loop(&kit, &started.id, &name).await?;
            }
        }
        DialogueCommand::Message {
            dialogue,
            text,
            stream,
        } => {
            let kit = toolkit(config)?;
            let d = kit.dialogue.get(&dialogue)?;
            let name = kit.characters.get(&d.character_id)?.name;
            if stream {
                send_streamed(&kit, &dialogue, &text, &name).await?;
            } else {
                let reply = kit.dialogue.send_message(&dialogue, &text).await?;
                output::message(&reply, &name);
            }
        }
        DialogueCommand::Show { dialogue } => {
            let d = records::<Dialogue>(config)?.load(&dialogue)?;
            let name = character_name(config, &d.character_id);
            output::dialogue(&d, &name);
        }
        DialogueCommand::List { character } => {
            let mut list: Vec<Dialogue> = records::<Dialogue>(config)?
                .list()?
                .into_iter()
                .filter(|d| character.as_deref().map_or(true, |c| d.character_id == c))
                .collect();
            list.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
            if list.is_empty() {
                println!("No dialogues found");
            }
            for d in &list {
                output::dialogue_row(d);
            }
        }
        DialogueCommand::Summarize { dialogue } => {
            let kit = toolkit(config)?;
            let summary = kit.dialogue.summarize(&dialogue).await?;
            println!("{}", summary);
        }
        DialogueCommand::Delete { dialogue } => {
            records::<Dialogue>(config)?.delete(&dialogue)?;
            output::success(&format!("Deleted {}", dialogue));
        }
    }
    Ok(())
}

fn character_name(config: &AppConfig, id: &str) -> String {
    characters(config)
        .and_then(|s| Ok(s.get(id)?.name))
        .unwrap_or_else(|_| format!("<deleted character {}>", id))
}

async fn send_streamed(kit: &Toolkit, dialogue_id: &str, text: &str, name: &str) -> Result<()> {
    let mut stream = kit.dialogue.send_message_stream(dialogue_id, text).await?;
    println!("{}", name.blue().bold());
    let mut stdout = std::io::stdout();
    while let Some(fragment) = stream.next().await {
        let fragment = fragment?;
        print!("{}", fragment);
        stdout.flush()?;
    }
    println!("\n");
    Ok(())
}

async fn dialogue_loop(kit: &Toolkit, dialogue_id: &str, name: &str) -> Result<()> {
    println!("{}", dialogue_help().dark_grey());
    let mut repl = SessionRepl::new("you> ")?;

    while let Some(command) = repl.read()? {
        match command {
            ReplCommand::Quit => break,
            ReplCommand::Help => println!("{}", dialogue_help()),
            ReplCommand::Summary => match kit.dialogue.summarize(dialogue_id).await {
                Ok(summary) => println!("{}\n", summary),
                Err(e) => eprintln!("{} {}", "Error:".red(), e),
            },
            ReplCommand::Say(text) => {
                // A failed turn is reported and the loop continues
                if let Err(e) = send_streamed(kit, dialogue_id, &text, name).await {
                    eprintln!("{} {:#}", "Error:".red(), e);
                }
            }
            ReplCommand::Ask(_) | ReplCommand::Finalize | ReplCommand::Unknown(_) => {
                println!("{}", "Unknown command. Type /help for options.".yellow());
            }
        }
    }
    Ok(())
}

// ─── explore ───

async fn explore(config: &AppConfig, cmd: ExploreCommand) -> Result<()> {
    match cmd {
        ExploreCommand::Start { idea, interactive } => {
            let kit = toolkit(config)?;
            let session = kit.exploration.start(&idea)?;
            output::success(&format!("Started exploration {}", session.id));
            if interactive {
                explore_loop(&kit, &session.id).await?;
            } else {
                println!(
                    "Continue with `rolecast explore continue {} \"...\"`",
                    session.id
                );
            }
        }
        ExploreCommand::Continue { session, input } => {
            let kit = toolkit(config)?;
            let round = kit.exploration.explore(&session, &input).await?;
            output::round(&round);
        }
        ExploreCommand::Ask { session, focus } => {
            let kit = toolkit(config)?;
            let round = kit.exploration.ask_question(&session, focus).await?;
            output::round(&round);
        }
        ExploreCommand::Show { session } => {
            let s = records::<ExplorationSession>(config)?.load(&session)?;
            output::exploration(&s);
        }
        ExploreCommand::List => {
            let mut list = records::<ExplorationSession>(config)?.list()?;
            list.sort_by(|a, b| b.created_at.cmp(&a.created_at));
            if list.is_empty() {
                println!("No explorations yet");
            }
            for s in &list {
                output::exploration_row(s);
            }
        }
        ExploreCommand::Summary { session } => {
            let s = records::<ExplorationSession>(config)?.load(&session)?;
            output::summary(&s.summary());
        }
        ExploreCommand::Finalize { session } => {
            let store = records::<ExplorationSession>(config)?;
            let mut s = store.load(&session)?;
            if s.finalize() {
                store.save(&s)?;
                output::success("Exploration finalized");
            } else {
                println!("Exploration was already finalized");
            }
            output::summary(&s.summary());
        }
    }
    Ok(())
}

async fn explore_loop(kit: &Toolkit, session_id: &str) -> Result<()> {
    println!("{}", explore_help().dark_grey());
    let mut repl = SessionRepl::new("idea> ")?;

    while let Some(command) = repl.read()? {
        let result = match command {
            ReplCommand::Quit => break,
            ReplCommand::Help => {
                println!("{}", explore_help());
                Ok(())
            }
            ReplCommand::Summary => kit
                .exploration
                .summary(session_id)
                .map(|s| output::summary(&s)),
            ReplCommand::Finalize => {
                let summary = kit.exploration.finalize(session_id)?;
                output::summary(&summary);
                break;
            }
            ReplCommand::Ask(focus) => kit
                .exploration
                .ask_question(session_id, focus)
                .await
                .map(|r| output::round(&r)),
            ReplCommand::Say(text) => kit
                .exploration
                .explore(session_id, &text)
                .await
                .map(|r| output::round(&r)),
            ReplCommand::Unknown(_) => {
                println!("{}", "Unknown command. Type /help for options.".yellow());
                Ok(())
            }
        };
        if let Err(e) = result {
            eprintln!("{} {}", "Error:".red(), e);
        }
    }
    Ok(())
}

// ─── validate / analysis ───

async fn validate(config: &AppConfig, cmd: ValidateCommand) -> Result<()> {
    match cmd {
        ValidateCommand::Concurrent {
            question,
            characters,
            sequential,
        } => {
            let kit = toolkit(config)?;
            let mode = if sequential {
                ValidationMode::Sequential
            } else {
                ValidationMode::Concurrent
            };
            println!(
                "{}",
                format!("Asking {} character(s)...", characters.len()).dark_grey()
            );
            let session = kit.validator.validate(&question, &characters, mode).await?;
            output::validation(&session);
            println!("\nValidation id: {}", session.id);
        }
        ValidateCommand::Show { validation } => {
            let v = records::<ValidationSession>(config)?.load(&validation)?;
            output::validation(&v);
        }
        ValidateCommand::List => {
            let mut list = records::<ValidationSession>(config)?.list()?;
            list.sort_by(|a, b| b.created_at.cmp(&a.created_at));
            if list.is_empty() {
                println!("No validations yet");
            }
            for v in &list {
                output::validation_row(v);
            }
        }
    }
    Ok(())
}

async fn analysis(config: &AppConfig, cmd: AnalysisCommand) -> Result<()> {
    match cmd {
        AnalysisCommand::Report { validation } => {
            let kit = toolkit(config)?;
            println!("{}", "Analyzing responses...".dark_grey());
            let report = kit.analyzer.report(&validation).await?;
            output::report(&report);
        }
        AnalysisCommand::Show { validation } => {
            let report = records::<AnalysisReport>(config)?.load(&validation)?;
            output::report(&report);
        }
    }
    Ok(())
}

// ─── storage / models ───

fn storage(config: &AppConfig, cmd: StorageCommand) -> Result<()> {
    let data_dir = &config.storage.data_dir;
    match cmd {
        StorageCommand::Stats => output::stats(&storage_stats(data_dir)?),
        StorageCommand::Backup => {
            let target = create_backup(data_dir)?;
            output::success(&format!("Backup written to {}", target.display()));
        }
    }
    Ok(())
}

fn show_config(config: &AppConfig, explicit: Option<&std::path::Path>, cmd: ConfigCommand) -> Result<()> {
    match cmd {
        ConfigCommand::Show => print!("{}", config.to_redacted_toml()?),
        ConfigCommand::Path => match explicit.map(|p| p.to_path_buf()).or_else(default_config_path) {
            Some(path) => {
                let state = if path.exists() { "" } else { " (not found, using defaults)" };
                println!("{}{}", path.display(), state.dark_grey());
            }
            None => println!("{}", "No config directory available on this platform".yellow()),
        },
    }
    Ok(())
}

fn models(config: &AppConfig) -> Result<()> {
    config.validate()?;
    let provider = crate::providers::create_provider(config)?;
    let active = config.active_model();
    output::heading(&format!("Models for {}", provider.name()));
    for m in provider.models() {
        let marker = if m.name == active { "*" } else { " " };
        println!(
            "{} {:<28} {:>7} tokens  {}",
            marker,
            m.name,
            m.max_tokens,
            m.description.as_str().dark_grey()
        );
    }
    Ok(())
}
