// CLI module
// Argument parsing for the `rolecast` binary; handlers live in `commands`

mod commands;
mod output;
mod repl;

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::characters::CharacterType;
use crate::config::ProviderKind;
use crate::exploration::QuestionFocus;

pub use commands::run;
pub use repl::{ReplCommand, SessionRepl};

#[derive(Debug, Parser)]
#[command(
    name = "rolecast",
    about = "Character personas, dialogues and idea validation over hosted LLMs",
    version
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Provider to use (openai, claude, zhipu)
    #[arg(long, global = true)]
    pub provider: Option<ProviderKind>,

    /// Model override for the selected provider
    #[arg(long, global = true)]
    pub model: Option<String>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Manage character personas
    #[command(subcommand)]
    Character(CharacterCommand),

    /// Talk to a character
    #[command(subcommand)]
    Dialogue(DialogueCommand),

    /// Develop an idea through guided rounds
    #[command(subcommand)]
    Explore(ExploreCommand),

    /// Put one question to several characters
    #[command(subcommand)]
    Validate(ValidateCommand),

    /// Synthesize a validation into a report
    #[command(subcommand)]
    Analysis(AnalysisCommand),

    /// Inspect or back up the data directory
    #[command(subcommand)]
    Storage(StorageCommand),

    /// Show the effective configuration
    #[command(subcommand)]
    Config(ConfigCommand),

    /// List models offered by the selected provider
    Models,

    /// Print version information
    Version,
}

#[derive(Debug, Subcommand)]
pub enum CharacterCommand {
    /// Create a character by hand
    Create(CreateCharacterArgs),

    /// List characters
    #[command(alias = "ls")]
    List {
        /// Only characters of this type
        #[arg(short = 't', long = "type")]
        character_type: Option<CharacterType>,
    },

    /// Show a character in full
    Show {
        id: String,

        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Update fields of a character
    Update(UpdateCharacterArgs),

    /// Delete a character
    Delete { id: String },

    /// Find characters by name, description, position or tag
    Search { query: String },

    /// Generate a character from an exploration session
    Generate {
        /// Exploration session id
        session: String,

        /// Character type
        #[arg(short = 't', long = "type", default_value = "user")]
        character_type: CharacterType,

        /// Preferred name
        #[arg(short, long)]
        name: Option<String>,
    },
}

#[derive(Debug, Args)]
pub struct CreateCharacterArgs {
    /// Character name
    pub name: String,

    /// Character type
    #[arg(short = 't', long = "type", default_value = "user")]
    pub character_type: CharacterType,

    #[arg(short, long)]
    pub description: Option<String>,

    #[arg(long)]
    pub age: Option<u32>,

    #[arg(short, long)]
    pub position: Option<String>,

    #[arg(long)]
    pub background: Option<String>,

    #[arg(long)]
    pub experience: Option<String>,

    /// Tags (repeatable or comma separated)
    #[arg(long, value_delimiter = ',')]
    pub tags: Vec<String>,
}

#[derive(Debug, Args)]
pub struct UpdateCharacterArgs {
    pub id: String,

    #[arg(long)]
    pub name: Option<String>,

    #[arg(short = 't', long = "type")]
    pub character_type: Option<CharacterType>,

    #[arg(short, long)]
    pub description: Option<String>,

    #[arg(long)]
    pub age: Option<u32>,

    #[arg(short, long)]
    pub position: Option<String>,

    #[arg(long)]
    pub background: Option<String>,

    #[arg(long)]
    pub experience: Option<String>,

    /// Replace tags (comma separated)
    #[arg(long, value_delimiter = ',')]
    pub tags: Option<Vec<String>>,

    /// Raw JSON merge patch applied after the flags
    #[arg(long)]
    pub patch: Option<String>,
}

#[derive(Debug, Subcommand)]
pub enum DialogueCommand {
    /// Start a dialogue with a character
    Start {
        /// Character id
        character: String,

        #[arg(short, long)]
        title: Option<String>,

        /// First message to send
        #[arg(short, long)]
        message: Option<String>,

        /// Continue in an interactive loop
        #[arg(short, long)]
        interactive: bool,
    },

    /// Send a message in an existing dialogue
    Message {
        /// Dialogue id
        dialogue: String,

        text: String,

        /// Print the reply as it arrives
        #[arg(short, long)]
        stream: bool,
    },

    /// Show a dialogue transcript
    Show { dialogue: String },

    /// List dialogues
    #[command(alias = "ls")]
    List {
        /// Only dialogues with this character
        #[arg(short, long)]
        character: Option<String>,
    },

    /// Summarize a dialogue
    Summarize { dialogue: String },

    /// Delete a dialogue
    Delete { dialogue: String },
}

#[derive(Debug, Subcommand)]
pub enum ExploreCommand {
    /// Start exploring an idea
    Start {
        idea: String,

        /// Continue in an interactive loop
        #[arg(short, long)]
        interactive: bool,
    },

    /// Add a round to a session
    Continue { session: String, input: String },

    /// Run a focused question round
    Ask {
        session: String,

        /// stakeholders, scenarios, feasibility, value, risks or general
        #[arg(short, long, default_value = "general")]
        focus: QuestionFocus,
    },

    /// Show every round of a session
    Show { session: String },

    /// List sessions
    #[command(alias = "ls")]
    List,

    /// Show the accumulated summary
    Summary { session: String },

    /// Finalize a session
    Finalize { session: String },
}

#[derive(Debug, Subcommand)]
pub enum ValidateCommand {
    /// Ask several characters the same question
    Concurrent {
        question: String,

        /// Character ids, comma separated
        #[arg(short, long, value_delimiter = ',', required = true)]
        characters: Vec<String>,

        /// Ask one character at a time
        #[arg(long)]
        sequential: bool,
    },

    /// Show a validation session
    Show { validation: String },

    /// List validation sessions
    #[command(alias = "ls")]
    List,
}

#[derive(Debug, Subcommand)]
pub enum AnalysisCommand {
    /// Generate (or regenerate) the report for a validation
    Report { validation: String },

    /// Show a stored report
    Show { validation: String },
}

#[derive(Debug, Subcommand)]
pub enum StorageCommand {
    /// Record counts and sizes
    Stats,

    /// Copy all records into a timestamped backup
    Backup,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Print the merged configuration with API keys masked
    Show,

    /// Print the config file location
    Path,
}
