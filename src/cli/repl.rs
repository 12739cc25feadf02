// Interactive line loop for dialogues and explorations

use anyhow::Result;
use crossterm::style::Stylize;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

use crate::exploration::QuestionFocus;

/// One line of interactive input
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplCommand {
    Help,
    Quit,
    Summary,
    Finalize,
    Ask(QuestionFocus),
    /// Plain text to send
    Say(String),
    Unknown(String),
}

impl ReplCommand {
    /// Parse a line; `None` for blank input
    pub fn parse(input: &str) -> Option<Self> {
        let input = input.trim();
        if input.is_empty() {
            return None;
        }
        if !input.starts_with('/') {
            return Some(Self::Say(input.to_string()));
        }

        let mut parts = input.splitn(2, char::is_whitespace);
        let command = parts.next().unwrap_or_default();
        let arg = parts.next().map(str::trim).unwrap_or("");

        Some(match command {
            "/help" => Self::Help,
            "/quit" | "/exit" => Self::Quit,
            "/summary" => Self::Summary,
            "/finalize" => Self::Finalize,
            "/ask" => match arg {
                "" => Self::Ask(QuestionFocus::General),
                focus => match focus.parse() {
                    Ok(f) => Self::Ask(f),
                    Err(_) => Self::Unknown(input.to_string()),
                },
            },
            _ => Self::Unknown(input.to_string()),
        })
    }
}

pub fn dialogue_help() -> &'static str {
    r#"Type a message to talk to the character.
  /summary   - Summarize the conversation so far
  /help      - Show this help message
  /quit      - Leave the dialogue"#
}

pub fn explore_help() -> &'static str {
    r#"Type anything to add a round to the exploration.
  /ask [focus] - Let the assistant ask about stakeholders, scenarios,
                 feasibility, value, risks or general
  /summary     - Show what has been established
  /finalize    - Finalize the session and leave
  /help        - Show this help message
  /quit        - Leave without finalizing"#
}

/// Line editor with history for one interactive session
pub struct SessionRepl {
    editor: DefaultEditor,
    prompt: String,
}

impl SessionRepl {
    pub fn new(prompt: impl Into<String>) -> Result<Self> {
        Ok(Self {
            editor: DefaultEditor::new()?,
            prompt: prompt.into(),
        })
    }

    /// Next command; `None` on end of input
    pub fn read(&mut self) -> Result<Option<ReplCommand>> {
        loop {
            match self.editor.readline(&self.prompt) {
                Ok(line) => {
                    let Some(command) = ReplCommand::parse(&line) else {
                        continue;
                    };
                    let _ = self.editor.add_history_entry(line.trim());
                    return Ok(Some(command));
                }
                Err(ReadlineError::Interrupted) => {
                    println!("{}", "CTRL-C detected. Type /quit to exit.".yellow());
                }
                Err(ReadlineError::Eof) => return Ok(None),
                Err(e) => return Err(e.into()),
            }
        }
    }
}
