// Rolecast - character personas, dialogues and idea validation over hosted LLMs
// Library exports

// Core modules
pub mod analysis;
pub mod app;
pub mod characters;
pub mod config;
pub mod dialogue;
pub mod error;
pub mod exploration;
pub mod providers;
pub mod storage;
pub mod templates;
pub mod validation;

// Support
pub mod cli;
pub mod logging;
pub mod parsing;

pub use app::Toolkit;
pub use error::{Error, Result};
