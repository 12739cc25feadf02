// Conversations with a single character

mod engine;
mod types;

pub use engine::{DialogueEngine, ReplyStream};
pub use types::{Dialogue, DialogueState, Message};
