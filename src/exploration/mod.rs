// Idea exploration sessions

mod engine;
mod types;

pub use engine::ExplorationEngine;
pub use types::{
    ExplorationFindings, ExplorationRound, ExplorationSession, ExplorationSummary,
    ExplorationUpdate, QuestionFocus, Readiness, READY_MIN_ROUNDS,
};
