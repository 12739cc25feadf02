// Fan-out of one question to several characters

mod types;
mod validator;

pub use types::{CharacterResponse, ValidationFailure, ValidationMode, ValidationSession};
pub use validator::ConcurrentValidator;
