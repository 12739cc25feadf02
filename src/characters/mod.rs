// Character personas: data model, store, prompts and generation

mod generator;
mod persona;
mod store;
mod types;

pub use generator::CharacterGenerator;
pub use persona::persona_prompt;
pub use store::{CharacterPatch, CharacterStore, InfoPatch};
pub use types::{
    Character, CharacterBehavior, CharacterContext, CharacterDraft, CharacterExpertise,
    CharacterInfo, CharacterType, ResponsePattern,
};
