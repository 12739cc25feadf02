// Dialogue engine
//
// A turn loads the dialogue and its character, builds the persona system
// prompt and sends the (optionally windowed) history plus the new message.
// The user message and the reply are appended and persisted together, so a
// failed call leaves the stored dialogue exactly as it was.

use serde_json::json;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc::Receiver;

use super::types::{Dialogue, Message};
use crate::characters::{persona_prompt, Character, CharacterStore};
use crate::config::GenerationSettings;
use crate::error::{Error, ProviderError, Result};
use crate::providers::{
    sse, ChatMessage, LlmProvider, ProviderRequest, ProviderResult, Role, StreamChunk,
};
use crate::storage::FileStore;
use crate::templates::{self, TemplateRenderer};

pub struct DialogueEngine {
    provider: Arc<dyn LlmProvider>,
    templates: Arc<TemplateRenderer>,
    characters: CharacterStore,
    dialogues: FileStore<Dialogue>,
    generation: GenerationSettings,
    context_window: Option<usize>,
}

impl DialogueEngine {
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        templates: Arc<TemplateRenderer>,
        characters: CharacterStore,
        dialogues: FileStore<Dialogue>,
        generation: GenerationSettings,
    ) -> Self {
        Self {
            provider,
            templates,
            characters,
            dialogues,
            generation,
            context_window: None,
        }
    }

    /// Send only the trailing `window` messages as history
    pub fn with_context_window(mut self, window: Option<usize>) -> Self {
        self.context_window = window.filter(|n| *n > 0);
        self
    }

    /// Create an empty dialogue with an existing character
    pub fn start(&self, character_id: &str, title: Option<&str>) -> Result<Dialogue> {
        let character = self.characters.get(character_id)?;
        let title = title
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| format!("Conversation with {}", character.name));

        let dialogue = Dialogue::new(&character.id, title);
        self.dialogues.save(&dialogue)?;
        tracing::info!("Started dialogue {} with '{}'", dialogue.id, character.name);
        Ok(dialogue)
    }

    /// Append a user message, get the character's reply and persist both
    ///
    /// Returns the assistant message.
    #[tracing::instrument(skip(self, text), fields(dialogue = %dialogue_id))]
    pub async fn send_message(&self, dialogue_id: &str, text: &str) -> Result<Message> {
        let (mut dialogue, request) = self.prepare_turn(dialogue_id, text)?;
        let user = Message::new(Role::User, text.trim());

        let started = Instant::now();
        let response = self.provider.chat_completion(&request).await?;
        tracing::debug!(
            "{} reply from {} in {}ms",
            response.provider,
            response.model,
            started.elapsed().as_millis()
        );
        if response.text().trim().is_empty() {
            return Err(ProviderError::MalformedResponse {
                provider: response.provider,
                message: "empty completion".into(),
            }
            .into());
        }

        let mut reply = Message::new(Role::Assistant, response.content);
        reply.metadata.insert("model".into(), json!(response.model));
        reply.metadata.insert("usage".into(), json!(response.usage));

        dialogue.push(user);
        dialogue.push(reply.clone());
        self.dialogues.save(&dialogue)?;
        Ok(reply)
    }

    /// Streaming variant of [`send_message`](Self::send_message)
    ///
    /// Fragments are yielded as they arrive. Both messages are persisted
    /// once the stream completes; dropping the stream early persists nothing.
    #[tracing::instrument(skip(self, text), fields(dialogue = %dialogue_id))]
    pub async fn send_message_stream(&self, dialogue_id: &str, text: &str) -> Result<ReplyStream> {
        let (mut dialogue, request) = self.prepare_turn(dialogue_id, text)?;
        let request = request.with_stream(true);
        let user = Message::new(Role::User, text.trim());

        let receiver = self.provider.chat_completion_stream(&request).await?;
        dialogue.push(user);

        Ok(ReplyStream {
            receiver,
            dialogue,
            store: self.dialogues.clone(),
            provider: self.provider.name().to_string(),
            buffer: String::new(),
            message: None,
            done: false,
        })
    }

    fn prepare_turn(&self, dialogue_id: &str, text: &str) -> Result<(Dialogue, ProviderRequest)> {
        if text.trim().is_empty() {
            return Err(Error::InvalidInput("message must not be empty".into()));
        }
        let dialogue = self.dialogues.load(dialogue_id)?;
        let character = self.characters.get(&dialogue.character_id)?;

        let system = self.turn_system_prompt(&character, &dialogue)?;
        let mut messages: Vec<ChatMessage> = dialogue
            .recent(self.context_window)
            .iter()
            .map(Message::to_chat)
            .collect();
        messages.push(ChatMessage::user(text.trim()));

        let request = self.request(messages, self.generation.max_tokens, self.generation.timeout())
            .with_system(system);
        Ok((dialogue, request))
    }

    fn turn_system_prompt(&self, character: &Character, dialogue: &Dialogue) -> Result<String> {
        let persona = persona_prompt(&self.templates, character)?;
        let guidelines = self.templates.render(
            templates::DIALOGUE_TURN,
            &json!({
                "dialogue_title": dialogue.title,
                "turn_count": dialogue.messages.len(),
                "character_name": character.name,
            }),
        )?;
        Ok(format!("{}\n\n{}", persona.trim_end(), guidelines.trim_end()))
    }

    fn request(&self, messages: Vec<ChatMessage>, max_tokens: u32, timeout: Duration) -> ProviderRequest {
        ProviderRequest::new(messages)
            .with_max_tokens(max_tokens)
            .with_temperature(self.generation.temperature)
            .with_timeout(timeout)
    }

    /// Summarize a dialogue without modifying it
    #[tracing::instrument(skip(self), fields(dialogue = %dialogue_id))]
    pub async fn summarize(&self, dialogue_id: &str) -> Result<String> {
        let dialogue = self.dialogues.load(dialogue_id)?;
        if dialogue.messages.is_empty() {
            return Err(Error::InvalidInput(format!(
                "dialogue '{}' has no messages to summarize",
                dialogue.id
            )));
        }
        let character = self.characters.get(&dialogue.character_id)?;

        let transcript = dialogue
            .messages
            .iter()
            .map(|m| {
                let speaker = match m.role {
                    Role::Assistant => character.name.as_str(),
                    Role::User => "User",
                    Role::System => "System",
                };
                format!("{}: {}", speaker, m.content)
            })
            .collect::<Vec<_>>()
            .join("\n\n");

        let prompt = self.templates.render(
            templates::DIALOGUE_SUMMARY,
            &json!({
                "character_name": character.name,
                "transcript": transcript,
            }),
        )?;
        let request = self.request(
            vec![ChatMessage::user(prompt)],
            self.generation.max_tokens,
            self.generation.timeout(),
        );
        let response = self.provider.chat_completion(&request).await?;
        Ok(response.content)
    }

    /// One stateless exchange in character; nothing is persisted
    pub async fn consult(
        &self,
        character: &Character,
        prompt: &str,
        max_tokens: u32,
        timeout: Duration,
    ) -> Result<String> {
        let system = persona_prompt(&self.templates, character)?;
        let request = self
            .request(vec![ChatMessage::user(prompt)], max_tokens, timeout)
            .with_system(system);
        let response = self.provider.chat_completion(&request).await?;
        if response.text().trim().is_empty() {
            return Err(ProviderError::MalformedResponse {
                provider: response.provider,
                message: "empty completion".into(),
            }
            .into());
        }
        Ok(response.content)
    }

    pub fn get(&self, dialogue_id: &str) -> Result<Dialogue> {
        Ok(self.dialogues.load(dialogue_id)?)
    }

    /// Dialogues, most recently updated first, optionally for one character
    pub fn list(&self, character_id: Option<&str>) -> Result<Vec<Dialogue>> {
        let mut dialogues: Vec<Dialogue> = self
            .dialogues
            .list()?
            .into_iter()
            .filter(|d| character_id.map_or(true, |c| d.character_id == c))
            .collect();
        dialogues.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(dialogues)
    }

    pub fn delete(&self, dialogue_id: &str) -> Result<()> {
        self.dialogues.delete(dialogue_id)?;
        tracing::info!("Deleted dialogue {}", dialogue_id);
        Ok(())
    }

    pub fn characters(&self) -> &CharacterStore {
        &self.characters
    }
}

/// In-flight streamed reply
///
/// Call [`next`](Self::next) until it returns `None`. The turn is persisted
/// when the provider signals the end of the stream.
pub struct ReplyStream {
    receiver: Receiver<ProviderResult<StreamChunk>>,
    dialogue: Dialogue,
    store: FileStore<Dialogue>,
    provider: String,
    buffer: String,
    message: Option<Message>,
    done: bool,
}

impl ReplyStream {
    /// Next text fragment; `None` once the turn is complete or has failed
    pub async fn next(&mut self) -> Option<Result<String>> {
        if self.done {
            return None;
        }
        loop {
            match self.receiver.recv().await {
                Some(Ok(StreamChunk::TextDelta(text))) => {
                    if text.is_empty() {
                        continue;
                    }
                    self.buffer.push_str(&text);
                    return Some(Ok(text));
                }
                Some(Ok(StreamChunk::Done { .. })) => {
                    self.done = true;
                    return self.complete().err().map(Err);
                }
                // Sender went away without a terminal chunk
                None => {
                    self.done = true;
                    return Some(Err(sse::truncated(&self.provider).into()));
                }
                Some(Err(e)) => {
                    self.done = true;
                    return Some(Err(e.into()));
                }
            }
        }
    }

    /// Drain the remaining fragments and return the persisted reply
    pub async fn finish(mut self) -> Result<Message> {
        while let Some(fragment) = self.next().await {
            fragment?;
        }
        self.message.ok_or_else(|| {
            ProviderError::MalformedResponse {
                provider: self.provider,
                message: "stream ended without a reply".into(),
            }
            .into()
        })
    }

    pub fn dialogue_id(&self) -> &str {
        &self.dialogue.id
    }

    /// Persisted assistant message, once the stream has completed
    pub fn message(&self) -> Option<&Message> {
        self.message.as_ref()
    }

    fn complete(&mut self) -> Result<()> {
        if self.buffer.trim().is_empty() {
            return Err(ProviderError::MalformedResponse {
                provider: self.provider.clone(),
                message: "stream ended without content".into(),
            }
            .into());
        }
        let reply = Message::new(Role::Assistant, std::mem::take(&mut self.buffer));
        self.dialogue.push(reply.clone());
        self.store.save(&self.dialogue)?;
        self.message = Some(reply);
        Ok(())
    }
}
