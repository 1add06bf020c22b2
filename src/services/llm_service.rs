use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::models::message::Message;

/// Prefix of every reply that is really a failure report.
pub const ERROR_PREFIX: &str = "Error: ";

/// Something that turns a transcript into the next assistant reply.
///
/// Implementations never fail outright: a failed call comes back as text
/// starting with [`ERROR_PREFIX`] so the chat always has something to show.
pub trait ChatCompletion {
    fn complete(&self, messages: &[Message]) -> String;
}

#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("{0}")]
    Http(#[from] reqwest::Error),

    #[error("response contained no choices")]
    NoChoices,
}

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: String,
}

/// Blocking client for Ollama's OpenAI-compatible chat completion route.
#[derive(Debug, Clone)]
pub struct OllamaClient {
    url: String,
    model: String,
}

impl OllamaClient {
    pub fn new(url: &str, model: &str) -> Self {
        OllamaClient {
            url: url.to_string(),
            model: model.to_string(),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn request(&self, messages: &[Message]) -> Result<String, LlmError> {
        let payload = ChatCompletionRequest { model: &self.model, messages };
        // Blocking clients must not be created or dropped on an async worker.
        let response: ChatCompletionResponse = reqwest::blocking::Client::new()
            .post(&self.url)
            .json(&payload)
            .send()?
            .error_for_status()?
            .json()?;
        first_choice(response)
    }
}

impl ChatCompletion for OllamaClient {
    fn complete(&self, messages: &[Message]) -> String {
        debug!("Sending {} messages to {} ({})", messages.len(), self.url, self.model);
        match self.request(messages) {
            Ok(content) => content,
            Err(e) => {
                warn!("Chat completion failed: {}", e);
                format!("{}{}", ERROR_PREFIX, e)
            }
        }
    }
}

fn first_choice(response: ChatCompletionResponse) -> Result<String, LlmError> {
    response
        .choices
        .into_iter()
        .next()
        .map(|choice| choice.message.content.trim().to_string())
        .ok_or(LlmError::NoChoices)
}
