use crate::models::message::{Message, Role};

/// Where a session is in its turn cycle. Derived from the transcript rather
/// than stored, so it can never drift from the history.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversationState {
    /// Nothing to answer.
    Idle,
    /// The last message came from the user and has no reply yet.
    AwaitingReply,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TurnError {
    #[error("Empty message")]
    EmptyMessage,

    #[error("The previous message is still waiting for a reply")]
    ReplyPending,
}

/// One user's chat. Created when the browser session starts and dropped
/// when it ends; history is never persisted.
#[derive(Debug, Clone, Default)]
pub struct UserSession {
    history: Vec<Message>,
}

impl UserSession {
    pub fn new() -> Self {
        UserSession::default()
    }

    pub fn history(&self) -> &[Message] {
        &self.history
    }

    pub fn state(&self) -> ConversationState {
        match self.history.last() {
            Some(last) if last.role == Role::User => ConversationState::AwaitingReply,
            _ => ConversationState::Idle,
        }
    }

    /// Appends a user turn. Refused while the previous turn is unanswered,
    /// which keeps replies and user turns strictly alternating.
    pub fn push_user(&mut self, content: &str) -> Result<(), TurnError> {
        if content.trim().is_empty() {
            return Err(TurnError::EmptyMessage);
        }
        if self.state() == ConversationState::AwaitingReply {
            return Err(TurnError::ReplyPending);
        }
        self.history.push(Message::user(content));
        Ok(())
    }

    pub(crate) fn push_assistant(&mut self, content: String) -> Message {
        let message = Message::assistant(content);
        self.history.push(message.clone());
        message
    }
}
