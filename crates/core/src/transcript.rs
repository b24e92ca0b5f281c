//! The conversation transcript.

use chrono::Local;
use serde::Serialize;

/// The author of a transcript message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The person chatting with the assistant.
    User,
    /// The assistant.
    Assistant,
}

/// One entry in the transcript.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Message {
    /// Who authored this message.
    pub role: Role,
    /// The rendered text of the message.
    pub text: String,
    /// Display-formatted local time, assigned at creation and never
    /// changed afterwards.
    pub timestamp: String,
}

impl Message {
    /// Creates a user message stamped with the current local time.
    #[inline]
    pub fn user<S: Into<String>>(text: S) -> Self {
        Self::new(Role::User, text.into())
    }

    /// Creates an assistant message stamped with the current local time.
    #[inline]
    pub fn assistant<S: Into<String>>(text: S) -> Self {
        Self::new(Role::Assistant, text.into())
    }

    fn new(role: Role, text: String) -> Self {
        Self {
            role,
            text,
            timestamp: Local::now().format("%H:%M").to_string(),
        }
    }
}

/// An ordered, append-only sequence of messages.
///
/// The transcript is the single source of truth for what a shell
/// renders and what is sent upstream as conversation context. The only
/// mutation besides appending is rewriting the text of the reply that
/// is currently streaming, and callers only ever target the last
/// entry; once its turn ends, that entry is immutable.
#[derive(Clone, Default, Debug)]
pub struct Transcript {
    items: Vec<Message>,
}

impl Transcript {
    /// Creates an empty transcript.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a transcript seeded with an assistant greeting.
    #[inline]
    pub fn with_greeting<S: Into<String>>(greeting: S) -> Self {
        Self {
            items: vec![Message::assistant(greeting.into())],
        }
    }

    /// Appends a message and returns its index.
    #[inline]
    pub fn append(&mut self, msg: Message) -> usize {
        self.items.push(msg);
        self.items.len() - 1
    }

    /// Rewrites the text of the message at `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of bounds.
    #[inline]
    pub fn update_text_at(&mut self, index: usize, text: String) {
        self.items[index].text = text;
    }

    /// Returns a copy of the full ordered message list.
    #[inline]
    pub fn snapshot(&self) -> Vec<Message> {
        self.items.clone()
    }

    /// Returns an iterator over the messages in order.
    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = &Message> {
        self.items.iter()
    }

    /// Returns the number of messages.
    #[inline]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns `true` if the transcript holds no messages.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Returns the most recent message, if any.
    #[inline]
    pub fn last(&self) -> Option<&Message> {
        self.items.last()
    }
}
