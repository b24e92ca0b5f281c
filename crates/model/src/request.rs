/// A request to be sent to the completion backend.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CompletionRequest {
    /// The input messages, in conversation order.
    ///
    /// The system instruction, if any, travels as a leading
    /// [`ChatMessage::System`] entry.
    pub messages: Vec<ChatMessage>,
}

/// A complete message.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ChatMessage {
    /// The system instructions.
    System(String),
    /// A user input text.
    User(String),
    /// An assistant text.
    Assistant(String),
}

impl ChatMessage {
    /// Returns the text content of this message.
    #[inline]
    pub fn text(&self) -> &str {
        match self {
            ChatMessage::System(text)
            | ChatMessage::User(text)
            | ChatMessage::Assistant(text) => text,
        }
    }
}
