use std::time::Duration;

use maitre_core::lookup::ProductLookup;
use maitre_core::transcript::Message;
use maitre_core::{Assistant, AssistantBuilder};
use maitre_model::CompletionProvider;

/// A session builder.
///
/// See [`Session`].
pub struct SessionBuilder {
    assistant_builder: AssistantBuilder,
}

impl SessionBuilder {
    /// Creates a session builder with a specified completion provider.
    pub fn with_provider<P: CompletionProvider + 'static>(
        provider: P,
    ) -> Self {
        let assistant_builder = AssistantBuilder::with_provider(provider);
        Self { assistant_builder }
    }

    /// Wires in the catalog used for product suggestions.
    #[inline]
    pub fn with_catalog<L: ProductLookup + 'static>(
        mut self,
        catalog: L,
    ) -> Self {
        self.assistant_builder = self.assistant_builder.with_lookup(catalog);
        self
    }

    /// Sets the fixed business-knowledge text for the assistant.
    #[inline]
    pub fn with_knowledge_base<S: Into<String>>(mut self, text: S) -> Self {
        self.assistant_builder =
            self.assistant_builder.with_knowledge_base(text);
        self
    }

    /// Overrides the reply stream timeout.
    #[inline]
    pub fn with_stream_timeout(mut self, timeout: Duration) -> Self {
        self.assistant_builder =
            self.assistant_builder.with_stream_timeout(timeout);
        self
    }

    /// Attaches a callback to be invoked with a transcript snapshot on
    /// every change.
    #[inline]
    pub fn on_update(
        mut self,
        on_update: impl Fn(Vec<Message>) + Send + Sync + 'static,
    ) -> Self {
        self.assistant_builder = self.assistant_builder.on_update(on_update);
        self
    }

    /// Attaches a callback to be invoked when the assistant is idle.
    #[inline]
    pub fn on_idle(
        mut self,
        on_idle: impl Fn() + Send + Sync + 'static,
    ) -> Self {
        self.assistant_builder = self.assistant_builder.on_idle(on_idle);
        self
    }

    /// Builds a new session.
    pub fn build(self) -> Session {
        let assistant = self.assistant_builder.build();
        Session { assistant }
    }
}

/// A chat session, like a chat window that displays the transcript and
/// has an input box.
///
/// The session holds a fully configured assistant that you can use
/// directly, and it is basically a wrapper around [`Assistant`].
pub struct Session {
    assistant: Assistant,
}

impl Session {
    /// Sends a user message to the session.
    #[inline]
    pub fn send_message(&self, message: &str) {
        self.assistant.submit(message);
    }

    /// Stops the reply that is currently streaming, if any.
    #[inline]
    pub fn stop(&self) {
        self.assistant.stop();
    }
}
