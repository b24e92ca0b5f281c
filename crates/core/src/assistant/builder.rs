use std::sync::Arc;
use std::time::Duration;

use maitre_model::CompletionProvider;

use super::Assistant;
use super::state::{IdleFn, UpdateFn};
use crate::completion_client::CompletionClient;
use crate::lookup::{NoLookup, ProductLookup};
use crate::prompt::DEFAULT_GREETING;
use crate::transcript::Message;

const DEFAULT_STREAM_TIMEOUT: Duration = Duration::from_secs(60);

/// [`Assistant`] builder.
pub struct AssistantBuilder {
    pub(crate) completion_client: CompletionClient,
    pub(crate) lookup: Arc<dyn ProductLookup>,
    pub(crate) knowledge_base: Option<String>,
    pub(crate) greeting: String,
    pub(crate) stream_timeout: Duration,
    pub(crate) on_update: Option<UpdateFn>,
    pub(crate) on_idle: Option<IdleFn>,
}

impl AssistantBuilder {
    /// Creates a new builder with the specified completion provider.
    #[inline]
    pub fn with_provider<P: CompletionProvider + 'static>(
        provider: P,
    ) -> Self {
        Self {
            completion_client: CompletionClient::new(provider),
            lookup: Arc::new(NoLookup),
            knowledge_base: None,
            greeting: DEFAULT_GREETING.to_owned(),
            stream_timeout: DEFAULT_STREAM_TIMEOUT,
            on_update: None,
            on_idle: None,
        }
    }

    /// Sets the product lookup backing the catalog side channel.
    ///
    /// Without one, turns run with zero product hits.
    #[inline]
    pub fn with_lookup<L: ProductLookup + 'static>(mut self, lookup: L) -> Self {
        self.lookup = Arc::new(lookup);
        self
    }

    /// Sets the fixed business-knowledge text.
    ///
    /// The text is sent verbatim as the system instruction of every
    /// upstream request, never summarized or truncated.
    #[inline]
    pub fn with_knowledge_base<S: Into<String>>(mut self, text: S) -> Self {
        self.knowledge_base = Some(text.into());
        self
    }

    /// Overrides the greeting seeded into the transcript.
    #[inline]
    pub fn with_greeting<S: Into<String>>(mut self, greeting: S) -> Self {
        self.greeting = greeting.into();
        self
    }

    /// Overrides how long the engine waits for the next stream event
    /// before declaring the turn failed.
    #[inline]
    pub fn with_stream_timeout(mut self, timeout: Duration) -> Self {
        self.stream_timeout = timeout;
        self
    }

    /// Attaches a callback invoked with a full transcript snapshot
    /// after every transcript mutation.
    #[inline]
    pub fn on_update(
        mut self,
        on_update: impl Fn(Vec<Message>) + Send + Sync + 'static,
    ) -> Self {
        self.on_update = Some(Box::new(on_update));
        self
    }

    /// Attaches a callback invoked whenever the engine becomes idle
    /// with no queued submissions.
    #[inline]
    pub fn on_idle(
        mut self,
        on_idle: impl Fn() + Send + Sync + 'static,
    ) -> Self {
        self.on_idle = Some(Box::new(on_idle));
        self
    }

    /// Builds the assistant.
    #[inline]
    pub fn build(self) -> Assistant {
        Assistant::spawn_from_builder(self)
    }
}
