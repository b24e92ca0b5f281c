use std::pin::Pin;
use std::task::{self, Poll};

use serde::{Deserialize, Serialize};

use crate::provider::CompletionProviderError;

/// A streamed response from the completion backend.
pub trait CompletionResponse: Sized + Send + 'static {
    /// The error type that may be returned by the provider.
    type Error: CompletionProviderError;

    /// Attempts to pull out the next event from the response.
    ///
    /// # Return value
    ///
    /// There are several possible return values, each indicating a
    /// distinct response state:
    ///
    /// - `Poll::Pending` means that this response is still waiting for
    ///   the next event. Implementations will ensure that the current
    ///   task will be notified when the next event may be ready.
    /// - `Poll::Ready(Ok(Some(event)))` means the response has an event
    ///   to deliver, and may produce further events on subsequent
    ///   `poll_next_event` calls.
    /// - `Poll::Ready(Ok(None))` means the response has completed.
    /// - `Poll::Ready(Err(error))` means a transport-level error
    ///   occurred while processing the response.
    ///
    /// Calling this method after completion should always return `None`.
    fn poll_next_event(
        self: Pin<&mut Self>,
        cx: &mut task::Context<'_>,
    ) -> Poll<Result<Option<CompletionEvent>, Self::Error>>;
}

/// The reason why a completion has finished.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FinishReason {
    /// The backend has finished generating text.
    Stop,
    /// The backend hit its output token limit.
    MaxTokens,
    /// The output was cut short by a safety filter.
    Safety,
    /// Any other reason reported by the backend.
    Other,
}

/// The event from a completion response.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CompletionEvent {
    /// Received a text fragment.
    ///
    /// Fragments are deltas: consumers accumulate them in arrival order
    /// to reconstruct the full reply.
    TextDelta(String),
    /// The backend reported the end of generation.
    Finished(FinishReason),
}
