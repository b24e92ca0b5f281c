//! A local fake completion backend for testing purpose.

mod preset;

use std::collections::HashMap;
use std::error::Error as StdError;
use std::fmt::{self, Debug, Display, Formatter};
use std::future::ready;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll, ready};
use std::time::Duration;

use maitre_model::{
    CompletionEvent, CompletionProvider, CompletionProviderError,
    CompletionRequest, CompletionResponse, ErrorKind, FinishReason,
};
use tokio::time::{Sleep, sleep};

pub use preset::*;

/// Error returned by [`TestProvider`].
#[derive(Debug)]
pub struct Error {
    #[allow(dead_code)]
    message: &'static str,
    kind: ErrorKind,
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Debug::fmt(self, f)
    }
}

impl StdError for Error {}

impl CompletionProviderError for Error {
    #[inline]
    fn kind(&self) -> ErrorKind {
        self.kind
    }
}

/// The streamed response produced by [`TestProvider`].
#[derive(Debug)]
pub struct TestResponse {
    provider: TestProvider,
    request: CompletionRequest,
    event_idx: usize,
    sleep: Option<Pin<Box<Sleep>>>,
}

impl CompletionResponse for TestResponse {
    type Error = crate::Error;

    fn poll_next_event(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Result<Option<CompletionEvent>, Self::Error>> {
        let step_idx = self.request.messages.len();
        if step_idx >= self.provider.conversation_script.len() {
            return Poll::Ready(Err(Error {
                message: "no enough steps",
                kind: ErrorKind::RateLimitExceeded,
            }));
        }

        // SAFETY: This type does not require to be pinned.
        let this = unsafe { self.get_unchecked_mut() };

        let step = &this.provider.conversation_script[step_idx];
        let preset_events = match step {
            ConversationStep::UserInput => {
                return Poll::Ready(Err(Error {
                    message: "not an assistant response step",
                    kind: ErrorKind::Moderated,
                }));
            }
            ConversationStep::AssistantResponse(response) => &response.events,
        };

        if let Some(sleep) = &mut this.sleep {
            let sleep = sleep.as_mut();
            ready!(sleep.poll(cx));
            this.sleep = None;

            if this.event_idx < preset_events.len() {
                let event = match &preset_events[this.event_idx] {
                    PresetEvent::TextDelta(text) => {
                        CompletionEvent::TextDelta(text.clone())
                    }
                };
                this.event_idx += 1;
                return Poll::Ready(Ok(Some(event)));
            } else if this.event_idx == preset_events.len() {
                this.event_idx += 1;
                return Poll::Ready(Ok(Some(CompletionEvent::Finished(
                    FinishReason::Stop,
                ))));
            } else {
                // In case this method is called after completion.
                return Poll::Ready(Ok(None));
            }
        }
        this.sleep = Some(Box::pin(sleep(
            this.provider.delay.unwrap_or(Duration::from_millis(1)),
        )));
        Pin::new(this).poll_next_event(cx)
    }
}

#[derive(Clone, Debug)]
enum ConversationStep {
    UserInput,
    AssistantResponse(PresetResponse),
}

/// A local fake completion backend for testing purpose.
///
/// Before sending requests, you need to setup the conversation script,
/// which is how the backend should respond to a request. The added
/// steps will be selected according to the history messages in your
/// request. If there are no enough steps in the script, an error will
/// be returned.
///
/// A response step with `failures` set rejects the request at send
/// time, which is how tests model an immediate transport failure.
///
/// # Note
///
/// This type is not optimized for production use, there are heavy
/// memory copies involved. You should only use it for testing.
#[derive(Clone, Default, Debug)]
pub struct TestProvider {
    conversation_script: Vec<ConversationStep>,
    delay: Option<Duration>,
    // Attempt counters per step, shared across clones so `failures`
    // counts attempts against the script, not against one handle.
    attempts: Arc<Mutex<HashMap<usize, u64>>>,
}

impl TestProvider {
    /// Appends an assistant response step.
    #[inline]
    pub fn add_assistant_response_step(&mut self, preset: PresetResponse) {
        self.conversation_script
            .push(ConversationStep::AssistantResponse(preset));
    }

    /// Appends a user input step.
    #[inline]
    pub fn add_user_input_step(&mut self) {
        self.conversation_script.push(ConversationStep::UserInput);
    }

    /// Sets the delay before each streamed event.
    #[inline]
    pub fn set_delay(&mut self, duration: Duration) {
        self.delay = Some(duration);
    }

    fn should_fail(&self, step_idx: usize) -> bool {
        let Some(ConversationStep::AssistantResponse(response)) =
            self.conversation_script.get(step_idx)
        else {
            return false;
        };
        let Some(failures) = response.failures else {
            return false;
        };
        if failures == 0 {
            return true;
        }
        let mut attempts = self.attempts.lock().unwrap();
        let attempt = attempts.entry(step_idx).or_insert(0);
        *attempt += 1;
        *attempt <= failures
    }
}

impl CompletionProvider for TestProvider {
    type Error = crate::Error;
    type Response = TestResponse;

    fn send_request(
        &self,
        req: &CompletionRequest,
    ) -> impl Future<Output = Result<Self::Response, Self::Error>> + Send + 'static
    {
        let result = if self.should_fail(req.messages.len()) {
            Err(Error {
                message: "preset transport failure",
                kind: ErrorKind::Other,
            })
        } else {
            Ok(TestResponse {
                provider: self.clone(),
                request: req.clone(),
                event_idx: 0,
                sleep: None,
            })
        };
        ready(result)
    }
}

#[cfg(test)]
mod tests {
    use std::future::poll_fn;
    use std::pin::pin;

    use maitre_model::ChatMessage;

    use super::*;

    async fn collect_response(resp: TestResponse) -> String {
        let mut resp = pin!(resp);
        let mut text = String::new();
        loop {
            let event = poll_fn(|cx| resp.as_mut().poll_next_event(cx))
                .await
                .unwrap()
                .unwrap();
            match event {
                CompletionEvent::Finished(_) => break,
                CompletionEvent::TextDelta(delta) => text.push_str(&delta),
            }
        }
        text
    }

    #[tokio::test]
    async fn test_send_request() {
        let mut provider = TestProvider::default();
        provider.add_user_input_step();
        provider.add_assistant_response_step(PresetResponse::with_events([
            PresetEvent::TextDelta("Hello, ".to_owned()),
            PresetEvent::TextDelta("world!".to_owned()),
        ]));
        provider.add_user_input_step();
        provider.add_assistant_response_step(PresetResponse::with_events([
            PresetEvent::TextDelta("Bye!".to_owned()),
        ]));

        let mut req = CompletionRequest {
            messages: vec![ChatMessage::User("Hi".to_owned())],
        };
        let resp = provider.send_request(&req).await.unwrap();
        assert_eq!(collect_response(resp).await, "Hello, world!");

        req.messages
            .push(ChatMessage::Assistant("Hello, world!".to_owned()));
        req.messages.push(ChatMessage::User("Bye".to_owned()));
        let resp = provider.send_request(&req).await.unwrap();
        assert_eq!(collect_response(resp).await, "Bye!");
    }

    #[tokio::test]
    async fn test_missing_step_is_an_error() {
        let provider = TestProvider::default();
        let req = CompletionRequest {
            messages: vec![ChatMessage::User("Hi".to_owned())],
        };
        let mut resp = pin!(provider.send_request(&req).await.unwrap());
        let err = poll_fn(|cx| resp.as_mut().poll_next_event(cx))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::RateLimitExceeded);
    }

    #[tokio::test]
    async fn test_failures_reject_at_send_time() {
        let mut provider = TestProvider::default();
        provider.add_user_input_step();
        provider.add_assistant_response_step(
            PresetResponse::with_events([PresetEvent::TextDelta(
                "Recovered.".to_owned(),
            )])
            .with_failures(1),
        );

        let req = CompletionRequest {
            messages: vec![ChatMessage::User("Hi".to_owned())],
        };
        let err = provider.send_request(&req).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Other);

        // The second attempt goes through.
        let resp = provider.send_request(&req).await.unwrap();
        assert_eq!(collect_response(resp).await, "Recovered.");
    }

    #[tokio::test]
    async fn test_always_failing_step() {
        let mut provider = TestProvider::default();
        provider.add_user_input_step();
        provider.add_assistant_response_step(
            PresetResponse::with_events([]).with_failures(0),
        );

        let req = CompletionRequest {
            messages: vec![ChatMessage::User("Hi".to_owned())],
        };
        for _ in 0..3 {
            assert!(provider.send_request(&req).await.is_err());
        }
    }
}
