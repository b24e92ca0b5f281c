use std::error::Error;
use std::fmt::{self, Display};
use std::future::poll_fn;
use std::pin::{Pin, pin};
use std::sync::Arc;
use std::time::Duration;

use maitre_model::{
    CompletionEvent, CompletionProvider, CompletionProviderError,
    CompletionRequest, CompletionResponse,
};
use tokio::time::timeout;
use tracing::Instrument;

/// The reason a turn's primary channel failed.
#[derive(Debug)]
pub enum TurnError {
    /// The provider reported a transport-level failure.
    Provider(Box<dyn CompletionProviderError>),
    /// The stream produced no event within the configured timeout.
    TimedOut,
}

impl Display for TurnError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TurnError::Provider(err) => write!(f, "{err}"),
            TurnError::TimedOut => write!(f, "completion stream timed out"),
        }
    }
}

impl Error for TurnError {}

type SendRequestResult = Result<String, TurnError>;
type BoxedSendRequestFuture =
    Pin<Box<dyn Future<Output = SendRequestResult> + Send>>;
#[rustfmt::skip]
type HandlerFn = Arc<
    dyn Fn(CompletionRequest, Duration, Box<dyn Fn(String) + Send + 'static>)
        -> BoxedSendRequestFuture + Send + Sync
>;

/// A wrapper around a completion provider that maintains an execution
/// environment for the provider and provides a type-erased interface
/// for the other modules.
#[derive(Clone)]
pub struct CompletionClient {
    handler_fn: HandlerFn,
}

impl CompletionClient {
    #[inline]
    pub fn new<P: CompletionProvider + 'static>(provider: P) -> Self {
        // We have to erase the type `P`, since `CompletionClient` doesn't
        // have a generic parameter and we don't want it either.
        let handler_fn: HandlerFn =
            Arc::new(move |req, stream_timeout, on_text| {
                let fut = provider.send_request(&req);
                Box::pin(
                    async move {
                        trace!("got a request: {:?}", req);
                        let resp_or_err = fut.await;
                        handle_response::<P>(resp_or_err, stream_timeout, on_text)
                            .await
                    }
                    .instrument(trace_span!("completion req")),
                )
            });
        Self { handler_fn }
    }

    /// Sends a request and streams the reply.
    ///
    /// `on_text` is invoked with the FULL accumulated text after every
    /// received fragment, so renderers replace their view with the
    /// latest text instead of appending deltas. Every wait for the next
    /// stream event is bounded by `stream_timeout`.
    ///
    /// Resolves to the final accumulated text, or a [`TurnError`] on
    /// transport failure or timeout.
    ///
    /// # Cancel safety
    ///
    /// This method is cancel safe. The response stops streaming further
    /// events when this operation is cancelled.
    #[inline]
    pub async fn send_request(
        &self,
        req: CompletionRequest,
        stream_timeout: Duration,
        on_text: impl Fn(String) + Send + 'static,
    ) -> SendRequestResult {
        (self.handler_fn)(req, stream_timeout, Box::new(on_text)).await
    }
}

async fn handle_response<P: CompletionProvider + 'static>(
    resp_or_err: Result<P::Response, P::Error>,
    stream_timeout: Duration,
    on_text: Box<dyn Fn(String) + Send + 'static>,
) -> SendRequestResult {
    let resp = match resp_or_err {
        Ok(resp) => resp,
        Err(err) => {
            error!("got an error: {err:?}");
            return Err(TurnError::Provider(Box::new(err)));
        }
    };

    let mut accumulated = String::new();

    trace!("start receiving events");

    let mut pinned_resp = pin!(resp);
    loop {
        let next_event =
            poll_fn(|cx| pinned_resp.as_mut().poll_next_event(cx));
        let Ok(event_or_err) = timeout(stream_timeout, next_event).await
        else {
            warn!("no stream event within {stream_timeout:?}");
            return Err(TurnError::TimedOut);
        };
        let event = match event_or_err {
            Ok(event) => event,
            Err(err) => {
                error!("got an error: {err:?}");
                return Err(TurnError::Provider(Box::new(err)));
            }
        };

        let Some(event) = event else {
            break;
        };
        trace!("got an event: {event:?}");

        match event {
            CompletionEvent::TextDelta(delta) => {
                accumulated.push_str(&delta);
                on_text(accumulated.clone());
            }
            CompletionEvent::Finished(reason) => {
                trace!("finished generating: {reason:?}");
                break;
            }
        }
    }

    trace!("finished a request");

    Ok(accumulated)
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use maitre_model::ChatMessage;
    use maitre_test_model::{PresetEvent, PresetResponse, TestProvider};

    use super::*;

    const LONG_TIMEOUT: Duration = Duration::from_secs(5);

    fn scripted_provider() -> TestProvider {
        let mut provider = TestProvider::default();
        provider.add_user_input_step();
        provider.add_assistant_response_step(PresetResponse::with_events([
            PresetEvent::TextDelta("How ".to_owned()),
            PresetEvent::TextDelta("are ".to_owned()),
            PresetEvent::TextDelta("you?".to_owned()),
        ]));
        provider
    }

    #[tokio::test]
    async fn test_send_request() {
        let client = CompletionClient::new(scripted_provider());

        let seen = Arc::new(Mutex::new(Vec::new()));
        let reply = client
            .send_request(
                CompletionRequest {
                    messages: vec![ChatMessage::User("Hi".to_owned())],
                },
                LONG_TIMEOUT,
                {
                    let seen = Arc::clone(&seen);
                    move |text| seen.lock().unwrap().push(text)
                },
            )
            .await
            .unwrap();

        assert_eq!(reply, "How are you?");
        // Each fragment reports the full text so far, not the delta.
        assert_eq!(
            *seen.lock().unwrap(),
            vec!["How ", "How are ", "How are you?"]
        );
    }

    #[tokio::test]
    async fn test_error_handling() {
        let client = CompletionClient::new(TestProvider::default());
        let result = client
            .send_request(
                CompletionRequest {
                    messages: vec![ChatMessage::User("Hi".to_owned())],
                },
                LONG_TIMEOUT,
                |_| {},
            )
            .await;
        assert!(matches!(result, Err(TurnError::Provider(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_stream_times_out() {
        let mut provider = scripted_provider();
        provider.set_delay(Duration::from_secs(120));
        let client = CompletionClient::new(provider);

        let result = client
            .send_request(
                CompletionRequest {
                    messages: vec![ChatMessage::User("Hi".to_owned())],
                },
                Duration::from_secs(30),
                |_| {},
            )
            .await;
        assert!(matches!(result, Err(TurnError::TimedOut)));
    }
}
