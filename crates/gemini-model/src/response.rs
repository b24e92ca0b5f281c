use std::pin::Pin;
use std::task::{Context, Poll, ready};

use maitre_model::{
    CompletionEvent, CompletionResponse, ErrorKind, FinishReason,
};
use pin_project_lite::pin_project;

use crate::Error;
use crate::io::SseReader;
use crate::proto::{GenerateContentChunk, create_finish_reason};

struct PartialState {
    sse: SseReader,
    // A chunk can carry both a text part and a finish reason. The text
    // is emitted first and the finish reason is parked here until the
    // next poll.
    pending_finish_reason: Option<FinishReason>,
}

type PinnedFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;
type NextEvent = Result<(Option<CompletionEvent>, PartialState), Error>;

pin_project! {
    pub struct GeminiResponse {
        next_event_fut: Option<PinnedFuture<NextEvent>>,
    }
}

impl GeminiResponse {
    #[inline]
    pub fn from_sse(sse: SseReader) -> Self {
        let partial_state = PartialState {
            sse,
            pending_finish_reason: None,
        };
        let next_event_fut = async move { next_event(partial_state).await };
        Self {
            next_event_fut: Some(Box::pin(next_event_fut)),
        }
    }
}

impl CompletionResponse for GeminiResponse {
    type Error = crate::Error;

    fn poll_next_event(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Result<Option<CompletionEvent>, Self::Error>> {
        let this = self.project();
        let Some(next_event_fut) = this.next_event_fut else {
            // The stream has been exhausted.
            return Poll::Ready(Ok(None));
        };
        let (event, partial_state) =
            match ready!(next_event_fut.as_mut().poll(cx)) {
                Ok((Some(event), partial_state)) => (event, partial_state),
                Ok((None, _)) => {
                    *this.next_event_fut = None;
                    return Poll::Ready(Ok(None));
                }
                Err(err) => {
                    *this.next_event_fut = None;
                    return Poll::Ready(Err(err));
                }
            };

        // The stream may still have more data to pull, create a new future
        // for the next event.
        let next_event_fut = async move { next_event(partial_state).await };
        *this.next_event_fut = Some(Box::pin(next_event_fut));

        Poll::Ready(Ok(Some(event)))
    }
}

async fn next_event(
    mut partial_state: PartialState,
) -> Result<(Option<CompletionEvent>, PartialState), Error> {
    if let Some(reason) = partial_state.pending_finish_reason.take() {
        return Ok((Some(CompletionEvent::Finished(reason)), partial_state));
    }

    loop {
        let payload = match partial_state.sse.next_data().await {
            Ok(Some(payload)) => payload,
            Ok(None) => return Ok((None, partial_state)),
            Err(err) => {
                return Err(Error::new(format!("{err:?}"), ErrorKind::Other));
            }
        };
        trace!("got sse payload: {payload}");

        // A frame that doesn't decode to the expected chunk shape is
        // skipped, the stream itself stays healthy.
        let chunk =
            match serde_json::from_str::<GenerateContentChunk>(&payload) {
                Ok(chunk) => chunk,
                Err(err) => {
                    debug!("skipping undecodable chunk: {err}");
                    continue;
                }
            };

        let Some(candidate) = chunk.candidates.into_iter().next() else {
            continue;
        };
        let finish_reason = candidate
            .finish_reason
            .as_deref()
            .map(create_finish_reason);
        let text = candidate
            .content
            .and_then(|content| content.parts.into_iter().next())
            .and_then(|part| part.text);

        match (text, finish_reason) {
            (Some(text), Some(reason)) => {
                partial_state.pending_finish_reason = Some(reason);
                return Ok((
                    Some(CompletionEvent::TextDelta(text)),
                    partial_state,
                ));
            }
            (Some(text), None) => {
                return Ok((
                    Some(CompletionEvent::TextDelta(text)),
                    partial_state,
                ));
            }
            (None, Some(reason)) => {
                return Ok((
                    Some(CompletionEvent::Finished(reason)),
                    partial_state,
                ));
            }
            (None, None) => continue,
        }
    }
}
