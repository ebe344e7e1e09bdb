use std::convert::Infallible;
use std::time::Duration;

use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::Stream;
use serde::Serialize;
use tokio_stream::StreamExt;

use super::StreamGuard;

/// `data: <json>` frames with no event name; clients switch on `type`.
pub(crate) fn sse_event<T: Serialize>(event: &T) -> Event {
    let data = serde_json::to_string(event).unwrap_or_default();
    Event::default().data(data)
}

/// Serve `events` as SSE, holding `guard` for as long as the client is
/// connected.
pub(crate) fn event_stream<S, T>(
    guard: StreamGuard,
    events: S,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>>
where
    S: Stream<Item = T> + Send + 'static,
    T: Serialize + Send + 'static,
{
    let stream = async_stream::stream! {
        let _guard = guard;
        let mut events = Box::pin(events);
        while let Some(event) = events.next().await {
            yield Ok(sse_event(&event));
        }
    };
    Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(15)))
}
