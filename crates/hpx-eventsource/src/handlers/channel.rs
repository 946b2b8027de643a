//! Bridge from synchronous handler callbacks to an async stream.

use std::{
    pin::Pin,
    task::{Context, Poll},
};

use futures_core::Stream;
use tokio::sync::mpsc;
use tracing::debug;

use crate::{handler::EventHandler, types::Event};

/// Create a connected [`ChannelHandler`] / [`EventReceiver`] pair.
///
/// Register the handler under as many names as needed (clone it); every event
/// it receives shows up on the receiver in delivery order. The channel is
/// unbounded so the connection task never waits on a slow consumer.
///
/// ```no_run
/// use futures_util::StreamExt;
/// use hpx_eventsource::{EventSource, handlers};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let source = EventSource::new("https://example.com/stream")?;
/// let (handler, mut events) = handlers::channel();
/// source.on_message(handler.clone());
/// source.on_error(handler);
/// source.open()?;
///
/// while let Some(event) = events.next().await {
///     println!("{}: {}", event.event_type(), event.data());
/// }
/// # Ok(())
/// # }
/// ```
pub fn channel() -> (ChannelHandler, EventReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (ChannelHandler { tx }, EventReceiver { rx })
}

/// Handler half of [`channel`].
#[derive(Clone, Debug)]
pub struct ChannelHandler {
    tx: mpsc::UnboundedSender<Event>,
}

impl ChannelHandler {
    /// Returns `true` once the receiver has been dropped.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

impl EventHandler for ChannelHandler {
    fn handle(&self, event: &Event) {
        if self.tx.send(event.clone()).is_err() {
            debug!(event_type = %event.event, "Event receiver dropped, discarding event");
        }
    }
}

/// Stream half of [`channel`].
///
/// Ends once every [`ChannelHandler`] clone is gone, which happens when the
/// owning [`EventSource`](crate::EventSource) is dropped.
#[derive(Debug)]
pub struct EventReceiver {
    rx: mpsc::UnboundedReceiver<Event>,
}

impl EventReceiver {
    /// Receive the next event.
    pub async fn next_event(&mut self) -> Option<Event> {
        self.rx.recv().await
    }

    /// Receive an already queued event without waiting.
    pub fn try_next_event(&mut self) -> Option<Event> {
        self.rx.try_recv().ok()
    }
}

impl Stream for EventReceiver {
    type Item = Event;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().rx.poll_recv(cx)
    }
}

#[cfg(test)]
mod tests {
    use bytes_utils::Str;
    use futures_util::StreamExt;

    use super::*;
    use crate::types::ConnectionState;

    fn message(data: &'static str) -> Event {
        Event {
            id: None,
            event: Str::from_static("message"),
            data: Str::from_static(data),
            retry: None,
            ready_state: ConnectionState::Open,
            error: None,
        }
    }

    #[tokio::test]
    async fn test_events_arrive_in_order() {
        let (handler, mut rx) = channel();
        handler.handle(&message("a"));
        handler.handle(&message("b"));
        drop(handler);

        let data: Vec<String> = rx.by_ref().map(|e| e.data().to_string()).collect().await;
        assert_eq!(data, vec!["a", "b"]);
    }

    #[test]
    fn test_try_next_event() {
        let (handler, mut rx) = channel();
        assert!(rx.try_next_event().is_none());
        handler.handle(&message("x"));
        assert_eq!(rx.try_next_event().map(|e| e.data().to_string()).as_deref(), Some("x"));
    }

    #[test]
    fn test_dropped_receiver_is_tolerated() {
        let (handler, rx) = channel();
        drop(rx);
        assert!(handler.is_closed());
        handler.handle(&message("ignored"));
    }
}
