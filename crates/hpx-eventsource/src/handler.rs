//! The handler abstraction invoked for every dispatched event.

use crate::types::Event;

/// Something that receives [`Event`]s.
///
/// Handlers run synchronously on the connection's task, in registration order.
/// A handler that blocks delays processing of later chunks on the same
/// connection, so long-running work should be handed off (see
/// [`ChannelHandler`](crate::handlers::ChannelHandler)).
///
/// Any `Fn(&Event) + Send + Sync + 'static` closure is a handler.
pub trait EventHandler: Send + Sync + 'static {
    /// Handle one event.
    fn handle(&self, event: &Event);
}

impl<F> EventHandler for F
where
    F: Fn(&Event) + Send + Sync + 'static,
{
    fn handle(&self, event: &Event) {
        self(event)
    }
}
