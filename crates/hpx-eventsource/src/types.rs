//! Core type definitions: events and connection states.

use std::{fmt, sync::Arc, time::Duration};

use bytes_utils::Str;

use crate::error::EventSourceError;

/// Name given to events that carry no `event` field.
pub const MESSAGE_EVENT: &str = "message";
/// Name of the synthetic event fired when a connection opens.
pub const OPEN_EVENT: &str = "open";
/// Name of the synthetic event fired on every connection error.
pub const ERROR_EVENT: &str = "error";

/// Connection state machine states.
///
/// Transitions are `Connecting -> Open -> {Connecting | Closed}`; a failed
/// attempt may also go `Connecting -> Connecting`. `Closed` is terminal.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    /// Waiting for a response, or for the reconnect delay to elapse.
    #[default]
    Connecting,
    /// Receiving events.
    Open,
    /// Explicitly closed; will not reconnect.
    Closed,
}

impl ConnectionState {
    /// Returns `true` while events are being streamed.
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Open)
    }

    /// Returns `true` once the connection has been closed for good.
    pub fn is_closed(&self) -> bool {
        matches!(self, Self::Closed)
    }

    /// Whether the machine may move from `self` to `next`.
    pub fn can_transition_to(&self, next: Self) -> bool {
        match (self, next) {
            (Self::Closed, _) => false,
            (Self::Connecting, _) => true,
            (Self::Open, Self::Connecting | Self::Closed) => true,
            (Self::Open, Self::Open) => false,
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connecting => write!(f, "Connecting"),
            Self::Open => write!(f, "Open"),
            Self::Closed => write!(f, "Closed"),
        }
    }
}

/// A single event delivered to handlers.
///
/// Parsed events carry `event`, `data`, `id` and `retry` from the stream.
/// Synthetic `open` and `error` events are built by the connection and have an
/// empty payload; error events carry the cause in [`Event::error`].
#[derive(Clone, Debug)]
pub struct Event {
    /// The last event ID seen on the stream, if any.
    ///
    /// Sticky: an event without an `id` field carries the previous one.
    pub id: Option<Str>,
    /// Event name, `"message"` when the block had no `event` field.
    pub event: Str,
    /// All `data` values of the block, joined with `\n`.
    pub data: Str,
    /// Reconnection delay advertised by this block.
    pub retry: Option<Duration>,
    /// Connection state at the time of delivery.
    pub ready_state: ConnectionState,
    /// Cause of a synthetic error delivery.
    pub error: Option<Arc<EventSourceError>>,
}

impl Event {
    /// Build a synthetic `open` event.
    pub fn open(id: Option<Str>) -> Self {
        Self {
            id,
            event: Str::from_static(OPEN_EVENT),
            data: Str::from_static(""),
            retry: None,
            ready_state: ConnectionState::Open,
            error: None,
        }
    }

    /// Build a synthetic `error` event carrying `error`.
    pub fn error(error: EventSourceError, id: Option<Str>, ready_state: ConnectionState) -> Self {
        Self {
            id,
            event: Str::from_static(ERROR_EVENT),
            data: Str::from_static(""),
            retry: None,
            ready_state,
            error: Some(Arc::new(error)),
        }
    }

    /// Convenience accessor for the event name.
    pub fn event_type(&self) -> &str {
        &self.event
    }

    /// Convenience accessor for the data payload.
    pub fn data(&self) -> &str {
        &self.data
    }

    /// Convenience accessor for the event ID.
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    /// Returns `true` for synthetic error deliveries.
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    #[must_use]
    pub(crate) fn with_ready_state(mut self, state: ConnectionState) -> Self {
        self.ready_state = state;
        self
    }
}
