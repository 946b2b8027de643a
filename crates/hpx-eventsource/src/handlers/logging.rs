//! Handler that records events with `tracing`.

use crate::{handler::EventHandler, types::Event};

/// Logs every event it receives at a fixed level.
///
/// Error deliveries are always logged at WARN, whatever the configured level.
#[derive(Clone, Debug)]
pub struct LoggingHandler {
    level: tracing::Level,
}

impl LoggingHandler {
    /// Create a logging handler with the specified log level.
    pub fn new(level: tracing::Level) -> Self {
        Self { level }
    }

    /// Create a logging handler at INFO level.
    pub fn info() -> Self {
        Self::new(tracing::Level::INFO)
    }

    /// Create a logging handler at DEBUG level.
    pub fn debug() -> Self {
        Self::new(tracing::Level::DEBUG)
    }
}

impl Default for LoggingHandler {
    fn default() -> Self {
        Self::info()
    }
}

impl EventHandler for LoggingHandler {
    fn handle(&self, event: &Event) {
        let id = event.id().unwrap_or("");
        if let Some(error) = &event.error {
            tracing::warn!(
                event_type = %event.event,
                state = %event.ready_state,
                kind = %error.kind(),
                error = %error,
                "Event source error"
            );
            return;
        }

        match self.level {
            tracing::Level::ERROR => {
                tracing::error!(event_type = %event.event, id, "Event received");
            }
            tracing::Level::WARN => {
                tracing::warn!(event_type = %event.event, id, "Event received");
            }
            tracing::Level::INFO => {
                tracing::info!(event_type = %event.event, id, "Event received");
            }
            tracing::Level::DEBUG => {
                tracing::debug!(
                    event_type = %event.event,
                    id,
                    data_len = event.data.len(),
                    "Event received"
                );
            }
            tracing::Level::TRACE => {
                tracing::trace!(
                    event_type = %event.event,
                    id,
                    data = %event.data,
                    retry = ?event.retry,
                    "Event received"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{error::EventSourceError, types::ConnectionState};

    #[test]
    fn test_logging_handler_does_not_panic() {
        let event = Event::open(None);
        for level in [
            tracing::Level::ERROR,
            tracing::Level::WARN,
            tracing::Level::INFO,
            tracing::Level::DEBUG,
            tracing::Level::TRACE,
        ] {
            LoggingHandler::new(level).handle(&event);
        }

        let error = Event::error(
            EventSourceError::ConnectionClosedByServer,
            None,
            ConnectionState::Connecting,
        );
        LoggingHandler::default().handle(&error);
    }
}
