use std::time::Duration;

use bytes_utils::Str;
use rand::Rng;

use crate::types::Event;

/// Reconnection state that outlives any single HTTP request.
///
/// Both values change only when a parsed event carries the matching field;
/// nothing clears them short of building a new client.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetryState {
    last_event_id: Option<Str>,
    retry_interval: Duration,
}

impl RetryState {
    pub fn new(retry_interval: Duration, last_event_id: Option<Str>) -> Self {
        Self {
            last_event_id: last_event_id.filter(|id| !id.is_empty()),
            retry_interval,
        }
    }

    /// Record the `id` and `retry` fields of a parsed event.
    pub fn note_event(&mut self, event: &Event) {
        if let Some(id) = event.id.as_ref().filter(|id| !id.is_empty()) {
            self.last_event_id = Some(id.clone());
        }
        if let Some(retry) = event.retry {
            self.retry_interval = retry;
        }
    }

    /// Value for the next `Last-Event-ID` header.
    pub fn last_event_id(&self) -> Option<&Str> {
        self.last_event_id.as_ref()
    }

    /// Delay before the next reconnect attempt.
    pub fn retry_interval(&self) -> Duration {
        self.retry_interval
    }

    /// The retry interval with `jitter` (0.0..=1.0) applied.
    ///
    /// A jitter of zero returns the interval unchanged.
    pub fn reconnect_delay(&self, jitter: f64) -> Duration {
        let base = self.retry_interval.as_secs_f64();
        if jitter <= 0.0 || base == 0.0 {
            return self.retry_interval;
        }

        let jitter = jitter.min(1.0);
        let randomized = rand::rng().random_range(0.0..=base);
        let blended = base * (1.0 - jitter) + randomized * jitter;
        Duration::from_secs_f64(blended)
    }
}
