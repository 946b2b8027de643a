//! Event source configuration.

use std::time::Duration;

/// Configuration for an [`EventSource`](crate::EventSource).
///
/// Builder-style: start from [`EventSourceConfig::new`] and chain setters.
#[derive(Clone, Debug)]
pub struct EventSourceConfig {
    /// Event stream URL.
    pub url: String,
    /// Additional HTTP headers to include with every request.
    pub headers: http::HeaderMap,
    /// Time allowed for the response headers, and between two body chunks.
    pub timeout: Duration,
    /// Reconnect delay until the server advertises one with `retry:`.
    pub retry_interval: Duration,
    /// Event ID to resume from on the first request.
    pub last_event_id: Option<String>,
    /// Random jitter factor (0.0–1.0) for reconnection delays.
    pub reconnect_jitter: f64,
}

impl Default for EventSourceConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            headers: http::HeaderMap::new(),
            timeout: Duration::from_secs(5 * 60),
            retry_interval: Duration::from_millis(3000),
            last_event_id: None,
            reconnect_jitter: 0.0,
        }
    }
}

impl EventSourceConfig {
    /// Create a new configuration for the given URL.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    /// Set additional HTTP headers.
    #[must_use]
    pub fn headers(mut self, headers: http::HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    /// Set the request timeout.
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the initial reconnect delay.
    #[must_use]
    pub fn retry_interval(mut self, interval: Duration) -> Self {
        self.retry_interval = interval;
        self
    }

    /// Resume from a known event ID.
    #[must_use]
    pub fn last_event_id(mut self, id: impl Into<String>) -> Self {
        self.last_event_id = Some(id.into());
        self
    }

    /// Set the reconnection jitter factor.
    #[must_use]
    pub fn reconnect_jitter(mut self, jitter: f64) -> Self {
        self.reconnect_jitter = jitter;
        self
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error message string if any field has an invalid value.
    pub fn validate(&self) -> Result<(), String> {
        if self.url.is_empty() {
            return Err("URL cannot be empty".to_string());
        }
        let parsed = url::Url::parse(&self.url).map_err(|e| format!("Invalid URL: {e}"))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(format!("Unsupported URL scheme: {}", parsed.scheme()));
        }
        if self.timeout.is_zero() {
            return Err("Timeout must be > 0".to_string());
        }
        if !(0.0..=1.0).contains(&self.reconnect_jitter) {
            return Err("Jitter must be between 0.0 and 1.0".to_string());
        }
        if let Some(id) = &self.last_event_id
            && http::HeaderValue::from_str(id).is_err()
        {
            return Err("Last event ID is not a valid header value".to_string());
        }
        Ok(())
    }
}
