//! Error types for the event source client.

use std::{fmt, time::Duration};

use http::StatusCode;
use thiserror::Error;

/// The result type used throughout the crate.
pub type EventSourceResult<T> = Result<T, EventSourceError>;

/// Distinguished error kinds exposed to `error` handlers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The server answered with a non-2xx status or a non event-stream body.
    WrongHttpResponse,
    /// The server ended the response body.
    ConnectionClosedByServer,
    /// Any other failure of the underlying transport.
    Transport,
    /// Misuse of the client API (bad configuration, double open, ...).
    Usage,
}

impl ErrorKind {
    /// Stable numeric code for the kind.
    pub fn code(&self) -> u16 {
        match self {
            Self::WrongHttpResponse => 512,
            Self::ConnectionClosedByServer => 513,
            Self::Transport => 514,
            Self::Usage => 515,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WrongHttpResponse => write!(f, "WrongHTTPResponse"),
            Self::ConnectionClosedByServer => write!(f, "ConnectionClosedByServer"),
            Self::Transport => write!(f, "Transport"),
            Self::Usage => write!(f, "Usage"),
        }
    }
}

/// Every error the client can produce.
#[derive(Error, Debug)]
pub enum EventSourceError {
    /// Non-2xx status or a content type other than `text/event-stream`.
    #[error("Unexpected HTTP response: status={status}, content-type={content_type:?}")]
    WrongHttpResponse {
        status: StatusCode,
        content_type: Option<String>,
    },

    /// The server cleanly ended the stream.
    #[error("Connection closed by server")]
    ConnectionClosedByServer,

    /// HTTP client errors (wraps reqwest::Error)
    #[cfg(feature = "reqwest")]
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Transport failures reported by a custom [`Transport`](crate::transport::Transport).
    #[error("Transport error: {message}")]
    Transport { message: String },

    /// No response or no body chunk within the configured timeout.
    #[error("Operation timed out after {duration:?}")]
    Timeout { duration: Duration },

    /// Configuration errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// `open()` was called more than once.
    #[error("Event source was already opened")]
    AlreadyOpened,

    /// `open()` was called after `close()`.
    #[error("Event source is closed")]
    Closed,

    /// `open()` was called outside a tokio runtime.
    #[error("No tokio runtime available to drive the connection")]
    NoRuntime,
}

impl EventSourceError {
    /// Create an unexpected-response error.
    pub fn wrong_http_response(status: StatusCode, content_type: Option<&str>) -> Self {
        Self::WrongHttpResponse {
            status,
            content_type: content_type.map(str::to_owned),
        }
    }

    /// Create a transport error.
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    /// Create a timeout error.
    pub fn timeout(duration: Duration) -> Self {
        Self::Timeout { duration }
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// The distinguished kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::WrongHttpResponse { .. } => ErrorKind::WrongHttpResponse,
            Self::ConnectionClosedByServer => ErrorKind::ConnectionClosedByServer,
            #[cfg(feature = "reqwest")]
            Self::Http(_) => ErrorKind::Transport,
            Self::Transport { .. } | Self::Timeout { .. } => ErrorKind::Transport,
            Self::Config { .. } | Self::AlreadyOpened | Self::Closed | Self::NoRuntime => {
                ErrorKind::Usage
            }
        }
    }
}
