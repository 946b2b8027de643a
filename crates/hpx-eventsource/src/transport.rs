//! The HTTP collaborator that opens streaming responses.
//!
//! The connection driver only needs one operation: issue a GET and hand back
//! the status, headers and a stream of body chunks. [`Transport`] captures that
//! seam so the driver can run over `reqwest` in production and over scripted
//! responses in tests.

use std::{fmt, pin::Pin, time::Duration};

use async_trait::async_trait;
use bytes::Bytes;
use futures_core::Stream;
use http::{HeaderMap, StatusCode, header};

use crate::error::{EventSourceError, EventSourceResult};

/// Media type requested from and expected of the server.
pub const EVENT_STREAM_MIME: &str = "text/event-stream";

/// Name of the resumption header.
pub const LAST_EVENT_ID_HEADER: &str = "last-event-id";

/// Boxed stream of body chunks.
pub type BodyStream = Pin<Box<dyn Stream<Item = EventSourceResult<Bytes>> + Send>>;

/// A streaming GET request.
#[derive(Clone, Debug)]
pub struct StreamRequest {
    /// Target URL.
    pub url: String,
    /// Request headers, including `Accept` and `Last-Event-ID`.
    pub headers: HeaderMap,
    /// Timeout the caller applies to the exchange.
    pub timeout: Duration,
}

impl StreamRequest {
    /// The `Last-Event-ID` header value, if present.
    pub fn last_event_id(&self) -> Option<&str> {
        self.headers
            .get(LAST_EVENT_ID_HEADER)
            .and_then(|v| v.to_str().ok())
    }
}

/// Response head plus the body as a chunk stream.
pub struct StreamResponse {
    /// HTTP status.
    pub status: StatusCode,
    /// Response headers.
    pub headers: HeaderMap,
    /// Body chunks in arrival order. End of stream means the server closed.
    pub body: BodyStream,
}

impl StreamResponse {
    /// Create a response from its parts.
    pub fn new<S>(status: StatusCode, headers: HeaderMap, body: S) -> Self
    where
        S: Stream<Item = EventSourceResult<Bytes>> + Send + 'static,
    {
        Self {
            status,
            headers,
            body: Box::pin(body),
        }
    }

    /// The raw `Content-Type` header, if present and readable.
    pub fn content_type(&self) -> Option<&str> {
        self.headers
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
    }

    /// Check that this response can carry an event stream.
    ///
    /// Any 2xx status with a `text/event-stream` media type (parameters such
    /// as `charset` allowed) is accepted.
    ///
    /// # Errors
    ///
    /// Returns [`EventSourceError::WrongHttpResponse`] otherwise.
    pub fn validate(&self) -> EventSourceResult<()> {
        let content_type = self.content_type();
        let is_event_stream = content_type
            .and_then(|ct| ct.split(';').next())
            .is_some_and(|essence| essence.trim().eq_ignore_ascii_case(EVENT_STREAM_MIME));

        if self.status.is_success() && is_event_stream {
            Ok(())
        } else {
            Err(EventSourceError::wrong_http_response(
                self.status,
                content_type,
            ))
        }
    }
}

impl fmt::Debug for StreamResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamResponse")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .finish_non_exhaustive()
    }
}

/// Opens streaming HTTP responses.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Issue `request` and return once the response head is available.
    ///
    /// Status and content type are validated by the caller.
    async fn open_stream(&self, request: StreamRequest) -> EventSourceResult<StreamResponse>;
}

#[cfg(feature = "reqwest")]
pub use self::reqwest_transport::ReqwestTransport;

#[cfg(feature = "reqwest")]
mod reqwest_transport {
    use async_trait::async_trait;
    use futures_util::TryStreamExt;

    use super::{StreamRequest, StreamResponse, Transport};
    use crate::error::{EventSourceError, EventSourceResult};

    /// [`Transport`] backed by a `reqwest::Client`.
    #[derive(Clone, Debug, Default)]
    pub struct ReqwestTransport {
        client: reqwest::Client,
    }

    impl ReqwestTransport {
        /// Create a transport with a fresh client.
        ///
        /// # Errors
        ///
        /// Returns an error if the TLS backend cannot be initialised.
        pub fn new() -> EventSourceResult<Self> {
            let client = reqwest::Client::builder().build().map_err(|e| {
                EventSourceError::config(format!("Failed to build HTTP client: {e}"))
            })?;
            Ok(Self { client })
        }

        /// Reuse an existing client (proxies, TLS roots, redirect policy, ...).
        pub fn with_client(client: reqwest::Client) -> Self {
            Self { client }
        }
    }

    #[async_trait]
    impl Transport for ReqwestTransport {
        async fn open_stream(&self, request: StreamRequest) -> EventSourceResult<StreamResponse> {
            let resp = self
                .client
                .get(&request.url)
                .headers(request.headers)
                .send()
                .await?;

            let status = resp.status();
            let headers = resp.headers().clone();
            let body = resp.bytes_stream().map_err(EventSourceError::from);
            Ok(StreamResponse::new(status, headers, body))
        }
    }
}
