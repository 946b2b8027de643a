//! Connection manager: the public [`EventSource`] handle and its driver task.
//!
//! ```text
//! EventSource::open()
//!   └─ spawns ──► event_source_driver
//!                   │  connect ─► validate ─► Open ─► feed chunks ─► parse ─► dispatch
//!                   │     ▲                                   │
//!                   │     └──── sleep(retry interval) ◄── error event
//!                   │
//!                   └─ Command::Close (from close()/drop) stops it at any await point
//! ```

use std::{
    fmt,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use bytes_utils::Str;
use futures_util::StreamExt;
use http::{HeaderValue, header};
use parking_lot::Mutex;
use tokio::{sync::mpsc, time::timeout};
use tracing::{debug, error, info, warn};

use crate::{
    config::EventSourceConfig,
    dispatch::HandlerRegistry,
    error::{EventSourceError, EventSourceResult},
    handler::EventHandler,
    parse::EventParser,
    retry::RetryState,
    transport::{
        BodyStream, EVENT_STREAM_MIME, LAST_EVENT_ID_HEADER, StreamRequest, StreamResponse,
        Transport,
    },
    types::{ConnectionState, Event},
};

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

/// Control commands sent from [`EventSource`] to the driver task.
#[derive(Debug)]
pub enum Command {
    /// Stop for good.
    Close,
    /// Drop the current connection and go through the reconnect path.
    Reconnect {
        /// Human-readable reason for the reconnection request.
        reason: String,
    },
}

// ---------------------------------------------------------------------------
// Shared state
// ---------------------------------------------------------------------------

/// State owned by the connection and read by both the handle and the driver.
struct Shared {
    config: EventSourceConfig,
    transport: Arc<dyn Transport>,
    handlers: HandlerRegistry,
    state: Mutex<ConnectionState>,
    retry: Mutex<RetryState>,
}

impl Shared {
    fn state(&self) -> ConnectionState {
        *self.state.lock()
    }

    /// Move to `next` unless the machine forbids it. `Closed` always wins.
    fn transition(&self, next: ConnectionState) -> bool {
        let mut state = self.state.lock();
        if !state.can_transition_to(next) {
            return false;
        }
        debug!(from = %*state, to = %next, "Event source state change");
        *state = next;
        true
    }

    /// Dispatch `event` unless the connection has been closed.
    fn deliver(&self, event: &Event) -> bool {
        if self.state().is_closed() {
            return false;
        }
        self.handlers.dispatch(event);
        true
    }

    fn last_event_id(&self) -> Option<Str> {
        self.retry.lock().last_event_id().cloned()
    }

    fn build_request(&self) -> StreamRequest {
        let mut headers = self.config.headers.clone();
        headers.insert(header::ACCEPT, HeaderValue::from_static(EVENT_STREAM_MIME));
        headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));

        if let Some(id) = self.last_event_id()
            && let Ok(value) = HeaderValue::from_str(&id)
        {
            headers.insert(LAST_EVENT_ID_HEADER, value);
        }

        StreamRequest {
            url: self.config.url.clone(),
            headers,
            timeout: self.config.timeout,
        }
    }
}

// ---------------------------------------------------------------------------
// Public API: EventSource
// ---------------------------------------------------------------------------

/// Client for a Server-Sent Events endpoint.
///
/// Register handlers (before or after [`open`](Self::open)), then call `open`
/// from within a tokio runtime. A background task connects, parses the body,
/// dispatches events, and reconnects after every failure using the most
/// recent `retry:` interval and `Last-Event-ID`, until [`close`](Self::close)
/// is called or the `EventSource` is dropped.
///
/// ```no_run
/// use hpx_eventsource::{Event, EventSource};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let source = EventSource::new("https://example.com/stream")?;
/// source.on_open(|_: &Event| println!("connected"));
/// source.on_message(|e: &Event| println!("message: {}", e.data()));
/// source.add_event_listener("price", |e: &Event| println!("price: {}", e.data()));
/// source.on_error(|e: &Event| eprintln!("error: {:?}", e.error));
/// source.open()?;
/// # Ok(())
/// # }
/// ```
pub struct EventSource {
    shared: Arc<Shared>,
    opened: AtomicBool,
    cmd_tx: mpsc::UnboundedSender<Command>,
    cmd_rx: Mutex<Option<mpsc::UnboundedReceiver<Command>>>,
}

impl EventSource {
    /// Create an event source for `url` with default settings.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid or the HTTP client cannot be built.
    #[cfg(feature = "reqwest")]
    pub fn new(url: impl Into<String>) -> EventSourceResult<Self> {
        Self::with_config(EventSourceConfig::new(url))
    }

    /// Create an event source from a full configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if validation fails or the HTTP client cannot be built.
    #[cfg(feature = "reqwest")]
    pub fn with_config(config: EventSourceConfig) -> EventSourceResult<Self> {
        let transport = crate::transport::ReqwestTransport::new()?;
        Self::with_transport(config, transport)
    }

    /// Create an event source that opens its streams through `transport`.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration validation fails.
    pub fn with_transport<T: Transport>(
        config: EventSourceConfig,
        transport: T,
    ) -> EventSourceResult<Self> {
        config.validate().map_err(EventSourceError::config)?;

        let retry = RetryState::new(
            config.retry_interval,
            config.last_event_id.clone().map(Str::from),
        );
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();

        let shared = Arc::new(Shared {
            config,
            transport: Arc::new(transport),
            handlers: HandlerRegistry::new(),
            state: Mutex::new(ConnectionState::Connecting),
            retry: Mutex::new(retry),
        });

        Ok(Self {
            shared,
            opened: AtomicBool::new(false),
            cmd_tx,
            cmd_rx: Mutex::new(Some(cmd_rx)),
        })
    }

    /// Start connecting.
    ///
    /// Must be called inside a tokio runtime, and only once.
    ///
    /// # Errors
    ///
    /// [`EventSourceError::NoRuntime`] outside a runtime,
    /// [`EventSourceError::AlreadyOpened`] on a second call, and
    /// [`EventSourceError::Closed`] after [`close`](Self::close).
    pub fn open(&self) -> EventSourceResult<()> {
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| EventSourceError::NoRuntime)?;

        if self.shared.state().is_closed() {
            return Err(EventSourceError::Closed);
        }
        if self.opened.swap(true, Ordering::SeqCst) {
            return Err(EventSourceError::AlreadyOpened);
        }
        let cmd_rx = self
            .cmd_rx
            .lock()
            .take()
            .ok_or(EventSourceError::AlreadyOpened)?;

        runtime.spawn(event_source_driver(Arc::clone(&self.shared), cmd_rx));
        Ok(())
    }

    /// Close the connection permanently.
    ///
    /// Cancels the in-flight request and any pending reconnect. No handler
    /// starts after this returns. Safe to call from any thread, from inside a
    /// handler, and more than once.
    pub fn close(&self) {
        let previous = std::mem::replace(&mut *self.shared.state.lock(), ConnectionState::Closed);
        if previous.is_closed() {
            return;
        }
        info!(url = %self.shared.config.url, "Event source closing (requested)");
        // The driver may already be gone; the state flag alone is enough then.
        let _ = self.cmd_tx.send(Command::Close);
    }

    /// Drop the current connection and reconnect after the retry interval.
    ///
    /// Fires the `error` handlers like any other dropped connection. Skips the
    /// remaining delay if a reconnect is already pending. Ignored once closed.
    pub fn reconnect(&self, reason: &str) {
        if self.shared.state().is_closed() {
            return;
        }
        let _ = self.cmd_tx.send(Command::Reconnect {
            reason: reason.to_string(),
        });
    }

    /// Register a handler for unnamed (`message`) events.
    pub fn on_message<H: EventHandler>(&self, handler: H) {
        self.shared.handlers.on_message(handler);
    }

    /// Register a handler for the `open` event.
    pub fn on_open<H: EventHandler>(&self, handler: H) {
        self.shared.handlers.on_open(handler);
    }

    /// Register a handler for the `error` event.
    pub fn on_error<H: EventHandler>(&self, handler: H) {
        self.shared.handlers.on_error(handler);
    }

    /// Register a handler for events named `name`.
    pub fn add_event_listener<H: EventHandler>(&self, name: impl Into<String>, handler: H) {
        self.shared.handlers.add_event_listener(name, handler);
    }

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        self.shared.state()
    }

    /// The ID that the next request will send as `Last-Event-ID`.
    pub fn last_event_id(&self) -> Option<String> {
        self.shared.last_event_id().map(|id| id.to_string())
    }

    /// Delay the next reconnect will wait (before jitter).
    pub fn retry_interval(&self) -> Duration {
        self.shared.retry.lock().retry_interval()
    }

    /// The configured URL.
    pub fn url(&self) -> &str {
        &self.shared.config.url
    }
}

impl Drop for EventSource {
    fn drop(&mut self) {
        self.close();
    }
}

impl fmt::Debug for EventSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventSource")
            .field("url", &self.shared.config.url)
            .field("state", &self.shared.state())
            .field("handlers", &self.shared.handlers)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Internal: background driver
// ---------------------------------------------------------------------------

/// Why a connection attempt ended.
enum Outcome {
    /// `close()` was called or the handle was dropped.
    Closed,
    /// Reconnectable failure.
    Failed(EventSourceError),
}

/// Await the next command; `None` (all senders gone) counts as close.
fn command_outcome(cmd: Option<Command>) -> Outcome {
    match cmd {
        Some(Command::Close) | None => Outcome::Closed,
        Some(Command::Reconnect { reason }) => {
            warn!(reason = %reason, "Event source reconnect requested");
            Outcome::Failed(EventSourceError::transport(format!(
                "Reconnect requested: {reason}"
            )))
        }
    }
}

/// Issue the request and validate the response head.
async fn connect(
    shared: &Shared,
    cmd_rx: &mut mpsc::UnboundedReceiver<Command>,
) -> Result<StreamResponse, Outcome> {
    let request = shared.build_request();
    let limit = shared.config.timeout;

    let result = tokio::select! {
        biased;

        cmd = cmd_rx.recv() => return Err(command_outcome(cmd)),
        result = timeout(limit, shared.transport.open_stream(request)) => result,
    };

    let response = result
        .map_err(|_| EventSourceError::timeout(limit))
        .and_then(|r| r)
        .map_err(Outcome::Failed)?;
    response.validate().map_err(Outcome::Failed)?;
    Ok(response)
}

/// Pump body chunks through the parser into the handlers until the stream ends.
async fn stream_events(
    shared: &Shared,
    parser: &mut EventParser,
    mut body: BodyStream,
    cmd_rx: &mut mpsc::UnboundedReceiver<Command>,
) -> Outcome {
    let limit = shared.config.timeout;

    loop {
        let item = tokio::select! {
            biased;

            cmd = cmd_rx.recv() => return command_outcome(cmd),
            item = timeout(limit, body.next()) => item,
        };

        let events = match item {
            Ok(Some(Ok(chunk))) => parser.feed(&chunk),
            Ok(Some(Err(err))) => return Outcome::Failed(err),
            Err(_) => return Outcome::Failed(EventSourceError::timeout(limit)),
            Ok(None) => {
                let tail = parser.finish();
                if !deliver_parsed(shared, tail) {
                    return Outcome::Closed;
                }
                return Outcome::Failed(EventSourceError::ConnectionClosedByServer);
            }
        };

        if !deliver_parsed(shared, events) {
            return Outcome::Closed;
        }
    }
}

/// Record and dispatch parsed events; `false` once the connection is closed.
fn deliver_parsed(shared: &Shared, events: Vec<Event>) -> bool {
    for event in events {
        shared.retry.lock().note_event(&event);
        debug!(
            event_type = %event.event,
            id = event.id().unwrap_or(""),
            data_len = event.data.len(),
            "Event received",
        );
        if !shared.deliver(&event.with_ready_state(ConnectionState::Open)) {
            return false;
        }
    }
    true
}

/// The long-lived task behind [`EventSource::open`].
///
/// One attempt per loop iteration: connect, stream until failure, report the
/// failure to `error` handlers, wait the retry interval, repeat. Every await
/// point also listens for commands, so `close()` cancels whichever of the
/// request, the body read, or the reconnect timer is pending.
async fn event_source_driver(shared: Arc<Shared>, mut cmd_rx: mpsc::UnboundedReceiver<Command>) {
    let mut parser = match shared.last_event_id() {
        Some(id) => EventParser::with_last_event_id(id),
        None => EventParser::new(),
    };
    let mut attempt: u32 = 0;

    loop {
        let resume_from = shared.last_event_id();
        info!(
            url = %shared.config.url,
            attempt,
            last_event_id = resume_from.as_deref().unwrap_or(""),
            "Event source connecting"
        );

        let outcome = match connect(&shared, &mut cmd_rx).await {
            Ok(response) => {
                if !shared.transition(ConnectionState::Open) {
                    return;
                }
                info!(url = %shared.config.url, status = %response.status, "Event source connection established");
                attempt = 0;
                parser.reset();

                if !shared.deliver(&Event::open(shared.last_event_id())) {
                    return;
                }
                stream_events(&shared, &mut parser, response.body, &mut cmd_rx).await
            }
            Err(outcome) => outcome,
        };

        let err = match outcome {
            Outcome::Closed => {
                info!(url = %shared.config.url, "Event source closed");
                return;
            }
            Outcome::Failed(err) => err,
        };

        match &err {
            EventSourceError::ConnectionClosedByServer => warn!(url = %shared.config.url, "Event source stream ended"),
            _ => error!(url = %shared.config.url, error = %err, kind = %err.kind(), "Event source connection failed"),
        }

        if !shared.transition(ConnectionState::Connecting) {
            return;
        }
        let error_event = Event::error(err, shared.last_event_id(), ConnectionState::Connecting);
        if !shared.deliver(&error_event) {
            return;
        }

        let delay = shared.retry.lock().reconnect_delay(shared.config.reconnect_jitter);
        attempt = attempt.saturating_add(1);
        warn!(
            attempt,
            delay_ms = delay.as_millis() as u64,
            "Event source reconnecting after delay"
        );

        tokio::select! {
            biased;

            cmd = cmd_rx.recv() => match cmd {
                Some(Command::Close) | None => {
                    info!(url = %shared.config.url, "Event source closed while waiting to reconnect");
                    return;
                }
                Some(Command::Reconnect { reason }) => {
                    debug!(reason = %reason, "Skipping remaining reconnect delay");
                }
            },
            _ = tokio::time::sleep(delay) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex as StdMutex;

    use async_trait::async_trait;
    use bytes::Bytes;
    use futures_util::stream;
    use http::{HeaderMap, StatusCode};

    use super::*;

    /// Transport that records requests and replays canned SSE bodies.
    struct CannedTransport {
        bodies: StdMutex<Vec<&'static str>>,
        requests: Arc<StdMutex<Vec<StreamRequest>>>,
    }

    #[async_trait]
    impl Transport for CannedTransport {
        async fn open_stream(&self, request: StreamRequest) -> EventSourceResult<StreamResponse> {
            self.requests.lock().unwrap().push(request);
            let body = {
                let mut bodies = self.bodies.lock().unwrap();
                if bodies.is_empty() { "" } else { bodies.remove(0) }
            };
            let mut headers = HeaderMap::new();
            headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(EVENT_STREAM_MIME));
            let chunks = stream::iter(vec![Ok(Bytes::from_static(body.as_bytes()))]);
            Ok(StreamResponse::new(StatusCode::OK, headers, chunks))
        }
    }

    fn canned(
        bodies: Vec<&'static str>,
        config: EventSourceConfig,
    ) -> (EventSource, Arc<StdMutex<Vec<StreamRequest>>>) {
        let requests = Arc::new(StdMutex::new(Vec::new()));
        let transport = CannedTransport {
            bodies: StdMutex::new(bodies),
            requests: Arc::clone(&requests),
        };
        let source = EventSource::with_transport(config, transport).expect("valid config");
        (source, requests)
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let transport = CannedTransport {
            bodies: StdMutex::new(vec![]),
            requests: Arc::new(StdMutex::new(vec![])),
        };
        let err = EventSource::with_transport(EventSourceConfig::default(), transport)
            .expect_err("empty url");
        assert!(matches!(err, EventSourceError::Config { .. }));
    }

    #[test]
    fn test_open_outside_runtime_fails() {
        let (source, _) = canned(vec![], EventSourceConfig::new("http://localhost/stream"));
        assert!(matches!(source.open(), Err(EventSourceError::NoRuntime)));
        assert_eq!(source.state(), ConnectionState::Connecting);
    }

    #[tokio::test]
    async fn test_open_twice_fails() {
        let (source, _) = canned(vec![], EventSourceConfig::new("http://localhost/stream"));
        source.open().expect("first open");
        assert!(matches!(source.open(), Err(EventSourceError::AlreadyOpened)));
        source.close();
    }

    #[tokio::test]
    async fn test_open_after_close_fails() {
        let (source, requests) = canned(vec![], EventSourceConfig::new("http://localhost/stream"));
        source.close();
        assert_eq!(source.state(), ConnectionState::Closed);
        assert!(matches!(source.open(), Err(EventSourceError::Closed)));
        tokio::task::yield_now().await;
        assert!(requests.lock().unwrap().is_empty());
    }

    #[test]
    fn test_request_headers() {
        let mut extra = HeaderMap::new();
        extra.insert("x-api-key", HeaderValue::from_static("k"));
        let config = EventSourceConfig::new("http://localhost/stream")
            .headers(extra)
            .last_event_id("seed-1");
        let (source, _) = canned(vec![], config);

        let request = source.shared.build_request();
        assert_eq!(request.url, "http://localhost/stream");
        assert_eq!(request.headers[header::ACCEPT], EVENT_STREAM_MIME);
        assert_eq!(request.headers["x-api-key"], "k");
        assert_eq!(request.last_event_id(), Some("seed-1"));
        assert_eq!(request.timeout, Duration::from_secs(300));
        assert_eq!(source.last_event_id().as_deref(), Some("seed-1"));
    }

    #[test]
    fn test_no_last_event_id_header_without_id() {
        let (source, _) = canned(vec![], EventSourceConfig::new("http://localhost/stream"));
        assert!(source.shared.build_request().last_event_id().is_none());
    }

    #[test]
    fn test_close_is_idempotent_and_terminal() {
        let (source, _) = canned(vec![], EventSourceConfig::new("http://localhost/stream"));
        source.close();
        source.close();
        assert!(!source.shared.transition(ConnectionState::Connecting));
        assert!(!source.shared.transition(ConnectionState::Open));
        assert_eq!(source.state(), ConnectionState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reconnect_carries_last_event_id_and_retry() {
        let config = EventSourceConfig::new("http://localhost/stream")
            .retry_interval(Duration::from_millis(100));
        let (source, requests) = canned(
            vec!["id: 5\nretry: 10000\ndata: a\n\ndata: b\n\n", ""],
            config,
        );

        let (handler, mut events) = crate::handlers::channel();
        source.on_message(handler.clone());
        source.on_error(handler);
        source.open().expect("open");

        let a = events.next_event().await.expect("a");
        assert_eq!((a.id(), a.data()), (Some("5"), "a"));
        let b = events.next_event().await.expect("b");
        assert_eq!((b.id(), b.data()), (Some("5"), "b"));
        assert_eq!(b.ready_state, ConnectionState::Open);

        let err = events.next_event().await.expect("error event");
        assert!(matches!(
            err.error.as_deref(),
            Some(EventSourceError::ConnectionClosedByServer)
        ));
        assert_eq!(err.ready_state, ConnectionState::Connecting);
        assert_eq!(source.retry_interval(), Duration::from_millis(10_000));

        // Second attempt only happens after the advertised 10s retry.
        tokio::time::sleep(Duration::from_millis(9_000)).await;
        assert_eq!(requests.lock().unwrap().len(), 1);
        tokio::time::sleep(Duration::from_millis(1_500)).await;
        {
            let requests = requests.lock().unwrap();
            assert_eq!(requests.len(), 2);
            assert_eq!(requests[0].last_event_id(), None);
            assert_eq!(requests[1].last_event_id(), Some("5"));
        }

        source.close();
    }
}
