//! # hpx-eventsource
//!
//! Server-Sent Events client: opens a long-lived HTTP GET, parses the
//! `text/event-stream` body incrementally, dispatches events to named
//! handlers, and reconnects transparently with `Last-Event-ID` resumption.
//!
//! ## Features
//!
//! - **Incremental parsing**: [`EventParser`] accepts chunks split anywhere,
//!   including inside CRLF pairs and UTF-8 sequences.
//! - **Named handlers**: `message`, `open`, `error` and any custom event name,
//!   invoked in registration order.
//! - **Reconnection**: indefinite, after the server-advertised `retry:`
//!   interval, resuming from the last seen event ID.
//! - **Pluggable transport**: the [`Transport`] trait, with a `reqwest`
//!   implementation behind the default `reqwest` feature.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::time::Duration;
//!
//! use hpx_eventsource::{Event, EventSource, EventSourceConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = EventSourceConfig::new("https://example.com/stream")
//!         .timeout(Duration::from_secs(60))
//!         .last_event_id("42");
//!
//!     let source = EventSource::with_config(config)?;
//!     source.on_message(|event: &Event| println!("{}", event.data()));
//!     source.add_event_listener("update", |event: &Event| {
//!         println!("update #{}: {}", event.id().unwrap_or("-"), event.data());
//!     });
//!     source.open()?;
//!
//!     tokio::time::sleep(Duration::from_secs(30)).await;
//!     source.close();
//!     Ok(())
//! }
//! ```
//!
//! ## Module Index
//!
//! | Module | Description |
//! |--------|-------------|
//! | `config` | [`EventSourceConfig`] builder |
//! | [`connection`] | [`EventSource`] and its background driver |
//! | `dispatch` | [`HandlerRegistry`] |
//! | [`handlers`] | Ready-made handlers ([`ChannelHandler`](handlers::ChannelHandler), [`LoggingHandler`](handlers::LoggingHandler)) |
//! | [`parse`] | [`EventParser`] |
//! | `retry` | [`RetryState`] |
//! | [`transport`] | [`Transport`] trait and the `reqwest` implementation |
//! | `types` | [`Event`], [`ConnectionState`] |

mod config;
pub mod connection;
mod dispatch;
pub mod error;
mod handler;
pub mod handlers;
pub mod parse;
mod retry;
pub mod transport;
mod types;

pub use config::EventSourceConfig;
pub use connection::{Command, EventSource};
pub use dispatch::HandlerRegistry;
pub use error::{ErrorKind, EventSourceError, EventSourceResult};
pub use handler::EventHandler;
pub use parse::EventParser;
pub use retry::RetryState;
#[cfg(feature = "reqwest")]
pub use transport::ReqwestTransport;
pub use transport::{StreamRequest, StreamResponse, Transport};
pub use types::{ConnectionState, ERROR_EVENT, Event, MESSAGE_EVENT, OPEN_EVENT};
