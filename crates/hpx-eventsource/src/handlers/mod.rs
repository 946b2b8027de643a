//! Ready-to-use [`EventHandler`](crate::EventHandler) implementations.
//!
//! - [`ChannelHandler`]: forwards events into an async [`EventReceiver`] stream
//! - [`LoggingHandler`]: records every event with `tracing`

mod channel;
mod logging;

pub use channel::{ChannelHandler, EventReceiver, channel};
pub use logging::LoggingHandler;
