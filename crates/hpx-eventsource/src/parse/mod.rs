//! Incremental Server-Sent Events parsing.
//!
//! Follows the event stream interpretation rules of the
//! [HTML Living Standard](https://html.spec.whatwg.org/multipage/server-sent-events.html):
//! lines end in LF, CRLF or a lone CR, blank lines end a block, `:` starts a
//! comment, and `event`, `data`, `id` and `retry` are the recognised fields.

pub(crate) mod constants;
pub mod event_parser;
pub(crate) mod parser;

pub use event_parser::EventParser;
