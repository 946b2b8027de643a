//! Push-based parser that turns arbitrary byte chunks into [`Event`]s.

use core::time::Duration;

use bytes::{Buf, BufMut, BytesMut};
use bytes_utils::{Str, StrMut};
use tracing::trace;

use super::{
    constants::{BOM, CR, EMPTY_STR, LF},
    parser::{FieldName, Line, next_line},
};
use crate::types::{ConnectionState, Event, MESSAGE_EVENT};

// ---------------------------------------------------------------------------
// Pending block
// ---------------------------------------------------------------------------

/// Data accumulator.
///
/// Most events have a single `data:` line, so the first value is kept as an
/// immutable [`Str`] and only upgraded to a mutable buffer when a second line
/// arrives.
#[derive(Debug, Default, Clone)]
enum DataBuffer {
    #[default]
    Uninit,
    Immutable(Str),
    Mutable(StrMut),
}

impl DataBuffer {
    fn freeze(self) -> Str {
        match self {
            Self::Uninit => EMPTY_STR,
            Self::Immutable(s) => s,
            Self::Mutable(s) => s.freeze(),
        }
    }

    fn push_str(&mut self, s: Str) {
        match self {
            Self::Uninit => *self = Self::Immutable(s),
            Self::Immutable(first) => {
                let inner = BytesMut::with_capacity(first.len() + 1 + s.len());
                // Safety: an empty buffer is trivially valid UTF-8.
                let mut buf = unsafe { StrMut::from_inner_unchecked(inner) };
                buf.push_str(first);
                buf.push('\n');
                buf.push_str(&s);
                *self = Self::Mutable(buf);
            }
            Self::Mutable(buf) => {
                buf.push('\n');
                buf.push_str(&s);
            }
        }
    }
}

/// The single in-progress event block.
#[derive(Debug, Default, Clone)]
struct PendingBlock {
    event: Option<Str>,
    data: DataBuffer,
    id: Option<Str>,
    retry: Option<Duration>,
    has_content: bool,
}

impl PendingBlock {
    fn apply(&mut self, name: FieldName, value: Option<Str>) {
        let value = value.unwrap_or(EMPTY_STR);
        match name {
            FieldName::Event => self.event = Some(value),
            FieldName::Data => self.data.push_str(value),
            FieldName::Id => {
                if value.is_empty() || memchr::memchr(0, value.as_bytes()).is_some() {
                    trace!("ignoring empty or NUL-bearing id field");
                    return;
                }
                self.id = Some(value);
            }
            FieldName::Retry => match value.parse::<u64>() {
                Ok(ms) => self.retry = Some(Duration::from_millis(ms)),
                Err(_) => {
                    trace!(value = %value, "ignoring non-integer retry field");
                    return;
                }
            },
            FieldName::Ignored => return,
        }
        self.has_content = true;
    }
}

// ---------------------------------------------------------------------------
// EventParser
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BomState {
    /// Still looking at the first bytes of the stream.
    Pending,
    Done,
}

/// Incremental Server-Sent Events parser.
///
/// Feed it chunks in arrival order with [`feed`](Self::feed); chunk boundaries
/// may fall anywhere, including inside a line terminator or a UTF-8 sequence.
/// Completed blocks come back as [`Event`]s in the order their terminating
/// blank line was seen. Malformed lines are skipped; the parser never fails.
///
/// ```
/// use hpx_eventsource::EventParser;
///
/// let mut parser = EventParser::new();
/// assert!(parser.feed("data: fo").is_empty());
/// let events = parser.feed("o\n\n");
/// assert_eq!(events[0].data(), "foo");
/// assert_eq!(events[0].event_type(), "message");
/// ```
#[derive(Debug, Clone)]
pub struct EventParser {
    buffer: BytesMut,
    block: PendingBlock,
    bom: BomState,
    last_event_id: Option<Str>,
}

impl Default for EventParser {
    fn default() -> Self {
        Self::new()
    }
}

impl EventParser {
    /// Create a parser with no prior event ID.
    pub fn new() -> Self {
        Self {
            buffer: BytesMut::new(),
            block: PendingBlock::default(),
            bom: BomState::Pending,
            last_event_id: None,
        }
    }

    /// Create a parser whose sticky event ID starts at `id`.
    pub fn with_last_event_id(id: impl Into<Str>) -> Self {
        let id = id.into();
        Self {
            last_event_id: (!id.is_empty()).then_some(id),
            ..Self::new()
        }
    }

    /// The most recent non-empty `id` seen, carried across blocks.
    pub fn last_event_id(&self) -> Option<&Str> {
        self.last_event_id.as_ref()
    }

    /// Push the next chunk and collect every block it completes.
    pub fn feed(&mut self, chunk: impl AsRef<[u8]>) -> Vec<Event> {
        let chunk = chunk.as_ref();
        let mut events = Vec::new();
        if chunk.is_empty() {
            return events;
        }

        self.buffer.extend_from_slice(chunk);

        if self.bom == BomState::Pending {
            match starts_with_bom(&self.buffer) {
                Some(true) => {
                    self.buffer.advance(BOM.len());
                    self.bom = BomState::Done;
                }
                Some(false) => self.bom = BomState::Done,
                None => return events,
            }
        }

        self.drain(&mut events);
        events
    }

    /// Signal end of input.
    ///
    /// A trailing CR is now known to be a complete terminator. A block that
    /// never saw its blank line is discarded.
    pub fn finish(&mut self) -> Vec<Event> {
        let mut events = Vec::new();
        if self.buffer.last() == Some(&CR) {
            self.buffer.put_u8(LF);
        }
        self.drain(&mut events);
        self.reset();
        events
    }

    /// Drop any partial line and in-progress block, keeping the sticky ID.
    ///
    /// Called before parsing a fresh response body.
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.block = PendingBlock::default();
        self.bom = BomState::Pending;
    }

    fn drain(&mut self, events: &mut Vec<Event>) {
        while let Some(line) = next_line(&mut self.buffer) {
            match line {
                Line::Empty => {
                    if let Some(event) = self.dispatch() {
                        events.push(event);
                    }
                }
                Line::Field { name, value } => self.block.apply(name, value),
                Line::Comment => {}
                Line::Invalid => trace!("skipping line with invalid UTF-8"),
            }
        }
    }

    /// Finalise the pending block; `None` when it had no recognised field.
    fn dispatch(&mut self) -> Option<Event> {
        let PendingBlock {
            event,
            data,
            id,
            retry,
            has_content,
        } = core::mem::take(&mut self.block);

        if id.is_some() {
            self.last_event_id = id;
        }
        if !has_content {
            return None;
        }

        let event = event
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| Str::from_static(MESSAGE_EVENT));

        Some(Event {
            id: self.last_event_id.clone(),
            event,
            data: data.freeze(),
            retry,
            ready_state: ConnectionState::Open,
            error: None,
        })
    }
}

/// `Some(true)` if `buf` starts with a BOM, `Some(false)` if it cannot, `None`
/// if more bytes are needed to decide.
fn starts_with_bom(buf: &[u8]) -> Option<bool> {
    let n = buf.len().min(BOM.len());
    if buf[..n] != BOM[..n] {
        return Some(false);
    }
    (n == BOM.len()).then_some(true)
}
