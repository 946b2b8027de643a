//! Line splitting and field recognition.
//!
//! Works on raw bytes so that a multi-byte UTF-8 sequence split across two
//! chunks is reassembled before it is validated.

use bytes::{Buf, Bytes, BytesMut};
use bytes_utils::Str;

use super::constants::{COLON, CR, LF};

/// One complete line, borrowed from the buffer.
#[derive(Debug, Clone, Copy)]
enum RawLine<'a> {
    Comment,
    Empty,
    Field {
        name: &'a [u8],
        value: Option<&'a [u8]>,
    },
}

/// Recognised field names. Anything else is carried as `Ignored`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FieldName {
    Event,
    Data,
    Id,
    Retry,
    Ignored,
}

impl FieldName {
    fn from_bytes(name: &[u8]) -> Self {
        match name {
            b"event" => Self::Event,
            b"data" => Self::Data,
            b"id" => Self::Id,
            b"retry" => Self::Retry,
            _ => Self::Ignored,
        }
    }
}

/// A fully classified line, ready to be folded into the pending block.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Line {
    /// `:`-prefixed line.
    Comment,
    /// Blank line, the block boundary.
    Empty,
    /// `name[: value]`. A line without a colon has no value.
    Field {
        name: FieldName,
        value: Option<Str>,
    },
    /// The value bytes were not valid UTF-8; the line is dropped.
    Invalid,
}

/// Finds the next end-of-line in `bytes`.
///
/// Returns `(line_end, remainder_start)`, or `None` when no terminator is
/// present yet. A trailing lone CR also yields `None` because the next byte
/// may turn it into CRLF.
fn find_eol(bytes: &[u8]) -> Option<(usize, usize)> {
    let pos = memchr::memchr2(CR, LF, bytes)?;

    if bytes[pos] == LF {
        return Some((pos, pos + 1));
    }

    match bytes.get(pos + 1) {
        None => None,
        Some(&LF) => Some((pos, pos + 2)),
        Some(_) => Some((pos, pos + 1)),
    }
}

fn read_line(bytes: &[u8]) -> RawLine<'_> {
    match memchr::memchr(COLON, bytes) {
        Some(0) => RawLine::Comment,
        Some(colon) => {
            let value = match &bytes[colon + 1..] {
                [b' ', rest @ ..] => rest,
                value => value,
            };
            RawLine::Field {
                name: &bytes[..colon],
                value: Some(value),
            }
        }
        None if bytes.is_empty() => RawLine::Empty,
        None => RawLine::Field {
            name: bytes,
            value: None,
        },
    }
}

fn validate(value: Bytes) -> Option<Str> {
    match std::str::from_utf8(&value) {
        // Safety: the bytes were validated as UTF-8 just above.
        Ok(_) => Some(unsafe { Str::from_inner_unchecked(value) }),
        Err(_) => None,
    }
}

/// Splits the next complete line off the front of `buffer` and classifies it.
///
/// Returns `None` when `buffer` holds no complete line; the partial tail stays
/// in place for the next call.
pub(crate) fn next_line(buffer: &mut BytesMut) -> Option<Line> {
    let (line_end, rem_start) = find_eol(buffer)?;

    let line = buffer.split_to(line_end).freeze();
    buffer.advance(rem_start - line_end);

    let parsed = match read_line(&line) {
        RawLine::Comment => Line::Comment,
        RawLine::Empty => Line::Empty,
        RawLine::Field { name, value } => {
            let name = FieldName::from_bytes(name);
            match value.map(|v| validate(line.slice_ref(v))) {
                None => Line::Field { name, value: None },
                Some(Some(value)) => Line::Field {
                    name,
                    value: Some(value),
                },
                Some(None) => Line::Invalid,
            }
        }
    };
    Some(parsed)
}
