//! Wire Parser
//!
//! Parses the value encoding produced by [`Value::serialize`]. Unlike a
//! network parser, the input here is always a complete stored bin, so running
//! out of bytes is an error ([`DecodeError::Truncated`]) rather than a request
//! for more data.
//!
//! The parser returns `(value, consumed)` pairs so callers can check that an
//! envelope occupies the whole stored buffer.

use crate::codec::value::{prefix, Value, CRLF};
use bytes::Bytes;
use std::num::{ParseFloatError, ParseIntError};
use thiserror::Error;

/// Errors that can occur while decoding a stored bin.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DecodeError {
    /// The stored value is not an envelope (a plain bin)
    #[error("value is not an expire-bin envelope")]
    NotEnvelope,

    /// The input ended in the middle of a value
    #[error("truncated input")]
    Truncated,

    /// Unknown type prefix byte
    #[error("unknown type prefix: {0:#04x}")]
    UnknownPrefix(u8),

    /// Invalid integer format
    #[error("invalid integer: {0}")]
    InvalidInteger(String),

    /// Invalid double format
    #[error("invalid double: {0}")]
    InvalidDouble(String),

    /// Invalid UTF-8 in a string or a length line
    #[error("invalid UTF-8: {0}")]
    InvalidUtf8(String),

    /// Negative or oversized length or count
    #[error("invalid length: {0}")]
    InvalidLength(i64),

    /// Expiration timestamp is negative but not the NEVER sentinel
    #[error("invalid expiration timestamp: {0}")]
    InvalidExpiry(i64),

    /// Bytes left over after the envelope
    #[error("{0} trailing byte(s) after envelope")]
    TrailingBytes(usize),

    /// Structural violation (missing CRLF, bad boolean, etc.)
    #[error("malformed envelope: {0}")]
    Malformed(String),
}

/// Result type for decoding operations.
pub type DecodeResult<T> = Result<T, DecodeError>;

/// Maximum size for a single string or blob (512 MB)
pub const MAX_SIZED_LEN: usize = 512 * 1024 * 1024;

/// Maximum list/map nesting depth (prevent stack overflow)
pub const MAX_NESTING_DEPTH: usize = 32;

/// A parser for the bin value encoding.
#[derive(Debug, Default)]
pub struct WireParser {
    /// Current nesting depth (for list/map parsing)
    depth: usize,
}

impl WireParser {
    /// Creates a new parser instance.
    pub fn new() -> Self {
        Self { depth: 0 }
    }

    /// Parses one value from the front of `buf`.
    ///
    /// Returns the value and the number of bytes it occupied.
    pub fn parse(&mut self, buf: &[u8]) -> DecodeResult<(Value, usize)> {
        self.depth = 0;
        self.parse_value(buf)
    }

    fn parse_value(&mut self, buf: &[u8]) -> DecodeResult<(Value, usize)> {
        if buf.is_empty() {
            return Err(DecodeError::Truncated);
        }

        if self.depth > MAX_NESTING_DEPTH {
            return Err(DecodeError::Malformed(format!(
                "maximum nesting depth exceeded: {}",
                MAX_NESTING_DEPTH
            )));
        }

        match buf[0] {
            prefix::NIL => self.parse_nil(buf),
            prefix::BOOL => self.parse_bool(buf),
            prefix::INTEGER => {
                let (n, consumed) = parse_integer_line(buf)?;
                Ok((Value::Integer(n), consumed))
            }
            prefix::DOUBLE => self.parse_double(buf),
            prefix::STRING => {
                let (data, consumed) = parse_sized(buf)?;
                let s = std::str::from_utf8(data)
                    .map_err(|e| DecodeError::InvalidUtf8(e.to_string()))?;
                Ok((Value::String(s.to_string()), consumed))
            }
            prefix::BLOB => {
                let (data, consumed) = parse_sized(buf)?;
                Ok((Value::Blob(Bytes::copy_from_slice(data)), consumed))
            }
            prefix::LIST => self.parse_list(buf),
            prefix::MAP => self.parse_map(buf),
            other => Err(DecodeError::UnknownPrefix(other)),
        }
    }

    /// Parses nil: `_\r\n`
    fn parse_nil(&mut self, buf: &[u8]) -> DecodeResult<(Value, usize)> {
        let (line, consumed) = read_line(buf)?;
        if !line.is_empty() {
            return Err(DecodeError::Malformed("nil carries a payload".to_string()));
        }
        Ok((Value::Nil, consumed))
    }

    /// Parses a boolean: `#t\r\n` or `#f\r\n`
    fn parse_bool(&mut self, buf: &[u8]) -> DecodeResult<(Value, usize)> {
        let (line, consumed) = read_line(buf)?;
        match line {
            b"t" => Ok((Value::Bool(true), consumed)),
            b"f" => Ok((Value::Bool(false), consumed)),
            _ => Err(DecodeError::Malformed(format!(
                "invalid boolean: {}",
                String::from_utf8_lossy(line)
            ))),
        }
    }

    /// Parses a double: `,<float>\r\n`
    fn parse_double(&mut self, buf: &[u8]) -> DecodeResult<(Value, usize)> {
        let (line, consumed) = read_line(buf)?;
        let s =
            std::str::from_utf8(line).map_err(|e| DecodeError::InvalidUtf8(e.to_string()))?;
        let d: f64 = s
            .parse()
            .map_err(|e: ParseFloatError| DecodeError::InvalidDouble(e.to_string()))?;
        Ok((Value::Double(d), consumed))
    }

    /// Parses a list: `*<count>\r\n<elements...>`
    fn parse_list(&mut self, buf: &[u8]) -> DecodeResult<(Value, usize)> {
        let (count, mut consumed) = parse_count(buf)?;

        // Each element takes at least 3 bytes, so a count larger than that
        // cannot be satisfied by this buffer.
        let mut elements = Vec::with_capacity(count.min(buf.len() / 3));

        self.depth += 1;
        for _ in 0..count {
            let (value, element_consumed) = self.parse_value(&buf[consumed..])?;
            elements.push(value);
            consumed += element_consumed;
        }
        self.depth -= 1;

        Ok((Value::List(elements), consumed))
    }

    /// Parses a map: `%<count>\r\n<key><value>...`
    fn parse_map(&mut self, buf: &[u8]) -> DecodeResult<(Value, usize)> {
        let (count, mut consumed) = parse_count(buf)?;
        let mut pairs = Vec::with_capacity(count.min(buf.len() / 6));

        self.depth += 1;
        for _ in 0..count {
            let (key, key_consumed) = self.parse_value(&buf[consumed..])?;
            consumed += key_consumed;
            let (value, value_consumed) = self.parse_value(&buf[consumed..])?;
            consumed += value_consumed;
            pairs.push((key, value));
        }
        self.depth -= 1;

        Ok((Value::Map(pairs), consumed))
    }
}

/// Deepest level [`WireParser`] descends to when reading `value` back.
///
/// A value decodes only if this is at most [`MAX_NESTING_DEPTH`]. Elements of
/// a list or map sit one level below it; an empty one adds no level.
pub fn nesting_depth(value: &Value) -> usize {
    match value {
        Value::List(items) => items
            .iter()
            .map(|v| nesting_depth(v) + 1)
            .max()
            .unwrap_or(0),
        Value::Map(pairs) => pairs
            .iter()
            .map(|(k, v)| nesting_depth(k).max(nesting_depth(v)) + 1)
            .max()
            .unwrap_or(0),
        _ => 0,
    }
}

/// Parses a complete buffer holding exactly one value.
pub fn parse_exact(buf: &[u8]) -> DecodeResult<Value> {
    let (value, consumed) = WireParser::new().parse(buf)?;
    if consumed != buf.len() {
        return Err(DecodeError::TrailingBytes(buf.len() - consumed));
    }
    Ok(value)
}

/// Parses an integer line: `:<integer>\r\n`
pub(crate) fn parse_integer_line(buf: &[u8]) -> DecodeResult<(i64, usize)> {
    if buf.first() != Some(&prefix::INTEGER) {
        return Err(DecodeError::Malformed("expected integer".to_string()));
    }
    let (line, consumed) = read_line(buf)?;
    let s = std::str::from_utf8(line).map_err(|e| DecodeError::InvalidUtf8(e.to_string()))?;
    let n: i64 = s
        .parse()
        .map_err(|e: ParseIntError| DecodeError::InvalidInteger(e.to_string()))?;
    Ok((n, consumed))
}

/// Reads the line following the prefix byte. Returns the line content
/// (without prefix and CRLF) and the total bytes consumed.
fn read_line(buf: &[u8]) -> DecodeResult<(&[u8], usize)> {
    match find_crlf(&buf[1..]) {
        Some(pos) => Ok((&buf[1..1 + pos], 1 + pos + 2)),
        None => Err(DecodeError::Truncated),
    }
}

/// Parses a length or count header and validates it.
fn parse_count(buf: &[u8]) -> DecodeResult<(usize, usize)> {
    let (line, consumed) = read_line(buf)?;
    let s = std::str::from_utf8(line).map_err(|e| DecodeError::InvalidUtf8(e.to_string()))?;
    let n: i64 = s
        .parse()
        .map_err(|e: ParseIntError| DecodeError::InvalidInteger(e.to_string()))?;
    if n < 0 || n as u64 > MAX_SIZED_LEN as u64 {
        return Err(DecodeError::InvalidLength(n));
    }
    Ok((n as usize, consumed))
}

/// Parses a length-prefixed payload: `<prefix><length>\r\n<data>\r\n`
fn parse_sized(buf: &[u8]) -> DecodeResult<(&[u8], usize)> {
    let (length, data_start) = parse_count(buf)?;

    let total_needed = data_start + length + 2;
    if buf.len() < total_needed {
        return Err(DecodeError::Truncated);
    }

    if &buf[data_start + length..total_needed] != CRLF {
        return Err(DecodeError::Malformed(
            "payload missing trailing CRLF".to_string(),
        ));
    }

    Ok((&buf[data_start..data_start + length], total_needed))
}

/// Finds the position of CRLF in a buffer.
#[inline]
fn find_crlf(buf: &[u8]) -> Option<usize> {
    buf.windows(2).position(|w| w == CRLF)
}
