//! Bin Envelope
//!
//! An expiring bin is stored as a single blob: a magic marker, the absolute
//! expiration timestamp, and the caller's value.
//!
//! ```text
//! \xEBbin1 :<expires_at>\r\n <value>
//! ```
//!
//! `expires_at` is seconds since the Unix epoch, or `-1` for a bin that never
//! expires. Anything without the marker is a plain bin.

use crate::codec::value::Value;
use crate::codec::wire::{parse_exact, parse_integer_line, DecodeError, DecodeResult};
use bytes::Bytes;

/// Marker that opens every envelope.
pub const MAGIC: &[u8] = b"\xEBbin1";

/// Wire value of [`Expiry::Never`].
pub const NEVER_WIRE: i64 = -1;

/// Absolute expiration of a managed bin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Expiry {
    /// The bin never expires.
    Never,
    /// The bin expires at this many seconds since the Unix epoch.
    At(u64),
}

impl Expiry {
    fn to_wire(self) -> i64 {
        match self {
            Expiry::Never => NEVER_WIRE,
            Expiry::At(ts) => i64::try_from(ts).unwrap_or(i64::MAX),
        }
    }

    fn from_wire(raw: i64) -> DecodeResult<Self> {
        match raw {
            NEVER_WIRE => Ok(Expiry::Never),
            ts if ts >= 0 => Ok(Expiry::At(ts as u64)),
            other => Err(DecodeError::InvalidExpiry(other)),
        }
    }
}

/// A bin's value together with its expiration.
#[derive(Debug, Clone, PartialEq)]
pub struct BinEnvelope {
    pub value: Value,
    pub expires_at: Expiry,
}

impl BinEnvelope {
    pub fn new(value: Value, expires_at: Expiry) -> Self {
        Self { value, expires_at }
    }

    /// Encodes the envelope into the value a store persists for the bin.
    pub fn encode(&self) -> Value {
        encode(&self.value, self.expires_at)
    }

    /// Decodes a stored bin value.
    ///
    /// Fails with [`DecodeError::NotEnvelope`] for plain bins and with another
    /// [`DecodeError`] when the marker is present but the body is corrupt.
    pub fn decode(stored: &Value) -> DecodeResult<Self> {
        decode(stored)
    }
}

/// Encodes `value` and `expires_at` into a stored blob.
pub fn encode(value: &Value, expires_at: Expiry) -> Value {
    let mut buf = Vec::with_capacity(MAGIC.len() + 24);
    buf.extend_from_slice(MAGIC);
    Value::Integer(expires_at.to_wire()).serialize_into(&mut buf);
    value.serialize_into(&mut buf);
    Value::Blob(Bytes::from(buf))
}

/// Decodes a stored blob back into an envelope.
pub fn decode(stored: &Value) -> DecodeResult<BinEnvelope> {
    let body = match stored {
        Value::Blob(data) if data.starts_with(MAGIC) => &data[MAGIC.len()..],
        _ => return Err(DecodeError::NotEnvelope),
    };

    let (raw_expiry, consumed) = parse_integer_line(body)?;
    let expires_at = Expiry::from_wire(raw_expiry)?;
    let value = parse_exact(&body[consumed..])?;

    Ok(BinEnvelope { value, expires_at })
}

/// Classifies a stored bin as plain (`Ok(None)`), managed (`Ok(Some(_))`),
/// or corrupt (`Err(_)`).
pub fn inspect(stored: &Value) -> DecodeResult<Option<BinEnvelope>> {
    match decode(stored) {
        Ok(envelope) => Ok(Some(envelope)),
        Err(DecodeError::NotEnvelope) => Ok(None),
        Err(e) => Err(e),
    }
}
