//! Bin Envelope Codec
//!
//! This module turns a bin's logical value plus its expiration into the single
//! opaque value the record store persists, and back.
//!
//! ## Modules
//!
//! - `value`: The [`Value`] model and its serializer
//! - `wire`: Parser for serialized values
//! - `envelope`: [`BinEnvelope`] framing with magic marker and expiration
//!
//! ## Example
//!
//! ```
//! use binttl::codec::{decode, encode, Expiry, Value};
//!
//! let stored = encode(&Value::from("hello"), Expiry::At(1_700_000_000));
//! let envelope = decode(&stored).unwrap();
//! assert_eq!(envelope.value, Value::from("hello"));
//! assert_eq!(envelope.expires_at, Expiry::At(1_700_000_000));
//! ```

pub mod envelope;
pub mod value;
pub mod wire;

pub use envelope::{decode, encode, inspect, BinEnvelope, Expiry, MAGIC};
pub use value::Value;
pub use wire::{DecodeError, DecodeResult, WireParser};
