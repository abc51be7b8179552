//! Bin Value Model
//!
//! This module defines [`Value`], the value model shared by bins, atomic-call
//! arguments, and atomic-call results.
//!
//! ## Wire Format
//!
//! Each value starts with a type prefix byte and is terminated with CRLF
//! (`\r\n`), in the style of RESP3:
//! - `_` Nil
//! - `#` Boolean (`#t` / `#f`)
//! - `:` Integer
//! - `,` Double
//! - `=` String (length-prefixed, UTF-8)
//! - `$` Blob (length-prefixed, binary-safe)
//! - `*` List
//! - `%` Map
//!
//! ## Examples
//!
//! Integer: `:1000\r\n`
//! String: `=5\r\nhello\r\n`
//! List: `*2\r\n:1\r\n#t\r\n`
//! Map: `%1\r\n=3\r\nbin\r\n:7\r\n`

use bytes::Bytes;
use std::fmt;

/// The CRLF terminator used in the wire format
pub const CRLF: &[u8] = b"\r\n";

/// Wire type prefixes
pub mod prefix {
    pub const NIL: u8 = b'_';
    pub const BOOL: u8 = b'#';
    pub const INTEGER: u8 = b':';
    pub const DOUBLE: u8 = b',';
    pub const STRING: u8 = b'=';
    pub const BLOB: u8 = b'$';
    pub const LIST: u8 = b'*';
    pub const MAP: u8 = b'%';
}

/// A value stored in a bin or passed to/from an atomic call.
///
/// Maps keep their insertion order and may use any value as a key, matching
/// what record stores typically allow inside a bin.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Absence of a value. Also used as the "not found" result.
    Nil,

    /// Boolean flag.
    Bool(bool),

    /// 64-bit signed integer.
    Integer(i64),

    /// 64-bit float.
    Double(f64),

    /// UTF-8 text.
    String(String),

    /// Binary-safe payload.
    Blob(Bytes),

    /// Ordered list of values.
    List(Vec<Value>),

    /// Ordered key/value pairs.
    Map(Vec<(Value, Value)>),
}

impl Value {
    /// Creates a string value.
    pub fn string(s: impl Into<String>) -> Self {
        Value::String(s.into())
    }

    /// Creates a blob value.
    pub fn blob(data: impl Into<Bytes>) -> Self {
        Value::Blob(data.into())
    }

    /// Creates a list value.
    pub fn list(values: Vec<Value>) -> Self {
        Value::List(values)
    }

    /// Creates a map value from pairs.
    pub fn map<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<Value>,
        V: Into<Value>,
    {
        Value::Map(
            pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    /// Serializes the value to bytes.
    pub fn serialize(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        self.serialize_into(&mut buf);
        buf
    }

    /// Serializes the value into an existing buffer.
    pub fn serialize_into(&self, buf: &mut Vec<u8>) {
        match self {
            Value::Nil => {
                buf.push(prefix::NIL);
                buf.extend_from_slice(CRLF);
            }
            Value::Bool(b) => {
                buf.push(prefix::BOOL);
                buf.push(if *b { b't' } else { b'f' });
                buf.extend_from_slice(CRLF);
            }
            Value::Integer(n) => {
                buf.push(prefix::INTEGER);
                buf.extend_from_slice(n.to_string().as_bytes());
                buf.extend_from_slice(CRLF);
            }
            Value::Double(d) => {
                buf.push(prefix::DOUBLE);
                buf.extend_from_slice(d.to_string().as_bytes());
                buf.extend_from_slice(CRLF);
            }
            Value::String(s) => write_sized(buf, prefix::STRING, s.as_bytes()),
            Value::Blob(data) => write_sized(buf, prefix::BLOB, data),
            Value::List(values) => {
                buf.push(prefix::LIST);
                buf.extend_from_slice(values.len().to_string().as_bytes());
                buf.extend_from_slice(CRLF);
                for value in values {
                    value.serialize_into(buf);
                }
            }
            Value::Map(pairs) => {
                buf.push(prefix::MAP);
                buf.extend_from_slice(pairs.len().to_string().as_bytes());
                buf.extend_from_slice(CRLF);
                for (k, v) in pairs {
                    k.serialize_into(buf);
                    v.serialize_into(buf);
                }
            }
        }
    }

    /// Returns true if this value is nil.
    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    /// Attempts to extract the inner string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Attempts to extract the inner integer.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Value::Integer(n) => Some(*n),
            _ => None,
        }
    }

    /// Attempts to extract the inner boolean.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Attempts to extract the inner blob.
    pub fn as_blob(&self) -> Option<&Bytes> {
        match self {
            Value::Blob(data) => Some(data),
            _ => None,
        }
    }

    /// Consumes self and returns the inner list if this is a List variant.
    pub fn into_list(self) -> Option<Vec<Value>> {
        match self {
            Value::List(values) => Some(values),
            _ => None,
        }
    }

    /// Looks up a string key in a map value.
    pub fn map_get(&self, key: &str) -> Option<&Value> {
        match self {
            Value::Map(pairs) => pairs
                .iter()
                .find(|(k, _)| k.as_str() == Some(key))
                .map(|(_, v)| v),
            _ => None,
        }
    }

    /// Short name of the variant, for error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Nil => "nil",
            Value::Bool(_) => "bool",
            Value::Integer(_) => "integer",
            Value::Double(_) => "double",
            Value::String(_) => "string",
            Value::Blob(_) => "blob",
            Value::List(_) => "list",
            Value::Map(_) => "map",
        }
    }
}

fn write_sized(buf: &mut Vec<u8>, tag: u8, data: &[u8]) {
    buf.push(tag);
    buf.extend_from_slice(data.len().to_string().as_bytes());
    buf.extend_from_slice(CRLF);
    buf.extend_from_slice(data);
    buf.extend_from_slice(CRLF);
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Integer(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Integer(n as i64)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(d: f64) -> Self {
        Value::Double(d)
    }
}

impl From<Bytes> for Value {
    fn from(data: Bytes) -> Self {
        Value::Blob(data)
    }
}

impl From<Vec<Value>> for Value {
    fn from(values: Vec<Value>) -> Self {
        Value::List(values)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => write!(f, "(nil)"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Integer(n) => write!(f, "{}", n),
            Value::Double(d) => write!(f, "{}", d),
            Value::String(s) => write!(f, "\"{}\"", s),
            Value::Blob(data) => {
                if let Ok(s) = std::str::from_utf8(data) {
                    write!(f, "b\"{}\"", s)
                } else {
                    write!(f, "(binary data, {} bytes)", data.len())
                }
            }
            Value::List(values) => {
                write!(f, "[")?;
                for (i, v) in values.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", v)?;
                }
                write!(f, "]")
            }
            Value::Map(pairs) => {
                write!(f, "{{")?;
                for (i, (k, v)) in pairs.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", k, v)?;
                }
                write!(f, "}}")
            }
        }
    }
}
