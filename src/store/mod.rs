//! Record Store Boundary
//!
//! binttl never owns record storage. It talks to a backing store through the
//! [`RecordStore`] trait, which exposes exactly two primitives:
//!
//! - `execute_atomic`: run a named function of a registered [`UdfModule`]
//!   against one record as a single indivisible read-modify-write
//! - `scan`: visit every record of a namespace/set
//!
//! ```text
//!   ExpireBin ──execute_atomic(key, "expire_bin", "put", args)──┐
//!                                                               ▼
//!   ┌────────────────────── RecordStore ─────────────────────────────┐
//!   │  lock(record) → module.call(function, &mut bins, args) → commit │
//!   └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! [`MemoryStore`] is an in-process implementation for tests, demos, and
//! benchmarks.

pub mod memory;

pub use memory::{MemoryStore, StoreStats};

use crate::codec::Value;
use crate::config::{ApplyPolicy, ScanPolicy};
use crate::error::Result;
use bytes::Bytes;
use std::collections::HashMap;
use std::fmt;

/// The user part of a record key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum UserKey {
    String(String),
    Integer(i64),
    Blob(Bytes),
}

impl From<&str> for UserKey {
    fn from(s: &str) -> Self {
        UserKey::String(s.to_string())
    }
}

impl From<String> for UserKey {
    fn from(s: String) -> Self {
        UserKey::String(s)
    }
}

impl From<i64> for UserKey {
    fn from(n: i64) -> Self {
        UserKey::Integer(n)
    }
}

impl From<Bytes> for UserKey {
    fn from(data: Bytes) -> Self {
        UserKey::Blob(data)
    }
}

impl fmt::Display for UserKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UserKey::String(s) => write!(f, "{}", s),
            UserKey::Integer(n) => write!(f, "{}", n),
            UserKey::Blob(data) => write!(f, "<{} bytes>", data.len()),
        }
    }
}

/// Identifies a record: namespace, set (collection), and user key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Key {
    pub namespace: String,
    pub set: String,
    pub user_key: UserKey,
}

impl Key {
    pub fn new(namespace: impl Into<String>, set: impl Into<String>, user_key: impl Into<UserKey>) -> Self {
        Self {
            namespace: namespace.into(),
            set: set.into(),
            user_key: user_key.into(),
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.namespace, self.set, self.user_key)
    }
}

/// Bin name to stored value.
pub type Bins = HashMap<String, Value>;

/// A record as the store hands it out.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    pub bins: Bins,
    /// Incremented by the store on every committed write.
    pub generation: u32,
}

/// Server-side logic invoked by [`RecordStore::execute_atomic`].
///
/// `call` receives the record's current bins and may mutate them in place.
/// The store commits the mutated bins only when `call` returns `Ok`.
pub trait UdfModule: Send + Sync {
    /// Name the module is registered under.
    fn name(&self) -> &str;

    /// Runs `function` against one record's bins.
    fn call(&self, function: &str, bins: &mut Bins, args: &[Value]) -> Result<Value>;
}

/// Whether a scan should keep going after a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanAction {
    Continue,
    Stop,
}

/// The backing record store.
pub trait RecordStore: Send + Sync {
    /// Invokes `module.function(args)` against the record at `key` as one
    /// atomic unit. Concurrent calls on the same record are serialized.
    fn execute_atomic(
        &self,
        policy: &ApplyPolicy,
        key: &Key,
        module: &str,
        function: &str,
        args: &[Value],
    ) -> Result<Value>;

    /// Calls `callback` once per record in `namespace`/`set`. Ordering and
    /// snapshot semantics are up to the store. Returns the number of records
    /// visited.
    fn scan(
        &self,
        policy: &ScanPolicy,
        namespace: &str,
        set: &str,
        callback: &mut dyn FnMut(&Key, &Record) -> ScanAction,
    ) -> Result<u64>;
}
