//! Expiration Evaluator
//!
//! The single place where a bin's expiration is compared against the clock.
//! Both the record operations (lazy expiry on read) and the sweep (eager
//! expiry) call [`classify`], so the two paths can never disagree about
//! whether a bin is visible.
//!
//! ## States
//!
//! ```text
//!   expires_at == NEVER          -> Never
//!   now >= expires_at            -> Expired   (reads behave as if absent)
//!   now <  expires_at            -> Alive
//! ```

use crate::codec::{BinEnvelope, Expiry, Value};
use crate::error::{Error, Result};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// TTL argument meaning "no expiration".
pub const NO_EXPIRATION: i64 = -1;

/// Visibility state of a managed bin at a given instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinState {
    Alive,
    Expired,
    Never,
}

/// Remaining lifetime of a visible managed bin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ttl {
    /// The bin never expires.
    Never,
    /// Seconds until the bin expires.
    Remaining(u64),
}

impl Ttl {
    /// Wire form: `-1` for never, seconds otherwise.
    pub fn to_value(self) -> Value {
        match self {
            Ttl::Never => Value::Integer(NO_EXPIRATION),
            Ttl::Remaining(secs) => Value::Integer(i64::try_from(secs).unwrap_or(i64::MAX)),
        }
    }

    /// Parses the wire form. `Nil` means "not found".
    pub fn from_value(value: &Value) -> Result<Option<Self>> {
        match value {
            Value::Nil => Ok(None),
            Value::Integer(NO_EXPIRATION) => Ok(Some(Ttl::Never)),
            Value::Integer(secs) if *secs >= 0 => Ok(Some(Ttl::Remaining(*secs as u64))),
            other => Err(Error::UnexpectedResponse(format!(
                "expected ttl, got {}",
                other
            ))),
        }
    }
}

/// Classifies a managed bin at time `now` (seconds since epoch).
pub fn classify(envelope: &BinEnvelope, now: u64) -> BinState {
    match envelope.expires_at {
        Expiry::Never => BinState::Never,
        Expiry::At(ts) if now >= ts => BinState::Expired,
        Expiry::At(_) => BinState::Alive,
    }
}

/// Remaining TTL of a managed bin, or `None` once it has expired.
pub fn remaining_ttl(envelope: &BinEnvelope, now: u64) -> Option<Ttl> {
    match (classify(envelope, now), envelope.expires_at) {
        (BinState::Never, _) => Some(Ttl::Never),
        (BinState::Alive, Expiry::At(ts)) => Some(Ttl::Remaining(ts - now)),
        _ => None,
    }
}

/// Converts a relative TTL argument into an absolute expiry.
///
/// `-1` means never; `0` yields a bin that is already expired. The resulting
/// timestamp must fit the signed wire form.
pub fn expiry_from_ttl(ttl_seconds: i64, now: u64) -> Result<Expiry> {
    match ttl_seconds {
        NO_EXPIRATION => Ok(Expiry::Never),
        secs if secs >= 0 => now
            .checked_add(secs as u64)
            .filter(|ts| *ts <= i64::MAX as u64)
            .map(Expiry::At)
            .ok_or_else(|| {
                Error::InvalidArgument(format!(
                    "ttl of {} seconds overflows the expiration time",
                    secs
                ))
            }),
        other => Err(Error::InvalidArgument(format!(
            "ttl must be -1 or non-negative, got {}",
            other
        ))),
    }
}

/// Source of the current time in seconds since the Unix epoch.
pub trait Clock: Send + Sync + fmt::Debug {
    fn now(&self) -> u64;
}

/// Wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0)
    }
}

/// A clock that only moves when told to.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicU64,
}

impl ManualClock {
    pub fn new(now: u64) -> Self {
        Self {
            now: AtomicU64::new(now),
        }
    }

    pub fn set(&self, now: u64) {
        self.now.store(now, Ordering::SeqCst);
    }

    pub fn advance(&self, secs: u64) {
        self.now.fetch_add(secs, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}
