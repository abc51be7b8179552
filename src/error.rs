//! Error Types
//!
//! Every fallible operation in binttl returns [`Result`], whose error side is
//! the single [`Error`] enum below. Single-record operations surface these
//! directly; the sweep collects them per record inside a
//! [`SweepReport`](crate::sweep::SweepReport) instead.

use crate::codec::DecodeError;
use thiserror::Error;

/// Errors produced by expire-bin operations and the backing store.
#[derive(Debug, Error)]
pub enum Error {
    /// The backing store could not be reached. Never retried internally.
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    /// A bin expected to be managed is plain, or a plain write would alias
    /// the envelope encoding.
    #[error("invalid bin '{bin}': {reason}")]
    InvalidBin { bin: String, reason: String },

    /// `touch` targeted a bin that is absent or not an expiring bin.
    #[error("bin '{bin}' is not an expiring bin")]
    NotExpiringBin { bin: String },

    /// Stored bytes carry the envelope marker but do not parse.
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    /// The store rejected the atomic write.
    #[error("write rejected: {0}")]
    Write(String),

    /// One or more records failed to purge during a sweep.
    #[error("sweep finished with {failed} failed record(s) out of {scanned} scanned")]
    PartialSweepFailure { failed: usize, scanned: u64 },

    /// Malformed TTL, bin name, or argument list.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The store has no such module, or the module has no such function.
    #[error("unknown function {module}.{function}")]
    UnknownFunction { module: String, function: String },

    /// The store returned a result of an unexpected shape.
    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),
}

impl Error {
    pub(crate) fn invalid_bin(bin: &str, reason: impl Into<String>) -> Self {
        Error::InvalidBin {
            bin: bin.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn not_expiring(bin: &str) -> Self {
        Error::NotExpiringBin {
            bin: bin.to_string(),
        }
    }

    /// Returns `true` if the error came from the store's transport rather
    /// than from the bins themselves.
    pub fn is_store_error(&self) -> bool {
        matches!(self, Error::StoreUnavailable(_) | Error::Write(_))
    }
}

/// Result type used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
