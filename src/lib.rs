//! # binttl - Per-Bin Expiration for Record Stores
//!
//! Record stores usually expire whole records. binttl lets individual bins
//! (named fields) of a record carry their own time-to-live, independent of the
//! record and of each other.
//!
//! ## Features
//!
//! - **Per-Bin TTL**: each bin may expire on its own schedule, or never
//! - **Atomic Operations**: every read-modify-write runs as one indivisible
//!   call on the store, so concurrent writers never see torn envelopes
//! - **Lazy + Eager Expiry**: reads hide expired bins immediately; sweeps
//!   reclaim them physically
//! - **Background Sweeper**: a Tokio task that sweeps on an adaptive interval
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                               binttl                                    │
//! │                                                                         │
//! │  ┌─────────────┐   execute_atomic   ┌──────────────────────────────┐    │
//! │  │  ExpireBin  │──────────────────> │         RecordStore          │    │
//! │  │  (client)   │                    │  ┌────────────────────────┐  │    │
//! │  └──────┬──────┘                    │  │   ExpireBinModule      │  │    │
//! │         │                           │  │ get put puts touch ttl │  │    │
//! │         ▼                           │  │ clean                  │  │    │
//! │  ┌─────────────┐   scan + clean     │  └───────────┬────────────┘  │    │
//! │  │   Sweep     │──────────────────> │              │               │    │
//! │  │ Coordinator │                    │       BinEnvelope codec      │    │
//! │  └──────▲──────┘                    └──────────────────────────────┘    │
//! │         │                                                               │
//! │  ┌──────┴──────────────────────────────────────────────────────────┐    │
//! │  │                ExpirySweeper (Background Tokio Task)            │    │
//! │  └─────────────────────────────────────────────────────────────────┘    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```
//! use binttl::{ExpireBin, ExpireBinModule, MemoryStore, SystemClock, Ttl};
//! use binttl::config::ScanPolicy;
//! use binttl::store::Key;
//! use std::sync::Arc;
//!
//! let store = Arc::new(MemoryStore::new());
//! store.register(Arc::new(ExpireBinModule::new(Arc::new(SystemClock)))).unwrap();
//!
//! let client = ExpireBin::new(store);
//! let key = Key::new("test", "expireBin", "eb1");
//!
//! client.put(&key, "session", "abc", 300, true).unwrap();
//! client.put(&key, "profile", "xyz", -1, true).unwrap();
//!
//! assert_eq!(client.ttl(&key, "profile").unwrap(), Some(Ttl::Never));
//!
//! let report = client
//!     .clean(&ScanPolicy::default(), "test", "expireBin", &["session", "profile"])
//!     .unwrap();
//! assert_eq!(report.bins_purged, 0);
//! ```
//!
//! ## Module Overview
//!
//! - [`codec`]: value model, wire format, and the expiring-bin envelope
//! - [`expiration`]: the expiry predicate, TTL arithmetic, and clocks
//! - [`executor`]: the module that runs inside the store's atomic call
//! - [`store`]: the store boundary plus an in-memory implementation
//! - [`sweep`]: scan-driven purging and the background sweeper
//! - [`client`]: the public façade
//!
//! ## Design Highlights
//!
//! ### One Expiry Predicate
//!
//! `get`, `ttl`, and `clean` all decide expiry through
//! [`expiration::classify`]. A bin a read reports absent is exactly a bin a
//! sweep at the same instant would purge.
//!
//! ### Plain Bins Are Never Touched
//!
//! Expiring bins are tagged with a magic prefix. Bins without it belong to
//! other writers; operations either leave them alone or refuse them.

pub mod client;
pub mod codec;
pub mod config;
pub mod error;
pub mod executor;
pub mod expiration;
pub mod store;
pub mod sweep;

// Re-export commonly used types for convenience
pub use client::ExpireBin;
pub use codec::{BinEnvelope, Expiry, Value};
pub use config::{ApplyPolicy, ExpireBinConfig, ScanPolicy, SweeperConfig};
pub use error::{Error, Result};
pub use executor::{ExpireBinModule, PutSpec, TouchSpec};
pub use expiration::{Clock, ManualClock, SystemClock, Ttl, NO_EXPIRATION};
pub use store::{Key, MemoryStore, RecordStore};
pub use sweep::{ExpirySweeper, SweepCoordinator, SweepReport, SweepTarget};

/// Version of binttl
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
