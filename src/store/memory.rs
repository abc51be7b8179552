//! In-Memory Record Store
//!
//! A sharded, thread-safe [`RecordStore`] that keeps records in process.
//! It exists so the expire-bin logic can be exercised without a database
//! server: tests, the demo binary, and benchmarks all run against it.
//!
//! ## Concurrency Model
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       MemoryStore                           │
//! │  ┌─────────┐ ┌─────────┐ ┌─────────┐ ┌─────────┐            │
//! │  │ Shard 0 │ │ Shard 1 │ │ Shard 2 │ │ Shard N │            │
//! │  │ RwLock  │ │ RwLock  │ │ RwLock  │ │ RwLock  │            │
//! │  │ HashMap │ │ HashMap │ │ HashMap │ │ HashMap │            │
//! │  └─────────┘ └─────────┘ └─────────┘ └─────────┘            │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! An atomic call holds its shard's write lock for the whole
//! read-modify-write, so calls on the same record never interleave. The
//! module works on a staged copy of the bins, which is committed only when
//! the call succeeds.
//!
//! Scans copy one shard at a time under the read lock and run the callback
//! after the lock is released, so callbacks may issue atomic calls.
//!
//! An [`ApplyPolicy::timeout`] bounds the whole call, lock wait included. A
//! call over budget fails with `StoreUnavailable` and commits nothing.

use crate::codec::Value;
use crate::config::{ApplyPolicy, ScanPolicy};
use crate::error::{Error, Result};
use crate::store::{Bins, Key, Record, RecordStore, ScanAction, UdfModule};
use std::collections::{HashMap, HashSet};
use std::hash::{DefaultHasher, Hash, Hasher};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Instant;
use tracing::{debug, trace};

/// Number of shards for the store.
const NUM_SHARDS: usize = 64;

/// A single shard containing a portion of the records.
#[derive(Debug, Default)]
struct Shard {
    records: RwLock<HashMap<Key, Record>>,
}

/// In-process record store with registered modules.
///
/// # Example
///
/// ```
/// use binttl::store::{Key, MemoryStore};
/// use binttl::codec::Value;
///
/// let store = MemoryStore::new();
/// let key = Key::new("test", "demo", "k1");
/// store.put_bin(&key, "name", Value::from("Ariz")).unwrap();
///
/// let record = store.get_record(&key).unwrap().unwrap();
/// assert_eq!(record.bins["name"], Value::from("Ariz"));
/// ```
pub struct MemoryStore {
    /// Sharded storage for reduced lock contention
    shards: Vec<Shard>,

    /// Registered modules by name
    modules: RwLock<HashMap<String, Arc<dyn UdfModule>>>,

    /// When false, every call fails with `StoreUnavailable`
    available: AtomicBool,

    /// Keys whose commits are rejected with `Write`
    failing_writes: RwLock<HashSet<Key>>,

    /// Statistics: number of records
    record_count: AtomicU64,

    /// Statistics: total atomic calls
    apply_count: AtomicU64,

    /// Statistics: atomic calls that committed a change
    commit_count: AtomicU64,

    /// Statistics: total scans
    scan_count: AtomicU64,
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStore")
            .field("shards", &self.shards.len())
            .field("records", &self.record_count.load(Ordering::Relaxed))
            .field("applies", &self.apply_count.load(Ordering::Relaxed))
            .field("commits", &self.commit_count.load(Ordering::Relaxed))
            .finish()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Creates an empty store with no modules registered.
    pub fn new() -> Self {
        let shards = (0..NUM_SHARDS).map(|_| Shard::default()).collect();

        Self {
            shards,
            modules: RwLock::new(HashMap::new()),
            available: AtomicBool::new(true),
            failing_writes: RwLock::new(HashSet::new()),
            record_count: AtomicU64::new(0),
            apply_count: AtomicU64::new(0),
            commit_count: AtomicU64::new(0),
            scan_count: AtomicU64::new(0),
        }
    }

    /// Registers a module under its own name, replacing any previous one.
    pub fn register(&self, module: Arc<dyn UdfModule>) -> Result<()> {
        let name = module.name().to_string();
        write(&self.modules)?.insert(name.clone(), module);
        debug!(module = %name, "Module registered");
        Ok(())
    }

    /// Determines which shard a key belongs to.
    #[inline]
    fn shard_index(&self, key: &Key) -> usize {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        (hasher.finish() as usize) % NUM_SHARDS
    }

    #[inline]
    fn get_shard(&self, key: &Key) -> &Shard {
        &self.shards[self.shard_index(key)]
    }

    fn check_available(&self) -> Result<()> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(Error::StoreUnavailable("store is offline".to_string()))
        }
    }

    /// Writes a bin directly, bypassing any module. Creates the record if
    /// needed. Useful for seeding plain bins.
    pub fn put_bin(&self, key: &Key, bin: &str, value: Value) -> Result<()> {
        self.check_available()?;
        let shard = self.get_shard(key);
        let mut records = write(&shard.records)?;

        match records.get_mut(key) {
            Some(record) => {
                record.bins.insert(bin.to_string(), value);
                record.generation = record.generation.wrapping_add(1);
            }
            None => {
                let mut bins = Bins::new();
                bins.insert(bin.to_string(), value);
                records.insert(key.clone(), Record { bins, generation: 1 });
                self.record_count.fetch_add(1, Ordering::Relaxed);
            }
        }
        Ok(())
    }

    /// Returns a copy of the record, if it exists.
    pub fn get_record(&self, key: &Key) -> Result<Option<Record>> {
        self.check_available()?;
        let shard = self.get_shard(key);
        let records = read(&shard.records)?;
        Ok(records.get(key).cloned())
    }

    /// Deletes a record.
    ///
    /// Returns `true` if the record existed.
    pub fn delete(&self, key: &Key) -> Result<bool> {
        self.check_available()?;
        let shard = self.get_shard(key);
        let mut records = write(&shard.records)?;

        if records.remove(key).is_some() {
            self.record_count.fetch_sub(1, Ordering::Relaxed);
            Ok(true)
        } else {
            Ok(false)
        }
    }

    /// Returns the number of records.
    pub fn len(&self) -> u64 {
        self.record_count.load(Ordering::Relaxed)
    }

    /// Returns true if the store holds no records.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns store statistics.
    pub fn stats(&self) -> StoreStats {
        StoreStats {
            records: self.record_count.load(Ordering::Relaxed),
            applies: self.apply_count.load(Ordering::Relaxed),
            commits: self.commit_count.load(Ordering::Relaxed),
            scans: self.scan_count.load(Ordering::Relaxed),
        }
    }

    /// Makes every commit that would change `key` fail with `Write`.
    pub fn fail_writes_for(&self, key: &Key) -> Result<()> {
        write(&self.failing_writes)?.insert(key.clone());
        Ok(())
    }

    /// Undoes [`fail_writes_for`](Self::fail_writes_for) for all keys.
    pub fn clear_write_failures(&self) -> Result<()> {
        write(&self.failing_writes)?.clear();
        Ok(())
    }

    /// Takes the store offline or back online.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }
}

impl RecordStore for MemoryStore {
    fn execute_atomic(
        &self,
        policy: &ApplyPolicy,
        key: &Key,
        module: &str,
        function: &str,
        args: &[Value],
    ) -> Result<Value> {
        let started = Instant::now();
        self.check_available()?;
        self.apply_count.fetch_add(1, Ordering::Relaxed);

        let udf = read(&self.modules)?
            .get(module)
            .cloned()
            .ok_or_else(|| Error::UnknownFunction {
                module: module.to_string(),
                function: function.to_string(),
            })?;

        trace!(key = %key, module, function, timeout = ?policy.timeout, "Atomic call");

        let shard = self.get_shard(key);
        let mut records = write(&shard.records)?;

        let current = records.get(key);
        let mut staged = current.map(|r| r.bins.clone()).unwrap_or_default();
        let result = udf.call(function, &mut staged, args)?;

        if let Some(timeout) = policy.timeout {
            let elapsed = started.elapsed();
            if elapsed > timeout {
                debug!(key = %key, function, ?elapsed, ?timeout, "Atomic call timed out");
                return Err(Error::StoreUnavailable(format!(
                    "{} on {} exceeded its {:?} timeout",
                    function, key, timeout
                )));
            }
        }

        let changed = match current {
            Some(record) => record.bins != staged,
            None => !staged.is_empty(),
        };
        if !changed {
            return Ok(result);
        }

        if read(&self.failing_writes)?.contains(key) {
            return Err(Error::Write(format!("commit rejected for {}", key)));
        }

        match records.get_mut(key) {
            Some(record) => {
                record.bins = staged;
                record.generation = record.generation.wrapping_add(1);
            }
            None => {
                records.insert(
                    key.clone(),
                    Record {
                        bins: staged,
                        generation: 1,
                    },
                );
                self.record_count.fetch_add(1, Ordering::Relaxed);
            }
        }
        self.commit_count.fetch_add(1, Ordering::Relaxed);

        Ok(result)
    }

    fn scan(
        &self,
        policy: &ScanPolicy,
        namespace: &str,
        set: &str,
        callback: &mut dyn FnMut(&Key, &Record) -> ScanAction,
    ) -> Result<u64> {
        self.check_available()?;
        self.scan_count.fetch_add(1, Ordering::Relaxed);

        let mut visited = 0u64;

        for shard in &self.shards {
            let snapshot: Vec<(Key, Record)> = {
                let records = read(&shard.records)?;
                records
                    .iter()
                    .filter(|(k, _)| k.namespace == namespace && k.set == set)
                    .map(|(k, r)| (k.clone(), project(r, &policy.bin_names)))
                    .collect()
            };

            for (key, record) in snapshot {
                if policy
                    .max_records
                    .is_some_and(|max| visited >= max as u64)
                {
                    debug!(visited, "Scan reached max_records");
                    return Ok(visited);
                }

                visited += 1;
                if callback(&key, &record) == ScanAction::Stop {
                    debug!(visited, "Scan stopped by callback");
                    return Ok(visited);
                }
            }
        }

        Ok(visited)
    }
}

/// Keeps only the selected bins (all bins when the selection is empty).
fn project(record: &Record, bin_names: &[String]) -> Record {
    if bin_names.is_empty() {
        return record.clone();
    }
    Record {
        bins: record
            .bins
            .iter()
            .filter(|(name, _)| bin_names.contains(name))
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect(),
        generation: record.generation,
    }
}

fn read<T>(lock: &RwLock<T>) -> Result<RwLockReadGuard<'_, T>> {
    lock.read()
        .map_err(|_| Error::StoreUnavailable("store lock poisoned".to_string()))
}

fn write<T>(lock: &RwLock<T>) -> Result<RwLockWriteGuard<'_, T>> {
    lock.write()
        .map_err(|_| Error::StoreUnavailable("store lock poisoned".to_string()))
}

/// Store statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreStats {
    /// Number of records currently stored
    pub records: u64,
    /// Total atomic calls
    pub applies: u64,
    /// Atomic calls that committed a change
    pub commits: u64,
    /// Total scans
    pub scans: u64,
}
