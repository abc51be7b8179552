//! Client Façade
//!
//! [`ExpireBin`] is the public entry point. It marshals arguments, calls the
//! registered module through the store's atomic facility, and turns results
//! back into typed values. It holds nothing but the store handle and an
//! immutable policy, so one instance can be shared by any number of callers.
//!
//! ## Example
//!
//! ```
//! use binttl::{ExpireBin, ExpireBinModule, MemoryStore, SystemClock};
//! use binttl::store::Key;
//! use binttl::codec::Value;
//! use std::sync::Arc;
//!
//! let store = Arc::new(MemoryStore::new());
//! store.register(Arc::new(ExpireBinModule::new(Arc::new(SystemClock)))).unwrap();
//!
//! let client = ExpireBin::new(store);
//! let key = Key::new("test", "expireBin", "eb1");
//!
//! client.put(&key, "TestBin", "Hello World", 60, true).unwrap();
//! let values = client.get(&key, &["TestBin"]).unwrap();
//! assert_eq!(values, vec![Some(Value::from("Hello World"))]);
//! ```

use crate::codec::Value;
use crate::config::{ApplyPolicy, ExpireBinConfig, ScanPolicy};
use crate::error::{Error, Result};
use crate::executor::{function, PutSpec, TouchSpec, STATUS_OK};
use crate::expiration::Ttl;
use crate::store::{Key, RecordStore};
use crate::sweep::{ExpirySweeper, SweepCoordinator, SweepReport, SweepTarget};
use std::sync::Arc;
use tokio::sync::watch;

/// Per-bin expiration client.
#[derive(Clone)]
pub struct ExpireBin {
    store: Arc<dyn RecordStore>,
    config: ExpireBinConfig,
}

impl std::fmt::Debug for ExpireBin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExpireBin")
            .field("config", &self.config)
            .finish()
    }
}

impl ExpireBin {
    /// Creates a client with the default configuration.
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self::with_config(store, ExpireBinConfig::default())
    }

    pub fn with_config(store: Arc<dyn RecordStore>, config: ExpireBinConfig) -> Self {
        Self { store, config }
    }

    pub fn policy(&self) -> &ApplyPolicy {
        &self.config.policy
    }

    fn apply(&self, key: &Key, function: &str, args: &[Value]) -> Result<Value> {
        self.store
            .execute_atomic(&self.config.policy, key, &self.config.module, function, args)
    }

    /// Reads bins. Expired and absent bins come back as `None`, in the order
    /// the names were given.
    pub fn get(&self, key: &Key, bins: &[&str]) -> Result<Vec<Option<Value>>> {
        let args: Vec<Value> = bins.iter().map(|b| Value::from(*b)).collect();
        let result = self.apply(key, function::GET, &args)?;

        let values = result
            .into_list()
            .ok_or_else(|| Error::UnexpectedResponse("get did not return a list".to_string()))?;
        if values.len() != bins.len() {
            return Err(Error::UnexpectedResponse(format!(
                "get returned {} value(s) for {} bin(s)",
                values.len(),
                bins.len()
            )));
        }

        Ok(values
            .into_iter()
            .map(|v| if v.is_nil() { None } else { Some(v) })
            .collect())
    }

    /// Creates or updates one bin.
    ///
    /// `ttl_seconds` is `-1` for no expiration. With `create_as_expiring`
    /// unset, new bins are written plain but existing expiring bins are still
    /// updated as expiring bins.
    pub fn put(
        &self,
        key: &Key,
        bin: &str,
        value: impl Into<Value>,
        ttl_seconds: i64,
        create_as_expiring: bool,
    ) -> Result<()> {
        let args = [
            Value::from(bin),
            value.into(),
            Value::Integer(ttl_seconds),
            Value::Bool(create_as_expiring),
        ];
        expect_status(self.apply(key, function::PUT, &args)?)
    }

    /// Applies several puts to one record, all or nothing.
    pub fn puts(&self, key: &Key, specs: &[PutSpec]) -> Result<()> {
        let args: Vec<Value> = specs.iter().map(PutSpec::to_value).collect();
        expect_status(self.apply(key, function::PUTS, &args)?)
    }

    /// Resets the TTL of existing expiring bins, all or nothing.
    pub fn touch(&self, key: &Key, specs: &[TouchSpec]) -> Result<()> {
        let args: Vec<Value> = specs.iter().map(TouchSpec::to_value).collect();
        expect_status(self.apply(key, function::TOUCH, &args)?)
    }

    /// Remaining TTL of a bin. `None` for absent, plain, and expired bins.
    pub fn ttl(&self, key: &Key, bin: &str) -> Result<Option<Ttl>> {
        let result = self.apply(key, function::TTL, &[Value::from(bin)])?;
        Ttl::from_value(&result)
    }

    /// Sweeps a namespace/set and removes expired bins among `bins`.
    pub fn clean(
        &self,
        scan: &ScanPolicy,
        namespace: &str,
        set: &str,
        bins: &[&str],
    ) -> Result<SweepReport> {
        let bins: Vec<String> = bins.iter().map(|b| b.to_string()).collect();
        self.sweeper().sweep(scan, namespace, set, &bins)
    }

    /// Like [`clean`](Self::clean), but stops once `cancel` reads `true`.
    pub fn clean_until(
        &self,
        scan: &ScanPolicy,
        namespace: &str,
        set: &str,
        bins: &[&str],
        cancel: &watch::Receiver<bool>,
    ) -> Result<SweepReport> {
        let bins: Vec<String> = bins.iter().map(|b| b.to_string()).collect();
        self.sweeper().sweep_until(scan, namespace, set, &bins, cancel)
    }

    /// A sweep coordinator sharing this client's store and policy.
    pub fn sweeper(&self) -> SweepCoordinator {
        SweepCoordinator::new(
            Arc::clone(&self.store),
            self.config.module.clone(),
            self.config.policy.clone(),
        )
    }

    /// Starts periodic background sweeps of `target`.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start_sweeper(&self, target: SweepTarget) -> ExpirySweeper {
        ExpirySweeper::start(Arc::new(self.sweeper()), target, self.config.sweep.clone())
    }
}

fn expect_status(result: Value) -> Result<()> {
    match result {
        Value::Integer(STATUS_OK) => Ok(()),
        Value::Integer(code) => Err(Error::Write(format!("operation returned status {}", code))),
        other => Err(Error::UnexpectedResponse(format!(
            "expected status, got {}",
            other
        ))),
    }
}
