//! Record Operation Executor
//!
//! [`ExpireBinModule`] is the per-record logic behind every expire-bin call.
//! It is registered with the backing store as a [`UdfModule`] and invoked
//! through `execute_atomic`, so each function below runs against one record
//! as a single atomic unit.
//!
//! ## Functions
//!
//! | function | args                                    | result                    |
//! |----------|-----------------------------------------|---------------------------|
//! | `get`    | bin names                               | list, `Nil` when absent   |
//! | `put`    | bin, value, ttl, create                 | `0`                       |
//! | `puts`   | put maps (`bin`, `val`, `bin_ttl`, `create`) | `0`                  |
//! | `touch`  | touch maps (`bin`, `bin_ttl`)           | `0`                       |
//! | `ttl`    | bin                                     | seconds, `-1`, or `Nil`   |
//! | `clean`  | bin names                               | number of bins purged     |
//!
//! ## Plain vs. managed bins
//!
//! - A new bin is written plain unless `create` is set.
//! - An existing managed bin stays managed whatever `create` says.
//! - An existing plain bin is promoted to managed when `create` is set.
//!
//! Batch functions stage every change on a copy of the bins and write back
//! only when all specs succeed. Nil is never a bin value, and managed values
//! must stay within the codec's nesting limit.

use crate::codec::wire::{nesting_depth, MAX_NESTING_DEPTH};
use crate::codec::{encode, inspect, BinEnvelope, Value, MAGIC};
use crate::config::DEFAULT_MODULE_NAME;
use crate::error::{Error, Result};
use crate::expiration::{
    classify, expiry_from_ttl, remaining_ttl, BinState, Clock, Ttl, NO_EXPIRATION,
};
use crate::store::{Bins, UdfModule};
use std::sync::Arc;
use tracing::trace;

/// Function names understood by the module
pub mod function {
    pub const GET: &str = "get";
    pub const PUT: &str = "put";
    pub const PUTS: &str = "puts";
    pub const TOUCH: &str = "touch";
    pub const TTL: &str = "ttl";
    pub const CLEAN: &str = "clean";
}

/// Result value of a successful mutation.
pub const STATUS_OK: i64 = 0;

/// One entry of a batch put.
#[derive(Debug, Clone, PartialEq)]
pub struct PutSpec {
    pub bin: String,
    pub value: Value,
    /// `None` means no expiration if the bin ends up managed.
    pub ttl_seconds: Option<i64>,
    pub create_as_expiring: bool,
}

impl PutSpec {
    /// Creates or updates an expiring bin.
    pub fn expiring(bin: impl Into<String>, value: impl Into<Value>, ttl_seconds: i64) -> Self {
        Self {
            bin: bin.into(),
            value: value.into(),
            ttl_seconds: Some(ttl_seconds),
            create_as_expiring: true,
        }
    }

    /// Writes a plain bin, or updates an existing expiring bin in place.
    pub fn plain(bin: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            bin: bin.into(),
            value: value.into(),
            ttl_seconds: None,
            create_as_expiring: false,
        }
    }

    pub fn to_value(&self) -> Value {
        let mut pairs = vec![
            (Value::from("bin"), Value::from(self.bin.as_str())),
            (Value::from("val"), self.value.clone()),
            (Value::from("create"), Value::Bool(self.create_as_expiring)),
        ];
        if let Some(ttl) = self.ttl_seconds {
            pairs.push((Value::from("bin_ttl"), Value::Integer(ttl)));
        }
        Value::Map(pairs)
    }

    pub fn from_value(value: &Value) -> Result<Self> {
        let bin = required_str(value, "bin")?;
        let val = value
            .map_get("val")
            .cloned()
            .ok_or_else(|| missing_field("val"))?;
        let ttl_seconds = match value.map_get("bin_ttl") {
            None | Some(Value::Nil) => None,
            Some(v) => Some(integer_arg(v, "bin_ttl")?),
        };
        let create_as_expiring = match value.map_get("create") {
            None => false,
            Some(v) => bool_arg(v, "create")?,
        };

        Ok(Self {
            bin,
            value: val,
            ttl_seconds,
            create_as_expiring,
        })
    }
}

/// One entry of a batch touch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TouchSpec {
    pub bin: String,
    pub ttl_seconds: i64,
}

impl TouchSpec {
    pub fn new(bin: impl Into<String>, ttl_seconds: i64) -> Self {
        Self {
            bin: bin.into(),
            ttl_seconds,
        }
    }

    pub fn to_value(&self) -> Value {
        Value::map([
            (Value::from("bin"), Value::from(self.bin.as_str())),
            (Value::from("bin_ttl"), Value::Integer(self.ttl_seconds)),
        ])
    }

    pub fn from_value(value: &Value) -> Result<Self> {
        let bin = required_str(value, "bin")?;
        let ttl_seconds = value
            .map_get("bin_ttl")
            .ok_or_else(|| missing_field("bin_ttl"))
            .and_then(|v| integer_arg(v, "bin_ttl"))?;
        Ok(Self { bin, ttl_seconds })
    }
}

/// What a stored bin turned out to be.
enum Slot {
    Absent,
    Plain,
    Managed(BinEnvelope),
}

fn slot(bins: &Bins, bin: &str) -> Result<Slot> {
    match bins.get(bin) {
        None => Ok(Slot::Absent),
        Some(stored) => Ok(match inspect(stored)? {
            Some(envelope) => Slot::Managed(envelope),
            None => Slot::Plain,
        }),
    }
}

/// The expire-bin module.
#[derive(Debug, Clone)]
pub struct ExpireBinModule {
    name: String,
    clock: Arc<dyn Clock>,
}

impl ExpireBinModule {
    /// Creates the module under the default name, reading time from `clock`.
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self::with_name(DEFAULT_MODULE_NAME, clock)
    }

    pub fn with_name(name: impl Into<String>, clock: Arc<dyn Clock>) -> Self {
        Self {
            name: name.into(),
            clock,
        }
    }

    /// Reads bins, hiding expired ones. Plain bins are an error.
    pub fn get(&self, bins: &Bins, names: &[String]) -> Result<Vec<Option<Value>>> {
        let now = self.clock.now();
        names
            .iter()
            .map(|name| match slot(bins, name)? {
                Slot::Absent => Ok(None),
                Slot::Plain => Err(Error::invalid_bin(name, "bin is not an expiring bin")),
                Slot::Managed(envelope) => match classify(&envelope, now) {
                    BinState::Expired => Ok(None),
                    BinState::Alive | BinState::Never => Ok(Some(envelope.value)),
                },
            })
            .collect()
    }

    /// Applies one put.
    pub fn put(&self, bins: &mut Bins, spec: &PutSpec) -> Result<()> {
        self.puts(bins, std::slice::from_ref(spec))
    }

    /// Applies every put, or none of them.
    pub fn puts(&self, bins: &mut Bins, specs: &[PutSpec]) -> Result<()> {
        let now = self.clock.now();
        let mut staged = bins.clone();

        for spec in specs {
            if spec.value.is_nil() {
                return Err(Error::InvalidArgument(format!(
                    "bin '{}' cannot hold nil",
                    spec.bin
                )));
            }
            let stored = match slot(&staged, &spec.bin)? {
                Slot::Managed(_) => self.managed(spec, now)?,
                Slot::Absent | Slot::Plain if spec.create_as_expiring => self.managed(spec, now)?,
                Slot::Absent | Slot::Plain => plain(spec)?,
            };
            staged.insert(spec.bin.clone(), stored);
        }

        *bins = staged;
        Ok(())
    }

    fn managed(&self, spec: &PutSpec, now: u64) -> Result<Value> {
        let depth = nesting_depth(&spec.value);
        if depth > MAX_NESTING_DEPTH {
            return Err(Error::InvalidArgument(format!(
                "value for bin '{}' nests {} levels deep, limit is {}",
                spec.bin, depth, MAX_NESTING_DEPTH
            )));
        }
        let expires_at = expiry_from_ttl(spec.ttl_seconds.unwrap_or(NO_EXPIRATION), now)?;
        Ok(encode(&spec.value, expires_at))
    }

    /// Resets the expiration of existing managed bins, or of none of them.
    pub fn touch(&self, bins: &mut Bins, specs: &[TouchSpec]) -> Result<()> {
        let now = self.clock.now();
        let mut staged = bins.clone();

        for spec in specs {
            let envelope = match slot(&staged, &spec.bin)? {
                Slot::Managed(envelope) => envelope,
                Slot::Absent | Slot::Plain => return Err(Error::not_expiring(&spec.bin)),
            };
            let expires_at = expiry_from_ttl(spec.ttl_seconds, now)?;
            staged.insert(spec.bin.clone(), encode(&envelope.value, expires_at));
        }

        *bins = staged;
        Ok(())
    }

    /// Remaining TTL of a visible managed bin.
    pub fn ttl(&self, bins: &Bins, bin: &str) -> Result<Option<Ttl>> {
        match slot(bins, bin)? {
            Slot::Managed(envelope) => Ok(remaining_ttl(&envelope, self.clock.now())),
            Slot::Absent | Slot::Plain => Ok(None),
        }
    }

    /// Deletes the named bins that have expired. Returns how many were removed.
    pub fn clean(&self, bins: &mut Bins, names: &[String]) -> Result<u64> {
        let now = self.clock.now();
        let mut expired = Vec::new();

        for name in names {
            if let Slot::Managed(envelope) = slot(bins, name)? {
                if classify(&envelope, now) == BinState::Expired {
                    expired.push(name);
                }
            }
        }

        for name in &expired {
            bins.remove(name.as_str());
        }
        Ok(expired.len() as u64)
    }
}

impl UdfModule for ExpireBinModule {
    fn name(&self) -> &str {
        &self.name
    }

    fn call(&self, function: &str, bins: &mut Bins, args: &[Value]) -> Result<Value> {
        trace!(function, args = args.len(), "expire_bin call");

        match function {
            function::GET => {
                let names = bin_names(args)?;
                let values = self.get(bins, &names)?;
                Ok(Value::List(
                    values.into_iter().map(|v| v.unwrap_or(Value::Nil)).collect(),
                ))
            }
            function::PUT => {
                let spec = put_args(args)?;
                self.put(bins, &spec)?;
                Ok(Value::Integer(STATUS_OK))
            }
            function::PUTS => {
                let specs = args
                    .iter()
                    .map(PutSpec::from_value)
                    .collect::<Result<Vec<_>>>()?;
                self.puts(bins, &specs)?;
                Ok(Value::Integer(STATUS_OK))
            }
            function::TOUCH => {
                let specs = args
                    .iter()
                    .map(TouchSpec::from_value)
                    .collect::<Result<Vec<_>>>()?;
                self.touch(bins, &specs)?;
                Ok(Value::Integer(STATUS_OK))
            }
            function::TTL => {
                let bin = match args {
                    [bin] => str_arg(bin, "bin")?,
                    _ => return Err(arity(function::TTL, 1, args.len())),
                };
                Ok(self
                    .ttl(bins, &bin)?
                    .map(Ttl::to_value)
                    .unwrap_or(Value::Nil))
            }
            function::CLEAN => {
                let names = bin_names(args)?;
                let purged = self.clean(bins, &names)?;
                Ok(Value::Integer(purged as i64))
            }
            other => Err(Error::UnknownFunction {
                module: self.name.clone(),
                function: other.to_string(),
            }),
        }
    }
}

/// Writes a plain bin, refusing values that would read back as an envelope.
fn plain(spec: &PutSpec) -> Result<Value> {
    if let Value::Blob(data) = &spec.value {
        if data.starts_with(MAGIC) {
            return Err(Error::invalid_bin(
                &spec.bin,
                "plain value collides with the envelope encoding",
            ));
        }
    }
    Ok(spec.value.clone())
}

fn put_args(args: &[Value]) -> Result<PutSpec> {
    match args {
        [bin, value, ttl, create] => Ok(PutSpec {
            bin: str_arg(bin, "bin")?,
            value: value.clone(),
            ttl_seconds: Some(integer_arg(ttl, "bin_ttl")?),
            create_as_expiring: bool_arg(create, "create")?,
        }),
        _ => Err(arity(function::PUT, 4, args.len())),
    }
}

fn bin_names(args: &[Value]) -> Result<Vec<String>> {
    args.iter().map(|v| str_arg(v, "bin")).collect()
}

fn str_arg(value: &Value, field: &str) -> Result<String> {
    match value {
        Value::String(s) if !s.is_empty() => Ok(s.clone()),
        other => Err(Error::InvalidArgument(format!(
            "{} must be a non-empty string, got {}",
            field,
            other.type_name()
        ))),
    }
}

fn integer_arg(value: &Value, field: &str) -> Result<i64> {
    value.as_integer().ok_or_else(|| {
        Error::InvalidArgument(format!(
            "{} must be an integer, got {}",
            field,
            value.type_name()
        ))
    })
}

fn bool_arg(value: &Value, field: &str) -> Result<bool> {
    value.as_bool().ok_or_else(|| {
        Error::InvalidArgument(format!(
            "{} must be a bool, got {}",
            field,
            value.type_name()
        ))
    })
}

fn required_str(map: &Value, field: &str) -> Result<String> {
    map.map_get(field)
        .ok_or_else(|| missing_field(field))
        .and_then(|v| str_arg(v, field))
}

fn missing_field(field: &str) -> Error {
    Error::InvalidArgument(format!("missing field '{}'", field))
}

fn arity(function: &str, expected: usize, got: usize) -> Error {
    Error::InvalidArgument(format!(
        "{} expects {} argument(s), got {}",
        function, expected, got
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{decode, DecodeError, Expiry};
    use crate::expiration::ManualClock;
    use bytes::Bytes;

    fn module(now: u64) -> (ExpireBinModule, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(now));
        (ExpireBinModule::new(clock.clone()), clock)
    }

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn envelope_of(bins: &Bins, bin: &str) -> BinEnvelope {
        decode(&bins[bin]).unwrap()
    }

    #[test]
    fn test_put_creates_expiring_bin() {
        let (m, _) = module(100);
        let mut bins = Bins::new();

        m.put(&mut bins, &PutSpec::expiring("B", "hello", 5)).unwrap();

        let envelope = envelope_of(&bins, "B");
        assert_eq!(envelope.value, Value::from("hello"));
        assert_eq!(envelope.expires_at, Expiry::At(105));
    }

    #[test]
    fn test_put_never_expiring() {
        let (m, _) = module(100);
        let mut bins = Bins::new();

        m.put(&mut bins, &PutSpec::expiring("B", "x", -1)).unwrap();
        assert_eq!(envelope_of(&bins, "B").expires_at, Expiry::Never);
    }

    #[test]
    fn test_put_without_create_writes_plain_bin() {
        let (m, _) = module(100);
        let mut bins = Bins::new();

        m.put(&mut bins, &PutSpec::plain("P", "raw")).unwrap();
        assert_eq!(bins["P"], Value::from("raw"));
        assert_eq!(m.ttl(&bins, "P").unwrap(), None);
    }

    #[test]
    fn test_put_never_demotes_managed_bin() {
        let (m, clock) = module(100);
        let mut bins = Bins::new();
        m.put(&mut bins, &PutSpec::expiring("B", "v1", 10)).unwrap();

        clock.advance(20); // now expired
        let spec = PutSpec {
            ttl_seconds: Some(30),
            ..PutSpec::plain("B", "v2")
        };
        m.put(&mut bins, &spec).unwrap();

        let envelope = envelope_of(&bins, "B");
        assert_eq!(envelope.value, Value::from("v2"));
        assert_eq!(envelope.expires_at, Expiry::At(150));
    }

    #[test]
    fn test_put_promotes_plain_bin() {
        let (m, _) = module(100);
        let mut bins = Bins::new();
        bins.insert("P".to_string(), Value::from("raw"));

        m.put(&mut bins, &PutSpec::expiring("P", "now managed", 7)).unwrap();
        assert_eq!(envelope_of(&bins, "P").expires_at, Expiry::At(107));
    }

    #[test]
    fn test_put_updates_plain_bin_in_place() {
        let (m, _) = module(100);
        let mut bins = Bins::new();
        bins.insert("P".to_string(), Value::from("raw"));

        m.put(&mut bins, &PutSpec::plain("P", 42)).unwrap();
        assert_eq!(bins["P"], Value::from(42));
    }

    #[test]
    fn test_put_rejects_bad_ttl() {
        let (m, _) = module(100);
        let mut bins = Bins::new();
        let err = m.put(&mut bins, &PutSpec::expiring("B", "x", -7)).unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
        assert!(bins.is_empty());
    }

    #[test]
    fn test_plain_write_cannot_alias_envelope() {
        let (m, _) = module(100);
        let mut bins = Bins::new();
        let forged = encode(&Value::from("x"), Expiry::Never);

        let err = m.put(&mut bins, &PutSpec::plain("P", forged)).unwrap_err();
        assert!(matches!(err, Error::InvalidBin { .. }));

        let corrupt = Value::blob(Bytes::from_static(b"\xEBbin1garbage"));
        let err = m.put(&mut bins, &PutSpec::plain("P", corrupt)).unwrap_err();
        assert!(matches!(err, Error::InvalidBin { .. }));
    }

    fn nested(levels: usize) -> Value {
        (0..levels).fold(Value::from("leaf"), |v, _| Value::list(vec![v]))
    }

    #[test]
    fn test_put_rejects_value_too_deep_to_decode() {
        let (m, _) = module(100);
        let mut bins = Bins::new();
        m.put(&mut bins, &PutSpec::expiring("B", "keep", 10)).unwrap();
        let before = bins.clone();

        let err = m
            .put(&mut bins, &PutSpec::expiring("B", nested(MAX_NESTING_DEPTH + 1), 100))
            .unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
        assert_eq!(bins, before);

        let err = m
            .puts(
                &mut bins,
                &[
                    PutSpec::expiring("A", "fine", 10),
                    PutSpec::expiring("C", nested(40), 10),
                ],
            )
            .unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
        assert_eq!(bins, before);

        // The bin stays usable.
        assert_eq!(
            m.get(&bins, &names(&["B"])).unwrap(),
            vec![Some(Value::from("keep"))]
        );
    }

    #[test]
    fn test_put_accepts_value_at_nesting_limit() {
        let (m, _) = module(100);
        let mut bins = Bins::new();
        let value = nested(MAX_NESTING_DEPTH);

        m.put(&mut bins, &PutSpec::expiring("B", value.clone(), 10)).unwrap();
        assert_eq!(m.get(&bins, &names(&["B"])).unwrap(), vec![Some(value)]);
    }

    #[test]
    fn test_put_rejects_nil_value() {
        let (m, _) = module(100);
        let mut bins = Bins::new();

        let err = m.put(&mut bins, &PutSpec::expiring("B", Value::Nil, -1)).unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
        let err = m.put(&mut bins, &PutSpec::plain("P", Value::Nil)).unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
        assert!(bins.is_empty());

        let err = m
            .puts(
                &mut bins,
                &[PutSpec::expiring("A", 1, 5), PutSpec::expiring("B", Value::Nil, 5)],
            )
            .unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
        assert!(bins.is_empty());
        assert_eq!(m.ttl(&bins, "B").unwrap(), None);
    }

    #[test]
    fn test_get_hides_expired_bins() {
        let (m, clock) = module(0);
        let mut bins = Bins::new();
        m.puts(
            &mut bins,
            &[
                PutSpec::expiring("A", "short", 5),
                PutSpec::expiring("B", "forever", -1),
            ],
        )
        .unwrap();

        clock.set(3);
        assert_eq!(
            m.get(&bins, &names(&["A", "B", "missing"])).unwrap(),
            vec![Some(Value::from("short")), Some(Value::from("forever")), None]
        );

        clock.set(5);
        assert_eq!(
            m.get(&bins, &names(&["A", "B"])).unwrap(),
            vec![None, Some(Value::from("forever"))]
        );
        // Reads never delete.
        assert!(bins.contains_key("A"));
    }

    #[test]
    fn test_get_plain_bin_is_invalid() {
        let (m, _) = module(0);
        let mut bins = Bins::new();
        bins.insert("P".to_string(), Value::from("raw"));

        let err = m.get(&bins, &names(&["P"])).unwrap_err();
        assert!(matches!(err, Error::InvalidBin { ref bin, .. } if bin == "P"));
    }

    #[test]
    fn test_get_corrupt_envelope_is_decode_error() {
        let (m, _) = module(0);
        let mut bins = Bins::new();
        bins.insert(
            "C".to_string(),
            Value::blob(Bytes::from_static(b"\xEBbin1:oops\r\n")),
        );

        let err = m.get(&bins, &names(&["C"])).unwrap_err();
        assert!(matches!(err, Error::Decode(DecodeError::InvalidInteger(_))));
    }

    #[test]
    fn test_puts_is_all_or_nothing() {
        let (m, _) = module(0);
        let mut bins = Bins::new();
        bins.insert(
            "C".to_string(),
            Value::blob(Bytes::from_static(b"\xEBbin1:1\r\n")),
        );
        let before = bins.clone();

        let err = m
            .puts(
                &mut bins,
                &[
                    PutSpec::expiring("A", "x", 10),
                    PutSpec::expiring("C", "y", 10),
                ],
            )
            .unwrap_err();

        assert!(matches!(err, Error::Decode(_)));
        assert_eq!(bins, before);
    }

    #[test]
    fn test_puts_later_spec_sees_earlier_one() {
        let (m, _) = module(0);
        let mut bins = Bins::new();

        m.puts(
            &mut bins,
            &[PutSpec::expiring("A", "first", 10), PutSpec::plain("A", "second")],
        )
        .unwrap();

        // The second spec updates the bin the first one made expiring.
        let envelope = envelope_of(&bins, "A");
        assert_eq!(envelope.value, Value::from("second"));
        assert_eq!(envelope.expires_at, Expiry::Never);
    }

    #[test]
    fn test_touch_extends_expired_bin() {
        let (m, clock) = module(0);
        let mut bins = Bins::new();
        m.put(&mut bins, &PutSpec::expiring("A", "x", 5)).unwrap();

        clock.set(10);
        assert_eq!(m.get(&bins, &names(&["A"])).unwrap(), vec![None]);

        m.touch(&mut bins, &[TouchSpec::new("A", 20)]).unwrap();
        assert_eq!(envelope_of(&bins, "A").expires_at, Expiry::At(30));
        assert_eq!(
            m.get(&bins, &names(&["A"])).unwrap(),
            vec![Some(Value::from("x"))]
        );
    }

    #[test]
    fn test_touch_aborts_whole_batch() {
        let (m, _) = module(0);
        let mut bins = Bins::new();
        m.put(&mut bins, &PutSpec::expiring("A", "x", 5)).unwrap();
        bins.insert("P".to_string(), Value::from("plain"));
        let before = bins.clone();

        let err = m
            .touch(&mut bins, &[TouchSpec::new("A", 100), TouchSpec::new("P", 100)])
            .unwrap_err();
        assert!(matches!(err, Error::NotExpiringBin { ref bin } if bin == "P"));
        assert_eq!(bins, before);

        let err = m.touch(&mut bins, &[TouchSpec::new("missing", 1)]).unwrap_err();
        assert!(matches!(err, Error::NotExpiringBin { .. }));
    }

    #[test]
    fn test_ttl() {
        let (m, clock) = module(0);
        let mut bins = Bins::new();
        m.puts(
            &mut bins,
            &[PutSpec::expiring("A", "x", 10), PutSpec::expiring("B", "y", -1)],
        )
        .unwrap();

        assert_eq!(m.ttl(&bins, "A").unwrap(), Some(Ttl::Remaining(10)));
        assert_eq!(m.ttl(&bins, "B").unwrap(), Some(Ttl::Never));
        assert_eq!(m.ttl(&bins, "missing").unwrap(), None);

        clock.set(10);
        assert_eq!(m.ttl(&bins, "A").unwrap(), None);
    }

    #[test]
    fn test_clean_purges_only_expired() {
        let (m, clock) = module(0);
        let mut bins = Bins::new();
        m.puts(
            &mut bins,
            &[
                PutSpec::expiring("A", 1, 5),
                PutSpec::expiring("B", 2, 50),
                PutSpec::expiring("C", 3, -1),
            ],
        )
        .unwrap();
        bins.insert("P".to_string(), Value::from("plain"));

        clock.set(6);
        let purged = m
            .clean(&mut bins, &names(&["A", "B", "C", "P", "missing"]))
            .unwrap();
        assert_eq!(purged, 1);
        assert!(!bins.contains_key("A"));
        assert!(bins.contains_key("B"));
        assert!(bins.contains_key("C"));
        assert_eq!(bins["P"], Value::from("plain"));

        // Idempotent.
        let snapshot = bins.clone();
        assert_eq!(m.clean(&mut bins, &names(&["A", "B", "C", "P"])).unwrap(), 0);
        assert_eq!(bins, snapshot);
    }

    #[test]
    fn test_clean_only_touches_named_bins() {
        let (m, clock) = module(0);
        let mut bins = Bins::new();
        m.puts(
            &mut bins,
            &[PutSpec::expiring("A", 1, 1), PutSpec::expiring("B", 2, 1)],
        )
        .unwrap();

        clock.set(2);
        assert_eq!(m.clean(&mut bins, &names(&["A"])).unwrap(), 1);
        assert!(bins.contains_key("B"));
    }

    #[test]
    fn test_call_dispatch() {
        let (m, _) = module(0);
        let mut bins = Bins::new();

        let status = m
            .call(
                function::PUT,
                &mut bins,
                &["B".into(), "hello".into(), 5.into(), true.into()],
            )
            .unwrap();
        assert_eq!(status, Value::Integer(STATUS_OK));

        let got = m.call(function::GET, &mut bins, &["B".into(), "X".into()]).unwrap();
        assert_eq!(got, Value::list(vec!["hello".into(), Value::Nil]));

        let ttl = m.call(function::TTL, &mut bins, &["B".into()]).unwrap();
        assert_eq!(ttl, Value::Integer(5));

        let status = m
            .call(function::TOUCH, &mut bins, &[TouchSpec::new("B", -1).to_value()])
            .unwrap();
        assert_eq!(status, Value::Integer(STATUS_OK));
        let ttl = m.call(function::TTL, &mut bins, &["B".into()]).unwrap();
        assert_eq!(ttl, Value::Integer(-1));

        let purged = m.call(function::CLEAN, &mut bins, &["B".into()]).unwrap();
        assert_eq!(purged, Value::Integer(0));
    }

    #[test]
    fn test_call_rejects_bad_arguments() {
        let (m, _) = module(0);
        let mut bins = Bins::new();

        assert!(matches!(
            m.call(function::PUT, &mut bins, &["B".into()]),
            Err(Error::InvalidArgument(_))
        ));
        assert!(matches!(
            m.call(function::GET, &mut bins, &[1.into()]),
            Err(Error::InvalidArgument(_))
        ));
        assert!(matches!(
            m.call(function::PUTS, &mut bins, &[Value::map([("val", 1)])]),
            Err(Error::InvalidArgument(_))
        ));
        assert!(matches!(
            m.call("drop_all", &mut bins, &[]),
            Err(Error::UnknownFunction { .. })
        ));
        assert!(bins.is_empty());
    }

    #[test]
    fn test_put_spec_value_round_trip() {
        let spec = PutSpec::expiring("A", Value::list(vec![1.into()]), 10);
        assert_eq!(PutSpec::from_value(&spec.to_value()).unwrap(), spec);

        let spec = PutSpec::plain("B", "x");
        assert_eq!(PutSpec::from_value(&spec.to_value()).unwrap(), spec);

        let touch = TouchSpec::new("A", 3);
        assert_eq!(TouchSpec::from_value(&touch.to_value()).unwrap(), touch);
    }

    #[test]
    fn test_put_spec_defaults() {
        // Maps without `create` or `bin_ttl` write plain bins.
        let spec = PutSpec::from_value(&Value::map([("bin", "A"), ("val", "x")])).unwrap();
        assert_eq!(spec, PutSpec::plain("A", "x"));
    }
}
