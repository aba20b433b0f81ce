//! Callable Registry
//!
//! Session-scoped accumulator keyed by function identity. Registration is
//! idempotent, and the tested flag only ever goes from `false` to `true`,
//! so concurrent marks need no lock beyond the atomic.

use crate::reflect::CallableKind;
use crate::runtime::FunctionId;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

/// Where a callable comes from (reporting only)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Origin {
    /// Dotted module name
    pub module: String,
    /// Module source file
    pub path: Option<PathBuf>,
    /// Definition line
    pub line: Option<u32>,
}

/// One discovered callable and its coverage state
#[derive(Debug)]
pub struct CallableRecord {
    id: FunctionId,
    qualified_name: String,
    qualname: String,
    kind: CallableKind,
    origin: Origin,
    tested: AtomicBool,
    direct_callers: Mutex<BTreeSet<String>>,
}

impl CallableRecord {
    /// Create an untested record
    #[must_use]
    pub fn new(id: FunctionId, qualname: &str, kind: CallableKind, origin: Origin) -> Self {
        Self {
            id,
            qualified_name: format!("{}.{qualname}", origin.module),
            qualname: qualname.to_string(),
            kind,
            origin,
            tested: AtomicBool::new(false),
            direct_callers: Mutex::new(BTreeSet::new()),
        }
    }

    /// Function identity
    #[must_use]
    pub fn id(&self) -> FunctionId {
        self.id
    }

    /// Dot-path from the project root, e.g. `pkg.mod.Class.method`
    #[must_use]
    pub fn qualified_name(&self) -> &str {
        &self.qualified_name
    }

    /// Name relative to the module, e.g. `Class.method`
    #[must_use]
    pub fn qualname(&self) -> &str {
        &self.qualname
    }

    /// Callable kind
    #[must_use]
    pub fn kind(&self) -> CallableKind {
        self.kind
    }

    /// Origin
    #[must_use]
    pub fn origin(&self) -> &Origin {
        &self.origin
    }

    /// Whether a test has invoked this callable directly
    #[must_use]
    pub fn is_tested(&self) -> bool {
        self.tested.load(Ordering::Acquire)
    }

    /// Names of the tests that invoked this callable directly
    #[must_use]
    pub fn direct_callers(&self) -> Vec<String> {
        self.direct_callers.lock().iter().cloned().collect()
    }

    /// Set the tested flag; returns whether this call flipped it
    fn mark(&self, caller: &str) -> bool {
        let _ = self.direct_callers.lock().insert(caller.to_string());
        !self.tested.swap(true, Ordering::AcqRel)
    }
}

#[derive(Debug, Default)]
struct RegistryInner {
    records: Vec<Arc<CallableRecord>>,
    index: HashMap<FunctionId, usize>,
}

/// Mapping from function identity to its record, in registration order
#[derive(Debug, Default)]
pub struct Registry {
    inner: RwLock<RegistryInner>,
}

impl Registry {
    /// Create an empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a record unless its identity is already known
    ///
    /// Returns whether the record was inserted.
    pub fn register(&self, record: CallableRecord) -> bool {
        let mut inner = self.inner.write();
        if inner.index.contains_key(&record.id) {
            return false;
        }
        debug!(
            name = record.qualified_name(),
            kind = %record.kind,
            "registered callable"
        );
        let position = inner.records.len();
        let _ = inner.index.insert(record.id, position);
        inner.records.push(Arc::new(record));
        true
    }

    /// Mark a callable as directly tested by `caller`
    ///
    /// Unknown identities are logged and ignored. Returns whether the flag
    /// flipped on this call.
    pub fn mark_tested(&self, id: FunctionId, caller: &str) -> bool {
        let Some(record) = self.get(id) else {
            warn!(%id, caller, "mark_tested on unregistered callable");
            return false;
        };
        record.mark(caller)
    }

    /// Whether `id` is registered
    #[must_use]
    pub fn contains(&self, id: FunctionId) -> bool {
        self.inner.read().index.contains_key(&id)
    }

    /// Look up a record
    #[must_use]
    pub fn get(&self, id: FunctionId) -> Option<Arc<CallableRecord>> {
        let inner = self.inner.read();
        inner.index.get(&id).map(|&i| Arc::clone(&inner.records[i]))
    }

    /// Look up a record by qualified name
    #[must_use]
    pub fn find(&self, qualified_name: &str) -> Option<Arc<CallableRecord>> {
        self.inner
            .read()
            .records
            .iter()
            .find(|r| r.qualified_name == qualified_name)
            .cloned()
    }

    /// All records, in registration order
    #[must_use]
    pub fn records(&self) -> Vec<Arc<CallableRecord>> {
        self.inner.read().records.clone()
    }

    /// Number of registered callables
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.read().records.len()
    }

    /// Whether nothing is registered
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of records marked tested
    #[must_use]
    pub fn tested_count(&self) -> usize {
        self.inner
            .read()
            .records
            .iter()
            .filter(|r| r.is_tested())
            .count()
    }
}
