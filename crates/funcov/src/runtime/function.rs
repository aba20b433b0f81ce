//! Function objects and their identity.

use super::frames::{self, Frame};
use super::{CallArgs, CallError, Value};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

static NEXT_FUNCTION_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of a function object
///
/// Allocated once per object; every alias of the object shares it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FunctionId(u64);

impl FunctionId {
    pub(crate) fn next() -> Self {
        Self(NEXT_FUNCTION_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the inner value
    #[inline]
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for FunctionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "fn#{}", self.0)
    }
}

/// Parameter names of a callable
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    /// Parameter names, in declaration order
    pub params: Vec<String>,
}

impl Signature {
    /// Create a signature from parameter names
    #[must_use]
    pub fn new<I, S>(params: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            params: params.into_iter().map(Into::into).collect(),
        }
    }

    /// Number of declared parameters
    #[must_use]
    pub fn arity(&self) -> usize {
        self.params.len()
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({})", self.params.join(", "))
    }
}

/// Where a callable is defined
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    /// Source file
    pub file: Option<PathBuf>,
    /// Line number (1-indexed)
    pub line: Option<u32>,
}

impl Location {
    /// Create a location
    #[must_use]
    pub fn new(file: impl Into<PathBuf>, line: u32) -> Self {
        Self {
            file: Some(file.into()),
            line: Some(line),
        }
    }
}

/// The code behind a function object
pub type FunctionBody = Arc<dyn Fn(CallArgs) -> Result<Value, CallError> + Send + Sync>;

/// Observes every invocation of an instrumented function
///
/// Called after the callee's frame is pushed, before its body runs.
/// `caller` is the frame directly beneath the callee's own.
pub trait CallObserver: Send + Sync {
    /// Handle one invocation
    fn on_call(&self, callee: FunctionId, caller: Option<&Frame>);
}

/// Why an observer could not be installed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallError {
    /// Native functions cannot be instrumented
    Native,
    /// Another observer is already installed
    AlreadyObserved,
}

impl fmt::Display for InstallError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Native => write!(f, "native functions cannot be instrumented"),
            Self::AlreadyObserved => write!(f, "already instrumented by another observer"),
        }
    }
}

struct FunctionInner {
    id: FunctionId,
    name: Arc<str>,
    qualname: String,
    module: Arc<str>,
    signature: Signature,
    location: Location,
    native: bool,
    body: FunctionBody,
    observer: RwLock<Option<Arc<dyn CallObserver>>>,
}

/// A shared function object
///
/// Clones are aliases: same identity, same body, same instrumentation.
#[derive(Clone)]
pub struct FunctionObject(Arc<FunctionInner>);

impl fmt::Debug for FunctionObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionObject")
            .field("id", &self.0.id)
            .field("qualified_name", &self.qualified_name())
            .field("signature", &self.0.signature)
            .field("native", &self.0.native)
            .field("instrumented", &self.is_instrumented())
            .finish()
    }
}

impl FunctionObject {
    /// Create a function defined in `module` under `qualname`
    pub fn new<F>(module: impl Into<String>, qualname: impl Into<String>, body: F) -> Self
    where
        F: Fn(CallArgs) -> Result<Value, CallError> + Send + Sync + 'static,
    {
        Self::builder(module, qualname, body).build()
    }

    /// Start building a function object
    pub fn builder<F>(
        module: impl Into<String>,
        qualname: impl Into<String>,
        body: F,
    ) -> FunctionBuilder
    where
        F: Fn(CallArgs) -> Result<Value, CallError> + Send + Sync + 'static,
    {
        FunctionBuilder {
            module: module.into(),
            qualname: qualname.into(),
            signature: Signature::default(),
            location: Location::default(),
            native: false,
            body: Arc::new(body),
        }
    }

    /// Identity shared by all aliases
    #[must_use]
    pub fn id(&self) -> FunctionId {
        self.0.id
    }

    /// Unqualified name
    #[must_use]
    pub fn name(&self) -> &str {
        &self.0.name
    }

    /// Name relative to the module, e.g. `Class.method`
    #[must_use]
    pub fn qualname(&self) -> &str {
        &self.0.qualname
    }

    /// Dotted name of the defining module
    #[must_use]
    pub fn module(&self) -> &str {
        &self.0.module
    }

    /// `module.qualname`
    #[must_use]
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.0.module, self.0.qualname)
    }

    /// Declared parameters
    #[must_use]
    pub fn signature(&self) -> &Signature {
        &self.0.signature
    }

    /// Source location
    #[must_use]
    pub fn location(&self) -> &Location {
        &self.0.location
    }

    /// Whether this is a native (builtin) function
    #[must_use]
    pub fn is_native(&self) -> bool {
        self.0.native
    }

    /// Whether an observer is installed
    #[must_use]
    pub fn is_instrumented(&self) -> bool {
        self.0.observer.read().is_some()
    }

    /// Check whether two handles are aliases of one object
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Invoke the function
    ///
    /// Pushes this function's frame for the duration of the call, notifies
    /// the installed observer (if any), then runs the body. The body's
    /// result, including a raised error, is returned unchanged.
    pub fn call(&self, args: CallArgs) -> Result<Value, CallError> {
        let inner = &self.0;
        let _frame = frames::enter(Frame::function(
            inner.id,
            Arc::clone(&inner.name),
            Arc::clone(&inner.module),
        ));
        let observer = inner.observer.read().clone();
        if let Some(observer) = observer {
            let caller = frames::caller();
            observer.on_call(inner.id, caller.as_ref());
        }
        (inner.body)(args)
    }

    /// Install an observer on this function and all its aliases
    pub fn install_observer(&self, observer: Arc<dyn CallObserver>) -> Result<(), InstallError> {
        if self.0.native {
            return Err(InstallError::Native);
        }
        let mut slot = self.0.observer.write();
        if slot.is_some() {
            return Err(InstallError::AlreadyObserved);
        }
        *slot = Some(observer);
        Ok(())
    }

    /// Remove `observer` if it is the one installed
    ///
    /// Returns whether it was removed.
    pub fn remove_observer(&self, observer: &Arc<dyn CallObserver>) -> bool {
        let mut slot = self.0.observer.write();
        match slot.as_ref() {
            Some(current) if same_observer(current, observer) => {
                *slot = None;
                true
            }
            _ => false,
        }
    }

    /// Whether `observer` is the one installed
    #[must_use]
    pub fn is_observed_by(&self, observer: &Arc<dyn CallObserver>) -> bool {
        self.0
            .observer
            .read()
            .as_ref()
            .is_some_and(|current| same_observer(current, observer))
    }
}

// Compare data pointers only; vtable pointers for one type may differ
// between codegen units.
fn same_observer(a: &Arc<dyn CallObserver>, b: &Arc<dyn CallObserver>) -> bool {
    std::ptr::eq(
        Arc::as_ptr(a).cast::<()>(),
        Arc::as_ptr(b).cast::<()>(),
    )
}

/// Builder for [`FunctionObject`]
pub struct FunctionBuilder {
    module: String,
    qualname: String,
    signature: Signature,
    location: Location,
    native: bool,
    body: FunctionBody,
}

impl fmt::Debug for FunctionBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionBuilder")
            .field("module", &self.module)
            .field("qualname", &self.qualname)
            .finish()
    }
}

impl FunctionBuilder {
    /// Set the declared parameters
    #[must_use]
    pub fn signature(mut self, signature: Signature) -> Self {
        self.signature = signature;
        self
    }

    /// Set the source location
    #[must_use]
    pub fn location(mut self, location: Location) -> Self {
        self.location = location;
        self
    }

    /// Mark as a native (builtin) function
    #[must_use]
    pub fn native(mut self) -> Self {
        self.native = true;
        self
    }

    /// Build the function object
    #[must_use]
    pub fn build(self) -> FunctionObject {
        let name = self
            .qualname
            .rsplit('.')
            .next()
            .unwrap_or(self.qualname.as_str())
            .to_string();
        FunctionObject(Arc::new(FunctionInner {
            id: FunctionId::next(),
            name: Arc::from(name),
            qualname: self.qualname,
            module: Arc::from(self.module),
            signature: self.signature,
            location: self.location,
            native: self.native,
            body: self.body,
            observer: RwLock::new(None),
        }))
    }
}
