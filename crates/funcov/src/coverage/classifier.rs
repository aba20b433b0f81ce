//! Call Classifier
//!
//! Decides, for each instrumented invocation, whether the immediate caller
//! is a test. Only the frame directly beneath the callee counts: a test
//! calling a helper that calls the target attributes the target to the
//! helper, not to the test.

use super::Registry;
use crate::runtime::{CallObserver, Frame, FunctionId};
use parking_lot::RwLock;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use tracing::trace;

/// Recognizes test functions by their frame
pub trait TestPredicate: Send + Sync {
    /// Whether `frame` belongs to a test function
    fn is_test(&self, frame: &Frame) -> bool;
}

impl<F> TestPredicate for F
where
    F: Fn(&Frame) -> bool + Send + Sync,
{
    fn is_test(&self, frame: &Frame) -> bool {
        self(frame)
    }
}

/// Test functions are those whose name starts with a prefix
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamePrefix {
    prefix: String,
}

impl NamePrefix {
    /// Create a prefix predicate
    #[must_use]
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }
}

impl Default for NamePrefix {
    fn default() -> Self {
        Self::new("test")
    }
}

impl TestPredicate for NamePrefix {
    fn is_test(&self, frame: &Frame) -> bool {
        frame.name.starts_with(&self.prefix)
    }
}

/// Outcome of classifying one invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attribution {
    /// Called directly by a test
    DirectFromTest,
    /// Nothing beneath the callee (host code, interactive use)
    NoCaller,
    /// Caller does not look like a test
    NotATest,
    /// Caller is itself a tracked callable
    CallerTracked,
    /// Caller's module was never collected as a test module
    UncollectedOrigin,
}

/// Classifies invocations and marks directly tested callables
pub struct Classifier {
    registry: Arc<Registry>,
    predicate: Box<dyn TestPredicate>,
    require_collected_origin: bool,
    collected: RwLock<HashSet<String>>,
}

impl fmt::Debug for Classifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Classifier")
            .field("require_collected_origin", &self.require_collected_origin)
            .field("collected", &self.collected.read().len())
            .finish()
    }
}

impl Classifier {
    /// Create a classifier feeding `registry`
    #[must_use]
    pub fn new(registry: Arc<Registry>, predicate: Box<dyn TestPredicate>) -> Self {
        Self {
            registry,
            predicate,
            require_collected_origin: false,
            collected: RwLock::new(HashSet::new()),
        }
    }

    /// Only accept callers from modules registered via [`Self::collect_module`]
    #[must_use]
    pub fn require_collected_origin(mut self, enabled: bool) -> Self {
        self.require_collected_origin = enabled;
        self
    }

    /// Register a module from which test calls may originate
    pub fn collect_module(&self, module: &str) {
        let _ = self.collected.write().insert(module.to_string());
    }

    /// Whether `module` was collected
    #[must_use]
    pub fn is_collected(&self, module: &str) -> bool {
        self.collected.read().contains(module)
    }

    /// Classify one invocation without recording it
    #[must_use]
    pub fn classify(&self, caller: Option<&Frame>) -> Attribution {
        let Some(caller) = caller else {
            return Attribution::NoCaller;
        };
        if caller.function.is_some_and(|id| self.registry.contains(id)) {
            return Attribution::CallerTracked;
        }
        if !self.predicate.is_test(caller) {
            return Attribution::NotATest;
        }
        if self.require_collected_origin && !self.is_collected(&caller.module) {
            return Attribution::UncollectedOrigin;
        }
        Attribution::DirectFromTest
    }

    /// Classify and, for direct test calls, mark the callee tested
    pub fn record(&self, callee: FunctionId, caller: Option<&Frame>) -> Attribution {
        let attribution = self.classify(caller);
        trace!(%callee, ?attribution, caller = ?caller.map(|f| &*f.name), "classified call");
        if attribution == Attribution::DirectFromTest {
            if let Some(caller) = caller {
                let _ = self.registry.mark_tested(callee, &caller.name);
            }
        }
        attribution
    }
}

impl CallObserver for Classifier {
    fn on_call(&self, callee: FunctionId, caller: Option<&Frame>) {
        let _ = self.record(callee, caller);
    }
}
