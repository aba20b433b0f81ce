//! Coverage Session
//!
//! The explicit context object that owns one measurement: configuration,
//! registry, classifier, installed hooks and the lifecycle state machine.
//!
//! ```text
//! UNINITIALIZED ─on_collection_start─► DISCOVERING ─on_collection_finish─► READY
//!                                                                           │
//!        FINALIZED ◄─on_session_finish── EXECUTING ◄──────on_test_call──────┘
//! ```
//!
//! Sessions are independent: two sessions never share a registry, and a
//! function already hooked by one session is skipped by another.

use super::{
    render_reports, CallableRecord, Classifier, Discovered, Discovery, DiscoveryWarning,
    IgnorePatterns, Instrumenter, ModuleLoader, NamePrefix, Registry, Snapshot, TestPredicate,
    Totals,
};
use crate::config::FuncCovConfig;
use crate::result::{FuncCovError, FuncCovResult};
use crate::runtime::{frames, CallObserver, Frame, FrameGuard, ModuleObject};
use parking_lot::Mutex;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Lifecycle state of a [`Session`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    /// Created, nothing discovered yet
    Uninitialized,
    /// Discovery and instrumentation in progress
    Discovering,
    /// Hooks installed, waiting for tests
    Ready,
    /// Tests running, marks accumulating
    Executing,
    /// Snapshot taken, hooks removed
    Finalized,
}

impl SessionState {
    /// Name used in logs and errors
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Uninitialized => "UNINITIALIZED",
            Self::Discovering => "DISCOVERING",
            Self::Ready => "READY",
            Self::Executing => "EXECUTING",
            Self::Finalized => "FINALIZED",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A test about to be run by the host runner
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestItem {
    /// Test function name
    pub name: String,
    /// Dotted name of the module defining the test
    pub module: String,
}

impl TestItem {
    /// Create a test item
    #[must_use]
    pub fn new(name: impl Into<String>, module: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            module: module.into(),
        }
    }
}

/// Keeps a test's frame on the call stack until dropped
///
/// Calls made while the scope is alive see the test as their caller.
#[derive(Debug)]
#[must_use = "the test frame is popped as soon as the scope is dropped"]
pub struct TestScope {
    _frame: FrameGuard,
}

/// One coverage measurement
pub struct Session {
    config: FuncCovConfig,
    ignore: IgnorePatterns,
    registry: Arc<Registry>,
    classifier: Arc<Classifier>,
    instrumenter: Instrumenter,
    state: Mutex<SessionState>,
    warnings: Mutex<Vec<DiscoveryWarning>>,
    snapshot: Mutex<Option<Snapshot>>,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("state", &*self.state.lock())
            .field("registered", &self.registry.len())
            .field("instrumenter", &self.instrumenter)
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Create a session recognizing tests by `config.test_prefix`
    pub fn new(config: FuncCovConfig) -> FuncCovResult<Self> {
        let predicate = NamePrefix::new(config.test_prefix.clone());
        Self::with_predicate(config, predicate)
    }

    /// Create a session with a custom test predicate
    pub fn with_predicate(
        config: FuncCovConfig,
        predicate: impl TestPredicate + 'static,
    ) -> FuncCovResult<Self> {
        config.validate()?;
        let ignore = config.ignore_patterns()?;
        let registry = Arc::new(Registry::new());
        let classifier = Arc::new(
            Classifier::new(Arc::clone(&registry), Box::new(predicate))
                .require_collected_origin(config.require_collected_origin),
        );
        let observer: Arc<dyn CallObserver> = Arc::clone(&classifier) as Arc<dyn CallObserver>;
        Ok(Self {
            config,
            ignore,
            registry,
            classifier,
            instrumenter: Instrumenter::new(observer),
            state: Mutex::new(SessionState::Uninitialized),
            warnings: Mutex::new(Vec::new()),
            snapshot: Mutex::new(None),
        })
    }

    /// Current lifecycle state
    #[must_use]
    pub fn state(&self) -> SessionState {
        *self.state.lock()
    }

    /// The configuration
    #[must_use]
    pub fn config(&self) -> &FuncCovConfig {
        &self.config
    }

    /// The registry (live view)
    #[must_use]
    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// The classifier installed on every instrumented function
    #[must_use]
    pub fn classifier(&self) -> &Arc<Classifier> {
        &self.classifier
    }

    /// Modules that failed to load during discovery
    #[must_use]
    pub fn warnings(&self) -> Vec<DiscoveryWarning> {
        self.warnings.lock().clone()
    }

    /// Found/called counts as of now
    #[must_use]
    pub fn totals(&self) -> Totals {
        Totals::new(self.registry.len(), self.registry.tested_count())
    }

    fn require(&self, allowed: &[SessionState], operation: &str) -> FuncCovResult<()> {
        let state = *self.state.lock();
        if allowed.contains(&state) {
            Ok(())
        } else {
            Err(FuncCovError::invalid_state(format!(
                "{operation} is not allowed in state {state}"
            )))
        }
    }

    fn transition(
        &self,
        allowed: &[SessionState],
        to: SessionState,
        operation: &str,
    ) -> FuncCovResult<()> {
        let mut state = self.state.lock();
        if !allowed.contains(&*state) {
            return Err(FuncCovError::invalid_state(format!(
                "{operation} is not allowed in state {}",
                *state
            )));
        }
        if *state != to {
            debug!(from = %*state, to = %to, "session transition");
            *state = to;
        }
        Ok(())
    }

    /// Enter DISCOVERING without walking any directory
    ///
    /// For embedders that hand modules to [`Self::discover_module`] directly.
    pub fn begin_discovery(&self) -> FuncCovResult<()> {
        self.transition(
            &[SessionState::Uninitialized],
            SessionState::Discovering,
            "begin_discovery",
        )
    }

    /// Runner hook: discover and instrument every configured source root
    ///
    /// Roots are resolved against `base`. Returns how many callables were
    /// registered.
    pub fn on_collection_start(
        &self,
        base: &Path,
        loader: &dyn ModuleLoader,
    ) -> FuncCovResult<usize> {
        self.begin_discovery()?;
        let mut registered = 0;
        for root in self.config.resolve_sources(base) {
            registered += self.discover_package(&root, loader)?;
        }
        info!(
            registered,
            warnings = self.warnings.lock().len(),
            "collection started"
        );
        Ok(registered)
    }

    /// Discover and instrument every module under `root`
    ///
    /// Modules that fail to load are kept as warnings. Returns how many
    /// callables were newly registered.
    pub fn discover_package(&self, root: &Path, loader: &dyn ModuleLoader) -> FuncCovResult<usize> {
        self.require(&[SessionState::Discovering], "discover_package")?;
        let found = Discovery::new(&self.ignore)
            .discover_package(root, &self.config.layout, loader)
            .map_err(|err| FuncCovError::Discovery {
                module: root.display().to_string(),
                message: err.to_string(),
            })?;
        self.warnings.lock().extend(found.warnings);
        Ok(self.register_all(found.callables))
    }

    /// Discover and instrument one already-loaded module
    ///
    /// Idempotent: callables already registered are left untouched.
    pub fn discover_module(&self, module: &ModuleObject) -> FuncCovResult<usize> {
        self.require(&[SessionState::Discovering], "discover_module")?;
        let found = Discovery::new(&self.ignore).discover_module(module);
        Ok(self.register_all(found))
    }

    fn register_all(&self, found: Vec<Discovered>) -> usize {
        let mut registered = 0;
        for discovered in found {
            let function = &discovered.function;
            if self.registry.contains(function.id()) {
                continue;
            }
            if let Err(err) = self.instrumenter.instrument(function) {
                warn!(error = %err, "callable omitted from coverage");
                continue;
            }
            let record = CallableRecord::new(
                function.id(),
                function.qualname(),
                discovered.kind,
                discovered.origin,
            );
            if self.registry.register(record) {
                registered += 1;
            }
        }
        registered
    }

    /// Runner hook: a test module was collected
    pub fn on_collect_module(&self, module: &str) -> FuncCovResult<()> {
        self.require(
            &[SessionState::Discovering, SessionState::Ready],
            "on_collect_module",
        )?;
        self.classifier.collect_module(module);
        debug!(module, "collected test module");
        Ok(())
    }

    /// Runner hook: collection is complete
    pub fn on_collection_finish(&self) -> FuncCovResult<()> {
        self.transition(
            &[SessionState::Discovering],
            SessionState::Ready,
            "on_collection_finish",
        )?;
        info!(
            registered = self.registry.len(),
            instrumented = self.instrumenter.installed_count(),
            "collection finished"
        );
        Ok(())
    }

    /// Runner hook: a test is about to run
    ///
    /// Keep the returned scope alive while the test body runs.
    pub fn on_test_call(&self, item: &TestItem) -> FuncCovResult<TestScope> {
        self.transition(
            &[SessionState::Ready, SessionState::Executing],
            SessionState::Executing,
            "on_test_call",
        )?;
        debug!(test = %item.name, module = %item.module, "entering test");
        Ok(TestScope {
            _frame: frames::enter(Frame::test(&item.name, &item.module)),
        })
    }

    /// Runner hook: all tests are done
    ///
    /// Removes every hook this session installed and freezes the registry
    /// into a [`Snapshot`].
    pub fn on_session_finish(&self) -> FuncCovResult<Snapshot> {
        self.transition(
            &[SessionState::Ready, SessionState::Executing],
            SessionState::Finalized,
            "on_session_finish",
        )?;
        let restored = self.instrumenter.uninstall_all();
        let snapshot = Snapshot::from_records(&self.registry.records());
        info!(
            found = snapshot.totals.found,
            called = snapshot.totals.called,
            percentage = snapshot.totals.percentage,
            restored,
            "session finished"
        );
        *self.snapshot.lock() = Some(snapshot.clone());
        Ok(snapshot)
    }

    /// The final snapshot
    pub fn snapshot(&self) -> FuncCovResult<Snapshot> {
        self.snapshot
            .lock()
            .clone()
            .ok_or_else(|| {
                FuncCovError::invalid_state(format!(
                    "snapshot is not available in state {}",
                    self.state()
                ))
            })
    }

    /// Render the configured reports from the final snapshot
    pub fn render(&self, base_dir: Option<&Path>) -> FuncCovResult<String> {
        let snapshot = self.snapshot()?;
        render_reports(&self.config.report, &snapshot, base_dir)
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        let restored = self.instrumenter.uninstall_all();
        if restored > 0 {
            debug!(restored, "removed hooks of unfinished session");
        }
    }
}
