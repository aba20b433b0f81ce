//! Test harness that drives a coverage session like a host test runner.

use crate::coverage::{ModuleLoader, Session, SessionState, Snapshot, TestItem};
use crate::result::FuncCovResult;
use crate::runtime::{CallArgs, CallError, FunctionObject};
use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// A test suite containing multiple tests
#[derive(Debug, Clone)]
pub struct TestSuite {
    /// Suite name
    pub name: String,
    /// Tests in this suite
    pub tests: Vec<TestCase>,
}

impl TestSuite {
    /// Create a new test suite
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tests: Vec::new(),
        }
    }

    /// Add a test case
    pub fn add_test(&mut self, test: TestCase) {
        self.tests.push(test);
    }

    /// Add a test case
    #[must_use]
    pub fn with_test(mut self, test: TestCase) -> Self {
        self.add_test(test);
        self
    }

    /// Get the number of tests
    #[must_use]
    pub fn test_count(&self) -> usize {
        self.tests.len()
    }

    /// Distinct test modules, in first-seen order
    #[must_use]
    pub fn modules(&self) -> Vec<&str> {
        let mut modules: Vec<&str> = Vec::new();
        for test in &self.tests {
            if !modules.contains(&test.module.as_str()) {
                modules.push(&test.module);
            }
        }
        modules
    }
}

/// Closure test body
pub type TestFn = Arc<dyn Fn() -> Result<(), CallError> + Send + Sync>;

/// What a test runs
#[derive(Clone)]
pub enum TestBody {
    /// Rust closure; calls it makes appear to come from the test itself
    Closure(TestFn),
    /// Test function from a test module, called with no arguments
    Function(FunctionObject),
}

impl fmt::Debug for TestBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Closure(_) => f.write_str("Closure"),
            Self::Function(function) => f.debug_tuple("Function").field(function).finish(),
        }
    }
}

/// A single test case
#[derive(Debug, Clone)]
pub struct TestCase {
    /// Test name
    pub name: String,
    /// Dotted name of the defining test module
    pub module: String,
    /// Test body
    pub body: TestBody,
}

impl TestCase {
    /// Create a test from a closure
    #[must_use]
    pub fn new<F>(module: impl Into<String>, name: impl Into<String>, body: F) -> Self
    where
        F: Fn() -> Result<(), CallError> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            module: module.into(),
            body: TestBody::Closure(Arc::new(body)),
        }
    }

    /// Create a test from a test-module function
    #[must_use]
    pub fn from_function(function: FunctionObject) -> Self {
        Self {
            name: function.name().to_string(),
            module: function.module().to_string(),
            body: TestBody::Function(function),
        }
    }

    fn item(&self) -> TestItem {
        TestItem::new(self.name.clone(), self.module.clone())
    }

    fn execute(&self) -> Result<(), CallError> {
        match &self.body {
            TestBody::Closure(body) => body(),
            TestBody::Function(function) => function.call(CallArgs::new()).map(|_| ()),
        }
    }
}

/// Result of running a single test
#[derive(Debug, Clone)]
pub struct TestResult {
    /// Test name
    pub name: String,
    /// Whether test passed
    pub passed: bool,
    /// Error message if failed
    pub error: Option<String>,
    /// Test duration
    pub duration: Duration,
}

impl TestResult {
    /// Create a passing test result
    #[must_use]
    pub fn pass(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            passed: true,
            error: None,
            duration: Duration::ZERO,
        }
    }

    /// Create a failing test result
    #[must_use]
    pub fn fail(name: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            passed: false,
            error: Some(error.into()),
            duration: Duration::ZERO,
        }
    }

    /// Set duration
    #[must_use]
    pub const fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }
}

/// Results from running a test suite
#[derive(Debug, Clone)]
pub struct SuiteResults {
    /// Suite name
    pub suite_name: String,
    /// Individual test results
    pub results: Vec<TestResult>,
    /// Coverage at session end
    pub coverage: Snapshot,
    /// Total duration
    pub duration: Duration,
}

impl SuiteResults {
    /// Check if all tests passed
    #[must_use]
    pub fn all_passed(&self) -> bool {
        self.results.iter().all(|r| r.passed)
    }

    /// Count passed tests
    #[must_use]
    pub fn passed_count(&self) -> usize {
        self.results.iter().filter(|r| r.passed).count()
    }

    /// Count failed tests
    #[must_use]
    pub fn failed_count(&self) -> usize {
        self.results.iter().filter(|r| !r.passed).count()
    }

    /// Get total test count
    #[must_use]
    pub fn total(&self) -> usize {
        self.results.len()
    }

    /// Get failed tests
    #[must_use]
    pub fn failures(&self) -> Vec<&TestResult> {
        self.results.iter().filter(|r| !r.passed).collect()
    }
}

/// Test harness for running suites
#[derive(Debug, Default)]
pub struct TestHarness {
    /// Whether to stop on first failure
    pub fail_fast: bool,
}

impl TestHarness {
    /// Create a new test harness
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable fail-fast mode
    #[must_use]
    pub const fn with_fail_fast(mut self) -> Self {
        self.fail_fast = true;
        self
    }

    /// Discover the session's configured sources, then run the suite
    pub fn run_from(
        &self,
        session: &Session,
        base: &Path,
        loader: &dyn ModuleLoader,
        suite: &TestSuite,
    ) -> FuncCovResult<SuiteResults> {
        let _ = session.on_collection_start(base, loader)?;
        self.run(session, suite)
    }

    /// Run a test suite and finalize the session
    ///
    /// The session must be UNINITIALIZED or DISCOVERING; anything already
    /// discovered stays instrumented.
    pub fn run(&self, session: &Session, suite: &TestSuite) -> FuncCovResult<SuiteResults> {
        let start = Instant::now();
        if session.state() == SessionState::Uninitialized {
            session.begin_discovery()?;
        }
        for module in suite.modules() {
            session.on_collect_module(module)?;
        }
        session.on_collection_finish()?;

        let mut results = Vec::with_capacity(suite.test_count());
        for test in &suite.tests {
            let result = self.run_one(session, test)?;
            let failed = !result.passed;
            results.push(result);
            if failed && self.fail_fast {
                debug!(suite = %suite.name, "fail-fast: stopping suite");
                break;
            }
        }

        let coverage = session.on_session_finish()?;
        Ok(SuiteResults {
            suite_name: suite.name.clone(),
            results,
            coverage,
            duration: start.elapsed(),
        })
    }

    fn run_one(&self, session: &Session, test: &TestCase) -> FuncCovResult<TestResult> {
        let start = Instant::now();
        let outcome = {
            let _scope = session.on_test_call(&test.item())?;
            panic::catch_unwind(AssertUnwindSafe(|| test.execute()))
        };
        let result = match outcome {
            Ok(Ok(())) => TestResult::pass(&test.name),
            Ok(Err(err)) => TestResult::fail(&test.name, err.to_string()),
            Err(payload) => TestResult::fail(&test.name, panic_message(payload.as_ref())),
        };
        if let Some(error) = &result.error {
            warn!(test = %test.name, error = %error, "test failed");
        }
        Ok(result.with_duration(start.elapsed()))
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "test panicked".to_string()
    }
}
