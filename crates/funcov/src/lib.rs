//! Funcov: Function-Level Test Coverage
//!
//! Reports, for every function, method, classmethod and staticmethod defined
//! in a project, whether at least one test invoked it *directly*. A callable
//! reached only through other project code does not count, so the report
//! shows which units have tests of their own.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                    FUNCOV Architecture                          │
//! ├─────────────────────────────────────────────────────────────────┤
//! │   ┌────────────┐    ┌────────────┐    ┌────────────┐            │
//! │   │ Runtime    │    │ Session    │    │ Snapshot   │            │
//! │   │ object     │───►│ discover + │───►│ term/json  │            │
//! │   │ model      │    │ classify   │    │ reports    │            │
//! │   └────────────┘    └────────────┘    └────────────┘            │
//! │         ▲                 ▲                                     │
//! │         │   TestHarness / host test runner hooks                │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```
//! use funcov::{CallArgs, FuncCovConfig, ModuleObject, Session, TestItem, Value};
//!
//! let calc = ModuleObject::builder("pkg.calc")
//!     .def("double", |args| {
//!         let n = args.get(0).and_then(Value::as_i64).unwrap_or(0);
//!         Ok(Value::from(n * 2))
//!     })
//!     .def("unused", |_| Ok(Value::None))
//!     .build();
//!
//! let session = Session::new(FuncCovConfig::default())?;
//! session.begin_discovery()?;
//! session.discover_module(&calc)?;
//! session.on_collect_module("tests.test_calc")?;
//! session.on_collection_finish()?;
//!
//! {
//!     let _test = session.on_test_call(&TestItem::new("test_double", "tests.test_calc"))?;
//!     let _ = calc.call("double", CallArgs::positional([21_i64]));
//! }
//!
//! let snapshot = session.on_session_finish()?;
//! assert_eq!(snapshot.totals.percentage, 50.0);
//! # Ok::<(), funcov::FuncCovError>(())
//! ```

#![warn(missing_docs)]

pub mod config;
pub mod coverage;
pub mod harness;
pub mod reflect;
pub mod result;
pub mod runtime;

pub use config::{FuncCovConfig, FuncCovConfigBuilder, ReportKind};
pub use coverage::{
    Attribution, CallableRecord, Classifier, DiscoveryWarning, MemoryLoader, ModuleCoverage,
    ModuleFile, ModuleLayout, ModuleLoader, NamePrefix, RecordView, Registry, Session,
    SessionState, Snapshot, TerminalReport, TestItem, TestPredicate, TestScope, Totals,
};
pub use harness::{SuiteResults, TestBody, TestCase, TestHarness, TestResult, TestSuite};
pub use reflect::{CallableKind, Member, Owner, Reflect};
pub use result::{FuncCovError, FuncCovResult};
pub use runtime::{
    CallArgs, CallError, ClassObject, Frame, FrameKind, FunctionObject, Instance, ModuleObject,
    Value,
};
