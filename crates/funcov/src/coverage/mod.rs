//! Function Coverage Engine
//!
//! Measures which callables of a project are invoked *directly* by a test,
//! as opposed to reached transitively through other project code.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │  FUNCOV SESSION                                                  │
//! ├──────────────────────────────────────────────────────────────────┤
//! │  Finder → Loader → Discovery → Instrumenter → Registry           │
//! │                                      ↓            ↑              │
//! │                 FunctionObject::call → Classifier ┘              │
//! │                                                                  │
//! │  Registry → Snapshot → Term / TermMissing / Json                 │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! - A callable is marked tested only when the frame directly beneath it
//!   belongs to a test. Calls from other tracked callables never count.
//! - The tested flag is monotonic and registration is idempotent by
//!   function identity.

mod classifier;
mod discovery;
mod finder;
mod ignore;
mod instrument;
mod registry;
mod report;
mod session;

pub use classifier::{Attribution, Classifier, NamePrefix, TestPredicate};
pub use discovery::{Discovered, Discovery, DiscoveryWarning, PackageDiscovery};
pub use finder::{find_modules, LoadError, MemoryLoader, ModuleFile, ModuleLayout, ModuleLoader};
pub use ignore::IgnorePatterns;
pub use instrument::{Instrumented, Instrumenter};
pub use registry::{CallableRecord, Origin, Registry};
pub use report::{render_reports, ModuleCoverage, RecordView, Snapshot, TerminalReport, Totals};
pub use session::{Session, SessionState, TestItem, TestScope};

#[cfg(test)]
mod tests;
