//! Instrumentation
//!
//! Installs one shared observer on each discovered function object. The
//! observer lives on the object, so aliases, bound methods and descriptor
//! access all report through it, and no extra call layer (hence no extra
//! frame) is introduced.

use crate::result::{FuncCovError, FuncCovResult};
use crate::runtime::{CallObserver, FunctionObject, InstallError};
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Outcome of instrumenting one function
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Instrumented {
    /// Observer newly installed
    Installed,
    /// This instrumenter's observer was already installed
    AlreadyInstalled,
}

/// Installs and later removes one observer
pub struct Instrumenter {
    observer: Arc<dyn CallObserver>,
    installed: Mutex<Vec<FunctionObject>>,
}

impl fmt::Debug for Instrumenter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instrumenter")
            .field("installed", &self.installed.lock().len())
            .finish()
    }
}

impl Instrumenter {
    /// Create an instrumenter for `observer`
    #[must_use]
    pub fn new(observer: Arc<dyn CallObserver>) -> Self {
        Self {
            observer,
            installed: Mutex::new(Vec::new()),
        }
    }

    /// Install the observer on `function`
    ///
    /// Native functions and functions already observed by someone else are
    /// errors; the caller skips them.
    pub fn instrument(&self, function: &FunctionObject) -> FuncCovResult<Instrumented> {
        if function.is_observed_by(&self.observer) {
            return Ok(Instrumented::AlreadyInstalled);
        }
        function
            .install_observer(Arc::clone(&self.observer))
            .map_err(|err: InstallError| FuncCovError::Instrumentation {
                name: function.qualified_name(),
                message: err.to_string(),
            })?;
        debug!(name = %function.qualified_name(), "instrumented");
        self.installed.lock().push(function.clone());
        Ok(Instrumented::Installed)
    }

    /// Remove the observer from every function it was installed on
    ///
    /// Returns how many were restored.
    pub fn uninstall_all(&self) -> usize {
        let installed = std::mem::take(&mut *self.installed.lock());
        installed
            .iter()
            .filter(|f| f.remove_observer(&self.observer))
            .count()
    }

    /// Number of functions currently instrumented by this instrumenter
    #[must_use]
    pub fn installed_count(&self) -> usize {
        self.installed.lock().len()
    }
}
