//! Discovery
//!
//! Walks modules (and the classes defined in them, recursively) through the
//! [`Reflect`] capability and produces every function-like member that is
//! defined, not imported, in the tree.

use super::finder::{find_modules, ModuleLayout, ModuleLoader};
use super::{IgnorePatterns, Origin};
use crate::reflect::{CallableKind, Member, Reflect};
use crate::result::FuncCovResult;
use crate::runtime::{FunctionId, FunctionObject, ModuleObject};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// A callable found during discovery
#[derive(Debug, Clone)]
pub struct Discovered {
    /// The function object
    pub function: FunctionObject,
    /// How it was declared
    pub kind: CallableKind,
    /// Where it was found
    pub origin: Origin,
}

/// A module that could not be loaded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveryWarning {
    /// Dotted module name
    pub module: String,
    /// Module file, when known
    pub path: Option<PathBuf>,
    /// What went wrong
    pub message: String,
}

/// Result of discovering a whole package
#[derive(Debug, Default)]
pub struct PackageDiscovery {
    /// Modules that loaded, in walk order
    pub modules: Vec<ModuleObject>,
    /// Callables found in those modules
    pub callables: Vec<Discovered>,
    /// Modules that failed to load
    pub warnings: Vec<DiscoveryWarning>,
}

/// Finds callables, dropping names that match the ignore patterns
#[derive(Debug, Clone, Copy)]
pub struct Discovery<'a> {
    ignore: &'a IgnorePatterns,
}

impl<'a> Discovery<'a> {
    /// Create a discovery pass with the given ignore patterns
    #[must_use]
    pub const fn new(ignore: &'a IgnorePatterns) -> Self {
        Self { ignore }
    }

    /// Discover all callables defined in one module
    ///
    /// The same function object bound under several names is reported once.
    #[must_use]
    pub fn discover_module(&self, module: &ModuleObject) -> Vec<Discovered> {
        let origin = Origin {
            module: module.name().to_string(),
            path: module.file().map(Path::to_path_buf),
            line: None,
        };
        let mut seen = HashSet::new();
        let mut found = Vec::new();
        self.walk(module, &origin, &mut seen, &mut found);
        debug!(module = module.name(), found = found.len(), "discovered module");
        found
    }

    fn walk(
        &self,
        namespace: &dyn Reflect,
        origin: &Origin,
        seen: &mut HashSet<FunctionId>,
        found: &mut Vec<Discovered>,
    ) {
        for (_, member) in namespace.defined_members() {
            if let Member::Class(class) = &member {
                self.walk(class, origin, seen, found);
                continue;
            }
            let Some(kind) = CallableKind::detect(namespace.owner(), &member) else {
                continue;
            };
            let Some(function) = member.function() else {
                continue;
            };
            if self.ignore.matches(function.name()) {
                debug!(name = function.qualname(), "ignored by pattern");
                continue;
            }
            if !seen.insert(function.id()) {
                continue;
            }
            found.push(Discovered {
                function: function.clone(),
                kind,
                origin: Origin {
                    line: function.location().line,
                    ..origin.clone()
                },
            });
        }
    }

    /// Find, load and discover every module under a package directory
    ///
    /// A module that fails to load becomes a warning; its siblings are still
    /// discovered.
    #[tracing::instrument(level = "debug", skip_all, fields(root = %root.display()))]
    pub fn discover_package(
        &self,
        root: &Path,
        layout: &ModuleLayout,
        loader: &dyn ModuleLoader,
    ) -> FuncCovResult<PackageDiscovery> {
        let mut result = PackageDiscovery::default();
        for file in find_modules(root, layout)? {
            match loader.load(&file) {
                Ok(module) => {
                    let mut callables = self.discover_module(&module);
                    for discovered in &mut callables {
                        if discovered.origin.path.is_none() {
                            discovered.origin.path = Some(file.path.clone());
                        }
                    }
                    result.callables.extend(callables);
                    result.modules.push(module);
                }
                Err(err) => {
                    warn!(module = %file.module_name, error = %err, "module failed to load");
                    result.warnings.push(DiscoveryWarning {
                        module: file.module_name,
                        path: Some(file.path),
                        message: err.message,
                    });
                }
            }
        }
        Ok(result)
    }
}
