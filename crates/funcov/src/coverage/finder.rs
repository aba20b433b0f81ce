//! Module Finder
//!
//! Maps a package directory to `(file, dotted module name)` pairs and hands
//! each one to a host-supplied [`ModuleLoader`].

use crate::result::{FuncCovError, FuncCovResult};
use crate::runtime::ModuleObject;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

/// How module files are laid out on disk
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModuleLayout {
    /// Extension of module files, without the dot
    pub extension: String,
    /// File stem that stands for the enclosing package itself
    pub package_init: String,
}

impl Default for ModuleLayout {
    fn default() -> Self {
        Self {
            extension: "py".to_string(),
            package_init: "__init__".to_string(),
        }
    }
}

impl ModuleLayout {
    /// Create a layout
    #[must_use]
    pub fn new(extension: impl Into<String>, package_init: impl Into<String>) -> Self {
        Self {
            extension: extension.into(),
            package_init: package_init.into(),
        }
    }
}

/// A module file found under a package root
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct ModuleFile {
    /// Path to the file
    pub path: PathBuf,
    /// Dotted module name, starting with the root directory's name
    pub module_name: String,
}

/// Recursively find module files under `root`
///
/// Symlinks are not followed. Files are visited in name order within each
/// directory.
pub fn find_modules(root: &Path, layout: &ModuleLayout) -> FuncCovResult<Vec<ModuleFile>> {
    if root.is_file() {
        return Ok(single_module(root, layout).into_iter().collect());
    }

    let package = root
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| {
            FuncCovError::config(format!("package root {} has no name", root.display()))
        })?;

    let mut modules = Vec::new();
    for entry in WalkDir::new(root).follow_links(false).sort_by_file_name() {
        let entry = entry.map_err(|err| {
            let message = err.to_string();
            err.into_io_error()
                .map_or_else(|| FuncCovError::config(message), FuncCovError::Io)
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some(layout.extension.as_str()) {
            continue;
        }
        let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };

        let mut parts = vec![package.to_string()];
        if let Some(dir) = path.parent().and_then(|p| p.strip_prefix(root).ok()) {
            parts.extend(
                dir.components()
                    .filter_map(|c| c.as_os_str().to_str().map(str::to_string)),
            );
        }
        if stem != layout.package_init {
            parts.push(stem.to_string());
        }

        modules.push(ModuleFile {
            path: path.to_path_buf(),
            module_name: parts.join("."),
        });
    }
    Ok(modules)
}

/// A root that is itself a module file is a top-level module named by its stem
fn single_module(path: &Path, layout: &ModuleLayout) -> Option<ModuleFile> {
    if path.extension().and_then(|e| e.to_str()) != Some(layout.extension.as_str()) {
        return None;
    }
    let stem = path.file_stem().and_then(|s| s.to_str())?;
    Some(ModuleFile {
        path: path.to_path_buf(),
        module_name: stem.to_string(),
    })
}

/// A module failed to load
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct LoadError {
    /// Error message
    pub message: String,
}

impl LoadError {
    /// Create a load error
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Turns a module file into a module object ("import")
pub trait ModuleLoader {
    /// Load one module
    fn load(&self, file: &ModuleFile) -> Result<ModuleObject, LoadError>;
}

impl<F> ModuleLoader for F
where
    F: Fn(&ModuleFile) -> Result<ModuleObject, LoadError>,
{
    fn load(&self, file: &ModuleFile) -> Result<ModuleObject, LoadError> {
        self(file)
    }
}

/// Loader over modules that are already built, keyed by dotted name
#[derive(Debug, Clone, Default)]
pub struct MemoryLoader {
    modules: HashMap<String, ModuleObject>,
}

impl MemoryLoader {
    /// Create an empty loader
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a module under its own name
    #[must_use]
    pub fn with_module(mut self, module: ModuleObject) -> Self {
        self.insert(module);
        self
    }

    /// Add a module under its own name
    pub fn insert(&mut self, module: ModuleObject) {
        let _ = self.modules.insert(module.name().to_string(), module);
    }

    /// Get a module by name
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ModuleObject> {
        self.modules.get(name)
    }
}

impl ModuleLoader for MemoryLoader {
    fn load(&self, file: &ModuleFile) -> Result<ModuleObject, LoadError> {
        self.modules
            .get(&file.module_name)
            .cloned()
            .ok_or_else(|| LoadError::new(format!("No module named '{}'", file.module_name)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn touch(path: &Path) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, "").unwrap();
    }

    #[test]
    fn test_nested_package_module_names() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("package");
        touch(&root.join("__init__.py"));
        touch(&root.join("module1.py"));
        touch(&root.join("non_py_file.ext"));
        touch(&root.join("subpackage1/__init__.py"));
        touch(&root.join("subpackage1/module2.py"));
        touch(&root.join("subpackage1/subpackage2/module3.py"));

        let mut names: Vec<_> = find_modules(&root, &ModuleLayout::default())
            .unwrap()
            .into_iter()
            .map(|m| m.module_name)
            .collect();
        names.sort();

        assert_eq!(
            names,
            vec![
                "package",
                "package.module1",
                "package.subpackage1",
                "package.subpackage1.module2",
                "package.subpackage1.subpackage2.module3",
            ]
        );
    }

    #[test]
    fn test_paths_point_at_files() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("pkg");
        touch(&root.join("a.py"));
        let found = find_modules(&root, &ModuleLayout::default()).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].path, root.join("a.py"));
    }

    #[test]
    fn test_custom_layout() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("scripts");
        touch(&root.join("mod.rhai"));
        touch(&root.join("util.rhai"));
        touch(&root.join("ignored.py"));
        let names: Vec<_> = find_modules(&root, &ModuleLayout::new("rhai", "mod"))
            .unwrap()
            .into_iter()
            .map(|m| m.module_name)
            .collect();
        assert_eq!(names, vec!["scripts", "scripts.util"]);
    }

    #[test]
    fn test_single_file_root_is_one_module() {
        let tmp = TempDir::new().unwrap();
        let file = tmp.path().join("calc.py");
        touch(&file);
        let found = find_modules(&file, &ModuleLayout::default()).unwrap();
        assert_eq!(
            found,
            vec![ModuleFile {
                path: file.clone(),
                module_name: "calc".to_string(),
            }]
        );

        let other = tmp.path().join("notes.txt");
        touch(&other);
        assert!(find_modules(&other, &ModuleLayout::default()).unwrap().is_empty());
    }

    #[test]
    fn test_missing_root_is_error() {
        let tmp = TempDir::new().unwrap();
        let result = find_modules(&tmp.path().join("absent"), &ModuleLayout::default());
        assert!(result.is_err());
    }

    #[test]
    fn test_memory_loader_missing_module() {
        let loader = MemoryLoader::new();
        let file = ModuleFile {
            path: PathBuf::from("pkg/a.py"),
            module_name: "pkg.a".to_string(),
        };
        let err = loader.load(&file).unwrap_err();
        assert_eq!(err.message, "No module named 'pkg.a'");
    }
}
