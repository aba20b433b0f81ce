//! Session Configuration
//!
//! Read from YAML by the embedding layer (or built in code) and handed to
//! [`Session::new`](crate::Session::new) as-is.
//!
//! ```yaml
//! sources: [mypackage]
//! ignore_func_names: ["^test_", "^__repr__$"]
//! report: [term-missing]
//! ```

use crate::coverage::{IgnorePatterns, ModuleLayout};
use crate::result::{FuncCovError, FuncCovResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Output requested from the reporter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReportKind {
    /// Per-module table
    Term,
    /// Per-module table with missed callables listed
    TermMissing,
    /// JSON snapshot
    Json,
}

impl ReportKind {
    /// Name as written in configuration
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Term => "term",
            Self::TermMissing => "term-missing",
            Self::Json => "json",
        }
    }
}

impl fmt::Display for ReportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReportKind {
    type Err = FuncCovError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "term" => Ok(Self::Term),
            "term-missing" => Ok(Self::TermMissing),
            "json" => Ok(Self::Json),
            other => Err(FuncCovError::config(format!("unknown report kind `{other}`"))),
        }
    }
}

/// Configuration for a coverage session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FuncCovConfig {
    /// Package roots to discover, relative to the session base directory.
    /// Empty means the base directory itself.
    pub sources: Vec<PathBuf>,
    /// Regular expressions; matching callable names are never registered
    pub ignore_func_names: Vec<String>,
    /// Reports to render at session end
    pub report: Vec<ReportKind>,
    /// Name prefix that marks a test function
    pub test_prefix: String,
    /// Only count calls from modules the runner collected as test modules
    pub require_collected_origin: bool,
    /// On-disk module layout
    pub layout: ModuleLayout,
}

impl Default for FuncCovConfig {
    fn default() -> Self {
        Self {
            sources: Vec::new(),
            ignore_func_names: Vec::new(),
            report: vec![ReportKind::Term],
            test_prefix: "test".to_string(),
            require_collected_origin: true,
            layout: ModuleLayout::default(),
        }
    }
}

impl FuncCovConfig {
    /// Create a new builder
    #[must_use]
    pub fn builder() -> FuncCovConfigBuilder {
        FuncCovConfigBuilder::default()
    }

    /// Parse from YAML
    pub fn from_yaml_str(yaml: &str) -> FuncCovResult<Self> {
        let config: Self = serde_yaml_ng::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a YAML file
    pub fn load(path: impl AsRef<Path>) -> FuncCovResult<Self> {
        let yaml = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&yaml)
    }

    /// Serialize to YAML
    pub fn to_yaml(&self) -> FuncCovResult<String> {
        Ok(serde_yaml_ng::to_string(self)?)
    }

    /// Compile the ignore patterns
    pub fn ignore_patterns(&self) -> FuncCovResult<IgnorePatterns> {
        IgnorePatterns::new(&self.ignore_func_names)
    }

    /// Check that the configuration is usable
    pub fn validate(&self) -> FuncCovResult<()> {
        let _ = self.ignore_patterns()?;
        if self.test_prefix.is_empty() {
            return Err(FuncCovError::config("test_prefix must not be empty"));
        }
        if self.layout.extension.is_empty() {
            return Err(FuncCovError::config("layout.extension must not be empty"));
        }
        Ok(())
    }

    /// Package roots resolved against `base`
    #[must_use]
    pub fn resolve_sources(&self, base: &Path) -> Vec<PathBuf> {
        if self.sources.is_empty() {
            return vec![base.to_path_buf()];
        }
        self.sources
            .iter()
            .map(|source| base.join(source.components().collect::<PathBuf>()))
            .collect()
    }
}

/// Builder for [`FuncCovConfig`]
#[derive(Debug, Clone, Default)]
pub struct FuncCovConfigBuilder {
    config: FuncCovConfig,
}

impl FuncCovConfigBuilder {
    /// Add a package root
    #[must_use]
    pub fn source(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.sources.push(path.into());
        self
    }

    /// Add an ignore pattern
    #[must_use]
    pub fn ignore(mut self, pattern: impl Into<String>) -> Self {
        self.config.ignore_func_names.push(pattern.into());
        self
    }

    /// Replace the requested reports
    #[must_use]
    pub fn report(mut self, kinds: impl IntoIterator<Item = ReportKind>) -> Self {
        self.config.report = kinds.into_iter().collect();
        self
    }

    /// Set the test name prefix
    #[must_use]
    pub fn test_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.test_prefix = prefix.into();
        self
    }

    /// Enable/disable the collected-origin restriction
    #[must_use]
    pub fn require_collected_origin(mut self, enabled: bool) -> Self {
        self.config.require_collected_origin = enabled;
        self
    }

    /// Set the module layout
    #[must_use]
    pub fn layout(mut self, layout: ModuleLayout) -> Self {
        self.config.layout = layout;
        self
    }

    /// Build the configuration
    #[must_use]
    pub fn build(self) -> FuncCovConfig {
        self.config
    }
}
