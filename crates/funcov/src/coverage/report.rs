//! Coverage Snapshot and Report Rendering
//!
//! A [`Snapshot`] is the immutable end-of-session view of the registry,
//! grouped by module in discovery order. Rendering never touches the
//! registry again.

use super::CallableRecord;
use crate::config::ReportKind;
use crate::reflect::CallableKind;
use crate::result::FuncCovResult;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Immutable view of one record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordView {
    /// Dot-path from the project root
    pub qualified_name: String,
    /// Name relative to the module
    pub qualname: String,
    /// Callable kind
    pub kind: CallableKind,
    /// Dotted module name
    pub module: String,
    /// Module file
    pub path: Option<PathBuf>,
    /// Definition line
    pub line: Option<u32>,
    /// Directly invoked by a test
    pub tested: bool,
    /// Tests that invoked it directly
    pub direct_callers: Vec<String>,
}

impl From<&CallableRecord> for RecordView {
    fn from(record: &CallableRecord) -> Self {
        Self {
            qualified_name: record.qualified_name().to_string(),
            qualname: record.qualname().to_string(),
            kind: record.kind(),
            module: record.origin().module.clone(),
            path: record.origin().path.clone(),
            line: record.origin().line,
            tested: record.is_tested(),
            direct_callers: record.direct_callers(),
        }
    }
}

/// Found/called counts with the derived percentage
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Totals {
    /// Callables discovered
    pub found: usize,
    /// Callables directly invoked by a test
    pub called: usize,
    /// `100 * called / found`, one decimal; 0.0 when nothing was found
    pub percentage: f64,
}

impl Totals {
    /// Compute totals
    #[must_use]
    pub fn new(found: usize, called: usize) -> Self {
        let percentage = if found == 0 {
            0.0
        } else {
            (called as f64 * 1000.0 / found as f64).round() / 10.0
        };
        Self {
            found,
            called,
            percentage,
        }
    }

    /// Callables not directly invoked
    #[must_use]
    pub fn missed(&self) -> usize {
        self.found - self.called
    }
}

/// Per-module aggregation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleCoverage {
    /// Dotted module name
    pub module: String,
    /// Module file
    pub path: Option<PathBuf>,
    /// Counts for this module
    pub totals: Totals,
    /// Qualnames of callables never invoked directly, in discovery order
    pub missed: Vec<String>,
}

/// End-of-session coverage snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// All records, in discovery order
    pub records: Vec<RecordView>,
    /// Records grouped by module
    pub modules: Vec<ModuleCoverage>,
    /// Session totals
    pub totals: Totals,
}

impl Snapshot {
    /// Build a snapshot from registry records
    #[must_use]
    pub fn from_records(records: &[Arc<CallableRecord>]) -> Self {
        let records: Vec<RecordView> = records.iter().map(|r| RecordView::from(&**r)).collect();

        let mut order: Vec<(String, Option<PathBuf>)> = Vec::new();
        for record in &records {
            if !order.iter().any(|(module, _)| *module == record.module) {
                order.push((record.module.clone(), record.path.clone()));
            }
        }

        let modules = order
            .into_iter()
            .map(|(module, path)| {
                let members: Vec<&RecordView> =
                    records.iter().filter(|r| r.module == module).collect();
                let called = members.iter().filter(|r| r.tested).count();
                ModuleCoverage {
                    totals: Totals::new(members.len(), called),
                    missed: members
                        .iter()
                        .filter(|r| !r.tested)
                        .map(|r| r.qualname.clone())
                        .collect(),
                    module,
                    path,
                }
            })
            .collect();

        let called = records.iter().filter(|r| r.tested).count();
        let totals = Totals::new(records.len(), called);
        Self {
            records,
            modules,
            totals,
        }
    }

    /// Look up a record by qualified name
    #[must_use]
    pub fn get(&self, qualified_name: &str) -> Option<&RecordView> {
        self.records
            .iter()
            .find(|r| r.qualified_name == qualified_name)
    }

    /// Whether a callable was directly tested (`None` if not registered)
    #[must_use]
    pub fn is_tested(&self, qualified_name: &str) -> Option<bool> {
        self.get(qualified_name).map(|r| r.tested)
    }

    /// Serialize to pretty JSON
    pub fn to_json(&self) -> FuncCovResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Terminal table renderer
#[derive(Debug, Clone, Default)]
pub struct TerminalReport {
    base_dir: Option<PathBuf>,
    show_missing: bool,
}

impl TerminalReport {
    /// Create a renderer
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Show module paths relative to `base`
    #[must_use]
    pub fn with_base_dir(mut self, base: impl Into<PathBuf>) -> Self {
        self.base_dir = Some(base.into());
        self
    }

    /// List missed callables per module
    #[must_use]
    pub const fn with_missing(mut self, show: bool) -> Self {
        self.show_missing = show;
        self
    }

    fn display_name(&self, module: &ModuleCoverage) -> String {
        match (&module.path, &self.base_dir) {
            (Some(path), Some(base)) => path
                .strip_prefix(base)
                .unwrap_or(path)
                .display()
                .to_string(),
            (Some(path), None) => path.display().to_string(),
            (None, _) => module.module.clone(),
        }
    }

    /// Render the table
    #[must_use]
    pub fn render(&self, snapshot: &Snapshot) -> String {
        let names: Vec<String> = snapshot
            .modules
            .iter()
            .map(|m| self.display_name(m))
            .collect();
        let width = names.iter().map(String::len).max().unwrap_or(0).max(5);

        let mut header = format!(
            "{:<width$}  {:>6} {:>6} {:>10}",
            "Name", "Funcs", "Miss", "Cover"
        );
        if self.show_missing {
            header.push_str("   Missing");
        }
        let rule = "-".repeat(header.len());

        let mut out = String::new();
        out.push_str(&format!("{0} funcov {0}\n", "-".repeat(20)));
        out.push_str(&header);
        out.push('\n');
        out.push_str(&rule);
        out.push('\n');

        for (name, module) in names.iter().zip(&snapshot.modules) {
            out.push_str(&row(name, &module.totals, width));
            if self.show_missing {
                out.push_str("   ");
                out.push_str(&module.missed.join(", "));
            }
            out.push('\n');
        }

        out.push_str(&rule);
        out.push('\n');
        out.push_str(&row("TOTAL", &snapshot.totals, width));
        out.push('\n');
        out
    }
}

fn row(name: &str, totals: &Totals, width: usize) -> String {
    format!(
        "{:<width$}  {:>6} {:>6} {:>9.1}%",
        name,
        totals.found,
        totals.missed(),
        totals.percentage
    )
}

/// Render every requested report, concatenated
pub fn render_reports(
    kinds: &[ReportKind],
    snapshot: &Snapshot,
    base_dir: Option<&Path>,
) -> FuncCovResult<String> {
    let mut out = String::new();
    for kind in kinds {
        let rendered = match kind {
            ReportKind::Term | ReportKind::TermMissing => {
                let mut report =
                    TerminalReport::new().with_missing(*kind == ReportKind::TermMissing);
                if let Some(base) = base_dir {
                    report = report.with_base_dir(base);
                }
                report.render(snapshot)
            }
            ReportKind::Json => {
                let mut json = snapshot.to_json()?;
                json.push('\n');
                json
            }
        };
        out.push_str(&rendered);
    }
    Ok(out)
}
