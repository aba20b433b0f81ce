//! Ignore patterns for callable names.

use crate::result::{FuncCovError, FuncCovResult};
use regex::Regex;

/// Ordered set of compiled ignore patterns
///
/// A callable whose unqualified name matches any pattern (searched, not
/// anchored, unless the pattern anchors itself) never enters the registry.
#[derive(Debug, Clone, Default)]
pub struct IgnorePatterns {
    patterns: Vec<Regex>,
}

impl IgnorePatterns {
    /// Compile patterns in order; the first invalid one is an error
    pub fn new<I, S>(patterns: I) -> FuncCovResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let patterns = patterns
            .into_iter()
            .map(|pattern| {
                let pattern = pattern.as_ref();
                Regex::new(pattern).map_err(|source| FuncCovError::InvalidPattern {
                    pattern: pattern.to_string(),
                    source,
                })
            })
            .collect::<FuncCovResult<Vec<_>>>()?;
        Ok(Self { patterns })
    }

    /// Whether `name` matches any pattern
    #[must_use]
    pub fn matches(&self, name: &str) -> bool {
        self.patterns.iter().any(|rgx| rgx.is_match(name))
    }

    /// The source patterns, in order
    #[must_use]
    pub fn as_strs(&self) -> Vec<&str> {
        self.patterns.iter().map(Regex::as_str).collect()
    }

    /// Number of patterns
    #[must_use]
    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    /// Whether there are no patterns
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}
