//! Result and error types for funcov.

use thiserror::Error;

/// Result type for funcov operations
pub type FuncCovResult<T> = Result<T, FuncCovError>;

/// Errors that can occur while setting up or finalizing a coverage session
///
/// None of these are ever raised from inside an instrumented call; the call
/// path degrades silently instead (see [`crate::coverage::Classifier`]).
#[derive(Debug, Error)]
pub enum FuncCovError {
    /// An ignore pattern failed to compile
    #[error("Invalid ignore pattern `{pattern}`: {source}")]
    InvalidPattern {
        /// The offending pattern
        pattern: String,
        /// Regex compilation error
        #[source]
        source: regex::Error,
    },

    /// A module could not be discovered
    #[error("Discovery of module `{module}` failed: {message}")]
    Discovery {
        /// Dotted module name
        module: String,
        /// Error message
        message: String,
    },

    /// A callable could not be instrumented
    #[error("Cannot instrument `{name}`: {message}")]
    Instrumentation {
        /// Qualified name of the callable
        name: String,
        /// Error message
        message: String,
    },

    /// Operation called in the wrong session state
    #[error("Invalid state: {message}")]
    InvalidState {
        /// Error message
        message: String,
    },

    /// Configuration error
    #[error("Configuration error: {message}")]
    Config {
        /// Error message
        message: String,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),
}

impl FuncCovError {
    /// Create an invalid state error
    #[must_use]
    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState {
            message: message.into(),
        }
    }

    /// Create a configuration error
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }
}
