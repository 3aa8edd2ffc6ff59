use std::path::PathBuf;

use thiserror::Error;

use crate::threshold::ThresholdReport;

#[derive(Error, Debug)]
pub enum CovrunError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("XML write error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid glob pattern '{pattern}': {message}")]
    Pattern { pattern: String, message: String },

    #[error("Failed to collect coverage from {}: {message}", path.display())]
    Collect { path: PathBuf, message: String },

    #[error("Coverage for '{0}' was produced by different instrumentation and cannot be merged")]
    StructureMismatch(String),

    #[error("Invalid {kind} counter {index} for '{path}'")]
    InvalidCounter {
        path: String,
        kind: &'static str,
        index: u32,
    },

    #[error("Unable to instrument '{path}': {message}")]
    Instrumentation { path: String, message: String },

    #[error("The load hook is already installed for this run")]
    HookAlreadyInstalled,

    #[error("{0}")]
    ThresholdsNotMet(ThresholdReport),
}

impl CovrunError {
    pub(crate) fn pattern(pattern: &str, err: impl std::fmt::Display) -> Self {
        CovrunError::Pattern {
            pattern: pattern.to_string(),
            message: err.to_string(),
        }
    }

    /// Configuration and collection problems that make the coverage picture
    /// untrustworthy.
    #[must_use]
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            CovrunError::Config(_)
                | CovrunError::Pattern { .. }
                | CovrunError::Collect { .. }
                | CovrunError::StructureMismatch(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, CovrunError>;
