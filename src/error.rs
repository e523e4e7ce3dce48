//! Report-level error taxonomy.
//!
//! Module-level errors (load, extract, alias, merge) converge here.
//! Every fatal error is enriched with the
//! report's name before it surfaces, except validation errors, whose
//! message is intended for end users as-is.

use thiserror::Error;

use crate::alias::AliasError;
use crate::extract::ExtractError;
use crate::template::MergeError;

/// Result type for report runs.
pub type ReportResult<T> = Result<T, ReportError>;

#[derive(Debug, Error)]
pub enum ReportError {
    /// Missing or invalid setup; always fatal.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Caller-supplied input violates the report parameter contract.
    #[error("{0}")]
    Validation(String),

    /// A data source query failed during extraction.
    #[error(transparent)]
    Extraction(ExtractError),

    /// A placeholder could not be decomposed where a full
    /// band-path/parameter pair is mandatory.
    #[error(transparent)]
    Alias(#[from] AliasError),

    /// Structural merge inconsistency, including output-name resolution.
    #[error(transparent)]
    Merge(#[from] MergeError),

    /// The custom-report collaborator failed.
    #[error("custom report failed: {0}")]
    Custom(String),

    /// Another error, annotated with the report it occurred in.
    #[error("report [{report}]: {source}")]
    InReport {
        report: String,
        #[source]
        source: Box<ReportError>,
    },
}

impl ReportError {
    /// Attaches the report name, leaving the error kind unchanged.
    /// Validation messages are shown to end users and stay untouched.
    pub fn in_report(self, report: &str) -> Self {
        match self {
            ReportError::Validation(_) | ReportError::InReport { .. } => self,
            other => ReportError::InReport {
                report: report.to_string(),
                source: Box::new(other),
            },
        }
    }
}

impl From<ExtractError> for ReportError {
    fn from(err: ExtractError) -> Self {
        match err {
            // A missing loader is a setup problem, not a data problem.
            ExtractError::NoLoader { .. } => ReportError::Configuration(err.to_string()),
            ExtractError::Load { .. } => ReportError::Extraction(err),
        }
    }
}
