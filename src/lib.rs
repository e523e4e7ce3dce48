//! # Foliant
//!
//! A band-based report generator: hierarchical business data is loaded
//! into a tree of named bands, then merged into a template whose
//! repeating and conditional fragments carry `${band.param}` aliases.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │        Report definition (bands, queries, params)        │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [loaders: sql / json / script]
//! ┌─────────────────────────────────────────────────────────┐
//! │              Band tree (one band per data row)           │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [merge]
//! ┌─────────────────────────────────────────────────────────┐
//! │    Template structure with rows cloned per band instance │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [orchestrator]
//! ┌─────────────────────────────────────────────────────────┐
//! │          Named, format-stamped report output             │
//! └─────────────────────────────────────────────────────────┘
//! ```

pub mod alias;
pub mod config;
pub mod error;
pub mod extract;
pub mod loader;
pub mod reporting;
pub mod structure;
pub mod template;

/// Re-exports for convenient usage.
pub mod prelude {
    pub use crate::config::{SourceRegistry, SqlSource};
    pub use crate::error::{ReportError, ReportResult};
    pub use crate::extract::DataExtractor;
    pub use crate::loader::{DataLoader, LoadContext, LoadError, LoaderRegistry};
    pub use crate::reporting::{ReportOutput, ReportRunner, RunParams};
    pub use crate::structure::{
        BandDefinition, BandId, BandTree, LoaderKind, OutputFormat, ParamMap, Report,
        ReportParameter, ReportQuery, ReportTemplate, ROOT_BAND_NAME,
    };
    pub use crate::template::{
        Body, Cell, Descend, MergeError, Node, Paragraph, Row, Run, Table, TemplateMerger,
    };
}

// Also export at crate root for convenience
pub use error::{ReportError, ReportResult};
pub use reporting::{ReportOutput, ReportRunner, RunParams};
pub use structure::{BandTree, ParamMap, Report, ReportTemplate, ROOT_BAND_NAME};
