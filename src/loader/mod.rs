//! Data loaders: pluggable strategies that turn a band's query into rows.
//!
//! Loader dispatch is closed over [`LoaderKind`]: the extractor looks a
//! kind up in the [`LoaderRegistry`] and calls the one [`DataLoader`]
//! capability. Loaders read the band tree for scope but never mutate it.

pub mod json;
pub mod script;
pub mod sql;

use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;

use crate::config::{SourceError, SourceRegistry};
use crate::structure::{BandId, BandTree, LoaderKind, ParamMap, ReportQuery};

pub use json::JsonLoader;
pub use script::ScriptLoader;
pub use sql::SqlLoader;

/// Result type for load operations.
pub type LoadResult<T> = Result<T, LoadError>;

/// Errors raised by data loaders.
///
/// `Configuration` means the report setup is wrong (missing source,
/// missing referenced parameter, malformed query string); `Query` means
/// the setup is plausible but execution against the data failed.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("query configuration error: {0}")]
    Configuration(String),

    #[error("query execution failed: {0}")]
    Query(String),
}

impl From<SourceError> for LoadError {
    fn from(err: SourceError) -> Self {
        match err {
            SourceError::UnknownSource(_) => LoadError::Configuration(err.to_string()),
            SourceError::Open { .. } => LoadError::Query(err.to_string()),
        }
    }
}

/// Band context handed to a loader: the parent band plus report params.
///
/// [`LoadContext::scope`] merges report parameters unprefixed with every
/// ancestor's own parameters under an `ancestorName.` prefix.
#[derive(Clone, Copy)]
pub struct LoadContext<'a> {
    pub tree: &'a BandTree,
    pub parent: BandId,
    pub report_params: &'a ParamMap,
}

impl LoadContext<'_> {
    pub fn scope(&self) -> ParamMap {
        self.tree.merged_scope(self.parent, self.report_params)
    }
}

/// The loader capability: produce rows for one band query.
///
/// An empty row set is a legitimate answer, not an error.
pub trait DataLoader: Send + Sync {
    fn load(&self, query: &ReportQuery, ctx: LoadContext<'_>) -> LoadResult<Vec<ParamMap>>;
}

/// Registry of loaders keyed by kind.
#[derive(Default)]
pub struct LoaderRegistry {
    loaders: HashMap<LoaderKind, Box<dyn DataLoader>>,
}

impl LoaderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the three standard loaders installed.
    pub fn standard(sources: Arc<SourceRegistry>) -> Self {
        let mut registry = Self::new();
        registry.register(LoaderKind::Sql, Box::new(SqlLoader::new(sources)));
        registry.register(LoaderKind::Json, Box::new(JsonLoader::new()));
        registry.register(LoaderKind::Script, Box::new(ScriptLoader::new()));
        registry
    }

    pub fn register(&mut self, kind: LoaderKind, loader: Box<dyn DataLoader>) {
        self.loaders.insert(kind, loader);
    }

    pub fn get(&self, kind: LoaderKind) -> Option<&dyn DataLoader> {
        self.loaders.get(&kind).map(|l| l.as_ref())
    }
}
