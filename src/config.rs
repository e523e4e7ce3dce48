//! Data-source configuration for SQL-kind loaders.
//!
//! A source id in a report query resolves here to a SQLite target. A
//! connection is opened per load and dropped when the load finishes,
//! which releases the underlying handle deterministically.

use std::collections::HashMap;
use std::path::PathBuf;

use rusqlite::Connection;
use thiserror::Error;

/// Errors raised while resolving or opening a data source.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("unknown data source: {0}")]
    UnknownSource(String),

    #[error("failed to open data source [{source_id}]: {source}")]
    Open {
        source_id: String,
        #[source]
        source: rusqlite::Error,
    },
}

pub type SourceResult<T> = Result<T, SourceError>;

/// Where a SQL source lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SqlSource {
    /// SQLite database file on disk.
    File(PathBuf),
    /// Fresh in-memory database (mainly for tests).
    InMemory,
}

/// Registry mapping source ids to SQL targets.
#[derive(Debug, Default)]
pub struct SourceRegistry {
    sources: HashMap<String, SqlSource>,
}

impl SourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, id: impl Into<String>, source: SqlSource) {
        self.sources.insert(id.into(), source);
    }

    pub fn contains(&self, id: &str) -> bool {
        self.sources.contains_key(id)
    }

    /// Opens a connection to the named source.
    pub fn open(&self, id: &str) -> SourceResult<Connection> {
        let source = self
            .sources
            .get(id)
            .ok_or_else(|| SourceError::UnknownSource(id.to_string()))?;
        let conn = match source {
            SqlSource::File(path) => Connection::open(path),
            SqlSource::InMemory => Connection::open_in_memory(),
        };
        conn.map_err(|e| SourceError::Open {
            source_id: id.to_string(),
            source: e,
        })
    }
}
