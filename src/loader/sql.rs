//! SQL loader backed by SQLite.
//!
//! `${name}` references in the query script are rewritten to positional
//! slots and bound as statement parameters, never spliced into the SQL
//! text. Result rows keep the statement's column order.

use std::sync::Arc;

use rusqlite::types::{Value as SqlValue, ValueRef};
use serde_json::Value;

use crate::alias;
use crate::config::SourceRegistry;
use crate::structure::{ParamMap, ReportQuery};

use super::{DataLoader, LoadContext, LoadError, LoadResult};

pub struct SqlLoader {
    sources: Arc<SourceRegistry>,
}

impl SqlLoader {
    pub fn new(sources: Arc<SourceRegistry>) -> Self {
        Self { sources }
    }
}

impl DataLoader for SqlLoader {
    fn load(&self, query: &ReportQuery, ctx: LoadContext<'_>) -> LoadResult<Vec<ParamMap>> {
        let source_id = query.source_id.as_deref().ok_or_else(|| {
            LoadError::Configuration(format!("query [{}] has no data source id", query.name))
        })?;
        let scope = ctx.scope();

        // Rewrite each placeholder to ?N, collecting the bound values.
        let mut bindings: Vec<SqlValue> = Vec::new();
        let sql = alias::rewrite_placeholders::<LoadError, _>(&query.script, |name| {
            let value = scope.get(name).ok_or_else(|| {
                LoadError::Configuration(format!(
                    "parameter [{}] referenced by query [{}] is not in scope",
                    name, query.name
                ))
            })?;
            bindings.push(bind_value(value));
            Ok(format!("?{}", bindings.len()))
        })?;

        let conn = self.sources.open(source_id)?;
        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| LoadError::Query(e.to_string()))?;
        let columns: Vec<String> = stmt.column_names().iter().map(|c| c.to_string()).collect();

        let mut rows = stmt
            .query(rusqlite::params_from_iter(bindings))
            .map_err(|e| LoadError::Query(e.to_string()))?;

        let mut out = Vec::new();
        loop {
            let row = match rows.next() {
                Ok(Some(row)) => row,
                Ok(None) => break,
                Err(e) => return Err(LoadError::Query(e.to_string())),
            };
            let mut map = ParamMap::new();
            for (i, column) in columns.iter().enumerate() {
                let value = row
                    .get_ref(i)
                    .map_err(|e| LoadError::Query(e.to_string()))?;
                map.insert(column.clone(), column_value(value));
            }
            out.push(map);
        }
        Ok(out)
    }
}

/// Maps a parameter value onto a SQLite binding.
fn bind_value(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Bool(b) => SqlValue::Integer(*b as i64),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                SqlValue::Integer(i)
            } else {
                SqlValue::Real(n.as_f64().unwrap_or(0.0))
            }
        }
        Value::String(s) => SqlValue::Text(s.clone()),
        other => SqlValue::Text(other.to_string()),
    }
}

/// Maps a SQLite column value back into a parameter value.
fn column_value(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::from(i),
        ValueRef::Real(f) => serde_json::Number::from_f64(f)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        ValueRef::Text(t) => Value::String(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => Value::String(String::from_utf8_lossy(b).into_owned()),
    }
}
