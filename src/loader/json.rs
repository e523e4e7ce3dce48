//! JSON loader.
//!
//! The query script names a report parameter holding the JSON document
//! and a path selecting rows from it:
//!
//! ```text
//! parameter=invoices $.store.book[*]
//! ```
//!
//! The path supports object fields (`.field`), array indexing
//! (`[0]`) and wildcard expansion (`[*]`). A path that selects nothing
//! yields an empty row set; a path selecting non-objects is a query
//! error. `${name}` placeholders inside the path are substituted from
//! the band scope before evaluation.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use crate::alias;
use crate::structure::{ParamMap, ReportQuery};

use super::{DataLoader, LoadContext, LoadError, LoadResult};

/// `parameter=<name>` clause at the start of the script.
static PARAMETER_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"parameter=([A-Za-z0-9_.]+)").unwrap());

#[derive(Default)]
pub struct JsonLoader;

impl JsonLoader {
    pub fn new() -> Self {
        Self
    }
}

impl DataLoader for JsonLoader {
    fn load(&self, query: &ReportQuery, ctx: LoadContext<'_>) -> LoadResult<Vec<ParamMap>> {
        let scope = ctx.scope();

        let capture = PARAMETER_PATTERN.captures(&query.script).ok_or_else(|| {
            LoadError::Configuration(format!(
                "query [{}] does not name a source parameter. Script [{}]",
                query.name, query.script
            ))
        })?;
        let parameter_name = capture.get(1).map(|m| m.as_str()).unwrap_or_default();

        let path = PARAMETER_PATTERN.replace(&query.script, "").to_string();
        let path = path.trim();
        if path.is_empty() {
            return Err(LoadError::Configuration(format!(
                "query [{}] has no path expression. Script [{}]",
                query.name, query.script
            )));
        }
        let path = alias::substitute_placeholders(path, |name| scope.get(name).cloned());

        // Missing or blank document: legitimately no rows.
        let document = match scope.get(parameter_name) {
            Some(Value::Null) | None => return Ok(Vec::new()),
            Some(Value::String(s)) if s.trim().is_empty() => return Ok(Vec::new()),
            Some(Value::String(s)) => serde_json::from_str::<Value>(s).map_err(|e| {
                LoadError::Query(format!(
                    "parameter [{}] does not hold valid JSON: {}",
                    parameter_name, e
                ))
            })?,
            // A structured value can be queried directly.
            Some(other) => other.clone(),
        };

        let selected = eval_path(&document, &path).map_err(LoadError::Query)?;
        rows_from_values(selected, &path)
    }
}

/// Evaluates the path subset against `root`, returning selected values.
///
/// Selection that walks off the document (missing field, index out of
/// range) produces no values rather than an error.
fn eval_path<'a>(root: &'a Value, path: &str) -> Result<Vec<&'a Value>, String> {
    let rest = path
        .strip_prefix('$')
        .ok_or_else(|| format!("path [{}] must start with '$'", path))?;

    let mut current = vec![root];
    let mut i = 0;
    while i < rest.len() {
        match rest.as_bytes()[i] {
            b'.' => {
                let end = rest[i + 1..]
                    .find(['.', '['])
                    .map(|j| i + 1 + j)
                    .unwrap_or(rest.len());
                let field = &rest[i + 1..end];
                if field.is_empty() {
                    return Err(format!("path [{}] has an empty field selector", path));
                }
                current = current.into_iter().filter_map(|v| v.get(field)).collect();
                i = end;
            }
            b'[' => {
                let close = rest[i..]
                    .find(']')
                    .map(|j| i + j)
                    .ok_or_else(|| format!("path [{}] has an unclosed '['", path))?;
                let selector = &rest[i + 1..close];
                if selector == "*" {
                    current = current
                        .into_iter()
                        .filter_map(|v| v.as_array())
                        .flatten()
                        .collect();
                } else {
                    let index: usize = selector
                        .parse()
                        .map_err(|_| format!("path [{}] has a bad index [{}]", path, selector))?;
                    current = current.into_iter().filter_map(|v| v.get(index)).collect();
                }
                i = close + 1;
            }
            c => {
                return Err(format!(
                    "unexpected character [{}] in path [{}]",
                    c as char, path
                ))
            }
        }
    }
    Ok(current)
}

/// Turns selected values into rows: every value must be an object, with
/// one flattening step for a path that selected a whole array.
fn rows_from_values(values: Vec<&Value>, path: &str) -> LoadResult<Vec<ParamMap>> {
    let mut rows = Vec::new();
    for value in values {
        match value {
            Value::Object(map) => rows.push(map.clone()),
            Value::Array(items) => {
                for item in items {
                    match item {
                        Value::Object(map) => rows.push(map.clone()),
                        other => {
                            return Err(LoadError::Query(format!(
                                "path [{}] selected a list containing [{}], not objects",
                                path, other
                            )))
                        }
                    }
                }
            }
            other => {
                return Err(LoadError::Query(format!(
                    "path [{}] selected [{}], which is neither an object nor a list of objects",
                    path, other
                )))
            }
        }
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_eval_path_fields_and_wildcard() {
        let doc = json!({"store": {"book": [{"t": "a"}, {"t": "b"}]}});
        let values = eval_path(&doc, "$.store.book[*]").unwrap();
        assert_eq!(values.len(), 2);
        assert_eq!(values[0], &json!({"t": "a"}));
    }

    #[test]
    fn test_eval_path_index() {
        let doc = json!({"items": [{"n": 1}, {"n": 2}]});
        let values = eval_path(&doc, "$.items[1]").unwrap();
        assert_eq!(values, vec![&json!({"n": 2})]);
    }

    #[test]
    fn test_eval_path_missing_field_selects_nothing() {
        let doc = json!({"a": 1});
        assert!(eval_path(&doc, "$.b.c").unwrap().is_empty());
    }

    #[test]
    fn test_rows_require_objects() {
        let doc = json!({"xs": [1, 2]});
        let values = eval_path(&doc, "$.xs[*]").unwrap();
        assert!(matches!(
            rows_from_values(values, "$.xs[*]"),
            Err(LoadError::Query(_))
        ));
    }

    #[test]
    fn test_whole_array_selection_flattens() {
        let doc = json!({"xs": [{"n": 1}, {"n": 2}]});
        let values = eval_path(&doc, "$.xs").unwrap();
        let rows = rows_from_values(values, "$.xs").unwrap();
        assert_eq!(rows.len(), 2);
    }
}
