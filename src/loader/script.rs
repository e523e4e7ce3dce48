//! Script loader: the query script is a Lua chunk.
//!
//! The merged band scope is exposed to the chunk as a global `params`
//! table. The chunk's return value becomes the row set: an array of
//! tables is many rows, a single keyed table is one row, nil is no rows.
//!
//! ```lua
//! local rows = {}
//! for i = 1, params["count"] do
//!   rows[i] = { n = i }
//! end
//! return rows
//! ```

use mlua::Lua;
use serde_json::Value;

use crate::structure::{ParamMap, ReportQuery};

use super::{DataLoader, LoadContext, LoadError, LoadResult};

#[derive(Default)]
pub struct ScriptLoader;

impl ScriptLoader {
    pub fn new() -> Self {
        Self
    }
}

impl DataLoader for ScriptLoader {
    fn load(&self, query: &ReportQuery, ctx: LoadContext<'_>) -> LoadResult<Vec<ParamMap>> {
        let scope = ctx.scope();
        let lua = Lua::new();

        let run = || -> mlua::Result<mlua::Value> {
            let params = lua.create_table()?;
            for (key, value) in &scope {
                params.set(key.as_str(), json_to_lua(&lua, value)?)?;
            }
            lua.globals().set("params", params)?;
            lua.load(&query.script).set_name(&query.name).eval()
        };

        let result = run().map_err(|e| LoadError::Query(e.to_string()))?;
        rows_from_lua(result)
    }
}

fn json_to_lua(lua: &Lua, value: &Value) -> mlua::Result<mlua::Value> {
    Ok(match value {
        Value::Null => mlua::Value::Nil,
        Value::Bool(b) => mlua::Value::Boolean(*b),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                mlua::Value::Integer(i)
            } else {
                mlua::Value::Number(n.as_f64().unwrap_or(0.0))
            }
        }
        Value::String(s) => mlua::Value::String(lua.create_string(s)?),
        Value::Array(items) => {
            let table = lua.create_table()?;
            for (i, item) in items.iter().enumerate() {
                table.set(i + 1, json_to_lua(lua, item)?)?;
            }
            mlua::Value::Table(table)
        }
        Value::Object(map) => {
            let table = lua.create_table()?;
            for (k, v) in map {
                table.set(k.as_str(), json_to_lua(lua, v)?)?;
            }
            mlua::Value::Table(table)
        }
    })
}

fn lua_to_json(value: &mlua::Value) -> LoadResult<Value> {
    Ok(match value {
        mlua::Value::Nil => Value::Null,
        mlua::Value::Boolean(b) => Value::Bool(*b),
        mlua::Value::Integer(i) => Value::from(*i),
        mlua::Value::Number(n) => serde_json::Number::from_f64(*n)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        mlua::Value::String(s) => Value::String(s.to_string_lossy().to_string()),
        mlua::Value::Table(table) => {
            if table.raw_len() > 0 {
                let mut items = Vec::new();
                for item in table.clone().sequence_values::<mlua::Value>() {
                    let item = item.map_err(|e| LoadError::Query(e.to_string()))?;
                    items.push(lua_to_json(&item)?);
                }
                Value::Array(items)
            } else {
                Value::Object(table_to_row(table)?)
            }
        }
        other => {
            return Err(LoadError::Query(format!(
                "script produced an unsupported value of type [{}]",
                other.type_name()
            )))
        }
    })
}

/// One Lua table with string keys becomes one row.
fn table_to_row(table: &mlua::Table) -> LoadResult<ParamMap> {
    let mut row = ParamMap::new();
    for pair in table.clone().pairs::<mlua::Value, mlua::Value>() {
        let (key, value) = pair.map_err(|e| LoadError::Query(e.to_string()))?;
        let key = match &key {
            mlua::Value::String(s) => s.to_string_lossy().to_string(),
            other => {
                return Err(LoadError::Query(format!(
                    "row keys must be strings, found [{}]",
                    other.type_name()
                )))
            }
        };
        row.insert(key, lua_to_json(&value)?);
    }
    Ok(row)
}

fn rows_from_lua(result: mlua::Value) -> LoadResult<Vec<ParamMap>> {
    match result {
        mlua::Value::Nil => Ok(Vec::new()),
        mlua::Value::Table(table) => {
            if table.raw_len() > 0 {
                let mut rows = Vec::new();
                for item in table.clone().sequence_values::<mlua::Value>() {
                    let item = item.map_err(|e| LoadError::Query(e.to_string()))?;
                    match item {
                        mlua::Value::Table(row) => rows.push(table_to_row(&row)?),
                        other => {
                            return Err(LoadError::Query(format!(
                                "script returned a list containing [{}], not row tables",
                                other.type_name()
                            )))
                        }
                    }
                }
                Ok(rows)
            } else if table.is_empty() {
                Ok(Vec::new())
            } else {
                Ok(vec![table_to_row(&table)?])
            }
        }
        other => Err(LoadError::Query(format!(
            "script must return a row table or a list of them, found [{}]",
            other.type_name()
        ))),
    }
}
