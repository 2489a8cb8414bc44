//! Equality filters over a resource's columns.
//!
//! A filter is a conjunction of `column = value` clauses; a `Null` value
//! matches `IS NULL`. An empty filter matches every row.

use std::collections::BTreeMap;

use rusqlite::types::Value;
use serde::Deserialize;

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(try_from = "BTreeMap<String, serde_json::Value>")]
pub struct Filter {
    clauses: Vec<(String, Value)>,
}

impl Filter {
    /// Matches every row.
    pub fn all() -> Self {
        Self::default()
    }

    pub fn eq(mut self, column: &str, value: impl Into<Value>) -> Self {
        self.clauses.push((column.to_string(), value.into()));
        self
    }

    /// Text equality, or `IS NULL` when `value` is `None`.
    pub fn eq_text(self, column: &str, value: Option<&str>) -> Self {
        match value {
            Some(v) => self.eq(column, v.to_string()),
            None => self.eq(column, Value::Null),
        }
    }

    pub fn clauses(&self) -> &[(String, Value)] {
        &self.clauses
    }
}

/// Convert a JSON scalar into a SQLite value for filtering.
pub fn json_to_sql(value: &serde_json::Value) -> Result<Value, String> {
    match value {
        serde_json::Value::Null => Ok(Value::Null),
        serde_json::Value::Bool(b) => Ok(Value::Integer(*b as i64)),
        serde_json::Value::Number(n) => match n.as_i64() {
            Some(i) => Ok(Value::Integer(i)),
            None => n
                .as_f64()
                .map(Value::Real)
                .ok_or_else(|| format!("unrepresentable number {n}")),
        },
        serde_json::Value::String(s) => Ok(Value::Text(s.clone())),
        other => Err(format!("filter values must be scalars, got {other}")),
    }
}

impl TryFrom<BTreeMap<String, serde_json::Value>> for Filter {
    type Error = String;

    fn try_from(map: BTreeMap<String, serde_json::Value>) -> Result<Self, Self::Error> {
        let mut filter = Filter::all();
        for (column, value) in map {
            let value = json_to_sql(&value).map_err(|e| format!("{column}: {e}"))?;
            filter = filter.eq(&column, value);
        }
        Ok(filter)
    }
}
