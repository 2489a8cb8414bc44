//! Column-mapped reads shared by the metadata table and the passthrough tables.

use rusqlite::types::Value;
use serde::Serialize;
use thiserror::Error;

use super::*;
use crate::filter::Filter;

#[derive(Debug, Error, PartialEq)]
pub enum QueryError {
    #[error("Unknown column '{column}' for {table}")]
    UnknownColumn { table: &'static str, column: String },
}

/// How a resource's logical columns map onto SQL.
pub struct TableSpec {
    pub name: &'static str,
    pub from: String,
    /// `(logical name, SQL expression)`, in default projection order.
    pub columns: &'static [(&'static str, &'static str)],
    pub order_by: &'static str,
}

/// A validated WHERE clause with its positional parameters.
#[derive(Debug, Clone)]
pub struct WhereClause {
    pub sql: String,
    pub params: Vec<Value>,
}

impl TableSpec {
    fn expr_for(&self, column: &str) -> Result<&'static str, QueryError> {
        self.columns
            .iter()
            .find(|(name, _)| *name == column)
            .map(|(_, expr)| *expr)
            .ok_or_else(|| QueryError::UnknownColumn {
                table: self.name,
                column: column.to_string(),
            })
    }

    /// Compile a filter; parameters are numbered from `first_param`.
    pub fn compile_where(&self, filter: &Filter, first_param: usize) -> Result<WhereClause, QueryError> {
        let mut parts = Vec::new();
        let mut params = Vec::new();
        for (column, value) in filter.clauses() {
            let expr = self.expr_for(column)?;
            if *value == Value::Null {
                parts.push(format!("{expr} IS NULL"));
            } else {
                params.push(value.clone());
                parts.push(format!("{expr} = ?{}", first_param + params.len() - 1));
            }
        }
        let sql = if parts.is_empty() {
            "1".to_string()
        } else {
            parts.join(" AND ")
        };
        Ok(WhereClause { sql, params })
    }

    /// Resolve a requested projection. `None` selects every column.
    pub fn compile_projection(
        &self,
        requested: Option<&[String]>,
    ) -> Result<Vec<(&'static str, &'static str)>, QueryError> {
        match requested {
            None => Ok(self.columns.to_vec()),
            Some(names) => names
                .iter()
                .map(|name| {
                    self.columns
                        .iter()
                        .find(|(n, _)| *n == name.as_str())
                        .copied()
                        .ok_or_else(|| QueryError::UnknownColumn {
                            table: self.name,
                            column: name.clone(),
                        })
                })
                .collect(),
        }
    }
}

/// Rows returned by a query, in projection order.
#[derive(Debug, Clone, Default)]
pub struct ResultSet {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl ResultSet {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, column: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == column)
    }

    pub fn get(&self, row: usize, column: &str) -> Option<&Value> {
        let idx = self.column_index(column)?;
        self.rows.get(row)?.get(idx)
    }

    pub fn get_i64(&self, row: usize, column: &str) -> Option<i64> {
        match self.get(row, column)? {
            Value::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn get_str(&self, row: usize, column: &str) -> Option<&str> {
        match self.get(row, column)? {
            Value::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// JSON array of row objects keyed by column name.
    pub fn to_json(&self) -> serde_json::Value {
        let rows = self
            .rows
            .iter()
            .map(|row| {
                let object = self
                    .columns
                    .iter()
                    .zip(row)
                    .map(|(column, value)| (column.clone(), sql_to_json(value)))
                    .collect::<serde_json::Map<_, _>>();
                serde_json::Value::Object(object)
            })
            .collect();
        serde_json::Value::Array(rows)
    }
}

impl Serialize for ResultSet {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

fn sql_to_json(value: &Value) -> serde_json::Value {
    match value {
        Value::Null => serde_json::Value::Null,
        Value::Integer(i) => serde_json::Value::from(*i),
        Value::Real(f) => serde_json::Value::from(*f),
        Value::Text(s) => serde_json::Value::from(s.clone()),
        Value::Blob(b) => serde_json::Value::from(hex::encode(b)),
    }
}

impl ContactsDb {
    /// Run a SELECT over `spec` with an already-validated projection and filter.
    pub fn query_table(
        &self,
        spec: &TableSpec,
        projection: &[(&'static str, &'static str)],
        filter: &WhereClause,
    ) -> Result<ResultSet, DbError> {
        let select = projection
            .iter()
            .map(|(name, expr)| format!("{expr} AS \"{name}\""))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "SELECT {select} FROM {} WHERE {} ORDER BY {}",
            spec.from, filter.sql, spec.order_by
        );

        let mut stmt = self.conn.prepare(&sql)?;
        let mapped = stmt.query_map(rusqlite::params_from_iter(filter.params.iter()), |row| {
            (0..projection.len())
                .map(|i| row.get::<_, Value>(i))
                .collect::<rusqlite::Result<Vec<_>>>()
        })?;

        let mut rows = Vec::new();
        for row in mapped {
            rows.push(row?);
        }

        Ok(ResultSet {
            columns: projection.iter().map(|(name, _)| name.to_string()).collect(),
            rows,
        })
    }
}
