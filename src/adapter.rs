//! The database adapter contract.

use proto_core::Value;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AdapterError {
    /// Rusqlite specific errors
    #[cfg(feature = "rusqlite")]
    #[error("Rusqlite error: {0}")]
    Rusqlite(#[from] rusqlite::Error),

    /// Generic error
    #[error("Database error: {0}")]
    Other(String),
}

/// A database connection able to run compiled statements.
///
/// Implementations execute exactly what they are given: no retries, no
/// rewriting of SQL.
pub trait Adapter {
    /// Runs a query and returns every row.
    fn fetch(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>, AdapterError>;

    /// Runs a statement and returns the number of affected rows.
    fn execute(&self, sql: &str, params: &[Value]) -> Result<u64, AdapterError>;

    /// Row id generated by the most recent insert.
    fn last_id(&self) -> i64;

    /// Message of the most recent failure, if any.
    fn last_error(&self) -> Option<String>;
}

/// One result row: column names shared across a result set, values by position.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    columns: Arc<[String]>,
    values: Vec<Value>,
}

impl Row {
    pub fn new(columns: Arc<[String]>, values: Vec<Value>) -> Self {
        Self { columns, values }
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        let index = self.columns.iter().position(|c| c == column)?;
        self.values.get(index)
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// `(column, value)` pairs in SELECT order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.columns.iter().map(String::as_str).zip(&self.values)
    }
}
