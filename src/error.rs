use proto_core::{CompileError, Value};
use thiserror::Error;

use crate::adapter::AdapterError;
use crate::config::ConfigError;

#[derive(Debug, Error)]
pub enum Error {
    /// A relationship declaration could not be compiled; nothing was executed
    #[error("Compile error: {0}")]
    Compile(#[from] CompileError),

    /// The adapter rejected or failed a statement
    #[error(transparent)]
    QueryExecution(#[from] QueryExecutionError),

    /// Error mapping data
    #[error("Mapping error: {0}")]
    Mapping(String),

    #[error(transparent)]
    Config(#[from] ConfigError),

    /// No rows returned when at least one was expected
    #[error("No rows found")]
    NotFound,
}

/// An adapter failure together with the statement that caused it.
#[derive(Debug, Error)]
#[error("Execution error: {source} (sql: {sql})")]
pub struct QueryExecutionError {
    pub sql: String,
    pub params: Vec<Value>,
    #[source]
    pub source: AdapterError,
}

/// Result type for database operations
pub type Result<T> = std::result::Result<T, Error>;
