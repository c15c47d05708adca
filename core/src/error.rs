use thiserror::Error;

/// Structural errors in relationship declarations.
///
/// These are raised while a plan is compiled, before any statement reaches a
/// database, and abort the whole compilation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompileError {
    /// A plain join was declared without ON conditions or a USING column.
    #[error("join to \"{table}\" AS \"{alias}\" has no ON or USING predicate")]
    InvalidJoin { table: String, alias: String },

    /// Two columns of one aggregation level map to the same JSON key.
    #[error("duplicate JSON key \"{key}\" in aggregation \"{level}\"")]
    DuplicateJsonKey { key: String, level: String },

    /// A to-many descriptor cannot be turned into a correlated aggregation.
    #[error("cannot aggregate \"{table}\": {reason}")]
    UnresolvableAggregation { table: String, reason: &'static str },
}

/// Result type for plan compilation
pub type CompileResult<T> = std::result::Result<T, CompileError>;
