//! Tracing utilities for plan compilation and query execution.
//!
//! Enable the `tracing` feature to emit events via the `tracing` crate.
//! These macros no-op when the feature is disabled, avoiding `#[cfg]` boilerplate
//! at every call site.

/// Emit a debug-level event describing a compiled plan.
///
/// ```ignore
/// proto_trace_compile!(root.table, plain.len(), roots.len());
/// ```
#[macro_export]
macro_rules! proto_trace_compile {
    ($root:expr, $plain:expr, $aggregations:expr) => {
        #[cfg(feature = "tracing")]
        tracing::debug!(
            root = %$root,
            plain = $plain,
            aggregations = $aggregations,
            "proto.compile"
        );
    };
}

/// Emit a debug-level event with the SQL text and parameter count.
///
/// ```ignore
/// proto_trace_query!(&statement.sql, statement.params.len());
/// ```
#[macro_export]
macro_rules! proto_trace_query {
    ($sql:expr, $param_count:expr) => {
        #[cfg(feature = "tracing")]
        tracing::debug!(sql = %$sql, params = $param_count, "proto.query");
    };
}

/// Emit a warn-level event for a failed adapter call.
#[macro_export]
macro_rules! proto_trace_error {
    ($sql:expr, $error:expr) => {
        #[cfg(feature = "tracing")]
        tracing::warn!(sql = %$sql, error = %$error, "proto.query.failed");
    };
}
