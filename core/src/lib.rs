//! # proto-core
//!
//! Pure SQL generation for Proto: entities declare their relationships against a
//! [`GraphBuilder`], the resulting [`JoinGraph`] is compiled by [`compile_plan`]
//! into one statement that returns the root rows together with every to-many
//! relation aggregated into a JSON array column.
//!
//! Nothing in this crate performs I/O.

pub mod compile;
pub mod dialect;
pub mod entity;
pub mod error;
pub mod join;
pub mod normalize;
pub mod plan;
pub mod sql;
#[doc(hidden)]
pub mod tracing;

pub use compile::{
    CompiledAggregation, Correlation, JsonMap, JsonValue, SubqueryCompiler, compile_subquery,
};
pub use dialect::{Dialect, JsonFunctions, QueryContext};
pub use entity::{Entity, EntityMetadata};
pub use error::{CompileError, CompileResult};
pub use join::{
    ColumnSpec, CompareOp, Condition, Descriptor, DescriptorId, DescriptorMut, GraphBuilder,
    JoinGraph, JoinType, Pivot, Predicate, TableRef,
};
pub use normalize::FieldCase;
pub use plan::{
    Classification, CompiledQuery, DateRange, Direction, Filter, FilterOp, Modifiers, classify,
    compile_plan,
};
pub use sql::{
    ColumnRef, Delete, Insert, JoinClause, JoinOn, JoinSource, Select, SelectItem, SqlStatement,
    Update, Value, Where,
};
