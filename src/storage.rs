//! Entity-level operations over an [`Adapter`].

use proto_core::{
    ColumnRef, CompiledQuery, Delete, Entity, EntityMetadata, FieldCase, Filter, Insert,
    JoinGraph, Modifiers, QueryContext, SqlStatement, Update, Value, Where, compile_plan,
    normalize::convert_column,
};
use serde::Serialize;
use serde_json::Map;

use crate::adapter::{Adapter, Row};
use crate::config::Config;
use crate::error::{Error, QueryExecutionError, Result};
use crate::record::{Json, Record, from_json};

/// Reads and writes entities through one adapter.
///
/// Every read is compiled in full before the adapter is called, so a
/// declaration error never reaches the database.
pub struct Storage<'a, A: Adapter> {
    adapter: &'a A,
    ctx: QueryContext,
}

impl<'a, A: Adapter> Storage<'a, A> {
    pub fn new(adapter: &'a A, ctx: QueryContext) -> Self {
        Self { adapter, ctx }
    }

    pub fn with_config(adapter: &'a A, config: &Config) -> Self {
        Self::new(adapter, config.context())
    }

    pub fn context(&self) -> &QueryContext {
        &self.ctx
    }

    pub fn adapter(&self) -> &A {
        self.adapter
    }

    /// Compiles `E`'s relationship declaration without executing it.
    pub fn compile<E: Entity>(&self, modifiers: &Modifiers) -> Result<CompiledQuery> {
        let graph = JoinGraph::declare::<E>();
        Ok(compile_plan(&E::METADATA, &graph, modifiers, &self.ctx)?)
    }

    /// Every matching `E` with its relations.
    pub fn all<E: Entity>(&self, modifiers: &Modifiers) -> Result<Vec<Record>> {
        let query = self.compile::<E>(modifiers)?;
        self.fetch(&query.statement)?
            .iter()
            .map(|row| Record::from_row(row, &query))
            .collect()
    }

    /// The `E` whose id column equals `id`.
    pub fn get<E: Entity>(&self, id: impl Into<Value>) -> Result<Record> {
        let modifiers = Modifiers::new()
            .filter(Filter::eq(E::METADATA.id_column, id))
            .limit(1);
        self.all::<E>(&modifiers)?
            .into_iter()
            .next()
            .ok_or(Error::NotFound)
    }

    /// Inserts `data` and returns the generated id.
    pub fn add<E: Entity, T: Serialize>(&self, data: &T) -> Result<i64> {
        let values = columns::<E, T>(data)?
            .into_iter()
            .filter(|(column, value)| !(column == E::METADATA.id_column && value.is_null()));
        let statement = Insert::into(E::METADATA.table)
            .values(values)
            .render(self.ctx.dialect);
        self.execute(&statement)?;
        Ok(self.adapter.last_id())
    }

    /// Updates the `E` with `id`; returns the number of rows changed.
    pub fn update<E: Entity, T: Serialize>(&self, id: impl Into<Value>, data: &T) -> Result<u64> {
        let update = columns::<E, T>(data)?
            .into_iter()
            .filter(|(column, _)| column != E::METADATA.id_column)
            .fold(Update::table(E::METADATA.table), |update, (column, value)| {
                update.set(column, value)
            })
            .filter(Where::eq(ColumnRef::new(E::METADATA.id_column), id));
        match update.render(self.ctx.dialect) {
            Some(statement) => self.execute(&statement),
            None => Ok(0),
        }
    }

    /// Deletes the `E` with `id`; returns the number of rows removed.
    pub fn delete<E: Entity>(&self, id: impl Into<Value>) -> Result<u64> {
        let statement = Delete::from(E::METADATA.table)
            .filter(Where::eq(ColumnRef::new(E::METADATA.id_column), id))
            .render(self.ctx.dialect);
        self.execute(&statement)
    }

    fn fetch(&self, statement: &SqlStatement) -> Result<Vec<Row>> {
        crate::proto_trace_query!(&statement.sql, statement.params.len());
        self.adapter
            .fetch(&statement.sql, &statement.params)
            .map_err(|source| failed(statement, source))
    }

    fn execute(&self, statement: &SqlStatement) -> Result<u64> {
        crate::proto_trace_query!(&statement.sql, statement.params.len());
        self.adapter
            .execute(&statement.sql, &statement.params)
            .map_err(|source| failed(statement, source))
    }
}

fn failed(statement: &SqlStatement, source: crate::adapter::AdapterError) -> Error {
    crate::proto_trace_error!(&statement.sql, &source);
    Error::QueryExecution(QueryExecutionError {
        sql: statement.sql.clone(),
        params: statement.params.clone(),
        source,
    })
}

/// The column/value pairs of `data` that belong to `E`, in `E`'s field order.
///
/// Keys follow `E`'s field case; keys that are not fields of `E` (loaded
/// relations, for instance) are dropped.
fn columns<E: Entity, T: Serialize>(data: &T) -> Result<Vec<(String, Value)>> {
    let object = match serde_json::to_value(data) {
        Ok(Json::Object(object)) => object,
        Ok(other) => {
            return Err(Error::Mapping(format!(
                "{} data must serialize to an object, got {other}",
                E::METADATA.name
            )));
        }
        Err(e) => return Err(Error::Mapping(e.to_string())),
    };
    Ok(select_fields(&E::METADATA, &object))
}

fn select_fields(meta: &EntityMetadata, object: &Map<String, Json>) -> Vec<(String, Value)> {
    let column = |key: &str| match meta.case {
        FieldCase::Camel => convert_column(key, FieldCase::Snake),
        FieldCase::Snake => key.to_string(),
    };
    if meta.fields.is_empty() {
        return object
            .iter()
            .filter(|(_, v)| !v.is_array() && !v.is_object())
            .map(|(k, v)| (column(k), from_json(v)))
            .collect();
    }
    meta.fields
        .iter()
        .filter_map(|field| object.get(*field).map(|v| (column(field), from_json(v))))
        .collect()
}
