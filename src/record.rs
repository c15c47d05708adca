//! Decoded result rows.

use proto_core::{CompiledQuery, FieldCase, Value};
use serde::de::DeserializeOwned;
use serde_json::{Map, Number};
use std::collections::BTreeMap;

use crate::adapter::Row;
use crate::error::{Error, Result};

pub type Json = serde_json::Value;

/// One root row with its to-many relations already decoded.
///
/// Keys follow the entity's field case, nested relation objects included.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    fields: Map<String, Json>,
    relations: BTreeMap<String, Vec<Json>>,
}

impl Record {
    /// Decodes a row of `query`, parsing its aggregation columns as JSON arrays.
    pub fn from_row(row: &Row, query: &CompiledQuery) -> Result<Self> {
        let mut record = Record::default();
        for (column, value) in row.iter() {
            let key = query.case.apply(column);
            if query.relations.iter().any(|r| r == column) {
                let items = decode_relation(column, value)?
                    .into_iter()
                    .map(|item| convert_keys(item, query.case))
                    .collect();
                record.relations.insert(key, items);
            } else {
                record.fields.insert(key, to_json(value));
            }
        }
        Ok(record)
    }

    pub fn get(&self, field: &str) -> Option<&Json> {
        self.fields.get(field)
    }

    pub fn fields(&self) -> &Map<String, Json> {
        &self.fields
    }

    /// Items of a to-many relation; `None` when the query did not load it.
    pub fn relation(&self, name: &str) -> Option<&[Json]> {
        self.relations.get(name).map(Vec::as_slice)
    }

    pub fn relations(&self) -> impl Iterator<Item = (&str, &[Json])> {
        self.relations
            .iter()
            .map(|(name, items)| (name.as_str(), items.as_slice()))
    }

    /// Fields and relations as one JSON object.
    pub fn to_json(&self) -> Json {
        let mut object = self.fields.clone();
        for (name, items) in &self.relations {
            object.insert(name.clone(), Json::Array(items.clone()));
        }
        Json::Object(object)
    }

    /// Deserializes fields and relations into a typed value.
    pub fn deserialize<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_value(self.to_json()).map_err(|e| Error::Mapping(e.to_string()))
    }
}

fn decode_relation(column: &str, value: &Value) -> Result<Vec<Json>> {
    match value {
        Value::Null => Ok(Vec::new()),
        Value::Text(text) => serde_json::from_str(text)
            .map_err(|e| Error::Mapping(format!("relation \"{column}\": {e}"))),
        other => Err(Error::Mapping(format!(
            "relation \"{column}\": expected JSON text, got {other:?}"
        ))),
    }
}

/// Applies `case` to every object key, recursively.
pub(crate) fn convert_keys(value: Json, case: FieldCase) -> Json {
    match value {
        Json::Object(object) => Json::Object(
            object
                .into_iter()
                .map(|(k, v)| (case.apply(&k), convert_keys(v, case)))
                .collect(),
        ),
        Json::Array(items) => Json::Array(items.into_iter().map(|v| convert_keys(v, case)).collect()),
        other => other,
    }
}

pub(crate) fn to_json(value: &Value) -> Json {
    match value {
        Value::Null => Json::Null,
        Value::Integer(i) => Json::from(*i),
        Value::Real(f) => Number::from_f64(*f).map_or(Json::Null, Json::Number),
        Value::Text(s) => Json::String(s.clone()),
        Value::Blob(b) => Json::from(b.clone()),
        Value::Bool(b) => Json::Bool(*b),
    }
}

/// Scalars bind as themselves; arrays and objects bind as JSON text.
pub(crate) fn from_json(value: &Json) -> Value {
    match value {
        Json::Null => Value::Null,
        Json::Bool(b) => Value::Bool(*b),
        Json::Number(n) => match n.as_i64() {
            Some(i) => Value::Integer(i),
            None => n.as_f64().map_or(Value::Null, Value::Real),
        },
        Json::String(s) => Value::Text(s.clone()),
        Json::Array(_) | Json::Object(_) => Value::Text(value.to_string()),
    }
}
