//! [`Adapter`] over a `rusqlite` connection.

use proto_core::Value;
use rusqlite::{Connection, params_from_iter};
use std::cell::RefCell;
use std::sync::Arc;

use crate::adapter::{Adapter, AdapterError, Row};

pub struct SqliteAdapter {
    conn: Connection,
    last_error: RefCell<Option<String>>,
}

impl SqliteAdapter {
    pub fn new(conn: Connection) -> Self {
        Self {
            conn,
            last_error: RefCell::new(None),
        }
    }

    pub fn open_in_memory() -> Result<Self, AdapterError> {
        Ok(Self::new(Connection::open_in_memory()?))
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn into_inner(self) -> Connection {
        self.conn
    }

    fn record<T>(&self, result: rusqlite::Result<T>) -> Result<T, AdapterError> {
        result.map_err(|e| {
            *self.last_error.borrow_mut() = Some(e.to_string());
            AdapterError::from(e)
        })
    }

    fn query(&self, sql: &str, params: &[Value]) -> rusqlite::Result<Vec<Row>> {
        let mut stmt = self.conn.prepare(sql)?;
        let columns: Arc<[String]> = stmt.column_names().into_iter().map(String::from).collect();
        let mut rows = stmt.query(params_from_iter(params))?;

        let mut results = Vec::new();
        while let Some(row) = rows.next()? {
            let values = (0..columns.len())
                .map(|i| row.get_ref(i).map(Value::from))
                .collect::<rusqlite::Result<Vec<_>>>()?;
            results.push(Row::new(Arc::clone(&columns), values));
        }
        Ok(results)
    }
}

impl Adapter for SqliteAdapter {
    fn fetch(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>, AdapterError> {
        self.record(self.query(sql, params))
    }

    fn execute(&self, sql: &str, params: &[Value]) -> Result<u64, AdapterError> {
        let changed = self.record(self.conn.execute(sql, params_from_iter(params)))?;
        Ok(changed as u64)
    }

    fn last_id(&self) -> i64 {
        self.conn.last_insert_rowid()
    }

    fn last_error(&self) -> Option<String> {
        self.last_error.borrow().clone()
    }
}

impl From<Connection> for SqliteAdapter {
    fn from(conn: Connection) -> Self {
        Self::new(conn)
    }
}
