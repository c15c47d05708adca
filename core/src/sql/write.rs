use super::{ColumnRef, SqlStatement, SqlWriter, Value, Where, write_where};
use crate::dialect::Dialect;

/// `INSERT INTO table (columns) VALUES (...)`.
#[derive(Debug, Clone, PartialEq)]
pub struct Insert {
    table: String,
    values: Vec<(String, Value)>,
}

impl Insert {
    pub fn into(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            values: Vec::new(),
        }
    }

    pub fn value(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.values.push((column.into(), value.into()));
        self
    }

    pub fn values<I, K, V>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        self.values
            .extend(values.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    pub fn render(&self, dialect: Dialect) -> SqlStatement {
        let mut w = SqlWriter::new(dialect);
        w.push("INSERT INTO ");
        w.ident(&self.table);
        if self.values.is_empty() {
            w.push(" DEFAULT VALUES");
            return w.finish();
        }
        w.push(" (");
        for (i, (column, _)) in self.values.iter().enumerate() {
            if i > 0 {
                w.push(", ");
            }
            w.ident(column);
        }
        w.push(") VALUES (");
        for (i, (_, value)) in self.values.iter().enumerate() {
            if i > 0 {
                w.push(", ");
            }
            w.param(value.clone());
        }
        w.push(")");
        w.finish()
    }
}

/// `UPDATE table SET ... WHERE ...`.
#[derive(Debug, Clone, PartialEq)]
pub struct Update {
    table: String,
    set: Vec<(String, Value)>,
    filters: Vec<Where>,
}

impl Update {
    pub fn table(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            set: Vec::new(),
            filters: Vec::new(),
        }
    }

    pub fn set(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set.push((column.into(), value.into()));
        self
    }

    pub fn filter(mut self, term: Where) -> Self {
        self.filters.push(term);
        self
    }

    /// `None` when there is nothing to assign.
    pub fn render(&self, dialect: Dialect) -> Option<SqlStatement> {
        if self.set.is_empty() {
            return None;
        }
        let mut w = SqlWriter::new(dialect);
        w.push("UPDATE ");
        w.ident(&self.table);
        w.push(" SET ");
        for (i, (column, value)) in self.set.iter().enumerate() {
            if i > 0 {
                w.push(", ");
            }
            w.column(&ColumnRef::new(column.as_str()));
            w.push(" = ");
            w.param(value.clone());
        }
        write_where(&mut w, &self.filters);
        Some(w.finish())
    }
}

/// `DELETE FROM table WHERE ...`.
#[derive(Debug, Clone, PartialEq)]
pub struct Delete {
    table: String,
    filters: Vec<Where>,
}

impl Delete {
    pub fn from(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            filters: Vec::new(),
        }
    }

    pub fn filter(mut self, term: Where) -> Self {
        self.filters.push(term);
        self
    }

    pub fn render(&self, dialect: Dialect) -> SqlStatement {
        let mut w = SqlWriter::new(dialect);
        w.push("DELETE FROM ");
        w.ident(&self.table);
        write_where(&mut w, &self.filters);
        w.finish()
    }
}
