//! A small statement builder: SELECT with joins plus the three write
//! statements, rendered per [`Dialect`] with bound parameters.

mod select;
mod value;
mod write;

pub use select::{Select, SelectItem};
pub use value::Value;
pub use write::{Delete, Insert, Update};

use crate::dialect::Dialect;
use crate::join::{CompareOp, JoinType, TableRef};
use crate::normalize::split_qualified;

/// Rendered SQL and its parameters, in placeholder order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SqlStatement {
    pub sql: String,
    pub params: Vec<Value>,
}

impl std::fmt::Display for SqlStatement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.sql)
    }
}

/// A column, optionally qualified by a table alias.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ColumnRef {
    pub qualifier: Option<String>,
    pub name: String,
}

impl ColumnRef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            qualifier: None,
            name: name.into(),
        }
    }

    pub fn qualified(qualifier: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            qualifier: Some(qualifier.into()),
            name: name.into(),
        }
    }

    /// Parses `"alias.column"` or `"column"`.
    pub fn parse(spec: &str) -> Self {
        match split_qualified(spec) {
            (Some(qualifier), name) => Self::qualified(qualifier, name),
            (None, name) => Self::new(name),
        }
    }

    /// Parses `spec`, qualifying it with `alias` when it carries no qualifier.
    ///
    /// ```
    /// use proto_core::ColumnRef;
    ///
    /// assert_eq!(ColumnRef::resolve("id", "u"), ColumnRef::qualified("u", "id"));
    /// assert_eq!(ColumnRef::resolve("p.id", "u"), ColumnRef::qualified("p", "id"));
    /// ```
    pub fn resolve(spec: &str, alias: &str) -> Self {
        let mut column = Self::parse(spec);
        if column.qualifier.is_none() {
            column.qualifier = Some(alias.to_string());
        }
        column
    }

    pub fn write(&self, dialect: Dialect, buf: &mut String) {
        if let Some(qualifier) = &self.qualifier {
            dialect.write_ident(qualifier, buf);
            buf.push('.');
        }
        dialect.write_ident(&self.name, buf);
    }

    pub fn to_sql(&self, dialect: Dialect) -> String {
        let mut buf = String::new();
        self.write(dialect, &mut buf);
        buf
    }
}

/// What a JOIN clause reads from.
#[derive(Debug, Clone, PartialEq)]
pub enum JoinSource {
    Table(TableRef),
    /// Rendered subquery without parentheses, referenced as `alias`.
    Derived { sql: String, alias: String },
}

/// The condition part of a JOIN clause.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum JoinOn {
    #[default]
    None,
    Conditions(Vec<(ColumnRef, CompareOp, ColumnRef)>),
    Using(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct JoinClause {
    pub join_type: JoinType,
    pub source: JoinSource,
    pub on: JoinOn,
}

impl JoinClause {
    fn write(&self, w: &mut SqlWriter) {
        w.push(self.join_type.as_sql());
        w.push(" ");
        match &self.source {
            JoinSource::Table(table) => w.table(table),
            JoinSource::Derived { sql, alias } => {
                w.push("(");
                w.push(sql);
                w.push(") AS ");
                w.ident(alias);
            }
        }
        match &self.on {
            JoinOn::None => {}
            JoinOn::Conditions(conditions) => {
                w.push(" ON ");
                for (i, (left, op, right)) in conditions.iter().enumerate() {
                    if i > 0 {
                        w.push(" AND ");
                    }
                    w.column(left);
                    w.push(" ");
                    w.push(op.as_sql());
                    w.push(" ");
                    w.column(right);
                }
            }
            JoinOn::Using(column) => {
                w.push(" USING (");
                w.ident(column);
                w.push(")");
            }
        }
    }
}

/// One WHERE term; terms of a statement are joined with AND.
#[derive(Debug, Clone, PartialEq)]
pub enum Where {
    Compare {
        column: ColumnRef,
        op: CompareOp,
        value: Value,
    },
    /// Column-to-column comparison, used for correlation.
    Columns {
        left: ColumnRef,
        op: CompareOp,
        right: ColumnRef,
    },
    Like {
        column: ColumnRef,
        pattern: Value,
    },
    /// An empty list renders as a false condition.
    In {
        column: ColumnRef,
        values: Vec<Value>,
    },
    Null {
        column: ColumnRef,
        negated: bool,
    },
    Between {
        column: ColumnRef,
        start: Value,
        end: Value,
    },
}

impl Where {
    pub fn eq(column: ColumnRef, value: impl Into<Value>) -> Self {
        Where::Compare {
            column,
            op: CompareOp::Eq,
            value: value.into(),
        }
    }

    fn write(&self, w: &mut SqlWriter) {
        match self {
            Where::Compare { column, op, value } => {
                w.column(column);
                w.push(" ");
                w.push(op.as_sql());
                w.push(" ");
                w.param(value.clone());
            }
            Where::Columns { left, op, right } => {
                w.column(left);
                w.push(" ");
                w.push(op.as_sql());
                w.push(" ");
                w.column(right);
            }
            Where::Like { column, pattern } => {
                w.column(column);
                w.push(" LIKE ");
                w.param(pattern.clone());
            }
            Where::In { values, .. } if values.is_empty() => w.push("1 = 0"),
            Where::In { column, values } => {
                w.column(column);
                w.push(" IN (");
                for (i, value) in values.iter().enumerate() {
                    if i > 0 {
                        w.push(", ");
                    }
                    w.param(value.clone());
                }
                w.push(")");
            }
            Where::Null { column, negated } => {
                w.column(column);
                w.push(if *negated { " IS NOT NULL" } else { " IS NULL" });
            }
            Where::Between { column, start, end } => {
                w.column(column);
                w.push(" BETWEEN ");
                w.param(start.clone());
                w.push(" AND ");
                w.param(end.clone());
            }
        }
    }
}

fn write_where(w: &mut SqlWriter, terms: &[Where]) {
    for (i, term) in terms.iter().enumerate() {
        w.push(if i == 0 { " WHERE " } else { " AND " });
        term.write(w);
    }
}

/// Accumulates SQL text and parameters, numbering placeholders as it goes.
pub(crate) struct SqlWriter {
    dialect: Dialect,
    sql: String,
    params: Vec<Value>,
}

impl SqlWriter {
    pub(crate) fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            sql: String::with_capacity(128),
            params: Vec::new(),
        }
    }

    pub(crate) fn push(&mut self, text: &str) {
        self.sql.push_str(text);
    }

    pub(crate) fn ident(&mut self, name: &str) {
        self.dialect.write_ident(name, &mut self.sql);
    }

    pub(crate) fn column(&mut self, column: &ColumnRef) {
        column.write(self.dialect, &mut self.sql);
    }

    /// `"table"` or `"table" AS "alias"`.
    pub(crate) fn table(&mut self, table: &TableRef) {
        self.ident(&table.table);
        if !table.alias.is_empty() && table.alias != table.table {
            self.push(" AS ");
            self.ident(&table.alias);
        }
    }

    pub(crate) fn param(&mut self, value: Value) {
        self.params.push(value);
        let placeholder = self.dialect.render_placeholder(self.params.len());
        self.sql.push_str(&placeholder);
    }

    pub(crate) fn dialect(&self) -> Dialect {
        self.dialect
    }

    pub(crate) fn finish(self) -> SqlStatement {
        SqlStatement {
            sql: self.sql,
            params: self.params,
        }
    }
}
