use super::{ColumnRef, JoinClause, SqlStatement, SqlWriter, Value, Where, write_where};
use crate::dialect::Dialect;
use crate::join::TableRef;
use crate::plan::Direction;

/// One entry of a SELECT list.
#[derive(Debug, Clone, PartialEq)]
pub enum SelectItem {
    Column {
        column: ColumnRef,
        alias: Option<String>,
    },
    /// Opaque SQL expression.
    Expr { sql: String, alias: Option<String> },
}

impl SelectItem {
    fn write(&self, w: &mut SqlWriter) {
        let alias = match self {
            SelectItem::Column { column, alias } => {
                w.column(column);
                alias
            }
            SelectItem::Expr { sql, alias } => {
                w.push(sql);
                alias
            }
        };
        if let Some(alias) = alias {
            w.push(" AS ");
            w.ident(alias);
        }
    }
}

/// SELECT statement builder.
///
/// ```
/// use proto_core::{ColumnRef, Dialect, Select, TableRef};
///
/// let statement = Select::from(TableRef::new("users", "u"))
///     .column(ColumnRef::qualified("u", "name"))
///     .limit(10)
///     .render(Dialect::SQLite);
/// assert_eq!(statement.sql, r#"SELECT "u"."name" FROM "users" AS "u" LIMIT ?"#);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Select {
    from: TableRef,
    items: Vec<SelectItem>,
    joins: Vec<JoinClause>,
    filters: Vec<Where>,
    group_by: Vec<ColumnRef>,
    order_by: Vec<(ColumnRef, Direction)>,
    limit: Option<u64>,
    offset: Option<u64>,
}

impl Select {
    pub fn from(table: TableRef) -> Self {
        Self {
            from: table,
            items: Vec::new(),
            joins: Vec::new(),
            filters: Vec::new(),
            group_by: Vec::new(),
            order_by: Vec::new(),
            limit: None,
            offset: None,
        }
    }

    pub fn column(mut self, column: ColumnRef) -> Self {
        self.items.push(SelectItem::Column {
            column,
            alias: None,
        });
        self
    }

    pub fn item(mut self, item: SelectItem) -> Self {
        self.items.push(item);
        self
    }

    pub fn expr(mut self, sql: impl Into<String>, alias: Option<String>) -> Self {
        self.items.push(SelectItem::Expr {
            sql: sql.into(),
            alias,
        });
        self
    }

    pub fn join(mut self, join: JoinClause) -> Self {
        self.joins.push(join);
        self
    }

    pub fn filter(mut self, term: Where) -> Self {
        self.filters.push(term);
        self
    }

    pub fn group_by(mut self, column: ColumnRef) -> Self {
        self.group_by.push(column);
        self
    }

    pub fn order_by(mut self, column: ColumnRef, direction: Direction) -> Self {
        self.order_by.push((column, direction));
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn items(&self) -> &[SelectItem] {
        &self.items
    }

    pub fn render(&self, dialect: Dialect) -> SqlStatement {
        let mut w = SqlWriter::new(dialect);
        self.write(&mut w);
        w.finish()
    }

    pub(crate) fn write(&self, w: &mut SqlWriter) {
        w.push("SELECT ");
        if self.items.is_empty() {
            w.push("*");
        }
        for (i, item) in self.items.iter().enumerate() {
            if i > 0 {
                w.push(", ");
            }
            item.write(w);
        }
        w.push(" FROM ");
        w.table(&self.from);
        for join in &self.joins {
            w.push(" ");
            join.write(w);
        }
        write_where(w, &self.filters);
        for (i, column) in self.group_by.iter().enumerate() {
            w.push(if i == 0 { " GROUP BY " } else { ", " });
            w.column(column);
        }
        for (i, (column, direction)) in self.order_by.iter().enumerate() {
            w.push(if i == 0 { " ORDER BY " } else { ", " });
            w.column(column);
            w.push(" ");
            w.push(direction.as_sql());
        }
        match (self.limit, self.offset) {
            (Some(limit), _) => {
                w.push(" LIMIT ");
                w.param(Value::Integer(clamp(limit)));
            }
            (None, Some(_)) => {
                if let Some(unbounded) = w.dialect().unbounded_limit() {
                    w.push(" LIMIT ");
                    w.push(unbounded);
                }
            }
            (None, None) => {}
        }
        if let Some(offset) = self.offset {
            w.push(" OFFSET ");
            w.param(Value::Integer(clamp(offset)));
        }
    }
}

fn clamp(n: u64) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::join::{CompareOp, JoinType};
    use crate::sql::{JoinOn, JoinSource};

    fn users() -> Select {
        Select::from(TableRef::new("users", "u")).column(ColumnRef::qualified("u", "id"))
    }

    #[test]
    fn full_select() {
        let statement = users()
            .item(SelectItem::Column {
                column: ColumnRef::qualified("p", "title"),
                alias: Some("post".into()),
            })
            .join(JoinClause {
                join_type: JoinType::Inner,
                source: JoinSource::Table(TableRef::new("posts", "p")),
                on: JoinOn::Conditions(vec![(
                    ColumnRef::qualified("u", "id"),
                    CompareOp::Eq,
                    ColumnRef::qualified("p", "user_id"),
                )]),
            })
            .filter(Where::eq(ColumnRef::qualified("u", "active"), true))
            .group_by(ColumnRef::qualified("u", "id"))
            .order_by(ColumnRef::qualified("u", "id"), Direction::Desc)
            .limit(5)
            .offset(10)
            .render(Dialect::PostgreSQL);
        assert_eq!(
            statement.sql,
            concat!(
                r#"SELECT "u"."id", "p"."title" AS "post" FROM "users" AS "u" "#,
                r#"INNER JOIN "posts" AS "p" ON "u"."id" = "p"."user_id" "#,
                r#"WHERE "u"."active" = $1 GROUP BY "u"."id" ORDER BY "u"."id" DESC "#,
                "LIMIT $2 OFFSET $3"
            )
        );
        assert_eq!(
            statement.params,
            vec![Value::Bool(true), Value::Integer(5), Value::Integer(10)]
        );
    }

    #[test]
    fn offset_without_limit() {
        let sqlite = users().offset(20).render(Dialect::SQLite);
        assert_eq!(sqlite.sql, r#"SELECT "u"."id" FROM "users" AS "u" LIMIT -1 OFFSET ?"#);

        let mysql = users().offset(20).render(Dialect::MySQL);
        assert!(mysql.sql.ends_with("LIMIT 18446744073709551615 OFFSET ?"));

        let pg = users().offset(20).render(Dialect::PostgreSQL);
        assert!(pg.sql.ends_with(r#""u" OFFSET $1"#));
    }
}
