//! Correlated JSON aggregation subqueries for to-many relations.
//!
//! A *level* starts at a many descriptor. Its FROM is that descriptor's
//! target, the plain descriptors declared from it become joins, and every many
//! descriptor declared from it (or from one of those joins) starts a nested
//! level whose scalar subquery is embedded into this level's JSON object.

use crate::dialect::QueryContext;
use crate::error::{CompileError, CompileResult};
use crate::join::{ColumnSpec, CompareOp, Descriptor, DescriptorId, JoinGraph, JoinType, Predicate};
use crate::sql::{ColumnRef, JoinClause, JoinOn, JoinSource, Select, Where};

/// A value inside a JSON object constructor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JsonValue {
    Column(ColumnRef),
    Raw(String),
    /// Rendered scalar subquery of a nested level.
    Subquery(String),
}

/// Ordered key/value pairs of one JSON object constructor.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JsonMap {
    entries: Vec<(String, JsonValue)>,
}

impl JsonMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `key`; a key already present in this level is an error.
    pub fn insert(
        &mut self,
        key: impl Into<String>,
        value: JsonValue,
        level: &str,
    ) -> CompileResult<()> {
        let key = key.into();
        if self.entries.iter().any(|(k, _)| *k == key) {
            return Err(CompileError::DuplicateJsonKey {
                key,
                level: level.to_string(),
            });
        }
        self.entries.push((key, value));
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    /// `object('k', v, ...)`
    pub fn render(&self, ctx: &QueryContext) -> String {
        let mut buf = String::with_capacity(64);
        buf.push_str(&ctx.json.object);
        buf.push('(');
        for (i, (key, value)) in self.entries.iter().enumerate() {
            if i > 0 {
                buf.push_str(", ");
            }
            push_string_literal(key, &mut buf);
            buf.push_str(", ");
            match value {
                JsonValue::Column(column) => column.write(ctx.dialect, &mut buf),
                JsonValue::Raw(sql) => buf.push_str(sql),
                JsonValue::Subquery(sql) => buf.push_str(&embed(sql, ctx)),
            }
        }
        buf.push(')');
        buf
    }
}

fn push_string_literal(text: &str, buf: &mut String) {
    buf.push('\'');
    for c in text.chars() {
        if c == '\'' {
            buf.push('\'');
        }
        buf.push(c);
    }
    buf.push('\'');
}

/// `COALESCE((sql), empty)`, re-parsed as JSON where the dialect needs it.
fn embed(sql: &str, ctx: &QueryContext) -> String {
    let coalesced = format!("COALESCE(({sql}), {})", ctx.json.empty_array);
    match &ctx.json.embed {
        Some(function) => format!("{function}({coalesced})"),
        None => coalesced,
    }
}

/// The column pair tying an aggregation to the enclosing query:
/// `outer <op> inner`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Correlation {
    pub outer: ColumnRef,
    pub op: CompareOp,
    pub inner: ColumnRef,
}

/// A top-level aggregation, ready to be joined to the root query.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledAggregation {
    pub root: DescriptorId,
    /// Output key and derived-table alias.
    pub name: String,
    /// Name of the correlation key column inside the derived table.
    pub key: String,
    pub correlation: Correlation,
    pub join_type: JoinType,
    /// `SELECT key, agg FROM ... GROUP BY key`, without parentheses.
    pub subquery: String,
}

impl CompiledAggregation {
    /// `(subquery) AS "name"`
    pub fn fragment(&self, ctx: &QueryContext) -> String {
        format!("({}) AS {}", self.subquery, ctx.dialect.quote_ident(&self.name))
    }

    /// The JSON column read by the outer SELECT; empty relations yield `[]`.
    pub fn select_expr(&self, ctx: &QueryContext) -> String {
        let column = ColumnRef::qualified(self.name.as_str(), self.name.as_str());
        ctx.dialect.json_as_text(format!(
            "COALESCE({}, {})",
            column.to_sql(ctx.dialect),
            ctx.json.empty_array
        ))
    }

    /// Joins the derived table back on `outer <op> "name"."key"`.
    pub fn join_clause(&self) -> JoinClause {
        JoinClause {
            join_type: self.join_type,
            source: JoinSource::Derived {
                sql: self.subquery.clone(),
                alias: self.name.clone(),
            },
            on: JoinOn::Conditions(vec![(
                self.correlation.outer.clone(),
                self.correlation.op,
                ColumnRef::qualified(self.name.as_str(), self.key.as_str()),
            )]),
        }
    }
}

struct Level<'g> {
    root: &'g Descriptor,
    name: String,
    correlation: Correlation,
    joins: Vec<JoinClause>,
    json: JsonMap,
}

impl Level<'_> {
    fn aggregate(&self, ctx: &QueryContext) -> String {
        if self.json.is_empty() {
            return ctx.json.empty_array.to_string();
        }
        format!("{}({})", ctx.json.array_agg, self.json.render(ctx))
    }

    fn select(&self) -> Select {
        self.joins
            .iter()
            .cloned()
            .fold(Select::from(self.root.target.clone()), Select::join)
    }

    /// Derived-table form joined by the root query.
    fn derived(&self, ctx: &QueryContext) -> String {
        let inner = &self.correlation.inner;
        self.select()
            .item(crate::sql::SelectItem::Column {
                column: inner.clone(),
                alias: Some(inner.name.clone()),
            })
            .expr(self.aggregate(ctx), Some(self.name.clone()))
            .group_by(inner.clone())
            .render(ctx.dialect)
            .sql
    }

    /// Scalar form embedded in an enclosing level.
    fn scalar(&self, ctx: &QueryContext) -> String {
        let inner = &self.correlation.inner;
        self.select()
            .expr(self.aggregate(ctx), None)
            .filter(Where::Columns {
                left: self.correlation.outer.clone(),
                op: self.correlation.op,
                right: inner.clone(),
            })
            .group_by(inner.clone())
            .render(ctx.dialect)
            .sql
    }
}

/// Compiles the aggregation rooted at a many descriptor.
pub struct SubqueryCompiler<'g> {
    graph: &'g JoinGraph,
    ctx: &'g QueryContext,
}

impl<'g> SubqueryCompiler<'g> {
    pub fn new(graph: &'g JoinGraph, ctx: &'g QueryContext) -> Self {
        Self { graph, ctx }
    }

    /// `None` when the relation selects no columns at any depth.
    pub fn compile(&self, root: DescriptorId) -> CompileResult<Option<CompiledAggregation>> {
        let Some(level) = self.level(root)? else {
            return Ok(None);
        };
        Ok(Some(CompiledAggregation {
            root,
            subquery: level.derived(self.ctx),
            key: level.correlation.inner.name.clone(),
            join_type: level.root.join_type,
            name: level.name,
            correlation: level.correlation,
        }))
    }

    fn level(&self, id: DescriptorId) -> CompileResult<Option<Level<'g>>> {
        let root = self.graph.get(id);
        if !root.many {
            return Err(unresolvable(root, "relation is not to-many"));
        }
        if root.bridge && root.next.is_none() {
            return Err(unresolvable(root, "pivot has no related target"));
        }
        let correlation = correlation(root)?;

        // The chain holds this level and every level below it. A descriptor
        // belongs here when it was declared from the root or a plain member.
        let mut owners = vec![id];
        let mut members = Vec::new();
        let mut nested = Vec::new();
        for descriptor in self.graph.chain(id) {
            if !descriptor.anchor.is_some_and(|anchor| owners.contains(&anchor)) {
                continue;
            }
            if descriptor.many {
                nested.push(descriptor.id);
            } else {
                owners.push(descriptor.id);
                members.push(descriptor);
            }
        }

        // a bridge is named after the entity it leads to
        let name = match members.first() {
            Some(related) if root.bridge && root.display_alias.is_none() => related.display_name(),
            _ => root.display_name(),
        }
        .to_string();

        let selects_columns =
            !root.columns.is_empty() || members.iter().any(|d| !d.columns.is_empty());
        if !selects_columns && nested.is_empty() {
            return Ok(None);
        }

        let joins = members
            .iter()
            .map(|d| plain_join(d))
            .collect::<CompileResult<Vec<_>>>()?;

        let mut json = JsonMap::new();
        if root.bridge {
            for descriptor in &members {
                insert_columns(&mut json, descriptor, &name)?;
            }
            insert_columns(&mut json, root, &name)?;
        } else {
            insert_columns(&mut json, root, &name)?;
            for descriptor in &members {
                insert_columns(&mut json, descriptor, &name)?;
            }
        }

        for child in nested {
            if let Some(level) = self.level(child)? {
                let sql = level.scalar(self.ctx);
                json.insert(level.name, JsonValue::Subquery(sql), &name)?;
            }
        }

        Ok(Some(Level {
            root,
            name,
            correlation,
            joins,
            json,
        }))
    }
}

/// Compiles one aggregation; see [`SubqueryCompiler::compile`].
pub fn compile_subquery(
    graph: &JoinGraph,
    root: DescriptorId,
    ctx: &QueryContext,
) -> CompileResult<Option<CompiledAggregation>> {
    SubqueryCompiler::new(graph, ctx).compile(root)
}

fn unresolvable(descriptor: &Descriptor, reason: &'static str) -> CompileError {
    CompileError::UnresolvableAggregation {
        table: descriptor.target.table.clone(),
        reason,
    }
}

fn correlation(descriptor: &Descriptor) -> CompileResult<Correlation> {
    match &descriptor.predicate {
        Predicate::On(conditions) if conditions.len() == 1 => {
            let condition = &conditions[0];
            Ok(Correlation {
                outer: ColumnRef::resolve(&condition.left, &descriptor.source.alias),
                op: condition.op,
                inner: ColumnRef::resolve(&condition.right, &descriptor.target.alias),
            })
        }
        Predicate::Using(column) if !column.is_empty() => Ok(Correlation {
            outer: ColumnRef::qualified(descriptor.source.alias.as_str(), column.as_str()),
            op: CompareOp::Eq,
            inner: ColumnRef::qualified(descriptor.target.alias.as_str(), column.as_str()),
        }),
        Predicate::On(conditions) if conditions.len() > 1 => Err(unresolvable(
            descriptor,
            "correlation needs exactly one ON condition",
        )),
        _ => Err(unresolvable(descriptor, "relation has no ON or USING predicate")),
    }
}

fn insert_columns(json: &mut JsonMap, descriptor: &Descriptor, level: &str) -> CompileResult<()> {
    for spec in &descriptor.columns {
        let value = match spec {
            ColumnSpec::Column(column) | ColumnSpec::Aliased { column, .. } => {
                JsonValue::Column(ColumnRef::resolve(column, &descriptor.target.alias))
            }
            ColumnSpec::Raw(sql) => JsonValue::Raw(sql.clone()),
        };
        json.insert(spec.output_name(), value, level)?;
    }
    Ok(())
}

/// The JOIN clause of a plain descriptor.
///
/// Every join except CROSS needs a predicate.
pub(crate) fn plain_join(descriptor: &Descriptor) -> CompileResult<JoinClause> {
    let on = match (&descriptor.join_type, &descriptor.predicate) {
        (JoinType::Cross, _) => JoinOn::None,
        (_, Predicate::On(conditions)) if !conditions.is_empty() => JoinOn::Conditions(
            conditions
                .iter()
                .map(|c| {
                    (
                        ColumnRef::resolve(&c.left, &descriptor.source.alias),
                        c.op,
                        ColumnRef::resolve(&c.right, &descriptor.target.alias),
                    )
                })
                .collect(),
        ),
        (_, Predicate::Using(column)) if !column.is_empty() => JoinOn::Using(column.clone()),
        _ => {
            return Err(CompileError::InvalidJoin {
                table: descriptor.target.table.clone(),
                alias: descriptor.target.alias.clone(),
            });
        }
    };
    Ok(JoinClause {
        join_type: descriptor.join_type,
        source: JoinSource::Table(descriptor.target.clone()),
        on,
    })
}
