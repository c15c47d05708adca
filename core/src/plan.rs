//! Statement assembly: root columns, plain joins, aggregation joins and
//! query modifiers combined into one SELECT.

use hashbrown::HashSet;
use smallvec::SmallVec;

use crate::compile::{SubqueryCompiler, plain_join};
use crate::dialect::QueryContext;
use crate::entity::EntityMetadata;
use crate::error::{CompileError, CompileResult};
use crate::join::{ColumnSpec, CompareOp, DescriptorId, JoinGraph, TableRef};
use crate::normalize::{FieldCase, convert_column};
use crate::sql::{ColumnRef, Select, SelectItem, SqlStatement, Value, Where};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

impl Direction {
    pub const fn as_sql(self) -> &'static str {
        match self {
            Direction::Asc => "ASC",
            Direction::Desc => "DESC",
        }
    }
}

/// Comparison of a filter term.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FilterOp {
    #[default]
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Like,
    In,
    IsNull,
    IsNotNull,
}

/// One filter term: `column <op> value(s)`.
///
/// `column` follows the root entity's field case and may be qualified.
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub column: String,
    pub op: FilterOp,
    pub values: SmallVec<[Value; 1]>,
}

impl Filter {
    pub fn new(column: impl Into<String>, op: FilterOp, value: impl Into<Value>) -> Self {
        Self {
            column: column.into(),
            op,
            values: smallvec::smallvec![value.into()],
        }
    }

    pub fn eq(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(column, FilterOp::Eq, value)
    }

    pub fn is_in<I, V>(column: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Self {
            column: column.into(),
            op: FilterOp::In,
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    pub fn is_null(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            op: FilterOp::IsNull,
            values: SmallVec::new(),
        }
    }

    pub fn is_not_null(column: impl Into<String>) -> Self {
        Self {
            op: FilterOp::IsNotNull,
            ..Self::is_null(column)
        }
    }

    fn to_where(&self, column: ColumnRef) -> Where {
        let first = || self.values.first().cloned().unwrap_or_default();
        let compare = |op| Where::Compare {
            column: column.clone(),
            op,
            value: first(),
        };
        match self.op {
            FilterOp::Eq => compare(CompareOp::Eq),
            FilterOp::Ne => compare(CompareOp::Ne),
            FilterOp::Lt => compare(CompareOp::Lt),
            FilterOp::Le => compare(CompareOp::Le),
            FilterOp::Gt => compare(CompareOp::Gt),
            FilterOp::Ge => compare(CompareOp::Ge),
            FilterOp::Like => Where::Like {
                column,
                pattern: first(),
            },
            FilterOp::In => Where::In {
                column,
                values: self.values.to_vec(),
            },
            FilterOp::IsNull => Where::Null {
                column,
                negated: false,
            },
            FilterOp::IsNotNull => Where::Null {
                column,
                negated: true,
            },
        }
    }
}

/// `field BETWEEN start AND end`
#[derive(Debug, Clone, PartialEq)]
pub struct DateRange {
    pub field: String,
    pub start: Value,
    pub end: Value,
}

/// Caller-supplied query modifiers.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Modifiers {
    pub filter: Vec<Filter>,
    pub order_by: Vec<(String, Direction)>,
    pub group_by: Vec<String>,
    pub dates: Option<DateRange>,
    pub offset: Option<u64>,
    pub limit: Option<u64>,
}

impl Modifiers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filter.push(filter);
        self
    }

    /// Equality filters from a column → value map, in iteration order.
    pub fn filter_map<I, K, V>(mut self, map: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        self.filter
            .extend(map.into_iter().map(|(k, v)| Filter::eq(k, v)));
        self
    }

    pub fn order_by(mut self, column: impl Into<String>, direction: Direction) -> Self {
        self.order_by.push((column.into(), direction));
        self
    }

    pub fn group_by(mut self, column: impl Into<String>) -> Self {
        self.group_by.push(column.into());
        self
    }

    pub fn dates(
        mut self,
        field: impl Into<String>,
        start: impl Into<Value>,
        end: impl Into<Value>,
    ) -> Self {
        self.dates = Some(DateRange {
            field: field.into(),
            start: start.into(),
            end: end.into(),
        });
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
}

/// How every descriptor of a graph is emitted.
///
/// Each descriptor is exactly one of: a plain join, an aggregation root, or
/// consumed by an aggregation root's chain.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Classification {
    pub plain: Vec<DescriptorId>,
    pub aggregations: Vec<DescriptorId>,
    pub consumed: Vec<DescriptorId>,
}

impl Classification {
    pub fn is_plain(&self, id: DescriptorId) -> bool {
        self.plain.binary_search(&id).is_ok()
    }

    pub fn is_aggregation(&self, id: DescriptorId) -> bool {
        self.aggregations.binary_search(&id).is_ok()
    }

    pub fn is_consumed(&self, id: DescriptorId) -> bool {
        self.consumed.binary_search(&id).is_ok()
    }
}

/// Splits a graph into plain joins and aggregation roots.
pub fn classify(graph: &JoinGraph) -> Classification {
    let mut consumed = HashSet::new();
    let mut classification = Classification::default();
    for descriptor in graph.iter() {
        if consumed.contains(&descriptor.id()) {
            continue;
        }
        if descriptor.is_many() {
            classification.aggregations.push(descriptor.id());
            consumed.extend(graph.chain(descriptor.id()).map(|d| d.id()));
        } else {
            classification.plain.push(descriptor.id());
        }
    }
    classification.consumed = consumed.into_iter().collect();
    classification.consumed.sort_unstable();
    classification
}

/// The compiled root query.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledQuery {
    pub statement: SqlStatement,
    /// JSON array columns of the result, in SELECT order.
    pub relations: Vec<String>,
    /// Key convention of the root entity.
    pub case: FieldCase,
}

/// Compiles `root`'s relationship graph and `modifiers` into one SELECT.
pub fn compile_plan(
    root: &EntityMetadata,
    graph: &JoinGraph,
    modifiers: &Modifiers,
    ctx: &QueryContext,
) -> CompileResult<CompiledQuery> {
    if let Some(&id) = graph.overflowed().first() {
        return Err(CompileError::UnresolvableAggregation {
            table: graph.get(id).target().table.clone(),
            reason: "relation nesting exceeds the maximum depth",
        });
    }

    let classification = classify(graph);
    let compiler = SubqueryCompiler::new(graph, ctx);

    let mut select = Select::from(TableRef::of(root));
    // record keys, as `Record` will name them
    let mut output: Vec<String> = Vec::with_capacity(root.fields.len());
    for field in root.fields {
        select = select.column(modifier_column(field, root));
        output.push(root.case.apply(field));
    }

    let mut relations = Vec::new();
    for descriptor in graph.iter() {
        let id = descriptor.id();
        if classification.is_plain(id) {
            select = select.join(plain_join(descriptor)?);
            for spec in descriptor.columns() {
                let key = root.case.apply(spec.output_name());
                if output.contains(&key) {
                    return Err(CompileError::DuplicateJsonKey {
                        key,
                        level: root.table.to_string(),
                    });
                }
                select = select.item(select_item(spec, &descriptor.target().alias));
                output.push(key);
            }
        } else if classification.is_aggregation(id) {
            let Some(aggregation) = compiler.compile(id)? else {
                continue;
            };
            let key = root.case.apply(&aggregation.name);
            if output.contains(&key) {
                return Err(CompileError::DuplicateJsonKey {
                    key,
                    level: root.table.to_string(),
                });
            }
            select = select
                .expr(aggregation.select_expr(ctx), Some(aggregation.name.clone()))
                .join(aggregation.join_clause());
            output.push(key);
            relations.push(aggregation.name);
        }
    }

    let column = |name: &str| modifier_column(name, root);
    for filter in &modifiers.filter {
        select = select.filter(filter.to_where(column(&filter.column)));
    }
    if let Some(range) = &modifiers.dates {
        select = select.filter(Where::Between {
            column: column(&range.field),
            start: range.start.clone(),
            end: range.end.clone(),
        });
    }
    for name in &modifiers.group_by {
        select = select.group_by(column(name));
    }
    for (name, direction) in &modifiers.order_by {
        select = select.order_by(column(name), *direction);
    }
    if let Some(limit) = modifiers.limit {
        select = select.limit(limit);
    }
    if let Some(offset) = modifiers.offset {
        select = select.offset(offset);
    }

    let statement = select.render(ctx.dialect);
    crate::proto_trace_compile!(
        root.table,
        classification.plain.len(),
        classification.aggregations.len()
    );
    Ok(CompiledQuery {
        statement,
        relations,
        case: root.case,
    })
}

fn select_item(spec: &ColumnSpec, alias: &str) -> SelectItem {
    match spec {
        ColumnSpec::Column(column) => SelectItem::Column {
            column: ColumnRef::resolve(column, alias),
            alias: None,
        },
        ColumnSpec::Aliased { column, alias: name } => SelectItem::Column {
            column: ColumnRef::resolve(column, alias),
            alias: Some(name.clone()),
        },
        ColumnSpec::Raw(sql) => SelectItem::Expr {
            sql: sql.clone(),
            alias: None,
        },
    }
}

/// Caller names follow the root entity's case and default to its alias.
fn modifier_column(name: &str, root: &EntityMetadata) -> ColumnRef {
    let column = match root.case {
        FieldCase::Camel => convert_column(name, FieldCase::Snake),
        FieldCase::Snake => name.to_string(),
    };
    ColumnRef::resolve(&column, root.alias)
}
