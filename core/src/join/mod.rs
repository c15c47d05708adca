//! Relationship descriptors and the join graph they form.
//!
//! A [`JoinGraph`] is an arena of [`Descriptor`]s filled by a [`GraphBuilder`]
//! while an entity declares its relationships. Descriptors of a to-many relation
//! form singly linked chains (root → pivot → related → …); each node records
//! its predecessor when it is created and the forward `next` links are derived
//! once the declaration is finished.

mod builder;
mod pivot;

pub use builder::{DescriptorMut, GraphBuilder, MAX_NESTING_DEPTH};
pub use pivot::{Pivot, pivot_keys, pivot_table_name};

use smallvec::{SmallVec, smallvec};

use crate::entity::{Entity, EntityMetadata};
use crate::normalize::strip_table_prefix;

// =============================================================================
// Join Type Enum
// =============================================================================

/// The type of JOIN operation
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum JoinType {
    #[default]
    Inner,
    Left,
    Right,
    /// Full outer join
    Outer,
    Cross,
}

impl JoinType {
    pub const fn as_sql(self) -> &'static str {
        match self {
            JoinType::Inner => "INNER JOIN",
            JoinType::Left => "LEFT JOIN",
            JoinType::Right => "RIGHT JOIN",
            JoinType::Outer => "FULL OUTER JOIN",
            JoinType::Cross => "CROSS JOIN",
        }
    }
}

/// Comparison operator of an ON condition
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum CompareOp {
    #[default]
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CompareOp {
    pub const fn as_sql(self) -> &'static str {
        match self {
            CompareOp::Eq => "=",
            CompareOp::Ne => "<>",
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
            CompareOp::Gt => ">",
            CompareOp::Ge => ">=",
        }
    }
}

// =============================================================================
// Predicates and columns
// =============================================================================

/// One ON tuple.
///
/// `left` is resolved against the descriptor's source alias and `right` against
/// its target alias, unless either is already qualified (`"p.author_id"`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Condition {
    pub left: String,
    pub op: CompareOp,
    pub right: String,
}

impl Condition {
    pub fn new(left: impl Into<String>, op: CompareOp, right: impl Into<String>) -> Self {
        Self {
            left: left.into(),
            op,
            right: right.into(),
        }
    }

    pub fn eq(left: impl Into<String>, right: impl Into<String>) -> Self {
        Self::new(left, CompareOp::Eq, right)
    }
}

/// Join predicate: explicit ON conditions or a USING column, never both.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Predicate {
    #[default]
    None,
    On(SmallVec<[Condition; 2]>),
    Using(String),
}

impl Predicate {
    pub fn on(condition: Condition) -> Self {
        Predicate::On(smallvec![condition])
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Predicate::None => true,
            Predicate::On(conditions) => conditions.is_empty(),
            Predicate::Using(column) => column.is_empty(),
        }
    }

    /// ON conditions, empty for USING or no predicate.
    pub fn conditions(&self) -> &[Condition] {
        match self {
            Predicate::On(conditions) => conditions,
            Predicate::None | Predicate::Using(_) => &[],
        }
    }
}

/// A selected column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnSpec {
    /// Column name, optionally qualified: `"name"`, `"r.name"`.
    Column(String),
    /// Opaque SQL expression, passed through unmodified.
    Raw(String),
    /// Column selected under another name.
    Aliased { column: String, alias: String },
}

impl ColumnSpec {
    /// The bare name this column is known by in output rows and JSON objects.
    pub fn output_name(&self) -> &str {
        match self {
            ColumnSpec::Column(column) => strip_table_prefix(column),
            ColumnSpec::Raw(sql) => sql,
            ColumnSpec::Aliased { alias, .. } => alias,
        }
    }
}

/// A table and the alias it is referenced by.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct TableRef {
    pub table: String,
    pub alias: String,
}

impl TableRef {
    pub fn new(table: impl Into<String>, alias: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            alias: alias.into(),
        }
    }

    pub fn of(meta: &EntityMetadata) -> Self {
        Self::new(meta.table, meta.alias)
    }
}

// =============================================================================
// Descriptor
// =============================================================================

/// Index of a descriptor inside its [`JoinGraph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DescriptorId(pub(crate) usize);

impl DescriptorId {
    pub const fn index(self) -> usize {
        self.0
    }
}

/// One typed edge of the relationship graph.
///
/// Source and target are fixed when the descriptor is created.
#[derive(Debug, Clone)]
pub struct Descriptor {
    pub(crate) id: DescriptorId,
    pub(crate) join_type: JoinType,
    pub(crate) source: TableRef,
    pub(crate) target: TableRef,
    pub(crate) predicate: Predicate,
    pub(crate) columns: Vec<ColumnSpec>,
    pub(crate) display_alias: Option<String>,
    pub(crate) many: bool,
    pub(crate) bridge: bool,
    pub(crate) entity: Option<EntityMetadata>,
    pub(crate) anchor: Option<DescriptorId>,
    pub(crate) prev: Option<DescriptorId>,
    pub(crate) next: Option<DescriptorId>,
}

impl Descriptor {
    pub(crate) fn new(join_type: JoinType, source: TableRef, target: TableRef) -> Self {
        Self {
            id: DescriptorId(0),
            join_type,
            source,
            target,
            predicate: Predicate::None,
            columns: Vec::new(),
            display_alias: None,
            many: false,
            bridge: false,
            entity: None,
            anchor: None,
            prev: None,
            next: None,
        }
    }

    pub fn id(&self) -> DescriptorId {
        self.id
    }

    pub fn join_type(&self) -> JoinType {
        self.join_type
    }

    pub fn source(&self) -> &TableRef {
        &self.source
    }

    pub fn target(&self) -> &TableRef {
        &self.target
    }

    pub fn predicate(&self) -> &Predicate {
        &self.predicate
    }

    pub fn columns(&self) -> &[ColumnSpec] {
        &self.columns
    }

    pub fn display_alias(&self) -> Option<&str> {
        self.display_alias.as_deref()
    }

    /// Name of this branch in the output: the display alias, else the target table.
    pub fn display_name(&self) -> &str {
        strip_table_prefix(self.display_alias.as_deref().unwrap_or(&self.target.table))
    }

    /// Cardinality "many": one source row may match several target rows.
    pub fn is_many(&self) -> bool {
        self.many
    }

    /// Pivot step of a many-to-many relation; aggregates its successor.
    pub fn is_bridge(&self) -> bool {
        self.bridge
    }

    /// The entity on the target side, when declared through an entity type.
    pub fn entity(&self) -> Option<&EntityMetadata> {
        self.entity.as_ref()
    }

    /// The descriptor whose target this one was declared from; `None` at the root.
    ///
    /// Unlike `prev`, this follows the declaration tree, so sibling relations
    /// of one level share an anchor even though their chain is linear.
    pub fn anchor(&self) -> Option<DescriptorId> {
        self.anchor
    }

    pub fn prev(&self) -> Option<DescriptorId> {
        self.prev
    }

    pub fn next(&self) -> Option<DescriptorId> {
        self.next
    }

    /// Whether this descriptor takes part in a multiplicity chain.
    pub fn in_chain(&self) -> bool {
        self.many || self.prev.is_some()
    }
}

// =============================================================================
// Join graph
// =============================================================================

/// The descriptor list produced by one relationship declaration.
#[derive(Debug, Clone, Default)]
pub struct JoinGraph {
    root: TableRef,
    descriptors: Vec<Descriptor>,
    successors: Vec<Option<DescriptorId>>,
    overflow: Vec<DescriptorId>,
}

impl JoinGraph {
    /// Runs `E::relations` against a fresh builder rooted at `E`.
    pub fn declare<E: Entity>() -> Self {
        Self::build::<E>(E::relations)
    }

    /// Runs an ad-hoc declaration rooted at `E`.
    pub fn build<E: Entity>(declare: impl FnOnce(&mut GraphBuilder<'_>)) -> Self {
        let mut graph = JoinGraph {
            root: TableRef::of(&E::METADATA),
            ..Default::default()
        };
        {
            let mut builder = GraphBuilder::root(&mut graph, E::METADATA);
            declare(&mut builder);
        }
        graph.seal();
        graph
    }

    pub fn root(&self) -> &TableRef {
        &self.root
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    pub fn get(&self, id: DescriptorId) -> &Descriptor {
        &self.descriptors[id.0]
    }

    /// Descriptors in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &Descriptor> {
        self.descriptors.iter()
    }

    /// Successors of `id`, following `next` links.
    pub fn chain(&self, id: DescriptorId) -> Chain<'_> {
        Chain {
            graph: self,
            current: id,
        }
    }

    /// Descriptors whose nested declarations were cut off at [`MAX_NESTING_DEPTH`].
    pub fn overflowed(&self) -> &[DescriptorId] {
        &self.overflow
    }

    /// Appends a descriptor, attaching it after the tail of its predecessor's
    /// chain so chains never branch.
    pub(crate) fn push(&mut self, mut descriptor: Descriptor) -> DescriptorId {
        let id = DescriptorId(self.descriptors.len());
        descriptor.id = id;
        if let Some(prev) = descriptor.prev {
            let tail = self.tail(prev);
            descriptor.prev = Some(tail);
            self.successors[tail.0] = Some(id);
        }
        self.descriptors.push(descriptor);
        self.successors.push(None);
        id
    }

    pub(crate) fn node_mut(&mut self, id: DescriptorId) -> &mut Descriptor {
        &mut self.descriptors[id.0]
    }

    pub(crate) fn mark_overflow(&mut self, id: DescriptorId) {
        if !self.overflow.contains(&id) {
            self.overflow.push(id);
        }
    }

    fn tail(&self, mut id: DescriptorId) -> DescriptorId {
        while let Some(next) = self.successors[id.0] {
            id = next;
        }
        id
    }

    fn seal(&mut self) {
        for (descriptor, next) in self.descriptors.iter_mut().zip(&self.successors) {
            descriptor.next = *next;
        }
    }
}

/// Iterator over the forward chain of a descriptor.
///
/// Successors always have a higher index than their predecessor, so the walk
/// visits each descriptor at most once and ends within `graph.len()` steps.
pub struct Chain<'g> {
    graph: &'g JoinGraph,
    current: DescriptorId,
}

impl<'g> Iterator for Chain<'g> {
    type Item = &'g Descriptor;

    fn next(&mut self) -> Option<Self::Item> {
        let next = self.graph.get(self.current).next?;
        if next <= self.current {
            return None;
        }
        self.current = next;
        Some(self.graph.get(next))
    }
}
