//! Declaration-time builder for join graphs.

use smallvec::smallvec;

use super::pivot::{self, Pivot};
use super::{
    ColumnSpec, CompareOp, Condition, Descriptor, DescriptorId, JoinGraph, JoinType, Predicate,
    TableRef,
};
use crate::entity::{Entity, EntityMetadata};
use crate::normalize::{FieldCase, format_field};

/// Nesting depth at which [`DescriptorMut::nest`] stops expanding declarations.
pub const MAX_NESTING_DEPTH: usize = 8;

/// An entity's relationship declaration.
pub(crate) type Declare = fn(&mut GraphBuilder<'_>);

/// Appends descriptors to a [`JoinGraph`].
///
/// Holds the current source context: new descriptors join *from* `source` and,
/// while a foreign-key context is set, default to
/// `source.<id> = target.<foreign_key>`.
pub struct GraphBuilder<'g> {
    pub(super) graph: &'g mut JoinGraph,
    pub(super) source: TableRef,
    pub(super) source_id: String,
    pub(super) context: Option<EntityMetadata>,
    pub(super) foreign_key: Option<String>,
    pub(super) pending: Option<DescriptorId>,
    pub(super) anchor: Option<DescriptorId>,
    pub(super) depth: usize,
}

impl<'g> GraphBuilder<'g> {
    pub(crate) fn root(graph: &'g mut JoinGraph, meta: EntityMetadata) -> Self {
        Self {
            graph,
            source: TableRef::of(&meta),
            source_id: meta.id_column.to_string(),
            context: Some(meta),
            foreign_key: Some(meta.foreign_key()),
            pending: None,
            anchor: None,
            depth: 0,
        }
    }

    pub fn source(&self) -> &TableRef {
        &self.source
    }

    /// Foreign-key column used by default ON predicates.
    pub fn foreign_key(&self) -> Option<&str> {
        self.foreign_key.as_deref()
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Makes `E` the foreign-key context: later joins default to
    /// `source.id = target.<snake(E)>_id`.
    pub fn set_foreign_key_context<E: Entity>(&mut self) -> &mut Self {
        self.context = Some(E::METADATA);
        self.foreign_key = Some(E::METADATA.foreign_key());
        self
    }

    /// Later joins get no default predicate.
    pub fn clear_foreign_key_context(&mut self) -> &mut Self {
        self.foreign_key = None;
        self
    }

    /// INNER JOIN on `table`, aliased by its own name.
    pub fn join(&mut self, table: &str) -> DescriptorMut<'_> {
        self.join_as(table, table)
    }

    /// INNER JOIN on `table AS alias`.
    pub fn join_as(&mut self, table: &str, alias: &str) -> DescriptorMut<'_> {
        self.add(JoinType::Inner, TableRef::new(table, alias), None)
    }

    pub fn left(&mut self, table: &str) -> DescriptorMut<'_> {
        self.join(table).join_type(JoinType::Left)
    }

    pub fn right(&mut self, table: &str) -> DescriptorMut<'_> {
        self.join(table).join_type(JoinType::Right)
    }

    pub fn outer(&mut self, table: &str) -> DescriptorMut<'_> {
        self.join(table).join_type(JoinType::Outer)
    }

    pub fn cross(&mut self, table: &str) -> DescriptorMut<'_> {
        self.join(table).join_type(JoinType::Cross)
    }

    /// To-one relation on `T`, LEFT JOIN by default.
    pub fn one<T: Entity>(&mut self) -> DescriptorMut<'_> {
        self.add(
            JoinType::Left,
            TableRef::of(&T::METADATA),
            Some((T::METADATA, T::relations as Declare)),
        )
    }

    /// To-many relation on `T`, aggregated into a JSON array.
    pub fn many<T: Entity>(&mut self) -> DescriptorMut<'_> {
        self.one::<T>().many()
    }

    /// Many-to-many relation on `T` through the conventionally named pivot.
    ///
    /// Returns the related descriptor; its predecessor is the pivot.
    pub fn belongs_to_many<T: Entity>(&mut self) -> DescriptorMut<'_> {
        self.belongs_to_many_with::<T>(Pivot::default())
    }

    /// Many-to-many relation on `T` with explicit pivot settings.
    pub fn belongs_to_many_with<T: Entity>(&mut self, pivot: Pivot) -> DescriptorMut<'_> {
        pivot::wire::<T>(self, pivot)
    }

    /// A builder over the same graph whose source context is `table AS alias`.
    ///
    /// Any pending chain link is shared, so descriptors added through either
    /// builder extend the same chain.
    pub fn link(&mut self, table: &str, alias: &str) -> GraphBuilder<'_> {
        GraphBuilder {
            graph: &mut *self.graph,
            source: TableRef::new(table, alias),
            source_id: "id".to_string(),
            context: None,
            foreign_key: None,
            pending: self.pending,
            anchor: self.anchor,
            depth: self.depth,
        }
    }

    /// Snake-case base name of the source context (`"user"`).
    pub(super) fn self_base(&self) -> String {
        if let Some(meta) = &self.context {
            return meta.base_name();
        }
        match self.foreign_key.as_deref().and_then(|fk| fk.strip_suffix("_id")) {
            Some(base) => base.to_string(),
            None => self.source.table.clone(),
        }
    }

    /// Predecessor for the next descriptor of this builder's chain.
    pub(super) fn chain_link(&self) -> Option<DescriptorId> {
        self.pending
    }

    pub(super) fn advance(&mut self, id: DescriptorId) {
        if self.pending.is_some() {
            self.pending = Some(id);
        }
    }

    fn default_predicate(&self) -> Predicate {
        match &self.foreign_key {
            Some(fk) => Predicate::on(Condition::eq(self.source_id.clone(), fk.clone())),
            None => Predicate::None,
        }
    }

    fn add(
        &mut self,
        join_type: JoinType,
        target: TableRef,
        related: Option<(EntityMetadata, Declare)>,
    ) -> DescriptorMut<'_> {
        let mut descriptor = Descriptor::new(join_type, self.source.clone(), target);
        descriptor.predicate = self.default_predicate();
        descriptor.entity = related.map(|(meta, _)| meta);
        descriptor.anchor = self.anchor;
        descriptor.prev = self.chain_link();
        let id = self.graph.push(descriptor);
        self.advance(id);
        DescriptorMut::new(&mut *self.graph, id, self.depth, related.map(|(_, d)| d))
    }
}

/// Declaration handle for one freshly created descriptor.
///
/// Configures predicate, columns and naming; the source and target of the
/// descriptor cannot be changed.
pub struct DescriptorMut<'a> {
    graph: &'a mut JoinGraph,
    id: DescriptorId,
    depth: usize,
    relations: Option<Declare>,
}

impl<'a> DescriptorMut<'a> {
    pub(super) fn new(
        graph: &'a mut JoinGraph,
        id: DescriptorId,
        depth: usize,
        relations: Option<Declare>,
    ) -> Self {
        Self {
            graph,
            id,
            depth,
            relations,
        }
    }

    pub fn id(&self) -> DescriptorId {
        self.id
    }

    pub fn descriptor(&self) -> &Descriptor {
        self.graph.get(self.id)
    }

    /// The descriptor this one was chained after (the pivot of a many-to-many).
    pub fn predecessor(&self) -> Option<DescriptorId> {
        self.descriptor().prev
    }

    fn node(&mut self) -> &mut Descriptor {
        self.graph.node_mut(self.id)
    }

    /// `ON source.left = target.right`, replacing any predicate.
    pub fn on(self, left: &str, right: &str) -> Self {
        self.on_op(left, CompareOp::Eq, right)
    }

    /// `ON source.left <op> target.right`, replacing any predicate.
    pub fn on_op(mut self, left: &str, op: CompareOp, right: &str) -> Self {
        self.node().predicate = Predicate::on(Condition::new(left, op, right));
        self
    }

    /// Adds an ON condition; a USING predicate is replaced.
    pub fn and_on(mut self, left: &str, op: CompareOp, right: &str) -> Self {
        let condition = Condition::new(left, op, right);
        let node = self.node();
        match &mut node.predicate {
            Predicate::On(conditions) => conditions.push(condition),
            predicate => *predicate = Predicate::On(smallvec![condition]),
        }
        self
    }

    /// `USING (column)`, replacing any ON conditions.
    pub fn using(mut self, column: &str) -> Self {
        self.node().predicate = Predicate::Using(column.to_string());
        self
    }

    /// Removes the predicate, including the default one.
    pub fn no_predicate(mut self) -> Self {
        self.node().predicate = Predicate::None;
        self
    }

    /// Appends selected columns, in order.
    pub fn fields<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let entity = self.descriptor().entity;
        let specs: Vec<_> = columns
            .into_iter()
            .map(|c| column_for(entity.as_ref(), ColumnSpec::Column(c.as_ref().to_string())))
            .collect();
        self.node().columns.extend(specs);
        self
    }

    /// Appends `column AS alias`.
    pub fn field_as(mut self, column: &str, alias: &str) -> Self {
        let entity = self.descriptor().entity;
        let spec = column_for(
            entity.as_ref(),
            ColumnSpec::Aliased {
                column: column.to_string(),
                alias: alias.to_string(),
            },
        );
        self.node().columns.push(spec);
        self
    }

    /// Appends a raw SQL expression.
    pub fn raw(mut self, sql: &str) -> Self {
        self.node().columns.push(ColumnSpec::Raw(sql.to_string()));
        self
    }

    /// Selects every declared field of the target entity.
    pub fn all_fields(mut self) -> Self {
        let entity = self.descriptor().entity;
        if let Some(meta) = entity {
            let columns = meta
                .fields
                .iter()
                .map(|f| column_for(Some(&meta), ColumnSpec::Column((*f).to_string())));
            self.node().columns.extend(columns);
        }
        self
    }

    /// Output name of this branch (JSON key or subquery alias).
    pub fn named(mut self, alias: &str) -> Self {
        self.node().display_alias = Some(alias.to_string());
        self
    }

    pub fn join_type(mut self, join_type: JoinType) -> Self {
        let node = self.node();
        node.join_type = join_type;
        if join_type == JoinType::Cross {
            node.predicate = Predicate::None;
        }
        self
    }

    pub fn inner(self) -> Self {
        self.join_type(JoinType::Inner)
    }

    pub fn left(self) -> Self {
        self.join_type(JoinType::Left)
    }

    /// Marks the relation as to-many.
    pub fn many(mut self) -> Self {
        self.node().many = true;
        self
    }

    /// Continues declaring from this descriptor's target.
    pub fn link(self) -> GraphBuilder<'a> {
        child(self.graph, self.id, self.depth)
    }

    /// Runs the target entity's own relationship declaration from this
    /// descriptor.
    pub fn nest(mut self) -> Self {
        let Some(relations) = self.relations else {
            return self;
        };
        if self.depth + 1 > MAX_NESTING_DEPTH {
            self.graph.mark_overflow(self.id);
            return self;
        }
        {
            let mut builder = child(&mut *self.graph, self.id, self.depth);
            relations(&mut builder);
        }
        self
    }
}

fn child(graph: &mut JoinGraph, id: DescriptorId, depth: usize) -> GraphBuilder<'_> {
    let node = graph.get(id);
    let source = node.target.clone();
    let pending = node.in_chain().then_some(id);
    let context = node.entity;
    GraphBuilder {
        graph,
        source,
        source_id: context.map_or_else(|| "id".to_string(), |m| m.id_column.to_string()),
        foreign_key: context.map(|m| m.foreign_key()),
        context,
        pending,
        anchor: Some(id),
        depth: depth + 1,
    }
}

/// Caller field names follow the entity's case; columns are snake case.
pub(super) fn column_for(entity: Option<&EntityMetadata>, spec: ColumnSpec) -> ColumnSpec {
    match entity {
        Some(meta) if meta.case == FieldCase::Camel => format_field(&spec, FieldCase::Snake, None),
        _ => spec,
    }
}
