//! Many-to-many wiring: root → pivot → related.

use super::builder::{Declare, DescriptorMut, GraphBuilder, column_for};
use super::{ColumnSpec, Condition, Descriptor, JoinType, Predicate, TableRef};
use crate::entity::Entity;

/// Explicit pivot settings for [`GraphBuilder::belongs_to_many_with`].
///
/// Every unset field falls back to the naming convention.
#[derive(Debug, Clone, Default)]
pub struct Pivot {
    table: Option<String>,
    alias: Option<String>,
    self_key: Option<String>,
    other_key: Option<String>,
    columns: Vec<String>,
    pivot_columns: Vec<String>,
}

impl Pivot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pivot table name.
    pub fn table(mut self, table: &str) -> Self {
        self.table = Some(table.to_string());
        self
    }

    /// Pivot table alias.
    pub fn alias(mut self, alias: &str) -> Self {
        self.alias = Some(alias.to_string());
        self
    }

    /// Pivot column referencing the declaring entity.
    pub fn self_key(mut self, column: &str) -> Self {
        self.self_key = Some(column.to_string());
        self
    }

    /// Pivot column referencing the related entity.
    pub fn other_key(mut self, column: &str) -> Self {
        self.other_key = Some(column.to_string());
        self
    }

    /// Related columns to select instead of all of them.
    pub fn columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.columns
            .extend(columns.into_iter().map(|c| c.as_ref().to_string()));
        self
    }

    /// Extra pivot columns merged into each related object.
    pub fn pivot_columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.pivot_columns
            .extend(columns.into_iter().map(|c| c.as_ref().to_string()));
        self
    }
}

/// Default pivot table: both base names sorted, joined by `_`, pluralized.
///
/// ```
/// use proto_core::join::pivot_table_name;
///
/// assert_eq!(pivot_table_name("user", "role"), "role_users");
/// assert_eq!(pivot_table_name("role", "user"), "role_users");
/// ```
pub fn pivot_table_name(self_base: &str, other_base: &str) -> String {
    let (first, second) = if self_base <= other_base {
        (self_base, other_base)
    } else {
        (other_base, self_base)
    };
    format!("{first}_{second}s")
}

/// Default pivot foreign keys: `(self_base_id, other_base_id)`.
pub fn pivot_keys(self_base: &str, other_base: &str) -> (String, String) {
    (format!("{self_base}_id"), format!("{other_base}_id"))
}

pub(super) fn wire<'b, T: Entity>(
    builder: &'b mut GraphBuilder<'_>,
    pivot: Pivot,
) -> DescriptorMut<'b> {
    let related = T::METADATA;
    let self_base = builder.self_base();
    let other_base = related.base_name();
    let (default_self_key, default_other_key) = pivot_keys(&self_base, &other_base);

    let table = pivot
        .table
        .unwrap_or_else(|| pivot_table_name(&self_base, &other_base));
    let alias = pivot.alias.unwrap_or_else(|| table.clone());
    let pivot_ref = TableRef::new(table, alias);

    let mut bridge = Descriptor::new(JoinType::Left, builder.source.clone(), pivot_ref.clone());
    bridge.predicate = Predicate::on(Condition::eq(
        builder.source_id.clone(),
        pivot.self_key.unwrap_or(default_self_key),
    ));
    bridge.columns = pivot.pivot_columns.into_iter().map(ColumnSpec::Column).collect();
    bridge.many = true;
    bridge.bridge = true;
    bridge.anchor = builder.anchor;
    bridge.prev = builder.chain_link();
    let bridge_id = builder.graph.push(bridge);

    let mut target = Descriptor::new(JoinType::Left, pivot_ref, TableRef::of(&related));
    target.predicate = Predicate::on(Condition::eq(
        pivot.other_key.unwrap_or(default_other_key),
        related.id_column,
    ));
    let columns = if pivot.columns.is_empty() {
        related.fields.iter().map(|f| (*f).to_string()).collect()
    } else {
        pivot.columns
    };
    target.columns = columns
        .into_iter()
        .map(|c| column_for(Some(&related), ColumnSpec::Column(c)))
        .collect();
    target.entity = Some(related);
    target.anchor = Some(bridge_id);
    target.prev = Some(bridge_id);
    let target_id = builder.graph.push(target);
    builder.advance(target_id);

    DescriptorMut::new(
        &mut *builder.graph,
        target_id,
        builder.depth,
        Some(T::relations as Declare),
    )
}
