//! Entity metadata: the static description every record type provides in place
//! of runtime reflection.

use crate::join::GraphBuilder;
use crate::normalize::{FieldCase, to_snake_case};

/// Static table description of an entity.
///
/// ```
/// use proto_core::EntityMetadata;
///
/// const USER: EntityMetadata = EntityMetadata::new("User", "users", "u")
///     .with_fields(&["id", "name", "email"]);
///
/// assert_eq!(USER.id_column, "id");
/// assert_eq!(USER.foreign_key(), "user_id");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntityMetadata {
    /// Short entity name (`"User"`), used for foreign-key and pivot inference.
    pub name: &'static str,
    /// SQL table name.
    pub table: &'static str,
    /// Default table alias.
    pub alias: &'static str,
    /// Primary key column.
    pub id_column: &'static str,
    /// Column names in SELECT order.
    pub fields: &'static [&'static str],
    /// Key convention of records produced for this entity.
    pub case: FieldCase,
}

impl EntityMetadata {
    pub const fn new(name: &'static str, table: &'static str, alias: &'static str) -> Self {
        Self {
            name,
            table,
            alias,
            id_column: "id",
            fields: &[],
            case: FieldCase::Snake,
        }
    }

    pub const fn with_fields(mut self, fields: &'static [&'static str]) -> Self {
        self.fields = fields;
        self
    }

    pub const fn with_id_column(mut self, id_column: &'static str) -> Self {
        self.id_column = id_column;
        self
    }

    /// Records for this entity use camelCase keys.
    pub const fn camel_case(mut self) -> Self {
        self.case = FieldCase::Camel;
        self
    }

    /// `snake_case(name)`: `"BlogPost"` → `"blog_post"`.
    pub fn base_name(&self) -> String {
        to_snake_case(self.name)
    }

    /// Default foreign-key column referencing this entity: `"user_id"`.
    pub fn foreign_key(&self) -> String {
        format!("{}_id", self.base_name())
    }
}

/// A record type that can be queried through the join-graph compiler.
pub trait Entity {
    const METADATA: EntityMetadata;

    /// Declares this entity's relationships.
    ///
    /// Called against a fresh builder for every compilation.
    fn relations(builder: &mut GraphBuilder<'_>) {
        let _ = builder;
    }
}
