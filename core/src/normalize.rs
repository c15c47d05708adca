//! Naming-convention helpers shared by the builder, the compiler and result
//! decoding.
//!
//! Every function here is idempotent: applying it to its own output returns the
//! output unchanged.

use heck::{ToLowerCamelCase, ToSnakeCase};

use crate::join::ColumnSpec;

/// Key convention of an entity's fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FieldCase {
    /// `created_at`
    #[default]
    Snake,
    /// `createdAt`
    Camel,
}

impl FieldCase {
    /// Converts a bare identifier to this case.
    pub fn apply(self, identifier: &str) -> String {
        match self {
            FieldCase::Snake => to_snake_case(identifier),
            FieldCase::Camel => to_camel_case(identifier),
        }
    }
}

/// `createdAt` → `created_at`
pub fn to_snake_case(identifier: &str) -> String {
    identifier.to_snake_case()
}

/// `created_at` → `createdAt`
pub fn to_camel_case(identifier: &str) -> String {
    identifier.to_lower_camel_case()
}

/// Returns the part after the last `.`: `"u.name"` → `"name"`.
pub fn strip_table_prefix(qualified: &str) -> &str {
    match qualified.rfind('.') {
        Some(pos) => &qualified[pos + 1..],
        None => qualified,
    }
}

/// Splits `"u.name"` into `(Some("u"), "name")`.
pub fn split_qualified(qualified: &str) -> (Option<&str>, &str) {
    match qualified.rfind('.') {
        Some(pos) => (Some(&qualified[..pos]), &qualified[pos + 1..]),
        None => (None, qualified),
    }
}

/// Converts the column part of a possibly qualified name, keeping the qualifier.
pub fn convert_column(qualified: &str, case: FieldCase) -> String {
    match split_qualified(qualified) {
        (Some(table), column) => format!("{table}.{}", case.apply(column)),
        (None, column) => case.apply(column),
    }
}

/// Normalizes one column specification.
///
/// Plain and aliased columns have their column part converted; an explicit
/// `alias` argument replaces any alias already present. Raw SQL is passed through
/// untouched.
pub fn format_field(spec: &ColumnSpec, case: FieldCase, alias: Option<&str>) -> ColumnSpec {
    match spec {
        ColumnSpec::Raw(sql) => ColumnSpec::Raw(sql.clone()),
        ColumnSpec::Column(column) => {
            let column = convert_column(column, case);
            match alias {
                Some(alias) => ColumnSpec::Aliased {
                    column,
                    alias: alias.to_string(),
                },
                None => ColumnSpec::Column(column),
            }
        }
        ColumnSpec::Aliased {
            column,
            alias: existing,
        } => ColumnSpec::Aliased {
            column: convert_column(column, case),
            alias: alias.unwrap_or(existing).to_string(),
        },
    }
}
