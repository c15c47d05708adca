//! SQL dialects and the JSON aggregation function table.

use std::borrow::Cow;

/// SQL dialect for database-specific rendering
///
/// Each dialect has different placeholder syntax, identifier quoting and JSON
/// function names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Dialect {
    /// SQLite - uses `?` positional placeholders
    #[default]
    SQLite,

    /// PostgreSQL - uses `$1, $2, ...` numbered placeholders
    #[cfg_attr(feature = "serde", serde(alias = "postgres"))]
    PostgreSQL,

    /// MySQL - uses `?` positional placeholders and backtick identifiers
    MySQL,
}

impl Dialect {
    /// Returns `true` if this dialect uses numbered placeholders (`$1, $2, ...`)
    #[inline]
    #[must_use]
    pub const fn uses_numbered_placeholders(&self) -> bool {
        matches!(self, Dialect::PostgreSQL)
    }

    /// Parse a dialect from a string (case-insensitive)
    ///
    /// ```
    /// use proto_core::Dialect;
    ///
    /// assert_eq!(Dialect::parse("sqlite"), Some(Dialect::SQLite));
    /// assert_eq!(Dialect::parse("pg"), Some(Dialect::PostgreSQL));
    /// assert_eq!(Dialect::parse("oracle"), None);
    /// ```
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        if s.eq_ignore_ascii_case("sqlite") {
            Some(Dialect::SQLite)
        } else if s.eq_ignore_ascii_case("postgresql")
            || s.eq_ignore_ascii_case("postgres")
            || s.eq_ignore_ascii_case("pg")
        {
            Some(Dialect::PostgreSQL)
        } else if s.eq_ignore_ascii_case("mysql") {
            Some(Dialect::MySQL)
        } else {
            None
        }
    }

    /// Renders a placeholder for this dialect with the given 1-based index.
    ///
    /// Returns `Cow::Borrowed("?")` for SQLite/MySQL,
    /// `Cow::Owned` for PostgreSQL numbered placeholders.
    #[inline]
    pub fn render_placeholder(&self, index: usize) -> Cow<'static, str> {
        match self {
            Dialect::PostgreSQL => Cow::Owned(format!("${}", index)),
            Dialect::SQLite | Dialect::MySQL => Cow::Borrowed("?"),
        }
    }

    /// Appends a quoted identifier: `"name"` (or `` `name` `` on MySQL).
    ///
    /// Embedded quote characters are doubled.
    pub fn write_ident(&self, name: &str, buf: &mut String) {
        let quote = match self {
            Dialect::MySQL => '`',
            Dialect::SQLite | Dialect::PostgreSQL => '"',
        };
        buf.push(quote);
        for c in name.chars() {
            if c == quote {
                buf.push(quote);
            }
            buf.push(c);
        }
        buf.push(quote);
    }

    /// Returns a quoted identifier.
    pub fn quote_ident(&self, name: &str) -> String {
        let mut buf = String::with_capacity(name.len() + 2);
        self.write_ident(name, &mut buf);
        buf
    }

    /// Wraps an aggregation expression so drivers read it back as text.
    pub fn json_as_text(&self, expr: String) -> String {
        match self {
            Dialect::PostgreSQL => format!("{expr}::text"),
            Dialect::SQLite | Dialect::MySQL => expr,
        }
    }

    /// The LIMIT value used when only OFFSET is requested, if the dialect needs one.
    pub const fn unbounded_limit(&self) -> Option<&'static str> {
        match self {
            Dialect::SQLite => Some("-1"),
            Dialect::MySQL => Some("18446744073709551615"),
            Dialect::PostgreSQL => None,
        }
    }
}

impl std::fmt::Display for Dialect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Dialect::SQLite => "sqlite",
            Dialect::PostgreSQL => "postgresql",
            Dialect::MySQL => "mysql",
        })
    }
}

/// The function names used to build aggregation columns.
///
/// The compiler never hard-codes JSON syntax; swapping this table retargets the
/// generated SQL to another JSON aggregation dialect.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct JsonFunctions {
    /// Aggregate turning rows into one JSON array, e.g. `JSON_ARRAYAGG`.
    pub array_agg: Cow<'static, str>,
    /// Object constructor taking alternating key/value arguments, e.g. `JSON_OBJECT`.
    pub object: Cow<'static, str>,
    /// Literal for an empty JSON array, e.g. `JSON_ARRAY()`.
    pub empty_array: Cow<'static, str>,
    /// Function re-parsing a nested subquery result as JSON, when the dialect
    /// loses the JSON type across subquery boundaries.
    #[cfg_attr(feature = "serde", serde(default))]
    pub embed: Option<Cow<'static, str>>,
}

impl JsonFunctions {
    /// SQLite JSON1: `json_group_array` / `json_object`
    pub const SQLITE: Self = Self {
        array_agg: Cow::Borrowed("json_group_array"),
        object: Cow::Borrowed("json_object"),
        empty_array: Cow::Borrowed("'[]'"),
        embed: Some(Cow::Borrowed("json")),
    };

    /// PostgreSQL: `json_agg` / `json_build_object`
    pub const POSTGRES: Self = Self {
        array_agg: Cow::Borrowed("json_agg"),
        object: Cow::Borrowed("json_build_object"),
        empty_array: Cow::Borrowed("'[]'::json"),
        embed: None,
    };

    /// MySQL: `JSON_ARRAYAGG` / `JSON_OBJECT`
    pub const MYSQL: Self = Self {
        array_agg: Cow::Borrowed("JSON_ARRAYAGG"),
        object: Cow::Borrowed("JSON_OBJECT"),
        empty_array: Cow::Borrowed("JSON_ARRAY()"),
        embed: None,
    };

    /// The default function table for a dialect.
    pub const fn for_dialect(dialect: Dialect) -> Self {
        match dialect {
            Dialect::SQLite => Self::SQLITE,
            Dialect::PostgreSQL => Self::POSTGRES,
            Dialect::MySQL => Self::MYSQL,
        }
    }
}

impl Default for JsonFunctions {
    fn default() -> Self {
        Self::SQLITE
    }
}

/// Everything a compilation needs besides the declarations themselves.
///
/// Passed explicitly to every compile call; there is no process-wide state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryContext {
    pub dialect: Dialect,
    pub json: JsonFunctions,
}

impl QueryContext {
    /// Context with the dialect's default JSON functions.
    pub const fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            json: JsonFunctions::for_dialect(dialect),
        }
    }

    /// Replaces the JSON function table.
    pub fn with_json(mut self, json: JsonFunctions) -> Self {
        self.json = json;
        self
    }
}
