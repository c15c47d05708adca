//! # Proto
//!
//! Relationship declarations compiled into one SQL statement per query: plain
//! joins stay joins, and every to-many relation becomes a correlated JSON
//! aggregation column, nested as deep as the declarations go.
//!
//! ```rust
//! use proto::prelude::*;
//!
//! struct User;
//! impl Entity for User {
//!     const METADATA: EntityMetadata =
//!         EntityMetadata::new("User", "users", "u").with_fields(&["id", "name"]);
//!
//!     fn relations(b: &mut GraphBuilder<'_>) {
//!         b.many::<Post>().all_fields();
//!     }
//! }
//!
//! struct Post;
//! impl Entity for Post {
//!     const METADATA: EntityMetadata =
//!         EntityMetadata::new("Post", "posts", "p").with_fields(&["id", "title"]);
//! }
//!
//! # fn main() -> proto::Result<()> {
//! let db = SqliteAdapter::open_in_memory().unwrap();
//! # db.connection().execute_batch(
//! #     "CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT);
//! #      CREATE TABLE posts (id INTEGER PRIMARY KEY, user_id INTEGER, title TEXT);",
//! # ).unwrap();
//! let storage = Storage::new(&db, QueryContext::new(Dialect::SQLite));
//!
//! let id = storage.add::<User, _>(&serde_json::json!({ "name": "Ada" }))?;
//! let user = storage.get::<User>(id)?;
//! assert_eq!(user.relation("posts").map(<[_]>::len), Some(0));
//! # Ok(())
//! # }
//! ```

mod adapter;
pub mod config;
pub mod error;
mod record;
#[cfg(feature = "rusqlite")]
mod rusqlite;
mod storage;

pub use adapter::{Adapter, AdapterError, Row};
pub use config::Config;
pub use error::Result;
pub use record::{Json, Record};
#[cfg(feature = "rusqlite")]
pub use self::rusqlite::SqliteAdapter;
pub use storage::Storage;

/// The compiler itself: declarations, graphs, plans and SQL rendering.
pub use proto_core as core;

#[doc(hidden)]
pub use proto_core::{proto_trace_error, proto_trace_query};

pub mod prelude {
    pub use crate::{Adapter, Record, Storage};
    #[cfg(feature = "rusqlite")]
    pub use crate::SqliteAdapter;
    pub use proto_core::{
        CompareOp, Dialect, Direction, Entity, EntityMetadata, Filter, FilterOp, GraphBuilder,
        JoinType, Modifiers, Pivot, QueryContext,
    };
}
