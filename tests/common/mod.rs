#![allow(dead_code)]

use proto::prelude::*;
use proto::{AdapterError, Row};
use proto_core::Value;
use std::cell::Cell;
use std::sync::Once;

// =============================================================================
// Entities
// =============================================================================

pub struct User;
impl Entity for User {
    const METADATA: EntityMetadata =
        EntityMetadata::new("User", "users", "u").with_fields(&["id", "name", "email"]);

    fn relations(b: &mut GraphBuilder<'_>) {
        b.many::<Post>().all_fields();
        b.belongs_to_many::<Role>().nest();
    }
}

pub struct Post;
impl Entity for Post {
    const METADATA: EntityMetadata =
        EntityMetadata::new("Post", "posts", "p").with_fields(&["id", "user_id", "title"]);
}

pub struct Role;
impl Entity for Role {
    const METADATA: EntityMetadata =
        EntityMetadata::new("Role", "roles", "r").with_fields(&["id", "name"]);

    fn relations(b: &mut GraphBuilder<'_>) {
        b.belongs_to_many::<Permission>();
    }
}

pub struct Permission;
impl Entity for Permission {
    const METADATA: EntityMetadata =
        EntityMetadata::new("Permission", "permissions", "pm").with_fields(&["id", "slug"]);
}

/// Users with their roles only, no nested permissions.
pub struct Member;
impl Entity for Member {
    const METADATA: EntityMetadata = User::METADATA;

    fn relations(b: &mut GraphBuilder<'_>) {
        b.belongs_to_many::<Role>();
    }
}

pub struct Comment;
impl Entity for Comment {
    const METADATA: EntityMetadata =
        EntityMetadata::new("Comment", "comments", "c").with_fields(&["id", "body"]);
}

pub struct Like;
impl Entity for Like {
    const METADATA: EntityMetadata =
        EntityMetadata::new("Like", "likes", "l").with_fields(&["id"]);
}

/// Users whose posts carry two sibling to-many relations.
pub struct Writer;
impl Entity for Writer {
    const METADATA: EntityMetadata = User::METADATA;

    fn relations(b: &mut GraphBuilder<'_>) {
        let mut posts = b.many::<Post>().fields(["id", "title"]).link();
        posts.many::<Comment>().all_fields();
        posts.many::<Like>().all_fields();
    }
}

/// Users with a profile join that reuses a user column name.
pub struct Profiled;
impl Entity for Profiled {
    const METADATA: EntityMetadata = User::METADATA;

    fn relations(b: &mut GraphBuilder<'_>) {
        b.left("profiles").on("id", "user_id").fields(["name"]);
    }
}

pub struct Author;
impl Entity for Author {
    const METADATA: EntityMetadata =
        EntityMetadata::new("Author", "authors", "a").with_fields(&["id", "name"]);
}

pub struct Book;
impl Entity for Book {
    const METADATA: EntityMetadata =
        EntityMetadata::new("Book", "books", "b").with_fields(&["id", "title", "author_id"]);

    fn relations(b: &mut GraphBuilder<'_>) {
        b.one::<Author>()
            .on("author_id", "id")
            .field_as("name", "author_name");
    }
}

/// A camelCase entity over snake_case columns.
pub struct Account;
impl Entity for Account {
    const METADATA: EntityMetadata = EntityMetadata::new("Account", "accounts", "acc")
        .with_fields(&["id", "displayName"])
        .camel_case();

    fn relations(b: &mut GraphBuilder<'_>) {
        b.many::<Session>().named("activeSessions").all_fields();
    }
}

pub struct Session;
impl Entity for Session {
    const METADATA: EntityMetadata = EntityMetadata::new("Session", "sessions", "s")
        .with_fields(&["id", "accountId", "lastSeenAt"])
        .camel_case();
}

// =============================================================================
// Database
// =============================================================================

const SCHEMA: &str = "
    CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT NOT NULL, email TEXT);
    CREATE TABLE posts (id INTEGER PRIMARY KEY, user_id INTEGER NOT NULL, title TEXT NOT NULL);
    CREATE TABLE roles (id INTEGER PRIMARY KEY, name TEXT NOT NULL);
    CREATE TABLE role_users (user_id INTEGER NOT NULL, role_id INTEGER NOT NULL);
    CREATE TABLE permissions (id INTEGER PRIMARY KEY, slug TEXT NOT NULL);
    CREATE TABLE permission_roles (role_id INTEGER NOT NULL, permission_id INTEGER NOT NULL);
    CREATE TABLE comments (id INTEGER PRIMARY KEY, post_id INTEGER NOT NULL, body TEXT NOT NULL);
    CREATE TABLE likes (id INTEGER PRIMARY KEY, post_id INTEGER NOT NULL);
    CREATE TABLE profiles (id INTEGER PRIMARY KEY, user_id INTEGER NOT NULL, name TEXT);
    CREATE TABLE authors (id INTEGER PRIMARY KEY, name TEXT NOT NULL);
    CREATE TABLE books (id INTEGER PRIMARY KEY, title TEXT NOT NULL, author_id INTEGER);
    CREATE TABLE accounts (id INTEGER PRIMARY KEY, display_name TEXT NOT NULL);
    CREATE TABLE sessions (id INTEGER PRIMARY KEY, account_id INTEGER NOT NULL, last_seen_at TEXT);
";

#[cfg(feature = "rusqlite")]
pub fn setup_db() -> SqliteAdapter {
    init_tracing();
    let db = SqliteAdapter::open_in_memory().expect("Failed to create in-memory database");
    db.connection()
        .execute_batch(SCHEMA)
        .expect("Failed to create tables");
    db
}

#[cfg(feature = "rusqlite")]
pub fn exec(db: &SqliteAdapter, sql: &str) {
    db.connection()
        .execute_batch(sql)
        .unwrap_or_else(|e| panic!("Failed to run {sql}: {e}"));
}

pub fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("proto=debug,proto_core=debug"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    });
}

/// Adapter that counts calls and never succeeds.
#[derive(Default)]
pub struct RecordingAdapter {
    pub calls: Cell<usize>,
}

impl Adapter for RecordingAdapter {
    fn fetch(&self, _sql: &str, _params: &[Value]) -> Result<Vec<Row>, AdapterError> {
        self.calls.set(self.calls.get() + 1);
        Err(AdapterError::Other("offline".into()))
    }

    fn execute(&self, _sql: &str, _params: &[Value]) -> Result<u64, AdapterError> {
        self.calls.set(self.calls.get() + 1);
        Err(AdapterError::Other("offline".into()))
    }

    fn last_id(&self) -> i64 {
        0
    }

    fn last_error(&self) -> Option<String> {
        Some("offline".into())
    }
}
