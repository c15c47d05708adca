#![cfg(feature = "rusqlite")]

mod common;

use common::*;
use proto::core::CompileError;
use proto::error::Error;
use proto::prelude::*;
use serde_json::json;

fn sorted_by_id(items: &[proto::Json]) -> Vec<proto::Json> {
    let mut items = items.to_vec();
    items.sort_by_key(|item| item["id"].as_i64());
    items
}

#[test]
fn has_many_returns_posts_array() {
    let db = setup_db();
    exec(
        &db,
        "INSERT INTO users (id, name) VALUES (1, 'Ada');
         INSERT INTO posts (id, user_id, title) VALUES (10, 1, 'First'), (11, 1, 'Second');",
    );
    let storage = Storage::new(&db, QueryContext::new(Dialect::SQLite));

    let users = storage.all::<User>(&Modifiers::default()).unwrap();
    assert_eq!(users.len(), 1);
    assert_eq!(users[0].get("name"), Some(&json!("Ada")));
    assert_eq!(
        sorted_by_id(users[0].relation("posts").unwrap()),
        vec![
            json!({"id": 10, "user_id": 1, "title": "First"}),
            json!({"id": 11, "user_id": 1, "title": "Second"}),
        ]
    );
}

#[test]
fn user_without_roles_gets_empty_array() {
    let db = setup_db();
    exec(
        &db,
        "INSERT INTO users (id, name) VALUES (1, 'Ada'), (2, 'Grace');
         INSERT INTO roles (id, name) VALUES (1, 'admin');
         INSERT INTO role_users (user_id, role_id) VALUES (1, 1);",
    );
    let storage = Storage::new(&db, QueryContext::default());

    let users = storage
        .all::<Member>(&Modifiers::new().order_by("id", Direction::Asc))
        .unwrap();
    assert_eq!(users.len(), 2);
    assert_eq!(users[0].relation("roles").unwrap(), &[json!({"id": 1, "name": "admin"})]);
    assert_eq!(users[1].relation("roles"), Some(&[][..]));
}

#[test]
fn roles_carry_nested_permissions() {
    let db = setup_db();
    exec(
        &db,
        "INSERT INTO users (id, name) VALUES (1, 'Ada');
         INSERT INTO roles (id, name) VALUES (1, 'admin'), (2, 'guest');
         INSERT INTO role_users (user_id, role_id) VALUES (1, 1), (1, 2);
         INSERT INTO permissions (id, slug) VALUES (1, 'users.write'), (2, 'users.read');
         INSERT INTO permission_roles (role_id, permission_id) VALUES (1, 1), (1, 2);",
    );
    let storage = Storage::new(&db, QueryContext::default());

    let user = storage.get::<User>(1).unwrap();
    assert_eq!(user.relation("posts"), Some(&[][..]));

    let roles = sorted_by_id(user.relation("roles").unwrap());
    assert_eq!(roles.len(), 2);
    assert_eq!(roles[0]["name"], json!("admin"));
    assert_eq!(
        sorted_by_id(roles[0]["permissions"].as_array().unwrap()),
        vec![
            json!({"id": 1, "slug": "users.write"}),
            json!({"id": 2, "slug": "users.read"}),
        ]
    );
    assert_eq!(roles[1]["permissions"], json!([]));
}

#[test]
fn sibling_relations_are_aggregated_independently() {
    let db = setup_db();
    exec(
        &db,
        "INSERT INTO users (id, name) VALUES (1, 'Ada');
         INSERT INTO posts (id, user_id, title) VALUES (10, 1, 'liked'), (11, 1, 'discussed');
         INSERT INTO likes (id, post_id) VALUES (1, 10), (2, 10);
         INSERT INTO comments (id, post_id, body) VALUES (5, 11, 'nice');",
    );
    let storage = Storage::new(&db, QueryContext::default());

    let writer = storage.get::<Writer>(1).unwrap();
    let posts = sorted_by_id(writer.relation("posts").unwrap());
    assert_eq!(posts.len(), 2);

    assert_eq!(posts[0]["comments"], json!([]));
    assert_eq!(
        sorted_by_id(posts[0]["likes"].as_array().unwrap()),
        vec![json!({"id": 1}), json!({"id": 2})]
    );
    assert_eq!(posts[1]["comments"], json!([{"id": 5, "body": "nice"}]));
    assert_eq!(posts[1]["likes"], json!([]));
}

#[test]
fn plain_join_cannot_shadow_a_root_field() {
    let db = setup_db();
    exec(
        &db,
        "INSERT INTO users (id, name) VALUES (1, 'Ada');
         INSERT INTO profiles (id, user_id, name) VALUES (1, 1, 'profile-name');",
    );
    let storage = Storage::new(&db, QueryContext::default());
    assert!(matches!(
        storage.all::<Profiled>(&Modifiers::default()),
        Err(Error::Compile(CompileError::DuplicateJsonKey { ref key, .. })) if key == "name"
    ));
    assert_eq!(db.last_error(), None);
}

#[test]
fn belongs_to_joins_inline() {
    let db = setup_db();
    exec(
        &db,
        "INSERT INTO authors (id, name) VALUES (1, 'Le Guin');
         INSERT INTO books (id, title, author_id) VALUES (1, 'The Dispossessed', 1), (2, 'Anonymous', NULL);",
    );
    let storage = Storage::new(&db, QueryContext::default());

    let books = storage
        .all::<Book>(&Modifiers::new().order_by("id", Direction::Asc))
        .unwrap();
    assert_eq!(books[0].get("author_name"), Some(&json!("Le Guin")));
    assert_eq!(books[1].get("author_name"), Some(&json!(null)));
    assert_eq!(books[0].relations().count(), 0);
}

#[test]
fn modifiers_filter_and_page() {
    let db = setup_db();
    exec(
        &db,
        "INSERT INTO users (id, name, email) VALUES
            (1, 'Ada', 'ada@example.com'), (2, 'Alan', NULL), (3, 'Grace', 'grace@example.com');",
    );
    let storage = Storage::new(&db, QueryContext::default());

    let names = |modifiers: Modifiers| -> Vec<String> {
        storage
            .all::<Member>(&modifiers)
            .unwrap()
            .iter()
            .map(|r| r.get("name").and_then(|n| n.as_str()).unwrap_or_default().to_string())
            .collect()
    };

    assert_eq!(
        names(Modifiers::new().filter(Filter::new("name", FilterOp::Like, "A%")).order_by("name", Direction::Desc)),
        ["Alan", "Ada"]
    );
    assert_eq!(names(Modifiers::new().filter(Filter::is_null("email"))), ["Alan"]);
    assert_eq!(
        names(Modifiers::new().order_by("id", Direction::Asc).offset(1)),
        ["Alan", "Grace"]
    );
    assert_eq!(
        names(Modifiers::new().filter_map([("id", 3)])),
        ["Grace"]
    );
    // values are bound, never interpolated
    assert!(names(Modifiers::new().filter(Filter::eq("name", "x' OR '1'='1"))).is_empty());
}

#[test]
fn camel_case_entity_round_trip() {
    let db = setup_db();
    let storage = Storage::new(&db, QueryContext::default());

    let id = storage
        .add::<Account, _>(&json!({"displayName": "Ada", "activeSessions": []}))
        .unwrap();
    exec(
        &db,
        &format!("INSERT INTO sessions (account_id, last_seen_at) VALUES ({id}, '2024-06-01')"),
    );

    let account = storage.get::<Account>(id).unwrap();
    assert_eq!(account.get("displayName"), Some(&json!("Ada")));
    assert_eq!(
        account.relation("activeSessions").unwrap()[0],
        json!({"id": 1, "accountId": id, "lastSeenAt": "2024-06-01"})
    );

    #[derive(serde::Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct AccountView {
        display_name: String,
        active_sessions: Vec<serde_json::Value>,
    }
    let view: AccountView = account.deserialize().unwrap();
    assert_eq!(view.display_name, "Ada");
    assert_eq!(view.active_sessions.len(), 1);
}

#[test]
fn add_update_delete() {
    let db = setup_db();
    let storage = Storage::new(&db, QueryContext::default());

    let id = storage
        .add::<Post, _>(&json!({"user_id": 1, "title": "Draft"}))
        .unwrap();
    assert_eq!(
        storage.update::<Post, _>(id, &json!({"title": "Published"})).unwrap(),
        1
    );
    assert_eq!(
        storage.get::<Post>(id).unwrap().get("title"),
        Some(&json!("Published"))
    );
    assert_eq!(storage.update::<Post, _>(id, &json!({"unknown": 1})).unwrap(), 0);

    assert_eq!(storage.delete::<Post>(id).unwrap(), 1);
    assert!(matches!(storage.get::<Post>(id), Err(Error::NotFound)));
}

#[test]
fn adapter_failure_carries_statement() {
    let db = setup_db();
    db.connection().execute_batch("DROP TABLE posts").unwrap();
    let storage = Storage::new(&db, QueryContext::default());

    let err = storage.all::<User>(&Modifiers::new().limit(5)).unwrap_err();
    let failure = match err {
        Error::QueryExecution(failure) => failure,
        other => panic!("expected an execution error, got {other:?}"),
    };
    assert!(failure.sql.starts_with("SELECT"));
    assert_eq!(failure.params, vec![proto::core::Value::Integer(5)]);
    assert!(matches!(failure.source, proto::AdapterError::Rusqlite(_)));
    assert!(db.last_error().is_some_and(|e| e.contains("posts")));
}

#[test]
fn data_must_be_an_object() {
    let db = setup_db();
    let storage = Storage::new(&db, QueryContext::default());
    assert!(matches!(
        storage.add::<Post, _>(&json!([1, 2])),
        Err(Error::Mapping(_))
    ));
}
