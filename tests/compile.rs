mod common;

use common::*;
use proto::Storage;
use proto::core::join::{MAX_NESTING_DEPTH, Pivot, pivot_keys, pivot_table_name};
use proto::core::{
    CompileError, Dialect, Entity, EntityMetadata, GraphBuilder, JoinGraph, Modifiers,
    QueryContext, classify, compile_plan,
};
use proto::error::Error;

fn sql<E: Entity>(dialect: Dialect) -> String {
    let graph = JoinGraph::declare::<E>();
    compile_plan(&E::METADATA, &graph, &Modifiers::default(), &QueryContext::new(dialect))
        .unwrap()
        .statement
        .sql
}

#[test]
fn belongs_to_is_a_plain_join() {
    let sql = sql::<Book>(Dialect::SQLite);
    assert_eq!(
        sql,
        concat!(
            r#"SELECT "b"."id", "b"."title", "b"."author_id", "a"."name" AS "author_name" "#,
            r#"FROM "books" AS "b" LEFT JOIN "authors" AS "a" ON "b"."author_id" = "a"."id""#
        )
    );
}

#[test]
fn many_without_columns_adds_no_aggregation() {
    struct Bare;
    impl Entity for Bare {
        const METADATA: EntityMetadata = User::METADATA;
        fn relations(b: &mut GraphBuilder<'_>) {
            b.many::<Post>();
        }
    }
    let graph = JoinGraph::declare::<Bare>();
    let query = compile_plan(
        &Bare::METADATA,
        &graph,
        &Modifiers::default(),
        &QueryContext::default(),
    )
    .unwrap();
    assert!(query.relations.is_empty());
    assert!(!query.statement.sql.contains("json_group_array"));
    assert!(!query.statement.sql.contains("JOIN"));
}

#[test]
fn duplicate_json_key_fails_before_execution() {
    struct Clashing;
    impl Entity for Clashing {
        const METADATA: EntityMetadata = User::METADATA;
        fn relations(b: &mut GraphBuilder<'_>) {
            b.many::<Role>()
                .field_as("name", "name")
                .field_as("label", "name");
        }
    }
    let adapter = RecordingAdapter::default();
    let storage = Storage::new(&adapter, QueryContext::default());
    let err = storage.all::<Clashing>(&Modifiers::default()).unwrap_err();
    assert!(matches!(
        err,
        Error::Compile(CompileError::DuplicateJsonKey { ref key, ref level }) if key == "name" && level == "roles"
    ));
    assert_eq!(adapter.calls.get(), 0);
}

#[test]
fn default_pivot_naming() {
    assert_eq!(pivot_table_name("user", "role"), "role_users");
    assert_eq!(
        pivot_keys("user", "role"),
        ("user_id".to_string(), "role_id".to_string())
    );

    let sql = sql::<Member>(Dialect::SQLite);
    assert!(sql.contains(r#"FROM "role_users" LEFT JOIN "roles" AS "r" ON "role_users"."role_id" = "r"."id""#));
    assert!(sql.contains(r#"ON "u"."id" = "roles"."user_id""#));
}

#[test]
fn explicit_pivot_overrides_convention() {
    struct Staff;
    impl Entity for Staff {
        const METADATA: EntityMetadata = User::METADATA;
        fn relations(b: &mut GraphBuilder<'_>) {
            b.belongs_to_many_with::<Role>(
                Pivot::new()
                    .table("assignments")
                    .alias("asg")
                    .self_key("staff_id")
                    .pivot_columns(["granted_at"]),
            );
        }
    }
    let sql = sql::<Staff>(Dialect::SQLite);
    assert!(sql.contains(r#"FROM "assignments" AS "asg" LEFT JOIN "roles" AS "r" ON "asg"."role_id" = "r"."id""#));
    // pivot columns follow the related entity's columns
    assert!(sql.contains(r#"json_object('id', "r"."id", 'name', "r"."name", 'granted_at', "asg"."granted_at")"#));
}

#[test]
fn nested_many_to_many_levels() {
    let sql = sql::<User>(Dialect::SQLite);
    assert!(sql.contains(concat!(
        r#"'permissions', json(COALESCE((SELECT json_group_array(json_object('id', "pm"."id", 'slug', "pm"."slug")) "#,
        r#"FROM "permission_roles" LEFT JOIN "permissions" AS "pm" ON "permission_roles"."permission_id" = "pm"."id" "#,
        r#"WHERE "r"."id" = "permission_roles"."role_id" GROUP BY "permission_roles"."role_id"), '[]'))"#
    )));
    assert!(sql.starts_with(concat!(
        r#"SELECT "u"."id", "u"."name", "u"."email", "#,
        r#"COALESCE("posts"."posts", '[]') AS "posts", "#,
        r#"COALESCE("roles"."roles", '[]') AS "roles" FROM "users" AS "u""#
    )));
}

#[test]
fn postgres_aggregations_are_read_as_text() {
    let sql = sql::<Member>(Dialect::PostgreSQL);
    assert!(sql.contains(r#"COALESCE("roles"."roles", '[]'::json)::text AS "roles""#));
    assert!(sql.contains("json_agg(json_build_object("));
}

#[test]
fn compilation_is_deterministic() {
    for dialect in [Dialect::SQLite, Dialect::PostgreSQL, Dialect::MySQL] {
        assert_eq!(sql::<User>(dialect), sql::<User>(dialect));
        assert_eq!(sql::<Account>(dialect), sql::<Account>(dialect));
    }
}

#[test]
fn classification_is_single_assignment() {
    let graph = JoinGraph::build::<User>(|b| {
        b.join("profiles").on("id", "user_id");
        b.belongs_to_many::<Role>().nest();
        let mut posts = b.many::<Post>().all_fields().link();
        posts.join("images").fields(["url"]);
        posts.many::<Post>().named("replies").fields(["id"]);
    });
    let c = classify(&graph);
    assert_eq!(c.plain.iter().map(|id| id.index()).collect::<Vec<_>>(), [0]);
    for d in graph.iter() {
        let id = d.id();
        let count = [c.is_plain(id), c.is_aggregation(id), c.is_consumed(id)]
            .into_iter()
            .filter(|x| *x)
            .count();
        assert_eq!(count, 1, "descriptor {} ({})", id.index(), d.target().table);
    }
}

#[test]
fn chains_are_acyclic() {
    let graph = JoinGraph::declare::<User>();
    for d in graph.iter() {
        let mut last = d.id();
        let mut steps = 0;
        for next in graph.chain(d.id()) {
            assert!(next.id() > last);
            last = next.id();
            steps += 1;
            assert!(steps <= graph.len());
        }
    }
}

#[test]
fn self_nesting_stops_at_max_depth() {
    struct Category;
    impl Entity for Category {
        const METADATA: EntityMetadata =
            EntityMetadata::new("Category", "categories", "cat").with_fields(&["id", "name"]);
        fn relations(b: &mut GraphBuilder<'_>) {
            b.many::<Category>().all_fields().nest();
        }
    }
    let graph = JoinGraph::declare::<Category>();
    assert_eq!(graph.len(), MAX_NESTING_DEPTH + 1);
    assert_eq!(graph.overflowed().len(), 1);

    let err = compile_plan(
        &Category::METADATA,
        &graph,
        &Modifiers::default(),
        &QueryContext::default(),
    )
    .unwrap_err();
    assert!(matches!(err, CompileError::UnresolvableAggregation { .. }));
}

#[test]
fn camel_case_identifiers_become_snake_case_columns() {
    let sql = sql::<Account>(Dialect::SQLite);
    assert!(sql.starts_with(r#"SELECT "acc"."id", "acc"."display_name", COALESCE("activeSessions"."activeSessions", '[]') AS "activeSessions""#));
    assert!(sql.contains(r#"json_object('id', "s"."id", 'account_id', "s"."account_id", 'last_seen_at', "s"."last_seen_at")"#));
    assert!(sql.ends_with(r#"ON "acc"."id" = "activeSessions"."account_id""#));
}
