use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use storql::{DbError, Engine, QueryResult, Record};
use tempfile::TempDir;

fn open_engine() -> (Engine, TempDir) {
    let dir = TempDir::new().unwrap();
    let engine = Engine::open(dir.path()).unwrap();
    (engine, dir)
}

async fn rows(engine: &Engine, sql: &str, params: &[Value]) -> Vec<Record> {
    match engine.execute(sql, params).await.unwrap() {
        QueryResult::Rows(rows) => rows,
        other => panic!("expected rows, got {:?}", other),
    }
}

fn timestamp(record: &Record, field: &str) -> DateTime<Utc> {
    let value = record.get(field).unwrap();
    DateTime::parse_from_rfc3339(value.as_str().unwrap())
        .unwrap()
        .with_timezone(&Utc)
}

async fn seed_books(engine: &Engine) {
    engine
        .execute(
            "CREATE TABLE books (title TEXT, author TEXT, rating INTEGER)",
            &[],
        )
        .await
        .unwrap();
    for (title, author, rating) in [
        ("Dune", "Herbert", 5),
        ("Foundation", "Asimov", 4),
        ("Dune Messiah", "Herbert", 3),
    ] {
        engine
            .execute(
                "INSERT INTO books (title, author, rating) VALUES (?, ?, ?)",
                &[json!(title), json!(author), json!(rating)],
            )
            .await
            .unwrap();
    }
}

#[tokio::test]
async fn test_insert_select_round_trip() {
    let (engine, _dir) = open_engine();
    engine
        .execute("CREATE TABLE books (title TEXT, author TEXT)", &[])
        .await
        .unwrap();

    let result = engine
        .execute(
            "INSERT INTO books (title, author) VALUES (?, ?)",
            &[json!("Dune"), json!("Herbert")],
        )
        .await
        .unwrap();
    assert_eq!(result, QueryResult::Inserted { id: 1 });

    let all = rows(&engine, "SELECT * FROM books", &[]).await;
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].id, 1);
    assert_eq!(all[0].get("title"), Some(json!("Dune")));
    assert_eq!(all[0].get("author"), Some(json!("Herbert")));
    assert!(all[0].get("created_at").unwrap().is_string());
}

#[tokio::test]
async fn test_books_scenario() {
    let (engine, _dir) = open_engine();
    engine
        .execute(
            "CREATE TABLE books (title TEXT, author TEXT, rating INTEGER)",
            &[],
        )
        .await
        .unwrap();
    engine
        .execute(
            "INSERT INTO books (title, author, rating) VALUES (?, ?, ?)",
            &[json!("Dune"), json!("Herbert"), json!(5)],
        )
        .await
        .unwrap();

    let matched = rows(
        &engine,
        "SELECT * FROM books WHERE author = ?",
        &[json!("Herbert")],
    )
    .await;

    assert_eq!(matched.len(), 1);
    let record = &matched[0];
    assert_eq!(record.id, 1);
    assert_eq!(record.get("title"), Some(json!("Dune")));
    assert_eq!(record.get("author"), Some(json!("Herbert")));
    assert_eq!(record.get("rating"), Some(json!(5)));
    assert!(record.get("created_at").is_some());
}

#[tokio::test]
async fn test_filter_equality_returns_exact_subset() {
    let (engine, _dir) = open_engine();
    seed_books(&engine).await;

    let herbert = rows(
        &engine,
        "SELECT * FROM books WHERE author = ?",
        &[json!("Herbert")],
    )
    .await;
    assert_eq!(herbert.len(), 2);
    assert!(herbert
        .iter()
        .all(|r| r.get("author") == Some(json!("Herbert"))));

    let nobody = rows(
        &engine,
        "SELECT * FROM books WHERE author = ?",
        &[json!("Clarke")],
    )
    .await;
    assert!(nobody.is_empty());
}

#[tokio::test]
async fn test_like_filter() {
    let (engine, _dir) = open_engine();
    seed_books(&engine).await;

    let dunes = rows(
        &engine,
        "SELECT * FROM books WHERE title LIKE ?",
        &[json!("%Dune%")],
    )
    .await;
    assert_eq!(dunes.len(), 2);
}

#[tokio::test]
async fn test_order_by_directions() {
    let (engine, _dir) = open_engine();
    seed_books(&engine).await;

    let asc = rows(&engine, "SELECT * FROM books ORDER BY rating ASC", &[]).await;
    let ratings: Vec<Value> = asc.iter().map(|r| r.get("rating").unwrap()).collect();
    assert_eq!(ratings, vec![json!(3), json!(4), json!(5)]);

    let desc = rows(&engine, "SELECT * FROM books ORDER BY rating DESC", &[]).await;
    let ratings: Vec<Value> = desc.iter().map(|r| r.get("rating").unwrap()).collect();
    assert_eq!(ratings, vec![json!(5), json!(4), json!(3)]);

    // Default direction is ascending
    let default = rows(&engine, "SELECT * FROM books ORDER BY rating", &[]).await;
    assert_eq!(default[0].get("rating"), Some(json!(3)));
}

#[tokio::test]
async fn test_update_with_literal_set() {
    let (engine, _dir) = open_engine();
    seed_books(&engine).await;

    let result = engine
        .execute(
            "UPDATE books SET rating = 1 WHERE author = ?",
            &[json!("Herbert")],
        )
        .await
        .unwrap();
    assert_eq!(result, QueryResult::Updated { count: 2 });

    let all = rows(&engine, "SELECT * FROM books", &[]).await;
    for record in &all {
        if record.get("author") == Some(json!("Herbert")) {
            assert_eq!(record.get("rating"), Some(json!(1)));
            assert!(timestamp(record, "updated_at") >= timestamp(record, "created_at"));
            // Other fields untouched
            assert!(record.get("title").unwrap().is_string());
        } else {
            assert_eq!(record.get("rating"), Some(json!(4)));
            assert_eq!(record.get("updated_at"), None);
        }
    }
}

#[tokio::test]
async fn test_update_where_binds_from_start_of_params() {
    let (engine, _dir) = open_engine();
    seed_books(&engine).await;

    // WHERE conditions draw parameters from the start of the list, so the
    // first SET placeholder and the first condition share params[0]. Here
    // the condition compares author against 5 and matches nothing.
    let result = engine
        .execute(
            "UPDATE books SET rating = ? WHERE author = ?",
            &[json!(5), json!("Herbert")],
        )
        .await
        .unwrap();
    assert_eq!(result, QueryResult::Updated { count: 0 });

    // When SET and WHERE want the same value the shared position works.
    let result = engine
        .execute(
            "UPDATE books SET author = ? WHERE author = ?",
            &[json!("Herbert")],
        )
        .await
        .unwrap();
    assert_eq!(result, QueryResult::Updated { count: 2 });
}

#[tokio::test]
async fn test_delete_removes_matches() {
    let (engine, _dir) = open_engine();
    seed_books(&engine).await;

    let before = rows(&engine, "SELECT * FROM books", &[]).await;
    let deleted_ids: Vec<u64> = before
        .iter()
        .filter(|r| r.get("author") == Some(json!("Herbert")))
        .map(|r| r.id)
        .collect();

    let result = engine
        .execute("DELETE FROM books WHERE author = ?", &[json!("Herbert")])
        .await
        .unwrap();
    assert_eq!(result, QueryResult::Deleted { count: 2 });

    let after = rows(&engine, "SELECT * FROM books", &[]).await;
    assert_eq!(after.len(), before.len() - 2);
    assert!(after.iter().all(|r| !deleted_ids.contains(&r.id)));
}

#[tokio::test]
async fn test_insert_column_count_mismatch() {
    let (engine, _dir) = open_engine();
    engine
        .execute("CREATE TABLE books (title TEXT, author TEXT)", &[])
        .await
        .unwrap();

    let result = engine
        .execute(
            "INSERT INTO books (title, author) VALUES (?, ?)",
            &[json!("Dune")],
        )
        .await;
    assert!(matches!(result, Err(DbError::Operation(_))));
}

#[tokio::test]
async fn test_insert_never_takes_caller_id() {
    let (engine, _dir) = open_engine();
    engine
        .execute("CREATE TABLE books (title TEXT)", &[])
        .await
        .unwrap();

    let result = engine
        .execute(
            "INSERT INTO books (id, title) VALUES (?, ?)",
            &[json!(99), json!("Dune")],
        )
        .await
        .unwrap();
    assert_eq!(result, QueryResult::Inserted { id: 1 });

    let all = rows(&engine, "SELECT * FROM books", &[]).await;
    assert_eq!(all[0].id, 1);
    assert_eq!(all[0].get("id"), Some(json!(1)));
}

#[tokio::test]
async fn test_update_never_reassigns_id() {
    let (engine, _dir) = open_engine();
    seed_books(&engine).await;

    engine
        .execute("UPDATE books SET id = 42 WHERE author = ?", &[json!("Asimov")])
        .await
        .unwrap();

    let all = rows(&engine, "SELECT * FROM books", &[]).await;
    let ids: Vec<u64> = all.iter().map(|r| r.id).collect();
    assert_eq!(ids, vec![1, 2, 3]);
}

#[tokio::test]
async fn test_select_unknown_table() {
    let (engine, _dir) = open_engine();
    let result = engine.execute("SELECT * FROM nothing", &[]).await;
    assert!(matches!(result, Err(DbError::TableNotFound(_))));
}

#[tokio::test]
async fn test_projection_list_not_enforced() {
    let (engine, _dir) = open_engine();
    seed_books(&engine).await;

    // Full records come back regardless of the projection list
    let projected = rows(&engine, "SELECT title FROM books", &[]).await;
    assert_eq!(projected.len(), 3);
    assert!(projected.iter().all(|r| r.get("author").is_some()));
}

#[tokio::test]
async fn test_update_missing_set_parameter() {
    let (engine, _dir) = open_engine();
    seed_books(&engine).await;

    let result = engine
        .execute("UPDATE books SET rating = ?, memo = ? WHERE rating = ?", &[])
        .await;
    assert!(matches!(result, Err(DbError::Operation(_))));
}

#[tokio::test]
async fn test_parse_error_surfaces() {
    let (engine, _dir) = open_engine();
    let result = engine.execute("EXPLAIN SELECT 1", &[]).await;
    assert!(matches!(result, Err(DbError::Parse(_))));
}
