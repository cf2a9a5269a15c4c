use super::*;
use std::time::Duration;
use uuid::Uuid;

fn unique_db_path(prefix: &str) -> String {
    std::env::temp_dir()
        .join(format!("actgen-{prefix}-{}.sqlite", Uuid::now_v7()))
        .display()
        .to_string()
}

fn cleanup_db_files(path: &str) {
    for suffix in ["", "-wal", "-shm", "-journal"] {
        let candidate = format!("{path}{suffix}");
        let _ = std::fs::remove_file(candidate);
    }
}

fn table_exists(conn: &rusqlite::Connection, table_name: &str) -> bool {
    let exists: i64 = conn
        .query_row(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name=?1)",
            params![table_name],
            |row| row.get(0),
        )
        .expect("table existence query should be readable");
    exists == 1
}

#[test]
fn configures_local_connection_pragmas() {
    let path = unique_db_path("pragmas");
    let conn = open_local(&path).expect("connection should open");

    let journal_mode: String = conn
        .query_row("PRAGMA journal_mode;", [], |row| row.get(0))
        .expect("journal_mode pragma should be readable");
    assert_eq!(journal_mode.to_uppercase(), "WAL");

    let busy_timeout: i64 = conn
        .query_row("PRAGMA busy_timeout;", [], |row| row.get(0))
        .expect("busy_timeout pragma should be readable");
    assert_eq!(busy_timeout, 5000);

    cleanup_db_files(&path);
}

#[test]
fn initializes_local_tables_and_schema_version() {
    let path = unique_db_path("schema");
    let conn = open_local(&path).expect("connection should open");

    for table in ["schema_migrations", "meta", "activity", "sync_queue"] {
        assert!(
            table_exists(&conn, table),
            "expected table '{}' to exist",
            table
        );
    }

    let schema_version = get_meta(&conn, "schema_version")
        .expect("meta should be readable")
        .expect("schema version should be stored");
    assert_eq!(schema_version, CURRENT_SCHEMA_VERSION.to_string());

    cleanup_db_files(&path);
}

#[test]
fn reapplies_migrations_idempotently() {
    let path = unique_db_path("idempotent");
    let conn_first = open_local(&path).expect("first open should initialize schema");
    drop(conn_first);

    let conn_second = open_local(&path).expect("second open should be idempotent");
    let applied_count: i64 = conn_second
        .query_row("SELECT COUNT(*) FROM schema_migrations", [], |row| {
            row.get(0)
        })
        .expect("schema_migrations count should be queryable");
    assert_eq!(applied_count, CURRENT_SCHEMA_VERSION);

    cleanup_db_files(&path);
}

#[test]
fn remote_open_refuses_to_create_missing_database() {
    let path = unique_db_path("remote-missing");
    let result = open_remote(&path, Duration::from_millis(100));
    assert!(result.is_err());
    assert!(!std::path::Path::new(&path).exists());
}

#[test]
fn remote_create_then_open_uses_rollback_journal() {
    let path = unique_db_path("remote");
    drop(create_remote(&path, Duration::from_millis(100)).expect("remote should be created"));

    let conn = open_remote(&path, Duration::from_millis(100)).expect("remote should open");
    ping(&conn).expect("ping should succeed");
    let journal_mode: String = conn
        .query_row("PRAGMA journal_mode;", [], |row| row.get(0))
        .expect("journal_mode pragma should be readable");
    assert_eq!(journal_mode.to_uppercase(), "DELETE");
    assert!(table_exists(&conn, "activity"));
    assert!(!table_exists(&conn, "sync_queue"));

    cleanup_db_files(&path);
}

#[test]
fn activity_rows_round_trip_through_helpers() {
    let path = unique_db_path("activity");
    let conn = open_local(&path).expect("connection should open");

    assert_eq!(max_priority(&conn).expect("max should read"), 0.0);
    insert_activity(&conn, "walk", 1.5).expect("insert should succeed");
    insert_activity(&conn, "read", 0.4).expect("insert should succeed");
    assert!(insert_activity(&conn, "walk", 2.0).is_err());

    let names = list_activities(&conn)
        .expect("list should succeed")
        .into_iter()
        .map(|activity| activity.name)
        .collect::<Vec<_>>();
    assert_eq!(names, vec!["read".to_string(), "walk".to_string()]);
    assert_eq!(max_priority(&conn).expect("max should read"), 1.5);

    assert!(update_priority(&conn, "read", 0.9).expect("update should run"));
    assert!(!update_priority(&conn, "missing", 0.9).expect("update should run"));
    assert_eq!(
        get_activity(&conn, "read")
            .expect("get should run")
            .map(|activity| activity.priority),
        Some(0.9)
    );

    assert!(delete_activity(&conn, "read").expect("delete should run"));
    assert!(!delete_activity(&conn, "read").expect("delete should run"));

    cleanup_db_files(&path);
}

#[test]
fn select_weighted_respects_min_roll() {
    let path = unique_db_path("weighted");
    let conn = open_local(&path).expect("connection should open");
    insert_activity(&conn, "low", 0.2).expect("insert should succeed");
    insert_activity(&conn, "high", 3.0).expect("insert should succeed");

    for _ in 0..20 {
        let picked = select_weighted(&conn, 1.0)
            .expect("select should run")
            .expect("one activity qualifies");
        assert_eq!(picked.name, "high");
    }
    assert!(select_weighted(&conn, 0.0)
        .expect("select should run")
        .is_some());
    assert!(select_weighted(&conn, 3.1)
        .expect("select should run")
        .is_none());

    cleanup_db_files(&path);
}

#[test]
fn queue_rows_keep_insertion_order() {
    let path = unique_db_path("queue");
    let conn = open_local(&path).expect("connection should open");

    let first = insert_queue_entry(&conn, "ADD_ACTIVITY", "x", Some(1.0)).expect("append");
    let second = insert_queue_entry(&conn, "PRIORITY_ADJUST", "x", Some(0.2)).expect("append");
    let third = insert_queue_entry(&conn, "DELETE_ACTIVITY", "x", None).expect("append");
    assert!(first < second && second < third);

    let rows = list_queue_entries(&conn).expect("list should succeed");
    assert_eq!(
        rows.iter().map(|row| row.id).collect::<Vec<_>>(),
        vec![first, second, third]
    );
    assert_eq!(rows[2].payload, None);
    assert_eq!(count_queue_entries(&conn).expect("count"), 3);

    assert!(delete_queue_entry(&conn, second).expect("delete"));
    assert!(!delete_queue_entry(&conn, second).expect("delete"));
    assert_eq!(count_queue_entries(&conn).expect("count"), 2);

    cleanup_db_files(&path);
}
