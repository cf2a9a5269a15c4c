use std::time::Duration;

use rusqlite::{params, Connection, DatabaseName, OpenFlags, OptionalExtension, Result};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use crate::domain::activity::Activity;

pub const CURRENT_SCHEMA_VERSION: i64 = 2;
pub const REMOTE_SCHEMA_VERSION: i64 = 1;

struct Migration {
    version: i64,
    name: &'static str,
    sql: &'static str,
}

const ACTIVITY_TABLE_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS activity (
    name TEXT PRIMARY KEY,
    priority REAL NOT NULL DEFAULT 1.0
);

CREATE INDEX IF NOT EXISTS idx_activity_priority ON activity(priority);
"#;

const LOCAL_MIGRATIONS: [Migration; 2] = [
    Migration {
        version: 1,
        name: "activity_mirror_v1",
        sql: ACTIVITY_TABLE_SQL,
    },
    Migration {
        version: 2,
        name: "sync_queue_v1",
        sql: r#"
CREATE TABLE IF NOT EXISTS sync_queue (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    operation TEXT NOT NULL,
    activity TEXT NOT NULL,
    payload REAL,
    queued_at TEXT NOT NULL
);
"#,
    },
];

const REMOTE_MIGRATIONS: [Migration; 1] = [Migration {
    version: 1,
    name: "activity_store_v1",
    sql: ACTIVITY_TABLE_SQL,
}];

/// Opens (creating if needed) the local mirror database.
pub fn open_local(path: &str) -> Result<Connection> {
    let mut conn = Connection::open(path)?;
    configure_local(&conn)?;
    apply_migrations(&mut conn, &LOCAL_MIGRATIONS, CURRENT_SCHEMA_VERSION)?;
    Ok(conn)
}

/// Opens an existing remote database. A missing file is an error, never a
/// fresh empty store: an unmounted share must read as unreachable.
pub fn open_remote(path: &str, busy_timeout: Duration) -> Result<Connection> {
    let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
        | OpenFlags::SQLITE_OPEN_URI
        | OpenFlags::SQLITE_OPEN_NO_MUTEX;
    let mut conn = Connection::open_with_flags(path, flags)?;
    configure_remote(&conn, busy_timeout)?;
    apply_migrations(&mut conn, &REMOTE_MIGRATIONS, REMOTE_SCHEMA_VERSION)?;
    Ok(conn)
}

/// Creates the remote database and its schema.
pub fn create_remote(path: &str, busy_timeout: Duration) -> Result<Connection> {
    let mut conn = Connection::open(path)?;
    configure_remote(&conn, busy_timeout)?;
    apply_migrations(&mut conn, &REMOTE_MIGRATIONS, REMOTE_SCHEMA_VERSION)?;
    Ok(conn)
}

/// Reads the schema cookie from the database header, so a handle whose file
/// has gone away fails instead of answering from memory.
pub fn ping(conn: &Connection) -> Result<()> {
    conn.query_row("PRAGMA schema_version", [], |row| row.get::<_, i64>(0))?;
    Ok(())
}

fn configure_local(conn: &Connection) -> Result<()> {
    conn.pragma_update(None::<DatabaseName>, "journal_mode", "WAL")?;
    conn.pragma_update(None::<DatabaseName>, "synchronous", "NORMAL")?;
    conn.pragma_update(None::<DatabaseName>, "temp_store", "MEMORY")?;
    conn.pragma_update(None::<DatabaseName>, "busy_timeout", 5000i64)?;
    conn.busy_timeout(Duration::from_millis(5000))?;
    Ok(())
}

// WAL needs shared memory, which network filesystems do not provide.
fn configure_remote(conn: &Connection, busy_timeout: Duration) -> Result<()> {
    conn.pragma_update(None::<DatabaseName>, "journal_mode", "DELETE")?;
    conn.pragma_update(None::<DatabaseName>, "synchronous", "FULL")?;
    conn.busy_timeout(busy_timeout)?;
    Ok(())
}

fn apply_migrations(
    conn: &mut Connection,
    migrations: &[Migration],
    schema_version: i64,
) -> Result<()> {
    let tx = conn.transaction()?;
    tx.execute_batch(
        r#"
CREATE TABLE IF NOT EXISTS schema_migrations (
    version INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    applied_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS meta (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
"#,
    )?;

    let mut applied = 0usize;
    for migration in migrations {
        let already_applied: Option<i64> = tx
            .query_row(
                "SELECT version FROM schema_migrations WHERE version = ?1",
                params![migration.version],
                |row| row.get(0),
            )
            .optional()?;

        if already_applied.is_some() {
            continue;
        }

        tx.execute_batch(migration.sql)?;
        tx.execute(
            "INSERT INTO schema_migrations (version, name, applied_at) VALUES (?1, ?2, ?3)",
            params![migration.version, migration.name, now_utc_rfc3339()],
        )?;
        applied += 1;
    }

    let version = schema_version.to_string();
    if applied > 0 || get_meta(&tx, "schema_version")?.as_deref() != Some(version.as_str()) {
        set_meta(&tx, "schema_version", &version)?;
    }
    tx.commit()
}

pub fn now_utc_rfc3339() -> String {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .expect("RFC3339 formatting for UTC timestamp should never fail")
}

pub fn list_activities(conn: &Connection) -> Result<Vec<Activity>> {
    let mut stmt = conn.prepare("SELECT name, priority FROM activity ORDER BY name ASC")?;
    let mut rows = stmt.query([])?;
    let mut result = Vec::new();
    while let Some(row) = rows.next()? {
        result.push(Activity {
            name: row.get(0)?,
            priority: row.get(1)?,
        });
    }
    Ok(result)
}

pub fn get_activity(conn: &Connection, name: &str) -> Result<Option<Activity>> {
    conn.query_row(
        "SELECT name, priority FROM activity WHERE name = ?1",
        params![name],
        |row| {
            Ok(Activity {
                name: row.get(0)?,
                priority: row.get(1)?,
            })
        },
    )
    .optional()
}

pub fn insert_activity(conn: &Connection, name: &str, priority: f64) -> Result<()> {
    conn.execute(
        "INSERT INTO activity (name, priority) VALUES (?1, ?2)",
        params![name, priority],
    )?;
    Ok(())
}

pub fn delete_activity(conn: &Connection, name: &str) -> Result<bool> {
    let changed = conn.execute("DELETE FROM activity WHERE name = ?1", params![name])?;
    Ok(changed > 0)
}

pub fn update_priority(conn: &Connection, name: &str, priority: f64) -> Result<bool> {
    let changed = conn.execute(
        "UPDATE activity SET priority = ?1 WHERE name = ?2",
        params![priority, name],
    )?;
    Ok(changed > 0)
}

pub fn max_priority(conn: &Connection) -> Result<f64> {
    conn.query_row(
        "SELECT COALESCE(MAX(priority), 0.0) FROM activity",
        [],
        |row| row.get(0),
    )
}

pub fn select_weighted(conn: &Connection, min_roll: f64) -> Result<Option<Activity>> {
    conn.query_row(
        r#"
SELECT name, priority
FROM activity
WHERE priority >= ?1
ORDER BY RANDOM()
LIMIT 1
"#,
        params![min_roll],
        |row| {
            Ok(Activity {
                name: row.get(0)?,
                priority: row.get(1)?,
            })
        },
    )
    .optional()
}

pub fn clear_activities(conn: &Connection) -> Result<usize> {
    conn.execute("DELETE FROM activity", [])
}

#[derive(Debug, Clone, PartialEq)]
pub struct QueueRow {
    pub id: i64,
    pub operation: String,
    pub activity: String,
    pub payload: Option<f64>,
    pub queued_at: String,
}

pub fn insert_queue_entry(
    conn: &Connection,
    operation: &str,
    activity: &str,
    payload: Option<f64>,
) -> Result<i64> {
    conn.execute(
        r#"
INSERT INTO sync_queue (operation, activity, payload, queued_at)
VALUES (?1, ?2, ?3, ?4)
"#,
        params![operation, activity, payload, now_utc_rfc3339()],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn list_queue_entries(conn: &Connection) -> Result<Vec<QueueRow>> {
    let mut stmt = conn.prepare(
        r#"
SELECT id, operation, activity, payload, queued_at
FROM sync_queue
ORDER BY id ASC
"#,
    )?;
    let mut rows = stmt.query([])?;
    let mut result = Vec::new();
    while let Some(row) = rows.next()? {
        result.push(QueueRow {
            id: row.get(0)?,
            operation: row.get(1)?,
            activity: row.get(2)?,
            payload: row.get(3)?,
            queued_at: row.get(4)?,
        });
    }
    Ok(result)
}

pub fn delete_queue_entry(conn: &Connection, id: i64) -> Result<bool> {
    let changed = conn.execute("DELETE FROM sync_queue WHERE id = ?1", params![id])?;
    Ok(changed > 0)
}

pub fn count_queue_entries(conn: &Connection) -> Result<u64> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM sync_queue", [], |row| row.get(0))?;
    Ok(count.max(0) as u64)
}

pub fn get_meta(conn: &Connection, key: &str) -> Result<Option<String>> {
    conn.query_row(
        "SELECT value FROM meta WHERE key = ?1",
        params![key],
        |row| row.get(0),
    )
    .optional()
}

pub fn set_meta(conn: &Connection, key: &str, value: &str) -> Result<()> {
    conn.execute(
        r#"
INSERT INTO meta (key, value)
VALUES (?1, ?2)
ON CONFLICT(key) DO UPDATE SET value = excluded.value
"#,
        params![key, value],
    )?;
    Ok(())
}

#[cfg(test)]
mod tests;
