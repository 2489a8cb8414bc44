//! Schema setup for the contacts database.
//!
//! `schema_version` records which of the embedded SQL files have been applied.
//! Each file runs once, in its own transaction, together with its version row.

use rusqlite::Connection;

struct Migration {
    version: i32,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        sql: include_str!("migrations/001_contacts_store.sql"),
    },
    Migration {
        version: 2,
        sql: include_str!("migrations/002_metadata_sync.sql"),
    },
];

fn ensure_schema_version_table(conn: &Connection) -> Result<(), String> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );",
    )
    .map_err(|e| format!("Cannot create schema_version: {e}"))
}

/// Highest applied version; 0 for an empty database.
fn current_version(conn: &Connection) -> Result<i32, String> {
    conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |row| row.get(0),
    )
    .map_err(|e| format!("Cannot read schema version: {e}"))
}

/// Copy a file-backed database to `<path>.pre-migration.bak`.
fn snapshot_database(conn: &Connection) -> Result<(), String> {
    let main_path = conn.path().unwrap_or_default();
    if main_path.is_empty() {
        return Ok(());
    }

    let snapshot_path = format!("{main_path}.pre-migration.bak");
    let mut snapshot = Connection::open(&snapshot_path)
        .map_err(|e| format!("Cannot open {snapshot_path}: {e}"))?;
    rusqlite::backup::Backup::new(conn, &mut snapshot)
        .and_then(|backup| backup.step(-1))
        .map_err(|e| format!("Snapshot to {snapshot_path} failed: {e}"))?;

    log::info!("Saved schema v{} snapshot to {}", current_version(conn)?, snapshot_path);
    Ok(())
}

fn apply(conn: &Connection, migration: &Migration) -> Result<(), String> {
    let script = format!(
        "BEGIN;\n{}\nINSERT INTO schema_version (version) VALUES ({});\nCOMMIT;",
        migration.sql, migration.version
    );
    conn.execute_batch(&script).map_err(|e| {
        let _ = conn.execute_batch("ROLLBACK");
        format!("Schema v{} not applied: {e}", migration.version)
    })?;
    log::info!("Schema upgraded to v{}", migration.version);
    Ok(())
}

fn upgrade(conn: &Connection, migrations: &[Migration]) -> Result<usize, String> {
    ensure_schema_version_table(conn)?;

    let current = current_version(conn)?;
    let latest = migrations.last().map_or(0, |m| m.version);
    if current > latest {
        return Err(format!(
            "Database schema v{current} is newer than this build supports (v{latest})"
        ));
    }

    let pending: Vec<&Migration> = migrations.iter().filter(|m| m.version > current).collect();
    if pending.is_empty() {
        return Ok(0);
    }

    // A fresh database has nothing worth keeping.
    if current > 0 {
        snapshot_database(conn)?;
    }
    for migration in &pending {
        apply(conn, migration)?;
    }
    Ok(pending.len())
}

/// Bring the schema up to date. Returns how many versions were applied.
pub fn run_migrations(conn: &Connection) -> Result<usize, String> {
    upgrade(conn, MIGRATIONS)
}
