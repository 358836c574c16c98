//! Versioned schema for the reservation database
//!
//! Each step runs in its own transaction together with its history row, so a
//! failed step leaves the schema at the previous version.

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::{info, instrument};

use super::parse::format_datetime;
use crate::error::StorageError;

struct Step {
    version: u32,
    summary: &'static str,
    sql: &'static str,
}

const STEPS: &[Step] = &[
    Step {
        version: 1,
        summary: "Rooms and reservations",
        sql: r#"
            CREATE TABLE IF NOT EXISTS rooms (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL UNIQUE,
                capacity INTEGER NOT NULL CHECK (capacity > 0),
                description TEXT,
                enabled INTEGER NOT NULL DEFAULT 1,
                created_at TEXT NOT NULL
            );

            -- Timestamps are fixed-width RFC3339, so TEXT comparison is time order
            CREATE TABLE IF NOT EXISTS reservations (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                room_id INTEGER NOT NULL REFERENCES rooms(id) ON DELETE CASCADE,
                identity TEXT NOT NULL,
                holder_name TEXT NOT NULL,
                start_at TEXT NOT NULL,
                end_at TEXT NOT NULL,
                created_at TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'active'
                    CHECK (status IN ('active', 'finished', 'cancelled')),
                CHECK (end_at > start_at)
            );
        "#,
    },
    Step {
        version: 2,
        summary: "Room window and identity lookup indexes",
        sql: r#"
            CREATE INDEX IF NOT EXISTS idx_reservations_room_start
                ON reservations(room_id, start_at);
            CREATE INDEX IF NOT EXISTS idx_reservations_identity
                ON reservations(identity, start_at);
        "#,
    },
    Step {
        version: 3,
        summary: "One active reservation per identity",
        sql: r#"
            CREATE UNIQUE INDEX IF NOT EXISTS idx_reservations_one_active_identity
                ON reservations(identity) WHERE status = 'active';
        "#,
    },
];

/// Highest version recorded in the history table, 0 for a fresh database
pub(crate) fn get_current_version(conn: &Connection) -> Result<u32, StorageError> {
    let version = conn
        .query_row("SELECT MAX(version) FROM schema_history", [], |row| {
            row.get::<_, Option<u32>>(0)
        })
        .optional()?
        .flatten();
    Ok(version.unwrap_or(0))
}

fn apply(conn: &Connection, step: &Step) -> Result<(), StorageError> {
    let tx = conn.unchecked_transaction()?;
    tx.execute_batch(step.sql)?;
    tx.execute(
        "INSERT INTO schema_history (version, summary, applied_at) VALUES (?1, ?2, ?3)",
        params![step.version, step.summary, format_datetime(&Utc::now())],
    )?;
    tx.commit()?;
    Ok(())
}

/// Bring the schema up to the latest version
#[instrument(skip(conn))]
pub fn run_migrations(conn: &Connection) -> Result<(), StorageError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_history (
            version INTEGER PRIMARY KEY,
            summary TEXT NOT NULL,
            applied_at TEXT NOT NULL
        )",
    )?;

    let from = get_current_version(conn)?;
    let pending: Vec<&Step> = STEPS.iter().filter(|s| s.version > from).collect();
    if pending.is_empty() {
        return Ok(());
    }

    for step in &pending {
        info!(version = step.version, summary = step.summary, "Applying schema step");
        apply(conn, step)?;
    }
    info!(from, to = get_current_version(conn)?, "Database schema updated");
    Ok(())
}
