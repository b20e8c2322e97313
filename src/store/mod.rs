//! Store layer: SQLite-backed persistence for background process handles.
//!
//! All data lives in a single database file at the path configured in
//! `[store] db_path`. When attached it is the registry's source of truth, so
//! handles survive a restart and are shared by every server instance that
//! opens the same file.

pub mod processes;

use anyhow::Result;
use rusqlite::Connection;
use std::path::Path;
use std::time::Duration;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Open the state database and create tables if needed.
pub fn init_db(db_path: &Path) -> Result<Connection> {
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let conn = Connection::open(db_path)?;
    // Other server instances may hold the write lock briefly.
    conn.busy_timeout(BUSY_TIMEOUT)?;
    create_schema(&conn)?;
    Ok(conn)
}

/// Open a throwaway in-memory database with the same schema.
pub fn init_memory_db() -> Result<Connection> {
    let conn = Connection::open_in_memory()?;
    create_schema(&conn)?;
    Ok(conn)
}

fn create_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "PRAGMA journal_mode=WAL;
         PRAGMA synchronous=NORMAL;

         CREATE TABLE IF NOT EXISTS process_counter (
             id INTEGER PRIMARY KEY CHECK (id = 1),
             last_id INTEGER NOT NULL
         );

         CREATE TABLE IF NOT EXISTS background_processes (
             id INTEGER PRIMARY KEY,
             sandbox_id TEXT NOT NULL,
             remote_process_id TEXT NOT NULL,
             created_at TEXT NOT NULL
         );

         INSERT OR IGNORE INTO process_counter (id, last_id) VALUES (1, 0);",
    )?;
    Ok(())
}
