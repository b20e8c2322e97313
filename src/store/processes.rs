//! Background process persistence: the id counter plus one row per
//! launched-but-not-yet-waited process.
//!
//! Several server instances may share one database file, so ids are
//! allocated and rows consumed inside SQLite rather than in memory.

use crate::sandbox::RemoteProcess;
use anyhow::Result;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};

/// Highest id ever handed out, `0` when none has been.
pub fn load_last_id(conn: &Connection) -> Result<u64> {
    let mut stmt = conn.prepare("SELECT last_id FROM process_counter WHERE id = 1")?;
    let last: Option<i64> = stmt.query_row([], |row| row.get(0)).optional()?;
    Ok(last.map_or(0, |id| id.max(0) as u64))
}

/// Number of entries not yet taken.
pub fn count_pending(conn: &Connection) -> Result<usize> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM background_processes", [], |row| {
        row.get(0)
    })?;
    Ok(count.max(0) as usize)
}

/// Advance the shared counter and record `process` under the new id, in one
/// write transaction.
pub fn allocate(conn: &mut Connection, process: &RemoteProcess) -> Result<u64> {
    let now = Utc::now().to_rfc3339();
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let id: i64 = tx.query_row(
        "UPDATE process_counter SET last_id = last_id + 1 WHERE id = 1 RETURNING last_id",
        [],
        |row| row.get(0),
    )?;
    tx.execute(
        "INSERT INTO background_processes (id, sandbox_id, remote_process_id, created_at)
         VALUES (?1, ?2, ?3, ?4)",
        params![id, process.sandbox_id, process.process_id, now],
    )?;
    tx.commit()?;
    Ok(id as u64)
}

/// Delete the row for `id` if it belongs to `sandbox_id`, returning it.
///
/// `None` means this call did not delete anything: the row is absent or
/// belongs to another sandbox.
pub fn take(conn: &Connection, sandbox_id: &str, id: u64) -> Result<Option<RemoteProcess>> {
    let taken = conn
        .query_row(
            "DELETE FROM background_processes WHERE id = ?1 AND sandbox_id = ?2
             RETURNING sandbox_id, remote_process_id",
            params![id as i64, sandbox_id],
            |row| {
                Ok(RemoteProcess {
                    sandbox_id: row.get(0)?,
                    process_id: row.get(1)?,
                })
            },
        )
        .optional()?;
    Ok(taken)
}

/// Sandbox a pending entry was launched in.
pub fn owner(conn: &Connection, id: u64) -> Result<Option<String>> {
    let owner = conn
        .query_row(
            "SELECT sandbox_id FROM background_processes WHERE id = ?1",
            params![id as i64],
            |row| row.get(0),
        )
        .optional()?;
    Ok(owner)
}
