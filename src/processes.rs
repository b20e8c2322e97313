//! Background process registry.
//!
//! Maps small integer ids, minted locally, to handles of executions that are
//! still running inside a sandbox. Ids come from a monotonic counter and are
//! never reused; an entry can be taken exactly once.
//!
//! The registry is shared by every concurrent tool call. Without a store the
//! entries live in a [`DashMap`] next to an atomic counter. With a store the
//! SQLite file owns both: ids are allocated and entries deleted inside the
//! database, so server instances sharing the file never hand out the same id
//! or consume the same entry twice.

use crate::sandbox::RemoteProcess;
use crate::store;
use dashmap::DashMap;
use parking_lot::Mutex;
use rusqlite::Connection;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("process {0} not found (never started here, or already waited on)")]
    NotFound(u64),
    #[error("process {id} was started in sandbox {expected}, not {actual}")]
    SandboxMismatch {
        id: u64,
        expected: String,
        actual: String,
    },
    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

enum Backend {
    Memory {
        entries: DashMap<u64, RemoteProcess>,
        last_id: AtomicU64,
    },
    Store(Mutex<Connection>),
}

pub struct ProcessRegistry {
    backend: Backend,
}

impl ProcessRegistry {
    /// Registry whose contents vanish with the process.
    pub fn in_memory() -> Self {
        Self {
            backend: Backend::Memory {
                entries: DashMap::new(),
                last_id: AtomicU64::new(0),
            },
        }
    }

    /// Registry backed by `conn`. Entries left pending by earlier runs, or by
    /// other instances on the same file, stay available.
    pub fn with_store(conn: Connection) -> anyhow::Result<Self> {
        let pending = store::processes::count_pending(&conn)?;
        if pending > 0 {
            tracing::info!(
                pending,
                last_id = store::processes::load_last_id(&conn)?,
                "Found pending background processes in store"
            );
        }

        Ok(Self {
            backend: Backend::Store(Mutex::new(conn)),
        })
    }

    /// Store `process` and return its id (1, 2, 3, ...).
    pub fn register(&self, process: RemoteProcess) -> Result<u64, RegistryError> {
        let id = match &self.backend {
            Backend::Memory { entries, last_id } => {
                let id = last_id.fetch_add(1, Ordering::SeqCst) + 1;
                entries.insert(id, process.clone());
                id
            }
            Backend::Store(conn) => store::processes::allocate(&mut conn.lock(), &process)?,
        };

        tracing::debug!(
            id,
            sandbox_id = %process.sandbox_id,
            remote_process_id = %process.process_id,
            "Registered background process"
        );
        Ok(id)
    }

    /// Remove and return the entry for `id`.
    ///
    /// The entry must have been launched in `sandbox_id`; on a mismatch it is
    /// left in place.
    pub fn take(&self, sandbox_id: &str, id: u64) -> Result<RemoteProcess, RegistryError> {
        let (taken, owner) = match &self.backend {
            Backend::Memory { entries, .. } => {
                let taken = entries
                    .remove_if(&id, |_, process| process.sandbox_id == sandbox_id)
                    .map(|(_, process)| process);
                let owner = match taken {
                    Some(_) => None,
                    None => entries.get(&id).map(|entry| entry.sandbox_id.clone()),
                };
                (taken, owner)
            }
            Backend::Store(conn) => {
                let conn = conn.lock();
                let taken = store::processes::take(&conn, sandbox_id, id)?;
                let owner = match taken {
                    Some(_) => None,
                    None => store::processes::owner(&conn, id)?,
                };
                (taken, owner)
            }
        };

        match (taken, owner) {
            (Some(process), _) => Ok(process),
            (None, Some(expected)) => Err(RegistryError::SandboxMismatch {
                id,
                expected,
                actual: sandbox_id.to_string(),
            }),
            (None, None) => Err(RegistryError::NotFound(id)),
        }
    }

    /// Number of entries still waiting to be taken.
    pub fn pending(&self) -> Result<usize, RegistryError> {
        match &self.backend {
            Backend::Memory { entries, .. } => Ok(entries.len()),
            Backend::Store(conn) => Ok(store::processes::count_pending(&conn.lock())?),
        }
    }
}

impl Default for ProcessRegistry {
    fn default() -> Self {
        Self::in_memory()
    }
}
