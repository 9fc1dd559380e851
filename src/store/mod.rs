// src/store/mod.rs — Persistent store (SQLite)

pub mod schema;
pub mod store;

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use rusqlite::Connection;

pub use store::Store;

/// The store shared between the run loop and the recovery supervisor.
/// rusqlite connections are not Sync, so access is serialized; locks are
/// held only across single synchronous calls, never across awaits.
pub type SharedStore = Arc<Mutex<Store>>;

/// Open (or create) the database at the given path.
pub fn open(path: &Path) -> anyhow::Result<Store> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let conn = Connection::open(path)?;
    conn.execute_batch("PRAGMA journal_mode=WAL;")?;
    conn.execute_batch("PRAGMA foreign_keys=ON;")?;
    schema::run_migrations(&conn)?;
    Ok(Store::new(conn))
}

/// Create an in-memory database (for testing).
pub fn in_memory() -> anyhow::Result<Store> {
    let conn = Connection::open_in_memory()?;
    conn.execute_batch("PRAGMA foreign_keys=ON;")?;
    schema::run_migrations(&conn)?;
    Ok(Store::new(conn))
}

pub fn shared(store: Store) -> SharedStore {
    Arc::new(Mutex::new(store))
}

/// Lock the shared store, surfacing poisoning as a normal error.
pub fn lock(store: &SharedStore) -> anyhow::Result<MutexGuard<'_, Store>> {
    store
        .lock()
        .map_err(|_| anyhow::anyhow!("store mutex poisoned"))
}
