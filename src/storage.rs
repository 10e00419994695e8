//! Local SQLite persistence for the tab ledger.
//!
//! Uses rusqlite with WAL mode. The ledger, catalog, and history are stored
//! as JSON documents in a key-value table under the same keys the mobile
//! app used with AsyncStorage (`tables`, `products`, `table_history`), so a
//! dump from either side reads the same. The core never persists on its
//! own; the service layer writes after each successful mutation.

use rusqlite::{params, Connection, OptionalExtension};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{info, warn};

use crate::ledger::{HistoryItem, Product, Table};

/// Storage key for the live table set.
pub const KEY_TABLES: &str = "tables";
/// Storage key for the product catalog.
pub const KEY_PRODUCTS: &str = "products";
/// Storage key for the append-only history log.
pub const KEY_HISTORY: &str = "table_history";

/// Current schema version. Bump when adding new migrations.
const CURRENT_SCHEMA_VERSION: i32 = 1;

/// Handle to the on-disk store.
pub struct StorageState {
    pub conn: Mutex<Connection>,
    pub db_path: PathBuf,
}

// ---------------------------------------------------------------------------
// Initialization
// ---------------------------------------------------------------------------

/// Initialize the database at `{data_dir}/tabs.db`.
///
/// Creates the directory if needed, opens the connection, sets pragmas,
/// and runs any pending migrations. On corruption or open failure,
/// deletes the file and retries once.
pub fn init(data_dir: &Path) -> Result<StorageState, String> {
    fs::create_dir_all(data_dir).map_err(|e| format!("Failed to create data dir: {e}"))?;

    let db_path = data_dir.join("tabs.db");
    info!("Opening database at {}", db_path.display());

    let conn = match open_and_configure(&db_path) {
        Ok(c) => c,
        Err(first_err) => {
            warn!(
                "Database open failed ({}), deleting and retrying once",
                first_err
            );
            if db_path.exists() {
                let _ = fs::remove_file(&db_path);
                let wal = db_path.with_extension("db-wal");
                let shm = db_path.with_extension("db-shm");
                let _ = fs::remove_file(&wal);
                let _ = fs::remove_file(&shm);
            }
            open_and_configure(&db_path)
                .map_err(|e| format!("Database open failed after retry: {e}"))?
        }
    };

    run_migrations(&conn)?;

    info!("Database initialized (schema v{CURRENT_SCHEMA_VERSION})");

    Ok(StorageState {
        conn: Mutex::new(conn),
        db_path,
    })
}

/// In-memory store, used by tests and by callers that do not want a file.
pub fn open_in_memory() -> Result<StorageState, String> {
    let conn = Connection::open_in_memory().map_err(|e| format!("sqlite open: {e}"))?;
    conn.execute_batch(
        "PRAGMA foreign_keys = ON;
         PRAGMA busy_timeout = 5000;
         PRAGMA synchronous = NORMAL;",
    )
    .map_err(|e| format!("pragma setup: {e}"))?;
    run_migrations(&conn)?;
    Ok(StorageState {
        conn: Mutex::new(conn),
        db_path: PathBuf::from(":memory:"),
    })
}

fn open_and_configure(path: &Path) -> Result<Connection, String> {
    let conn = Connection::open(path).map_err(|e| format!("sqlite open: {e}"))?;

    conn.execute_batch(
        "PRAGMA journal_mode = WAL;
         PRAGMA foreign_keys = ON;
         PRAGMA busy_timeout = 5000;
         PRAGMA synchronous = NORMAL;",
    )
    .map_err(|e| format!("pragma setup: {e}"))?;

    Ok(conn)
}

/// Run all pending migrations up to `CURRENT_SCHEMA_VERSION`.
fn run_migrations(conn: &Connection) -> Result<(), String> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT DEFAULT (datetime('now'))
        );",
    )
    .map_err(|e| format!("create schema_version: {e}"))?;

    let current: i32 = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_version",
            [],
            |row| row.get(0),
        )
        .unwrap_or(0);

    if current >= CURRENT_SCHEMA_VERSION {
        return Ok(());
    }

    info!("Migrating database from v{current} to v{CURRENT_SCHEMA_VERSION}");

    if current < 1 {
        migrate_v1(conn)?;
    }

    Ok(())
}

fn migrate_v1(conn: &Connection) -> Result<(), String> {
    conn.execute_batch(
        "BEGIN;
         CREATE TABLE IF NOT EXISTS local_data (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL,
            updated_at TEXT DEFAULT (datetime('now'))
         );
         INSERT INTO schema_version (version) VALUES (1);
         COMMIT;",
    )
    .map_err(|e| format!("migrate v1: {e}"))
}

// ---------------------------------------------------------------------------
// Key-value access
// ---------------------------------------------------------------------------

/// Read a raw value. Returns `None` when the key was never written.
pub fn get(state: &StorageState, key: &str) -> Result<Option<String>, String> {
    let conn = state.conn.lock().map_err(|e| e.to_string())?;
    conn.query_row(
        "SELECT value FROM local_data WHERE key = ?1",
        params![key],
        |row| row.get(0),
    )
    .optional()
    .map_err(|e| format!("read {key}: {e}"))
}

/// Write a raw value, replacing any previous one.
pub fn set(state: &StorageState, key: &str, value: &str) -> Result<(), String> {
    let conn = state.conn.lock().map_err(|e| e.to_string())?;
    conn.execute(
        "INSERT INTO local_data (key, value, updated_at)
         VALUES (?1, ?2, datetime('now'))
         ON CONFLICT(key) DO UPDATE SET
            value = excluded.value,
            updated_at = excluded.updated_at",
        params![key, value],
    )
    .map_err(|e| format!("write {key}: {e}"))?;
    Ok(())
}

/// Remove a key. Silently succeeds when it does not exist.
pub fn remove(state: &StorageState, key: &str) -> Result<(), String> {
    let conn = state.conn.lock().map_err(|e| e.to_string())?;
    conn.execute("DELETE FROM local_data WHERE key = ?1", params![key])
        .map_err(|e| format!("remove {key}: {e}"))?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Typed documents
// ---------------------------------------------------------------------------

/// Load the saved table set, or `None` on a fresh install. A document that
/// fails to parse is treated as absent rather than poisoning startup.
pub fn load_tables(state: &StorageState) -> Result<Option<Vec<Table>>, String> {
    let raw = match get(state, KEY_TABLES)? {
        Some(raw) => raw,
        None => return Ok(None),
    };
    match serde_json::from_str(&raw) {
        Ok(tables) => Ok(Some(tables)),
        Err(e) => {
            warn!(error = %e, "Failed to parse saved table state");
            Ok(None)
        }
    }
}

/// Persist the table set verbatim.
pub fn save_tables(state: &StorageState, tables: &[Table]) -> Result<(), String> {
    let json = serde_json::to_string(tables).map_err(|e| format!("serialize tables: {e}"))?;
    set(state, KEY_TABLES, &json)
}

/// Load the saved catalog, or `None` on a fresh install.
pub fn load_products(state: &StorageState) -> Result<Option<Vec<Product>>, String> {
    let raw = match get(state, KEY_PRODUCTS)? {
        Some(raw) => raw,
        None => return Ok(None),
    };
    match serde_json::from_str(&raw) {
        Ok(products) => Ok(Some(products)),
        Err(e) => {
            warn!(error = %e, "Failed to parse saved products");
            Ok(None)
        }
    }
}

/// Persist the catalog verbatim.
pub fn save_products(state: &StorageState, products: &[Product]) -> Result<(), String> {
    let json = serde_json::to_string(products).map_err(|e| format!("serialize products: {e}"))?;
    set(state, KEY_PRODUCTS, &json)
}

/// Load the full history log, oldest first. Missing or unparseable data
/// reads as an empty log.
pub fn load_history(state: &StorageState) -> Result<Vec<HistoryItem>, String> {
    let raw = match get(state, KEY_HISTORY)? {
        Some(raw) => raw,
        None => return Ok(Vec::new()),
    };
    match serde_json::from_str(&raw) {
        Ok(history) => Ok(history),
        Err(e) => {
            warn!(error = %e, "Failed to parse saved history");
            Ok(Vec::new())
        }
    }
}

/// Append one archived table to the history log.
pub fn append_history(state: &StorageState, item: &HistoryItem) -> Result<(), String> {
    let mut history = load_history(state)?;
    history.push(item.clone());
    let json = serde_json::to_string(&history).map_err(|e| format!("serialize history: {e}"))?;
    set(state, KEY_HISTORY, &json)?;
    info!(history_id = %item.id, entries = history.len(), "History entry appended");
    Ok(())
}

// ===========================================================================
// Tests
// ===========================================================================
