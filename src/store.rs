//! # Local Blob Store
//!
//! Durable local state goes through a minimal key -> JSON-string contract:
//! `get`, `set`, `remove`. The engine persists four collections under fixed
//! keys: finished sessions, the territory collection, and the two
//! pending-upload queues.
//!
//! Malformed values (corrupt JSON, wrong shape) are discarded and the key
//! removed; a corrupted collection resets to empty rather than ever failing
//! the engine.

use crate::{ActivityMode, Owner, Territory};
use log::warn;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::collections::HashMap;

/// Key for the finished-session records.
pub const SESSIONS_KEY: &str = "sessions";
/// Key for the territory collection.
pub const TERRITORIES_KEY: &str = "territories";
/// Key for queued territory creations awaiting remote confirmation.
pub const PENDING_CREATES_KEY: &str = "pending-creates";
/// Key for queued owner updates awaiting remote confirmation.
pub const PENDING_UPDATES_KEY: &str = "pending-updates";

/// Minimal durable key-value contract.
///
/// Implementations store opaque JSON strings; everything above this trait
/// treats values as serialized collections and tolerates corruption.
pub trait BlobStore {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&mut self, key: &str, value: &str);
    fn remove(&mut self, key: &str);
}

/// In-memory blob store for tests and demos.
#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    values: HashMap<String, String>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl BlobStore for MemoryBlobStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) {
        self.values.insert(key.to_string(), value.to_string());
    }

    fn remove(&mut self, key: &str) {
        self.values.remove(key);
    }
}

// ============================================================================
// Persisted Records
// ============================================================================

/// A finished tracking session, persisted locally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    pub id: String,
    pub mode: ActivityMode,
    /// Unix epoch milliseconds.
    pub started_at: i64,
    /// Unix epoch milliseconds.
    pub ended_at: i64,
    pub distance_m: f64,
    /// Loops captured during the session.
    pub loop_count: u32,
}

/// A queued write awaiting remote confirmation.
///
/// Payloads carry full state, not deltas, so a retried upload is an
/// idempotent re-send. Entries leave the queue only after a confirmed
/// successful write.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "camelCase")]
pub enum PendingUpload {
    Create { territory: Territory },
    UpdateOwners { territory_id: String, owners: Vec<Owner> },
}

// ============================================================================
// Collection Load/Save
// ============================================================================

/// Load a JSON-array collection from the store.
///
/// A missing key yields an empty collection. A malformed value is discarded
/// (the key is removed) and an empty collection returned; corruption is
/// never propagated.
pub fn load_collection<T: DeserializeOwned>(store: &mut dyn BlobStore, key: &str) -> Vec<T> {
    let raw = match store.get(key) {
        Some(raw) => raw,
        None => return Vec::new(),
    };

    match serde_json::from_str::<Vec<T>>(&raw) {
        Ok(items) => items,
        Err(e) => {
            warn!("[BlobStore] discarding malformed value under '{}': {}", key, e);
            store.remove(key);
            Vec::new()
        }
    }
}

/// Persist a collection as a JSON array under the given key.
pub fn save_collection<T: Serialize>(store: &mut dyn BlobStore, key: &str, items: &[T]) {
    match serde_json::to_string(items) {
        Ok(json) => store.set(key, &json),
        Err(e) => warn!("[BlobStore] failed to serialize '{}': {}", key, e),
    }
}

// ============================================================================
// SQLite-backed Store
// ============================================================================

/// Durable blob store on a single SQLite `kv` table.
#[cfg(feature = "persistence")]
pub struct SqliteBlobStore {
    db: rusqlite::Connection,
}

#[cfg(feature = "persistence")]
impl SqliteBlobStore {
    /// Open (or create) a store at the given database path.
    pub fn open(db_path: &str) -> rusqlite::Result<Self> {
        let db = rusqlite::Connection::open(db_path)?;
        db.execute_batch(
            "CREATE TABLE IF NOT EXISTS kv (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );",
        )?;
        Ok(Self { db })
    }

    /// Create an in-memory database (for testing).
    pub fn in_memory() -> rusqlite::Result<Self> {
        Self::open(":memory:")
    }
}

#[cfg(feature = "persistence")]
impl BlobStore for SqliteBlobStore {
    fn get(&self, key: &str) -> Option<String> {
        self.db
            .query_row("SELECT value FROM kv WHERE key = ?", [key], |row| row.get(0))
            .ok()
    }

    fn set(&mut self, key: &str, value: &str) {
        if let Err(e) = self.db.execute(
            "INSERT OR REPLACE INTO kv (key, value) VALUES (?, ?)",
            [key, value],
        ) {
            warn!("[SqliteBlobStore] write failed for '{}': {:?}", key, e);
        }
    }

    fn remove(&mut self, key: &str) {
        if let Err(e) = self.db.execute("DELETE FROM kv WHERE key = ?", [key]) {
            warn!("[SqliteBlobStore] delete failed for '{}': {:?}", key, e);
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
