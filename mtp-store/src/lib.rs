//! Pluggable storage for the auth keys a handshake produces.
//!
//! The [`AuthKeyStore`] trait abstracts over where a server keeps the
//! `auth_key_id -> AuthKey` mapping once a handshake completes, so the
//! encrypted-envelope path can look a key up by the `auth_key_id` a client
//! frame carries. Two backends are provided:
//! * [`InMemoryBackend`] — process-local, lost on restart (the default).
//! * [`SqliteBackend`] — durable, requires the `sqlite` Cargo feature.

#![deny(unsafe_code)]
#![warn(missing_docs)]

use std::collections::HashMap;
use std::sync::Arc;

use mtp_crypto::AuthKey;
use tokio::sync::RwLock;

/// Turn an [`AuthKey`]'s id into the `i64` the wire protocol uses.
pub fn auth_key_id(key: &AuthKey) -> i64 {
    i64::from_le_bytes(key.key_id())
}

/// An abstraction over where and how auth keys are persisted.
#[async_trait::async_trait]
pub trait AuthKeyStore: Send + Sync {
    /// Persist `key`, indexed by its own [`auth_key_id`].
    async fn put(&self, key: AuthKey) -> std::io::Result<()>;

    /// Look a key up by `auth_key_id`, or `None` if it isn't known.
    async fn get(&self, auth_key_id: i64) -> std::io::Result<Option<AuthKey>>;

    /// Forget a key (e.g. after the client requests its destruction).
    async fn delete(&self, auth_key_id: i64) -> std::io::Result<()>;

    /// Human-readable name of this backend (for log messages).
    fn name(&self) -> &str;
}

// ─── InMemoryBackend ───────────────────────────────────────────────────────

/// Process-local auth-key store. Everything is lost on restart.
#[derive(Default)]
pub struct InMemoryBackend {
    keys: RwLock<HashMap<i64, AuthKey>>,
}

impl InMemoryBackend {
    /// Construct an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl AuthKeyStore for InMemoryBackend {
    async fn put(&self, key: AuthKey) -> std::io::Result<()> {
        self.keys.write().await.insert(auth_key_id(&key), key);
        Ok(())
    }

    async fn get(&self, auth_key_id: i64) -> std::io::Result<Option<AuthKey>> {
        Ok(self.keys.read().await.get(&auth_key_id).cloned())
    }

    async fn delete(&self, auth_key_id: i64) -> std::io::Result<()> {
        self.keys.write().await.remove(&auth_key_id);
        Ok(())
    }

    fn name(&self) -> &str {
        "in-memory"
    }
}

// ─── SqliteBackend ─────────────────────────────────────────────────────────

#[cfg(feature = "sqlite")]
pub use sqlite_backend::SqliteBackend;

#[cfg(feature = "sqlite")]
mod sqlite_backend {
    use super::*;
    use std::path::PathBuf;

    use rusqlite::{params, Connection};
    use tokio::sync::Mutex;

    /// SQLite-backed auth-key store.
    ///
    /// Creates an `auth_keys` table if it does not already exist. The
    /// connection is serialized behind a `tokio::sync::Mutex` since
    /// `rusqlite::Connection` is not `Sync`.
    ///
    /// Enable with the `sqlite` Cargo feature:
    /// ```toml
    /// [dependencies]
    /// mtp-store = { version = "*", features = ["sqlite"] }
    /// ```
    pub struct SqliteBackend {
        conn: Mutex<Connection>,
        #[allow(dead_code)]
        path: PathBuf,
    }

    impl SqliteBackend {
        /// Open (or create) the database at `path` and ensure the schema exists.
        pub fn open(path: impl Into<PathBuf>) -> std::io::Result<Self> {
            let path = path.into();
            let conn = Connection::open(&path).map_err(to_io_error)?;
            conn.execute_batch(
                "CREATE TABLE IF NOT EXISTS auth_keys (
                    auth_key_id INTEGER PRIMARY KEY,
                    key_data    TEXT NOT NULL
                );",
            )
            .map_err(to_io_error)?;
            Ok(Self { conn: Mutex::new(conn), path })
        }
    }

    fn to_io_error(e: rusqlite::Error) -> std::io::Error {
        std::io::Error::new(std::io::ErrorKind::Other, e)
    }

    #[async_trait::async_trait]
    impl AuthKeyStore for SqliteBackend {
        async fn put(&self, key: AuthKey) -> std::io::Result<()> {
            let id = auth_key_id(&key);
            let hex_body = hex::encode(key.to_bytes());
            let conn = self.conn.lock().await;
            conn.execute(
                "INSERT OR REPLACE INTO auth_keys (auth_key_id, key_data) VALUES (?1, ?2)",
                params![id, hex_body],
            )
            .map_err(to_io_error)?;
            Ok(())
        }

        async fn get(&self, auth_key_id: i64) -> std::io::Result<Option<AuthKey>> {
            let conn = self.conn.lock().await;
            let data: Option<String> = conn
                .query_row(
                    "SELECT key_data FROM auth_keys WHERE auth_key_id = ?1",
                    params![auth_key_id],
                    |row| row.get(0),
                )
                .ok();
            Ok(data.and_then(|hex_body| {
                let bytes = hex::decode(hex_body).ok()?;
                let arr: [u8; 256] = bytes.try_into().ok()?;
                Some(AuthKey::from_bytes(arr))
            }))
        }

        async fn delete(&self, auth_key_id: i64) -> std::io::Result<()> {
            let conn = self.conn.lock().await;
            conn.execute("DELETE FROM auth_keys WHERE auth_key_id = ?1", params![auth_key_id])
                .map_err(to_io_error)?;
            Ok(())
        }

        fn name(&self) -> &str {
            "sqlite"
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_key(seed: u8) -> AuthKey {
        AuthKey::from_bytes([seed; 256])
    }

    #[tokio::test]
    async fn in_memory_round_trips() {
        let store = InMemoryBackend::new();
        let key = test_key(3);
        let id = auth_key_id(&key);
        store.put(key.clone()).await.unwrap();
        let loaded = store.get(id).await.unwrap().unwrap();
        assert_eq!(loaded, key);
    }

    #[tokio::test]
    async fn in_memory_missing_key_is_none() {
        let store = InMemoryBackend::new();
        assert!(store.get(12345).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn in_memory_delete_forgets_key() {
        let store = InMemoryBackend::new();
        let key = test_key(5);
        let id = auth_key_id(&key);
        store.put(key).await.unwrap();
        store.delete(id).await.unwrap();
        assert!(store.get(id).await.unwrap().is_none());
    }
}
