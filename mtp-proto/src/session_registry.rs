//! Process-wide registry of [`ClientSession`]s.
//!
//! Created on first encrypted frame, keyed by `client_session_id` as
//! delivered inside the decrypted envelope. Reads (looking a session up on
//! every encrypted frame) dominate writes (one per first-seen session), so
//! the registry sits behind a `tokio::sync::RwLock`, which favors waiting
//! writers fairly without serializing concurrent readers against each other.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

/// Per-client-session state, created on first encrypted frame.
#[derive(Clone, Debug)]
pub struct ClientSession {
    /// The auth key identifier this session is bound to.
    pub auth_key_id: u64,
    /// Current server salt handed out to this session.
    pub server_salt: i64,
    /// Highest `message_id` seen so far from this session.
    pub last_message_id: i64,
    /// Identifier of the connection (task) that created this session.
    pub connection_id: u64,
}

/// Shared, process-wide map from `client_session_id` to [`ClientSession`].
#[derive(Clone, Default)]
pub struct ClientSessionRegistry {
    inner: Arc<RwLock<HashMap<i64, ClientSession>>>,
}

impl ClientSessionRegistry {
    /// Construct an empty registry.
    pub fn new() -> Self {
        Self { inner: Arc::new(RwLock::new(HashMap::new())) }
    }

    /// Look up a session by id. Cheap, non-blocking for concurrent readers.
    pub async fn get(&self, client_session_id: i64) -> Option<ClientSession> {
        self.inner.read().await.get(&client_session_id).cloned()
    }

    /// Insert or replace a session's recorded state.
    pub async fn put(&self, client_session_id: i64, session: ClientSession) {
        self.inner.write().await.insert(client_session_id, session);
    }

    /// Fetch the session if present, otherwise create it via `make` and
    /// insert it, returning the now-current state either way.
    pub async fn get_or_insert_with(
        &self,
        client_session_id: i64,
        make: impl FnOnce() -> ClientSession,
    ) -> ClientSession {
        if let Some(existing) = self.get(client_session_id).await {
            return existing;
        }
        let mut guard = self.inner.write().await;
        guard.entry(client_session_id).or_insert_with(make).clone()
    }

    /// Update the `last_message_id`/`server_salt` of an existing session.
    pub async fn update(&self, client_session_id: i64, last_message_id: i64, server_salt: i64) {
        if let Some(session) = self.inner.write().await.get_mut(&client_session_id) {
            session.last_message_id = last_message_id;
            session.server_salt = server_salt;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn get_on_empty_registry_returns_none() {
        let reg = ClientSessionRegistry::new();
        assert!(reg.get(1).await.is_none());
    }

    #[tokio::test]
    async fn get_or_insert_with_creates_once() {
        let reg = ClientSessionRegistry::new();
        let mut calls = 0;
        for _ in 0..3 {
            reg.get_or_insert_with(1, || {
                calls += 1;
                ClientSession { auth_key_id: 5, server_salt: 0, last_message_id: 0, connection_id: 1 }
            }).await;
        }
        assert_eq!(calls, 1);
    }

    #[tokio::test]
    async fn update_mutates_existing_session() {
        let reg = ClientSessionRegistry::new();
        reg.put(1, ClientSession { auth_key_id: 5, server_salt: 10, last_message_id: 0, connection_id: 1 }).await;
        reg.update(1, 42, 99).await;
        let session = reg.get(1).await.unwrap();
        assert_eq!(session.last_message_id, 42);
        assert_eq!(session.server_salt, 99);
    }
}
