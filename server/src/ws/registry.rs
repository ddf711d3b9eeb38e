//! Connection registry: user id -> live WebSocket connection.
//!
//! At most one live connection per user. A reconnect overwrites the prior
//! mapping (last-connect-wins; no multi-device fan-out). State is
//! process-lifetime only — after a restart every user appears offline
//! until they reconnect.

use std::sync::Arc;

use dashmap::DashMap;

use crate::ws::ConnectionSender;

struct ConnectionEntry {
    /// Per-socket id; guards unregister against a stale disconnect
    /// racing a reconnect.
    connection_id: String,
    sender: ConnectionSender,
}

#[derive(Clone)]
pub struct ConnectionRegistry {
    inner: Arc<DashMap<String, ConnectionEntry>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(DashMap::new()),
        }
    }

    /// Register a connection for a user, overwriting any prior mapping.
    /// Idempotent; never errors.
    pub fn register(&self, user_id: &str, connection_id: &str, sender: ConnectionSender) {
        self.inner.insert(
            user_id.to_string(),
            ConnectionEntry {
                connection_id: connection_id.to_string(),
                sender,
            },
        );
        tracing::debug!(user_id = %user_id, connection_id = %connection_id, "connection registered");
    }

    /// Remove the mapping only if the stored connection id still matches.
    /// Returns true if a mapping was removed; a stale id is a no-op.
    pub fn unregister(&self, user_id: &str, connection_id: &str) -> bool {
        let removed = self
            .inner
            .remove_if(user_id, |_, entry| entry.connection_id == connection_id)
            .is_some();
        if removed {
            tracing::debug!(user_id = %user_id, connection_id = %connection_id, "connection unregistered");
        }
        removed
    }

    /// Resolve a user to their live connection sender, if online.
    pub fn lookup(&self, user_id: &str) -> Option<ConnectionSender> {
        self.inner.get(user_id).map(|entry| entry.sender.clone())
    }

    pub fn is_online(&self, user_id: &str) -> bool {
        self.inner.contains_key(user_id)
    }

    /// Snapshot of all currently-connected user ids.
    pub fn online_users(&self) -> Vec<String> {
        self.inner.iter().map(|entry| entry.key().clone()).collect()
    }

    /// Iterate over all live senders (for full broadcasts).
    pub fn for_each_sender(&self, mut f: impl FnMut(&ConnectionSender)) {
        for entry in self.inner.iter() {
            f(&entry.sender);
        }
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    fn sender() -> ConnectionSender {
        let (tx, _rx) = mpsc::unbounded_channel();
        tx
    }

    #[test]
    fn register_is_idempotent() {
        let registry = ConnectionRegistry::new();
        let tx = sender();
        registry.register("u1", "c1", tx.clone());
        registry.register("u1", "c1", tx);
        assert!(registry.is_online("u1"));
        assert_eq!(registry.online_users(), vec!["u1".to_string()]);
    }

    #[test]
    fn last_connect_wins() {
        let registry = ConnectionRegistry::new();
        registry.register("u1", "c1", sender());
        registry.register("u1", "c2", sender());

        // The stale connection's disconnect must not remove the new mapping
        assert!(!registry.unregister("u1", "c1"));
        assert!(registry.is_online("u1"));

        assert!(registry.unregister("u1", "c2"));
        assert!(!registry.is_online("u1"));
    }

    #[test]
    fn stale_unregister_is_noop() {
        let registry = ConnectionRegistry::new();
        registry.register("u1", "c1", sender());
        assert!(!registry.unregister("u1", "c-other"));
        assert!(registry.lookup("u1").is_some());
    }

    #[test]
    fn lookup_absent_user() {
        let registry = ConnectionRegistry::new();
        assert!(registry.lookup("nobody").is_none());
        assert!(!registry.is_online("nobody"));
        assert!(registry.online_users().is_empty());
    }
}
