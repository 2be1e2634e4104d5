// src/registry.rs
use crate::protocol::ServerFrame;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use tokio::sync::mpsc;

/// Handle used to push frames to one open live-channel socket.
pub type LiveHandle = mpsc::Sender<ServerFrame>;

/// Frames buffered per socket before further pushes are dropped.
pub const LIVE_OUTBOX_CAPACITY: usize = 64;

struct Connection {
    connection_id: u64,
    handle: LiveHandle,
}

/// Process-local map from user id to that user's open live channel.
///
/// A user has at most one registered socket; a newer connection replaces an
/// older one. Pushes only reach sockets held by this process.
#[derive(Default)]
pub struct ConnectionRegistry {
    next_id: AtomicU64,
    connections: RwLock<HashMap<String, Connection>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handle` for `user_id`. The connection stays registered until
    /// the returned guard is dropped.
    pub fn register(self: &Arc<Self>, user_id: &str, handle: LiveHandle) -> Registration {
        let connection_id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let replaced = self
            .connections
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(
                user_id.to_string(),
                Connection {
                    connection_id,
                    handle,
                },
            );
        if replaced.is_some() {
            tracing::debug!(user_id, "Live connection replaced by a newer one");
        }
        tracing::info!(user_id, connection_id, "Live channel registered");

        Registration {
            registry: Arc::clone(self),
            user_id: user_id.to_string(),
            connection_id,
        }
    }

    pub fn lookup(&self, user_id: &str) -> Option<LiveHandle> {
        self.connections
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(user_id)
            .map(|c| c.handle.clone())
    }

    /// Remove the registration for `user_id` if it still belongs to
    /// `connection_id`. A newer connection for the same user is left in place.
    pub fn unregister(&self, user_id: &str, connection_id: u64) {
        let mut connections = self
            .connections
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if connections
            .get(user_id)
            .is_some_and(|c| c.connection_id == connection_id)
        {
            connections.remove(user_id);
            tracing::info!(user_id, connection_id, "Live channel unregistered");
        }
    }

    /// Best-effort push. Returns false if the user has no open socket here,
    /// or if that socket's outbox is full; the frame is dropped then and the
    /// reader catches up from history.
    pub fn push(&self, user_id: &str, frame: ServerFrame) -> bool {
        let Some(handle) = self.lookup(user_id) else {
            return false;
        };
        match handle.try_send(frame) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::debug!(user_id, "Live outbox full, dropping frame");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        }
    }

    pub fn online_users(&self) -> Vec<String> {
        self.connections
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.connections
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Scoped registration: unregisters its connection when dropped, whatever
/// path the owning session exits through.
pub struct Registration {
    registry: Arc<ConnectionRegistry>,
    user_id: String,
    connection_id: u64,
}

impl Registration {
    pub fn user_id(&self) -> &str {
        &self.user_id
    }
}

impl Drop for Registration {
    fn drop(&mut self) {
        self.registry.unregister(&self.user_id, self.connection_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> Arc<ConnectionRegistry> {
        Arc::new(ConnectionRegistry::new())
    }

    #[tokio::test]
    async fn test_register_and_push() {
        let registry = registry();
        let (tx, mut rx) = mpsc::channel(LIVE_OUTBOX_CAPACITY);
        let _reg = registry.register("u1", tx);

        assert!(registry.push("u1", ServerFrame::error("hello")));
        assert_eq!(rx.recv().await.unwrap(), ServerFrame::error("hello"));
    }

    #[test]
    fn test_push_to_offline_user() {
        let registry = registry();
        assert!(!registry.push("nobody", ServerFrame::error("lost")));
    }

    #[test]
    fn test_drop_unregisters() {
        let registry = registry();
        let (tx, _rx) = mpsc::channel(LIVE_OUTBOX_CAPACITY);
        let reg = registry.register("u1", tx);
        assert!(registry.lookup("u1").is_some());

        drop(reg);

        assert!(registry.lookup("u1").is_none());
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_newer_connection_survives_old_drop() {
        let registry = registry();
        let (old_tx, _old_rx) = mpsc::channel(LIVE_OUTBOX_CAPACITY);
        let (new_tx, mut new_rx) = mpsc::channel(LIVE_OUTBOX_CAPACITY);

        let old = registry.register("u1", old_tx);
        let _new = registry.register("u1", new_tx);
        drop(old);

        assert_eq!(registry.len(), 1);
        assert!(registry.push("u1", ServerFrame::error("still here")));
        assert_eq!(
            new_rx.recv().await.unwrap(),
            ServerFrame::error("still here")
        );
    }

    #[test]
    fn test_push_to_closed_receiver_reports_failure() {
        let registry = registry();
        let (tx, rx) = mpsc::channel(LIVE_OUTBOX_CAPACITY);
        let _reg = registry.register("u1", tx);
        drop(rx);

        assert!(!registry.push("u1", ServerFrame::error("gone")));
    }

    #[test]
    fn test_push_to_full_outbox_drops_frame() {
        let registry = registry();
        let (tx, mut rx) = mpsc::channel(1);
        let _reg = registry.register("u1", tx);

        assert!(registry.push("u1", ServerFrame::error("first")));
        assert!(!registry.push("u1", ServerFrame::error("second")));

        assert_eq!(rx.try_recv().unwrap(), ServerFrame::error("first"));
        assert!(rx.try_recv().is_err());
        assert!(registry.push("u1", ServerFrame::error("third")));
    }

    #[test]
    fn test_online_users() {
        let registry = registry();
        let (a, _ra) = mpsc::channel(LIVE_OUTBOX_CAPACITY);
        let (b, _rb) = mpsc::channel(LIVE_OUTBOX_CAPACITY);
        let _ga = registry.register("a", a);
        let _gb = registry.register("b", b);

        let mut online = registry.online_users();
        online.sort();
        assert_eq!(online, vec!["a".to_string(), "b".to_string()]);
    }
}
