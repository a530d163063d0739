//! Identity registry - the authoritative map of online names

use super::connection::{ConnectionHandle, ConnectionId};
use std::collections::HashMap;
use thiserror::Error;
use tokio::sync::RwLock;

/// Reasons a name cannot be registered
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("Username must not be empty")]
    InvalidName,

    #[error("Username '{0}' is already taken")]
    AlreadyTaken(String),
}

struct Entry {
    handle: ConnectionHandle,
    /// Join order, used to keep the roster stable
    seq: u64,
}

#[derive(Default)]
struct Inner {
    entries: HashMap<String, Entry>,
    next_seq: u64,
}

impl Inner {
    fn ordered(&self) -> Vec<(&String, &Entry)> {
        let mut entries: Vec<_> = self.entries.iter().collect();
        entries.sort_by_key(|(_, entry)| entry.seq);
        entries
    }
}

/// Maps each online name to the connection that claimed it.
///
/// Every operation takes the lock for a short, await-free critical section.
/// Broadcast targets are copied out under the lock and sent to afterwards, so
/// no send ever holds the registry.
#[derive(Default)]
pub struct Registry {
    inner: RwLock<Inner>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `name` for `handle`
    pub async fn register(&self, name: &str, handle: ConnectionHandle) -> Result<(), RegistryError> {
        if name.is_empty() {
            return Err(RegistryError::InvalidName);
        }

        let mut inner = self.inner.write().await;
        if inner.entries.contains_key(name) {
            return Err(RegistryError::AlreadyTaken(name.to_string()));
        }

        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner.entries.insert(name.to_string(), Entry { handle, seq });
        Ok(())
    }

    /// Release `name` if it is still held by connection `owner`.
    ///
    /// Returns whether an entry was removed. Absent names and names held by
    /// another connection are left alone.
    pub async fn unregister(&self, name: &str, owner: ConnectionId) -> bool {
        let mut inner = self.inner.write().await;
        let owned = inner
            .entries
            .get(name)
            .is_some_and(|entry| entry.handle.id() == owner);
        if owned {
            inner.entries.remove(name);
        }
        owned
    }

    /// Find the connection registered under `name`
    pub async fn lookup(&self, name: &str) -> Option<ConnectionHandle> {
        let inner = self.inner.read().await;
        inner.entries.get(name).map(|entry| entry.handle.clone())
    }

    pub async fn contains(&self, name: &str) -> bool {
        self.inner.read().await.entries.contains_key(name)
    }

    /// Names currently online, in join order
    pub async fn snapshot(&self) -> Vec<String> {
        let inner = self.inner.read().await;
        inner.ordered().into_iter().map(|(name, _)| name.clone()).collect()
    }

    /// Roster and every handle, taken from the same registry state
    pub async fn snapshot_with_handles(&self) -> (Vec<String>, Vec<ConnectionHandle>) {
        let inner = self.inner.read().await;
        inner
            .ordered()
            .into_iter()
            .map(|(name, entry)| (name.clone(), entry.handle.clone()))
            .unzip()
    }

    /// Every registered handle
    pub async fn handles(&self) -> Vec<ConnectionHandle> {
        let inner = self.inner.read().await;
        inner.entries.values().map(|entry| entry.handle.clone()).collect()
    }

    /// Every registered handle except the one registered as `excluded`
    pub async fn handles_except(&self, excluded: &str) -> Vec<ConnectionHandle> {
        let inner = self.inner.read().await;
        inner
            .entries
            .iter()
            .filter(|(name, _)| name.as_str() != excluded)
            .map(|(_, entry)| entry.handle.clone())
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_register_rejects_empty_and_duplicate() {
        let registry = Registry::new();
        let (a, _rx_a) = ConnectionHandle::channel(1);
        let (b, _rx_b) = ConnectionHandle::channel(1);

        assert_eq!(
            registry.register("", a.clone()).await,
            Err(RegistryError::InvalidName)
        );
        registry.register("alice", a).await.unwrap();
        assert_eq!(
            registry.register("alice", b).await,
            Err(RegistryError::AlreadyTaken("alice".to_string()))
        );
        assert_eq!(registry.len().await, 1);
    }

    #[tokio::test]
    async fn test_unregister_only_by_owner() {
        let registry = Registry::new();
        let (owner, _rx_a) = ConnectionHandle::channel(1);
        let (intruder, _rx_b) = ConnectionHandle::channel(1);
        registry.register("alice", owner.clone()).await.unwrap();

        assert!(!registry.unregister("alice", intruder.id()).await);
        assert!(registry.contains("alice").await);

        assert!(registry.unregister("alice", owner.id()).await);
        assert!(!registry.unregister("alice", owner.id()).await);
        assert!(!registry.unregister("never-there", owner.id()).await);
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn test_snapshot_keeps_join_order() {
        let registry = Registry::new();
        let mut receivers = Vec::new();
        for name in ["zed", "amy", "mia"] {
            let (handle, rx) = ConnectionHandle::channel(1);
            receivers.push(rx);
            registry.register(name, handle).await.unwrap();
        }

        assert_eq!(registry.snapshot().await, vec!["zed", "amy", "mia"]);
    }

    #[tokio::test]
    async fn test_handles_except_skips_named_entry() {
        let registry = Registry::new();
        let (a, _rx_a) = ConnectionHandle::channel(1);
        let (b, _rx_b) = ConnectionHandle::channel(1);
        registry.register("a", a).await.unwrap();
        registry.register("b", b.clone()).await.unwrap();

        let targets = registry.handles_except("a").await;
        assert_eq!(targets.len(), 1);
        assert_eq!(targets[0].id(), b.id());

        assert_eq!(registry.handles_except("nobody").await.len(), 2);
    }
}
