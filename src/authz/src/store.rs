//! Role and client storage contracts
//!
//! The resolver only needs to enumerate roles and clients, write back a
//! client's last-used timestamp, and hear about changes. [`InMemoryStore`]
//! implements all of it over in-process maps.

use crate::error::{ResolverError, Result};
use crate::roles::Role;
use crate::types::Client;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, RwLock};
use tracing::debug;

/// What changed in storage
///
/// Delivered at least once and possibly out of order; a rebuild always
/// re-reads the full state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeNotification {
    RolesChanged,
    ClientsChanged,
}

/// Source of the role directory
#[async_trait]
pub trait RoleSource: Send + Sync {
    /// Enumerate every role
    async fn list_roles(&self) -> Result<Vec<Role>>;
}

/// Source of client records
#[async_trait]
pub trait ClientSource: Send + Sync {
    /// Enumerate every client
    async fn list_clients(&self) -> Result<Vec<Client>>;

    /// Record that a client was used at `at`
    async fn touch_last_used(&self, client_id: &str, at: DateTime<Utc>) -> Result<()>;
}

/// In-memory role and client store
#[derive(Debug, Default)]
pub struct InMemoryStore {
    roles: Arc<RwLock<HashMap<String, Role>>>,
    clients: Arc<RwLock<HashMap<String, Client>>>,
    notifier: Mutex<Option<mpsc::Sender<ChangeNotification>>>,
    unavailable: AtomicBool,
    touches: AtomicU64,
}

impl InMemoryStore {
    /// Create a new empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store holding the given roles and clients
    ///
    /// Later entries win over earlier ones with the same id.
    pub fn with_entries(roles: Vec<Role>, clients: Vec<Client>) -> Self {
        let roles = roles.into_iter().map(|r| (r.role_id.clone(), r)).collect();
        let clients = clients
            .into_iter()
            .map(|c| (c.client_id.clone(), c))
            .collect();

        Self {
            roles: Arc::new(RwLock::new(roles)),
            clients: Arc::new(RwLock::new(clients)),
            ..Self::default()
        }
    }

    /// Load roles and clients from JSON arrays
    ///
    /// # Errors
    ///
    /// Returns [`ResolverError::InvalidDocument`] for malformed JSON.
    pub fn from_json(roles_json: &str, clients_json: Option<&str>) -> Result<Self> {
        let roles: Vec<Role> = serde_json::from_str(roles_json)?;
        let clients: Vec<Client> = match clients_json {
            Some(json) => serde_json::from_str(json)?,
            None => Vec::new(),
        };
        Ok(Self::with_entries(roles, clients))
    }

    /// Create a channel whose receiver gets every change made through this store
    ///
    /// Replaces any previously attached channel.
    pub fn subscribe(&self, buffer: usize) -> mpsc::Receiver<ChangeNotification> {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        *self.notifier.lock() = Some(tx);
        rx
    }

    /// Simulate a storage outage; every source call fails while set
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Number of last-used write-backs received
    pub fn touch_count(&self) -> u64 {
        self.touches.load(Ordering::Relaxed)
    }

    /// Insert or replace a role
    pub async fn put_role(&self, role: Role) {
        self.roles.write().await.insert(role.role_id.clone(), role);
        self.notify(ChangeNotification::RolesChanged);
    }

    /// Delete a role, returning whether it existed
    pub async fn delete_role(&self, role_id: &str) -> bool {
        let removed = self.roles.write().await.remove(role_id).is_some();
        if removed {
            self.notify(ChangeNotification::RolesChanged);
        }
        removed
    }

    /// Insert or replace a client
    pub async fn put_client(&self, client: Client) {
        self.clients
            .write()
            .await
            .insert(client.client_id.clone(), client);
        self.notify(ChangeNotification::ClientsChanged);
    }

    /// Delete a client, returning whether it existed
    pub async fn delete_client(&self, client_id: &str) -> bool {
        let removed = self.clients.write().await.remove(client_id).is_some();
        if removed {
            self.notify(ChangeNotification::ClientsChanged);
        }
        removed
    }

    /// Fetch a stored client record
    pub async fn get_client(&self, client_id: &str) -> Option<Client> {
        self.clients.read().await.get(client_id).cloned()
    }

    fn check_available(&self) -> Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(ResolverError::SourceUnavailable(
                "in-memory store is marked unavailable".to_string(),
            ));
        }
        Ok(())
    }

    fn notify(&self, change: ChangeNotification) {
        let guard = self.notifier.lock();
        let Some(tx) = guard.as_ref() else {
            return;
        };

        match tx.try_send(change) {
            Ok(()) => {}
            // A full channel already has a rebuild queued
            Err(TrySendError::Full(_)) => {
                debug!(?change, "Notification channel full, change coalesced");
            }
            Err(TrySendError::Closed(_)) => {
                debug!(?change, "Notification receiver dropped");
            }
        }
    }
}

#[async_trait]
impl RoleSource for InMemoryStore {
    async fn list_roles(&self) -> Result<Vec<Role>> {
        self.check_available()?;
        let roles = self.roles.read().await;
        Ok(roles.values().cloned().collect())
    }
}

#[async_trait]
impl ClientSource for InMemoryStore {
    async fn list_clients(&self) -> Result<Vec<Client>> {
        self.check_available()?;
        let clients = self.clients.read().await;
        Ok(clients.values().cloned().collect())
    }

    async fn touch_last_used(&self, client_id: &str, at: DateTime<Utc>) -> Result<()> {
        self.check_available()?;
        self.touches.fetch_add(1, Ordering::Relaxed);

        // Timestamps never trigger a rebuild
        if let Some(client) = self.clients.write().await.get_mut(client_id) {
            client.details.last_date_used = at;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_store_crud() {
        let store = InMemoryStore::new();
        store.put_role(Role::new("a", ["A"])).await;
        store
            .put_client(Client::new("ci", "token", Utc::now()))
            .await;

        assert_eq!(store.list_roles().await.unwrap().len(), 1);
        assert_eq!(store.list_clients().await.unwrap().len(), 1);

        assert!(store.delete_role("a").await);
        assert!(!store.delete_role("a").await);
        assert!(store.delete_client("ci").await);
        assert!(store.list_clients().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_changes_are_published() {
        let store = InMemoryStore::new();
        let mut rx = store.subscribe(8);

        store.put_role(Role::new("a", ["A"])).await;
        store
            .put_client(Client::new("ci", "token", Utc::now()))
            .await;
        store.delete_role("missing").await;

        assert_eq!(rx.recv().await, Some(ChangeNotification::RolesChanged));
        assert_eq!(rx.recv().await, Some(ChangeNotification::ClientsChanged));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_full_channel_does_not_block() {
        let store = InMemoryStore::new();
        let _rx = store.subscribe(1);
        for i in 0..10 {
            store.put_role(Role::new(format!("r{}", i), ["x"])).await;
        }
        assert_eq!(store.list_roles().await.unwrap().len(), 10);
    }

    #[tokio::test]
    async fn test_unavailable() {
        let store = InMemoryStore::new();
        store.set_unavailable(true);
        assert!(matches!(
            store.list_roles().await,
            Err(ResolverError::SourceUnavailable(_))
        ));
        store.set_unavailable(false);
        assert!(store.list_roles().await.is_ok());
    }

    #[tokio::test]
    async fn test_touch_updates_timestamp() {
        let past = Utc::now() - chrono::Duration::days(1);
        let store = InMemoryStore::with_entries(
            vec![],
            vec![Client::new("ci", "token", Utc::now()).with_last_date_used(past)],
        );

        let now = Utc::now();
        store.touch_last_used("ci", now).await.unwrap();
        assert_eq!(store.touch_count(), 1);
        assert_eq!(
            store.get_client("ci").await.unwrap().details.last_date_used,
            now
        );
    }

    #[test]
    fn test_from_json() {
        let store = InMemoryStore::from_json(
            r#"[{"roleId": "client-id:root", "scopes": ["*"]}]"#,
            Some(r#"[{"clientId": "root", "expires": "2030-01-01T00:00:00Z"}]"#),
        )
        .unwrap();
        assert_eq!(store.roles.try_read().unwrap().len(), 1);
        assert_eq!(store.clients.try_read().unwrap().len(), 1);

        assert!(matches!(
            InMemoryStore::from_json("not json", None),
            Err(ResolverError::InvalidDocument(_))
        ));
    }
}
