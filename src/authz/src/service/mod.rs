//! Scope resolver service
//!
//! Owns the active [`CompiledResolver`] and client snapshot, answers queries
//! against them, and rebuilds both when storage reports a change.
//!
//! - Readers clone an `Arc` under a short read lock and then work lock-free;
//!   a rebuild never blocks them and never mutates what they hold.
//! - Rebuilds are serialized. Notifications arriving meanwhile set pending
//!   flags, so a burst collapses into a single follow-up rebuild.
//! - A failed rebuild is logged and counted; the last good snapshot keeps
//!   serving.
//!
//! # Example
//!
//! ```rust
//! use scopegate_authz::{InMemoryStore, ResolverConfig, Role, ScopeResolverService};
//! use std::sync::Arc;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let store = Arc::new(InMemoryStore::with_entries(
//!     vec![Role::new("client-id:root", ["*"])],
//!     vec![],
//! ));
//! let notifications = store.subscribe(16);
//!
//! let service = ScopeResolverService::new(ResolverConfig::default(), store.clone(), store);
//! service.setup(Some(notifications)).await?;
//!
//! assert_eq!(service.resolve(&["assume:client-id:root"])?, vec!["*"]);
//! # Ok(())
//! # }
//! ```

mod rebuild;
mod stats;

pub use stats::ServiceStats;

use crate::config::ResolverConfig;
use crate::error::{ResolverError, Result};
use crate::resolver::CompiledResolver;
use crate::store::{ChangeNotification, ClientSource, RoleSource};
use crate::types::{Client, ClientSnapshot, RoleSnapshot};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use stats::Counters;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use std::sync::{Arc, OnceLock};
use tokio::runtime::Handle;
use tokio::sync::{mpsc, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Lifecycle of the service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[repr(u8)]
pub enum ServiceState {
    /// `setup` has not completed successfully
    Uninitialized = 0,
    /// Serving the active snapshot
    Ready = 1,
    /// Serving the active snapshot while a rebuild runs
    Rebuilding = 2,
}

impl ServiceState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Ready,
            2 => Self::Rebuilding,
            _ => Self::Uninitialized,
        }
    }
}

/// Clients of one published snapshot
#[derive(Debug, Default)]
struct ClientTable {
    epoch: u64,
    clients: HashMap<String, Client>,
}

/// A client expansion and the snapshots it was computed from
#[derive(Debug, Clone)]
struct CachedExpansion {
    generation: u64,
    epoch: u64,
    scopes: Vec<String>,
}

/// State shared with the background tasks
struct Inner {
    config: ResolverConfig,
    role_source: Arc<dyn RoleSource>,
    client_source: Arc<dyn ClientSource>,

    state: AtomicU8,
    resolver: RwLock<Arc<CompiledResolver>>,
    clients: RwLock<Arc<ClientTable>>,
    generation: AtomicU64,
    epoch: AtomicU64,

    /// Client id -> expansion, valid while generation and epoch match
    expansions: DashMap<String, CachedExpansion>,
    /// Client id -> last-used time written back by this service, pruned
    /// whenever a client snapshot is published
    touched: DashMap<String, DateTime<Utc>>,

    counters: Counters,

    rebuild_lock: tokio::sync::Mutex<()>,
    /// Serializes `setup` calls
    setup_lock: tokio::sync::Mutex<()>,
    /// Set once by the `setup` call that spawned the background tasks
    started: AtomicBool,
    pending_roles: AtomicBool,
    pending_clients: AtomicBool,
    wakeup: Notify,
    runtime: OnceLock<Handle>,
}

impl Inner {
    fn state(&self) -> ServiceState {
        ServiceState::from_u8(self.state.load(Ordering::SeqCst))
    }

    fn set_state(&self, state: ServiceState) {
        self.state.store(state as u8, Ordering::SeqCst);
    }

    fn ensure_ready(&self) -> Result<()> {
        match self.state() {
            ServiceState::Uninitialized => Err(ResolverError::NotReady),
            ServiceState::Ready | ServiceState::Rebuilding => Ok(()),
        }
    }

    fn current_resolver(&self) -> Arc<CompiledResolver> {
        self.resolver.read().clone()
    }

    fn current_clients(&self) -> Arc<ClientTable> {
        self.clients.read().clone()
    }
}

/// Serves scope resolution over the latest valid role and client snapshot
pub struct ScopeResolverService {
    inner: Arc<Inner>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl ScopeResolverService {
    /// Create an uninitialized service; call [`setup`](Self::setup) next
    pub fn new(
        config: ResolverConfig,
        role_source: Arc<dyn RoleSource>,
        client_source: Arc<dyn ClientSource>,
    ) -> Self {
        let empty = CompiledResolver::compile(&[], config.max_expansion_steps);
        Self {
            inner: Arc::new(Inner {
                config,
                role_source,
                client_source,
                state: AtomicU8::new(ServiceState::Uninitialized as u8),
                resolver: RwLock::new(Arc::new(empty)),
                clients: RwLock::new(Arc::new(ClientTable::default())),
                generation: AtomicU64::new(0),
                epoch: AtomicU64::new(0),
                expansions: DashMap::new(),
                touched: DashMap::new(),
                counters: Counters::default(),
                rebuild_lock: tokio::sync::Mutex::new(()),
                setup_lock: tokio::sync::Mutex::new(()),
                started: AtomicBool::new(false),
                pending_roles: AtomicBool::new(false),
                pending_clients: AtomicBool::new(false),
                wakeup: Notify::new(),
                runtime: OnceLock::new(),
            }),
            tasks: Mutex::new(Vec::new()),
        }
    }

    /// Load roles and clients, publish the first snapshot, and start the
    /// rebuild worker
    ///
    /// Must run inside a tokio runtime. Once a call has succeeded, further
    /// calls do nothing and drop their receiver.
    ///
    /// # Errors
    ///
    /// Returns the load or validation error; the service stays
    /// [`ServiceState::Uninitialized`] and `setup` may be retried.
    pub async fn setup(
        &self,
        notifications: Option<mpsc::Receiver<ChangeNotification>>,
    ) -> Result<()> {
        let _guard = self.inner.setup_lock.lock().await;
        if self.inner.started.load(Ordering::SeqCst) {
            debug!("Scope resolver service already set up");
            return Ok(());
        }

        let handle = self.inner.runtime.get_or_init(Handle::current).clone();
        self.inner.rebuild(true, true).await?;

        {
            let mut tasks = self.tasks.lock();
            tasks.push(handle.spawn(self.inner.clone().run_worker()));
            if let Some(rx) = notifications {
                tasks.push(handle.spawn(self.inner.clone().run_listener(rx)));
            }
        }
        self.inner.started.store(true, Ordering::SeqCst);

        let resolver = self.inner.current_resolver();
        info!(
            roles = resolver.len(),
            clients = self.inner.current_clients().clients.len(),
            generation = resolver.generation(),
            "Scope resolver service ready"
        );
        Ok(())
    }

    /// Expand scopes against the active role snapshot
    ///
    /// # Errors
    ///
    /// - [`ResolverError::NotReady`] before `setup` succeeded
    /// - [`ResolverError::IterationLimitExceeded`] if expansion does not converge
    pub fn resolve<S: AsRef<str>>(&self, scopes: &[S]) -> Result<Vec<String>> {
        self.inner.ensure_ready()?;
        Counters::incr(&self.inner.counters.resolves);
        self.inner.current_resolver().resolve(scopes)
    }

    /// Fetch a client with its expanded scopes
    ///
    /// Returns `Ok(None)` for an unknown client. Expired clients are returned
    /// with their expiry; rejecting them is up to the caller. When the stored
    /// last-used time is older than `max_last_used_delay`, a write-back is
    /// started in the background.
    pub fn load_client(&self, client_id: &str) -> Result<Option<ClientSnapshot>> {
        self.inner.ensure_ready()?;

        let resolver = self.inner.current_resolver();
        let table = self.inner.current_clients();
        let Some(client) = table.clients.get(client_id) else {
            return Ok(None);
        };

        let expanded = self.client_expansion(client, &resolver, table.epoch)?;
        let mut snapshot = ClientSnapshot::new(client, expanded);
        snapshot.details.last_date_used = self.record_use(client);
        Ok(Some(snapshot))
    }

    /// Fetch a role with its expanded scopes
    ///
    /// Parameterized roles report the expansion of their own scopes, other
    /// roles the expansion of `assume:<roleId>`.
    pub fn load_role(&self, role_id: &str) -> Result<Option<RoleSnapshot>> {
        self.inner.ensure_ready()?;

        let resolver = self.inner.current_resolver();
        let Some(expanded) = resolver.expand_role(role_id)? else {
            return Ok(None);
        };
        Ok(resolver
            .role(role_id)
            .map(|role| RoleSnapshot::new(role, expanded)))
    }

    /// The active resolver snapshot
    pub fn resolver(&self) -> Arc<CompiledResolver> {
        self.inner.current_resolver()
    }

    /// Queue a rebuild for a change; returns immediately
    pub fn request_rebuild(&self, change: ChangeNotification) {
        self.inner.request_rebuild(change);
    }

    /// Re-read both sources and publish new snapshots before returning
    ///
    /// # Errors
    ///
    /// - [`ResolverError::NotReady`] before `setup` succeeded
    /// - the load or validation error; the previous snapshot stays active
    pub async fn rebuild_now(&self) -> Result<()> {
        if !self.inner.started.load(Ordering::SeqCst) {
            return Err(ResolverError::NotReady);
        }
        self.inner.rebuild(true, true).await
    }

    /// Current lifecycle state
    pub fn state(&self) -> ServiceState {
        self.inner.state()
    }

    /// Generation of the active resolver; 0 before the first publish
    pub fn generation(&self) -> u64 {
        self.inner.current_resolver().generation()
    }

    /// Service counters
    pub fn stats(&self) -> ServiceStats {
        let resolver = self.inner.current_resolver();
        ServiceStats {
            generation: resolver.generation(),
            roles: resolver.len(),
            clients: self.inner.current_clients().clients.len(),
            tracked_last_used: self.inner.touched.len(),
            ..self.inner.counters.snapshot()
        }
    }

    fn client_expansion(
        &self,
        client: &Client,
        resolver: &CompiledResolver,
        epoch: u64,
    ) -> Result<Vec<String>> {
        let generation = resolver.generation();
        if let Some(cached) = self.inner.expansions.get(&client.client_id) {
            if cached.generation == generation && cached.epoch == epoch {
                Counters::incr(&self.inner.counters.client_cache_hits);
                return Ok(cached.scopes.clone());
            }
        }

        Counters::incr(&self.inner.counters.client_cache_misses);
        let scopes = resolver.resolve(&client.activation_scopes())?;
        self.inner.expansions.insert(
            client.client_id.clone(),
            CachedExpansion {
                generation,
                epoch,
                scopes: scopes.clone(),
            },
        );
        Ok(scopes)
    }

    /// Returns the effective last-used time, writing it back when stale
    fn record_use(&self, client: &Client) -> DateTime<Utc> {
        let stored = client.details.last_date_used;
        let last_used = self
            .inner
            .touched
            .get(&client.client_id)
            .map(|t| (*t).max(stored))
            .unwrap_or(stored);

        let now = Utc::now();
        if !self.is_stale(last_used, now) {
            return last_used;
        }

        // Another caller may have refreshed it in the meantime
        if let Some(previous) = self.inner.touched.insert(client.client_id.clone(), now) {
            if !self.is_stale(previous, now) {
                return previous;
            }
        }

        let Some(handle) = self.inner.runtime.get() else {
            return last_used;
        };

        Counters::incr(&self.inner.counters.last_used_writes);
        let source = self.inner.client_source.clone();
        let client_id = client.client_id.clone();
        handle.spawn(async move {
            match source.touch_last_used(&client_id, now).await {
                Ok(()) => debug!(client_id = %client_id, "Updated last used time"),
                Err(e) => warn!(client_id = %client_id, error = %e, "Failed to update last used time"),
            }
        });

        now
    }

    fn is_stale(&self, last_used: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        (now - last_used)
            .to_std()
            .map(|age| age > self.inner.config.max_last_used_delay)
            .unwrap_or(false)
    }
}

impl Drop for ScopeResolverService {
    fn drop(&mut self) {
        for task in self.tasks.lock().drain(..) {
            task.abort();
        }
    }
}

impl std::fmt::Debug for ScopeResolverService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScopeResolverService")
            .field("state", &self.state())
            .field("generation", &self.generation())
            .finish()
    }
}
