//! Snapshot rebuilds and the background worker

use super::{ClientTable, Inner, ServiceState};
use crate::error::Result;
use crate::resolver::build_resolver;
use crate::service::stats::Counters;
use crate::store::ChangeNotification;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info};

impl Inner {
    /// Mark a kind of data as changed and wake the worker
    pub(super) fn request_rebuild(&self, change: ChangeNotification) {
        match change {
            ChangeNotification::RolesChanged => self.pending_roles.store(true, Ordering::SeqCst),
            ChangeNotification::ClientsChanged => {
                self.pending_clients.store(true, Ordering::SeqCst)
            }
        }
        self.wakeup.notify_one();
    }

    /// Forward notifications until the sender side is dropped
    pub(super) async fn run_listener(
        self: Arc<Self>,
        mut notifications: mpsc::Receiver<ChangeNotification>,
    ) {
        while let Some(change) = notifications.recv().await {
            debug!(?change, "Received change notification");
            self.request_rebuild(change);
        }
        debug!("Change notification channel closed");
    }

    /// Drain pending flags, one rebuild per drain
    pub(super) async fn run_worker(self: Arc<Self>) {
        loop {
            self.wakeup.notified().await;

            loop {
                let roles = self.pending_roles.swap(false, Ordering::SeqCst);
                let clients = self.pending_clients.swap(false, Ordering::SeqCst);
                if !roles && !clients {
                    break;
                }

                if let Err(e) = self.rebuild(roles, clients).await {
                    debug!(error = %e, "Queued rebuild did not publish");
                }
            }
        }
    }

    /// Re-read the requested sources and publish new snapshots
    ///
    /// Nothing is published unless every requested source loaded and the
    /// roles validated.
    pub(super) async fn rebuild(&self, roles: bool, clients: bool) -> Result<()> {
        let _guard = self.rebuild_lock.lock().await;

        let initial = self.state() == ServiceState::Uninitialized;
        if !initial {
            self.set_state(ServiceState::Rebuilding);
        }

        let result = self.reload(roles, clients).await;
        match &result {
            Ok(()) => {
                Counters::incr(&self.counters.rebuilds);
                self.set_state(ServiceState::Ready);
            }
            Err(e) => {
                Counters::incr(&self.counters.rebuild_failures);
                error!(
                    error = %e,
                    roles,
                    clients,
                    "Scope resolver rebuild failed, keeping last good snapshot"
                );
                if !initial {
                    self.set_state(ServiceState::Ready);
                }
            }
        }
        result
    }

    async fn reload(&self, roles: bool, clients: bool) -> Result<()> {
        let resolver = if roles {
            let list = self.role_source.list_roles().await?;
            Some(build_resolver(&list, &self.config)?)
        } else {
            None
        };

        let client_list = if clients {
            Some(self.client_source.list_clients().await?)
        } else {
            None
        };

        if let Some(resolver) = resolver {
            let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
            let role_count = resolver.len();
            *self.resolver.write() = Arc::new(resolver.with_generation(generation));
            info!(generation, roles = role_count, "Published role snapshot");
        }

        if let Some(list) = client_list {
            let epoch = self.epoch.fetch_add(1, Ordering::SeqCst) + 1;
            let table = ClientTable {
                epoch,
                clients: list
                    .into_iter()
                    .map(|c| (c.client_id.clone(), c))
                    .collect(),
            };
            let client_count = table.clients.len();
            self.prune_touched(&table);
            *self.clients.write() = Arc::new(table);
            self.expansions.clear();
            info!(epoch, clients = client_count, "Published client snapshot");
        }

        Ok(())
    }

    /// Forget write-backs for deleted clients and for clients whose stored
    /// last-used time has caught up
    fn prune_touched(&self, table: &ClientTable) {
        let before = self.touched.len();
        self.touched.retain(|client_id, written| {
            table
                .clients
                .get(client_id)
                .is_some_and(|client| client.details.last_date_used < *written)
        });
        debug!(
            pruned = before.saturating_sub(self.touched.len()),
            "Pruned last-used write-backs"
        );
    }
}
