//! Service counters

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Point-in-time service statistics
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceStats {
    /// Number of `resolve` calls
    pub resolves: u64,
    /// Successful rebuilds, including the initial load
    pub rebuilds: u64,
    /// Rebuilds that failed and left the previous snapshot active
    pub rebuild_failures: u64,
    /// Client expansions served from cache
    pub client_cache_hits: u64,
    /// Client expansions computed on demand
    pub client_cache_misses: u64,
    /// Last-used write-backs issued
    pub last_used_writes: u64,
    /// Generation of the active resolver
    pub generation: u64,
    /// Roles in the active resolver
    pub roles: usize,
    /// Clients in the active client snapshot
    pub clients: usize,
    /// Clients whose written-back last-used time is still remembered
    pub tracked_last_used: usize,
}

impl ServiceStats {
    /// Calculates the client cache hit rate
    pub fn hit_rate(&self) -> f64 {
        let total = self.client_cache_hits + self.client_cache_misses;
        if total == 0 {
            0.0
        } else {
            self.client_cache_hits as f64 / total as f64
        }
    }
}

/// Lock-free counters behind [`ServiceStats`]
#[derive(Debug, Default)]
pub(crate) struct Counters {
    pub(crate) resolves: AtomicU64,
    pub(crate) rebuilds: AtomicU64,
    pub(crate) rebuild_failures: AtomicU64,
    pub(crate) client_cache_hits: AtomicU64,
    pub(crate) client_cache_misses: AtomicU64,
    pub(crate) last_used_writes: AtomicU64,
}

impl Counters {
    pub(crate) fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> ServiceStats {
        ServiceStats {
            resolves: self.resolves.load(Ordering::Relaxed),
            rebuilds: self.rebuilds.load(Ordering::Relaxed),
            rebuild_failures: self.rebuild_failures.load(Ordering::Relaxed),
            client_cache_hits: self.client_cache_hits.load(Ordering::Relaxed),
            client_cache_misses: self.client_cache_misses.load(Ordering::Relaxed),
            last_used_writes: self.last_used_writes.load(Ordering::Relaxed),
            ..ServiceStats::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hit_rate() {
        let mut stats = ServiceStats::default();
        assert_eq!(stats.hit_rate(), 0.0);

        stats.client_cache_hits = 3;
        stats.client_cache_misses = 1;
        assert_eq!(stats.hit_rate(), 0.75);
    }

    #[test]
    fn test_counters_snapshot() {
        let counters = Counters::default();
        Counters::incr(&counters.resolves);
        Counters::incr(&counters.resolves);
        Counters::incr(&counters.rebuild_failures);

        let stats = counters.snapshot();
        assert_eq!(stats.resolves, 2);
        assert_eq!(stats.rebuild_failures, 1);
        assert_eq!(stats.rebuilds, 0);
    }
}
