//! The `Worker` collaborator: identifies a crawl worker and is notified
//! when the seed it is working under finishes, per `SPEC_FULL.md` §4.6.

use std::sync::atomic::{AtomicU64, Ordering};

/// Stable handle for a registered worker. Opaque beyond equality/ordering;
/// assigned by [`crate::frontier::Frontier::register_worker`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct WorkerId(u64);

impl WorkerId {
    /// Mint a fresh, process-unique id. Stateful `Worker` implementations
    /// should call this once at construction and return the stored value
    /// from `id()`, rather than relying on the default implementation
    /// (which mints a new one on every call).
    pub fn new() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        WorkerId(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for WorkerId {
    fn default() -> Self {
        WorkerId::new()
    }
}

impl std::fmt::Display for WorkerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "worker-{}", self.0)
    }
}

/// A listener notified of seed lifecycle events. The frontier holds
/// registered workers as `Arc<dyn Worker>` and broadcasts to all of them —
/// `removeOffspring`'s signature names a seed, not a specific worker, so
/// every worker that might care about that seed's completion is told.
pub trait Worker: Send + Sync {
    /// Assigns this worker a fresh, process-unique identifier. The default
    /// implementation is almost always correct; override only if identity
    /// must be stable across process restarts.
    fn id(&self) -> WorkerId {
        WorkerId::new()
    }

    /// Called once a seed's offspring counter reaches zero and the seed has
    /// no further URLs pending anywhere in the frontier.
    fn on_seed_end(&self, seed_docid: crate::url_record::SeedDocid);
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Noop;
    impl Worker for Noop {
        fn on_seed_end(&self, _seed_docid: crate::url_record::SeedDocid) {}
    }

    #[test]
    fn distinct_workers_get_distinct_ids() {
        let a = Noop.id();
        let b = Noop.id();
        assert_ne!(a, b);
    }

    #[test]
    fn worker_id_display_is_stable_format() {
        let id = Noop.id();
        assert!(format!("{id}").starts_with("worker-"));
    }
}
