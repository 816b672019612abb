use std::sync::atomic::{self, AtomicU64};
use std::sync::Arc;

use sqltk_memstore::MemStore;
use sqltk_session::Storage;
use tracing_subscriber::EnvFilter;

/// Hands out connection ids. Clones share the same counter, so ids are never reused by any kit
/// drawing from it.
#[derive(Debug, Clone, Default)]
pub struct ConnectionIds(Arc<AtomicU64>);

impl ConnectionIds {
    pub fn new() -> Self {
        Self::default()
    }

    /// The next id, starting at 1.
    pub fn next_id(&self) -> u64 {
        self.0.fetch_add(1, atomic::Ordering::Relaxed) + 1
    }

    /// The most recently allocated id, or 0 if none has been.
    pub fn last_id(&self) -> u64 {
        self.0.load(atomic::Ordering::Relaxed)
    }
}

/// Everything the kits of one test share: the storage and the connection id allocator.
#[derive(Debug, Clone)]
pub struct TestContext<S> {
    storage: S,
    connection_ids: ConnectionIds,
}

impl TestContext<MemStore> {
    /// A context over a fresh in-memory store.
    pub fn mock() -> Self {
        Self::new(MemStore::default())
    }
}

impl<S: Storage> TestContext<S> {
    pub fn new(storage: S) -> Self {
        Self::with_connection_ids(storage, ConnectionIds::new())
    }

    pub fn with_connection_ids(storage: S, connection_ids: ConnectionIds) -> Self {
        init_logging();
        Self { storage, connection_ids }
    }

    #[inline]
    pub fn storage(&self) -> &S {
        &self.storage
    }

    #[inline]
    pub fn connection_ids(&self) -> &ConnectionIds {
        &self.connection_ids
    }
}

/// Install a log subscriber filtered by `SQLTK_LOG` (default `warn`). Does nothing if one is
/// already installed.
pub fn init_logging() {
    let filter = EnvFilter::try_from_env("SQLTK_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt::fmt().with_env_filter(filter).with_test_writer().try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connection_ids_are_shared_between_clones() {
        let ids = ConnectionIds::new();
        let other = ids.clone();
        assert_eq!(ids.last_id(), 0);
        assert_eq!(ids.next_id(), 1);
        assert_eq!(other.next_id(), 2);
        assert_eq!(ids.next_id(), 3);
        assert_eq!(other.last_id(), 3);
    }

    #[test]
    fn contexts_can_share_an_allocator() {
        let ids = ConnectionIds::new();
        let a = TestContext::with_connection_ids(MemStore::default(), ids.clone());
        let b = TestContext::with_connection_ids(MemStore::default(), ids);
        assert_eq!(a.connection_ids().next_id(), 1);
        assert_eq!(b.connection_ids().next_id(), 2);
    }
}
