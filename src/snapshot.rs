use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

/// Atomically published analytics result. Writers replace the whole value;
/// readers holding a previous `Arc` keep a consistent view until they
/// re-fetch. No reader ever observes a half-updated result.
#[derive(Debug)]
pub struct SnapshotCell<T> {
    inner: RwLock<Arc<T>>,
}

impl<T> SnapshotCell<T> {
    pub fn new(initial: T) -> Self {
        Self {
            inner: RwLock::new(Arc::new(initial)),
        }
    }

    pub fn load(&self) -> Arc<T> {
        self.inner
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn publish(&self, next: T) {
        let mut guard = self
            .inner
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard = Arc::new(next);
    }
}

/// Monotonic version counter keying rule-engine idempotence: every state
/// publication bumps it, and evaluating the same version twice is a no-op.
#[derive(Debug, Default)]
pub struct SnapshotVersion(AtomicU64);

impl SnapshotVersion {
    pub fn new() -> Self {
        Self(AtomicU64::new(0))
    }

    pub fn bump(&self) -> u64 {
        self.0.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn current(&self) -> u64 {
        self.0.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn readers_keep_prior_snapshot_until_refetch() {
        let cell = SnapshotCell::new(vec![1, 2, 3]);
        let before = cell.load();
        cell.publish(vec![4]);
        assert_eq!(*before, vec![1, 2, 3]);
        assert_eq!(*cell.load(), vec![4]);
    }

    #[test]
    fn version_is_monotonic() {
        let version = SnapshotVersion::new();
        assert_eq!(version.current(), 0);
        assert_eq!(version.bump(), 1);
        assert_eq!(version.bump(), 2);
        assert_eq!(version.current(), 2);
    }
}
