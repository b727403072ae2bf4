use std::collections::HashMap;
#[cfg(feature = "tracing")]
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use tokio_util::sync::CancellationToken;

/// Opaque identifier of one dispatched attempt.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub(crate) struct RequestId(u64);

#[cfg(feature = "tracing")]
impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "req-{}", self.0)
    }
}

/// Live attempts that [`PendingRegistry::abort_all`] can reach.
#[derive(Debug, Default)]
pub(crate) struct PendingRegistry {
    next_id: AtomicU64,
    handles: Mutex<HashMap<RequestId, CancellationToken>>,
}

impl PendingRegistry {
    /// Registers an attempt. The entry lives until the returned guard drops.
    ///
    /// When `parent` is given, cancelling it also cancels the attempt.
    pub(crate) fn register(
        self: &Arc<Self>,
        parent: Option<&CancellationToken>,
    ) -> PendingGuard {
        let id = RequestId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let token = parent.map_or_else(CancellationToken::new, CancellationToken::child_token);
        self.lock().insert(id, token.clone());
        PendingGuard {
            id,
            token,
            registry: Arc::clone(self),
        }
    }

    /// Cancels every registered attempt and empties the registry.
    ///
    /// Returns how many attempts were cancelled.
    pub(crate) fn abort_all(&self) -> usize {
        let drained = std::mem::take(&mut *self.lock());
        for token in drained.values() {
            token.cancel();
        }
        drained.len()
    }

    pub(crate) fn len(&self) -> usize {
        self.lock().len()
    }

    fn remove(&self, id: RequestId) {
        self.lock().remove(&id);
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<RequestId, CancellationToken>> {
        self.handles
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Registration of a single attempt; deregisters on drop.
pub(crate) struct PendingGuard {
    id: RequestId,
    token: CancellationToken,
    registry: Arc<PendingRegistry>,
}

impl PendingGuard {
    #[cfg(any(test, feature = "tracing"))]
    pub(crate) fn id(&self) -> RequestId {
        self.id
    }

    pub(crate) fn token(&self) -> &CancellationToken {
        &self.token
    }
}

impl Drop for PendingGuard {
    fn drop(&mut self) {
        self.registry.remove(self.id);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tokio_util::sync::CancellationToken;

    use super::PendingRegistry;

    #[test]
    fn guard_deregisters_on_drop() {
        let registry = Arc::new(PendingRegistry::default());
        let first = registry.register(None);
        let second = registry.register(None);
        assert_ne!(first.id(), second.id());
        assert_eq!(registry.len(), 2);

        drop(first);
        assert_eq!(registry.len(), 1);
        drop(second);
        assert_eq!(registry.len(), 0);
    }

    #[test]
    fn abort_all_cancels_and_clears() {
        let registry = Arc::new(PendingRegistry::default());
        let first = registry.register(None);
        let second = registry.register(None);

        assert_eq!(registry.abort_all(), 2);
        assert_eq!(registry.len(), 0);
        assert!(first.token().is_cancelled());
        assert!(second.token().is_cancelled());

        // Dropping an already-drained guard is harmless.
        drop(first);
        assert_eq!(registry.len(), 0);
    }

    #[test]
    fn parent_cancellation_reaches_attempt() {
        let registry = Arc::new(PendingRegistry::default());
        let parent = CancellationToken::new();
        let guard = registry.register(Some(&parent));

        parent.cancel();
        assert!(guard.token().is_cancelled());
    }

    #[test]
    fn attempt_cancellation_does_not_reach_parent() {
        let registry = Arc::new(PendingRegistry::default());
        let parent = CancellationToken::new();
        let guard = registry.register(Some(&parent));

        registry.abort_all();
        assert!(guard.token().is_cancelled());
        assert!(!parent.is_cancelled());
    }
}
