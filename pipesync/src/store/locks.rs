//! Per-scope write locks.

use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use crate::core::{Collection, Scope};

/// Identifies a set of rows that must be rewritten as a unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScopeKey {
    /// The operator graph of an experiment or deployment.
    Graph(Scope),
    /// An ordered list under a parent.
    List(Collection, Uuid),
}

/// Lazily created async mutexes, one per [`ScopeKey`].
///
/// Writers of the same scope queue behind each other; different scopes
/// never contend. An entry lives only while some caller holds or awaits it.
#[derive(Debug, Default)]
pub struct ScopeLocks {
    locks: DashMap<ScopeKey, Arc<Mutex<()>>>,
}

impl ScopeLocks {
    /// Creates an empty lock table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits for exclusive access to `key`.
    pub async fn lock(&self, key: ScopeKey) -> ScopeGuard<'_> {
        let mutex = self.locks.entry(key).or_default().clone();
        ScopeGuard {
            locks: &self.locks,
            key,
            guard: Some(mutex.lock_owned().await),
        }
    }

    /// Number of scopes currently locked or awaited.
    #[must_use]
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    /// Returns true if no scope is locked or awaited.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

/// Exclusive access to one scope; releases the lock on drop.
#[must_use = "the scope is unlocked as soon as the guard is dropped"]
pub struct ScopeGuard<'a> {
    locks: &'a DashMap<ScopeKey, Arc<Mutex<()>>>,
    key: ScopeKey,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for ScopeGuard<'_> {
    fn drop(&mut self) {
        // Release the mutex first so its Arc no longer counts.
        self.guard.take();
        self.locks.remove_if(&self.key, |_, mutex| Arc::strong_count(mutex) == 1);
    }
}

impl std::fmt::Debug for ScopeGuard<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScopeGuard").field("key", &self.key).finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_same_scope_is_exclusive() {
        let locks = Arc::new(ScopeLocks::new());
        let key = ScopeKey::List(Collection::Deployments, Uuid::new_v4());

        let guard = locks.lock(key).await;
        let contender = {
            let locks = locks.clone();
            tokio::spawn(async move {
                let _guard = locks.lock(key).await;
            })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!contender.is_finished());
        drop(guard);
        contender.await.unwrap();
    }

    #[tokio::test]
    async fn test_different_scopes_do_not_contend() {
        let locks = ScopeLocks::new();
        let _a = locks.lock(ScopeKey::List(Collection::Experiments, Uuid::new_v4())).await;
        let _b = locks.lock(ScopeKey::Graph(Scope::Experiment(Uuid::new_v4()))).await;
        assert_eq!(locks.len(), 2);
    }

    #[tokio::test]
    async fn test_released_scopes_are_forgotten() {
        let locks = ScopeLocks::new();
        for _ in 0..1000 {
            let _guard = locks.lock(ScopeKey::List(Collection::Comparisons, Uuid::new_v4())).await;
        }
        assert_eq!(locks.len(), 0);
        assert!(locks.is_empty());
    }

    #[tokio::test]
    async fn test_entry_survives_while_contended() {
        let locks = Arc::new(ScopeLocks::new());
        let key = ScopeKey::Graph(Scope::Deployment(Uuid::new_v4()));

        let guard = locks.lock(key).await;
        let contender = {
            let locks = locks.clone();
            tokio::spawn(async move {
                let _guard = locks.lock(key).await;
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        drop(guard);
        assert_eq!(locks.len(), 1);

        contender.await.unwrap();
        assert!(locks.is_empty());
    }
}
