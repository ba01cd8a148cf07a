use crate::key::ArtifactKey;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::OwnedMutexGuard;

/// In-process mutual exclusion per (owner, project, name).
///
/// Write operations hold their key's mutex across the whole write phase so
/// same-key mutations in one process cannot interleave. Entries live for
/// the process lifetime. Cross-process coordination is out of scope.
#[derive(Default)]
pub struct KeyLocks {
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl KeyLocks {
    pub fn new() -> Self {
        Self::default()
    }

    fn entry(&self, key: &ArtifactKey) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.locks.lock().expect("key lock table poisoned");
        locks
            .entry(key.location())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }

    /// Hold the lock for one key.
    pub async fn hold(&self, key: &ArtifactKey) -> OwnedMutexGuard<()> {
        self.entry(key).lock_owned().await
    }

    /// Hold the locks for two keys, acquired in deterministic order so two
    /// renames touching the same pair cannot deadlock. Equal keys take a
    /// single lock.
    pub async fn hold_pair(
        &self,
        first: &ArtifactKey,
        second: &ArtifactKey,
    ) -> (OwnedMutexGuard<()>, Option<OwnedMutexGuard<()>>) {
        if first == second {
            return (self.hold(first).await, None);
        }

        let mut ordered = [first, second];
        ordered.sort_by_key(|key| key.location());

        let low = self.entry(ordered[0]).lock_owned().await;
        let high = self.entry(ordered[1]).lock_owned().await;
        (low, Some(high))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_same_key_excludes() {
        let locks = Arc::new(KeyLocks::new());
        let key = ArtifactKey::new("u1", "p1", "model.pkl").unwrap();

        let held = locks.hold(&key).await;
        assert!(
            tokio::time::timeout(std::time::Duration::from_millis(50), locks.hold(&key))
                .await
                .is_err()
        );
        drop(held);

        // Released lock is acquirable again
        let _held = locks.hold(&key).await;
    }

    #[tokio::test]
    async fn test_distinct_keys_do_not_block() {
        let locks = KeyLocks::new();
        let a = ArtifactKey::new("u1", "p1", "a.pkl").unwrap();
        let b = ArtifactKey::new("u1", "p1", "b.pkl").unwrap();

        let _held_a = locks.hold(&a).await;
        let _held_b = locks.hold(&b).await;
    }

    #[tokio::test]
    async fn test_hold_pair_with_equal_keys() {
        let locks = KeyLocks::new();
        let key = ArtifactKey::new("u1", "p1", "a.pkl").unwrap();

        let (_first, second) = locks.hold_pair(&key, &key.clone()).await;
        assert!(second.is_none());
    }
}
