// ── Reactive device collection ──
//
// Concurrent storage with O(1) lookups and push-based change notification
// via `watch` channels. Entries are whole `Arc<T>` values, so a reader
// never sees a half-written entity.

use std::hash::Hash;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::watch;

/// A concurrent, reactive collection keyed by `K`.
///
/// Every batch of mutations rebuilds the snapshot and bumps the version
/// once, so subscribers see one change per batch rather than one per entry.
pub(crate) struct EntityCollection<K, T>
where
    K: Eq + Hash + Ord + Clone + Send + Sync + 'static,
    T: Send + Sync + 'static,
{
    by_key: DashMap<K, Arc<T>>,

    /// Version counter, bumped once per batch.
    version: watch::Sender<u64>,

    /// Full snapshot sorted by key, rebuilt after each batch.
    snapshot: watch::Sender<Arc<Vec<Arc<T>>>>,
}

impl<K, T> EntityCollection<K, T>
where
    K: Eq + Hash + Ord + Clone + Send + Sync + 'static,
    T: Send + Sync + 'static,
{
    pub(crate) fn new() -> Self {
        let (version, _) = watch::channel(0u64);
        let (snapshot, _) = watch::channel(Arc::new(Vec::new()));

        Self {
            by_key: DashMap::new(),
            version,
            snapshot,
        }
    }

    /// Insert or replace a batch of entities, then notify once.
    ///
    /// Keys absent from the batch are left untouched. Returns the number of
    /// keys that were new.
    pub(crate) fn upsert_many(&self, entries: impl IntoIterator<Item = (K, T)>) -> usize {
        let mut added = 0;
        for (key, entity) in entries {
            if self.by_key.insert(key, Arc::new(entity)).is_none() {
                added += 1;
            }
        }
        self.publish();
        added
    }

    /// Insert or replace one entity. Returns `true` if the key was new.
    #[cfg(test)]
    pub(crate) fn upsert(&self, key: K, entity: T) -> bool {
        self.upsert_many([(key, entity)]) == 1
    }

    /// Replace an existing entity with a modified copy and notify.
    ///
    /// The closure runs under the shard lock, so two concurrent modifies of
    /// the same key serialize. Returns the new value, or `None` if the key
    /// is unknown.
    pub(crate) fn modify(&self, key: &K, f: impl FnOnce(&mut T)) -> Option<Arc<T>>
    where
        T: Clone,
    {
        let updated = {
            let mut entry = self.by_key.get_mut(key)?;
            let mut next = T::clone(entry.value());
            f(&mut next);
            let next = Arc::new(next);
            *entry.value_mut() = Arc::clone(&next);
            next
        };
        self.publish();
        Some(updated)
    }

    pub(crate) fn get(&self, key: &K) -> Option<Arc<T>> {
        self.by_key.get(key).map(|r| Arc::clone(r.value()))
    }

    pub(crate) fn contains(&self, key: &K) -> bool {
        self.by_key.contains_key(key)
    }

    /// Current snapshot (cheap `Arc` clone).
    pub(crate) fn snapshot(&self) -> Arc<Vec<Arc<T>>> {
        self.snapshot.borrow().clone()
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<Arc<Vec<Arc<T>>>> {
        self.snapshot.subscribe()
    }

    pub(crate) fn version(&self) -> u64 {
        *self.version.borrow()
    }

    pub(crate) fn len(&self) -> usize {
        self.by_key.len()
    }

    // ── Private helpers ──────────────────────────────────────────────

    fn publish(&self) {
        let mut entries: Vec<(K, Arc<T>)> = self
            .by_key
            .iter()
            .map(|r| (r.key().clone(), Arc::clone(r.value())))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        let values = entries.into_iter().map(|(_, v)| v).collect();
        // `send_modify` updates unconditionally, even with zero receivers.
        self.snapshot.send_modify(|snap| *snap = Arc::new(values));
        self.version.send_modify(|v| *v += 1);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn upsert_returns_true_for_new_key() {
        let col: EntityCollection<String, u32> = EntityCollection::new();
        assert!(col.upsert("a".into(), 1));
        assert!(!col.upsert("a".into(), 2));
        assert_eq!(*col.get(&"a".into()).unwrap(), 2);
    }

    #[test]
    fn batch_bumps_version_once() {
        let col: EntityCollection<String, u32> = EntityCollection::new();
        let added = col.upsert_many([("b".into(), 2), ("a".into(), 1), ("c".into(), 3)]);
        assert_eq!(added, 3);
        assert_eq!(col.version(), 1);
        assert_eq!(col.len(), 3);
    }

    #[test]
    fn batch_keeps_absent_keys() {
        let col: EntityCollection<String, u32> = EntityCollection::new();
        col.upsert_many([("a".into(), 1), ("b".into(), 2)]);
        col.upsert_many([("a".into(), 10)]);
        assert_eq!(*col.get(&"b".into()).unwrap(), 2);
        assert_eq!(*col.get(&"a".into()).unwrap(), 10);
    }

    #[test]
    fn snapshot_is_sorted_by_key() {
        let col: EntityCollection<String, u32> = EntityCollection::new();
        col.upsert_many([("b".into(), 2), ("c".into(), 3), ("a".into(), 1)]);
        let values: Vec<u32> = col.snapshot().iter().map(|v| **v).collect();
        assert_eq!(values, vec![1, 2, 3]);
    }

    #[test]
    fn modify_swaps_whole_value() {
        let col: EntityCollection<String, Vec<u32>> = EntityCollection::new();
        col.upsert("a".into(), vec![1]);
        let before = col.get(&"a".into()).unwrap();

        let after = col.modify(&"a".into(), |v| v.push(2)).unwrap();
        assert_eq!(*before, vec![1]);
        assert_eq!(*after, vec![1, 2]);
        assert_eq!(col.version(), 2);

        assert!(col.modify(&"missing".into(), |v| v.push(3)).is_none());
        assert_eq!(col.version(), 2);
    }
}
