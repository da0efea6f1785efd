use std::collections::hash_map::RandomState;
use std::collections::HashMap;
use std::hash::{BuildHasher, Hash};
use std::marker::PhantomData;

use super::factory::CacheFactory;
use super::storage::CacheStorage;

/// Factory for storages that never keep anything.
///
/// Every `load` after a dispatch misses. Keys requested twice inside one
/// scheduling window are still coalesced by the pending queue.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCache;

impl<K, V> CacheFactory<K, V> for NoCache
where
    K: Send + Sync + Clone + Eq + Hash + 'static,
    V: Send + Sync + Clone + 'static,
{
    fn create(&self) -> Box<dyn CacheStorage<Key = K, Value = V>> {
        Box::new(NoCacheImpl { _mark: PhantomData })
    }
}

pub struct NoCacheImpl<K, V> {
    _mark: PhantomData<fn() -> (K, V)>,
}

impl<K, V> CacheStorage for NoCacheImpl<K, V>
where
    K: Send + Sync + Clone + Eq + Hash + 'static,
    V: Send + Sync + Clone + 'static,
{
    type Key = K;
    type Value = V;

    #[inline]
    fn get(&self, _key: &K) -> Option<&V> {
        None
    }

    #[inline]
    fn insert(&mut self, _key: K, _val: V) {}

    #[inline]
    fn remove(&mut self, _key: &K) {}

    #[inline]
    fn clear(&mut self) {}

    #[inline]
    fn len(&self) -> usize {
        0
    }
}

/// Default factory: every loader gets its own empty `HashMap`, hashed with
/// `S`. Entries are only dropped by `clear`, `clear_all` or
/// `prime_overwrite`.
pub struct HashMapCache<S = RandomState> {
    _mark: PhantomData<fn() -> S>,
}

impl<S: Send + Sync + BuildHasher + Default + 'static> HashMapCache<S> {
    /// Same as `default()`, with the hasher named explicitly.
    pub fn new() -> Self {
        Self { _mark: PhantomData }
    }
}

impl Default for HashMapCache<RandomState> {
    fn default() -> Self {
        Self { _mark: PhantomData }
    }
}

impl<K, V, S: Send + Sync + BuildHasher + Default + 'static> CacheFactory<K, V> for HashMapCache<S>
where
    K: Send + Sync + Clone + Eq + Hash + 'static,
    V: Send + Sync + Clone + 'static,
{
    fn create(&self) -> Box<dyn CacheStorage<Key = K, Value = V>> {
        Box::new(HashMapCacheImpl::<K, V, S>(HashMap::default()))
    }
}

pub struct HashMapCacheImpl<K, V, S>(HashMap<K, V, S>);

impl<K, V, S> CacheStorage for HashMapCacheImpl<K, V, S>
where
    K: Send + Sync + Clone + Eq + Hash + 'static,
    V: Send + Sync + Clone + 'static,
    S: Send + Sync + BuildHasher + 'static,
{
    type Key = K;
    type Value = V;

    #[inline]
    fn get(&self, key: &Self::Key) -> Option<&Self::Value> {
        self.0.get(key)
    }

    #[inline]
    fn insert(&mut self, key: Self::Key, val: Self::Value) {
        self.0.insert(key, val);
    }

    #[inline]
    fn remove(&mut self, key: &Self::Key) {
        self.0.remove(key);
    }

    #[inline]
    fn clear(&mut self) {
        self.0.clear();
    }

    #[inline]
    fn len(&self) -> usize {
        self.0.len()
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_hash_map_cache() {
        let mut storage = CacheFactory::<u64, String>::create(&HashMapCache::default());
        storage.insert(1, "one".to_string());
        storage.insert(2, "two".to_string());
        storage.insert(1, "uno".to_string());

        assert_eq!(storage.len(), 2);
        assert_eq!(storage.get(&1), Some(&"uno".to_string()));

        storage.remove(&1);
        assert_eq!(storage.get(&1), None);

        storage.clear();
        assert!(storage.is_empty());
    }

    #[test]
    fn test_no_cache() {
        let mut storage = CacheFactory::<u64, String>::create(&NoCache);
        storage.insert(1, "one".to_string());

        assert_eq!(storage.get(&1), None);
        assert!(storage.is_empty());
    }

    #[test]
    fn test_factory_creates_independent_storages() {
        let factory = HashMapCache::default();
        let mut first = CacheFactory::<u64, u64>::create(&factory);
        let second = CacheFactory::<u64, u64>::create(&factory);
        first.insert(1, 1);

        assert_eq!(first.len(), 1);
        assert_eq!(second.len(), 0);
    }
}
