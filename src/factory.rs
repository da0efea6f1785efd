use std::hash::Hash;

use super::storage::CacheStorage;

/// Creates a fresh, empty [CacheStorage] for every loader instance.
pub trait CacheFactory<K, V>: Send + Sync + 'static
where
    K: Send + Sync + Clone + Eq + Hash + 'static,
    V: Send + Sync + Clone + 'static,
{
    /// Create a cache storage.
    fn create(&self) -> Box<dyn CacheStorage<Key = K, Value = V>>;
}
