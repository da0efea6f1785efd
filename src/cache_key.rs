use std::fmt;
use std::hash::Hash;
use std::marker::PhantomData;

/// Derives the identity under which a load is cached and deduplicated.
///
/// The mapping must be deterministic: two keys that should share one fetch
/// must produce equal cache keys.
pub trait CacheKeyFn<K>: Send + Sync + 'static {
    type Key: Send + Sync + Clone + Eq + Hash + 'static;

    fn cache_key(&self, key: &K) -> Self::Key;
}

/// Uses the load key itself as the cache key.
#[derive(Debug, Clone, Copy, Default)]
pub struct Identity;

impl<K> CacheKeyFn<K> for Identity
where
    K: Send + Sync + Clone + Eq + Hash + 'static,
{
    type Key = K;

    #[inline]
    fn cache_key(&self, key: &K) -> K {
        key.clone()
    }
}

/// Adapts a closure into a [CacheKeyFn].
pub struct FnCacheKey<F, C> {
    f: F,
    _mark: PhantomData<fn() -> C>,
}

impl<F, C> fmt::Debug for FnCacheKey<F, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnCacheKey").finish_non_exhaustive()
    }
}

/// Builds a [CacheKeyFn] from a closure, for composite keys that are not
/// `Hash + Eq` themselves or that carry fields irrelevant to identity.
pub fn cache_key_fn<K, C, F>(f: F) -> FnCacheKey<F, C>
where
    F: Fn(&K) -> C + Send + Sync + 'static,
    C: Send + Sync + Clone + Eq + Hash + 'static,
{
    FnCacheKey { f, _mark: PhantomData }
}

impl<K, C, F> CacheKeyFn<K> for FnCacheKey<F, C>
where
    F: Fn(&K) -> C + Send + Sync + 'static,
    C: Send + Sync + Clone + Eq + Hash + 'static,
{
    type Key = C;

    #[inline]
    fn cache_key(&self, key: &K) -> C {
        (self.f)(key)
    }
}
