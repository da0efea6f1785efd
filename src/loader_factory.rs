use std::hash::Hash;
use std::marker::PhantomData;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::BoxFuture;

use crate::batch_fn::BatchFn;
use crate::cache::HashMapCache;
use crate::cache_key::{CacheKeyFn, Identity};
use crate::config::{LoaderConfig, Schedule};
use crate::data_loader::DataLoader;
use crate::entry::CacheEntry;
use crate::factory::CacheFactory;
use crate::scheduler::{tokio_spawner, Spawner};

pub(crate) type SharedCacheFactory<C, V, E> = Arc<dyn CacheFactory<C, CacheEntry<V, E>>>;

/// Process-wide recipe for per-scope loaders.
///
/// Keep one factory per data source for the lifetime of the process and call
/// [create](Self::create) at the start of every logical unit of work (for
/// example one incoming request). Loaders never share cache entries, so
/// values fetched on behalf of one principal cannot leak to another.
pub struct LoaderFactory<K, F, H = Identity>
where
    K: Send + Sync + Clone + 'static,
    F: BatchFn<K>,
    H: CacheKeyFn<K>,
{
    pub(crate) batch_fn: Arc<F>,
    pub(crate) cache_key: Arc<H>,
    pub(crate) cache_factory: SharedCacheFactory<H::Key, F::Value, F::Error>,
    pub(crate) config: LoaderConfig,
    pub(crate) spawner: Spawner,
    pub(crate) _mark: PhantomData<fn(K)>,
}

impl<K, F, H> Clone for LoaderFactory<K, F, H>
where
    K: Send + Sync + Clone + 'static,
    F: BatchFn<K>,
    H: CacheKeyFn<K>,
{
    fn clone(&self) -> Self {
        Self {
            batch_fn: self.batch_fn.clone(),
            cache_key: self.cache_key.clone(),
            cache_factory: self.cache_factory.clone(),
            config: self.config.clone(),
            spawner: self.spawner.clone(),
            _mark: PhantomData,
        }
    }
}

impl<K, F> LoaderFactory<K, F, Identity>
where
    K: Send + Sync + Clone + Eq + Hash + 'static,
    F: BatchFn<K>,
{
    pub fn new(batch_fn: F) -> Self {
        Self::with_cache_key(batch_fn, Identity)
    }
}

impl<K, F, H> LoaderFactory<K, F, H>
where
    K: Send + Sync + Clone + 'static,
    F: BatchFn<K>,
    H: CacheKeyFn<K>,
{
    /// Use `cache_key` to derive the identity of every requested key.
    pub fn with_cache_key(batch_fn: F, cache_key: H) -> Self {
        Self {
            batch_fn: Arc::new(batch_fn),
            cache_key: Arc::new(cache_key),
            cache_factory: Arc::new(HashMapCache::default()),
            config: LoaderConfig::default(),
            spawner: tokio_spawner(),
            _mark: PhantomData,
        }
    }

    #[must_use]
    pub fn config(self, config: LoaderConfig) -> Self {
        Self { config, ..self }
    }

    /// Specify the max batch size for loading data, `0` for no limit.
    #[must_use]
    pub fn max_batch_size(mut self, max_batch_size: usize) -> Self {
        self.config.max_batch_size = NonZeroUsize::new(max_batch_size);
        self
    }

    /// Collect keys for `delay` before dispatching.
    #[must_use]
    pub fn delay(self, delay: Duration) -> Self {
        let millis = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        self.schedule(Schedule::Delay(millis))
    }

    #[must_use]
    pub fn schedule(mut self, schedule: Schedule) -> Self {
        self.config.schedule = schedule;
        self
    }

    /// Store cache entries in storages created by `cache_factory`.
    #[must_use]
    pub fn cache_factory<C>(self, cache_factory: C) -> Self
    where
        C: CacheFactory<H::Key, CacheEntry<F::Value, F::Error>>,
    {
        Self { cache_factory: Arc::new(cache_factory), ..self }
    }

    /// Run scheduled dispatches with `spawner` instead of `tokio::spawn`.
    #[must_use]
    pub fn spawner<S>(self, spawner: S) -> Self
    where
        S: Fn(BoxFuture<'static, ()>) + Send + Sync + 'static,
    {
        Self { spawner: Arc::new(spawner), ..self }
    }

    /// Get the batch function.
    #[inline]
    pub fn batch_fn(&self) -> &F {
        &self.batch_fn
    }

    pub fn loader_config(&self) -> &LoaderConfig {
        &self.config
    }

    /// A fresh loader with an empty cache and queue.
    pub fn create(&self) -> DataLoader<K, F, H> {
        DataLoader::from_factory(self)
    }
}
