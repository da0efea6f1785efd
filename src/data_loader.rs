use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures_util::future::{self, BoxFuture, JoinAll};
use futures_util::{Future, FutureExt};
use tracing::Instrument;

use crate::batch_fn::BatchFn;
use crate::cache::NoCache;
use crate::cache_key::{CacheKeyFn, Identity};
use crate::config::{LoaderConfig, Schedule};
use crate::entry::{CacheEntry, EntryState, Load, Outcome};
use crate::error::LoadError;
use crate::factory::CacheFactory;
use crate::loader_factory::{LoaderFactory, SharedCacheFactory};
use crate::scheduler::{self, Boundary, Pending, Queue, Spawner};
use crate::storage::CacheStorage;
use crate::{executor, resolve};

type Storage<C, V, E> = Box<dyn CacheStorage<Key = C, Value = CacheEntry<V, E>>>;

/// Future returned by [DataLoader::load_many].
pub type LoadMany<V, E> =
    future::Map<JoinAll<Load<V, E>>, fn(Vec<Result<V, LoadError<E>>>) -> Result<Vec<V>, LoadError<E>>>;

struct State<C, K, V, E> {
    cache: Storage<C, V, E>,
    queue: Queue<C, K, V, E>,
}

struct Inner<K, F, H>
where
    K: Send + Sync + Clone + 'static,
    F: BatchFn<K>,
    H: CacheKeyFn<K>,
{
    batch_fn: Arc<F>,
    cache_key: Arc<H>,
    cache_factory: SharedCacheFactory<H::Key, F::Value, F::Error>,
    config: LoaderConfig,
    spawner: Spawner,
    state: Mutex<State<H::Key, K, F::Value, F::Error>>,
}

/// Data loader.
///
/// Coalesces every [load](Self::load) issued before the next scheduling
/// boundary (see [Schedule]) into one call of the batch function and
/// memoizes the outcome per cache key until [clear](Self::clear)ed.
///
/// A loader belongs to one logical unit of work. Create it per request, for
/// example through a [LoaderFactory], and drop it when the work is done:
/// dropping rejects every load still waiting for its boundary with
/// [LoadError::Cancelled] and the batch function is never called for them.
///
/// Reference: <https://github.com/graphql/dataloader>
pub struct DataLoader<K, F, H = Identity>
where
    K: Send + Sync + Clone + 'static,
    F: BatchFn<K>,
    H: CacheKeyFn<K>,
{
    inner: Arc<Inner<K, F, H>>,
}

impl<K, F> DataLoader<K, F, Identity>
where
    K: Send + Sync + Clone + Eq + Hash + 'static,
    F: BatchFn<K>,
{
    /// Use `batch_fn` to create a [DataLoader] that caches by key.
    pub fn new(batch_fn: F) -> Self {
        LoaderFactory::new(batch_fn).create()
    }

    pub fn with_config(batch_fn: F, config: LoaderConfig) -> Self {
        LoaderFactory::new(batch_fn).config(config).create()
    }
}

impl<K, F, H> DataLoader<K, F, H>
where
    K: Send + Sync + Clone + 'static,
    F: BatchFn<K>,
    H: CacheKeyFn<K>,
{
    /// Use `cache_key` to map requested keys to their cache identity.
    pub fn with_cache_key(batch_fn: F, cache_key: H) -> Self {
        LoaderFactory::with_cache_key(batch_fn, cache_key).create()
    }

    pub(crate) fn from_factory(factory: &LoaderFactory<K, F, H>) -> Self {
        let cache = if factory.config.cache {
            factory.cache_factory.create()
        } else {
            CacheFactory::<H::Key, CacheEntry<F::Value, F::Error>>::create(&NoCache)
        };

        Self {
            inner: Arc::new(Inner {
                batch_fn: factory.batch_fn.clone(),
                cache_key: factory.cache_key.clone(),
                cache_factory: factory.cache_factory.clone(),
                config: factory.config.clone(),
                spawner: factory.spawner.clone(),
                state: Mutex::new(State { cache, queue: Queue::default() }),
            }),
        }
    }

    /// A factory producing loaders configured like this one.
    pub fn to_factory(&self) -> LoaderFactory<K, F, H> {
        LoaderFactory {
            batch_fn: self.inner.batch_fn.clone(),
            cache_key: self.inner.cache_key.clone(),
            cache_factory: self.inner.cache_factory.clone(),
            config: self.inner.config.clone(),
            spawner: self.inner.spawner.clone(),
            _mark: Default::default(),
        }
    }

    /// Specify the max batch size for loading data, `0` for no limit.
    ///
    /// Rebuilds the loader, so call it before the first load.
    #[must_use]
    pub fn max_batch_size(self, max_batch_size: usize) -> Self {
        self.to_factory().max_batch_size(max_batch_size).create()
    }

    /// Collect keys for `delay` before dispatching.
    ///
    /// Rebuilds the loader, so call it before the first load.
    #[must_use]
    pub fn delay(self, delay: Duration) -> Self {
        self.to_factory().delay(delay).create()
    }

    /// Rebuilds the loader, so call it before the first load.
    #[must_use]
    pub fn schedule(self, schedule: Schedule) -> Self {
        self.to_factory().schedule(schedule).create()
    }

    /// Get the batch function.
    #[inline]
    pub fn batch_fn(&self) -> &F {
        &self.inner.batch_fn
    }

    pub fn config(&self) -> &LoaderConfig {
        &self.inner.config
    }

    pub fn name(&self) -> &str {
        self.inner.config.label()
    }

    /// Requests the value for `key`.
    ///
    /// The request is registered before this returns; awaiting the handle
    /// only waits for the outcome. Outside [Schedule::Manual] the first load
    /// of a window hands a dispatch task to the spawner, which by default
    /// requires a running tokio runtime.
    pub fn load(&self, key: K) -> Load<F::Value, F::Error> {
        self.inner.load(key)
    }

    /// Loads every key, keeping input order. Waits for all of them and fails
    /// with the first error in input order, whichever sub-batch settles
    /// first.
    pub fn load_many<I>(&self, keys: I) -> LoadMany<F::Value, F::Error>
    where
        I: IntoIterator<Item = K>,
    {
        let first_error: fn(Vec<Outcome<F::Value, F::Error>>) -> Outcome<Vec<F::Value>, F::Error> =
            |outcomes| outcomes.into_iter().collect();
        self.load_many_settled(keys).map(first_error)
    }

    /// Loads every key, reporting each outcome separately in input order.
    pub fn load_many_settled<I>(&self, keys: I) -> JoinAll<Load<F::Value, F::Error>>
    where
        I: IntoIterator<Item = K>,
    {
        future::join_all(keys.into_iter().map(|key| self.load(key)))
    }

    /// Feeds `value` into the cache unless `key` is already cached.
    ///
    /// **NOTE: If caching is disabled, this function will not take
    /// effect.**
    pub fn prime(&self, key: &K, value: F::Value) -> &Self {
        self.inner.prime(key, Ok(value), false);
        self
    }

    /// Feeds `value` into the cache, replacing whatever is cached for `key`.
    /// Callers already holding the old handle keep observing the old outcome.
    pub fn prime_overwrite(&self, key: &K, value: F::Value) -> &Self {
        self.inner.prime(key, Ok(value), true);
        self
    }

    /// Caches a per-key failure for `key` unless it is already cached.
    pub fn prime_error(&self, key: &K, error: F::Error) -> &Self {
        self.inner.prime(key, Err(LoadError::Key(error)), false);
        self
    }

    /// Forgets the entry for `key`; the next load dispatches it again.
    pub fn clear(&self, key: &K) -> &Self {
        let cache_key = self.inner.cache_key.cache_key(key);
        self.inner.lock().cache.remove(&cache_key);
        self
    }

    /// Clears the cache.
    pub fn clear_all(&self) -> &Self {
        self.inner.lock().cache.clear();
        self
    }

    /// Dispatches the current window now instead of waiting for the
    /// boundary. The returned future completes once every request of that
    /// window is settled.
    pub fn flush(&self) -> impl Future<Output = ()> + Send + 'static {
        let inner = self.inner.clone();
        let batch = inner.lock().queue.take();
        async move { inner.execute(batch).await }
    }

    /// State of the entry a load for `key` would currently observe.
    pub fn state(&self, key: &K) -> Option<EntryState> {
        let cache_key = self.inner.cache_key.cache_key(key);
        let state = self.inner.lock();
        state
            .cache
            .get(&cache_key)
            .or_else(|| state.queue.get(&cache_key))
            .map(CacheEntry::state)
    }

    pub fn cached_len(&self) -> usize {
        self.inner.lock().cache.len()
    }

    /// Number of requests waiting for the next boundary.
    pub fn pending_len(&self) -> usize {
        self.inner.lock().queue.len()
    }
}

impl<K, F, H> Drop for DataLoader<K, F, H>
where
    K: Send + Sync + Clone + 'static,
    F: BatchFn<K>,
    H: CacheKeyFn<K>,
{
    fn drop(&mut self) {
        let batch = self.inner.lock().queue.drain();
        resolve::cancel(self.inner.config.label(), batch);
    }
}

impl<K, F, H> Inner<K, F, H>
where
    K: Send + Sync + Clone + 'static,
    F: BatchFn<K>,
    H: CacheKeyFn<K>,
{
    // Every critical section leaves the state consistent, so a poisoned lock
    // is safe to keep using.
    fn lock(&self) -> MutexGuard<'_, State<H::Key, K, F::Value, F::Error>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn load(self: &Arc<Self>, key: K) -> Load<F::Value, F::Error> {
        let cache_key = self.cache_key.cache_key(&key);
        let (load, opened) = {
            let mut state = self.lock();
            if let Some(entry) = state.cache.get(&cache_key) {
                return entry.load();
            }
            if let Some(entry) = state.queue.get(&cache_key).cloned() {
                let load = entry.load();
                state.cache.insert(cache_key, entry);
                return load;
            }

            let (tx, entry) = CacheEntry::pending();
            let load = entry.load();
            state.cache.insert(cache_key.clone(), entry.clone());
            let opened = state.queue.push(cache_key, Pending { key, tx, entry });
            (load, opened)
        };

        if let Some(window) = opened {
            self.schedule(window);
        }
        load
    }

    fn prime(&self, key: &K, outcome: Outcome<F::Value, F::Error>, overwrite: bool) {
        let cache_key = self.cache_key.cache_key(key);
        let mut state = self.lock();
        if overwrite || state.cache.get(&cache_key).is_none() {
            state.cache.insert(cache_key, CacheEntry::settled(outcome));
        }
    }

    fn schedule(self: &Arc<Self>, window: u64) {
        let Some(boundary) = Boundary::of(self.config.schedule) else {
            return;
        };
        let weak = Arc::downgrade(self);
        let dispatch: BoxFuture<'static, ()> = Box::pin(async move {
            let queued = weak.clone();
            boundary
                .wait(move || {
                    let inner = queued.upgrade()?;
                    let len = inner.lock().queue.len();
                    Some(len)
                })
                .await;
            // A dropped loader has already cancelled its queue.
            let Some(inner) = weak.upgrade() else {
                return;
            };
            let batch = inner.lock().queue.take_window(window);
            inner.execute(batch).await;
        });
        (self.spawner)(dispatch);
    }

    async fn execute(&self, batch: Vec<Pending<K, F::Value, F::Error>>) {
        if batch.is_empty() {
            return;
        }

        let chunks = scheduler::split(batch, self.config.chunk_size());
        tracing::debug!(
            loader = self.config.label(),
            batches = chunks.len(),
            "dispatching window"
        );
        let dispatches: Vec<_> = chunks
            .into_iter()
            .map(|chunk| self.execute_chunk(chunk))
            .collect();
        future::join_all(dispatches).await;
    }

    async fn execute_chunk(&self, chunk: Vec<Pending<K, F::Value, F::Error>>) {
        let keys: Vec<K> = chunk.iter().map(|pending| pending.key.clone()).collect();
        let span =
            tracing::debug_span!("dispatch", loader = self.config.label(), keys = keys.len());
        let result = executor::invoke(&*self.batch_fn, &keys)
            .instrument(span)
            .await;
        resolve::settle(self.config.label(), chunk, result);
    }
}
