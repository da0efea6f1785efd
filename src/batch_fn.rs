use std::fmt;
use std::future::Future;

/// The batch-fetch strategy injected into a [DataLoader](crate::DataLoader).
///
/// `load` receives the deduplicated keys of one dispatch in first-requested
/// order and must answer with exactly one element per key, in the same
/// order. An `Err` element fails only its own key. Returning `Err` for the
/// whole call fails every key of the dispatch.
#[async_trait::async_trait]
pub trait BatchFn<K: Send + Sync + 'static>: Send + Sync + 'static {
    /// type of value.
    type Value: Send + Sync + Clone + 'static;

    /// Type of error.
    type Error: Send + Sync + Clone + fmt::Debug + 'static;

    /// Load the data set specified by the `keys`.
    async fn load(&self, keys: &[K]) -> Result<Vec<Result<Self::Value, Self::Error>>, Self::Error>;
}

/// Adapts an async closure into a [BatchFn].
#[derive(Clone)]
pub struct FnBatch<F>(F);

impl<F> fmt::Debug for FnBatch<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("FnBatch").finish()
    }
}

/// Builds a [BatchFn] from a closure taking the batch keys by value.
///
/// ```
/// use batch_loader::{batch_fn, DataLoader};
///
/// let loader = DataLoader::new(batch_fn(|ids: Vec<u64>| async move {
///     let values: Vec<Result<u64, String>> = ids.into_iter().map(|id| Ok(id * 10)).collect();
///     Ok::<_, String>(values)
/// }));
/// # drop(loader);
/// ```
pub fn batch_fn<K, F, Fut, V, E>(f: F) -> FnBatch<F>
where
    K: Send + Sync + Clone + 'static,
    F: Fn(Vec<K>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Vec<Result<V, E>>, E>> + Send + 'static,
    V: Send + Sync + Clone + 'static,
    E: Send + Sync + Clone + fmt::Debug + 'static,
{
    FnBatch(f)
}

#[async_trait::async_trait]
impl<K, F, Fut, V, E> BatchFn<K> for FnBatch<F>
where
    K: Send + Sync + Clone + 'static,
    F: Fn(Vec<K>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Vec<Result<V, E>>, E>> + Send + 'static,
    V: Send + Sync + Clone + 'static,
    E: Send + Sync + Clone + fmt::Debug + 'static,
{
    type Value = V;
    type Error = E;

    async fn load(&self, keys: &[K]) -> Result<Vec<Result<V, E>>, E> {
        (self.0)(keys.to_vec()).await
    }
}
