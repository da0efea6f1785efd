use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::BoxFuture;
use indexmap::IndexMap;
use tokio::runtime::{Handle, RuntimeFlavor};

use crate::config::Schedule;
use crate::entry::{CacheEntry, EntryState, Sender};

/// How long a window stays open on a multi-threaded runtime after the last
/// key joined it.
const QUIET_PERIOD: Duration = Duration::from_millis(1);

/// Runs a detached dispatch task. Defaults to `tokio::spawn`.
pub type Spawner = Arc<dyn Fn(BoxFuture<'static, ()>) + Send + Sync>;

pub(crate) fn tokio_spawner() -> Spawner {
    Arc::new(|task: BoxFuture<'static, ()>| {
        tokio::spawn(task);
    })
}

/// One queued request.
pub(crate) struct Pending<K, V, E> {
    pub(crate) key: K,
    pub(crate) tx: Sender<V, E>,
    pub(crate) entry: CacheEntry<V, E>,
}

/// Requests collected between two scheduling boundaries, in first-seen order
/// and unique per cache key.
///
/// Every window carries a generation number. Taking or draining the queue
/// starts the next generation, so a dispatch task scheduled for an earlier
/// window finds nothing to take.
pub(crate) struct Queue<C, K, V, E> {
    pending: IndexMap<C, Pending<K, V, E>>,
    window: u64,
}

impl<C, K, V, E> Default for Queue<C, K, V, E> {
    fn default() -> Self {
        Self { pending: IndexMap::new(), window: 0 }
    }
}

impl<C, K, V, E> Queue<C, K, V, E>
where
    C: Eq + Hash,
{
    pub(crate) fn get(&self, cache_key: &C) -> Option<&CacheEntry<V, E>> {
        self.pending.get(cache_key).map(|pending| &pending.entry)
    }

    /// Appends a request. Returns the generation of the window when this
    /// opened it, in which case the caller has to schedule a dispatch.
    pub(crate) fn push(&mut self, cache_key: C, pending: Pending<K, V, E>) -> Option<u64> {
        let opened = self.pending.is_empty().then_some(self.window);
        self.pending.insert(cache_key, pending);
        opened
    }

    pub(crate) fn len(&self) -> usize {
        self.pending.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Snapshots and clears the window, marking every request Dispatched.
    pub(crate) fn take(&mut self) -> Vec<Pending<K, V, E>> {
        self.drain()
            .into_iter()
            .inspect(|pending| pending.entry.state.set(EntryState::Dispatched))
            .collect()
    }

    /// Like [take](Self::take), but only while `window` is still the open
    /// generation.
    pub(crate) fn take_window(&mut self, window: u64) -> Vec<Pending<K, V, E>> {
        if window == self.window {
            self.take()
        } else {
            Vec::new()
        }
    }

    /// Clears the window without dispatching it.
    pub(crate) fn drain(&mut self) -> Vec<Pending<K, V, E>> {
        self.window = self.window.wrapping_add(1);
        std::mem::take(&mut self.pending).into_values().collect()
    }
}

/// Splits a snapshot into consecutive sub-batches of at most `size`
/// requests, keeping global order.
pub(crate) fn split<T>(batch: Vec<T>, size: Option<usize>) -> Vec<Vec<T>> {
    let size = match size {
        Some(size) if size > 0 && size < batch.len() => size,
        _ => return vec![batch],
    };

    let mut chunks = Vec::with_capacity(batch.len().div_ceil(size));
    let mut current = Vec::with_capacity(size);
    for item in batch {
        current.push(item);
        if current.len() == size {
            chunks.push(std::mem::replace(&mut current, Vec::with_capacity(size)));
        }
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

/// The point a scheduled dispatch task waits for before taking its window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Boundary {
    /// One yield to the runtime.
    Yield,
    /// Until no new key joined the window for a whole [QUIET_PERIOD].
    Quiet,
    Sleep(Duration),
}

impl Boundary {
    /// Resolves `schedule` against the runtime of the calling thread. `None`
    /// means nothing is scheduled and the host flushes.
    pub(crate) fn of(schedule: Schedule) -> Option<Self> {
        match schedule {
            Schedule::Auto => match Handle::try_current().map(|handle| handle.runtime_flavor()) {
                Ok(flavor) if flavor != RuntimeFlavor::CurrentThread => Some(Boundary::Quiet),
                _ => Some(Boundary::Yield),
            },
            Schedule::Tick => Some(Boundary::Yield),
            Schedule::Delay(ms) => Some(Boundary::Sleep(Duration::from_millis(ms))),
            Schedule::Manual => None,
        }
    }

    /// `queued` reports the length of the open window, `None` once the loader
    /// is gone.
    pub(crate) async fn wait<Q>(self, queued: Q)
    where
        Q: Fn() -> Option<usize>,
    {
        match self {
            Boundary::Yield => tokio::task::yield_now().await,
            Boundary::Sleep(delay) => tokio::time::sleep(delay).await,
            Boundary::Quiet => {
                let mut seen = queued();
                loop {
                    tokio::time::sleep(QUIET_PERIOD).await;
                    let now = queued();
                    if now.is_none() || now == seen {
                        break;
                    }
                    seen = now;
                }
            }
        }
    }
}
