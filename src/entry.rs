use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};

use futures_channel::oneshot;
use futures_util::future::{self, BoxFuture, Shared};
use futures_util::FutureExt;

use crate::error::LoadError;

pub(crate) type Outcome<V, E> = Result<V, LoadError<E>>;
pub(crate) type Sender<V, E> = oneshot::Sender<Outcome<V, E>>;

/// Lifecycle of one cached load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryState {
    /// Queued, waiting for the scheduling boundary.
    Pending,
    /// Handed to the batch function.
    Dispatched,
    Resolved,
    Rejected,
}

impl EntryState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, EntryState::Resolved | EntryState::Rejected)
    }

    fn from_u8(value: u8) -> Self {
        match value {
            0 => EntryState::Pending,
            1 => EntryState::Dispatched,
            2 => EntryState::Resolved,
            3 => EntryState::Rejected,
            other => unreachable!("StateCell only stores EntryState values, got {other}"),
        }
    }
}

/// Shared view of an [EntryState]; the queue and the cache hold the same cell.
#[derive(Clone)]
pub(crate) struct StateCell(Arc<AtomicU8>);

impl StateCell {
    fn new(state: EntryState) -> Self {
        Self(Arc::new(AtomicU8::new(state as u8)))
    }

    pub(crate) fn get(&self) -> EntryState {
        EntryState::from_u8(self.0.load(Ordering::Acquire))
    }

    pub(crate) fn set(&self, state: EntryState) {
        self.0.store(state as u8, Ordering::Release);
    }
}

/// Handle to the eventual outcome of one key.
///
/// Every caller asking for the same cache key receives a clone of the same
/// handle, so all of them observe one outcome.
#[must_use = "futures do nothing unless you `.await` or poll them"]
pub struct Load<V, E> {
    inner: Shared<BoxFuture<'static, Outcome<V, E>>>,
}

impl<V, E> Clone for Load<V, E> {
    fn clone(&self) -> Self {
        Self { inner: self.inner.clone() }
    }
}

impl<V, E> fmt::Debug for Load<V, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Load").finish_non_exhaustive()
    }
}

impl<V, E> Future for Load<V, E>
where
    V: Clone,
    E: Clone,
{
    type Output = Outcome<V, E>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.inner.poll_unpin(cx)
    }
}

/// What the cache stores per key: the shared outcome and its state.
pub struct CacheEntry<V, E> {
    pub(crate) load: Load<V, E>,
    pub(crate) state: StateCell,
}

impl<V, E> Clone for CacheEntry<V, E> {
    fn clone(&self) -> Self {
        Self { load: self.load.clone(), state: self.state.clone() }
    }
}

impl<V, E> CacheEntry<V, E> {
    /// A handle to the outcome of this entry.
    pub fn load(&self) -> Load<V, E> {
        self.load.clone()
    }

    pub fn state(&self) -> EntryState {
        self.state.get()
    }
}

impl<V, E> CacheEntry<V, E>
where
    V: Send + Sync + Clone + 'static,
    E: Send + Sync + Clone + 'static,
{
    /// A Pending entry and the sender that settles it.
    pub(crate) fn pending() -> (Sender<V, E>, Self) {
        let (tx, rx) = oneshot::channel();
        let inner = rx
            .map(|outcome| outcome.unwrap_or(Err(LoadError::Cancelled)))
            .boxed()
            .shared();
        let entry = Self { load: Load { inner }, state: StateCell::new(EntryState::Pending) };
        (tx, entry)
    }

    /// A terminal entry, used for priming.
    pub(crate) fn settled(outcome: Outcome<V, E>) -> Self {
        let state = match outcome {
            Ok(_) => EntryState::Resolved,
            Err(_) => EntryState::Rejected,
        };
        let inner = future::ready(outcome).boxed().shared();
        Self { load: Load { inner }, state: StateCell::new(state) }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[tokio::test]
    async fn test_pending_entry_settles_all_clones() {
        let (tx, entry) = CacheEntry::<u64, String>::pending();
        let a = entry.load.clone();
        let b = entry.load.clone();
        assert_eq!(entry.state.get(), EntryState::Pending);

        tx.send(Ok(42)).unwrap();

        assert_eq!(a.await, Ok(42));
        assert_eq!(b.await, Ok(42));
    }

    #[tokio::test]
    async fn test_dropped_sender_cancels() {
        let (tx, entry) = CacheEntry::<u64, String>::pending();
        drop(tx);

        assert_eq!(entry.load.await, Err(LoadError::Cancelled));
    }

    #[tokio::test]
    async fn test_settled_entry() {
        let entry = CacheEntry::<u64, String>::settled(Err(LoadError::Key("gone".into())));

        assert_eq!(entry.state.get(), EntryState::Rejected);
        assert_eq!(entry.load.await, Err(LoadError::Key("gone".to_string())));
    }

    #[test]
    fn test_state_cell_keeps_every_state() {
        let states = [
            EntryState::Pending,
            EntryState::Dispatched,
            EntryState::Resolved,
            EntryState::Rejected,
        ];
        let cell = StateCell::new(EntryState::Pending);

        for state in states {
            cell.set(state);
            assert_eq!(cell.get(), state);
        }
    }

    #[test]
    #[should_panic(expected = "got 7")]
    fn test_unknown_state_is_a_bug() {
        EntryState::from_u8(7);
    }

    #[test]
    fn test_state_cell_shared() {
        let cell = StateCell::new(EntryState::Pending);
        let other = cell.clone();
        other.set(EntryState::Dispatched);

        assert_eq!(cell.get(), EntryState::Dispatched);
        assert!(!cell.get().is_terminal());
        cell.set(EntryState::Resolved);
        assert!(other.get().is_terminal());
    }
}
