use std::fmt;

use crate::entry::EntryState;
use crate::error::LoadError;
use crate::executor::BatchResult;
use crate::scheduler::Pending;

/// Settles every request of one (sub-)batch from the batch function's answer.
///
/// Element `i` of a valid answer goes to request `i`. A batch-level failure
/// goes to all of them.
pub(crate) fn settle<K, V, E>(loader: &str, batch: Vec<Pending<K, V, E>>, result: BatchResult<V, E>)
where
    V: Clone,
    E: Clone + fmt::Debug,
{
    match result {
        Ok(values) => {
            let mut failed = 0;
            for (pending, value) in batch.into_iter().zip(values) {
                let outcome = value.map_err(LoadError::Key);
                if outcome.is_err() {
                    failed += 1;
                }
                send(pending, outcome);
            }
            if failed > 0 {
                tracing::debug!(loader, failed, "batch settled with per-key errors");
            }
        }
        Err(error) => {
            tracing::error!(
                loader,
                keys = batch.len(),
                error = ?error,
                "batch dispatch failed, rejecting every key"
            );
            for pending in batch {
                send(pending, Err(error.clone()));
            }
        }
    }
}

/// Rejects requests that never reached a boundary.
pub(crate) fn cancel<K, V, E>(loader: &str, batch: Vec<Pending<K, V, E>>) {
    if batch.is_empty() {
        return;
    }
    tracing::debug!(loader, keys = batch.len(), "cancelling undispatched loads");
    for pending in batch {
        send(pending, Err(LoadError::Cancelled));
    }
}

fn send<K, V, E>(pending: Pending<K, V, E>, outcome: Result<V, LoadError<E>>) {
    let state = if outcome.is_ok() {
        EntryState::Resolved
    } else {
        EntryState::Rejected
    };
    pending.entry.state.set(state);
    // The receiver is gone once its entry was cleared and every handle dropped.
    let _ = pending.tx.send(outcome);
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::entry::CacheEntry;

    fn pending(key: u64) -> Pending<u64, String, String> {
        let (tx, entry) = CacheEntry::pending();
        Pending { key, tx, entry }
    }

    #[tokio::test]
    async fn test_per_key_errors_are_isolated() {
        let batch = vec![pending(1), pending(2)];
        let entries: Vec<_> = batch.iter().map(|p| p.entry.clone()).collect();

        settle(
            "users",
            batch,
            Ok(vec![Err("not found".to_string()), Ok("Bob".to_string())]),
        );

        assert_eq!(entries[0].state.get(), EntryState::Rejected);
        assert_eq!(entries[1].state.get(), EntryState::Resolved);
        assert_eq!(
            entries[0].load.clone().await,
            Err(LoadError::Key("not found".to_string()))
        );
        assert_eq!(entries[1].load.clone().await, Ok("Bob".to_string()));
    }

    #[tokio::test]
    async fn test_batch_failure_rejects_all() {
        let batch = vec![pending(1), pending(2)];
        let entries: Vec<_> = batch.iter().map(|p| p.entry.clone()).collect();
        let violation = LoadError::ContractViolation { expected: 2, actual: 0 };

        settle("users", batch, Err(violation.clone()));

        for entry in entries {
            assert_eq!(entry.load.await, Err(violation.clone()));
        }
    }

    #[tokio::test]
    async fn test_cancel() {
        let batch = vec![pending(1)];
        let entry = batch[0].entry.clone();

        cancel("users", batch);

        assert_eq!(entry.state.get(), EntryState::Rejected);
        assert_eq!(entry.load.await, Err(LoadError::Cancelled));
    }
}
