use std::any::Any;
use std::panic::AssertUnwindSafe;

use futures_util::FutureExt;

use crate::batch_fn::BatchFn;
use crate::error::LoadError;

pub(crate) type BatchResult<V, E> = Result<Vec<Result<V, E>>, LoadError<E>>;

/// Calls the batch function once for `keys` and checks its answer against
/// the contract: one element per key, in key order. Any failure here is
/// fatal to this dispatch only and is never retried.
pub(crate) async fn invoke<K, F>(batch_fn: &F, keys: &[K]) -> BatchResult<F::Value, F::Error>
where
    K: Send + Sync + 'static,
    F: BatchFn<K>,
{
    let expected = keys.len();
    match AssertUnwindSafe(batch_fn.load(keys)).catch_unwind().await {
        Err(panic) => Err(LoadError::ExecutorPanic(panic_message(panic.as_ref()))),
        Ok(Err(error)) => Err(LoadError::Executor(error)),
        Ok(Ok(values)) if values.len() != expected => {
            Err(LoadError::ContractViolation { expected, actual: values.len() })
        }
        Ok(Ok(values)) => Ok(values),
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::batch_fn::batch_fn;

    #[tokio::test]
    async fn test_valid_result() {
        let batch = batch_fn(|keys: Vec<u64>| async move {
            let values: Vec<Result<u64, String>> = keys.into_iter().map(Ok).collect();
            Ok::<_, String>(values)
        });

        assert_eq!(invoke(&batch, &[1, 2]).await, Ok(vec![Ok(1), Ok(2)]));
    }

    #[tokio::test]
    async fn test_wrong_length() {
        let batch = batch_fn(|_keys: Vec<u64>| async move {
            let values: Vec<Result<u64, String>> = vec![Ok(1)];
            Ok::<_, String>(values)
        });

        assert_eq!(
            invoke(&batch, &[1, 2, 3]).await,
            Err(LoadError::ContractViolation { expected: 3, actual: 1 })
        );
    }

    #[tokio::test]
    async fn test_executor_error() {
        let batch = batch_fn(|_keys: Vec<u64>| async move {
            Err::<Vec<Result<u64, String>>, _>("connection refused".to_string())
        });

        assert_eq!(
            invoke(&batch, &[1]).await,
            Err(LoadError::Executor("connection refused".to_string()))
        );
    }

    #[tokio::test]
    async fn test_executor_panic() {
        let batch = batch_fn(|_keys: Vec<u64>| async move {
            if true {
                panic!("boom");
            }
            Ok::<Vec<Result<u64, String>>, String>(vec![])
        });

        assert_eq!(
            invoke(&batch, &[1]).await,
            Err(LoadError::ExecutorPanic("boom".to_string()))
        );
    }
}
