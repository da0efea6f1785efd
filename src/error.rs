/// Outcome of a failed [load](crate::DataLoader::load).
///
/// `Key` is the only variant a well-behaved batch function produces on its
/// own. Everything else is raised by the engine for a whole dispatch and
/// usually points at a misbehaving integration.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum LoadError<E> {
    #[error("batch function returned {actual} values for {expected} keys")]
    ContractViolation { expected: usize, actual: usize },

    #[error("batch function failed: {0}")]
    Executor(E),

    #[error("batch function panicked: {0}")]
    ExecutorPanic(String),

    #[error("{0}")]
    Key(E),

    #[error("load was cancelled before dispatch")]
    Cancelled,
}

impl<E> LoadError<E> {
    /// True for failures that rejected every key of a dispatch.
    pub fn is_batch_failure(&self) -> bool {
        matches!(
            self,
            LoadError::ContractViolation { .. }
                | LoadError::Executor(_)
                | LoadError::ExecutorPanic(_)
        )
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, LoadError::Cancelled)
    }

    pub fn key_error(&self) -> Option<&E> {
        match self {
            LoadError::Key(error) => Some(error),
            _ => None,
        }
    }

    /// Recovers the domain error of a per-key failure, handing back the
    /// engine error otherwise.
    pub fn into_key_error(self) -> Result<E, Self> {
        match self {
            LoadError::Key(error) => Ok(error),
            other => Err(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_batch_failures() {
        let violation = LoadError::<String>::ContractViolation { expected: 2, actual: 1 };
        assert!(violation.is_batch_failure());
        assert!(LoadError::Executor("boom".to_string()).is_batch_failure());
        assert!(LoadError::<String>::ExecutorPanic("boom".into()).is_batch_failure());
        assert!(!LoadError::Key("not found".to_string()).is_batch_failure());
        assert!(!LoadError::<String>::Cancelled.is_batch_failure());
    }

    #[test]
    fn test_key_error_shape() {
        let error = LoadError::Key("not found".to_string());
        assert_eq!(error.to_string(), "not found");
        assert_eq!(error.key_error(), Some(&"not found".to_string()));
        assert_eq!(error.into_key_error(), Ok("not found".to_string()));

        let cancelled = LoadError::<String>::Cancelled;
        assert_eq!(cancelled.clone().into_key_error(), Err(cancelled));
    }

    #[test]
    fn test_display() {
        let violation = LoadError::<String>::ContractViolation { expected: 3, actual: 2 };
        assert_eq!(
            violation.to_string(),
            "batch function returned 2 values for 3 keys"
        );
        assert_eq!(
            LoadError::Executor("timeout".to_string()).to_string(),
            "batch function failed: timeout"
        );
    }
}
