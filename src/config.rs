use std::num::NonZeroUsize;
use std::time::Duration;

use derive_setters::Setters;
use serde::{Deserialize, Serialize};

const DEFAULT_NAME: &str = "loader";

/// Where a loader closes its collection window and dispatches.
#[derive(Serialize, Deserialize, PartialEq, Eq, Clone, Copy, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub enum Schedule {
    /// [Tick](Schedule::Tick) on a current-thread runtime. On a
    /// multi-threaded one the window stays open until no new key joined it
    /// for a millisecond, so a synchronous burst of loads still lands in one
    /// batch while the dispatch task runs on another worker.
    #[default]
    Auto,

    /// Dispatch after yielding once to the async runtime. On a current-thread
    /// runtime every load issued before the calling task suspends lands in
    /// the same batch. On a multi-threaded runtime another worker may run the
    /// dispatch while the caller is still loading.
    Tick,

    /// Dispatch after waiting the given number of milliseconds.
    Delay(u64),

    /// Never dispatch on its own; the host calls
    /// [flush](crate::DataLoader::flush).
    Manual,
}

impl Schedule {
    pub fn delay(&self) -> Option<Duration> {
        match self {
            Schedule::Delay(ms) => Some(Duration::from_millis(*ms)),
            _ => None,
        }
    }
}

#[derive(Serialize, Deserialize, PartialEq, Eq, Clone, Debug, Setters)]
#[serde(rename_all = "camelCase", default)]
#[setters(strip_option)]
pub struct LoaderConfig {
    /// Label used in logs and spans.
    pub name: Option<String>,

    /// When false every key is dispatched on its own.
    pub batch: bool,

    /// Upper bound on keys per executor call. Larger windows are split into
    /// consecutive sub-batches that fail independently.
    pub max_batch_size: Option<NonZeroUsize>,

    /// When false loads are only coalesced within one window, never
    /// memoized.
    pub cache: bool,

    pub schedule: Schedule,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        LoaderConfig {
            name: None,
            batch: true,
            max_batch_size: None,
            cache: true,
            schedule: Schedule::default(),
        }
    }
}

impl LoaderConfig {
    /// Name used in logs, falling back to a generic label.
    pub fn label(&self) -> &str {
        self.name.as_deref().unwrap_or(DEFAULT_NAME)
    }

    /// Size of the sub-batches a window is split into, `None` for unbounded.
    pub fn chunk_size(&self) -> Option<usize> {
        if self.batch {
            self.max_batch_size.map(NonZeroUsize::get)
        } else {
            Some(1)
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_defaults() {
        let config: LoaderConfig = serde_json::from_str("{}").unwrap();

        assert_eq!(config, LoaderConfig::default());
        assert_eq!(config.label(), "loader");
        assert_eq!(config.chunk_size(), None);
        assert_eq!(config.schedule, Schedule::Auto);
    }

    #[test]
    fn test_from_json() {
        let config: LoaderConfig = serde_json::from_str(
            r#"{"name": "users", "maxBatchSize": 50, "cache": false, "schedule": {"delay": 5}}"#,
        )
        .unwrap();

        assert_eq!(config.label(), "users");
        assert_eq!(config.chunk_size(), Some(50));
        assert!(!config.cache);
        assert_eq!(config.schedule.delay(), Some(Duration::from_millis(5)));
    }

    #[test]
    fn test_from_yaml() {
        let config: LoaderConfig =
            serde_yaml::from_str("name: posts\nbatch: false\nschedule: manual\n").unwrap();

        assert_eq!(config.chunk_size(), Some(1));
        assert_eq!(config.schedule, Schedule::Manual);

        let config: LoaderConfig = serde_yaml::from_str("schedule: tick\n").unwrap();
        assert_eq!(config.schedule, Schedule::Tick);
    }

    #[test]
    fn test_zero_batch_size_rejected() {
        let result = serde_json::from_str::<LoaderConfig>(r#"{"maxBatchSize": 0}"#);

        assert!(result.is_err());
    }

    #[test]
    fn test_setters() {
        let config = LoaderConfig::default()
            .name("comments".to_string())
            .max_batch_size(NonZeroUsize::new(2).unwrap())
            .schedule(Schedule::Manual);

        assert_eq!(config.label(), "comments");
        assert_eq!(config.chunk_size(), Some(2));
    }
}
