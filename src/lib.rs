//! Per-request batching and caching of keyed loads.
//!
//! A [DataLoader] collects every [load](DataLoader::load) issued during one
//! scheduling window, calls the injected [BatchFn] once with the unique keys
//! in first-requested order, and hands each caller the element belonging to
//! its key. Outcomes, failures included, stay cached in that loader until
//! cleared.
//!
//! # Scheduling boundary
//!
//! The window closes at a point chosen by [Schedule]:
//!
//! - [Schedule::Auto] (default): picks by the runtime the first load of a
//!   window runs on. A current-thread runtime gets [Schedule::Tick]. On a
//!   multi-threaded runtime the spawned task polls the queue every
//!   millisecond and takes it once it stopped growing, because the task may
//!   run in parallel with the caller.
//! - [Schedule::Tick]: the first load of a window spawns a task that yields
//!   once to the runtime and then takes the queue. On a current-thread
//!   runtime that is the moment the loading task first suspends, so all loads
//!   issued before an `.await` share one batch.
//! - [Schedule::Delay]: the spawned task sleeps for the configured window
//!   first.
//! - [Schedule::Manual]: nothing is spawned; the host calls
//!   [flush](DataLoader::flush).
//!
//! A window closes exactly once: after a [flush](DataLoader::flush) the task
//! scheduled for that window no longer touches the next one.
//!
//! # Scope
//!
//! Loaders are not `Clone` and are meant to live exactly as long as one unit
//! of work. Keep a [LoaderFactory] process-wide and create a loader per
//! request.

mod batch_fn;
mod cache;
mod cache_key;
pub mod config;
mod data_loader;
mod entry;
mod error;
mod executor;
mod factory;
mod loader_factory;
mod resolve;
mod scheduler;
mod storage;

pub use batch_fn::{batch_fn, BatchFn, FnBatch};
pub use cache::{HashMapCache, HashMapCacheImpl, NoCache, NoCacheImpl};
pub use cache_key::{cache_key_fn, CacheKeyFn, FnCacheKey, Identity};
pub use config::{LoaderConfig, Schedule};
pub use data_loader::{DataLoader, LoadMany};
pub use entry::{CacheEntry, EntryState, Load};
pub use error::LoadError;
pub use factory::CacheFactory;
pub use loader_factory::LoaderFactory;
pub use scheduler::Spawner;
pub use storage::CacheStorage;
