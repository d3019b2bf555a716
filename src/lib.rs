//! exec-pool — a multi-process execution pool.
//!
//! Schedules external processes (`Job`s) under per-job timeouts, a global
//! virtual-memory budget, NUMA-aware CPU affinity, and chained eviction when
//! memory pressure forces rescheduling. Jobs may be grouped into `Task`s that
//! share completion callbacks. See [`pool::ExecPool`] for the supervisor.

pub mod affinity;
pub mod config;
pub mod error;
pub mod job;
pub mod memory;
pub mod pool;
pub mod snapshot;
pub mod task;

pub use config::PoolConfig;
pub use error::{Error, Result};
pub use job::{Callbacks, Job, JobBuilder, OnTimeout, Size, StdioTarget};
pub use pool::ExecPool;
pub use snapshot::{PoolSnapshot, Predicate, PredicateSet, SnapshotEntry};
pub use task::{Task, TaskBuilder, TaskCallbacks};
