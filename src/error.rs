//! Library error type for exec-pool.
//!
//! Six kinds, matching the error handling design: configuration errors
//! surface synchronously to the caller, runtime errors attach to the owning
//! Job/Task and are surfaced via the observation snapshot without aborting
//! the pool.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid pool or job configuration: {0}")]
    ConfigInvalid(String),

    #[error("failed to spawn child process: {0}")]
    SpawnFailed(#[source] std::io::Error),

    #[error("failed to open or redirect stdio: {0}")]
    StdioFailed(#[source] std::io::Error),

    #[error("memory accounting facility unavailable on this platform")]
    MemoryProbeUnavailable,

    #[error("global deadline exceeded before the pool drained")]
    DeadlineExceeded,

    #[error("job terminated: {0}")]
    Terminated(String),
}

pub type Result<T> = std::result::Result<T, Error>;
