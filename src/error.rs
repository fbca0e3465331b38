use std::path::PathBuf;

use thiserror::Error;

use crate::coord::WorkerMode;

#[derive(Debug, Error)]
pub enum Error {
    /// The backing store could not be created or mapped. Fatal for the process.
    #[error("shared record store unavailable at {}: {source}", path.display())]
    StoreUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// The record lock could not be opened or taken this cycle.
    #[error("record lock unavailable at {}: {source}", path.display())]
    LockUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to spawn worker in mode {mode}: {source}")]
    SpawnFailed {
        mode: WorkerMode,
        #[source]
        source: std::io::Error,
    },
    /// The liveness probe itself failed; callers treat the pid as not alive.
    #[error("liveness probe for pid {pid} inconclusive: {source}")]
    ProbeInconclusive {
        pid: i64,
        #[source]
        source: std::io::Error,
    },
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
