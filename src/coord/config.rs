use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::core::lock_path_for;
use crate::Result;

pub const RECORD_FILE: &str = "shared.bin";
pub const LOG_FILE: &str = "logs/cohort.log";
pub const DEFAULT_DATA_DIR: &str = "cohort-data";

pub const DEFAULT_TICK: Duration = Duration::from_millis(100);
pub const DEFAULT_STALE_AFTER: Duration = Duration::from_millis(4_000);
pub const DEFAULT_STATUS_EVERY: Duration = Duration::from_millis(1_000);
pub const DEFAULT_SUPERVISE_EVERY: Duration = Duration::from_millis(3_000);
pub const DEFAULT_INCREMENT_EVERY: Duration = Duration::from_millis(300);

/// Filesystem locations shared by one coordination group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataPaths {
    data_dir: PathBuf,
}

impl DataPaths {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    /// Uses `explicit` or the default directory, creating it if needed.
    pub fn resolve(explicit: Option<PathBuf>) -> Result<Self> {
        let paths = Self::new(explicit.unwrap_or_else(default_data_dir));
        std::fs::create_dir_all(&paths.data_dir)?;
        Ok(paths)
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn record_path(&self) -> PathBuf {
        self.data_dir.join(RECORD_FILE)
    }

    pub fn lock_path(&self) -> PathBuf {
        lock_path_for(&self.record_path())
    }

    /// Group log every member appends to unless told otherwise.
    pub fn log_path(&self) -> PathBuf {
        self.data_dir.join(LOG_FILE)
    }
}

/// `cohort-data` beside the directory holding the executable, so every
/// process started from the same build shares a group.
pub fn default_data_dir() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().and_then(Path::parent).map(Path::to_path_buf))
        .map(|root| root.join(DEFAULT_DATA_DIR))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR))
}

/// Timing and behaviour of a coordinator process.
#[derive(Debug, Clone)]
pub struct NodeConfig {
    /// Election and supervision loop period.
    pub tick: Duration,
    /// Heartbeat age after which a peer may take over.
    pub stale_after: Duration,
    pub status_every: Duration,
    pub supervise_every: Duration,
    pub increment_every: Duration,
    /// How long shutdown waits for tracked workers before leaving them running.
    pub shutdown_grace: Duration,
    /// Read commands from the console input.
    pub console: bool,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            tick: DEFAULT_TICK,
            stale_after: DEFAULT_STALE_AFTER,
            status_every: DEFAULT_STATUS_EVERY,
            supervise_every: DEFAULT_SUPERVISE_EVERY,
            increment_every: DEFAULT_INCREMENT_EVERY,
            shutdown_grace: Duration::ZERO,
            console: true,
        }
    }
}
