//! Process and lock primitives behind a build-selected implementation.
//!
//! Coordination code only sees [`ProcessControl`] and the free functions in
//! this module; the native calls live in `sys`.

use std::collections::HashMap;
use std::ffi::OsString;
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use crate::coord::WorkerMode;
use crate::{Error, Result};

#[cfg(unix)]
pub(crate) mod unix;
#[cfg(unix)]
pub(crate) use self::unix as sys;

#[cfg(not(unix))]
compile_error!("cohort relies on flock and signal-0 probes and builds for unix targets only");

const WAIT_POLL: Duration = Duration::from_millis(10);

/// Exit observed for a worker this process spawned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerExit {
    pub pid: i64,
    /// `None` when the worker was terminated by a signal.
    pub code: Option<i32>,
}

/// Process capabilities the supervisor and election need.
pub trait ProcessControl: Send + Sync {
    /// Launches a worker and returns its pid.
    fn spawn_worker(&self, mode: WorkerMode) -> Result<i64>;

    /// Reports whether `pid` is still running without disturbing it.
    fn probe(&self, pid: i64) -> Result<bool>;

    /// Waits until `pid` is gone or `timeout` elapses. Returns `true` if the
    /// process exited.
    fn wait_timeout(&self, pid: i64, timeout: Duration) -> Result<bool>;

    /// Collects exits of spawned workers seen since the last call.
    fn reap(&self) -> Vec<WorkerExit>;
}

/// Liveness oracle: `false` for non-positive pids and for failed probes.
pub fn is_alive(pid: i64) -> bool {
    sys::process_alive(pid).unwrap_or(false)
}

/// [`is_alive`] through a [`ProcessControl`], logging inconclusive probes.
pub fn probe_or_dead(procs: &dyn ProcessControl, pid: i64) -> bool {
    if pid <= 0 {
        return false;
    }
    match procs.probe(pid) {
        Ok(alive) => alive,
        Err(err) => {
            log::warn!("{err}; treating pid {pid} as not alive");
            false
        }
    }
}

#[derive(Default)]
struct Children {
    running: HashMap<i64, Child>,
    exited: Vec<WorkerExit>,
}

impl Children {
    fn record_exit(&mut self, pid: i64, code: Option<i32>) {
        self.running.remove(&pid);
        self.exited.push(WorkerExit { pid, code });
    }
}

/// Spawns workers by re-invoking an executable with `--child=<mode>`.
///
/// Spawned children are kept so that exited ones are reaped instead of
/// lingering as zombies that a signal-0 probe would still report.
pub struct NativeProcesses {
    exe: PathBuf,
    worker_args: Vec<OsString>,
    children: Mutex<Children>,
}

impl NativeProcesses {
    pub fn new(exe: impl Into<PathBuf>, worker_args: Vec<OsString>) -> Self {
        Self {
            exe: exe.into(),
            worker_args,
            children: Mutex::new(Children::default()),
        }
    }

    /// Workers re-run the current executable.
    pub fn current_exe(worker_args: Vec<OsString>) -> Result<Self> {
        let exe = std::env::current_exe()?;
        Ok(Self::new(exe, worker_args))
    }

    fn children(&self) -> MutexGuard<'_, Children> {
        self.children
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn poll_child(&self, pid: i64) -> Option<bool> {
        let mut children = self.children();
        let child = children.running.get_mut(&pid)?;
        match child.try_wait() {
            Ok(Some(status)) => {
                children.record_exit(pid, status.code());
                Some(false)
            }
            Ok(None) => Some(true),
            Err(err) => {
                log::debug!("try_wait on worker {pid} failed: {err}");
                None
            }
        }
    }
}

impl ProcessControl for NativeProcesses {
    fn spawn_worker(&self, mode: WorkerMode) -> Result<i64> {
        let child = Command::new(&self.exe)
            .arg(mode.child_arg())
            .args(&self.worker_args)
            .stdin(Stdio::null())
            .spawn()
            .map_err(|source| Error::SpawnFailed { mode, source })?;
        let pid = i64::from(child.id());
        self.children().running.insert(pid, child);
        Ok(pid)
    }

    fn probe(&self, pid: i64) -> Result<bool> {
        if let Some(alive) = self.poll_child(pid) {
            return Ok(alive);
        }
        sys::process_alive(pid).map_err(|source| Error::ProbeInconclusive { pid, source })
    }

    fn wait_timeout(&self, pid: i64, timeout: Duration) -> Result<bool> {
        let deadline = Instant::now() + timeout;
        loop {
            if !self.probe(pid)? {
                return Ok(true);
            }
            let now = Instant::now();
            if now >= deadline {
                return Ok(false);
            }
            std::thread::sleep(WAIT_POLL.min(deadline - now));
        }
    }

    fn reap(&self) -> Vec<WorkerExit> {
        let mut children = self.children();
        let mut done = Vec::new();
        for (pid, child) in children.running.iter_mut() {
            match child.try_wait() {
                Ok(Some(status)) => done.push((*pid, status.code())),
                Ok(None) => {}
                Err(err) => log::debug!("try_wait on worker {pid} failed: {err}"),
            }
        }
        for (pid, code) in done {
            children.record_exit(pid, code);
        }
        std::mem::take(&mut children.exited)
    }
}
