#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use cohort::coord::WorkerMode;
use cohort::platform::WorkerExit;
use cohort::{Error, ProcessControl, Result};

/// In-memory process table: pids are alive until `kill`ed.
pub struct FakeProcesses {
    alive: Mutex<HashSet<i64>>,
    inconclusive: Mutex<HashSet<i64>>,
    spawned: Mutex<Vec<(WorkerMode, i64)>>,
    waits: Mutex<Vec<(i64, bool)>>,
    next_pid: AtomicI64,
    fail_spawns: AtomicBool,
}

impl FakeProcesses {
    pub fn new() -> Self {
        Self {
            alive: Mutex::new(HashSet::new()),
            inconclusive: Mutex::new(HashSet::new()),
            spawned: Mutex::new(Vec::new()),
            waits: Mutex::new(Vec::new()),
            next_pid: AtomicI64::new(10_000),
            fail_spawns: AtomicBool::new(false),
        }
    }

    pub fn start(&self, pid: i64) {
        self.alive.lock().unwrap().insert(pid);
    }

    pub fn kill(&self, pid: i64) {
        self.alive.lock().unwrap().remove(&pid);
    }

    pub fn make_inconclusive(&self, pid: i64) {
        self.inconclusive.lock().unwrap().insert(pid);
    }

    pub fn fail_spawns(&self, fail: bool) {
        self.fail_spawns.store(fail, Ordering::SeqCst);
    }

    pub fn spawned(&self) -> Vec<(WorkerMode, i64)> {
        self.spawned.lock().unwrap().clone()
    }

    /// `(pid, exited)` for every `wait_timeout` call, in order.
    pub fn waits(&self) -> Vec<(i64, bool)> {
        self.waits.lock().unwrap().clone()
    }
}

impl ProcessControl for FakeProcesses {
    fn spawn_worker(&self, mode: WorkerMode) -> Result<i64> {
        if self.fail_spawns.load(Ordering::SeqCst) {
            return Err(Error::SpawnFailed {
                mode,
                source: std::io::Error::new(std::io::ErrorKind::Other, "injected"),
            });
        }
        let pid = self.next_pid.fetch_add(1, Ordering::SeqCst);
        self.start(pid);
        self.spawned.lock().unwrap().push((mode, pid));
        Ok(pid)
    }

    fn probe(&self, pid: i64) -> Result<bool> {
        if self.inconclusive.lock().unwrap().contains(&pid) {
            return Err(Error::ProbeInconclusive {
                pid,
                source: std::io::Error::new(std::io::ErrorKind::Other, "injected"),
            });
        }
        Ok(self.alive.lock().unwrap().contains(&pid))
    }

    fn wait_timeout(&self, pid: i64, timeout: Duration) -> Result<bool> {
        let deadline = Instant::now() + timeout;
        let exited = loop {
            if !self.alive.lock().unwrap().contains(&pid) {
                break true;
            }
            if Instant::now() >= deadline {
                break false;
            }
            std::thread::sleep(Duration::from_millis(5));
        };
        self.waits.lock().unwrap().push((pid, exited));
        Ok(exited)
    }

    fn reap(&self) -> Vec<WorkerExit> {
        Vec::new()
    }
}
