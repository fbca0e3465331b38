//! The coordinator process: election loop, leader duties, background
//! incrementer and console, all sharing one mapped record.

use std::io::BufRead;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::coord::config::NodeConfig;
use crate::coord::console::spawn_console;
use crate::coord::election::{Election, Role};
use crate::coord::incrementer::spawn_incrementer;
use crate::coord::supervisor::Supervisor;
use crate::core::{Clock, RecordStore, Slot};
use crate::platform::ProcessControl;
use crate::Result;

/// Local stop flag observed by every thread of a node at its next tick.
#[derive(Debug, Clone, Default)]
pub struct ShutdownHandle {
    requested: Arc<AtomicBool>,
}

impl ShutdownHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request(&self) {
        self.requested.store(true, Ordering::SeqCst);
    }

    pub fn is_requested(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }
}

/// Fires at most once per period, measured from the last firing.
#[derive(Debug, Clone, Copy)]
pub struct Cadence {
    every_ms: i64,
    last_ms: i64,
}

impl Cadence {
    pub fn new(every: Duration, start_ms: i64) -> Self {
        Self {
            every_ms: every.as_millis() as i64,
            last_ms: start_ms,
        }
    }

    pub fn due(&mut self, now_ms: i64) -> bool {
        if now_ms.saturating_sub(self.last_ms) >= self.every_ms {
            self.last_ms = now_ms;
            return true;
        }
        false
    }
}

pub struct Node {
    config: NodeConfig,
    store: Arc<RecordStore>,
    clock: Arc<dyn Clock>,
    procs: Arc<dyn ProcessControl>,
    self_pid: i64,
    shutdown: ShutdownHandle,
}

impl Node {
    pub fn new(
        config: NodeConfig,
        store: Arc<RecordStore>,
        clock: Arc<dyn Clock>,
        procs: Arc<dyn ProcessControl>,
    ) -> Self {
        Self {
            config,
            store,
            clock,
            procs,
            self_pid: i64::from(std::process::id()),
            shutdown: ShutdownHandle::new(),
        }
    }

    pub fn self_pid(&self) -> i64 {
        self.self_pid
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.shutdown.clone()
    }

    /// Runs until shutdown is requested. `input` feeds the console when the
    /// console is enabled.
    pub fn run<R: BufRead + Send + 'static>(self, input: Option<R>) -> Result<()> {
        let self_pid = self.self_pid;
        log::info!("start pid={self_pid}");

        let incrementer = spawn_incrementer(
            Arc::clone(&self.store),
            self.config.increment_every,
            self.shutdown.clone(),
        )?;
        let console = match input {
            Some(input) if self.config.console => Some(spawn_console(
                input,
                Arc::clone(&self.store),
                self.shutdown.clone(),
                self_pid,
            )?),
            _ => None,
        };

        let mut election = Election::new(self_pid, self.config.stale_after);
        let supervisor = Supervisor::new(self_pid);
        let start = self.clock.now_ms();
        let mut status = Cadence::new(self.config.status_every, start);
        let mut supervise = Cadence::new(self.config.supervise_every, start);

        while !self.shutdown.is_requested() {
            std::thread::sleep(self.config.tick);
            supervisor.reap(self.procs.as_ref());

            let role = match election.tick(&self.store, self.clock.as_ref(), self.procs.as_ref()) {
                Ok(role) => role,
                Err(err) => {
                    log::warn!("election tick skipped: {err}");
                    continue;
                }
            };
            if role != Role::Leader {
                continue;
            }

            let now = self.clock.now_ms();
            if status.due(now) {
                if let Err(err) = supervisor.log_status(&self.store) {
                    log::warn!("status skipped: {err}");
                }
            }
            if supervise.due(now) {
                if let Err(err) =
                    supervisor.run_cycle(&self.store, self.clock.as_ref(), self.procs.as_ref())
                {
                    log::warn!("supervision cycle skipped: {err}");
                }
            }
        }

        if incrementer.join().is_err() {
            log::error!("incrementer thread panicked");
        }
        if let Some(console) = console {
            // A console blocked on input is left behind; the process exit ends it.
            if console.is_finished() && console.join().is_err() {
                log::error!("console thread panicked");
            }
        }
        if election.role() == Role::Leader {
            self.drain_workers();
        }
        supervisor.reap(self.procs.as_ref());
        log::info!("exit pid={self_pid}");
        Ok(())
    }

    fn drain_workers(&self) {
        let grace = self.config.shutdown_grace;
        if grace.is_zero() {
            return;
        }
        let record = match self.store.snapshot() {
            Ok(record) => record,
            Err(err) => {
                log::warn!("worker drain skipped: {err}");
                return;
            }
        };
        let deadline = Instant::now() + grace;
        for slot in Slot::ALL {
            let pid = record.slot_pid(slot);
            if pid == 0 {
                continue;
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.procs.wait_timeout(pid, remaining) {
                Ok(true) => {}
                Ok(false) => log::info!("worker {slot} pid={pid} still running at exit"),
                Err(err) => log::warn!("{err}"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cadence_fires_once_per_period() {
        let mut cadence = Cadence::new(Duration::from_millis(1_000), 0);
        assert!(!cadence.due(999));
        assert!(cadence.due(1_000));
        assert!(!cadence.due(1_500));
        assert!(cadence.due(2_100));
        assert!(!cadence.due(3_000));
        assert!(cadence.due(3_100));
    }

    #[test]
    fn shutdown_is_shared_between_clones() {
        let handle = ShutdownHandle::new();
        let clone = handle.clone();
        assert!(!clone.is_requested());
        handle.request();
        assert!(clone.is_requested());
    }
}
