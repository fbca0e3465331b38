//! Leader-only worker supervision.

use crate::coord::worker::WorkerMode;
use crate::core::{Clock, RecordStore, Slot};
use crate::platform::{probe_or_dead, ProcessControl, WorkerExit};
use crate::Result;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// The record names a different owner; nothing was touched.
    NotOwner { owner: i64 },
    /// A previous-generation worker is still alive.
    Skipped { running: Vec<(Slot, i64)> },
    /// A new generation was launched. A pid of `0` marks a failed spawn.
    Spawned { child_a_pid: i64, child_b_pid: i64 },
}

pub struct Supervisor {
    self_pid: i64,
}

impl Supervisor {
    pub fn new(self_pid: i64) -> Self {
        Self { self_pid }
    }

    /// Logs the current counter and returns it.
    pub fn log_status(&self, store: &RecordStore) -> Result<i64> {
        let counter = store.with_record(|record| record.counter)?;
        log::info!("pid={} counter={counter}", self.self_pid);
        Ok(counter)
    }

    /// Frees slots of dead workers and launches a new generation when no
    /// worker of the previous one is alive.
    pub fn run_cycle(
        &self,
        store: &RecordStore,
        clock: &dyn Clock,
        procs: &dyn ProcessControl,
    ) -> Result<CycleOutcome> {
        let self_pid = self.self_pid;
        let checked = store.with_record(|record| {
            if record.owner_pid != self_pid {
                return Err(record.owner_pid);
            }
            let mut running = Vec::new();
            for slot in Slot::ALL {
                let pid = record.slot_pid(slot);
                if pid != 0 && probe_or_dead(procs, pid) {
                    running.push((slot, pid));
                } else {
                    record.clear_slot(slot);
                }
            }
            Ok(running)
        })?;

        let running = match checked {
            Ok(running) => running,
            Err(owner) => {
                log::warn!("pid={self_pid} skip supervision: owner is pid={owner}");
                return Ok(CycleOutcome::NotOwner { owner });
            }
        };
        if !running.is_empty() {
            log::info!("pid={self_pid} skip spawn: child still running {running:?}");
            return Ok(CycleOutcome::Skipped { running });
        }

        let spawned = [WorkerMode::A, WorkerMode::B].map(|mode| {
            let pid = procs.spawn_worker(mode).unwrap_or_else(|err| {
                log::warn!("pid={self_pid} {err}");
                0
            });
            (mode.slot(), pid)
        });

        // Recorded even if ownership moved meanwhile, so whoever leads next
        // sees this generation and does not launch another alongside it.
        let now = clock.now_ms();
        store.with_record(|record| {
            for (slot, pid) in spawned {
                if pid == 0 {
                    record.clear_slot(slot);
                } else {
                    record.set_slot(slot, pid, now);
                }
            }
        })?;
        let [(_, child_a_pid), (_, child_b_pid)] = spawned;

        if child_a_pid == 0 || child_b_pid == 0 {
            log::warn!("pid={self_pid} failed to spawn child(s): A={child_a_pid} B={child_b_pid}");
        } else {
            log::info!("pid={self_pid} spawned children {child_a_pid}, {child_b_pid}");
        }
        Ok(CycleOutcome::Spawned {
            child_a_pid,
            child_b_pid,
        })
    }

    /// Collects exited workers. Exit codes are logged only; respawn is gated
    /// by liveness alone.
    pub fn reap(&self, procs: &dyn ProcessControl) -> Vec<WorkerExit> {
        let exits = procs.reap();
        for exit in &exits {
            match exit.code {
                Some(0) => log::debug!("worker pid={} exited", exit.pid),
                Some(code) => log::warn!("worker pid={} exited with status {code}", exit.pid),
                None => log::warn!("worker pid={} terminated by signal", exit.pid),
            }
        }
        exits
    }
}
