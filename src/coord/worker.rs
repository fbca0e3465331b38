//! One-shot mutators launched by the leader.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::core::{RecordStore, Slot};

pub const DEFAULT_WORKER_INCREMENT: i64 = 10;
pub const DEFAULT_PHASE_GAP: Duration = Duration::from_millis(2_000);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorkerMode {
    /// Adds the configured increment once.
    A,
    /// Doubles, sleeps unlocked, then halves whatever is there by then.
    B,
}

impl WorkerMode {
    /// The argument that makes the executable run as this worker.
    pub fn child_arg(self) -> String {
        format!("--child={self}")
    }

    /// Record slot that tracks workers of this mode.
    pub fn slot(self) -> Slot {
        match self {
            WorkerMode::A => Slot::A,
            WorkerMode::B => Slot::B,
        }
    }
}

impl fmt::Display for WorkerMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkerMode::A => f.write_str("A"),
            WorkerMode::B => f.write_str("B"),
        }
    }
}

impl FromStr for WorkerMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "A" | "a" | "1" => Ok(WorkerMode::A),
            "B" | "b" | "2" => Ok(WorkerMode::B),
            other => Err(format!("unknown worker mode `{other}` (expected A or B)")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerConfig {
    pub increment: i64,
    /// Unlocked pause between the two phases of mode B.
    pub phase_gap: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            increment: DEFAULT_WORKER_INCREMENT,
            phase_gap: DEFAULT_PHASE_GAP,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerOutcome {
    /// Every phase ran; `counter` is the value the last phase wrote.
    Completed { counter: i64 },
    /// A phase could not take the lock and the rest was skipped.
    Skipped,
}

pub fn apply_increment(counter: i64, increment: i64) -> i64 {
    counter.wrapping_add(increment)
}

pub fn apply_double(counter: i64) -> i64 {
    counter.wrapping_mul(2)
}

pub fn apply_halve(counter: i64) -> i64 {
    counter / 2
}

/// Runs the worker's mutation sequence against `store`.
pub fn run_worker(store: &RecordStore, mode: WorkerMode, config: &WorkerConfig) -> WorkerOutcome {
    let pid = std::process::id();
    log::info!("worker {mode} start pid={pid}");
    let outcome = match mode {
        WorkerMode::A => run_increment(store, config.increment),
        WorkerMode::B => run_double_halve(store, config.phase_gap),
    };
    match outcome {
        WorkerOutcome::Completed { counter } => {
            log::info!("worker {mode} exit pid={pid} counter={counter}")
        }
        WorkerOutcome::Skipped => log::warn!("worker {mode} exit pid={pid} without completing"),
    }
    outcome
}

fn run_increment(store: &RecordStore, increment: i64) -> WorkerOutcome {
    match store.with_record(|record| {
        record.counter = apply_increment(record.counter, increment);
        record.counter
    }) {
        Ok(counter) => WorkerOutcome::Completed { counter },
        Err(err) => {
            log::warn!("increment skipped: {err}");
            WorkerOutcome::Skipped
        }
    }
}

fn run_double_halve(store: &RecordStore, phase_gap: Duration) -> WorkerOutcome {
    if let Err(err) = store.with_record(|record| record.counter = apply_double(record.counter)) {
        log::warn!("double skipped, not halving: {err}");
        return WorkerOutcome::Skipped;
    }

    std::thread::sleep(phase_gap);

    match store.with_record(|record| {
        record.counter = apply_halve(record.counter);
        record.counter
    }) {
        Ok(counter) => WorkerOutcome::Completed { counter },
        Err(err) => {
            log::warn!("halve skipped: {err}");
            WorkerOutcome::Skipped
        }
    }
}
