//! Leader election, worker supervision and the processes that run them.

pub mod config;
pub mod console;
pub mod election;
pub mod incrementer;
pub mod node;
pub mod supervisor;
pub mod worker;

pub use config::{DataPaths, NodeConfig};
pub use console::{parse_command, Command, CommandError};
pub use election::{Election, ElectionStep, Role, TakeoverReason};
pub use node::{Cadence, Node, ShutdownHandle};
pub use supervisor::{CycleOutcome, Supervisor};
pub use worker::{run_worker, WorkerConfig, WorkerMode, WorkerOutcome};
