//! A group of processes sharing one memory-mapped record.
//!
//! Members elect a leader by heartbeat timeout under a cross-process file
//! lock; the leader keeps at most one generation of two short-lived worker
//! processes running against the shared counter.

pub mod coord;
pub mod core;
pub mod error;
pub mod platform;

pub use crate::coord::{Node, NodeConfig, WorkerMode};
pub use crate::core::{RecordStore, SharedRecord};
pub use crate::error::{Error, Result};
pub use crate::platform::{is_alive, NativeProcesses, ProcessControl};
