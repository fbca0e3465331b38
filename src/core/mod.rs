//! Shared record storage and the primitives guarding it.

pub mod clock;
pub mod lock;
pub mod mmap;
pub mod record;

pub use clock::{Clock, ManualClock, MonotonicClock};
pub use lock::{with_lock, FileLock};
pub use record::{lock_path_for, RecordStore, SharedRecord, Slot, RECORD_SIZE};
