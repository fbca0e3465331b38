use std::ffi::OsString;
use std::mem::size_of;
use std::path::{Path, PathBuf};

use crate::core::lock::FileLock;
use crate::core::mmap::MmapFile;
use crate::{Error, Result};

/// The state block every process of a group maps.
///
/// Field order and widths are the on-disk format; do not reorder.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SharedRecord {
    pub counter: i64,
    /// Leader pid, `0` when unclaimed.
    pub owner_pid: i64,
    pub owner_heartbeat_ms: i64,
    pub child_a_pid: i64,
    pub child_b_pid: i64,
    pub child_a_start_ms: i64,
    pub child_b_start_ms: i64,
}

pub const RECORD_SIZE: usize = size_of::<SharedRecord>();

const _: () = assert!(RECORD_SIZE == 56);

/// One of the two worker slots tracked in the record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Slot {
    A,
    B,
}

impl Slot {
    pub const ALL: [Slot; 2] = [Slot::A, Slot::B];
}

impl std::fmt::Display for Slot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Slot::A => f.write_str("A"),
            Slot::B => f.write_str("B"),
        }
    }
}

impl SharedRecord {
    pub fn slot_pid(&self, slot: Slot) -> i64 {
        match slot {
            Slot::A => self.child_a_pid,
            Slot::B => self.child_b_pid,
        }
    }

    pub fn slot_start_ms(&self, slot: Slot) -> i64 {
        match slot {
            Slot::A => self.child_a_start_ms,
            Slot::B => self.child_b_start_ms,
        }
    }

    pub fn set_slot(&mut self, slot: Slot, pid: i64, start_ms: i64) {
        match slot {
            Slot::A => {
                self.child_a_pid = pid;
                self.child_a_start_ms = start_ms;
            }
            Slot::B => {
                self.child_b_pid = pid;
                self.child_b_start_ms = start_ms;
            }
        }
    }

    /// Frees the slot. The start timestamp is left as history.
    pub fn clear_slot(&mut self, slot: Slot) {
        match slot {
            Slot::A => self.child_a_pid = 0,
            Slot::B => self.child_b_pid = 0,
        }
    }
}

/// Path of the lock file guarding the record at `record_path`.
pub fn lock_path_for(record_path: &Path) -> PathBuf {
    let mut raw = OsString::from(record_path.as_os_str());
    raw.push(".lock");
    PathBuf::from(raw)
}

/// The memory-mapped [`SharedRecord`] of a group.
///
/// The record is only reachable through [`RecordStore::with_record`], which
/// holds the group lock for the duration of the closure.
pub struct RecordStore {
    mmap: MmapFile,
    lock_path: PathBuf,
}

impl RecordStore {
    /// Maps the record at `path`, creating a zeroed one if none exists.
    ///
    /// Creation and resizing happen under the group lock so a concurrent
    /// starter never observes a half-initialised file.
    pub fn open_or_create(path: &Path) -> Result<Self> {
        let lock_path = lock_path_for(path);
        let unavailable = |source: std::io::Error| Error::StoreUnavailable {
            path: path.to_path_buf(),
            source,
        };

        let guard = FileLock::acquire(&lock_path).map_err(|err| match err {
            Error::LockUnavailable { source, .. } => unavailable(source),
            other => other,
        })?;
        let mmap = MmapFile::open_or_create(path, RECORD_SIZE).map_err(unavailable)?;
        drop(guard);

        Ok(Self { mmap, lock_path })
    }

    pub fn lock_path(&self) -> &Path {
        &self.lock_path
    }

    /// Runs `f` on the record under the group lock.
    ///
    /// The closure works on a copy; the copy is written back only if it
    /// changed, so read-only sections never dirty the page.
    pub fn with_record<T>(&self, f: impl FnOnce(&mut SharedRecord) -> T) -> Result<T> {
        let _guard = match FileLock::try_acquire(&self.lock_path)? {
            Some(guard) => guard,
            None => {
                log::trace!("waiting for {}", self.lock_path.display());
                FileLock::acquire(&self.lock_path)?
            }
        };
        debug_assert!(self.mmap.len() >= RECORD_SIZE);
        let ptr = self.mmap.as_mut_ptr() as *mut SharedRecord;
        // SAFETY: the mapping is RECORD_SIZE bytes and page aligned, and every
        // reader and writer in the group holds the lock taken above.
        let before = unsafe { ptr.read_volatile() };
        let mut record = before;
        let out = f(&mut record);
        if record != before {
            unsafe { ptr.write_volatile(record) };
        }
        Ok(out)
    }

    pub fn snapshot(&self) -> Result<SharedRecord> {
        self.with_record(|record| *record)
    }

    /// Flushes the mapping and releases it along with the file descriptor.
    pub fn close(self) -> Result<()> {
        self.mmap.flush_sync()?;
        self.mmap.sync()?;
        Ok(())
    }
}
