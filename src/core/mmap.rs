use std::fs::{File, OpenOptions};
use std::path::Path;

use memmap2::{MmapOptions, MmapRaw};

/// A shared, writable mapping of a fixed-length file.
///
/// The mapping is reachable only through a raw pointer; callers decide how
/// accesses are serialized.
pub struct MmapFile {
    file: File,
    map: MmapRaw,
    len: usize,
}

impl MmapFile {
    /// Opens `path`, creating it if absent, and makes sure it is exactly
    /// `len` bytes long before mapping. Growing a file zero-fills it.
    pub fn open_or_create(path: &Path, len: usize) -> std::io::Result<Self> {
        if len == 0 {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "mmap length must be non-zero",
            ));
        }
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(path)?;
        if file.metadata()?.len() != len as u64 {
            file.set_len(len as u64)?;
        }
        let map = MmapOptions::new().len(len).map_raw(&file)?;
        Ok(Self { file, map, len })
    }

    pub fn as_mut_ptr(&self) -> *mut u8 {
        self.map.as_mut_ptr()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn flush_sync(&self) -> std::io::Result<()> {
        self.map.flush()
    }

    pub fn sync(&self) -> std::io::Result<()> {
        self.file.sync_all()
    }
}
