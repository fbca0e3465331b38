use std::fs::File;
use std::io;
use std::os::unix::io::AsRawFd;

pub(crate) fn lock_exclusive(file: &File) -> io::Result<()> {
    loop {
        let res = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX) };
        if res == 0 {
            return Ok(());
        }
        let err = io::Error::last_os_error();
        if err.kind() != io::ErrorKind::Interrupted {
            return Err(err);
        }
    }
}

pub(crate) fn try_lock_exclusive(file: &File) -> io::Result<bool> {
    let res = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX | libc::LOCK_NB) };
    if res == 0 {
        return Ok(true);
    }
    let err = io::Error::last_os_error();
    if err.kind() == io::ErrorKind::WouldBlock {
        return Ok(false);
    }
    Err(err)
}

pub(crate) fn unlock(file: &File) -> io::Result<()> {
    let res = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_UN) };
    if res == 0 {
        return Ok(());
    }
    Err(io::Error::last_os_error())
}

/// Signal-0 probe. `EPERM` means the process exists under another user.
pub(crate) fn process_alive(pid: i64) -> io::Result<bool> {
    if pid <= 0 {
        return Ok(false);
    }
    let Ok(pid) = libc::pid_t::try_from(pid) else {
        return Ok(false);
    };
    let res = unsafe { libc::kill(pid, 0) };
    if res == 0 {
        return Ok(true);
    }
    let err = io::Error::last_os_error();
    match err.raw_os_error() {
        Some(libc::EPERM) => Ok(true),
        Some(libc::ESRCH) => Ok(false),
        _ => Err(err),
    }
}

pub(crate) fn monotonic_ms() -> i64 {
    let mut ts = libc::timespec {
        tv_sec: 0,
        tv_nsec: 0,
    };
    // CLOCK_MONOTONIC cannot fail with a valid timespec pointer.
    unsafe { libc::clock_gettime(libc::CLOCK_MONOTONIC, &mut ts) };
    (ts.tv_sec as i64) * 1000 + (ts.tv_nsec as i64) / 1_000_000
}
