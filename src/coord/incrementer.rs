use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crate::coord::node::ShutdownHandle;
use crate::core::RecordStore;
use crate::Result;

/// Adds 1 to the counter every `every` until shutdown, leader or not.
pub fn run_incrementer(store: &RecordStore, every: Duration, shutdown: &ShutdownHandle) {
    while !shutdown.is_requested() {
        std::thread::sleep(every);
        if shutdown.is_requested() {
            break;
        }
        if let Err(err) = store.with_record(|record| record.counter = record.counter.wrapping_add(1)) {
            log::warn!("background increment skipped: {err}");
        }
    }
}

pub fn spawn_incrementer(
    store: Arc<RecordStore>,
    every: Duration,
    shutdown: ShutdownHandle,
) -> Result<JoinHandle<()>> {
    let handle = std::thread::Builder::new()
        .name("cohort-incrementer".to_string())
        .spawn(move || run_incrementer(&store, every, &shutdown))?;
    Ok(handle)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shutdown_during_sleep_skips_pending_increment() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = Arc::new(RecordStore::open_or_create(&dir.path().join("shared.bin")).expect("open"));
        let shutdown = ShutdownHandle::new();

        let handle = spawn_incrementer(
            Arc::clone(&store),
            Duration::from_millis(300),
            shutdown.clone(),
        )
        .expect("spawn");
        std::thread::sleep(Duration::from_millis(50));
        shutdown.request();
        handle.join().expect("join");

        assert_eq!(store.snapshot().expect("snapshot").counter, 0);
    }

    #[test]
    fn increments_until_shutdown() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = Arc::new(RecordStore::open_or_create(&dir.path().join("shared.bin")).expect("open"));
        let shutdown = ShutdownHandle::new();

        let handle = spawn_incrementer(
            Arc::clone(&store),
            Duration::from_millis(10),
            shutdown.clone(),
        )
        .expect("spawn");
        std::thread::sleep(Duration::from_millis(200));
        shutdown.request();
        handle.join().expect("join");

        let counter = store.snapshot().expect("snapshot").counter;
        assert!(counter > 0, "counter={counter}");
        std::thread::sleep(Duration::from_millis(50));
        assert_eq!(store.snapshot().expect("snapshot").counter, counter);
    }
}
