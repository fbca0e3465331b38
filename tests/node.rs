mod common;

use std::io::Cursor;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use cohort::coord::{DataPaths, Node, NodeConfig, ShutdownHandle};
use cohort::core::{Clock, MonotonicClock, RecordStore};
use common::FakeProcesses;
use tempfile::{tempdir, TempDir};

fn fast_config() -> NodeConfig {
    NodeConfig {
        tick: Duration::from_millis(10),
        status_every: Duration::from_millis(30),
        supervise_every: Duration::from_millis(50),
        increment_every: Duration::from_millis(20),
        ..NodeConfig::default()
    }
}

fn open_store() -> (TempDir, Arc<RecordStore>) {
    let dir = tempdir().expect("tempdir");
    let record_path = DataPaths::new(dir.path()).record_path();
    let store = Arc::new(RecordStore::open_or_create(&record_path).expect("open"));
    (dir, store)
}

fn start_node(
    config: NodeConfig,
    store: &Arc<RecordStore>,
    procs: &Arc<FakeProcesses>,
) -> (i64, ShutdownHandle, JoinHandle<cohort::Result<()>>) {
    let node = Node::new(
        config,
        Arc::clone(store),
        Arc::new(MonotonicClock),
        Arc::clone(procs) as Arc<dyn cohort::ProcessControl>,
    );
    let self_pid = node.self_pid();
    let shutdown = node.shutdown_handle();
    let handle = std::thread::spawn(move || node.run(None::<Cursor<Vec<u8>>>));
    (self_pid, shutdown, handle)
}

fn wait_for_generation(procs: &FakeProcesses) -> (i64, i64) {
    let deadline = Instant::now() + Duration::from_secs(10);
    while procs.spawned().len() < 2 {
        assert!(Instant::now() < deadline, "leader never spawned workers");
        std::thread::sleep(Duration::from_millis(10));
    }
    let spawned = procs.spawned();
    (spawned[0].1, spawned[1].1)
}

#[test]
fn node_claims_leadership_and_supervises() {
    let (_dir, store) = open_store();
    let procs = Arc::new(FakeProcesses::new());
    let (self_pid, shutdown, handle) = start_node(fast_config(), &store, &procs);

    let (child_a, child_b) = wait_for_generation(&procs);
    // Fake workers never exit, so later cycles must keep skipping.
    std::thread::sleep(Duration::from_millis(200));
    shutdown.request();
    handle.join().expect("join").expect("run");

    assert_eq!(procs.spawned().len(), 2);
    let record = store.snapshot().expect("snapshot");
    assert_eq!(record.owner_pid, self_pid);
    assert!(record.counter > 0, "background incrementer never ran");
    assert_eq!((record.child_a_pid, record.child_b_pid), (child_a, child_b));
    // No grace period: shutdown does not wait on workers.
    assert!(procs.waits().is_empty());
}

#[test]
fn follower_leaves_live_owner_alone() {
    let (_dir, store) = open_store();
    let procs = Arc::new(FakeProcesses::new());
    let config = NodeConfig {
        stale_after: Duration::from_secs(60),
        ..fast_config()
    };

    procs.start(4242);
    store
        .with_record(|record| {
            record.owner_pid = 4242;
            record.owner_heartbeat_ms = MonotonicClock.now_ms();
        })
        .expect("seed owner");

    let (_, shutdown, handle) = start_node(config, &store, &procs);
    std::thread::sleep(Duration::from_millis(300));
    shutdown.request();
    handle.join().expect("join").expect("run");

    assert_eq!(store.snapshot().expect("snapshot").owner_pid, 4242);
    assert!(procs.spawned().is_empty());
}

#[test]
fn shutdown_waits_for_workers_that_exit_within_grace() {
    let (_dir, store) = open_store();
    let procs = Arc::new(FakeProcesses::new());
    let grace = Duration::from_secs(5);
    let config = NodeConfig {
        shutdown_grace: grace,
        ..fast_config()
    };
    let (_, shutdown, handle) = start_node(config, &store, &procs);
    let (child_a, child_b) = wait_for_generation(&procs);

    let requested = Instant::now();
    shutdown.request();
    std::thread::sleep(Duration::from_millis(100));
    procs.kill(child_a);
    procs.kill(child_b);
    handle.join().expect("join").expect("run");

    assert!(requested.elapsed() < grace, "drain waited out the whole grace period");
    assert_eq!(procs.waits(), vec![(child_a, true), (child_b, true)]);
}

#[test]
fn shutdown_leaves_workers_running_past_grace() {
    let (_dir, store) = open_store();
    let procs = Arc::new(FakeProcesses::new());
    let grace = Duration::from_millis(200);
    let config = NodeConfig {
        shutdown_grace: grace,
        ..fast_config()
    };
    let (_, shutdown, handle) = start_node(config, &store, &procs);
    let (child_a, child_b) = wait_for_generation(&procs);

    let requested = Instant::now();
    shutdown.request();
    handle.join().expect("join").expect("run");

    assert!(requested.elapsed() >= grace);
    assert_eq!(procs.waits(), vec![(child_a, false), (child_b, false)]);
    let record = store.snapshot().expect("snapshot");
    assert_eq!((record.child_a_pid, record.child_b_pid), (child_a, child_b));
}

#[test]
fn console_commands_drive_counter_and_shutdown() {
    let (_dir, store) = open_store();

    let node = Node::new(
        fast_config(),
        Arc::clone(&store),
        Arc::new(MonotonicClock),
        Arc::new(FakeProcesses::new()),
    );
    let input = Cursor::new(b"set 77\nbogus\nset\nquit\nset 5\n".to_vec());
    // `quit` alone must stop the node.
    node.run(Some(input)).expect("run");

    // Lines after `quit` are never applied; only a few background
    // increments can land on top of 77 before the loop notices.
    let counter = store.snapshot().expect("snapshot").counter;
    assert!((77..100).contains(&counter), "counter={counter}");
}

#[test]
fn console_eof_requests_shutdown() {
    let dir = tempdir().expect("tempdir");
    let store = RecordStore::open_or_create(&dir.path().join("shared.bin")).expect("open");
    let shutdown = ShutdownHandle::new();

    cohort::coord::console::run_console(Cursor::new(b"set 12\n".to_vec()), &store, &shutdown, 1);
    assert!(shutdown.is_requested());
    assert_eq!(store.snapshot().expect("snapshot").counter, 12);
}
