use std::ffi::OsString;
use std::fs::OpenOptions;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use cohort::coord::{run_worker, DataPaths, Node, NodeConfig, WorkerConfig, WorkerMode};
use cohort::core::{MonotonicClock, RecordStore};
use cohort::NativeProcesses;

#[derive(Parser)]
#[command(name = "cohort")]
#[command(about = "Join a shared-record process group; the elected leader supervises workers")]
struct Cli {
    /// Run once as a worker in the given mode (A or B) and exit
    #[arg(long, value_name = "MODE")]
    child: Option<WorkerMode>,

    /// Directory holding the shared record and its lock file
    #[arg(long, env = "COHORT_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Append log lines to this file [default: <data-dir>/logs/cohort.log]
    #[arg(long, conflicts_with = "log_stderr")]
    log_file: Option<PathBuf>,

    /// Log to stderr instead of the group log file
    #[arg(long)]
    log_stderr: bool,

    /// Election loop period in milliseconds
    #[arg(long, default_value_t = 100)]
    tick_ms: u64,

    /// Heartbeat age in milliseconds after which a peer takes over
    #[arg(long, default_value_t = 4000)]
    stale_ms: u64,

    /// Leader counter report period in milliseconds
    #[arg(long, default_value_t = 1000)]
    status_ms: u64,

    /// Leader supervision cycle period in milliseconds
    #[arg(long, default_value_t = 3000)]
    supervise_ms: u64,

    /// Background increment period in milliseconds
    #[arg(long, default_value_t = 300)]
    increment_ms: u64,

    /// Milliseconds a leader waits for its workers when exiting
    #[arg(long, default_value_t = 0)]
    shutdown_grace_ms: u64,

    /// Do not read `set <n>` / `exit` commands from stdin
    #[arg(long)]
    no_console: bool,

    /// Amount a mode A worker adds to the counter
    #[arg(long, default_value_t = 10, allow_hyphen_values = true)]
    worker_increment: i64,

    /// Milliseconds a mode B worker sleeps between doubling and halving
    #[arg(long, default_value_t = 2000)]
    phase_gap_ms: u64,
}

impl Cli {
    fn worker_config(&self) -> WorkerConfig {
        WorkerConfig {
            increment: self.worker_increment,
            phase_gap: Duration::from_millis(self.phase_gap_ms),
        }
    }

    fn node_config(&self) -> NodeConfig {
        NodeConfig {
            tick: Duration::from_millis(self.tick_ms),
            stale_after: Duration::from_millis(self.stale_ms),
            status_every: Duration::from_millis(self.status_ms),
            supervise_every: Duration::from_millis(self.supervise_ms),
            increment_every: Duration::from_millis(self.increment_ms),
            shutdown_grace: Duration::from_millis(self.shutdown_grace_ms),
            console: !self.no_console,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let paths = DataPaths::resolve(cli.data_dir.clone()).context("resolve data directory")?;
    let log_file = match (&cli.log_file, cli.log_stderr) {
        (_, true) => None,
        (Some(path), false) => Some(path.clone()),
        (None, false) => Some(paths.log_path()),
    };
    init_logging(log_file.as_deref())?;

    let store = RecordStore::open_or_create(&paths.record_path())
        .context("cannot participate without the shared record")?;

    if let Some(mode) = cli.child {
        run_worker(&store, mode, &cli.worker_config());
        store.close()?;
        return Ok(());
    }

    let mut worker_args = vec![
        OsString::from("--data-dir"),
        paths.data_dir().as_os_str().to_owned(),
        OsString::from("--worker-increment"),
        OsString::from(cli.worker_increment.to_string()),
        OsString::from("--phase-gap-ms"),
        OsString::from(cli.phase_gap_ms.to_string()),
    ];
    match &log_file {
        Some(path) => {
            worker_args.push(OsString::from("--log-file"));
            worker_args.push(path.as_os_str().to_owned());
        }
        None => worker_args.push(OsString::from("--log-stderr")),
    }
    let procs = NativeProcesses::current_exe(worker_args).context("locate current executable")?;

    let store = Arc::new(store);
    let node = Node::new(
        cli.node_config(),
        Arc::clone(&store),
        Arc::new(MonotonicClock),
        Arc::new(procs),
    );
    node.run(Some(BufReader::new(std::io::stdin())))?;

    // The console thread may still hold a reference while blocked on stdin.
    if let Ok(store) = Arc::try_unwrap(store) {
        store.close()?;
    }
    Ok(())
}

fn init_logging(log_file: Option<&Path>) -> Result<()> {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if let Some(path) = log_file {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("create log directory {}", parent.display()))?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("open log file {}", path.display()))?;
        builder.target(env_logger::Target::Pipe(Box::new(file)));
    }
    builder.init();
    Ok(())
}
