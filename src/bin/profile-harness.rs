//! profile-harness: run a synthetic workload under the profiling harness.
//!
//! Profiling is configured from the environment exactly as for any program
//! that embeds the harness:
//!
//! ```text
//! TRACE=1 PROFILE_CPU=1 PROFILE_HEAP=1 profile-harness spin --duration-ms 800
//! PROFILE_THREADS=1 profile-harness threads --output-dir target/profiles --report run.json
//! ```
//!
//! Set `RUST_LOG=info` to see sessions starting and artifacts being written.

use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use log::error;
use profiling_harness::{Harness, HarnessConfig, TrackingAllocator};
use std::hint::black_box;
use std::path::PathBuf;
use std::thread;
use std::time::{Duration, Instant};

#[global_allocator]
static ALLOC: TrackingAllocator = TrackingAllocator;

#[derive(Debug, Parser)]
#[command(
    name = "profile-harness",
    about = "Run a synthetic workload with tracing and profiling enabled from the environment"
)]
struct Cli {
    /// Workload to run
    #[arg(value_enum)]
    workload: Workload,

    /// How long the workload runs, in milliseconds
    #[arg(long, default_value_t = 500)]
    duration_ms: u64,

    /// Directory profiles and traces are written to
    #[arg(long, default_value = ".")]
    output_dir: PathBuf,

    /// Write the run report as JSON to this file
    #[arg(long)]
    report: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Workload {
    /// Burn CPU on the calling thread
    Spin,
    /// Allocate and free buffers of varying size
    Alloc,
    /// Spin on several named threads
    Threads,
    /// Fail after a short delay
    Fail,
}

const WORKER_THREADS: usize = 4;

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    if let Err(e) = run_cli(&cli) {
        error!("{e:#}");
        std::process::exit(1);
    }
}

fn run_cli(cli: &Cli) -> Result<()> {
    let duration = Duration::from_millis(cli.duration_ms);
    let workload = cli.workload;

    let harness = Harness::new(HarnessConfig::from_env().output_dir(&cli.output_dir));
    let report = harness
        .run(|| run_workload(workload, duration))
        .with_context(|| format!("{workload:?} workload failed"))?;

    eprintln!("{}", report.summary());

    if let Some(path) = &cli.report {
        report
            .write_json(path)
            .with_context(|| format!("Failed to write report to {}", path.display()))?;
    }
    Ok(())
}

fn run_workload(workload: Workload, duration: Duration) -> Result<()> {
    match workload {
        Workload::Spin => {
            spin(duration);
        }
        Workload::Alloc => alloc(duration),
        Workload::Threads => threads(duration)?,
        Workload::Fail => {
            thread::sleep(duration.min(Duration::from_millis(10)));
            bail!("workload failed on purpose");
        }
    }
    Ok(())
}

fn spin(duration: Duration) -> u64 {
    let _span = tracing::info_span!("spin", duration_ms = duration.as_millis() as u64).entered();
    let start = Instant::now();
    let mut acc = 0u64;
    let mut rounds = 0u64;
    while start.elapsed() < duration {
        for i in 0..10_000u64 {
            acc = black_box(acc.wrapping_mul(6364136223846793005).wrapping_add(i));
        }
        rounds += 1;
    }
    tracing::info!(rounds, "spin finished");
    acc
}

fn alloc(duration: Duration) {
    let start = Instant::now();
    let mut retained: Vec<Vec<u8>> = Vec::new();
    let mut round = 0usize;
    while start.elapsed() < duration {
        let _span = tracing::trace_span!("alloc_round", round).entered();
        let size = 1024 << (round % 8);
        let buf = black_box(vec![round as u8; size]);
        // Keep every eighth buffer so some memory is still in use at dump time.
        if round % 8 == 0 {
            retained.push(buf);
        }
        round += 1;
    }
    tracing::info!(
        rounds = round,
        retained = retained.len(),
        "alloc finished"
    );
    black_box(retained);
}

fn threads(duration: Duration) -> Result<()> {
    let handles = (0..WORKER_THREADS)
        .map(|i| {
            thread::Builder::new()
                .name(format!("worker-{i}"))
                .spawn(move || spin(duration))
                .with_context(|| format!("Failed to spawn worker-{i}"))
        })
        .collect::<Result<Vec<_>>>()?;

    for handle in handles {
        if handle.join().is_err() {
            bail!("worker thread panicked");
        }
    }
    Ok(())
}
