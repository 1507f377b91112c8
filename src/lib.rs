//! # profiling-harness
//!
//! Wraps a program's main work with execution tracing, CPU profiling and
//! named profile dumps, each switched on through environment variables.
//!
//! ```rust,no_run
//! fn main() -> anyhow::Result<()> {
//!     let report = profiling_harness::run(|| {
//!         serve_forever()?;
//!         Ok(())
//!     })?;
//!     eprintln!("{}", report.summary());
//!     Ok(())
//! }
//!
//! fn serve_forever() -> anyhow::Result<()> { Ok(()) }
//! ```
//!
//! ## Environment
//!
//! | Variable | Effect |
//! |---|---|
//! | `TRACE=1` | record an execution trace to `TRACE_FILE` (default `trace.out`) |
//! | `PROFILE_CPU=1` | record a CPU profile to `PROFILE_CPU_FILE` (default `cpu.pprof`) |
//! | `PROFILE_<NAME>=1` | after a successful run, dump profile `<name>` to `PROFILE_<NAME>_FILE` (default `<name>.pprof`) |
//! | `PROFILE_CPU_HZ` | CPU sampling frequency (default 100) |
//!
//! Only the exact value `1` enables a flag. File names must be a single
//! relative path segment. Artifacts go to the current directory unless the
//! program sets another one with [`HarnessConfig::output_dir`].
//!
//! Traces are written in the Chrome trace-event format and record `tracing`
//! spans and events. Profiles are written as pprof protobuf.

mod config;
mod cpu;
mod dump;
mod error;
mod harness;
mod path;
pub mod profiles;
mod report;
mod session;
mod sink;
mod trace;

pub use config::{
    profile_key, ConfigSource, Env, HarnessConfig, DEFAULT_CPU_FREQUENCY,
    DEFAULT_CPU_PROFILE_FILE, DEFAULT_TRACE_FILE, ENABLED,
};
pub use cpu::CpuProfileSession;
pub use dump::dump;
pub use error::{ErrorKind, HarnessError, Result};
pub use harness::{run, Harness};
pub use path::{is_safe_filename, sanitize};
pub use profiles::{HeapStats, Profile, TrackingAllocator};
pub use report::{Artifact, RunReport, CPU_ARTIFACT, TRACE_ARTIFACT};
pub use session::Session;
pub use sink::{LocalDir, OutputDir, Sink};
pub use trace::{is_recording, TraceSession};
