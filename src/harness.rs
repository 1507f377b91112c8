//! Runs a workload under the configured tracing and profiling.
//!
//! A run goes through these steps in order:
//!
//! 1. start the execution trace, if enabled
//! 2. start the CPU profile, if enabled
//! 3. run the workload
//! 4. if it succeeded, dump every enabled named profile
//! 5. release the sessions in reverse order
//!
//! A failure in steps 1 or 2 aborts before the workload runs. Cleanup errors
//! are joined onto whatever error is already in flight.

use crate::config::HarnessConfig;
use crate::cpu::CpuProfileSession;
use crate::dump::dump;
use crate::error::{combine, HarnessError, Result};
use crate::profiles;
use crate::report::{Artifact, RunReport};
use crate::session::Session;
use crate::sink::{LocalDir, OutputDir};
use crate::trace::TraceSession;
use log::{debug, info};
use std::time::{Duration, Instant};

/// Wraps workloads with tracing and profiling.
///
/// ```rust,no_run
/// use profiling_harness::{Harness, HarnessConfig};
///
/// let config = HarnessConfig::from_env().output_dir("target/profiles");
/// let report = Harness::new(config).run(|| {
///     // the program being profiled
///     Ok(())
/// })?;
/// println!("{}", report.summary());
/// # Ok::<(), profiling_harness::HarnessError>(())
/// ```
#[derive(Debug)]
pub struct Harness<D: OutputDir = LocalDir> {
    config: HarnessConfig,
    dir: D,
}

impl Harness<LocalDir> {
    /// Write artifacts to the configured output directory.
    pub fn new(config: HarnessConfig) -> Self {
        let dir = LocalDir::new(config.dir());
        Self { config, dir }
    }

    /// Configure from the process environment.
    pub fn from_env() -> Self {
        Self::new(HarnessConfig::from_env())
    }
}

impl<D: OutputDir> Harness<D> {
    /// Write artifacts through `dir` instead of the configured directory.
    pub fn with_output(config: HarnessConfig, dir: D) -> Self {
        Self { config, dir }
    }

    /// Run `workload` once under the configured sessions.
    ///
    /// The workload runs inside a `workload` tracing span. Its error is
    /// returned as [`HarnessError::Workload`] unchanged, joined with any
    /// error from releasing the sessions. No profiles are dumped after a
    /// failed workload; the trace and CPU profile files are still closed.
    ///
    /// # Errors
    ///
    /// Any [`HarnessError`]. A failed dump is wrapped in
    /// [`HarnessError::Dump`] and stops the remaining dumps.
    pub fn run<F>(&self, workload: F) -> Result<RunReport>
    where
        F: FnOnce() -> anyhow::Result<()>,
    {
        let trace = match self.config.trace_file() {
            Some(name) => Some(TraceSession::start(&self.dir, &name)?),
            None => None,
        };

        let cpu = match self.config.cpu_profile_file() {
            Some(name) => {
                match CpuProfileSession::start(&self.dir, &name, self.config.frequency()) {
                    Ok(session) => Some(session),
                    Err(err) => return Err(err.with_cleanup(release(trace, &mut Vec::new()))),
                }
            }
            None => None,
        };

        let mut artifacts = Vec::new();
        let outcome = self.execute(workload, &mut artifacts);
        let outcome = combine(outcome, release(cpu, &mut artifacts));
        let outcome = combine(outcome, release(trace, &mut artifacts));

        outcome.map(|workload_duration| RunReport {
            workload_duration,
            artifacts,
        })
    }

    fn execute<F>(&self, workload: F, artifacts: &mut Vec<Artifact>) -> Result<Duration>
    where
        F: FnOnce() -> anyhow::Result<()>,
    {
        let started = Instant::now();
        tracing::info_span!("workload")
            .in_scope(workload)
            .map_err(HarnessError::Workload)?;
        let elapsed = started.elapsed();
        info!("Workload finished in {elapsed:?}");

        for kind in profiles::names() {
            let Some(name) = self.config.profile_file(&kind) else {
                continue;
            };
            debug!("Dumping profile {kind} to {name}");
            let artifact = dump(&self.dir, &kind, &name).map_err(|source| HarnessError::Dump {
                kind: kind.clone(),
                source: Box::new(source),
            })?;
            artifacts.push(artifact);
        }

        Ok(elapsed)
    }
}

fn release<S: Session>(session: Option<S>, artifacts: &mut Vec<Artifact>) -> Result<()> {
    let Some(session) = session else {
        return Ok(());
    };
    artifacts.push(session.finish()?);
    Ok(())
}

/// Run `workload` with configuration from the process environment.
///
/// # Errors
///
/// See [`Harness::run`].
pub fn run<F>(workload: F) -> Result<RunReport>
where
    F: FnOnce() -> anyhow::Result<()>,
{
    Harness::from_env().run(workload)
}
