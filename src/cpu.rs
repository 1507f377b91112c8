//! CPU sampling profile.
//!
//! Samples are collected by a process-wide `SIGPROF` sampler. The profile is
//! encoded as pprof protobuf when the session finishes and can be inspected
//! with `go tool pprof` or any pprof-compatible viewer.

use crate::error::{combine, HarnessError, Result};
use crate::report::{Artifact, CPU_ARTIFACT};
use crate::session::{close_output, create_output, Session};
use crate::sink::{OutputDir, Sink};
use log::{info, warn};
use pprof::protos::Message;
use pprof::ProfilerGuard;

/// A running CPU profile and the file it is written to.
pub struct CpuProfileSession<W: Sink> {
    file: String,
    sink: Option<W>,
    guard: Option<ProfilerGuard<'static>>,
}

impl<W: Sink> CpuProfileSession<W> {
    /// Create `name` in `dir` and start sampling at `frequency` Hz.
    ///
    /// # Errors
    ///
    /// - [`HarnessError::UnsafeOutputPath`] if `name` is not a safe filename
    /// - [`HarnessError::CannotCreateFile`] if the file cannot be created
    /// - [`HarnessError::CannotProfileCpu`] if the sampler is already running
    ///   or cannot be started; the file is closed first
    pub fn start<D: OutputDir<Sink = W>>(dir: &D, name: &str, frequency: i32) -> Result<Self> {
        let (file, sink) = create_output(dir, name)?;

        match ProfilerGuard::new(frequency) {
            Ok(guard) => {
                info!("CPU profiling started at {frequency} Hz, writing to {file}");
                Ok(Self {
                    file,
                    sink: Some(sink),
                    guard: Some(guard),
                })
            }
            Err(e) => {
                let closed = close_output(sink, &file);
                Err(HarnessError::CannotProfileCpu(e.to_string()).with_cleanup(closed))
            }
        }
    }

    fn release(&mut self) -> Result<u64> {
        let (Some(guard), Some(mut sink)) = (self.guard.take(), self.sink.take()) else {
            return Ok(0);
        };

        let encoded = guard
            .report()
            .build()
            .and_then(|report| report.pprof())
            .map(|profile| profile.encode_to_vec())
            .map_err(|e| HarnessError::CannotProfileCpu(e.to_string()));
        // Stops the sampler.
        drop(guard);

        let written = encoded.and_then(|bytes| {
            sink.write_all(&bytes)
                .map(|()| bytes.len() as u64)
                .map_err(|source| HarnessError::CannotWriteProfile {
                    path: self.file.clone(),
                    source,
                })
        });
        combine(written, close_output(sink, &self.file))
    }
}

impl<W: Sink> Session for CpuProfileSession<W> {
    fn finish(mut self) -> Result<Artifact> {
        let bytes = self.release()?;
        info!("CPU profile written to {} ({bytes} bytes)", self.file);
        Ok(Artifact::new(CPU_ARTIFACT, std::mem::take(&mut self.file), bytes))
    }
}

impl<W: Sink> Drop for CpuProfileSession<W> {
    fn drop(&mut self) {
        if self.guard.is_some() {
            if let Err(e) = self.release() {
                warn!("Releasing CPU profile {}: {e}", self.file);
            }
        }
    }
}
