//! Execution tracing.
//!
//! Spans and events emitted through `tracing` anywhere in the process are
//! recorded in the Chrome trace-event format, which Perfetto and
//! `chrome://tracing` open directly.
//!
//! The harness owns a process-wide subscriber whose recording layer can be
//! swapped in and out. It is installed by the first session; if the host
//! already installed its own global subscriber, tracing cannot start. At most
//! one [`TraceSession`] records at a time.

use crate::error::{HarnessError, Result};
use crate::report::{Artifact, TRACE_ARTIFACT};
use crate::session::{close_output, create_output, Session};
use crate::sink::{OutputDir, Sink};
use log::{info, warn};
use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, OnceLock, PoisonError};
use tracing_chrome::{ChromeLayer, ChromeLayerBuilder, FlushGuard};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{reload, Registry};

type Recorder = Option<ChromeLayer<Registry>>;
type RecorderHandle = reload::Handle<Recorder, Registry>;

static RECORDER: OnceLock<RecorderHandle> = OnceLock::new();
static RECORDING: AtomicBool = AtomicBool::new(false);

/// Whether an execution trace is currently being recorded.
pub fn is_recording() -> bool {
    RECORDING.load(Ordering::SeqCst)
}

fn recorder() -> std::result::Result<&'static RecorderHandle, String> {
    if let Some(handle) = RECORDER.get() {
        return Ok(handle);
    }

    let (slot, handle) = reload::Layer::new(None::<ChromeLayer<Registry>>);
    tracing::subscriber::set_global_default(Registry::default().with(slot))
        .map_err(|e| format!("a global tracing subscriber is already installed: {e}"))?;
    Ok(RECORDER.get_or_init(|| handle))
}

struct SinkState<W> {
    sink: Option<W>,
    written: u64,
}

/// Writer handed to the trace backend's writer thread.
///
/// The session keeps a second handle so it can take the sink back and close
/// it once the backend has flushed.
struct SharedSink<W>(Arc<Mutex<SinkState<W>>>);

impl<W> Clone for SharedSink<W> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

impl<W> SharedSink<W> {
    fn new(sink: W) -> Self {
        Self(Arc::new(Mutex::new(SinkState {
            sink: Some(sink),
            written: 0,
        })))
    }

    fn take(&self) -> (Option<W>, u64) {
        let mut state = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        (state.sink.take(), state.written)
    }
}

impl<W: Write> Write for SharedSink<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut state = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        let sink = state
            .sink
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::BrokenPipe, "trace output closed"))?;
        let n = sink.write(buf)?;
        state.written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        let mut state = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        match state.sink.as_mut() {
            Some(sink) => sink.flush(),
            None => Ok(()),
        }
    }
}

/// A running execution trace and the file it is written to.
pub struct TraceSession<W: Sink> {
    file: String,
    output: SharedSink<W>,
    flush: Option<FlushGuard>,
}

impl<W: Sink> TraceSession<W> {
    /// Create `name` in `dir` and start recording into it.
    ///
    /// # Errors
    ///
    /// - [`HarnessError::UnsafeOutputPath`] if `name` is not a safe filename
    /// - [`HarnessError::CannotCreateFile`] if the file cannot be created
    /// - [`HarnessError::CannotStartTrace`] if another trace is recording or
    ///   the subscriber cannot be installed; the file is closed first
    pub fn start<D: OutputDir<Sink = W>>(dir: &D, name: &str) -> Result<Self> {
        let (file, sink) = create_output(dir, name)?;
        let output = SharedSink::new(sink);

        match begin(&output) {
            Ok(flush) => {
                info!("Execution trace started, writing to {file}");
                Ok(Self {
                    file,
                    output,
                    flush: Some(flush),
                })
            }
            Err(reason) => {
                let closed = match output.take() {
                    (Some(sink), _) => close_output(sink, &file),
                    (None, _) => Ok(()),
                };
                Err(HarnessError::CannotStartTrace(reason).with_cleanup(closed))
            }
        }
    }

    fn release(&mut self) -> Result<u64> {
        let Some(flush) = self.flush.take() else {
            return Ok(0);
        };

        if let Some(handle) = RECORDER.get() {
            if let Err(e) = handle.reload(None::<ChromeLayer<Registry>>) {
                warn!("Cannot detach trace recorder: {e}");
            }
        }
        // Joins the backend's writer thread once the trailer is written.
        drop(flush);
        RECORDING.store(false, Ordering::SeqCst);

        match self.output.take() {
            (Some(sink), written) => close_output(sink, &self.file).map(|()| written),
            (None, written) => Ok(written),
        }
    }
}

fn begin<W: Sink>(output: &SharedSink<W>) -> std::result::Result<FlushGuard, String> {
    if RECORDING.swap(true, Ordering::SeqCst) {
        return Err("an execution trace is already being recorded".to_string());
    }

    let handle = match recorder() {
        Ok(handle) => handle,
        Err(reason) => {
            RECORDING.store(false, Ordering::SeqCst);
            return Err(reason);
        }
    };

    let (layer, flush) = ChromeLayerBuilder::<Registry>::new()
        .writer(output.clone())
        .include_args(true)
        .build();

    if let Err(e) = handle.reload(Some(layer)) {
        drop(flush);
        RECORDING.store(false, Ordering::SeqCst);
        return Err(e.to_string());
    }
    Ok(flush)
}

impl<W: Sink> Session for TraceSession<W> {
    fn finish(mut self) -> Result<Artifact> {
        let bytes = self.release()?;
        info!("Execution trace written to {} ({bytes} bytes)", self.file);
        Ok(Artifact::new(TRACE_ARTIFACT, std::mem::take(&mut self.file), bytes))
    }
}

impl<W: Sink> Drop for TraceSession<W> {
    fn drop(&mut self) {
        if self.flush.is_some() {
            if let Err(e) = self.release() {
                warn!("Releasing execution trace {}: {e}", self.file);
            }
        }
    }
}
