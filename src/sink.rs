//! Output files for sessions and profile dumps.

use std::fs::File;
use std::io::{self, Write};
use std::path::PathBuf;

/// A writable artifact whose close can fail.
///
/// Dropping a [`File`] discards close-time errors, so sinks are closed
/// explicitly and the error is reported.
pub trait Sink: Write + Send + 'static {
    /// Flush and close the sink.
    fn close(self) -> io::Result<()>;
}

impl Sink for File {
    fn close(mut self) -> io::Result<()> {
        self.flush()?;
        self.sync_all()
    }
}

/// Where artifacts are created.
pub trait OutputDir {
    type Sink: Sink;

    /// Create (or truncate) the artifact `name`.
    ///
    /// `name` has already been validated as a single relative segment.
    fn create(&self, name: &str) -> io::Result<Self::Sink>;
}

/// Creates artifacts as files under a root directory.
#[derive(Debug, Clone)]
pub struct LocalDir {
    root: PathBuf,
}

impl LocalDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl Default for LocalDir {
    fn default() -> Self {
        Self::new(".")
    }
}

impl OutputDir for LocalDir {
    type Sink = File;

    fn create(&self, name: &str) -> io::Result<File> {
        File::create(self.root.join(name))
    }
}
