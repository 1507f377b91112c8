//! Pieces shared by the recording sessions and the profile dumper.

use crate::error::{HarnessError, Result};
use crate::path;
use crate::report::Artifact;
use crate::sink::{OutputDir, Sink};

/// A started recording that owns its output file.
///
/// `finish` stops the recording and closes the file. It runs once; a session
/// that is dropped without being finished releases itself in `Drop`.
pub trait Session {
    fn finish(self) -> Result<Artifact>;
}

/// Validate `name` and create it in `dir`.
///
/// Returns the cleaned name alongside the sink.
pub(crate) fn create_output<D: OutputDir>(dir: &D, name: &str) -> Result<(String, D::Sink)> {
    let file =
        path::sanitize(name).ok_or_else(|| HarnessError::UnsafeOutputPath(name.to_string()))?;
    let sink = dir
        .create(&file)
        .map_err(|source| HarnessError::CannotCreateFile {
            path: file.clone(),
            source,
        })?;
    Ok((file, sink))
}

/// Close `sink`, reporting failure as [`HarnessError::CannotCloseFile`].
pub(crate) fn close_output<S: Sink>(sink: S, file: &str) -> Result<()> {
    sink.close().map_err(|source| HarnessError::CannotCloseFile {
        path: file.to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::sink::testing::{Faults, MemoryDir};
    use crate::sink::LocalDir;

    #[test]
    fn should_reject_unsafe_name_before_creating() {
        let dir = MemoryDir::default();
        let err = create_output(&dir, "../evil.pprof").err().unwrap();
        assert_eq!(err.kinds(), vec![ErrorKind::UnsafeOutputPath]);
        assert!(dir.files.lock().unwrap().is_empty());
    }

    #[test]
    fn should_create_cleaned_name() {
        let dir = MemoryDir::default();
        let (file, _sink) = create_output(&dir, "./cpu.pprof").unwrap();
        assert_eq!(file, "cpu.pprof");
        assert!(dir.contents("cpu.pprof").is_some());
    }

    #[test]
    fn should_report_create_failure() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = LocalDir::new(tmp.path().join("missing"));
        let err = create_output(&dir, "trace.out").err().unwrap();
        assert_eq!(err.kinds(), vec![ErrorKind::CannotCreateFile]);
        assert!(err.to_string().contains("trace.out"));
    }

    #[test]
    fn should_report_close_failure() {
        let dir = MemoryDir::failing(Faults {
            close: true,
            ..Faults::default()
        });
        let (file, sink) = create_output(&dir, "trace.out").unwrap();
        let err = close_output(sink, &file).unwrap_err();
        assert_eq!(err.kinds(), vec![ErrorKind::CannotCloseFile]);
    }
}
