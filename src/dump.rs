//! Writing a named profile snapshot to a file.

use crate::error::{HarnessError, Result};
use crate::profiles::{self, Profile};
use crate::report::Artifact;
use crate::session::{close_output, create_output};
use crate::sink::OutputDir;
use log::info;
use std::io::{self, Write};

/// Snapshot profile `kind` into the file `name` in `dir`.
///
/// The file is closed whether or not the write succeeded. A write failure is
/// reported in preference to a close failure.
///
/// # Errors
///
/// - [`HarnessError::UnsafeOutputPath`] if `name` is not a safe filename
/// - [`HarnessError::InvalidProfile`] if no profile is registered as `kind`;
///   no file is created
/// - [`HarnessError::CannotCreateFile`] if the file cannot be created
/// - [`HarnessError::CannotWriteProfile`] if the snapshot cannot be written
/// - [`HarnessError::CannotCloseFile`] if the file cannot be closed
pub fn dump<D: OutputDir>(dir: &D, kind: &str, name: &str) -> Result<Artifact> {
    if !crate::path::is_safe_filename(name) {
        return Err(HarnessError::UnsafeOutputPath(name.to_string()));
    }
    let profile =
        profiles::lookup(kind).ok_or_else(|| HarnessError::InvalidProfile(kind.to_string()))?;

    let (file, mut sink) = create_output(dir, name)?;
    let written = write_snapshot(profile.as_ref(), &mut sink);
    let closed = close_output(sink, &file);

    match (written, closed) {
        (Err(source), _) => Err(HarnessError::CannotWriteProfile { path: file, source }),
        (Ok(_), Err(err)) => Err(err),
        (Ok(bytes), Ok(())) => {
            info!("Profile {kind} written to {file} ({bytes} bytes)");
            Ok(Artifact::new(kind, file, bytes))
        }
    }
}

fn write_snapshot(profile: &dyn Profile, sink: &mut impl Write) -> io::Result<u64> {
    let mut buf = Vec::new();
    profile.write_to(&mut buf)?;
    sink.write_all(&buf)?;
    Ok(buf.len() as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::sink::testing::{Faults, MemoryDir};
    use crate::sink::LocalDir;

    #[test]
    fn should_write_registered_profile() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = LocalDir::new(tmp.path());

        let artifact = dump(&dir, "heap", "heap.pprof").unwrap();

        let written = std::fs::read(tmp.path().join("heap.pprof")).unwrap();
        assert!(!written.is_empty());
        assert_eq!(artifact, Artifact::new("heap", "heap.pprof", written.len() as u64));
    }

    #[test]
    fn should_not_create_file_for_unknown_profile() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = LocalDir::new(tmp.path());

        let err = dump(&dir, "goroutine", "goroutine.pprof").unwrap_err();
        assert_eq!(err.kinds(), vec![ErrorKind::InvalidProfile]);
        assert!(!tmp.path().join("goroutine.pprof").exists());
    }

    #[test]
    fn should_report_create_failure_when_dir_missing() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = LocalDir::new(tmp.path().join("missing"));

        let err = dump(&dir, "heap", "heap.pprof").unwrap_err();
        assert_eq!(err.kinds(), vec![ErrorKind::CannotCreateFile]);
    }

    #[test]
    fn should_reject_unsafe_name() {
        let dir = MemoryDir::default();
        let err = dump(&dir, "heap", "/tmp/heap.pprof").unwrap_err();
        assert_eq!(err.kinds(), vec![ErrorKind::UnsafeOutputPath]);
        assert!(dir.files.lock().unwrap().is_empty());
    }

    #[test]
    fn should_report_write_failure_over_close_failure() {
        let dir = MemoryDir::failing(Faults {
            write: true,
            close: true,
        });
        let err = dump(&dir, "heap", "heap.pprof").unwrap_err();
        assert_eq!(err.kinds(), vec![ErrorKind::CannotWriteProfile]);
    }

    #[test]
    fn should_report_close_failure_after_successful_write() {
        let dir = MemoryDir::failing(Faults {
            close: true,
            ..Faults::default()
        });
        let err = dump(&dir, "heap", "heap.pprof").unwrap_err();
        assert_eq!(err.kinds(), vec![ErrorKind::CannotCloseFile]);
        assert!(!dir.contents("heap.pprof").unwrap().is_empty());
    }
}
