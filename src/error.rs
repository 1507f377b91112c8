//! Error types for the profiling harness.
//!
//! Every fallible step of a run maps to one [`HarnessError`] variant. Cleanup
//! failures never replace an error that is already in flight; they are joined
//! with it so both stay observable.

use std::io;
use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, HarnessError>;

/// Errors produced while tracing, profiling or dumping profiles.
#[derive(Error, Debug)]
pub enum HarnessError {
    #[error("unsafe filename: {0:?}")]
    UnsafeOutputPath(String),

    #[error("cannot create file {path}: {source}")]
    CannotCreateFile {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("cannot close file {path}: {source}")]
    CannotCloseFile {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("cannot start execution tracing: {0}")]
    CannotStartTrace(String),

    #[error("cannot profile cpu usage: {0}")]
    CannotProfileCpu(String),

    #[error("invalid profile given: {0}")]
    InvalidProfile(String),

    #[error("cannot write profile to {path}: {source}")]
    CannotWriteProfile {
        path: String,
        #[source]
        source: io::Error,
    },

    /// A profile dump failed; `kind` names the profile that was being written.
    #[error("cannot dump profile {kind}: {source}")]
    Dump {
        kind: String,
        #[source]
        source: Box<HarnessError>,
    },

    /// The workload's own error, passed through unchanged.
    #[error(transparent)]
    Workload(anyhow::Error),

    /// A primary error followed by one or more cleanup errors.
    #[error("{}", join_lines(.0))]
    Joined(Vec<HarnessError>),
}

/// Leaf error categories, independent of the context they were wrapped in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    UnsafeOutputPath,
    CannotCreateFile,
    CannotCloseFile,
    CannotStartTrace,
    CannotProfileCpu,
    InvalidProfile,
    CannotWriteProfile,
    Workload,
}

impl HarnessError {
    /// Join `cleanup` onto `self`, flattening nested joins.
    ///
    /// `self` stays first so the primary failure is reported before anything
    /// that went wrong while cleaning up after it.
    #[must_use]
    pub fn join(self, cleanup: HarnessError) -> Self {
        let mut errors = self.into_parts();
        errors.extend(cleanup.into_parts());
        Self::Joined(errors)
    }

    /// Join the error of a cleanup step, if it failed.
    #[must_use]
    pub(crate) fn with_cleanup(self, cleanup: Result<()>) -> Self {
        match cleanup {
            Ok(()) => self,
            Err(err) => self.join(err),
        }
    }

    /// All leaf kinds carried by this error, in reporting order.
    ///
    /// A [`HarnessError::Dump`] reports the kind of the error it wraps.
    pub fn kinds(&self) -> Vec<ErrorKind> {
        match self {
            Self::Joined(errors) => errors.iter().flat_map(Self::kinds).collect(),
            Self::Dump { source, .. } => source.kinds(),
            Self::UnsafeOutputPath(_) => vec![ErrorKind::UnsafeOutputPath],
            Self::CannotCreateFile { .. } => vec![ErrorKind::CannotCreateFile],
            Self::CannotCloseFile { .. } => vec![ErrorKind::CannotCloseFile],
            Self::CannotStartTrace(_) => vec![ErrorKind::CannotStartTrace],
            Self::CannotProfileCpu(_) => vec![ErrorKind::CannotProfileCpu],
            Self::InvalidProfile(_) => vec![ErrorKind::InvalidProfile],
            Self::CannotWriteProfile { .. } => vec![ErrorKind::CannotWriteProfile],
            Self::Workload(_) => vec![ErrorKind::Workload],
        }
    }

    /// Whether any leaf of this error has the given kind.
    pub fn has_kind(&self, kind: ErrorKind) -> bool {
        self.kinds().contains(&kind)
    }

    /// The workload's error, if the workload is what failed.
    pub fn workload_error(&self) -> Option<&anyhow::Error> {
        match self {
            Self::Workload(err) => Some(err),
            Self::Joined(errors) => errors.iter().find_map(Self::workload_error),
            _ => None,
        }
    }

    fn into_parts(self) -> Vec<Self> {
        match self {
            Self::Joined(errors) => errors,
            other => vec![other],
        }
    }
}

/// Fold the result of a cleanup step into the outcome it ran after.
///
/// An in-flight error keeps priority; a cleanup error is appended to it
/// rather than overwriting it.
pub(crate) fn combine<T>(outcome: Result<T>, cleanup: Result<()>) -> Result<T> {
    match (outcome, cleanup) {
        (outcome, Ok(())) => outcome,
        (Ok(_), Err(cleanup)) => Err(cleanup),
        (Err(primary), Err(cleanup)) => Err(primary.join(cleanup)),
    }
}

fn join_lines(errors: &[HarnessError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close_error() -> HarnessError {
        HarnessError::CannotCloseFile {
            path: "trace.out".to_string(),
            source: io::Error::other("disk full"),
        }
    }

    #[test]
    fn should_keep_primary_error_first_when_joined() {
        let err = HarnessError::Workload(anyhow::anyhow!("bot crashed")).join(close_error());
        assert_eq!(
            err.kinds(),
            vec![ErrorKind::Workload, ErrorKind::CannotCloseFile]
        );
        let text = err.to_string();
        assert!(text.starts_with("bot crashed\n"));
        assert!(text.contains("cannot close file trace.out"));
    }

    #[test]
    fn should_flatten_nested_joins() {
        let err = HarnessError::CannotStartTrace("busy".to_string())
            .join(close_error())
            .join(HarnessError::InvalidProfile("bogus".to_string()).join(close_error()));
        match &err {
            HarnessError::Joined(errors) => assert_eq!(errors.len(), 4),
            other => panic!("expected joined error, got {other:?}"),
        }
    }

    #[test]
    fn should_report_wrapped_kind_for_dump_errors() {
        let err = HarnessError::Dump {
            kind: "heap".to_string(),
            source: Box::new(HarnessError::UnsafeOutputPath("../evil.pprof".to_string())),
        };
        assert!(err.has_kind(ErrorKind::UnsafeOutputPath));
        assert!(err.to_string().contains("heap"));
    }

    #[test]
    fn should_display_workload_error_verbatim() {
        let err = HarnessError::Workload(anyhow::anyhow!("missing Telegram API token"));
        assert_eq!(err.to_string(), "missing Telegram API token");
        assert!(err.workload_error().is_some());
    }

    #[test]
    fn should_combine_cleanup_with_outcome() {
        assert!(combine(Ok(1), Ok(())).is_ok());

        let cleanup_only = combine(Ok(1), Err(close_error())).unwrap_err();
        assert_eq!(cleanup_only.kinds(), vec![ErrorKind::CannotCloseFile]);

        let both = combine::<()>(
            Err(HarnessError::Workload(anyhow::anyhow!("boom"))),
            Err(close_error()),
        )
        .unwrap_err();
        assert_eq!(
            both.kinds(),
            vec![ErrorKind::Workload, ErrorKind::CannotCloseFile]
        );
    }
}
