//! Run report for a successful harness invocation.

use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::path::Path;
use std::time::Duration;

/// Artifact kind recorded for the execution trace.
pub const TRACE_ARTIFACT: &str = "trace";

/// Artifact kind recorded for the CPU profile.
pub const CPU_ARTIFACT: &str = "cpu";

/// One file written during a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    /// `trace`, `cpu`, or the name of the dumped profile
    pub kind: String,
    /// File name relative to the output directory
    pub file: String,
    /// Bytes written
    pub bytes: u64,
}

impl Artifact {
    pub fn new(kind: impl Into<String>, file: impl Into<String>, bytes: u64) -> Self {
        Self {
            kind: kind.into(),
            file: file.into(),
            bytes,
        }
    }
}

/// What a successful run produced.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    /// Wall-clock time spent inside the workload
    #[serde(with = "duration_serde")]
    pub workload_duration: Duration,
    /// Files written, in the order they were completed
    #[serde(default)]
    pub artifacts: Vec<Artifact>,
}

impl RunReport {
    /// Find the artifact written for `kind`.
    pub fn artifact(&self, kind: &str) -> Option<&Artifact> {
        self.artifacts.iter().find(|a| a.kind == kind)
    }

    /// Load a report from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    }

    /// Write the report as pretty-printed JSON, creating parent directories.
    pub fn write_json(&self, path: impl AsRef<Path>) -> std::io::Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(path, json)
    }

    /// Human-readable summary, one line per artifact.
    pub fn summary(&self) -> String {
        let mut out = format!("workload finished in {}", format_duration(self.workload_duration));
        if self.artifacts.is_empty() {
            out.push_str(", no profiles written");
        }
        for a in &self.artifacts {
            let _ = write!(out, "\n  {:<8} {} ({})", a.kind, a.file, format_bytes(a.bytes));
        }
        out
    }
}

fn format_duration(d: Duration) -> String {
    if d.as_secs() > 0 {
        format!("{:.2}s", d.as_secs_f64())
    } else if d.as_millis() > 0 {
        format!("{:.2}ms", d.as_secs_f64() * 1000.0)
    } else {
        format!("{:.2}µs", d.as_secs_f64() * 1_000_000.0)
    }
}

fn format_bytes(bytes: u64) -> String {
    let b = bytes as f64;
    if b >= 1_000_000.0 {
        format!("{:.2} MB", b / 1_000_000.0)
    } else if b >= 1_000.0 {
        format!("{:.2} KB", b / 1_000.0)
    } else {
        format!("{bytes} B")
    }
}

mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        d.as_nanos().serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let nanos = u128::deserialize(d)?;
        Ok(Duration::from_nanos(nanos as u64))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> RunReport {
        RunReport {
            workload_duration: Duration::from_millis(1500),
            artifacts: vec![
                Artifact::new(TRACE_ARTIFACT, "trace.out", 2_048),
                Artifact::new("heap", "heap.pprof", 312),
            ],
        }
    }

    #[test]
    fn should_format_duration_in_appropriate_units() {
        assert!(format_duration(Duration::from_secs(2)).ends_with('s'));
        assert!(format_duration(Duration::from_millis(500)).contains("ms"));
        assert!(format_duration(Duration::from_micros(100)).contains("µs"));
    }

    #[test]
    fn should_list_artifacts_in_summary() {
        let summary = sample().summary();
        assert!(summary.starts_with("workload finished in 1.50s"));
        assert!(summary.contains("trace.out (2.05 KB)"));
        assert!(summary.contains("heap.pprof (312 B)"));

        assert!(RunReport::default().summary().contains("no profiles written"));
    }

    #[test]
    fn should_find_artifact_by_kind() {
        let report = sample();
        assert_eq!(report.artifact("heap").map(|a| a.bytes), Some(312));
        assert!(report.artifact(CPU_ARTIFACT).is_none());
    }

    #[test]
    fn should_write_json_that_loads_back() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("reports").join("run.json");

        sample().write_json(&path).unwrap();
        let loaded = RunReport::load(&path).unwrap();
        assert_eq!(loaded, sample());
    }
}
