//! Configuration for the profiling harness.

use log::debug;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::{Path, PathBuf};

/// Value that switches a flag on. Anything else, including an empty
/// string, leaves the flag off.
pub const ENABLED: &str = "1";

/// Trace output name when `TRACE_FILE` is unset.
pub const DEFAULT_TRACE_FILE: &str = "trace.out";

/// CPU profile output name when `PROFILE_CPU_FILE` is unset.
pub const DEFAULT_CPU_PROFILE_FILE: &str = "cpu.pprof";

/// CPU sampling frequency in Hz when `PROFILE_CPU_HZ` is unset.
pub const DEFAULT_CPU_FREQUENCY: i32 = 100;

/// Key/value lookup the harness reads its options from.
pub trait ConfigSource {
    /// Return the value for `key`, or `None` when it is not set.
    fn lookup(&self, key: &str) -> Option<String>;
}

/// Reads options from the process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct Env;

impl ConfigSource for Env {
    fn lookup(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

impl ConfigSource for HashMap<String, String> {
    fn lookup(&self, key: &str) -> Option<String> {
        self.get(key).cloned()
    }
}

impl ConfigSource for BTreeMap<String, String> {
    fn lookup(&self, key: &str) -> Option<String> {
        self.get(key).cloned()
    }
}

/// Environment key that enables dumping profile `kind`, e.g. `PROFILE_HEAP`.
pub fn profile_key(kind: &str) -> String {
    format!("PROFILE_{}", kind.to_uppercase())
}

/// Resolved harness configuration.
///
/// Supported variables:
/// - `TRACE`, `TRACE_FILE`: execution trace (default file `trace.out`)
/// - `PROFILE_CPU`, `PROFILE_CPU_FILE`: CPU profile (default file `cpu.pprof`)
/// - `PROFILE_<NAME>`, `PROFILE_<NAME>_FILE`: named profile dump
///   (default file `<name>.pprof`)
/// - `PROFILE_CPU_HZ`: CPU sampling frequency (default: 100)
///
/// Artifacts are written to the current directory. Only the embedding
/// program can move them, through [`HarnessConfig::output_dir`]; the
/// environment can name files but never the directory they land in.
pub struct HarnessConfig {
    source: Box<dyn ConfigSource>,
    output_dir: PathBuf,
    cpu_frequency: i32,
}

impl HarnessConfig {
    /// Read configuration from the process environment.
    pub fn from_env() -> Self {
        Self::from_source(Env)
    }

    /// Read configuration from an arbitrary source.
    pub fn from_source(source: impl ConfigSource + 'static) -> Self {
        let mut cfg = Self {
            source: Box::new(source),
            output_dir: PathBuf::from("."),
            cpu_frequency: DEFAULT_CPU_FREQUENCY,
        };

        if let Some(v) = cfg.value("PROFILE_CPU_HZ") {
            match v.parse::<i32>() {
                Ok(hz) if hz > 0 => cfg.cpu_frequency = hz,
                _ => debug!("Ignoring invalid PROFILE_CPU_HZ value {v:?}"),
            }
        }

        cfg
    }

    /// Set the directory artifacts are written to.
    pub fn output_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.output_dir = path.into();
        self
    }

    /// Set the CPU sampling frequency in Hz.
    pub fn cpu_frequency(mut self, hz: i32) -> Self {
        self.cpu_frequency = hz;
        self
    }

    /// Directory artifacts are written to.
    pub fn dir(&self) -> &Path {
        &self.output_dir
    }

    /// CPU sampling frequency in Hz.
    pub fn frequency(&self) -> i32 {
        self.cpu_frequency
    }

    /// Trace output name, if tracing is enabled.
    pub fn trace_file(&self) -> Option<String> {
        self.enabled_file("TRACE", DEFAULT_TRACE_FILE)
    }

    /// CPU profile output name, if CPU profiling is enabled.
    pub fn cpu_profile_file(&self) -> Option<String> {
        self.enabled_file("PROFILE_CPU", DEFAULT_CPU_PROFILE_FILE)
    }

    /// Output name for profile `kind`, if dumping it is enabled.
    pub fn profile_file(&self, kind: &str) -> Option<String> {
        self.enabled_file(&profile_key(kind), &format!("{kind}.pprof"))
    }

    fn value(&self, key: &str) -> Option<String> {
        self.source.lookup(key)
    }

    fn enabled_file(&self, flag: &str, default: &str) -> Option<String> {
        if self.value(flag).as_deref() != Some(ENABLED) {
            return None;
        }

        let key = format!("{flag}_FILE");
        match self.value(&key) {
            Some(name) if !name.is_empty() => Some(name),
            _ => {
                debug!("{key} not set, using default {default:?}");
                Some(default.to_string())
            }
        }
    }
}

impl fmt::Debug for HarnessConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HarnessConfig")
            .field("output_dir", &self.output_dir)
            .field("cpu_frequency", &self.cpu_frequency)
            .finish_non_exhaustive()
    }
}
