//! Registry of named runtime profiles.
//!
//! A profile is a snapshot of some process-internal state identified by name.
//! The set of names is open: built-in profiles are registered on first use and
//! applications may add their own with [`register`]. Callers should enumerate
//! it with [`names`] rather than assume a fixed list.
//!
//! Built-in profiles:
//! - `heap`: allocation counters (see [`TrackingAllocator`])
//! - `threads`: one sample per OS thread (Linux only)

mod heap;
pub(crate) mod proto;
#[cfg(target_os = "linux")]
mod threads;

pub use heap::{HeapProfile, HeapStats, TrackingAllocator};
#[cfg(target_os = "linux")]
pub use threads::ThreadsProfile;

use std::collections::BTreeMap;
use std::io::{self, Write};
use std::sync::{Arc, OnceLock, PoisonError, RwLock};

/// A named source of profile snapshots.
pub trait Profile: Send + Sync {
    /// Write a snapshot of the profile's current data.
    ///
    /// Must not mutate the underlying state; snapshots are taken while the
    /// process keeps running.
    fn write_to(&self, w: &mut dyn Write) -> io::Result<()>;
}

type Registry = BTreeMap<String, Arc<dyn Profile>>;

fn registry() -> &'static RwLock<Registry> {
    static REGISTRY: OnceLock<RwLock<Registry>> = OnceLock::new();
    REGISTRY.get_or_init(|| {
        let mut builtin: Registry = BTreeMap::new();
        builtin.insert("heap".to_string(), Arc::new(HeapProfile));
        #[cfg(target_os = "linux")]
        builtin.insert("threads".to_string(), Arc::new(ThreadsProfile));
        RwLock::new(builtin)
    })
}

/// Register `profile` under `name`.
///
/// Returns `false` and leaves the registry unchanged if `name` is taken.
pub fn register(name: impl Into<String>, profile: impl Profile + 'static) -> bool {
    let mut profiles = registry().write().unwrap_or_else(PoisonError::into_inner);
    let name = name.into();
    if profiles.contains_key(&name) {
        return false;
    }
    profiles.insert(name, Arc::new(profile));
    true
}

/// Look up a profile by name.
pub fn lookup(name: &str) -> Option<Arc<dyn Profile>> {
    let profiles = registry().read().unwrap_or_else(PoisonError::into_inner);
    profiles.get(name).cloned()
}

/// Names of all registered profiles, sorted.
pub fn names() -> Vec<String> {
    let profiles = registry().read().unwrap_or_else(PoisonError::into_inner);
    profiles.keys().cloned().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(&'static [u8]);

    impl Profile for Fixed {
        fn write_to(&self, w: &mut dyn Write) -> io::Result<()> {
            w.write_all(self.0)
        }
    }

    #[test]
    fn should_include_builtin_profiles() {
        let names = names();
        assert!(names.contains(&"heap".to_string()));
        #[cfg(target_os = "linux")]
        assert!(names.contains(&"threads".to_string()));
    }

    #[test]
    fn should_register_and_lookup_custom_profile() {
        assert!(register("registry_test_custom", Fixed(b"custom")));
        assert!(names().contains(&"registry_test_custom".to_string()));

        let mut buf = Vec::new();
        lookup("registry_test_custom")
            .unwrap()
            .write_to(&mut buf)
            .unwrap();
        assert_eq!(buf, b"custom");
    }

    #[test]
    fn should_refuse_duplicate_names() {
        assert!(!register("heap", Fixed(b"impostor")));

        let mut buf = Vec::new();
        lookup("heap").unwrap().write_to(&mut buf).unwrap();
        assert_ne!(buf, b"impostor");
    }

    #[test]
    fn should_return_none_for_unknown_profile() {
        assert!(lookup("goroutine").is_none());
    }
}
