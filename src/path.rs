//! Output filename validation.
//!
//! Every artifact name comes from configuration, so it is checked before the
//! filesystem is touched. A safe name is a single relative path segment.

use std::path::{Component, Path, MAIN_SEPARATOR};

/// Lexically clean `name` and return it if it is safe to create.
///
/// `.` segments are dropped and `..` segments cancel the segment before them,
/// without consulting the filesystem. The cleaned name is rejected when it is
/// empty or `.`, absolute, starts with `..`, or still spans more than one
/// segment.
pub fn sanitize(name: &str) -> Option<String> {
    let path = Path::new(name);
    if name.is_empty() || path.has_root() || path.is_absolute() {
        return None;
    }

    let mut segments: Vec<&str> = Vec::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match segments.last() {
                Some(&last) if last != ".." => {
                    segments.pop();
                }
                _ => segments.push(".."),
            },
            Component::Normal(segment) => segments.push(segment.to_str()?),
            Component::RootDir | Component::Prefix(_) => return None,
        }
    }

    let cleaned = segments.join(&MAIN_SEPARATOR.to_string());
    if cleaned.is_empty() || cleaned.starts_with("..") || cleaned.contains(MAIN_SEPARATOR) {
        return None;
    }
    Some(cleaned)
}

/// Whether `name` is safe to use as an output filename.
pub fn is_safe_filename(name: &str) -> bool {
    sanitize(name).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_accept_plain_names() {
        assert!(is_safe_filename("trace.out"));
        assert!(is_safe_filename("cpu.pprof"));
        assert!(is_safe_filename(".hidden"));
    }

    #[test]
    fn should_reject_empty_and_dot() {
        assert!(!is_safe_filename(""));
        assert!(!is_safe_filename("."));
        assert!(!is_safe_filename("./"));
        assert!(!is_safe_filename("a/.."));
    }

    #[test]
    fn should_reject_traversal() {
        assert!(!is_safe_filename(".."));
        assert!(!is_safe_filename("../evil.pprof"));
        assert!(!is_safe_filename("..evil"));
        assert!(!is_safe_filename("a/../../evil"));
    }

    #[cfg(unix)]
    #[test]
    fn should_reject_absolute_and_nested() {
        assert!(!is_safe_filename("/etc/passwd"));
        assert!(!is_safe_filename("out/trace.out"));
    }

    #[test]
    fn should_return_cleaned_name() {
        assert_eq!(sanitize("./heap.pprof").as_deref(), Some("heap.pprof"));
        assert_eq!(sanitize("a/../b.pprof").as_deref(), Some("b.pprof"));
    }
}
