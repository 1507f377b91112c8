//! Allocation counters and the `heap` profile.
//!
//! Counting only happens when [`TrackingAllocator`] is the global allocator:
//!
//! ```rust,no_run
//! use profiling_harness::TrackingAllocator;
//!
//! #[global_allocator]
//! static ALLOC: TrackingAllocator = TrackingAllocator;
//! ```
//!
//! Without it the profile is still written, with all counters at zero.

use super::proto::ProfileBuilder;
use super::Profile;
use pprof::protos::Message;
use std::alloc::{GlobalAlloc, Layout, System};
use std::io::{self, Write};
use std::sync::atomic::{AtomicU64, Ordering};

static ALLOC_OBJECTS: AtomicU64 = AtomicU64::new(0);
static ALLOC_BYTES: AtomicU64 = AtomicU64::new(0);
static FREE_OBJECTS: AtomicU64 = AtomicU64::new(0);
static FREE_BYTES: AtomicU64 = AtomicU64::new(0);

/// System allocator wrapper that counts allocations and frees.
#[derive(Debug, Clone, Copy, Default)]
pub struct TrackingAllocator;

fn record_alloc(size: usize) {
    ALLOC_OBJECTS.fetch_add(1, Ordering::Relaxed);
    ALLOC_BYTES.fetch_add(size as u64, Ordering::Relaxed);
}

fn record_free(size: usize) {
    FREE_OBJECTS.fetch_add(1, Ordering::Relaxed);
    FREE_BYTES.fetch_add(size as u64, Ordering::Relaxed);
}

unsafe impl GlobalAlloc for TrackingAllocator {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        let ptr = System.alloc(layout);
        if !ptr.is_null() {
            record_alloc(layout.size());
        }
        ptr
    }

    unsafe fn alloc_zeroed(&self, layout: Layout) -> *mut u8 {
        let ptr = System.alloc_zeroed(layout);
        if !ptr.is_null() {
            record_alloc(layout.size());
        }
        ptr
    }

    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        System.dealloc(ptr, layout);
        record_free(layout.size());
    }

    unsafe fn realloc(&self, ptr: *mut u8, layout: Layout, new_size: usize) -> *mut u8 {
        let new_ptr = System.realloc(ptr, layout, new_size);
        if !new_ptr.is_null() {
            record_free(layout.size());
            record_alloc(new_size);
        }
        new_ptr
    }
}

/// Point-in-time allocation counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HeapStats {
    pub alloc_objects: u64,
    pub alloc_bytes: u64,
    pub inuse_objects: u64,
    pub inuse_bytes: u64,
}

impl HeapStats {
    /// Read the current counters.
    pub fn snapshot() -> Self {
        let alloc_objects = ALLOC_OBJECTS.load(Ordering::Relaxed);
        let alloc_bytes = ALLOC_BYTES.load(Ordering::Relaxed);
        Self {
            alloc_objects,
            alloc_bytes,
            inuse_objects: alloc_objects.saturating_sub(FREE_OBJECTS.load(Ordering::Relaxed)),
            inuse_bytes: alloc_bytes.saturating_sub(FREE_BYTES.load(Ordering::Relaxed)),
        }
    }
}

/// The `heap` profile: one sample with allocated and in-use counts.
#[derive(Debug, Default)]
pub struct HeapProfile;

impl Profile for HeapProfile {
    fn write_to(&self, w: &mut dyn Write) -> io::Result<()> {
        let stats = HeapStats::snapshot();
        let mut builder = ProfileBuilder::new(&[
            ("alloc_objects", "count"),
            ("alloc_space", "bytes"),
            ("inuse_objects", "count"),
            ("inuse_space", "bytes"),
        ]);
        let values = [
            stats.alloc_objects,
            stats.alloc_bytes,
            stats.inuse_objects,
            stats.inuse_bytes,
        ]
        .iter()
        .map(|&v| i64::try_from(v).unwrap_or(i64::MAX))
        .collect();
        builder.sample(values, Vec::new());
        w.write_all(&builder.finish().encode_to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_count_allocations_through_tracking_allocator() {
        let alloc = TrackingAllocator;
        let before = HeapStats::snapshot();

        let layout = Layout::from_size_align(64, 8).unwrap();
        unsafe {
            let ptr = alloc.alloc(layout);
            assert!(!ptr.is_null());
            let ptr = alloc.realloc(ptr, layout, 128);
            assert!(!ptr.is_null());
            alloc.dealloc(ptr, Layout::from_size_align(128, 8).unwrap());
        }

        let after = HeapStats::snapshot();
        assert!(after.alloc_objects >= before.alloc_objects + 2);
        assert!(after.alloc_bytes >= before.alloc_bytes + 192);
    }

    #[test]
    fn should_write_four_sample_types() {
        let mut buf = Vec::new();
        HeapProfile.write_to(&mut buf).unwrap();

        let decoded = pprof::protos::Profile::decode(buf.as_slice()).unwrap();
        assert_eq!(decoded.sample_type.len(), 4);
        assert_eq!(decoded.sample.len(), 1);
        assert_eq!(decoded.sample[0].value.len(), 4);
        assert!(decoded.string_table.iter().any(|s| s == "inuse_space"));
    }
}
