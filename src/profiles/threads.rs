//! The `threads` profile: one sample per OS thread of this process.

use super::proto::ProfileBuilder;
use super::Profile;
use pprof::protos::Message;
use std::fs;
use std::io::{self, Write};
use std::path::Path;

const TASK_DIR: &str = "/proc/self/task";

#[derive(Debug, Default)]
pub struct ThreadsProfile;

impl Profile for ThreadsProfile {
    fn write_to(&self, w: &mut dyn Write) -> io::Result<()> {
        let mut builder = ProfileBuilder::new(&[("threads", "count")]);
        for (tid, name) in list_threads(Path::new(TASK_DIR))? {
            let labels = vec![
                builder.num_label("tid", tid),
                builder.text_label("thread", &name),
            ];
            builder.sample(vec![1], labels);
        }
        w.write_all(&builder.finish().encode_to_vec())
    }
}

/// Thread ids and names under a `/proc/<pid>/task` directory, sorted by id.
fn list_threads(task_dir: &Path) -> io::Result<Vec<(i64, String)>> {
    let mut threads = Vec::new();
    for entry in fs::read_dir(task_dir)? {
        let entry = entry?;
        let Some(tid) = entry.file_name().to_str().and_then(|s| s.parse::<i64>().ok()) else {
            continue;
        };
        // A thread may exit between listing and reading its name.
        let name = fs::read_to_string(entry.path().join("comm"))
            .map(|s| s.trim_end().to_string())
            .unwrap_or_default();
        threads.push((tid, name));
    }
    threads.sort_unstable();
    Ok(threads)
}
