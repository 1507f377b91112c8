//! Building counter-style pprof profiles.
//!
//! Samples carry values and labels but no locations, so the mapping,
//! location and function tables stay empty.

use pprof::protos::{Label, Profile, Sample, ValueType};
use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

/// Builds a [`Profile`], interning strings as it goes.
pub struct ProfileBuilder {
    profile: Profile,
    strings: HashMap<String, i64>,
}

impl ProfileBuilder {
    /// Start a profile with the given `(type, unit)` sample types.
    pub fn new(sample_types: &[(&str, &str)]) -> Self {
        let mut builder = Self {
            profile: Profile::default(),
            strings: HashMap::new(),
        };
        // Index 0 of the string table is always "".
        builder.intern("");
        for (kind, unit) in sample_types {
            let value_type = ValueType {
                ty: builder.intern(kind),
                unit: builder.intern(unit),
            };
            builder.profile.sample_type.push(value_type);
        }
        builder
    }

    /// Add a sample with one value per sample type.
    pub fn sample(&mut self, value: Vec<i64>, label: Vec<Label>) {
        self.profile.sample.push(Sample {
            value,
            label,
            ..Sample::default()
        });
    }

    pub fn text_label(&mut self, key: &str, value: &str) -> Label {
        Label {
            key: self.intern(key),
            str: self.intern(value),
            ..Label::default()
        }
    }

    pub fn num_label(&mut self, key: &str, num: i64) -> Label {
        Label {
            key: self.intern(key),
            num,
            ..Label::default()
        }
    }

    pub fn finish(mut self) -> Profile {
        self.profile.time_nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |d| i64::try_from(d.as_nanos()).unwrap_or(i64::MAX));
        self.profile
    }

    fn intern(&mut self, s: &str) -> i64 {
        if let Some(&index) = self.strings.get(s) {
            return index;
        }
        let index = self.profile.string_table.len() as i64;
        self.profile.string_table.push(s.to_string());
        self.strings.insert(s.to_string(), index);
        index
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pprof::protos::Message;

    #[test]
    fn should_start_string_table_with_empty_string() {
        let profile = ProfileBuilder::new(&[("threads", "count")]).finish();
        assert_eq!(profile.string_table[0], "");
        assert_eq!(profile.sample_type.len(), 1);
        assert_eq!(profile.string_table[profile.sample_type[0].ty as usize], "threads");
    }

    #[test]
    fn should_intern_repeated_strings_once() {
        let mut builder = ProfileBuilder::new(&[("alloc_objects", "count"), ("inuse_objects", "count")]);
        let a = builder.text_label("thread", "main");
        let b = builder.text_label("thread", "main");
        assert_eq!(a, b);

        let profile = builder.finish();
        let count = profile.string_table.iter().filter(|s| *s == "count").count();
        assert_eq!(count, 1);
    }

    #[test]
    fn should_store_text_label_in_string_table() {
        let mut builder = ProfileBuilder::new(&[("threads", "count")]);
        let label = builder.text_label("thread", "worker-1");
        builder.sample(vec![1], vec![label]);
        let profile = builder.finish();

        let label = &profile.sample[0].label[0];
        assert_eq!(profile.string_table[label.key as usize], "thread");
        assert_eq!(profile.string_table[label.str as usize], "worker-1");
        assert_eq!(label.num, 0);
        assert!(profile.sample[0].location_id.is_empty());
    }

    #[test]
    fn should_decode_what_it_encodes() {
        let mut builder = ProfileBuilder::new(&[("threads", "count")]);
        let label = builder.num_label("tid", 7);
        builder.sample(vec![1], vec![label]);
        let profile = builder.finish();

        let bytes = profile.encode_to_vec();
        let decoded = Profile::decode(bytes.as_slice()).unwrap();
        assert_eq!(decoded.sample[0].label[0].num, 7);
        assert!(decoded.time_nanos > 0);
    }
}
