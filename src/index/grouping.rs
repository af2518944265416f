//! Grouping Engine
//!
//! Partitions one batch of [`LogMessage`]s into groups keyed by
//! (index, value). A line lands in one group per index whose field it
//! carries, and, on indices with `split_values`, in one group per
//! comma-separated sub-value. Groups borrow from the batch and the index set;
//! nothing is copied and nothing touches the store.
//!
//! ```text
//! request_id=a,b user=u1 ─┬─> (request_id, a)
//!                         ├─> (request_id, b)
//!                         └─> (user, u1)
//! ```

use std::collections::HashMap;

use crate::index::conf::{IndexConf, IndexSet};
use crate::index::message::LogMessage;

/// Separator for multi-valued fields
pub const VALUE_SEPARATOR: char = ',';

/// Lines of one batch sharing an (index, value) pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Group<'a> {
    pub conf: &'a IndexConf,
    pub value: &'a str,
    /// Raw lines in batch arrival order
    pub lines: Vec<&'a [u8]>,
}

/// All groups of one batch
///
/// Iteration yields indices in configured order and, within an index, values
/// in the order they first appeared in the batch.
#[derive(Debug, Default)]
pub struct StorageGroup<'a> {
    groups: Vec<Group<'a>>,
}

impl<'a> StorageGroup<'a> {
    pub fn iter(&self) -> std::slice::Iter<'_, Group<'a>> {
        self.groups.iter()
    }

    /// Number of (index, value) groups
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Lines grouped under (`index`, `value`)
    pub fn get(&self, index: &str, value: &str) -> Option<&[&'a [u8]]> {
        self.groups
            .iter()
            .find(|g| g.conf.key == index && g.value == value)
            .map(|g| g.lines.as_slice())
    }
}

impl<'a> IntoIterator for StorageGroup<'a> {
    type Item = Group<'a>;
    type IntoIter = std::vec::IntoIter<Group<'a>>;

    fn into_iter(self) -> Self::IntoIter {
        self.groups.into_iter()
    }
}

/// Values a message contributes for `conf`
fn values_for<'a>(conf: &IndexConf, message: &'a LogMessage) -> Vec<&'a str> {
    let Some(value) = message.value(&conf.key) else {
        return Vec::new();
    };

    if !conf.split_values || !value.contains(VALUE_SEPARATOR) {
        return vec![value];
    }

    let mut values: Vec<&str> = Vec::new();
    for sub in value.split(VALUE_SEPARATOR).map(str::trim) {
        if !sub.is_empty() && !values.contains(&sub) {
            values.push(sub);
        }
    }
    values
}

/// Group a batch by configured index
pub fn build_groups<'a>(indices: &'a IndexSet, messages: &'a [LogMessage]) -> StorageGroup<'a> {
    let mut groups: Vec<Group<'a>> = Vec::new();

    for conf in indices {
        let mut positions: HashMap<&'a str, usize> = HashMap::new();

        for message in messages {
            for value in values_for(conf, message) {
                let idx = *positions.entry(value).or_insert_with(|| {
                    groups.push(Group {
                        conf,
                        value,
                        lines: Vec::new(),
                    });
                    groups.len() - 1
                });
                groups[idx].lines.push(&message.data);
            }
        }
    }

    StorageGroup { groups }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn message(line: &str) -> LogMessage {
        let pairs = line
            .split_whitespace()
            .filter_map(|kv| kv.split_once('='))
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        LogMessage::new(line, pairs)
    }

    fn indices(split: bool) -> IndexSet {
        IndexSet::new(vec![
            IndexConf::new("request_id", 2, Duration::from_secs(3600)).split_values(split),
            IndexConf::new("user", 2, Duration::from_secs(3600)),
        ])
        .unwrap()
    }

    #[test]
    fn test_one_group_per_distinct_value() {
        let indices = indices(true);
        let batch = vec![
            message("request_id=r1 n=1"),
            message("request_id=r2 n=2"),
            message("request_id=r1 n=3"),
        ];

        let groups = build_groups(&indices, &batch);
        assert_eq!(groups.len(), 2);
        assert_eq!(
            groups.get("request_id", "r1").unwrap(),
            &[b"request_id=r1 n=1".as_slice(), b"request_id=r1 n=3".as_slice()]
        );
        assert_eq!(
            groups.get("request_id", "r2").unwrap(),
            &[b"request_id=r2 n=2".as_slice()]
        );
    }

    #[test]
    fn test_line_lands_under_every_index() {
        let indices = indices(true);
        let batch = vec![message("request_id=r1 user=u1")];

        let groups = build_groups(&indices, &batch);
        assert_eq!(groups.len(), 2);
        assert!(groups.get("request_id", "r1").is_some());
        assert!(groups.get("user", "u1").is_some());
    }

    #[test]
    fn test_split_multi_valued_field() {
        let indices = indices(true);
        let batch = vec![message("request_id=a,b,c")];

        let groups = build_groups(&indices, &batch);
        assert_eq!(groups.len(), 3);
        for value in ["a", "b", "c"] {
            assert_eq!(
                groups.get("request_id", value).unwrap(),
                &[b"request_id=a,b,c".as_slice()]
            );
        }
    }

    #[test]
    fn test_split_disabled_keeps_whole_value() {
        let indices = indices(false);
        let batch = vec![message("request_id=a,b")];

        let groups = build_groups(&indices, &batch);
        assert_eq!(groups.len(), 1);
        assert!(groups.get("request_id", "a,b").is_some());
    }

    #[test]
    fn test_split_skips_empty_and_repeated_sub_values() {
        let indices = indices(true);
        let batch = vec![message("request_id=a,,a,b,")];

        let groups = build_groups(&indices, &batch);
        let values: Vec<&str> = groups.iter().map(|g| g.value).collect();
        assert_eq!(values, vec!["a", "b"]);
        assert_eq!(groups.get("request_id", "a").unwrap().len(), 1);
    }

    #[test]
    fn test_absent_and_empty_values_are_skipped() {
        let indices = indices(true);
        let batch = vec![message("at=info"), message("request_id= user=")];

        assert!(build_groups(&indices, &batch).is_empty());
    }

    #[test]
    fn test_iteration_order() {
        let indices = indices(true);
        let batch = vec![
            message("user=u1 request_id=r2"),
            message("request_id=r1"),
            message("request_id=r2"),
        ];

        let order: Vec<(&str, &str)> = build_groups(&indices, &batch)
            .iter()
            .map(|g| (g.conf.key.as_str(), g.value))
            .collect();
        assert_eq!(
            order,
            vec![("request_id", "r2"), ("request_id", "r1"), ("user", "u1")]
        );
    }
}
