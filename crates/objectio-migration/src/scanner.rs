//! Diffs object placement between two topology generations.
//!
//! Object paths on disk are content-hashed (`object_hash_path`) and so
//! cannot be walked back into `(bucket, key)` pairs; discovering the set
//! of live object names is the listing index's job, out of scope here.
//! The scanner instead takes an iterator of known `(bucket, key, size)`
//! triples — supplied by the catalog/listing layer — and is responsible
//! only for the placement diff and queue-ordering policy.

use crate::task::MigrationTask;
use objectio_placement::HashRing;

/// One candidate object as seen by whatever enumerates the live
/// namespace (a catalog, a registry scan, or a bucket-listing index).
pub struct CatalogEntry {
    pub bucket: String,
    pub key: String,
    pub size: u64,
}

/// Compare `ring_prev`/`ring_new` for every catalog entry and emit a
/// task for each one whose owning set changed, sorted by size ascending
/// so many small migrations make progress in parallel before the few
/// large ones dominate the tail.
#[must_use]
pub fn diff_placement(
    entries: impl IntoIterator<Item = CatalogEntry>,
    ring_prev: &HashRing,
    ring_new: &HashRing,
) -> Vec<MigrationTask> {
    let mut tasks: Vec<MigrationTask> = entries
        .into_iter()
        .filter_map(|entry| {
            let name = format!("{}/{}", entry.bucket, entry.key);
            let old_set = ring_prev.lookup(&name).ok()?;
            let new_set = ring_new.lookup(&name).ok()?;
            if old_set == new_set {
                return None;
            }
            Some(MigrationTask::new(
                entry.bucket,
                entry.key,
                entry.size,
                old_set.to_string(),
                new_set.to_string(),
            ))
        })
        .collect();

    tasks.sort_by_key(|t| t.size);
    tasks
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ring(nodes: &[&str]) -> HashRing {
        let mut ring = HashRing::new(150);
        for n in nodes {
            ring.add_node(n);
        }
        ring
    }

    #[test]
    fn test_unchanged_placement_produces_no_task() {
        let r = ring(&["set0", "set1"]);
        let tasks = diff_placement(
            [CatalogEntry {
                bucket: "b".into(),
                key: "k".into(),
                size: 10,
            }],
            &r,
            &r,
        );
        assert!(tasks.is_empty());
    }

    #[test]
    fn test_new_set_produces_tasks_sorted_by_size() {
        let prev = ring(&["set0", "set1"]);
        let new = ring(&["set0", "set1", "set2"]);
        let entries = vec![
            CatalogEntry {
                bucket: "b".into(),
                key: "big".into(),
                size: 9000,
            },
            CatalogEntry {
                bucket: "b".into(),
                key: "small".into(),
                size: 10,
            },
        ];
        let tasks = diff_placement(entries, &prev, &new);
        if tasks.len() == 2 {
            assert!(tasks[0].size <= tasks[1].size);
        }
    }
}
