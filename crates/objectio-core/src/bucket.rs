//! Deployment-wide bucket catalog, quorum-persisted the same way the
//! topology is (§4.6's protocol, applied to a simpler value).

use objectio_common::{BucketName, Error, Result};
use objectio_storage::DiskIo;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;

const BUCKETS_REL_PATH: &str = "buckets.json";

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
struct BucketsFile {
    buckets: BTreeSet<String>,
}

pub struct BucketCatalog {
    disks: Vec<Arc<dyn DiskIo>>,
    buckets: RwLock<BTreeSet<String>>,
}

impl BucketCatalog {
    pub fn load(disks: Vec<Arc<dyn DiskIo>>) -> Self {
        let mut votes: std::collections::HashMap<String, usize> = std::collections::HashMap::new();
        for disk in &disks {
            if let Ok(data) = disk.read(Path::new(BUCKETS_REL_PATH)) {
                if let Ok(file) = serde_json::from_slice::<BucketsFile>(&data) {
                    let key = serde_json::to_string(&file).unwrap_or_default();
                    *votes.entry(key).or_insert(0) += 1;
                }
            }
        }
        let required = disks.len() / 2 + 1;
        let winning = votes
            .into_iter()
            .find(|(_, count)| *count >= required)
            .and_then(|(key, _)| serde_json::from_str::<BucketsFile>(&key).ok())
            .unwrap_or_default();

        Self {
            disks,
            buckets: RwLock::new(winning.buckets),
        }
    }

    #[must_use]
    pub fn exists(&self, name: &str) -> bool {
        self.buckets.read().contains(name)
    }

    #[must_use]
    pub fn list(&self) -> Vec<String> {
        self.buckets.read().iter().cloned().collect()
    }

    pub fn create(&self, name: &str) -> Result<()> {
        BucketName::new(name)?;
        if self.exists(name) {
            return Err(Error::BucketExists(name.to_string()));
        }
        let mut next = self.buckets.read().clone();
        next.insert(name.to_string());
        self.persist(&next)?;
        *self.buckets.write() = next;
        Ok(())
    }

    pub fn delete(&self, name: &str) -> Result<()> {
        if !self.exists(name) {
            return Err(Error::BucketNotFound(name.to_string()));
        }
        let mut next = self.buckets.read().clone();
        next.remove(name);
        self.persist(&next)?;
        *self.buckets.write() = next;
        Ok(())
    }

    fn persist(&self, buckets: &BTreeSet<String>) -> Result<()> {
        let file = BucketsFile {
            buckets: buckets.clone(),
        };
        let json = serde_json::to_vec_pretty(&file)?;
        let rel = Path::new(BUCKETS_REL_PATH);

        let staged: Vec<Option<std::path::PathBuf>> = std::thread::scope(|scope| {
            let handles: Vec<_> = self
                .disks
                .iter()
                .map(|disk| {
                    let json = &json;
                    scope.spawn(move || disk.stage(rel, json).ok())
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        let succeeded: Vec<(usize, &std::path::PathBuf)> = staged
            .iter()
            .enumerate()
            .filter_map(|(i, p)| p.as_ref().map(|p| (i, p)))
            .collect();

        let required = self.disks.len() / 2 + 1;
        if succeeded.len() < required {
            for (i, p) in &succeeded {
                let _ = self.disks[*i].abort_stage(p);
            }
            return Err(Error::QuorumUnavailable {
                available: succeeded.len(),
                required,
            });
        }

        std::thread::scope(|scope| {
            for (i, p) in &succeeded {
                let disk = &self.disks[*i];
                scope.spawn(move || {
                    let _ = disk.commit(p, rel);
                });
            }
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use objectio_storage::LocalDiskIo;
    use objectio_common::DiskId;

    fn disks(n: usize) -> (Vec<Arc<dyn DiskIo>>, Vec<tempfile::TempDir>) {
        let mut disks: Vec<Arc<dyn DiskIo>> = Vec::new();
        let mut dirs = Vec::new();
        for _ in 0..n {
            let dir = tempfile::tempdir().unwrap();
            disks.push(Arc::new(LocalDiskIo::new(DiskId::new(), dir.path()).unwrap()));
            dirs.push(dir);
        }
        (disks, dirs)
    }

    #[test]
    fn test_create_list_delete() {
        let (disks, _dirs) = disks(3);
        let catalog = BucketCatalog::load(disks.clone());
        catalog.create("photos").unwrap();
        assert_eq!(catalog.list(), vec!["photos".to_string()]);

        let reloaded = BucketCatalog::load(disks);
        assert!(reloaded.exists("photos"));

        catalog.delete("photos").unwrap();
        assert!(catalog.list().is_empty());
    }

    #[test]
    fn test_create_duplicate_errors() {
        let (disks, _dirs) = disks(3);
        let catalog = BucketCatalog::load(disks);
        catalog.create("photos").unwrap();
        assert!(catalog.create("photos").is_err());
    }
}
