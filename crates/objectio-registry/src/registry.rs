//! Location registry: `(bucket, key, version_id) -> LocationRecord`,
//! authoritatively stored as objects in the reserved registry bucket and
//! fronted by an LRU+TTL cache.

use crate::cache::{CacheMetrics, RegistryCache};
use crate::record::{LocationRecord, REGISTRY_BUCKET};
use objectio_common::{DeploymentId, Error, Result, VersionId};
use objectio_storage::ObjectSet;
use std::sync::Arc;
use std::time::Duration;

pub struct LocationRegistry {
    set: Arc<ObjectSet>,
    deployment_id: DeploymentId,
    cache: RegistryCache,
}

impl LocationRegistry {
    #[must_use]
    pub fn new(
        set: Arc<ObjectSet>,
        deployment_id: DeploymentId,
        cache_capacity: usize,
        cache_ttl: Duration,
    ) -> Self {
        Self {
            set,
            deployment_id,
            cache: RegistryCache::new(cache_capacity, cache_ttl),
        }
    }

    pub fn record(
        &self,
        bucket: &str,
        key: &str,
        version_id: &VersionId,
        record: LocationRecord,
    ) -> Result<()> {
        let reg_key = LocationRecord::registry_key(bucket, key, version_id);
        let json = record.to_json()?;
        self.set.put(
            self.deployment_id,
            REGISTRY_BUCKET,
            &reg_key,
            "application/json".into(),
            Default::default(),
            &json,
        )?;
        self.cache.put(reg_key, record);
        Ok(())
    }

    pub fn lookup(
        &self,
        bucket: &str,
        key: &str,
        version_id: &VersionId,
    ) -> Result<LocationRecord> {
        let reg_key = LocationRecord::registry_key(bucket, key, version_id);
        if let Some(rec) = self.cache.get(&reg_key) {
            return Ok(rec);
        }

        let data = self
            .set
            .get_latest(self.deployment_id, REGISTRY_BUCKET, &reg_key)
            .map_err(|e| match e {
                Error::NotFound { .. } => Error::not_found(bucket, key),
                other => other,
            })?;
        let record = LocationRecord::from_json(&data)?;
        self.cache.put(reg_key, record.clone());
        Ok(record)
    }

    pub fn delete(&self, bucket: &str, key: &str, version_id: &VersionId) -> Result<()> {
        let reg_key = LocationRecord::registry_key(bucket, key, version_id);
        self.set
            .delete(self.deployment_id, REGISTRY_BUCKET, &reg_key)?;
        self.cache.invalidate(&reg_key);
        Ok(())
    }

    /// Record many locations in parallel. Not atomic: the count of
    /// successes is returned and partial failures do not roll back
    /// earlier successes.
    #[must_use]
    pub fn record_batch(&self, records: Vec<(String, String, VersionId, LocationRecord)>) -> usize {
        std::thread::scope(|scope| {
            let handles: Vec<_> = records
                .into_iter()
                .map(|(bucket, key, version_id, record)| {
                    scope.spawn(move || self.record(&bucket, &key, &version_id, record).is_ok())
                })
                .collect();
            handles
                .into_iter()
                .map(|h| h.join().unwrap())
                .filter(|ok| *ok)
                .count()
        })
    }

    /// Look up many keys in parallel. Each slot is `None` if the record
    /// was not found or the lookup failed.
    #[must_use]
    pub fn lookup_batch(
        &self,
        keys: Vec<(String, String, VersionId)>,
    ) -> Vec<Option<LocationRecord>> {
        std::thread::scope(|scope| {
            let handles: Vec<_> = keys
                .into_iter()
                .map(|(bucket, key, version_id)| {
                    scope.spawn(move || self.lookup(&bucket, &key, &version_id).ok())
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        })
    }

    #[must_use]
    pub fn cache_metrics(&self) -> CacheMetrics {
        self.cache.metrics()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use objectio_common::{DiskId, ErasureConfig};
    use objectio_storage::{DiskIo, LocalDiskIo};
    use std::time::Duration;

    fn make_registry() -> (LocationRegistry, Vec<tempfile::TempDir>) {
        let ec = ErasureConfig::new(4, 2);
        let mut dirs = Vec::new();
        let mut disks: Vec<Arc<dyn DiskIo>> = Vec::new();
        for _ in 0..ec.total_chunks() {
            let dir = tempfile::tempdir().unwrap();
            disks.push(Arc::new(LocalDiskIo::new(DiskId::new(), dir.path()).unwrap()));
            dirs.push(dir);
        }
        let set = Arc::new(ObjectSet::new(disks, ec, 1_000_000).unwrap());
        let dep = DeploymentId::new();
        (
            LocationRegistry::new(set, dep, 1000, Duration::from_secs(300)),
            dirs,
        )
    }

    #[test]
    fn test_record_then_lookup_hits_cache() {
        let (registry, _dirs) = make_registry();
        let version_id = VersionId::new();
        let record = LocationRecord {
            bucket: "photos".into(),
            key: "cat.jpg".into(),
            version_id,
            pool_index: 0,
            set_index: 2,
            disk_count: 6,
            disk_indices: vec![0, 1, 2, 3, 4, 5],
            generation: 7,
            mod_time_unix_ms: 0,
            size: 10,
        };
        registry
            .record("photos", "cat.jpg", &version_id, record.clone())
            .unwrap();
        let found = registry.lookup("photos", "cat.jpg", &version_id).unwrap();
        assert_eq!(found, record);
    }

    #[test]
    fn test_lookup_missing_is_not_found() {
        let (registry, _dirs) = make_registry();
        let err = registry.lookup("photos", "missing.jpg", &VersionId::new());
        assert!(err.is_err());
    }

    #[test]
    fn test_delete_then_lookup_forces_miss() {
        let (registry, _dirs) = make_registry();
        let version_id = VersionId::new();
        let record = LocationRecord {
            bucket: "b".into(),
            key: "k".into(),
            version_id,
            pool_index: 0,
            set_index: 0,
            disk_count: 6,
            disk_indices: vec![0, 1, 2, 3, 4, 5],
            generation: 1,
            mod_time_unix_ms: 0,
            size: 4,
        };
        registry.record("b", "k", &version_id, record).unwrap();
        registry.delete("b", "k", &version_id).unwrap();
        assert!(registry.lookup("b", "k", &version_id).is_err());
    }

    #[test]
    fn test_batch_record_and_lookup() {
        let (registry, _dirs) = make_registry();
        let records: Vec<_> = (0..5)
            .map(|i| {
                let vid = VersionId::new();
                (
                    "b".to_string(),
                    format!("k{i}"),
                    vid,
                    LocationRecord {
                        bucket: "b".into(),
                        key: format!("k{i}"),
                        version_id: vid,
                        pool_index: 0,
                        set_index: 0,
                        disk_count: 6,
                        disk_indices: vec![0, 1, 2, 3, 4, 5],
                        generation: 1,
                        mod_time_unix_ms: 0,
                        size: 1,
                    },
                )
            })
            .collect();
        let keys: Vec<_> = records
            .iter()
            .map(|(b, k, v, _)| (b.clone(), k.clone(), *v))
            .collect();

        let succeeded = registry.record_batch(records);
        assert_eq!(succeeded, 5);

        let found = registry.lookup_batch(keys);
        assert!(found.iter().all(Option::is_some));
    }
}
