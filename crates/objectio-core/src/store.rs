//! `ObjectStore`: the surface a transport layer calls, wiring
//! placement, topology, storage and the registry together.

use crate::bucket::BucketCatalog;
use objectio_common::{DeploymentId, Error, Result, VersionId};
use objectio_placement::HashRing;
use objectio_registry::{LocationRecord, LocationRegistry};
use objectio_storage::ObjectSet;
use objectio_topology::TopologyManager;
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

#[derive(Clone, Debug)]
pub struct ObjectMetadata {
    pub version_id: VersionId,
    pub etag: String,
    pub size: u64,
    pub content_type: String,
    pub user_meta: BTreeMap<String, String>,
    pub mod_time_unix_ms: i64,
    pub delete_marker: bool,
}

#[derive(Clone, Debug)]
pub struct PutResult {
    pub version_id: VersionId,
    pub etag: String,
}

#[derive(Clone, Debug)]
pub struct GetResult {
    pub body: Vec<u8>,
    pub metadata: ObjectMetadata,
}

#[derive(Clone, Debug)]
pub struct DeleteResult {
    pub delete_marker_version_id: VersionId,
}

#[derive(Clone, Debug)]
pub struct ListEntry {
    pub key: String,
    pub version_id: VersionId,
}

#[derive(Clone, Debug)]
pub struct ListResult {
    pub entries: Vec<ListEntry>,
    pub next_marker: Option<String>,
}

/// The upstream contract the transport layer calls. A synchronous
/// interface; adapting it to an async or event-loop transport is the
/// transport's job, not the core's (§9).
pub trait ObjectStore {
    fn put(
        &self,
        bucket: &str,
        key: &str,
        body: &[u8],
        content_type: String,
        user_meta: BTreeMap<String, String>,
    ) -> Result<PutResult>;

    fn get(&self, bucket: &str, key: &str, version: Option<&VersionId>) -> Result<GetResult>;

    fn delete(&self, bucket: &str, key: &str, version: Option<&VersionId>) -> Result<DeleteResult>;

    fn head(&self, bucket: &str, key: &str, version: Option<&VersionId>) -> Result<ObjectMetadata>;

    fn list(&self, bucket: &str, prefix: &str, marker: Option<&str>, max_keys: usize) -> Result<ListResult>;

    fn create_bucket(&self, name: &str) -> Result<()>;

    fn delete_bucket(&self, name: &str) -> Result<()>;

    fn list_buckets(&self) -> Vec<String>;
}

fn parse_ring_key(ring_key: &str) -> Option<(u32, u32)> {
    let (pool, set) = ring_key.split_once('/')?;
    let pool_index: u32 = pool.strip_prefix("pool")?.parse().ok()?;
    let set_index: u32 = set.strip_prefix("set")?.parse().ok()?;
    Some((pool_index, set_index))
}

/// Wires the placement ring, topology, per-set storage, and location
/// registry into one `ObjectStore` implementation.
///
/// Listing is backed by an in-memory per-bucket key index rather than a
/// durable catalog: object paths on disk are content-hashed and cannot
/// be walked back into `(bucket, key)` pairs, so a real deployment needs
/// a separate durable listing index. That index is out of scope here;
/// this one is rebuilt from `put`/`delete` calls observed in-process.
pub struct ObjectIoCore {
    deployment_id: DeploymentId,
    topology: Arc<TopologyManager>,
    buckets: Arc<BucketCatalog>,
    registry: Arc<LocationRegistry>,
    ring: RwLock<HashRing>,
    sets: RwLock<HashMap<String, Arc<ObjectSet>>>,
    index: RwLock<BTreeMap<String, BTreeMap<String, VersionId>>>,
}

impl ObjectIoCore {
    #[must_use]
    pub fn new(
        deployment_id: DeploymentId,
        topology: Arc<TopologyManager>,
        buckets: Arc<BucketCatalog>,
        registry: Arc<LocationRegistry>,
        ring: HashRing,
        sets: HashMap<String, Arc<ObjectSet>>,
    ) -> Self {
        Self {
            deployment_id,
            topology,
            buckets,
            registry,
            ring: RwLock::new(ring),
            sets: RwLock::new(sets),
            index: RwLock::new(BTreeMap::new()),
        }
    }

    fn resolve_set(&self, bucket: &str, key: &str) -> Result<(String, Arc<ObjectSet>)> {
        let name = format!("{bucket}/{key}");
        let ring_key = self
            .ring
            .read()
            .lookup(&name)
            .map_err(|e| Error::internal(e.to_string()))?
            .to_string();
        let set = self
            .sets
            .read()
            .get(&ring_key)
            .cloned()
            .ok_or_else(|| Error::internal(format!("no set wired for ring key {ring_key}")))?;
        Ok((ring_key, set))
    }
}

impl ObjectStore for ObjectIoCore {
    fn put(
        &self,
        bucket: &str,
        key: &str,
        body: &[u8],
        content_type: String,
        user_meta: BTreeMap<String, String>,
    ) -> Result<PutResult> {
        if !self.buckets.exists(bucket) {
            return Err(Error::BucketNotFound(bucket.to_string()));
        }
        let (ring_key, set) = self.resolve_set(bucket, key)?;
        let outcome = set.put(
            self.deployment_id,
            bucket,
            key,
            content_type,
            user_meta,
            body,
        )?;

        let (pool_index, set_index) = parse_ring_key(&ring_key).unwrap_or((0, 0));
        let record = LocationRecord {
            bucket: bucket.to_string(),
            key: key.to_string(),
            version_id: outcome.version_id,
            pool_index,
            set_index,
            disk_count: set.disk_count() as u32,
            disk_indices: outcome.disk_indices.iter().map(|&i| i as u32).collect(),
            generation: self.topology.current().generation,
            mod_time_unix_ms: outcome.mod_time_unix_ms,
            size: outcome.size,
        };
        self.registry
            .record(bucket, key, &outcome.version_id, record)?;

        self.index
            .write()
            .entry(bucket.to_string())
            .or_default()
            .insert(key.to_string(), outcome.version_id);

        Ok(PutResult {
            version_id: outcome.version_id,
            etag: outcome.etag,
        })
    }

    fn get(&self, bucket: &str, key: &str, version: Option<&VersionId>) -> Result<GetResult> {
        let (_, set) = self.resolve_set(bucket, key)?;
        let sidecar = match version {
            Some(v) => set.head(self.deployment_id, bucket, key, v)?,
            None => set.head_latest(self.deployment_id, bucket, key)?,
        };
        if sidecar.delete_marker {
            return Err(Error::not_found(bucket, key));
        }
        let body = match version {
            Some(v) => set.get(self.deployment_id, bucket, key, v)?,
            None => set.get_latest(self.deployment_id, bucket, key)?,
        };
        Ok(GetResult {
            body,
            metadata: ObjectMetadata {
                version_id: sidecar.version_id,
                etag: sidecar.etag,
                size: sidecar.size,
                content_type: sidecar.content_type,
                user_meta: sidecar.user_meta,
                mod_time_unix_ms: sidecar.mod_time_unix_ms,
                delete_marker: sidecar.delete_marker,
            },
        })
    }

    fn delete(&self, bucket: &str, key: &str, version: Option<&VersionId>) -> Result<DeleteResult> {
        let (_, set) = self.resolve_set(bucket, key)?;
        match version {
            None => {
                let version_id = set.delete(self.deployment_id, bucket, key)?;
                if let Some(keys) = self.index.write().get_mut(bucket) {
                    keys.remove(key);
                }
                Ok(DeleteResult {
                    delete_marker_version_id: version_id,
                })
            }
            Some(v) => {
                set.purge(self.deployment_id, bucket, key, v);
                let _ = self.registry.delete(bucket, key, v);
                Ok(DeleteResult {
                    delete_marker_version_id: *v,
                })
            }
        }
    }

    fn head(&self, bucket: &str, key: &str, version: Option<&VersionId>) -> Result<ObjectMetadata> {
        let (_, set) = self.resolve_set(bucket, key)?;
        let sidecar = match version {
            Some(v) => set.head(self.deployment_id, bucket, key, v)?,
            None => set.head_latest(self.deployment_id, bucket, key)?,
        };
        if sidecar.delete_marker {
            return Err(Error::not_found(bucket, key));
        }
        Ok(ObjectMetadata {
            version_id: sidecar.version_id,
            etag: sidecar.etag,
            size: sidecar.size,
            content_type: sidecar.content_type,
            user_meta: sidecar.user_meta,
            mod_time_unix_ms: sidecar.mod_time_unix_ms,
            delete_marker: sidecar.delete_marker,
        })
    }

    fn list(&self, bucket: &str, prefix: &str, marker: Option<&str>, max_keys: usize) -> Result<ListResult> {
        if !self.buckets.exists(bucket) {
            return Err(Error::BucketNotFound(bucket.to_string()));
        }
        let index = self.index.read();
        let Some(keys) = index.get(bucket) else {
            return Ok(ListResult {
                entries: Vec::new(),
                next_marker: None,
            });
        };

        let mut matching: Vec<(&String, &VersionId)> = keys
            .iter()
            .filter(|(k, _)| k.starts_with(prefix))
            .filter(|(k, _)| marker.is_none_or(|m| k.as_str() > m))
            .collect();
        matching.sort_by_key(|(k, _)| (*k).clone());

        let truncated = matching.len() > max_keys;
        matching.truncate(max_keys);

        let next_marker = if truncated {
            matching.last().map(|(k, _)| (*k).clone())
        } else {
            None
        };

        Ok(ListResult {
            entries: matching
                .into_iter()
                .map(|(k, v)| ListEntry {
                    key: k.clone(),
                    version_id: *v,
                })
                .collect(),
            next_marker,
        })
    }

    fn create_bucket(&self, name: &str) -> Result<()> {
        self.buckets.create(name)
    }

    fn delete_bucket(&self, name: &str) -> Result<()> {
        self.buckets.delete(name)
    }

    fn list_buckets(&self) -> Vec<String> {
        self.buckets.list()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use objectio_common::{DiskId, ErasureConfig};
    use objectio_storage::{DiskIo, LocalDiskIo};
    use objectio_topology::Topology;
    use std::time::Duration;

    fn make_core() -> (ObjectIoCore, Vec<tempfile::TempDir>) {
        let dep = DeploymentId::new();
        let ec = ErasureConfig::new(4, 2);
        let mut dirs = Vec::new();
        let mut disks: Vec<Arc<dyn DiskIo>> = Vec::new();
        for _ in 0..ec.total_chunks() {
            let dir = tempfile::tempdir().unwrap();
            disks.push(Arc::new(LocalDiskIo::new(DiskId::new(), dir.path()).unwrap()));
            dirs.push(dir);
        }
        let topology = Arc::new(TopologyManager::bootstrap(disks.clone(), Topology::empty(dep)));
        let buckets = Arc::new(BucketCatalog::load(disks.clone()));

        let set = Arc::new(ObjectSet::new(disks.clone(), ec, 131072).unwrap());
        let mut sets = HashMap::new();
        sets.insert("pool0/set0".to_string(), set.clone());

        let mut ring = HashRing::new(150);
        ring.add_node("pool0/set0");

        let registry = Arc::new(LocationRegistry::new(set, dep, 1000, Duration::from_secs(300)));

        let core = ObjectIoCore::new(dep, topology, buckets, registry, ring, sets);
        (core, dirs)
    }

    #[test]
    fn test_put_get_head_roundtrip() {
        let (core, _dirs) = make_core();
        core.create_bucket("photos").unwrap();
        let put = core
            .put("photos", "cat.jpg", b"abcdefghij", "image/jpeg".into(), BTreeMap::new())
            .unwrap();

        let got = core.get("photos", "cat.jpg", None).unwrap();
        assert_eq!(got.body, b"abcdefghij");
        assert_eq!(got.metadata.etag, put.etag);

        let head = core.head("photos", "cat.jpg", None).unwrap();
        assert_eq!(head.size, 10);
        assert_eq!(head.content_type, "image/jpeg");
    }

    #[test]
    fn test_put_without_bucket_fails() {
        let (core, _dirs) = make_core();
        assert!(core
            .put("missing", "k", b"x", "text/plain".into(), BTreeMap::new())
            .is_err());
    }

    #[test]
    fn test_delete_then_get_not_found() {
        let (core, _dirs) = make_core();
        core.create_bucket("b").unwrap();
        core.put("b", "k", b"data", "text/plain".into(), BTreeMap::new())
            .unwrap();
        core.delete("b", "k", None).unwrap();
        assert!(core.get("b", "k", None).is_err());
    }

    #[test]
    fn test_list_respects_prefix_and_max_keys() {
        let (core, _dirs) = make_core();
        core.create_bucket("b").unwrap();
        for i in 0..5 {
            core.put("b", &format!("photos/{i}"), b"x", "text/plain".into(), BTreeMap::new())
                .unwrap();
        }
        core.put("b", "other", b"x", "text/plain".into(), BTreeMap::new())
            .unwrap();

        let result = core.list("b", "photos/", None, 3).unwrap();
        assert_eq!(result.entries.len(), 3);
        assert!(result.next_marker.is_some());
    }
}
