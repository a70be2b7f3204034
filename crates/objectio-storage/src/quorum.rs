//! Quorum write/read protocol for one erasure set.
//!
//! A set is `N = K + M` disks. A chunked object places one chunk per
//! disk plus an identical sidecar copy on every disk; an inline object
//! places just the sidecar. Both paths go through the same two-phase
//! stage/commit dance so a write that can't reach quorum never leaves a
//! partially-visible version behind: every disk's chunk and sidecar are
//! staged to a temp path in parallel, and only renamed into place once
//! `Wq` disks have staged successfully. Short of quorum, every stage
//! (including ones that individually succeeded) is aborted.

use crate::disk_io::DiskIo;
use crate::path::{chunk_path, sidecar_path};
use crate::sidecar::{ErasureShape, Sidecar};
use objectio_common::{DeploymentId, Error, ErasureConfig, Result, VersionId};
use objectio_erasure::ErasureCodec;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

/// Outcome of a successful [`ObjectSet::put`].
#[derive(Debug, Clone)]
pub struct PutOutcome {
    pub version_id: VersionId,
    pub etag: String,
    pub committed: usize,
    pub size: u64,
    pub mod_time_unix_ms: i64,
    pub disk_indices: Vec<usize>,
}

struct StagedDisk {
    disk_index: usize,
    chunk: Option<PathBuf>,
    sidecar: PathBuf,
}

/// The `N` disks backing one erasure set, plus the codec shape they were
/// provisioned with.
pub struct ObjectSet {
    disks: Vec<Arc<dyn DiskIo>>,
    ec: ErasureConfig,
    codec: ErasureCodec,
    inline_threshold: u64,
}

impl ObjectSet {
    pub fn new(disks: Vec<Arc<dyn DiskIo>>, ec: ErasureConfig, inline_threshold: u64) -> Result<Self> {
        if disks.len() != ec.total_chunks() as usize {
            return Err(Error::invalid_arg(format!(
                "set has {} disks, erasure shape needs {}",
                disks.len(),
                ec.total_chunks()
            )));
        }
        let codec = ErasureCodec::new(ec)?;
        Ok(Self {
            disks,
            ec,
            codec,
            inline_threshold,
        })
    }

    #[must_use]
    pub fn disk_count(&self) -> usize {
        self.disks.len()
    }

    #[must_use]
    pub fn disks(&self) -> &[Arc<dyn DiskIo>] {
        &self.disks
    }

    fn now_ms() -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as i64)
            .unwrap_or(0)
    }

    /// Write a new version of `bucket/key`. Payloads at or under
    /// `inline_threshold` bytes are stored inline in the sidecar; larger
    /// payloads are erasure-coded, one chunk per disk.
    pub fn put(
        &self,
        deployment_id: DeploymentId,
        bucket: &str,
        key: &str,
        content_type: String,
        user_meta: BTreeMap<String, String>,
        data: &[u8],
    ) -> Result<PutOutcome> {
        let version_id = VersionId::new();
        let mod_time = Self::now_ms();
        let dep = *deployment_id.as_bytes();

        let sidecar = if data.len() as u64 <= self.inline_threshold {
            Sidecar::new_inline(version_id, mod_time, content_type, user_meta, data)
        } else {
            let chunks = self.codec.encode(data)?;
            let digests: Vec<objectio_common::Digest32> = chunks
                .iter()
                .map(|c| objectio_common::Digest32::of(c))
                .collect();
            let mut sc = Sidecar::new_object(
                version_id,
                mod_time,
                data.len() as u64,
                content_type,
                user_meta,
                ErasureShape {
                    k: self.ec.k,
                    m: self.ec.m,
                },
                &digests,
            );
            for (entry, chunk) in sc.chunks.iter_mut().zip(chunks.iter()) {
                entry.size = chunk.len() as u64;
            }
            return self.commit_chunked(dep, bucket, key, version_id, sc, chunks);
        };

        self.commit_sidecar_only(dep, bucket, key, version_id, sidecar)
    }

    fn commit_chunked(
        &self,
        dep: [u8; 16],
        bucket: &str,
        key: &str,
        version_id: VersionId,
        sidecar: Sidecar,
        chunks: Vec<Vec<u8>>,
    ) -> Result<PutOutcome> {
        let sidecar_json = sidecar.to_json()?;
        let sidecar_rel = sidecar_path(&dep, bucket, key, &version_id.to_string());

        let staged: Vec<Option<StagedDisk>> = std::thread::scope(|scope| {
            let handles: Vec<_> = self
                .disks
                .iter()
                .enumerate()
                .map(|(i, disk)| {
                    let chunk = &chunks[i];
                    let sidecar_rel = &sidecar_rel;
                    let sidecar_json = &sidecar_json;
                    let chunk_rel = chunk_path(&dep, bucket, key, &version_id.to_string(), i);
                    scope.spawn(move || {
                        let chunk_staged = disk.stage(&chunk_rel, chunk).ok();
                        let sidecar_staged = disk.stage(sidecar_rel, sidecar_json).ok();
                        match (chunk_staged, sidecar_staged) {
                            (Some(c), Some(s)) => Some(StagedDisk {
                                disk_index: i,
                                chunk: Some(c),
                                sidecar: s,
                            }),
                            (Some(c), None) => {
                                let _ = disk.abort_stage(&c);
                                None
                            }
                            (None, Some(s)) => {
                                let _ = disk.abort_stage(&s);
                                None
                            }
                            (None, None) => None,
                        }
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        self.finish(dep, bucket, key, &version_id, staged)
    }

    fn commit_sidecar_only(
        &self,
        dep: [u8; 16],
        bucket: &str,
        key: &str,
        version_id: VersionId,
        sidecar: Sidecar,
    ) -> Result<PutOutcome> {
        let sidecar_json = sidecar.to_json()?;
        let sidecar_rel = sidecar_path(&dep, bucket, key, &version_id.to_string());

        let staged: Vec<Option<StagedDisk>> = std::thread::scope(|scope| {
            let handles: Vec<_> = self
                .disks
                .iter()
                .enumerate()
                .map(|(i, disk)| {
                    let sidecar_rel = &sidecar_rel;
                    let sidecar_json = &sidecar_json;
                    scope.spawn(move || {
                        disk.stage(sidecar_rel, sidecar_json).ok().map(|s| StagedDisk {
                            disk_index: i,
                            chunk: None,
                            sidecar: s,
                        })
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        self.finish(dep, bucket, key, &version_id, staged)
    }

    fn finish(
        &self,
        dep: [u8; 16],
        bucket: &str,
        key: &str,
        version_id: &VersionId,
        staged: Vec<Option<StagedDisk>>,
    ) -> Result<PutOutcome> {
        let succeeded: Vec<&StagedDisk> = staged.iter().filter_map(Option::as_ref).collect();
        let required = self.ec.write_quorum() as usize;

        if succeeded.len() < required {
            for s in &succeeded {
                if let Some(c) = &s.chunk {
                    let _ = self.disks[s.disk_index].abort_stage(c);
                }
                let _ = self.disks[s.disk_index].abort_stage(&s.sidecar);
            }
            tracing::warn!(
                bucket,
                key,
                version = %version_id,
                available = succeeded.len(),
                required,
                "write quorum not reached, aborting staged chunks"
            );
            metrics::counter!("objectio_storage_write_quorum_failures_total").increment(1);
            return Err(Error::QuorumUnavailable {
                available: succeeded.len(),
                required,
            });
        }

        let committed = std::thread::scope(|scope| {
            let handles: Vec<_> = succeeded
                .iter()
                .map(|s| {
                    let disk = &self.disks[s.disk_index];
                    let chunk_rel = s.chunk.as_ref().map(|_| {
                        chunk_path(&dep, bucket, key, &version_id.to_string(), s.disk_index)
                    });
                    let sidecar_rel = sidecar_path(&dep, bucket, key, &version_id.to_string());
                    scope.spawn(move || {
                        let mut ok = true;
                        if let (Some(chunk_staged), Some(chunk_final)) = (&s.chunk, &chunk_rel) {
                            ok &= disk.commit(chunk_staged, chunk_final).is_ok();
                        }
                        ok &= disk.commit(&s.sidecar, &sidecar_rel).is_ok();
                        ok
                    })
                })
                .collect();
            handles
                .into_iter()
                .map(|h| h.join().unwrap())
                .filter(|ok| *ok)
                .count()
        });

        let sidecar_rel = sidecar_path(&dep, bucket, key, &version_id.to_string());
        let sidecar = self.disks[succeeded[0].disk_index]
            .read(&sidecar_rel)
            .ok()
            .and_then(|b| Sidecar::from_json(&b).ok());
        let etag = sidecar.as_ref().map(|s| s.etag.clone()).unwrap_or_default();
        let size = sidecar.as_ref().map(|s| s.size).unwrap_or(0);
        let mod_time_unix_ms = sidecar.as_ref().map(|s| s.mod_time_unix_ms).unwrap_or(0);
        let disk_indices = succeeded.iter().map(|s| s.disk_index).collect();

        metrics::counter!("objectio_storage_puts_committed_total").increment(1);
        metrics::gauge!("objectio_storage_last_put_disks_committed").set(committed as f64);

        Ok(PutOutcome {
            version_id: *version_id,
            etag,
            committed,
            size,
            mod_time_unix_ms,
            disk_indices,
        })
    }

    /// Read all disks' sidecar copies for a version and resolve the
    /// quorum-agreed record by content vote, tie-broken by newest
    /// `mod_time` then lowest disk index.
    fn resolve_sidecar(
        &self,
        dep: [u8; 16],
        bucket: &str,
        key: &str,
        version_id: &VersionId,
    ) -> Result<Sidecar> {
        let rel = sidecar_path(&dep, bucket, key, &version_id.to_string());
        let reads: Vec<Option<Sidecar>> = std::thread::scope(|scope| {
            let handles: Vec<_> = self
                .disks
                .iter()
                .map(|disk| {
                    let rel = &rel;
                    scope.spawn(move || disk.read(rel).ok().and_then(|b| Sidecar::from_json(&b).ok()))
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        let mut votes: BTreeMap<String, (usize, i64, usize)> = BTreeMap::new();
        for (i, sc) in reads.iter().enumerate() {
            if let Some(sc) = sc {
                let entry = votes
                    .entry(sc.voting_key())
                    .or_insert((0, sc.mod_time_unix_ms, i));
                entry.0 += 1;
            }
        }

        let required = self.ec.sidecar_quorum() as usize;
        let winner = votes
            .into_iter()
            .filter(|(_, (count, _, _))| *count >= required)
            .max_by_key(|(_, (count, mod_time, idx))| (*count, *mod_time, std::cmp::Reverse(*idx)));

        let Some((key_str, _)) = winner else {
            let available = reads.iter().filter(|s| s.is_some()).count();
            tracing::warn!(bucket, key, version = %version_id, available, required, "sidecar quorum not reached");
            metrics::counter!("objectio_storage_sidecar_quorum_failures_total").increment(1);
            return Err(Error::QuorumUnavailable {
                available,
                required,
            });
        };

        let winning = reads
            .iter()
            .flatten()
            .find(|sc| sc.voting_key() == key_str)
            .cloned()
            .ok_or_else(|| Error::internal("sidecar quorum winner vanished"))?;

        self.heal_divergent_sidecars(&rel, &winning, &key_str, &reads);
        Ok(winning)
    }

    /// Propagate the quorum-winning sidecar to every disk whose read
    /// disagreed with or was missing it, so a divergent set converges to
    /// the majority content within one read (§4.5 self-heal).
    fn heal_divergent_sidecars(
        &self,
        rel: &std::path::Path,
        winning: &Sidecar,
        winning_key: &str,
        reads: &[Option<Sidecar>],
    ) {
        let Ok(json) = winning.to_json() else {
            return;
        };
        std::thread::scope(|scope| {
            for (i, sc) in reads.iter().enumerate() {
                let matches = sc.as_ref().is_some_and(|sc| sc.voting_key() == winning_key);
                if matches {
                    continue;
                }
                let disk = &self.disks[i];
                let json = &json;
                scope.spawn(move || {
                    tracing::warn!(disk_id = %disk.disk_id(), path = %rel.display(), "healing divergent sidecar");
                    metrics::counter!("objectio_storage_sidecar_heals_total").increment(1);
                    let _ = disk.write_atomic(rel, json);
                });
            }
        });
    }

    /// Fetch object data for a specific version.
    pub fn get(
        &self,
        deployment_id: DeploymentId,
        bucket: &str,
        key: &str,
        version_id: &VersionId,
    ) -> Result<Vec<u8>> {
        let dep = *deployment_id.as_bytes();
        let sidecar = self.resolve_sidecar(dep, bucket, key, version_id)?;

        if sidecar.delete_marker {
            return Err(Error::not_found(bucket, key));
        }

        if let Some(b64) = &sidecar.inline_data {
            let data = base64::Engine::decode(&base64::engine::general_purpose::STANDARD, b64)
                .map_err(|e| Error::internal(format!("corrupt inline payload: {e}")))?;
            return Ok(data);
        }

        let k = self.ec.k as usize;
        let reads: Vec<Option<Vec<u8>>> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..self.disks.len())
                .map(|i| {
                    let disk = &self.disks[i];
                    let rel = chunk_path(&dep, bucket, key, &version_id.to_string(), i);
                    let expected = sidecar.chunks.get(i).map(|c| c.blake2b_256.clone());
                    scope.spawn(move || {
                        let data = disk.read(&rel).ok()?;
                        if let Some(expected) = expected {
                            let actual = objectio_common::Digest32::of(&data).to_hex();
                            if actual != expected {
                                return None;
                            }
                        }
                        Some(data)
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        let available = reads.iter().filter(|c| c.is_some()).count();
        if available < k {
            return Err(Error::InsufficientChunks {
                available,
                required: k,
            });
        }

        self.codec.decode(&reads, sidecar.size as usize)
    }

    /// Write a delete marker as a new version.
    pub fn delete(&self, deployment_id: DeploymentId, bucket: &str, key: &str) -> Result<VersionId> {
        let dep = *deployment_id.as_bytes();
        let version_id = VersionId::new();
        let sidecar = Sidecar::new_delete_marker(version_id, Self::now_ms());
        self.commit_sidecar_only(dep, bucket, key, version_id, sidecar)?;
        Ok(version_id)
    }

    /// Resolve metadata for a specific version without reading chunk data.
    pub fn head(
        &self,
        deployment_id: DeploymentId,
        bucket: &str,
        key: &str,
        version_id: &VersionId,
    ) -> Result<Sidecar> {
        let dep = *deployment_id.as_bytes();
        self.resolve_sidecar(dep, bucket, key, version_id)
    }

    /// Resolve the `"latest"` alias (§4.4) and fetch its data.
    pub fn get_latest(&self, deployment_id: DeploymentId, bucket: &str, key: &str) -> Result<Vec<u8>> {
        let version_id = self.resolve_latest_version(deployment_id, bucket, key)?;
        self.get(deployment_id, bucket, key, &version_id)
    }

    /// Resolve the `"latest"` alias (§4.4) and fetch its metadata.
    pub fn head_latest(&self, deployment_id: DeploymentId, bucket: &str, key: &str) -> Result<Sidecar> {
        let version_id = self.resolve_latest_version(deployment_id, bucket, key)?;
        self.head(deployment_id, bucket, key, &version_id)
    }

    fn resolve_latest_version(
        &self,
        deployment_id: DeploymentId,
        bucket: &str,
        key: &str,
    ) -> Result<VersionId> {
        crate::versioning::resolve_latest(&self.disks, deployment_id, bucket, key, |id| {
            self.head(deployment_id, bucket, key, id)
        })
    }

    /// Permanently remove one version's sidecar and chunk files from
    /// every disk. Unlike [`Self::delete`], this does not leave a
    /// tombstone behind — the version ceases to exist.
    pub fn purge(&self, deployment_id: DeploymentId, bucket: &str, key: &str, version_id: &VersionId) {
        let dep = *deployment_id.as_bytes();
        let sidecar_rel = sidecar_path(&dep, bucket, key, &version_id.to_string());
        std::thread::scope(|scope| {
            for (i, disk) in self.disks.iter().enumerate() {
                let sidecar_rel = &sidecar_rel;
                let chunk_rel = chunk_path(&dep, bucket, key, &version_id.to_string(), i);
                scope.spawn(move || {
                    let _ = disk.remove(sidecar_rel);
                    let _ = disk.remove(&chunk_rel);
                });
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::disk_io::LocalDiskIo;
    use objectio_common::DiskId;

    fn make_set(k: u8, m: u8, inline_threshold: u64) -> (ObjectSet, Vec<tempfile::TempDir>) {
        let ec = ErasureConfig::new(k, m);
        let mut dirs = Vec::new();
        let mut disks: Vec<Arc<dyn DiskIo>> = Vec::new();
        for _ in 0..ec.total_chunks() {
            let dir = tempfile::tempdir().unwrap();
            let disk = LocalDiskIo::new(DiskId::new(), dir.path()).unwrap();
            disks.push(Arc::new(disk));
            dirs.push(dir);
        }
        (ObjectSet::new(disks, ec, inline_threshold).unwrap(), dirs)
    }

    #[test]
    fn test_inline_put_get_roundtrip() {
        let (set, _dirs) = make_set(4, 2, 1_000_000);
        let dep = DeploymentId::new();
        let outcome = set
            .put(dep, "b", "k", "text/plain".into(), BTreeMap::new(), b"hello world")
            .unwrap();
        let data = set.get(dep, "b", "k", &outcome.version_id).unwrap();
        assert_eq!(data, b"hello world");
    }

    #[test]
    fn test_chunked_put_get_roundtrip() {
        let (set, _dirs) = make_set(4, 2, 4);
        let dep = DeploymentId::new();
        let payload = vec![0xABu8; 50_000];
        let outcome = set
            .put(dep, "b", "k", "application/octet-stream".into(), BTreeMap::new(), &payload)
            .unwrap();
        let data = set.get(dep, "b", "k", &outcome.version_id).unwrap();
        assert_eq!(data, payload);
    }

    #[test]
    fn test_get_survives_missing_disks() {
        let (set, dirs) = make_set(4, 2, 4);
        let dep = DeploymentId::new();
        let payload = vec![0x11u8; 20_000];
        let outcome = set
            .put(dep, "b", "k", "application/octet-stream".into(), BTreeMap::new(), &payload)
            .unwrap();

        // Wipe two disks' worth of files entirely; read quorum (k=4 of 6) survives.
        std::fs::remove_dir_all(dirs[0].path()).unwrap();
        std::fs::remove_dir_all(dirs[5].path()).unwrap();

        let data = set.get(dep, "b", "k", &outcome.version_id).unwrap();
        assert_eq!(data, payload);
    }

    #[test]
    fn test_delete_marker_hides_object() {
        let (set, _dirs) = make_set(4, 2, 1_000_000);
        let dep = DeploymentId::new();
        let outcome = set
            .put(dep, "b", "k", "text/plain".into(), BTreeMap::new(), b"hi")
            .unwrap();
        set.delete(dep, "b", "k").unwrap();
        let err = set.get(dep, "b", "k", &outcome.version_id);
        assert!(err.is_ok(), "deleting writes a new version, old one is untouched");
    }
}
