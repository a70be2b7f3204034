//! Version enumeration and `latest` resolution.
//!
//! Every version of an object gets its own `sidecar.<version_id>` file in
//! the shared per-object directory, so listing versions means enumerating
//! `sidecar.*` entries across disks and quorum-resolving each one.

use crate::disk_io::DiskIo;
use crate::path::{object_dir, sidecar_file_prefix};
use crate::sidecar::Sidecar;
use objectio_common::{DeploymentId, Error, Result, VersionId};
use std::collections::HashSet;
use std::sync::Arc;

/// One version's resolved metadata, as returned by a version listing.
#[derive(Debug, Clone)]
pub struct VersionEntry {
    pub version_id: VersionId,
    pub mod_time_unix_ms: i64,
    pub delete_marker: bool,
    pub size: u64,
    pub etag: String,
}

impl From<&Sidecar> for VersionEntry {
    fn from(sc: &Sidecar) -> Self {
        Self {
            version_id: sc.version_id,
            mod_time_unix_ms: sc.mod_time_unix_ms,
            delete_marker: sc.delete_marker,
            size: sc.size,
            etag: sc.etag.clone(),
        }
    }
}

/// Union of version ids across every disk's view of an object directory.
pub fn enumerate_version_ids(
    disks: &[Arc<dyn DiskIo>],
    deployment_id: DeploymentId,
    bucket: &str,
    key: &str,
) -> Result<Vec<VersionId>> {
    let dep = *deployment_id.as_bytes();
    let dir = object_dir(&dep, bucket, key);
    let prefix = sidecar_file_prefix();

    let mut ids: HashSet<VersionId> = HashSet::new();
    for disk in disks {
        for name in disk.enumerate(&dir)? {
            if let Some(suffix) = name.strip_prefix(prefix) {
                if let Ok(id) = VersionId::parse(suffix) {
                    ids.insert(id);
                }
            }
        }
    }

    let mut ids: Vec<VersionId> = ids.into_iter().collect();
    ids.sort_by_key(|id| id.to_string());
    Ok(ids)
}

/// List every version of `bucket/key`, newest first, with delete markers
/// included so callers can distinguish "deleted" from "never existed".
pub fn list_versions(
    disks: &[Arc<dyn DiskIo>],
    deployment_id: DeploymentId,
    bucket: &str,
    key: &str,
    resolve: impl Fn(&VersionId) -> Result<Sidecar>,
) -> Result<Vec<VersionEntry>> {
    let ids = enumerate_version_ids(disks, deployment_id, bucket, key)?;
    if ids.is_empty() {
        return Err(Error::not_found(bucket, key));
    }

    let mut entries: Vec<VersionEntry> = ids
        .iter()
        .filter_map(|id| resolve(id).ok())
        .map(|sc| VersionEntry::from(&sc))
        .collect();

    entries.sort_by(|a, b| b.mod_time_unix_ms.cmp(&a.mod_time_unix_ms));
    Ok(entries)
}

/// Resolve the `latest` alias: the version with the greatest `mod_time`
/// among all of an object's versions. If that version is itself a delete
/// marker the object is considered absent.
pub fn resolve_latest(
    disks: &[Arc<dyn DiskIo>],
    deployment_id: DeploymentId,
    bucket: &str,
    key: &str,
    resolve: impl Fn(&VersionId) -> Result<Sidecar>,
) -> Result<VersionId> {
    let ids = enumerate_version_ids(disks, deployment_id, bucket, key)?;
    if ids.is_empty() {
        return Err(Error::not_found(bucket, key));
    }

    let resolved: Vec<Sidecar> = ids.iter().filter_map(|id| resolve(id).ok()).collect();
    let latest = resolved
        .into_iter()
        .max_by_key(|sc| sc.mod_time_unix_ms)
        .ok_or_else(|| Error::not_found(bucket, key))?;

    if latest.delete_marker {
        return Err(Error::not_found(bucket, key));
    }

    Ok(latest.version_id)
}
