//! On-disk path derivation
//!
//! All paths are pure functions of `(deployment_id, bucket, key)` (plus,
//! for sidecar/chunk files, a version id) so every disk in a set derives
//! the identical path independently, with no need to communicate it.

use objectio_common::{partition_prefixes, object_hash_path};
use std::path::PathBuf;

/// Directory holding every version's sidecar and chunk files for one
/// `(bucket, key)` pair.
#[must_use]
pub fn object_dir(deployment_id: &[u8; 16], bucket: &str, key: &str) -> PathBuf {
    let (hex2, hex16) = partition_prefixes(deployment_id, bucket, key);
    let hash = object_hash_path(deployment_id, bucket, key);
    PathBuf::from(bucket).join(hex2).join(hex16).join(hash)
}

#[must_use]
pub fn sidecar_path(deployment_id: &[u8; 16], bucket: &str, key: &str, version_id: &str) -> PathBuf {
    object_dir(deployment_id, bucket, key).join(format!("sidecar.{version_id}"))
}

#[must_use]
pub fn chunk_path(
    deployment_id: &[u8; 16],
    bucket: &str,
    key: &str,
    version_id: &str,
    chunk_index: usize,
) -> PathBuf {
    object_dir(deployment_id, bucket, key).join(format!("part.{version_id}.{chunk_index}"))
}

#[must_use]
pub fn sidecar_file_prefix() -> &'static str {
    "sidecar."
}
