//! Sidecar metadata: the authoritative per-version record stored
//! alongside an object version's chunk files.

use objectio_common::{Digest32, VersionId, etag_of_chunks, etag_of_inline};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const SIDECAR_SCHEMA_VERSION: u32 = 1;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChunkDigestEntry {
    pub index: u32,
    pub size: u64,
    pub blake2b_256: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ErasureShape {
    pub k: u8,
    pub m: u8,
}

/// The per-version JSON metadata record.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Sidecar {
    pub schema: u32,
    pub version_id: VersionId,
    pub mod_time_unix_ms: i64,
    pub size: u64,
    pub content_type: String,
    #[serde(default)]
    pub user_meta: BTreeMap<String, String>,
    pub ec: ErasureShape,
    pub chunks: Vec<ChunkDigestEntry>,
    pub etag: String,
    pub delete_marker: bool,
    pub inline_data: Option<String>,
}

impl Sidecar {
    #[must_use]
    pub fn new_object(
        version_id: VersionId,
        mod_time_unix_ms: i64,
        size: u64,
        content_type: String,
        user_meta: BTreeMap<String, String>,
        ec: ErasureShape,
        chunk_digests: &[Digest32],
    ) -> Self {
        let chunks = chunk_digests
            .iter()
            .enumerate()
            .map(|(i, d)| ChunkDigestEntry {
                index: i as u32,
                size: 0,
                blake2b_256: d.to_hex(),
            })
            .collect();
        Self {
            schema: SIDECAR_SCHEMA_VERSION,
            version_id,
            mod_time_unix_ms,
            size,
            content_type,
            user_meta,
            ec,
            chunks,
            etag: etag_of_chunks(chunk_digests),
            delete_marker: false,
            inline_data: None,
        }
    }

    #[must_use]
    pub fn new_inline(
        version_id: VersionId,
        mod_time_unix_ms: i64,
        content_type: String,
        user_meta: BTreeMap<String, String>,
        data: &[u8],
    ) -> Self {
        Self {
            schema: SIDECAR_SCHEMA_VERSION,
            version_id,
            mod_time_unix_ms,
            size: data.len() as u64,
            content_type,
            user_meta,
            ec: ErasureShape { k: 1, m: 0 },
            chunks: Vec::new(),
            etag: etag_of_inline(data),
            delete_marker: false,
            inline_data: Some(base64::Engine::encode(
                &base64::engine::general_purpose::STANDARD,
                data,
            )),
        }
    }

    #[must_use]
    pub fn new_delete_marker(version_id: VersionId, mod_time_unix_ms: i64) -> Self {
        Self {
            schema: SIDECAR_SCHEMA_VERSION,
            version_id,
            mod_time_unix_ms,
            size: 0,
            content_type: String::new(),
            user_meta: BTreeMap::new(),
            ec: ErasureShape { k: 0, m: 0 },
            chunks: Vec::new(),
            etag: String::new(),
            delete_marker: true,
            inline_data: None,
        }
    }

    #[must_use]
    pub fn is_inline(&self) -> bool {
        self.inline_data.is_some()
    }

    /// Content used for quorum voting: everything that must agree for
    /// two sidecar copies to be considered identical.
    #[must_use]
    pub fn voting_key(&self) -> String {
        let digests: Vec<&str> = self.chunks.iter().map(|c| c.blake2b_256.as_str()).collect();
        format!(
            "{}|{}|{}|{}",
            self.version_id,
            self.mod_time_unix_ms,
            self.delete_marker,
            digests.join(",")
        )
    }

    pub fn to_json(&self) -> objectio_common::Result<Vec<u8>> {
        Ok(serde_json::to_vec_pretty(self)?)
    }

    pub fn from_json(data: &[u8]) -> objectio_common::Result<Self> {
        Ok(serde_json::from_slice(data)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inline_roundtrip() {
        let sc = Sidecar::new_inline(
            VersionId::new(),
            0,
            "text/plain".into(),
            BTreeMap::new(),
            b"abcdefghij",
        );
        assert!(sc.is_inline());
        let json = sc.to_json().unwrap();
        let back = Sidecar::from_json(&json).unwrap();
        assert_eq!(back.etag, sc.etag);
    }

    #[test]
    fn test_etag_matches_expected_digest_for_scenario_1() {
        let sc = Sidecar::new_inline(
            VersionId::new(),
            0,
            "image/jpeg".into(),
            BTreeMap::new(),
            b"abcdefghij",
        );
        let expected = objectio_common::etag_of_inline(b"abcdefghij");
        assert_eq!(sc.etag, expected);
        assert_eq!(sc.etag.len(), 32);
        assert!(sc.etag.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }
}
