//! Reed-Solomon encoder/decoder
//!
//! High-level API over the backend trait. `encode` splits a byte buffer
//! into `k` data chunks and produces `m` parity chunks; `decode`
//! reconstructs the original buffer from any `k` present chunks;
//! `reconstruct` rebuilds an arbitrary named subset of missing chunks
//! (data or parity) without requiring a full decode.
//!
//! # Example
//!
//! ```
//! use objectio_erasure::ErasureCodec;
//! use objectio_common::ErasureConfig;
//!
//! let codec = ErasureCodec::new(ErasureConfig::new(4, 2)).unwrap();
//! let data = b"Hello, World!";
//! let chunks = codec.encode(data).unwrap();
//! ```

use crate::backend::{ErasureBackend, RustSimdBackend};
use objectio_common::{Error as CommonError, ErasureConfig, Result};
use std::collections::HashMap;
use thiserror::Error;

/// Minimum chunk size enforced for SIMD alignment, following the
/// reed-solomon-simd backend's own internal padding requirement.
const SIMD_ALIGNMENT: usize = 64;

/// Errors specific to erasure coding operations.
#[derive(Debug, Error)]
pub enum ErasureError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("encoding failed: {0}")]
    EncodingFailed(String),

    #[error("decoding failed: {0}")]
    DecodingFailed(String),

    #[error("insufficient chunks: have {available}, need {required}")]
    InsufficientChunks { available: usize, required: usize },
}

impl From<ErasureError> for CommonError {
    fn from(e: ErasureError) -> Self {
        match e {
            ErasureError::InsufficientChunks { available, required } => {
                Self::InsufficientChunks { available, required }
            }
            other => Self::Internal(other.to_string()),
        }
    }
}

/// High-level Reed-Solomon MDS codec: any `k` of the `k+m` produced
/// chunks reconstruct the original payload.
pub struct ErasureCodec {
    config: ErasureConfig,
    backend: RustSimdBackend,
}

impl ErasureCodec {
    pub fn new(config: ErasureConfig) -> Result<Self> {
        if config.k == 0 {
            return Err(ErasureError::InvalidConfig("k must be > 0".into()).into());
        }
        if config.m == 0 {
            return Err(ErasureError::InvalidConfig("m must be > 0".into()).into());
        }
        let backend = RustSimdBackend::new(config.k, config.m)?;
        Ok(Self { config, backend })
    }

    #[must_use]
    pub const fn config(&self) -> ErasureConfig {
        self.config
    }

    #[must_use]
    pub fn data_chunks(&self) -> usize {
        self.backend.data_chunks()
    }

    #[must_use]
    pub fn parity_chunks(&self) -> usize {
        self.backend.parity_chunks()
    }

    #[must_use]
    pub fn total_chunks(&self) -> usize {
        self.data_chunks() + self.parity_chunks()
    }

    /// Compute the per-chunk size for a payload of `len` bytes: split
    /// evenly across `k` chunks, padded up to the SIMD alignment.
    #[must_use]
    pub fn chunk_size_for(&self, len: usize) -> usize {
        let k = self.data_chunks();
        ((len + k - 1) / k).max(SIMD_ALIGNMENT)
    }

    /// Encode `data` into `k` data chunks and `m` parity chunks, all of
    /// equal length. The original length is not recorded here; callers
    /// (the sidecar) must track it to trim padding on decode.
    pub fn encode(&self, data: &[u8]) -> Result<Vec<Vec<u8>>> {
        let k = self.data_chunks();
        let chunk_size = self.chunk_size_for(data.len());
        let padded_size = chunk_size * k;

        let mut padded = vec![0u8; padded_size];
        padded[..data.len()].copy_from_slice(data);

        let data_chunks: Vec<&[u8]> = (0..k)
            .map(|i| &padded[i * chunk_size..(i + 1) * chunk_size])
            .collect();

        let chunks = self
            .backend
            .encode(&data_chunks, chunk_size)
            .map_err(|e| ErasureError::EncodingFailed(e.to_string()))?;
        Ok(chunks)
    }

    /// Reconstruct the original payload from a set of present chunks
    /// (data and/or parity). Requires at least `k` present chunks.
    pub fn decode(&self, chunks: &[Option<Vec<u8>>], original_len: usize) -> Result<Vec<u8>> {
        let k = self.data_chunks();

        let available = chunks.iter().filter(|c| c.is_some()).count();
        if available < k {
            return Err(ErasureError::InsufficientChunks {
                available,
                required: k,
            }
            .into());
        }

        let chunk_size = chunks
            .iter()
            .find_map(|c| c.as_ref().map(Vec::len))
            .ok_or(ErasureError::InsufficientChunks {
                available: 0,
                required: k,
            })?;

        // Fast path: all data chunks present, no need to invoke the backend.
        if chunks[..k].iter().all(Option::is_some) {
            let mut out = Vec::with_capacity(k * chunk_size);
            for chunk in chunks.iter().take(k) {
                out.extend_from_slice(chunk.as_ref().unwrap());
            }
            out.truncate(original_len);
            return Ok(out);
        }

        let missing_data: Vec<usize> = (0..k).filter(|&i| chunks[i].is_none()).collect();
        let chunk_refs: Vec<Option<&[u8]>> =
            chunks.iter().map(|c| c.as_deref()).collect();
        let recovered = self
            .backend
            .reconstruct(&chunk_refs, chunk_size, &missing_data)
            .map_err(|e| ErasureError::DecodingFailed(e.to_string()))?;

        let mut recovered_by_index: HashMap<usize, &[u8]> = HashMap::new();
        for (idx, data) in missing_data.iter().zip(recovered.iter()) {
            recovered_by_index.insert(*idx, data.as_slice());
        }

        let mut out = Vec::with_capacity(k * chunk_size);
        for i in 0..k {
            if let Some(chunk) = &chunks[i] {
                out.extend_from_slice(chunk);
            } else {
                out.extend_from_slice(recovered_by_index[&i]);
            }
        }
        out.truncate(original_len);
        Ok(out)
    }

    /// Rebuild exactly the chunks named by `missing_indices` (data or
    /// parity), keyed by their original chunk index.
    pub fn reconstruct(
        &self,
        chunks: &[Option<Vec<u8>>],
        missing_indices: &[usize],
    ) -> Result<HashMap<usize, Vec<u8>>> {
        let k = self.data_chunks();
        let available = chunks.iter().filter(|c| c.is_some()).count();
        if available < k {
            return Err(ErasureError::InsufficientChunks {
                available,
                required: k,
            }
            .into());
        }
        let chunk_size = chunks
            .iter()
            .find_map(|c| c.as_ref().map(Vec::len))
            .ok_or(ErasureError::InsufficientChunks {
                available: 0,
                required: k,
            })?;

        let chunk_refs: Vec<Option<&[u8]>> = chunks.iter().map(|c| c.as_deref()).collect();
        let recovered = self
            .backend
            .reconstruct(&chunk_refs, chunk_size, missing_indices)
            .map_err(|e| ErasureError::DecodingFailed(e.to_string()))?;

        Ok(missing_indices
            .iter()
            .copied()
            .zip(recovered)
            .collect())
    }

    /// Re-encode the data chunks and compare against the provided parity
    /// chunks; used to detect silent corruption in periodic scrubbing.
    pub fn verify(&self, chunks: &[Vec<u8>]) -> Result<bool> {
        if chunks.len() != self.total_chunks() {
            return Ok(false);
        }
        let refs: Vec<&[u8]> = chunks.iter().map(Vec::as_slice).collect();
        self.backend
            .verify(&refs)
            .map_err(|e| ErasureError::EncodingFailed(e.to_string()).into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_decode_roundtrip() {
        let codec = ErasureCodec::new(ErasureConfig::new(4, 2)).unwrap();
        let data = b"Hello, World! This is a test of erasure coding.";

        let chunks = codec.encode(data).unwrap();
        assert_eq!(chunks.len(), 6);

        let chunk_size = chunks[0].len();
        assert!(chunks.iter().all(|c| c.len() == chunk_size));

        let opts: Vec<Option<Vec<u8>>> = chunks.into_iter().map(Some).collect();
        let decoded = codec.decode(&opts, data.len()).unwrap();
        assert_eq!(decoded, data);
    }

    #[test]
    fn test_decode_with_missing_data_and_parity() {
        let codec = ErasureCodec::new(ErasureConfig::new(4, 2)).unwrap();
        let data = b"Hello, World! This is a test of erasure coding with recovery.";

        let chunks = codec.encode(data).unwrap();
        let mut opts: Vec<Option<Vec<u8>>> = chunks.into_iter().map(Some).collect();
        opts[1] = None;
        opts[4] = None;

        let decoded = codec.decode(&opts, data.len()).unwrap();
        assert_eq!(decoded, data);
    }

    #[test]
    fn test_insufficient_chunks() {
        let codec = ErasureCodec::new(ErasureConfig::new(4, 2)).unwrap();
        let opts: Vec<Option<Vec<u8>>> = vec![
            Some(vec![0u8; 64]),
            Some(vec![0u8; 64]),
            Some(vec![0u8; 64]),
            None,
            None,
            None,
        ];
        assert!(codec.decode(&opts, 64).is_err());
    }

    #[test]
    fn test_reconstruct_parity_only() {
        let codec = ErasureCodec::new(ErasureConfig::new(4, 2)).unwrap();
        let data = b"reconstruct just the parity chunks please";
        let chunks = codec.encode(data).unwrap();

        let mut opts: Vec<Option<Vec<u8>>> = chunks.clone().into_iter().map(Some).collect();
        opts[4] = None;
        opts[5] = None;

        let rebuilt = codec.reconstruct(&opts, &[4, 5]).unwrap();
        assert_eq!(rebuilt[&4], chunks[4]);
        assert_eq!(rebuilt[&5], chunks[5]);
    }

    #[test]
    fn test_verify_detects_corruption() {
        let codec = ErasureCodec::new(ErasureConfig::new(4, 2)).unwrap();
        let data = b"Data to verify with erasure coding.";

        let chunks = codec.encode(data).unwrap();
        assert!(codec.verify(&chunks).unwrap());

        let mut corrupted = chunks;
        corrupted[0][0] ^= 0xFF;
        assert!(!codec.verify(&corrupted).unwrap());
    }

    #[test]
    fn test_all_k_m_shapes_roundtrip() {
        for (k, m) in [(1u8, 1u8), (2, 1), (8, 4), (16, 4)] {
            let codec = ErasureCodec::new(ErasureConfig::new(k, m)).unwrap();
            let data = vec![0xABu8; 5000];
            let chunks = codec.encode(&data).unwrap();
            let opts: Vec<Option<Vec<u8>>> = chunks.into_iter().map(Some).collect();
            let decoded = codec.decode(&opts, data.len()).unwrap();
            assert_eq!(decoded, data, "k={k} m={m}");
        }
    }
}
