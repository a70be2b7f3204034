//! Pure Rust SIMD backend using reed-solomon-simd
//!
//! Provides portable MDS erasure coding using the `reed-solomon-simd`
//! crate, which uses SIMD instructions where available (SSE, AVX, NEON).

use super::{BackendCapabilities, BackendResult, ErasureBackend};
use crate::ErasureError;
use reed_solomon_simd::{ReedSolomonDecoder, ReedSolomonEncoder};

/// MDS Reed-Solomon backend. Any `k` of the `k+m` chunks it produces
/// reconstruct the original data.
pub struct RustSimdBackend {
    data_chunks: u8,
    parity_chunks: u8,
}

impl RustSimdBackend {
    pub fn new(data_chunks: u8, parity_chunks: u8) -> Result<Self, ErasureError> {
        if data_chunks == 0 {
            return Err(ErasureError::InvalidConfig("k must be > 0".into()));
        }
        if parity_chunks == 0 {
            return Err(ErasureError::InvalidConfig("m must be > 0".into()));
        }
        if data_chunks as usize + parity_chunks as usize > 255 {
            return Err(ErasureError::InvalidConfig("k+m must be <= 255".into()));
        }
        Ok(Self {
            data_chunks,
            parity_chunks,
        })
    }

    /// Re-encode from a fully-known set of `k` data chunks, returning
    /// just the `m` parity chunks. Used by `reconstruct` when a missing
    /// index falls in the parity range.
    fn re_encode_parity(
        &self,
        data: &[&[u8]],
        chunk_size: usize,
    ) -> BackendResult<Vec<Vec<u8>>> {
        let k = self.data_chunks as usize;
        let m = self.parity_chunks as usize;
        let mut encoder = ReedSolomonEncoder::new(k, m, chunk_size)
            .map_err(|e| ErasureError::InvalidConfig(e.to_string()))?;
        for chunk in data {
            encoder
                .add_original_shard(chunk)
                .map_err(|e| ErasureError::EncodingFailed(e.to_string()))?;
        }
        let result = encoder
            .encode()
            .map_err(|e| ErasureError::EncodingFailed(e.to_string()))?;
        Ok(result.recovery_iter().map(<[u8]>::to_vec).collect())
    }
}

impl ErasureBackend for RustSimdBackend {
    fn capabilities(&self) -> BackendCapabilities {
        BackendCapabilities {
            name: "rust_simd",
            supports_simd: true,
            max_data_chunks: 255,
            max_parity_chunks: 255,
        }
    }

    fn data_chunks(&self) -> usize {
        self.data_chunks as usize
    }

    fn parity_chunks(&self) -> usize {
        self.parity_chunks as usize
    }

    fn encode(&self, data_chunks: &[&[u8]], chunk_size: usize) -> BackendResult<Vec<Vec<u8>>> {
        let k = self.data_chunks as usize;
        let m = self.parity_chunks as usize;

        if data_chunks.len() != k {
            return Err(ErasureError::InvalidConfig(format!(
                "expected {k} data chunks, got {}",
                data_chunks.len()
            )));
        }
        for (i, chunk) in data_chunks.iter().enumerate() {
            if chunk.len() != chunk_size {
                return Err(ErasureError::InvalidConfig(format!(
                    "chunk {i} has size {}, expected {chunk_size}",
                    chunk.len()
                )));
            }
        }

        let mut encoder = ReedSolomonEncoder::new(k, m, chunk_size)
            .map_err(|e| ErasureError::InvalidConfig(e.to_string()))?;
        for chunk in data_chunks {
            encoder
                .add_original_shard(chunk)
                .map_err(|e| ErasureError::EncodingFailed(e.to_string()))?;
        }
        let result = encoder
            .encode()
            .map_err(|e| ErasureError::EncodingFailed(e.to_string()))?;

        let mut chunks: Vec<Vec<u8>> = Vec::with_capacity(k + m);
        for chunk in data_chunks {
            chunks.push(chunk.to_vec());
        }
        for parity in result.recovery_iter() {
            chunks.push(parity.to_vec());
        }
        Ok(chunks)
    }

    fn reconstruct(
        &self,
        chunks: &[Option<&[u8]>],
        chunk_size: usize,
        missing_indices: &[usize],
    ) -> BackendResult<Vec<Vec<u8>>> {
        let k = self.data_chunks as usize;
        let m = self.parity_chunks as usize;

        if chunks.len() != k + m {
            return Err(ErasureError::InvalidConfig(format!(
                "expected {} chunks, got {}",
                k + m,
                chunks.len()
            )));
        }

        let available = chunks.iter().filter(|c| c.is_some()).count();
        if available < k {
            return Err(ErasureError::InsufficientChunks {
                available,
                required: k,
            });
        }

        // Recover missing data chunks (if any) via the RS decoder.
        let missing_data: Vec<usize> = missing_indices.iter().copied().filter(|&i| i < k).collect();
        let mut recovered_data: Vec<Option<Vec<u8>>> = vec![None; k];

        if !missing_data.is_empty() {
            let mut decoder = ReedSolomonDecoder::new(k, m, chunk_size)
                .map_err(|e| ErasureError::InvalidConfig(e.to_string()))?;
            for (i, chunk) in chunks.iter().enumerate().take(k) {
                if let Some(data) = chunk {
                    decoder
                        .add_original_shard(i, data)
                        .map_err(|e| ErasureError::DecodingFailed(e.to_string()))?;
                }
            }
            for i in 0..m {
                if let Some(data) = chunks[k + i] {
                    decoder
                        .add_recovery_shard(i, data)
                        .map_err(|e| ErasureError::DecodingFailed(e.to_string()))?;
                }
            }
            let result = decoder
                .decode()
                .map_err(|e| ErasureError::DecodingFailed(e.to_string()))?;
            for &idx in &missing_data {
                let restored = result.restored_original(idx).ok_or_else(|| {
                    ErasureError::DecodingFailed(format!("failed to restore data chunk {idx}"))
                })?;
                recovered_data[idx] = Some(restored.to_vec());
            }
        }

        // Every requested missing parity chunk needs the full set of k
        // data chunks (present or just recovered above) re-encoded.
        let missing_parity: Vec<usize> = missing_indices
            .iter()
            .copied()
            .filter(|&i| i >= k)
            .collect();
        let parity_reencoded = if missing_parity.is_empty() {
            Vec::new()
        } else {
            let full_data: Vec<&[u8]> = (0..k)
                .map(|i| {
                    chunks[i]
                        .or_else(|| recovered_data[i].as_deref())
                        .expect("k data chunks available after recovery")
                })
                .collect();
            self.re_encode_parity(&full_data, chunk_size)?
        };

        let mut out = Vec::with_capacity(missing_indices.len());
        for &idx in missing_indices {
            if idx < k {
                out.push(recovered_data[idx].clone().ok_or_else(|| {
                    ErasureError::DecodingFailed(format!("chunk {idx} not reconstructed"))
                })?);
            } else {
                out.push(parity_reencoded[idx - k].clone());
            }
        }
        Ok(out)
    }

    fn verify(&self, chunks: &[&[u8]]) -> BackendResult<bool> {
        let k = self.data_chunks as usize;
        let m = self.parity_chunks as usize;

        if chunks.len() != k + m {
            return Ok(false);
        }
        let Some(first_len) = chunks.first().map(|s| s.len()) else {
            return Ok(true);
        };
        if !chunks.iter().all(|s| s.len() == first_len) {
            return Ok(false);
        }

        let data_chunks: Vec<&[u8]> = chunks[..k].to_vec();
        let encoded = self.encode(&data_chunks, first_len)?;
        for i in 0..m {
            if encoded[k + i] != chunks[k + i] {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_decode() {
        let backend = RustSimdBackend::new(4, 2).unwrap();

        let data: Vec<Vec<u8>> = (0..4).map(|i| vec![i as u8; 1024]).collect();
        let data_refs: Vec<&[u8]> = data.iter().map(Vec::as_slice).collect();

        let chunks = backend.encode(&data_refs, 1024).unwrap();
        assert_eq!(chunks.len(), 6);
        assert!(backend.verify(&chunks.iter().map(Vec::as_slice).collect::<Vec<_>>()).unwrap());
    }

    #[test]
    fn test_reconstruct_missing_data() {
        let backend = RustSimdBackend::new(4, 2).unwrap();
        let data: Vec<Vec<u8>> = (0..4).map(|i| vec![i as u8; 1024]).collect();
        let data_refs: Vec<&[u8]> = data.iter().map(Vec::as_slice).collect();
        let chunks = backend.encode(&data_refs, 1024).unwrap();

        let mut present: Vec<Option<&[u8]>> = chunks.iter().map(|c| Some(c.as_slice())).collect();
        present[0] = None;

        let recovered = backend.reconstruct(&present, 1024, &[0]).unwrap();
        assert_eq!(recovered[0], data[0]);
    }

    #[test]
    fn test_reconstruct_missing_parity() {
        let backend = RustSimdBackend::new(4, 2).unwrap();
        let data: Vec<Vec<u8>> = (0..4).map(|i| vec![i as u8; 1024]).collect();
        let data_refs: Vec<&[u8]> = data.iter().map(Vec::as_slice).collect();
        let chunks = backend.encode(&data_refs, 1024).unwrap();

        let mut present: Vec<Option<&[u8]>> = chunks.iter().map(|c| Some(c.as_slice())).collect();
        present[5] = None; // a parity chunk

        let recovered = backend.reconstruct(&present, 1024, &[5]).unwrap();
        assert_eq!(recovered[0], chunks[5]);
    }

    #[test]
    fn test_reconstruct_mixed_missing() {
        let backend = RustSimdBackend::new(4, 2).unwrap();
        let data: Vec<Vec<u8>> = (0..4).map(|i| vec![i as u8; 1024]).collect();
        let data_refs: Vec<&[u8]> = data.iter().map(Vec::as_slice).collect();
        let chunks = backend.encode(&data_refs, 1024).unwrap();

        let mut present: Vec<Option<&[u8]>> = chunks.iter().map(|c| Some(c.as_slice())).collect();
        present[1] = None; // data
        present[4] = None; // parity

        let recovered = backend.reconstruct(&present, 1024, &[1, 4]).unwrap();
        assert_eq!(recovered[0], data[1]);
        assert_eq!(recovered[1], chunks[4]);
    }

    #[test]
    fn test_insufficient_chunks() {
        let backend = RustSimdBackend::new(4, 2).unwrap();
        let present: Vec<Option<&[u8]>> = vec![Some(&[0u8; 64]), Some(&[0u8; 64]), None, None, None, None];
        let result = backend.reconstruct(&present, 64, &[2]);
        assert!(result.is_err());
    }
}
