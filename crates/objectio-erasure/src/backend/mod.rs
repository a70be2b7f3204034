//! Erasure coding backend abstraction
//!
//! This module provides a trait-based abstraction for the Reed-Solomon
//! MDS backend, leaving room for an alternate backend to be slotted in
//! later without touching `codec.rs`.

pub mod rust_simd;

use crate::ErasureError;

/// Result type for backend operations
pub type BackendResult<T> = Result<T, ErasureError>;

/// Capabilities of an erasure coding backend
#[derive(Clone, Debug, Default)]
pub struct BackendCapabilities {
    pub name: &'static str,
    pub supports_simd: bool,
    pub max_data_chunks: usize,
    pub max_parity_chunks: usize,
}

/// Core trait for MDS (Maximum Distance Separable) erasure coding
/// backends, typically Reed-Solomon.
pub trait ErasureBackend: Send + Sync {
    fn capabilities(&self) -> BackendCapabilities;

    fn data_chunks(&self) -> usize;

    fn parity_chunks(&self) -> usize;

    fn total_chunks(&self) -> usize {
        self.data_chunks() + self.parity_chunks()
    }

    fn min_chunks_for_decode(&self) -> usize {
        self.data_chunks()
    }

    /// Encode `k` data chunks of equal size into `k+m` chunks (data chunks
    /// copied through, parity chunks computed).
    fn encode(&self, data_chunks: &[&[u8]], chunk_size: usize) -> BackendResult<Vec<Vec<u8>>>;

    /// Reconstruct exactly the chunks named in `missing_indices`, given at
    /// least `k` present chunks (data or parity) among `chunks`.
    ///
    /// Unlike a plain RS decode, this must be able to rebuild a missing
    /// *parity* chunk too: that requires the full set of `k` data chunks
    /// to be known (present or already recovered), then re-encoding.
    fn reconstruct(
        &self,
        chunks: &[Option<&[u8]>],
        chunk_size: usize,
        missing_indices: &[usize],
    ) -> BackendResult<Vec<Vec<u8>>>;

    /// Re-encode the data chunks and compare against the provided parity
    /// chunks.
    fn verify(&self, chunks: &[&[u8]]) -> BackendResult<bool>;
}

pub use rust_simd::RustSimdBackend;
