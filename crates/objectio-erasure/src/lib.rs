//! ObjectIO Erasure Coding
//!
//! MDS (Maximum Distance Separable) Reed-Solomon erasure coding: any `k`
//! of the `k+m` chunks produced by `encode` reconstruct the original
//! payload. Backed by `reed-solomon-simd`, portable across platforms.
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

pub mod backend;
pub mod codec;

pub use codec::{ErasureCodec, ErasureError};

pub use backend::{BackendCapabilities, ErasureBackend, RustSimdBackend};

/// Prelude for common imports
pub mod prelude {
    pub use super::{ErasureBackend, ErasureCodec, ErasureError};
}
