//! ObjectIO Placement - consistent hash ring for object-to-set mapping
//!
//! Two placement primitives are exported:
//!
//! - [`ring::HashRing`]: a stateful ring with virtual nodes, suitable
//!   when sets are added and removed over the life of a deployment.
//! - [`jump::jump_hash`]: a stateless alternative for callers that know
//!   the bucket count a priori.
//!
//! # Example
//!
//! ```
//! use objectio_placement::HashRing;
//!
//! let mut ring = HashRing::new(150);
//! ring.add_node("pool0/set0");
//! ring.add_node("pool0/set1");
//! let owner = ring.lookup("photos/cat.jpg").unwrap();
//! ```

pub mod error;
pub mod jump;
pub mod ring;

pub use error::{PlacementError, Result};
pub use jump::jump_hash;
pub use ring::HashRing;
