//! Spatial topology of blocks.
//!
//! - [`bounds::Bounds`]: continuous axis-aligned boxes
//! - [`direction::Direction`]: face/edge/corner tags for neighbor entries
//! - [`link::Link`]: a block's neighbor table

pub mod bounds;
pub mod direction;
pub mod link;

pub use bounds::Bounds;
pub use direction::Direction;
pub use link::{BlockId, Gid, Link, Neighbor};
