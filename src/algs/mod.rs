//! Re-export public algorithms.

pub mod all_to_all;
pub mod communicator;
pub mod exchange;
pub mod kdtree;
pub mod reduce;
pub mod wire;

pub use all_to_all::{AllToAllProxy, all_to_all};
pub use kdtree::{KdTreeSummary, kdtree};
pub use reduce::{reduce, reduce_with_skip};
