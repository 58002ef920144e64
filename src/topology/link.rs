//! Per-block neighbor table.
//!
//! A [`Link`] stores one [`Neighbor`] record per entry instead of parallel
//! arrays, so target, direction and bounds can never fall out of step.

use crate::topology::bounds::Bounds;
use crate::topology::direction::Direction;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Global block identifier.
pub type Gid = usize;

/// A block together with the process that owns it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BlockId {
    pub gid: Gid,
    pub proc: usize,
}

impl BlockId {
    pub fn new(gid: Gid, proc: usize) -> Self {
        Self { gid, proc }
    }
}

/// One neighbor entry.
///
/// `wrap` holds the subset of `direction` bits that cross a periodic boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Neighbor {
    pub target: BlockId,
    pub direction: Direction,
    pub wrap: Direction,
    pub bounds: Bounds,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Link {
    bounds: Bounds,
    neighbors: Vec<Neighbor>,
}

impl Link {
    /// Empty link for a block covering `bounds`.
    pub fn new(bounds: Bounds) -> Self {
        Self {
            bounds,
            neighbors: Vec::new(),
        }
    }

    /// A link that lists the block itself in every face direction, the initial
    /// state of a single periodic block.
    pub fn periodic_self(me: BlockId, bounds: Bounds) -> Self {
        let mut link = Self::new(bounds.clone());
        for axis in 0..bounds.dim() {
            for upper in [false, true] {
                let dir = Direction::new(axis, upper);
                link.add_wrapped_neighbor(me, dir, dir, bounds.clone());
            }
        }
        link
    }

    #[inline]
    pub fn dim(&self) -> usize {
        self.bounds.dim()
    }

    /// The block's own bounds.
    #[inline]
    pub fn bounds(&self) -> &Bounds {
        &self.bounds
    }

    pub fn set_bounds(&mut self, bounds: Bounds) {
        self.bounds = bounds;
    }

    /// Number of entries (a periodic neighbor may appear more than once).
    #[inline]
    pub fn size(&self) -> usize {
        self.neighbors.len()
    }

    /// Number of distinct target gids.
    pub fn size_unique(&self) -> usize {
        self.unique_targets().len()
    }

    /// Distinct targets in gid order.
    pub fn unique_targets(&self) -> Vec<BlockId> {
        let set: BTreeSet<BlockId> = self.neighbors.iter().map(|n| n.target).collect();
        set.into_iter().collect()
    }

    #[inline]
    pub fn target(&self, i: usize) -> BlockId {
        self.neighbors[i].target
    }

    #[inline]
    pub fn direction(&self, i: usize) -> Direction {
        self.neighbors[i].direction
    }

    #[inline]
    pub fn wrap(&self, i: usize) -> Direction {
        self.neighbors[i].wrap
    }

    #[inline]
    pub fn neighbor_bounds(&self, i: usize) -> &Bounds {
        &self.neighbors[i].bounds
    }

    pub fn neighbors(&self) -> &[Neighbor] {
        &self.neighbors
    }

    /// Index of the first entry pointing at `gid`.
    pub fn find(&self, gid: Gid) -> Option<usize> {
        self.neighbors.iter().position(|n| n.target.gid == gid)
    }

    /// Append a non-periodic neighbor entry.
    pub fn add_neighbor(&mut self, target: BlockId, direction: Direction, bounds: Bounds) {
        self.add_wrapped_neighbor(target, direction, Direction::EMPTY, bounds);
    }

    pub fn add_wrapped_neighbor(
        &mut self,
        target: BlockId,
        direction: Direction,
        wrap: Direction,
        bounds: Bounds,
    ) {
        self.neighbors.push(Neighbor {
            target,
            direction,
            wrap,
            bounds,
        });
    }

    pub fn push(&mut self, neighbor: Neighbor) {
        self.neighbors.push(neighbor);
    }

    /// Replace every entry at once.
    pub fn replace_neighbors(&mut self, neighbors: Vec<Neighbor>) {
        self.neighbors = neighbors;
    }

    pub fn clear(&mut self) {
        self.neighbors.clear();
    }
}
