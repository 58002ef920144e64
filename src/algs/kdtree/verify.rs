//! Diagnostic checks on a finished decomposition. Nothing here fails: every
//! finding is returned and logged at `warn`.

use super::SpatialPoint;
use crate::topology::bounds::Bounds;
use crate::topology::link::{Gid, Link};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsistencyWarning {
    /// Point `index` of block `gid` lies outside the block's bounds.
    PointOutside { gid: Gid, index: usize },
    /// The bounds stored for `neighbor` differ from its actual bounds.
    BoundsMismatch { gid: Gid, neighbor: Gid },
    /// A neighbor entry whose box does not touch the block, across the
    /// periodic faces included when the domain wraps.
    NotIntersecting { gid: Gid, neighbor: Gid },
    /// A leaf touching the block, possibly through a periodic face, is missing
    /// from its link.
    MissingNeighbor { gid: Gid, neighbor: Gid },
}

impl fmt::Display for ConsistencyWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PointOutside { gid, index } => {
                write!(f, "block {gid}: point {index} lies outside its bounds")
            }
            Self::BoundsMismatch { gid, neighbor } => {
                write!(f, "block {gid}: stored bounds of neighbor {neighbor} are stale")
            }
            Self::NotIntersecting { gid, neighbor } => {
                write!(f, "block {gid}: neighbor {neighbor} does not touch it")
            }
            Self::MissingNeighbor { gid, neighbor } => {
                write!(f, "block {gid}: adjacent block {neighbor} is not in its link")
            }
        }
    }
}

/// Closed-box intersection: touching counts. With `wrap`, boxes on opposite
/// faces of `domain` touch along that axis.
pub fn intersects(a: &Bounds, b: &Bounds, wrap: bool, domain: &Bounds) -> bool {
    a.dim() == b.dim() && (0..a.dim()).all(|d| intersects_along(a, b, d, wrap, domain))
}

fn intersects_along(a: &Bounds, b: &Bounds, axis: usize, wrap: bool, domain: &Bounds) -> bool {
    if wrap && axis < domain.dim() {
        let (lo, hi) = (domain.min[axis], domain.max[axis]);
        if (a.min[axis] == lo && b.max[axis] == hi) || (b.min[axis] == lo && a.max[axis] == hi) {
            return true;
        }
    }
    a.touches_or_overlaps(b, axis)
}

/// Check one leaf against the final bounds of every leaf.
pub fn verify_leaf<P: SpatialPoint>(
    gid: Gid,
    link: &Link,
    points: &[P],
    leaves: &BTreeMap<Gid, Bounds>,
    wrap: bool,
    domain: &Bounds,
) -> Vec<ConsistencyWarning> {
    let mut warnings = Vec::new();
    let own = link.bounds();

    for (index, p) in points.iter().enumerate() {
        if !own.contains_with(|d| p.coord(d)) {
            warnings.push(ConsistencyWarning::PointOutside { gid, index });
        }
    }

    let mut listed = BTreeSet::new();
    for n in link.neighbors() {
        let neighbor = n.target.gid;
        listed.insert(neighbor);
        if leaves.get(&neighbor).is_some_and(|actual| *actual != n.bounds) {
            warnings.push(ConsistencyWarning::BoundsMismatch { gid, neighbor });
        }
        if !intersects(own, &n.bounds, wrap, domain) {
            warnings.push(ConsistencyWarning::NotIntersecting { gid, neighbor });
        }
    }

    for (&other, bounds) in leaves {
        if other != gid && !listed.contains(&other) && intersects(own, bounds, wrap, domain) {
            warnings.push(ConsistencyWarning::MissingNeighbor {
                gid,
                neighbor: other,
            });
        }
    }

    warnings.dedup();
    for w in &warnings {
        log::warn!("{w}");
    }
    warnings
}
