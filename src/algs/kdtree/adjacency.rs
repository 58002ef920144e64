//! Neighbor tables for the final leaves.
//!
//! Two leaves are neighbors when, on every axis, their extents overlap or
//! touch (directly or across a periodic face), and they are not merely the
//! same interior. One entry is produced per distinct `(direction, wrap)`
//! combination, so corners, edges and wrapped faces all appear.

use crate::master::assigner::Assigner;
use crate::topology::bounds::Bounds;
use crate::topology::direction::Direction;
use crate::topology::link::{Gid, Neighbor};
use itertools::Itertools;
use std::collections::BTreeSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Contact {
    Overlap,
    Touch { upper: bool },
    Wrap { upper: bool },
}

fn contacts(me: &Bounds, other: &Bounds, axis: usize, domain: &Bounds, wrap: bool, same: bool) -> Vec<Contact> {
    let mut out = Vec::with_capacity(3);
    if me.min[axis] < other.max[axis] && other.min[axis] < me.max[axis] {
        out.push(Contact::Overlap);
    }
    if !same {
        if me.max[axis] == other.min[axis] {
            out.push(Contact::Touch { upper: true });
        }
        if me.min[axis] == other.max[axis] {
            out.push(Contact::Touch { upper: false });
        }
    }
    if wrap {
        if me.max[axis] == domain.max[axis] && other.min[axis] == domain.min[axis] {
            out.push(Contact::Wrap { upper: true });
        }
        if me.min[axis] == domain.min[axis] && other.max[axis] == domain.max[axis] {
            out.push(Contact::Wrap { upper: false });
        }
    }
    out
}

/// Direction and wrap tags under which `other` neighbors `me`, in a fixed order.
pub fn contact_directions(
    me: &Bounds,
    other: &Bounds,
    domain: &Bounds,
    wrap: bool,
    same: bool,
) -> Vec<(Direction, Direction)> {
    let per_axis: Vec<Vec<Contact>> = (0..me.dim())
        .map(|axis| contacts(me, other, axis, domain, wrap, same))
        .collect();
    if per_axis.iter().any(|c| c.is_empty()) {
        return Vec::new();
    }
    let mut seen = BTreeSet::new();
    per_axis
        .iter()
        .map(|c| c.iter().copied())
        .multi_cartesian_product()
        .filter_map(|combo| {
            let mut dir = Direction::EMPTY;
            let mut wrapped = Direction::EMPTY;
            for (axis, contact) in combo.into_iter().enumerate() {
                match contact {
                    Contact::Overlap => {}
                    Contact::Touch { upper } => dir |= Direction::new(axis, upper),
                    Contact::Wrap { upper } => {
                        dir |= Direction::new(axis, upper);
                        wrapped |= Direction::new(axis, upper);
                    }
                }
            }
            (!dir.is_empty()).then_some((dir, wrapped))
        })
        .filter(|entry| seen.insert(*entry))
        .collect()
}

/// Neighbor entries of leaf `me` among `leaves` (which may include `me`).
pub fn leaf_neighbors<A>(
    me: Gid,
    bounds: &Bounds,
    leaves: &[(Gid, Bounds)],
    domain: &Bounds,
    wrap: bool,
    assigner: &A,
) -> Vec<Neighbor>
where
    A: Assigner + ?Sized,
{
    let mut out = Vec::new();
    for (gid, other) in leaves {
        for (direction, wrapped) in contact_directions(bounds, other, domain, wrap, *gid == me) {
            out.push(Neighbor {
                target: assigner.block_id(*gid),
                direction,
                wrap: wrapped,
                bounds: other.clone(),
            });
        }
    }
    out.sort_by_key(|n| (n.target.gid, n.direction, n.wrap));
    out
}
