//! Parallel k-d tree partitioning.
//!
//! [`kdtree`] bisects the domain `log2(nblocks)` times. At each level the
//! blocks sharing a box sum their histograms along the level's axis
//! (`level % dim`), cut at the approximate median, and swap the points that
//! end up on the other side. Afterwards every block owns one leaf box and
//! exactly the points inside it, and every link is rebuilt from the final
//! leaf bounds.
//!
//! Conventions:
//! - histogram bins are half-open, the last one closed;
//! - a point with coordinate `< cut` belongs to the lower box, `>= cut` to the upper;
//! - of the two blocks exchanging at a level, the one with the lower gid keeps the lower box.

pub mod adjacency;
pub mod histogram;
pub mod partners;
mod partition;
pub mod verify;

use crate::algs::all_to_all::all_to_all;
use crate::algs::communicator::Communicator;
use crate::algs::reduce::{check_ownership, reduce};
use crate::master::Master;
use crate::master::assigner::Assigner;
use crate::partners::Partners;
use crate::reduce_error::ReduceError;
use crate::topology::bounds::Bounds;
use crate::topology::direction::Direction;
use num_traits::AsPrimitive;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::atomic::Ordering;

pub use adjacency::leaf_neighbors;
pub use histogram::Histogram;
pub use partners::{KdRound, KdTreePartners};
pub use verify::{ConsistencyWarning, intersects, verify_leaf};

use partition::KdTreePartition;

/// Anything with coordinates along numbered axes.
pub trait SpatialPoint {
    fn coord(&self, axis: usize) -> f64;
}

impl<T: AsPrimitive<f64>, const D: usize> SpatialPoint for [T; D] {
    #[inline]
    fn coord(&self, axis: usize) -> f64 {
        self[axis].as_()
    }
}

impl<T: AsPrimitive<f64>> SpatialPoint for Vec<T> {
    #[inline]
    fn coord(&self, axis: usize) -> f64 {
        self[axis].as_()
    }
}

/// What one [`kdtree`] call did on this process.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KdTreeSummary {
    /// Bisection levels, `log2(nblocks)`.
    pub split_rounds: usize,
    /// Histogram exchange rounds across all levels.
    pub histogram_rounds: usize,
    /// Driver rounds, histogram and split together.
    pub rounds: usize,
    /// Split callbacks run by local blocks.
    pub split_invocations: usize,
    /// Points local blocks handed to their partners.
    pub points_sent: usize,
}

/// Partition `domain` across all blocks.
///
/// `points` selects the point vector of a block; pass a function item such as
/// `fn points(b: &mut MyBlock) -> &mut Vec<[f64; 3]>`. `bins` is the histogram
/// resolution per cut. With `wrap`, opposite domain faces are adjacent.
///
/// Fails with [`ReduceError::NotPowerOfTwo`] before anything is touched when
/// `nblocks` is not a power of two, and with [`ReduceError::InvalidConfig`]
/// when `dim` is zero or more than neighbor directions can tag.
pub fn kdtree<B, C, A, P, F>(
    master: &mut Master<B, C>,
    assigner: &A,
    dim: usize,
    domain: &Bounds,
    points: F,
    bins: usize,
    wrap: bool,
) -> Result<KdTreeSummary, ReduceError>
where
    B: Send,
    C: Communicator,
    A: Assigner + ?Sized,
    P: SpatialPoint + Serialize + DeserializeOwned + Send + 'static,
    F: Fn(&mut B) -> &mut Vec<P> + Sync,
{
    let nblocks = assigner.nblocks();
    if !nblocks.is_power_of_two() {
        return Err(ReduceError::NotPowerOfTwo(nblocks));
    }
    if dim == 0 {
        return Err(ReduceError::InvalidConfig("k-d tree needs at least one dimension".into()));
    }
    if dim > Direction::MAX_AXES {
        return Err(ReduceError::InvalidConfig(format!(
            "k-d tree supports at most {} dimensions, got {dim}",
            Direction::MAX_AXES
        )));
    }
    domain.check()?;
    if domain.dim() != dim {
        return Err(ReduceError::InvalidBounds(format!(
            "domain has {} dimensions, expected {dim}",
            domain.dim()
        )));
    }
    if bins == 0 {
        return Err(ReduceError::InvalidConfig("k-d tree needs at least one histogram bin".into()));
    }
    check_ownership(master, assigner, nblocks)?;

    let partners = KdTreePartners::new(nblocks)?;
    for lid in 0..master.size() {
        master.link_mut(lid).set_bounds(domain.clone());
    }

    let partition = KdTreePartition::new(&partners, dim, bins, &points);
    reduce(master, assigner, &partners, |block, proxy| partition.run(block, proxy))?;

    let fan_out = master.config().fan_out;
    all_to_all(
        master,
        assigner,
        |_, proxy| {
            if proxy.round() == 0 {
                let own = proxy.link().bounds().clone();
                for dst in 0..proxy.nblocks() {
                    proxy.enqueue(dst, &own)?;
                }
            } else {
                let mut leaves = Vec::with_capacity(proxy.nblocks());
                for source in proxy.incoming_sources() {
                    leaves.push((source, proxy.dequeue::<Bounds>(source)?));
                }
                let own = proxy.link().bounds().clone();
                let neighbors = leaf_neighbors(proxy.gid(), &own, &leaves, domain, wrap, assigner);
                proxy.link_mut().replace_neighbors(neighbors);
            }
            Ok(())
        },
        fan_out,
    )?;
    let expected = master.recompute_expected();

    let summary = KdTreeSummary {
        split_rounds: partners.split_rounds(),
        histogram_rounds: partners.histogram_rounds(),
        rounds: partners.rounds(),
        split_invocations: partition.split_invocations.load(Ordering::Relaxed),
        points_sent: partition.points_sent.load(Ordering::Relaxed),
    };
    log::info!(
        "k-d tree on rank {}: {} split rounds over {} blocks, {} points migrated, {} expected neighbor queues",
        master.rank(),
        summary.split_rounds,
        nblocks,
        summary.points_sent,
        expected
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algs::communicator::NoComm;
    use crate::config::ReduceConfig;
    use crate::master::assigner::ContiguousAssigner;
    use crate::topology::Link;

    type Block = Vec<[f64; 2]>;

    fn pts(b: &mut Block) -> &mut Vec<[f64; 2]> {
        b
    }

    #[test]
    fn two_blocks_split_at_the_median() {
        let domain = Bounds::cube(2, 0.0, 8.0).unwrap();
        let mut m: Master<Block, _> = Master::new(NoComm, &ReduceConfig::default()).unwrap();
        m.add(0, vec![[1.0, 1.0], [2.0, 5.0], [7.0, 1.0]], Link::new(domain.clone()))
            .unwrap();
        m.add(1, vec![[3.0, 2.0], [6.0, 6.0], [5.0, 3.0]], Link::new(domain.clone()))
            .unwrap();
        let a = ContiguousAssigner::new(1, 2).unwrap();
        let s = kdtree(&mut m, &a, 2, &domain, pts, 8, false).unwrap();
        assert_eq!(s.split_rounds, 1);
        assert_eq!(s.rounds, 2);
        assert_eq!(m.link(0).bounds().max[0], 4.0);
        assert_eq!(m.link(1).bounds().min[0], 4.0);
        assert_eq!(m.block(0).unwrap().len(), 3);
        assert_eq!(m.block(1).unwrap().len(), 3);
        assert_eq!(m.link(0).size_unique(), 1);
        assert_eq!(m.expected(), 2);
    }

    #[test]
    fn non_power_of_two_fails_before_touching_links() {
        let domain = Bounds::cube(2, 0.0, 1.0).unwrap();
        let start = Bounds::cube(2, 5.0, 6.0).unwrap();
        let mut m: Master<Block, _> = Master::new(NoComm, &ReduceConfig::default()).unwrap();
        for g in 0..3 {
            m.add(g, vec![], Link::new(start.clone())).unwrap();
        }
        let a = ContiguousAssigner::new(1, 3).unwrap();
        let err = kdtree(&mut m, &a, 2, &domain, pts, 8, false).unwrap_err();
        assert!(matches!(err, ReduceError::NotPowerOfTwo(3)));
        assert_eq!(m.link(0).bounds(), &start);
    }

    #[test]
    fn too_many_dimensions_are_rejected_up_front() {
        type Wide = Vec<Vec<f64>>;
        fn wide(b: &mut Wide) -> &mut Vec<Vec<f64>> {
            b
        }
        let domain = Bounds::cube(17, 0.0, 1.0).unwrap();
        let start = Bounds::cube(17, 5.0, 6.0).unwrap();
        let mut m: Master<Wide, _> = Master::new(NoComm, &ReduceConfig::default()).unwrap();
        for g in 0..2 {
            m.add(g, vec![vec![0.5; 17]], Link::new(start.clone())).unwrap();
        }
        let a = ContiguousAssigner::new(1, 2).unwrap();
        let err = kdtree(&mut m, &a, 17, &domain, wide, 8, false).unwrap_err();
        assert!(matches!(err, ReduceError::InvalidConfig(_)));
        assert_eq!(m.link(0).bounds(), &start);
        assert_eq!(m.block(1).unwrap().len(), 1);
    }
}
