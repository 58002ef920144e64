//! Block → process ownership.
//!
//! An assigner is a pure function of `(gid, nblocks, nprocs)`: every process
//! derives the owner of any block without communicating.

use crate::reduce_error::ReduceError;
use crate::topology::link::{BlockId, Gid};

pub trait Assigner: Send + Sync {
    /// Total number of blocks.
    fn nblocks(&self) -> usize;
    /// Total number of processes.
    fn nprocs(&self) -> usize;
    /// Owning process of `gid`.
    fn rank(&self, gid: Gid) -> usize;

    /// Gids owned by `rank`, in increasing order.
    fn local_gids(&self, rank: usize) -> Vec<Gid> {
        (0..self.nblocks()).filter(|&g| self.rank(g) == rank).collect()
    }

    #[inline]
    fn block_id(&self, gid: Gid) -> BlockId {
        BlockId::new(gid, self.rank(gid))
    }
}

fn check_sizes(nprocs: usize, nblocks: usize) -> Result<(), ReduceError> {
    if nprocs == 0 {
        return Err(ReduceError::InvalidConfig("assigner needs at least one process".into()));
    }
    if nblocks == 0 {
        return Err(ReduceError::InvalidConfig("assigner needs at least one block".into()));
    }
    Ok(())
}

/// Contiguous, near-equal ranges; the first `nblocks % nprocs` ranks get one extra block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContiguousAssigner {
    nprocs: usize,
    nblocks: usize,
}

impl ContiguousAssigner {
    pub fn new(nprocs: usize, nblocks: usize) -> Result<Self, ReduceError> {
        check_sizes(nprocs, nblocks)?;
        Ok(Self { nprocs, nblocks })
    }
}

impl Assigner for ContiguousAssigner {
    fn nblocks(&self) -> usize {
        self.nblocks
    }
    fn nprocs(&self) -> usize {
        self.nprocs
    }

    fn rank(&self, gid: Gid) -> usize {
        debug_assert!(gid < self.nblocks, "gid {gid} out of range");
        let base = self.nblocks / self.nprocs;
        let rem = self.nblocks % self.nprocs;
        let big = rem * (base + 1);
        if gid < big {
            gid / (base + 1)
        } else {
            rem + (gid - big) / base
        }
    }

    fn local_gids(&self, rank: usize) -> Vec<Gid> {
        if rank >= self.nprocs {
            return Vec::new();
        }
        let base = self.nblocks / self.nprocs;
        let rem = self.nblocks % self.nprocs;
        let from = rank * base + rank.min(rem);
        let count = base + usize::from(rank < rem);
        (from..from + count).collect()
    }
}

/// `gid % nprocs`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoundRobinAssigner {
    nprocs: usize,
    nblocks: usize,
}

impl RoundRobinAssigner {
    pub fn new(nprocs: usize, nblocks: usize) -> Result<Self, ReduceError> {
        check_sizes(nprocs, nblocks)?;
        Ok(Self { nprocs, nblocks })
    }
}

impl Assigner for RoundRobinAssigner {
    fn nblocks(&self) -> usize {
        self.nblocks
    }
    fn nprocs(&self) -> usize {
        self.nprocs
    }
    fn rank(&self, gid: Gid) -> usize {
        gid % self.nprocs
    }
    fn local_gids(&self, rank: usize) -> Vec<Gid> {
        (rank..self.nblocks).step_by(self.nprocs).collect()
    }
}
