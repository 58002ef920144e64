//! Merge schedule: groups funnel into their root, which alone continues.

use crate::partners::Partners;
use crate::partners::regular::RegularPartners;
use crate::reduce_error::ReduceError;
use crate::topology::link::Gid;
use std::ops::Deref;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegularMergePartners {
    inner: RegularPartners,
}

impl RegularMergePartners {
    pub fn new(nblocks: usize, k: usize, contiguous: bool) -> Result<Self, ReduceError> {
        Ok(Self {
            inner: RegularPartners::new(nblocks, k, contiguous)?,
        })
    }

    /// The block holding the fully merged result.
    pub fn final_root(&self) -> Gid {
        0
    }
}

impl Deref for RegularMergePartners {
    type Target = RegularPartners;

    fn deref(&self) -> &RegularPartners {
        &self.inner
    }
}

impl Partners for RegularMergePartners {
    fn nblocks(&self) -> usize {
        self.inner.nblocks()
    }

    fn rounds(&self) -> usize {
        self.inner.rounds()
    }

    /// Active while `gid` has been the root of every earlier group.
    fn active(&self, round: usize, gid: Gid) -> bool {
        (0..round).all(|r| self.inner.position(r, gid) == 0)
    }

    fn incoming(&self, round: usize, gid: Gid) -> Vec<Gid> {
        if round == 0 || !self.active(round, gid) {
            Vec::new()
        } else {
            self.inner.group(round - 1, gid)
        }
    }

    fn outgoing(&self, round: usize, gid: Gid) -> Vec<Gid> {
        if round < self.rounds() && self.active(round, gid) {
            vec![self.inner.root(round, gid)]
        } else {
            Vec::new()
        }
    }
}
