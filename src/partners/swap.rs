//! Swap schedule: every block stays active and exchanges with its whole
//! group each round.

use crate::partners::Partners;
use crate::partners::regular::RegularPartners;
use crate::reduce_error::ReduceError;
use crate::topology::link::Gid;
use std::ops::Deref;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegularSwapPartners {
    inner: RegularPartners,
}

/// The swap schedule all-to-all routes through, built with
/// [`RegularSwapPartners::exact`].
pub type RegularAllToAllPartners = RegularSwapPartners;

impl RegularSwapPartners {
    pub fn new(nblocks: usize, k: usize, contiguous: bool) -> Result<Self, ReduceError> {
        Ok(Self {
            inner: RegularPartners::new(nblocks, k, contiguous)?,
        })
    }

    /// Full groups over a mixed radix of `nblocks`.
    pub fn exact(nblocks: usize, k: usize, contiguous: bool) -> Result<Self, ReduceError> {
        Ok(Self {
            inner: RegularPartners::exact(nblocks, k, contiguous)?,
        })
    }
}

impl Deref for RegularSwapPartners {
    type Target = RegularPartners;

    fn deref(&self) -> &RegularPartners {
        &self.inner
    }
}

impl Partners for RegularSwapPartners {
    fn nblocks(&self) -> usize {
        self.inner.nblocks()
    }

    fn rounds(&self) -> usize {
        self.inner.rounds()
    }

    fn active(&self, _round: usize, _gid: Gid) -> bool {
        true
    }

    fn incoming(&self, round: usize, gid: Gid) -> Vec<Gid> {
        if round == 0 {
            Vec::new()
        } else {
            self.inner.group(round - 1, gid)
        }
    }

    fn outgoing(&self, round: usize, gid: Gid) -> Vec<Gid> {
        if round < self.rounds() {
            self.inner.group(round, gid)
        } else {
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_round_pairs_up_for_k_two() {
        let p = RegularSwapPartners::new(4, 2, false).unwrap();
        assert_eq!(p.rounds(), 2);
        assert_eq!(p.outgoing(0, 1), vec![1, 3]);
        assert_eq!(p.incoming(1, 1), vec![1, 3]);
        assert_eq!(p.outgoing(1, 1), vec![0, 1]);
        assert!(p.outgoing(2, 1).is_empty());
        assert!(p.incoming(0, 1).is_empty());
    }

    #[test]
    fn ragged_groups_never_exceed_k() {
        let p = RegularSwapPartners::new(14, 2, true).unwrap();
        assert_eq!(p.rounds(), 4);
        for r in 0..p.rounds() {
            for gid in 0..14 {
                assert!(p.outgoing(r, gid).len() <= 2);
                assert_eq!(p.incoming(r + 1, gid), p.outgoing(r, gid));
            }
        }
        assert_eq!(p.outgoing(1, 13), vec![13]);
    }
}
