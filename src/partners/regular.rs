//! Digit decomposition of `[0, nblocks)` into round groups.
//!
//! Round `r` groups blocks by one digit of the gid. [`RegularPartners::new`]
//! uses plain base-`k` digits over `ceil(log_k nblocks)` rounds; when
//! `nblocks` is not a power of `k` the groups of the last digits are ragged
//! and hold only the members below `nblocks`. [`RegularPartners::exact`] uses
//! a mixed radix whose digit sizes multiply to `nblocks`, so every group is
//! full. With `contiguous = true` round 0 uses the lowest digit, so groups are
//! runs of neighboring gids; otherwise round 0 uses the highest digit.

use crate::reduce_error::ReduceError;
use crate::topology::link::Gid;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegularPartners {
    nblocks: usize,
    kvs: Vec<usize>,
    steps: Vec<usize>,
    contiguous: bool,
}

impl RegularPartners {
    /// Base-`k` digits: every group holds at most `k` blocks.
    pub fn new(nblocks: usize, k: usize, contiguous: bool) -> Result<Self, ReduceError> {
        Self::check(nblocks, k)?;
        let kvs = vec![k; Self::base_k_rounds(nblocks, k)];
        Ok(Self::with_radix(nblocks, kvs, contiguous))
    }

    /// Mixed radix from [`factor`](Self::factor): groups are never ragged,
    /// so [`member_toward`](Self::member_toward) always lands on a block.
    pub fn exact(nblocks: usize, k: usize, contiguous: bool) -> Result<Self, ReduceError> {
        Self::check(nblocks, k)?;
        Ok(Self::with_radix(nblocks, Self::factor(nblocks, k), contiguous))
    }

    fn check(nblocks: usize, k: usize) -> Result<(), ReduceError> {
        if nblocks == 0 {
            return Err(ReduceError::InvalidConfig("partners need at least one block".into()));
        }
        if k < 2 {
            return Err(ReduceError::InvalidConfig(format!(
                "group size must be at least 2, got {k}"
            )));
        }
        Ok(())
    }

    fn with_radix(nblocks: usize, kvs: Vec<usize>, contiguous: bool) -> Self {
        let mut steps = vec![1; kvs.len()];
        if contiguous {
            for r in 1..kvs.len() {
                steps[r] = steps[r - 1] * kvs[r - 1];
            }
        } else {
            for r in (0..kvs.len().saturating_sub(1)).rev() {
                steps[r] = steps[r + 1] * kvs[r + 1];
            }
        }
        Self {
            nblocks,
            kvs,
            steps,
            contiguous,
        }
    }

    /// Smallest `r` with `k^r >= nblocks`.
    pub fn base_k_rounds(nblocks: usize, k: usize) -> usize {
        let mut rounds = 0;
        let mut span = 1usize;
        while span < nblocks {
            span = span.saturating_mul(k);
            rounds += 1;
        }
        rounds
    }

    /// Digit sizes multiplying to `nblocks`: `k` while it divides what is
    /// left, otherwise the largest divisor not above `k`, otherwise the
    /// smallest prime factor.
    pub fn factor(nblocks: usize, k: usize) -> Vec<usize> {
        let mut kvs = Vec::new();
        let mut rest = nblocks;
        while rest > 1 {
            let kv = if rest % k == 0 {
                k
            } else if let Some(d) = (2..=k.min(rest)).rev().find(|d| rest % d == 0) {
                d
            } else {
                (2..=rest).find(|d| rest % d == 0).unwrap_or(rest)
            };
            kvs.push(kv);
            rest /= kv;
        }
        kvs
    }

    #[inline]
    pub fn nblocks(&self) -> usize {
        self.nblocks
    }

    #[inline]
    pub fn rounds(&self) -> usize {
        self.kvs.len()
    }

    pub fn contiguous(&self) -> bool {
        self.contiguous
    }

    /// Nominal group size of `round`; ragged groups hold fewer.
    #[inline]
    pub fn size(&self, round: usize) -> usize {
        self.kvs[round]
    }

    /// Gid distance between consecutive members of a group in `round`.
    #[inline]
    pub fn step(&self, round: usize) -> usize {
        self.steps[round]
    }

    /// Digit of `gid` used by `round`.
    #[inline]
    pub fn position(&self, round: usize, gid: Gid) -> usize {
        (gid / self.steps[round]) % self.kvs[round]
    }

    /// Digit-0 member of `gid`'s group in `round`; never above `gid`.
    #[inline]
    pub fn root(&self, round: usize, gid: Gid) -> Gid {
        gid - self.position(round, gid) * self.steps[round]
    }

    /// Members of `gid`'s group in `round` below `nblocks`, `gid` included,
    /// in gid order.
    pub fn group(&self, round: usize, gid: Gid) -> Vec<Gid> {
        let base = self.root(round, gid);
        (0..self.kvs[round])
            .map(|i| base + i * self.steps[round])
            .take_while(|&g| g < self.nblocks)
            .collect()
    }

    /// Member of `gid`'s group in `round` whose digit agrees with `dst`.
    /// When that member is past `nblocks` the group's root stands in.
    #[inline]
    pub fn member_toward(&self, round: usize, gid: Gid, dst: Gid) -> Gid {
        let root = self.root(round, gid);
        let member = root + self.position(round, dst) * self.steps[round];
        if member < self.nblocks { member } else { root }
    }
}
