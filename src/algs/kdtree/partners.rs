//! Round layout of the k-d tree build.
//!
//! Level `i` of the tree (one bisection) takes `m - i` histogram rounds and
//! one split round, where `nblocks = 2^m`. The histogram rounds form a
//! butterfly over swap rounds `i..m`, so every block sharing the current box
//! ends up with the same summed histogram. The split round then exchanges
//! points with the swap-round-`i` partner.

use crate::partners::{Partners, RegularSwapPartners};
use crate::reduce_error::ReduceError;
use crate::topology::link::Gid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KdRound {
    /// Send a partial histogram over swap round `swap_round`; `first` means the
    /// block computes it from its own points.
    Histogram {
        level: usize,
        swap_round: usize,
        first: bool,
    },
    /// Cut the box and send the points that changed sides.
    Split { level: usize },
}

impl KdRound {
    pub fn level(self) -> usize {
        match self {
            KdRound::Histogram { level, .. } | KdRound::Split { level } => level,
        }
    }

    fn swap_round(self) -> usize {
        match self {
            KdRound::Histogram { swap_round, .. } => swap_round,
            KdRound::Split { level } => level,
        }
    }
}

#[derive(Debug, Clone)]
pub struct KdTreePartners {
    swap: RegularSwapPartners,
    kinds: Vec<KdRound>,
}

impl KdTreePartners {
    /// Schedule for `nblocks = 2^m` blocks.
    pub fn new(nblocks: usize) -> Result<Self, ReduceError> {
        if !nblocks.is_power_of_two() {
            return Err(ReduceError::NotPowerOfTwo(nblocks));
        }
        let swap = RegularSwapPartners::new(nblocks, 2, false)?;
        let m = swap.rounds();
        let mut kinds = Vec::new();
        for level in 0..m {
            for swap_round in level..m {
                kinds.push(KdRound::Histogram {
                    level,
                    swap_round,
                    first: swap_round == level,
                });
            }
            kinds.push(KdRound::Split { level });
        }
        Ok(Self { swap, kinds })
    }

    /// Kind of driver round `round`; `None` for the final, consume-only round.
    pub fn kind(&self, round: usize) -> Option<KdRound> {
        self.kinds.get(round).copied()
    }

    /// Number of bisection levels, `log2(nblocks)`.
    pub fn levels(&self) -> usize {
        self.swap.rounds()
    }

    pub fn split_rounds(&self) -> usize {
        self.levels()
    }

    pub fn histogram_rounds(&self) -> usize {
        self.kinds.len() - self.levels()
    }

    /// The block `gid` exchanges points with at `level`.
    pub fn partner(&self, level: usize, gid: Gid) -> Gid {
        gid ^ self.swap.step(level)
    }

    /// Whether `gid` keeps the lower half at `level`.
    pub fn keeps_lower(&self, level: usize, gid: Gid) -> bool {
        self.swap.position(level, gid) == 0
    }
}

impl Partners for KdTreePartners {
    fn nblocks(&self) -> usize {
        self.swap.nblocks()
    }

    fn rounds(&self) -> usize {
        self.kinds.len()
    }

    fn active(&self, _round: usize, _gid: Gid) -> bool {
        true
    }

    fn incoming(&self, round: usize, gid: Gid) -> Vec<Gid> {
        match round.checked_sub(1).and_then(|r| self.kind(r)) {
            Some(kind) => self.swap.group(kind.swap_round(), gid),
            None => Vec::new(),
        }
    }

    fn outgoing(&self, round: usize, gid: Gid) -> Vec<Gid> {
        match self.kind(round) {
            Some(kind) => self.swap.group(kind.swap_round(), gid),
            None => Vec::new(),
        }
    }
}
