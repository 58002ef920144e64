//! Predicates that elide a block's callback in a round.
//!
//! A skipped block still sends an empty queue to each out-link target, and the
//! messages it did not consume are carried into its next round.

use crate::topology::link::Gid;

pub trait Skip: Sync {
    fn skip(&self, round: usize, gid: Gid) -> bool;
}

/// Run every callback.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoSkip;

impl Skip for NoSkip {
    #[inline]
    fn skip(&self, _round: usize, _gid: Gid) -> bool {
        false
    }
}

/// Run only the first and the last round; the rounds between just forward.
#[derive(Debug, Clone, Copy)]
pub struct SkipIntermediate {
    rounds: usize,
}

impl SkipIntermediate {
    pub fn new(rounds: usize) -> Self {
        Self { rounds }
    }
}

impl Skip for SkipIntermediate {
    fn skip(&self, round: usize, _gid: Gid) -> bool {
        round != 0 && round != self.rounds
    }
}

impl<F> Skip for F
where
    F: Fn(usize, Gid) -> bool + Sync,
{
    fn skip(&self, round: usize, gid: Gid) -> bool {
        self(round, gid)
    }
}
