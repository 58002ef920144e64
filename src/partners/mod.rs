//! Communication-free round schedules.
//!
//! A [`Partners`] schedule tells the reduce driver, for every round and gid,
//! whether the block takes part, whom it hears from and whom it sends to.
//! Every process derives the same answers from `nblocks` alone.

pub mod merge;
pub mod regular;
pub mod skip;
pub mod swap;

use crate::topology::link::Gid;

pub use merge::RegularMergePartners;
pub use regular::RegularPartners;
pub use skip::{NoSkip, Skip, SkipIntermediate};
pub use swap::{RegularAllToAllPartners, RegularSwapPartners};

pub trait Partners: Send + Sync {
    fn nblocks(&self) -> usize;

    /// Number of exchange rounds `R`. The driver runs callbacks for rounds
    /// `0..=R`; round `R` only consumes.
    fn rounds(&self) -> usize;

    /// Whether `gid` runs its callback in `round`.
    fn active(&self, round: usize, gid: Gid) -> bool;

    /// Senders whose round `round - 1` output `gid` consumes in `round`.
    fn incoming(&self, round: usize, gid: Gid) -> Vec<Gid>;

    /// Receivers of `gid`'s output in `round`. Empty for `round == rounds()`.
    fn outgoing(&self, round: usize, gid: Gid) -> Vec<Gid>;
}
