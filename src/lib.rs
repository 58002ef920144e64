#![cfg_attr(docsrs, feature(doc_cfg))]
//! # block-reduce
//!
//! block-reduce runs block-decomposed distributed computations. Work is cut
//! into many blocks (a payload plus a spatial box) spread over fewer
//! processes, and blocks talk to each other in deterministic,
//! round-synchronous patterns.
//!
//! ## Pieces
//! - [`master::Master`]: owns the local blocks and their [`topology::Link`]s and
//!   runs callbacks over them on a rayon pool, optionally spilling blocks to
//!   external [`master::Storage`]
//! - [`master::Assigner`]: pure gid → process mapping
//! - [`partners`]: communication-free swap and merge schedules
//! - [`algs::reduce`]: the round driver; [`algs::all_to_all`] builds on it
//! - [`algs::kdtree`]: histogram-median k-d tree partitioning with link rebuild
//! - [`algs::communicator`]: transport seam (`NoComm`, in-process `LocalComm`,
//!   and `MpiComm` behind the `mpi-support` feature)
//!
//! ## Determinism
//!
//! Schedules, split axes, cut coordinates and rebuilt links depend only on the
//! block count and the point data, never on message arrival order.
//!
//! ## Usage
//!
//! ```toml
//! [dependencies]
//! block-reduce = "0.3"
//! # features = ["mpi-support"]
//! ```

pub mod algs;
pub mod config;
pub mod debug_invariants;
pub mod master;
pub mod partners;
pub mod reduce_error;
pub mod topology;

pub use debug_invariants::DebugInvariants;
pub use reduce_error::ReduceError;

/// A convenient prelude to import the most-used traits & types:
pub mod prelude {
    pub use crate::algs::all_to_all::{AllToAllProxy, all_to_all};
    #[cfg(feature = "mpi-support")]
    pub use crate::algs::communicator::MpiComm;
    pub use crate::algs::communicator::{Communicator, LocalComm, NoComm};
    pub use crate::algs::kdtree::{KdTreeSummary, SpatialPoint, kdtree, verify_leaf};
    pub use crate::algs::reduce::{reduce, reduce_with_skip};
    pub use crate::config::ReduceConfig;
    pub use crate::debug_invariants::DebugInvariants;
    pub use crate::master::{
        Assigner, BincodeCodec, BlockCodec, ContiguousAssigner, FileStorage, Master,
        MemoryStorage, Proxy, RoundRobinAssigner, Storage,
    };
    pub use crate::partners::{
        NoSkip, Partners, RegularAllToAllPartners, RegularMergePartners, RegularPartners,
        RegularSwapPartners, Skip, SkipIntermediate,
    };
    pub use crate::reduce_error::ReduceError;
    pub use crate::topology::{BlockId, Bounds, Direction, Gid, Link, Neighbor};
}
