//! ReduceError: unified error type for block-reduce public APIs
//!
//! Every fallible operation in the crate returns `Result<_, ReduceError>`.
//! Transport failures are never retried: a round depends on the complete
//! delivery of the previous one, so a failed exchange ends the job.

use crate::topology::link::Gid;
use thiserror::Error;

/// Transport-level failure carried as the `source` of [`ReduceError::CommError`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct CommError(pub String);

/// Unified error type for block-reduce operations.
#[derive(Debug, Error)]
pub enum ReduceError {
    /// The k-d tree bisects once per round and needs `nblocks = 2^m`.
    #[error("k-d tree requires a number of blocks that is a power of 2, got {0}")]
    NotPowerOfTwo(usize),
    /// A configuration knob or call argument is out of range.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    /// A bounds box is malformed (`min > max` or mismatched dimensions).
    #[error("Invalid bounds: {0}")]
    InvalidBounds(String),
    /// A block with this gid was already added to the master.
    #[error("Block {0} is already registered with this master")]
    DuplicateBlock(Gid),
    /// The gid is not owned by this process.
    #[error("Block {0} is not owned by this process")]
    UnknownBlock(Gid),
    /// The block is spilled to external storage and not resident.
    #[error("Block {0} is not loaded in memory")]
    BlockNotLoaded(Gid),
    /// Point-to-point exchange with `neighbor` (a process rank) failed.
    #[error("Communication error with rank {neighbor}: {source}")]
    CommError {
        neighbor: usize,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// A receiver did not get a queue from a sender its schedule lists.
    #[error("Round {round}: block {block} expected a message from block {source_gid} that never arrived")]
    MissingMessages {
        round: usize,
        block: Gid,
        source_gid: Gid,
    },
    /// A queue arrived from a sender that is not in the receiver's in-link.
    #[error("Round {round}: block {block} received an unexpected message from block {source_gid}")]
    UnexpectedMessage {
        round: usize,
        block: Gid,
        source_gid: Gid,
    },
    /// `enqueue` was called for a target outside the current out-link.
    #[error("Block {block} tried to enqueue to block {target}, which is not in its out-link")]
    NotInOutLink { block: Gid, target: Gid },
    /// `dequeue` found no pending message.
    #[error("No pending message from block {from} to block {to}")]
    EmptyQueue { from: Gid, to: Gid },
    /// A same-process message was dequeued as a different type than it was enqueued.
    #[error("Message from block {from} to block {to} has an unexpected payload type")]
    PayloadType { from: Gid, to: Gid },
    #[error("Failed to encode payload: {0}")]
    Encode(#[source] bincode::Error),
    #[error("Failed to decode payload: {0}")]
    Decode(#[source] bincode::Error),
    /// External block storage failed.
    #[error("Storage error: {0}")]
    Storage(#[from] std::io::Error),
    /// The worker pool could not be built.
    #[error("Thread pool error: {0}")]
    ThreadPool(String),
}

impl ReduceError {
    pub(crate) fn comm(neighbor: usize, msg: impl Into<String>) -> Self {
        ReduceError::CommError {
            neighbor,
            source: Box::new(CommError(msg.into())),
        }
    }
}
