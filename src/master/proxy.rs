//! Per-block view handed to callbacks.
//!
//! A [`Proxy`] owns the block's inbound queues for the current round and
//! collects its outbound ones. Every out-link target gets exactly one queue
//! per round, possibly empty, so receivers know how many to expect.

use crate::reduce_error::ReduceError;
use crate::topology::link::{BlockId, Gid, Link};
use bytes::Bytes;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::any::Any;
use std::collections::{BTreeMap, VecDeque};

/// One queued value.
pub(crate) enum Message {
    /// Same-process delivery: moved, never serialized.
    Local(Box<dyn Any + Send>),
    /// Cross-process delivery: bincode bytes.
    Remote(Bytes),
}

pub(crate) type Queue = VecDeque<Message>;
/// Inbound queues keyed by sender gid.
pub(crate) type Inbox = BTreeMap<Gid, Queue>;

pub struct Proxy<'a> {
    gid: Gid,
    rank: usize,
    round: usize,
    in_link: Vec<BlockId>,
    out_link: Vec<BlockId>,
    incoming: Inbox,
    outgoing: BTreeMap<Gid, Queue>,
    link: &'a mut Link,
}

impl<'a> Proxy<'a> {
    pub(crate) fn new(
        gid: Gid,
        rank: usize,
        round: usize,
        in_link: Vec<BlockId>,
        out_link: Vec<BlockId>,
        incoming: Inbox,
        link: &'a mut Link,
    ) -> Self {
        let outgoing = out_link.iter().map(|t| (t.gid, Queue::new())).collect();
        Self {
            gid,
            rank,
            round,
            in_link,
            out_link,
            incoming,
            outgoing,
            link,
        }
    }

    #[inline]
    pub fn gid(&self) -> Gid {
        self.gid
    }

    #[inline]
    pub fn round(&self) -> usize {
        self.round
    }

    /// Senders whose round `round - 1` output this block receives.
    pub fn in_link(&self) -> &[BlockId] {
        &self.in_link
    }

    /// Receivers this block sends to in this round.
    pub fn out_link(&self) -> &[BlockId] {
        &self.out_link
    }

    pub fn link(&self) -> &Link {
        &*self.link
    }

    pub fn link_mut(&mut self) -> &mut Link {
        &mut *self.link
    }

    /// Queue `value` for `target`, which must be in the out-link.
    pub fn enqueue<T>(&mut self, target: Gid, value: T) -> Result<(), ReduceError>
    where
        T: Serialize + Send + 'static,
    {
        let proc = self
            .out_link
            .iter()
            .find(|t| t.gid == target)
            .map(|t| t.proc)
            .ok_or(ReduceError::NotInOutLink {
                block: self.gid,
                target,
            })?;
        let msg = if proc == self.rank {
            Message::Local(Box::new(value))
        } else {
            Message::Remote(Bytes::from(
                bincode::serialize(&value).map_err(ReduceError::Encode)?,
            ))
        };
        if let Some(queue) = self.outgoing.get_mut(&target) {
            queue.push_back(msg);
        }
        Ok(())
    }

    /// Pop the oldest message from `source`.
    pub fn dequeue<T>(&mut self, source: Gid) -> Result<T, ReduceError>
    where
        T: DeserializeOwned + 'static,
    {
        let msg = self
            .incoming
            .get_mut(&source)
            .and_then(|q| q.pop_front())
            .ok_or(ReduceError::EmptyQueue {
                from: source,
                to: self.gid,
            })?;
        match msg {
            Message::Local(any) => any.downcast::<T>().map(|b| *b).map_err(|_| {
                ReduceError::PayloadType {
                    from: source,
                    to: self.gid,
                }
            }),
            Message::Remote(bytes) => bincode::deserialize(&bytes).map_err(ReduceError::Decode),
        }
    }

    /// Pending messages from `source`.
    pub fn incoming_count(&self, source: Gid) -> usize {
        self.incoming.get(&source).map_or(0, |q| q.len())
    }

    pub fn has_incoming(&self, source: Gid) -> bool {
        self.incoming_count(source) > 0
    }

    /// Senders with at least one pending message, in gid order.
    pub fn incoming_sources(&self) -> Vec<Gid> {
        self.incoming
            .iter()
            .filter(|(_, q)| !q.is_empty())
            .map(|(&g, _)| g)
            .collect()
    }

    pub(crate) fn take_incoming(&mut self) -> Inbox {
        std::mem::take(&mut self.incoming)
    }

    /// Outbound queues paired with their targets, one per out-link entry.
    pub(crate) fn into_outgoing(self) -> Vec<(BlockId, Queue)> {
        let mut outgoing = self.outgoing;
        self.out_link
            .into_iter()
            .filter_map(|t| outgoing.remove(&t.gid).map(|q| (t, q)))
            .collect()
    }
}
