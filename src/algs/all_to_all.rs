//! All-to-all on top of the reduce driver.
//!
//! The user callback runs twice per block: in round 0 it may enqueue to any
//! gid, in round 1 it dequeues by original sender. In between, envelopes travel
//! through a contiguous swap schedule, each round fixing one more digit of the
//! destination. The digits multiply to `nblocks` so no group is ragged; they
//! are `k` wide where `k` divides what is left. With `k >= nblocks` that is a
//! single exchange.

use crate::algs::communicator::Communicator;
use crate::algs::reduce::reduce;
use crate::algs::wire::Envelope;
use crate::master::Master;
use crate::master::assigner::Assigner;
use crate::partners::{Partners, RegularAllToAllPartners};
use crate::reduce_error::ReduceError;
use crate::topology::link::{Gid, Link};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::{BTreeMap, VecDeque};

/// Per-block view for [`all_to_all`] callbacks.
pub struct AllToAllProxy<'a> {
    gid: Gid,
    round: usize,
    nblocks: usize,
    link: &'a mut Link,
    outgoing: BTreeMap<Gid, Vec<Vec<u8>>>,
    incoming: BTreeMap<Gid, VecDeque<Vec<u8>>>,
}

impl<'a> AllToAllProxy<'a> {
    fn sending(gid: Gid, nblocks: usize, link: &'a mut Link) -> Self {
        Self {
            gid,
            round: 0,
            nblocks,
            link,
            outgoing: BTreeMap::new(),
            incoming: BTreeMap::new(),
        }
    }

    fn receiving(gid: Gid, nblocks: usize, link: &'a mut Link, envelopes: Vec<Envelope>) -> Self {
        let mut incoming: BTreeMap<Gid, VecDeque<Vec<u8>>> = BTreeMap::new();
        for env in envelopes {
            incoming.entry(env.from).or_default().extend(env.payloads);
        }
        Self {
            gid,
            round: 1,
            nblocks,
            link,
            outgoing: BTreeMap::new(),
            incoming,
        }
    }

    pub fn gid(&self) -> Gid {
        self.gid
    }

    /// `0` while sending, `1` while receiving.
    pub fn round(&self) -> usize {
        self.round
    }

    pub fn nblocks(&self) -> usize {
        self.nblocks
    }

    pub fn link(&self) -> &Link {
        &*self.link
    }

    pub fn link_mut(&mut self) -> &mut Link {
        &mut *self.link
    }

    /// Queue `value` for `dst`; allowed in round 0 only.
    pub fn enqueue<T: Serialize + ?Sized>(&mut self, dst: Gid, value: &T) -> Result<(), ReduceError> {
        if dst >= self.nblocks || self.round != 0 {
            return Err(ReduceError::NotInOutLink {
                block: self.gid,
                target: dst,
            });
        }
        let bytes = bincode::serialize(value).map_err(ReduceError::Encode)?;
        self.outgoing.entry(dst).or_default().push(bytes);
        Ok(())
    }

    /// Pop the oldest message `source` sent to this block.
    pub fn dequeue<T: DeserializeOwned>(&mut self, source: Gid) -> Result<T, ReduceError> {
        let bytes = self
            .incoming
            .get_mut(&source)
            .and_then(|q| q.pop_front())
            .ok_or(ReduceError::EmptyQueue {
                from: source,
                to: self.gid,
            })?;
        bincode::deserialize(&bytes).map_err(ReduceError::Decode)
    }

    /// Senders with pending messages, in gid order.
    pub fn incoming_sources(&self) -> Vec<Gid> {
        self.incoming
            .iter()
            .filter(|(_, q)| !q.is_empty())
            .map(|(&g, _)| g)
            .collect()
    }

    pub fn incoming_count(&self, source: Gid) -> usize {
        self.incoming.get(&source).map_or(0, |q| q.len())
    }

    fn into_envelopes(self) -> Vec<Envelope> {
        let from = self.gid;
        self.outgoing
            .into_iter()
            .map(|(to, payloads)| Envelope { from, to, payloads })
            .collect()
    }
}

/// Every block may send to every block (itself included); each receiver sees
/// the messages grouped by original sender. `k` is the group size per routing
/// round.
pub fn all_to_all<B, C, A, F>(
    master: &mut Master<B, C>,
    assigner: &A,
    f: F,
    k: usize,
) -> Result<(), ReduceError>
where
    B: Send,
    C: Communicator,
    A: Assigner + ?Sized,
    F: Fn(&mut B, &mut AllToAllProxy<'_>) -> Result<(), ReduceError> + Sync,
{
    let nblocks = assigner.nblocks();
    let partners = RegularAllToAllPartners::exact(nblocks, k.min(nblocks.max(2)), true)?;
    let rounds = partners.rounds();

    reduce(master, assigner, &partners, |block, proxy| {
        let gid = proxy.gid();
        let round = proxy.round();

        let envelopes = if round == 0 {
            let mut sender = AllToAllProxy::sending(gid, nblocks, proxy.link_mut());
            f(block, &mut sender)?;
            sender.into_envelopes()
        } else {
            let mut envelopes = Vec::new();
            let sources: Vec<Gid> = proxy.in_link().iter().map(|t| t.gid).collect();
            for source in sources {
                while proxy.has_incoming(source) {
                    envelopes.extend(proxy.dequeue::<Vec<Envelope>>(source)?);
                }
            }
            envelopes
        };

        if round < rounds {
            let mut routed: BTreeMap<Gid, Vec<Envelope>> = proxy
                .out_link()
                .iter()
                .map(|t| (t.gid, Vec::new()))
                .collect();
            for env in envelopes {
                let next = partners.member_toward(round, gid, env.to);
                routed.entry(next).or_default().push(env);
            }
            for (target, batch) in routed {
                proxy.enqueue(target, batch)?;
            }
        } else {
            if let Some(stray) = envelopes.iter().find(|e| e.to != gid) {
                return Err(ReduceError::UnexpectedMessage {
                    round,
                    block: gid,
                    source_gid: stray.from,
                });
            }
            let mut receiver = AllToAllProxy::receiving(gid, nblocks, proxy.link_mut(), envelopes);
            f(block, &mut receiver)?;
        }
        Ok(())
    })
}
