//! The per-process block store.
//!
//! A [`Master`] owns the blocks assigned to this process together with their
//! links, runs callbacks over them on a rayon pool, and delivers the queues
//! those callbacks produce. Same-process queues are handed over directly;
//! everything else goes through the [`Communicator`] as one frame per peer.

pub mod assigner;
pub mod proxy;
pub mod storage;

use crate::algs::communicator::{CommTag, Communicator};
use crate::algs::exchange::exchange_frames;
use crate::algs::wire::{Envelope, KIND_EXCHANGE, decode_frame, encode_frame};
use crate::config::ReduceConfig;
use crate::debug_invariants::DebugInvariants;
use crate::reduce_error::ReduceError;
use crate::topology::link::{BlockId, Gid, Link};
use bytes::Bytes;
use rayon::prelude::*;
use std::collections::{BTreeMap, BTreeSet, HashMap};

pub use assigner::{Assigner, ContiguousAssigner, RoundRobinAssigner};
pub use proxy::Proxy;
pub use storage::{BincodeCodec, BlockCodec, FileStorage, MemoryStorage, Storage};

use proxy::{Inbox, Message, Queue};

/// Tag base for [`Master::exchange`].
pub const EXCHANGE_TAG: CommTag = CommTag::new(0x3000);

/// One locally owned block and its bookkeeping.
pub(crate) struct Slot<B> {
    pub(crate) gid: Gid,
    /// `None` while the block is spilled to storage.
    pub(crate) block: Option<B>,
    pub(crate) link: Link,
    /// Queues received by the last [`Master::exchange`].
    pub(crate) inbox: Inbox,
    /// Queues produced by the last [`Master::foreach`], waiting for `exchange`.
    pub(crate) outbox: Option<Vec<(BlockId, Queue)>>,
    /// Queues received during a reduce, consumed by the next round.
    pub(crate) round_inbox: Inbox,
}

impl<B> Slot<B> {
    /// Split borrow of the payload and the link.
    pub(crate) fn parts(&mut self) -> Result<(&mut B, &mut Link), ReduceError> {
        match self.block.as_mut() {
            Some(block) => Ok((block, &mut self.link)),
            None => Err(ReduceError::BlockNotLoaded(self.gid)),
        }
    }
}

struct Spill<B> {
    codec: Box<dyn BlockCodec<B>>,
    storage: Box<dyn Storage>,
    limit: usize,
}

pub struct Master<B, C: Communicator> {
    comm: C,
    pool: rayon::ThreadPool,
    config: ReduceConfig,
    slots: Vec<Slot<B>>,
    lids: HashMap<Gid, usize>,
    expected: usize,
    exchanges: usize,
    spill: Option<Spill<B>>,
}

impl<B, C: Communicator> std::fmt::Debug for Master<B, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Master")
            .field("rank", &self.comm.rank())
            .field("blocks", &self.slots.iter().map(|s| s.gid).collect::<Vec<_>>())
            .field("expected", &self.expected)
            .finish()
    }
}

impl<B: Send, C: Communicator> Master<B, C> {
    /// In-memory master. `config.mem_blocks` must be `None`; use
    /// [`Master::with_storage`] to allow spilling.
    pub fn new(comm: C, config: &ReduceConfig) -> Result<Self, ReduceError> {
        if config.mem_blocks.is_some() {
            return Err(ReduceError::InvalidConfig(
                "mem_blocks is set but no storage was supplied".into(),
            ));
        }
        Self::build(comm, config, None)
    }

    /// Master that keeps at most `config.mem_blocks` blocks resident and
    /// spills the rest through `codec` into `storage`.
    pub fn with_storage(
        comm: C,
        config: &ReduceConfig,
        codec: impl BlockCodec<B> + 'static,
        storage: impl Storage + 'static,
    ) -> Result<Self, ReduceError> {
        let spill = config.mem_blocks.map(|limit| Spill {
            codec: Box::new(codec) as Box<dyn BlockCodec<B>>,
            storage: Box::new(storage) as Box<dyn Storage>,
            limit,
        });
        Self::build(comm, config, spill)
    }

    fn build(comm: C, config: &ReduceConfig, spill: Option<Spill<B>>) -> Result<Self, ReduceError> {
        config.validate()?;
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.threads)
            .build()
            .map_err(|e| ReduceError::ThreadPool(e.to_string()))?;
        Ok(Self {
            comm,
            pool,
            config: config.clone(),
            slots: Vec::new(),
            lids: HashMap::new(),
            expected: 0,
            exchanges: 0,
            spill,
        })
    }

    /// Register a block owned by this process.
    pub fn add(&mut self, gid: Gid, block: B, link: Link) -> Result<usize, ReduceError> {
        if self.lids.contains_key(&gid) {
            return Err(ReduceError::DuplicateBlock(gid));
        }
        link.debug_assert_invariants();
        let lid = self.slots.len();
        self.expected += link.size_unique();
        self.slots.push(Slot {
            gid,
            block: Some(block),
            link,
            inbox: Inbox::new(),
            outbox: None,
            round_inbox: Inbox::new(),
        });
        self.lids.insert(gid, lid);
        self.evict_over_limit(&[lid])?;
        Ok(lid)
    }

    /// Number of local blocks.
    pub fn size(&self) -> usize {
        self.slots.len()
    }

    pub fn gids(&self) -> Vec<Gid> {
        self.slots.iter().map(|s| s.gid).collect()
    }

    #[inline]
    pub fn gid(&self, lid: usize) -> Gid {
        self.slots[lid].gid
    }

    /// Local index of `gid`, if this process owns it.
    #[inline]
    pub fn lid(&self, gid: Gid) -> Option<usize> {
        self.lids.get(&gid).copied()
    }

    pub fn link(&self, lid: usize) -> &Link {
        &self.slots[lid].link
    }

    pub fn link_mut(&mut self, lid: usize) -> &mut Link {
        &mut self.slots[lid].link
    }

    /// The resident block at `lid`; `None` while it is spilled.
    pub fn block(&self, lid: usize) -> Option<&B> {
        self.slots[lid].block.as_ref()
    }

    pub fn block_mut(&mut self, lid: usize) -> Option<&mut B> {
        self.slots[lid].block.as_mut()
    }

    pub fn is_resident(&self, lid: usize) -> bool {
        self.slots[lid].block.is_some()
    }

    /// Bring a spilled block back into memory.
    pub fn load(&mut self, lid: usize) -> Result<&mut B, ReduceError> {
        self.ensure_loaded(lid)?;
        self.slots[lid].parts().map(|(b, _)| b)
    }

    /// Consume the master, loading any spilled block, and return `(gid, block, link)`.
    pub fn into_blocks(mut self) -> Result<Vec<(Gid, B, Link)>, ReduceError> {
        for lid in 0..self.slots.len() {
            self.ensure_loaded(lid)?;
        }
        let spill = self.spill.take();
        let mut out = Vec::with_capacity(self.slots.len());
        for slot in self.slots {
            if let Some(spill) = &spill {
                spill.storage.remove(slot.gid)?;
            }
            let block = slot.block.ok_or(ReduceError::BlockNotLoaded(slot.gid))?;
            out.push((slot.gid, block, slot.link));
        }
        Ok(out)
    }

    pub fn comm(&self) -> &C {
        &self.comm
    }

    #[inline]
    pub fn rank(&self) -> usize {
        self.comm.rank()
    }

    pub fn config(&self) -> &ReduceConfig {
        &self.config
    }

    /// Inbound queue count [`Master::exchange`] expects: the sum of
    /// `size_unique()` over local links.
    pub fn expected(&self) -> usize {
        self.expected
    }

    pub fn set_expected(&mut self, expected: usize) {
        self.expected = expected;
    }

    /// Recompute [`Master::expected`] from the current links.
    pub fn recompute_expected(&mut self) -> usize {
        self.expected = self.slots.iter().map(|s| s.link.size_unique()).sum();
        self.expected
    }

    fn ensure_loaded(&mut self, lid: usize) -> Result<(), ReduceError> {
        let slot = &mut self.slots[lid];
        if slot.block.is_some() {
            return Ok(());
        }
        let spill = self
            .spill
            .as_ref()
            .ok_or(ReduceError::BlockNotLoaded(slot.gid))?;
        let bytes = spill.storage.get(slot.gid)?;
        slot.block = Some(spill.codec.load(&bytes)?);
        log::trace!("loaded block {} from storage", slot.gid);
        Ok(())
    }

    /// Save and drop blocks from `candidates` while more than the limit are resident.
    fn evict_over_limit(&mut self, candidates: &[usize]) -> Result<(), ReduceError> {
        let Some(limit) = self.spill.as_ref().map(|s| s.limit) else {
            return Ok(());
        };
        let mut resident = self.slots.iter().filter(|s| s.block.is_some()).count();
        for &lid in candidates {
            if resident <= limit {
                break;
            }
            if self.is_resident(lid) {
                self.spill_slot(lid)?;
                resident -= 1;
            }
        }
        Ok(())
    }

    /// Spill blocks outside `part` until loading `part` stays within the limit.
    fn make_room(&mut self, part: &[usize]) -> Result<(), ReduceError> {
        let Some(limit) = self.spill.as_ref().map(|s| s.limit) else {
            return Ok(());
        };
        let missing = part.iter().filter(|&&lid| !self.is_resident(lid)).count();
        let resident = self.slots.iter().filter(|s| s.block.is_some()).count();
        let excess = (resident + missing).saturating_sub(limit);
        let victims: Vec<usize> = (0..self.slots.len())
            .filter(|lid| self.is_resident(*lid) && part.binary_search(lid).is_err())
            .take(excess)
            .collect();
        for lid in victims {
            self.spill_slot(lid)?;
        }
        Ok(())
    }

    fn spill_slot(&mut self, lid: usize) -> Result<(), ReduceError> {
        let Some(spill) = &self.spill else {
            return Ok(());
        };
        let slot = &mut self.slots[lid];
        if let Some(block) = slot.block.take() {
            let bytes = spill.codec.save(&block)?;
            spill.storage.put(slot.gid, &bytes)?;
            log::trace!("spilled block {} to storage", slot.gid);
        }
        Ok(())
    }

    /// Run `f` once for every slot in `lids` (ascending), in chunks that fit the
    /// memory limit. Results come back as `(lid, value)` in `lids` order.
    pub(crate) fn run_slots<R, F>(&mut self, lids: &[usize], f: F) -> Result<Vec<(usize, R)>, ReduceError>
    where
        R: Send,
        F: Fn(&mut Slot<B>) -> Result<R, ReduceError> + Sync,
    {
        let chunk = self
            .spill
            .as_ref()
            .map_or(lids.len().max(1), |s| s.limit.max(1));
        let mut out = Vec::with_capacity(lids.len());
        for part in lids.chunks(chunk) {
            self.make_room(part)?;
            for &lid in part {
                self.ensure_loaded(lid)?;
            }
            let slots = &mut self.slots;
            let f = &f;
            let results = self.pool.install(|| {
                slots
                    .par_iter_mut()
                    .enumerate()
                    .filter(|(lid, _)| part.binary_search(lid).is_ok())
                    .map(|(lid, slot)| f(slot).map(|r| (lid, r)))
                    .collect::<Result<Vec<_>, ReduceError>>()
            })?;
            out.extend(results);
        }
        Ok(out)
    }

    /// Run `f` over every local block. The proxy's in-link and out-link are the
    /// block's distinct neighbors; queues received by the last
    /// [`Master::exchange`] are available through `dequeue`.
    pub fn foreach<F>(&mut self, f: F) -> Result<(), ReduceError>
    where
        F: Fn(&mut B, &mut Proxy<'_>) -> Result<(), ReduceError> + Sync,
    {
        let rank = self.rank();
        let round = self.exchanges;
        let lids: Vec<usize> = (0..self.slots.len()).collect();
        self.run_slots(&lids, |slot| {
            let gid = slot.gid;
            let targets = slot.link.unique_targets();
            let incoming = std::mem::take(&mut slot.inbox);
            let (block, link) = slot.parts()?;
            let mut proxy = Proxy::new(gid, rank, round, targets.clone(), targets, incoming, link);
            f(block, &mut proxy)?;
            let queues = proxy.into_outgoing();
            slot.outbox = Some(queues);
            Ok(())
        })?;
        Ok(())
    }

    /// Deliver the queues produced by the last [`Master::foreach`] to the
    /// link neighbors. Blocks that were not visited send empty queues.
    pub fn exchange(&mut self) -> Result<(), ReduceError> {
        let mut outgoing = Vec::new();
        let mut expected = BTreeMap::new();
        for slot in &mut self.slots {
            let queues = slot.outbox.take().unwrap_or_else(|| {
                slot.link
                    .unique_targets()
                    .into_iter()
                    .map(|t| (t, Queue::new()))
                    .collect()
            });
            outgoing.extend(queues.into_iter().map(|(to, q)| (slot.gid, to, q)));
            expected.insert(slot.gid, slot.link.unique_targets());
        }
        let round = self.exchanges;
        let inboxes = self.deliver(KIND_EXCHANGE, EXCHANGE_TAG, round, outgoing, &expected)?;
        let received: usize = inboxes.values().map(|inbox| inbox.len()).sum();
        if received != self.expected {
            log::warn!(
                "exchange {round}: received {received} queues, expected {}",
                self.expected
            );
        }
        for (gid, inbox) in inboxes {
            if let Some(lid) = self.lid(gid) {
                self.slots[lid].inbox = inbox;
            }
        }
        self.exchanges += 1;
        Ok(())
    }

    /// Hand every `(from, to, queue)` to its receiver and verify that each
    /// receiver in `expected` got exactly one queue from each listed sender.
    pub(crate) fn deliver(
        &self,
        kind: u16,
        tag: CommTag,
        round: usize,
        outgoing: Vec<(Gid, BlockId, Queue)>,
        expected: &BTreeMap<Gid, Vec<BlockId>>,
    ) -> Result<BTreeMap<Gid, Inbox>, ReduceError> {
        let me = self.rank();
        let mut inboxes: BTreeMap<Gid, Inbox> =
            expected.keys().map(|&gid| (gid, Inbox::new())).collect();
        let mut remote: BTreeMap<usize, Vec<Envelope>> = BTreeMap::new();

        for (from, to, queue) in outgoing {
            if to.proc == me {
                inboxes.entry(to.gid).or_default().insert(from, queue);
                continue;
            }
            let payloads = queue
                .into_iter()
                .map(|msg| match msg {
                    Message::Remote(bytes) => Ok(bytes.to_vec()),
                    Message::Local(_) => Err(ReduceError::PayloadType { from, to: to.gid }),
                })
                .collect::<Result<Vec<_>, _>>()?;
            remote.entry(to.proc).or_default().push(Envelope {
                from,
                to: to.gid,
                payloads,
            });
        }

        let recv_from: BTreeSet<usize> = expected
            .values()
            .flatten()
            .map(|b| b.proc)
            .filter(|&p| p != me)
            .collect();
        let mut frames = BTreeMap::new();
        for (peer, envelopes) in &remote {
            frames.insert(*peer, encode_frame(kind, round, envelopes)?);
        }
        let received = exchange_frames(&frames, &recv_from, &self.comm, tag)?;
        for (peer, bytes) in received {
            for env in decode_frame(peer, kind, round, &bytes)? {
                let queue: Queue = env
                    .payloads
                    .into_iter()
                    .map(|p| Message::Remote(Bytes::from(p)))
                    .collect();
                inboxes.entry(env.to).or_default().insert(env.from, queue);
            }
        }

        for (gid, inbox) in &inboxes {
            let senders: BTreeSet<Gid> = expected
                .get(gid)
                .map(|s| s.iter().map(|b| b.gid).collect())
                .unwrap_or_default();
            if let Some(&extra) = inbox.keys().find(|g| !senders.contains(g)) {
                return Err(ReduceError::UnexpectedMessage {
                    round,
                    block: *gid,
                    source_gid: extra,
                });
            }
            if let Some(&missing) = senders.iter().find(|g| !inbox.contains_key(g)) {
                return Err(ReduceError::MissingMessages {
                    round,
                    block: *gid,
                    source_gid: missing,
                });
            }
        }
        Ok(inboxes)
    }

    pub(crate) fn slot_mut(&mut self, lid: usize) -> &mut Slot<B> {
        &mut self.slots[lid]
    }
}

impl<B, C> Master<B, C>
where
    B: Send + 'static,
    C: Communicator,
{
    /// Master that spills through [`FileStorage`] at `config.storage_prefix`.
    pub fn with_file_storage(comm: C, config: &ReduceConfig) -> Result<Self, ReduceError>
    where
        B: serde::Serialize + serde::de::DeserializeOwned,
    {
        let prefix = config.storage_prefix.clone().ok_or_else(|| {
            ReduceError::InvalidConfig("file storage needs storage_prefix".into())
        })?;
        Self::with_storage(comm, config, BincodeCodec, FileStorage::new(prefix))
    }
}
