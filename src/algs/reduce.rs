//! Round-synchronous reduce driver.
//!
//! Round `r` runs the callback of every locally owned block the schedule marks
//! active, then delivers the queues it produced. A block's round `r + 1`
//! callback sees exactly one queue from every sender in its in-link; the
//! count is known from the schedule, so no completion detection is needed.

use crate::algs::communicator::{CommTag, Communicator};
use crate::algs::wire::KIND_REDUCE;
use crate::master::Master;
use crate::master::assigner::Assigner;
use crate::master::proxy::{Inbox, Proxy};
use crate::partners::{NoSkip, Partners, Skip};
use crate::reduce_error::ReduceError;
use crate::topology::link::{BlockId, Gid};
use std::collections::BTreeMap;

/// Tag base for reduce rounds; round `r` uses `2r` and `2r + 1` above it.
pub const REDUCE_TAG: CommTag = CommTag::new(0x2000);

/// Run `f` over every round of `partners`.
pub fn reduce<B, C, A, P, F>(
    master: &mut Master<B, C>,
    assigner: &A,
    partners: &P,
    f: F,
) -> Result<(), ReduceError>
where
    B: Send,
    C: Communicator,
    A: Assigner + ?Sized,
    P: Partners + ?Sized,
    F: Fn(&mut B, &mut Proxy<'_>) -> Result<(), ReduceError> + Sync,
{
    reduce_with_skip(master, assigner, partners, &NoSkip, f)
}

/// Like [`reduce`], but blocks for which `skip` holds do not run `f` in that
/// round. Their out-link targets receive empty queues and their pending
/// inbound messages stay queued for the next round.
pub fn reduce_with_skip<B, C, A, P, S, F>(
    master: &mut Master<B, C>,
    assigner: &A,
    partners: &P,
    skip: &S,
    f: F,
) -> Result<(), ReduceError>
where
    B: Send,
    C: Communicator,
    A: Assigner + ?Sized,
    P: Partners + ?Sized,
    S: Skip + ?Sized,
    F: Fn(&mut B, &mut Proxy<'_>) -> Result<(), ReduceError> + Sync,
{
    check_ownership(master, assigner, partners.nblocks())?;
    let rank = master.rank();
    let rounds = partners.rounds();
    let links = |gids: Vec<Gid>| -> Vec<BlockId> {
        gids.into_iter().map(|g| assigner.block_id(g)).collect()
    };

    for lid in 0..master.size() {
        master.slot_mut(lid).round_inbox.clear();
    }

    for round in 0..=rounds {
        let active: Vec<usize> = (0..master.size())
            .filter(|&lid| partners.active(round, master.gid(lid)))
            .collect();

        let results = master.run_slots(&active, |slot| {
            let gid = slot.gid;
            let in_link = links(partners.incoming(round, gid));
            let out_link = links(partners.outgoing(round, gid));
            let incoming = std::mem::take(&mut slot.round_inbox);
            let skipped = skip.skip(round, gid);
            let (block, link) = slot.parts()?;
            let mut proxy = Proxy::new(gid, rank, round, in_link, out_link, incoming, link);
            if !skipped {
                f(block, &mut proxy)?;
            }
            let mut leftover = proxy.take_incoming();
            if !skipped {
                leftover.clear();
            }
            leftover.retain(|_, q| !q.is_empty());
            Ok((leftover, proxy.into_outgoing()))
        })?;

        if round == rounds {
            break;
        }

        let mut carry: BTreeMap<Gid, Inbox> = BTreeMap::new();
        let mut outgoing = Vec::new();
        for (lid, (leftover, queues)) in results {
            let gid = master.gid(lid);
            if !leftover.is_empty() {
                carry.insert(gid, leftover);
            }
            outgoing.extend(queues.into_iter().map(|(to, q)| (gid, to, q)));
        }

        let expected: BTreeMap<Gid, Vec<BlockId>> = (0..master.size())
            .map(|lid| master.gid(lid))
            .filter(|&gid| partners.active(round + 1, gid))
            .map(|gid| (gid, links(partners.incoming(round + 1, gid))))
            .collect();

        let tag = REDUCE_TAG.offset(((2 * round) & 0xffff) as u16);
        let mut inboxes = master.deliver(KIND_REDUCE, tag, round, outgoing, &expected)?;

        for (gid, leftover) in carry {
            let Some(inbox) = inboxes.get_mut(&gid) else {
                log::trace!("round {round}: block {gid} drops carried messages, inactive next round");
                continue;
            };
            for (source, mut older) in leftover {
                let queue = inbox.entry(source).or_default();
                older.append(queue);
                *queue = older;
            }
        }

        log::debug!(
            "reduce round {round}/{rounds}: {} active local blocks, {} receivers next round",
            active.len(),
            inboxes.len()
        );
        for (gid, inbox) in inboxes {
            if let Some(lid) = master.lid(gid) {
                master.slot_mut(lid).round_inbox = inbox;
            }
        }
    }
    Ok(())
}

/// Every local block must be owned by this rank and lie in `[0, nblocks)`.
pub(crate) fn check_ownership<B, C, A>(
    master: &Master<B, C>,
    assigner: &A,
    nblocks: usize,
) -> Result<(), ReduceError>
where
    B: Send,
    C: Communicator,
    A: Assigner + ?Sized,
{
    if nblocks != assigner.nblocks() {
        return Err(ReduceError::InvalidConfig(format!(
            "schedule covers {nblocks} blocks but the assigner covers {}",
            assigner.nblocks()
        )));
    }
    for gid in master.gids() {
        if gid >= nblocks || assigner.rank(gid) != master.rank() {
            return Err(ReduceError::UnknownBlock(gid));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algs::communicator::NoComm;
    use crate::config::ReduceConfig;
    use crate::master::assigner::ContiguousAssigner;
    use crate::partners::{RegularMergePartners, RegularSwapPartners};
    use crate::topology::{Bounds, Link};

    fn master(n: usize) -> Master<u64, NoComm> {
        let mut m = Master::new(NoComm, &ReduceConfig::default()).unwrap();
        for g in 0..n {
            m.add(g, g as u64, Link::new(Bounds::cube(1, 0.0, 1.0).unwrap()))
                .unwrap();
        }
        m
    }

    #[test]
    fn merge_sums_into_block_zero() {
        let mut m = master(8);
        let a = ContiguousAssigner::new(1, 8).unwrap();
        let p = RegularMergePartners::new(8, 2, true).unwrap();
        reduce(&mut m, &a, &p, |b, proxy| {
            for s in proxy.in_link().iter().map(|t| t.gid).collect::<Vec<_>>() {
                if s != proxy.gid() {
                    *b += proxy.dequeue::<u64>(s)?;
                } else {
                    proxy.dequeue::<u64>(s)?;
                }
            }
            for t in proxy.out_link().to_vec() {
                proxy.enqueue(t.gid, *b)?;
            }
            Ok(())
        })
        .unwrap();
        assert_eq!(m.block(0), Some(&28));
    }

    #[test]
    fn assigner_mismatch_is_rejected() {
        let mut m = master(4);
        let a = ContiguousAssigner::new(1, 4).unwrap();
        let p = RegularSwapPartners::new(8, 2, true).unwrap();
        let err = reduce(&mut m, &a, &p, |_, _| Ok(())).unwrap_err();
        assert!(matches!(err, ReduceError::InvalidConfig(_)));
    }
}
