//! Two-stage frame exchange with peer processes.
//!
//! Stage 1 exchanges the byte length of each frame, stage 2 the frame itself.
//! Both stages take a typed [`CommTag`] (sizes on `tag`, data on `tag + 1`)
//! and guarantee that every send/receive handle is drained before returning,
//! even if an error occurs.

use crate::algs::communicator::{CommTag, Communicator, Wait};
use crate::algs::wire::{WireCount, cast_slice, cast_slice_mut};
use crate::reduce_error::ReduceError;
use std::collections::{BTreeMap, BTreeSet};

/// Posts irecv/isend for the byte length of each frame.
/// Returns a map `peer → length` once all receives have completed.
pub fn exchange_sizes<C>(
    outgoing: &BTreeMap<usize, Vec<u8>>,
    recv_from: &BTreeSet<usize>,
    comm: &C,
    tag: CommTag,
) -> Result<BTreeMap<usize, usize>, ReduceError>
where
    C: Communicator,
{
    // 1) post all receives
    let mut recv_size = Vec::with_capacity(recv_from.len());
    for &peer in recv_from {
        let mut cnt = WireCount::new(0);
        let h = comm.irecv(
            peer,
            tag.as_u16(),
            cast_slice_mut(std::slice::from_mut(&mut cnt)),
        );
        recv_size.push((peer, h));
    }

    // 2) post all sends
    let mut pending_sends = Vec::with_capacity(outgoing.len());
    for (&peer, frame) in outgoing {
        let count = WireCount::new(frame.len());
        pending_sends.push(comm.isend(
            peer,
            tag.as_u16(),
            cast_slice(std::slice::from_ref(&count)),
        ));
    }

    // 3) wait for all recvs, collect counts (but do not early-return)
    let mut sizes_in = BTreeMap::new();
    let mut maybe_err = None;
    for (peer, h) in recv_size {
        match h.wait() {
            Some(data) if data.len() == std::mem::size_of::<WireCount>() => {
                if maybe_err.is_none() {
                    let cnt: WireCount = bytemuck::pod_read_unaligned(&data);
                    sizes_in.insert(peer, cnt.get());
                }
            }
            Some(data) if maybe_err.is_none() => {
                maybe_err = Some(ReduceError::comm(
                    peer,
                    format!(
                        "expected {} bytes for size header, got {}",
                        std::mem::size_of::<WireCount>(),
                        data.len()
                    ),
                ));
            }
            None if maybe_err.is_none() => {
                maybe_err = Some(ReduceError::comm(
                    peer,
                    format!("failed to receive frame size from rank {peer}"),
                ));
            }
            _ => {} // already have an error; just drain
        }
    }

    // 4) always drain all send handles before returning
    for send in pending_sends {
        let _ = send.wait();
    }

    match maybe_err {
        Some(err) => Err(err),
        None => Ok(sizes_in),
    }
}

/// Posts irecv for each announced length, sends every frame, and returns the
/// received frames keyed by peer.
pub fn exchange_data<C>(
    outgoing: &BTreeMap<usize, Vec<u8>>,
    sizes_in: &BTreeMap<usize, usize>,
    comm: &C,
    tag: CommTag,
) -> Result<BTreeMap<usize, Vec<u8>>, ReduceError>
where
    C: Communicator,
{
    let mut recv_data = Vec::with_capacity(sizes_in.len());
    for (&peer, &len) in sizes_in {
        let mut buffer = vec![0u8; len];
        let h = comm.irecv(peer, tag.as_u16(), &mut buffer);
        recv_data.push((peer, len, h));
    }

    let mut pending_sends = Vec::with_capacity(outgoing.len());
    for (&peer, frame) in outgoing {
        log::trace!("sending {} byte frame to rank {peer}", frame.len());
        pending_sends.push(comm.isend(peer, tag.as_u16(), frame));
    }

    let mut frames = BTreeMap::new();
    let mut maybe_err = None;
    for (peer, len, h) in recv_data {
        match h.wait() {
            Some(data) if data.len() == len => {
                log::trace!("received {len} byte frame from rank {peer}");
                frames.insert(peer, data);
            }
            Some(data) if maybe_err.is_none() => {
                maybe_err = Some(ReduceError::comm(
                    peer,
                    format!("expected {len} byte frame, got {}", data.len()),
                ));
            }
            None if maybe_err.is_none() => {
                maybe_err = Some(ReduceError::comm(
                    peer,
                    format!("failed to receive frame from rank {peer}"),
                ));
            }
            _ => {}
        }
    }

    for send in pending_sends {
        let _ = send.wait();
    }

    match maybe_err {
        Some(err) => Err(err),
        None => Ok(frames),
    }
}

/// Run both stages: sizes on `tag`, data on `tag.offset(1)`.
pub fn exchange_frames<C>(
    outgoing: &BTreeMap<usize, Vec<u8>>,
    recv_from: &BTreeSet<usize>,
    comm: &C,
    tag: CommTag,
) -> Result<BTreeMap<usize, Vec<u8>>, ReduceError>
where
    C: Communicator,
{
    if outgoing.is_empty() && recv_from.is_empty() {
        return Ok(BTreeMap::new());
    }
    let sizes = exchange_sizes(outgoing, recv_from, comm, tag)?;
    exchange_data(outgoing, &sizes, comm, tag.offset(1))
}
