use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use block_reduce::algs::communicator::{CommTag, Communicator, LocalComm, NoComm, Wait};
use block_reduce::algs::exchange::{exchange_frames, exchange_sizes};
use block_reduce::ReduceError;

#[test]
fn zero_neighbors() {
    let out: BTreeMap<usize, Vec<u8>> = BTreeMap::new();
    let res = exchange_sizes(&out, &BTreeSet::new(), &NoComm, CommTag::new(0x10));
    assert!(res.unwrap().is_empty());
}

#[test]
fn mismatch_drain() {
    let tag = CommTag::new(0x12);
    let world = LocalComm::world(3);
    let c0 = world[0].clone().with_timeout(Duration::from_millis(200));

    // rank 1 sends a malformed count (3 bytes), rank 2 a correct one
    world[1].isend(0, tag.as_u16(), &[1, 2, 3]);
    world[2].isend(0, tag.as_u16(), &0u64.to_le_bytes());

    let mut out: BTreeMap<usize, Vec<u8>> = BTreeMap::new();
    out.insert(1, vec![]);
    out.insert(2, vec![]);
    let from: BTreeSet<usize> = [1, 2].into_iter().collect();

    let err = exchange_sizes(&out, &from, &c0, tag).unwrap_err();
    assert!(matches!(err, ReduceError::CommError { neighbor: 1, .. }));

    // our sends to both peers went out
    let mut b = [0u8; 8];
    assert_eq!(world[1].irecv(0, tag.as_u16(), &mut b).wait().unwrap().len(), 8);
    assert_eq!(world[2].irecv(0, tag.as_u16(), &mut b).wait().unwrap().len(), 8);
}

#[test]
fn silent_peer_is_a_comm_error() {
    let world = LocalComm::world(2);
    let c0 = world[0].clone().with_timeout(Duration::from_millis(10));
    let from: BTreeSet<usize> = [1].into_iter().collect();
    let err = exchange_frames(&BTreeMap::new(), &from, &c0, CommTag::new(0x20)).unwrap_err();
    assert!(matches!(err, ReduceError::CommError { neighbor: 1, .. }));
}

#[test]
fn ring_of_four() {
    let tag = CommTag::new(0x30);
    let world = LocalComm::world(4);
    let got: Vec<BTreeMap<usize, Vec<u8>>> = std::thread::scope(|s| {
        let handles: Vec<_> = world
            .iter()
            .map(|comm| {
                s.spawn(move || {
                    let n = comm.size();
                    let me = comm.rank();
                    let mut out = BTreeMap::new();
                    out.insert((me + 1) % n, vec![me as u8; me + 1]);
                    let from: BTreeSet<usize> = [(me + n - 1) % n].into_iter().collect();
                    exchange_frames(&out, &from, comm, tag).unwrap()
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });
    for (me, frames) in got.iter().enumerate() {
        let prev = (me + 3) % 4;
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[&prev], vec![prev as u8; prev + 1]);
    }
}

#[test]
fn empty_frames_still_arrive() {
    let tag = CommTag::new(0x40);
    let world = LocalComm::world(2);
    let got: Vec<_> = std::thread::scope(|s| {
        let handles: Vec<_> = world
            .iter()
            .map(|comm| {
                s.spawn(move || {
                    let peer = 1 - comm.rank();
                    let out: BTreeMap<usize, Vec<u8>> = [(peer, Vec::new())].into_iter().collect();
                    let from: BTreeSet<usize> = [peer].into_iter().collect();
                    exchange_frames(&out, &from, comm, tag).unwrap()
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });
    assert_eq!(got[0][&1], Vec::<u8>::new());
    assert_eq!(got[1][&0], Vec::<u8>::new());
}
