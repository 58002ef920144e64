use block_reduce::algs::communicator::{CommTag, Communicator, LocalComm, NoComm, Wait};
use std::time::Duration;

#[test]
fn local_round_trip() {
    let tag = CommTag(0x1000);
    let world = LocalComm::world(2);

    let msg = b"hello";
    let _s = world[0].isend(1, tag.base(), msg);

    let mut buf = [0u8; 5];
    let h = world[1].irecv(0, tag.base(), &mut buf);
    let got = h.wait().unwrap();
    assert_eq!(&got, msg);
}

#[test]
fn local_fifo_order() {
    let tag = CommTag(0x1001);
    let world = LocalComm::world(2);

    for i in 0..10u8 {
        world[0].isend(1, tag.base(), &[i]);
    }
    let mut out = Vec::new();
    for _ in 0..10 {
        let mut b = [0u8; 1];
        let h = world[1].irecv(0, tag.base(), &mut b);
        out.push(h.wait().unwrap()[0]);
    }
    assert_eq!(out, (0u8..10u8).collect::<Vec<_>>());
}

#[test]
fn truncation_is_ok() {
    let tag = CommTag(0x1002);
    let world = LocalComm::world(2);

    world[0].isend(1, tag.base(), &[1, 2, 3, 4, 5, 6]);
    let mut b = [0u8; 4];
    let got = world[1].irecv(0, tag.base(), &mut b).wait().unwrap();
    assert_eq!(got, vec![1, 2, 3, 4]);
}

#[test]
fn tags_do_not_mix() {
    let world = LocalComm::world(2);
    world[0].isend(1, 5, b"five");
    world[0].isend(1, 6, b"six!");
    let mut b = [0u8; 4];
    assert_eq!(world[1].irecv(0, 6, &mut b).wait().unwrap(), b"six!".to_vec());
    assert_eq!(world[1].irecv(0, 5, &mut b).wait().unwrap(), b"five".to_vec());
}

#[test]
fn sending_to_self() {
    let world = LocalComm::world(1);
    world[0].isend(0, 9, &[42]);
    let mut b = [0u8; 1];
    assert_eq!(world[0].irecv(0, 9, &mut b).wait(), Some(vec![42]));
}

#[test]
fn missing_message_times_out() {
    let world = LocalComm::world(3);
    let comm = world[2].clone().with_timeout(Duration::from_millis(5));
    let mut b = [0u8; 8];
    assert!(comm.irecv(1, 0x77, &mut b).wait().is_none());
}

#[test]
fn no_comm_is_a_single_rank() {
    assert_eq!(NoComm.rank(), 0);
    assert_eq!(NoComm.size(), 1);
    let mut b = [0u8; 2];
    assert!(NoComm.irecv(0, 1, &mut b).wait().is_none());
}
