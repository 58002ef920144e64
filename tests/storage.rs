use block_reduce::prelude::*;
use std::path::PathBuf;

fn scratch(name: &str) -> PathBuf {
    std::env::temp_dir()
        .join(format!("block-reduce-{}", std::process::id()))
        .join(name)
}

fn unit_link() -> Link {
    Link::new(Bounds::cube(1, 0.0, 1.0).unwrap())
}

#[test]
fn reduce_over_spilled_blocks() {
    let prefix = scratch("reduce");
    let cfg = ReduceConfig {
        mem_blocks: Some(2),
        storage_prefix: Some(prefix.clone()),
        threads: 2,
        ..Default::default()
    };
    let mut master: Master<Vec<u64>, _> = Master::with_file_storage(NoComm, &cfg).unwrap();
    for gid in 0..8 {
        master.add(gid, vec![gid as u64; 100], unit_link()).unwrap();
    }
    assert!((0..8).filter(|&lid| master.is_resident(lid)).count() <= 2);

    let assigner = ContiguousAssigner::new(1, 8).unwrap();
    let partners = RegularMergePartners::new(8, 2, true).unwrap();
    reduce(&mut master, &assigner, &partners, |block, proxy| {
        for source in proxy.in_link().iter().map(|t| t.gid).collect::<Vec<_>>() {
            let part: Vec<u64> = proxy.dequeue(source)?;
            if source != proxy.gid() {
                block.iter_mut().zip(part).for_each(|(a, b)| *a += b);
            }
        }
        for target in proxy.out_link().to_vec() {
            proxy.enqueue(target.gid, block.clone())?;
        }
        Ok(())
    })
    .unwrap();

    assert!((0..8).filter(|&lid| master.is_resident(lid)).count() <= 2);
    let root = master.load(0).unwrap();
    assert!(root.iter().all(|&v| v == 28));

    let blocks = master.into_blocks().unwrap();
    assert_eq!(blocks.len(), 8);
    for gid in 0..8 {
        let mut name = prefix.clone().into_os_string();
        name.push(format!("-{gid}.blk"));
        assert!(!PathBuf::from(name).exists());
    }
}

#[test]
fn file_storage_without_prefix_is_rejected() {
    let cfg = ReduceConfig {
        mem_blocks: Some(1),
        ..Default::default()
    };
    let err = Master::<u32, _>::with_file_storage(NoComm, &cfg).unwrap_err();
    assert!(matches!(err, ReduceError::InvalidConfig(_)));
}

#[test]
fn file_storage_round_trip() {
    let store = FileStorage::new(scratch("direct"));
    store.put(7, b"seven").unwrap();
    assert_eq!(store.get(7).unwrap(), b"seven".to_vec());
    store.remove(7).unwrap();
    assert!(matches!(store.get(7), Err(ReduceError::Storage(_))));
    store.remove(7).unwrap();
}

#[test]
fn foreach_reloads_every_block_once_per_pass() {
    let cfg = ReduceConfig {
        mem_blocks: Some(3),
        ..Default::default()
    };
    let mut master = Master::with_storage(NoComm, &cfg, BincodeCodec, MemoryStorage::new()).unwrap();
    for gid in 0..10 {
        master.add(gid, 0u32, unit_link()).unwrap();
    }
    for _ in 0..3 {
        master
            .foreach(|b, _| {
                *b += 1;
                Ok(())
            })
            .unwrap();
    }
    let values: Vec<u32> = master.into_blocks().unwrap().into_iter().map(|(_, b, _)| b).collect();
    assert_eq!(values, vec![3; 10]);
}
