// Builds a k-d tree over 8 blocks of random points in [0,1000]^3, spread over
// two simulated ranks, then prints each leaf and checks it with verify_leaf.
//
//     cargo run --example kdtree
use block_reduce::prelude::*;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use std::collections::BTreeMap;

struct PointBlock {
    points: Vec<[f64; 3]>,
}

fn points(b: &mut PointBlock) -> &mut Vec<[f64; 3]> {
    &mut b.points
}

const NBLOCKS: usize = 8;
const NPROCS: usize = 2;
const PER_BLOCK: usize = 100;
const WRAP: bool = false;

fn run_rank(comm: LocalComm, domain: &Bounds) -> Result<Vec<(Gid, Bounds, Link, Vec<[f64; 3]>)>, ReduceError> {
    let cfg = ReduceConfig {
        nblocks: NBLOCKS,
        threads: 2,
        wrap: WRAP,
        ..Default::default()
    };
    cfg.validate()?;
    let assigner = ContiguousAssigner::new(comm.size(), cfg.nblocks)?;
    let rank = comm.rank();
    let mut master = Master::new(comm, &cfg)?;
    for gid in assigner.local_gids(rank) {
        let mut rng = SmallRng::seed_from_u64(gid as u64);
        let pts = (0..PER_BLOCK)
            .map(|_| {
                [
                    rng.gen_range(0.0..1000.0),
                    rng.gen_range(0.0..1000.0),
                    rng.gen_range(0.0..1000.0),
                ]
            })
            .collect();
        master.add(gid, PointBlock { points: pts }, Link::new(domain.clone()))?;
    }

    let summary = kdtree(&mut master, &assigner, 3, domain, points, cfg.bins(), cfg.wrap)?;
    println!(
        "rank {rank}: {} split rounds, {} points sent, {} expected queues",
        summary.split_rounds,
        summary.points_sent,
        master.expected()
    );

    Ok(master
        .into_blocks()?
        .into_iter()
        .map(|(gid, b, link)| (gid, link.bounds().clone(), link, b.points))
        .collect())
}

fn main() -> Result<(), ReduceError> {
    let domain = Bounds::cube(3, 0.0, 1000.0)?;
    let world = LocalComm::world(NPROCS);
    let results: Vec<_> = std::thread::scope(|s| {
        let handles: Vec<_> = world
            .into_iter()
            .map(|comm| {
                let domain = &domain;
                s.spawn(move || run_rank(comm, domain))
            })
            .collect();
        handles
            .into_iter()
            .map(|h| h.join().unwrap_or_else(|_| Err(ReduceError::ThreadPool("rank panicked".into()))))
            .collect()
    });

    let mut leaves = Vec::new();
    for r in results {
        leaves.extend(r?);
    }
    leaves.sort_by_key(|(gid, ..)| *gid);
    let all_bounds: BTreeMap<Gid, Bounds> = leaves.iter().map(|(g, b, ..)| (*g, b.clone())).collect();

    let mut total_volume = 0.0;
    let mut warnings = 0;
    for (gid, bounds, link, pts) in &leaves {
        println!(
            "block {gid}: {bounds}  {} points, {} neighbors",
            pts.len(),
            link.size_unique()
        );
        total_volume += bounds.volume();
        warnings += verify_leaf(*gid, link, pts, &all_bounds, WRAP, &domain).len();
    }
    println!(
        "leaves cover {:.1}% of the domain, {warnings} consistency warnings",
        100.0 * total_volume / domain.volume()
    );
    Ok(())
}
