use criterion::{criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use block_reduce::prelude::*;

type Block = Vec<[f64; 3]>;

fn points(b: &mut Block) -> &mut Vec<[f64; 3]> {
    b
}

fn build(nblocks: usize, per_block: usize) -> Master<Block, NoComm> {
    let domain = Bounds::cube(3, 0.0, 1.0).unwrap();
    let cfg = ReduceConfig {
        nblocks,
        threads: 4,
        ..Default::default()
    };
    let mut master = Master::new(NoComm, &cfg).unwrap();
    for gid in 0..nblocks {
        let mut rng = SmallRng::seed_from_u64(gid as u64);
        let pts = (0..per_block)
            .map(|_| [rng.r#gen(), rng.r#gen(), rng.r#gen()])
            .collect();
        master.add(gid, pts, Link::new(domain.clone())).unwrap();
    }
    master
}

fn bench_kdtree(c: &mut Criterion) {
    let mut group = c.benchmark_group("kdtree");
    let domain = Bounds::cube(3, 0.0, 1.0).unwrap();

    for &(nblocks, per_block) in &[(8, 1_000), (32, 1_000), (64, 10_000)] {
        let assigner = ContiguousAssigner::new(1, nblocks).unwrap();
        group.bench_with_input(
            BenchmarkId::new(format!("b{nblocks}"), per_block),
            &per_block,
            |b, &per_block| {
                b.iter_batched(
                    || build(nblocks, per_block),
                    |mut master| {
                        kdtree(&mut master, &assigner, 3, &domain, points, 64, false).unwrap();
                        master
                    },
                    BatchSize::LargeInput,
                );
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_kdtree);
criterion_main!(benches);
