#![allow(dead_code)]
use block_reduce::prelude::*;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

/// Run `f` once per simulated rank, each on its own scoped thread, and return
/// the results in rank order.
pub fn on_ranks<R, F>(nprocs: usize, f: F) -> Vec<R>
where
    R: Send,
    F: Fn(LocalComm) -> R + Sync,
{
    let world = LocalComm::world(nprocs);
    let f = &f;
    std::thread::scope(|s| {
        let handles: Vec<_> = world
            .into_iter()
            .map(|comm| s.spawn(move || f(comm)))
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    })
}

/// `n` uniform points in `[lo, hi)^3`, reproducible from `seed`.
pub fn random_points(seed: u64, n: usize, lo: f64, hi: f64) -> Vec<[f64; 3]> {
    let mut rng = SmallRng::seed_from_u64(seed);
    (0..n)
        .map(|_| {
            [
                rng.gen_range(lo..hi),
                rng.gen_range(lo..hi),
                rng.gen_range(lo..hi),
            ]
        })
        .collect()
}

/// A link covering `bounds` with no neighbors.
pub fn bare_link(bounds: &Bounds) -> Link {
    Link::new(bounds.clone())
}

/// Assert vec is a permutation of another vec (order-agnostic).
pub fn assert_permutation<T: Ord + Copy + std::fmt::Debug>(got: &[T], want: &[T]) {
    let mut a = got.to_vec();
    a.sort_unstable();
    let mut b = want.to_vec();
    b.sort_unstable();
    assert_eq!(a, b, "not a permutation\n got={:?}\nwant={:?}", got, want);
}
