//! Seeded conversation sampling.
//!
//! Production runs use a fixed seed so the same archive always yields the
//! same sample; debug runs draw a fresh seed and record it in the output
//! metadata so a sample can still be reproduced after the fact.

use rand::seq::index;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Seed used for production sampling unless configured otherwise.
pub const DEFAULT_PROD_SEED: u64 = 42;

/// Pick the sampling seed: `prod_seed` in production, a random `u32` otherwise.
pub fn resolve_seed(prod: bool, prod_seed: u64) -> u64 {
    if prod {
        prod_seed
    } else {
        u64::from(rand::thread_rng().gen::<u32>())
    }
}

/// Sample `n` items without replacement using `seed`.
///
/// When `n` is not smaller than the number of items, everything is returned
/// in its original order.
pub fn sample_conversations<T>(items: Vec<T>, n: usize, seed: u64) -> Vec<T> {
    if n >= items.len() {
        return items;
    }
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let picked = index::sample(&mut rng, items.len(), n);

    let mut slots: Vec<Option<T>> = items.into_iter().map(Some).collect();
    picked
        .into_iter()
        .filter_map(|i| slots[i].take())
        .collect()
}
