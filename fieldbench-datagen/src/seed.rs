//! Seed derivation for reproducible random streams.
//!
//! Every random decision in fieldbench is driven by a [`SeededRng`] created from a 64-bit seed.
//! Independent streams, such as one per catalog field or one per load test worker, are derived
//! from a master seed with [`derive_seed`], so that they do not overlap and can be reproduced in
//! isolation.

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use xxhash_rust::xxh3::xxh3_64;

/// The random number generator behind every seeded stream.
///
/// ChaCha8 produces the same output on every platform for a given seed, which keeps generated
/// data and query sets comparable across machines.
pub type SeededRng = ChaCha8Rng;

/// Creates a new random stream from the given seed.
pub fn seeded_rng(seed: u64) -> SeededRng {
    SeededRng::seed_from_u64(seed)
}

/// Derives the seed of sub-stream `stream` from a master seed.
///
/// The derivation is a SplitMix64 step over the combined input, which spreads adjacent master
/// seeds and stream ordinals over the whole seed space.
///
/// ```
/// use fieldbench_datagen::seed::derive_seed;
///
/// assert_eq!(derive_seed(42, 0), derive_seed(42, 0));
/// assert_ne!(derive_seed(42, 0), derive_seed(42, 1));
/// ```
pub fn derive_seed(master: u64, stream: u64) -> u64 {
    let mut z = master
        .wrapping_add(stream.wrapping_mul(0x9E37_79B9_7F4A_7C15))
        .wrapping_add(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

/// Derives the seed for the value stream of a named catalog field.
///
/// The name is hashed with XXH3, whose output is fixed by its specification.
pub fn field_seed(master: u64, field: &str) -> u64 {
    derive_seed(master, xxh3_64(field.as_bytes()))
}
