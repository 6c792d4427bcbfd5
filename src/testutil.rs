//! Test and benchmark utilities.
//!
//! This module is only available when the `testutil` feature is enabled.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::sort::LOGICAL_NA;

/// RNG seed for deterministic data generation
pub const BENCH_RNG_SEED: u64 = 42;

/// Generate `len` strings of 0 to `max_len` ASCII characters, where roughly
/// one in `na_every` elements is missing. `na_every == 0` disables NAs.
pub fn generate_strings(len: usize, max_len: usize, na_every: usize, seed: u64) -> Vec<Option<String>> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..len)
        .map(|_| {
            if na_every > 0 && rng.gen_range(0..na_every) == 0 {
                return None;
            }
            let n = rng.gen_range(0..=max_len);
            Some((0..n).map(|_| rng.gen_range(b'a'..=b'z') as char).collect())
        })
        .collect()
}

/// Strings made of characters from the whole unicode range, for encoding
/// tests.
pub fn generate_unicode_strings(len: usize, seed: u64) -> Vec<Option<String>> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..len)
        .map(|i| {
            if i % 13 == 0 {
                return None;
            }
            let n = rng.gen_range(0..8);
            Some((0..n).map(|_| rng.r#gen::<char>()).collect())
        })
        .collect()
}

/// Stringified row numbers `"0", "1", ...` with every `na_every`-th row missing.
pub fn generate_row_strings(len: usize, na_every: usize) -> Vec<Option<String>> {
    (0..len)
        .map(|i| {
            if na_every > 0 && i % na_every == na_every - 1 {
                None
            } else {
                Some(i.to_string())
            }
        })
        .collect()
}

pub fn generate_i32(len: usize, seed: u64) -> Vec<i32> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..len).map(|_| rng.r#gen()).collect()
}

pub fn generate_u64(len: usize, seed: u64) -> Vec<u64> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..len).map(|_| rng.r#gen()).collect()
}

/// Random logical values: NA, FALSE (0) or TRUE (1).
pub fn generate_logicals(len: usize, seed: u64) -> Vec<i32> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..len)
        .map(|_| match rng.gen_range(0..3) {
            0 => LOGICAL_NA,
            1 => 0,
            _ => 1,
        })
        .collect()
}
