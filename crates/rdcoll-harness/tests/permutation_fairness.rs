//! Chi-square check that send orders are uniform over all 4! permutations.

use std::collections::HashMap;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rdcoll_harness::SEED_SCOPE;
use rdcoll_harness::seed::SeedTaxonomy;
use rdcoll_harness::test_set::random_level_order;

const SAMPLES: usize = 24_000;
const PERMUTATIONS: usize = 24;
/// Chi-square critical value for 23 degrees of freedom at p = 0.001.
const CHI_SQUARE_CRITICAL: f64 = 49.73;

fn chi_square(counts: &HashMap<Vec<u8>, usize>) -> f64 {
    let expected = SAMPLES as f64 / PERMUTATIONS as f64;
    let observed_sum: f64 = counts
        .values()
        .map(|&count| {
            let diff = count as f64 - expected;
            diff * diff / expected
        })
        .sum();
    // Permutations never drawn contribute `expected` each.
    let missing = PERMUTATIONS.saturating_sub(counts.len()) as f64;
    missing.mul_add(expected, observed_sum)
}

fn tally(mut draw: impl FnMut() -> Vec<u8>) -> HashMap<Vec<u8>, usize> {
    let mut counts = HashMap::new();
    for _ in 0..SAMPLES {
        *counts.entry(draw()).or_insert(0) += 1;
    }
    counts
}

#[test]
fn test_fisher_yates_orders_are_uniform() {
    let seeds = SeedTaxonomy::derive(0x5EED, SEED_SCOPE);
    let mut rng = StdRng::seed_from_u64(seeds.harness);
    let counts = tally(|| random_level_order(4, &mut rng));
    assert_eq!(counts.len(), PERMUTATIONS);
    let stat = chi_square(&counts);
    assert!(
        stat < CHI_SQUARE_CRITICAL,
        "chi-square {stat:.2} exceeds {CHI_SQUARE_CRITICAL}"
    );
}

#[test]
fn test_chi_square_detects_naive_shuffle_bias() {
    // Swapping every slot with any slot yields 4^4 equally likely paths
    // over 24 permutations, which cannot be uniform.
    let mut rng = StdRng::seed_from_u64(1);
    let counts = tally(|| {
        let mut order: Vec<u8> = (0..4).collect();
        for i in 0..order.len() {
            let j = rng.gen_range(0..order.len());
            order.swap(i, j);
        }
        order
    });
    let stat = chi_square(&counts);
    assert!(stat > CHI_SQUARE_CRITICAL, "chi-square {stat:.2} unexpectedly small");
}
