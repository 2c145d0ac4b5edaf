//! The skewed-rank sampler.
//!
//! Candidate values of a field are sampled with a fixed top-heavy distribution that models a few
//! dominant values and a long tail:
//!
//! | rank | probability |
//! |------|-------------|
//! | 1    | 0.30        |
//! | 2    | 0.20        |
//! | 3    | 0.10        |
//! | 4..K | 0.40 spread over a geometric tail with ratio 0.85 |
//!
//! Sampling draws one uniform `[0, 1)` value and inverts the cumulative distribution, so the same
//! stream always yields the same sequence of ranks.

use fieldbench_types::{Field, FieldCatalog};
use rand::Rng;

use crate::seed::{SeededRng, field_seed, seeded_rng};

/// Probabilities of the first three ranks.
const HEAD: [f64; 3] = [0.30, 0.20, 0.10];
/// Probability mass spread over ranks 4 and above.
const TAIL_MASS: f64 = 0.40;
/// Ratio between the weights of consecutive tail ranks.
const TAIL_DECAY: f64 = 0.85;

/// Computes the probability of every rank for a field with `k` values.
///
/// `k` must be at least 4, so that the tail holds at least one rank.
///
/// ```
/// use fieldbench_datagen::sampler::skewed_probabilities;
///
/// let probs = skewed_probabilities(5);
/// assert_eq!(&probs[..3], &[0.30, 0.20, 0.10]);
/// assert!(probs[3] > probs[4]);
/// ```
pub fn skewed_probabilities(k: usize) -> Vec<f64> {
    assert!(k > HEAD.len(), "skewed sampling needs at least 4 values, got {k}");

    let tail_size = k - HEAD.len();
    let weights: Vec<f64> = (0..tail_size)
        .map(|i| TAIL_DECAY.powi(i as i32))
        .collect();
    let weight_sum: f64 = weights.iter().sum();

    let mut probs = Vec::with_capacity(k);
    probs.extend_from_slice(&HEAD);
    probs.extend(weights.iter().map(|w| TAIL_MASS * w / weight_sum));
    probs
}

/// Samples ranks with the skewed distribution for a fixed number of values.
#[derive(Clone, Debug)]
pub struct SkewedSampler {
    cdf: Vec<f64>,
}

impl SkewedSampler {
    /// Creates a sampler for `k` ranked values.
    pub fn new(k: usize) -> Self {
        let cdf = skewed_probabilities(k)
            .into_iter()
            .scan(0.0, |acc, p| {
                *acc += p;
                Some(*acc)
            })
            .collect();
        Self { cdf }
    }

    /// Returns the number of ranks this sampler draws from.
    pub fn len(&self) -> usize {
        self.cdf.len()
    }

    /// Always `false`, a sampler covers at least 4 ranks.
    pub fn is_empty(&self) -> bool {
        self.cdf.is_empty()
    }

    /// Draws a zero-based rank.
    pub fn sample_rank<R: Rng + ?Sized>(&self, rng: &mut R) -> usize {
        let u: f64 = rng.random();
        // Rounding may leave the last cumulative value slightly below 1.0.
        self.cdf
            .partition_point(|&c| c <= u)
            .min(self.cdf.len() - 1)
    }

    /// Draws one of `values`, which must hold exactly [`len`](Self::len) entries in rank order.
    pub fn sample<'a, R: Rng + ?Sized>(&self, values: &'a [String], rng: &mut R) -> &'a str {
        debug_assert_eq!(values.len(), self.cdf.len());
        &values[self.sample_rank(rng)]
    }
}

/// Draws one value of `field` with the skewed distribution.
///
/// This builds the cumulative distribution on every call. Use [`SkewedSampler`] or
/// [`FieldSampler`] when sampling the same field repeatedly.
pub fn sample<'a, R: Rng + ?Sized>(field: &'a Field, rng: &mut R) -> &'a str {
    SkewedSampler::new(field.values().len()).sample(field.values(), rng)
}

/// A sampler bound to one catalog field with its own random stream.
#[derive(Debug)]
pub struct FieldSampler<'c> {
    field: &'c Field,
    sampler: SkewedSampler,
    rng: SeededRng,
}

impl<'c> FieldSampler<'c> {
    /// Creates a sampler for `field` whose stream is derived from `seed` and the field name.
    pub fn new(field: &'c Field, seed: u64) -> Self {
        Self {
            field,
            sampler: SkewedSampler::new(field.values().len()),
            rng: seeded_rng(field_seed(seed, field.name())),
        }
    }

    /// Creates one sampler per field of the catalog, in catalog order.
    pub fn for_catalog(catalog: &'c FieldCatalog, seed: u64) -> Vec<Self> {
        catalog
            .fields()
            .iter()
            .map(|field| Self::new(field, seed))
            .collect()
    }

    /// Returns the field this sampler draws from.
    pub fn field(&self) -> &'c Field {
        self.field
    }

    /// Draws the next value from this field's stream.
    pub fn next_value(&mut self) -> &'c str {
        self.sampler.sample(self.field.values(), &mut self.rng)
    }
}
