use rand::seq::SliceRandom;
use rand::Rng;

/// How many users a recommendation request returns at most.
pub const RECOMMENDATION_COUNT: usize = 2;

/// Uniform sample of up to `count` distinct candidates, without replacement.
///
/// The sample is clamped to the population: an empty pool yields an empty
/// list and a pool of one yields that single candidate.
pub fn sample_recommendations<R: Rng + ?Sized>(
    candidates: &[String],
    count: usize,
    rng: &mut R,
) -> Vec<String> {
    candidates.choose_multiple(rng, count).cloned().collect()
}
