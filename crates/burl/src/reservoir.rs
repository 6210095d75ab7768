//! One-pass weighted reservoir selection.
//!
//! The samplers stream every legal candidate through a reservoir rather than
//! collecting them: each positive-weight offer replaces the current pick with
//! probability `weight / total_weight_so_far`, which leaves every offer
//! selected with probability proportional to its weight and needs no
//! allocation beyond the single held item.

use crate::rng::EngineRng;

/// Streaming selector over `(weight, item)` offers.
///
/// Zero-weight offers are ineligible and ignored before the random source is
/// touched. The first positive-weight offer is taken unconditionally.
#[derive(Debug)]
pub struct WeightedReservoirSampler<T> {
    selected: Option<T>,
    total_weight: u64,
}

impl<T> WeightedReservoirSampler<T> {
    pub fn new() -> Self {
        Self {
            selected: None,
            total_weight: 0,
        }
    }

    /// Offers an item. Replaces the current pick with probability
    /// `weight / total`, where `total` includes this offer.
    pub fn offer(&mut self, weight: u64, item: T, rng: &mut EngineRng) {
        if weight == 0 {
            return;
        }
        self.total_weight += weight;
        if weight == self.total_weight || rng.uniform_u64(self.total_weight) < weight {
            self.selected = Some(item);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.selected.is_none()
    }

    pub fn into_selected(self) -> Option<T> {
        self.selected
    }
}

impl<T> Default for WeightedReservoirSampler<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_weight_offers_are_ignored() {
        let mut rng = EngineRng::new(0);
        let mut sampler = WeightedReservoirSampler::new();
        sampler.offer(0, "never", &mut rng);
        assert!(sampler.is_empty());
        sampler.offer(1, "always", &mut rng);
        assert_eq!(sampler.into_selected(), Some("always"));
    }

    #[test]
    fn single_offer_is_always_selected() {
        for seed in 0..32 {
            let mut rng = EngineRng::new(seed);
            let mut sampler = WeightedReservoirSampler::new();
            sampler.offer(123, 7usize, &mut rng);
            assert_eq!(sampler.into_selected(), Some(7));
        }
    }

    #[test]
    fn selection_frequency_tracks_weights() {
        // Items weighted 1:2:3 should be picked in those proportions.
        let weights = [1u64, 2, 3];
        let mut counts = [0usize; 3];
        let trials = 60_000;

        for seed in 0..trials {
            let mut rng = EngineRng::new(seed);
            let mut sampler = WeightedReservoirSampler::new();
            for (index, weight) in weights.iter().enumerate() {
                sampler.offer(*weight, index, &mut rng);
            }
            counts[sampler.into_selected().unwrap()] += 1;
        }

        let total: u64 = weights.iter().sum();
        for (index, weight) in weights.iter().enumerate() {
            let expected = *weight as f64 / total as f64;
            let observed = counts[index] as f64 / trials as f64;
            assert!(
                (observed - expected).abs() < 0.02,
                "item {index}: observed {observed:.3}, expected {expected:.3}"
            );
        }
    }

    #[test]
    fn order_does_not_bias_heavy_tail() {
        // A heavy item offered last still dominates.
        let mut wins = 0usize;
        let trials: usize = 10_000;
        for seed in 0..trials {
            let mut rng = EngineRng::new(seed as u32);
            let mut sampler = WeightedReservoirSampler::new();
            sampler.offer(1, "light", &mut rng);
            sampler.offer(99, "heavy", &mut rng);
            if sampler.into_selected() == Some("heavy") {
                wins += 1;
            }
        }
        assert!(wins > trials * 95 / 100, "heavy wins = {wins}");
    }
}
