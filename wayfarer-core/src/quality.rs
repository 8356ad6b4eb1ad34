//! Crafting quality distribution from the quality outcome attribute.
//!
//! Each tier has a starting weight that decays linearly once the quality
//! outcome value passes the tier's band start, bottoming out at a minimum
//! weight. Band width scales with the recipe level, so higher recipes need
//! more quality outcome before the rare tiers open up.

use crate::gearset::Quality;
use serde::Serialize;

/// (tier, starting weight, minimum weight), worst to best.
const TIER_WEIGHTS: [(Quality, f64, f64); 6] = [
    (Quality::Normal, 1000.0, 4.0),
    (Quality::Good, 200.0, 4.0),
    (Quality::Great, 50.0, 4.0),
    (Quality::Excellent, 10.0, 4.0),
    (Quality::Perfect, 2.5, 2.0),
    (Quality::Eternal, 0.05, 0.05),
];

const BAND_STARTS: [f64; 6] = [0.0, 100.0, 200.0, 300.0, 400.0, 500.0];

/// Chance of each quality tier, as percentages summing to 100.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct QualityDistribution {
    /// Percentages indexed worst to best: Normal through Eternal.
    pub percentages: [f64; 6],
}

impl QualityDistribution {
    pub fn percent(&self, quality: Quality) -> f64 {
        self.percentages[quality as usize]
    }
}

/// Compute the tier distribution for a quality outcome value against a
/// recipe of the given level.
pub fn quality_distribution(quality_outcome: f64, recipe_level: u32) -> QualityDistribution {
    let band_width = (100 + recipe_level) as f64;
    let mut weights = [0.0_f64; 6];

    for (i, (_, start_weight, min_weight)) in TIER_WEIGHTS.iter().enumerate() {
        let band_start = BAND_STARTS[i];
        let band_end = band_width * (i + 1) as f64;
        weights[i] = if quality_outcome <= band_start {
            *start_weight
        } else {
            let slope = (start_weight - min_weight) / (band_end - band_start);
            (start_weight - (quality_outcome - band_start) * slope).max(*min_weight)
        };
    }

    // A worse tier can never end up rarer than a better one.
    for i in (0..5).rev() {
        weights[i] = weights[i].max(weights[i + 1]);
    }

    let total: f64 = weights.iter().sum();
    let mut percentages = [0.0_f64; 6];
    for (pct, weight) in percentages.iter_mut().zip(weights.iter()) {
        *pct = weight / total * 100.0;
    }
    QualityDistribution { percentages }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_outcome_uses_starting_weights() {
        let dist = quality_distribution(0.0, 1);
        let total = 1000.0 + 200.0 + 50.0 + 10.0 + 2.5 + 0.05;
        assert!((dist.percent(Quality::Normal) - 1000.0 / total * 100.0).abs() < 1e-9);
        assert!((dist.percent(Quality::Eternal) - 0.05 / total * 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_percentages_sum_to_hundred() {
        for qo in [0.0, 50.0, 150.0, 400.0, 2000.0] {
            let dist = quality_distribution(qo, 25);
            let sum: f64 = dist.percentages.iter().sum();
            assert!((sum - 100.0).abs() < 1e-9, "qo={}", qo);
        }
    }

    #[test]
    fn test_high_outcome_floors_common_tiers() {
        let dist = quality_distribution(10_000.0, 1);
        // All tiers at their minimum weights: 4/4/4/4/2/0.05.
        let total = 4.0 * 4.0 + 2.0 + 0.05;
        assert!((dist.percent(Quality::Normal) - 4.0 / total * 100.0).abs() < 1e-9);
        assert!((dist.percent(Quality::Perfect) - 2.0 / total * 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_more_outcome_never_hurts_best_tier() {
        let mut last = 0.0;
        for qo in [0.0, 100.0, 300.0, 600.0, 1200.0] {
            let pct = quality_distribution(qo, 50).percent(Quality::Eternal);
            assert!(pct >= last, "qo={}", qo);
            last = pct;
        }
    }

    #[test]
    fn test_higher_recipe_level_slows_decay() {
        let low = quality_distribution(300.0, 1);
        let high = quality_distribution(300.0, 100);
        assert!(low.percent(Quality::Normal) <= high.percent(Quality::Normal));
    }

    #[test]
    fn test_worse_tier_never_rarer_than_better() {
        for qo in [0.0, 250.0, 700.0, 5000.0] {
            let dist = quality_distribution(qo, 10);
            for i in 0..5 {
                assert!(
                    dist.percentages[i] >= dist.percentages[i + 1],
                    "qo={} i={}",
                    qo,
                    i
                );
            }
        }
    }
}
