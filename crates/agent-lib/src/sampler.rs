//! Synthetic pressure sampling and severity classification

use crate::models::SeverityTier;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// Lowest value the sampler can produce
pub const SAMPLE_MIN: f64 = 50.0;

/// Highest value the sampler can produce (inclusive)
pub const SAMPLE_MAX: f64 = 150.0;

/// Draws synthetic readings uniformly from `[SAMPLE_MIN, SAMPLE_MAX]`
pub struct Sampler {
    rng: StdRng,
}

impl Sampler {
    /// Sampler seeded from OS entropy
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    /// Deterministic sampler for reproducible runs
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn sample(&mut self) -> f64 {
        self.rng.gen_range(SAMPLE_MIN..=SAMPLE_MAX)
    }
}

impl Default for Sampler {
    fn default() -> Self {
        Self::new()
    }
}

/// Cut points between severity tiers
///
/// Both bounds are exclusive from below: a value equal to a threshold
/// stays in the lower tier.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Thresholds {
    pub warning_above: f64,
    pub critical_above: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            warning_above: 100.0,
            critical_above: 120.0,
        }
    }
}

impl Thresholds {
    pub fn new(warning_above: f64, critical_above: f64) -> anyhow::Result<Self> {
        if !warning_above.is_finite() || !critical_above.is_finite() {
            anyhow::bail!("thresholds must be finite");
        }
        if warning_above >= critical_above {
            anyhow::bail!(
                "warning threshold ({warning_above}) must be below critical threshold ({critical_above})"
            );
        }
        Ok(Self {
            warning_above,
            critical_above,
        })
    }

    pub fn classify(&self, value: f64) -> SeverityTier {
        if value > self.critical_above {
            SeverityTier::Critical
        } else if value > self.warning_above {
            SeverityTier::Warning
        } else {
            SeverityTier::Normal
        }
    }
}

/// Classify against the default thresholds
pub fn classify(value: f64) -> SeverityTier {
    Thresholds::default().classify(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_boundaries_stay_in_lower_tier() {
        assert_eq!(classify(100.0), SeverityTier::Normal);
        assert_eq!(classify(120.0), SeverityTier::Warning);
    }

    #[test]
    fn test_tier_ranges() {
        for v in [50.0, 75.0, 99.999, 100.0] {
            assert_eq!(classify(v), SeverityTier::Normal, "value {v}");
        }
        for v in [100.000_001, 100.5, 110.0, 119.99, 120.0] {
            assert_eq!(classify(v), SeverityTier::Warning, "value {v}");
        }
        for v in [120.000_001, 130.0, 150.0] {
            assert_eq!(classify(v), SeverityTier::Critical, "value {v}");
        }
    }

    #[test]
    fn test_reference_values() {
        assert_eq!(classify(130.0), SeverityTier::Critical);
        assert_eq!(classify(110.0), SeverityTier::Warning);
        assert_eq!(classify(95.0), SeverityTier::Normal);
    }

    #[test]
    fn test_samples_stay_in_range() {
        let mut sampler = Sampler::new();
        for _ in 0..100_000 {
            let v = sampler.sample();
            assert!((SAMPLE_MIN..=SAMPLE_MAX).contains(&v), "out of range: {v}");
        }
    }

    #[test]
    fn test_samples_cover_every_tier() {
        let mut sampler = Sampler::seeded(7);
        let mut seen = std::collections::HashSet::new();
        for _ in 0..1_000 {
            seen.insert(classify(sampler.sample()));
        }
        assert_eq!(seen.len(), 3);
    }

    #[test]
    fn test_seeded_sampler_is_reproducible() {
        let mut a = Sampler::seeded(42);
        let mut b = Sampler::seeded(42);
        for _ in 0..10 {
            assert_eq!(a.sample(), b.sample());
        }
    }

    #[test]
    fn test_custom_thresholds() {
        let t = Thresholds::new(80.0, 90.0).unwrap();
        assert_eq!(t.classify(80.0), SeverityTier::Normal);
        assert_eq!(t.classify(85.0), SeverityTier::Warning);
        assert_eq!(t.classify(90.5), SeverityTier::Critical);

        assert!(Thresholds::new(120.0, 100.0).is_err());
        assert!(Thresholds::new(100.0, 100.0).is_err());
        assert!(Thresholds::new(f64::NAN, 100.0).is_err());
    }
}
