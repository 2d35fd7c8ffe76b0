//! GenomeContext — the explicit state every genome operation runs against
//!
//! Holds the random source, the id generator, and the engine configuration.
//! Each worker owns its own context; nothing here is global.

use crate::ids::IdGenerator;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Tunable engine behaviour
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Fall back to a random target when restore hints fail to resolve
    pub random_fallback: bool,
    /// Number of buckets used to quantize float parameters for entropy hashing
    pub entropy_quanta: u32,
    /// Longest run of neighbouring symbols extracted for diversity
    pub max_ngram: usize,
    /// Draws allowed when sampling a macro count inside its bounds
    pub max_resample_attempts: u32,
    /// Build/resolve/validate rounds tried by `Genome::generate`
    pub build_attempts: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            random_fallback: true,
            entropy_quanta: 42,
            max_ngram: 3,
            max_resample_attempts: 10_000,
            build_attempts: 100,
        }
    }
}

impl EngineConfig {
    /// Reproducible mode: a hinted edge never silently re-randomizes
    pub fn strict() -> Self {
        Self {
            random_fallback: false,
            build_attempts: 10,
            ..Self::default()
        }
    }

    /// Coarser diversity symbols and more construction retries
    pub fn exploratory() -> Self {
        Self {
            random_fallback: true,
            entropy_quanta: 16,
            max_ngram: 2,
            build_attempts: 1_000,
            ..Self::default()
        }
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn load(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let data = std::fs::read_to_string(path)?;
        Ok(Self::from_json(&data)?)
    }
}

/// Random source, id generator, and configuration for one worker
#[derive(Debug, Clone)]
pub struct GenomeContext {
    pub rng: StdRng,
    pub ids: IdGenerator,
    pub config: EngineConfig,
}

impl GenomeContext {
    /// Deterministic context, used by tests and reproducible runs
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            ids: IdGenerator::new(),
            config: EngineConfig::default(),
        }
    }

    pub fn from_entropy() -> Self {
        Self {
            rng: StdRng::from_entropy(),
            ids: IdGenerator::new(),
            config: EngineConfig::default(),
        }
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Draw from N(mean, sigma) using the Box-Muller transform
    pub fn sample_normal(&mut self, mean: f64, sigma: f64) -> f64 {
        if sigma <= 0.0 {
            return mean;
        }
        let u1: f64 = self.rng.gen_range(f64::EPSILON..1.0);
        let u2: f64 = self.rng.gen();
        let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
        mean + sigma * z
    }

    /// Rejection-sample a normal draw into `[min, max]`
    ///
    /// After `max_resample_attempts` misses the mean, clamped into range,
    /// is used instead.
    pub fn sample_bounded(&mut self, mean: f64, sigma: f64, min: usize, max: usize) -> usize {
        for _ in 0..self.config.max_resample_attempts {
            let draw = self.sample_normal(mean, sigma).round();
            if draw >= min as f64 && draw <= max as f64 {
                return draw as usize;
            }
        }
        (mean.round().max(0.0) as usize).clamp(min, max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_presets() {
        assert!(EngineConfig::default().random_fallback);
        assert!(!EngineConfig::strict().random_fallback);
        assert_eq!(EngineConfig::default().entropy_quanta, 42);
    }

    #[test]
    fn test_config_partial_json() {
        let config = EngineConfig::from_json(r#"{ "random_fallback": false }"#).unwrap();
        assert!(!config.random_fallback);
        assert_eq!(config.max_ngram, 3);
    }

    #[test]
    fn test_seeded_is_reproducible() {
        let mut a = GenomeContext::seeded(7);
        let mut b = GenomeContext::seeded(7);
        for _ in 0..20 {
            assert_eq!(a.sample_normal(2.0, 0.5), b.sample_normal(2.0, 0.5));
        }
    }

    #[test]
    fn test_sample_bounded() {
        let mut ctx = GenomeContext::seeded(1);
        for _ in 0..500 {
            let n = ctx.sample_bounded(2.0, 0.5, 1, 3);
            assert!((1..=3).contains(&n));
        }
        // average far outside the range still lands inside it
        let mut ctx = GenomeContext::seeded(2).with_config(EngineConfig {
            max_resample_attempts: 5,
            ..EngineConfig::default()
        });
        assert_eq!(ctx.sample_bounded(100.0, 0.01, 1, 3), 3);
    }

    #[test]
    fn test_normal_mean() {
        let mut ctx = GenomeContext::seeded(3);
        let n = 5000;
        let sum: f64 = (0..n).map(|_| ctx.sample_normal(10.0, 2.0)).sum();
        let mean = sum / n as f64;
        assert!((mean - 10.0).abs() < 0.2, "mean was {mean}");
    }
}
