//! Configuration management for simulation runs.
//!
//! This module provides strongly-typed configuration structures that map to
//! a `config.toml` file. The Object Model itself comes from the descriptor;
//! everything here tunes how a run of that model behaves.
//!
//! ## Example `config.toml`
//!
//! ```toml
//! [world]
//! seed = 42
//! bounds = 50.0
//!
//! [geometry]
//! tolerance = 1e-6
//! max_push_retries = 32
//!
//! [rules]
//! reaction_radius = 5.0
//!
//! [stats]
//! full_cell_score = 150
//!
//! [stats.tile_scores]
//! q1 = 15
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// World-level parameters.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(default)]
pub struct WorldConfig {
    /// Seed of the run's random source; `None` draws one from entropy.
    pub seed: Option<u64>,
    /// Half extent of the cube floating objects are confined to.
    pub bounds: f64,
    /// Seed every floating object template by its concentration.
    pub seed_by_concentration: bool,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            seed: None,
            bounds: 50.0,
            seed_by_concentration: false,
        }
    }
}

/// Geometry kernel and contact resolution parameters.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(default)]
pub struct GeometryConfig {
    /// The single epsilon used for every geometric comparison.
    pub tolerance: f64,
    pub max_push_retries: u32,
    /// Extra clearance added on top of each corrective push.
    pub push_margin: f64,
}

impl Default for GeometryConfig {
    fn default() -> Self {
        Self {
            tolerance: 1e-6,
            max_push_retries: 32,
            push_margin: 1e-3,
        }
    }
}

/// Rule matching parameters.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(default)]
pub struct RulesConfig {
    /// Distance within which floating objects take part in a reaction.
    pub reaction_radius: f64,
    /// Distance from the tile surface at which transported objects are released.
    pub transport_offset: f64,
    /// Clearance between a divided component and its copy.
    pub divide_gap: f64,
}

impl Default for RulesConfig {
    fn default() -> Self {
        Self {
            reaction_radius: 5.0,
            transport_offset: 0.5,
            divide_gap: 1.0,
        }
    }
}

/// Component scoring used by the statistics aggregator.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct StatsConfig {
    /// Completion score contributed by each tile, by template name.
    pub tile_scores: BTreeMap<String, u32>,
    /// Component score counted as a fully assembled cell.
    pub full_cell_score: u32,
}

/// Multi-run batch parameters.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(default)]
pub struct BatchConfig {
    pub trials: usize,
    /// Step limit per trial; 0 runs until no rule applies.
    pub max_steps: u64,
    pub parallel: bool,
    /// Trial `i` is seeded with `base_seed + i`.
    pub base_seed: u64,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            trials: 10,
            max_steps: 100,
            parallel: true,
            base_seed: 0,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct AppConfig {
    pub world: WorldConfig,
    pub geometry: GeometryConfig,
    pub rules: RulesConfig,
    pub stats: StatsConfig,
    pub batch: BatchConfig,
}

impl AppConfig {
    /// Validates configuration values.
    pub fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            self.world.bounds.is_finite() && self.world.bounds > 0.0,
            "World bounds must be positive"
        );
        anyhow::ensure!(
            self.geometry.tolerance > 0.0 && self.geometry.tolerance < 1.0,
            "Tolerance must be in (0.0, 1.0)"
        );
        anyhow::ensure!(
            self.geometry.max_push_retries > 0,
            "Max push retries must be positive"
        );
        anyhow::ensure!(
            self.geometry.push_margin >= 0.0,
            "Push margin must be non-negative"
        );
        anyhow::ensure!(
            self.rules.reaction_radius >= 0.0,
            "Reaction radius must be non-negative"
        );
        anyhow::ensure!(
            self.rules.transport_offset >= 0.0,
            "Transport offset must be non-negative"
        );
        anyhow::ensure!(
            self.rules.divide_gap >= 0.0,
            "Divide gap must be non-negative"
        );
        anyhow::ensure!(self.batch.trials > 0, "Batch needs at least one trial");
        Ok(())
    }

    /// Parses and validates a TOML document.
    pub fn from_toml(content: &str) -> anyhow::Result<Self> {
        let config = toml::from_str::<Self>(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads `path`, falling back to defaults when the file does not exist.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            tracing::info!(path = %path.display(), "No config file, using defaults");
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Short digest identifying the parameters that affect run outcomes.
    #[must_use]
    pub fn fingerprint(&self) -> String {
        use sha2::{Digest, Sha256};
        let mut hasher = Sha256::new();
        hasher.update(format!("{:?}", self.geometry).as_bytes());
        hasher.update(format!("{:?}", self.rules).as_bytes());
        hasher.update(format!("{:?}", self.stats).as_bytes());
        hex::encode(&hasher.finalize()[..8])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_validates() {
        assert!(AppConfig::default().validate().is_ok());
    }

    #[test]
    fn test_invalid_tolerance() {
        let config = AppConfig {
            geometry: GeometryConfig {
                tolerance: 0.0,
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_negative_reaction_radius() {
        let config = AppConfig {
            rules: RulesConfig {
                reaction_radius: -1.0,
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = AppConfig::from_toml(
            r#"
            [rules]
            reaction_radius = 2.5

            [stats]
            full_cell_score = 30

            [stats.tile_scores]
            q1 = 15
            "#,
        )
        .unwrap();
        assert!((config.rules.reaction_radius - 2.5).abs() < f64::EPSILON);
        assert_eq!(config.stats.tile_scores["q1"], 15);
        assert_eq!(config.geometry.max_push_retries, 32);
    }

    #[test]
    fn test_fingerprint_consistency() {
        assert_eq!(
            AppConfig::default().fingerprint(),
            AppConfig::default().fingerprint()
        );
    }
}
