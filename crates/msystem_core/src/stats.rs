//! Component scoring for single runs and batches.

use crate::config::StatsConfig;
use crate::error::SimError;
use crate::world::World;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

fn histogram_line(histogram: &BTreeMap<u32, usize>) -> String {
    histogram
        .iter()
        .map(|(score, count)| format!("{score}:{count}"))
        .collect::<Vec<_>>()
        .join(",")
}

/// Score histogram of one world's components.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct TileStats {
    pub tiles: usize,
    pub components: usize,
    /// Component score to number of components with that score.
    pub histogram: BTreeMap<u32, usize>,
    pub full_cell_score: u32,
}

impl TileStats {
    /// Number of components scoring exactly the full-cell threshold.
    #[must_use]
    pub fn full_cells_count(&self) -> usize {
        self.histogram
            .get(&self.full_cell_score)
            .copied()
            .unwrap_or(0)
    }
}

impl fmt::Display for TileStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "tiles={};components={};full_cells={};histogram={}",
            self.tiles,
            self.components,
            self.full_cells_count(),
            histogram_line(&self.histogram)
        )
    }
}

/// Partitions the world into components and buckets them by summed tile score.
#[must_use]
pub fn calculate_tile_stats(world: &World, config: &StatsConfig) -> TileStats {
    let components = world.components();
    let mut histogram = BTreeMap::new();
    for component in &components {
        let score: u32 = component
            .iter()
            .filter_map(|id| world.tile(*id))
            .map(|t| config.tile_scores.get(t.name()).copied().unwrap_or(0))
            .sum();
        *histogram.entry(score).or_insert(0) += 1;
    }
    TileStats {
        tiles: world.tile_count(),
        components: components.len(),
        histogram,
        full_cell_score: config.full_cell_score,
    }
}

/// Aggregate over the valid trials of a batch.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct BatchSummary {
    pub trials: usize,
    pub valid: usize,
    pub failed: usize,
    pub full_cells_mean: Option<f64>,
    pub full_cells_min: Option<usize>,
    pub full_cells_max: Option<usize>,
    pub histogram: BTreeMap<u32, usize>,
}

impl BatchSummary {
    /// Failed trials are counted but never enter the aggregate.
    #[must_use]
    pub fn from_trials(results: &[Result<TileStats, SimError>]) -> Self {
        let valid: Vec<&TileStats> = results.iter().filter_map(|r| r.as_ref().ok()).collect();
        let full: Vec<usize> = valid.iter().map(|s| s.full_cells_count()).collect();
        let mut histogram = BTreeMap::new();
        for stats in &valid {
            for (score, count) in &stats.histogram {
                *histogram.entry(*score).or_insert(0) += count;
            }
        }
        Self {
            trials: results.len(),
            valid: valid.len(),
            failed: results.len() - valid.len(),
            full_cells_mean: (!full.is_empty())
                .then(|| full.iter().sum::<usize>() as f64 / full.len() as f64),
            full_cells_min: full.iter().min().copied(),
            full_cells_max: full.iter().max().copied(),
            histogram,
        }
    }

    #[must_use]
    pub fn has_data(&self) -> bool {
        self.valid > 0
    }
}

impl fmt::Display for BatchSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.has_data() {
            return f.write_str("no data");
        }
        write!(
            f,
            "trials={};valid={};failed={};full_cells_mean={:.3};full_cells_min={};full_cells_max={};histogram={}",
            self.trials,
            self.valid,
            self.failed,
            self.full_cells_mean.unwrap_or_default(),
            self.full_cells_min.unwrap_or_default(),
            self.full_cells_max.unwrap_or_default(),
            histogram_line(&self.histogram)
        )
    }
}
