//! Multi-run batch driver.
//!
//! Every trial builds its own simulator and random source from the shared
//! model, so trials can run on the rayon pool. A trial that fails or panics
//! is logged and excluded from the aggregate.

use msystem_core::{calculate_tile_stats, AppConfig, BatchSummary, MSystem, SimError, Simulator, TileStats};
use msystem_io::RunLogger;
use rayon::prelude::*;
use std::panic::{self, AssertUnwindSafe};

#[derive(Debug, Clone)]
pub struct TrialResult {
    pub trial: usize,
    pub seed: u64,
    pub result: Result<TileStats, SimError>,
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "trial panicked".to_string()
    }
}

/// Runs one trial from a fresh seeded world to completion.
pub fn run_trial(
    system: &MSystem,
    config: &AppConfig,
    trial: usize,
    seed: u64,
) -> Result<TileStats, SimError> {
    let mut simulator = Simulator::new(system, config, seed)?.with_trial(trial);
    simulator.run_simulation(config.batch.max_steps)?;
    Ok(calculate_tile_stats(simulator.world(), &config.stats))
}

pub struct BatchRunner<'a> {
    system: &'a MSystem,
    config: &'a AppConfig,
    logger: &'a RunLogger,
}

impl<'a> BatchRunner<'a> {
    #[must_use]
    pub fn new(system: &'a MSystem, config: &'a AppConfig, logger: &'a RunLogger) -> Self {
        Self {
            system,
            config,
            logger,
        }
    }

    /// Runs `config.batch.trials` standard trials.
    pub fn run(&self) -> (Vec<TrialResult>, BatchSummary) {
        let (system, config) = (self.system, self.config);
        self.run_with(|trial, seed| run_trial(system, config, trial, seed))
    }

    /// Runs every trial through `trial_fn(trial, seed)`.
    pub fn run_with<F>(&self, trial_fn: F) -> (Vec<TrialResult>, BatchSummary)
    where
        F: Fn(usize, u64) -> Result<TileStats, SimError> + Sync,
    {
        let batch = &self.config.batch;
        tracing::info!(
            trials = batch.trials,
            max_steps = batch.max_steps,
            parallel = batch.parallel,
            base_seed = batch.base_seed,
            "Batch started"
        );

        let one = |trial: usize| self.guarded(trial, &trial_fn);
        let results: Vec<TrialResult> = if batch.parallel {
            (0..batch.trials).into_par_iter().map(one).collect()
        } else {
            (0..batch.trials).map(one).collect()
        };

        let outcomes: Vec<Result<TileStats, SimError>> =
            results.iter().map(|r| r.result.clone()).collect();
        let summary = BatchSummary::from_trials(&outcomes);
        if let Err(e) = self.logger.log_batch(&summary) {
            tracing::warn!(error = %e, "Failed to log batch summary");
        }
        tracing::info!(
            valid = summary.valid,
            failed = summary.failed,
            summary = %summary,
            "Batch finished"
        );
        (results, summary)
    }

    fn guarded<F>(&self, trial: usize, trial_fn: &F) -> TrialResult
    where
        F: Fn(usize, u64) -> Result<TileStats, SimError> + Sync,
    {
        let seed = self.config.batch.base_seed.wrapping_add(trial as u64);
        let result = panic::catch_unwind(AssertUnwindSafe(|| trial_fn(trial, seed)))
            .unwrap_or_else(|payload| {
                Err(SimError::RuntimeRunFailure {
                    trial,
                    step: 0,
                    rule: None,
                    objects: Vec::new(),
                    message: panic_message(payload.as_ref()),
                })
            });

        let logged = match &result {
            Ok(stats) => self.logger.log_trial(trial, seed, stats),
            Err(e) => {
                tracing::warn!(trial, seed, error = %e, "Trial excluded from aggregate");
                self.logger.log_trial_failure(trial, seed, e)
            }
        };
        if let Err(e) = logged {
            tracing::warn!(trial, error = %e, "Failed to log trial");
        }
        TrialResult {
            trial,
            seed,
            result,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use msystem_data::MSystemDescription;
    use std::collections::BTreeMap;

    fn empty_system() -> MSystem {
        MSystem::from_description(MSystemDescription::default(), 1e-6).unwrap()
    }

    #[test]
    fn test_panicking_trials_are_excluded() {
        let system = empty_system();
        let config = AppConfig::default();
        let logger = RunLogger::new_dummy();
        let runner = BatchRunner::new(&system, &config, &logger);

        let (results, summary) = runner.run_with(|trial, _| {
            if trial % 2 == 0 {
                panic!("boom in trial {trial}");
            }
            Ok(TileStats {
                tiles: 1,
                components: 1,
                histogram: BTreeMap::from([(30, 1)]),
                full_cell_score: 30,
            })
        });
        assert_eq!(results.len(), 10);
        assert_eq!(summary.valid, 5);
        assert_eq!(summary.failed, 5);
        assert_eq!(summary.full_cells_mean, Some(1.0));
    }

    #[test]
    fn test_seeds_follow_base_seed() {
        let system = empty_system();
        let mut config = AppConfig::default();
        config.batch.base_seed = 100;
        config.batch.trials = 3;
        let logger = RunLogger::new_dummy();
        let (results, _) = BatchRunner::new(&system, &config, &logger).run();
        let mut seeds: Vec<u64> = results.iter().map(|r| r.seed).collect();
        seeds.sort_unstable();
        assert_eq!(seeds, vec![100, 101, 102]);
    }
}
