//! Step loop, run control and damage injection for one World.

use crate::config::AppConfig;
use crate::error::{SimError, ValidationError};
use crate::metrics::Metrics;
use crate::model::MSystem;
use crate::rules::{RuleEngine, StepReport};
use crate::snapshot::{Notification, StepSnapshot};
use crate::world::World;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc::UnboundedSender;

/// Cooperative stop request, polled once per step.
pub type StopFlag = Arc<AtomicBool>;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimState {
    Idle,
    Run,
    Stop,
    StepLimitReached,
    NoApplicableRule,
}

/// Why a run ended.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    Stop,
    StepLimitReached,
    NoApplicableRule,
}

impl From<Termination> for SimState {
    fn from(t: Termination) -> Self {
        match t {
            Termination::Stop => Self::Stop,
            Termination::StepLimitReached => Self::StepLimitReached,
            Termination::NoApplicableRule => Self::NoApplicableRule,
        }
    }
}

impl fmt::Display for Termination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Stop => "stopped",
            Self::StepLimitReached => "step limit reached",
            Self::NoApplicableRule => "no applicable rule",
        };
        f.write_str(s)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunOutcome {
    /// Steps completed by this run.
    pub steps: u64,
    pub termination: Termination,
}

/// Tile removal applied alongside the rules.
#[derive(Debug, Clone, PartialEq)]
pub enum Damage {
    None,
    /// Each instance of `tile` dies with `probability`, every step.
    Probability { tile: String, probability: f64 },
    /// `count` instances of `tile` die at the first step of the run.
    Count {
        tile: String,
        count: usize,
        probabilistic: bool,
    },
}

/// Messages published by a running simulator.
#[derive(Debug, Clone)]
pub enum SimEvent {
    Snapshot(StepSnapshot),
    Notification(Notification),
    Finished(RunOutcome),
    Failed(String),
}

pub struct Simulator {
    engine: RuleEngine,
    config: AppConfig,
    initial: World,
    initial_rng: ChaCha8Rng,
    world: World,
    rng: ChaCha8Rng,
    seed: u64,
    step: u64,
    state: SimState,
    stop: StopFlag,
    trial: usize,
    events: Option<UnboundedSender<SimEvent>>,
    metrics: Arc<Metrics>,
    initial_published: bool,
}

impl Simulator {
    /// Validates `config` and seeds a fresh world from `system`.
    pub fn new(system: &MSystem, config: &AppConfig, seed: u64) -> crate::error::Result<Self> {
        config
            .validate()
            .map_err(|e| ValidationError::new("config", e.to_string()))?;
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let world = World::seeded(system, config, &mut rng)?;
        Ok(Self {
            engine: RuleEngine::new(system, config),
            config: config.clone(),
            initial: world.clone(),
            initial_rng: rng.clone(),
            world,
            rng,
            seed,
            step: 0,
            state: SimState::Idle,
            stop: Arc::new(AtomicBool::new(false)),
            trial: 0,
            events: None,
            metrics: Arc::new(Metrics::new()),
            initial_published: false,
        })
    }

    #[must_use]
    pub fn with_trial(mut self, trial: usize) -> Self {
        self.trial = trial;
        self
    }

    #[must_use]
    pub fn with_events(mut self, events: UnboundedSender<SimEvent>) -> Self {
        self.events = Some(events);
        self
    }

    #[must_use]
    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Handle for requesting a stop from another thread.
    #[must_use]
    pub fn stop_flag(&self) -> StopFlag {
        self.stop.clone()
    }

    #[must_use]
    pub fn world(&self) -> &World {
        &self.world
    }

    #[must_use]
    pub fn state(&self) -> SimState {
        self.state
    }

    /// Steps completed since the last restart.
    #[must_use]
    pub fn current_step(&self) -> u64 {
        self.step
    }

    #[must_use]
    pub fn seed(&self) -> u64 {
        self.seed
    }

    #[must_use]
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    #[must_use]
    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.metrics
    }

    fn publish(&self, event: SimEvent) {
        if let Some(tx) = &self.events {
            // A dropped observer does not stop the run.
            let _ = tx.send(event);
        }
    }

    fn publish_initial(&mut self) {
        if !self.initial_published {
            self.publish(SimEvent::Snapshot(StepSnapshot::initial(&self.world)));
            self.initial_published = true;
        }
    }

    fn apply_damage(&mut self, damage: &mut Damage) -> Vec<String> {
        let victims = match damage {
            Damage::None => Vec::new(),
            Damage::Probability { tile, probability } => {
                let p = *probability;
                let named = self.world.tiles_named(tile);
                named
                    .into_iter()
                    .filter(|_| self.rng.gen_bool(p))
                    .collect()
            }
            Damage::Count {
                tile,
                count,
                probabilistic,
            } => {
                let named = self.world.tiles_named(tile);
                let victims = if *probabilistic {
                    named
                        .choose_multiple(&mut self.rng, *count)
                        .copied()
                        .collect()
                } else {
                    named.into_iter().take(*count).collect()
                };
                *damage = Damage::None;
                victims
            }
        };

        let mut killed = Vec::with_capacity(victims.len());
        for id in victims {
            let name = self
                .world
                .tile(id)
                .map(|t| format!("{}{}", t.name(), id))
                .unwrap_or_default();
            if self.world.destroy_tile(id).is_ok() {
                killed.push(name);
            }
        }
        killed
    }

    fn describe(&self, report: &StepReport, killed: &[String]) -> String {
        let mut per_rule: Vec<(String, usize)> = Vec::new();
        for firing in &report.fired {
            match per_rule.iter_mut().find(|(name, _)| *name == firing.rule) {
                Some((_, n)) => *n += 1,
                None => per_rule.push((firing.rule.clone(), 1)),
            }
        }
        let fired = per_rule
            .iter()
            .map(|(name, n)| format!("{name} x{n}"))
            .collect::<Vec<_>>()
            .join(", ");
        let mut message = format!(
            "{} firing(s) [{}]; tiles {}; floating {}",
            report.fired.len(),
            fired,
            self.world.tile_count(),
            self.world.pool.len()
        );
        if !killed.is_empty() {
            message.push_str(&format!("; killed {}", killed.join(", ")));
        }
        message
    }

    /// One full step; `Ok(false)` when nothing fired and nothing died.
    fn advance(&mut self, damage: &mut Damage) -> crate::error::Result<bool> {
        let started = Instant::now();
        let step = self.step + 1;
        let killed = self.apply_damage(damage);
        let report = self
            .engine
            .step(&mut self.world, step, &mut self.rng)
            .map_err(|failure| {
                tracing::error!(
                    trial = self.trial,
                    step,
                    rule = %failure.rule,
                    objects = ?failure.objects,
                    error = %failure.cause,
                    "Rule application broke the world"
                );
                SimError::from_rule_failure(self.trial, failure)
            })?;

        if !report.any_fired() && killed.is_empty() {
            return Ok(false);
        }

        let bounds = self.world.bounds();
        self.world.pool.random_walk(&mut self.rng, bounds);
        let snapshot = StepSnapshot::capture(&mut self.world, step);
        self.step = step;

        self.metrics.record_step(
            started.elapsed(),
            &report,
            killed.len(),
            self.world.tile_count(),
        );
        let message = self.describe(&report, &killed);
        self.publish(SimEvent::Snapshot(snapshot));
        self.publish(SimEvent::Notification(Notification { step, message }));
        Ok(true)
    }

    /// Executes a single step outside of a run.
    ///
    /// Returns whether anything happened; an idle step leaves the world unchanged.
    pub fn step(&mut self) -> crate::error::Result<bool> {
        self.publish_initial();
        self.advance(&mut Damage::None)
    }

    fn run(&mut self, max_steps: u64, mut damage: Damage) -> crate::error::Result<RunOutcome> {
        self.publish_initial();
        self.state = SimState::Run;
        tracing::info!(
            trial = self.trial,
            seed = self.seed,
            max_steps,
            step = self.step,
            "Run started"
        );

        let mut steps = 0u64;
        let termination = loop {
            if self.stop.swap(false, Ordering::SeqCst) {
                break Termination::Stop;
            }
            if max_steps > 0 && steps >= max_steps {
                break Termination::StepLimitReached;
            }
            match self.advance(&mut damage) {
                Ok(true) => steps += 1,
                Ok(false) => break Termination::NoApplicableRule,
                Err(e) => {
                    self.state = SimState::Idle;
                    self.publish(SimEvent::Failed(e.to_string()));
                    return Err(e);
                }
            }
        };

        self.state = termination.into();
        let outcome = RunOutcome { steps, termination };
        tracing::info!(
            trial = self.trial,
            steps,
            total_steps = self.step,
            tiles = self.world.tile_count(),
            %termination,
            "Run finished"
        );
        self.publish(SimEvent::Finished(outcome));
        self.state = SimState::Idle;
        Ok(outcome)
    }

    /// Runs until `max_steps` steps complete (0 = unbounded), no rule applies,
    /// or the stop flag is observed.
    pub fn run_simulation(&mut self, max_steps: u64) -> crate::error::Result<RunOutcome> {
        self.run(max_steps, Damage::None)
    }

    /// Runs while killing each `tile` instance with `probability` every step.
    pub fn run_with_kill_probability(
        &mut self,
        max_steps: u64,
        tile: &str,
        probability: f64,
    ) -> crate::error::Result<RunOutcome> {
        if !(0.0..=1.0).contains(&probability) {
            return Err(ValidationError::new(
                tile,
                format!("kill probability {probability} outside [0, 1]"),
            )
            .into());
        }
        self.run(
            max_steps,
            Damage::Probability {
                tile: tile.to_string(),
                probability,
            },
        )
    }

    /// Runs after removing `count` instances of `tile`: random ones when
    /// `probabilistic`, otherwise the oldest.
    pub fn run_with_kills(
        &mut self,
        max_steps: u64,
        tile: &str,
        count: usize,
        probabilistic: bool,
    ) -> crate::error::Result<RunOutcome> {
        self.run(
            max_steps,
            Damage::Count {
                tile: tile.to_string(),
                count,
                probabilistic,
            },
        )
    }

    /// Restores the initial world and random source.
    pub fn restart(&mut self) {
        self.world = self.initial.clone();
        self.rng = self.initial_rng.clone();
        self.step = 0;
        self.state = SimState::Idle;
        self.stop.store(false, Ordering::SeqCst);
        self.initial_published = false;
        tracing::info!(trial = self.trial, seed = self.seed, "Simulation restarted");
    }
}
