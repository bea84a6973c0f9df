//! Evolution Rule Engine.
//!
//! Rules are grouped into tiers of equal priority, lowest value first. In a
//! tier, metabolic rules fire until no candidate is left, then at most one
//! structural candidate commits. Candidates are tried in a random order
//! drawn from the run's own random source; a candidate that fails to apply
//! is rolled back and counts as a non-match.

mod firing;
mod matching;

use crate::config::AppConfig;
use crate::error::{RuleError, RuleFailure};
use crate::floating::FloatingId;
use crate::model::{Catalog, MSystem};
use crate::world::World;
use matching::{candidates, Candidate};
use msystem_data::{EvolutionRule, RuleType};
use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// A committed rule application.
#[derive(Debug, Clone, PartialEq)]
pub struct Firing {
    pub rule: String,
    pub rule_type: RuleType,
    pub priority: u32,
    pub objects: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct StepReport {
    pub fired: Vec<Firing>,
    pub absorbed: Vec<RuleFailure>,
}

impl StepReport {
    #[must_use]
    pub fn any_fired(&self) -> bool {
        !self.fired.is_empty()
    }

    #[must_use]
    pub fn count(&self, rule_type: RuleType) -> usize {
        self.fired.iter().filter(|f| f.rule_type == rule_type).count()
    }
}

#[derive(Debug, Clone)]
pub struct RuleEngine {
    rules: Arc<Vec<EvolutionRule>>,
    catalog: Arc<Catalog>,
    tiers: Vec<(u32, Vec<usize>)>,
    transport_offset: f64,
    divide_gap: f64,
}

impl RuleEngine {
    #[must_use]
    pub fn new(system: &MSystem, config: &AppConfig) -> Self {
        let mut tiers: BTreeMap<u32, Vec<usize>> = BTreeMap::new();
        for (i, rule) in system.rules.iter().enumerate() {
            tiers.entry(rule.priority).or_default().push(i);
        }
        Self {
            rules: system.rules.clone(),
            catalog: system.catalog.clone(),
            tiers: tiers.into_iter().collect(),
            transport_offset: config.rules.transport_offset,
            divide_gap: config.rules.divide_gap,
        }
    }

    /// Priorities in firing order.
    #[must_use]
    pub fn priorities(&self) -> Vec<u32> {
        self.tiers.iter().map(|(p, _)| *p).collect()
    }

    fn failure(&self, world: &World, candidate: &Candidate, step: u64, cause: RuleError) -> RuleFailure {
        RuleFailure {
            rule: self.rules[candidate.rule()].name.clone(),
            step,
            objects: candidate.object_names(world),
            cause,
        }
    }

    /// Applies `candidate` all-or-nothing.
    ///
    /// `Ok(false)` means the candidate did not apply and the world is
    /// untouched; only broken world invariants come back as `Err`.
    fn try_apply(
        &self,
        world: &mut World,
        candidate: &Candidate,
        step: u64,
        spent: &mut BTreeSet<FloatingId>,
        report: &mut StepReport,
    ) -> Result<bool, RuleFailure> {
        let names = candidate.object_names(world);
        let backup = world.clone();
        match self.apply(world, candidate) {
            Ok(produced) => {
                if let Err(cause) = world.check_integrity() {
                    *world = backup;
                    return Err(self.failure(world, candidate, step, cause));
                }
                let rule = &self.rules[candidate.rule()];
                spent.extend(candidate.consumed().iter().copied());
                spent.extend(produced);
                report.fired.push(Firing {
                    rule: rule.name.clone(),
                    rule_type: rule.rule_type(),
                    priority: rule.priority,
                    objects: names,
                });
                Ok(true)
            }
            Err(RuleError::Internal(message)) => {
                *world = backup;
                Err(self.failure(world, candidate, step, RuleError::Internal(message)))
            }
            Err(cause) => {
                *world = backup;
                let failure = self.failure(world, candidate, step, cause);
                tracing::debug!(
                    rule = %failure.rule,
                    step,
                    objects = ?failure.objects,
                    error = %failure.cause,
                    "Rule not applicable"
                );
                report.absorbed.push(failure);
                Ok(false)
            }
        }
    }

    /// Runs one pass over all tiers.
    ///
    /// Non-matching candidates are absorbed into the report; an `Err` means
    /// the world was found inconsistent and the run cannot continue.
    pub fn step<R: Rng>(
        &self,
        world: &mut World,
        step: u64,
        rng: &mut R,
    ) -> Result<StepReport, RuleFailure> {
        let mut report = StepReport::default();
        let mut spent: BTreeSet<FloatingId> = BTreeSet::new();

        for (_, members) in &self.tiers {
            let (metabolic, structural): (Vec<usize>, Vec<usize>) = members
                .iter()
                .partition(|i| !self.rules[**i].is_structural());

            // Saturate metabolic rules.
            loop {
                let mut found: Vec<Candidate> = metabolic
                    .iter()
                    .flat_map(|i| candidates(*i, &self.rules[*i], world, &spent))
                    .collect();
                if found.is_empty() {
                    break;
                }
                found.shuffle(rng);
                let mut progressed = false;
                for candidate in &found {
                    if !candidate.still_available(world, &spent) {
                        continue;
                    }
                    progressed |= self.try_apply(world, candidate, step, &mut spent, &mut report)?;
                }
                if !progressed {
                    break;
                }
            }

            let mut found: Vec<Candidate> = structural
                .iter()
                .flat_map(|i| candidates(*i, &self.rules[*i], world, &spent))
                .collect();
            found.shuffle(rng);
            for candidate in &found {
                if self.try_apply(world, candidate, step, &mut spent, &mut report)? {
                    break;
                }
            }
        }
        Ok(report)
    }
}
