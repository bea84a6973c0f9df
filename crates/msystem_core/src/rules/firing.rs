//! Rule effects. Each function either fully applies a candidate or returns
//! an error; the engine restores the world on error.

use super::matching::Candidate;
use super::RuleEngine;
use crate::error::RuleError;
use crate::floating::FloatingId;
use crate::geometry::Vector3;
use crate::world::{ConnectorRef, World};
use msystem_data::{Multiset, RuleKind};
use std::collections::BTreeSet;

fn consume(world: &mut World, ids: &[FloatingId]) -> Result<(), RuleError> {
    for id in ids {
        if world.pool.remove(*id).is_none() {
            return Err(RuleError::MissingReagents(format!(
                "floating object {} is gone",
                id.0
            )));
        }
    }
    Ok(())
}

impl RuleEngine {
    fn release(
        &self,
        world: &mut World,
        products: &Multiset,
        at: Vector3,
        produced: &mut Vec<FloatingId>,
    ) -> Result<(), RuleError> {
        for (name, &count) in products {
            let template = self
                .catalog
                .floating(name)
                .cloned()
                .ok_or_else(|| RuleError::Internal(format!("unknown floating object `{name}`")))?;
            for _ in 0..count {
                produced.push(world.pool.add(template.clone(), at));
            }
        }
        Ok(())
    }

    /// Applies `candidate`; returns the floating objects it produced.
    pub(crate) fn apply(
        &self,
        world: &mut World,
        candidate: &Candidate,
    ) -> Result<Vec<FloatingId>, RuleError> {
        let rule = self
            .rules
            .get(candidate.rule())
            .ok_or_else(|| RuleError::Internal("rule index out of range".into()))?;
        let mut produced = Vec::new();

        match (candidate, &rule.kind) {
            (
                Candidate::Metabolic {
                    site,
                    normal,
                    consumed,
                    ..
                },
                RuleKind::Metabolic(m),
            ) => {
                consume(world, consumed)?;
                let offset = *normal * self.transport_offset;
                self.release(world, &m.right_in, *site - offset, &mut produced)?;
                self.release(world, &m.right_out, *site + offset, &mut produced)?;
            }
            (
                Candidate::Create {
                    target,
                    source,
                    reagents,
                    ..
                },
                RuleKind::Create(c),
            ) => {
                let template = self
                    .catalog
                    .tile(&c.tile)
                    .cloned()
                    .ok_or_else(|| RuleError::Internal(format!("unknown tile `{}`", c.tile)))?;
                consume(world, reagents)?;
                let id = world.connect_object(*target, &template, *source)?;
                world.resolve_collisions(&[id])?;
                world.auto_bond();
            }
            (
                Candidate::Insert {
                    left,
                    right,
                    new_left,
                    new_right,
                    reagents,
                    ..
                },
                RuleKind::Insert(ins),
            ) => {
                let template = self
                    .catalog
                    .tile(&ins.tile)
                    .cloned()
                    .ok_or_else(|| RuleError::Internal(format!("unknown tile `{}`", ins.tile)))?;
                consume(world, reagents)?;
                if world.unlink(*left) != Some(*right) {
                    return Err(RuleError::NotApplicable("bond no longer exists".into()));
                }
                let id = world.connect_object(*left, &template, *new_left)?;
                let moved = world.attach_component(ConnectorRef::new(id, *new_right), *right)?;
                let mut placed = vec![id];
                placed.extend(moved);
                world.resolve_collisions(&placed)?;
                world.auto_bond();
            }
            (
                Candidate::Divide {
                    tile,
                    connector,
                    cost,
                    ..
                },
                RuleKind::Divide(_),
            ) => {
                consume(world, cost)?;
                let (dir, component) = {
                    let t = world.tile(*tile).ok_or_else(|| {
                        RuleError::NotApplicable(format!("tile {tile} is gone"))
                    })?;
                    let centroid = t.polytope().centroid();
                    let dir = (t.connector_center(*connector) - centroid)
                        .normalized(world.tolerance())
                        .unwrap_or_else(|| t.normal());
                    (dir, world.component(*tile))
                };
                let (lo, hi) = component
                    .iter()
                    .filter_map(|id| world.tile(*id))
                    .map(|t| t.polytope().extent_along(dir))
                    .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), (a, b)| {
                        (lo.min(a), hi.max(b))
                    });
                let shift = dir * ((hi - lo) + self.divide_gap);
                let copies = world.duplicate(&component, shift);
                world.resolve_collisions(&copies)?;
                world.auto_bond();
            }
            (Candidate::Destroy { tile, reagents, .. }, RuleKind::Destroy(d)) => {
                consume(world, reagents)?;
                let at = world
                    .tile(*tile)
                    .map(|t| t.polytope().centroid())
                    .ok_or_else(|| RuleError::NotApplicable(format!("tile {tile} is gone")))?;
                let targets: BTreeSet<_> = if d.whole_component {
                    world.component(*tile)
                } else {
                    [*tile].into_iter().collect()
                };
                for id in targets {
                    world.destroy_tile(id)?;
                }
                self.release(world, &d.products, at, &mut produced)?;
            }
            _ => {
                return Err(RuleError::Internal(format!(
                    "candidate does not match rule `{}`",
                    rule.name
                )))
            }
        }
        Ok(produced)
    }
}
