//! Candidate rule instances found against the current world.

use crate::floating::FloatingId;
use crate::geometry::{Point, Vector3};
use crate::world::{ConnectorRef, TileId, World};
use msystem_data::{EvolutionRule, MetabolicRule, RuleKind};
use std::collections::BTreeSet;

/// One way a rule could fire right now.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Candidate {
    Metabolic {
        rule: usize,
        tile: TileId,
        site: Point,
        normal: Vector3,
        consumed: Vec<FloatingId>,
    },
    Create {
        rule: usize,
        target: ConnectorRef,
        source: usize,
        reagents: Vec<FloatingId>,
    },
    Insert {
        rule: usize,
        left: ConnectorRef,
        right: ConnectorRef,
        new_left: usize,
        new_right: usize,
        reagents: Vec<FloatingId>,
    },
    Divide {
        rule: usize,
        tile: TileId,
        connector: usize,
        cost: Vec<FloatingId>,
    },
    Destroy {
        rule: usize,
        tile: TileId,
        reagents: Vec<FloatingId>,
    },
}

impl Candidate {
    pub(crate) fn rule(&self) -> usize {
        match self {
            Self::Metabolic { rule, .. }
            | Self::Create { rule, .. }
            | Self::Insert { rule, .. }
            | Self::Divide { rule, .. }
            | Self::Destroy { rule, .. } => *rule,
        }
    }

    /// Floating objects the candidate would consume.
    pub(crate) fn consumed(&self) -> &[FloatingId] {
        match self {
            Self::Metabolic { consumed, .. } => consumed,
            Self::Create { reagents, .. }
            | Self::Insert { reagents, .. }
            | Self::Destroy { reagents, .. } => reagents,
            Self::Divide { cost, .. } => cost,
        }
    }

    pub(crate) fn tiles(&self) -> Vec<TileId> {
        match self {
            Self::Metabolic { tile, .. }
            | Self::Divide { tile, .. }
            | Self::Destroy { tile, .. } => vec![*tile],
            Self::Create { target, .. } => vec![target.tile],
            Self::Insert { left, right, .. } => vec![left.tile, right.tile],
        }
    }

    /// Names of the world objects involved, for logs.
    pub(crate) fn object_names(&self, world: &World) -> Vec<String> {
        let tiles = self
            .tiles()
            .into_iter()
            .filter_map(|id| world.tile(id).map(|t| format!("{}{}", t.name(), id)));
        let floating = self
            .consumed()
            .iter()
            .filter_map(|id| world.pool.get(*id).map(|o| o.name().to_string()));
        tiles.chain(floating).collect()
    }

    /// Whether the consumed objects still exist and are unspent.
    pub(crate) fn still_available(&self, world: &World, spent: &BTreeSet<FloatingId>) -> bool {
        self.consumed()
            .iter()
            .all(|id| !spent.contains(id) && world.pool.get(*id).is_some())
            && self
                .tiles()
                .iter()
                .all(|id| world.tile(*id).is_some_and(|t| t.is_live()))
    }
}

fn metabolic_candidates(
    index: usize,
    m: &MetabolicRule,
    world: &World,
    spent: &BTreeSet<FloatingId>,
    out: &mut Vec<Candidate>,
) {
    let radius = world.reaction_radius();
    let tol = world.tolerance();
    for t in world.tiles() {
        let normal = t.normal();
        for attachment in t.tile.proteins.iter().filter(|p| p.protein == m.protein) {
            let site = t.to_world(attachment.position);
            // Objects within `tol` of the membrane plane count as outer.
            let inner = |p: Point| (p - site).dot(normal) < -tol;
            let Some(mut consumed) =
                world
                    .pool
                    .select_near(site, radius, &m.left_in, spent, |o| inner(o.position))
            else {
                continue;
            };
            let Some(outer) =
                world
                    .pool
                    .select_near(site, radius, &m.left_out, spent, |o| !inner(o.position))
            else {
                continue;
            };
            consumed.extend(outer);
            out.push(Candidate::Metabolic {
                rule: index,
                tile: t.id,
                site,
                normal,
                consumed,
            });
        }
    }
}

/// Every candidate instance of `rule` in the current world.
pub(crate) fn candidates(
    index: usize,
    rule: &EvolutionRule,
    world: &World,
    spent: &BTreeSet<FloatingId>,
) -> Vec<Candidate> {
    let radius = world.reaction_radius();
    let catalog = world.catalog();
    let relation = &catalog.glue_relation;
    let mut out = Vec::new();

    match &rule.kind {
        RuleKind::Metabolic(m) => metabolic_candidates(index, m, world, spent, &mut out),
        RuleKind::Create(c) => {
            let Some(template) = catalog.tile(&c.tile) else {
                return out;
            };
            for t in world.tiles() {
                for connector in t.free_connectors() {
                    let host = &t.tile.connectors[connector];
                    let center = t.connector_center(connector);
                    for (source, s) in template.connectors.iter().enumerate() {
                        if s.anchors.len() != host.anchors.len()
                            || !relation.is_compatible(&host.glue, &s.glue)
                        {
                            continue;
                        }
                        if let Some(reagents) =
                            world.pool.select_near(center, radius, &c.reagents, spent, |_| true)
                        {
                            out.push(Candidate::Create {
                                rule: index,
                                target: ConnectorRef::new(t.id, connector),
                                source,
                                reagents,
                            });
                        }
                    }
                }
            }
        }
        RuleKind::Insert(ins) => {
            let Some(template) = catalog.tile(&ins.tile) else {
                return out;
            };
            for t in world.tiles() {
                for (connector, partner) in t.bonds() {
                    let Some(other) = world.tile(partner.tile) else {
                        continue;
                    };
                    let left_glue = &t.tile.connectors[connector].glue;
                    let right_glue = &other.tile.connectors[partner.connector].glue;
                    let center = t.connector_center(connector);
                    for (n1, a) in template.connectors.iter().enumerate() {
                        if !relation.is_compatible(left_glue, &a.glue) {
                            continue;
                        }
                        for (n2, b) in template.connectors.iter().enumerate() {
                            if n1 == n2 || !relation.is_compatible(&b.glue, right_glue) {
                                continue;
                            }
                            if let Some(reagents) = world
                                .pool
                                .select_near(center, radius, &ins.reagents, spent, |_| true)
                            {
                                out.push(Candidate::Insert {
                                    rule: index,
                                    left: ConnectorRef::new(t.id, connector),
                                    right: partner,
                                    new_left: n1,
                                    new_right: n2,
                                    reagents,
                                });
                            }
                        }
                    }
                }
            }
        }
        RuleKind::Divide(d) => {
            for t in world.tiles().filter(|t| t.name() == d.tile) {
                let Some(connector) = t.tile.connector_index(&d.connector) else {
                    continue;
                };
                if t.bond(connector).is_some() {
                    continue;
                }
                let center = t.polytope().centroid();
                if let Some(cost) = world.pool.select_near(center, radius, &d.cost, spent, |_| true)
                {
                    out.push(Candidate::Divide {
                        rule: index,
                        tile: t.id,
                        connector,
                        cost,
                    });
                }
            }
        }
        RuleKind::Destroy(d) => {
            for t in world.tiles().filter(|t| t.name() == d.tile) {
                let center = t.polytope().centroid();
                if let Some(reagents) =
                    world.pool.select_near(center, radius, &d.reagents, spent, |_| true)
                {
                    out.push(Candidate::Destroy {
                        rule: index,
                        tile: t.id,
                        reagents,
                    });
                }
            }
        }
    }
    out
}
