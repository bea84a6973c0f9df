//! Spatial World: placed tiles, their bonding graph and the floating pool.
//!
//! Tiles live in an arena keyed by [`TileId`]; connectors store the id of
//! their bonded partner instead of a reference, so the graph has no
//! ownership cycles and the whole world can be cloned for all-or-nothing
//! rule application.

mod bonding;
mod collision;
mod components;
mod connect;

pub use connect::Placement;

use crate::config::AppConfig;
use crate::error::{GeometryError, RuleError, ValidationError};
use crate::floating::{clamp_to_bounds, FloatingPool};
use crate::geometry::{Point, Quaternion, RotationLogic, Vector3};
use crate::model::{Catalog, MSystem};
use crate::polytope::Polytope;
use msystem_data::Tile;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TileId(pub u64);

impl std::fmt::Display for TileId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Lifecycle of a placed tile within the current step.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TileState {
    Unchanged,
    Move,
    Create,
    Destroy,
}

/// A connector of a placed tile.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectorRef {
    pub tile: TileId,
    pub connector: usize,
}

impl ConnectorRef {
    #[must_use]
    pub const fn new(tile: TileId, connector: usize) -> Self {
        Self { tile, connector }
    }
}

#[derive(Debug, Clone)]
pub struct TileInSpace {
    pub id: TileId,
    pub tile: Arc<Tile>,
    pub position: Point,
    pub orientation: Quaternion,
    pub state: TileState,
    bonds: Vec<Option<ConnectorRef>>,
}

impl TileInSpace {
    #[must_use]
    pub fn name(&self) -> &str {
        &self.tile.name
    }

    #[must_use]
    pub fn is_live(&self) -> bool {
        self.state != TileState::Destroy
    }

    /// Local template point expressed in world coordinates.
    #[must_use]
    pub fn to_world(&self, local: Point) -> Point {
        self.orientation.apply(local) + self.position
    }

    #[must_use]
    pub fn polytope(&self) -> Polytope {
        Polytope::new(self.tile.vertices.iter().map(|v| self.to_world(*v)).collect())
    }

    /// Surface normal: the template's local +Z in world coordinates.
    #[must_use]
    pub fn normal(&self) -> Vector3 {
        self.orientation.apply(Vector3::Z)
    }

    #[must_use]
    pub fn connector_anchors(&self, connector: usize) -> Vec<Point> {
        self.tile
            .connectors
            .get(connector)
            .map(|c| c.anchors.iter().map(|a| self.to_world(*a)).collect())
            .unwrap_or_default()
    }

    #[must_use]
    pub fn connector_center(&self, connector: usize) -> Point {
        Vector3::centroid(&self.connector_anchors(connector))
    }

    #[must_use]
    pub fn bond(&self, connector: usize) -> Option<ConnectorRef> {
        self.bonds.get(connector).copied().flatten()
    }

    /// `(own connector, partner)` for every bonded connector.
    pub fn bonds(&self) -> impl Iterator<Item = (usize, ConnectorRef)> + '_ {
        self.bonds
            .iter()
            .enumerate()
            .filter_map(|(i, b)| b.map(|b| (i, b)))
    }

    #[must_use]
    pub fn free_connectors(&self) -> Vec<usize> {
        (0..self.bonds.len())
            .filter(|i| self.bonds[*i].is_none())
            .collect()
    }

    fn mark_moved(&mut self) {
        if self.state == TileState::Unchanged {
            self.state = TileState::Move;
        }
    }
}

/// Placed tiles, their bonds and the floating pool of one simulation.
#[derive(Debug, Clone)]
pub struct World {
    catalog: Arc<Catalog>,
    tiles: BTreeMap<TileId, TileInSpace>,
    next_tile_id: u64,
    pub pool: FloatingPool,
    tolerance: f64,
    max_push_retries: u32,
    push_margin: f64,
    reaction_radius: f64,
    bounds: f64,
}

impl World {
    #[must_use]
    pub fn new(catalog: Arc<Catalog>, config: &AppConfig) -> Self {
        Self {
            catalog,
            tiles: BTreeMap::new(),
            next_tile_id: 0,
            pool: FloatingPool::new(),
            tolerance: config.geometry.tolerance,
            max_push_retries: config.geometry.max_push_retries,
            push_margin: config.geometry.push_margin,
            reaction_radius: config.rules.reaction_radius,
            bounds: config.world.bounds,
        }
    }

    /// Builds the initial world from the system's seed placements.
    pub fn seeded<R: Rng>(
        system: &MSystem,
        config: &AppConfig,
        rng: &mut R,
    ) -> Result<Self, ValidationError> {
        let mut world = Self::new(system.catalog.clone(), config);

        for placed in &system.seed.tiles {
            let template = system
                .catalog
                .tile(&placed.tile)
                .cloned()
                .ok_or_else(|| ValidationError::new(&placed.tile, "undeclared tile"))?;
            let orientation = Quaternion::from_euler(placed.orientation);
            orientation
                .rotate(Vector3::X, world.tolerance)
                .map_err(|e: GeometryError| ValidationError::new(&placed.tile, e.to_string()))?;
            world.insert_tile(template, placed.position, orientation, TileState::Unchanged);
        }

        for batch in &system.seed.floating {
            let template = system
                .catalog
                .floating(&batch.name)
                .cloned()
                .ok_or_else(|| ValidationError::new(&batch.name, "undeclared floating object"))?;
            for _ in 0..batch.count {
                let offset = if batch.spread > 0.0 {
                    Vector3::new(
                        rng.gen_range(-batch.spread..=batch.spread),
                        rng.gen_range(-batch.spread..=batch.spread),
                        rng.gen_range(-batch.spread..=batch.spread),
                    )
                } else {
                    Vector3::ZERO
                };
                world.pool.add(
                    template.clone(),
                    clamp_to_bounds(batch.position + offset, world.bounds),
                );
            }
        }

        if config.world.seed_by_concentration {
            let side = 2.0 * world.bounds;
            let volume = side * side * side;
            for template in system.catalog.floating.values() {
                let count = (template.concentration * volume).round() as u64;
                for _ in 0..count {
                    let p = Vector3::new(
                        rng.gen_range(-world.bounds..=world.bounds),
                        rng.gen_range(-world.bounds..=world.bounds),
                        rng.gen_range(-world.bounds..=world.bounds),
                    );
                    world.pool.add(template.clone(), p);
                }
            }
        }

        world.auto_bond();
        world.pool.clear_changes();
        Ok(world)
    }

    #[must_use]
    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    #[must_use]
    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    #[must_use]
    pub fn reaction_radius(&self) -> f64 {
        self.reaction_radius
    }

    #[must_use]
    pub fn bounds(&self) -> f64 {
        self.bounds
    }

    #[must_use]
    pub fn tile(&self, id: TileId) -> Option<&TileInSpace> {
        self.tiles.get(&id)
    }

    /// Every tile, including those marked for removal at the next compaction.
    pub fn all_tiles(&self) -> impl Iterator<Item = &TileInSpace> {
        self.tiles.values()
    }

    /// Tiles not marked Destroy, in id order.
    pub fn tiles(&self) -> impl Iterator<Item = &TileInSpace> {
        self.tiles.values().filter(|t| t.is_live())
    }

    #[must_use]
    pub fn tile_count(&self) -> usize {
        self.tiles().count()
    }

    #[must_use]
    pub fn tiles_named(&self, name: &str) -> Vec<TileId> {
        self.tiles()
            .filter(|t| t.name() == name)
            .map(|t| t.id)
            .collect()
    }

    pub(crate) fn live_tile(&self, id: TileId) -> Result<&TileInSpace, RuleError> {
        self.tiles
            .get(&id)
            .filter(|t| t.is_live())
            .ok_or_else(|| RuleError::NotApplicable(format!("tile {id} is not in the world")))
    }

    /// Places a new instance of `template`.
    pub fn insert_tile(
        &mut self,
        template: Arc<Tile>,
        position: Point,
        orientation: Quaternion,
        state: TileState,
    ) -> TileId {
        let id = TileId(self.next_tile_id);
        self.next_tile_id += 1;
        let bonds = vec![None; template.connectors.len()];
        self.tiles.insert(
            id,
            TileInSpace {
                id,
                tile: template,
                position,
                orientation,
                state,
                bonds,
            },
        );
        id
    }

    pub(crate) fn link(&mut self, a: ConnectorRef, b: ConnectorRef) {
        if let Some(slot) = self
            .tiles
            .get_mut(&a.tile)
            .and_then(|t| t.bonds.get_mut(a.connector))
        {
            *slot = Some(b);
        }
        if let Some(slot) = self
            .tiles
            .get_mut(&b.tile)
            .and_then(|t| t.bonds.get_mut(b.connector))
        {
            *slot = Some(a);
        }
    }

    /// Releases the bond on `at`, on both sides. Returns the former partner.
    pub fn unlink(&mut self, at: ConnectorRef) -> Option<ConnectorRef> {
        let partner = self
            .tiles
            .get_mut(&at.tile)
            .and_then(|t| t.bonds.get_mut(at.connector))
            .and_then(Option::take)?;
        if let Some(slot) = self
            .tiles
            .get_mut(&partner.tile)
            .and_then(|t| t.bonds.get_mut(partner.connector))
        {
            if *slot == Some(at) {
                *slot = None;
            }
        }
        Some(partner)
    }

    /// Marks a tile Destroy and releases all its bonds.
    pub fn destroy_tile(&mut self, id: TileId) -> Result<(), RuleError> {
        let bonded: Vec<usize> = self.live_tile(id)?.bonds().map(|(i, _)| i).collect();
        for connector in bonded {
            self.unlink(ConnectorRef::new(id, connector));
        }
        if let Some(t) = self.tiles.get_mut(&id) {
            t.state = TileState::Destroy;
        }
        Ok(())
    }

    pub(crate) fn translate_tiles(&mut self, ids: &BTreeSet<TileId>, by: Vector3) {
        for id in ids {
            if let Some(t) = self.tiles.get_mut(id) {
                t.position += by;
                t.mark_moved();
            }
        }
    }

    /// Applies the rigid motion taking `pivot_from` to `pivot_to` with extra rotation `delta`.
    pub(crate) fn transform_tiles(
        &mut self,
        ids: &BTreeSet<TileId>,
        delta: Quaternion,
        pivot_from: Point,
        pivot_to: Point,
    ) {
        for id in ids {
            if let Some(t) = self.tiles.get_mut(id) {
                t.position = delta.apply(t.position - pivot_from) + pivot_to;
                t.orientation = (delta * t.orientation).normalized();
                t.mark_moved();
            }
        }
    }

    /// Copies the tiles `ids`, bonds included, shifted by `by`. The copies are in state Create.
    ///
    /// Bonds leaving `ids` are not copied. Returns the new ids in source order.
    pub(crate) fn duplicate(&mut self, ids: &BTreeSet<TileId>, by: Vector3) -> Vec<TileId> {
        let mut mapping = BTreeMap::new();
        for id in ids {
            let Some(src) = self.tiles.get(id).filter(|t| t.is_live()) else {
                continue;
            };
            let (template, position, orientation) = (src.tile.clone(), src.position, src.orientation);
            let copy = self.insert_tile(template, position + by, orientation, TileState::Create);
            mapping.insert(*id, copy);
        }
        let mut links = Vec::new();
        for (old, new) in &mapping {
            if let Some(src) = self.tiles.get(old) {
                for (connector, partner) in src.bonds() {
                    if let Some(&other) = mapping.get(&partner.tile) {
                        links.push((
                            ConnectorRef::new(*new, connector),
                            ConnectorRef::new(other, partner.connector),
                        ));
                    }
                }
            }
        }
        for (a, b) in links {
            self.link(a, b);
        }
        mapping.into_values().collect()
    }

    /// Drops Destroy tiles and resets the rest to Unchanged at the step boundary.
    pub fn compact(&mut self) {
        self.tiles.retain(|_, t| t.is_live());
        for t in self.tiles.values_mut() {
            t.state = TileState::Unchanged;
        }
    }

    /// Checks bond symmetry and that bonds only join live tiles.
    pub fn check_integrity(&self) -> Result<(), RuleError> {
        for t in self.tiles() {
            for (connector, partner) in t.bonds() {
                let other = self.tiles.get(&partner.tile).filter(|o| o.is_live());
                let back = other.and_then(|o| o.bond(partner.connector));
                if back != Some(ConnectorRef::new(t.id, connector)) {
                    return Err(RuleError::Internal(format!(
                        "bond {}:{} -> {}:{} is not mirrored",
                        t.id, connector, partner.tile, partner.connector
                    )));
                }
            }
        }
        Ok(())
    }

}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use msystem_data::Connector;

    pub(crate) fn square(name: &str) -> Arc<Tile> {
        Arc::new(Tile {
            name: name.into(),
            vertices: vec![
                Vector3::new(0.0, 0.0, 0.0),
                Vector3::new(1.0, 0.0, 0.0),
                Vector3::new(1.0, 1.0, 0.0),
                Vector3::new(0.0, 1.0, 0.0),
            ],
            connectors: vec![
                Connector {
                    name: "east".into(),
                    anchors: vec![Vector3::new(1.0, 0.0, 0.0), Vector3::new(1.0, 1.0, 0.0)],
                    angle: 0.0,
                    glue: "g".into(),
                    resistance: None,
                },
                Connector {
                    name: "west".into(),
                    anchors: vec![Vector3::new(0.0, 1.0, 0.0), Vector3::new(0.0, 0.0, 0.0)],
                    angle: 0.0,
                    glue: "g".into(),
                    resistance: None,
                },
            ],
            surface_glue: None,
            proteins: Vec::new(),
            color: Default::default(),
            thickness: 0.1,
        })
    }

    fn world() -> World {
        World::new(Arc::new(Catalog::default()), &AppConfig::default())
    }

    #[test]
    fn test_link_and_destroy_release_both_sides() {
        let mut w = world();
        let a = w.insert_tile(square("q"), Vector3::ZERO, Quaternion::IDENTITY, TileState::Unchanged);
        let b = w.insert_tile(square("q"), Vector3::X, Quaternion::IDENTITY, TileState::Unchanged);
        w.link(ConnectorRef::new(a, 0), ConnectorRef::new(b, 1));
        assert!(w.check_integrity().is_ok());
        assert_eq!(w.tile(b).unwrap().bond(1), Some(ConnectorRef::new(a, 0)));

        w.destroy_tile(a).unwrap();
        assert_eq!(w.tile(b).unwrap().bond(1), None);
        assert_eq!(w.tile_count(), 1);
        assert!(w.check_integrity().is_ok());

        w.compact();
        assert!(w.tile(a).is_none());
        assert!(w.all_tiles().all(|t| t.state == TileState::Unchanged));
    }

    #[test]
    fn test_destroying_twice_is_not_applicable() {
        let mut w = world();
        let a = w.insert_tile(square("q"), Vector3::ZERO, Quaternion::IDENTITY, TileState::Unchanged);
        w.destroy_tile(a).unwrap();
        assert!(matches!(w.destroy_tile(a), Err(RuleError::NotApplicable(_))));
    }

    #[test]
    fn test_translate_marks_move_but_keeps_create() {
        let mut w = world();
        let a = w.insert_tile(square("q"), Vector3::ZERO, Quaternion::IDENTITY, TileState::Unchanged);
        let b = w.insert_tile(square("q"), Vector3::ZERO, Quaternion::IDENTITY, TileState::Create);
        let ids: BTreeSet<_> = [a, b].into_iter().collect();
        w.translate_tiles(&ids, Vector3::Z);
        assert_eq!(w.tile(a).unwrap().state, TileState::Move);
        assert_eq!(w.tile(b).unwrap().state, TileState::Create);
        assert_eq!(w.tile(a).unwrap().position, Vector3::Z);
    }
}
