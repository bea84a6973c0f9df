//! Per-step delta records published to snapshot and notification consumers.

use crate::floating::{FloatingObjectInSpace, PoolChange};
use crate::geometry::Point;
use crate::world::{TileInSpace, TileState, World};
use msystem_data::Color;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ObjectKind {
    Tile,
    Floating,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeltaState {
    Create,
    Move,
    Destroy,
}

/// One object's change during a step.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ObjectDelta {
    pub object_id: u64,
    pub object_name: String,
    pub kind: ObjectKind,
    pub state: DeltaState,
    /// World-space vertices for tiles, the single position for floating objects.
    pub geometry: Vec<Point>,
    pub color: Color,
    pub thickness: f64,
}

impl ObjectDelta {
    fn from_tile(t: &TileInSpace, state: DeltaState) -> Self {
        Self {
            object_id: t.id.0,
            object_name: t.name().to_string(),
            kind: ObjectKind::Tile,
            state,
            geometry: t.polytope().vertices,
            color: t.tile.color,
            thickness: t.tile.thickness,
        }
    }

    fn from_floating(o: &FloatingObjectInSpace, change: PoolChange) -> Self {
        let state = match change {
            PoolChange::Create => DeltaState::Create,
            PoolChange::Move => DeltaState::Move,
            PoolChange::Destroy => DeltaState::Destroy,
        };
        Self {
            object_id: o.id.0,
            object_name: o.name().to_string(),
            kind: ObjectKind::Floating,
            state,
            geometry: vec![o.position],
            color: o.template.color,
            thickness: 0.0,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct StepSnapshot {
    pub step: u64,
    pub deltas: Vec<ObjectDelta>,
}

impl StepSnapshot {
    /// Records every pending change, then compacts the world.
    ///
    /// Afterwards every tile is Unchanged and no pool change is pending.
    pub fn capture(world: &mut World, step: u64) -> Self {
        let mut deltas: Vec<ObjectDelta> = world
            .all_tiles()
            .filter_map(|t| {
                let state = match t.state {
                    TileState::Unchanged => return None,
                    TileState::Create => DeltaState::Create,
                    TileState::Move => DeltaState::Move,
                    TileState::Destroy => DeltaState::Destroy,
                };
                Some(ObjectDelta::from_tile(t, state))
            })
            .collect();
        deltas.extend(
            world
                .pool
                .take_changes()
                .iter()
                .map(|(change, o)| ObjectDelta::from_floating(o, *change)),
        );
        world.compact();
        Self { step, deltas }
    }

    /// Every object of `world` as a Create record; the picture before step 1.
    #[must_use]
    pub fn initial(world: &World) -> Self {
        let mut deltas: Vec<ObjectDelta> = world
            .tiles()
            .map(|t| ObjectDelta::from_tile(t, DeltaState::Create))
            .collect();
        deltas.extend(
            world
                .pool
                .iter()
                .map(|o| ObjectDelta::from_floating(o, PoolChange::Create)),
        );
        Self { step: 0, deltas }
    }

    #[must_use]
    pub fn count(&self, kind: ObjectKind, state: DeltaState) -> usize {
        self.deltas
            .iter()
            .filter(|d| d.kind == kind && d.state == state)
            .count()
    }
}

/// One-line human readable event.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Notification {
    pub step: u64,
    pub message: String,
}

impl fmt::Display for Notification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[step {}] {}", self.step, self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::geometry::{Quaternion, Vector3};
    use crate::model::Catalog;
    use msystem_data::{FloatingObject, Tile};
    use std::sync::Arc;

    fn tile() -> Arc<Tile> {
        Arc::new(Tile {
            name: "t".into(),
            vertices: vec![Vector3::ZERO, Vector3::X, Vector3::Y],
            connectors: Vec::new(),
            surface_glue: None,
            proteins: Vec::new(),
            color: Color::rgb(1, 2, 3),
            thickness: 0.2,
        })
    }

    #[test]
    fn test_capture_reports_and_compacts() {
        let mut w = World::new(Arc::new(Catalog::default()), &AppConfig::default());
        let keep = w.insert_tile(tile(), Vector3::ZERO, Quaternion::IDENTITY, TileState::Create);
        let gone = w.insert_tile(tile(), Vector3::Z, Quaternion::IDENTITY, TileState::Unchanged);
        w.insert_tile(tile(), Vector3::X, Quaternion::IDENTITY, TileState::Unchanged);
        w.destroy_tile(gone).unwrap();
        w.pool.add(
            Arc::new(FloatingObject {
                name: "a".into(),
                concentration: 0.0,
                mobility: 0.0,
                color: Default::default(),
            }),
            Vector3::ZERO,
        );

        let snap = StepSnapshot::capture(&mut w, 4);
        assert_eq!(snap.step, 4);
        assert_eq!(snap.count(ObjectKind::Tile, DeltaState::Create), 1);
        assert_eq!(snap.count(ObjectKind::Tile, DeltaState::Destroy), 1);
        assert_eq!(snap.count(ObjectKind::Floating, DeltaState::Create), 1);
        assert_eq!(snap.deltas.len(), 3);
        let created = &snap.deltas[0];
        assert_eq!(created.object_id, keep.0);
        assert_eq!(created.geometry.len(), 3);
        assert_eq!(created.color, Color::rgb(1, 2, 3));

        assert!(w.tile(gone).is_none());
        assert!(StepSnapshot::capture(&mut w, 5).deltas.is_empty());
    }

    #[test]
    fn test_notification_display() {
        let n = Notification {
            step: 3,
            message: "grow fired".into(),
        };
        assert_eq!(n.to_string(), "[step 3] grow fired");
    }
}
