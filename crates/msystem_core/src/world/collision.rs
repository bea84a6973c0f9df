use super::{TileId, World};
use crate::error::RuleError;
use crate::geometry::Vector3;
use crate::polytope::{pushing_of, Shape};
use std::collections::BTreeSet;

impl World {
    fn directly_bonded(&self, a: TileId, b: TileId) -> bool {
        self.tile(a)
            .is_some_and(|t| t.bonds().any(|(_, partner)| partner.tile == b))
    }

    /// First live polygon penetrated by a tile of `active`.
    fn first_collision(&self, active: &BTreeSet<TileId>) -> Option<(TileId, TileId)> {
        for &a in active {
            let Some(tile_a) = self.tile(a).filter(|t| t.is_live()) else {
                continue;
            };
            let poly_a = tile_a.polytope();
            if poly_a.shape() != Shape::Polygon {
                continue;
            }
            for other in self.tiles() {
                if other.id == a || self.directly_bonded(a, other.id) {
                    continue;
                }
                let poly_b = other.polytope();
                if !poly_a.intersections_with(&poly_b, self.tolerance).is_empty() {
                    return Some((a, other.id));
                }
            }
        }
        None
    }

    /// Pushes other components away until nothing intersects the tiles of
    /// `placed`. The component holding `placed` never moves.
    ///
    /// Returns the number of pushes performed.
    pub fn resolve_collisions(&mut self, placed: &[TileId]) -> Result<u32, RuleError> {
        let anchored: BTreeSet<TileId> = placed
            .iter()
            .flat_map(|id| self.component(*id))
            .collect();
        let mut active: BTreeSet<TileId> = placed.iter().copied().collect();
        let mut pushes = 0;

        while let Some((a, b)) = self.first_collision(&active) {
            if pushes >= self.max_push_retries {
                return Err(RuleError::CollisionUnresolved { retries: pushes });
            }
            let (mover, obstacle) = match (anchored.contains(&a), anchored.contains(&b)) {
                (true, true) => {
                    tracing::debug!(%a, %b, "component collides with itself");
                    return Err(RuleError::CollisionUnresolved { retries: pushes });
                }
                (_, false) => (b, a),
                (false, true) => (a, b),
            };
            let (Some(m), Some(o)) = (self.tile(mover), self.tile(obstacle)) else {
                return Err(RuleError::Internal("colliding tile vanished".into()));
            };
            let shift = pushing_of(
                &m.polytope(),
                &o.polytope(),
                Vector3::ZERO,
                self.push_margin,
                self.tolerance,
            );
            let group = self.component(mover);
            self.translate_tiles(&group, shift);
            active.extend(group);
            pushes += 1;
        }
        Ok(pushes)
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::square;
    use super::super::{ConnectorRef, TileState};
    use super::*;
    use crate::config::AppConfig;
    use crate::geometry::{Quaternion, RotationLogic};
    use crate::model::Catalog;
    use std::f64::consts::FRAC_PI_2;
    use std::sync::Arc;

    fn world() -> World {
        World::new(Arc::new(Catalog::default()), &AppConfig::default())
    }

    #[test]
    fn test_overlapping_component_is_pushed_clear() {
        let mut w = world();
        let placed = w.insert_tile(square("q"), Vector3::ZERO, Quaternion::IDENTITY, TileState::Create);
        let a = w.insert_tile(
            square("q"),
            Vector3::new(0.5, 0.25, 0.0),
            Quaternion::IDENTITY,
            TileState::Unchanged,
        );
        let b = w.insert_tile(
            square("q"),
            Vector3::new(1.5, 0.25, 0.0),
            Quaternion::IDENTITY,
            TileState::Unchanged,
        );
        w.link(ConnectorRef::new(a, 0), ConnectorRef::new(b, 1));

        let pushes = w.resolve_collisions(&[placed]).unwrap();
        assert!(pushes >= 1);
        assert_eq!(w.tile(placed).unwrap().position, Vector3::ZERO);
        assert_eq!(w.tile(a).unwrap().state, TileState::Move);
        assert!(w.tile(a).unwrap().position.z.abs() < 1e-12);
        // The pushed pair moved together and stays bonded.
        let offset = w.tile(b).unwrap().position - w.tile(a).unwrap().position;
        assert!(offset.approx_eq(Vector3::X, 1e-9));
        let p = w.tile(placed).unwrap().polytope();
        for id in [a, b] {
            assert!(p.intersections_with(&w.tile(id).unwrap().polytope(), 1e-6).is_empty());
        }
    }

    #[test]
    fn test_self_collision_is_unresolved() {
        let mut w = world();
        let a = w.insert_tile(square("q"), Vector3::ZERO, Quaternion::IDENTITY, TileState::Create);
        // Wall through x = 0.5, same component as `a` via `c`.
        let b = w.insert_tile(
            square("q"),
            Vector3::new(0.5, 0.25, -0.5),
            Quaternion::from_axis_angle(Vector3::Y, -FRAC_PI_2),
            TileState::Create,
        );
        let c = w.insert_tile(square("q"), Vector3::new(5.0, 0.0, 0.0), Quaternion::IDENTITY, TileState::Create);
        w.link(ConnectorRef::new(a, 1), ConnectorRef::new(c, 0));
        w.link(ConnectorRef::new(c, 1), ConnectorRef::new(b, 0));
        let err = w.resolve_collisions(&[a]).unwrap_err();
        assert!(matches!(err, RuleError::CollisionUnresolved { .. }));
    }

    #[test]
    fn test_crossing_wall_is_pushed_clear() {
        let mut w = world();
        let placed = w.insert_tile(square("q"), Vector3::ZERO, Quaternion::IDENTITY, TileState::Create);
        // Same width as `placed`, standing through x = 0.5.
        let wall = w.insert_tile(
            square("q"),
            Vector3::new(0.5, 0.0, -0.5),
            Quaternion::from_axis_angle(Vector3::Y, -FRAC_PI_2),
            TileState::Unchanged,
        );
        assert!(!w
            .tile(placed)
            .unwrap()
            .polytope()
            .intersections_with(&w.tile(wall).unwrap().polytope(), 1e-6)
            .is_empty());

        assert!(w.resolve_collisions(&[placed]).unwrap() >= 1);
        assert_eq!(w.tile(placed).unwrap().position, Vector3::ZERO);
        assert!(w
            .tile(placed)
            .unwrap()
            .polytope()
            .intersections_with(&w.tile(wall).unwrap().polytope(), 1e-6)
            .is_empty());
    }

    #[test]
    fn test_no_collision_means_no_push() {
        let mut w = world();
        let a = w.insert_tile(square("q"), Vector3::ZERO, Quaternion::IDENTITY, TileState::Create);
        w.insert_tile(square("q"), Vector3::new(1.0, 0.0, 0.0), Quaternion::IDENTITY, TileState::Unchanged);
        assert_eq!(w.resolve_collisions(&[a]).unwrap(), 0);
    }
}
