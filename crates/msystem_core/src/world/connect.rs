use super::{ConnectorRef, TileId, TileState, World};
use crate::error::RuleError;
use crate::geometry::{
    any_perpendicular, points_overlap, signed_angle_about, Point, Quaternion, RotationLogic,
    Vector3,
};
use msystem_data::Tile;
use std::collections::BTreeSet;
use std::sync::Arc;

/// Rigid transform of a tile about to be placed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    pub position: Point,
    pub orientation: Quaternion,
}

/// Orientation gluing an edge connector head-to-tail onto the target edge,
/// folded about it to `angle` (0 leaves both tiles coplanar, on opposite sides).
fn edge_alignment(
    target: &[Point],
    local: &[Point],
    host_centroid: Point,
    local_centroid: Point,
    angle: f64,
    tol: f64,
) -> Result<Quaternion, RuleError> {
    let n = target.len();
    let target_span = target[0] - target[n - 1];
    let local_span = local[n - 1] - local[0];
    if (target_span.length() - local_span.length()).abs() > tol {
        return Err(RuleError::GeometryMismatch(format!(
            "edge lengths differ ({:.6} vs {:.6})",
            target_span.length(),
            local_span.length()
        )));
    }
    let (Some(t_dir), Some(l_dir)) = (target_span.normalized(tol), local_span.normalized(tol))
    else {
        return Err(RuleError::GeometryMismatch("degenerate edge".into()));
    };

    let r1 = Quaternion::between(l_dir, t_dir, Some(Vector3::Z), tol);

    let mid_t = Vector3::centroid(target);
    let mid_l = Vector3::centroid(local);
    let host_side = (host_centroid - mid_t)
        .reject_from(t_dir)
        .normalized(tol)
        .unwrap_or_else(|| any_perpendicular(t_dir));
    let desired = Quaternion::from_axis_angle(t_dir, angle).apply(-host_side);

    let r2 = match r1
        .apply(local_centroid - mid_l)
        .reject_from(t_dir)
        .normalized(tol)
    {
        Some(current) => {
            Quaternion::from_axis_angle(t_dir, signed_angle_about(current, desired, t_dir))
        }
        None => Quaternion::IDENTITY,
    };
    Ok((r2 * r1).normalized())
}

/// Orientation pointing the new tile away from the host through a point
/// connector, turned by `angle` about the host normal.
fn point_alignment(
    anchor: Point,
    local_anchor: Point,
    host_centroid: Point,
    host_normal: Vector3,
    local_centroid: Point,
    angle: f64,
    tol: f64,
) -> Quaternion {
    let outward = (anchor - host_centroid)
        .normalized(tol)
        .unwrap_or(host_normal);
    let axis = if host_normal.cross(outward).length() > tol {
        host_normal
    } else {
        any_perpendicular(outward)
    };
    let desired = Quaternion::from_axis_angle(axis, angle).apply(outward);
    let inward = (local_centroid - local_anchor)
        .normalized(tol)
        .unwrap_or(Vector3::X);
    let r1 = Quaternion::between(inward, desired, Some(Vector3::Z), tol);

    // Roll about the bond direction so the normals agree as far as possible.
    let current = r1.apply(Vector3::Z);
    let roll = if current.reject_from(desired).length() > tol
        && host_normal.reject_from(desired).length() > tol
    {
        Quaternion::from_axis_angle(desired, signed_angle_about(current, host_normal, desired))
    } else {
        Quaternion::IDENTITY
    };
    (roll * r1).normalized()
}

impl World {
    /// Checks the glue table for a bond between `glue1` and `glue2` at `center`,
    /// including its signal requirement against the floating pool.
    pub fn check_bond(&self, glue1: &str, glue2: &str, center: Point) -> Result<(), RuleError> {
        let signals = self
            .catalog
            .glue_relation
            .signals_for(glue1, glue2)
            .ok_or_else(|| RuleError::IncompatibleGlue {
                glue1: glue1.to_string(),
                glue2: glue2.to_string(),
            })?;
        for (signal, &count) in signals {
            if self.pool.count_within(center, self.reaction_radius, signal) < count as usize {
                return Err(RuleError::MissingSignal {
                    glue1: glue1.to_string(),
                    glue2: glue2.to_string(),
                    signal: signal.clone(),
                });
            }
        }
        Ok(())
    }

    /// Transform that puts `template`'s connector `source` onto `target`.
    ///
    /// Anchors map in reverse order; the result is verified with
    /// [`points_overlap`] before it is returned.
    pub fn placement_for(
        &self,
        target: ConnectorRef,
        template: &Tile,
        source: usize,
    ) -> Result<Placement, RuleError> {
        let tol = self.tolerance;
        let host = self.live_tile(target.tile)?;
        let host_conn = host.tile.connectors.get(target.connector).ok_or_else(|| {
            RuleError::Internal(format!("{} has no connector {}", host.name(), target.connector))
        })?;
        let src_conn = template.connectors.get(source).ok_or_else(|| {
            RuleError::Internal(format!("{} has no connector {source}", template.name))
        })?;

        if host_conn.anchors.len() != src_conn.anchors.len() {
            return Err(RuleError::GeometryMismatch(format!(
                "connector `{}` has {} anchors, `{}` has {}",
                host_conn.name,
                host_conn.anchors.len(),
                src_conn.name,
                src_conn.anchors.len()
            )));
        }
        if (host_conn.angle - src_conn.angle).abs() > tol {
            return Err(RuleError::GeometryMismatch(format!(
                "bonding angles differ ({} vs {})",
                host_conn.angle, src_conn.angle
            )));
        }

        let target_anchors = host.connector_anchors(target.connector);
        let local = &src_conn.anchors;
        let host_centroid = host.polytope().centroid();
        let local_centroid = Vector3::centroid(&template.vertices);

        let orientation = if local.len() == 1 {
            point_alignment(
                target_anchors[0],
                local[0],
                host_centroid,
                host.normal(),
                local_centroid,
                host_conn.angle,
                tol,
            )
        } else {
            edge_alignment(
                &target_anchors,
                local,
                host_centroid,
                local_centroid,
                host_conn.angle,
                tol,
            )?
        };
        let last = target_anchors.len() - 1;
        let position = target_anchors[last] - orientation.rotate(local[0], tol)?;

        let placed: Vec<Point> = local
            .iter()
            .map(|a| orientation.apply(*a) + position)
            .collect();
        if !points_overlap(&placed, &target_anchors, tol * 10.0) {
            return Err(RuleError::GeometryMismatch(format!(
                "anchors of `{}` do not meet `{}`",
                src_conn.name, host_conn.name
            )));
        }
        Ok(Placement {
            position,
            orientation,
        })
    }

    /// Places a new instance of `template` bonded through its connector
    /// `source` to the free connector `target`.
    ///
    /// The new tile is in state Create. Collisions are not resolved here.
    pub fn connect_object(
        &mut self,
        target: ConnectorRef,
        template: &Arc<Tile>,
        source: usize,
    ) -> Result<TileId, RuleError> {
        let host = self.live_tile(target.tile)?;
        if host.bond(target.connector).is_some() {
            return Err(RuleError::NotApplicable(format!(
                "connector {} of {} is already bonded",
                target.connector, target.tile
            )));
        }
        let host_glue = host
            .tile
            .connectors
            .get(target.connector)
            .map(|c| c.glue.clone())
            .unwrap_or_default();
        let src_glue = template
            .connectors
            .get(source)
            .map(|c| c.glue.as_str())
            .unwrap_or_default();
        self.check_bond(&host_glue, src_glue, host.connector_center(target.connector))?;

        let placement = self.placement_for(target, template, source)?;
        let id = self.insert_tile(
            template.clone(),
            placement.position,
            placement.orientation,
            TileState::Create,
        );
        self.link(target, ConnectorRef::new(id, source));
        Ok(id)
    }

    /// Bonds two free connectors of placed tiles whose anchors already meet.
    pub fn connect_placed(&mut self, a: ConnectorRef, b: ConnectorRef) -> Result<(), RuleError> {
        if a.tile == b.tile {
            return Err(RuleError::GeometryMismatch("a tile cannot bond to itself".into()));
        }
        let ta = self.live_tile(a.tile)?;
        let tb = self.live_tile(b.tile)?;
        if ta.bond(a.connector).is_some() || tb.bond(b.connector).is_some() {
            return Err(RuleError::NotApplicable("connector already bonded".into()));
        }
        let (Some(ca), Some(cb)) = (
            ta.tile.connectors.get(a.connector),
            tb.tile.connectors.get(b.connector),
        ) else {
            return Err(RuleError::Internal("connector index out of range".into()));
        };
        let anchors_a = ta.connector_anchors(a.connector);
        let anchors_b = tb.connector_anchors(b.connector);
        if !points_overlap(&anchors_a, &anchors_b, self.tolerance * 10.0) {
            return Err(RuleError::GeometryMismatch(format!(
                "anchors of `{}` and `{}` do not coincide",
                ca.name, cb.name
            )));
        }
        self.check_bond(&ca.glue, &cb.glue, Vector3::centroid(&anchors_a))?;
        self.link(a, b);
        Ok(())
    }

    /// Moves the component of `mover.tile` rigidly so that `mover` meets
    /// `target`, then bonds them.
    pub fn attach_component(
        &mut self,
        target: ConnectorRef,
        mover: ConnectorRef,
    ) -> Result<BTreeSet<TileId>, RuleError> {
        let moving = self.component(mover.tile);
        if moving.contains(&target.tile) {
            return Err(RuleError::GeometryMismatch(
                "target belongs to the component being moved".into(),
            ));
        }
        let (template, old_position, old_orientation) = {
            let t = self.live_tile(mover.tile)?;
            (t.tile.clone(), t.position, t.orientation)
        };
        let placement = self.placement_for(target, &template, mover.connector)?;
        let delta = placement.orientation * old_orientation.inverse();
        self.transform_tiles(&moving, delta, old_position, placement.position);
        self.connect_placed(target, mover)?;
        Ok(moving)
    }
}
