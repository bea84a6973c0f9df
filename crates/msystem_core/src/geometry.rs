pub use msystem_data::{EulerAngles, Point, Quaternion, Vector3};

use crate::error::GeometryError;

/// Rotation behaviour for the plain [`Quaternion`] data type.
pub trait RotationLogic: Sized {
    /// Rotation of `angle` radians about `axis` (right-handed).
    fn from_axis_angle(axis: Vector3, angle: f64) -> Self;
    /// Rotation composed as yaw (Z) after pitch (Y) after roll (X).
    fn from_euler(angles: EulerAngles) -> Self;
    /// Shortest-arc rotation taking direction `from` onto direction `to`.
    ///
    /// Antiparallel inputs turn half a revolution about `hint` when it is
    /// perpendicular to `from`, otherwise about an arbitrary perpendicular.
    fn between(from: Vector3, to: Vector3, hint: Option<Vector3>, tol: f64) -> Self;
    fn is_unit(&self, tol: f64) -> bool;
    /// Rotates `p`, rejecting quaternions whose norm deviates from 1 by more than `tol`.
    fn rotate(&self, p: Vector3, tol: f64) -> Result<Vector3, GeometryError>;
    /// Rotates `p` assuming `self` is already a unit quaternion.
    fn apply(&self, p: Vector3) -> Vector3;
    fn inverse(&self) -> Self;
}

impl RotationLogic for Quaternion {
    fn from_axis_angle(axis: Vector3, angle: f64) -> Self {
        let Some(axis) = axis.normalized(f64::EPSILON) else {
            return Self::IDENTITY;
        };
        let (s, c) = (angle * 0.5).sin_cos();
        Self::new(c, axis.x * s, axis.y * s, axis.z * s)
    }

    fn from_euler(angles: EulerAngles) -> Self {
        let (sr, cr) = (angles.roll * 0.5).sin_cos();
        let (sp, cp) = (angles.pitch * 0.5).sin_cos();
        let (sy, cy) = (angles.yaw * 0.5).sin_cos();
        Self::new(
            cr * cp * cy + sr * sp * sy,
            sr * cp * cy - cr * sp * sy,
            cr * sp * cy + sr * cp * sy,
            cr * cp * sy - sr * sp * cy,
        )
    }

    fn between(from: Vector3, to: Vector3, hint: Option<Vector3>, tol: f64) -> Self {
        let (Some(a), Some(b)) = (from.normalized(tol), to.normalized(tol)) else {
            return Self::IDENTITY;
        };
        let d = a.dot(b);
        if d >= 1.0 - tol {
            return Self::IDENTITY;
        }
        if d <= -1.0 + tol {
            let axis = hint
                .and_then(|h| h.reject_from(a).normalized(tol))
                .unwrap_or_else(|| any_perpendicular(a));
            return Self::from_axis_angle(axis, std::f64::consts::PI);
        }
        let c = a.cross(b);
        Self::new(1.0 + d, c.x, c.y, c.z).normalized()
    }

    fn is_unit(&self, tol: f64) -> bool {
        (self.norm() - 1.0).abs() <= tol
    }

    fn rotate(&self, p: Vector3, tol: f64) -> Result<Vector3, GeometryError> {
        if !self.is_unit(tol) {
            return Err(GeometryError::InvalidRotation { norm: self.norm() });
        }
        Ok(self.apply(p))
    }

    fn apply(&self, p: Vector3) -> Vector3 {
        // v' = v + 2w(u x v) + 2u x (u x v)
        let u = self.vector_part();
        let t = u.cross(p) * 2.0;
        p + t * self.w + u.cross(t)
    }

    fn inverse(&self) -> Self {
        self.conjugate()
    }
}

/// Plane `normal . p = distance` with a unit normal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Plane {
    pub normal: Vector3,
    pub distance: f64,
}

impl Plane {
    #[must_use]
    pub fn from_point_normal(point: Point, normal: Vector3, tol: f64) -> Option<Self> {
        let normal = normal.normalized(tol)?;
        Some(Self {
            normal,
            distance: normal.dot(point),
        })
    }

    /// Plane through the first three non-collinear points of `points`.
    #[must_use]
    pub fn through(points: &[Point], tol: f64) -> Option<Self> {
        let origin = *points.first()?;
        for (i, a) in points.iter().enumerate().skip(1) {
            for b in &points[i + 1..] {
                let n = (*a - origin).cross(*b - origin);
                if let Some(plane) = Self::from_point_normal(origin, n, tol) {
                    return Some(plane);
                }
            }
        }
        None
    }

    #[must_use]
    pub fn signed_distance(&self, p: Point) -> f64 {
        self.normal.dot(p) - self.distance
    }

    #[must_use]
    pub fn is_parallel_to(&self, other: &Self, tol: f64) -> bool {
        self.normal.cross(other.normal).length() <= tol
    }
}

/// Intersection of segment `p1 p2` with `plane`.
///
/// `None` when the segment is (near) parallel to the plane or the hit
/// parameter falls outside `[0, 1]`.
#[must_use]
pub fn intersect_plane_segment(plane: &Plane, p1: Point, p2: Point, tol: f64) -> Option<Point> {
    let d = p2 - p1;
    let denom = plane.normal.dot(d);
    if denom.abs() < tol {
        return None;
    }
    let t = (plane.distance - plane.normal.dot(p1)) / denom;
    if !(0.0..=1.0).contains(&t) {
        return None;
    }
    Some(p1 + d * t)
}

/// Whether every point of `a` has a partner in `b` within `tol`, and vice versa.
#[must_use]
pub fn points_overlap(a: &[Point], b: &[Point], tol: f64) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let covered = |xs: &[Point], ys: &[Point]| {
        xs.iter()
            .all(|x| ys.iter().any(|y| x.approx_eq(*y, tol)))
    };
    covered(a, b) && covered(b, a)
}

/// Some unit vector perpendicular to the non-zero vector `v`.
#[must_use]
pub fn any_perpendicular(v: Vector3) -> Vector3 {
    let ax = v.x.abs();
    let ay = v.y.abs();
    let az = v.z.abs();
    let other = if ax <= ay && ax <= az {
        Vector3::X
    } else if ay <= az {
        Vector3::Y
    } else {
        Vector3::Z
    };
    v.cross(other)
        .normalized(f64::EPSILON)
        .unwrap_or(Vector3::X)
}

/// Signed angle from `from` to `to` about the unit `axis`, both projected onto its normal plane.
#[must_use]
pub fn signed_angle_about(from: Vector3, to: Vector3, axis: Vector3) -> f64 {
    let a = from.reject_from(axis);
    let b = to.reject_from(axis);
    axis.dot(a.cross(b)).atan2(a.dot(b))
}

/// Shortest distance from `p` to segment `a b`.
#[must_use]
pub fn distance_to_segment(p: Point, a: Point, b: Point) -> f64 {
    let ab = b - a;
    let len2 = ab.length_squared();
    if len2 <= f64::EPSILON {
        return p.distance(a);
    }
    let t = ((p - a).dot(ab) / len2).clamp(0.0, 1.0);
    p.distance(a + ab * t)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::{FRAC_PI_2, PI};

    const TOL: f64 = 1e-9;

    #[test]
    fn test_rotate_about_z() {
        let q = Quaternion::from_axis_angle(Vector3::Z, FRAC_PI_2);
        let p = q.rotate(Vector3::X, 1e-6).unwrap();
        assert!(p.approx_eq(Vector3::Y, TOL));
    }

    #[test]
    fn test_rotate_rejects_non_unit() {
        let q = Quaternion::new(2.0, 0.0, 0.0, 0.0);
        assert_eq!(
            q.rotate(Vector3::X, 1e-6),
            Err(GeometryError::InvalidRotation { norm: 2.0 })
        );
    }

    #[test]
    fn test_euler_yaw_matches_axis_angle() {
        let e = Quaternion::from_euler(EulerAngles {
            roll: 0.0,
            pitch: 0.0,
            yaw: 0.7,
        });
        let a = Quaternion::from_axis_angle(Vector3::Z, 0.7);
        assert!(e.apply(Vector3::X).approx_eq(a.apply(Vector3::X), TOL));
    }

    #[test]
    fn test_between_antiparallel_uses_hint() {
        let q = Quaternion::between(Vector3::Y, -Vector3::Y, Some(Vector3::Z), 1e-9);
        assert!(q.apply(Vector3::Y).approx_eq(-Vector3::Y, TOL));
        // Half turn about Z keeps Z fixed.
        assert!(q.apply(Vector3::Z).approx_eq(Vector3::Z, TOL));
    }

    #[test]
    fn test_between_general() {
        let from = Vector3::new(1.0, 2.0, 3.0);
        let to = Vector3::new(-2.0, 0.5, 1.0);
        let q = Quaternion::between(from, to, None, 1e-9);
        let got = q.apply(from).normalized(TOL).unwrap();
        assert!(got.approx_eq(to.normalized(TOL).unwrap(), 1e-9));
    }

    #[test]
    fn test_plane_segment_intersection() {
        let plane = Plane::from_point_normal(Vector3::ZERO, Vector3::Z, TOL).unwrap();
        let hit = intersect_plane_segment(
            &plane,
            Vector3::new(1.0, 1.0, -1.0),
            Vector3::new(1.0, 1.0, 1.0),
            1e-6,
        );
        assert!(hit.unwrap().approx_eq(Vector3::new(1.0, 1.0, 0.0), TOL));
    }

    #[test]
    fn test_plane_segment_parallel_or_short() {
        let plane = Plane::from_point_normal(Vector3::ZERO, Vector3::Z, TOL).unwrap();
        assert!(intersect_plane_segment(&plane, Vector3::X, Vector3::Y, 1e-6).is_none());
        assert!(intersect_plane_segment(
            &plane,
            Vector3::new(0.0, 0.0, 1.0),
            Vector3::new(0.0, 0.0, 2.0),
            1e-6
        )
        .is_none());
    }

    #[test]
    fn test_points_overlap_is_order_free() {
        let a = [Vector3::X, Vector3::Y];
        let b = [Vector3::Y, Vector3::new(1.0, 0.0, 1e-8)];
        assert!(points_overlap(&a, &b, 1e-6));
        assert!(!points_overlap(&a, &[Vector3::X], 1e-6));
        assert!(!points_overlap(&a, &[Vector3::X, Vector3::Z], 1e-6));
    }

    #[test]
    fn test_signed_angle_about() {
        let angle = signed_angle_about(Vector3::X, Vector3::Y, Vector3::Z);
        assert!((angle - FRAC_PI_2).abs() < TOL);
        let angle = signed_angle_about(Vector3::X, -Vector3::X, Vector3::Z);
        assert!((angle.abs() - PI).abs() < TOL);
    }

    #[test]
    fn test_any_perpendicular() {
        for v in [Vector3::X, Vector3::Y, Vector3::Z, Vector3::new(1.0, 1.0, 1.0)] {
            assert!(any_perpendicular(v).dot(v).abs() < TOL);
        }
    }
}
