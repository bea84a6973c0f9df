//! Flat convex shapes in world coordinates and their contact tests.
//!
//! Three or more vertices make a polygon, two a rod and one a point. Only
//! polygons take part in collision; rods and points merely bond.

use crate::geometry::{
    any_perpendicular, distance_to_segment, intersect_plane_segment, Plane, Point, Vector3,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    Point,
    Rod,
    Polygon,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Polytope {
    pub vertices: Vec<Point>,
}

/// 2D frame spanning a polygon's plane.
struct PlaneFrame {
    origin: Point,
    u: Vector3,
    w: Vector3,
}

impl PlaneFrame {
    fn project(&self, p: Point) -> (f64, f64) {
        let d = p - self.origin;
        (d.dot(self.u), d.dot(self.w))
    }

    fn lift(&self, p: (f64, f64)) -> Point {
        self.origin + self.u * p.0 + self.w * p.1
    }
}

fn cross2(a: (f64, f64), b: (f64, f64)) -> f64 {
    a.0 * b.1 - a.1 * b.0
}

fn sub2(a: (f64, f64), b: (f64, f64)) -> (f64, f64) {
    (a.0 - b.0, a.1 - b.1)
}

/// Shoelace area, positive for counter-clockwise outlines.
fn signed_area(pts: &[(f64, f64)]) -> f64 {
    let n = pts.len();
    (0..n).map(|i| cross2(pts[i], pts[(i + 1) % n])).sum::<f64>() / 2.0
}

fn sign(x: f64, tol: f64) -> i8 {
    if x > tol {
        1
    } else if x < -tol {
        -1
    } else {
        0
    }
}

impl Polytope {
    #[must_use]
    pub fn new(vertices: Vec<Point>) -> Self {
        Self { vertices }
    }

    #[must_use]
    pub fn shape(&self) -> Shape {
        match self.vertices.len() {
            0 | 1 => Shape::Point,
            2 => Shape::Rod,
            _ => Shape::Polygon,
        }
    }

    #[must_use]
    pub fn centroid(&self) -> Point {
        Vector3::centroid(&self.vertices)
    }

    #[must_use]
    pub fn plane(&self, tol: f64) -> Option<Plane> {
        if self.shape() != Shape::Polygon {
            return None;
        }
        Plane::through(&self.vertices, tol)
    }

    /// Boundary segments; closed for polygons.
    #[must_use]
    pub fn edges(&self) -> Vec<(Point, Point)> {
        let n = self.vertices.len();
        match self.shape() {
            Shape::Point => Vec::new(),
            Shape::Rod => vec![(self.vertices[0], self.vertices[1])],
            Shape::Polygon => (0..n)
                .map(|i| (self.vertices[i], self.vertices[(i + 1) % n]))
                .collect(),
        }
    }

    #[must_use]
    pub fn translated(&self, by: Vector3) -> Self {
        Self::new(self.vertices.iter().map(|v| *v + by).collect())
    }

    /// Signed extent `(min, max)` of the vertices along `dir`.
    #[must_use]
    pub fn extent_along(&self, dir: Vector3) -> (f64, f64) {
        self.vertices
            .iter()
            .map(|v| v.dot(dir))
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), x| {
                (lo.min(x), hi.max(x))
            })
    }

    fn frame(&self, plane: &Plane, tol: f64) -> Option<PlaneFrame> {
        let origin = *self.vertices.first()?;
        let u = self
            .vertices
            .iter()
            .find_map(|v| (*v - origin).normalized(tol))?;
        Some(PlaneFrame {
            origin,
            u,
            w: plane.normal.cross(u),
        })
    }

    fn inside_2d(&self, frame: &PlaneFrame, p: Point) -> bool {
        let q = frame.project(p);
        let pts: Vec<(f64, f64)> = self.vertices.iter().map(|v| frame.project(*v)).collect();
        let mut inside = false;
        let mut j = pts.len() - 1;
        for i in 0..pts.len() {
            let (a, b) = (pts[i], pts[j]);
            if (a.1 > q.1) != (b.1 > q.1) {
                let x = a.0 + (q.1 - a.1) * (b.0 - a.0) / (b.1 - a.1);
                if q.0 < x {
                    inside = !inside;
                }
            }
            j = i;
        }
        inside
    }

    fn boundary_distance(&self, p: Point) -> f64 {
        self.edges()
            .iter()
            .map(|(a, b)| distance_to_segment(p, *a, *b))
            .fold(f64::INFINITY, f64::min)
    }

    /// Whether `p` lies on the shape, boundary included, within `tol`.
    #[must_use]
    pub fn contains_point(&self, p: Point, tol: f64) -> bool {
        match self.shape() {
            Shape::Point => self.vertices.first().is_some_and(|v| v.approx_eq(p, tol)),
            Shape::Rod => distance_to_segment(p, self.vertices[0], self.vertices[1]) <= tol,
            Shape::Polygon => {
                let Some(plane) = self.plane(tol) else {
                    return false;
                };
                if plane.signed_distance(p).abs() > tol {
                    return false;
                }
                if self.boundary_distance(p) <= tol {
                    return true;
                }
                self.frame(&plane, tol)
                    .is_some_and(|frame| self.inside_2d(&frame, p))
            }
        }
    }

    /// Whether `p` lies in the polygon's interior, farther than `tol` from its boundary.
    #[must_use]
    pub fn strictly_contains(&self, p: Point, tol: f64) -> bool {
        if self.shape() != Shape::Polygon {
            return false;
        }
        let Some(plane) = self.plane(tol) else {
            return false;
        };
        plane.signed_distance(p).abs() <= tol
            && self.boundary_distance(p) > tol
            && self
                .frame(&plane, tol)
                .is_some_and(|frame| self.inside_2d(&frame, p))
    }

    /// Points where the two shapes penetrate each other.
    ///
    /// Shared edges and touching vertices are contact, not penetration, so
    /// they produce no points. An empty result means no collision. Polygons
    /// are treated as convex.
    ///
    /// Coplanar polygons collide when their overlap has non-zero area; the
    /// result is the outline of that overlap. Crossing polygons collide when
    /// each one passes through the other's plane and the two cuts share a
    /// stretch of the planes' common line; the result is that stretch.
    #[must_use]
    pub fn intersections_with(&self, other: &Self, tol: f64) -> Vec<Point> {
        let (Some(pa), Some(pb)) = (self.plane(tol), other.plane(tol)) else {
            return Vec::new();
        };
        if pa.is_parallel_to(&pb, tol) {
            if pb.signed_distance(self.vertices[0]).abs() > tol {
                return Vec::new();
            }
            return self.coplanar_intersections(other, &pb, tol);
        }
        let Some(line) = pa.normal.cross(pb.normal).normalized(tol) else {
            return Vec::new();
        };
        let (Some(cut_a), Some(cut_b)) = (
            self.section(&pb, line, tol),
            other.section(&pa, line, tol),
        ) else {
            return Vec::new();
        };
        let lo = if cut_a.0 .0 >= cut_b.0 .0 { cut_a.0 } else { cut_b.0 };
        let hi = if cut_a.1 .0 <= cut_b.1 .0 { cut_a.1 } else { cut_b.1 };
        if hi.0 - lo.0 > tol {
            vec![lo.1, hi.1]
        } else {
            Vec::new()
        }
    }

    /// Segment where `plane` cuts through the polygon, as its two ends
    /// keyed by their coordinate along `line`.
    ///
    /// `None` unless vertices lie strictly on both sides of the plane; a
    /// polygon only resting on the plane touches it.
    fn section(
        &self,
        plane: &Plane,
        line: Vector3,
        tol: f64,
    ) -> Option<((f64, Point), (f64, Point))> {
        let d: Vec<f64> = self.vertices.iter().map(|v| plane.signed_distance(*v)).collect();
        if !(d.iter().any(|x| *x > tol) && d.iter().any(|x| *x < -tol)) {
            return None;
        }
        let n = self.vertices.len();
        let mut cut = Vec::with_capacity(2);
        for i in 0..n {
            let (a, b) = (self.vertices[i], self.vertices[(i + 1) % n]);
            if d[i].abs() <= tol {
                cut.push(a);
            } else if sign(d[i], tol) * sign(d[(i + 1) % n], tol) == -1 {
                cut.extend(intersect_plane_segment(plane, a, b, 0.0));
            }
        }
        let keyed: Vec<(f64, Point)> = cut.into_iter().map(|p| (p.dot(line), p)).collect();
        let lo = keyed.iter().copied().min_by(|x, y| x.0.total_cmp(&y.0))?;
        let hi = keyed.iter().copied().max_by(|x, y| x.0.total_cmp(&y.0))?;
        Some((lo, hi))
    }

    /// Clips `self` against the convex `other` inside their common plane.
    fn coplanar_intersections(&self, other: &Self, plane: &Plane, tol: f64) -> Vec<Point> {
        let Some(frame) = other.frame(plane, tol) else {
            return Vec::new();
        };
        let clip: Vec<(f64, f64)> = other.vertices.iter().map(|v| frame.project(*v)).collect();
        let clip_area = signed_area(&clip);
        if clip_area.abs() <= tol {
            return Vec::new();
        }
        let orientation = clip_area.signum();

        let mut region: Vec<(f64, f64)> = self.vertices.iter().map(|v| frame.project(*v)).collect();
        for i in 0..clip.len() {
            let (c, d) = (clip[i], clip[(i + 1) % clip.len()]);
            let edge = sub2(d, c);
            let side = |p: (f64, f64)| orientation * cross2(edge, sub2(p, c));
            let mut kept = Vec::with_capacity(region.len() + 1);
            for k in 0..region.len() {
                let (p, q) = (region[k], region[(k + 1) % region.len()]);
                let (fp, fq) = (side(p), side(q));
                if fp >= 0.0 {
                    kept.push(p);
                }
                if (fp >= 0.0) != (fq >= 0.0) {
                    let t = fp / (fp - fq);
                    kept.push((p.0 + (q.0 - p.0) * t, p.1 + (q.1 - p.1) * t));
                }
            }
            region = kept;
            if region.is_empty() {
                return Vec::new();
            }
        }

        if signed_area(&region).abs() <= tol {
            return Vec::new();
        }
        region.into_iter().map(|p| frame.lift(p)).collect()
    }
}

/// Extra displacement that clears `a`, already moved by `push`, from `b`.
///
/// Zero when they do not collide. Coplanar overlaps are separated within
/// their plane; crossing polygons along either plane normal or the centroid
/// axis. Each candidate axis points from `b` towards `a` and the shortest
/// separating shift, plus `margin`, wins.
#[must_use]
pub fn pushing_of(a: &Polytope, b: &Polytope, push: Vector3, margin: f64, tol: f64) -> Vector3 {
    let moved = a.translated(push);
    if moved.intersections_with(b, tol).is_empty() {
        return Vector3::ZERO;
    }
    let away = moved.centroid() - b.centroid();
    let orient = |n: Vector3| if n.dot(away) < 0.0 { -n } else { n };

    let mut axes: Vec<Vector3> = Vec::with_capacity(4);
    match (moved.plane(tol), b.plane(tol)) {
        (Some(pa), Some(pb))
            if pa.is_parallel_to(&pb, tol)
                && pb.signed_distance(moved.vertices[0]).abs() <= tol =>
        {
            let n = pb.normal;
            axes.extend(away.reject_from(n).normalized(tol));
            axes.extend(push.reject_from(n).normalized(tol));
            if axes.is_empty() {
                axes.push(any_perpendicular(n));
            }
        }
        (pa, pb) => {
            axes.extend(pb.map(|p| orient(p.normal)));
            axes.extend(pa.map(|p| orient(p.normal)));
            axes.extend(away.normalized(tol));
            axes.extend(push.normalized(tol));
        }
    }

    axes.into_iter()
        .map(|dir| {
            let (a_min, _) = moved.extent_along(dir);
            let (_, b_max) = b.extent_along(dir);
            dir * ((b_max - a_min).max(0.0) + margin)
        })
        .min_by(|x, y| x.length().total_cmp(&y.length()))
        .unwrap_or(Vector3::ZERO)
}
