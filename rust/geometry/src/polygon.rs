// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Planar primitives on the XZ plane: segment intersection, rings and
//! polygons with holes.

use nalgebra::{Point2, Vector2};

use crate::bounds::{Aabb, BoundedObject};

/// Relative slack applied to segment parameters so that contacts exactly at
/// an endpoint survive rounding
const PARAM_SLACK: f64 = 1e-12;

#[inline]
pub(crate) fn cross(a: &Vector2<f64>, b: &Vector2<f64>) -> f64 {
    a.x * b.y - a.y * b.x
}

/// Result of intersecting two closed segments
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SegmentIntersection {
    None,
    /// Single contact at `a0 + t * (a1 - a0)` = `b0 + u * (b1 - b0)`
    Point { point: Point2<f64>, t: f64, u: f64 },
    /// Collinear overlap between parameters `t0..=t1` on the first segment;
    /// `u0`/`u1` are the matching parameters on the second
    Overlap { t0: f64, t1: f64, u0: f64, u1: f64 },
}

/// Parametric intersection of segments `a0-a1` and `b0-b1`
pub fn segment_intersection(
    a0: &Point2<f64>,
    a1: &Point2<f64>,
    b0: &Point2<f64>,
    b1: &Point2<f64>,
) -> SegmentIntersection {
    let r = a1 - a0;
    let s = b1 - b0;
    let qp = b0 - a0;

    let rr = r.norm_squared();
    let ss = s.norm_squared();
    if rr == 0.0 || ss == 0.0 {
        return SegmentIntersection::None;
    }

    let denom = cross(&r, &s);
    let parallel_tolerance = 1e-12 * rr.sqrt() * ss.sqrt();

    if denom.abs() <= parallel_tolerance {
        // Parallel: only collinear segments can touch
        if cross(&qp, &r).abs() > 1e-12 * rr.sqrt() * qp.norm().max(1.0) {
            return SegmentIntersection::None;
        }

        let tb0 = qp.dot(&r) / rr;
        let tb1 = tb0 + s.dot(&r) / rr;
        let lo = tb0.min(tb1).max(0.0);
        let hi = tb0.max(tb1).min(1.0);
        if lo > hi + PARAM_SLACK {
            return SegmentIntersection::None;
        }

        let u_at = |t: f64| ((a0 + r * t) - b0).dot(&s) / ss;

        if (hi - lo) <= PARAM_SLACK {
            let t = lo.clamp(0.0, 1.0);
            return SegmentIntersection::Point {
                point: a0 + r * t,
                t,
                u: u_at(t).clamp(0.0, 1.0),
            };
        }

        return SegmentIntersection::Overlap {
            t0: lo,
            t1: hi,
            u0: u_at(lo).clamp(0.0, 1.0),
            u1: u_at(hi).clamp(0.0, 1.0),
        };
    }

    let t = cross(&qp, &s) / denom;
    let u = cross(&qp, &r) / denom;

    let in_range = |v: f64| (-PARAM_SLACK..=1.0 + PARAM_SLACK).contains(&v);
    if in_range(t) && in_range(u) {
        let t = t.clamp(0.0, 1.0);
        SegmentIntersection::Point {
            point: a0 + r * t,
            t,
            u: u.clamp(0.0, 1.0),
        }
    } else {
        SegmentIntersection::None
    }
}

/// Shortest distance from `p` to segment `a-b`
pub fn point_segment_distance(p: &Point2<f64>, a: &Point2<f64>, b: &Point2<f64>) -> f64 {
    let ab = b - a;
    let len_sq = ab.norm_squared();
    if len_sq == 0.0 {
        return (p - a).norm();
    }
    let t = ((p - a).dot(&ab) / len_sq).clamp(0.0, 1.0);
    (p - (a + ab * t)).norm()
}

/// Signed area of a closed contour (shoelace formula over X and Z)
/// Positive = counter-clockwise, Negative = clockwise
/// Even-odd test of `p` against the closed ring `ring` (last vertex joins
/// the first)
pub fn ring_contains_point(ring: &[Point2<f64>], p: &Point2<f64>) -> bool {
    let n = ring.len();
    if n < 3 {
        return false;
    }

    let mut inside = false;
    let mut j = n - 1;
    for i in 0..n {
        let (vi, vj) = (&ring[i], &ring[j]);
        if (vi.y > p.y) != (vj.y > p.y) {
            let x_cross = vj.x + (p.y - vj.y) / (vi.y - vj.y) * (vi.x - vj.x);
            if p.x < x_cross {
                inside = !inside;
            }
        }
        j = i;
    }
    inside
}

pub fn signed_area(contour: &[Point2<f64>]) -> f64 {
    if contour.len() < 3 {
        return 0.0;
    }

    let mut area = 0.0;
    let n = contour.len();

    for i in 0..n {
        let j = (i + 1) % n;
        area += contour[i].x * contour[j].y;
        area -= contour[j].x * contour[i].y;
    }

    area * 0.5
}

/// A closed ring without a repeated closing vertex
#[derive(Debug, Clone, PartialEq)]
pub struct SimplePolygon {
    vertices: Vec<Point2<f64>>,
}

impl SimplePolygon {
    /// Create a ring. A closing vertex equal to the first one is dropped.
    pub fn new(mut vertices: Vec<Point2<f64>>) -> Self {
        if vertices.len() > 1 && vertices.first() == vertices.last() {
            vertices.pop();
        }
        Self { vertices }
    }

    pub fn vertices(&self) -> &[Point2<f64>] {
        &self.vertices
    }

    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    pub fn signed_area(&self) -> f64 {
        signed_area(&self.vertices)
    }

    pub fn area(&self) -> f64 {
        self.signed_area().abs()
    }

    pub fn is_clockwise(&self) -> bool {
        self.signed_area() < 0.0
    }

    /// Closed edges, the last one running back to the first vertex
    pub fn edges(&self) -> impl Iterator<Item = (Point2<f64>, Point2<f64>)> + '_ {
        let n = self.vertices.len();
        (0..n).map(move |i| (self.vertices[i], self.vertices[(i + 1) % n]))
    }

    pub fn perimeter(&self) -> f64 {
        self.edges().map(|(a, b)| (b - a).norm()).sum()
    }

    /// Even-odd ray casting. Points exactly on the outline may go either way;
    /// combine with [`SimplePolygon::distance_to_boundary`] where that matters.
    pub fn contains_point(&self, p: &Point2<f64>) -> bool {
        ring_contains_point(&self.vertices, p)
    }

    pub fn distance_to_boundary(&self, p: &Point2<f64>) -> f64 {
        self.edges()
            .map(|(a, b)| point_segment_distance(p, &a, &b))
            .fold(f64::INFINITY, f64::min)
    }

    /// True if two edges cross or overlap anywhere other than at the vertex
    /// they legitimately share
    pub fn is_self_intersecting(&self) -> bool {
        let n = self.vertices.len();
        if n < 3 {
            return false;
        }

        let edges: Vec<_> = self.edges().collect();
        for i in 0..n {
            for j in (i + 1)..n {
                let adjacent = j == i + 1 || (i == 0 && j == n - 1);
                let (a0, a1) = &edges[i];
                let (b0, b1) = &edges[j];
                match segment_intersection(a0, a1, b0, b1) {
                    SegmentIntersection::None => {}
                    SegmentIntersection::Point { .. } if adjacent => {}
                    SegmentIntersection::Overlap { t0, t1, .. } if adjacent => {
                        // Folding back onto the previous edge
                        if t1 - t0 > 1e-9 {
                            return true;
                        }
                    }
                    _ => return true,
                }
            }
        }
        false
    }
}

impl BoundedObject for SimplePolygon {
    fn bounding_box(&self) -> Aabb {
        Aabb::from_points(&self.vertices).unwrap_or_else(|| Aabb::new(0.0, 0.0, 0.0, 0.0))
    }
}

/// Outer ring plus zero or more hole rings
#[derive(Debug, Clone, PartialEq)]
pub struct PolygonWithHoles {
    pub outer: SimplePolygon,
    pub holes: Vec<SimplePolygon>,
}

impl PolygonWithHoles {
    pub fn new(outer: SimplePolygon, holes: Vec<SimplePolygon>) -> Self {
        Self { outer, holes }
    }

    /// Polygon without holes
    pub fn simple(outer: Vec<Point2<f64>>) -> Self {
        Self::new(SimplePolygon::new(outer), Vec::new())
    }

    /// Outer ring first, then holes
    pub fn rings(&self) -> impl Iterator<Item = &SimplePolygon> {
        std::iter::once(&self.outer).chain(self.holes.iter())
    }

    pub fn area(&self) -> f64 {
        self.outer.area() - self.holes.iter().map(SimplePolygon::area).sum::<f64>()
    }

    /// Total outline length over all rings
    pub fn perimeter(&self) -> f64 {
        self.rings().map(SimplePolygon::perimeter).sum()
    }

    /// Inside the outer ring and outside every hole
    pub fn contains_point(&self, p: &Point2<f64>) -> bool {
        self.outer.contains_point(p) && !self.holes.iter().any(|h| h.contains_point(p))
    }

    pub fn distance_to_boundary(&self, p: &Point2<f64>) -> f64 {
        self.rings()
            .map(|r| r.distance_to_boundary(p))
            .fold(f64::INFINITY, f64::min)
    }

    pub fn is_self_intersecting(&self) -> bool {
        self.rings().any(SimplePolygon::is_self_intersecting)
    }
}

impl BoundedObject for PolygonWithHoles {
    fn bounding_box(&self) -> Aabb {
        self.outer.bounding_box()
    }
}
