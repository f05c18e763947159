// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Triangle clipping against tile boundaries.
//!
//! Triangles are clipped in their XZ projection with Sutherland-Hodgman,
//! one boundary edge at a time. The fraction at which an edge is cut on the
//! XZ plane is reused to interpolate Y and any per-vertex attributes, so the
//! 3D surface is preserved exactly. Clipped polygons are fanned out from
//! their first vertex, which keeps the winding of the input.

use nalgebra::{Point2, Point3, Vector3};
use rayon::prelude::*;
use smallvec::SmallVec;

use crate::bounds::Aabb;
use crate::config::Tolerances;
use crate::error::{Error, Result};
use crate::fault::{Fault, FaultReporter};
use crate::polygon::{point_segment_distance, ring_contains_point, signed_area, SimplePolygon};

/// Per-vertex scalar attributes (texture coordinates, colours, ...)
pub type Attributes = SmallVec<[f64; 4]>;

/// Triangle definition
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Triangle3 {
    pub v0: Point3<f64>,
    pub v1: Point3<f64>,
    pub v2: Point3<f64>,
}

impl Triangle3 {
    pub fn new(v0: Point3<f64>, v1: Point3<f64>, v2: Point3<f64>) -> Self {
        Self { v0, v1, v2 }
    }

    /// Calculate triangle normal; zero for degenerate triangles
    pub fn normal(&self) -> Vector3<f64> {
        let edge1 = self.v1 - self.v0;
        let edge2 = self.v2 - self.v0;
        edge1.cross(&edge2).try_normalize(1e-12).unwrap_or_else(Vector3::zeros)
    }

    /// Calculate triangle area
    pub fn area(&self) -> f64 {
        let edge1 = self.v1 - self.v0;
        let edge2 = self.v2 - self.v0;
        edge1.cross(&edge2).norm() * 0.5
    }

    /// Signed area of the XZ projection; positive = counter-clockwise
    pub fn xz_signed_area(&self) -> f64 {
        signed_area(&[xz(&self.v0), xz(&self.v1), xz(&self.v2)])
    }

    pub fn centroid(&self) -> Point3<f64> {
        Point3::from((self.v0.coords + self.v1.coords + self.v2.coords) / 3.0)
    }

    pub fn vertices(&self) -> [Point3<f64>; 3] {
        [self.v0, self.v1, self.v2]
    }
}

/// Triangle whose vertices carry scalar attributes
#[derive(Debug, Clone, PartialEq)]
pub struct AttributedTriangle {
    pub triangle: Triangle3,
    /// Attributes of v0, v1 and v2; all three lists have the same length
    pub attributes: [Attributes; 3],
}

/// Counter-clockwise clip region on the XZ plane
#[derive(Debug, Clone, PartialEq)]
pub struct ClipBoundary {
    vertices: Vec<Point2<f64>>,
    bbox: Aabb,
}

impl ClipBoundary {
    /// Clockwise input is reversed; a repeated closing vertex is dropped.
    ///
    /// The boundary should be convex. Non-convex regions must be split into
    /// convex parts and passed to [`PolygonClipper::clip_to_partitions`].
    pub fn new(vertices: Vec<Point2<f64>>) -> Result<Self> {
        let ring = SimplePolygon::new(vertices);
        if ring.len() < 3 {
            return Err(Error::InvalidBoundary(format!(
                "need at least 3 vertices, got {}",
                ring.len()
            )));
        }

        let area = ring.signed_area();
        if !area.is_finite() || area.abs() <= f64::EPSILON {
            return Err(Error::InvalidBoundary("boundary has zero area".to_string()));
        }

        let mut vertices = ring.vertices().to_vec();
        if area < 0.0 {
            vertices.reverse();
        }

        let bbox = Aabb::from_points(&vertices)
            .ok_or_else(|| Error::InvalidBoundary("empty boundary".to_string()))?;

        Ok(Self { vertices, bbox })
    }

    /// Rectangular tile boundary
    pub fn from_aabb(bbox: &Aabb) -> Result<Self> {
        Self::new(bbox.corners().to_vec())
    }

    pub fn vertices(&self) -> &[Point2<f64>] {
        &self.vertices
    }

    pub fn bounding_box(&self) -> &Aabb {
        &self.bbox
    }

    /// Inside or on the outline
    pub fn contains(&self, p: &Point2<f64>) -> bool {
        if !self.bbox.contains_point(p) {
            return false;
        }
        ring_contains_point(&self.vertices, p)
            || self
                .edges()
                .any(|(a, b)| point_segment_distance(p, &a, &b) <= 1e-12)
    }

    fn edges(&self) -> impl Iterator<Item = (Point2<f64>, Point2<f64>)> + '_ {
        let n = self.vertices.len();
        (0..n).map(move |i| (self.vertices[i], self.vertices[(i + 1) % n]))
    }
}

/// Outcome of clipping a batch of triangles
#[derive(Debug, Clone, Default)]
pub struct ClipReport {
    /// Surviving triangles, in input order
    pub triangles: Vec<Triangle3>,
    /// Indices of input triangles that failed and were skipped
    pub failed: Vec<usize>,
}

#[derive(Debug, Clone)]
struct ClipVertex {
    pos: Point3<f64>,
    attributes: Attributes,
}

impl ClipVertex {
    fn lerp(&self, other: &ClipVertex, t: f64) -> ClipVertex {
        ClipVertex {
            pos: self.pos + (other.pos - self.pos) * t,
            attributes: self
                .attributes
                .iter()
                .zip(other.attributes.iter())
                .map(|(a, b)| a + (b - a) * t)
                .collect(),
        }
    }
}

/// Stateless triangle clipper
#[derive(Debug, Clone, Copy)]
pub struct PolygonClipper {
    /// Clipped polygons with a smaller XZ area are dropped
    pub min_clip_area: f64,
}

impl Default for PolygonClipper {
    fn default() -> Self {
        Self::new()
    }
}

impl PolygonClipper {
    pub fn new() -> Self {
        Self::from_tolerances(&Tolerances::default())
    }

    pub fn from_tolerances(tolerances: &Tolerances) -> Self {
        Self {
            min_clip_area: tolerances.min_clip_area,
        }
    }

    /// Clip a triangle to `boundary`, returning zero or more triangles with
    /// the input's winding
    pub fn clip(&self, triangle: &Triangle3, boundary: &ClipBoundary) -> Result<Vec<Triangle3>> {
        let vertices = triangle.vertices().map(|pos| ClipVertex {
            pos,
            attributes: Attributes::new(),
        });
        Ok(self
            .clip_vertices(triangle, vertices, boundary)?
            .into_iter()
            .map(|[a, b, c]| Triangle3::new(a.pos, b.pos, c.pos))
            .collect())
    }

    /// Like [`PolygonClipper::clip`], interpolating vertex attributes along
    /// with the Y coordinate
    pub fn clip_attributed(
        &self,
        triangle: &AttributedTriangle,
        boundary: &ClipBoundary,
    ) -> Result<Vec<AttributedTriangle>> {
        let lengths = triangle.attributes.iter().map(|a| a.len());
        if lengths.clone().min() != lengths.max() {
            return Err(Error::DegenerateGeometry(
                "vertices carry different numbers of attributes".to_string(),
            ));
        }

        let t = &triangle.triangle;
        let vertices = [
            ClipVertex {
                pos: t.v0,
                attributes: triangle.attributes[0].clone(),
            },
            ClipVertex {
                pos: t.v1,
                attributes: triangle.attributes[1].clone(),
            },
            ClipVertex {
                pos: t.v2,
                attributes: triangle.attributes[2].clone(),
            },
        ];

        Ok(self
            .clip_vertices(t, vertices, boundary)?
            .into_iter()
            .map(|[a, b, c]| AttributedTriangle {
                triangle: Triangle3::new(a.pos, b.pos, c.pos),
                attributes: [a.attributes, b.attributes, c.attributes],
            })
            .collect())
    }

    /// Clip against a region given as convex parts that do not overlap
    pub fn clip_to_partitions(
        &self,
        triangle: &Triangle3,
        partitions: &[ClipBoundary],
    ) -> Result<Vec<Triangle3>> {
        let mut result = Vec::new();
        for boundary in partitions {
            result.extend(self.clip(triangle, boundary)?);
        }
        Ok(result)
    }

    /// Clip many triangles in parallel. Failing triangles are reported and
    /// skipped; output order follows input order.
    pub fn clip_all(
        &self,
        triangles: &[Triangle3],
        boundary: &ClipBoundary,
        reporter: &dyn FaultReporter,
    ) -> ClipReport {
        let results: Vec<Result<Vec<Triangle3>>> = triangles
            .par_iter()
            .map(|triangle| self.clip(triangle, boundary))
            .collect();

        let mut report = ClipReport::default();
        for (i, result) in results.into_iter().enumerate() {
            match result {
                Ok(clipped) => report.triangles.extend(clipped),
                Err(error) => {
                    reporter.report(&Fault::for_item(error, i));
                    report.failed.push(i);
                }
            }
        }

        tracing::debug!(
            input = triangles.len(),
            output = report.triangles.len(),
            failed = report.failed.len(),
            "clipped triangles to boundary"
        );

        report
    }

    fn clip_vertices(
        &self,
        triangle: &Triangle3,
        vertices: [ClipVertex; 3],
        boundary: &ClipBoundary,
    ) -> Result<Vec<[ClipVertex; 3]>> {
        if triangle.vertices().iter().any(|v| !v.coords.iter().all(|c| c.is_finite())) {
            return Err(Error::DegenerateGeometry(
                "triangle has non-finite coordinates".to_string(),
            ));
        }
        if triangle.area() <= self.min_clip_area {
            return Err(Error::DegenerateGeometry(format!(
                "triangle has zero area: {:?}",
                triangle
            )));
        }

        let [a, b, c] = vertices;

        // Fast path: disjoint bounding boxes
        let tri_bbox = Aabb::from_points(&[xz(&a.pos), xz(&b.pos), xz(&c.pos)])
            .unwrap_or_else(|| Aabb::from_point(xz(&a.pos)));
        if !tri_bbox.intersects(boundary.bounding_box()) {
            return Ok(Vec::new());
        }

        // Vertical faces cannot be cut in projection; keep or drop them whole
        if triangle.xz_signed_area().abs() <= self.min_clip_area {
            let center = triangle.centroid();
            return Ok(if boundary.contains(&Point2::new(center.x, center.z)) {
                vec![[a, b, c]]
            } else {
                Vec::new()
            });
        }

        let mut polygon: Vec<ClipVertex> = vec![a, b, c];

        for (edge_start, edge_end) in boundary.edges() {
            if polygon.is_empty() {
                break;
            }
            polygon = clip_against_edge(&polygon, &edge_start, &edge_end);
            dedup_vertices(&mut polygon);
        }

        if polygon.len() < 3 {
            return Ok(Vec::new());
        }

        let outline: Vec<Point2<f64>> = polygon.iter().map(|v| xz(&v.pos)).collect();
        if signed_area(&outline).abs() < self.min_clip_area {
            tracing::trace!(vertices = polygon.len(), "dropping sliver after clipping");
            return Ok(Vec::new());
        }

        // Fan triangulation from the first vertex
        let mut result = Vec::with_capacity(polygon.len() - 2);
        for i in 1..polygon.len() - 1 {
            let fan_area = signed_area(&[outline[0], outline[i], outline[i + 1]]);
            if fan_area.abs() < self.min_clip_area {
                continue;
            }
            result.push([polygon[0].clone(), polygon[i].clone(), polygon[i + 1].clone()]);
        }

        Ok(result)
    }
}

#[inline]
fn xz(p: &Point3<f64>) -> Point2<f64> {
    Point2::new(p.x, p.z)
}

/// Positive on the inner (left) side of a counter-clockwise edge
#[inline]
fn side(p: &Point3<f64>, a: &Point2<f64>, b: &Point2<f64>) -> f64 {
    (b.x - a.x) * (p.z - a.y) - (b.y - a.y) * (p.x - a.x)
}

/// One Sutherland-Hodgman step
fn clip_against_edge(input: &[ClipVertex], a: &Point2<f64>, b: &Point2<f64>) -> Vec<ClipVertex> {
    let n = input.len();
    let mut output = Vec::with_capacity(n + 2);

    for i in 0..n {
        let current = &input[i];
        let previous = &input[(i + n - 1) % n];
        let d_current = side(&current.pos, a, b);
        let d_previous = side(&previous.pos, a, b);

        if d_current >= 0.0 {
            if d_previous < 0.0 {
                let t = d_previous / (d_previous - d_current);
                output.push(previous.lerp(current, t));
            }
            output.push(current.clone());
        } else if d_previous >= 0.0 {
            let t = d_previous / (d_previous - d_current);
            output.push(previous.lerp(current, t));
        }
    }

    output
}

/// Remove consecutive duplicates produced by cuts through existing vertices
fn dedup_vertices(polygon: &mut Vec<ClipVertex>) {
    const MIN_DIST_SQ: f64 = 1e-24;
    polygon.dedup_by(|b, a| (b.pos - a.pos).norm_squared() < MIN_DIST_SQ);
    while polygon.len() > 1 {
        let (first, last) = (&polygon[0], &polygon[polygon.len() - 1]);
        if (first.pos - last.pos).norm_squared() < MIN_DIST_SQ {
            polygon.pop();
        } else {
            break;
        }
    }
}
