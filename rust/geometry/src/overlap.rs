// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Overlap Detection
//!
//! Finds and classifies geometric relationships between map elements:
//!
//! - line/line: segment intersections; contacts at a line's endpoint touch,
//!   any other contact crosses
//! - line/area and area/area: boundary intersections plus containment
//!   sampling of representative points
//! - point/area: containment
//!
//! Candidate pairs come from a [`SpatialIndex`] built over the elements.
//! Pairs are always evaluated with the lower [`ElementId`] first and the
//! opposite orientation is derived with [`OverlapRecord::reversed`], so both
//! orientations agree exactly.

use std::borrow::Borrow;

use nalgebra::Point2;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::bounds::{Aabb, BoundedObject};
use crate::config::Tolerances;
use crate::element::{ElementGeometry, ElementId, MapElement};
use crate::error::Result;
use crate::fault::{Fault, FaultReporter};
use crate::polygon::{segment_intersection, PolygonWithHoles, SegmentIntersection};
use crate::spatial_index::SpatialIndex;

/// Distance under which two contacts are the same point
const CONTACT_MERGE_DISTANCE: f64 = 1e-9;

/// Classification of a relationship, seen from the first element
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum OverlapKind {
    /// Outlines cross, or interiors overlap without containment
    Crossing,
    /// Outlines meet without overlapping interiors
    Touching,
    /// The first element contains the second
    Contains,
    /// The first element is contained by the second
    ContainedBy,
}

impl OverlapKind {
    /// Same relationship seen from the other element
    pub fn inverse(self) -> Self {
        match self {
            OverlapKind::Contains => OverlapKind::ContainedBy,
            OverlapKind::ContainedBy => OverlapKind::Contains,
            other => other,
        }
    }
}

/// A point where two outlines meet
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IntersectionPoint {
    pub position: Point2<f64>,
    /// Arc length along the first element's outline
    pub along_first: f64,
    /// Arc length along the second element's outline
    pub along_second: f64,
}

/// Relationship between two map elements
#[derive(Debug, Clone, PartialEq)]
pub struct OverlapRecord {
    pub e1: ElementId,
    pub e2: ElementId,
    pub kind: OverlapKind,
    /// Ordered by position along `e1`
    pub intersections: Vec<IntersectionPoint>,
}

impl OverlapRecord {
    /// The record seen from `e2`
    pub fn reversed(&self) -> Self {
        let mut intersections: Vec<IntersectionPoint> = self
            .intersections
            .iter()
            .map(|p| IntersectionPoint {
                position: p.position,
                along_first: p.along_second,
                along_second: p.along_first,
            })
            .collect();
        sort_intersections(&mut intersections);

        Self {
            e1: self.e2,
            e2: self.e1,
            kind: self.kind.inverse(),
            intersections,
        }
    }

    pub fn positions(&self) -> impl Iterator<Item = Point2<f64>> + '_ {
        self.intersections.iter().map(|p| p.position)
    }

    /// The element on the other side of this record
    pub fn other(&self, id: ElementId) -> Option<ElementId> {
        if self.e1 == id {
            Some(self.e2)
        } else if self.e2 == id {
            Some(self.e1)
        } else {
            None
        }
    }
}

fn sort_intersections(points: &mut [IntersectionPoint]) {
    points.sort_by(|a, b| {
        a.along_first
            .total_cmp(&b.along_first)
            .then(a.along_second.total_cmp(&b.along_second))
    });
}

/// Result of a detection batch
#[derive(Debug, Clone, Default)]
pub struct OverlapReport {
    /// One record per related pair, `e1 < e2`, sorted by `(e1, e2)`
    pub records: Vec<OverlapRecord>,
    /// Elements that failed validation; all of their pairs were skipped
    pub failures: Vec<Fault>,
    /// Candidate pairs that went through exact testing
    pub pairs_tested: usize,
}

/// Exact overlap computation with configurable tolerances
#[derive(Debug, Clone, Copy)]
pub struct OverlapDetector {
    tolerances: Tolerances,
}

impl OverlapDetector {
    pub fn new(tolerances: Tolerances) -> Result<Self> {
        tolerances.validate()?;
        Ok(Self { tolerances })
    }

    pub fn tolerances(&self) -> &Tolerances {
        &self.tolerances
    }

    /// Relationship between two elements from `a`'s point of view, or
    /// `None` if they are unrelated. Fails if either element is degenerate.
    pub fn overlap_between(&self, a: &MapElement, b: &MapElement) -> Result<Option<OverlapRecord>> {
        if a.id == b.id {
            return Ok(None);
        }
        a.validate(&self.tolerances)?;
        b.validate(&self.tolerances)?;

        Ok(if a.id < b.id {
            self.relate(a, b)
        } else {
            self.relate(b, a).map(|record| record.reversed())
        })
    }

    /// Classify every candidate pair of the index. Slot `i` of the index
    /// holds the element evaluated for that slot.
    ///
    /// Each element is validated once; a degenerate element is reported to
    /// `reporter` a single time and every pair involving it is skipped.
    ///
    /// Only pairs that share a grid cell are classified. Register elements
    /// under boxes grown by `touch_epsilon` (see [`Padded`](crate::Padded)),
    /// otherwise elements within tolerance on opposite sides of a cell edge
    /// are never paired.
    pub fn detect<T>(&self, index: &SpatialIndex<T>, reporter: &dyn FaultReporter) -> OverlapReport
    where
        T: Borrow<MapElement> + BoundedObject,
    {
        let elements: Vec<&MapElement> = index
            .objects()
            .iter()
            .map(<T as Borrow<MapElement>>::borrow)
            .collect();

        let validity: Vec<Result<()>> = elements
            .par_iter()
            .map(|e| e.validate(&self.tolerances))
            .collect();

        let mut failures = Vec::new();
        for (element, result) in elements.iter().zip(validity.iter()) {
            if let Err(error) = result {
                let fault = Fault::for_element(error.clone(), element.id);
                reporter.report(&fault);
                failures.push(fault);
            }
        }

        let margin = self.tolerances.touch_epsilon;
        let pairs: Vec<(usize, usize)> = index
            .candidate_pairs()
            .into_iter()
            .filter(|&(i, j)| validity[i].is_ok() && validity[j].is_ok())
            .filter(|&(i, j)| {
                elements[i]
                    .bounding_box()
                    .expand(margin)
                    .intersects(&elements[j].bounding_box())
            })
            .collect();

        let mut records: Vec<OverlapRecord> = pairs
            .par_iter()
            .filter_map(|&(i, j)| {
                let (a, b) = (elements[i], elements[j]);
                match a.id.cmp(&b.id) {
                    std::cmp::Ordering::Less => self.relate(a, b),
                    std::cmp::Ordering::Greater => self.relate(b, a),
                    std::cmp::Ordering::Equal => None,
                }
            })
            .collect();
        records.sort_by_key(|r| (r.e1, r.e2));

        tracing::debug!(
            elements = elements.len(),
            pairs = pairs.len(),
            overlaps = records.len(),
            failures = failures.len(),
            "detected overlaps"
        );

        OverlapReport {
            records,
            failures,
            pairs_tested: pairs.len(),
        }
    }

    /// Dispatch on geometry types; `a` and `b` must be valid
    fn relate(&self, a: &MapElement, b: &MapElement) -> Option<OverlapRecord> {
        use ElementGeometry::*;

        let eps = self.tolerances.touch_epsilon;
        let (kind, contacts) = match (&a.geometry, &b.geometry) {
            (Line(la), Line(lb)) => relate_lines(la, lb, eps)?,
            (Line(line), Area(area)) => relate_line_area(line, area, eps)?,
            (Area(area), Line(line)) => flip(relate_line_area(line, area, eps)?),
            (Area(pa), Area(pb)) => relate_areas(pa, pb, eps)?,
            (Point(p), other) => relate_point(*p, other, eps)?,
            (other, Point(p)) => flip(relate_point(*p, other, eps)?),
        };

        let mut intersections: Vec<IntersectionPoint> = contacts
            .into_iter()
            .map(|c| IntersectionPoint {
                position: c.position,
                along_first: c.along_a,
                along_second: c.along_b,
            })
            .collect();
        sort_intersections(&mut intersections);

        tracing::trace!(e1 = a.id.0, e2 = b.id.0, ?kind, "classified pair");

        Some(OverlapRecord {
            e1: a.id,
            e2: b.id,
            kind,
            intersections,
        })
    }
}

type Relation = (OverlapKind, Vec<Contact>);

fn flip((kind, contacts): Relation) -> Relation {
    (
        kind.inverse(),
        contacts
            .into_iter()
            .map(|c| Contact {
                along_a: c.along_b,
                along_b: c.along_a,
                ..c
            })
            .collect(),
    )
}

/// Contact between two outlines, with arc positions along both
#[derive(Debug, Clone, Copy)]
struct Contact {
    position: Point2<f64>,
    along_a: f64,
    along_b: f64,
    /// Part of a stretch where the outlines run on top of each other
    collinear: bool,
}

#[derive(Debug, Clone, Copy)]
struct Segment {
    a: Point2<f64>,
    b: Point2<f64>,
    /// Arc length at `a`
    start: f64,
    length: f64,
}

/// Line or polygon rings flattened into segments with running arc length
#[derive(Debug, Clone)]
struct Outline {
    segments: Vec<Segment>,
    vertices: Vec<Point2<f64>>,
}

impl Outline {
    fn from_line(points: &[Point2<f64>]) -> Self {
        let mut outline = Self {
            segments: Vec::with_capacity(points.len()),
            vertices: points.to_vec(),
        };
        for w in points.windows(2) {
            outline.push(w[0], w[1]);
        }
        outline
    }

    fn from_polygon(polygon: &PolygonWithHoles) -> Self {
        let mut outline = Self {
            segments: Vec::new(),
            vertices: Vec::new(),
        };
        for ring in polygon.rings() {
            outline.vertices.extend_from_slice(ring.vertices());
            for (a, b) in ring.edges() {
                outline.push(a, b);
            }
        }
        outline
    }

    fn push(&mut self, a: Point2<f64>, b: Point2<f64>) {
        let length = (b - a).norm();
        if length == 0.0 {
            return;
        }
        let start = self.segments.last().map_or(0.0, |s| s.start + s.length);
        self.segments.push(Segment { a, b, start, length });
    }

    /// Distance from `p` to the outline and the arc length of the closest point
    fn locate(&self, p: &Point2<f64>) -> (f64, f64) {
        let mut best = (f64::INFINITY, 0.0);
        for s in &self.segments {
            let ab = s.b - s.a;
            let t = ((p - s.a).dot(&ab) / (s.length * s.length)).clamp(0.0, 1.0);
            let d = (p - (s.a + ab * t)).norm();
            if d < best.0 {
                best = (d, s.start + t * s.length);
            }
        }
        best
    }

    /// Point at arc length `along`, clamped to the outline
    fn point_at(&self, along: f64) -> Option<Point2<f64>> {
        let s = self
            .segments
            .iter()
            .find(|s| along <= s.start + s.length)
            .or_else(|| self.segments.last())?;
        let t = ((along - s.start) / s.length).clamp(0.0, 1.0);
        Some(s.a + (s.b - s.a) * t)
    }

    fn near_vertex(&self, p: &Point2<f64>, eps: f64) -> bool {
        self.vertices.iter().any(|v| (v - p).norm() <= eps)
    }

    /// Vertices plus segment midpoints
    fn samples(&self) -> Vec<Point2<f64>> {
        let mut samples = self.vertices.clone();
        samples.extend(self.segments.iter().map(|s| nalgebra::center(&s.a, &s.b)));
        samples
    }
}

/// All exact contacts between two outlines, merged and sorted along `a`
fn find_contacts(a: &Outline, b: &Outline) -> Vec<Contact> {
    let mut contacts = Vec::new();

    for sa in &a.segments {
        let bbox_a = Aabb::from_points(&[sa.a, sa.b]).unwrap_or_else(|| Aabb::from_point(sa.a));
        for sb in &b.segments {
            let bbox_b = Aabb::from_points(&[sb.a, sb.b]).unwrap_or_else(|| Aabb::from_point(sb.a));
            if !bbox_a.intersects(&bbox_b) {
                continue;
            }

            match segment_intersection(&sa.a, &sa.b, &sb.a, &sb.b) {
                SegmentIntersection::None => {}
                SegmentIntersection::Point { point, t, u } => contacts.push(Contact {
                    position: point,
                    along_a: sa.start + t * sa.length,
                    along_b: sb.start + u * sb.length,
                    collinear: false,
                }),
                SegmentIntersection::Overlap { t0, t1, u0, u1 } => {
                    for (t, u) in [(t0, u0), (t1, u1)] {
                        contacts.push(Contact {
                            position: sa.a + (sa.b - sa.a) * t,
                            along_a: sa.start + t * sa.length,
                            along_b: sb.start + u * sb.length,
                            collinear: true,
                        });
                    }
                }
            }
        }
    }

    merge_contacts(contacts)
}

fn merge_contacts(mut contacts: Vec<Contact>) -> Vec<Contact> {
    contacts.sort_by(|x, y| {
        x.along_a
            .total_cmp(&y.along_a)
            .then(x.along_b.total_cmp(&y.along_b))
    });

    let mut merged: Vec<Contact> = Vec::with_capacity(contacts.len());
    for contact in contacts {
        match merged
            .iter_mut()
            .find(|m| (m.position - contact.position).norm() <= CONTACT_MERGE_DISTANCE)
        {
            Some(existing) => existing.collinear |= contact.collinear,
            None => merged.push(contact),
        }
    }
    merged
}

/// Add contacts for `candidates` of `from` lying within `eps` of `to` but
/// not already covered by an exact contact
fn add_near_contacts(
    contacts: &mut Vec<Contact>,
    candidates: &[Point2<f64>],
    from: &Outline,
    to: &Outline,
    eps: f64,
    from_is_a: bool,
) {
    for p in candidates {
        if contacts.iter().any(|c| (c.position - p).norm() <= eps) {
            continue;
        }
        let (distance, along_to) = to.locate(p);
        if distance > eps {
            continue;
        }
        let (_, along_from) = from.locate(p);
        let (along_a, along_b) = if from_is_a {
            (along_from, along_to)
        } else {
            (along_to, along_from)
        };
        contacts.push(Contact {
            position: *p,
            along_a,
            along_b,
            collinear: false,
        });
    }
}

fn endpoints(line: &[Point2<f64>]) -> SmallVec<[Point2<f64>; 2]> {
    match (line.first(), line.last()) {
        (Some(first), Some(last)) if first != last => SmallVec::from_buf([*first, *last]),
        (Some(first), _) => SmallVec::from_elem(*first, 1),
        _ => SmallVec::new(),
    }
}

fn relate_lines(la: &[Point2<f64>], lb: &[Point2<f64>], eps: f64) -> Option<Relation> {
    let (a, b) = (Outline::from_line(la), Outline::from_line(lb));
    let (ends_a, ends_b) = (endpoints(la), endpoints(lb));

    let mut contacts = find_contacts(&a, &b);
    add_near_contacts(&mut contacts, &ends_a, &a, &b, eps, true);
    add_near_contacts(&mut contacts, &ends_b, &b, &a, eps, false);

    if contacts.is_empty() {
        return None;
    }

    let at_end = |p: &Point2<f64>| {
        ends_a
            .iter()
            .chain(ends_b.iter())
            .any(|e| (e - p).norm() <= eps)
    };
    let crossing = contacts.iter().any(|c| !c.collinear && !at_end(&c.position));

    let kind = if crossing {
        OverlapKind::Crossing
    } else {
        OverlapKind::Touching
    };
    Some((kind, contacts))
}

/// Where a sample lies relative to an area
#[derive(Debug, Clone, Copy, Default)]
struct SampleCounts {
    inside: usize,
    outside: usize,
    on_boundary: usize,
}

impl SampleCounts {
    fn classify(samples: &[Point2<f64>], area: &PolygonWithHoles, eps: f64) -> Self {
        let mut counts = Self::default();
        for p in samples {
            if area.distance_to_boundary(p) <= eps {
                counts.on_boundary += 1;
            } else if area.contains_point(p) {
                counts.inside += 1;
            } else {
                counts.outside += 1;
            }
        }
        counts
    }
}

/// Sample points halfway between consecutive contacts along an outline
fn between_contacts(outline: &Outline, mut alongs: Vec<f64>) -> Vec<Point2<f64>> {
    alongs.sort_by(f64::total_cmp);
    alongs
        .windows(2)
        .filter_map(|w| outline.point_at((w[0] + w[1]) * 0.5))
        .collect()
}

/// A contact that can only be a transversal crossing: away from every
/// vertex of both outlines and not part of a shared stretch
fn is_proper(c: &Contact, a: &Outline, b: &Outline, eps: f64) -> bool {
    !c.collinear && !a.near_vertex(&c.position, eps) && !b.near_vertex(&c.position, eps)
}

fn relate_line_area(line: &[Point2<f64>], area: &PolygonWithHoles, eps: f64) -> Option<Relation> {
    let a = Outline::from_line(line);
    let b = Outline::from_polygon(area);

    let mut contacts = find_contacts(&a, &b);
    add_near_contacts(&mut contacts, line, &a, &b, eps, true);

    if contacts.iter().any(|c| is_proper(c, &a, &b, eps)) {
        return Some((OverlapKind::Crossing, contacts));
    }

    let mut samples = a.samples();
    samples.extend(between_contacts(&a, contacts.iter().map(|c| c.along_a).collect()));
    let counts = SampleCounts::classify(&samples, area, eps);

    let kind = match (counts.inside > 0, counts.outside > 0) {
        (true, false) => OverlapKind::ContainedBy,
        (true, true) => OverlapKind::Crossing,
        (false, _) if !contacts.is_empty() || counts.on_boundary > 0 => OverlapKind::Touching,
        (false, _) => return None,
    };
    Some((kind, contacts))
}

fn relate_areas(pa: &PolygonWithHoles, pb: &PolygonWithHoles, eps: f64) -> Option<Relation> {
    let a = Outline::from_polygon(pa);
    let b = Outline::from_polygon(pb);

    let mut contacts = find_contacts(&a, &b);
    add_near_contacts(&mut contacts, &a.vertices, &a, &b, eps, true);
    add_near_contacts(&mut contacts, &b.vertices, &b, &a, eps, false);

    if contacts.iter().any(|c| is_proper(c, &a, &b, eps)) {
        return Some((OverlapKind::Crossing, contacts));
    }

    let mut samples_a = a.samples();
    samples_a.extend(between_contacts(&a, contacts.iter().map(|c| c.along_a).collect()));
    let mut samples_b = b.samples();
    samples_b.extend(between_contacts(&b, contacts.iter().map(|c| c.along_b).collect()));

    let a_in_b = SampleCounts::classify(&samples_a, pb, eps);
    let b_in_a = SampleCounts::classify(&samples_b, pa, eps);

    let a_covers_b = b_in_a.outside == 0 && !has_hole_inside(pa, pb, eps);
    let b_covers_a = a_in_b.outside == 0 && !has_hole_inside(pb, pa, eps);

    let kind = match (a_covers_b, b_covers_a) {
        (true, true) => OverlapKind::Touching,
        (true, false) => OverlapKind::Contains,
        (false, true) => OverlapKind::ContainedBy,
        (false, false) if a_in_b.inside > 0 || b_in_a.inside > 0 => OverlapKind::Crossing,
        (false, false) if !contacts.is_empty() => OverlapKind::Touching,
        (false, false) => return None,
    };
    Some((kind, contacts))
}

/// True if a hole of `container` reaches into the interior of `inner`
fn has_hole_inside(container: &PolygonWithHoles, inner: &PolygonWithHoles, eps: f64) -> bool {
    container.holes.iter().any(|hole| {
        hole.vertices()
            .iter()
            .any(|v| inner.distance_to_boundary(v) > eps && inner.contains_point(v))
    })
}

/// Points only relate to areas; a point on the boundary counts as inside
fn relate_point(p: Point2<f64>, other: &ElementGeometry, eps: f64) -> Option<Relation> {
    match other {
        ElementGeometry::Area(area)
            if area.contains_point(&p) || area.distance_to_boundary(&p) <= eps =>
        {
            Some((OverlapKind::ContainedBy, Vec::new()))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fault::CollectingFaultReporter;
    use approx::assert_relative_eq;

    fn pt(x: f64, z: f64) -> Point2<f64> {
        Point2::new(x, z)
    }

    fn square(id: u32, min: f64, max: f64) -> MapElement {
        MapElement::area(
            id,
            PolygonWithHoles::simple(vec![pt(min, min), pt(max, min), pt(max, max), pt(min, max)]),
        )
    }

    fn detector() -> OverlapDetector {
        OverlapDetector::new(Tolerances::default()).unwrap()
    }

    fn relate(a: &MapElement, b: &MapElement) -> Option<OverlapRecord> {
        detector().overlap_between(a, b).unwrap()
    }

    #[test]
    fn test_inverse() {
        assert_eq!(OverlapKind::Contains.inverse(), OverlapKind::ContainedBy);
        assert_eq!(OverlapKind::ContainedBy.inverse(), OverlapKind::Contains);
        assert_eq!(OverlapKind::Crossing.inverse(), OverlapKind::Crossing);
        assert_eq!(OverlapKind::Touching.inverse(), OverlapKind::Touching);
    }

    #[test]
    fn test_rejects_invalid_tolerances() {
        let bad = Tolerances::default().with_touch_epsilon(f64::NAN);
        assert!(OverlapDetector::new(bad).is_err());
    }

    #[test]
    fn test_lines_crossing() {
        let a = MapElement::line(1, vec![pt(0.0, 0.0), pt(10.0, 10.0)]);
        let b = MapElement::line(2, vec![pt(0.0, 10.0), pt(10.0, 0.0)]);
        let record = relate(&a, &b).unwrap();

        assert_eq!(record.kind, OverlapKind::Crossing);
        assert_eq!(record.intersections.len(), 1);
        let p = record.intersections[0];
        assert_relative_eq!(p.position.x, 5.0);
        assert_relative_eq!(p.position.y, 5.0);
        assert_relative_eq!(p.along_first, 50f64.sqrt(), epsilon = 1e-9);
    }

    #[test]
    fn test_lines_sharing_endpoint_touch() {
        let a = MapElement::line(1, vec![pt(0.0, 0.0), pt(5.0, 0.0)]);
        let b = MapElement::line(2, vec![pt(5.0, 0.0), pt(5.0, 5.0)]);
        let record = relate(&a, &b).unwrap();
        assert_eq!(record.kind, OverlapKind::Touching);
        assert_eq!(record.positions().collect::<Vec<_>>(), vec![pt(5.0, 0.0)]);
    }

    #[test]
    fn test_near_touch_depends_on_epsilon() {
        // b starts 1e-4 short of a
        let a = MapElement::line(1, vec![pt(0.0, 0.0), pt(10.0, 0.0)]);
        let b = MapElement::line(2, vec![pt(5.0, 1e-4), pt(5.0, 5.0)]);
        assert_eq!(relate(&a, &b).unwrap().kind, OverlapKind::Touching);

        let strict = OverlapDetector::new(Tolerances::default().with_touch_epsilon(1e-6)).unwrap();
        assert!(strict.overlap_between(&a, &b).unwrap().is_none());

        // b crosses a 0.5 away from its start: a real crossing
        let c = MapElement::line(3, vec![pt(5.0, -0.5), pt(5.0, 5.0)]);
        assert_eq!(relate(&a, &c).unwrap().kind, OverlapKind::Crossing);
    }

    #[test]
    fn test_disjoint_lines() {
        let a = MapElement::line(1, vec![pt(0.0, 0.0), pt(1.0, 0.0)]);
        let b = MapElement::line(2, vec![pt(0.0, 1.0), pt(1.0, 1.0)]);
        assert!(relate(&a, &b).is_none());
    }

    #[test]
    fn test_polyline_points_ordered_along_first() {
        // Zig-zag crossing the x axis three times
        let a = MapElement::line(
            1,
            vec![pt(0.0, 1.0), pt(2.0, -1.0), pt(4.0, 1.0), pt(6.0, -1.0)],
        );
        let b = MapElement::line(2, vec![pt(10.0, 0.0), pt(-10.0, 0.0)]);
        let record = relate(&a, &b).unwrap();
        assert_eq!(record.kind, OverlapKind::Crossing);

        let xs: Vec<f64> = record.positions().map(|p| p.x).collect();
        assert_eq!(xs.len(), 3);
        assert_relative_eq!(xs[0], 1.0, epsilon = 1e-9);
        assert_relative_eq!(xs[1], 3.0, epsilon = 1e-9);
        assert_relative_eq!(xs[2], 5.0, epsilon = 1e-9);

        // Seen from b, which runs towards -x, the order flips
        let reversed = relate(&b, &a).unwrap();
        let xs: Vec<f64> = reversed.positions().map(|p| p.x).collect();
        assert_relative_eq!(xs[0], 5.0, epsilon = 1e-9);
        assert_relative_eq!(xs[2], 1.0, epsilon = 1e-9);
    }

    #[test]
    fn test_line_inside_area() {
        let area = square(1, 0.0, 10.0);
        let line = MapElement::line(2, vec![pt(2.0, 2.0), pt(8.0, 3.0)]);
        assert_eq!(relate(&line, &area).unwrap().kind, OverlapKind::ContainedBy);
        assert_eq!(relate(&area, &line).unwrap().kind, OverlapKind::Contains);
        assert!(relate(&area, &line).unwrap().intersections.is_empty());
    }

    #[test]
    fn test_line_crossing_area() {
        let area = square(1, 0.0, 10.0);
        let line = MapElement::line(2, vec![pt(-5.0, 5.0), pt(15.0, 5.0)]);
        let record = relate(&line, &area).unwrap();
        assert_eq!(record.kind, OverlapKind::Crossing);
        let xs: Vec<f64> = record.positions().map(|p| p.x).collect();
        assert_eq!(xs.len(), 2);
        assert_relative_eq!(xs[0], 0.0);
        assert_relative_eq!(xs[1], 10.0);
    }

    #[test]
    fn test_line_ending_on_boundary() {
        let area = square(1, 0.0, 10.0);
        let outside = MapElement::line(2, vec![pt(-5.0, 5.0), pt(0.0, 5.0)]);
        assert_eq!(relate(&outside, &area).unwrap().kind, OverlapKind::Touching);

        let inside = MapElement::line(3, vec![pt(0.0, 5.0), pt(5.0, 5.0)]);
        assert_eq!(relate(&inside, &area).unwrap().kind, OverlapKind::ContainedBy);
    }

    #[test]
    fn test_line_through_vertex() {
        let area = square(1, 0.0, 10.0);
        // Enters exactly through the corner (0, 0)
        let line = MapElement::line(2, vec![pt(-5.0, -5.0), pt(5.0, 5.0)]);
        assert_eq!(relate(&line, &area).unwrap().kind, OverlapKind::Crossing);
    }

    #[test]
    fn test_line_in_hole_is_unrelated() {
        let area = MapElement::area(
            1,
            PolygonWithHoles::new(
                crate::polygon::SimplePolygon::new(vec![
                    pt(0.0, 0.0),
                    pt(10.0, 0.0),
                    pt(10.0, 10.0),
                    pt(0.0, 10.0),
                ]),
                vec![crate::polygon::SimplePolygon::new(vec![
                    pt(3.0, 3.0),
                    pt(7.0, 3.0),
                    pt(7.0, 7.0),
                    pt(3.0, 7.0),
                ])],
            ),
        );
        let line = MapElement::line(2, vec![pt(4.0, 5.0), pt(6.0, 5.0)]);
        assert!(relate(&line, &area).is_none());
    }

    #[test]
    fn test_nested_areas() {
        let outer = square(1, 0.0, 10.0);
        let inner = square(2, 2.0, 4.0);
        assert_eq!(relate(&outer, &inner).unwrap().kind, OverlapKind::Contains);
        assert_eq!(relate(&inner, &outer).unwrap().kind, OverlapKind::ContainedBy);
    }

    #[test]
    fn test_nested_area_touching_boundary() {
        let outer = square(1, 0.0, 10.0);
        let inner = MapElement::area(
            2,
            PolygonWithHoles::simple(vec![pt(5.0, 0.0), pt(7.0, 3.0), pt(3.0, 3.0)]),
        );
        let record = relate(&outer, &inner).unwrap();
        assert_eq!(record.kind, OverlapKind::Contains);
        assert_eq!(record.intersections.len(), 1);
    }

    #[test]
    fn test_overlapping_areas_cross() {
        let a = square(1, 0.0, 10.0);
        let b = square(2, 5.0, 15.0);
        let record = relate(&a, &b).unwrap();
        assert_eq!(record.kind, OverlapKind::Crossing);
        assert_eq!(record.intersections.len(), 2);
    }

    #[test]
    fn test_adjacent_areas_touch() {
        let a = square(1, 0.0, 10.0);
        let b = MapElement::area(
            2,
            PolygonWithHoles::simple(vec![
                pt(10.0, 0.0),
                pt(20.0, 0.0),
                pt(20.0, 10.0),
                pt(10.0, 10.0),
            ]),
        );
        assert_eq!(relate(&a, &b).unwrap().kind, OverlapKind::Touching);
    }

    #[test]
    fn test_identical_areas_touch() {
        let a = square(1, 0.0, 10.0);
        let b = square(2, 0.0, 10.0);
        assert_eq!(relate(&a, &b).unwrap().kind, OverlapKind::Touching);
    }

    #[test]
    fn test_area_around_hole_is_not_contained() {
        let holed = MapElement::area(
            1,
            PolygonWithHoles::new(
                crate::polygon::SimplePolygon::new(vec![
                    pt(0.0, 0.0),
                    pt(10.0, 0.0),
                    pt(10.0, 10.0),
                    pt(0.0, 10.0),
                ]),
                vec![crate::polygon::SimplePolygon::new(vec![
                    pt(4.0, 4.0),
                    pt(6.0, 4.0),
                    pt(6.0, 6.0),
                    pt(4.0, 6.0),
                ])],
            ),
        );
        let around = square(2, 2.0, 8.0);
        assert_eq!(relate(&holed, &around).unwrap().kind, OverlapKind::Crossing);

        let beside = square(3, 1.0, 3.0);
        assert_eq!(relate(&holed, &beside).unwrap().kind, OverlapKind::Contains);
    }

    #[test]
    fn test_point_in_area() {
        let area = square(1, 0.0, 10.0);
        let inside = MapElement::point(2, pt(3.0, 3.0));
        let outside = MapElement::point(3, pt(30.0, 3.0));
        assert_eq!(relate(&inside, &area).unwrap().kind, OverlapKind::ContainedBy);
        assert_eq!(relate(&area, &inside).unwrap().kind, OverlapKind::Contains);
        assert!(relate(&outside, &area).is_none());

        let on_edge = MapElement::point(4, pt(10.0, 5.0));
        assert_eq!(relate(&on_edge, &area).unwrap().kind, OverlapKind::ContainedBy);
    }

    #[test]
    fn test_points_ignore_lines_and_points() {
        let line = MapElement::line(1, vec![pt(0.0, 0.0), pt(10.0, 0.0)]);
        let on_line = MapElement::point(2, pt(5.0, 0.0));
        let same_spot = MapElement::point(3, pt(5.0, 0.0));
        assert!(relate(&on_line, &line).is_none());
        assert!(relate(&on_line, &same_spot).is_none());
    }

    #[test]
    fn test_symmetry() {
        let elements = vec![
            square(1, 0.0, 10.0),
            square(2, 5.0, 15.0),
            square(3, 2.0, 3.0),
            MapElement::line(4, vec![pt(-1.0, 1.0), pt(12.0, 6.0), pt(13.0, 20.0)]),
            MapElement::line(5, vec![pt(12.0, 6.0), pt(0.0, 9.0)]),
            MapElement::point(6, pt(2.5, 2.5)),
        ];
        for a in &elements {
            for b in &elements {
                let ab = relate(a, b);
                let ba = relate(b, a);
                match (ab, ba) {
                    (None, None) => {}
                    (Some(ab), Some(ba)) => {
                        assert_eq!(ab.kind, ba.kind.inverse(), "{} vs {}", a.id, b.id);
                        let mut pa: Vec<_> = ab.positions().map(|p| (p.x, p.y)).collect();
                        let mut pb: Vec<_> = ba.positions().map(|p| (p.x, p.y)).collect();
                        pa.sort_by(|x, y| x.partial_cmp(y).unwrap());
                        pb.sort_by(|x, y| x.partial_cmp(y).unwrap());
                        assert_eq!(pa, pb);
                    }
                    (ab, ba) => panic!(
                        "asymmetric result for {} vs {}: {:?} / {:?}",
                        a.id, b.id, ab, ba
                    ),
                }
            }
        }
    }

    #[test]
    fn test_degenerate_pair_fails() {
        let flat = MapElement::area(
            1,
            PolygonWithHoles::simple(vec![pt(0.0, 0.0), pt(1.0, 0.0), pt(2.0, 0.0)]),
        );
        let ok = square(2, 0.0, 1.0);
        assert!(detector().overlap_between(&flat, &ok).is_err());
    }

    #[test]
    fn test_detect_reports_each_bad_element_once() {
        let bowtie = MapElement::area(
            3,
            PolygonWithHoles::simple(vec![pt(0.0, 0.0), pt(4.0, 4.0), pt(4.0, 0.0), pt(0.0, 4.0)]),
        );
        let elements = vec![square(1, 0.0, 10.0), square(2, 1.0, 2.0), bowtie];
        let bounds = Aabb::new(0.0, 0.0, 10.0, 10.0);
        let index = SpatialIndex::build(bounds, 4, 4, elements.iter()).unwrap();

        let reporter = CollectingFaultReporter::new();
        let report = detector().detect(&index, &reporter);

        assert_eq!(report.failures.len(), 1);
        assert_eq!(reporter.faults()[0].element, Some(ElementId(3)));
        assert_eq!(report.records.len(), 1);
        assert_eq!(report.records[0].kind, OverlapKind::Contains);
        assert_eq!(report.pairs_tested, 1);
    }
}
