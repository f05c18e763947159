// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Axis-aligned bounding rectangles in the XZ projection plane.
//!
//! Map geometry lives on the XZ plane (X east, Z north); `Point2::y` holds
//! the Z coordinate throughout this crate.

use nalgebra::Point2;

/// Axis-aligned bounding box over X and Z
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min_x: f64,
    pub min_z: f64,
    pub max_x: f64,
    pub max_z: f64,
}

impl Aabb {
    /// Create a bounding box from its extremes
    pub fn new(min_x: f64, min_z: f64, max_x: f64, max_z: f64) -> Self {
        Self {
            min_x,
            min_z,
            max_x,
            max_z,
        }
    }

    /// Degenerate box around a single point
    pub fn from_point(p: Point2<f64>) -> Self {
        Self::new(p.x, p.y, p.x, p.y)
    }

    /// Smallest box enclosing all points, or `None` for an empty iterator
    pub fn from_points<'a, I>(points: I) -> Option<Self>
    where
        I: IntoIterator<Item = &'a Point2<f64>>,
    {
        let mut iter = points.into_iter();
        let first = iter.next()?;
        let mut bbox = Self::from_point(*first);
        for p in iter {
            bbox.min_x = bbox.min_x.min(p.x);
            bbox.min_z = bbox.min_z.min(p.y);
            bbox.max_x = bbox.max_x.max(p.x);
            bbox.max_z = bbox.max_z.max(p.y);
        }
        Some(bbox)
    }

    #[inline]
    pub fn size_x(&self) -> f64 {
        self.max_x - self.min_x
    }

    #[inline]
    pub fn size_z(&self) -> f64 {
        self.max_z - self.min_z
    }

    pub fn center(&self) -> Point2<f64> {
        Point2::new(
            (self.min_x + self.max_x) * 0.5,
            (self.min_z + self.max_z) * 0.5,
        )
    }

    /// Finite coordinates with min <= max on both axes
    pub fn is_valid(&self) -> bool {
        self.min_x.is_finite()
            && self.min_z.is_finite()
            && self.max_x.is_finite()
            && self.max_z.is_finite()
            && self.min_x <= self.max_x
            && self.min_z <= self.max_z
    }

    /// Closed-interval overlap test; touching boxes intersect
    #[inline]
    pub fn intersects(&self, other: &Aabb) -> bool {
        self.min_x <= other.max_x
            && other.min_x <= self.max_x
            && self.min_z <= other.max_z
            && other.min_z <= self.max_z
    }

    #[inline]
    pub fn contains_point(&self, p: &Point2<f64>) -> bool {
        p.x >= self.min_x && p.x <= self.max_x && p.y >= self.min_z && p.y <= self.max_z
    }

    pub fn contains(&self, other: &Aabb) -> bool {
        other.min_x >= self.min_x
            && other.max_x <= self.max_x
            && other.min_z >= self.min_z
            && other.max_z <= self.max_z
    }

    pub fn union(&self, other: &Aabb) -> Aabb {
        Aabb::new(
            self.min_x.min(other.min_x),
            self.min_z.min(other.min_z),
            self.max_x.max(other.max_x),
            self.max_z.max(other.max_z),
        )
    }

    /// Grow by `margin` on every side
    pub fn expand(&self, margin: f64) -> Aabb {
        Aabb::new(
            self.min_x - margin,
            self.min_z - margin,
            self.max_x + margin,
            self.max_z + margin,
        )
    }

    /// Corners in counter-clockwise order starting at (min_x, min_z)
    pub fn corners(&self) -> [Point2<f64>; 4] {
        [
            Point2::new(self.min_x, self.min_z),
            Point2::new(self.max_x, self.min_z),
            Point2::new(self.max_x, self.max_z),
            Point2::new(self.min_x, self.max_z),
        ]
    }
}

/// Anything that can report a bounding box fully enclosing its geometry
pub trait BoundedObject {
    fn bounding_box(&self) -> Aabb;
}

impl BoundedObject for Aabb {
    fn bounding_box(&self) -> Aabb {
        *self
    }
}

impl<T: BoundedObject + ?Sized> BoundedObject for &T {
    fn bounding_box(&self) -> Aabb {
        (**self).bounding_box()
    }
}

/// Object registered under its bounding box grown by `margin` on every side.
///
/// Grid cells only pair objects whose boxes share a cell, so relations that
/// hold up to a distance tolerance need the tolerance baked into the box.
#[derive(Debug, Clone, PartialEq)]
pub struct Padded<T> {
    pub inner: T,
    pub margin: f64,
}

impl<T> Padded<T> {
    pub fn new(inner: T, margin: f64) -> Self {
        Self { inner, margin }
    }

    pub fn into_inner(self) -> T {
        self.inner
    }
}

impl<T: BoundedObject> BoundedObject for Padded<T> {
    fn bounding_box(&self) -> Aabb {
        self.inner.bounding_box().expand(self.margin)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_points() {
        let points = [
            Point2::new(1.0, 5.0),
            Point2::new(-2.0, 3.0),
            Point2::new(4.0, -1.0),
        ];
        let bbox = Aabb::from_points(&points).unwrap();
        assert_eq!(bbox, Aabb::new(-2.0, -1.0, 4.0, 5.0));
        assert!(Aabb::from_points(&[]).is_none());
    }

    #[test]
    fn test_intersects_is_closed() {
        let a = Aabb::new(0.0, 0.0, 1.0, 1.0);
        let b = Aabb::new(1.0, 1.0, 2.0, 2.0);
        let c = Aabb::new(1.1, 0.0, 2.0, 1.0);
        assert!(a.intersects(&b));
        assert!(b.intersects(&a));
        assert!(!a.intersects(&c));
    }

    #[test]
    fn test_validity() {
        assert!(Aabb::new(0.0, 0.0, 0.0, 0.0).is_valid());
        assert!(!Aabb::new(1.0, 0.0, 0.0, 1.0).is_valid());
        assert!(!Aabb::new(0.0, 0.0, f64::INFINITY, 1.0).is_valid());
    }

    #[test]
    fn test_padded_box() {
        let padded = Padded::new(Aabb::new(0.0, 0.0, 1.0, 2.0), 0.5);
        assert_eq!(padded.bounding_box(), Aabb::new(-0.5, -0.5, 1.5, 2.5));
        assert_eq!(padded.into_inner(), Aabb::new(0.0, 0.0, 1.0, 2.0));
    }

    #[test]
    fn test_union_and_contains() {
        let a = Aabb::new(0.0, 0.0, 1.0, 1.0);
        let b = Aabb::new(2.0, -1.0, 3.0, 0.5);
        let u = a.union(&b);
        assert!(u.contains(&a));
        assert!(u.contains(&b));
        assert!(!a.contains(&u));
        assert!(u.contains_point(&Point2::new(1.5, 0.0)));
    }
}
