// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Map elements: tagged points, lines and areas handed over by a data reader.

use std::borrow::Borrow;
use std::fmt;

use nalgebra::Point2;
use rustc_hash::FxHashMap;

use crate::bounds::{Aabb, BoundedObject, Padded};
use crate::config::Tolerances;
use crate::error::{Error, Result};
use crate::polygon::{PolygonWithHoles, SimplePolygon};

/// Stable identity of a map element
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ElementId(pub u32);

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Opaque key/value tags. Their meaning belongs to downstream modules.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Tags(FxHashMap<String, String>);

impl Tags {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn contains(&self, key: &str, value: &str) -> bool {
        self.get(key) == Some(value)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Tags {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// Footprint of a map element on the XZ plane
#[derive(Debug, Clone, PartialEq)]
pub enum ElementGeometry {
    Point(Point2<f64>),
    /// Ordered vertex sequence
    Line(Vec<Point2<f64>>),
    Area(PolygonWithHoles),
}

/// A tagged map element owning its geometry
#[derive(Debug, Clone, PartialEq)]
pub struct MapElement {
    pub id: ElementId,
    pub geometry: ElementGeometry,
    pub tags: Tags,
}

impl MapElement {
    pub fn new(id: ElementId, geometry: ElementGeometry, tags: Tags) -> Self {
        Self { id, geometry, tags }
    }

    pub fn point(id: u32, pos: Point2<f64>) -> Self {
        Self::new(ElementId(id), ElementGeometry::Point(pos), Tags::new())
    }

    pub fn line(id: u32, vertices: Vec<Point2<f64>>) -> Self {
        Self::new(ElementId(id), ElementGeometry::Line(vertices), Tags::new())
    }

    pub fn area(id: u32, polygon: PolygonWithHoles) -> Self {
        Self::new(ElementId(id), ElementGeometry::Area(polygon), Tags::new())
    }

    /// Attach tags, consuming and returning the element
    pub fn with_tags(mut self, tags: Tags) -> Self {
        self.tags = tags;
        self
    }

    pub fn kind_name(&self) -> &'static str {
        match self.geometry {
            ElementGeometry::Point(_) => "point",
            ElementGeometry::Line(_) => "line",
            ElementGeometry::Area(_) => "area",
        }
    }

    /// Check that the geometry can take part in exact intersection tests
    pub fn validate(&self, tolerances: &Tolerances) -> Result<()> {
        match &self.geometry {
            ElementGeometry::Point(p) => {
                if !(p.x.is_finite() && p.y.is_finite()) {
                    return Err(Error::DegenerateGeometry(format!(
                        "point {} has non-finite coordinates",
                        self.id
                    )));
                }
            }
            ElementGeometry::Line(vertices) => {
                if vertices.iter().any(|p| !(p.x.is_finite() && p.y.is_finite())) {
                    return Err(Error::DegenerateGeometry(format!(
                        "line {} has non-finite coordinates",
                        self.id
                    )));
                }
                let distinct = vertices.windows(2).any(|w| w[0] != w[1]);
                if vertices.len() < 2 || !distinct {
                    return Err(Error::DegenerateGeometry(format!(
                        "line {} needs at least two distinct vertices",
                        self.id
                    )));
                }
            }
            ElementGeometry::Area(polygon) => {
                for (i, ring) in polygon.rings().enumerate() {
                    validate_ring(self.id, i, ring, tolerances)?;
                }
            }
        }
        Ok(())
    }
}

fn validate_ring(
    id: ElementId,
    ring_index: usize,
    ring: &SimplePolygon,
    tolerances: &Tolerances,
) -> Result<()> {
    if ring.len() < 3 {
        return Err(Error::DegenerateGeometry(format!(
            "area {} ring {} has {} vertices",
            id,
            ring_index,
            ring.len()
        )));
    }
    if ring.vertices().iter().any(|v| !(v.x.is_finite() && v.y.is_finite())) {
        return Err(Error::DegenerateGeometry(format!(
            "area {} ring {} has non-finite coordinates",
            id, ring_index
        )));
    }
    if ring.area() <= tolerances.degenerate_area {
        return Err(Error::DegenerateGeometry(format!(
            "area {} ring {} has zero area",
            id, ring_index
        )));
    }
    if ring.is_self_intersecting() {
        return Err(Error::DegenerateGeometry(format!(
            "area {} ring {} is self-intersecting",
            id, ring_index
        )));
    }
    Ok(())
}

impl<T: Borrow<MapElement>> Borrow<MapElement> for Padded<T> {
    fn borrow(&self) -> &MapElement {
        self.inner.borrow()
    }
}

impl BoundedObject for MapElement {
    fn bounding_box(&self) -> Aabb {
        match &self.geometry {
            ElementGeometry::Point(p) => Aabb::from_point(*p),
            ElementGeometry::Line(vertices) => Aabb::from_points(vertices)
                .unwrap_or_else(|| Aabb::new(0.0, 0.0, 0.0, 0.0)),
            ElementGeometry::Area(polygon) => polygon.bounding_box(),
        }
    }
}
