// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! OSM-Lite Geometry
//!
//! Geometry substrate for turning tagged map data into 3D models:
//!
//! - [`SpatialIndex`]: uniform grid for candidate lookup over bounding boxes
//! - [`OverlapDetector`]: classifies line/area relationships between elements
//! - [`TerrainElevationGrid`]: bilinear elevation over a pluggable source
//! - [`PolygonClipper`]: clips 3D triangles to tile boundaries on the XZ plane
//!
//! All planar work happens on the XZ plane. [`Point2`] values hold `(x, z)`,
//! so `Point2::y` is the Z coordinate; 3D points use Y for elevation.

pub mod bounds;
pub mod clipping;
pub mod config;
pub mod element;
pub mod elevation;
pub mod error;
pub mod fault;
pub mod map_data;
pub mod overlap;
pub mod polygon;
pub mod spatial_index;
pub mod terrain;

// Re-export nalgebra types for convenience
pub use nalgebra::{Point2, Point3, Vector2, Vector3};

pub use bounds::{Aabb, BoundedObject, Padded};
pub use clipping::{
    AttributedTriangle, Attributes, ClipBoundary, ClipReport, PolygonClipper, Triangle3,
};
pub use config::Tolerances;
pub use element::{ElementGeometry, ElementId, MapElement, Tags};
pub use elevation::{ConstantElevation, ElevationSource, RasterElevation, SinusoidalElevation};
pub use error::{Error, Result};
pub use fault::{
    CollectingFaultReporter, Fault, FaultReporter, NullFaultReporter, TracingFaultReporter,
};
pub use map_data::MapData;
pub use overlap::{IntersectionPoint, OverlapDetector, OverlapKind, OverlapRecord, OverlapReport};
pub use polygon::{PolygonWithHoles, SimplePolygon};
pub use spatial_index::{SpatialIndex, MAX_CELLS};
pub use terrain::{TerrainCell, TerrainElevationGrid};
