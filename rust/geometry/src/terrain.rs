// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Terrain Elevation Grid
//!
//! Samples an [`ElevationSource`] on a regular `num_points_x * num_points_z`
//! lattice spanning a bounding rectangle, then answers point queries by
//! bilinear interpolation between the four surrounding samples.
//!
//! - Samples without data stay `None`; a query that depends on such a
//!   sample returns `None` instead of a guessed value
//! - Queries outside the rectangle clamp to the nearest edge
//! - The grid is immutable after construction and can be shared across threads

use nalgebra::{Point2, Point3};

use crate::bounds::{Aabb, BoundedObject};
use crate::elevation::{interpolate, split_cell, ElevationSource};
use crate::error::{Error, Result};

/// Regular elevation sample grid over a bounding rectangle
#[derive(Debug, Clone)]
pub struct TerrainElevationGrid {
    bounds: Aabb,
    num_points_x: usize,
    num_points_z: usize,
    /// Row-major by x: sample (x, z) lives at `x * num_points_z + z`
    samples: Vec<Option<f64>>,
}

impl TerrainElevationGrid {
    /// Sample `source` evenly across `bounds`, including both edges
    pub fn new<S>(
        bounds: Aabb,
        num_points_x: usize,
        num_points_z: usize,
        source: &S,
    ) -> Result<Self>
    where
        S: ElevationSource + ?Sized,
    {
        if num_points_x < 2 || num_points_z < 2 {
            return Err(Error::InvalidGrid(format!(
                "need at least 2x2 points for a terrain grid, got {}x{}",
                num_points_x, num_points_z
            )));
        }
        if !bounds.is_valid() || bounds.size_x() <= 0.0 || bounds.size_z() <= 0.0 {
            return Err(Error::InvalidGrid(format!(
                "terrain bounds must have positive extent, got {:?}",
                bounds
            )));
        }

        let mut grid = Self {
            bounds,
            num_points_x,
            num_points_z,
            samples: Vec::with_capacity(num_points_x * num_points_z),
        };

        for x in 0..num_points_x {
            for z in 0..num_points_z {
                let pos = grid.position(x, z);
                grid.samples.push(source.elevation(pos));
            }
        }

        tracing::debug!(
            num_points_x,
            num_points_z,
            no_data = grid.no_data_count(),
            "sampled terrain elevation grid"
        );

        Ok(grid)
    }

    /// Interpolated elevation at `pos`, or `None` if a surrounding sample
    /// that contributes to it has no data
    pub fn elevation(&self, pos: Point2<f64>) -> Option<f64> {
        let gx = self.grid_coord(
            pos.x - self.bounds.min_x,
            self.bounds.size_x(),
            self.num_points_x,
        );
        let gz = self.grid_coord(
            pos.y - self.bounds.min_z,
            self.bounds.size_z(),
            self.num_points_z,
        );

        let (x, fx) = split_cell(gx, self.num_points_x);
        let (z, fz) = split_cell(gz, self.num_points_z);

        interpolate(|x, z| self.sample(x, z), x, z, fx, fz)
    }

    /// Raw sample at lattice index `(x, z)`; `None` for missing data or an
    /// index outside the lattice
    pub fn sample(&self, x: usize, z: usize) -> Option<f64> {
        if x >= self.num_points_x || z >= self.num_points_z {
            return None;
        }
        self.samples[x * self.num_points_z + z]
    }

    /// Position of lattice point `(x, z)` on the XZ plane
    pub fn position(&self, x: usize, z: usize) -> Point2<f64> {
        Point2::new(
            self.bounds.min_x + x as f64 * self.bounds.size_x() / (self.num_points_x - 1) as f64,
            self.bounds.min_z + z as f64 * self.bounds.size_z() / (self.num_points_z - 1) as f64,
        )
    }

    /// Every lattice point with its sampled elevation
    pub fn terrain_points(&self) -> impl Iterator<Item = (Point2<f64>, Option<f64>)> + '_ {
        (0..self.num_points_x).flat_map(move |x| {
            (0..self.num_points_z).map(move |z| (self.position(x, z), self.sample(x, z)))
        })
    }

    /// All `(num_points_x - 1) * (num_points_z - 1)` cells, z varying fastest
    pub fn cells(&self) -> impl Iterator<Item = TerrainCell<'_>> + '_ {
        (0..self.num_points_x - 1).flat_map(move |x| {
            (0..self.num_points_z - 1).map(move |z| TerrainCell {
                grid: self,
                left: x,
                bottom: z,
            })
        })
    }

    /// Outline of the grid as counter-clockwise 3D points (y = elevation),
    /// starting at the (min x, min z) corner. `None` if any boundary sample
    /// has no data.
    pub fn boundary_polygon(&self) -> Option<Vec<Point3<f64>>> {
        let (nx, nz) = (self.num_points_x, self.num_points_z);
        let mut indices = Vec::with_capacity(2 * (nx + nz));

        indices.extend((0..nx).map(|x| (x, 0)));
        indices.extend((1..nz).map(|z| (nx - 1, z)));
        indices.extend((0..nx - 1).rev().map(|x| (x, nz - 1)));
        indices.extend((1..nz - 1).rev().map(|z| (0, z)));

        indices
            .into_iter()
            .map(|(x, z)| {
                let pos = self.position(x, z);
                self.sample(x, z).map(|ele| Point3::new(pos.x, ele, pos.y))
            })
            .collect()
    }

    /// Number of samples without data
    pub fn no_data_count(&self) -> usize {
        self.samples.iter().filter(|s| s.is_none()).count()
    }

    pub fn bounds(&self) -> &Aabb {
        &self.bounds
    }

    pub fn point_counts(&self) -> (usize, usize) {
        (self.num_points_x, self.num_points_z)
    }

    /// Continuous lattice coordinate, clamped onto the grid
    fn grid_coord(&self, offset: f64, size: f64, count: usize) -> f64 {
        let max = (count - 1) as f64;
        let g = offset / size * max;
        if g.is_nan() {
            0.0
        } else {
            g.clamp(0.0, max)
        }
    }
}

/// One rectangular cell between four neighbouring lattice points
#[derive(Debug, Clone, Copy)]
pub struct TerrainCell<'a> {
    grid: &'a TerrainElevationGrid,
    left: usize,
    bottom: usize,
}

impl<'a> TerrainCell<'a> {
    /// Lattice index of the bottom-left corner
    pub fn index(&self) -> (usize, usize) {
        (self.left, self.bottom)
    }

    pub fn bottom_left(&self) -> (Point2<f64>, Option<f64>) {
        self.corner(self.left, self.bottom)
    }

    pub fn bottom_right(&self) -> (Point2<f64>, Option<f64>) {
        self.corner(self.left + 1, self.bottom)
    }

    pub fn top_right(&self) -> (Point2<f64>, Option<f64>) {
        self.corner(self.left + 1, self.bottom + 1)
    }

    pub fn top_left(&self) -> (Point2<f64>, Option<f64>) {
        self.corner(self.left, self.bottom + 1)
    }

    /// Counter-clockwise corners with elevation, `None` if any is missing
    pub fn polygon(&self) -> Option<[Point3<f64>; 4]> {
        let lift =
            |(pos, ele): (Point2<f64>, Option<f64>)| ele.map(|e| Point3::new(pos.x, e, pos.y));
        Some([
            lift(self.bottom_left())?,
            lift(self.bottom_right())?,
            lift(self.top_right())?,
            lift(self.top_left())?,
        ])
    }

    fn corner(&self, x: usize, z: usize) -> (Point2<f64>, Option<f64>) {
        (self.grid.position(x, z), self.grid.sample(x, z))
    }
}

impl BoundedObject for TerrainCell<'_> {
    fn bounding_box(&self) -> Aabb {
        let min = self.grid.position(self.left, self.bottom);
        let max = self.grid.position(self.left + 1, self.bottom + 1);
        Aabb::new(min.x, min.y, max.x, max.y)
    }
}
