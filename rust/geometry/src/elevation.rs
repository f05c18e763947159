// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Elevation sources: point lookups from a position on the XZ plane to an
//! optional elevation.
//!
//! `None` means "no data" and must never be read as zero. Sources are plain
//! values selected by the caller and handed to
//! [`TerrainElevationGrid`](crate::terrain::TerrainElevationGrid); any
//! `Fn(Point2<f64>) -> Option<f64>` closure works as well.

use nalgebra::Point2;

use crate::error::{Error, Result};

/// Capability of answering elevation queries at arbitrary positions
pub trait ElevationSource: Send + Sync {
    fn elevation(&self, pos: Point2<f64>) -> Option<f64>;
}

impl<F> ElevationSource for F
where
    F: Fn(Point2<f64>) -> Option<f64> + Send + Sync,
{
    fn elevation(&self, pos: Point2<f64>) -> Option<f64> {
        self(pos)
    }
}

/// Same elevation everywhere
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConstantElevation(pub f64);

impl ElevationSource for ConstantElevation {
    fn elevation(&self, _pos: Point2<f64>) -> Option<f64> {
        Some(self.0)
    }
}

/// `amplitude * sin(frequency * x)`; independent of z
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SinusoidalElevation {
    pub amplitude: f64,
    pub frequency: f64,
}

impl Default for SinusoidalElevation {
    fn default() -> Self {
        Self {
            amplitude: 10.0,
            frequency: 1.0,
        }
    }
}

impl ElevationSource for SinusoidalElevation {
    fn elevation(&self, pos: Point2<f64>) -> Option<f64> {
        Some(self.amplitude * (self.frequency * pos.x).sin())
    }
}

/// Raster tile already loaded into memory by an external reader.
///
/// Samples are row-major: `samples[row * width + column]`, with column along
/// X starting at `origin.x` and row along Z starting at `origin.y`.
#[derive(Debug, Clone)]
pub struct RasterElevation {
    origin: Point2<f64>,
    spacing_x: f64,
    spacing_z: f64,
    width: usize,
    height: usize,
    samples: Vec<f64>,
    no_data: Option<f64>,
}

impl RasterElevation {
    pub fn new(
        origin: Point2<f64>,
        spacing_x: f64,
        spacing_z: f64,
        width: usize,
        height: usize,
        samples: Vec<f64>,
    ) -> Result<Self> {
        if width < 2 || height < 2 {
            return Err(Error::InvalidGrid(format!(
                "raster needs at least 2x2 samples, got {}x{}",
                width, height
            )));
        }
        if !(spacing_x > 0.0 && spacing_z > 0.0) {
            return Err(Error::InvalidGrid(format!(
                "raster spacing must be positive, got {}x{}",
                spacing_x, spacing_z
            )));
        }
        if samples.len() != width * height {
            return Err(Error::InvalidGrid(format!(
                "expected {} raster samples, got {}",
                width * height,
                samples.len()
            )));
        }

        Ok(Self {
            origin,
            spacing_x,
            spacing_z,
            width,
            height,
            samples,
            no_data: None,
        })
    }

    /// Treat samples equal to `value` (e.g. SRTM's -32768) as missing.
    /// NaN samples are always missing.
    pub fn with_no_data(mut self, value: f64) -> Self {
        self.no_data = Some(value);
        self
    }

    fn sample(&self, column: usize, row: usize) -> Option<f64> {
        let value = self.samples[row * self.width + column];
        if value.is_nan() || self.no_data == Some(value) {
            None
        } else {
            Some(value)
        }
    }
}

impl ElevationSource for RasterElevation {
    fn elevation(&self, pos: Point2<f64>) -> Option<f64> {
        let gx = (pos.x - self.origin.x) / self.spacing_x;
        let gz = (pos.y - self.origin.y) / self.spacing_z;

        let max_x = (self.width - 1) as f64;
        let max_z = (self.height - 1) as f64;
        if !(0.0..=max_x).contains(&gx) || !(0.0..=max_z).contains(&gz) {
            return None;
        }

        let (column, fx) = split_cell(gx, self.width);
        let (row, fz) = split_cell(gz, self.height);

        interpolate(|c, r| self.sample(c, r), column, row, fx, fz)
    }
}

/// Split a continuous grid coordinate into the lower sample index and the
/// fraction towards the next one. The index is kept below `count - 1` so the
/// upper neighbour always exists.
#[inline]
pub(crate) fn split_cell(g: f64, count: usize) -> (usize, f64) {
    let index = (g.floor().max(0.0) as usize).min(count - 2);
    (index, (g - index as f64).clamp(0.0, 1.0))
}

/// Bilinear blend of the cell whose lower corner is `(x, z)`. Corners with
/// zero weight are never fetched, so a lookup exactly on a sample does not
/// depend on its neighbours having data.
pub(crate) fn interpolate<F>(fetch: F, x: usize, z: usize, fx: f64, fz: f64) -> Option<f64>
where
    F: Fn(usize, usize) -> Option<f64>,
{
    let corner = |dx: usize, dz: usize, weight: f64| {
        if weight == 0.0 {
            Some(0.0)
        } else {
            fetch(x + dx, z + dz)
        }
    };

    let v00 = corner(0, 0, (1.0 - fx) * (1.0 - fz))?;
    let v10 = corner(1, 0, fx * (1.0 - fz))?;
    let v01 = corner(0, 1, (1.0 - fx) * fz)?;
    let v11 = corner(1, 1, fx * fz)?;

    let bottom = v00 + (v10 - v00) * fx;
    let top = v01 + (v11 - v01) * fx;
    Some(bottom + (top - bottom) * fz)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_builtin_sources() {
        let pos = Point2::new(std::f64::consts::FRAC_PI_2, 42.0);
        assert_eq!(ConstantElevation(3.5).elevation(pos), Some(3.5));
        assert_relative_eq!(SinusoidalElevation::default().elevation(pos).unwrap(), 10.0);
    }

    #[test]
    fn test_closure_source() {
        let source = |p: Point2<f64>| if p.x > 0.0 { Some(p.x) } else { None };
        assert_eq!(source.elevation(Point2::new(2.0, 0.0)), Some(2.0));
        assert_eq!(source.elevation(Point2::new(-2.0, 0.0)), None);
    }

    #[test]
    fn test_raster_lookup() {
        // 3 columns x 2 rows, 10 units apart
        let raster = RasterElevation::new(
            Point2::new(100.0, 200.0),
            10.0,
            10.0,
            3,
            2,
            vec![0.0, 10.0, 20.0, 10.0, 20.0, -32768.0],
        )
        .unwrap()
        .with_no_data(-32768.0);

        assert_relative_eq!(raster.elevation(Point2::new(100.0, 200.0)).unwrap(), 0.0);
        assert_relative_eq!(raster.elevation(Point2::new(105.0, 205.0)).unwrap(), 10.0);
        assert_relative_eq!(raster.elevation(Point2::new(100.0, 210.0)).unwrap(), 10.0);
        // A missing corner poisons the cell, except where its weight is zero
        assert_eq!(raster.elevation(Point2::new(115.0, 205.0)), None);
        assert_eq!(raster.elevation(Point2::new(110.0, 200.0)), Some(10.0));
        assert_eq!(raster.elevation(Point2::new(115.0, 200.0)), Some(15.0));
        // Outside the tile
        assert_eq!(raster.elevation(Point2::new(99.0, 200.0)), None);
    }

    #[test]
    fn test_raster_rejects_bad_shape() {
        let origin = Point2::new(0.0, 0.0);
        assert!(RasterElevation::new(origin, 1.0, 1.0, 2, 2, vec![0.0; 3]).is_err());
        assert!(RasterElevation::new(origin, 0.0, 1.0, 2, 2, vec![0.0; 4]).is_err());
        assert!(RasterElevation::new(origin, 1.0, 1.0, 1, 4, vec![0.0; 4]).is_err());
    }

    #[test]
    fn test_split_cell_keeps_upper_neighbour() {
        assert_eq!(split_cell(0.0, 3), (0, 0.0));
        assert_eq!(split_cell(1.25, 3), (1, 0.25));
        assert_eq!(split_cell(2.0, 3), (1, 1.0));
    }
}
