// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Uniform grid index over bounded 2D objects.
//!
//! The grid divides the index bounds into `cells_x * cells_z` equally sized
//! cells. An object is registered in every cell its bounding box overlaps, so
//! a range query only has to look at the cells overlapping the query region.
//! Objects are owned by the index in insertion order; cells only store slot
//! numbers pointing back into that list.
//!
//! The index is filled once and then only read. Shared references can be
//! queried from any number of threads.

use rustc_hash::FxHashSet;

use crate::bounds::{Aabb, BoundedObject};
use crate::error::{Error, Result};

/// Upper bound on `cells_x * cells_z`
pub const MAX_CELLS: usize = 1 << 22;

/// Grid-based spatial index
#[derive(Debug, Clone)]
pub struct SpatialIndex<T> {
    bounds: Aabb,
    cells_x: usize,
    cells_z: usize,
    cell_size_x: f64,
    cell_size_z: f64,
    /// Row-major by x: cell (x, z) lives at `x * cells_z + z`
    cells: Vec<Vec<usize>>,
    objects: Vec<T>,
}

impl<T: BoundedObject> SpatialIndex<T> {
    /// Create an empty index with a fixed number of cells per axis
    pub fn new(bounds: Aabb, cells_x: usize, cells_z: usize) -> Result<Self> {
        if cells_x == 0 || cells_z == 0 {
            return Err(Error::InvalidGrid(format!(
                "cell counts must be positive, got {}x{}",
                cells_x, cells_z
            )));
        }
        if !bounds.is_valid() {
            return Err(Error::InvalidGrid(format!(
                "malformed index bounds {:?}",
                bounds
            )));
        }
        let total = match cells_x.checked_mul(cells_z) {
            Some(total) if total <= MAX_CELLS => total,
            _ => {
                return Err(Error::InvalidGrid(format!(
                    "{}x{} cells exceeds the limit of {}",
                    cells_x, cells_z, MAX_CELLS
                )))
            }
        };

        Ok(Self {
            bounds,
            cells_x,
            cells_z,
            cell_size_x: bounds.size_x() / cells_x as f64,
            cell_size_z: bounds.size_z() / cells_z as f64,
            cells: vec![Vec::new(); total],
            objects: Vec::new(),
        })
    }

    /// Create an empty index whose cells are roughly `approx_x` by `approx_z`
    pub fn with_cell_size(bounds: Aabb, approx_x: f64, approx_z: f64) -> Result<Self> {
        if !(approx_x > 0.0 && approx_z > 0.0) || !approx_x.is_finite() || !approx_z.is_finite()
        {
            return Err(Error::InvalidGrid(format!(
                "cell sizes must be positive, got {}x{}",
                approx_x, approx_z
            )));
        }
        if !bounds.is_valid() {
            return Err(Error::InvalidGrid(format!(
                "malformed index bounds {:?}",
                bounds
            )));
        }

        let cells_x = cells_along(bounds.size_x(), approx_x)?;
        let cells_z = cells_along(bounds.size_z(), approx_z)?;
        Self::new(bounds, cells_x, cells_z)
    }

    /// Build a complete index in one go
    pub fn build<I>(bounds: Aabb, cells_x: usize, cells_z: usize, objects: I) -> Result<Self>
    where
        I: IntoIterator<Item = T>,
    {
        let mut index = Self::new(bounds, cells_x, cells_z)?;
        for object in objects {
            index.insert(object);
        }

        tracing::debug!(
            objects = index.objects.len(),
            cells_x,
            cells_z,
            occupied = index.cells.iter().filter(|c| !c.is_empty()).count(),
            "built spatial index"
        );

        Ok(index)
    }

    /// Register an object in every cell its bounding box overlaps.
    /// Returns the slot the object is stored under.
    pub fn insert(&mut self, object: T) -> usize {
        let slot = self.objects.len();
        let (min_x, min_z, max_x, max_z) = self.cell_range(&object.bounding_box());

        for cell_x in min_x..=max_x {
            for cell_z in min_z..=max_z {
                let cell = self.cell_offset(cell_x, cell_z);
                self.cells[cell].push(slot);
            }
        }

        self.objects.push(object);
        slot
    }

    /// Slots of all objects registered in cells overlapping `region`,
    /// sorted and deduplicated. May include objects whose bounding box does
    /// not itself overlap `region`; never misses one that does.
    pub fn query(&self, region: &Aabb) -> Vec<usize> {
        let (min_x, min_z, max_x, max_z) = self.cell_range(region);

        if min_x == max_x && min_z == max_z {
            // Single cell, already free of duplicates
            let mut result = self.cells[self.cell_offset(min_x, min_z)].clone();
            result.sort_unstable();
            return result;
        }

        let mut seen = FxHashSet::default();
        for cell_x in min_x..=max_x {
            for cell_z in min_z..=max_z {
                seen.extend(self.cells[self.cell_offset(cell_x, cell_z)].iter().copied());
            }
        }

        let mut result: Vec<usize> = seen.into_iter().collect();
        result.sort_unstable();
        result
    }

    /// Like [`SpatialIndex::query`], resolving slots to objects
    pub fn query_objects<'a>(&'a self, region: &Aabb) -> impl Iterator<Item = &'a T> + 'a {
        self.query(region).into_iter().map(move |slot| &self.objects[slot])
    }

    /// Non-empty cells a region would touch, without inserting anything
    pub fn probe_cells(&self, region: &Aabb) -> Vec<&[usize]> {
        let (min_x, min_z, max_x, max_z) = self.cell_range(region);
        let mut result = Vec::with_capacity((max_x - min_x + 1) * (max_z - min_z + 1));
        for cell_x in min_x..=max_x {
            for cell_z in min_z..=max_z {
                let cell = &self.cells[self.cell_offset(cell_x, cell_z)];
                if !cell.is_empty() {
                    result.push(cell.as_slice());
                }
            }
        }
        result
    }

    /// All non-empty cells
    pub fn cells(&self) -> impl Iterator<Item = &[usize]> {
        self.cells
            .iter()
            .filter(|cell| !cell.is_empty())
            .map(Vec::as_slice)
    }

    /// Unordered pairs of distinct slots sharing at least one cell, as
    /// `(a, b)` with `a < b`, sorted
    pub fn candidate_pairs(&self) -> Vec<(usize, usize)> {
        let mut pairs = FxHashSet::default();
        for cell in self.cells() {
            for (i, &a) in cell.iter().enumerate() {
                for &b in &cell[i + 1..] {
                    if a != b {
                        pairs.insert((a.min(b), a.max(b)));
                    }
                }
            }
        }

        let mut result: Vec<(usize, usize)> = pairs.into_iter().collect();
        result.sort_unstable();
        result
    }
}

impl<T> SpatialIndex<T> {
    /// X index of the cell containing `x`, clamped into `[0, cells_x - 1]`
    pub fn cell_x_for_coord(&self, x: f64) -> usize {
        clamp_cell(x - self.bounds.min_x, self.cell_size_x, self.cells_x)
    }

    /// Z index of the cell containing `z`, clamped into `[0, cells_z - 1]`
    pub fn cell_z_for_coord(&self, z: f64) -> usize {
        clamp_cell(z - self.bounds.min_z, self.cell_size_z, self.cells_z)
    }

    pub fn get(&self, slot: usize) -> Option<&T> {
        self.objects.get(slot)
    }

    /// Objects in insertion order
    pub fn objects(&self) -> &[T] {
        &self.objects
    }

    pub fn into_objects(self) -> Vec<T> {
        self.objects
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn bounds(&self) -> &Aabb {
        &self.bounds
    }

    pub fn cell_counts(&self) -> (usize, usize) {
        (self.cells_x, self.cells_z)
    }

    fn cell_range(&self, region: &Aabb) -> (usize, usize, usize, usize) {
        (
            self.cell_x_for_coord(region.min_x),
            self.cell_z_for_coord(region.min_z),
            self.cell_x_for_coord(region.max_x),
            self.cell_z_for_coord(region.max_z),
        )
    }

    #[inline]
    fn cell_offset(&self, cell_x: usize, cell_z: usize) -> usize {
        cell_x * self.cells_z + cell_z
    }
}

/// Cells of roughly `approx` needed to cover `extent`, refusing counts that
/// would not fit the grid
fn cells_along(extent: f64, approx: f64) -> Result<usize> {
    let ratio = extent / approx;
    if !(ratio.is_finite() && ratio < MAX_CELLS as f64) {
        return Err(Error::InvalidGrid(format!(
            "cell size {} is too small for extent {}",
            approx, extent
        )));
    }
    Ok(ratio as usize + 1)
}

#[inline]
fn clamp_cell(offset: f64, cell_size: f64, cell_count: usize) -> usize {
    if !(cell_size > 0.0) || offset.is_nan() || offset <= 0.0 {
        return 0;
    }
    // Float-to-int casts saturate, so huge offsets land on the last cell
    ((offset / cell_size) as usize).min(cell_count - 1)
}
