//! Integer bounding box for scan rasterization

use serde::{Deserialize, Serialize};

use crate::core::types::{DVec3, I64Vec3, IVec3};
use crate::core::{Error, Result};

/// Largest grid a set of bounds may describe (4 GiB of cells)
pub const MAX_GRID_CELLS: usize = 1 << 32;

/// Inclusive integer bounding box defined by min and max corners
///
/// Every integer coordinate in `[min, max]` owns one grid cell, so the
/// grid extent on each axis is `max - min + 1`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanBounds {
    pub min: IVec3,
    pub max: IVec3,
}

impl Default for ScanBounds {
    /// Physical capture volume of the scanner: x,y in [-200, 200], z in [-300, 300]
    fn default() -> Self {
        Self {
            min: IVec3::new(-200, -200, -300),
            max: IVec3::new(200, 200, 300),
        }
    }
}

impl ScanBounds {
    /// Create bounds from min and max corners
    pub fn new(min: IVec3, max: IVec3) -> Self {
        Self { min, max }
    }

    /// Number of cells per axis, widened so extreme corners cannot overflow
    pub fn extent(&self) -> I64Vec3 {
        self.max.as_i64vec3() - self.min.as_i64vec3() + I64Vec3::ONE
    }

    /// Grid dimensions as `[W, H, D]`, zero on inverted axes
    pub fn dims(&self) -> [usize; 3] {
        let e = self.extent().max(I64Vec3::ZERO);
        [e.x as usize, e.y as usize, e.z as usize]
    }

    /// Grid dimensions, rejecting inverted bounds and grids over [`MAX_GRID_CELLS`]
    pub fn checked_dims(&self) -> Result<[usize; 3]> {
        if self.min.cmpgt(self.max).any() {
            return Err(Error::InvalidShape(format!(
                "bounds {:?}..{:?} are inverted",
                self.min, self.max
            )));
        }

        let dims = self.dims();
        dims.iter()
            .try_fold(1usize, |acc, &d| acc.checked_mul(d))
            .filter(|&cells| cells <= MAX_GRID_CELLS)
            .ok_or_else(|| {
                Error::InvalidShape(format!(
                    "bounds {:?}..{:?} span {:?} cells, limit is {}",
                    self.min, self.max, dims, MAX_GRID_CELLS
                ))
            })?;
        Ok(dims)
    }

    /// Check if an integer coordinate lies inside the bounds
    pub fn contains(&self, p: IVec3) -> bool {
        p.x >= self.min.x
            && p.x <= self.max.x
            && p.y >= self.min.y
            && p.y <= self.max.y
            && p.z >= self.min.z
            && p.z <= self.max.z
    }

    /// Map a continuous point to the cell index it rounds into.
    ///
    /// Returns `None` for non-finite points and points outside the bounds.
    pub fn cell_of(&self, p: DVec3) -> Option<[usize; 3]> {
        if !p.is_finite() {
            return None;
        }
        let r = p.round();
        // Anything beyond i32 range is certainly outside
        if r.abs().max_element() > i32::MAX as f64 {
            return None;
        }
        let cell = IVec3::new(r.x as i32, r.y as i32, r.z as i32);
        if !self.contains(cell) {
            return None;
        }
        let offset = cell.as_i64vec3() - self.min.as_i64vec3();
        Some([offset.x as usize, offset.y as usize, offset.z as usize])
    }
}
