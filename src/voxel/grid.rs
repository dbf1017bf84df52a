//! Dense occupancy grids and stacked batches

use serde::{Deserialize, Serialize};

use crate::core::{Error, Result};

/// Axis order the grid data was stored in by the voxel codec
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AxisOrder {
    #[default]
    Xyz,
    Xzy,
}

/// Placement metadata carried alongside a decoded grid
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Provenance {
    pub translate: [f64; 3],
    pub scale: f64,
    pub axis_order: AxisOrder,
}

impl Default for Provenance {
    fn default() -> Self {
        Self {
            translate: [0.0; 3],
            scale: 1.0,
            axis_order: AxisOrder::Xyz,
        }
    }
}

/// Dense binary occupancy grid
///
/// Cells are stored row-major with `z` varying fastest, i.e. the cell
/// `(x, y, z)` lives at `(x * H + y) * D + z` for dims `[W, H, D]`.
/// Every stored cell is 0 or 1, so reads always yield exactly `0.0` or `1.0`.
#[derive(Clone, Debug, PartialEq)]
pub struct VoxelGrid {
    dims: [usize; 3],
    cells: Vec<u8>,
    provenance: Option<Provenance>,
}

impl VoxelGrid {
    /// Create an empty grid
    pub fn new(dims: [usize; 3]) -> Self {
        Self {
            dims,
            cells: vec![0; dims[0] * dims[1] * dims[2]],
            provenance: None,
        }
    }

    /// Build a grid from raw cells in storage order; nonzero cells become occupied
    pub fn from_cells(dims: [usize; 3], mut cells: Vec<u8>) -> Result<Self> {
        let expected = dims[0] * dims[1] * dims[2];
        if cells.len() != expected {
            return Err(Error::InvalidShape(format!(
                "{} cells for dims {:?} (expected {})",
                cells.len(), dims, expected
            )));
        }
        for c in cells.iter_mut() {
            *c = (*c != 0) as u8;
        }
        Ok(Self { dims, cells, provenance: None })
    }

    /// Build a grid from continuous intensities, binarizing every nonzero value
    pub fn from_values(dims: [usize; 3], values: &[f32]) -> Result<Self> {
        let cells = values.iter().map(|&v| (v != 0.0) as u8).collect();
        Self::from_cells(dims, cells)
    }

    /// Attach codec provenance
    pub fn with_provenance(mut self, provenance: Provenance) -> Self {
        self.provenance = Some(provenance);
        self
    }

    pub fn dims(&self) -> [usize; 3] {
        self.dims
    }

    pub fn provenance(&self) -> Option<&Provenance> {
        self.provenance.as_ref()
    }

    /// Total number of cells
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Raw cells in storage order
    pub fn cells(&self) -> &[u8] {
        &self.cells
    }

    #[inline]
    pub fn index(&self, x: usize, y: usize, z: usize) -> usize {
        (x * self.dims[1] + y) * self.dims[2] + z
    }

    /// Occupancy value at a cell, `0.0` or `1.0`
    #[inline]
    pub fn get(&self, x: usize, y: usize, z: usize) -> f32 {
        self.cells[self.index(x, y, z)] as f32
    }

    #[inline]
    pub fn is_occupied(&self, x: usize, y: usize, z: usize) -> bool {
        self.cells[self.index(x, y, z)] != 0
    }

    pub fn set(&mut self, x: usize, y: usize, z: usize, occupied: bool) {
        let i = self.index(x, y, z);
        self.cells[i] = occupied as u8;
    }

    /// Number of occupied cells
    pub fn occupied_count(&self) -> usize {
        self.cells.iter().filter(|&&c| c != 0).count()
    }

    /// Coordinates of all occupied cells in storage order
    pub fn occupied_cells(&self) -> impl Iterator<Item = [usize; 3]> + '_ {
        let [_, h, d] = self.dims;
        self.cells
            .iter()
            .enumerate()
            .filter(|(_, c)| **c != 0)
            .map(move |(i, _)| [i / (h * d), (i / d) % h, i % d])
    }

    /// Occupancy as `f32` values in storage order
    pub fn to_values(&self) -> Vec<f32> {
        self.cells.iter().map(|&c| c as f32).collect()
    }
}

/// Grids of identical shape stacked into one `[n, W, H, D, 1]` tensor
#[derive(Clone, Debug, PartialEq)]
pub struct VoxelBatch {
    count: usize,
    dims: [usize; 3],
    data: Vec<f32>,
}

impl VoxelBatch {
    /// Stack grids in order. All grids must share the same dims.
    pub fn stack(grids: &[VoxelGrid]) -> Result<Self> {
        let dims = match grids.first() {
            Some(g) => g.dims(),
            None => return Err(Error::InvalidShape("cannot stack zero grids".into())),
        };

        let mut data = Vec::with_capacity(grids.len() * dims[0] * dims[1] * dims[2]);
        for grid in grids {
            if grid.dims() != dims {
                return Err(Error::InvalidShape(format!(
                    "grid dims {:?} differ from batch dims {:?}",
                    grid.dims(), dims
                )));
            }
            data.extend(grid.cells().iter().map(|&c| c as f32));
        }

        Ok(Self { count: grids.len(), dims, data })
    }

    /// Tensor shape `[n, W, H, D, 1]`
    pub fn shape(&self) -> [usize; 5] {
        [self.count, self.dims[0], self.dims[1], self.dims[2], 1]
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn grid_dims(&self) -> [usize; 3] {
        self.dims
    }

    /// Flat tensor data
    pub fn data(&self) -> &[f32] {
        &self.data
    }

    /// Values of the `i`-th grid
    pub fn grid(&self, i: usize) -> Option<&[f32]> {
        if i >= self.count {
            return None;
        }
        let n = self.dims[0] * self.dims[1] * self.dims[2];
        Some(&self.data[i * n..(i + 1) * n])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_layout() {
        let grid = VoxelGrid::new([2, 3, 4]);
        assert_eq!(grid.index(0, 0, 1), 1);
        assert_eq!(grid.index(0, 1, 0), 4);
        assert_eq!(grid.index(1, 0, 0), 12);
        assert_eq!(grid.len(), 24);
    }

    #[test]
    fn test_set_and_occupied_cells() {
        let mut grid = VoxelGrid::new([3, 3, 3]);
        grid.set(1, 2, 0, true);
        grid.set(2, 0, 1, true);

        assert_eq!(grid.occupied_count(), 2);
        assert_eq!(grid.get(1, 2, 0), 1.0);
        assert_eq!(grid.get(0, 0, 0), 0.0);
        let cells: Vec<_> = grid.occupied_cells().collect();
        assert_eq!(cells, vec![[1, 2, 0], [2, 0, 1]]);
    }

    #[test]
    fn test_from_cells_binarizes() {
        let grid = VoxelGrid::from_cells([1, 1, 3], vec![0, 7, 255]).unwrap();
        assert_eq!(grid.cells(), &[0, 1, 1]);
    }

    #[test]
    fn test_from_cells_wrong_length() {
        let result = VoxelGrid::from_cells([2, 2, 2], vec![0; 7]);
        assert!(matches!(result, Err(Error::InvalidShape(_))));
    }

    #[test]
    fn test_from_values_binarizes() {
        let grid = VoxelGrid::from_values([1, 1, 4], &[0.0, 0.25, -0.5, 1.0]).unwrap();
        assert_eq!(grid.to_values(), vec![0.0, 1.0, 1.0, 1.0]);
    }

    #[test]
    fn test_stack_shape() {
        let mut a = VoxelGrid::new([2, 2, 2]);
        a.set(0, 0, 0, true);
        let b = VoxelGrid::new([2, 2, 2]);

        let batch = VoxelBatch::stack(&[a, b]).unwrap();
        assert_eq!(batch.shape(), [2, 2, 2, 2, 1]);
        assert_eq!(batch.data().len(), 16);
        assert_eq!(batch.grid(0).unwrap()[0], 1.0);
        assert!(batch.grid(1).unwrap().iter().all(|&v| v == 0.0));
        assert!(batch.grid(2).is_none());
    }

    #[test]
    fn test_stack_mismatched_dims() {
        let a = VoxelGrid::new([2, 2, 2]);
        let b = VoxelGrid::new([2, 2, 3]);
        assert!(matches!(VoxelBatch::stack(&[a, b]), Err(Error::InvalidShape(_))));
    }
}
