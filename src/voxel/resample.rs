//! Occupancy-preserving grid resampling
//!
//! Grids are resized with trilinear interpolation and then re-binarized:
//! any cell that receives a nonzero intensity becomes occupied. Linear
//! sampling keeps thin structures that nearest-neighbour sampling drops,
//! and the binarization restores strict `{0, 1}` occupancy.

use rayon::prelude::*;

use crate::core::{Error, Result};
use crate::voxel::grid::VoxelGrid;

/// Source sample for one output index along a single axis
#[derive(Clone, Copy, Debug, PartialEq)]
struct AxisSample {
    lo: usize,
    hi: usize,
    /// Weight of `hi`; `lo` gets `1 - frac`
    frac: f64,
}

/// Align-corners mapping: output `0` hits source `0`, output `dst-1` hits source `src-1`
fn axis_samples(src: usize, dst: usize) -> Vec<AxisSample> {
    (0..dst)
        .map(|i| {
            if dst == 1 || src == 1 {
                return AxisSample { lo: 0, hi: 0, frac: 0.0 };
            }
            // Integer numerator keeps exact hits exact
            let coord = (i * (src - 1)) as f64 / (dst - 1) as f64;
            let lo = (coord.floor() as usize).min(src - 1);
            let hi = (lo + 1).min(src - 1);
            AxisSample { lo, hi, frac: coord - lo as f64 }
        })
        .collect()
}

fn check_dims(dims: [usize; 3], what: &str) -> Result<()> {
    if dims.contains(&0) {
        return Err(Error::InvalidShape(format!("{} dims {:?} contain a zero axis", what, dims)));
    }
    Ok(())
}

/// Resize `grid` to exactly `target` dims.
///
/// Each axis is scaled by `target / source` independently. The output
/// contains only `0.0` and `1.0`. Resampling to the grid's own shape
/// returns the same occupancy.
pub fn resample(grid: &VoxelGrid, target: [usize; 3]) -> Result<VoxelGrid> {
    let src = grid.dims();
    check_dims(src, "source")?;
    check_dims(target, "target")?;

    if src == target {
        return VoxelGrid::from_cells(target, grid.cells().to_vec());
    }

    let xs = axis_samples(src[0], target[0]);
    let ys = axis_samples(src[1], target[1]);
    let zs = axis_samples(src[2], target[2]);

    let plane = target[1] * target[2];
    let mut cells = vec![0u8; target[0] * plane];

    cells
        .par_chunks_mut(plane)
        .zip(xs.par_iter())
        .for_each(|(out_plane, sx)| {
            let mut i = 0;
            for sy in &ys {
                for sz in &zs {
                    let intensity = trilinear(grid, sx, sy, sz);
                    out_plane[i] = (intensity != 0.0) as u8;
                    i += 1;
                }
            }
        });

    log::debug!("Resampled grid {:?} -> {:?}", src, target);

    VoxelGrid::from_cells(target, cells)
}

/// Resize every axis by the same `ratio`, rounding each output dim.
///
/// Output dims are `round(source * ratio)`, at least 1 per axis.
pub fn resample_by_ratio(grid: &VoxelGrid, ratio: f64) -> Result<VoxelGrid> {
    if !ratio.is_finite() || ratio <= 0.0 {
        return Err(Error::InvalidShape(format!("resample ratio {} must be positive", ratio)));
    }
    let target = grid.dims().map(|d| ((d as f64 * ratio).round() as usize).max(1));
    resample(grid, target)
}

#[inline]
fn trilinear(grid: &VoxelGrid, sx: &AxisSample, sy: &AxisSample, sz: &AxisSample) -> f64 {
    let mut acc = 0.0;
    for (x, wx) in [(sx.lo, 1.0 - sx.frac), (sx.hi, sx.frac)] {
        if wx == 0.0 {
            continue;
        }
        for (y, wy) in [(sy.lo, 1.0 - sy.frac), (sy.hi, sy.frac)] {
            if wy == 0.0 {
                continue;
            }
            for (z, wz) in [(sz.lo, 1.0 - sz.frac), (sz.hi, sz.frac)] {
                if wz == 0.0 {
                    continue;
                }
                acc += wx * wy * wz * grid.get(x, y, z) as f64;
            }
        }
    }
    acc
}
