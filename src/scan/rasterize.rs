//! Point cloud rasterization into occupancy grids

use std::path::{Path, PathBuf};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::core::types::DVec3;
use crate::core::Result;
use crate::math::ScanBounds;
use crate::scan::record::{ScanRecord, POINT_CHANNELS};
use crate::voxel::grid::VoxelGrid;
use crate::voxel::resample::resample;

/// Default working resolution for rasterized scans
pub const DEFAULT_SCAN_SHAPE: [usize; 3] = [128, 128, 128];

/// Rasterized grid plus the number of points that fell outside the bounds
#[derive(Clone, Debug)]
pub struct Rasterization {
    pub grid: VoxelGrid,
    /// Points skipped for being out of bounds or non-finite
    pub skipped: usize,
}

/// Set one cell per in-bounds point.
///
/// Each position is rounded to the nearest integer and offset by the
/// bounds minimum. Auxiliary channels are ignored. Out-of-bounds and
/// non-finite points are counted in `skipped`, never fatal. Inverted or
/// oversized bounds fail with `InvalidShape` before anything is allocated.
pub fn rasterize(points: &[[f64; POINT_CHANNELS]], bounds: &ScanBounds) -> Result<Rasterization> {
    let mut grid = VoxelGrid::new(bounds.checked_dims()?);
    let mut skipped = 0;

    for p in points {
        let pos = DVec3::new(p[0], p[1], p[2]);
        match bounds.cell_of(pos) {
            Some([x, y, z]) => grid.set(x, y, z, true),
            None => {
                log::debug!("Skipping out-of-bounds point ({}, {}, {})", pos.x, pos.y, pos.z);
                skipped += 1;
            }
        }
    }

    if skipped > 0 {
        log::warn!("Skipped {} of {} points outside bounds {:?}..{:?}",
            skipped, points.len(), bounds.min, bounds.max);
    }

    Ok(Rasterization { grid, skipped })
}

/// Configuration for scan voxelization
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RasterConfig {
    /// Physical capture volume
    pub bounds: ScanBounds,
    /// Output shape; `None` keeps the native bounds resolution
    pub target_shape: Option<[usize; 3]>,
}

impl Default for RasterConfig {
    fn default() -> Self {
        Self {
            bounds: ScanBounds::default(),
            target_shape: Some(DEFAULT_SCAN_SHAPE),
        }
    }
}

/// Voxelized scan file with its header fields
#[derive(Clone, Debug)]
pub struct VoxelizedScan {
    pub grid: VoxelGrid,
    pub skipped: usize,
    pub row_count: i16,
    pub col_count: i16,
    pub image_blob: Vec<u8>,
}

/// Scan-to-grid pipeline: rasterize, then resample to the working resolution
#[derive(Clone, Debug, Default)]
pub struct ScanVoxelizer {
    config: RasterConfig,
}

impl ScanVoxelizer {
    pub fn new(config: RasterConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RasterConfig {
        &self.config
    }

    /// Rasterize a decoded record and resample when the target shape differs
    pub fn voxelize(&self, record: &ScanRecord) -> Result<Rasterization> {
        let Rasterization { grid, skipped } = rasterize(&record.points, &self.config.bounds)?;

        let grid = match self.config.target_shape {
            Some(shape) if shape != grid.dims() => resample(&grid, shape)?,
            _ => grid,
        };

        Ok(Rasterization { grid, skipped })
    }

    /// Decode and voxelize a scan file
    pub fn voxelize_file(&self, path: &Path) -> Result<VoxelizedScan> {
        let record = ScanRecord::load(path)?;
        let Rasterization { grid, skipped } = self.voxelize(&record)?;

        log::debug!("Voxelized {} ({} points, {} skipped)",
            path.display(), record.point_count(), skipped);

        Ok(VoxelizedScan {
            grid,
            skipped,
            row_count: record.row_count,
            col_count: record.col_count,
            image_blob: record.image_blob,
        })
    }

    /// Voxelize many scan files in parallel, results in input order
    pub fn voxelize_files(&self, paths: &[PathBuf]) -> Vec<Result<VoxelizedScan>> {
        paths.par_iter().map(|p| self.voxelize_file(p)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::IVec3;
    use crate::core::Error;
    use tempfile::TempDir;

    fn point(x: f64, y: f64, z: f64) -> [f64; POINT_CHANNELS] {
        [x, y, z, 0.0, 0.0]
    }

    #[test]
    fn test_origin_lands_in_center_cell() {
        let result = rasterize(&[point(0.0, 0.0, 0.0)], &ScanBounds::default()).unwrap();

        assert_eq!(result.grid.dims(), [401, 401, 601]);
        assert_eq!(result.skipped, 0);
        assert_eq!(result.grid.occupied_count(), 1);
        assert!(result.grid.is_occupied(200, 200, 300));
    }

    #[test]
    fn test_one_cell_per_inside_point() {
        let points = [
            point(-200.0, -200.0, -300.0),
            point(200.0, 200.0, 300.0),
            point(10.2, -15.7, 42.0),
        ];
        let result = rasterize(&points, &ScanBounds::default()).unwrap();

        assert_eq!(result.skipped, 0);
        let cells: Vec<_> = result.grid.occupied_cells().collect();
        assert_eq!(cells, vec![[0, 0, 0], [210, 184, 342], [400, 400, 600]]);
    }

    #[test]
    fn test_outside_points_skipped() {
        let points = [
            point(0.0, 0.0, 0.0),
            point(250.0, 0.0, 0.0),
            point(0.0, -201.0, 0.0),
            point(0.0, 0.0, 301.0),
            point(f64::NAN, 0.0, 0.0),
        ];
        let result = rasterize(&points, &ScanBounds::default()).unwrap();

        assert_eq!(result.skipped, 4);
        assert_eq!(result.grid.occupied_count(), 1);
    }

    #[test]
    fn test_auxiliary_channels_ignored() {
        let bounds = ScanBounds::new(IVec3::ZERO, IVec3::splat(3));
        let result = rasterize(&[[1.0, 1.0, 1.0, 999.0, -999.0]], &bounds).unwrap();
        assert_eq!(result.skipped, 0);
        assert!(result.grid.is_occupied(1, 1, 1));
    }

    #[test]
    fn test_duplicate_points_share_a_cell() {
        let bounds = ScanBounds::new(IVec3::ZERO, IVec3::splat(3));
        let result = rasterize(&[point(2.0, 2.0, 2.0), point(2.2, 1.9, 2.4)], &bounds).unwrap();
        assert_eq!(result.grid.occupied_count(), 1);
    }

    #[test]
    fn test_unusable_bounds_rejected() {
        let huge = ScanBounds::new(IVec3::splat(i32::MIN), IVec3::splat(i32::MAX));
        assert!(matches!(rasterize(&[point(0.0, 0.0, 0.0)], &huge), Err(Error::InvalidShape(_))));

        let inverted = ScanBounds::new(IVec3::splat(4), IVec3::ZERO);
        assert!(matches!(rasterize(&[], &inverted), Err(Error::InvalidShape(_))));
    }

    #[test]
    fn test_voxelize_rejects_config_bounds() {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let path = temp_dir.path().join("raster.json");
        std::fs::write(
            &path,
            r#"{ "bounds": { "min": [-2147483648, 0, 0], "max": [2147483647, 10, 10] } }"#,
        )
        .unwrap();

        let config: RasterConfig = crate::dataset::load_json(&path).expect("load failed");
        let record = ScanRecord {
            row_count: 1,
            col_count: 1,
            z_min: 0.0,
            image_blob: vec![],
            points: vec![point(0.0, 0.0, 0.0)],
        };
        let result = ScanVoxelizer::new(config).voxelize(&record);
        assert!(matches!(result, Err(Error::InvalidShape(_))));
    }

    #[test]
    fn test_voxelize_resamples_to_target() {
        let record = ScanRecord {
            row_count: 1,
            col_count: 1,
            z_min: 0.0,
            image_blob: vec![],
            points: vec![point(0.0, 0.0, 0.0), point(500.0, 0.0, 0.0)],
        };
        let voxelizer = ScanVoxelizer::new(RasterConfig {
            bounds: ScanBounds::new(IVec3::ZERO, IVec3::splat(7)),
            target_shape: Some([4, 4, 4]),
        });

        let result = voxelizer.voxelize(&record).unwrap();
        assert_eq!(result.skipped, 1);
        assert_eq!(result.grid.dims(), [4, 4, 4]);
        assert_eq!(result.grid.occupied_count(), 1);
        assert!(result.grid.is_occupied(0, 0, 0));
    }

    #[test]
    fn test_voxelize_native_shape() {
        let record = ScanRecord {
            row_count: 1,
            col_count: 1,
            z_min: 0.0,
            image_blob: vec![],
            points: vec![point(3.0, 1.0, 2.0)],
        };
        let voxelizer = ScanVoxelizer::new(RasterConfig {
            bounds: ScanBounds::new(IVec3::ZERO, IVec3::new(3, 3, 5)),
            target_shape: None,
        });

        let result = voxelizer.voxelize(&record).unwrap();
        assert_eq!(result.grid.dims(), [4, 4, 6]);
        assert!(result.grid.is_occupied(3, 1, 2));
    }

    #[test]
    fn test_voxelize_files_keeps_order_and_errors() {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let good = temp_dir.path().join("good.bnt");
        let bad = temp_dir.path().join("bad.bnt");

        let record = ScanRecord {
            row_count: 3,
            col_count: 4,
            z_min: -1.0,
            image_blob: b"img".to_vec(),
            points: vec![point(1.0, 1.0, 1.0)],
        };
        record.save(&good).expect("save failed");
        std::fs::write(&bad, [1u8, 2, 3]).expect("write failed");

        let voxelizer = ScanVoxelizer::new(RasterConfig {
            bounds: ScanBounds::new(IVec3::ZERO, IVec3::splat(3)),
            target_shape: None,
        });
        let results = voxelizer.voxelize_files(&[good, bad]);

        assert_eq!(results.len(), 2);
        let scan = results[0].as_ref().expect("good scan failed");
        assert_eq!(scan.row_count, 3);
        assert_eq!(scan.col_count, 4);
        assert_eq!(scan.image_blob, b"img");
        assert!(scan.grid.is_occupied(1, 1, 1));
        assert!(matches!(results[1], Err(Error::MalformedScanFormat(_))));
    }
}
