//! Scanner point clouds: binary decoding and rasterization

pub mod record;
pub mod rasterize;

pub use record::{ScanRecord, POINT_CHANNELS, SCAN_FILE_EXTENSION};
pub use rasterize::{
    rasterize, Rasterization, RasterConfig, ScanVoxelizer, VoxelizedScan,
    DEFAULT_SCAN_SHAPE,
};
