//! Scanvox - scan decoding, voxel rasterization and dataset indexing

pub mod core;
pub mod math;
pub mod voxel;
pub mod scan;
pub mod dataset;
