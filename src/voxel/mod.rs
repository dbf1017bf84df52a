//! Voxel grids, resampling and file codecs

pub mod grid;
pub mod resample;
pub mod binvox;

pub use grid::{AxisOrder, Provenance, VoxelBatch, VoxelGrid};
pub use resample::{resample, resample_by_ratio};
pub use binvox::{BinvoxCodec, VoxelCodec, BINVOX_EXTENSION};
