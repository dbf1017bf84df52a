//! Error types for scan decoding and dataset assembly

use std::path::PathBuf;

use thiserror::Error;

/// Main error type for the crate
#[derive(Debug, Error)]
pub enum Error {
    /// Scan stream is truncated or violates the binary layout
    #[error("Malformed scan format: {0}")]
    MalformedScanFormat(String),

    #[error("Dataset not found: {}", .0.display())]
    DatasetNotFound(PathBuf),

    /// Basename does not split into the five numeric pose fields
    #[error("Invalid filename schema: {0}")]
    InvalidFilenameSchema(String),

    #[error("Unknown pose id: {0}")]
    UnknownPoseId(u32),

    /// Decoded grids cannot be stacked into one batch
    #[error("Inconsistent grid rank in {}: expected {expected:?}, found {found:?}", .path.display())]
    InconsistentGridRank {
        expected: [usize; 3],
        found: [usize; 3],
        path: PathBuf,
    },

    #[error("No voxel files found under {}", .0.display())]
    EmptyCorpus(PathBuf),

    #[error("Sample {index} out of range (len {len})")]
    SampleOutOfRange { index: usize, len: usize },

    #[error("Invalid grid shape: {0}")]
    InvalidShape(String),

    #[error("Voxel codec error: {0}")]
    Codec(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
}
