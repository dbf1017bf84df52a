//! Dataset assembly: file listings, pose-labeled images and voxel corpora

pub mod config;
pub mod file_index;
pub mod pose;
pub mod corpus;

pub use config::{load_json, CorpusConfig, PoseDatasetConfig, DEFAULT_CAMERA_IDS};
pub use file_index::{has_extension, mirrored_path, walk_files, FileIndexCache};
pub use pose::{ImageTransform, PoseFilename, PoseLabeledSampleIndex, PoseLabels, PoseSample};
pub use corpus::VoxelCorpusLoader;
