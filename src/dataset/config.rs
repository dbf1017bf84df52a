//! Dataset configuration

use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::core::{Error, Result};

/// Camera ids kept by default, in pose-index order
pub const DEFAULT_CAMERA_IDS: [u32; 9] = [200, 190, 41, 50, 51, 140, 130, 80, 90];

/// Configuration for the face-pose image dataset
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoseDatasetConfig {
    /// Dataset root directory
    pub root: PathBuf,
    /// Image directory relative to `root`
    pub data_subdir: PathBuf,
    /// File listing cache key
    pub cache_key: String,
    /// Permitted camera ids; list order defines the pose index
    pub camera_ids: Vec<u32>,
    /// Image file extension
    pub extension: String,
}

impl Default for PoseDatasetConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("data"),
            data_subdir: PathBuf::from("Multi-Pie").join("data"),
            cache_key: "multipie".to_string(),
            camera_ids: DEFAULT_CAMERA_IDS.to_vec(),
            extension: "png".to_string(),
        }
    }
}

impl PoseDatasetConfig {
    /// Directory that is walked for images
    pub fn data_dir(&self) -> PathBuf {
        self.root.join(&self.data_subdir)
    }
}

/// Configuration for voxel corpus assembly
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CorpusConfig {
    /// Shape every grid is resampled to; `None` requires uniform native shapes
    pub target_shape: Option<[usize; 3]>,
    /// Transpose binvox x-z-y storage to x-y-z
    pub fix_coords: bool,
}

impl Default for CorpusConfig {
    fn default() -> Self {
        Self {
            target_shape: Some([64, 64, 64]),
            fix_coords: true,
        }
    }
}

/// Load any config struct from a JSON file. Missing fields take their defaults.
pub fn load_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let text = std::fs::read_to_string(path)?;
    serde_json::from_str(&text)
        .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))
}
