//! Face-pose image dataset with filename-encoded labels
//!
//! Image basenames follow `identity_session_recording_pose_illumination`,
//! e.g. `001_01_01_051_00.png`. Only images taken by a permitted camera are
//! indexed; each permitted camera id maps to a dense pose index.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use image::GrayImage;
use rayon::prelude::*;

use crate::core::{Error, Result};
use crate::dataset::config::{PoseDatasetConfig, DEFAULT_CAMERA_IDS};
use crate::dataset::file_index::{has_extension, FileIndexCache};

/// Number of `_`-separated fields in a basename
const FILENAME_FIELDS: usize = 5;

/// Fields parsed from an image basename
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PoseFilename {
    pub identity: u32,
    pub session: u32,
    pub recording: u32,
    /// Raw camera id
    pub pose: u32,
    pub illumination: u32,
}

impl PoseFilename {
    /// Parse the basename (extension stripped) of `path`
    pub fn parse(path: &Path) -> Result<Self> {
        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(|| Error::InvalidFilenameSchema(path.display().to_string()))?;
        Self::parse_stem(stem)
    }

    /// Parse `identity_session_recording_pose_illumination`
    pub fn parse_stem(stem: &str) -> Result<Self> {
        let fields: Vec<&str> = stem.split('_').collect();
        if fields.len() != FILENAME_FIELDS {
            return Err(Error::InvalidFilenameSchema(format!(
                "'{}' has {} fields, expected {}",
                stem, fields.len(), FILENAME_FIELDS
            )));
        }

        let mut values = [0u32; FILENAME_FIELDS];
        for (value, field) in values.iter_mut().zip(&fields) {
            *value = field.parse().map_err(|_| {
                Error::InvalidFilenameSchema(format!("'{}' has non-numeric field '{}'", stem, field))
            })?;
        }

        let [identity, session, recording, pose, illumination] = values;
        Ok(Self { identity, session, recording, pose, illumination })
    }
}

/// Labels attached to a sample
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PoseLabels {
    pub identity: u32,
    /// Dense index of the camera in the permitted list
    pub pose: usize,
    pub illumination: u32,
}

/// Grayscale image with its labels
#[derive(Clone, Debug)]
pub struct PoseSample {
    pub image: GrayImage,
    pub labels: PoseLabels,
}

/// Transform applied to each image after loading
pub type ImageTransform = Box<dyn Fn(GrayImage) -> GrayImage + Send + Sync>;

/// Random-access index over labeled pose images
pub struct PoseLabeledSampleIndex {
    paths: Vec<PathBuf>,
    camera_map: HashMap<u32, usize>,
    transform: Option<ImageTransform>,
}

impl std::fmt::Debug for PoseLabeledSampleIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PoseLabeledSampleIndex")
            .field("len", &self.paths.len())
            .field("camera_map", &self.camera_map)
            .field("transform", &self.transform.as_ref().map(|_| "<fn>"))
            .finish()
    }
}

impl PoseLabeledSampleIndex {
    /// Index `paths`, keeping only images whose camera id is in `camera_ids`.
    ///
    /// The position of an id in `camera_ids` is its pose index. Repeated ids
    /// keep their first position. Names that do not parse are dropped.
    pub fn new(paths: Vec<PathBuf>, camera_ids: &[u32]) -> Self {
        let mut camera_map = HashMap::with_capacity(camera_ids.len());
        for &cam in camera_ids {
            let next = camera_map.len();
            camera_map.entry(cam).or_insert(next);
        }

        let total = paths.len();
        let mut malformed = 0;
        let paths: Vec<PathBuf> = paths
            .into_iter()
            .filter(|p| match PoseFilename::parse(p) {
                Ok(name) => camera_map.contains_key(&name.pose),
                Err(_) => {
                    malformed += 1;
                    false
                }
            })
            .collect();

        if malformed > 0 {
            log::debug!("Dropped {} paths with malformed names", malformed);
        }
        log::info!("Indexed {} of {} images from {} cameras", paths.len(), total, camera_map.len());

        Self { paths, camera_map, transform: None }
    }

    /// Index `paths` with the default nine-camera set
    pub fn with_default_cameras(paths: Vec<PathBuf>) -> Self {
        Self::new(paths, &DEFAULT_CAMERA_IDS)
    }

    /// Build from the dataset directory named by `config`, listing files through `cache`
    pub fn open(config: &PoseDatasetConfig, cache: &FileIndexCache) -> Result<Self> {
        let paths = cache.list_or_load(
            &config.data_dir(),
            &config.cache_key,
            has_extension(&config.extension),
        )?;
        Ok(Self::new(paths, &config.camera_ids))
    }

    /// Apply `transform` to every loaded image
    pub fn with_transform(
        mut self,
        transform: impl Fn(GrayImage) -> GrayImage + Send + Sync + 'static,
    ) -> Self {
        self.transform = Some(Box::new(transform));
        self
    }

    /// Number of indexed images
    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    /// Number of distinct pose classes
    pub fn pose_count(&self) -> usize {
        self.camera_map.len()
    }

    /// Dense pose index of a camera id
    pub fn pose_index(&self, camera_id: u32) -> Option<usize> {
        self.camera_map.get(&camera_id).copied()
    }

    fn path(&self, index: usize) -> Result<&Path> {
        self.paths
            .get(index)
            .map(PathBuf::as_path)
            .ok_or(Error::SampleOutOfRange { index, len: self.paths.len() })
    }

    /// Labels of sample `index` without opening the image
    pub fn labels(&self, index: usize) -> Result<PoseLabels> {
        let name = PoseFilename::parse(self.path(index)?)?;
        let pose = self.pose_index(name.pose).ok_or(Error::UnknownPoseId(name.pose))?;
        Ok(PoseLabels {
            identity: name.identity,
            pose,
            illumination: name.illumination,
        })
    }

    /// Load sample `index` as an 8-bit grayscale image with labels
    pub fn get(&self, index: usize) -> Result<PoseSample> {
        let labels = self.labels(index)?;
        let mut image = image::open(self.path(index)?)?.into_luma8();
        if let Some(transform) = &self.transform {
            image = transform(image);
        }
        Ok(PoseSample { image, labels })
    }

    /// Load several samples in parallel, in the order of `indices`
    pub fn load_batch(&self, indices: &[usize]) -> Result<Vec<PoseSample>> {
        indices.par_iter().map(|&i| self.get(i)).collect()
    }
}
