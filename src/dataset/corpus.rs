//! Voxel corpus assembly
//!
//! Every voxel file under a root directory is decoded independently,
//! resampled to the configured shape and stacked into one batch.

use std::path::{Path, PathBuf};
use std::time::Instant;

use rayon::prelude::*;

use crate::core::{Error, Result};
use crate::dataset::config::CorpusConfig;
use crate::dataset::file_index::{has_extension, walk_files};
use crate::voxel::binvox::{BinvoxCodec, VoxelCodec};
use crate::voxel::grid::{Provenance, VoxelBatch, VoxelGrid};
use crate::voxel::resample::resample;

/// Loads a directory tree of voxel files into a single batch
#[derive(Clone, Debug)]
pub struct VoxelCorpusLoader<C: VoxelCodec = BinvoxCodec> {
    config: CorpusConfig,
    codec: C,
}

impl VoxelCorpusLoader<BinvoxCodec> {
    /// Loader for binvox corpora
    pub fn new(config: CorpusConfig) -> Self {
        let codec = BinvoxCodec::new(config.fix_coords);
        Self { config, codec }
    }
}

impl Default for VoxelCorpusLoader<BinvoxCodec> {
    fn default() -> Self {
        Self::new(CorpusConfig::default())
    }
}

impl<C: VoxelCodec> VoxelCorpusLoader<C> {
    /// Loader with a custom codec
    pub fn with_codec(config: CorpusConfig, codec: C) -> Self {
        Self { config, codec }
    }

    pub fn config(&self) -> &CorpusConfig {
        &self.config
    }

    pub fn codec(&self) -> &C {
        &self.codec
    }

    /// Voxel files under `root`, in walk order
    pub fn discover(&self, root: &Path) -> Result<Vec<PathBuf>> {
        walk_files(root, has_extension(self.codec.extension()))
    }

    /// Decode one file and bring it to the target shape
    pub fn load_grid(&self, path: &Path) -> Result<VoxelGrid> {
        let grid = self.codec.load(path)?;
        match self.config.target_shape {
            Some(shape) if shape != grid.dims() => {
                log::debug!("Resampling {} from {:?} to {:?}", path.display(), grid.dims(), shape);
                resample(&grid, shape)
            }
            _ => Ok(grid),
        }
    }

    /// Decode every voxel file under `root` into a `[n, W, H, D, 1]` batch
    pub fn load_all(&self, root: &Path) -> Result<VoxelBatch> {
        let start = Instant::now();
        let files = self.discover(root)?;
        if files.is_empty() {
            return Err(Error::EmptyCorpus(root.to_path_buf()));
        }

        let grids: Vec<VoxelGrid> = files
            .par_iter()
            .map(|path| self.load_grid(path))
            .collect::<Result<_>>()?;

        let expected = grids[0].dims();
        if let Some((path, grid)) = files.iter().zip(&grids).find(|(_, g)| g.dims() != expected) {
            return Err(Error::InconsistentGridRank {
                expected,
                found: grid.dims(),
                path: path.clone(),
            });
        }

        let batch = VoxelBatch::stack(&grids)?;
        log::info!("Loaded {} grids from {} in {:.1}s, batch shape {:?}",
            batch.len(), root.display(), start.elapsed().as_secs_f64(), batch.shape());

        Ok(batch)
    }

    /// Write `grid` through the codec with identity placement
    pub fn save_grid(&self, path: &Path, grid: &VoxelGrid) -> Result<()> {
        let grid = grid.clone().with_provenance(Provenance::default());
        self.codec.save(path, &grid)
    }
}
