//! Voxel file codec seam and the binvox implementation
//!
//! binvox layout:
//! ```text
//! #binvox 1
//! dim d0 d1 d2
//! translate tx ty tz
//! scale s
//! data
//! <(value: u8, count: u8) pairs>
//! ```
//! Runs are stored in x-z-y order (y varies fastest).

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Read, Write};
use std::path::Path;

use crate::core::{Error, Result};
use crate::voxel::grid::{AxisOrder, Provenance, VoxelGrid};

/// File extension for binvox files
pub const BINVOX_EXTENSION: &str = "binvox";

/// Decoder/encoder for an on-disk voxel container
pub trait VoxelCodec: Send + Sync {
    /// File extension handled by this codec, without the dot
    fn extension(&self) -> &str;

    /// Decode one grid, including its provenance
    fn decode(&self, reader: &mut dyn BufRead) -> Result<VoxelGrid>;

    /// Encode one grid. Grids without provenance are written with identity placement.
    fn encode(&self, writer: &mut dyn Write, grid: &VoxelGrid) -> Result<()>;

    /// Load a grid from file
    fn load(&self, path: &Path) -> Result<VoxelGrid> {
        let mut reader = BufReader::new(File::open(path)?);
        self.decode(&mut reader)
    }

    /// Save a grid to file, creating parent directories as needed
    fn save(&self, path: &Path, grid: &VoxelGrid) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut writer = BufWriter::new(File::create(path)?);
        self.encode(&mut writer, grid)?;
        writer.flush()?;
        Ok(())
    }
}

/// binvox v1 codec
#[derive(Clone, Copy, Debug)]
pub struct BinvoxCodec {
    /// Transpose stored x-z-y data to x-y-z on decode
    pub fix_coords: bool,
}

impl Default for BinvoxCodec {
    fn default() -> Self {
        Self { fix_coords: true }
    }
}

impl BinvoxCodec {
    pub fn new(fix_coords: bool) -> Self {
        Self { fix_coords }
    }
}

fn codec_err(msg: impl Into<String>) -> Error {
    Error::Codec(msg.into())
}

fn read_header_line(reader: &mut dyn BufRead) -> Result<String> {
    let mut line = String::new();
    if reader.read_line(&mut line)? == 0 {
        return Err(codec_err("unexpected end of header"));
    }
    Ok(line.trim().to_string())
}

fn parse_fields<T: std::str::FromStr>(line: &str, key: &str, count: usize) -> Result<Vec<T>> {
    let mut parts = line.split_whitespace();
    if parts.next() != Some(key) {
        return Err(codec_err(format!("expected '{}' line, got '{}'", key, line)));
    }
    let values: Vec<T> = parts
        .map(|p| p.parse::<T>().map_err(|_| codec_err(format!("bad value '{}' in '{}'", p, line))))
        .collect::<Result<_>>()?;
    if values.len() != count {
        return Err(codec_err(format!("'{}' line needs {} values, got {}", key, count, values.len())));
    }
    Ok(values)
}

/// Map between xyz grid dims and stored xzy dims (the swap is its own inverse)
fn swap_yz(dims: [usize; 3]) -> [usize; 3] {
    [dims[0], dims[2], dims[1]]
}

/// Reorder cells between x-y-z and x-z-y storage. `dims` are the source dims.
fn transpose_yz(cells: &[u8], dims: [usize; 3]) -> Vec<u8> {
    let [w, h, d] = dims;
    let mut out = vec![0u8; cells.len()];
    for x in 0..w {
        for y in 0..h {
            for z in 0..d {
                out[(x * d + z) * h + y] = cells[(x * h + y) * d + z];
            }
        }
    }
    out
}

impl VoxelCodec for BinvoxCodec {
    fn extension(&self) -> &str {
        BINVOX_EXTENSION
    }

    fn decode(&self, reader: &mut dyn BufRead) -> Result<VoxelGrid> {
        let magic = read_header_line(reader)?;
        if !magic.starts_with("#binvox") {
            return Err(codec_err(format!("not a binvox file (header '{}')", magic)));
        }

        let dims: Vec<usize> = parse_fields(&read_header_line(reader)?, "dim", 3)?;
        let translate: Vec<f64> = parse_fields(&read_header_line(reader)?, "translate", 3)?;
        let scale: Vec<f64> = parse_fields(&read_header_line(reader)?, "scale", 1)?;
        let data = read_header_line(reader)?;
        if data != "data" {
            return Err(codec_err(format!("expected 'data' line, got '{}'", data)));
        }

        let stored_dims = [dims[0], dims[1], dims[2]];
        let total = stored_dims
            .iter()
            .try_fold(1usize, |acc, &d| acc.checked_mul(d))
            .ok_or_else(|| codec_err(format!("dims {:?} overflow", stored_dims)))?;

        let mut raw = Vec::new();
        reader.read_to_end(&mut raw)?;
        if raw.len() % 2 != 0 {
            return Err(codec_err("run data has an odd number of bytes"));
        }

        // Each run covers at most 255 voxels
        let coverable = raw.len() / 2 * u8::MAX as usize;
        if coverable < total {
            return Err(codec_err(format!(
                "{} bytes of run data cannot cover {} voxels",
                raw.len(), total
            )));
        }

        let mut cells = Vec::with_capacity(total);
        for pair in raw.chunks_exact(2) {
            let (value, count) = (pair[0], pair[1] as usize);
            if cells.len() + count > total {
                return Err(codec_err(format!("run data exceeds {} voxels", total)));
            }
            cells.resize(cells.len() + count, (value != 0) as u8);
        }
        if cells.len() != total {
            return Err(codec_err(format!("run data covers {} of {} voxels", cells.len(), total)));
        }

        let (dims, cells, axis_order) = if self.fix_coords {
            (swap_yz(stored_dims), transpose_yz(&cells, stored_dims), AxisOrder::Xyz)
        } else {
            (stored_dims, cells, AxisOrder::Xzy)
        };

        let provenance = Provenance {
            translate: [translate[0], translate[1], translate[2]],
            scale: scale[0],
            axis_order,
        };
        Ok(VoxelGrid::from_cells(dims, cells)?.with_provenance(provenance))
    }

    fn encode(&self, writer: &mut dyn Write, grid: &VoxelGrid) -> Result<()> {
        let provenance = grid.provenance().copied().unwrap_or_default();

        let (stored_dims, stored) = match provenance.axis_order {
            AxisOrder::Xzy => (grid.dims(), grid.cells().to_vec()),
            AxisOrder::Xyz => (swap_yz(grid.dims()), transpose_yz(grid.cells(), grid.dims())),
        };

        writeln!(writer, "#binvox 1")?;
        writeln!(writer, "dim {} {} {}", stored_dims[0], stored_dims[1], stored_dims[2])?;
        let t = provenance.translate;
        writeln!(writer, "translate {} {} {}", t[0], t[1], t[2])?;
        writeln!(writer, "scale {}", provenance.scale)?;
        writeln!(writer, "data")?;

        let mut runs = Vec::new();
        let mut iter = stored.iter().copied();
        if let Some(first) = iter.next() {
            let (mut value, mut count) = (first, 1u8);
            for v in iter {
                if v == value && count < u8::MAX {
                    count += 1;
                } else {
                    runs.extend_from_slice(&[value, count]);
                    value = v;
                    count = 1;
                }
            }
            runs.extend_from_slice(&[value, count]);
        }
        writer.write_all(&runs)?;
        Ok(())
    }
}
