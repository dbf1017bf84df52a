//! Binary scan record decoding
//!
//! Layout (little-endian, no magic or version):
//! - `i16` row count
//! - `i16` column count
//! - `f64` z-min header value
//! - `i16` image blob length, followed by that many bytes
//! - `u32` float count, followed by that many `f64` values
//!
//! The float payload is a column-major `(5, N)` matrix: all x values, then
//! all y, all z, and the two auxiliary channels.

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;

use crate::core::types::DVec3;
use crate::core::{Error, Result};

/// File extension for scan files
pub const SCAN_FILE_EXTENSION: &str = "bnt";

/// Values per point: x, y, z and two auxiliary channels
pub const POINT_CHANNELS: usize = 5;

/// Decoded scan file
#[derive(Clone, Debug, PartialEq)]
pub struct ScanRecord {
    pub row_count: i16,
    pub col_count: i16,
    /// Header z-min, kept verbatim
    pub z_min: f64,
    /// Opaque embedded image bytes
    pub image_blob: Vec<u8>,
    /// Point rows `[x, y, z, aux0, aux1]`
    pub points: Vec<[f64; POINT_CHANNELS]>,
}

fn read_field<const N: usize>(reader: &mut impl Read, field: &str) -> Result<[u8; N]> {
    let mut buf = [0u8; N];
    reader.read_exact(&mut buf).map_err(|e| truncated(e, field))?;
    Ok(buf)
}

fn truncated(e: io::Error, field: &str) -> Error {
    if e.kind() == io::ErrorKind::UnexpectedEof {
        Error::MalformedScanFormat(format!("stream ends before {}", field))
    } else {
        Error::Io(e)
    }
}

impl ScanRecord {
    /// Decode a record from a byte stream.
    ///
    /// Bytes after the point payload are left unread.
    pub fn decode(reader: &mut impl Read) -> Result<Self> {
        let row_count = i16::from_le_bytes(read_field(reader, "row count")?);
        let col_count = i16::from_le_bytes(read_field(reader, "column count")?);
        let z_min = f64::from_le_bytes(read_field(reader, "z-min header")?);

        let blob_len = i16::from_le_bytes(read_field(reader, "image blob length")?);
        if blob_len < 0 {
            return Err(Error::MalformedScanFormat(format!("negative image blob length {}", blob_len)));
        }
        let mut image_blob = vec![0u8; blob_len as usize];
        reader.read_exact(&mut image_blob).map_err(|e| truncated(e, "end of image blob"))?;

        let float_count = u32::from_le_bytes(read_field(reader, "float count")?) as usize;
        if float_count % POINT_CHANNELS != 0 {
            return Err(Error::MalformedScanFormat(format!(
                "float count {} is not a multiple of {}",
                float_count, POINT_CHANNELS
            )));
        }

        // Read through `take` so a corrupt count cannot force a huge allocation up front
        let expected_bytes = float_count * 8;
        let mut payload = Vec::new();
        reader.by_ref().take(expected_bytes as u64).read_to_end(&mut payload)?;
        if payload.len() != expected_bytes {
            return Err(Error::MalformedScanFormat(format!(
                "point payload has {} of {} bytes",
                payload.len(), expected_bytes
            )));
        }

        let flat: Vec<f64> = payload
            .chunks_exact(8)
            .map(|b| f64::from_le_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]]))
            .collect();

        let n = float_count / POINT_CHANNELS;
        let points: Vec<[f64; POINT_CHANNELS]> = (0..n)
            .map(|i| std::array::from_fn(|c| flat[c * n + i]))
            .collect();

        Ok(Self { row_count, col_count, z_min, image_blob, points })
    }

    /// Decode from an in-memory buffer
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        Self::decode(&mut io::Cursor::new(data))
    }

    /// Load from file
    pub fn load(path: &Path) -> Result<Self> {
        let mut reader = BufReader::new(File::open(path)?);
        Self::decode(&mut reader)
    }

    /// Encode in the on-disk layout
    pub fn encode(&self, writer: &mut impl Write) -> Result<()> {
        let blob_len = i16::try_from(self.image_blob.len()).map_err(|_| {
            Error::MalformedScanFormat(format!("image blob of {} bytes exceeds i16 length", self.image_blob.len()))
        })?;
        let float_count = u32::try_from(self.points.len() * POINT_CHANNELS).map_err(|_| {
            Error::MalformedScanFormat(format!("{} points exceed u32 float count", self.points.len()))
        })?;

        writer.write_all(&self.row_count.to_le_bytes())?;
        writer.write_all(&self.col_count.to_le_bytes())?;
        writer.write_all(&self.z_min.to_le_bytes())?;
        writer.write_all(&blob_len.to_le_bytes())?;
        writer.write_all(&self.image_blob)?;
        writer.write_all(&float_count.to_le_bytes())?;
        for c in 0..POINT_CHANNELS {
            for p in &self.points {
                writer.write_all(&p[c].to_le_bytes())?;
            }
        }
        Ok(())
    }

    /// Encode to an in-memory buffer
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        self.encode(&mut out)?;
        Ok(out)
    }

    /// Save to file
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut writer = BufWriter::new(File::create(path)?);
        self.encode(&mut writer)?;
        writer.flush()?;
        Ok(())
    }

    pub fn point_count(&self) -> usize {
        self.points.len()
    }

    /// Point positions, auxiliary channels dropped
    pub fn positions(&self) -> impl Iterator<Item = DVec3> + '_ {
        self.points.iter().map(|p| DVec3::new(p[0], p[1], p[2]))
    }
}
