//! Scan voxelizer binary — converts a directory of `.bnt` scans to binvox grids.
//!
//! Usage: cargo run --release --bin voxelize_scans -- [OPTIONS]
//!
//! Options:
//!   --input <DIR>     Directory searched recursively for .bnt files (default: "data/scans")
//!   --output <DIR>    Output directory (default: "data/voxels")
//!   --size <N>        Output grid edge length (default: 128)
//!   --config <FILE>   RasterConfig JSON; overrides --size
//!   --jobs <N>        Max parallel scans (default: 4)
//!
//! Output structure:
//!   <output>/
//!     manifest.json         # Per-scan header fields and skipped point counts
//!     <relative dir>/<stem>.binvox   # mirrors the layout under <input>
//!     ...

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

use rayon::prelude::*;
use serde_json::json;

use scanvox::dataset::{has_extension, load_json, mirrored_path};
use scanvox::scan::{RasterConfig, ScanVoxelizer, SCAN_FILE_EXTENSION};
use scanvox::voxel::{BinvoxCodec, VoxelCodec, BINVOX_EXTENSION};

fn main() {
    scanvox::core::logging::init();

    let args: Vec<String> = std::env::args().collect();
    let input = parse_str_arg(&args, "--input").unwrap_or_else(|| "data/scans".to_string());
    let output = parse_str_arg(&args, "--output").unwrap_or_else(|| "data/voxels".to_string());
    let size = parse_usize_arg(&args, "--size").unwrap_or(128);
    let jobs = parse_usize_arg(&args, "--jobs").unwrap_or(4);

    let config = match parse_str_arg(&args, "--config") {
        Some(path) => load_json::<RasterConfig>(Path::new(&path)).expect("Failed to load raster config"),
        None => RasterConfig {
            target_shape: Some([size; 3]),
            ..Default::default()
        },
    };

    config.bounds.checked_dims().expect("Unusable raster bounds");

    // Each raw scan grid is ~100 MB, so cap concurrent scans
    rayon::ThreadPoolBuilder::new()
        .num_threads(jobs)
        .build_global()
        .expect("Failed to configure thread pool");

    let input_dir = std::fs::canonicalize(&input).expect("Failed to resolve input directory");
    let output_dir = PathBuf::from(&output);

    println!("=== Scanvox Scan Voxelizer ===");
    println!("Input:  {}", input_dir.display());
    println!("Output: {}", output_dir.display());
    println!("Bounds: {:?}..{:?}", config.bounds.min, config.bounds.max);
    println!("Shape:  {:?}", config.target_shape.unwrap_or(config.bounds.dims()));
    println!("Jobs:   {} parallel", jobs);
    println!();

    let files = scanvox::dataset::walk_files(&input_dir, has_extension(SCAN_FILE_EXTENSION))
        .expect("Failed to list scan files");
    let total = files.len();
    println!("Scans: {}", total);

    std::fs::create_dir_all(&output_dir).expect("Failed to create output directory");

    let voxelizer = ScanVoxelizer::new(config);
    let codec = BinvoxCodec::default();
    let start = Instant::now();
    let done = AtomicUsize::new(0);
    let failed = AtomicUsize::new(0);

    let entries: Vec<serde_json::Value> = files
        .par_iter()
        .filter_map(|path| {
            let count = done.fetch_add(1, Ordering::Relaxed) + 1;
            if count % 100 == 0 || count == total {
                eprintln!("  [{}/{}] {:.1}s", count, total, start.elapsed().as_secs_f64());
            }

            let scan = match voxelizer.voxelize_file(path) {
                Ok(scan) => scan,
                Err(e) => {
                    log::error!("{}: {}", path.display(), e);
                    failed.fetch_add(1, Ordering::Relaxed);
                    return None;
                }
            };

            let saved = mirrored_path(path, &input_dir, &output_dir, BINVOX_EXTENSION)
                .and_then(|out_path| codec.save(&out_path, &scan.grid).map(|_| out_path));
            let out_path = match saved {
                Ok(out_path) => out_path,
                Err(e) => {
                    log::error!("{}: {}", path.display(), e);
                    failed.fetch_add(1, Ordering::Relaxed);
                    return None;
                }
            };

            Some(json!({
                "scan": path.to_string_lossy(),
                "grid": out_path.to_string_lossy(),
                "rows": scan.row_count,
                "cols": scan.col_count,
                "occupied": scan.grid.occupied_count(),
                "skipped_points": scan.skipped,
            }))
        })
        .collect();

    let skipped: u64 = entries.iter().filter_map(|e| e["skipped_points"].as_u64()).sum();
    let manifest = json!({
        "bounds": { "min": voxelizer.config().bounds.min.to_array(), "max": voxelizer.config().bounds.max.to_array() },
        "shape": voxelizer.config().target_shape,
        "scans": entries,
    });
    let manifest_path = output_dir.join("manifest.json");
    std::fs::write(&manifest_path, serde_json::to_string_pretty(&manifest).expect("Failed to serialize manifest"))
        .expect("Failed to write manifest");

    println!();
    println!("Voxelized {} of {} scans in {:.1}s ({} failed, {} points skipped)",
        entries.len(), total, start.elapsed().as_secs_f64(),
        failed.load(Ordering::Relaxed), skipped);
    println!("Manifest: {}", manifest_path.display());
}

fn parse_usize_arg(args: &[String], flag: &str) -> Option<usize> {
    args.iter().position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .and_then(|s| s.parse().ok())
}

fn parse_str_arg(args: &[String], flag: &str) -> Option<String> {
    args.iter().position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .cloned()
}
