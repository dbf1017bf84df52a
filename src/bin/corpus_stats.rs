//! Corpus statistics binary — loads a binvox corpus and reports batch shape and occupancy.
//!
//! Usage: cargo run --release --bin corpus_stats -- [OPTIONS]
//!
//! Options:
//!   --input <DIR>     Corpus root, searched recursively (default: "./data")
//!   --size <N>        Target grid edge length (default: 64)
//!   --config <FILE>   CorpusConfig JSON; overrides --size
//!   --raw             Keep native shapes (all grids must agree)

use std::path::{Path, PathBuf};

use scanvox::dataset::{load_json, CorpusConfig, VoxelCorpusLoader};

fn main() {
    scanvox::core::logging::init();

    let args: Vec<String> = std::env::args().collect();
    let input = parse_str_arg(&args, "--input").unwrap_or_else(|| "./data".to_string());
    let size = parse_usize_arg(&args, "--size").unwrap_or(64);
    let raw = args.iter().any(|a| a == "--raw");

    let config = match parse_str_arg(&args, "--config") {
        Some(path) => load_json::<CorpusConfig>(Path::new(&path)).expect("Failed to load corpus config"),
        None => CorpusConfig {
            target_shape: if raw { None } else { Some([size; 3]) },
            ..Default::default()
        },
    };

    let root = PathBuf::from(&input);
    let loader = VoxelCorpusLoader::new(config);

    let batch = match loader.load_all(&root) {
        Ok(batch) => batch,
        Err(e) => {
            log::error!("Failed to load corpus: {}", e);
            std::process::exit(1);
        }
    };

    let cells_per_grid = batch.grid_dims().iter().product::<usize>().max(1);
    let occupancy: Vec<f64> = (0..batch.len())
        .filter_map(|i| batch.grid(i))
        .map(|g| g.iter().filter(|&&v| v != 0.0).count() as f64 / cells_per_grid as f64)
        .collect();

    let mean = occupancy.iter().sum::<f64>() / occupancy.len().max(1) as f64;
    let min = occupancy.iter().copied().fold(f64::INFINITY, f64::min);
    let max = occupancy.iter().copied().fold(0.0, f64::max);

    println!("Shape:     {:?}", batch.shape());
    println!("Occupancy: mean {:.4}, min {:.4}, max {:.4}", mean, min, max);
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
