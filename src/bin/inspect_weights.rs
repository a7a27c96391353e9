use anyhow::{Context, Result};
use std::path::PathBuf;

use regridder::weights_io::{read_weights, WeightFormat};

fn main() -> Result<()> {
    let path: PathBuf = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .context("usage: inspect_weights <weights.arrow|weights.json>")?;
    let format = WeightFormat::from_path(&path);

    println!("Inspecting weight file: {} ({})", path.display(), format);

    let file = read_weights(&path, format)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let meta = &file.meta;
    let matrix = &file.matrix;

    println!("\n=== HEADER ===");
    println!("  method     = {}", meta.method);
    println!("  norm_type  = {}", meta.norm_type);
    println!("  created_at = {}", meta.created_at.to_rfc3339());
    println!("  n_src      = {}", meta.n_src);
    println!("  n_dst      = {}", meta.n_dst);

    println!("\n=== ENTRIES ===");
    println!("  nnz = {}", matrix.nnz());
    if matrix.is_empty() {
        return Ok(());
    }

    let weights: Vec<f64> = matrix.entries().iter().map(|e| e.weight).collect();
    let min = weights.iter().copied().fold(f64::INFINITY, f64::min);
    let max = weights.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    println!("  weight range = [{:.6e}, {:.6e}]", min, max);

    let row_sums = matrix.row_sums();
    let mapped: Vec<f64> = (0..matrix.n_dst())
        .filter(|&d| matrix.has_row(d))
        .map(|d| row_sums[d])
        .collect();
    let row_min = mapped.iter().copied().fold(f64::INFINITY, f64::min);
    let row_max = mapped.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    println!(
        "  mapped rows  = {} of {} (row sums in [{:.12}, {:.12}])",
        mapped.len(),
        matrix.n_dst(),
        row_min,
        row_max
    );

    let max_row = (0..matrix.n_dst())
        .map(|d| matrix.row(d).len())
        .max()
        .unwrap_or(0);
    println!("  widest row   = {} entries", max_row);

    println!("\nFirst entries (1-based ids):");
    for entry in matrix.entries().iter().take(10) {
        println!(
            "  row {:>8}  col {:>8}  S = {:.12}",
            entry.dst + 1,
            entry.src + 1,
            entry.weight
        );
    }

    Ok(())
}
