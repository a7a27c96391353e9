//! regrid - compute and apply regridding weights for a job file
//!
//! This is the main entry point for the regrid command-line tool.

use std::time::Instant;
use tracing::{error, info, warn};

use regridder::loader::{load_job, source_field};
use regridder::logging::{init_tracing, log_operation_end, log_operation_start};
use regridder::{Config, Field, RegridError, RegridManager, Result, WeightFile};

fn main() -> Result<()> {
    // Load configuration
    let (config, job_path) = Config::load().map_err(|e| {
        eprintln!("Configuration error: {}", e);
        e
    })?;

    init_tracing(&config.log_level);

    info!("Starting regrid v{}", env!("CARGO_PKG_VERSION"));

    // Validate configuration
    config.validate().map_err(|e| {
        error!("Invalid configuration: {}", e);
        e
    })?;

    if let Some(workers) = config.runtime.workers {
        rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .build_global()
            .map_err(|e| RegridError::Config {
                message: format!("Failed to build worker pool: {}", e),
            })?;
        info!(workers = workers, "Worker pool configured");
    }

    info!("Loading job file: {:?}", job_path);
    let job = load_job(&job_path).map_err(|e| {
        error!("Failed to load job file: {}", e);
        e
    })?;

    let src_disc = job.source.build()?;
    let dst_disc = job.destination.build()?;
    let src = source_field(&job, src_disc)?;
    let mut dst = Field::new("destination", dst_disc, job.destination.location);
    info!(src = %src.signature(), dst = %dst.signature(), "Discretizations built");

    let options = config.regrid.to_options();
    let manager = RegridManager::new();

    let start = Instant::now();
    log_operation_start("regrid", Some(options.regrid_method.name()));
    let result = manager.store(&src, &dst, &options).and_then(|handle| {
        handle.apply(&src, &mut dst, config.regrid.zero_region)?;
        Ok(handle)
    });
    log_operation_end("regrid", start, result.is_ok());
    let handle = result?;

    let values = dst.as_slice();
    let finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if finite.is_empty() {
        warn!("Destination field holds no finite values");
    } else {
        let min = finite.iter().copied().fold(f64::INFINITY, f64::min);
        let max = finite.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let mean = finite.iter().sum::<f64>() / finite.len() as f64;
        info!(
            values = values.len(),
            min = min,
            max = max,
            mean = mean,
            "Destination field summary"
        );
    }

    if let Some(path) = &config.output.weights_path {
        if let Some(matrix) = handle.matrix() {
            let file = WeightFile::new(
                matrix.as_ref().clone(),
                options.regrid_method,
                options.norm_type,
            );
            regridder::write_weights(path, &file, config.output.format_for(path))?;
        }
    }

    handle.release();
    info!("Regrid finished");
    Ok(())
}
