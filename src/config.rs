//! Configuration management for the `regrid` tool.
//!
//! This module handles the layered configuration system with the following precedence:
//! 1. Command-line arguments (highest priority)
//! 2. Environment variables
//! 3. JSON config file
//! 4. Default values (lowest priority)

use clap::Parser;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{RegridError, Result};
use crate::options::{
    MaskSet, NormType, PoleMethod, RegridMethod, RegridOptions, UnmappedAction, ZeroRegion,
};
use crate::weights_io::WeightFormat;

/// Command-line arguments for regrid
#[derive(Parser, Debug)]
#[command(name = "regrid")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to the JSON job file describing source, destination and field
    pub job_file: PathBuf,

    /// Regrid method (bilinear, patch, conserve, nearest_stod, nearest_dtos)
    #[arg(short, long, env = "REGRID_METHOD")]
    pub method: Option<String>,

    /// Conservative normalization (dstarea, fracarea)
    #[arg(long, env = "REGRID_NORM_TYPE")]
    pub norm_type: Option<String>,

    /// Pole method (none, allavg, npntavg, teeth)
    #[arg(long, env = "REGRID_POLE_METHOD")]
    pub pole_method: Option<String>,

    /// Number of source points averaged per pole point (npntavg only)
    #[arg(long, env = "REGRID_POLE_NPOINTS")]
    pub pole_npoints: Option<usize>,

    /// Skip zero-area and self-intersecting cells instead of failing
    #[arg(long, env = "REGRID_IGNORE_DEGENERATE")]
    pub ignore_degenerate: bool,

    /// Unmapped destination action (error, ignore)
    #[arg(long, env = "REGRID_UNMAPPED_ACTION")]
    pub unmapped_action: Option<String>,

    /// Zero region used when applying weights (total, select, empty)
    #[arg(long, env = "REGRID_ZERO_REGION")]
    pub zero_region: Option<String>,

    /// Write the weight matrix to this path
    #[arg(short, long, env = "REGRID_OUTPUT_WEIGHTS")]
    pub output_weights: Option<PathBuf>,

    /// Weight file format (arrow, json); guessed from the extension if absent
    #[arg(long, env = "REGRID_WEIGHT_FORMAT")]
    pub weight_format: Option<String>,

    /// Number of worker threads
    #[arg(short, long, env = "REGRID_WORKERS")]
    pub workers: Option<usize>,

    /// Path to JSON configuration file
    #[arg(short, long, env = "REGRID_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "REGRID_LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

/// Thread pool configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Number of worker threads (None = number of CPU cores)
    #[serde(default)]
    pub workers: Option<usize>,
}

/// Regrid options as written in a config file.
///
/// Mask values may be written as floating-point numbers; they are truncated
/// toward zero when converted to integer mask codes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegridConfig {
    #[serde(default)]
    pub method: RegridMethod,

    #[serde(default)]
    pub src_mask_values: Option<Vec<f64>>,

    #[serde(default)]
    pub dst_mask_values: Option<Vec<f64>>,

    #[serde(default)]
    pub pole_method: Option<PoleMethod>,

    #[serde(default)]
    pub regrid_pole_npoints: Option<usize>,

    #[serde(default)]
    pub norm_type: NormType,

    #[serde(default)]
    pub unmapped_action: UnmappedAction,

    #[serde(default)]
    pub ignore_degenerate: bool,

    #[serde(default)]
    pub zero_region: ZeroRegion,
}

impl RegridConfig {
    /// Build the engine options
    pub fn to_options(&self) -> RegridOptions {
        RegridOptions {
            src_mask_values: self.src_mask_values.as_deref().map(MaskSet::from_floats),
            dst_mask_values: self.dst_mask_values.as_deref().map(MaskSet::from_floats),
            regrid_method: self.method,
            pole_method: self.pole_method,
            regrid_pole_npoints: self.regrid_pole_npoints,
            norm_type: self.norm_type,
            unmapped_action: self.unmapped_action,
            ignore_degenerate: self.ignore_degenerate,
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Where to write the weight matrix
    #[serde(default)]
    pub weights_path: Option<PathBuf>,

    /// Weight file format (None = guess from the extension)
    #[serde(default)]
    pub weight_format: Option<WeightFormat>,
}

impl OutputConfig {
    /// Effective format for `weights_path`
    pub fn format_for(&self, path: &Path) -> WeightFormat {
        self.weight_format
            .unwrap_or_else(|| WeightFormat::from_path(path))
    }
}

/// Complete configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Thread pool configuration
    #[serde(default)]
    pub runtime: RuntimeConfig,

    /// Regrid options
    #[serde(default)]
    pub regrid: RegridConfig,

    /// Output configuration
    #[serde(default)]
    pub output: OutputConfig,

    /// Log level
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn parse_arg<T: std::str::FromStr<Err = RegridError>>(value: &str, name: &str) -> Result<T> {
    value.parse().map_err(|e: RegridError| RegridError::Config {
        message: format!("Invalid --{}: {}", name, e),
    })
}

impl Config {
    /// Load configuration from all sources with proper precedence
    pub fn load() -> Result<(Self, PathBuf)> {
        Self::from_args(Args::parse())
    }

    /// Build configuration from parsed arguments
    pub fn from_args(args: Args) -> Result<(Self, PathBuf)> {
        // Start with defaults
        let mut config = Config::default();

        // Load from JSON file if provided
        if let Some(config_path) = &args.config {
            let json_config = Self::load_from_file(config_path)?;
            config.merge(json_config);
        }

        // Override with command-line arguments
        if let Some(method) = &args.method {
            config.regrid.method = parse_arg(method, "method")?;
        }
        if let Some(norm_type) = &args.norm_type {
            config.regrid.norm_type = parse_arg(norm_type, "norm-type")?;
        }
        if let Some(pole_method) = &args.pole_method {
            config.regrid.pole_method = Some(parse_arg(pole_method, "pole-method")?);
        }
        if args.pole_npoints.is_some() {
            config.regrid.regrid_pole_npoints = args.pole_npoints;
        }
        if args.ignore_degenerate {
            config.regrid.ignore_degenerate = true;
        }
        if let Some(action) = &args.unmapped_action {
            config.regrid.unmapped_action = parse_arg(action, "unmapped-action")?;
        }
        if let Some(zero_region) = &args.zero_region {
            config.regrid.zero_region = parse_arg(zero_region, "zero-region")?;
        }
        if args.output_weights.is_some() {
            config.output.weights_path = args.output_weights;
        }
        if let Some(format) = &args.weight_format {
            config.output.weight_format = Some(parse_arg(format, "weight-format")?);
        }
        if args.workers.is_some() {
            config.runtime.workers = args.workers;
        }
        config.log_level = args.log_level;

        Ok((config, args.job_file))
    }

    /// Load configuration from a JSON file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Merge another config into this one (other takes precedence)
    fn merge(&mut self, other: Config) {
        if other.runtime.workers.is_some() {
            self.runtime.workers = other.runtime.workers;
        }
        self.regrid = other.regrid;
        if other.output.weights_path.is_some() {
            self.output.weights_path = other.output.weights_path;
        }
        if other.output.weight_format.is_some() {
            self.output.weight_format = other.output.weight_format;
        }
        self.log_level = other.log_level;
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.runtime.workers == Some(0) {
            return Err(RegridError::Config {
                message: "Worker count cannot be 0".to_string(),
            });
        }

        // Validate log level
        match self.log_level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => {
                return Err(RegridError::Config {
                    message: format!(
                        "Invalid log level: {}. Must be one of: trace, debug, info, warn, error",
                        self.log_level
                    ),
                });
            }
        }

        self.regrid
            .to_options()
            .validate()
            .map_err(|e| RegridError::Config {
                message: e.to_string(),
            })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            runtime: RuntimeConfig::default(),
            regrid: RegridConfig::default(),
            output: OutputConfig::default(),
            log_level: default_log_level(),
        }
    }
}

impl Default for RegridConfig {
    fn default() -> Self {
        Self {
            method: RegridMethod::default(),
            src_mask_values: None,
            dst_mask_values: None,
            pole_method: None,
            regrid_pole_npoints: None,
            norm_type: NormType::default(),
            unmapped_action: UnmappedAction::default(),
            ignore_degenerate: false,
            zero_region: ZeroRegion::default(),
        }
    }
}

// Default value functions for serde
fn default_log_level() -> String {
    "info".to_string()
}
