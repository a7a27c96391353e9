//! Error types for the regridder crate.
//!
//! This module defines a single error enum covering the engine's failure
//! taxonomy (geometry, configuration, handle lifecycle) together with the
//! ambient failures of the surrounding tooling (I/O, JSON, weight files).

use std::fmt;

use thiserror::Error;

/// Which side of a regrid operation an error refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    /// The source discretization
    Source,
    /// The destination discretization
    Destination,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Source => write!(f, "source"),
            Side::Destination => write!(f, "destination"),
        }
    }
}

/// The main error type for regridder operations.
#[derive(Error, Debug)]
pub enum RegridError {
    /// Field shape or location does not match its discretization or the handle
    #[error("Incompatible discretization: {message}")]
    IncompatibleDiscretization { message: String },

    /// A cell has zero area, too few vertices or a self-intersecting boundary
    #[error("Degenerate geometry in {side} cell {cell}: {reason}")]
    DegenerateGeometry {
        side: Side,
        cell: usize,
        reason: String,
    },

    /// A destination location received no source contribution
    #[error("Unmapped destination cell {cell} ({count} unmapped in total)")]
    UnmappedDestination { cell: usize, count: usize },

    /// Conflicting or out-of-range regrid options
    #[error("Invalid configuration: {message}")]
    InvalidConfiguration { message: String },

    /// Operation attempted on a handle in the wrong lifecycle state
    #[error("Route handle {handle} is {state}: {message}")]
    HandleState {
        handle: String,
        state: String,
        message: String,
    },

    /// Application configuration errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Weight file content errors
    #[error("Weight file error: {message}")]
    WeightFile { message: String },

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Arrow encoding errors
    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow_schema::ArrowError),

    /// Array shape errors
    #[error("Shape error: {0}")]
    Shape(#[from] ndarray::ShapeError),

    /// NetCDF file operation errors
    #[cfg(feature = "netcdf")]
    #[error("NetCDF error: {0}")]
    NetCdf(#[from] netcdf::Error),
}

impl RegridError {
    pub(crate) fn incompatible(message: impl Into<String>) -> Self {
        RegridError::IncompatibleDiscretization {
            message: message.into(),
        }
    }

    pub(crate) fn invalid_config(message: impl Into<String>) -> Self {
        RegridError::InvalidConfiguration {
            message: message.into(),
        }
    }

    /// Name of the error variant, for structured logs
    pub fn kind(&self) -> &'static str {
        match self {
            RegridError::IncompatibleDiscretization { .. } => "IncompatibleDiscretization",
            RegridError::DegenerateGeometry { .. } => "DegenerateGeometry",
            RegridError::UnmappedDestination { .. } => "UnmappedDestination",
            RegridError::InvalidConfiguration { .. } => "InvalidConfiguration",
            RegridError::HandleState { .. } => "HandleState",
            RegridError::Config { .. } => "Config",
            RegridError::WeightFile { .. } => "WeightFile",
            RegridError::Io(_) => "Io",
            RegridError::Json(_) => "Json",
            RegridError::Arrow(_) => "Arrow",
            RegridError::Shape(_) => "Shape",
            #[cfg(feature = "netcdf")]
            RegridError::NetCdf(_) => "NetCdf",
        }
    }
}

/// Convenience type alias for Results with RegridError
pub type Result<T> = std::result::Result<T, RegridError>;
