//! # regridder
//!
//! A fast, in-memory regridding engine.
//!
//! This library computes sparse interpolation weights between two
//! discretizations (structured logically-rectangular grids or unstructured
//! meshes, planar or spherical) and applies them to fields.
//!
//! ## Key Features
//!
//! - **Five methods**: bilinear, higher-order patch recovery, first-order
//!   conservative, and nearest neighbour in both directions
//! - **Masking**: per-side integer mask values, honored during weight generation
//! - **Pole treatment**: global grids that stop short of the poles can still be
//!   mapped near the poles
//! - **Deterministic parallel apply**: results do not depend on the thread count
//!
//! ## Architecture
//!
//! - **Discretization Layer**: grids, meshes, fields and spatial indices
//! - **Weight Layer**: one generator per method plus a shared mask & normalization pass
//! - **Handle Layer**: stored weights behind route handles tracked by a manager
//!
//! ```no_run
//! use std::sync::Arc;
//! use regridder::{regrid_apply, regrid_store, Discretization, Field, RegridMethod,
//!                 RegridOptions, StaggerLocation, StructuredGrid, ZeroRegion};
//!
//! # fn main() -> regridder::Result<()> {
//! let src: Arc<Discretization> = Arc::new(StructuredGrid::global(72, 36)?.into());
//! let dst: Arc<Discretization> = Arc::new(StructuredGrid::global(48, 24)?.into());
//! let temperature = Field::from_fn("t", src, StaggerLocation::Center, |_, lat| lat.cos())?;
//! let mut out = Field::new("t", dst, StaggerLocation::Center);
//!
//! let handle = regrid_store(&temperature, &out, &RegridOptions::new(RegridMethod::Conserve))?;
//! regrid_apply(&handle, &temperature, &mut out, ZeroRegion::Total)?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod discretization;
pub mod error;
pub mod field;
pub mod geometry;
pub mod handle;
pub mod index;
pub mod intersect;
pub mod loader;
pub mod logging;
pub mod manager;
pub mod options;
pub mod pole;
pub mod weights;
pub mod weights_io;

pub use config::Config;
pub use discretization::{Discretization, Signature, StaggerLocation, StructuredGrid, UnstructuredMesh};
pub use error::{RegridError, Result, Side};
pub use field::Field;
pub use geometry::{CoordSys, Point2};
pub use handle::{HandleState, RouteHandle};
pub use logging::{
    init_tracing, log_error, log_operation_end, log_operation_start, log_timed_operation,
    log_weight_stats,
};
pub use manager::{regrid_apply, regrid_release, regrid_store, FracFields, RegridManager};
pub use options::{
    MaskSet, NormType, PoleMethod, RegridMethod, RegridOptions, UnmappedAction, ZeroRegion,
};
pub use weights::{SparseWeightMatrix, WeightEntry};
pub use weights_io::{
    read_weights, read_weights_shaped, write_weights, WeightFile, WeightFormat, WeightShape,
};
