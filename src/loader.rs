//! Job file loading.
//!
//! A job file is a JSON document naming the source and destination
//! discretizations and the analytic field regridded between them:
//!
//! ```json
//! {
//!   "source": { "grid": { "kind": "global", "nx": 72, "ny": 36 } },
//!   "destination": { "grid": { "kind": "regional", "lon_min": 0, "lon_max": 90,
//!                              "lat_min": 0, "lat_max": 45, "nx": 30, "ny": 15 } },
//!   "field": { "kind": "harmonic" }
//! }
//! ```
//!
//! Grids can also be read from NetCDF coordinate variables when the crate is
//! built with the `netcdf` feature.

use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

use crate::discretization::{Discretization, StaggerLocation, StructuredGrid, UnstructuredMesh};
use crate::error::{RegridError, Result};
use crate::field::Field;
use crate::geometry::{CoordSys, Point2};

/// How to build one discretization
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GridSpec {
    /// Uniform global longitude/latitude grid
    Global { nx: usize, ny: usize },
    /// Uniform regional longitude/latitude grid
    Regional {
        lon_min: f64,
        lon_max: f64,
        lat_min: f64,
        lat_max: f64,
        nx: usize,
        ny: usize,
    },
    /// Rectilinear grid from 1-D center coordinates; corners are derived
    Rectilinear {
        x: Vec<f64>,
        y: Vec<f64>,
        #[serde(default)]
        coord_sys: CoordSys,
        #[serde(default)]
        periodic: bool,
    },
    /// Unstructured mesh
    Mesh {
        nodes: Vec<[f64; 2]>,
        elements: Vec<Vec<usize>>,
        #[serde(default)]
        coord_sys: CoordSys,
    },
    /// Grid read from NetCDF coordinate variables
    Netcdf {
        path: PathBuf,
        lon_var: String,
        lat_var: String,
        #[serde(default)]
        mask_var: Option<String>,
        #[serde(default)]
        periodic: bool,
    },
}

/// One side of a job: discretization, stagger location and optional mask
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SideSpec {
    pub grid: GridSpec,
    #[serde(default)]
    pub location: StaggerLocation,
    /// Mask values in flat-id order
    #[serde(default)]
    pub mask: Option<Vec<i32>>,
}

/// Analytic test field evaluated at source locations
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AnalyticField {
    /// The same value everywhere
    Constant { value: f64 },
    /// `2 + cos²(lat) cos(2 lon)`
    #[default]
    Harmonic,
    /// `a + b x + c y`
    Linear { a: f64, b: f64, c: f64 },
}

impl AnalyticField {
    pub fn evaluate(&self, x: f64, y: f64) -> f64 {
        match self {
            AnalyticField::Constant { value } => *value,
            AnalyticField::Harmonic => {
                let lat = y.to_radians();
                2.0 + lat.cos().powi(2) * (2.0 * x.to_radians()).cos()
            }
            AnalyticField::Linear { a, b, c } => a + b * x + c * y,
        }
    }
}

/// A complete job description
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobSpec {
    pub source: SideSpec,
    pub destination: SideSpec,
    #[serde(default)]
    pub field: AnalyticField,
}

/// Load a job file
pub fn load_job(path: &Path) -> Result<JobSpec> {
    let content = std::fs::read_to_string(path)?;
    let job: JobSpec = serde_json::from_str(&content)?;
    info!(path = %path.display(), "Job file loaded");
    Ok(job)
}

impl GridSpec {
    /// Build the discretization
    pub fn build(&self) -> Result<Discretization> {
        let disc: Discretization = match self {
            GridSpec::Global { nx, ny } => StructuredGrid::global(*nx, *ny)?.into(),
            GridSpec::Regional {
                lon_min,
                lon_max,
                lat_min,
                lat_max,
                nx,
                ny,
            } => StructuredGrid::regional((*lon_min, *lon_max), (*lat_min, *lat_max), *nx, *ny)?
                .into(),
            GridSpec::Rectilinear {
                x,
                y,
                coord_sys,
                periodic,
            } => StructuredGrid::rectilinear(x, y, *coord_sys)?
                .with_periodic(*periodic)
                .with_derived_corners()
                .into(),
            GridSpec::Mesh {
                nodes,
                elements,
                coord_sys,
            } => {
                let nodes = nodes.iter().map(|&[x, y]| Point2::new(x, y)).collect();
                UnstructuredMesh::new(nodes, elements.clone(), *coord_sys)?.into()
            }
            GridSpec::Netcdf {
                path,
                lon_var,
                lat_var,
                mask_var,
                periodic,
            } => load_netcdf_grid(path, lon_var, lat_var, mask_var.as_deref(), *periodic)?.into(),
        };
        debug!(
            kind = disc.kind_name(),
            centers = disc.location_count(StaggerLocation::Center),
            "Built discretization"
        );
        Ok(disc)
    }
}

impl SideSpec {
    /// Build the discretization with the mask attached
    pub fn build(&self) -> Result<Arc<Discretization>> {
        let disc = self.grid.build()?;
        let disc = match (&self.mask, disc) {
            (None, disc) => disc,
            (Some(mask), Discretization::Grid(grid)) => {
                let dims = grid.location_dims(self.location);
                let mask = Array2::from_shape_vec(dims, mask.clone())?;
                grid.with_mask(self.location, mask)?.into()
            }
            (Some(mask), Discretization::Mesh(mesh)) => {
                mesh.with_mask(self.location, mask.clone())?.into()
            }
        };
        Ok(Arc::new(disc))
    }
}

/// Read a structured grid from NetCDF longitude/latitude variables.
///
/// 1-D variables give a rectilinear grid, 2-D variables a curvilinear one;
/// corners are derived from the centers.
#[cfg(feature = "netcdf")]
pub fn load_netcdf_grid(
    path: &Path,
    lon_var: &str,
    lat_var: &str,
    mask_var: Option<&str>,
    periodic: bool,
) -> Result<StructuredGrid> {
    let file = netcdf::open(path)?;
    let read = |name: &str| -> Result<(Vec<f64>, Vec<usize>)> {
        let var = file.variable(name).ok_or_else(|| RegridError::Config {
            message: format!("Variable {} not found in {}", name, path.display()),
        })?;
        let shape: Vec<usize> = var.dimensions().iter().map(|d| d.len()).collect();
        let values: Vec<f64> = var.get_values::<f64, _>(&[] as &[netcdf::Extent])?;
        Ok((values, shape))
    };

    let (lons, lon_shape) = read(lon_var)?;
    let (lats, lat_shape) = read(lat_var)?;

    let grid = match (lon_shape.as_slice(), lat_shape.as_slice()) {
        ([_], [_]) => StructuredGrid::rectilinear(&lons, &lats, CoordSys::SphericalDeg)?,
        ([ny, nx], [ny2, nx2]) if ny == ny2 && nx == nx2 => StructuredGrid::new(
            Array2::from_shape_vec((*ny, *nx), lons)?,
            Array2::from_shape_vec((*ny, *nx), lats)?,
            CoordSys::SphericalDeg,
        )?,
        _ => {
            return Err(RegridError::incompatible(format!(
                "Coordinate variables {} {:?} and {} {:?} do not describe a 2-D grid",
                lon_var, lon_shape, lat_var, lat_shape
            )))
        }
    };
    let mut grid = grid.with_periodic(periodic).with_derived_corners();

    if let Some(mask_var) = mask_var {
        let var = file.variable(mask_var).ok_or_else(|| RegridError::Config {
            message: format!("Variable {} not found in {}", mask_var, path.display()),
        })?;
        let values: Vec<i32> = var.get_values::<i32, _>(&[] as &[netcdf::Extent])?;
        let dims = grid.location_dims(StaggerLocation::Center);
        grid = grid.with_mask(StaggerLocation::Center, Array2::from_shape_vec(dims, values)?)?;
    }

    info!(
        path = %path.display(),
        nx = grid.nx(),
        ny = grid.ny(),
        "Loaded grid from NetCDF"
    );
    Ok(grid)
}

/// Read a structured grid from NetCDF longitude/latitude variables.
///
/// Always fails: the crate was built without the `netcdf` feature.
#[cfg(not(feature = "netcdf"))]
pub fn load_netcdf_grid(
    path: &Path,
    _lon_var: &str,
    _lat_var: &str,
    _mask_var: Option<&str>,
    _periodic: bool,
) -> Result<StructuredGrid> {
    Err(RegridError::Config {
        message: format!(
            "Cannot read {}: built without the netcdf feature",
            path.display()
        ),
    })
}

/// Build the source field described by a job
pub fn source_field(job: &JobSpec, src: Arc<Discretization>) -> Result<Field> {
    let field = &job.field;
    Field::from_fn("source", src, job.source.location, |x, y| field.evaluate(x, y))
}
