//! Test data generation utilities.
//!
//! This module builds grids, meshes, fields and job files with known
//! geometry for the integration tests.

use std::path::Path;
use std::sync::Arc;

use ndarray::Array2;
use regridder::{
    CoordSys, Discretization, Field, Point2, StaggerLocation, StructuredGrid, UnstructuredMesh,
};

/// Uniform global grid with exact cell bounds
pub fn global_grid(nx: usize, ny: usize) -> Arc<Discretization> {
    Arc::new(StructuredGrid::global(nx, ny).unwrap().into())
}

/// Uniform regional grid with exact cell bounds
pub fn regional_grid(
    lon: (f64, f64),
    lat: (f64, f64),
    nx: usize,
    ny: usize,
) -> Arc<Discretization> {
    Arc::new(StructuredGrid::regional(lon, lat, nx, ny).unwrap().into())
}

/// Global grid with a center mask computed from each cell's (i, j) index
pub fn masked_global_grid(
    nx: usize,
    ny: usize,
    mask: impl Fn(usize, usize) -> i32,
) -> Arc<Discretization> {
    let mask = Array2::from_shape_fn((ny, nx), |(j, i)| mask(i, j));
    let grid = StructuredGrid::global(nx, ny)
        .unwrap()
        .with_mask(StaggerLocation::Center, mask)
        .unwrap();
    Arc::new(grid.into())
}

/// Planar grid from cell edges
pub fn cartesian_grid(x_edges: &[f64], y_edges: &[f64]) -> Arc<Discretization> {
    Arc::new(
        StructuredGrid::from_edges(x_edges, y_edges, CoordSys::Cartesian)
            .unwrap()
            .into(),
    )
}

/// Unit square split into two triangles along its diagonal
pub fn two_triangle_mesh() -> Arc<Discretization> {
    let nodes = vec![
        Point2::new(0.0, 0.0),
        Point2::new(1.0, 0.0),
        Point2::new(1.0, 1.0),
        Point2::new(0.0, 1.0),
    ];
    let elements = vec![vec![0, 1, 2], vec![0, 2, 3]];
    Arc::new(
        UnstructuredMesh::new(nodes, elements, CoordSys::Cartesian)
            .unwrap()
            .into(),
    )
}

/// Unit square split along its diagonal, optionally with a zero-area
/// triangle folded onto the diagonal between the two halves
pub fn diagonal_mesh(with_sliver: bool) -> Arc<Discretization> {
    let mut nodes = vec![
        Point2::new(0.0, 0.0),
        Point2::new(1.0, 0.0),
        Point2::new(1.0, 1.0),
        Point2::new(0.0, 1.0),
    ];
    let mut elements = vec![vec![0, 1, 2], vec![0, 2, 3]];
    if with_sliver {
        nodes.push(Point2::new(0.5, 0.5));
        elements.insert(1, vec![0, 4, 2]);
    }
    Arc::new(
        UnstructuredMesh::new(nodes, elements, CoordSys::Cartesian)
            .unwrap()
            .into(),
    )
}

/// Spherical mesh with a single quad covering the cap north of `lat`
pub fn polar_cap_mesh(lat: f64) -> Arc<Discretization> {
    let nodes = [0.0, 90.0, 180.0, 270.0]
        .iter()
        .map(|&lon| Point2::new(lon, lat))
        .collect();
    Arc::new(
        UnstructuredMesh::new(nodes, vec![vec![0, 1, 2, 3]], CoordSys::SphericalDeg)
            .unwrap()
            .into(),
    )
}

/// Smooth wave pattern: `2 + cos²(lat) cos(2 lon)`
pub fn harmonic(lon: f64, lat: f64) -> f64 {
    let lat = lat.to_radians();
    2.0 + lat.cos().powi(2) * (2.0 * lon.to_radians()).cos()
}

/// Field filled with the harmonic pattern at cell centers
pub fn harmonic_field(name: &str, disc: Arc<Discretization>) -> Field {
    Field::from_fn(name, disc, StaggerLocation::Center, harmonic).unwrap()
}

/// Field filled with one value at cell centers
pub fn constant_field(name: &str, disc: Arc<Discretization>, value: f64) -> Field {
    Field::from_fn(name, disc, StaggerLocation::Center, |_, _| value).unwrap()
}

/// Field of cell centers initialised to `fill`
pub fn filled_field(name: &str, disc: Arc<Discretization>, fill: f64) -> Field {
    let mut field = Field::new(name, disc, StaggerLocation::Center);
    field.as_slice_mut().fill(fill);
    field
}

/// Areas of the cells of a uniform global grid on the unit sphere, in flat-id order
pub fn global_cell_areas(nx: usize, ny: usize) -> Vec<f64> {
    let dlon = 2.0 * std::f64::consts::PI / nx as f64;
    let dlat = 180.0 / ny as f64;
    let mut areas = Vec::with_capacity(nx * ny);
    for j in 0..ny {
        let south = (-90.0 + j as f64 * dlat).to_radians().sin();
        let north = (-90.0 + (j + 1) as f64 * dlat).to_radians().sin();
        areas.extend(std::iter::repeat(dlon * (north - south)).take(nx));
    }
    areas
}

/// Area-weighted integral of a field
pub fn integral(values: &[f64], areas: &[f64]) -> f64 {
    values.iter().zip(areas).map(|(v, a)| v * a).sum()
}

/// Write a job file describing a global-to-regional harmonic regrid
pub fn write_job_file(path: &Path) -> std::io::Result<()> {
    let job = r#"{
        "source": { "grid": { "kind": "global", "nx": 36, "ny": 18 } },
        "destination": {
            "grid": { "kind": "regional", "lon_min": 20, "lon_max": 80,
                      "lat_min": -30, "lat_max": 30, "nx": 12, "ny": 12 }
        },
        "field": { "kind": "harmonic" }
    }"#;
    std::fs::write(path, job)
}
