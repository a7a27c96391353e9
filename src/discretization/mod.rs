//! Spatial discretizations: structured grids and unstructured meshes.
//!
//! A [`Discretization`] is immutable once built and is shared between fields
//! through an `Arc`. Everything the store phase needs (location points, masks,
//! point-location stencils, conservative cell boundaries) is exposed per
//! [`StaggerLocation`] in flat-id order.

pub mod grid;
pub mod mesh;

pub use grid::StructuredGrid;
pub use mesh::UnstructuredMesh;

use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};

use crate::error::Result;
use crate::geometry::{CoordSys, Point2};

/// Where field values live on a discretization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StaggerLocation {
    /// Grid cell centers / mesh elements
    #[default]
    Center,
    /// Grid cell corners / mesh nodes
    Corner,
}

impl fmt::Display for StaggerLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StaggerLocation::Center => write!(f, "center"),
            StaggerLocation::Corner => write!(f, "corner"),
        }
    }
}

/// Location ids forming one point-location cell
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellNodes {
    Tri([usize; 3]),
    Quad([usize; 4]),
}

impl CellNodes {
    pub fn ids(&self) -> &[usize] {
        match self {
            CellNodes::Tri(ids) => ids,
            CellNodes::Quad(ids) => ids,
        }
    }
}

/// A structured grid or an unstructured mesh
#[derive(Debug, Clone, PartialEq)]
pub enum Discretization {
    Grid(StructuredGrid),
    Mesh(UnstructuredMesh),
}

/// Structural fingerprint of a (discretization, location) pair.
///
/// Two signatures are equal when cell counts and connectivity agree; data
/// values and coordinates are not part of it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Signature {
    pub kind: String,
    pub location: StaggerLocation,
    pub shape: Vec<usize>,
    pub topology: u64,
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{} {:?}", self.kind, self.location, self.shape)
    }
}

impl Discretization {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Discretization::Grid(_) => "grid",
            Discretization::Mesh(_) => "mesh",
        }
    }

    pub fn coord_sys(&self) -> CoordSys {
        match self {
            Discretization::Grid(g) => g.coord_sys(),
            Discretization::Mesh(m) => m.coord_sys(),
        }
    }

    /// Array shape of field data at a location
    pub fn location_shape(&self, location: StaggerLocation) -> Vec<usize> {
        match self {
            Discretization::Grid(g) => {
                let (rows, cols) = g.location_dims(location);
                vec![rows, cols]
            }
            Discretization::Mesh(m) => vec![m.location_count(location)],
        }
    }

    /// Number of locations (flat ids)
    pub fn location_count(&self, location: StaggerLocation) -> usize {
        self.location_shape(location).iter().product()
    }

    /// Location coordinates in flat-id order
    pub fn points(&self, location: StaggerLocation) -> Result<Vec<Point2>> {
        match self {
            Discretization::Grid(g) => g.points(location),
            Discretization::Mesh(m) => Ok(m.points(location)),
        }
    }

    /// Flattened mask values, if a mask is attached for the location
    pub fn mask(&self, location: StaggerLocation) -> Option<Vec<i32>> {
        match self {
            Discretization::Grid(g) => g.mask(location),
            Discretization::Mesh(m) => m.mask(location),
        }
    }

    /// Cells of location points used by bilinear and patch location
    pub fn stencil_cells(&self, location: StaggerLocation) -> Result<Vec<CellNodes>> {
        match self {
            Discretization::Grid(g) => g.stencil_cells(location),
            Discretization::Mesh(m) => m.stencil_cells(location),
        }
    }

    /// Boundary polygons of every center cell (grid cells / mesh elements)
    pub fn cell_polygons(&self) -> Result<Vec<Vec<Point2>>> {
        match self {
            Discretization::Grid(g) => {
                let mut polys = Vec::with_capacity(g.nx() * g.ny());
                for j in 0..g.ny() {
                    for i in 0..g.nx() {
                        polys.push(g.cell_polygon(j, i)?);
                    }
                }
                Ok(polys)
            }
            Discretization::Mesh(m) => Ok((0..m.element_count()).map(|e| m.cell_polygon(e)).collect()),
        }
    }

    /// Structural fingerprint for a location
    pub fn signature(&self, location: StaggerLocation) -> Signature {
        let mut hasher = DefaultHasher::new();
        match self {
            Discretization::Grid(g) => {
                (g.nx(), g.ny(), g.is_periodic()).hash(&mut hasher);
            }
            Discretization::Mesh(m) => {
                m.node_count().hash(&mut hasher);
                m.elements().hash(&mut hasher);
            }
        }
        Signature {
            kind: self.kind_name().to_string(),
            location,
            shape: self.location_shape(location),
            topology: hasher.finish(),
        }
    }
}

impl From<StructuredGrid> for Discretization {
    fn from(grid: StructuredGrid) -> Self {
        Discretization::Grid(grid)
    }
}

impl From<UnstructuredMesh> for Discretization {
    fn from(mesh: UnstructuredMesh) -> Self {
        Discretization::Mesh(mesh)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_location_shapes() {
        let grid: Discretization = StructuredGrid::global(6, 3).unwrap().into();
        assert_eq!(grid.location_shape(StaggerLocation::Center), vec![3, 6]);
        assert_eq!(grid.location_shape(StaggerLocation::Corner), vec![4, 7]);
        assert_eq!(grid.location_count(StaggerLocation::Corner), 28);
        assert_eq!(grid.cell_polygons().unwrap().len(), 18);
    }

    #[test]
    fn test_signature_ignores_coordinates() {
        let a: Discretization = StructuredGrid::global(6, 3).unwrap().into();
        let b: Discretization = StructuredGrid::regional((0.0, 60.0), (0.0, 30.0), 6, 3)
            .unwrap()
            .with_periodic(true)
            .into();
        assert_eq!(
            a.signature(StaggerLocation::Center),
            b.signature(StaggerLocation::Center)
        );
        let c: Discretization = StructuredGrid::global(6, 4).unwrap().into();
        assert_ne!(
            a.signature(StaggerLocation::Center),
            c.signature(StaggerLocation::Center)
        );
    }
}
