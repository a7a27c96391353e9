//! Unstructured 2-D meshes.

use super::{CellNodes, StaggerLocation};
use crate::error::{RegridError, Result};
use crate::geometry::{enclosed_pole, unwrap_ring, CoordSys, Point2};

/// An unstructured mesh of polygonal elements.
///
/// Node data lives at [`StaggerLocation::Corner`], element data at
/// [`StaggerLocation::Center`].
#[derive(Debug, Clone, PartialEq)]
pub struct UnstructuredMesh {
    coord_sys: CoordSys,
    nodes: Vec<Point2>,
    elements: Vec<Vec<usize>>,
    element_coords: Vec<Point2>,
    node_mask: Option<Vec<i32>>,
    element_mask: Option<Vec<i32>>,
}

impl UnstructuredMesh {
    /// Create a mesh from node coordinates and element connectivity.
    ///
    /// Element coordinates default to the vertex average of each element.
    pub fn new(nodes: Vec<Point2>, elements: Vec<Vec<usize>>, coord_sys: CoordSys) -> Result<Self> {
        for (e, conn) in elements.iter().enumerate() {
            if conn.len() < 3 {
                return Err(RegridError::incompatible(format!(
                    "Element {} has {} nodes, at least 3 are required",
                    e,
                    conn.len()
                )));
            }
            if let Some(&bad) = conn.iter().find(|&&n| n >= nodes.len()) {
                return Err(RegridError::incompatible(format!(
                    "Element {} references node {} but the mesh has {} nodes",
                    e,
                    bad,
                    nodes.len()
                )));
            }
        }

        let element_coords = elements
            .iter()
            .map(|conn| {
                let mut ring: Vec<Point2> = conn.iter().map(|&n| nodes[n]).collect();
                unwrap_ring(&mut ring, coord_sys.period());
                let count = ring.len() as f64;
                let (sx, sy) = ring
                    .iter()
                    .fold((0.0, 0.0), |(sx, sy), p| (sx + p.x, sy + p.y));
                match enclosed_pole(&ring, coord_sys.period()) {
                    Some(pole) => Point2::new(sx / count, pole),
                    None => Point2::new(sx / count, sy / count),
                }
            })
            .collect();

        Ok(Self {
            coord_sys,
            nodes,
            elements,
            element_coords,
            node_mask: None,
            element_mask: None,
        })
    }

    /// Override the element coordinates
    pub fn with_element_coords(mut self, coords: Vec<Point2>) -> Result<Self> {
        if coords.len() != self.elements.len() {
            return Err(RegridError::incompatible(format!(
                "Expected {} element coordinates, got {}",
                self.elements.len(),
                coords.len()
            )));
        }
        self.element_coords = coords;
        Ok(self)
    }

    /// Attach an integer mask for a location
    pub fn with_mask(mut self, location: StaggerLocation, mask: Vec<i32>) -> Result<Self> {
        let expected = self.location_count(location);
        if mask.len() != expected {
            return Err(RegridError::incompatible(format!(
                "Mask for {} must have {} values, got {}",
                location,
                expected,
                mask.len()
            )));
        }
        match location {
            StaggerLocation::Center => self.element_mask = Some(mask),
            StaggerLocation::Corner => self.node_mask = Some(mask),
        }
        Ok(self)
    }

    pub fn coord_sys(&self) -> CoordSys {
        self.coord_sys
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn element_count(&self) -> usize {
        self.elements.len()
    }

    pub fn elements(&self) -> &[Vec<usize>] {
        &self.elements
    }

    pub fn location_count(&self, location: StaggerLocation) -> usize {
        match location {
            StaggerLocation::Center => self.elements.len(),
            StaggerLocation::Corner => self.nodes.len(),
        }
    }

    pub fn points(&self, location: StaggerLocation) -> Vec<Point2> {
        match location {
            StaggerLocation::Center => self.element_coords.clone(),
            StaggerLocation::Corner => self.nodes.clone(),
        }
    }

    pub fn mask(&self, location: StaggerLocation) -> Option<Vec<i32>> {
        match location {
            StaggerLocation::Center => self.element_mask.clone(),
            StaggerLocation::Corner => self.node_mask.clone(),
        }
    }

    /// Elements as point-location cells over node data; polygons with more
    /// than four nodes are fanned into triangles
    pub fn stencil_cells(&self, location: StaggerLocation) -> Result<Vec<CellNodes>> {
        if location == StaggerLocation::Center {
            return Err(RegridError::incompatible(
                "Point location on meshes needs node (corner) data",
            ));
        }
        let mut cells = Vec::with_capacity(self.elements.len());
        for conn in &self.elements {
            match conn.len() {
                3 => cells.push(CellNodes::Tri([conn[0], conn[1], conn[2]])),
                4 => cells.push(CellNodes::Quad([conn[0], conn[1], conn[2], conn[3]])),
                n => {
                    for k in 1..n - 1 {
                        cells.push(CellNodes::Tri([conn[0], conn[k], conn[k + 1]]));
                    }
                }
            }
        }
        Ok(cells)
    }

    /// Boundary of element `e`
    pub fn cell_polygon(&self, e: usize) -> Vec<Point2> {
        self.elements[e].iter().map(|&n| self.nodes[n]).collect()
    }
}
