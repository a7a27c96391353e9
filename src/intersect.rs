//! Intersection engine: point location and cell clipping.
//!
//! [`PointLocator`] finds the stencil cell containing a destination point and
//! its interpolation weights. [`CellGeometry`] prepares conservative cell
//! boundaries (validity checks, equal-area projection, R-tree) and [`clip`]
//! intersects two prepared cells.

use crate::discretization::CellNodes;
use crate::geometry::mapping::{barycentric_weights, bilinear_weights};
use crate::geometry::polygon::{
    clip_convex, is_convex, prepare_cell, signed_area, triangulate, ZERO_AREA_TOLERANCE,
};
use crate::geometry::{close_polar_ring, unwrap_ring, BoundingBox, CoordSys, Point2};
use crate::index::{Candidate, CellIndex};

/// A located point: the containing stencil cell and per-node weights
#[derive(Debug, Clone, PartialEq)]
pub struct Located {
    pub cell: usize,
    pub nodes: Vec<usize>,
    pub weights: Vec<f64>,
}

#[derive(Debug, Clone)]
struct StencilCell {
    nodes: Vec<usize>,
    ring: Vec<Point2>,
}

/// Point location over quads / triangles of source location points
pub struct PointLocator {
    cells: Vec<Option<StencilCell>>,
    index: CellIndex,
}

impl PointLocator {
    /// Prepare stencil cells; degenerate cells are skipped
    pub fn new(points: &[Point2], cells: &[CellNodes], coord_sys: CoordSys) -> Self {
        let period = coord_sys.period();
        let prepared: Vec<Option<StencilCell>> = cells
            .iter()
            .map(|cell| {
                let mut ring: Vec<Point2> = cell.ids().iter().map(|&id| points[id]).collect();
                unwrap_ring(&mut ring, period);
                prepare_cell(&ring).ok()?;

                // Collapse repeated nodes so quads with a shared corner become
                // triangles; the first occurrence keeps the id.
                let mut nodes = Vec::with_capacity(4);
                let mut distinct = Vec::with_capacity(4);
                for (&id, &p) in cell.ids().iter().zip(ring.iter()) {
                    if !distinct.iter().any(|q: &Point2| q == &p) {
                        nodes.push(id);
                        distinct.push(p);
                    }
                }
                Some(StencilCell {
                    nodes,
                    ring: distinct,
                })
            })
            .collect();

        let index = CellIndex::build(
            prepared
                .iter()
                .enumerate()
                .filter_map(|(i, c)| c.as_ref().map(|c| (i, c.ring.as_slice()))),
            period,
        );

        Self {
            cells: prepared,
            index,
        }
    }

    /// Number of usable (non-degenerate) stencil cells
    pub fn usable_cells(&self) -> usize {
        self.index.len()
    }

    /// Locate `p`; the lowest containing cell id wins
    pub fn locate(&self, p: Point2) -> Option<Located> {
        for Candidate { cell, shift } in self.index.candidates_at(p) {
            let Some(stencil) = self.cells[cell].as_ref() else {
                continue;
            };
            let q = p.shifted(shift);
            let weights = match stencil.ring.len() {
                3 => barycentric_weights(&[stencil.ring[0], stencil.ring[1], stencil.ring[2]], q)
                    .map(|w| w.to_vec()),
                4 => bilinear_weights(
                    &[stencil.ring[0], stencil.ring[1], stencil.ring[2], stencil.ring[3]],
                    q,
                )
                .map(|w| w.to_vec()),
                _ => None,
            };
            if let Some(weights) = weights {
                return Some(Located {
                    cell,
                    nodes: stencil.nodes.clone(),
                    weights,
                });
            }
        }
        None
    }
}

/// Area of the intersection of a prepared source ring with a prepared
/// destination ring.
///
/// Both rings must be counter-clockwise and non-degenerate. A non-convex
/// destination is clipped one triangle at a time.
pub fn clip(src: &[Point2], dst: &[Point2]) -> f64 {
    let pieces: Vec<Vec<Point2>> = if is_convex(dst) {
        vec![dst.to_vec()]
    } else {
        triangulate(dst).into_iter().map(|t| t.to_vec()).collect()
    };

    pieces
        .iter()
        .map(|ring| signed_area(&clip_convex(src, ring)).max(0.0))
        .sum()
}

/// A prepared conservative cell in the equal-area plane
#[derive(Debug, Clone)]
pub struct PreparedCell {
    pub ring: Vec<Point2>,
    pub area: f64,
}

/// Prepared boundaries of every center cell on one side of a regrid
pub struct CellGeometry {
    cells: Vec<Result<PreparedCell, &'static str>>,
    index: CellIndex,
    period: Option<f64>,
}

impl CellGeometry {
    /// Project and validate every cell boundary
    pub fn new(polygons: &[Vec<Point2>], coord_sys: CoordSys) -> Self {
        let cells: Vec<Result<PreparedCell, &'static str>> = polygons
            .iter()
            .map(|poly| {
                let mut ring = poly.clone();
                unwrap_ring(&mut ring, coord_sys.period());
                close_polar_ring(&mut ring, coord_sys.period());
                let projected: Vec<Point2> =
                    ring.iter().map(|&p| coord_sys.to_area_plane(p)).collect();
                let ring = prepare_cell(&projected)?;
                let area = signed_area(&ring);
                Ok(PreparedCell { ring, area })
            })
            .collect();

        let period = coord_sys.area_period();
        let index = CellIndex::build(
            cells
                .iter()
                .enumerate()
                .filter_map(|(i, c)| c.as_ref().ok().map(|c| (i, c.ring.as_slice()))),
            period,
        );

        Self {
            cells,
            index,
            period,
        }
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// The prepared cell, or the reason it is degenerate
    pub fn cell(&self, id: usize) -> Result<&PreparedCell, &'static str> {
        self.cells[id].as_ref().map_err(|reason| *reason)
    }

    /// Degenerate cells in id order
    pub fn degenerate(&self) -> impl Iterator<Item = (usize, &'static str)> + '_ {
        self.cells
            .iter()
            .enumerate()
            .filter_map(|(i, c)| c.as_ref().err().map(|reason| (i, *reason)))
    }

    /// Overlaps of `target` (a cell from the other side) with cells of this
    /// side, as `(cell id, area)` pairs; periodic images are clipped
    /// separately and may repeat an id
    pub fn overlaps(&self, target: &PreparedCell, skip: impl Fn(usize) -> bool) -> Vec<(usize, f64)> {
        let Some(bbox) = BoundingBox::from_points(&target.ring) else {
            return Vec::new();
        };
        let mut out = Vec::new();
        for Candidate { cell, shift } in self.index.candidates_in(&bbox) {
            if skip(cell) {
                continue;
            }
            let Ok(prepared) = self.cells[cell].as_ref() else {
                continue;
            };
            let shifted: Vec<Point2> = if shift == 0.0 {
                target.ring.clone()
            } else {
                target.ring.iter().map(|p| p.shifted(shift)).collect()
            };
            let area = clip(&prepared.ring, &shifted);
            // Cells that only share an edge leave round-off slivers.
            if area > ZERO_AREA_TOLERANCE * prepared.area.min(target.area) {
                out.push((cell, area));
            }
        }
        out
    }

    pub fn period(&self) -> Option<f64> {
        self.period
    }
}
