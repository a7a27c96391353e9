//! Topology index: R-tree lookups over cells and points.
//!
//! [`CellIndex`] stores cell bounding boxes and answers "which cells may
//! contain this point / overlap this box" queries. Periodic longitude is
//! handled by re-issuing a query shifted by one period either way, so boundary
//! cells are replicated virtually rather than stored twice.
//!
//! [`PointIndex`] stores location points embedded in 3-D and answers nearest
//! and k-nearest queries, breaking distance ties by the lowest id.

use rstar::{PointDistance, RTree, RTreeObject, AABB};

use crate::geometry::{BoundingBox, CoordSys, Point2};

/// Bounding box of one indexed cell
#[derive(Debug, Clone)]
pub struct CellEnvelope {
    pub cell: usize,
    pub bbox: BoundingBox,
}

impl RTreeObject for CellEnvelope {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_corners(
            [self.bbox.min_x, self.bbox.min_y],
            [self.bbox.max_x, self.bbox.max_y],
        )
    }
}

/// A candidate returned by a [`CellIndex`] query.
///
/// `shift` has been added to the query geometry to hit the cell.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candidate {
    pub cell: usize,
    pub shift: f64,
}

/// R-tree over cell bounding boxes
pub struct CellIndex {
    tree: RTree<CellEnvelope>,
    period: Option<f64>,
    len: usize,
}

impl CellIndex {
    /// Build from `(cell id, boundary)` pairs; boundaries are used only for
    /// their bounding boxes
    pub fn build<'a, I>(cells: I, period: Option<f64>) -> Self
    where
        I: IntoIterator<Item = (usize, &'a [Point2])>,
    {
        let envelopes: Vec<CellEnvelope> = cells
            .into_iter()
            .filter_map(|(cell, ring)| {
                BoundingBox::from_points(ring).map(|bbox| CellEnvelope { cell, bbox })
            })
            .collect();
        let len = envelopes.len();
        Self {
            tree: RTree::bulk_load(envelopes),
            period,
            len,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn shifts(&self) -> Vec<f64> {
        match self.period {
            Some(p) => vec![0.0, -p, p],
            None => vec![0.0],
        }
    }

    /// Cells whose bounding box contains `p` (or a periodic image of it)
    pub fn candidates_at(&self, p: Point2) -> Vec<Candidate> {
        self.candidates_in(&BoundingBox {
            min_x: p.x,
            min_y: p.y,
            max_x: p.x,
            max_y: p.y,
        })
    }

    /// Cells whose bounding box overlaps `bbox` (or a periodic image of it),
    /// sorted by cell id then shift
    pub fn candidates_in(&self, bbox: &BoundingBox) -> Vec<Candidate> {
        let pad = 1e-9 * (bbox.width().abs() + bbox.height().abs()).max(1.0);
        let mut out = Vec::new();
        for shift in self.shifts() {
            let query = bbox.shifted(shift).expand(pad);
            let envelope =
                AABB::from_corners([query.min_x, query.min_y], [query.max_x, query.max_y]);
            out.extend(
                self.tree
                    .locate_in_envelope_intersecting(&envelope)
                    .map(|entry| Candidate {
                        cell: entry.cell,
                        shift,
                    }),
            );
        }
        out.sort_by(|a, b| {
            a.cell
                .cmp(&b.cell)
                .then(a.shift.partial_cmp(&b.shift).unwrap_or(std::cmp::Ordering::Equal))
        });
        out
    }
}

/// Indexed location point
#[derive(Debug, Clone)]
struct PointEntry {
    id: usize,
    position: [f64; 3],
}

impl RTreeObject for PointEntry {
    type Envelope = AABB<[f64; 3]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_point(self.position)
    }
}

impl PointDistance for PointEntry {
    fn distance_2(&self, point: &[f64; 3]) -> f64 {
        let dx = self.position[0] - point[0];
        let dy = self.position[1] - point[1];
        let dz = self.position[2] - point[2];
        dx * dx + dy * dy + dz * dz
    }
}

/// Relative slack under which two squared distances count as a tie
const TIE_TOLERANCE: f64 = 1e-12;

/// R-tree over location points
pub struct PointIndex {
    tree: RTree<PointEntry>,
    coord_sys: CoordSys,
}

impl PointIndex {
    /// Build from `(id, point)` pairs
    pub fn build<I>(points: I, coord_sys: CoordSys) -> Self
    where
        I: IntoIterator<Item = (usize, Point2)>,
    {
        let entries: Vec<PointEntry> = points
            .into_iter()
            .map(|(id, p)| PointEntry {
                id,
                position: coord_sys.embed(p),
            })
            .collect();
        Self {
            tree: RTree::bulk_load(entries),
            coord_sys,
        }
    }

    pub fn len(&self) -> usize {
        self.tree.size()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }

    /// Nearest indexed point; ties go to the lowest id
    pub fn nearest(&self, p: Point2) -> Option<usize> {
        let query = self.coord_sys.embed(p);
        let mut iter = self.tree.nearest_neighbor_iter_with_distance_2(&query);
        let (first, best) = iter.next()?;
        let limit = best + TIE_TOLERANCE * best.max(f64::MIN_POSITIVE);
        let mut winner = first.id;
        for (entry, d2) in iter {
            if d2 > limit {
                break;
            }
            winner = winner.min(entry.id);
        }
        Some(winner)
    }

    /// The `k` nearest indexed points in order of distance (ties by id)
    pub fn k_nearest(&self, p: Point2, k: usize) -> Vec<usize> {
        let query = self.coord_sys.embed(p);
        let mut found: Vec<(f64, usize)> = self
            .tree
            .nearest_neighbor_iter_with_distance_2(&query)
            .take(k)
            .map(|(entry, d2)| (d2, entry.id))
            .collect();
        found.sort_by(|a, b| {
            a.0.partial_cmp(&b.0)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.1.cmp(&b.1))
        });
        found.into_iter().map(|(_, id)| id).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ring(x0: f64, y0: f64) -> Vec<Point2> {
        vec![
            Point2::new(x0, y0),
            Point2::new(x0 + 10.0, y0),
            Point2::new(x0 + 10.0, y0 + 10.0),
            Point2::new(x0, y0 + 10.0),
        ]
    }

    #[test]
    fn test_cell_candidates() {
        let rings = vec![ring(0.0, 0.0), ring(10.0, 0.0), ring(20.0, 0.0)];
        let index = CellIndex::build(
            rings.iter().enumerate().map(|(i, r)| (i, r.as_slice())),
            None,
        );
        assert_eq!(index.len(), 3);

        let hits = index.candidates_at(Point2::new(15.0, 5.0));
        assert_eq!(hits, vec![Candidate { cell: 1, shift: 0.0 }]);

        // A point on a shared edge reports both cells in id order.
        let hits: Vec<usize> = index
            .candidates_at(Point2::new(10.0, 5.0))
            .iter()
            .map(|c| c.cell)
            .collect();
        assert_eq!(hits, vec![0, 1]);
    }

    #[test]
    fn test_periodic_candidates() {
        let rings = vec![ring(355.0, 0.0)];
        let index = CellIndex::build(
            rings.iter().enumerate().map(|(i, r)| (i, r.as_slice())),
            Some(360.0),
        );
        let hits = index.candidates_at(Point2::new(2.0, 5.0));
        assert_eq!(hits, vec![Candidate { cell: 0, shift: 360.0 }]);
        assert!(index.candidates_at(Point2::new(180.0, 5.0)).is_empty());
    }

    #[test]
    fn test_nearest_tie_breaks_by_lowest_id() {
        let points = vec![
            (4, Point2::new(1.0, 0.0)),
            (2, Point2::new(-1.0, 0.0)),
            (7, Point2::new(0.0, 3.0)),
        ];
        let index = PointIndex::build(points, CoordSys::Cartesian);
        assert_eq!(index.nearest(Point2::new(0.0, 0.0)), Some(2));
        assert_eq!(index.nearest(Point2::new(0.0, 2.5)), Some(7));
    }

    #[test]
    fn test_nearest_across_dateline() {
        let points = vec![(0, Point2::new(179.0, 0.0)), (1, Point2::new(170.0, 0.0))];
        let index = PointIndex::build(points, CoordSys::SphericalDeg);
        assert_eq!(index.nearest(Point2::new(-179.0, 0.0)), Some(0));
    }

    #[test]
    fn test_k_nearest() {
        let points = (0..10).map(|i| (i, Point2::new(i as f64, 0.0)));
        let index = PointIndex::build(points, CoordSys::Cartesian);
        assert_eq!(index.k_nearest(Point2::new(4.2, 0.0), 3), vec![4, 5, 3]);
        let empty = PointIndex::build(Vec::new(), CoordSys::Cartesian);
        assert!(empty.nearest(Point2::new(0.0, 0.0)).is_none());
    }
}
