//! Artificial pole caps for periodic spherical source grids.
//!
//! When the outermost source row stops short of a pole, destinations between
//! that row and the pole have no containing stencil cell. A cap strip of quads
//! `(ring i, ring i+1, pole i+1, pole i)` closes the gap; the value carried by
//! the pole vertices depends on the [`PoleMethod`]:
//!
//! - `AllAvg`: the mean of every unmasked ring point
//! - `NpntAvg`: the mean of the N unmasked ring points nearest in longitude
//! - `Teeth`: each pole vertex repeats its ring point
//!
//! Cap weights are expressed directly on ring point ids, so the resulting
//! rows only reference real source locations.

use tracing::debug;

use crate::discretization::{Discretization, StaggerLocation};
use crate::error::Result;
use crate::geometry::mapping::bilinear_weights;
use crate::geometry::{wrap_delta, CoordSys, Point2};
use crate::index::{Candidate, CellIndex};
use crate::options::{PoleMethod, RegridOptions};

/// Rows closer than this to ±90 degrees already reach the pole
const POLE_EPSILON: f64 = 1e-10;

/// Which pole a cap closes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pole {
    South,
    North,
}

impl Pole {
    fn latitude(&self) -> f64 {
        match self {
            Pole::South => -90.0,
            Pole::North => 90.0,
        }
    }
}

struct PoleCap {
    pole: Pole,
    ring: Vec<usize>,
    ring_lon: Vec<f64>,
    quads: Vec<[Point2; 4]>,
    index: CellIndex,
}

impl PoleCap {
    fn new(pole: Pole, ring: Vec<usize>, points: &[Point2], period: f64) -> Self {
        let n = ring.len();
        let pole_lat = pole.latitude();
        let quads: Vec<[Point2; 4]> = (0..n)
            .map(|k| {
                let a = points[ring[k]];
                let b = points[ring[(k + 1) % n]];
                let mut b_lon = a.x + wrap_delta(b.x - a.x, period);
                // A single-point ring wraps once around the pole.
                if n == 1 {
                    b_lon = a.x + period;
                }
                [
                    a,
                    Point2::new(b_lon, b.y),
                    Point2::new(b_lon, pole_lat),
                    Point2::new(a.x, pole_lat),
                ]
            })
            .collect();
        let index = CellIndex::build(
            quads.iter().enumerate().map(|(k, q)| (k, q.as_slice())),
            Some(period),
        );
        let ring_lon = ring.iter().map(|&id| points[id].x).collect();
        Self {
            pole,
            ring,
            ring_lon,
            quads,
            index,
        }
    }
}

/// Pole caps of one source grid
pub struct PoleTreatment {
    method: PoleMethod,
    npoints: usize,
    period: f64,
    caps: Vec<PoleCap>,
    src_masked: Vec<bool>,
}

impl PoleTreatment {
    /// Build the caps the source needs, if any.
    ///
    /// Returns `None` for `PoleMethod::None`, meshes, non-periodic or planar
    /// grids, and grids whose outer rows already reach both poles.
    pub fn build(
        src: &Discretization,
        location: StaggerLocation,
        options: &RegridOptions,
        src_masked: &[bool],
    ) -> Result<Option<Self>> {
        let method = options.effective_pole_method();
        if method == PoleMethod::None {
            return Ok(None);
        }
        let Discretization::Grid(grid) = src else {
            return Ok(None);
        };
        if !grid.is_periodic() || grid.coord_sys() != CoordSys::SphericalDeg {
            return Ok(None);
        }
        let Some(period) = grid.coord_sys().period() else {
            return Ok(None);
        };

        let points = grid.points(location)?;
        let (rows, cols) = grid.location_dims(location);

        // A closing column that repeats the first one is not a separate ring point.
        let ring_len = if cols > 1
            && (0..rows).all(|j| {
                let first = points[j * cols];
                let last = points[j * cols + cols - 1];
                wrap_delta(last.x - first.x, period).abs() < POLE_EPSILON
                    && (last.y - first.y).abs() < POLE_EPSILON
            }) {
            cols - 1
        } else {
            cols
        };
        let ring_ids = |j: usize| -> Vec<usize> { (0..ring_len).map(|i| j * cols + i).collect() };

        let mut caps = Vec::new();
        if let Some(lat) = grid.row_mean_y(location, 0) {
            if lat > -90.0 + POLE_EPSILON {
                caps.push(PoleCap::new(Pole::South, ring_ids(0), &points, period));
            }
        }
        if let Some(lat) = grid.row_mean_y(location, rows - 1) {
            if lat < 90.0 - POLE_EPSILON {
                caps.push(PoleCap::new(Pole::North, ring_ids(rows - 1), &points, period));
            }
        }
        if caps.is_empty() {
            return Ok(None);
        }

        debug!(
            pole_method = %method,
            caps = caps.len(),
            ring_points = ring_len,
            "Built pole caps"
        );

        Ok(Some(Self {
            method,
            npoints: options.regrid_pole_npoints.unwrap_or(1),
            period,
            caps,
            src_masked: src_masked.to_vec(),
        }))
    }

    /// Which poles are capped
    pub fn poles(&self) -> Vec<Pole> {
        self.caps.iter().map(|cap| cap.pole).collect()
    }

    /// Weights on ring point ids for a point inside a cap
    pub fn locate(&self, p: Point2) -> Option<Vec<(usize, f64)>> {
        for cap in &self.caps {
            for Candidate { cell, shift } in cap.index.candidates_at(p) {
                let Some(w) = bilinear_weights(&cap.quads[cell], p.shifted(shift)) else {
                    continue;
                };
                let n = cap.ring.len();
                let a = cap.ring[cell];
                let b = cap.ring[(cell + 1) % n];
                let pole_weight = w[2] + w[3];

                let mut row = Vec::with_capacity(n + 2);
                match self.method {
                    PoleMethod::Teeth => {
                        row.push((a, w[0] + w[3]));
                        row.push((b, w[1] + w[2]));
                    }
                    PoleMethod::AllAvg => {
                        row.push((a, w[0]));
                        row.push((b, w[1]));
                        let members = self.unmasked_ring(cap);
                        let share = pole_weight / members.len() as f64;
                        row.extend(members.into_iter().map(|id| (id, share)));
                    }
                    PoleMethod::NpntAvg => {
                        row.push((a, w[0]));
                        row.push((b, w[1]));
                        let members = self.nearest_ring(cap, p.x);
                        let share = pole_weight / members.len() as f64;
                        row.extend(members.into_iter().map(|id| (id, share)));
                    }
                    PoleMethod::None => return None,
                }
                return Some(row);
            }
        }
        None
    }

    /// Unmasked ring points, or the whole ring when all are masked
    fn unmasked_ring(&self, cap: &PoleCap) -> Vec<usize> {
        let members: Vec<usize> = cap
            .ring
            .iter()
            .copied()
            .filter(|&id| !self.src_masked[id])
            .collect();
        if members.is_empty() {
            cap.ring.clone()
        } else {
            members
        }
    }

    /// The `npoints` unmasked ring points nearest to `lon`; ties go to the
    /// lowest id
    fn nearest_ring(&self, cap: &PoleCap, lon: f64) -> Vec<usize> {
        let mut candidates: Vec<(f64, usize)> = cap
            .ring
            .iter()
            .zip(cap.ring_lon.iter())
            .filter(|(&id, _)| !self.src_masked[id])
            .map(|(&id, &ring_lon)| (wrap_delta(ring_lon - lon, self.period).abs(), id))
            .collect();
        if candidates.is_empty() {
            return cap.ring.clone();
        }
        candidates.sort_by(|a, b| {
            a.0.partial_cmp(&b.0)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.1.cmp(&b.1))
        });
        candidates
            .into_iter()
            .take(self.npoints.max(1))
            .map(|(_, id)| id)
            .collect()
    }
}
