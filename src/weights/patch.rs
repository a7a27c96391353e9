//! Patch recovery weights.
//!
//! A quadratic polynomial `c0 + c1 x + c2 y + c3 x² + c4 xy + c5 y²` is fitted
//! by least squares to the corners of the containing source cell plus the
//! nearest unmasked source points, in local coordinates centred on the
//! destination point. The fitted value there is `c0`, so the weights are the
//! first row of the design matrix pseudo-inverse. Rank-deficient patches fall
//! back to the cell's bilinear weights.

use nalgebra::DMatrix;
use tracing::debug;

use super::common::{collect_rows, Sample, SourceSampler};
use super::{GeneratorInput, RawWeights, WeightGenerator};
use crate::error::Result;
use crate::geometry::{wrap_delta, CoordSys, Point2};
use crate::index::PointIndex;

/// Polynomial terms in the quadratic patch
const PATCH_TERMS: usize = 6;

/// Relative singular value cutoff for the patch rank test
const RANK_TOLERANCE: f64 = 1e-10;

/// Patch weight generator
pub struct PatchGenerator {
    /// Nearest source points added to the cell corners
    pub neighbours: usize,
}

impl Default for PatchGenerator {
    fn default() -> Self {
        Self { neighbours: 16 }
    }
}

impl WeightGenerator for PatchGenerator {
    fn generate(&self, input: &GeneratorInput<'_>) -> Result<RawWeights> {
        let coord_sys = input.src.coord_sys();
        let sampler = SourceSampler::new(input)?;
        let src_points = input.src.points(input.src_location)?;
        let index = PointIndex::build(
            src_points
                .iter()
                .copied()
                .enumerate()
                .filter(|(s, _)| !input.src_masked[*s]),
            coord_sys,
        );
        let dst_points = input.dst.points(input.dst_location)?;

        let entries = collect_rows(&dst_points, &input.dst_masked, |_, p| {
            let corners = match sampler.sample(p) {
                Some(Sample::Cell(corners)) => corners,
                Some(Sample::Pole(weights)) => return weights,
                None => return Vec::new(),
            };
            if corners
                .iter()
                .any(|&(s, w)| w != 0.0 && input.src_masked[s])
            {
                return Vec::new();
            }

            let mut stencil: Vec<usize> = corners
                .iter()
                .map(|&(s, _)| s)
                .filter(|&s| !input.src_masked[s])
                .collect();
            for s in index.k_nearest(p, self.neighbours) {
                if !stencil.contains(&s) {
                    stencil.push(s);
                }
            }

            match fit_weights(&stencil, &src_points, p, coord_sys) {
                Some(weights) => stencil.into_iter().zip(weights).collect(),
                None => corners,
            }
        });

        debug!(
            entries = entries.len(),
            neighbours = self.neighbours,
            "Generated patch weights"
        );

        Ok(RawWeights {
            entries,
            ..Default::default()
        })
    }

    fn name(&self) -> &str {
        "patch"
    }
}

/// Local planar offset of `q` from `origin`
fn local_offset(origin: Point2, q: Point2, coord_sys: CoordSys) -> (f64, f64) {
    match coord_sys {
        CoordSys::Cartesian => (q.x - origin.x, q.y - origin.y),
        CoordSys::SphericalDeg => {
            let dlon = coord_sys
                .period()
                .map_or(q.x - origin.x, |period| wrap_delta(q.x - origin.x, period));
            (dlon * origin.y.to_radians().cos(), q.y - origin.y)
        }
    }
}

/// Least-squares weights of a quadratic fit evaluated at `p`, or `None` when
/// the stencil cannot determine all six coefficients
fn fit_weights(
    stencil: &[usize],
    points: &[Point2],
    p: Point2,
    coord_sys: CoordSys,
) -> Option<Vec<f64>> {
    if stencil.len() < PATCH_TERMS {
        return None;
    }
    let offsets: Vec<(f64, f64)> = stencil
        .iter()
        .map(|&s| local_offset(p, points[s], coord_sys))
        .collect();
    let scale = offsets
        .iter()
        .map(|(x, y)| x.abs().max(y.abs()))
        .fold(0.0, f64::max);
    if scale == 0.0 {
        return None;
    }

    let design = DMatrix::<f64>::from_fn(stencil.len(), PATCH_TERMS, |r, c| {
        let (x, y) = (offsets[r].0 / scale, offsets[r].1 / scale);
        match c {
            0 => 1.0,
            1 => x,
            2 => y,
            3 => x * x,
            4 => x * y,
            _ => y * y,
        }
    });

    let svd = design.svd(true, true);
    let largest = svd.singular_values.max();
    let eps = RANK_TOLERANCE * largest;
    if svd.rank(eps) < PATCH_TERMS {
        return None;
    }
    let pinv = svd.pseudo_inverse(eps).ok()?;
    Some((0..stencil.len()).map(|k| pinv[(0, k)]).collect())
}
