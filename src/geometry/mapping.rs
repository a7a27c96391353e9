//! Parametric mappings used to locate points inside stencil cells.
//!
//! Quadrilaterals use the inverse of the bilinear map
//! `p(s, t) = (1-s)(1-t) p0 + s(1-t) p1 + s t p2 + (1-s) t p3`, solved by
//! Newton iteration; triangles use barycentric coordinates.

use super::Point2;

/// Parametric tolerance accepted for points on or just outside a cell edge
pub const LOCATE_TOLERANCE: f64 = 1e-8;

const MAX_NEWTON_ITERATIONS: usize = 32;
const NEWTON_CONVERGENCE: f64 = 1e-13;

/// Solve for `(s, t)` such that the bilinear map of `quad` hits `p`.
///
/// Returns `None` when the iteration does not converge (degenerate quad).
pub fn inverse_bilinear(quad: &[Point2; 4], p: Point2) -> Option<(f64, f64)> {
    let [p0, p1, p2, p3] = *quad;
    let (mut s, mut t) = (0.5, 0.5);

    for _ in 0..MAX_NEWTON_ITERATIONS {
        let x = (1.0 - s) * (1.0 - t) * p0.x + s * (1.0 - t) * p1.x + s * t * p2.x
            + (1.0 - s) * t * p3.x;
        let y = (1.0 - s) * (1.0 - t) * p0.y + s * (1.0 - t) * p1.y + s * t * p2.y
            + (1.0 - s) * t * p3.y;
        let (rx, ry) = (x - p.x, y - p.y);

        let dxds = (1.0 - t) * (p1.x - p0.x) + t * (p2.x - p3.x);
        let dyds = (1.0 - t) * (p1.y - p0.y) + t * (p2.y - p3.y);
        let dxdt = (1.0 - s) * (p3.x - p0.x) + s * (p2.x - p1.x);
        let dydt = (1.0 - s) * (p3.y - p0.y) + s * (p2.y - p1.y);

        let det = dxds * dydt - dxdt * dyds;
        if det.abs() < f64::EPSILON * (dxds.abs() + dyds.abs()) * (dxdt.abs() + dydt.abs()) {
            return None;
        }

        let ds = (rx * dydt - ry * dxdt) / det;
        let dt = (ry * dxds - rx * dyds) / det;
        s -= ds;
        t -= dt;

        if ds.abs() < NEWTON_CONVERGENCE && dt.abs() < NEWTON_CONVERGENCE {
            return Some((s, t));
        }
    }
    None
}

/// Bilinear weights for `quad` at `p`, in corner order, when `p` lies inside
/// within [`LOCATE_TOLERANCE`]
pub fn bilinear_weights(quad: &[Point2; 4], p: Point2) -> Option<[f64; 4]> {
    let (s, t) = inverse_bilinear(quad, p)?;
    if !within_unit(s) || !within_unit(t) {
        return None;
    }
    let (s, t) = (s.clamp(0.0, 1.0), t.clamp(0.0, 1.0));
    Some([
        (1.0 - s) * (1.0 - t),
        s * (1.0 - t),
        s * t,
        (1.0 - s) * t,
    ])
}

/// Barycentric weights for `tri` at `p`, when `p` lies inside within
/// [`LOCATE_TOLERANCE`]
pub fn barycentric_weights(tri: &[Point2; 3], p: Point2) -> Option<[f64; 3]> {
    let [a, b, c] = *tri;
    let det = (b.y - c.y) * (a.x - c.x) + (c.x - b.x) * (a.y - c.y);
    let scale = [a.sub(b), b.sub(c), c.sub(a)]
        .iter()
        .map(|e| e.x * e.x + e.y * e.y)
        .fold(0.0, f64::max);
    if det.abs() <= f64::EPSILON * scale {
        return None;
    }
    let l0 = ((b.y - c.y) * (p.x - c.x) + (c.x - b.x) * (p.y - c.y)) / det;
    let l1 = ((c.y - a.y) * (p.x - c.x) + (a.x - c.x) * (p.y - c.y)) / det;
    let l2 = 1.0 - l0 - l1;
    if !within_unit(l0) || !within_unit(l1) || !within_unit(l2) {
        return None;
    }
    let (l0, l1, l2) = (l0.max(0.0), l1.max(0.0), l2.max(0.0));
    let sum = l0 + l1 + l2;
    Some([l0 / sum, l1 / sum, l2 / sum])
}

#[inline]
fn within_unit(v: f64) -> bool {
    (-LOCATE_TOLERANCE..=1.0 + LOCATE_TOLERANCE).contains(&v)
}
