//! Polygon utilities: orientation, validity checks and clipping.

use super::{BoundingBox, Point2};

/// Relative tolerance under which a cell counts as zero-area
pub const ZERO_AREA_TOLERANCE: f64 = 1e-12;

/// Signed shoelace area; positive for counter-clockwise rings
pub fn signed_area(points: &[Point2]) -> f64 {
    let n = points.len();
    if n < 3 {
        return 0.0;
    }
    let mut sum = 0.0;
    for k in 0..n {
        let p = points[k];
        let q = points[(k + 1) % n];
        sum += p.x * q.y - q.x * p.y;
    }
    0.5 * sum
}

/// Remove repeated consecutive vertices (including the closing one)
pub fn dedupe(points: &[Point2]) -> Vec<Point2> {
    let Some(bbox) = BoundingBox::from_points(points) else {
        return Vec::new();
    };
    let eps = 1e-14 * (bbox.width().abs() + bbox.height().abs()).max(f64::MIN_POSITIVE);

    let same = |a: &Point2, b: &Point2| (a.x - b.x).abs() <= eps && (a.y - b.y).abs() <= eps;

    let mut out: Vec<Point2> = Vec::with_capacity(points.len());
    for p in points {
        if out.last().map_or(true, |last| !same(last, p)) {
            out.push(*p);
        }
    }
    while out.len() > 1 && same(&out[0], &out[out.len() - 1]) {
        out.pop();
    }
    out
}

fn orientation(a: Point2, b: Point2, c: Point2) -> f64 {
    b.sub(a).cross(c.sub(a))
}

fn segments_cross(a: Point2, b: Point2, c: Point2, d: Point2) -> bool {
    let o1 = orientation(a, b, c);
    let o2 = orientation(a, b, d);
    let o3 = orientation(c, d, a);
    let o4 = orientation(c, d, b);
    o1 * o2 < 0.0 && o3 * o4 < 0.0
}

/// Whether two non-adjacent edges of the ring properly cross
pub fn is_self_intersecting(points: &[Point2]) -> bool {
    let n = points.len();
    if n < 4 {
        return false;
    }
    for i in 0..n {
        let (a, b) = (points[i], points[(i + 1) % n]);
        for j in (i + 2)..n {
            if i == 0 && j == n - 1 {
                continue;
            }
            let (c, d) = (points[j], points[(j + 1) % n]);
            if segments_cross(a, b, c, d) {
                return true;
            }
        }
    }
    false
}

/// Clean a cell ring and orient it counter-clockwise.
///
/// Returns the reason when the cell is degenerate.
pub fn prepare_cell(points: &[Point2]) -> Result<Vec<Point2>, &'static str> {
    let mut ring = dedupe(points);
    if ring.len() < 3 {
        return Err("fewer than three distinct vertices");
    }
    if is_self_intersecting(&ring) {
        return Err("self-intersecting boundary");
    }

    let area = signed_area(&ring);
    let bbox = BoundingBox::from_points(&ring).ok_or("empty cell")?;
    let scale = bbox.width().powi(2) + bbox.height().powi(2);
    if scale <= 0.0 || area.abs() <= ZERO_AREA_TOLERANCE * scale {
        return Err("zero area");
    }

    if area < 0.0 {
        ring.reverse();
    }
    Ok(ring)
}

/// Whether a counter-clockwise ring is convex
pub fn is_convex(ring: &[Point2]) -> bool {
    let n = ring.len();
    let scale = BoundingBox::from_points(ring)
        .map(|b| b.width().powi(2) + b.height().powi(2))
        .unwrap_or(0.0);
    (0..n).all(|k| orientation(ring[k], ring[(k + 1) % n], ring[(k + 2) % n]) >= -1e-14 * scale)
}

/// Sutherland–Hodgman clipping of `subject` against a convex,
/// counter-clockwise `clip` ring
pub fn clip_convex(subject: &[Point2], clip: &[Point2]) -> Vec<Point2> {
    let mut output = subject.to_vec();
    let n = clip.len();

    for k in 0..n {
        if output.is_empty() {
            break;
        }
        let a = clip[k];
        let b = clip[(k + 1) % n];
        let edge = b.sub(a);

        let input = std::mem::take(&mut output);
        let m = input.len();
        for idx in 0..m {
            let p = input[idx];
            let q = input[(idx + 1) % m];
            let cp = edge.cross(p.sub(a));
            let cq = edge.cross(q.sub(a));

            if cp >= 0.0 {
                output.push(p);
                if cq < 0.0 {
                    output.push(intersect(p, q, cp, cq));
                }
            } else if cq >= 0.0 {
                output.push(intersect(p, q, cp, cq));
            }
        }
    }
    output
}

#[inline]
fn intersect(p: Point2, q: Point2, cp: f64, cq: f64) -> Point2 {
    let t = cp / (cp - cq);
    Point2::new(p.x + t * (q.x - p.x), p.y + t * (q.y - p.y))
}

/// Ear-clipping triangulation of a simple counter-clockwise ring
pub fn triangulate(ring: &[Point2]) -> Vec<[Point2; 3]> {
    let mut remaining: Vec<Point2> = ring.to_vec();
    let mut triangles = Vec::with_capacity(ring.len().saturating_sub(2));

    while remaining.len() > 3 {
        let n = remaining.len();
        let mut clipped = false;
        for i in 0..n {
            let prev = remaining[(i + n - 1) % n];
            let cur = remaining[i];
            let next = remaining[(i + 1) % n];
            if orientation(prev, cur, next) <= 0.0 {
                continue;
            }
            let blocked = remaining.iter().enumerate().any(|(k, &p)| {
                k != i
                    && k != (i + n - 1) % n
                    && k != (i + 1) % n
                    && point_in_triangle(p, prev, cur, next)
            });
            if !blocked {
                triangles.push([prev, cur, next]);
                remaining.remove(i);
                clipped = true;
                break;
            }
        }
        if !clipped {
            // Numerically stuck; fan out the rest from the first vertex.
            for k in 1..remaining.len() - 1 {
                triangles.push([remaining[0], remaining[k], remaining[k + 1]]);
            }
            return triangles;
        }
    }
    if remaining.len() == 3 {
        triangles.push([remaining[0], remaining[1], remaining[2]]);
    }
    triangles
}

fn point_in_triangle(p: Point2, a: Point2, b: Point2, c: Point2) -> bool {
    orientation(a, b, p) >= 0.0 && orientation(b, c, p) >= 0.0 && orientation(c, a, p) >= 0.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(x0: f64, y0: f64, size: f64) -> Vec<Point2> {
        vec![
            Point2::new(x0, y0),
            Point2::new(x0 + size, y0),
            Point2::new(x0 + size, y0 + size),
            Point2::new(x0, y0 + size),
        ]
    }

    #[test]
    fn test_signed_area_orientation() {
        let ccw = square(0.0, 0.0, 2.0);
        assert!((signed_area(&ccw) - 4.0).abs() < 1e-12);
        let mut cw = ccw.clone();
        cw.reverse();
        assert!((signed_area(&cw) + 4.0).abs() < 1e-12);
    }

    #[test]
    fn test_prepare_cell_reorients_and_dedupes() {
        let mut cw = square(0.0, 0.0, 1.0);
        cw.reverse();
        cw.push(cw[0]);
        let ring = prepare_cell(&cw).unwrap();
        assert_eq!(ring.len(), 4);
        assert!(signed_area(&ring) > 0.0);
    }

    #[test]
    fn test_collapsed_quad_is_a_triangle() {
        let quad = vec![
            Point2::new(0.0, 0.0),
            Point2::new(1.0, 0.0),
            Point2::new(0.5, 1.0),
            Point2::new(0.5, 1.0),
        ];
        let ring = prepare_cell(&quad).unwrap();
        assert_eq!(ring.len(), 3);
    }

    #[test]
    fn test_degenerate_cells() {
        let collinear = vec![
            Point2::new(0.0, 0.0),
            Point2::new(1.0, 1.0),
            Point2::new(2.0, 2.0),
        ];
        assert_eq!(prepare_cell(&collinear), Err("zero area"));

        let bowtie = vec![
            Point2::new(0.0, 0.0),
            Point2::new(1.0, 1.0),
            Point2::new(1.0, 0.0),
            Point2::new(0.0, 1.0),
        ];
        assert_eq!(prepare_cell(&bowtie), Err("self-intersecting boundary"));

        let point = vec![Point2::new(1.0, 1.0); 4];
        assert_eq!(prepare_cell(&point), Err("fewer than three distinct vertices"));
    }

    #[test]
    fn test_triangulate_concave_ring() {
        let l_shape = vec![
            Point2::new(0.0, 0.0),
            Point2::new(2.0, 0.0),
            Point2::new(2.0, 1.0),
            Point2::new(1.0, 1.0),
            Point2::new(1.0, 2.0),
            Point2::new(0.0, 2.0),
        ];
        assert!(!is_convex(&l_shape));
        let triangles = triangulate(&l_shape);
        assert_eq!(triangles.len(), 4);
        let total: f64 = triangles.iter().map(|t| signed_area(t)).sum();
        assert!((total - 3.0).abs() < 1e-12);
    }
}
