//! Planar and spherical geometry primitives.
//!
//! Coordinates are either planar (`x`, `y`) or longitude/latitude in degrees.
//! Spherical cells are clipped in the Lambert cylindrical equal-area plane and
//! point distances use the unit-sphere chord, which orders like great-circle
//! distance.

pub mod mapping;
pub mod polygon;

use serde::{Deserialize, Serialize};

/// Longitude period in degrees
pub const LONGITUDE_PERIOD: f64 = 360.0;

/// Coordinate system of a discretization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoordSys {
    /// Planar coordinates
    Cartesian,
    /// Longitude/latitude in degrees
    #[default]
    SphericalDeg,
}

impl CoordSys {
    /// Period of the first coordinate, if it wraps
    pub fn period(&self) -> Option<f64> {
        match self {
            CoordSys::Cartesian => None,
            CoordSys::SphericalDeg => Some(LONGITUDE_PERIOD),
        }
    }

    /// Period of the first coordinate in the equal-area clipping plane
    pub fn area_period(&self) -> Option<f64> {
        match self {
            CoordSys::Cartesian => None,
            CoordSys::SphericalDeg => Some(2.0 * std::f64::consts::PI),
        }
    }

    /// Embed a point in 3-D for nearest-neighbour distance
    pub fn embed(&self, p: Point2) -> [f64; 3] {
        match self {
            CoordSys::Cartesian => [p.x, p.y, 0.0],
            CoordSys::SphericalDeg => {
                let lon = p.x.to_radians();
                let lat = p.y.to_radians();
                [lat.cos() * lon.cos(), lat.cos() * lon.sin(), lat.sin()]
            }
        }
    }

    /// Map a point to the plane used for area computation and clipping
    pub fn to_area_plane(&self, p: Point2) -> Point2 {
        match self {
            CoordSys::Cartesian => p,
            CoordSys::SphericalDeg => Point2::new(p.x.to_radians(), p.y.to_radians().sin()),
        }
    }

    /// Distance between two points (planar, or great-circle in radians)
    pub fn distance(&self, a: Point2, b: Point2) -> f64 {
        match self {
            CoordSys::Cartesian => ((a.x - b.x).powi(2) + (a.y - b.y).powi(2)).sqrt(),
            CoordSys::SphericalDeg => {
                let (lat1, lat2) = (a.y.to_radians(), b.y.to_radians());
                let dlat = lat2 - lat1;
                let dlon = (b.x - a.x).to_radians();
                let h = (dlat / 2.0).sin().powi(2)
                    + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
                2.0 * h.sqrt().min(1.0).asin()
            }
        }
    }
}

/// A 2-D point
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point2 {
    pub x: f64,
    pub y: f64,
}

impl Point2 {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Translate along the first coordinate
    #[inline]
    pub fn shifted(&self, dx: f64) -> Self {
        Self::new(self.x + dx, self.y)
    }

    #[inline]
    pub fn sub(&self, other: Point2) -> Point2 {
        Point2::new(self.x - other.x, self.y - other.y)
    }

    #[inline]
    pub fn cross(&self, other: Point2) -> f64 {
        self.x * other.y - self.y * other.x
    }
}

/// Axis-aligned bounding box
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl BoundingBox {
    /// Bounding box of a point set; `None` when empty
    pub fn from_points(points: &[Point2]) -> Option<Self> {
        let first = points.first()?;
        let mut bbox = Self {
            min_x: first.x,
            min_y: first.y,
            max_x: first.x,
            max_y: first.y,
        };
        for p in &points[1..] {
            bbox.min_x = bbox.min_x.min(p.x);
            bbox.min_y = bbox.min_y.min(p.y);
            bbox.max_x = bbox.max_x.max(p.x);
            bbox.max_y = bbox.max_y.max(p.y);
        }
        Some(bbox)
    }

    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    pub fn area(&self) -> f64 {
        self.width() * self.height()
    }

    /// Grow the box by `amount` on every side
    pub fn expand(&self, amount: f64) -> Self {
        Self {
            min_x: self.min_x - amount,
            min_y: self.min_y - amount,
            max_x: self.max_x + amount,
            max_y: self.max_y + amount,
        }
    }

    /// Translate along the first coordinate
    pub fn shifted(&self, dx: f64) -> Self {
        Self {
            min_x: self.min_x + dx,
            max_x: self.max_x + dx,
            ..*self
        }
    }
}

/// Wrap a longitude difference into (-180, 180]
#[inline]
pub fn wrap_delta(delta: f64, period: f64) -> f64 {
    let half = period / 2.0;
    let mut d = delta.rem_euclid(period);
    if d > half {
        d -= period;
    }
    d
}

/// Unwrap a ring of points so consecutive longitudes never jump by more than
/// half a period; the first point is kept as-is
pub fn unwrap_ring(points: &mut [Point2], period: Option<f64>) {
    let Some(period) = period else {
        return;
    };
    for k in 1..points.len() {
        let prev = points[k - 1].x;
        points[k].x = prev + wrap_delta(points[k].x - prev, period);
    }
}

/// Latitude of the pole an unwrapped ring winds around, if any.
///
/// Such a ring sweeps a full period of longitude; the pole on the side of
/// its mean latitude is the enclosed one.
pub fn enclosed_pole(points: &[Point2], period: Option<f64>) -> Option<f64> {
    let period = period?;
    let (first, last) = (points.first()?, points.last()?);
    let sweep = last.x - first.x + wrap_delta(first.x - last.x, period);
    if (sweep.abs() - period).abs() > 1e-9 * period {
        return None;
    }
    let mean_lat = points.iter().map(|p| p.y).sum::<f64>() / points.len() as f64;
    Some(if mean_lat >= 0.0 { 90.0 } else { -90.0 })
}

/// Close an unwrapped ring that winds once around a pole.
///
/// In the clipping plane such a ring is an open curve; it is extended along
/// the pole line. Returns whether it was closed.
pub fn close_polar_ring(points: &mut Vec<Point2>, period: Option<f64>) -> bool {
    let (Some(period), Some(pole)) = (period, enclosed_pole(points, period)) else {
        return false;
    };
    let (first, last) = (points[0], points[points.len() - 1]);
    let end = last.x + wrap_delta(first.x - last.x, period);
    points.push(Point2::new(end, first.y));
    points.push(Point2::new(end, pole));
    points.push(Point2::new(first.x, pole));
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrap_delta() {
        assert!((wrap_delta(350.0, 360.0) - -10.0).abs() < 1e-12);
        assert!((wrap_delta(-350.0, 360.0) - 10.0).abs() < 1e-12);
        assert!((wrap_delta(180.0, 360.0) - 180.0).abs() < 1e-12);
        assert!((wrap_delta(10.0, 360.0) - 10.0).abs() < 1e-12);
    }

    #[test]
    fn test_unwrap_ring_across_dateline() {
        let mut ring = vec![
            Point2::new(355.0, 0.0),
            Point2::new(5.0, 0.0),
            Point2::new(5.0, 10.0),
            Point2::new(355.0, 10.0),
        ];
        unwrap_ring(&mut ring, Some(360.0));
        assert!((ring[1].x - 365.0).abs() < 1e-12);
        assert!((ring[3].x - 355.0).abs() < 1e-12);
    }

    #[test]
    fn test_close_polar_ring() {
        let mut cap = vec![
            Point2::new(0.0, 60.0),
            Point2::new(90.0, 60.0),
            Point2::new(180.0, 60.0),
            Point2::new(270.0, 60.0),
        ];
        unwrap_ring(&mut cap, Some(360.0));
        assert!(close_polar_ring(&mut cap, Some(360.0)));
        assert_eq!(cap.len(), 7);
        assert_eq!(cap[4], Point2::new(360.0, 60.0));
        assert_eq!(cap[5], Point2::new(360.0, 90.0));
        assert_eq!(cap[6], Point2::new(0.0, 90.0));

        let mut south = vec![
            Point2::new(0.0, -70.0),
            Point2::new(240.0, -70.0),
            Point2::new(120.0, -70.0),
        ];
        unwrap_ring(&mut south, Some(360.0));
        assert!(close_polar_ring(&mut south, Some(360.0)));
        assert_eq!(south[5], Point2::new(-360.0, -90.0));
        assert_eq!(south[6], Point2::new(0.0, -90.0));
    }

    #[test]
    fn test_close_polar_ring_leaves_ordinary_cells() {
        let mut ring = vec![
            Point2::new(355.0, 0.0),
            Point2::new(5.0, 0.0),
            Point2::new(5.0, 10.0),
            Point2::new(355.0, 10.0),
        ];
        unwrap_ring(&mut ring, Some(360.0));
        assert!(!close_polar_ring(&mut ring, Some(360.0)));
        assert_eq!(ring.len(), 4);

        let mut planar = vec![Point2::new(0.0, 0.0), Point2::new(1.0, 0.0), Point2::new(0.0, 1.0)];
        assert!(!close_polar_ring(&mut planar, None));
        assert_eq!(enclosed_pole(&planar, None), None);
    }

    #[test]
    fn test_embed_is_unit_length() {
        let p = CoordSys::SphericalDeg.embed(Point2::new(123.0, -45.0));
        let norm = (p[0] * p[0] + p[1] * p[1] + p[2] * p[2]).sqrt();
        assert!((norm - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_great_circle_distance() {
        let d = CoordSys::SphericalDeg.distance(Point2::new(0.0, 0.0), Point2::new(90.0, 0.0));
        assert!((d - std::f64::consts::FRAC_PI_2).abs() < 1e-12);
        let d = CoordSys::SphericalDeg.distance(Point2::new(10.0, 90.0), Point2::new(200.0, 90.0));
        assert!(d.abs() < 1e-7);
    }

    #[test]
    fn test_equal_area_plane() {
        let p = CoordSys::SphericalDeg.to_area_plane(Point2::new(180.0, 90.0));
        assert!((p.x - std::f64::consts::PI).abs() < 1e-12);
        assert!((p.y - 1.0).abs() < 1e-12);
    }
}
