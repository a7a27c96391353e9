//! Logically rectangular (structured) grids.
//!
//! Coordinate arrays are indexed `[j, i]` with `i` running along the first
//! (longitude / x) dimension, so flat ids are `j * nx + i`. Centers have
//! shape `[ny, nx]`, corners `[ny + 1, nx + 1]`.

use ndarray::Array2;

use super::{CellNodes, StaggerLocation};
use crate::error::{RegridError, Result};
use crate::geometry::{wrap_delta, CoordSys, Point2, LONGITUDE_PERIOD};

/// A 2-D structured grid, rectilinear or curvilinear.
#[derive(Debug, Clone, PartialEq)]
pub struct StructuredGrid {
    nx: usize,
    ny: usize,
    coord_sys: CoordSys,
    periodic: bool,
    center_x: Array2<f64>,
    center_y: Array2<f64>,
    corner_x: Option<Array2<f64>>,
    corner_y: Option<Array2<f64>>,
    center_mask: Option<Array2<i32>>,
    corner_mask: Option<Array2<i32>>,
}

impl StructuredGrid {
    /// Create a curvilinear grid from `[ny, nx]` center coordinate arrays
    pub fn new(center_x: Array2<f64>, center_y: Array2<f64>, coord_sys: CoordSys) -> Result<Self> {
        if center_x.shape() != center_y.shape() {
            return Err(RegridError::incompatible(format!(
                "Center coordinate arrays differ in shape: {:?} vs {:?}",
                center_x.shape(),
                center_y.shape()
            )));
        }
        let (ny, nx) = center_x.dim();
        if nx == 0 || ny == 0 {
            return Err(RegridError::incompatible("Grid must have at least one cell"));
        }

        Ok(Self {
            nx,
            ny,
            coord_sys,
            periodic: false,
            center_x,
            center_y,
            corner_x: None,
            corner_y: None,
            center_mask: None,
            corner_mask: None,
        })
    }

    /// Create a rectilinear grid from 1-D center coordinates
    pub fn rectilinear(xs: &[f64], ys: &[f64], coord_sys: CoordSys) -> Result<Self> {
        let (nx, ny) = (xs.len(), ys.len());
        let center_x = Array2::from_shape_fn((ny, nx), |(_, i)| xs[i]);
        let center_y = Array2::from_shape_fn((ny, nx), |(j, _)| ys[j]);
        Self::new(center_x, center_y, coord_sys)
    }

    /// Uniform global longitude/latitude grid with exact cell bounds.
    ///
    /// Longitudes start at 0, latitudes span -90 to 90; the grid is periodic.
    pub fn global(nx: usize, ny: usize) -> Result<Self> {
        if nx == 0 || ny == 0 {
            return Err(RegridError::incompatible("Grid must have at least one cell"));
        }
        let dlon = LONGITUDE_PERIOD / nx as f64;
        let dlat = 180.0 / ny as f64;
        let lon_edges: Vec<f64> = (0..=nx).map(|i| i as f64 * dlon).collect();
        let lat_edges: Vec<f64> = (0..=ny).map(|j| -90.0 + j as f64 * dlat).collect();
        Self::from_edges(&lon_edges, &lat_edges, CoordSys::SphericalDeg)
            .map(|grid| grid.with_periodic(true))
    }

    /// Uniform regional longitude/latitude grid with exact cell bounds
    pub fn regional(
        lon_range: (f64, f64),
        lat_range: (f64, f64),
        nx: usize,
        ny: usize,
    ) -> Result<Self> {
        if nx == 0 || ny == 0 {
            return Err(RegridError::incompatible("Grid must have at least one cell"));
        }
        let dlon = (lon_range.1 - lon_range.0) / nx as f64;
        let dlat = (lat_range.1 - lat_range.0) / ny as f64;
        let lon_edges: Vec<f64> = (0..=nx).map(|i| lon_range.0 + i as f64 * dlon).collect();
        let lat_edges: Vec<f64> = (0..=ny).map(|j| lat_range.0 + j as f64 * dlat).collect();
        Self::from_edges(&lon_edges, &lat_edges, CoordSys::SphericalDeg)
    }

    /// Rectilinear grid from cell edges; centers are edge midpoints
    pub fn from_edges(x_edges: &[f64], y_edges: &[f64], coord_sys: CoordSys) -> Result<Self> {
        if x_edges.len() < 2 || y_edges.len() < 2 {
            return Err(RegridError::incompatible(
                "At least two edges are needed along each dimension",
            ));
        }
        let xs: Vec<f64> = x_edges.windows(2).map(|w| 0.5 * (w[0] + w[1])).collect();
        let ys: Vec<f64> = y_edges.windows(2).map(|w| 0.5 * (w[0] + w[1])).collect();
        let grid = Self::rectilinear(&xs, &ys, coord_sys)?;
        let corner_x = Array2::from_shape_fn((ys.len() + 1, xs.len() + 1), |(_, i)| x_edges[i]);
        let corner_y = Array2::from_shape_fn((ys.len() + 1, xs.len() + 1), |(j, _)| y_edges[j]);
        grid.with_corners(corner_x, corner_y)
    }

    /// Attach `[ny + 1, nx + 1]` corner coordinates
    pub fn with_corners(mut self, corner_x: Array2<f64>, corner_y: Array2<f64>) -> Result<Self> {
        let expected = (self.ny + 1, self.nx + 1);
        if corner_x.dim() != expected || corner_y.dim() != expected {
            return Err(RegridError::incompatible(format!(
                "Corner arrays must have shape {:?}, got {:?} and {:?}",
                expected,
                corner_x.dim(),
                corner_y.dim()
            )));
        }
        self.corner_x = Some(corner_x);
        self.corner_y = Some(corner_y);
        Ok(self)
    }

    /// Derive corner coordinates from centers.
    ///
    /// Interior corners average the four surrounding centers; edges are
    /// linearly extrapolated. Spherical latitudes are clamped to ±90.
    pub fn with_derived_corners(mut self) -> Self {
        let (nx, ny) = (self.nx, self.ny);
        let period = if self.periodic {
            self.coord_sys.period()
        } else {
            None
        };

        // Ghost-padded centers, shape [ny + 2, nx + 2].
        let ghost = |src: &Array2<f64>, is_x: bool| -> Array2<f64> {
            Array2::from_shape_fn((ny + 2, nx + 2), |(gj, gi)| {
                let j = gj as isize - 1;
                let i = gi as isize - 1;
                let fetch = |jj: isize, ii: isize| -> f64 {
                    let jj = jj.clamp(0, ny as isize - 1) as usize;
                    let ii = ii.clamp(0, nx as isize - 1) as usize;
                    src[[jj, ii]]
                };
                let extrapolate = |a: f64, b: f64| 2.0 * a - b;

                let along_j = |ii: isize| -> f64 {
                    if j < 0 {
                        if ny > 1 {
                            extrapolate(fetch(0, ii), fetch(1, ii))
                        } else {
                            fetch(0, ii)
                        }
                    } else if j >= ny as isize {
                        if ny > 1 {
                            extrapolate(fetch(ny as isize - 1, ii), fetch(ny as isize - 2, ii))
                        } else {
                            fetch(ny as isize - 1, ii)
                        }
                    } else {
                        fetch(j, ii)
                    }
                };

                if (0..nx as isize).contains(&i) {
                    return along_j(i);
                }
                match (period, is_x) {
                    (Some(p), true) => {
                        // Wrap around and shift by one period.
                        let wrapped = i.rem_euclid(nx as isize);
                        let shift = if i < 0 { -p } else { p };
                        along_j(wrapped) + shift
                    }
                    (Some(_), false) => along_j(i.rem_euclid(nx as isize)),
                    (None, _) => {
                        let (edge, inner) = if i < 0 {
                            (0, 1.min(nx as isize - 1))
                        } else {
                            (nx as isize - 1, (nx as isize - 2).max(0))
                        };
                        if nx > 1 {
                            extrapolate(along_j(edge), along_j(inner))
                        } else {
                            along_j(edge)
                        }
                    }
                }
            })
        };

        let gx = ghost(&self.center_x, true);
        let gy = ghost(&self.center_y, false);

        let average = |g: &Array2<f64>, j: usize, i: usize, unwrap: bool| -> f64 {
            let a = g[[j, i]];
            let mut sum = a;
            for &(dj, di) in &[(0usize, 1usize), (1, 0), (1, 1)] {
                let v = g[[j + dj, i + di]];
                sum += match (unwrap, self.coord_sys.period()) {
                    (true, Some(p)) => a + wrap_delta(v - a, p),
                    _ => v,
                };
            }
            sum / 4.0
        };

        let spherical = self.coord_sys == CoordSys::SphericalDeg;
        let corner_x = Array2::from_shape_fn((ny + 1, nx + 1), |(j, i)| average(&gx, j, i, true));
        let corner_y = Array2::from_shape_fn((ny + 1, nx + 1), |(j, i)| {
            let v = average(&gy, j, i, false);
            if spherical {
                v.clamp(-90.0, 90.0)
            } else {
                v
            }
        });

        self.corner_x = Some(corner_x);
        self.corner_y = Some(corner_y);
        self
    }

    /// Mark the first dimension as periodic (wrapping longitude)
    pub fn with_periodic(mut self, periodic: bool) -> Self {
        self.periodic = periodic;
        self
    }

    /// Attach an integer mask for a stagger location
    pub fn with_mask(mut self, location: StaggerLocation, mask: Array2<i32>) -> Result<Self> {
        let shape = self.location_dims(location);
        if mask.dim() != shape {
            return Err(RegridError::incompatible(format!(
                "Mask for {} must have shape {:?}, got {:?}",
                location,
                shape,
                mask.dim()
            )));
        }
        match location {
            StaggerLocation::Center => self.center_mask = Some(mask),
            StaggerLocation::Corner => self.corner_mask = Some(mask),
        }
        Ok(self)
    }

    pub fn nx(&self) -> usize {
        self.nx
    }

    pub fn ny(&self) -> usize {
        self.ny
    }

    pub fn coord_sys(&self) -> CoordSys {
        self.coord_sys
    }

    pub fn is_periodic(&self) -> bool {
        self.periodic
    }

    pub fn has_corners(&self) -> bool {
        self.corner_x.is_some()
    }

    /// `(rows, columns)` of the location's index space
    pub fn location_dims(&self, location: StaggerLocation) -> (usize, usize) {
        match location {
            StaggerLocation::Center => (self.ny, self.nx),
            StaggerLocation::Corner => (self.ny + 1, self.nx + 1),
        }
    }

    fn coords(&self, location: StaggerLocation) -> Option<(&Array2<f64>, &Array2<f64>)> {
        match location {
            StaggerLocation::Center => Some((&self.center_x, &self.center_y)),
            StaggerLocation::Corner => self.corner_x.as_ref().zip(self.corner_y.as_ref()),
        }
    }

    /// Location coordinates in flat-id order
    pub fn points(&self, location: StaggerLocation) -> Result<Vec<Point2>> {
        let (xs, ys) = self.coords(location).ok_or_else(|| {
            RegridError::incompatible("Grid has no corner coordinates")
        })?;
        Ok(xs.iter().zip(ys.iter()).map(|(&x, &y)| Point2::new(x, y)).collect())
    }

    /// Flattened mask values for a location, if a mask is attached
    pub fn mask(&self, location: StaggerLocation) -> Option<Vec<i32>> {
        let mask = match location {
            StaggerLocation::Center => self.center_mask.as_ref(),
            StaggerLocation::Corner => self.corner_mask.as_ref(),
        };
        mask.map(|m| m.iter().copied().collect())
    }

    /// Quads of neighbouring location points used for point location.
    ///
    /// Center quads wrap from the last column to the first on periodic
    /// grids; corner quads never need to since the corner row is closed.
    pub fn stencil_cells(&self, location: StaggerLocation) -> Result<Vec<CellNodes>> {
        if self.coords(location).is_none() {
            return Err(RegridError::incompatible("Grid has no corner coordinates"));
        }
        let (rows, cols) = self.location_dims(location);
        let wrap = self.periodic && location == StaggerLocation::Center && cols > 1;
        let quad_cols = if wrap { cols } else { cols.saturating_sub(1) };

        let mut cells = Vec::with_capacity(rows.saturating_sub(1) * quad_cols);
        for j in 0..rows.saturating_sub(1) {
            for i in 0..quad_cols {
                let ip = (i + 1) % cols;
                cells.push(CellNodes::Quad([
                    j * cols + i,
                    j * cols + ip,
                    (j + 1) * cols + ip,
                    (j + 1) * cols + i,
                ]));
            }
        }
        Ok(cells)
    }

    /// Cell boundary (four corners) of center cell `(j, i)`
    pub fn cell_polygon(&self, j: usize, i: usize) -> Result<Vec<Point2>> {
        let (cx, cy) = self
            .corner_x
            .as_ref()
            .zip(self.corner_y.as_ref())
            .ok_or_else(|| {
                RegridError::incompatible(
                    "Conservative regridding requires grid corner coordinates",
                )
            })?;
        Ok([(j, i), (j, i + 1), (j + 1, i + 1), (j + 1, i)]
            .iter()
            .map(|&(jj, ii)| Point2::new(cx[[jj, ii]], cy[[jj, ii]]))
            .collect())
    }

    /// Latitude-like coordinate of location row `j` (row mean)
    pub fn row_mean_y(&self, location: StaggerLocation, j: usize) -> Option<f64> {
        let (_, ys) = self.coords(location)?;
        let row = ys.row(j);
        row.mean()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_global_grid_bounds() {
        let grid = StructuredGrid::global(4, 2).unwrap();
        assert!(grid.is_periodic());
        assert!(grid.has_corners());
        let poly = grid.cell_polygon(0, 0).unwrap();
        assert_eq!(poly[0], Point2::new(0.0, -90.0));
        assert_eq!(poly[2], Point2::new(90.0, 0.0));
        let points = grid.points(StaggerLocation::Center).unwrap();
        assert_eq!(points.len(), 8);
        assert_eq!(points[1], Point2::new(135.0, -45.0));
    }

    #[test]
    fn test_periodic_center_stencil_wraps() {
        let grid = StructuredGrid::global(4, 3).unwrap();
        let cells = grid.stencil_cells(StaggerLocation::Center).unwrap();
        assert_eq!(cells.len(), 4 * 2);
        assert_eq!(cells[3], CellNodes::Quad([3, 0, 4, 7]));

        let corner_cells = grid.stencil_cells(StaggerLocation::Corner).unwrap();
        assert_eq!(corner_cells.len(), 4 * 3);
    }

    #[test]
    fn test_derived_corners_rectilinear() {
        let grid = StructuredGrid::rectilinear(&[0.5, 1.5, 2.5], &[0.5, 1.5], CoordSys::Cartesian)
            .unwrap()
            .with_derived_corners();
        let poly = grid.cell_polygon(1, 2).unwrap();
        assert!((poly[0].x - 2.0).abs() < 1e-12);
        assert!((poly[0].y - 1.0).abs() < 1e-12);
        assert!((poly[2].x - 3.0).abs() < 1e-12);
        assert!((poly[2].y - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_derived_corners_clamp_latitude() {
        let lons: Vec<f64> = (0..8).map(|i| i as f64 * 45.0).collect();
        let lats = [-67.5, -22.5, 22.5, 67.5];
        let grid = StructuredGrid::rectilinear(&lons, &lats, CoordSys::SphericalDeg)
            .unwrap()
            .with_periodic(true)
            .with_derived_corners();
        let top = grid.cell_polygon(3, 0).unwrap();
        assert!((top[2].y - 90.0).abs() < 1e-12);
        // First corner column sits half a cell west of longitude 0.
        assert!((top[0].x + 22.5).abs() < 1e-12);
    }

    #[test]
    fn test_mask_shape_checked() {
        let grid = StructuredGrid::global(4, 2).unwrap();
        assert!(grid
            .clone()
            .with_mask(StaggerLocation::Center, Array2::zeros((2, 4)))
            .is_ok());
        assert!(grid
            .with_mask(StaggerLocation::Corner, Array2::zeros((2, 4)))
            .is_err());
    }
}
