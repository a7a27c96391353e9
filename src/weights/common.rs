//! Common utilities for weight generators.
//!
//! This module provides shared functionality used by the point methods:
//! mask flags, source-cell sampling with pole fallback and parallel row
//! collection.

use rayon::prelude::*;

use super::{GeneratorInput, WeightEntry};
use crate::discretization::{Discretization, StaggerLocation};
use crate::error::Result;
use crate::geometry::Point2;
use crate::intersect::PointLocator;
use crate::pole::PoleTreatment;

/// Per-location flags for mask values accepted by `is_masked`
pub fn masked_flags(
    disc: &Discretization,
    location: StaggerLocation,
    is_masked: impl Fn(i32) -> bool,
) -> Vec<bool> {
    match disc.mask(location) {
        Some(values) => values.into_iter().map(is_masked).collect(),
        None => vec![false; disc.location_count(location)],
    }
}

/// Where a destination point was found in the source
#[derive(Debug, Clone, PartialEq)]
pub enum Sample {
    /// Inside a regular stencil cell
    Cell(Vec<(usize, f64)>),
    /// Inside a pole cap
    Pole(Vec<(usize, f64)>),
}

impl Sample {
    pub fn weights(&self) -> &[(usize, f64)] {
        match self {
            Sample::Cell(w) | Sample::Pole(w) => w,
        }
    }
}

/// Stencil cell location with pole cap fallback
pub struct SourceSampler {
    locator: PointLocator,
    pole: Option<PoleTreatment>,
}

impl SourceSampler {
    pub fn new(input: &GeneratorInput<'_>) -> Result<Self> {
        let points = input.src.points(input.src_location)?;
        let cells = input.src.stencil_cells(input.src_location)?;
        let locator = PointLocator::new(&points, &cells, input.src.coord_sys());
        let pole = PoleTreatment::build(
            input.src,
            input.src_location,
            input.options,
            &input.src_masked,
        )?;
        Ok(Self { locator, pole })
    }

    /// Bilinear (or barycentric) weights of the source at `p`
    pub fn sample(&self, p: Point2) -> Option<Sample> {
        if let Some(located) = self.locator.locate(p) {
            return Some(Sample::Cell(
                located.nodes.into_iter().zip(located.weights).collect(),
            ));
        }
        self.pole
            .as_ref()
            .and_then(|pole| pole.locate(p))
            .map(Sample::Pole)
    }
}

/// Compute rows for every unmasked destination in parallel and concatenate
/// them in destination order
pub fn collect_rows<F>(points: &[Point2], dst_masked: &[bool], row: F) -> Vec<WeightEntry>
where
    F: Fn(usize, Point2) -> Vec<(usize, f64)> + Sync,
{
    points
        .par_iter()
        .enumerate()
        .filter(|(d, _)| !dst_masked[*d])
        .flat_map_iter(|(d, &p)| {
            row(d, p)
                .into_iter()
                .map(move |(s, w)| WeightEntry::new(s, d, w))
        })
        .collect()
}
