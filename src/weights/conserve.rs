//! First-order conservative weights.
//!
//! The raw weight of a `(src, dst)` pair is the area of the intersection of
//! the two cells. Division by the destination area (or by the unmasked
//! covered area) happens in the normalization pass.

use rayon::prelude::*;
use tracing::{debug, warn};

use super::{CellAreas, GeneratorInput, RawWeights, WeightEntry, WeightGenerator};
use crate::discretization::StaggerLocation;
use crate::error::{RegridError, Result, Side};
use crate::intersect::CellGeometry;

/// Conservative weight generator
pub struct ConserveGenerator;

impl ConserveGenerator {
    fn prepare(input: &GeneratorInput<'_>, side: Side) -> Result<(CellGeometry, Vec<usize>)> {
        let disc = match side {
            Side::Source => input.src,
            Side::Destination => input.dst,
        };
        let geometry = CellGeometry::new(&disc.cell_polygons()?, disc.coord_sys());

        let degenerate: Vec<(usize, &'static str)> = geometry.degenerate().collect();
        if let Some(&(cell, reason)) = degenerate.first() {
            if !input.options.ignore_degenerate {
                return Err(RegridError::DegenerateGeometry {
                    side,
                    cell,
                    reason: reason.to_string(),
                });
            }
            warn!(
                side = %side,
                count = degenerate.len(),
                first = cell,
                "Skipping degenerate cells"
            );
        }
        Ok((geometry, degenerate.into_iter().map(|(c, _)| c).collect()))
    }
}

impl WeightGenerator for ConserveGenerator {
    fn generate(&self, input: &GeneratorInput<'_>) -> Result<RawWeights> {
        if input.src_location != StaggerLocation::Center
            || input.dst_location != StaggerLocation::Center
        {
            return Err(RegridError::incompatible(
                "Conservative regridding requires center (cell) data on both sides",
            ));
        }

        let (src_geometry, skipped_src) = Self::prepare(input, Side::Source)?;
        let (dst_geometry, skipped_dst) = Self::prepare(input, Side::Destination)?;

        let area_of = |geometry: &CellGeometry| -> Vec<f64> {
            (0..geometry.len())
                .map(|c| geometry.cell(c).map_or(0.0, |cell| cell.area))
                .collect()
        };
        let areas = CellAreas {
            src: area_of(&src_geometry),
            dst: area_of(&dst_geometry),
        };

        let entries: Vec<WeightEntry> = (0..dst_geometry.len())
            .into_par_iter()
            .filter(|&d| !input.dst_masked[d])
            .flat_map_iter(|d| {
                let hits = match dst_geometry.cell(d) {
                    Ok(cell) => src_geometry.overlaps(cell, |_| false),
                    Err(_) => Vec::new(),
                };
                hits.into_iter()
                    .map(move |(s, area)| WeightEntry::new(s, d, area))
            })
            .collect();

        debug!(
            entries = entries.len(),
            skipped_src = skipped_src.len(),
            skipped_dst = skipped_dst.len(),
            "Generated conservative overlaps"
        );

        Ok(RawWeights {
            entries,
            skipped_dst,
            skipped_src,
            areas: Some(areas),
        })
    }

    fn name(&self) -> &str {
        "conserve"
    }
}
