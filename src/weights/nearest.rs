//! Nearest-neighbour weights.
//!
//! Both directions give weight 1 to a single matched pair. Masked locations
//! are excluded from the search index so they are never matched.

use rayon::prelude::*;
use tracing::debug;

use super::common::collect_rows;
use super::{GeneratorInput, RawWeights, WeightEntry, WeightGenerator};
use crate::error::Result;
use crate::geometry::Point2;
use crate::index::PointIndex;

fn unmasked_index(points: &[Point2], masked: &[bool], input: &GeneratorInput<'_>) -> PointIndex {
    PointIndex::build(
        points
            .iter()
            .copied()
            .enumerate()
            .filter(|(id, _)| !masked[*id]),
        input.src.coord_sys(),
    )
}

/// Each destination takes its nearest source
pub struct NearestStodGenerator;

impl WeightGenerator for NearestStodGenerator {
    fn generate(&self, input: &GeneratorInput<'_>) -> Result<RawWeights> {
        let src_points = input.src.points(input.src_location)?;
        let dst_points = input.dst.points(input.dst_location)?;
        let index = unmasked_index(&src_points, &input.src_masked, input);

        let entries = collect_rows(&dst_points, &input.dst_masked, |_, p| {
            index.nearest(p).map(|s| vec![(s, 1.0)]).unwrap_or_default()
        });

        debug!(entries = entries.len(), "Generated nearest source-to-destination weights");
        Ok(RawWeights {
            entries,
            ..Default::default()
        })
    }

    fn name(&self) -> &str {
        "nearest_stod"
    }
}

/// Each source is sent to its nearest destination
pub struct NearestDtosGenerator;

impl WeightGenerator for NearestDtosGenerator {
    fn generate(&self, input: &GeneratorInput<'_>) -> Result<RawWeights> {
        let src_points = input.src.points(input.src_location)?;
        let dst_points = input.dst.points(input.dst_location)?;
        let index = unmasked_index(&dst_points, &input.dst_masked, input);

        let entries: Vec<WeightEntry> = src_points
            .par_iter()
            .enumerate()
            .filter(|(s, _)| !input.src_masked[*s])
            .filter_map(|(s, &p)| index.nearest(p).map(|d| WeightEntry::new(s, d, 1.0)))
            .collect();

        debug!(entries = entries.len(), "Generated nearest destination-to-source weights");
        Ok(RawWeights {
            entries,
            ..Default::default()
        })
    }

    fn name(&self) -> &str {
        "nearest_dtos"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discretization::{Discretization, StaggerLocation, StructuredGrid};
    use crate::geometry::CoordSys;
    use crate::options::{RegridMethod, RegridOptions};
    use ndarray::Array2;

    fn grids() -> (Discretization, Discretization) {
        let src = StructuredGrid::rectilinear(&[0.0, 1.0, 2.0], &[0.0], CoordSys::Cartesian)
            .unwrap()
            .with_mask(
                StaggerLocation::Center,
                Array2::from_shape_vec((1, 3), vec![0, 1, 0]).unwrap(),
            )
            .unwrap()
            .into();
        let dst = StructuredGrid::rectilinear(&[0.1, 1.1, 1.9, 5.0], &[0.0], CoordSys::Cartesian)
            .unwrap()
            .into();
        (src, dst)
    }

    #[test]
    fn test_stod_skips_masked_sources() {
        let (src, dst) = grids();
        let options = RegridOptions::new(RegridMethod::NearestStod).with_src_mask([1]);
        let input = GeneratorInput::new(
            &src,
            StaggerLocation::Center,
            &dst,
            StaggerLocation::Center,
            &options,
        )
        .unwrap();
        let raw = NearestStodGenerator.generate(&input).unwrap();
        let pairs: Vec<(usize, usize)> = raw.entries.iter().map(|e| (e.src, e.dst)).collect();
        assert_eq!(pairs, vec![(0, 0), (2, 1), (2, 2), (2, 3)]);
    }

    #[test]
    fn test_dtos_sends_each_source_once() {
        let (src, dst) = grids();
        let options = RegridOptions::new(RegridMethod::NearestDtos);
        let input = GeneratorInput::new(
            &src,
            StaggerLocation::Center,
            &dst,
            StaggerLocation::Center,
            &options,
        )
        .unwrap();
        let raw = NearestDtosGenerator.generate(&input).unwrap();
        let pairs: Vec<(usize, usize)> = raw.entries.iter().map(|e| (e.src, e.dst)).collect();
        assert_eq!(pairs, vec![(0, 0), (1, 1), (2, 2)]);
    }
}
