//! Bilinear weights.
//!
//! Each destination point takes the bilinear weights of the four corners of
//! the containing source quad (three barycentric weights for triangles).

use tracing::debug;

use super::common::{collect_rows, SourceSampler};
use super::{GeneratorInput, RawWeights, WeightGenerator};
use crate::error::Result;

/// Bilinear weight generator
pub struct BilinearGenerator;

impl WeightGenerator for BilinearGenerator {
    fn generate(&self, input: &GeneratorInput<'_>) -> Result<RawWeights> {
        let sampler = SourceSampler::new(input)?;
        let dst_points = input.dst.points(input.dst_location)?;

        let entries = collect_rows(&dst_points, &input.dst_masked, |_, p| {
            sampler
                .sample(p)
                .map(|sample| sample.weights().to_vec())
                .unwrap_or_default()
        });

        debug!(entries = entries.len(), "Generated bilinear weights");

        Ok(RawWeights {
            entries,
            ..Default::default()
        })
    }

    fn name(&self) -> &str {
        "bilinear"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discretization::{Discretization, StaggerLocation, StructuredGrid};
    use crate::geometry::CoordSys;
    use crate::options::RegridOptions;
    use crate::weights::SparseWeightMatrix;

    #[test]
    fn test_bilinear_reproduces_linear_field() {
        let src: Discretization = StructuredGrid::rectilinear(
            &[0.0, 1.0, 2.0, 3.0],
            &[0.0, 1.0, 2.0],
            CoordSys::Cartesian,
        )
        .unwrap()
        .into();
        let dst: Discretization =
            StructuredGrid::rectilinear(&[0.5, 2.25], &[0.25, 1.75], CoordSys::Cartesian)
                .unwrap()
                .into();
        let options = RegridOptions::default();
        let input = GeneratorInput::new(
            &src,
            StaggerLocation::Center,
            &dst,
            StaggerLocation::Center,
            &options,
        )
        .unwrap();

        let raw = BilinearGenerator.generate(&input).unwrap();
        let matrix = SparseWeightMatrix::from_entries(12, 4, raw.entries).unwrap();

        let src_points = src.points(StaggerLocation::Center).unwrap();
        let values: Vec<f64> = src_points.iter().map(|p| 2.0 * p.x - p.y + 1.0).collect();
        let mut out = vec![0.0; 4];
        matrix
            .apply(&values, &mut out, crate::options::ZeroRegion::Total)
            .unwrap();

        for (value, p) in out.iter().zip(dst.points(StaggerLocation::Center).unwrap()) {
            assert!((value - (2.0 * p.x - p.y + 1.0)).abs() < 1e-12);
        }
    }

    #[test]
    fn test_points_outside_source_get_no_row() {
        let src: Discretization =
            StructuredGrid::rectilinear(&[0.0, 1.0], &[0.0, 1.0], CoordSys::Cartesian)
                .unwrap()
                .into();
        let dst: Discretization =
            StructuredGrid::rectilinear(&[0.5, 5.0], &[0.5], CoordSys::Cartesian)
                .unwrap()
                .into();
        let options = RegridOptions::default();
        let input = GeneratorInput::new(
            &src,
            StaggerLocation::Center,
            &dst,
            StaggerLocation::Center,
            &options,
        )
        .unwrap();
        let raw = BilinearGenerator.generate(&input).unwrap();
        assert!(raw.entries.iter().all(|e| e.dst == 0));
        assert_eq!(raw.entries.len(), 4);
    }
}
