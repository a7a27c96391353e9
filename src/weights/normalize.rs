//! Mask & normalization pass.
//!
//! Turns raw generator output into the final matrix:
//!
//! 1. consolidate the raw triples;
//! 2. drop rows of masked destinations;
//! 3. CONSERVE: drop masked sources, then divide by the destination area
//!    (DSTAREA) or by the unmasked covered area (FRACAREA);
//!    other methods: drop rows that give non-zero weight to a masked source;
//! 4. compute source and destination fractions;
//! 5. check for unmapped destinations.

use std::collections::HashSet;

use tracing::{debug, warn};

use super::{CellAreas, GeneratorInput, RawWeights, SparseWeightMatrix};
use crate::error::{RegridError, Result};
use crate::options::{NormType, RegridMethod, UnmappedAction};

/// Final weights of a store call
#[derive(Debug, Clone)]
pub struct Finalized {
    pub matrix: SparseWeightMatrix,
    /// Per-source fraction in [0, 1]
    pub src_frac: Vec<f64>,
    /// Per-destination fraction in [0, 1]
    pub dst_frac: Vec<f64>,
    /// Unmasked, non-skipped destinations without any entry
    pub unmapped: Vec<usize>,
}

fn clamp_unit(v: f64) -> f64 {
    v.clamp(0.0, 1.0)
}

/// Run the mask & normalization pass
pub fn finalize(input: &GeneratorInput<'_>, raw: RawWeights) -> Result<Finalized> {
    let n_src = input.n_src();
    let n_dst = input.n_dst();
    let method = input.method();

    let matrix = SparseWeightMatrix::from_entries(n_src, n_dst, raw.entries)?
        .drop_rows(|d, _| input.dst_masked[d]);

    let (matrix, src_frac, dst_frac) = match raw.areas {
        Some(areas) => normalize_conservative(input, matrix, &areas),
        None => {
            let matrix = matrix.drop_rows(|_, row| {
                row.iter()
                    .any(|e| e.weight != 0.0 && input.src_masked[e.src])
            });
            let dst_frac: Vec<f64> = matrix
                .row_sums()
                .into_iter()
                .enumerate()
                .map(|(d, v)| if input.dst_masked[d] { 0.0 } else { clamp_unit(v) })
                .collect();
            let src_frac: Vec<f64> = matrix
                .column_sums()
                .into_iter()
                .enumerate()
                .map(|(s, v)| if input.src_masked[s] { 0.0 } else { clamp_unit(v) })
                .collect();
            (matrix, src_frac, dst_frac)
        }
    };

    let skipped: HashSet<usize> = raw.skipped_dst.into_iter().collect();
    let unmapped: Vec<usize> = if method == RegridMethod::NearestDtos {
        // Destinations are matched from the source side; an empty row is
        // expected wherever no source is nearest.
        Vec::new()
    } else {
        (0..n_dst)
            .filter(|d| !input.dst_masked[*d] && !skipped.contains(d) && !matrix.has_row(*d))
            .collect()
    };

    if let Some(&first) = unmapped.first() {
        match input.options.unmapped_action {
            UnmappedAction::Error => {
                return Err(RegridError::UnmappedDestination {
                    cell: first,
                    count: unmapped.len(),
                })
            }
            UnmappedAction::Ignore => {
                warn!(
                    count = unmapped.len(),
                    first = first,
                    "Unmapped destination locations left empty"
                );
            }
        }
    }

    debug!(
        method = %method,
        entries = matrix.nnz(),
        unmapped = unmapped.len(),
        "Finalized weights"
    );

    Ok(Finalized {
        matrix,
        src_frac,
        dst_frac,
        unmapped,
    })
}

fn normalize_conservative(
    input: &GeneratorInput<'_>,
    matrix: SparseWeightMatrix,
    areas: &CellAreas,
) -> (SparseWeightMatrix, Vec<f64>, Vec<f64>) {
    // Overlap with unmasked destinations, before source masking.
    let mut src_frac = vec![0.0; input.n_src()];
    for entry in matrix.entries() {
        src_frac[entry.src] += entry.weight;
    }
    for (s, frac) in src_frac.iter_mut().enumerate() {
        let area = areas.src[s];
        *frac = if input.src_masked[s] || area <= 0.0 {
            0.0
        } else {
            clamp_unit(*frac / area)
        };
    }

    let matrix = matrix.retain(|e| !input.src_masked[e.src]);
    let covered = matrix.row_sums();

    let dst_frac: Vec<f64> = covered
        .iter()
        .enumerate()
        .map(|(d, &c)| {
            let area = areas.dst[d];
            if input.dst_masked[d] || area <= 0.0 {
                0.0
            } else {
                clamp_unit(c / area)
            }
        })
        .collect();

    let matrix = match input.options.norm_type {
        NormType::DstArea => matrix.map_weights(|e| e.weight / areas.dst[e.dst]),
        NormType::FracArea => matrix.map_weights(|e| e.weight / covered[e.dst]),
    };

    (matrix, src_frac, dst_frac)
}
