//! Weight generation.
//!
//! Each regrid method is a [`WeightGenerator`] producing raw `(src, dst,
//! weight)` triples for the unmasked part of the problem. The raw triples are
//! then consolidated into a [`SparseWeightMatrix`] and passed through the
//! mask & normalization pass in [`normalize`].

pub mod bilinear;
pub mod common;
pub mod conserve;
pub mod matrix;
pub mod nearest;
pub mod normalize;
pub mod patch;

pub use matrix::{SparseWeightMatrix, WeightEntry};
pub use normalize::Finalized;

use crate::discretization::{Discretization, StaggerLocation};
use crate::error::{RegridError, Result};
use crate::options::{RegridMethod, RegridOptions};

/// Everything a generator needs to know about one store call
pub struct GeneratorInput<'a> {
    pub src: &'a Discretization,
    pub src_location: StaggerLocation,
    pub dst: &'a Discretization,
    pub dst_location: StaggerLocation,
    pub options: &'a RegridOptions,
    /// Per-source flag: excluded by the source mask
    pub src_masked: Vec<bool>,
    /// Per-destination flag: excluded by the destination mask
    pub dst_masked: Vec<bool>,
}

impl<'a> GeneratorInput<'a> {
    pub fn new(
        src: &'a Discretization,
        src_location: StaggerLocation,
        dst: &'a Discretization,
        dst_location: StaggerLocation,
        options: &'a RegridOptions,
    ) -> Result<Self> {
        if src.coord_sys() != dst.coord_sys() {
            return Err(RegridError::incompatible(format!(
                "Source uses {:?} coordinates but destination uses {:?}",
                src.coord_sys(),
                dst.coord_sys()
            )));
        }
        let src_masked = common::masked_flags(src, src_location, |v| options.src_masked(v));
        let dst_masked = common::masked_flags(dst, dst_location, |v| options.dst_masked(v));
        Ok(Self {
            src,
            src_location,
            dst,
            dst_location,
            options,
            src_masked,
            dst_masked,
        })
    }

    pub fn n_src(&self) -> usize {
        self.src_masked.len()
    }

    pub fn n_dst(&self) -> usize {
        self.dst_masked.len()
    }

    pub fn method(&self) -> RegridMethod {
        self.options.regrid_method
    }
}

/// Cell areas used for conservative normalization and fractions
#[derive(Debug, Clone, Default)]
pub struct CellAreas {
    pub src: Vec<f64>,
    pub dst: Vec<f64>,
}

/// Unconsolidated generator output
#[derive(Debug, Clone, Default)]
pub struct RawWeights {
    pub entries: Vec<WeightEntry>,
    /// Destinations skipped as degenerate; never reported as unmapped
    pub skipped_dst: Vec<usize>,
    /// Sources skipped as degenerate
    pub skipped_src: Vec<usize>,
    /// Present for conservative weights only
    pub areas: Option<CellAreas>,
}

/// Trait for weight generation methods
pub trait WeightGenerator: Send + Sync {
    /// Produce raw weights for the given input
    fn generate(&self, input: &GeneratorInput<'_>) -> Result<RawWeights>;

    /// Get the name of this method
    fn name(&self) -> &str;
}

/// Get the generator for a regrid method
pub fn get_generator(method: RegridMethod) -> Box<dyn WeightGenerator> {
    match method {
        RegridMethod::Bilinear => Box::new(bilinear::BilinearGenerator),
        RegridMethod::Patch => Box::new(patch::PatchGenerator::default()),
        RegridMethod::Conserve => Box::new(conserve::ConserveGenerator),
        RegridMethod::NearestStod => Box::new(nearest::NearestStodGenerator),
        RegridMethod::NearestDtos => Box::new(nearest::NearestDtosGenerator),
    }
}

/// Run the generator for the input's method and the mask & normalization pass
pub fn compute_weights(input: &GeneratorInput<'_>) -> Result<Finalized> {
    let generator = get_generator(input.method());
    let raw = generator.generate(input)?;
    normalize::finalize(input, raw)
}
