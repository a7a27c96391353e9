//! Regrid manager: the store entry points and the handle registry.
//!
//! [`RegridManager`] runs the store pipeline (validation, weight generation,
//! mask & normalization pass) and keeps track of every live
//! [`RouteHandle`] so they can all be released at teardown. A process-wide
//! manager backs the `regrid_store` / `regrid_apply` / `regrid_release` free
//! functions.

use once_cell::sync::Lazy;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{RegridError, Result};
use crate::field::Field;
use crate::handle::{release_weak, Registry, RouteHandle};
use crate::logging::{log_error, log_timed_operation, log_weight_stats};
use crate::options::{RegridOptions, ZeroRegion};
use crate::weights::{compute_weights, GeneratorInput, SparseWeightMatrix};
use crate::weights_io::{read_weights_shaped, WeightFormat, WeightShape};

static GLOBAL_MANAGER: Lazy<RegridManager> = Lazy::new(RegridManager::new);

/// Optional fraction outputs of a store call.
///
/// Each field must live on the same structure as the corresponding
/// source/destination field.
#[derive(Default)]
pub struct FracFields<'a> {
    pub src: Option<&'a mut Field>,
    pub dst: Option<&'a mut Field>,
}

/// Creates route handles and tracks the ones still alive
pub struct RegridManager {
    registry: Arc<Registry>,
}

impl Default for RegridManager {
    fn default() -> Self {
        Self::new()
    }
}

impl RegridManager {
    pub fn new() -> Self {
        Self {
            registry: Arc::default(),
        }
    }

    /// The process-wide manager
    pub fn global() -> &'static RegridManager {
        &GLOBAL_MANAGER
    }

    /// Compute weights from `src` to `dst`
    pub fn store(&self, src: &Field, dst: &Field, options: &RegridOptions) -> Result<RouteHandle> {
        self.store_with_fractions(src, dst, options, FracFields::default())
    }

    /// Compute weights and write source/destination fractions
    pub fn store_with_fractions(
        &self,
        src: &Field,
        dst: &Field,
        options: &RegridOptions,
        fractions: FracFields<'_>,
    ) -> Result<RouteHandle> {
        let start = Instant::now();
        let result = log_timed_operation("store", || {
            self.run_store(src, dst, options, fractions, start)
        });
        if let Err(e) = &result {
            log_error(e, "store");
        }
        result
    }

    fn run_store(
        &self,
        src: &Field,
        dst: &Field,
        options: &RegridOptions,
        fractions: FracFields<'_>,
        start: Instant,
    ) -> Result<RouteHandle> {
        options.validate()?;
        src.validate()?;
        dst.validate()?;
        check_fraction_field(fractions.src.as_deref(), src, "source")?;
        check_fraction_field(fractions.dst.as_deref(), dst, "destination")?;

        info!(
            method = %options.regrid_method,
            src = %src.signature(),
            dst = %dst.signature(),
            "Storing regrid weights"
        );

        let handle = RouteHandle::building(
            options.clone(),
            src.signature(),
            dst.signature(),
            &self.registry,
        );

        let input = GeneratorInput::new(
            src.discretization(),
            src.location(),
            dst.discretization(),
            dst.location(),
            options,
        )?;
        let finalized = compute_weights(&input)?;

        if let Some(field) = fractions.src {
            field.as_slice_mut().copy_from_slice(&finalized.src_frac);
        }
        if let Some(field) = fractions.dst {
            field.as_slice_mut().copy_from_slice(&finalized.dst_frac);
        }

        log_weight_stats(
            &handle.id(),
            options.regrid_method,
            &finalized.matrix,
            finalized.unmapped.len(),
            start.elapsed(),
        );
        handle.finish(finalized.matrix)?;
        Ok(handle)
    }

    /// Wrap a precomputed matrix (e.g. read from a weight file) in a handle
    pub fn store_from_weights(
        &self,
        src: &Field,
        dst: &Field,
        matrix: SparseWeightMatrix,
        options: &RegridOptions,
    ) -> Result<RouteHandle> {
        if matrix.n_src() != src.len() || matrix.n_dst() != dst.len() {
            return Err(RegridError::incompatible(format!(
                "Weights are {} x {} but the fields have {} source and {} destination values",
                matrix.n_src(),
                matrix.n_dst(),
                src.len(),
                dst.len()
            )));
        }
        let handle = RouteHandle::building(
            options.clone(),
            src.signature(),
            dst.signature(),
            &self.registry,
        );
        info!(
            handle = %handle.id(),
            entries = matrix.nnz(),
            "Stored precomputed weights"
        );
        handle.finish(matrix)?;
        Ok(handle)
    }

    /// Read a weight file sized for `src` and `dst` and wrap it in a handle
    pub fn store_from_file(
        &self,
        src: &Field,
        dst: &Field,
        path: &Path,
        format: WeightFormat,
        options: &RegridOptions,
    ) -> Result<RouteHandle> {
        let expected = WeightShape::new(src.len(), dst.len());
        let file = read_weights_shaped(path, format, Some(expected)).map_err(|e| {
            log_error(&e, "store_from_file");
            e
        })?;
        self.store_from_weights(src, dst, file.matrix, options)
    }

    /// Number of handles not yet released
    pub fn live_handles(&self) -> usize {
        self.registry
            .lock()
            .values()
            .filter(|h| h.strong_count() > 0)
            .count()
    }

    /// Ids of the handles not yet released
    pub fn handle_ids(&self) -> Vec<Uuid> {
        let mut ids: Vec<Uuid> = self.registry.lock().keys().copied().collect();
        ids.sort();
        ids
    }

    /// Release every live handle; returns how many were released
    pub fn release_all(&self) -> usize {
        let handles: Vec<_> = self.registry.lock().drain().map(|(_, h)| h).collect();
        let released = handles.iter().filter(|h| release_weak(h)).count();
        if released > 0 {
            warn!(released = released, "Released route handles at teardown");
        }
        released
    }
}

impl Drop for RegridManager {
    fn drop(&mut self) {
        self.release_all();
    }
}

fn check_fraction_field(frac: Option<&Field>, field: &Field, side: &str) -> Result<()> {
    match frac {
        Some(frac) if frac.signature() != field.signature() => {
            Err(RegridError::incompatible(format!(
                "The {} fraction field {} is {} but the {} field is {}",
                side,
                frac.name(),
                frac.signature(),
                side,
                field.signature()
            )))
        }
        _ => Ok(()),
    }
}

/// Store weights on the process-wide manager
pub fn regrid_store(src: &Field, dst: &Field, options: &RegridOptions) -> Result<RouteHandle> {
    RegridManager::global().store(src, dst, options)
}

/// Apply stored weights
pub fn regrid_apply(
    handle: &RouteHandle,
    src: &Field,
    dst: &mut Field,
    zero_region: ZeroRegion,
) -> Result<()> {
    handle.apply(src, dst, zero_region)
}

/// Release stored weights; never fails
pub fn regrid_release(handle: &RouteHandle) {
    handle.release();
}
