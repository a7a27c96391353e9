//! Logging utilities for the regridder.
//!
//! This module provides structured logging helpers so that store and apply
//! runs produce searchable, consistent log lines.

use std::time::Instant;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::options::RegridMethod;
use crate::weights::SparseWeightMatrix;

/// Initialize the tracing subscriber with the given log level
pub fn init_tracing(log_level: &str) {
    let filter = match std::env::var("RUST_LOG") {
        Ok(val) => val,
        Err(_) => log_level.to_string(),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .init();
}

/// Log a start message for a significant operation
pub fn log_operation_start(operation: &str, details: Option<&str>) {
    if let Some(details) = details {
        info!(
            operation = operation,
            details = details,
            "Starting operation"
        );
    } else {
        info!(operation = operation, "Starting operation");
    }
}

/// Log the completion of a significant operation
pub fn log_operation_end(operation: &str, start_time: Instant, success: bool) {
    let duration_ms = start_time.elapsed().as_secs_f64() * 1000.0;

    if success {
        info!(
            operation = operation,
            duration_ms = duration_ms,
            "Operation completed successfully"
        );
    } else {
        warn!(
            operation = operation,
            duration_ms = duration_ms,
            "Operation failed"
        );
    }
}

/// Log an operation with timing and result in a single statement
pub fn log_timed_operation<F, R>(operation: &str, f: F) -> R
where
    F: FnOnce() -> R,
{
    let start = Instant::now();
    let operation_id = Uuid::new_v4();

    debug!(
        operation = operation,
        operation_id = %operation_id,
        "Starting operation"
    );

    let result = f();

    info!(
        operation = operation,
        operation_id = %operation_id,
        duration_ms = start.elapsed().as_secs_f64() * 1000.0,
        "Operation completed"
    );

    result
}

/// Log statistics of a generated weight matrix
pub fn log_weight_stats(
    handle: &Uuid,
    method: RegridMethod,
    matrix: &SparseWeightMatrix,
    unmapped: usize,
    duration: std::time::Duration,
) {
    let rows = (0..matrix.n_dst()).filter(|&d| matrix.has_row(d)).count();
    info!(
        operation = "store",
        handle = %handle,
        method = %method,
        n_src = matrix.n_src(),
        n_dst = matrix.n_dst(),
        entries = matrix.nnz(),
        mapped_rows = rows,
        unmapped = unmapped,
        duration_ms = duration.as_secs_f64() * 1000.0,
        "Weights stored"
    );
}

/// Log an error with context
pub fn log_error(error: &crate::error::RegridError, context: &str) {
    error!(
        error = %error,
        context = context,
        error_type = error.kind(),
        "Error occurred"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_log_timed_operation() {
        let result = log_timed_operation("test_operation", || {
            std::thread::sleep(Duration::from_millis(1));
            42
        });

        assert_eq!(result, 42);
    }

    #[test]
    fn test_log_timed_operation_passes_errors_through() {
        let result: crate::error::Result<()> = log_timed_operation("store", || {
            Err(crate::error::RegridError::UnmappedDestination { cell: 4, count: 1 })
        });
        let err = result.unwrap_err();
        assert_eq!(err.kind(), "UnmappedDestination");
        log_error(&err, "store");
    }

    #[test]
    fn test_log_weight_stats_does_not_panic() {
        let matrix = SparseWeightMatrix::empty(3, 2);
        log_weight_stats(
            &Uuid::new_v4(),
            RegridMethod::Bilinear,
            &matrix,
            2,
            Duration::from_millis(3),
        );
    }
}
