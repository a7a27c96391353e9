//! Assertion utilities for testing.
//!
//! This module provides helper functions for making assertions in tests,
//! particularly for floating-point comparisons and weight matrix properties.

use regridder::SparseWeightMatrix;

/// Default epsilon for floating-point comparisons
pub const DEFAULT_EPSILON: f64 = 1e-10;

/// Assert that two floating-point values are approximately equal.
///
/// # Panics
///
/// Panics if the absolute difference between `actual` and `expected` is greater than `epsilon`.
pub fn assert_approx_eq(actual: f64, expected: f64, epsilon: Option<f64>) {
    let epsilon = epsilon.unwrap_or(DEFAULT_EPSILON);
    let diff = (actual - expected).abs();

    assert!(
        diff <= epsilon,
        "Values not approximately equal: actual = {}, expected = {}, diff = {}, epsilon = {}",
        actual,
        expected,
        diff,
        epsilon
    );
}

/// Assert that two arrays of floating-point values are approximately element-wise equal.
///
/// # Panics
///
/// Panics if the arrays have different lengths or if any element-wise comparison fails.
pub fn assert_array_approx_eq(actual: &[f64], expected: &[f64], epsilon: Option<f64>) {
    assert_eq!(
        actual.len(),
        expected.len(),
        "Arrays have different lengths: actual = {}, expected = {}",
        actual.len(),
        expected.len()
    );

    let eps = epsilon.unwrap_or(DEFAULT_EPSILON);
    for (i, (a, e)) in actual.iter().zip(expected.iter()).enumerate() {
        let diff = (a - e).abs();
        assert!(
            diff <= eps,
            "Arrays differ at index {}: actual = {}, expected = {}, diff = {}, epsilon = {}",
            i,
            a,
            e,
            diff,
            eps
        );
    }
}

/// Assert that two buffers hold the same bits, element by element.
pub fn assert_bit_identical(actual: &[f64], expected: &[f64]) {
    assert_eq!(actual.len(), expected.len());
    for (i, (a, e)) in actual.iter().zip(expected.iter()).enumerate() {
        assert_eq!(
            a.to_bits(),
            e.to_bits(),
            "Buffers differ at index {}: {} vs {}",
            i,
            a,
            e
        );
    }
}

/// Assert that every non-empty row of `matrix` sums to `expected`
pub fn assert_mapped_rows_sum_to(matrix: &SparseWeightMatrix, expected: f64, epsilon: Option<f64>) {
    let sums = matrix.row_sums();
    let eps = epsilon.unwrap_or(DEFAULT_EPSILON);
    for (d, sum) in sums.iter().enumerate() {
        if matrix.has_row(d) {
            assert!(
                (sum - expected).abs() <= eps,
                "Row {} sums to {}, expected {} (epsilon = {})",
                d,
                sum,
                expected,
                eps
            );
        }
    }
}
