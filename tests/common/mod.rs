//! Common test utilities for regridder.
//!
//! This module provides shared grids, fields and assertions for the
//! integration tests.

// Re-export all common test utilities
pub mod assertions;
pub mod test_data;
