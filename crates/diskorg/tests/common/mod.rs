//! Shared test utilities for diskorg integration tests.
//!
//! This module provides:
//! - `TestHarness` for isolated test execution with temp directories
//! - Builders for categories and disks

pub mod builders;
pub mod harness;

pub use builders::*;
pub use harness::TestHarness;
