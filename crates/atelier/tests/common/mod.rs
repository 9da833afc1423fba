//! Shared test utilities for atelier integration tests.
//!
//! This module provides:
//! - Builders for products and selection grids
//! - `MockStudio`, a scripted in-memory backend implementing every API seam
//! - `RecordingTarget`, a save target that records which tiers were tried

pub mod builders;
pub mod mock_api;

pub use builders::*;
pub use mock_api::*;
