//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - model selection enums (`ModelSpec`, `ModelKind`)
//! - normalized measurements (`Observation`)
//! - fit outputs (`FitResult`, `FitQuality`, `FitFile`, etc.)

pub mod types;

pub use types::*;
