//! Curve fitting orchestration.
//!
//! Responsibilities:
//!
//! - fit a single kinematic model with Levenberg–Marquardt (`fitter`)
//! - fit candidate models (parallel) and select one by BIC (`selection`)

pub mod fitter;
pub mod selection;

pub use fitter::*;
pub use selection::*;
