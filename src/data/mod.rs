//! Built-in and synthetic free-fall datasets.

pub mod sample;

pub use sample::*;
