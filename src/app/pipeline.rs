//! Shared "fit pipeline" logic used by both CLI and TUI front-ends.
//!
//! Keeping this in one place avoids duplicating the core workflow:
//! load (CSV or demo) -> fit/select -> residuals
//!
//! The CLI and the TUI can then focus on presentation (printing vs widgets).

use crate::data::demo_observations;
use crate::domain::{FitConfig, PointResidual};
use crate::error::AppError;
use crate::fit::selection::{FitSelection, fit_and_select};
use crate::io::ingest::{IngestedData, load_observations};
use crate::report::compute_residuals;

/// Source label used when no data file is given.
pub const DEMO_SOURCE: &str = "built-in demo dataset";

/// All computed outputs of a single `fall fit` run.
#[derive(Debug, Clone)]
pub struct RunOutput {
    pub ingest: IngestedData,
    pub selection: FitSelection,
    pub residuals: Vec<PointResidual>,
}

/// Load the configured CSV, or the demo dataset when no path is set.
pub fn load_data(config: &FitConfig) -> Result<IngestedData, AppError> {
    let ingest = match &config.data_path {
        Some(path) => load_observations(path, &config.columns, config.preview_rows)?,
        None => IngestedData::from_observations(demo_observations(), DEMO_SOURCE, config.preview_rows)?,
    };

    tracing::info!(
        source = %ingest.source,
        rows_read = ingest.rows_read,
        rows_used = ingest.rows_used,
        "loaded observations"
    );

    Ok(ingest)
}

/// Execute the full fitting pipeline and return the computed outputs.
pub fn run_fit(config: &FitConfig) -> Result<RunOutput, AppError> {
    let ingest = load_data(config)?;
    run_fit_with_data(config, ingest)
}

/// Execute the fitting pipeline on already loaded data.
///
/// This is useful for the TUI where we want to refit without re-reading the file.
pub fn run_fit_with_data(config: &FitConfig, ingest: IngestedData) -> Result<RunOutput, AppError> {
    let selection = fit_and_select(&ingest.observations, config)?;
    let residuals = compute_residuals(&ingest.observations, &selection.best)?;

    tracing::info!(
        model = selection.best.model.kind.display_name(),
        g = selection.best.g(),
        g_std_error = selection.best.g_std_error(),
        "fit complete"
    );

    Ok(RunOutput {
        ingest,
        selection,
        residuals,
    })
}
