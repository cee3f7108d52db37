//! Read/write fit JSON files.
//!
//! The fit file is the "portable" representation of a run:
//! - model kind + parameters, standard errors and covariance
//! - fit quality and the reference `g`
//! - the observations themselves
//! - a precomputed fitted grid for quick plotting
//!
//! The schema is defined by `domain::FitFile`.

use std::fs::File;
use std::path::Path;

use chrono::Utc;

use crate::domain::{CurveGrid, FitFile, FitResult};
use crate::error::AppError;
use crate::io::ingest::IngestedData;
use crate::models::sample_curve;

/// Number of samples in the exported curve grid.
pub const GRID_POINTS: usize = 200;

/// Build the fit file for a run.
pub fn build_fit_file(fit: &FitResult, ingest: &IngestedData, g_ref: f64) -> FitFile {
    let (t0, t1) = grid_range(ingest.stats.t_max);
    let (time, height) = sample_curve(fit.model.kind, &fit.model.values, t0, t1, GRID_POINTS)
        .into_iter()
        .unzip();

    FitFile {
        tool: format!("fall {}", env!("CARGO_PKG_VERSION")),
        generated_at: Utc::now(),
        source: ingest.source.clone(),
        g_ref,
        fit: fit.clone(),
        observations: ingest.observations.clone(),
        grid: CurveGrid { time, height },
    }
}

/// Write a fit JSON file.
pub fn write_fit_json(path: &Path, fit_file: &FitFile) -> Result<(), AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::input(format!("Failed to create fit JSON '{}': {e}", path.display())))?;

    serde_json::to_writer_pretty(file, fit_file)
        .map_err(|e| AppError::input(format!("Failed to write fit JSON: {e}")))?;

    Ok(())
}

/// Read a fit JSON file.
pub fn read_fit_json(path: &Path) -> Result<FitFile, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::input(format!("Failed to open fit JSON '{}': {e}", path.display())))?;
    let fit_file: FitFile =
        serde_json::from_reader(file).map_err(|e| AppError::input(format!("Invalid fit JSON: {e}")))?;

    let k = fit_file.fit.model.kind.param_count();
    if fit_file.fit.model.values.len() != k || fit_file.fit.model.std_errors.len() != k {
        return Err(AppError::input(format!(
            "Invalid fit JSON: the {} model needs {k} parameters.",
            fit_file.fit.model.kind.display_name()
        )));
    }
    if !(fit_file.g_ref.is_finite() && fit_file.g_ref > 0.0) {
        return Err(AppError::input(format!(
            "Invalid fit JSON: reference g must be finite and > 0, got {}.",
            fit_file.g_ref
        )));
    }
    if fit_file.grid.time.len() != fit_file.grid.height.len() {
        return Err(AppError::input("Invalid fit JSON: curve grid columns differ in length."));
    }

    Ok(fit_file)
}

/// The curve always starts at release (`t = 0`) and ends at the last sample.
pub fn grid_range(t_max: f64) -> (f64, f64) {
    if t_max.is_finite() && t_max > 0.0 {
        (0.0, t_max)
    } else {
        (0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::demo_observations;
    use crate::domain::{ModelKind, Observation};
    use crate::fit::{FitOptions, fit_model};

    #[test]
    fn fit_file_survives_write_and_read() {
        let observations = demo_observations();
        let ingest = IngestedData::from_observations(observations.clone(), "demo", 5).unwrap();
        let fit = fit_model(ModelKind::FreeFall, &observations, &FitOptions::default()).unwrap();
        let fit_file = build_fit_file(&fit, &ingest, 9.8);

        assert_eq!(fit_file.grid.time.len(), GRID_POINTS);
        assert_eq!(fit_file.grid.time[0], 0.0);
        assert!((fit_file.grid.time[GRID_POINTS - 1] - 0.65).abs() < 1e-12);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fit.json");
        write_fit_json(&path, &fit_file).unwrap();
        let loaded = read_fit_json(&path).unwrap();

        assert_eq!(loaded.fit.model.kind, ModelKind::FreeFall);
        assert!((loaded.fit.g() - fit.g()).abs() < 1e-12);
        assert_eq!(loaded.observations, observations);
        assert_eq!(loaded.source, "demo");
    }

    #[test]
    fn undefined_uncertainty_survives_json() {
        let observations = vec![Observation::new(0, 0.5, 1.225)];
        let ingest = IngestedData::from_observations(observations.clone(), "one point", 5).unwrap();
        let fit = fit_model(ModelKind::FreeFall, &observations, &FitOptions::default()).unwrap();
        assert!(fit.g_std_error().is_infinite());

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fit.json");
        write_fit_json(&path, &build_fit_file(&fit, &ingest, 9.8)).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("null"));
        assert!(read_fit_json(&path).unwrap().fit.g_std_error().is_infinite());
    }

    #[test]
    fn rejects_malformed_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        std::fs::write(&path, "{\"tool\": 1}").unwrap();
        let err = read_fit_json(&path).unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn rejects_zero_reference_g() {
        let observations = demo_observations();
        let ingest = IngestedData::from_observations(observations.clone(), "demo", 5).unwrap();
        let fit = fit_model(ModelKind::FreeFall, &observations, &FitOptions::default()).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fit.json");
        write_fit_json(&path, &build_fit_file(&fit, &ingest, 0.0)).unwrap();

        let err = read_fit_json(&path).unwrap_err();
        assert_eq!(err.exit_code(), 2);
        assert!(err.message().contains("reference g"));
    }
}
