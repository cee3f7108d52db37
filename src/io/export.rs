//! Export per-observation results to CSV.
//!
//! The export is meant to be easy to consume in spreadsheets or downstream scripts.

use std::fs::File;
use std::path::Path;

use crate::domain::{FitResult, ModelKind, PointResidual};
use crate::error::AppError;
use crate::models::predict;

const HEADER: [&str; 9] = [
    "index",
    "time_s",
    "height_m",
    "sigma_m",
    "fitted_m",
    "residual_m",
    "reference_m",
    "reference_diff_m",
    "model",
];

/// Write per-observation results to a CSV file.
///
/// Columns: index, time, height, sigma, fitted, residual, and the value/difference
/// against the reference curve `½ · g_ref · t²`.
pub fn write_results_csv(
    path: &Path,
    residuals: &[PointResidual],
    fit: &FitResult,
    g_ref: f64,
) -> Result<(), AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::input(format!("Failed to create export CSV '{}': {e}", path.display())))?;
    let mut writer = csv::Writer::from_writer(file);

    writer
        .write_record(HEADER)
        .map_err(|e| AppError::input(format!("Failed to write export CSV header: {e}")))?;

    let model = fit.model.kind.display_name();
    for r in residuals {
        let o = &r.observation;
        let reference = predict(ModelKind::FreeFall, o.time, &[g_ref]);
        writer
            .write_record([
                (o.index + 1).to_string(),
                format!("{:.6}", o.time),
                format!("{:.6}", o.height),
                o.sigma.map(|s| format!("{s:.6}")).unwrap_or_default(),
                format!("{:.8}", r.fitted),
                format!("{:.8}", r.residual),
                format!("{reference:.8}"),
                format!("{:.8}", o.height - reference),
                model.to_string(),
            ])
            .map_err(|e| AppError::input(format!("Failed to write export CSV row: {e}")))?;
    }

    writer
        .flush()
        .map_err(|e| AppError::input(format!("Failed to write export CSV '{}': {e}", path.display())))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::demo_observations;
    use crate::fit::{FitOptions, fit_model};
    use crate::domain::ModelKind;
    use crate::report::compute_residuals;

    #[test]
    fn writes_one_row_per_observation() {
        let observations = demo_observations();
        let fit = fit_model(ModelKind::FreeFall, &observations, &FitOptions::default()).unwrap();
        let residuals = compute_residuals(&observations, &fit).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results.csv");
        write_results_csv(&path, &residuals, &fit, 9.8).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 15);
        assert!(lines[0].starts_with("index,time_s,height_m"));
        assert!(lines[11].starts_with("11,0.500000,1.225000,,1.22500000,"));
        assert!(lines[11].ends_with(",free-fall"));
    }

    #[test]
    fn sigma_column_reads_back_as_numbers() {
        let observations: Vec<_> = demo_observations()
            .into_iter()
            .map(|mut o| {
                o.sigma = Some(0.002);
                o
            })
            .collect();
        let fit = fit_model(ModelKind::FreeFall, &observations, &FitOptions::default()).unwrap();
        let residuals = compute_residuals(&observations, &fit).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results.csv");
        write_results_csv(&path, &residuals, &fit, 9.8).unwrap();

        let mut reader = csv::Reader::from_path(&path).unwrap();
        assert_eq!(reader.headers().unwrap().len(), HEADER.len());
        let records: Vec<csv::StringRecord> = reader.records().map(Result::unwrap).collect();
        assert_eq!(records.len(), 14);
        for record in &records {
            assert_eq!(record.len(), HEADER.len());
            assert_eq!(record[3].parse::<f64>().unwrap(), 0.002);
            assert_eq!(&record[8], "free-fall");
        }
    }
}
