//! CSV ingest and normalization.
//!
//! This module is responsible for turning a measurement table into a clean set of
//! `(time, height, sigma)` observations that are safe to fit.
//!
//! Design goals:
//! - **Forgiving column resolution** (common spellings, explicit overrides, positional fallback)
//! - **Row-level validation** (skip bad rows, but report what happened)
//! - **Separation of concerns**: no fitting logic here

use std::collections::HashMap;
use std::fs::File;
use std::path::Path;

use csv::StringRecord;

use crate::domain::{ColumnSpec, DatasetStats, Observation};
use crate::error::AppError;

/// Accepted spellings for the time column (after normalization).
const TIME_ALIASES: [&str; 7] = ["time(s)", "time (s)", "time [s]", "time", "t", "time_s", "t(s)"];

/// Accepted spellings for the height column. `hight(m)` is the header written by
/// the lab spreadsheet template.
const HEIGHT_ALIASES: [&str; 9] = [
    "hight(m)",
    "height(m)",
    "height (m)",
    "height",
    "h",
    "height_m",
    "h(m)",
    "displacement",
    "displacement(m)",
];

const SIGMA_ALIASES: [&str; 5] = ["sigma", "sigma(m)", "err", "error(m)", "uncertainty(m)"];

/// Columns actually used for the run (original header spelling).
#[derive(Debug, Clone)]
pub struct ResolvedColumns {
    pub time: String,
    pub height: String,
    pub sigma: Option<String>,
}

/// The first few raw rows, for the "data overview" printout.
#[derive(Debug, Clone, Default)]
pub struct DataPreview {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
    /// `(data rows, columns)` of the raw table.
    pub shape: (usize, usize),
}

/// A row-level error encountered during ingest.
#[derive(Debug, Clone)]
pub struct RowError {
    pub line: usize,
    pub message: String,
}

/// Ingest output: normalized observations + resolved columns + stats + row errors.
#[derive(Debug, Clone)]
pub struct IngestedData {
    pub observations: Vec<Observation>,
    /// Human-readable origin (file path or `built-in demo dataset`).
    pub source: String,
    pub columns: ResolvedColumns,
    pub stats: DatasetStats,
    pub preview: DataPreview,
    pub row_errors: Vec<RowError>,
    pub rows_read: usize,
    pub rows_used: usize,
}

impl IngestedData {
    /// Wrap in-memory observations (demo or simulated data) as if they had been read.
    pub fn from_observations(
        observations: Vec<Observation>,
        source: impl Into<String>,
        preview_rows: usize,
    ) -> Result<Self, AppError> {
        let stats = compute_stats(&observations)
            .ok_or_else(|| AppError::insufficient_data("No observations to fit."))?;

        let headers = vec!["time(s)".to_string(), "height(m)".to_string()];
        let rows = observations
            .iter()
            .take(preview_rows)
            .map(|o| vec![format!("{:.2}", o.time), format!("{:.5}", o.height)])
            .collect();
        let n = observations.len();

        Ok(Self {
            source: source.into(),
            columns: ResolvedColumns {
                time: headers[0].clone(),
                height: headers[1].clone(),
                sigma: None,
            },
            preview: DataPreview {
                shape: (n, headers.len()),
                headers,
                rows,
            },
            stats,
            row_errors: Vec::new(),
            rows_read: n,
            rows_used: n,
            observations,
        })
    }
}

/// Load and normalize a CSV file to observations.
pub fn load_observations(path: &Path, spec: &ColumnSpec, preview_rows: usize) -> Result<IngestedData, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::input(format!("Cannot find or open data file '{}': {e}", path.display())))?;

    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(file);

    let headers = reader
        .headers()
        .map_err(|e| AppError::input(format!("Failed to read CSV headers: {e}")))?
        .clone();

    let columns = resolve_columns(&headers, spec)?;
    let resolved = ResolvedColumns {
        time: headers.get(columns.time).unwrap_or_default().to_string(),
        height: headers.get(columns.height).unwrap_or_default().to_string(),
        sigma: columns.sigma.map(|i| headers.get(i).unwrap_or_default().to_string()),
    };

    let mut preview = DataPreview {
        headers: headers.iter().map(str::to_string).collect(),
        rows: Vec::new(),
        shape: (0, headers.len()),
    };

    let mut observations = Vec::new();
    let mut row_errors = Vec::new();
    let mut rows_read = 0usize;

    for (idx, result) in reader.records().enumerate() {
        // +2 because:
        // - records() starts at line 1 after headers
        // - CSV is 1-based line numbers
        let line = idx + 2;
        rows_read += 1;

        let record = match result {
            Ok(r) => r,
            Err(e) => {
                row_errors.push(RowError {
                    line,
                    message: format!("CSV parse error: {e}"),
                });
                continue;
            }
        };

        if preview.rows.len() < preview_rows {
            preview.rows.push(record.iter().map(str::to_string).collect());
        }

        match parse_row(&record, &columns, &resolved) {
            Ok((time, height, sigma)) => observations.push(Observation {
                index: observations.len(),
                time,
                height,
                sigma,
            }),
            Err(message) => {
                tracing::warn!(line, "skipping row: {message}");
                row_errors.push(RowError { line, message });
            }
        }
    }
    preview.shape.0 = rows_read;

    let rows_used = observations.len();
    if rows_used == 0 {
        return Err(AppError::insufficient_data(format!(
            "No valid rows in '{}' ({} read, {} rejected).",
            path.display(),
            rows_read,
            row_errors.len()
        )));
    }

    let stats = compute_stats(&observations)
        .ok_or_else(|| AppError::insufficient_data("No valid observations remain after validation."))?;

    Ok(IngestedData {
        observations,
        source: path.display().to_string(),
        columns: resolved,
        stats,
        preview,
        row_errors,
        rows_read,
        rows_used,
    })
}

#[derive(Debug, Clone, Copy)]
struct ColumnIndices {
    time: usize,
    height: usize,
    sigma: Option<usize>,
}

fn resolve_columns(headers: &StringRecord, spec: &ColumnSpec) -> Result<ColumnIndices, AppError> {
    let header_map = build_header_map(headers);

    let (time, height) = if spec.positional {
        if headers.len() < 2 {
            return Err(AppError::input(format!(
                "`--positional` needs at least two columns, found {}.",
                headers.len()
            )));
        }
        (0, 1)
    } else {
        (
            resolve_column(&header_map, spec.time.as_deref(), &TIME_ALIASES, "time", "--time-col", headers)?,
            resolve_column(
                &header_map,
                spec.height.as_deref(),
                &HEIGHT_ALIASES,
                "height",
                "--height-col",
                headers,
            )?,
        )
    };

    if time == height {
        return Err(AppError::input("Time and height resolve to the same column."));
    }

    let sigma = match spec.sigma.as_deref() {
        Some(name) => Some(
            header_map
                .get(&normalize_header_name(name))
                .copied()
                .ok_or_else(|| AppError::input(format!("Missing sigma column: `{name}`")))?,
        ),
        None => SIGMA_ALIASES.iter().find_map(|a| header_map.get(*a).copied()),
    };

    Ok(ColumnIndices { time, height, sigma })
}

fn resolve_column(
    header_map: &HashMap<String, usize>,
    explicit: Option<&str>,
    aliases: &[&str],
    role: &str,
    flag: &str,
    headers: &StringRecord,
) -> Result<usize, AppError> {
    if let Some(name) = explicit {
        return header_map
            .get(&normalize_header_name(name))
            .copied()
            .ok_or_else(|| AppError::input(format!("Missing {role} column: `{name}`")));
    }

    aliases
        .iter()
        .find_map(|a| header_map.get(*a).copied())
        .ok_or_else(|| {
            let found: Vec<&str> = headers.iter().collect();
            AppError::input(format!(
                "Could not find a {role} column (tried {}). Found columns: {}. Use `{flag}` or `--positional`.",
                aliases.join(", "),
                found.join(", ")
            ))
        })
}

fn build_header_map(headers: &StringRecord) -> HashMap<String, usize> {
    let mut map = HashMap::new();
    for (idx, name) in headers.iter().enumerate() {
        // First occurrence wins for duplicated headers.
        map.entry(normalize_header_name(name)).or_insert(idx);
    }
    map
}

fn normalize_header_name(name: &str) -> String {
    // Spreadsheet exports often carry a UTF-8 BOM on the first header; without
    // stripping it the time column would not be recognized.
    let name = name.trim().trim_start_matches('\u{feff}');
    name.to_lowercase()
}

fn parse_row(
    record: &StringRecord,
    columns: &ColumnIndices,
    names: &ResolvedColumns,
) -> Result<(f64, f64, Option<f64>), String> {
    let time = parse_required(record, columns.time, &names.time)?;
    let height = parse_required(record, columns.height, &names.height)?;

    // With a sigma column every row needs its own uncertainty; a blank cell
    // would otherwise fall back to weight 1 next to rows weighted 1/σ².
    let sigma = match (columns.sigma, names.sigma.as_deref()) {
        (Some(idx), Some(name)) => {
            let v = parse_required(record, idx, name)?;
            if v <= 0.0 {
                return Err(format!("Invalid sigma {v} (must be > 0)."));
            }
            Some(v)
        }
        _ => None,
    };

    Ok((time, height, sigma))
}

fn parse_required(record: &StringRecord, idx: usize, name: &str) -> Result<f64, String> {
    let s = get_optional(record, idx).ok_or_else(|| format!("Missing value for `{name}`."))?;
    parse_f64(s).ok_or_else(|| format!("Invalid number '{s}' in `{name}`."))
}

fn get_optional(record: &StringRecord, idx: usize) -> Option<&str> {
    record.get(idx).map(str::trim).filter(|s| !s.is_empty())
}

fn parse_f64(s: &str) -> Option<f64> {
    let v = s.parse::<f64>().ok()?;
    if v.is_finite() { Some(v) } else { None }
}

pub fn compute_stats(observations: &[Observation]) -> Option<DatasetStats> {
    let mut t_min = f64::INFINITY;
    let mut t_max = f64::NEG_INFINITY;
    let mut h_min = f64::INFINITY;
    let mut h_max = f64::NEG_INFINITY;
    let mut h_sum = 0.0;

    for o in observations {
        t_min = t_min.min(o.time);
        t_max = t_max.max(o.time);
        h_min = h_min.min(o.height);
        h_max = h_max.max(o.height);
        h_sum += o.height;
    }

    if !t_min.is_finite() || !t_max.is_finite() || !h_min.is_finite() || !h_max.is_finite() {
        return None;
    }

    Some(DatasetStats {
        n: observations.len(),
        t_min,
        t_max,
        h_min,
        h_max,
        h_mean: h_sum / observations.len() as f64,
    })
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    fn write_csv(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn reads_lab_template_headers() {
        let file = write_csv("\u{feff}time(s),hight(m)\n0.00,0.00000\n0.05,0.01225\n0.10,0.04900\n");
        let data = load_observations(file.path(), &ColumnSpec::default(), 5).unwrap();

        assert_eq!(data.rows_used, 3);
        assert_eq!(data.columns.height, "hight(m)");
        assert_eq!(data.observations[2].time, 0.10);
        assert_eq!(data.observations[2].height, 0.049);
        assert_eq!(data.preview.shape, (3, 2));
        assert!((data.stats.t_max - 0.10).abs() < 1e-12);
    }

    #[test]
    fn skips_invalid_rows_and_reports_lines() {
        let file = write_csv("t,h\n0.1,0.05\nabc,0.2\n0.3,\n0.4,0.78\n");
        let data = load_observations(file.path(), &ColumnSpec::default(), 5).unwrap();

        assert_eq!(data.rows_read, 4);
        assert_eq!(data.rows_used, 2);
        let lines: Vec<usize> = data.row_errors.iter().map(|e| e.line).collect();
        assert_eq!(lines, vec![3, 4]);
        assert_eq!(data.observations[1].index, 1);
    }

    #[test]
    fn explicit_and_positional_columns() {
        let file = write_csv("run,seconds,metres\n1,0.2,0.196\n2,0.4,0.784\n");

        let spec = ColumnSpec {
            time: Some("Seconds".to_string()),
            height: Some("metres".to_string()),
            ..ColumnSpec::default()
        };
        let data = load_observations(file.path(), &spec, 5).unwrap();
        assert_eq!(data.observations[0].time, 0.2);

        let positional = ColumnSpec {
            positional: true,
            ..ColumnSpec::default()
        };
        let data = load_observations(file.path(), &positional, 5).unwrap();
        // First two columns: run number as time, seconds as height.
        assert_eq!(data.observations[1].time, 2.0);
    }

    #[test]
    fn bracketed_unit_headers_resolve() {
        let file = write_csv("Time [s],Displacement(m)\n0.1,0.049\n0.2,0.196\n");
        let data = load_observations(file.path(), &ColumnSpec::default(), 5).unwrap();
        assert_eq!(data.columns.time, "Time [s]");
        assert_eq!(data.columns.height, "Displacement(m)");
        assert_eq!(data.rows_used, 2);
    }

    #[test]
    fn unknown_columns_are_an_input_error() {
        let file = write_csv("a,b\n1,2\n");
        let err = load_observations(file.path(), &ColumnSpec::default(), 5).unwrap_err();
        assert_eq!(err.exit_code(), 2);
        assert!(err.message().contains("--time-col"));
    }

    #[test]
    fn sigma_column_is_picked_up_and_validated() {
        let file = write_csv("time,height,sigma\n0.1,0.05,0.002\n0.2,0.2,-1\n0.3,0.44,0.003\n");
        let data = load_observations(file.path(), &ColumnSpec::default(), 5).unwrap();
        assert_eq!(data.columns.sigma.as_deref(), Some("sigma"));
        assert_eq!(data.rows_used, 2);
        assert_eq!(data.observations[0].sigma, Some(0.002));
        assert_eq!(data.observations[1].sigma, Some(0.003));
        assert_eq!(data.row_errors.len(), 1);
        assert_eq!(data.row_errors[0].line, 3);
    }

    #[test]
    fn blank_sigma_skips_the_row() {
        // A row without an uncertainty must not sneak into the fit at weight 1.
        let file = write_csv("time,height,sigma\n0.1,0.05,0.002\n0.2,0.2,0.002\n0.3,3.0,\n");
        let data = load_observations(file.path(), &ColumnSpec::default(), 5).unwrap();
        assert_eq!(data.rows_used, 2);
        assert!(data.observations.iter().all(|o| o.sigma.is_some()));
        assert_eq!(data.row_errors.len(), 1);
        assert_eq!(data.row_errors[0].line, 4);
        assert!(data.row_errors[0].message.contains("sigma"));
    }

    #[test]
    fn empty_table_is_insufficient_data() {
        let file = write_csv("time,height\n");
        let err = load_observations(file.path(), &ColumnSpec::default(), 5).unwrap_err();
        assert_eq!(err.exit_code(), 3);
    }

    #[test]
    fn missing_file_is_input_error() {
        let err = load_observations(Path::new("/nonexistent/free_fall.csv"), &ColumnSpec::default(), 5)
            .unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }
}
