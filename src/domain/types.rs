//! Shared domain types.
//!
//! These types are intentionally kept lightweight and serializable so they can be:
//!
//! - used in-memory during fitting
//! - exported to JSON/CSV
//! - reloaded later for plotting

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Reference value of the gravitational acceleration used for comparisons (m/s²).
pub const STANDARD_G: f64 = 9.8;

/// Which model(s) to fit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum ModelSpec {
    /// Fit every kinematic model and pick one by BIC.
    Auto,
    /// `h = ½gt²`
    FreeFall,
    /// `h = h0 + ½gt²`
    Offset,
    /// `h = h0 + v0·t + ½gt²`
    Kinematic,
}

impl ModelSpec {
    /// Next spec in display order (wraps around). Used by the TUI model toggle.
    pub fn next(self) -> ModelSpec {
        match self {
            ModelSpec::Auto => ModelSpec::FreeFall,
            ModelSpec::FreeFall => ModelSpec::Offset,
            ModelSpec::Offset => ModelSpec::Kinematic,
            ModelSpec::Kinematic => ModelSpec::Auto,
        }
    }

    pub fn display_name(self) -> &'static str {
        match self.to_kind() {
            Some(kind) => kind.display_name(),
            None => "auto (BIC)",
        }
    }

    pub fn to_kind(self) -> Option<ModelKind> {
        match self {
            ModelSpec::Auto => None,
            ModelSpec::FreeFall => Some(ModelKind::FreeFall),
            ModelSpec::Offset => Some(ModelKind::Offset),
            ModelSpec::Kinematic => Some(ModelKind::Kinematic),
        }
    }
}

/// Concrete fitted model kind.
///
/// Parameter order is fixed per kind and always starts with `g`, so callers can
/// read the gravitational acceleration as `values[0]` regardless of the kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ModelKind {
    FreeFall,
    Offset,
    Kinematic,
}

impl ModelKind {
    pub const ALL: [ModelKind; 3] = [ModelKind::FreeFall, ModelKind::Offset, ModelKind::Kinematic];

    /// Human-readable label for terminal output.
    pub fn display_name(self) -> &'static str {
        match self {
            ModelKind::FreeFall => "free-fall",
            ModelKind::Offset => "free-fall + offset",
            ModelKind::Kinematic => "kinematic",
        }
    }

    /// Compact equation used in plot annotations.
    pub fn equation(self) -> &'static str {
        match self {
            ModelKind::FreeFall => "h = ½gt²",
            ModelKind::Offset => "h = h₀ + ½gt²",
            ModelKind::Kinematic => "h = h₀ + v₀t + ½gt²",
        }
    }

    /// Long-form equation used in the detailed report.
    pub fn equation_long(self) -> &'static str {
        match self {
            ModelKind::FreeFall => "h = (1/2) × g × t²",
            ModelKind::Offset => "h = h0 + (1/2) × g × t²",
            ModelKind::Kinematic => "h = h0 + v0 × t + (1/2) × g × t²",
        }
    }

    pub fn param_count(self) -> usize {
        match self {
            ModelKind::FreeFall => 1,
            ModelKind::Offset => 2,
            ModelKind::Kinematic => 3,
        }
    }

    pub fn param_names(self) -> &'static [&'static str] {
        match self {
            ModelKind::FreeFall => &["g"],
            ModelKind::Offset => &["g", "h0"],
            ModelKind::Kinematic => &["g", "v0", "h0"],
        }
    }

    pub fn param_units(self) -> &'static [&'static str] {
        match self {
            ModelKind::FreeFall => &["m/s²"],
            ModelKind::Offset => &["m/s²", "m"],
            ModelKind::Kinematic => &["m/s²", "m/s", "m"],
        }
    }
}

/// A normalized measurement used for fitting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    /// 0-based position among the rows that survived ingest.
    pub index: usize,
    /// Elapsed time (s).
    pub time: f64,
    /// Fallen distance (m).
    pub height: f64,
    /// Optional 1σ measurement uncertainty on `height` (m).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sigma: Option<f64>,
}

impl Observation {
    pub fn new(index: usize, time: f64, height: f64) -> Self {
        Self {
            index,
            time,
            height,
            sigma: None,
        }
    }

    /// Least-squares weight `1/σ²` (or 1 when no uncertainty is known).
    pub fn weight(&self) -> f64 {
        match self.sigma {
            Some(s) => 1.0 / (s * s),
            None => 1.0,
        }
    }
}

/// Summary stats about the observations actually used for fitting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetStats {
    pub n: usize,
    pub t_min: f64,
    pub t_max: f64,
    pub h_min: f64,
    pub h_max: f64,
    pub h_mean: f64,
}

/// A per-observation fitted result (used for tables and exports).
#[derive(Debug, Clone)]
pub struct PointResidual {
    pub observation: Observation,
    pub fitted: f64,
    pub residual: f64,
}

/// Fit quality diagnostics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FitQuality {
    /// Unweighted sum of squared residuals (m²).
    pub sse: f64,
    /// Weighted objective minimized by the solver (equals `sse` without sigmas).
    pub chi_square: f64,
    pub rmse: f64,
    /// Coefficient of determination; `None` when all heights are identical.
    pub r_squared: Option<f64>,
    pub bic: f64,
    pub n: usize,
    pub dof: usize,
    pub iterations: usize,
}

/// Fitted model parameters with their uncertainties.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelParams {
    pub kind: ModelKind,
    pub values: Vec<f64>,
    #[serde(with = "non_finite_as_null")]
    pub std_errors: Vec<f64>,
    /// Row-major `k × k` parameter covariance.
    #[serde(with = "non_finite_as_null")]
    pub covariance: Vec<f64>,
}

/// JSON has no infinity: undefined uncertainties are written as `null` and read
/// back as `+∞`.
mod non_finite_as_null {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(values: &[f64], serializer: S) -> Result<S::Ok, S::Error> {
        let raw: Vec<Option<f64>> = values.iter().map(|v| v.is_finite().then_some(*v)).collect();
        raw.serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<f64>, D::Error> {
        let raw = Vec::<Option<f64>>::deserialize(deserializer)?;
        Ok(raw.into_iter().map(|v| v.unwrap_or(f64::INFINITY)).collect())
    }
}

/// Fit output for a single model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FitResult {
    pub model: ModelParams,
    pub quality: FitQuality,
}

impl FitResult {
    /// Fitted gravitational acceleration (m/s²).
    pub fn g(&self) -> f64 {
        self.model.values[0]
    }

    /// Standard error of `g` (m/s²).
    pub fn g_std_error(&self) -> f64 {
        self.model.std_errors[0]
    }
}

/// Column selection for CSV ingest.
#[derive(Debug, Clone, Default)]
pub struct ColumnSpec {
    pub time: Option<String>,
    pub height: Option<String>,
    pub sigma: Option<String>,
    /// Use the first two columns regardless of their names.
    pub positional: bool,
}

/// A full run's configuration as understood by the pipeline.
///
/// This is derived from CLI flags (plus `.env`/environment defaults).
#[derive(Debug, Clone)]
pub struct FitConfig {
    /// Input CSV. `None` means the built-in demo dataset.
    pub data_path: Option<PathBuf>,
    pub columns: ColumnSpec,
    pub model_spec: ModelSpec,

    /// Reference `g` for error percentages and the optional reference curve.
    pub g_ref: f64,
    /// Initial guess for `g` handed to the solver.
    pub g_init: f64,
    /// Treat sigmas as absolute (do not rescale the covariance by `χ²/dof`).
    pub absolute_sigma: bool,
    pub max_iterations: usize,

    /// Number of rows shown in the data overview.
    pub preview_rows: usize,
    pub reference_curve: bool,

    pub plot: bool,
    pub plot_width: usize,
    pub plot_height: usize,
    /// SVG chart output path (`None` disables the chart).
    pub chart_path: Option<PathBuf>,

    pub export_results: Option<PathBuf>,
    pub export_fit: Option<PathBuf>,
}

impl Default for FitConfig {
    fn default() -> Self {
        Self {
            data_path: None,
            columns: ColumnSpec::default(),
            model_spec: ModelSpec::FreeFall,
            g_ref: STANDARD_G,
            g_init: 1.0,
            absolute_sigma: false,
            max_iterations: 200,
            preview_rows: 5,
            reference_curve: false,
            plot: true,
            plot_width: 72,
            plot_height: 20,
            chart_path: None,
            export_results: None,
            export_fit: None,
        }
    }
}

/// A saved fit file (JSON).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FitFile {
    pub tool: String,
    pub generated_at: DateTime<Utc>,
    /// Where the data came from (file path or `demo`).
    pub source: String,
    pub g_ref: f64,
    pub fit: FitResult,
    pub observations: Vec<Observation>,
    pub grid: CurveGrid,
}

/// The fitted curve sampled on a uniform time grid.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurveGrid {
    pub time: Vec<f64>,
    pub height: Vec<f64>,
}
