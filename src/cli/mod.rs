//! Command-line parsing for the free-fall fitter.
//!
//! The goal of this module is to keep **argument parsing** and **command dispatch**
//! separate from the modeling/math code.
//!
//! Defaults for a few options can come from the environment (or a `.env` file):
//! `FALL_DATA`, `FALL_G_REF` and `FALL_LOG`.

use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand};

use crate::domain::{ModelSpec, STANDARD_G};

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "fall", version, about = "Free-fall experiment fitter: estimate g from time/height data")]
pub struct Cli {
    /// Increase log verbosity (-v info, -vv debug). Overrides FALL_LOG/RUST_LOG.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fit h = ½gt² to the data, print statistics, and plot/export the result.
    Fit(FitArgs),
    /// Print only the per-observation table (useful for scripting).
    Table(FitArgs),
    /// Plot a previously exported fit JSON.
    Plot(PlotArgs),
    /// Write a synthetic free-fall dataset to CSV.
    Simulate(SimulateArgs),
    /// Launch the interactive TUI.
    ///
    /// This uses the same underlying fit pipeline as `fall fit`, but renders results
    /// in a terminal UI using Ratatui.
    Tui(FitArgs),
}

/// Common options for fitting.
#[derive(Debug, Args, Clone)]
pub struct FitArgs {
    /// Input CSV with time/height columns. Without it the built-in demo dataset is used.
    #[arg(short = 'd', long, env = "FALL_DATA", value_name = "CSV")]
    pub data: Option<PathBuf>,

    /// Use the built-in demo dataset even if FALL_DATA or --data is set.
    #[arg(long)]
    pub demo: bool,

    /// Time column name (default: auto-detect `time(s)`, `time`, `t`, ...).
    #[arg(long)]
    pub time_col: Option<String>,

    /// Height column name (default: auto-detect `hight(m)`, `height(m)`, `h`, ...).
    #[arg(long)]
    pub height_col: Option<String>,

    /// Optional column with 1σ height uncertainties (used as weights 1/σ²).
    #[arg(long)]
    pub sigma_col: Option<String>,

    /// Use the first two columns as time and height regardless of their names.
    #[arg(long, conflicts_with_all = ["time_col", "height_col"])]
    pub positional: bool,

    /// Which model(s) to fit.
    #[arg(long, value_enum, default_value_t = ModelSpec::FreeFall)]
    pub model: ModelSpec,

    /// Reference g (m/s²) for error percentages and the reference curve.
    #[arg(long, env = "FALL_G_REF", default_value_t = STANDARD_G, value_parser = parse_g_ref)]
    pub g_ref: f64,

    /// Initial guess for g handed to the solver.
    #[arg(long, default_value_t = 1.0, allow_negative_numbers = true)]
    pub g_init: f64,

    /// Treat sigmas as absolute (do not rescale the covariance by χ²/dof).
    #[arg(long, requires = "sigma_col")]
    pub absolute_sigma: bool,

    /// Maximum number of Levenberg–Marquardt iterations.
    #[arg(long, default_value_t = 200)]
    pub max_iter: usize,

    /// Number of rows shown in the data overview.
    #[arg(long, default_value_t = 5)]
    pub preview_rows: usize,

    /// Also draw/tabulate the reference curve ½·g_ref·t².
    #[arg(long)]
    pub reference_curve: bool,

    /// Disable the terminal plot.
    #[arg(long)]
    pub no_plot: bool,

    /// Plot width (columns).
    #[arg(long, default_value_t = 72)]
    pub width: usize,

    /// Plot height (rows).
    #[arg(long, default_value_t = 20)]
    pub height: usize,

    /// SVG chart output path.
    #[arg(long, value_name = "SVG", default_value = "free_fall_fit.svg")]
    pub chart: PathBuf,

    /// Do not write the SVG chart.
    #[arg(long)]
    pub no_chart: bool,

    /// Export per-observation results to CSV.
    #[arg(long, value_name = "CSV")]
    pub export: Option<PathBuf>,

    /// Export the fit (model + params + fitted grid) to JSON.
    #[arg(long = "export-fit", value_name = "JSON")]
    pub export_fit: Option<PathBuf>,
}

/// Options for plotting a saved fit.
#[derive(Debug, Args)]
pub struct PlotArgs {
    /// Fit JSON file produced by `fall fit --export-fit`.
    #[arg(long, value_name = "JSON")]
    pub fit: PathBuf,

    /// Also draw the reference curve ½·g_ref·t² (g_ref stored in the file).
    #[arg(long)]
    pub reference_curve: bool,

    /// Plot width (columns).
    #[arg(long, default_value_t = 72)]
    pub width: usize,

    /// Plot height (rows).
    #[arg(long, default_value_t = 20)]
    pub height: usize,

    /// Also render the annotated SVG chart to this path.
    #[arg(long, value_name = "SVG")]
    pub chart: Option<PathBuf>,
}

/// Options for synthetic data generation.
#[derive(Debug, Args)]
pub struct SimulateArgs {
    /// Output CSV path.
    #[arg(short, long, value_name = "CSV")]
    pub output: PathBuf,

    /// True gravitational acceleration (m/s²).
    #[arg(long, default_value_t = STANDARD_G)]
    pub g: f64,

    /// Last sample time (s).
    #[arg(long, default_value_t = 0.65)]
    pub t_max: f64,

    /// Sampling interval (s).
    #[arg(long, default_value_t = 0.05)]
    pub step: f64,

    /// Standard deviation of Gaussian height noise (m).
    #[arg(long, default_value_t = 0.0)]
    pub noise: f64,

    /// Height at t = 0 (m).
    #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
    pub h0: f64,

    /// Release velocity (m/s).
    #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
    pub v0: f64,

    /// Decimal places kept in the generated heights (0-15).
    #[arg(long, default_value_t = 5, value_parser = clap::value_parser!(u32).range(0..=15))]
    pub decimals: u32,

    /// Random seed (same seed, same data).
    #[arg(long, default_value_t = 42)]
    pub seed: u64,
}

/// Reference g is a divisor in every percent error, so it must be finite and > 0.
fn parse_g_ref(s: &str) -> Result<f64, String> {
    let v: f64 = s.trim().parse().map_err(|e| format!("`{s}` is not a number: {e}"))?;
    if v.is_finite() && v > 0.0 {
        Ok(v)
    } else {
        Err(format!("reference g must be finite and > 0, got {v}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_fit_flags() {
        let cli = Cli::try_parse_from([
            "fall",
            "-v",
            "fit",
            "--data",
            "drop.csv",
            "--model",
            "auto",
            "--reference-curve",
            "--no-chart",
        ])
        .unwrap();

        assert_eq!(cli.verbose, 1);
        let Command::Fit(args) = cli.command else {
            panic!("expected fit");
        };
        assert_eq!(args.data, Some(PathBuf::from("drop.csv")));
        assert_eq!(args.model, ModelSpec::Auto);
        assert!(args.reference_curve);
        assert!(args.no_chart);
        assert_eq!(args.chart, PathBuf::from("free_fall_fit.svg"));
    }

    #[test]
    fn positional_conflicts_with_named_columns() {
        let err = Cli::try_parse_from(["fall", "fit", "--positional", "--time-col", "t"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ArgumentConflict);
    }

    #[test]
    fn reference_g_must_be_positive() {
        for bad in ["0", "-9.8", "inf", "NaN"] {
            let arg = format!("--g-ref={bad}");
            let err = Cli::try_parse_from(["fall", "fit", arg.as_str()]).unwrap_err();
            assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation, "{bad}");
        }
        let cli = Cli::try_parse_from(["fall", "fit", "--g-ref", "9.81"]).unwrap();
        let Command::Fit(args) = cli.command else {
            panic!("expected fit");
        };
        assert_eq!(args.g_ref, 9.81);
    }

    #[test]
    fn decimals_are_bounded() {
        let err = Cli::try_parse_from(["fall", "simulate", "-o", "x.csv", "--decimals", "400"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }
}
