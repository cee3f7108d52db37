//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - loads `.env` and sets up logging
//! - parses CLI arguments
//! - runs the fit pipeline (CSV or demo data)
//! - prints reports/plots
//! - writes the chart and optional exports

use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Command, FitArgs, PlotArgs, SimulateArgs};
use crate::data::{SimulateConfig, simulate, write_observations_csv};
use crate::domain::{ColumnSpec, FitConfig};
use crate::error::AppError;
use crate::plot::{DEFAULT_CHART_SIZE, PlotData, render_ascii_plot, render_svg_chart};

pub mod pipeline;

/// Entry point for the `fall` binary.
pub fn run() -> Result<(), AppError> {
    // A missing `.env` is the normal case.
    dotenvy::dotenv().ok();

    // `fall` and `fall --data x.csv` behave like `fall fit ...`.
    //
    // Clap requires a subcommand name, so we do a small, explicit rewrite of the
    // argv list before parsing.
    let argv = rewrite_args(std::env::args().collect());
    let cli = Cli::parse_from(argv);

    init_tracing(cli.verbose);

    match cli.command {
        Command::Fit(args) => handle_fit(&args),
        Command::Table(args) => handle_table(&args),
        Command::Plot(args) => handle_plot(&args),
        Command::Simulate(args) => handle_simulate(&args),
        Command::Tui(args) => crate::tui::run(fit_config_from_args(&args)),
    }
}

fn handle_fit(args: &FitArgs) -> Result<(), AppError> {
    let config = fit_config_from_args(args);
    let ingest = pipeline::load_data(&config)?;
    print!("{}", crate::report::format_overview(&ingest));

    println!("\nFitting {} model...", config.model_spec.display_name());
    let run = pipeline::run_fit_with_data(&config, ingest)?;
    let best = &run.selection.best;

    print!("{}", crate::report::format_fit_summary(best, config.g_ref));

    let plot_data = PlotData::from_fit(&run.ingest.observations, best, config.g_ref, config.reference_curve);
    if config.plot {
        println!();
        print!("{}", render_ascii_plot(&plot_data, config.plot_width, config.plot_height));
    }
    if let Some(path) = &config.chart_path {
        render_svg_chart(&plot_data, path, DEFAULT_CHART_SIZE)?;
        println!("\nChart written to {}", path.display());
    }

    print!(
        "{}",
        crate::report::format_detailed(&run.selection, &run.residuals, &config)
    );

    // Optional exports.
    if let Some(path) = &config.export_results {
        crate::io::export::write_results_csv(path, &run.residuals, best, config.g_ref)?;
        tracing::info!(path = %path.display(), "wrote results CSV");
    }
    if let Some(path) = &config.export_fit {
        let fit_file = crate::io::fit_file::build_fit_file(best, &run.ingest, config.g_ref);
        crate::io::fit_file::write_fit_json(path, &fit_file)?;
        tracing::info!(path = %path.display(), "wrote fit JSON");
    }

    Ok(())
}

fn handle_table(args: &FitArgs) -> Result<(), AppError> {
    let config = fit_config_from_args(args);
    let run = pipeline::run_fit(&config)?;
    print!(
        "{}",
        crate::report::format_table(&run.residuals, config.reference_curve.then_some(config.g_ref))
    );
    Ok(())
}

fn handle_plot(args: &PlotArgs) -> Result<(), AppError> {
    let fit_file = crate::io::fit_file::read_fit_json(&args.fit)?;
    let plot_data = PlotData::from_fit_file(&fit_file, args.reference_curve);

    println!(
        "Fit from {} ({}, {})",
        fit_file.source,
        fit_file.tool,
        fit_file.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
    print!("{}", crate::report::format_fit_summary(&fit_file.fit, fit_file.g_ref));
    println!();
    print!("{}", render_ascii_plot(&plot_data, args.width, args.height));

    if let Some(path) = &args.chart {
        render_svg_chart(&plot_data, path, DEFAULT_CHART_SIZE)?;
        println!("\nChart written to {}", path.display());
    }
    Ok(())
}

fn handle_simulate(args: &SimulateArgs) -> Result<(), AppError> {
    let config = SimulateConfig {
        g: args.g,
        t_max: args.t_max,
        step: args.step,
        noise_sd: args.noise,
        h0: args.h0,
        v0: args.v0,
        decimals: args.decimals,
        seed: args.seed,
    };
    let observations = simulate(&config)?;
    write_observations_csv(&args.output, &observations)?;
    println!(
        "Wrote {} observations to {}",
        observations.len(),
        args.output.display()
    );
    Ok(())
}

pub fn fit_config_from_args(args: &FitArgs) -> FitConfig {
    FitConfig {
        data_path: if args.demo { None } else { args.data.clone() },
        columns: ColumnSpec {
            time: args.time_col.clone(),
            height: args.height_col.clone(),
            sigma: args.sigma_col.clone(),
            positional: args.positional,
        },
        model_spec: args.model,
        g_ref: args.g_ref,
        g_init: args.g_init,
        absolute_sigma: args.absolute_sigma,
        max_iterations: args.max_iter,
        preview_rows: args.preview_rows,
        reference_curve: args.reference_curve,
        plot: !args.no_plot,
        plot_width: args.width,
        plot_height: args.height,
        chart_path: (!args.no_chart).then(|| args.chart.clone()),
        export_results: args.export.clone(),
        export_fit: args.export_fit.clone(),
    }
}

/// Log filter: `-v`/`-vv` win, then `FALL_LOG`, then `RUST_LOG`, else `warn`.
fn log_filter(verbose: u8) -> EnvFilter {
    match verbose {
        0 => {}
        1 => return EnvFilter::new("info"),
        _ => return EnvFilter::new("debug"),
    }
    for var in ["FALL_LOG", "RUST_LOG"] {
        if let Ok(filter) = EnvFilter::try_from_env(var) {
            return filter;
        }
    }
    EnvFilter::new("warn")
}

fn init_tracing(verbose: u8) {
    // Logs go to stderr so stdout stays clean for reports and `fall table`.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(log_filter(verbose))
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

/// Rewrite argv so `fall` defaults to `fall fit`.
///
/// Rules:
/// - `fall`                       -> `fall fit`
/// - `fall --data x.csv ...`      -> `fall fit --data x.csv ...`
/// - `fall --help/--version/-h`   -> unchanged (show top-level help/version)
fn rewrite_args(mut argv: Vec<String>) -> Vec<String> {
    let Some(arg1) = argv.get(1).cloned() else {
        argv.push("fit".to_string());
        return argv;
    };

    let is_top_level_help_or_version = matches!(arg1.as_str(), "-h" | "--help" | "-V" | "--version" | "help");
    if is_top_level_help_or_version {
        return argv;
    }

    let is_subcommand = matches!(arg1.as_str(), "fit" | "table" | "plot" | "simulate" | "tui");
    if is_subcommand {
        return argv;
    }

    // If the first token is a flag, treat it as "fit flags".
    if arg1.starts_with('-') {
        argv.insert(1, "fit".to_string());
        return argv;
    }

    // Otherwise, leave as-is.
    argv
}
