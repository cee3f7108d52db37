//! Formatted terminal output.
//!
//! We keep formatting code in one place so:
//! - the math/fitting code stays clean and testable
//! - output changes are localized (the tests below pin the exact layout)

use crate::domain::{FitConfig, FitResult, ModelKind, PointResidual};
use crate::fit::selection::FitSelection;
use crate::io::ingest::IngestedData;
use crate::math::percent_error;
use crate::models::predict;

const RULE_WIDTH: usize = 50;

/// Format the data overview printed right after loading.
pub fn format_overview(ingest: &IngestedData) -> String {
    let mut out = String::new();

    out.push_str("=== fall - Free-Fall Fit ===\n");
    out.push_str(&format!("Loaded data from {}\n", ingest.source));
    out.push_str(&format!(
        "Columns: time='{}' height='{}'",
        ingest.columns.time, ingest.columns.height
    ));
    if let Some(sigma) = &ingest.columns.sigma {
        out.push_str(&format!(" sigma='{sigma}'"));
    }
    out.push('\n');

    out.push_str("\nData overview:\n");
    out.push_str(&format_preview(&ingest.preview.headers, &ingest.preview.rows));
    out.push_str(&format!(
        "\nShape: ({}, {})\n",
        ingest.preview.shape.0, ingest.preview.shape.1
    ));

    let s = &ingest.stats;
    out.push_str(&format!("\nTime range: {:.3} ~ {:.3} s\n", s.t_min, s.t_max));
    out.push_str(&format!("Height range: {:.3} ~ {:.3} m\n", s.h_min, s.h_max));
    out.push_str(&format!("Mean height: {:.3} m\n", s.h_mean));

    if !ingest.row_errors.is_empty() {
        out.push_str(&format!(
            "Rows used: {}/{} ({} skipped)\n",
            ingest.rows_used,
            ingest.rows_read,
            ingest.row_errors.len()
        ));
        for e in &ingest.row_errors {
            out.push_str(&format!("  line {}: {}\n", e.line, e.message));
        }
    }

    out
}

/// Format the short fit summary (`g ± σ`, reference, percent error, R²).
pub fn format_fit_summary(fit: &FitResult, g_ref: f64) -> String {
    let mut out = String::new();
    let g = fit.g();

    out.push_str(&format!(
        "\nFit succeeded ({} model, {} iterations)\n",
        fit.model.kind.display_name(),
        fit.quality.iterations
    ));
    out.push_str(&format!("Fitted g: {g:.4} ± {:.4} m/s²\n", fit.g_std_error()));
    out.push_str(&format!("Reference g: {g_ref:.4} m/s²\n"));
    out.push_str(&format!("Percent error: {:.2}%\n", percent_error(g, g_ref)));
    out.push_str(&format!("R²: {}\n", fmt_r_squared(fit.quality.r_squared, 4)));

    out
}

/// Format the detailed results block printed after plotting.
pub fn format_detailed(selection: &FitSelection, residuals: &[PointResidual], config: &FitConfig) -> String {
    let fit = &selection.best;
    let kind = fit.model.kind;
    let g = fit.g();
    let g_ref = config.g_ref;

    let mut out = String::new();
    out.push('\n');
    out.push_str(&"=".repeat(RULE_WIDTH));
    out.push_str("\nDetailed fit results\n");
    out.push_str(&"=".repeat(RULE_WIDTH));
    out.push('\n');

    out.push_str(&format!("Model: {}\n", kind.equation_long()));

    out.push_str("Parameters:\n");
    for (i, name) in kind.param_names().iter().enumerate() {
        out.push_str(&format!(
            "  {name:<2} = {:.6} ± {:.6} {}\n",
            fit.model.values[i],
            fit.model.std_errors[i],
            kind.param_units()[i]
        ));
    }

    out.push_str("Fit quality:\n");
    out.push_str(&format!("  R²   = {}\n", fmt_r_squared(fit.quality.r_squared, 6)));
    out.push_str(&format!("  RMSE = {:.6} m\n", fit.quality.rmse));
    out.push_str(&format!("  SSE  = {:.6e} m² (n={}, dof={})\n", fit.quality.sse, fit.quality.n, fit.quality.dof));

    out.push_str("Comparison with reference:\n");
    out.push_str(&format!("  reference g    = {g_ref:.6} m/s²\n"));
    out.push_str(&format!("  absolute error = {:.6} m/s²\n", (g - g_ref).abs()));
    out.push_str(&format!("  relative error = {:.4}%\n", percent_error(g, g_ref)));

    if selection.fits.len() > 1 || !selection.skipped.is_empty() {
        out.push_str("\nModel diagnostics:\n");
        for f in &selection.fits {
            let chosen = if f.model.kind == kind { "*" } else { " " };
            out.push_str(&format!(
                "{chosen} {:<18} g={:.4} SSE={:.3e} RMSE={:.5}m BIC={:.3}\n",
                f.model.kind.display_name(),
                f.g(),
                f.quality.sse,
                f.quality.rmse,
                f.quality.bic
            ));
        }
        for (kind, reason) in &selection.skipped {
            out.push_str(&format!("  (skipped {}) {reason}\n", kind.display_name()));
        }
    }

    out.push_str("\nData table:\n");
    out.push_str(&format_table(residuals, config.reference_curve.then_some(g_ref)));

    out
}

/// Format the per-observation table.
///
/// With `reference = Some(g_ref)` two extra columns show the reference curve
/// `½ · g_ref · t²` and the measured height's difference from it.
pub fn format_table(rows: &[PointResidual], reference: Option<f64>) -> String {
    let mut out = String::new();

    let mut header = format!(
        "{:<10} {:<10} {:<12} {:<10}",
        "time(s)", "height(m)", "fitted(m)", "residual(m)"
    );
    let mut width = 45;
    if reference.is_some() {
        header.push_str(&format!(" {:<12} {:<10}", "reference(m)", "diff(m)"));
        width += 24;
    }
    out.push_str(header.trim_end());
    out.push('\n');
    out.push_str(&"-".repeat(width));
    out.push('\n');

    for r in rows {
        let o = &r.observation;
        let mut line = format!(
            "{:<10.3} {:<10.5} {:<12.5} {:<10.5}",
            o.time, o.height, r.fitted, r.residual
        );
        if let Some(g_ref) = reference {
            let h_ref = predict(ModelKind::FreeFall, o.time, &[g_ref]);
            line.push_str(&format!(" {:<12.5} {:<10.5}", h_ref, o.height - h_ref));
        }
        out.push_str(line.trim_end());
        out.push('\n');
    }

    out
}

fn format_preview(headers: &[String], rows: &[Vec<String>]) -> String {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
    for row in rows {
        for (i, cell) in row.iter().enumerate() {
            if let Some(w) = widths.get_mut(i) {
                *w = (*w).max(cell.chars().count());
            }
        }
    }

    let index_width = rows.len().saturating_sub(1).to_string().len();
    let mut out = String::new();

    let mut line = " ".repeat(index_width);
    for (h, w) in headers.iter().zip(&widths) {
        line.push_str(&format!("  {h:>w$}"));
    }
    out.push_str(line.trim_end());
    out.push('\n');

    for (i, row) in rows.iter().enumerate() {
        let mut line = format!("{i:<index_width$}");
        for (cell, w) in row.iter().zip(&widths) {
            line.push_str(&format!("  {cell:>w$}"));
        }
        out.push_str(line.trim_end());
        out.push('\n');
    }

    out
}

fn fmt_r_squared(r2: Option<f64>, decimals: usize) -> String {
    match r2 {
        Some(v) => format!("{v:.decimals$}"),
        None => "n/a".to_string(),
    }
}
