//! Plot rendering: terminal ASCII plots and the exported SVG chart.
//!
//! Both renderers (and the TUI widget) draw the same [`PlotData`]: observed points,
//! the fitted curve over `[0, t_max]` and an optional reference curve `½ · g_ref · t²`.

pub mod ascii;
pub mod chart;

pub use ascii::*;
pub use chart::*;

use crate::domain::{FitFile, FitResult, ModelKind, Observation};
use crate::io::fit_file::grid_range;
use crate::math::percent_error;
use crate::models::sample_curve;

/// Number of samples used for smooth curves.
pub const CURVE_SAMPLES: usize = 200;

/// Series and annotations shared by every renderer.
#[derive(Debug, Clone)]
pub struct PlotData {
    pub points: Vec<(f64, f64)>,
    pub curve: Vec<(f64, f64)>,
    pub reference: Option<Vec<(f64, f64)>>,
    pub kind: ModelKind,
    pub g: f64,
    pub g_std_error: f64,
    pub r_squared: Option<f64>,
    pub g_ref: f64,
}

impl PlotData {
    /// Build plot series for an in-memory fit.
    pub fn from_fit(observations: &[Observation], fit: &FitResult, g_ref: f64, reference: bool) -> Self {
        let points: Vec<(f64, f64)> = observations.iter().map(|o| (o.time, o.height)).collect();
        let (t0, t1) = grid_range(max_time(&points));
        let curve = sample_curve(fit.model.kind, &fit.model.values, t0, t1, CURVE_SAMPLES);

        Self::assemble(points, curve, fit, g_ref, reference)
    }

    /// Build plot series from a saved fit file (uses its precomputed grid).
    pub fn from_fit_file(fit_file: &FitFile, reference: bool) -> Self {
        let points = fit_file
            .observations
            .iter()
            .map(|o| (o.time, o.height))
            .collect();
        let curve = fit_file
            .grid
            .time
            .iter()
            .zip(&fit_file.grid.height)
            .map(|(&t, &h)| (t, h))
            .collect();

        Self::assemble(points, curve, &fit_file.fit, fit_file.g_ref, reference)
    }

    fn assemble(
        points: Vec<(f64, f64)>,
        curve: Vec<(f64, f64)>,
        fit: &FitResult,
        g_ref: f64,
        reference: bool,
    ) -> Self {
        let reference = reference.then(|| {
            let t1 = max_time(&curve).max(max_time(&points));
            let (t0, t1) = grid_range(t1);
            sample_curve(ModelKind::FreeFall, &[g_ref], t0, t1, CURVE_SAMPLES)
        });

        Self {
            points,
            curve,
            reference,
            kind: fit.model.kind,
            g: fit.g(),
            g_std_error: fit.g_std_error(),
            r_squared: fit.quality.r_squared,
            g_ref,
        }
    }

    /// Time axis bounds: from release (or the earliest sample) to the last sample.
    pub fn x_bounds(&self) -> (f64, f64) {
        let mut lo = 0.0f64;
        let mut hi = f64::NEG_INFINITY;
        for &(t, _) in self.series() {
            lo = lo.min(t);
            hi = hi.max(t);
        }
        if hi.is_finite() && hi > lo { (lo, hi) } else { (lo, lo + 1.0) }
    }

    /// Height axis bounds over all series, padded by `frac` of the span on both sides.
    pub fn y_bounds(&self, frac: f64) -> (f64, f64) {
        let mut lo = f64::INFINITY;
        let mut hi = f64::NEG_INFINITY;
        for &(_, h) in self.series() {
            if h.is_finite() {
                lo = lo.min(h);
                hi = hi.max(h);
            }
        }
        if !(lo.is_finite() && hi.is_finite()) || hi <= lo {
            let mid = if lo.is_finite() { lo } else { 0.0 };
            return (mid - 0.5, mid + 0.5);
        }
        let pad = ((hi - lo) * frac).max(1e-12);
        (lo - pad, hi + pad)
    }

    pub fn fit_label(&self) -> String {
        format!("Fit (g = {:.3} m/s²)", self.g)
    }

    pub fn reference_label(&self) -> String {
        format!("Reference (g = {})", self.g_ref)
    }

    /// Lines of the annotation box: equation, `g ± σ`, R², error vs reference.
    pub fn annotation_lines(&self) -> Vec<String> {
        let r2 = match self.r_squared {
            Some(v) => format!("{v:.4}"),
            None => "n/a".to_string(),
        };
        vec![
            format!("Model: {}", self.kind.equation()),
            format!("g = {:.4} ± {:.4} m/s²", self.g, self.g_std_error),
            format!("R² = {r2}"),
            format!("Error vs {}: {:.2}%", self.g_ref, percent_error(self.g, self.g_ref)),
        ]
    }

    fn series(&self) -> impl Iterator<Item = &(f64, f64)> {
        self.points
            .iter()
            .chain(self.curve.iter())
            .chain(self.reference.iter().flatten())
    }
}

fn max_time(points: &[(f64, f64)]) -> f64 {
    points
        .iter()
        .map(|&(t, _)| t)
        .filter(|t| t.is_finite())
        .fold(f64::NEG_INFINITY, f64::max)
}
