//! Model selection (free-fall vs offset vs kinematic) using BIC with guardrails.
//!
//! The tool fits each enabled model and computes:
//! - SSE / RMSE / R²
//! - BIC = n * ln(χ²/n) + k * ln(n)
//!
//! Selection rules for `--model auto`:
//! 1. Exclude underdetermined models: require `n >= k + 2`
//! 2. Choose the model with minimum BIC
//! 3. If ΔBIC < 2 between the best and a simpler model, pick the simpler model

use rayon::prelude::*;

use crate::domain::{FitConfig, FitResult, ModelKind, Observation};
use crate::error::AppError;
use crate::fit::fitter::{FitOptions, fit_model};

/// Minimum number of extra observations beyond parameter count in auto mode.
const MIN_N_BUFFER: usize = 2;

/// Output of fitting + selection.
#[derive(Debug, Clone)]
pub struct FitSelection {
    pub best: FitResult,
    /// Fits for all attempted models (after guardrails), in model order.
    pub fits: Vec<FitResult>,
    /// Any models that were skipped and why (for diagnostics).
    pub skipped: Vec<(ModelKind, String)>,
}

impl FitOptions {
    pub fn from_config(config: &FitConfig) -> Self {
        Self {
            g_init: config.g_init,
            absolute_sigma: config.absolute_sigma,
            max_iterations: config.max_iterations,
        }
    }
}

/// Fit the requested model, or every model in auto mode, and select the best.
pub fn fit_and_select(observations: &[Observation], config: &FitConfig) -> Result<FitSelection, AppError> {
    let opts = FitOptions::from_config(config);

    // A single requested model is fitted strictly: any failure is the run's failure.
    if let Some(kind) = config.model_spec.to_kind() {
        let fit = fit_model(kind, observations, &opts)?;
        return Ok(FitSelection {
            best: fit.clone(),
            fits: vec![fit],
            skipped: Vec::new(),
        });
    }

    let n = observations.len();
    let mut skipped = Vec::new();
    let mut candidates = Vec::new();
    for kind in ModelKind::ALL {
        let k = kind.param_count();
        if n < k + MIN_N_BUFFER {
            skipped.push((
                kind,
                format!("Underdetermined: n={n} < k+{MIN_N_BUFFER}={}", k + MIN_N_BUFFER),
            ));
        } else {
            candidates.push(kind);
        }
    }

    // Fit candidates concurrently; `collect` keeps the model order.
    let outcomes: Vec<(ModelKind, Result<FitResult, AppError>)> = candidates
        .par_iter()
        .map(|&kind| (kind, fit_model(kind, observations, &opts)))
        .collect();

    let mut fits = Vec::new();
    for (kind, outcome) in outcomes {
        match outcome {
            Ok(fit) => fits.push(fit),
            Err(e) => {
                tracing::warn!(model = kind.display_name(), "model skipped: {e}");
                skipped.push((kind, e.message().to_string()));
            }
        }
    }

    if fits.is_empty() {
        return Err(AppError::insufficient_data(
            "Insufficient data to fit any model after guardrails.",
        ));
    }

    let best = select_by_bic(&fits);
    tracing::info!(model = best.model.kind.display_name(), bic = best.quality.bic, "selected model");

    Ok(FitSelection { best, fits, skipped })
}

fn select_by_bic(fits: &[FitResult]) -> FitResult {
    // Find minimum BIC.
    let mut best = &fits[0];
    for f in &fits[1..] {
        if f.quality.bic < best.quality.bic {
            best = f;
        }
    }

    let best_bic = best.quality.bic;

    // Prefer simplicity if within 2 BIC points.
    //
    // `ModelKind::ALL` is ordered by increasing complexity; pick the first fit
    // that is "close enough" to the best.
    for kind in ModelKind::ALL {
        if let Some(f) = fits.iter().find(|f| f.model.kind == kind) {
            if f.quality.bic < best_bic + 2.0 {
                return f.clone();
            }
        }
    }

    best.clone()
}
