//! Goodness-of-fit statistics.
//!
//! All statistics here are computed on *unweighted* residuals so that `R²` and
//! RMSE keep their usual meaning (metres) even when the solver used sigmas.

/// Arithmetic mean, `None` for an empty slice.
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Sum of squared residuals `Σ (y_i − ŷ_i)²`.
pub fn sum_squared_residuals(observed: &[f64], fitted: &[f64]) -> f64 {
    observed
        .iter()
        .zip(fitted)
        .map(|(y, f)| (y - f) * (y - f))
        .sum()
}

/// Coefficient of determination `R² = 1 − SS_res / SS_tot`.
///
/// Returns `None` when `SS_tot = 0` (all observations identical), where the
/// ratio is undefined.
pub fn r_squared(observed: &[f64], fitted: &[f64]) -> Option<f64> {
    let y_mean = mean(observed)?;
    let ss_tot: f64 = observed.iter().map(|y| (y - y_mean) * (y - y_mean)).sum();
    if ss_tot <= 0.0 || !ss_tot.is_finite() {
        return None;
    }
    let ss_res = sum_squared_residuals(observed, fitted);
    Some(1.0 - ss_res / ss_tot)
}

/// Root mean squared error `√(SS_res / n)`.
pub fn rmse(sse: f64, n: usize) -> f64 {
    if n == 0 {
        return f64::NAN;
    }
    (sse / n as f64).sqrt()
}

/// Bayesian information criterion for a Gaussian least squares fit:
/// `BIC = n · ln(SSE/n) + k · ln(n)`.
///
/// `sse_floor` keeps exact (noise-free) fits from producing `-∞` and from
/// ranking models on floating point round-off.
pub fn bic(n: usize, sse: f64, k: usize, sse_floor: f64) -> f64 {
    let n_f = n.max(1) as f64;
    let sse = sse.max(sse_floor).max(f64::MIN_POSITIVE);
    n_f * (sse / n_f).ln() + k as f64 * n_f.ln()
}

/// Absolute percentage deviation of `value` from `reference`.
pub fn percent_error(value: f64, reference: f64) -> f64 {
    ((value - reference) / reference).abs() * 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn r_squared_perfect_and_partial() {
        let y = [1.0, 2.0, 3.0, 4.0];
        assert!((r_squared(&y, &y).unwrap() - 1.0).abs() < 1e-15);

        // Predicting the mean everywhere explains nothing.
        let flat = [2.5; 4];
        assert!(r_squared(&y, &flat).unwrap().abs() < 1e-15);
    }

    #[test]
    fn r_squared_undefined_for_constant_data() {
        let y = [3.0, 3.0, 3.0];
        assert!(r_squared(&y, &[3.0, 3.0, 3.0]).is_none());
    }

    #[test]
    fn rmse_and_percent_error() {
        assert!((rmse(8.0, 2) - 2.0).abs() < 1e-15);
        assert!((percent_error(9.996, 9.8) - 2.0).abs() < 1e-9);
    }

    #[test]
    fn bic_penalizes_parameters() {
        let simple = bic(14, 0.01, 1, 0.0);
        let complex = bic(14, 0.01, 3, 0.0);
        assert!(complex > simple);
        assert!(bic(14, 0.0, 1, 1e-20).is_finite());
    }
}
