//! Fitting routine for a single model kind.
//!
//! Given:
//! - times `t_i`
//! - observed heights `h_i`
//! - optional uncertainties `σ_i` (weights `1/σ_i²`)
//!
//! we run Levenberg–Marquardt from the initial guess and derive:
//! - the parameter covariance and standard errors
//! - unweighted SSE / RMSE / R² and the BIC used for model selection

use nalgebra::{DMatrix, DVector};

use crate::domain::{FitQuality, FitResult, ModelKind, ModelParams, Observation};
use crate::error::AppError;
use crate::math::{self, LevenbergMarquardt, Problem};
use crate::models::{fill_jacobian_row, predict};

/// Relative SSE floor (× SS_tot) used in the BIC so exact fits compare on
/// parameter count instead of round-off.
const BIC_SSE_REL_FLOOR: f64 = 1e-24;

/// Options that affect how each model is calibrated.
#[derive(Debug, Clone)]
pub struct FitOptions {
    /// Starting value for `g`. Offsets and initial velocities start at zero.
    pub g_init: f64,
    /// Keep sigmas as absolute uncertainties (no χ²/dof rescaling).
    pub absolute_sigma: bool,
    pub max_iterations: usize,
}

impl Default for FitOptions {
    fn default() -> Self {
        Self {
            g_init: 1.0,
            absolute_sigma: false,
            max_iterations: 200,
        }
    }
}

/// The weighted least squares problem handed to the solver.
struct KinematicProblem {
    kind: ModelKind,
    times: Vec<f64>,
    heights: Vec<f64>,
    sqrt_w: Vec<f64>,
}

impl KinematicProblem {
    fn new(kind: ModelKind, observations: &[Observation]) -> Self {
        Self {
            kind,
            times: observations.iter().map(|o| o.time).collect(),
            heights: observations.iter().map(|o| o.height).collect(),
            sqrt_w: observations.iter().map(|o| o.weight().sqrt()).collect(),
        }
    }
}

impl Problem for KinematicProblem {
    fn param_count(&self) -> usize {
        self.kind.param_count()
    }

    fn residuals(&self, params: &DVector<f64>) -> DVector<f64> {
        let p = params.as_slice();
        DVector::from_iterator(
            self.times.len(),
            self.times
                .iter()
                .zip(&self.heights)
                .zip(&self.sqrt_w)
                .map(|((&t, &h), &sw)| sw * (h - predict(self.kind, t, p))),
        )
    }

    fn jacobian(&self, _params: &DVector<f64>) -> DMatrix<f64> {
        let k = self.kind.param_count();
        let mut jac = DMatrix::<f64>::zeros(self.times.len(), k);
        let mut row = vec![0.0; k];
        for (i, (&t, &sw)) in self.times.iter().zip(&self.sqrt_w).enumerate() {
            fill_jacobian_row(self.kind, t, &mut row);
            for j in 0..k {
                jac[(i, j)] = row[j] * sw;
            }
        }
        jac
    }
}

/// Fit a single model kind.
pub fn fit_model(kind: ModelKind, observations: &[Observation], opts: &FitOptions) -> Result<FitResult, AppError> {
    let n = observations.len();
    let k = kind.param_count();

    if n == 0 {
        return Err(AppError::insufficient_data("No data points to fit."));
    }
    if n < k {
        return Err(AppError::insufficient_data(format!(
            "Improper input: {n} observation(s) cannot determine {k} parameters of the {} model.",
            kind.display_name()
        )));
    }
    if observations
        .iter()
        .any(|o| !(o.time.is_finite() && o.height.is_finite() && o.weight().is_finite() && o.weight() > 0.0))
    {
        return Err(AppError::input("Observations must have finite time, height and positive sigma."));
    }
    if !opts.g_init.is_finite() {
        return Err(AppError::input("Initial guess for g must be finite."));
    }

    let problem = KinematicProblem::new(kind, observations);

    let mut initial = DVector::<f64>::zeros(k);
    initial[0] = opts.g_init;

    // Every model is linear in its parameters, so the Jacobian rank tells us up
    // front whether the times can pin down all parameters.
    let jac0 = problem.jacobian(&initial);
    let svd0 = jac0.clone().svd(false, false);
    let tol = 1e-12 * svd0.singular_values.max().max(1.0);
    if svd0.rank(tol) < k {
        return Err(AppError::insufficient_data(format!(
            "The {} model is not identifiable from these times (need {k} distinct informative time values).",
            kind.display_name()
        )));
    }

    let solver = LevenbergMarquardt::default().with_max_iterations(opts.max_iterations);
    let report = solver.minimize(&problem, initial)?;

    tracing::debug!(
        model = kind.display_name(),
        iterations = report.iterations,
        termination = report.termination.describe(),
        "solver finished"
    );

    if !report.termination.converged() {
        return Err(AppError::numerical(format!(
            "Optimal parameters not found for the {} model: {} after {} iterations.",
            kind.display_name(),
            report.termination.describe(),
            report.iterations
        )));
    }

    let jac = problem.jacobian(&report.params);
    let cov = math::covariance(&jac, report.chi_square, opts.absolute_sigma)?;
    let std_errors = math::standard_errors(&cov);
    if std_errors.iter().any(|e| e.is_infinite()) {
        tracing::warn!(
            model = kind.display_name(),
            "Covariance of the parameters could not be estimated (no degrees of freedom)."
        );
    }

    let values: Vec<f64> = report.params.iter().copied().collect();
    let heights: Vec<f64> = observations.iter().map(|o| o.height).collect();
    let fitted: Vec<f64> = observations.iter().map(|o| predict(kind, o.time, &values)).collect();
    if fitted.iter().any(|v| !v.is_finite()) {
        return Err(AppError::numerical("Non-finite model prediction after fitting."));
    }

    let sse = math::sum_squared_residuals(&heights, &fitted);
    let ss_tot = match math::mean(&heights) {
        Some(m) => heights.iter().map(|h| (h - m) * (h - m)).sum::<f64>(),
        None => 0.0,
    };

    let quality = FitQuality {
        sse,
        chi_square: report.chi_square,
        rmse: math::rmse(sse, n),
        r_squared: math::r_squared(&heights, &fitted),
        bic: math::bic(n, report.chi_square, k, BIC_SSE_REL_FLOOR * ss_tot),
        n,
        dof: n - k,
        iterations: report.iterations,
    };

    Ok(FitResult {
        model: ModelParams {
            kind,
            values,
            std_errors,
            covariance: cov.transpose().as_slice().to_vec(),
        },
        quality,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::demo_observations;

    fn obs(points: &[(f64, f64)]) -> Vec<Observation> {
        points
            .iter()
            .enumerate()
            .map(|(i, &(t, h))| Observation::new(i, t, h))
            .collect()
    }

    #[test]
    fn recovers_g_from_demo_dataset() {
        let fit = fit_model(ModelKind::FreeFall, &demo_observations(), &FitOptions::default()).unwrap();
        assert!((fit.g() - 9.8).abs() < 1e-6, "g = {}", fit.g());
        assert!(fit.g_std_error() < 1e-4);
        assert!(fit.quality.r_squared.unwrap() > 0.999_999);
        assert_eq!(fit.quality.n, 14);
        assert_eq!(fit.quality.dof, 13);
    }

    #[test]
    fn iteration_cap_is_a_numerical_failure() {
        let opts = FitOptions {
            max_iterations: 1,
            ..FitOptions::default()
        };
        let err = fit_model(ModelKind::FreeFall, &demo_observations(), &opts).unwrap_err();
        assert_eq!(err.exit_code(), 4);
        assert!(err.message().starts_with("Optimal parameters not found"), "{}", err.message());
    }

    #[test]
    fn matches_closed_form_single_parameter_regression() {
        // Noisy data: for h = g·x with x = t²/2 the least squares solution is
        // g = Σxh / Σx² and var(g) = s² / Σx² with s² = SSE / (n − 1).
        let data = [(0.1, 0.051), (0.2, 0.193), (0.3, 0.447), (0.4, 0.779), (0.5, 1.231)];
        let observations = obs(&data);
        let fit = fit_model(ModelKind::FreeFall, &observations, &FitOptions::default()).unwrap();

        let sxx: f64 = data.iter().map(|(t, _)| (0.5 * t * t).powi(2)).sum();
        let sxh: f64 = data.iter().map(|(t, h)| 0.5 * t * t * h).sum();
        let g = sxh / sxx;
        let sse: f64 = data.iter().map(|(t, h)| (h - 0.5 * g * t * t).powi(2)).sum();
        let se = (sse / 4.0 / sxx).sqrt();

        assert!((fit.g() - g).abs() < 1e-8, "fit={} closed={g}", fit.g());
        assert!((fit.g_std_error() - se).abs() < 1e-8);
        assert!((fit.quality.sse - sse).abs() < 1e-12);
    }

    #[test]
    fn kinematic_model_recovers_offset_and_velocity() {
        let (g, v0, h0) = (9.81, 0.4, 0.02);
        let observations: Vec<Observation> = (0..12)
            .map(|i| {
                let t = i as f64 * 0.05;
                Observation::new(i, t, h0 + v0 * t + 0.5 * g * t * t)
            })
            .collect();

        let fit = fit_model(ModelKind::Kinematic, &observations, &FitOptions::default()).unwrap();
        assert!((fit.model.values[0] - g).abs() < 1e-6);
        assert!((fit.model.values[1] - v0).abs() < 1e-6);
        assert!((fit.model.values[2] - h0).abs() < 1e-6);
    }

    #[test]
    fn too_few_points_is_insufficient_data() {
        let err = fit_model(ModelKind::Kinematic, &obs(&[(0.1, 0.05), (0.2, 0.2)]), &FitOptions::default())
            .unwrap_err();
        assert_eq!(err.exit_code(), 3);
    }

    #[test]
    fn all_zero_times_are_not_identifiable() {
        let err = fit_model(ModelKind::FreeFall, &obs(&[(0.0, 0.0), (0.0, 0.01)]), &FitOptions::default())
            .unwrap_err();
        assert_eq!(err.exit_code(), 3);
    }

    #[test]
    fn single_point_fit_has_infinite_uncertainty() {
        let fit = fit_model(ModelKind::FreeFall, &obs(&[(0.5, 1.225)]), &FitOptions::default()).unwrap();
        assert!((fit.g() - 9.8).abs() < 1e-9);
        assert!(fit.g_std_error().is_infinite());
    }

    #[test]
    fn absolute_sigma_uses_unscaled_covariance() {
        let mut observations = obs(&[(0.2, 0.2), (0.4, 0.78), (0.6, 1.77)]);
        for o in &mut observations {
            o.sigma = Some(0.01);
        }
        let opts = FitOptions {
            absolute_sigma: true,
            ..FitOptions::default()
        };
        let fit = fit_model(ModelKind::FreeFall, &observations, &opts).unwrap();

        let sxx_w: f64 = observations
            .iter()
            .map(|o| (0.5 * o.time * o.time).powi(2) / (0.01 * 0.01))
            .sum();
        assert!((fit.g_std_error() - (1.0 / sxx_w).sqrt()).abs() < 1e-10);
    }
}
