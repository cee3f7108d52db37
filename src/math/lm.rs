//! Levenberg–Marquardt nonlinear least squares.
//!
//! We minimize
//!
//! ```text
//! χ²(p) = Σ r_i(p)²,   r_i(p) = √w_i · (y_i − f(t_i; p))
//! ```
//!
//! Each iteration solves the damped normal equations
//!
//! ```text
//! (JᵀJ + λ · diag(JᵀJ)) δ = Jᵀr
//! ```
//!
//! where `J` is the (weighted) Jacobian of the model. Successful steps shrink
//! `λ` (towards Gauss–Newton), rejected steps grow it (towards gradient descent).
//!
//! The covariance follows the `curve_fit` convention: `(JᵀJ)⁺ · χ²/(n − k)`,
//! unscaled when sigmas are absolute, and `+∞` everywhere when `n ≤ k`.

use nalgebra::{DMatrix, DVector};

use crate::error::AppError;
use crate::math::solve_normal_equations;

/// Smallest diagonal entry used for Marquardt scaling.
const DIAG_FLOOR: f64 = 1e-12;
const MIN_LAMBDA: f64 = 1e-12;

/// A least squares problem in the form consumed by [`LevenbergMarquardt`].
pub trait Problem {
    fn param_count(&self) -> usize;

    /// Weighted residuals `√w_i · (y_i − f(t_i; p))`.
    fn residuals(&self, params: &DVector<f64>) -> DVector<f64>;

    /// Weighted model Jacobian `√w_i · ∂f(t_i; p)/∂p_j`.
    fn jacobian(&self, params: &DVector<f64>) -> DMatrix<f64>;
}

/// Why the solver stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// Relative reduction of χ² fell below `ftol`.
    ResidualsConverged,
    /// Relative step size fell below `xtol`.
    ParametersConverged,
    /// Largest gradient component fell below `gtol`.
    GradientConverged,
    MaxIterations,
    /// `λ` grew past its cap without finding a downhill step.
    Stalled,
}

impl Termination {
    pub fn converged(self) -> bool {
        matches!(
            self,
            Termination::ResidualsConverged | Termination::ParametersConverged | Termination::GradientConverged
        )
    }

    pub fn describe(self) -> &'static str {
        match self {
            Termination::ResidualsConverged => "relative reduction in χ² below ftol",
            Termination::ParametersConverged => "relative step size below xtol",
            Termination::GradientConverged => "gradient below gtol",
            Termination::MaxIterations => "maximum number of iterations reached",
            Termination::Stalled => "damping parameter overflow (no downhill step)",
        }
    }
}

/// Solver output.
#[derive(Debug, Clone)]
pub struct LmReport {
    pub params: DVector<f64>,
    /// Weighted objective `Σ r_i²` at `params`.
    pub chi_square: f64,
    pub iterations: usize,
    pub termination: Termination,
}

/// Solver settings.
#[derive(Debug, Clone)]
pub struct LevenbergMarquardt {
    pub max_iterations: usize,
    pub ftol: f64,
    pub xtol: f64,
    pub gtol: f64,
    pub initial_lambda: f64,
    pub lambda_factor: f64,
    pub max_lambda: f64,
}

impl Default for LevenbergMarquardt {
    fn default() -> Self {
        Self {
            max_iterations: 200,
            ftol: 1.49012e-8,
            xtol: 1.49012e-8,
            gtol: 0.0,
            initial_lambda: 1e-3,
            lambda_factor: 10.0,
            max_lambda: 1e16,
        }
    }
}

impl LevenbergMarquardt {
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations.max(1);
        self
    }

    pub fn minimize<P: Problem>(&self, problem: &P, initial: DVector<f64>) -> Result<LmReport, AppError> {
        let k = problem.param_count();
        if initial.len() != k {
            return Err(AppError::numerical(format!(
                "Initial guess has {} parameters, model expects {k}.",
                initial.len()
            )));
        }

        let mut params = initial;
        let mut residuals = problem.residuals(&params);
        let mut chi_square = residuals.norm_squared();
        if !chi_square.is_finite() {
            return Err(AppError::numerical("Residuals are not finite at the initial guess."));
        }

        let mut lambda = self.initial_lambda;
        let mut iterations = 0usize;

        let termination = 'outer: loop {
            if iterations >= self.max_iterations {
                break Termination::MaxIterations;
            }
            iterations += 1;

            let jac = problem.jacobian(&params);
            let jt = jac.transpose();
            let jtj = &jt * &jac;
            let jtr = &jt * &residuals;

            if jtr.amax() <= self.gtol {
                break Termination::GradientConverged;
            }

            loop {
                let mut damped = jtj.clone();
                for i in 0..k {
                    damped[(i, i)] += lambda * jtj[(i, i)].max(DIAG_FLOOR);
                }

                let step = solve_normal_equations(&damped, &jtr);
                if let Some(delta) = step {
                    let candidate = &params + &delta;
                    let candidate_residuals = problem.residuals(&candidate);
                    let candidate_chi = candidate_residuals.norm_squared();

                    if candidate_chi.is_finite() && candidate_chi <= chi_square {
                        let reduction = chi_square - candidate_chi;
                        let small_step = delta.norm() <= self.xtol * (candidate.norm() + self.xtol);
                        let previous = chi_square;

                        params = candidate;
                        residuals = candidate_residuals;
                        chi_square = candidate_chi;
                        lambda = (lambda / self.lambda_factor).max(MIN_LAMBDA);

                        tracing::debug!(iteration = iterations, chi_square, lambda, "accepted step");

                        if reduction <= self.ftol * previous {
                            break 'outer Termination::ResidualsConverged;
                        }
                        if small_step {
                            break 'outer Termination::ParametersConverged;
                        }
                        break;
                    }
                }

                lambda *= self.lambda_factor;
                tracing::debug!(iteration = iterations, lambda, "rejected step");
                if lambda > self.max_lambda {
                    break 'outer Termination::Stalled;
                }
            }
        };

        if params.iter().any(|v| !v.is_finite()) {
            return Err(AppError::numerical("Solver produced non-finite parameters."));
        }

        Ok(LmReport {
            params,
            chi_square,
            iterations,
            termination,
        })
    }
}

/// Parameter covariance from the weighted Jacobian at the solution.
///
/// - `absolute_sigma = false`: scale `(JᵀJ)⁺` by the reduced χ² (`χ²/(n − k)`).
/// - `absolute_sigma = true`: use `(JᵀJ)⁺` as is.
/// - `n ≤ k` without absolute sigmas: the variance is undefined, every entry is `+∞`.
pub fn covariance(jacobian: &DMatrix<f64>, chi_square: f64, absolute_sigma: bool) -> Result<DMatrix<f64>, AppError> {
    let n = jacobian.nrows();
    let k = jacobian.ncols();

    if !absolute_sigma && n <= k {
        return Ok(DMatrix::from_element(k, k, f64::INFINITY));
    }

    let jtj = jacobian.transpose() * jacobian;
    let svd = jtj.svd(true, true);
    let eps = f64::EPSILON * (k.max(n) as f64) * svd.singular_values.max();

    // A rank-deficient JᵀJ leaves some parameter directions unconstrained.
    if svd.rank(eps) < k {
        return Ok(DMatrix::from_element(k, k, f64::INFINITY));
    }

    let inv = svd
        .pseudo_inverse(eps)
        .map_err(|e| AppError::numerical(format!("Covariance estimation failed: {e}")))?;

    if absolute_sigma {
        Ok(inv)
    } else {
        Ok(inv * (chi_square / (n - k) as f64))
    }
}

/// Square roots of the covariance diagonal.
pub fn standard_errors(cov: &DMatrix<f64>) -> Vec<f64> {
    (0..cov.nrows()).map(|i| cov[(i, i)].max(0.0).sqrt()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    /// y = a · exp(b · x), a genuinely nonlinear problem.
    struct ExpDecay {
        x: Vec<f64>,
        y: Vec<f64>,
    }

    impl Problem for ExpDecay {
        fn param_count(&self) -> usize {
            2
        }

        fn residuals(&self, p: &DVector<f64>) -> DVector<f64> {
            DVector::from_iterator(
                self.x.len(),
                self.x.iter().zip(&self.y).map(|(&x, &y)| y - p[0] * (p[1] * x).exp()),
            )
        }

        fn jacobian(&self, p: &DVector<f64>) -> DMatrix<f64> {
            let mut j = DMatrix::zeros(self.x.len(), 2);
            for (i, &x) in self.x.iter().enumerate() {
                let e = (p[1] * x).exp();
                j[(i, 0)] = e;
                j[(i, 1)] = p[0] * x * e;
            }
            j
        }
    }

    #[test]
    fn recovers_exponential_parameters() {
        let x: Vec<f64> = (0..10).map(|i| i as f64 * 0.3).collect();
        let y: Vec<f64> = x.iter().map(|&x| 2.5 * (-0.8 * x).exp()).collect();
        let problem = ExpDecay { x, y };

        let report = LevenbergMarquardt::default()
            .minimize(&problem, DVector::from_row_slice(&[1.0, 0.0]))
            .unwrap();

        assert!(report.termination.converged(), "{:?}", report.termination);
        assert!((report.params[0] - 2.5).abs() < 1e-6);
        assert!((report.params[1] + 0.8).abs() < 1e-6);
        assert!(report.chi_square < 1e-12);
    }

    #[test]
    fn rejects_wrong_initial_length() {
        let problem = ExpDecay { x: vec![0.0, 1.0], y: vec![1.0, 2.0] };
        let err = LevenbergMarquardt::default()
            .minimize(&problem, DVector::from_row_slice(&[1.0]))
            .unwrap_err();
        assert_eq!(err.exit_code(), 4);
    }

    #[test]
    fn covariance_matches_linear_regression_formula() {
        // Single-parameter model y = c · x: var(c) = s² / Σx², s² = χ²/(n−1).
        let x = [1.0, 2.0, 3.0, 4.0];
        let jac = DMatrix::from_column_slice(4, 1, &x);
        let chi = 0.3;
        let cov = covariance(&jac, chi, false).unwrap();
        let sxx: f64 = x.iter().map(|v| v * v).sum();
        let expected = (chi / 3.0) / sxx;
        assert!((cov[(0, 0)] - expected).abs() < 1e-12);

        let abs_cov = covariance(&jac, chi, true).unwrap();
        assert!((abs_cov[(0, 0)] - 1.0 / sxx).abs() < 1e-12);
    }

    #[test]
    fn covariance_is_infinite_without_degrees_of_freedom() {
        let jac = DMatrix::from_column_slice(1, 1, &[0.5]);
        let cov = covariance(&jac, 0.0, false).unwrap();
        assert!(cov[(0, 0)].is_infinite());
        assert!(standard_errors(&cov)[0].is_infinite());
    }
}
