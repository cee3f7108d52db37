//! Reporting utilities: residuals and formatted terminal output.

pub mod format;

pub use format::*;

use crate::domain::{FitResult, Observation, PointResidual};
use crate::error::AppError;
use crate::models::predict;

/// Compute fitted values and residuals for each observation.
pub fn compute_residuals(observations: &[Observation], fit: &FitResult) -> Result<Vec<PointResidual>, AppError> {
    let mut out = Vec::with_capacity(observations.len());
    for o in observations {
        let fitted = predict(fit.model.kind, o.time, &fit.model.values);
        if !fitted.is_finite() {
            return Err(AppError::numerical("Non-finite model prediction during residual computation."));
        }
        out.push(PointResidual {
            observation: o.clone(),
            fitted,
            residual: o.height - fitted,
        });
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{FitQuality, ModelKind, ModelParams};

    #[test]
    fn compute_residuals_basic() {
        let observations = vec![Observation::new(0, 1.0, 5.0), Observation::new(1, 2.0, 19.0)];

        let fit = FitResult {
            model: ModelParams {
                kind: ModelKind::FreeFall,
                values: vec![10.0],
                std_errors: vec![0.0],
                covariance: vec![0.0],
            },
            quality: FitQuality {
                sse: 1.0,
                chi_square: 1.0,
                rmse: 0.0,
                r_squared: None,
                bic: 0.0,
                n: 2,
                dof: 1,
                iterations: 1,
            },
        };

        let residuals = compute_residuals(&observations, &fit).unwrap();
        assert_eq!(residuals.len(), 2);
        assert!((residuals[0].fitted - 5.0).abs() < 1e-12);
        assert!(residuals[0].residual.abs() < 1e-12);
        assert!((residuals[1].residual + 1.0).abs() < 1e-12);
    }
}
