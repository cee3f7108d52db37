//! Model evaluation for the free-fall family.
//!
//! The fitter relies on two primitive operations:
//! - predict `h(t)` given parameters (for residuals/plots)
//! - fill the Jacobian row `∂h/∂p` for a given time (for the solver)
//!
//! Parameter layouts (see `ModelKind::param_names`):
//! - free-fall: `[g]`
//! - offset:    `[g, h0]`
//! - kinematic: `[g, v0, h0]`

use crate::domain::ModelKind;

/// Predict `h(t)` for the given model kind.
pub fn predict(model: ModelKind, t: f64, params: &[f64]) -> f64 {
    let half_t2 = 0.5 * t * t;
    match model {
        ModelKind::FreeFall => params[0] * half_t2,
        ModelKind::Offset => params[1] + params[0] * half_t2,
        ModelKind::Kinematic => params[2] + params[1] * t + params[0] * half_t2,
    }
}

/// Fill the Jacobian row `∂h(t)/∂p_j`.
///
/// Every model is linear in its parameters, so the row does not depend on the
/// current parameter values.
///
/// # Panics
/// Panics if `out` is shorter than `model.param_count()`.
pub fn fill_jacobian_row(model: ModelKind, t: f64, out: &mut [f64]) {
    let half_t2 = 0.5 * t * t;
    match model {
        ModelKind::FreeFall => {
            out[0] = half_t2;
        }
        ModelKind::Offset => {
            out[0] = half_t2;
            out[1] = 1.0;
        }
        ModelKind::Kinematic => {
            out[0] = half_t2;
            out[1] = t;
            out[2] = 1.0;
        }
    }
}

/// Sample `h(t)` on `n` evenly spaced times in `[t_start, t_end]`.
pub fn sample_curve(model: ModelKind, params: &[f64], t_start: f64, t_end: f64, n: usize) -> Vec<(f64, f64)> {
    let n = n.max(2);
    (0..n)
        .map(|i| {
            let u = i as f64 / (n as f64 - 1.0);
            let t = t_start + u * (t_end - t_start);
            (t, predict(model, t, params))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn predict_free_fall_matches_textbook_values() {
        let h = predict(ModelKind::FreeFall, 0.5, &[9.8]);
        assert!((h - 1.225).abs() < 1e-12);
    }

    #[test]
    fn jacobian_matches_finite_differences() {
        let params = [9.7, -0.3, 0.05];
        let t = 0.42;
        let mut row = [0.0; 3];
        fill_jacobian_row(ModelKind::Kinematic, t, &mut row);

        let h = 1e-6;
        for j in 0..3 {
            let mut p_hi = params;
            p_hi[j] += h;
            let mut p_lo = params;
            p_lo[j] -= h;
            let fd = (predict(ModelKind::Kinematic, t, &p_hi) - predict(ModelKind::Kinematic, t, &p_lo)) / (2.0 * h);
            assert!((fd - row[j]).abs() < 1e-8, "param {j}: fd={fd} analytic={}", row[j]);
        }
    }

    #[test]
    fn sample_curve_spans_interval() {
        let pts = sample_curve(ModelKind::FreeFall, &[9.8], 0.0, 0.65, 200);
        assert_eq!(pts.len(), 200);
        assert_eq!(pts[0], (0.0, 0.0));
        assert!((pts[199].0 - 0.65).abs() < 1e-12);
    }
}
