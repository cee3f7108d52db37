//! Demo dataset and synthetic free-fall measurements.
//!
//! The demo dataset is the classroom table of a ball dropped from rest and
//! photographed every 50 ms: `h = ½ · 9.8 · t²` for `t = 0.00 … 0.65 s`,
//! rounded to 0.01 mm.
//!
//! `simulate` generalizes it: arbitrary `g`, release offset/velocity, sampling
//! step and Gaussian height noise from a seeded RNG (runs are reproducible).

use std::fs::File;
use std::path::Path;

use rand::prelude::*;
use rand::rngs::StdRng;
use rand_distr::Normal;

use crate::domain::{Observation, STANDARD_G};
use crate::error::AppError;

/// Upper bound on generated samples.
pub const MAX_POINTS: usize = 1_000_000;

/// Past this, `10^decimals` leaves the range where rounding means anything for f64.
pub const MAX_DECIMALS: u32 = 15;

/// Settings for synthetic data generation.
#[derive(Debug, Clone)]
pub struct SimulateConfig {
    /// True gravitational acceleration (m/s²).
    pub g: f64,
    /// Last sample time (s), inclusive.
    pub t_max: f64,
    /// Sampling interval (s).
    pub step: f64,
    /// Standard deviation of additive height noise (m). Zero gives exact data.
    pub noise_sd: f64,
    /// Height at `t = 0` (m).
    pub h0: f64,
    /// Downward release velocity (m/s).
    pub v0: f64,
    /// Decimal places kept in the generated heights.
    pub decimals: u32,
    pub seed: u64,
}

impl Default for SimulateConfig {
    fn default() -> Self {
        Self {
            g: STANDARD_G,
            t_max: 0.65,
            step: 0.05,
            noise_sd: 0.0,
            h0: 0.0,
            v0: 0.0,
            decimals: 5,
            seed: 42,
        }
    }
}

/// The 14-point classroom dataset.
pub fn demo_observations() -> Vec<Observation> {
    // Exact data with the default config cannot fail.
    simulate(&SimulateConfig::default()).unwrap_or_default()
}

/// Generate a synthetic dataset.
pub fn simulate(config: &SimulateConfig) -> Result<Vec<Observation>, AppError> {
    if !(config.step.is_finite() && config.step > 0.0) {
        return Err(AppError::input("Sampling step must be > 0."));
    }
    if !(config.t_max.is_finite() && config.t_max >= 0.0) {
        return Err(AppError::input("Maximum time must be finite and >= 0."));
    }
    if !(config.g.is_finite() && config.h0.is_finite() && config.v0.is_finite()) {
        return Err(AppError::input("Simulation parameters must be finite."));
    }
    if !(config.noise_sd.is_finite() && config.noise_sd >= 0.0) {
        return Err(AppError::input("Noise standard deviation must be finite and >= 0."));
    }

    let mut rng = StdRng::seed_from_u64(config.seed);
    let normal = Normal::new(0.0, config.noise_sd)
        .map_err(|e| AppError::input(format!("Noise distribution error: {e}")))?;

    if config.decimals > MAX_DECIMALS {
        return Err(AppError::input(format!(
            "At most {MAX_DECIMALS} decimal places are supported, got {}.",
            config.decimals
        )));
    }

    // Small slack so 0.65 / 0.05 lands on 13 rather than 12.999…
    let steps = (config.t_max / config.step + 1e-9).floor();
    if steps >= MAX_POINTS as f64 {
        return Err(AppError::input(format!(
            "t_max / step gives more than {MAX_POINTS} samples; use a larger step."
        )));
    }
    let n = steps as usize + 1;
    let scale = 10f64.powi(config.decimals as i32);

    let observations = (0..n)
        .map(|i| {
            let t = round_to(i as f64 * config.step, 1e9);
            let exact = config.h0 + config.v0 * t + 0.5 * config.g * t * t;
            let noise = if config.noise_sd > 0.0 { normal.sample(&mut rng) } else { 0.0 };
            Observation::new(i, t, round_to(exact + noise, scale))
        })
        .collect();

    Ok(observations)
}

/// Write observations as a `time(s),height(m)` CSV (plus `sigma(m)` when known).
pub fn write_observations_csv(path: &Path, observations: &[Observation]) -> Result<(), AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::input(format!("Failed to create CSV '{}': {e}", path.display())))?;
    let mut writer = csv::Writer::from_writer(file);

    let with_sigma = observations.iter().any(|o| o.sigma.is_some());
    let header: &[&str] = if with_sigma {
        &["time(s)", "height(m)", "sigma(m)"]
    } else {
        &["time(s)", "height(m)"]
    };
    writer
        .write_record(header)
        .map_err(|e| AppError::input(format!("Failed to write CSV header: {e}")))?;

    for o in observations {
        let mut record = vec![format!("{:.3}", o.time), format!("{}", o.height)];
        if with_sigma {
            record.push(o.sigma.map(|s| s.to_string()).unwrap_or_default());
        }
        writer
            .write_record(&record)
            .map_err(|e| AppError::input(format!("Failed to write CSV row: {e}")))?;
    }

    writer
        .flush()
        .map_err(|e| AppError::input(format!("Failed to flush CSV '{}': {e}", path.display())))?;
    Ok(())
}

fn round_to(v: f64, scale: f64) -> f64 {
    (v * scale).round() / scale
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn demo_matches_classroom_table() {
        let data = demo_observations();
        assert_eq!(data.len(), 14);
        assert_eq!(data[0].time, 0.0);
        assert_eq!(data[0].height, 0.0);
        assert_eq!(data[1].height, 0.01225);
        assert_eq!(data[10].height, 1.225);
        assert!((data[13].time - 0.65).abs() < 1e-12);
        assert_eq!(data[13].height, 2.07025);
    }

    #[test]
    fn simulate_is_reproducible_per_seed() {
        let config = SimulateConfig {
            noise_sd: 0.01,
            ..SimulateConfig::default()
        };
        let a = simulate(&config).unwrap();
        let b = simulate(&config).unwrap();
        assert_eq!(a, b);

        let c = simulate(&SimulateConfig { seed: 43, ..config }).unwrap();
        assert_ne!(a, c);
    }

    #[test]
    fn simulate_rejects_bad_step() {
        let err = simulate(&SimulateConfig {
            step: 0.0,
            ..SimulateConfig::default()
        })
        .unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn simulate_caps_sample_count() {
        for step in [1e-300, 1e-12] {
            let err = simulate(&SimulateConfig {
                step,
                ..SimulateConfig::default()
            })
            .unwrap_err();
            assert_eq!(err.exit_code(), 2);
        }

        // 0.65 / 1e-6 stays under the cap.
        let data = simulate(&SimulateConfig {
            step: 1e-6,
            ..SimulateConfig::default()
        })
        .unwrap();
        assert!(data.len().abs_diff(650_001) <= 1);
    }

    #[test]
    fn simulate_rejects_too_many_decimals() {
        let err = simulate(&SimulateConfig {
            decimals: 400,
            ..SimulateConfig::default()
        })
        .unwrap_err();
        assert_eq!(err.exit_code(), 2);

        let data = simulate(&SimulateConfig {
            decimals: MAX_DECIMALS,
            ..SimulateConfig::default()
        })
        .unwrap();
        assert!(data.iter().all(|o| o.height.is_finite()));
    }

    #[test]
    fn writes_csv_with_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("drop.csv");
        write_observations_csv(&path, &demo_observations()).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("time(s),height(m)\n0.000,0\n"));
        assert_eq!(text.lines().count(), 15);
    }
}
