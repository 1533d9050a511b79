/////////////////////////////////////////////////////////////////////////////////////////////
//
// Implements Huber-weighted iteratively reweighted least squares for outlier-resistant fits.
//
// Created on: 19 Oct 2026     Author: Daniel Owen
//
// Copyright (c) 2026, Maptek Pty Ltd. All rights reserved. Licensed under the MIT License.
//
/////////////////////////////////////////////////////////////////////////////////////////////

//! Robust fitting by iteratively reweighted least squares (IRLS).
//!
//! Each pass estimates the residual scale as `median(|r|) / 0.6745`, assigns
//! Huber weights
//!
//! ```text
//! w(r) = 1            if |r| / s <= k
//!      = k·s / |r|    otherwise
//! ```
//!
//! and refits with those weights multiplied into the sample weights.

use crate::{
    config::RobustParams,
    error::TrendResult,
    linalg::{FitResult, LeastSquaresSolver},
    progress::{self, ProgressMsg, ProgressSink},
};
use faer::Mat;
use log::{debug, warn};
use std::sync::Arc;
use trend_surface_utils::{constants::MAD_CONSISTENCY, l2_norm, median};

/// Huber weight of a single residual for scale `s` and tuning constant `k`.
#[inline(always)]
pub fn huber_weight(residual: f64, scale: f64, k: f64) -> f64 {
    let u = residual.abs() / scale;
    if u <= k { 1.0 } else { k / u }
}

/// MAD based residual scale, `median(|r|) / 0.6745`.
pub fn robust_scale(residuals: &[f64]) -> f64 {
    let abs: Vec<f64> = residuals.iter().map(|r| r.abs()).collect();
    median(&abs).unwrap_or(0.0) / MAD_CONSISTENCY
}

/// Wraps a [`LeastSquaresSolver`] in a Huber IRLS loop.
#[derive(Debug, Clone, Copy)]
pub struct RobustFitter {
    params: RobustParams,
    solver: LeastSquaresSolver,
}

impl RobustFitter {
    /// # Errors
    /// [`crate::TrendError::InvalidParameter`] for a zero iteration cap or a
    /// non-positive tuning constant or tolerance.
    pub fn new(params: RobustParams, solver: LeastSquaresSolver) -> TrendResult<Self> {
        params.validate()?;
        Ok(Self { params, solver })
    }

    pub fn params(&self) -> &RobustParams {
        &self.params
    }

    /// Runs IRLS on the system `A β ≈ z`.
    ///
    /// The loop stops when the relative L2 change of the coefficient vector
    /// drops below `tolerance`, or when the residual scale is at most
    /// `sqrt(ε)·max|z|`. In the latter case all weights reset to 1 and the
    /// ordinary fit is returned. Reaching `max_iterations` first is not an
    /// error: the last iterate is returned with `converged == false`.
    ///
    /// # Errors
    /// Any error of [`LeastSquaresSolver::solve`] on the initial fit or a refit.
    #[allow(non_snake_case)]
    pub fn fit(
        &self,
        A: &Mat<f64>,
        z: &[f64],
        sample_weights: &[f64],
        progress_callback: Option<&Arc<dyn ProgressSink>>,
    ) -> TrendResult<FitResult> {
        let ordinary = self.solver.solve(A, z, sample_weights)?;

        let k = self.params.tuning_constant;
        let scale_floor = f64::EPSILON.sqrt() * z.iter().fold(0.0, |m: f64, v| m.max(v.abs()));
        let mut current = ordinary.clone();
        let mut robust_weights = vec![1.0; z.len()];
        let mut iterations = 0;
        let mut converged = false;

        while iterations < self.params.max_iterations {
            let scale = robust_scale(&current.residuals);

            // Residuals at round-off level carry no outlier information.
            if scale <= scale_floor {
                debug!(
                    "robust scale {:.3e} is negligible after {} iterations; keeping ordinary fit",
                    scale, iterations
                );
                current = ordinary;
                robust_weights.fill(1.0);
                converged = true;
                break;
            }

            robust_weights = current
                .residuals
                .iter()
                .map(|r| huber_weight(*r, scale, k))
                .collect();

            let combined: Vec<f64> = robust_weights
                .iter()
                .zip(sample_weights)
                .map(|(r, w)| r * w)
                .collect();

            let next = self.solver.solve(A, z, &combined)?;
            iterations += 1;

            let delta: Vec<f64> = next
                .coefficients
                .iter()
                .zip(&current.coefficients)
                .map(|(a, b)| a - b)
                .collect();
            let previous_norm = l2_norm(&current.coefficients);
            let relative_change = match previous_norm > 0.0 {
                true => l2_norm(&delta) / previous_norm,
                false => l2_norm(&delta),
            };

            debug!(
                "IRLS iteration {}: scale {:.6e}, relative change {:.3e}",
                iterations, scale, relative_change
            );
            progress::report(progress_callback, || ProgressMsg::RobustIteration {
                iter: iterations,
                scale,
                relative_change,
            });

            current = next;

            if relative_change < self.params.tolerance {
                converged = true;
                break;
            }
        }

        if !converged {
            let message = format!(
                "robust fit did not converge within {} iterations; returning last iterate",
                self.params.max_iterations
            );
            warn!("{}", message);
            progress::report(progress_callback, || ProgressMsg::Message { message });
        }

        current.sample_weights = sample_weights.to_vec();
        current.weights_used = robust_weights;
        current.converged = converged;
        current.iterations = iterations;

        Ok(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        polynomials::DesignMatrix,
        progress::tests::RecordingSink,
        samples::{Sample, SampleSet},
    };
    use equator::assert;

    fn grid_samples(f: impl Fn(usize, usize) -> f64) -> SampleSet {
        let mut samples = Vec::new();
        for i in 0..5 {
            for j in 0..5 {
                samples.push(Sample::new(i as f64, j as f64, f(i, j)));
            }
        }
        SampleSet::new(samples).unwrap()
    }

    fn plane(i: usize, j: usize) -> f64 {
        2.0 + 0.5 * i as f64 - 0.3 * j as f64
    }

    fn fitter(max_iterations: usize) -> RobustFitter {
        RobustFitter::new(
            RobustParams {
                max_iterations,
                ..Default::default()
            },
            LeastSquaresSolver::default(),
        )
        .unwrap()
    }

    #[test]
    fn huber_weights() {
        assert!(huber_weight(1.0, 1.0, 1.345) == 1.0);
        assert!(huber_weight(-1.345, 1.0, 1.345) == 1.0);
        assert!((huber_weight(2.69, 1.0, 1.345) - 0.5).abs() < 1e-15);
        assert!((huber_weight(-10.0, 2.0, 1.0) - 0.2).abs() < 1e-15);
    }

    #[test]
    fn balanced_noise_matches_ordinary_fit() {
        // Checkerboard noise leaves every ordinary residual with nearly the
        // same magnitude, well inside the Huber threshold.
        let samples = grid_samples(|i, j| {
            let sign = if (i + j) % 2 == 0 { 1.0 } else { -1.0 };
            plane(i, j) + 0.1 * sign
        });
        let design = DesignMatrix::build(&samples, 1).unwrap();
        let z = samples.values();
        let w = samples.weights();

        let ordinary = LeastSquaresSolver::default()
            .solve(design.matrix(), &z, &w)
            .unwrap();
        let robust = fitter(20).fit(design.matrix(), &z, &w, None).unwrap();

        assert!(robust.converged);
        assert!(robust.weights_used.iter().all(|w| *w == 1.0));
        for (a, b) in robust.coefficients.iter().zip(&ordinary.coefficients) {
            assert!((a - b).abs() < 1e-10);
        }
    }

    #[test]
    fn exact_data_matches_ordinary_fit() {
        let samples = grid_samples(plane);
        let design = DesignMatrix::build(&samples, 1).unwrap();
        let z = samples.values();
        let w = samples.weights();

        let ordinary = LeastSquaresSolver::default()
            .solve(design.matrix(), &z, &w)
            .unwrap();
        let robust = fitter(20).fit(design.matrix(), &z, &w, None).unwrap();

        assert!(robust.coefficients == ordinary.coefficients);
        assert!(robust.iterations == 0);
        assert!(robust.converged);
        assert!(robust.weights_used.iter().all(|w| *w == 1.0));
    }

    #[test]
    fn round_off_residuals_stop_before_reweighting() {
        let mut samples = Vec::new();
        for i in 0..7 {
            for j in 0..7 {
                let (x, y) = (i as f64, j as f64);
                samples.push(Sample::new(x, y, 3.0 + 2.0 * x - y));
            }
        }
        let samples = SampleSet::new(samples).unwrap();
        let design = DesignMatrix::build(&samples, 1).unwrap();

        let sink = Arc::new(RecordingSink::default());
        let dyn_sink: Arc<dyn ProgressSink> = sink.clone();

        let fit = fitter(20)
            .fit(design.matrix(), &samples.values(), &samples.weights(), Some(&dyn_sink))
            .unwrap();

        assert!(fit.iterations == 0);
        assert!(fit.converged);
        assert!(fit.weights_used.iter().all(|w| *w == 1.0));
        assert!(sink.messages.lock().unwrap().is_empty());
    }

    #[test]
    fn scale_is_zero_when_most_residuals_vanish() {
        assert!(robust_scale(&[0.0, 0.0, 0.0, 1.0, -2.0]) == 0.0);
        assert!(robust_scale(&[0.0, 0.0, 0.0, 5.0]) == 0.0);
        assert!((robust_scale(&[1.0, -1.0, 1.0]) - 1.0 / MAD_CONSISTENCY).abs() < 1e-15);
        assert!(robust_scale(&[]) == 0.0);
    }

    #[test]
    fn outlier_is_down_weighted() {
        let samples = grid_samples(|i, j| plane(i, j) + if (i, j) == (2, 2) { 100.0 } else { 0.0 });
        let design = DesignMatrix::build(&samples, 1).unwrap();
        let z = samples.values();
        let w = samples.weights();
        let truth = [2.0, 0.5, -0.3];

        let ordinary = LeastSquaresSolver::default()
            .solve(design.matrix(), &z, &w)
            .unwrap();
        let robust = fitter(20).fit(design.matrix(), &z, &w, None).unwrap();

        let error = |b: &[f64]| {
            l2_norm(&b.iter().zip(&truth).map(|(b, t)| b - t).collect::<Vec<_>>())
        };

        assert!(robust.converged);
        assert!(error(&robust.coefficients) < error(&ordinary.coefficients));
        assert!(robust.weights_used[12] < 0.1);
        assert!(robust.weights_used[0] == 1.0);
    }

    #[test]
    fn iteration_cap_is_reported_not_raised() {
        let samples = grid_samples(|i, j| plane(i, j) + if (i, j) == (2, 2) { 100.0 } else { 0.0 });
        let design = DesignMatrix::build(&samples, 1).unwrap();

        let sink = Arc::new(RecordingSink::default());
        let dyn_sink: Arc<dyn ProgressSink> = sink.clone();

        let fit = fitter(1)
            .fit(design.matrix(), &samples.values(), &samples.weights(), Some(&dyn_sink))
            .unwrap();

        assert!(!fit.converged);
        assert!(fit.iterations == 1);

        let messages = sink.messages.lock().unwrap();
        assert!(matches!(messages[0], ProgressMsg::RobustIteration { iter: 1, .. }));
        assert!(matches!(messages[1], ProgressMsg::Message { .. }));
    }

    #[test]
    fn sample_weights_are_kept_separate() {
        let samples = grid_samples(|i, j| plane(i, j) + if (i, j) == (4, 0) { 50.0 } else { 0.0 });
        let design = DesignMatrix::build(&samples, 1).unwrap();
        let weights: Vec<f64> = (0..25).map(|i| 1.0 + (i % 3) as f64).collect();

        let fit = fitter(20)
            .fit(design.matrix(), &samples.values(), &weights, None)
            .unwrap();

        assert!(fit.sample_weights == weights);
        for ((e, s), r) in fit
            .effective_weights()
            .iter()
            .zip(&fit.sample_weights)
            .zip(&fit.weights_used)
        {
            assert!(*e == s * r);
        }
    }
}
