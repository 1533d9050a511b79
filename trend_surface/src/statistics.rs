/////////////////////////////////////////////////////////////////////////////////////////////
//
// Computes goodness of fit, information criteria and residual normality for a fitted trend.
//
// Created on: 19 Oct 2026     Author: Daniel Owen
//
// Copyright (c) 2026, Maptek Pty Ltd. All rights reserved. Licensed under the MIT License.
//
/////////////////////////////////////////////////////////////////////////////////////////////

//! Fit quality metrics.
//!
//! `R²`, `AIC` and `BIC` use the sample weights: the weighted mean of `z`,
//! `TSS = Σ wᵢ(zᵢ - z̄_w)²` and `RSS = Σ wᵢrᵢ²`. With unit weights these are
//! the usual unweighted quantities. `RMSE` and `MAE` are always in data units
//! (unweighted), so they compare directly with cross-validation errors.

use crate::{
    error::{TrendError, TrendResult},
    linalg::FitResult,
};
use serde::{Deserialize, Serialize};
use statrs::distribution::{ChiSquared, ContinuousCDF};
use std::fmt;
use trend_surface_utils::{constants::MIN_NORMALITY_SAMPLES, mean, std_dev, weighted_mean};

/// Summary statistics of a fitted trend surface.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Statistics {
    pub r2: f64,
    pub adjusted_r2: f64,
    pub rmse: f64,
    pub mae: f64,

    /// `N·ln(RSS/N) + 2P`; `NaN` for a perfect fit.
    pub aic: f64,

    /// `N·ln(RSS/N) + P·ln(N)`; `NaN` for a perfect fit.
    pub bic: f64,

    /// D'Agostino–Pearson omnibus p-value of the residuals. `None` with fewer
    /// than 8 residuals or zero residual variance.
    pub residual_normality_p: Option<f64>,

    pub residual_mean: f64,
    pub residual_std: f64,
    pub n_observations: usize,
    pub n_parameters: usize,

    /// `true` when `RSS == 0`, in which case `aic` and `bic` are undefined.
    pub perfect_fit: bool,
}

/// Coefficient of determination `1 - RSS/TSS` with optional weights.
///
/// A constant response (`TSS == 0`) gives `1.0` if it is reproduced exactly
/// and `0.0` otherwise.
pub fn r_squared(observed: &[f64], residuals: &[f64], weights: &[f64]) -> f64 {
    let z_bar = weighted_mean(observed, weights);
    let tss: f64 = observed
        .iter()
        .zip(weights)
        .map(|(z, w)| w * (z - z_bar).powi(2))
        .sum();
    let rss: f64 = residuals
        .iter()
        .zip(weights)
        .map(|(r, w)| w * r * r)
        .sum();

    match tss > 0.0 {
        true => 1.0 - rss / tss,
        false if rss == 0.0 => 1.0,
        false => 0.0,
    }
}

/// Computes [`Statistics`] for a fit.
///
/// # Errors
/// [`TrendError::DegreesOfFreedomExhausted`] if `N <= P + 1`, where the
/// adjusted `R²` is undefined.
pub fn summarize(fit: &FitResult) -> TrendResult<Statistics> {
    let n = fit.num_observations();
    let p = fit.num_terms();

    if n <= p + 1 {
        return Err(TrendError::DegreesOfFreedomExhausted {
            observations: n,
            parameters: p,
        });
    }

    let nf = n as f64;
    let pf = p as f64;
    let weights = &fit.sample_weights;
    let residuals = &fit.residuals;

    let r2 = r_squared(&fit.observed, residuals, weights);
    let adjusted_r2 = 1.0 - (1.0 - r2) * (nf - 1.0) / (nf - pf - 1.0);

    let rss_raw: f64 = residuals.iter().map(|r| r * r).sum();
    let rmse = (rss_raw / nf).sqrt();
    let mae = residuals.iter().map(|r| r.abs()).sum::<f64>() / nf;

    let rss: f64 = residuals
        .iter()
        .zip(weights)
        .map(|(r, w)| w * r * r)
        .sum();
    let perfect_fit = rss == 0.0;
    let (aic, bic) = match perfect_fit {
        true => (f64::NAN, f64::NAN),
        false => {
            let log_lik = nf * (rss / nf).ln();
            (log_lik + 2.0 * pf, log_lik + pf * nf.ln())
        }
    };

    Ok(Statistics {
        r2,
        adjusted_r2,
        rmse,
        mae,
        aic,
        bic,
        residual_normality_p: normality_test(residuals),
        residual_mean: mean(residuals),
        residual_std: std_dev(residuals),
        n_observations: n,
        n_parameters: p,
        perfect_fit,
    })
}

/// D'Agostino–Pearson K² omnibus test for normality.
///
/// Combines the skewness and kurtosis z-scores into `K² = Z_s² + Z_k²`, which
/// is chi-square distributed with 2 degrees of freedom under normality.
/// Returns the upper tail probability.
pub fn normality_test(values: &[f64]) -> Option<f64> {
    if values.len() < MIN_NORMALITY_SAMPLES {
        return None;
    }

    let n = values.len() as f64;
    let m = mean(values);
    let moment = |k: i32| values.iter().map(|v| (v - m).powi(k)).sum::<f64>() / n;

    let m2 = moment(2);
    if !(m2 > 0.0) {
        return None;
    }

    let skewness = moment(3) / m2.powf(1.5);
    let kurtosis = moment(4) / (m2 * m2);

    let k2 = skewness_z(skewness, n).powi(2) + kurtosis_z(kurtosis, n).powi(2);
    if !k2.is_finite() {
        return None;
    }

    ChiSquared::new(2.0).ok().map(|chi2| chi2.sf(k2))
}

/// D'Agostino's transformation of sample skewness to an approximate z-score.
fn skewness_z(b2: f64, n: f64) -> f64 {
    let y = b2 * ((n + 1.0) * (n + 3.0) / (6.0 * (n - 2.0))).sqrt();
    let beta2 = 3.0 * (n * n + 27.0 * n - 70.0) * (n + 1.0) * (n + 3.0)
        / ((n - 2.0) * (n + 5.0) * (n + 7.0) * (n + 9.0));
    let w2 = -1.0 + (2.0 * (beta2 - 1.0)).sqrt();
    let delta = 1.0 / (0.5 * w2.ln()).sqrt();
    let alpha = (2.0 / (w2 - 1.0)).sqrt();
    let y = if y == 0.0 { 1.0 } else { y };

    delta * (y / alpha + ((y / alpha).powi(2) + 1.0).sqrt()).ln()
}

/// Anscombe–Glynn transformation of sample kurtosis to an approximate z-score.
fn kurtosis_z(b2: f64, n: f64) -> f64 {
    let e = 3.0 * (n - 1.0) / (n + 1.0);
    let var_b2 =
        24.0 * n * (n - 2.0) * (n - 3.0) / ((n + 1.0).powi(2) * (n + 3.0) * (n + 5.0));
    let x = (b2 - e) / var_b2.sqrt();

    let sqrt_beta1 = 6.0 * (n * n - 5.0 * n + 2.0) / ((n + 7.0) * (n + 9.0))
        * (6.0 * (n + 3.0) * (n + 5.0) / (n * (n - 2.0) * (n - 3.0))).sqrt();
    let a = 6.0 + 8.0 / sqrt_beta1 * (2.0 / sqrt_beta1 + (1.0 + 4.0 / sqrt_beta1.powi(2)).sqrt());

    let term1 = 1.0 - 2.0 / (9.0 * a);
    let denom = 1.0 + x * (2.0 / (a - 4.0)).sqrt();
    if denom == 0.0 {
        return f64::NAN;
    }
    let term2 = denom.signum() * ((1.0 - 2.0 / a) / denom.abs()).cbrt();

    (term1 - term2) / (2.0 / (9.0 * a)).sqrt()
}

impl fmt::Display for Statistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Goodness of Fit:")?;
        writeln!(f, "  R²: {:.4}", self.r2)?;
        writeln!(f, "  Adjusted R²: {:.4}", self.adjusted_r2)?;
        writeln!(f, "  RMSE: {:.4}", self.rmse)?;
        writeln!(f, "  MAE: {:.4}", self.mae)?;
        writeln!(f)?;
        writeln!(f, "Model Selection Criteria:")?;
        match self.perfect_fit {
            true => writeln!(f, "  AIC/BIC: undefined (perfect fit)")?,
            false => {
                writeln!(f, "  AIC: {:.4}", self.aic)?;
                writeln!(f, "  BIC: {:.4}", self.bic)?;
            }
        }
        writeln!(f)?;
        writeln!(f, "Residual Analysis:")?;
        writeln!(f, "  Observations: {}", self.n_observations)?;
        writeln!(f, "  Parameters: {}", self.n_parameters)?;
        writeln!(f, "  Mean residual: {:.6}", self.residual_mean)?;
        writeln!(f, "  Residual std: {:.4}", self.residual_std)?;
        match self.residual_normality_p {
            Some(p) => writeln!(f, "  Normality test p-value: {:.4}", p),
            None => writeln!(f, "  Normality test p-value: n/a"),
        }
    }
}
