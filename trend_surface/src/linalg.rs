/////////////////////////////////////////////////////////////////////////////////////////////
//
// Implements the rank-checked weighted least squares solve behind every trend surface fit.
//
// Created on: 19 Oct 2026     Author: Daniel Owen
//
// Copyright (c) 2026, Maptek Pty Ltd. All rights reserved. Licensed under the MIT License.
//
/////////////////////////////////////////////////////////////////////////////////////////////

//! # linalg
//!
//! Weighted least squares via a thin SVD of the equilibrated system `√W·A`.
//!
//! The normal matrix `AᵀWA` is never formed or inverted explicitly: for
//! degree ≥ 3 with clustered samples its condition number is the square of
//! that of `√W·A`, which is enough to lose every significant digit.

use crate::error::{TrendError, TrendResult};
use faer::Mat;
use trend_surface_utils::constants::DEFAULT_RANK_TOLERANCE;

/// The outcome of an ordinary or robust least squares fit.
///
/// Vectors are in sample order; `coefficients` are in basis order (see
/// [`crate::PolynomialBasis::powers`]).
#[derive(Debug, Clone)]
pub struct FitResult {
    /// Fitted coefficient vector `β`.
    pub coefficients: Vec<f64>,

    /// `A·β` at each sample.
    pub fitted: Vec<f64>,

    /// Observed values the fit was computed from.
    pub observed: Vec<f64>,

    /// Raw residuals `z - A·β`.
    pub residuals: Vec<f64>,

    /// Caller supplied sample weights.
    pub sample_weights: Vec<f64>,

    /// Reweighting factors from the robust loop; all `1.0` for an ordinary fit.
    pub weights_used: Vec<f64>,

    /// Coefficient covariance `σ²(AᵀWA)⁻¹`. `None` for an exactly determined
    /// system, where `σ²` cannot be estimated.
    pub covariance: Option<Mat<f64>>,

    /// Residual variance `σ² = Σ wᵢrᵢ² / (N - P)`, `None` when `N == P`.
    pub residual_variance: Option<f64>,

    /// Ratio of largest to smallest singular value of the equilibrated system.
    pub condition_number: f64,

    /// `false` if robust reweighting hit its iteration cap.
    pub converged: bool,

    /// Number of reweighting passes; `0` for an ordinary fit.
    pub iterations: usize,
}

impl FitResult {
    #[inline]
    pub fn num_observations(&self) -> usize {
        self.residuals.len()
    }

    #[inline]
    pub fn num_terms(&self) -> usize {
        self.coefficients.len()
    }

    /// Residual degrees of freedom `N - P`.
    #[inline]
    pub fn degrees_of_freedom(&self) -> usize {
        self.num_observations() - self.num_terms()
    }

    /// Weights that entered the final solve: sample weight times robust weight.
    pub fn effective_weights(&self) -> Vec<f64> {
        self.sample_weights
            .iter()
            .zip(&self.weights_used)
            .map(|(w, r)| w * r)
            .collect()
    }

    /// `Σ wᵢ rᵢ²` using the effective weights.
    pub fn weighted_rss(&self) -> f64 {
        self.residuals
            .iter()
            .zip(self.effective_weights())
            .map(|(r, w)| w * r * r)
            .sum()
    }

    /// Standard error of each coefficient, `sqrt(diag(covariance))`.
    pub fn standard_errors(&self) -> Option<Vec<f64>> {
        let cov = self.covariance.as_ref()?;
        Some((0..cov.nrows()).map(|k| cov[(k, k)].max(0.0).sqrt()).collect())
    }

    /// `β / se(β)` for each coefficient. Infinite where the standard error is zero.
    pub fn t_values(&self) -> Option<Vec<f64>> {
        let se = self.standard_errors()?;
        Some(
            self.coefficients
                .iter()
                .zip(se)
                .map(|(b, s)| match s {
                    s if s > 0.0 => b / s,
                    _ => b.signum() * f64::INFINITY,
                })
                .collect(),
        )
    }
}

/// Weighted least squares solver with an explicit rank check.
#[derive(Debug, Clone, Copy)]
pub struct LeastSquaresSolver {
    rank_tolerance: f64,
}

impl Default for LeastSquaresSolver {
    fn default() -> Self {
        Self {
            rank_tolerance: DEFAULT_RANK_TOLERANCE,
        }
    }
}

impl LeastSquaresSolver {
    /// # Errors
    /// [`TrendError::InvalidParameter`] unless `0 < rank_tolerance < 1`.
    pub fn new(rank_tolerance: f64) -> TrendResult<Self> {
        if !(rank_tolerance > 0.0 && rank_tolerance < 1.0) {
            return Err(TrendError::InvalidParameter {
                name: "rank_tolerance",
                value: rank_tolerance,
            });
        }
        Ok(Self { rank_tolerance })
    }

    #[inline]
    pub fn rank_tolerance(&self) -> f64 {
        self.rank_tolerance
    }

    /// Solves `min ‖√W(Aβ - z)‖₂`.
    ///
    /// Columns of `√W·A` are scaled to unit norm before the SVD so the rank
    /// test is insensitive to coordinate units. A singular value at or below
    /// `rank_tolerance · s_max` counts as zero.
    ///
    /// # Errors
    /// - [`TrendError::DimensionMismatch`] if `z` or `weights` disagree with `A`.
    /// - [`TrendError::InsufficientSamples`] if `A` has fewer rows than columns.
    /// - [`TrendError::SingularSystem`] if the weighted system is rank deficient.
    #[allow(non_snake_case)]
    pub fn solve(&self, A: &Mat<f64>, z: &[f64], weights: &[f64]) -> TrendResult<FitResult> {
        let (n, p) = (A.nrows(), A.ncols());

        for len in [z.len(), weights.len()] {
            if len != n {
                return Err(TrendError::DimensionMismatch {
                    expected: n,
                    found: len,
                });
            }
        }
        if n < p {
            return Err(TrendError::InsufficientSamples {
                samples: n,
                required: p,
            });
        }

        let sqrt_w: Vec<f64> = weights.iter().map(|w| w.sqrt()).collect();

        // Column equilibration. A zero column stays zero and shows up as a
        // zero singular value below.
        let col_scale: Vec<f64> = (0..p)
            .map(|j| {
                let norm = (0..n)
                    .map(|i| (sqrt_w[i] * A[(i, j)]).powi(2))
                    .sum::<f64>()
                    .sqrt();
                if norm > 0.0 { norm } else { 1.0 }
            })
            .collect();

        let As = Mat::from_fn(n, p, |i, j| sqrt_w[i] * A[(i, j)] / col_scale[j]);
        let zw = Mat::from_fn(n, 1, |i, _| sqrt_w[i] * z[i]);

        let svd = As.thin_svd().map_err(|_| TrendError::SingularSystem {
            rank: 0,
            terms: p,
            condition_number: f64::INFINITY,
        })?;

        let s: Vec<f64> = svd.S().column_vector().iter().copied().collect();
        let s_max = s.iter().copied().fold(0.0, f64::max);
        let s_min = s.iter().copied().fold(f64::INFINITY, f64::min);

        let condition_number = match s_min > 0.0 {
            true => s_max / s_min,
            false => f64::INFINITY,
        };

        let thresh = self.rank_tolerance * s_max;
        let rank = s.iter().filter(|v| **v > thresh).count();

        if rank < p || !condition_number.is_finite() {
            return Err(TrendError::SingularSystem {
                rank,
                terms: p,
                condition_number,
            });
        }

        // β = D⁻¹ V S⁻¹ Uᵀ √W z
        let utz = svd.U().transpose() * zw.as_ref();
        let gamma = Mat::from_fn(p, 1, |k, _| utz[(k, 0)] / s[k]);
        let gamma = svd.V() * gamma.as_ref();
        let coefficients: Vec<f64> = (0..p).map(|j| gamma[(j, 0)] / col_scale[j]).collect();

        let fitted: Vec<f64> = (0..n)
            .map(|i| (0..p).map(|j| A[(i, j)] * coefficients[j]).sum())
            .collect();
        let residuals: Vec<f64> = z.iter().zip(&fitted).map(|(z, f)| z - f).collect();

        // (AᵀWA)⁻¹ = (D⁻¹VS⁻¹)(D⁻¹VS⁻¹)ᵀ
        let residual_variance = match n > p {
            true => Some(
                residuals
                    .iter()
                    .zip(weights)
                    .map(|(r, w)| w * r * r)
                    .sum::<f64>()
                    / (n - p) as f64,
            ),
            false => None,
        };

        let covariance = residual_variance.map(|sigma2| {
            let v = svd.V();
            let vs = Mat::from_fn(p, p, |i, k| v[(i, k)] / (s[k] * col_scale[i]));
            let inv_normal = vs.as_ref() * vs.transpose();
            Mat::from_fn(p, p, |i, j| sigma2 * inv_normal[(i, j)])
        });

        Ok(FitResult {
            coefficients,
            fitted,
            observed: z.to_vec(),
            residuals,
            sample_weights: weights.to_vec(),
            weights_used: vec![1.0; n],
            covariance,
            residual_variance,
            condition_number,
            converged: true,
            iterations: 0,
        })
    }
}
