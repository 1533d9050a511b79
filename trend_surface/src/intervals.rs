/////////////////////////////////////////////////////////////////////////////////////////////
//
// Computes per-location standard errors and Student-t intervals from the coefficient covariance.
//
// Created on: 19 Oct 2026     Author: Daniel Owen
//
// Copyright (c) 2026, Maptek Pty Ltd. All rights reserved. Licensed under the MIT License.
//
/////////////////////////////////////////////////////////////////////////////////////////////

use crate::{
    common::CoordinateFrame,
    config::{check_confidence_level, IntervalKind},
    error::{TrendError, TrendResult},
    linalg::FitResult,
    polynomials::PolynomialBasis,
};
use faer::Mat;
use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, StudentsT};

/// A predicted value with its standard error and two-sided interval.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Interval {
    pub value: f64,
    pub std_error: f64,
    pub lower: f64,
    pub upper: f64,
}

/// Evaluates standard errors and intervals for a fixed fit and level.
///
/// The Student-t critical value for `N - P` degrees of freedom is computed
/// once at construction, so per-cell evaluation is a quadratic form
/// `row · C · rowᵀ` and a multiply.
#[derive(Debug, Clone)]
pub struct ConfidenceEstimator {
    covariance: Mat<f64>,
    residual_variance: f64,
    critical_value: f64,
    level: f64,
    kind: IntervalKind,
}

impl ConfidenceEstimator {
    /// # Errors
    /// - [`TrendError::InvalidConfidenceLevel`] unless `0 < level < 1`.
    /// - [`TrendError::DegreesOfFreedomExhausted`] if the fit has no
    ///   residual degrees of freedom (`N == P`).
    pub fn new(fit: &FitResult, level: f64, kind: IntervalKind) -> TrendResult<Self> {
        check_confidence_level(level)?;

        let dof_exhausted = || TrendError::DegreesOfFreedomExhausted {
            observations: fit.num_observations(),
            parameters: fit.num_terms(),
        };

        let (Some(covariance), Some(residual_variance)) =
            (fit.covariance.as_ref(), fit.residual_variance)
        else {
            return Err(dof_exhausted());
        };

        let dof = fit.degrees_of_freedom() as f64;
        let critical_value = StudentsT::new(0.0, 1.0, dof)
            .map_err(|_| dof_exhausted())?
            .inverse_cdf(1.0 - (1.0 - level) / 2.0);

        Ok(Self {
            covariance: covariance.clone(),
            residual_variance,
            critical_value,
            level,
            kind,
        })
    }

    #[inline]
    pub fn level(&self) -> f64 {
        self.level
    }

    #[inline]
    pub fn kind(&self) -> IntervalKind {
        self.kind
    }

    /// Two-sided Student-t critical value `t(1 - α/2, N - P)`.
    #[inline]
    pub fn critical_value(&self) -> f64 {
        self.critical_value
    }

    /// Standard error at a location given its basis expansion `row`.
    pub fn std_error(&self, row: &[f64]) -> f64 {
        let p = row.len();
        debug_assert_eq!(p, self.covariance.nrows());

        let mut quad = 0.0;
        for i in 0..p {
            let mut acc = 0.0;
            for j in 0..p {
                acc += self.covariance[(i, j)] * row[j];
            }
            quad += row[i] * acc;
        }
        let quad = quad.max(0.0);

        match self.kind {
            IntervalKind::Confidence => quad.sqrt(),
            IntervalKind::Prediction => (self.residual_variance + quad).sqrt(),
        }
    }

    /// Interval around `value` for the location with basis expansion `row`.
    pub fn interval(&self, value: f64, row: &[f64]) -> Interval {
        let std_error = self.std_error(row);
        let half_width = self.critical_value * std_error;
        Interval {
            value,
            std_error,
            lower: value - half_width,
            upper: value + half_width,
        }
    }
}

/// Predicts the trend at world coordinate `(x, y)` with an interval.
///
/// `basis` and `frame` must be the ones the fit was computed with.
///
/// # Errors
/// As [`ConfidenceEstimator::new`].
pub fn predict_interval(
    x: f64,
    y: f64,
    fit: &FitResult,
    basis: &PolynomialBasis,
    frame: &CoordinateFrame,
    confidence_level: f64,
    kind: IntervalKind,
) -> TrendResult<Interval> {
    let estimator = ConfidenceEstimator::new(fit, confidence_level, kind)?;
    let (u, v) = frame.to_local(x, y);
    let row = basis.expand(u, v);
    let value = trend_surface_utils::dot(&fit.coefficients, &row);
    Ok(estimator.interval(value, &row))
}
