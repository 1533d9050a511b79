/////////////////////////////////////////////////////////////////////////////////////////////
//
// Declares configuration types for polynomial degree, robust fitting, cross-validation and intervals.
//
// Created on: 19 Oct 2026     Author: Daniel Owen
//
// Copyright (c) 2026, Maptek Pty Ltd. All rights reserved. Licensed under the MIT License.
//
/////////////////////////////////////////////////////////////////////////////////////////////

//! Declares configuration types for polynomial degree, robust fitting, cross-validation and intervals.
use crate::error::{TrendError, TrendResult};
use serde::{Deserialize, Serialize};
use trend_surface_utils::constants::{
    DEFAULT_CONVERGENCE_TOLERANCE, DEFAULT_CV_FOLDS, DEFAULT_CV_SEED, DEFAULT_HUBER_TUNING,
    DEFAULT_MAX_ROBUST_ITERATIONS, DEFAULT_RANK_TOLERANCE,
};

/// Parameters of the iteratively reweighted least squares loop.
///
/// ### Default Values
/// - `max_iterations`: `20`
/// - `tuning_constant`: `1.345`
/// - `tolerance`: `1e-4`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RobustParams {
    /// Cap on reweighting passes. Hitting it leaves the fit flagged as not converged.
    pub max_iterations: usize,

    /// Huber tuning constant `k`, in units of the robust residual scale.
    /// Residuals within `k` scale units keep full weight.
    pub tuning_constant: f64,

    /// Convergence threshold on `‖βₙ - βₙ₋₁‖ / ‖βₙ₋₁‖`.
    pub tolerance: f64,
}

impl Default for RobustParams {
    fn default() -> Self {
        RobustParams {
            max_iterations: DEFAULT_MAX_ROBUST_ITERATIONS,
            tuning_constant: DEFAULT_HUBER_TUNING,
            tolerance: DEFAULT_CONVERGENCE_TOLERANCE,
        }
    }
}

impl RobustParams {
    pub fn validate(&self) -> TrendResult<()> {
        if self.max_iterations < 1 {
            return Err(TrendError::InvalidParameter {
                name: "max_iterations",
                value: self.max_iterations as f64,
            });
        }
        if !(self.tuning_constant.is_finite() && self.tuning_constant > 0.0) {
            return Err(TrendError::InvalidParameter {
                name: "tuning_constant",
                value: self.tuning_constant,
            });
        }
        if !(self.tolerance.is_finite() && self.tolerance > 0.0) {
            return Err(TrendError::InvalidParameter {
                name: "tolerance",
                value: self.tolerance,
            });
        }
        Ok(())
    }
}

/// How the coefficients are estimated.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum FitMethod {
    /// Weighted least squares in a single solve.
    Ordinary,

    /// Huber IRLS starting from the ordinary fit.
    Robust(RobustParams),
}

impl Default for FitMethod {
    fn default() -> Self {
        FitMethod::Ordinary
    }
}

/// k-fold cross-validation settings.
///
/// ### Default Values
/// - `k`: `5`
/// - `seed`: `42`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrossValidationParams {
    /// Number of folds. `k == N` gives leave-one-out.
    pub k: usize,

    /// Seed for the fold shuffle. The same seed always gives the same folds.
    pub seed: u64,
}

impl Default for CrossValidationParams {
    fn default() -> Self {
        CrossValidationParams {
            k: DEFAULT_CV_FOLDS,
            seed: DEFAULT_CV_SEED,
        }
    }
}

/// Which uncertainty an interval describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IntervalKind {
    /// Uncertainty of the mean trend: `sqrt(x C xᵀ)`.
    Confidence,

    /// Uncertainty of a new observation: `sqrt(σ² + x C xᵀ)`.
    Prediction,
}

impl Default for IntervalKind {
    fn default() -> Self {
        IntervalKind::Confidence
    }
}

/// A convenience builder for constructing a [`TrendSettings`] instance.
///
/// The builder should be called via the [`TrendSettings::builder`] method.
///
/// See [`TrendSettings`] for details on each field.
#[derive(Debug, Clone, Copy)]
pub struct TrendSettingsBuilder {
    degree: usize,
    fit_method: FitMethod,
    cross_validation: Option<CrossValidationParams>,
    confidence_level: Option<f64>,
    interval_kind: IntervalKind,
    normalize_coordinates: bool,
    rank_tolerance: f64,
}

impl TrendSettingsBuilder {
    fn new(degree: usize) -> Self {
        Self {
            degree,
            fit_method: FitMethod::Ordinary,
            cross_validation: None,
            confidence_level: None,
            interval_kind: IntervalKind::Confidence,
            normalize_coordinates: true,
            rank_tolerance: DEFAULT_RANK_TOLERANCE,
        }
    }

    /// Sets the fit method.
    pub fn fit_method(mut self, fit_method: FitMethod) -> Self {
        self.fit_method = fit_method;
        self
    }

    /// Shorthand for `fit_method(FitMethod::Robust(RobustParams::default()))`.
    pub fn robust(self) -> Self {
        self.fit_method(FitMethod::Robust(RobustParams::default()))
    }

    /// Enables k-fold cross-validation.
    pub fn cross_validation(mut self, params: CrossValidationParams) -> Self {
        self.cross_validation = Some(params);
        self
    }

    /// Enables interval rasters at the given two-sided level, e.g. `0.95`.
    pub fn confidence_level(mut self, level: f64) -> Self {
        self.confidence_level = Some(level);
        self
    }

    pub fn interval_kind(mut self, interval_kind: IntervalKind) -> Self {
        self.interval_kind = interval_kind;
        self
    }

    /// Whether to map coordinates into `[-1, 1]²` before basis expansion.
    pub fn normalize_coordinates(mut self, normalize: bool) -> Self {
        self.normalize_coordinates = normalize;
        self
    }

    /// Sets the relative singular value threshold of the rank check.
    pub fn rank_tolerance(mut self, rank_tolerance: f64) -> Self {
        self.rank_tolerance = rank_tolerance;
        self
    }

    /// Builds and returns an instance of [`TrendSettings`] from the values
    /// defined in the builder.
    pub fn build(self) -> TrendSettings {
        TrendSettings {
            degree: self.degree,
            fit_method: self.fit_method,
            cross_validation: self.cross_validation,
            confidence_level: self.confidence_level,
            interval_kind: self.interval_kind,
            normalize_coordinates: self.normalize_coordinates,
            rank_tolerance: self.rank_tolerance,
        }
    }
}

/// Settings for fitting and evaluating a trend surface.
///
/// Construct with [`TrendSettings::builder`]; structural checks are done by
/// [`TrendSettings::validate`] before any matrix work.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrendSettings {
    /// Total polynomial degree, at least 1.
    pub degree: usize,

    /// Ordinary or robust estimation.
    pub fit_method: FitMethod,

    /// Optional k-fold cross-validation run after the main fit.
    pub cross_validation: Option<CrossValidationParams>,

    /// Optional interval level in `(0, 1)`. When set, evaluation also
    /// produces standard error and lower/upper rasters.
    pub confidence_level: Option<f64>,

    /// Mean trend or new observation intervals.
    pub interval_kind: IntervalKind,

    /// Map coordinates into `[-1, 1]²` before basis expansion. Coefficients are
    /// then expressed in the normalised frame.
    pub normalize_coordinates: bool,

    /// Singular values at or below `rank_tolerance · s_max` count as zero.
    pub rank_tolerance: f64,
}

impl TrendSettings {
    /// Creates a new [`TrendSettingsBuilder`] for the given polynomial degree.
    pub fn builder(degree: usize) -> TrendSettingsBuilder {
        TrendSettingsBuilder::new(degree)
    }

    /// Robust parameters when the fit method is robust.
    pub fn robust_params(&self) -> Option<RobustParams> {
        match self.fit_method {
            FitMethod::Robust(params) => Some(params),
            FitMethod::Ordinary => None,
        }
    }

    /// Checks every setting against its valid range.
    pub fn validate(&self) -> TrendResult<()> {
        if self.degree < 1 {
            return Err(TrendError::InvalidDegree {
                degree: self.degree,
            });
        }
        if let Some(params) = self.robust_params() {
            params.validate()?;
        }
        if let Some(cv) = self.cross_validation {
            if cv.k < 2 {
                return Err(TrendError::InvalidParameter {
                    name: "k",
                    value: cv.k as f64,
                });
            }
        }
        if let Some(level) = self.confidence_level {
            check_confidence_level(level)?;
        }
        if !(self.rank_tolerance > 0.0 && self.rank_tolerance < 1.0) {
            return Err(TrendError::InvalidParameter {
                name: "rank_tolerance",
                value: self.rank_tolerance,
            });
        }
        Ok(())
    }
}

/// Fails unless `0 < level < 1`.
pub(crate) fn check_confidence_level(level: f64) -> TrendResult<()> {
    match level > 0.0 && level < 1.0 {
        true => Ok(()),
        false => Err(TrendError::InvalidConfidenceLevel { level }),
    }
}
