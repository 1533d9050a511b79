/////////////////////////////////////////////////////////////////////////////////////////////
//
// Defines default tuning constants for robust fitting, validation and raster output.
//
// Created on: 19 Oct 2026     Author: Daniel Owen
//
// Copyright (c) 2026, Maptek Pty Ltd. All rights reserved. Licensed under the MIT License.
//
/////////////////////////////////////////////////////////////////////////////////////////////

//! Default constants shared by the trend surface engine.

/// Consistency factor relating the median absolute residual to the standard
/// deviation of a normal distribution (`s = median(|r|) / 0.6745`).
pub const MAD_CONSISTENCY: f64 = 0.6745;

/// Huber tuning constant giving 95% efficiency under normal errors.
pub const DEFAULT_HUBER_TUNING: f64 = 1.345;

/// Relative L2 change in the coefficient vector below which IRLS stops.
pub const DEFAULT_CONVERGENCE_TOLERANCE: f64 = 1e-4;

/// Iteration cap for the robust reweighting loop.
pub const DEFAULT_MAX_ROBUST_ITERATIONS: usize = 20;

/// Smallest accepted ratio between the smallest and largest singular value
/// of the column-equilibrated design matrix.
pub const DEFAULT_RANK_TOLERANCE: f64 = 1e-12;

/// Value written to raster cells that carry no information.
pub const NODATA_VALUE: f64 = -9999.0;

/// Fraction of the sample range added to each side of a default grid extent.
pub const DEFAULT_EXTENT_BUFFER: f64 = 0.1;

/// Number of folds used when cross-validation is requested without a `k`.
pub const DEFAULT_CV_FOLDS: usize = 5;

/// Seed for the fold assignment shuffle.
pub const DEFAULT_CV_SEED: u64 = 42;

/// Minimum number of residuals for the D'Agostino-Pearson normality test.
pub const MIN_NORMALITY_SAMPLES: usize = 8;
