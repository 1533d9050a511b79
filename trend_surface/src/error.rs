/////////////////////////////////////////////////////////////////////////////////////////////
//
// Declares the error type returned by trend surface fitting and evaluation.
//
// Created on: 19 Oct 2026     Author: Daniel Owen
//
// Copyright (c) 2026, Maptek Pty Ltd. All rights reserved. Licensed under the MIT License.
//
/////////////////////////////////////////////////////////////////////////////////////////////

use std::{error::Error, fmt};

/// Convenience alias used throughout the crate.
pub type TrendResult<T> = std::result::Result<T, TrendError>;

/// Errors that can occur while building, fitting or evaluating a trend surface.
///
/// Structural problems (degree, sample counts, confidence level, grid shape)
/// are detected before any matrix work is done. Numerical rank deficiency is
/// detected explicitly from the singular values of the design matrix.
///
/// Failure of the robust reweighting loop to converge is **not** an error; it
/// is reported through [`crate::FitResult::converged`].
#[derive(Debug, Clone, PartialEq)]
pub enum TrendError {
    /// Polynomial degree must be at least 1.
    InvalidDegree { degree: usize },

    /// Fewer samples than required by the polynomial basis, or a
    /// cross-validation fold left too few training samples.
    InsufficientSamples { samples: usize, required: usize },

    /// The weighted design matrix does not have full column rank, or its
    /// condition number exceeds the configured limit.
    SingularSystem {
        rank: usize,
        terms: usize,
        condition_number: f64,
    },

    /// Not enough observations left over to estimate residual variance or
    /// adjusted statistics.
    DegreesOfFreedomExhausted {
        observations: usize,
        parameters: usize,
    },

    /// Confidence level outside the open interval (0, 1).
    InvalidConfidenceLevel { level: f64 },

    /// A sample with a non-finite coordinate or value, or a non-positive weight.
    InvalidSample { index: usize, reason: &'static str },

    /// A numeric parameter outside its valid range.
    InvalidParameter { name: &'static str, value: f64 },

    /// A grid definition that violates its invariants.
    InvalidGrid { reason: &'static str },

    /// Parallel inputs of different lengths.
    DimensionMismatch { expected: usize, found: usize },

    /// A progress sink requested cancellation at a checkpoint.
    Cancelled,
}

impl fmt::Display for TrendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrendError::InvalidDegree { degree } => {
                write!(f, "invalid polynomial degree {} (must be at least 1)", degree)
            }
            TrendError::InsufficientSamples { samples, required } => write!(
                f,
                "insufficient samples: {} available, at least {} required",
                samples, required
            ),
            TrendError::SingularSystem {
                rank,
                terms,
                condition_number,
            } => write!(
                f,
                "singular least squares system: rank {} of {} terms (condition number {:e}); \
                 try reducing the polynomial degree",
                rank, terms, condition_number
            ),
            TrendError::DegreesOfFreedomExhausted {
                observations,
                parameters,
            } => write!(
                f,
                "degrees of freedom exhausted: {} observations for {} parameters",
                observations, parameters
            ),
            TrendError::InvalidConfidenceLevel { level } => {
                write!(f, "confidence level {} is outside (0, 1)", level)
            }
            TrendError::InvalidSample { index, reason } => {
                write!(f, "invalid sample at index {}: {}", index, reason)
            }
            TrendError::InvalidParameter { name, value } => {
                write!(f, "invalid value {} for parameter `{}`", value, name)
            }
            TrendError::InvalidGrid { reason } => write!(f, "invalid grid: {}", reason),
            TrendError::DimensionMismatch { expected, found } => {
                write!(f, "length mismatch: expected {}, found {}", expected, found)
            }
            TrendError::Cancelled => write!(f, "operation cancelled"),
        }
    }
}

impl Error for TrendError {}
