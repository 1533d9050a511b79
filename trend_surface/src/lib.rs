/////////////////////////////////////////////////////////////////////////////////////////////
//
// Exposes the public API and high-level documentation for polynomial trend surface analysis.
//
// Created on: 19 Oct 2026     Author: Daniel Owen
//
// Copyright (c) 2026, Maptek Pty Ltd. All rights reserved. Licensed under the MIT License.
//
/////////////////////////////////////////////////////////////////////////////////////////////

//! # Global polynomial trend surface analysis.
//!
//! A trend surface is a low order polynomial `z = f(x, y)` fitted by least
//! squares to scattered spatial samples. It separates the regional component
//! of a variable from local variation, which is left in the residuals.
//!
//! The crate fits the surface, reports goodness of fit and model selection
//! statistics, optionally cross-validates it, and evaluates it over a regular
//! grid together with residual, standard error and interval rasters.
//!
//! # Features
//! - Any total degree `d ≥ 1`, with `(d + 1)(d + 2) / 2` terms in graded lexicographic order
//! - Weighted least squares through a thin SVD, with explicit rank deficiency detection
//! - Optional coordinate normalisation to `[-1, 1]²` for well conditioned high degree fits
//! - Robust fitting by Huber iteratively reweighted least squares
//! - R², adjusted R², RMSE, MAE, AIC, BIC and a residual normality test
//! - Seeded k-fold cross-validation, with folds fitted in parallel
//! - Confidence and prediction intervals from Student-t quantiles
//! - Parallel grid evaluation with cooperative progress reporting and cancellation
//! - Built on [`faer`](https://docs.rs/faer/latest/faer/) for linear algebra
//!
//! # Examples
//!
//! ```
//! use trend_surface::{
//!     config::{CrossValidationParams, TrendSettings},
//!     SampleSet, TrendSurface, TrendTestFunctions,
//! };
//!
//! // Random samples of a regional trend with local variation on top
//! let points = TrendTestFunctions::random_points(200, [0.0, 0.0, 1.0, 1.0], Some(42));
//! let values = TrendTestFunctions::regional_with_local(&points);
//! let samples = SampleSet::from_points(&points, &values, None).unwrap();
//!
//! // Cubic robust trend with 5-fold cross-validation and 95% confidence intervals
//! let settings = TrendSettings::builder(3)
//!     .robust()
//!     .cross_validation(CrossValidationParams::default())
//!     .confidence_level(0.95)
//!     .build();
//!
//! let trend = TrendSurface::builder(samples, settings).build().unwrap();
//! assert!(trend.statistics().r2 > 0.95);
//!
//! // Evaluate over the sample extent plus a 10% buffer
//! let grid = trend.default_grid(0.05).unwrap();
//! let outputs = trend.evaluate(&grid).unwrap();
//!
//! assert!(outputs.surface.nrows() == grid.n_rows);
//! assert!(outputs.upper.is_some());
//! ```
//!
//! # References
//! 1.  W. C. Krumbein. Trend surface analysis of contour-type maps with irregular
//!     control-point spacing. J. Geophys. Res., 64(7):823–834, 1959.
//! 2.  P. J. Huber. Robust Statistics. Wiley, 1981.
//! 3.  R. B. D'Agostino, A. Belanger and R. B. D'Agostino Jr. A suggestion for using
//!     powerful and informative tests of normality. The American Statistician,
//!     44(4):316–321, 1990.
pub mod config;

pub mod progress;

mod common;

mod error;

mod samples;

mod polynomials;

mod linalg;

mod robust;

mod statistics;

mod intervals;

mod cross_validation;

mod surface;

mod trend;

mod trend_test_functions;

pub use {
    common::{csv_to_samples, pad_and_snap_extents, CoordinateFrame},
    cross_validation::{CVMetrics, CrossValidator},
    error::{TrendError, TrendResult},
    intervals::{predict_interval, ConfidenceEstimator, Interval},
    linalg::{FitResult, LeastSquaresSolver},
    polynomials::{num_terms, DesignMatrix, PolynomialBasis},
    robust::{huber_weight, robust_scale, RobustFitter},
    samples::{Sample, SampleSet},
    statistics::{normality_test, r_squared, summarize, Statistics},
    surface::{EvaluationOutputs, GridSpec, SurfaceEvaluator},
    trend::{SampleDiagnostic, TrendSurface, TrendSurfaceBuilder},
    trend_test_functions::TrendTestFunctions,
};
