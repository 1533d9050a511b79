/////////////////////////////////////////////////////////////////////////////////////////////
//
// Orchestrates trend surface fitting: design matrix, solve, statistics, cross-validation and evaluation.
//
// Created on: 19 Oct 2026     Author: Daniel Owen
//
// Copyright (c) 2026, Maptek Pty Ltd. All rights reserved. Licensed under the MIT License.
//
/////////////////////////////////////////////////////////////////////////////////////////////

use crate::{
    common::CoordinateFrame,
    config::{FitMethod, IntervalKind, TrendSettings},
    cross_validation::{CVMetrics, CrossValidator},
    error::{TrendError, TrendResult},
    intervals::{self, Interval},
    linalg::{FitResult, LeastSquaresSolver},
    polynomials::{DesignMatrix, PolynomialBasis},
    progress::{ProgressMsg, ProgressSink},
    robust::RobustFitter,
    samples::SampleSet,
    statistics::{self, Statistics},
    surface::{EvaluationOutputs, GridSpec, SurfaceEvaluator},
};
use faer::Mat;
use log::info;
use serde::{Deserialize, Serialize};
use std::{fmt, sync::Arc, time::Instant};
use trend_surface_utils::constants::DEFAULT_EXTENT_BUFFER;

/// Observed, fitted and residual values at one input sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SampleDiagnostic {
    pub x: f64,
    pub y: f64,
    pub observed: f64,
    pub fitted: f64,
    pub residual: f64,

    /// Caller supplied sample weight.
    pub weight: f64,

    /// Final IRLS weight; `1.0` for an ordinary fit.
    pub robust_weight: f64,
}

/// Convenience builder for constructing a [`TrendSurface`].
///
/// The builder should be called via the [`TrendSurface::builder`] method.
pub struct TrendSurfaceBuilder {
    samples: SampleSet,
    settings: TrendSettings,
    progress_callback: Option<Arc<dyn ProgressSink>>,
}

impl TrendSurfaceBuilder {
    fn new(samples: SampleSet, settings: TrendSettings) -> Self {
        Self {
            samples,
            settings,
            progress_callback: None,
        }
    }

    /// Optional sink for robust iteration, cross-validation and grid progress.
    pub fn progress_callback(mut self, progress_callback: Arc<dyn ProgressSink>) -> Self {
        self.progress_callback = Some(progress_callback);
        self
    }

    /// Fits the trend surface.
    ///
    /// # Errors
    /// Any [`TrendError`] raised while validating settings, fitting,
    /// summarising or cross-validating. Structural checks run first.
    pub fn build(self) -> TrendResult<TrendSurface> {
        TrendSurface::new(self.samples, self.settings, self.progress_callback)
    }
}

/// A fitted polynomial trend surface together with its diagnostics.
///
/// Construction does all of the numerical work. Evaluation and prediction
/// only read the stored fit.
#[derive(Debug)]
pub struct TrendSurface {
    samples: SampleSet,
    settings: TrendSettings,
    basis: PolynomialBasis,
    frame: CoordinateFrame,
    fit: FitResult,
    statistics: Statistics,
    cross_validation: Option<CVMetrics>,
    progress_callback: Option<Arc<dyn ProgressSink>>,
}

impl TrendSurface {
    /// Creates a new [`TrendSurfaceBuilder`] for the given samples and settings.
    ///
    /// This is the way to construct a trend surface.
    pub fn builder(samples: SampleSet, settings: TrendSettings) -> TrendSurfaceBuilder {
        TrendSurfaceBuilder::new(samples, settings)
    }

    fn new(
        samples: SampleSet,
        settings: TrendSettings,
        progress_callback: Option<Arc<dyn ProgressSink>>,
    ) -> TrendResult<Self> {
        let fit_start = Instant::now();

        settings.validate()?;
        let basis = PolynomialBasis::new(settings.degree)?;

        let (n, p) = (samples.len(), basis.num_terms());
        if n < p + 1 {
            return Err(TrendError::InsufficientSamples {
                samples: n,
                required: p + 1,
            });
        }
        if n == p + 1 {
            return Err(TrendError::DegreesOfFreedomExhausted {
                observations: n,
                parameters: p,
            });
        }

        let frame = match settings.normalize_coordinates {
            true => CoordinateFrame::chebyshev_square(&samples),
            false => CoordinateFrame::identity(),
        };

        let design = DesignMatrix::build_in_frame(&samples, &basis, frame)?;
        let solver = LeastSquaresSolver::new(settings.rank_tolerance)?;
        let z = samples.values();
        let w = samples.weights();

        let fit = match settings.fit_method {
            FitMethod::Ordinary => solver.solve(design.matrix(), &z, &w)?,
            FitMethod::Robust(params) => RobustFitter::new(params, solver)?.fit(
                design.matrix(),
                &z,
                &w,
                progress_callback.as_ref(),
            )?,
        };

        let statistics = statistics::summarize(&fit)?;

        let cross_validation = settings
            .cross_validation
            .map(|params| {
                CrossValidator::new(params)
                    .fit_method(settings.fit_method)
                    .normalize_coordinates(settings.normalize_coordinates)
                    .solver(solver)
                    .validate(&samples, settings.degree, progress_callback.as_ref())
            })
            .transpose()?;

        let fit_duration = fit_start.elapsed();

        info!(
            "fitted degree {} trend to {} samples: R² {:.4}, RMSE {:.4}",
            settings.degree, n, statistics.r2, statistics.rmse
        );

        if let Some(sink) = &progress_callback {
            let msg = format!(
                "Took {:?} to fit trend surface for {} samples using the following settings:\n\
                Degree: {}, Terms: {}, Fit method: {:?}\n\
                Normalised coordinates: {}, Cross-validation: {:?}",
                fit_duration,
                n,
                settings.degree,
                p,
                settings.fit_method,
                settings.normalize_coordinates,
                settings.cross_validation,
            );

            sink.emit(ProgressMsg::Message { message: msg });
        }

        Ok(Self {
            samples,
            settings,
            basis,
            frame,
            fit,
            statistics,
            cross_validation,
            progress_callback,
        })
    }

    pub fn settings(&self) -> &TrendSettings {
        &self.settings
    }

    pub fn samples(&self) -> &SampleSet {
        &self.samples
    }

    pub fn basis(&self) -> &PolynomialBasis {
        &self.basis
    }

    /// Frame the basis is evaluated in. Coefficients refer to this frame.
    pub fn frame(&self) -> &CoordinateFrame {
        &self.frame
    }

    pub fn fit(&self) -> &FitResult {
        &self.fit
    }

    pub fn coefficients(&self) -> &[f64] {
        &self.fit.coefficients
    }

    pub fn statistics(&self) -> &Statistics {
        &self.statistics
    }

    pub fn cross_validation(&self) -> Option<&CVMetrics> {
        self.cross_validation.as_ref()
    }

    fn evaluator(&self) -> SurfaceEvaluator<'_> {
        SurfaceEvaluator::new(&self.fit, &self.basis, self.frame)
    }

    /// Trend value at a world coordinate.
    pub fn predict(&self, x: f64, y: f64) -> f64 {
        self.evaluator().value_at(x, y)
    }

    /// Trend values at each row of an `(n × 2)` point matrix, as `(n × 1)`.
    pub fn predict_points(&self, points: &Mat<f64>) -> TrendResult<Mat<f64>> {
        if points.ncols() != 2 {
            return Err(TrendError::DimensionMismatch {
                expected: 2,
                found: points.ncols(),
            });
        }
        let evaluator = self.evaluator();
        Ok(Mat::from_fn(points.nrows(), 1, |i, _| {
            evaluator.value_at(points[(i, 0)], points[(i, 1)])
        }))
    }

    /// Trend value at a world coordinate with a standard error and interval.
    pub fn predict_interval(
        &self,
        x: f64,
        y: f64,
        confidence_level: f64,
        kind: IntervalKind,
    ) -> TrendResult<Interval> {
        intervals::predict_interval(
            x,
            y,
            &self.fit,
            &self.basis,
            &self.frame,
            confidence_level,
            kind,
        )
    }

    /// Evaluates the surface on `grid`, with the residual raster and, when a
    /// confidence level is configured, standard error and interval rasters.
    pub fn evaluate(&self, grid: &GridSpec) -> TrendResult<EvaluationOutputs> {
        let evaluator = match self.settings.confidence_level {
            Some(level) => self
                .evaluator()
                .with_intervals(level, self.settings.interval_kind)?,
            None => self.evaluator(),
        };

        evaluator.evaluate(grid, Some(&self.samples), self.progress_callback.as_ref())
    }

    /// Grid over the sample extent plus a 10% buffer on each side.
    pub fn default_grid(&self, cell_size: f64) -> TrendResult<GridSpec> {
        GridSpec::covering(&self.samples, cell_size, DEFAULT_EXTENT_BUFFER)
    }

    /// Per-sample observed, fitted and residual values, in sample order.
    pub fn sample_diagnostics(&self) -> Vec<SampleDiagnostic> {
        self.samples
            .iter()
            .enumerate()
            .map(|(i, s)| SampleDiagnostic {
                x: s.x,
                y: s.y,
                observed: self.fit.observed[i],
                fitted: self.fit.fitted[i],
                residual: self.fit.residuals[i],
                weight: self.fit.sample_weights[i],
                robust_weight: self.fit.weights_used[i],
            })
            .collect()
    }
}

impl fmt::Display for TrendSurface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Trend Surface Analysis Report")?;
        writeln!(f, "=============================")?;
        writeln!(f)?;
        writeln!(f, "Model Configuration:")?;
        writeln!(f, "  Polynomial degree: {}", self.settings.degree)?;
        writeln!(f, "  Number of terms: {}", self.basis.num_terms())?;
        writeln!(f, "  Samples: {}", self.samples.len())?;
        if self.samples.skipped() > 0 {
            writeln!(f, "  Skipped records: {}", self.samples.skipped())?;
        }
        writeln!(f, "  Weighted: {}", self.samples.is_weighted())?;
        match self.settings.fit_method {
            FitMethod::Ordinary => writeln!(f, "  Fit method: ordinary least squares")?,
            FitMethod::Robust(_) => writeln!(
                f,
                "  Fit method: robust (Huber IRLS), {} iterations, {}",
                self.fit.iterations,
                if self.fit.converged { "converged" } else { "NOT converged" }
            )?,
        }
        writeln!(
            f,
            "  Coordinates: {}",
            if self.frame.is_identity() { "raw" } else { "normalised to [-1, 1]" }
        )?;
        writeln!(f, "  Condition number: {:.3e}", self.fit.condition_number)?;
        writeln!(f)?;

        writeln!(f, "Coefficients:")?;
        let se = self.fit.standard_errors();
        let t = self.fit.t_values();
        for k in 0..self.basis.num_terms() {
            write!(f, "  {:<10} {:>14.6e}", self.basis.term_label(k), self.fit.coefficients[k])?;
            if let (Some(se), Some(t)) = (&se, &t) {
                write!(f, "  se {:>12.4e}  t {:>9.3}", se[k], t[k])?;
            }
            writeln!(f)?;
        }
        writeln!(f)?;

        write!(f, "{}", self.statistics)?;

        if let Some(cv) = &self.cross_validation {
            writeln!(f)?;
            write!(f, "{}", cv)?;
        }
        Ok(())
    }
}
