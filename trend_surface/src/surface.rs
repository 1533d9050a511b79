/////////////////////////////////////////////////////////////////////////////////////////////
//
// Evaluates a fitted trend over a regular grid, producing surface, residual and interval rasters.
//
// Created on: 19 Oct 2026     Author: Daniel Owen
//
// Copyright (c) 2026, Maptek Pty Ltd. All rights reserved. Licensed under the MIT License.
//
/////////////////////////////////////////////////////////////////////////////////////////////

//! Grid lattices and raster evaluation.
//!
//! Rasters are `n_rows × n_cols` matrices with row 0 at the north edge, the
//! layout expected by north-up raster writers with geotransform
//! `(origin_x, cell_size, 0, origin_y, 0, -cell_size)`.

use crate::{
    common::{pad_and_snap_extents, CoordinateFrame},
    config::IntervalKind,
    error::{TrendError, TrendResult},
    intervals::{ConfidenceEstimator, Interval},
    linalg::FitResult,
    polynomials::PolynomialBasis,
    progress::{self, ProgressMsg, ProgressSink},
    samples::SampleSet,
};
use faer::Mat;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};
use trend_surface_utils::constants::NODATA_VALUE;

/// A regular raster lattice anchored at its north-west corner.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridSpec {
    /// x of the west edge.
    pub origin_x: f64,

    /// y of the north edge.
    pub origin_y: f64,

    pub cell_size: f64,
    pub n_cols: usize,
    pub n_rows: usize,
}

impl GridSpec {
    /// # Errors
    /// [`TrendError::InvalidGrid`] unless the origin is finite, `cell_size > 0`
    /// and both dimensions are at least 1.
    pub fn new(
        origin_x: f64,
        origin_y: f64,
        cell_size: f64,
        n_cols: usize,
        n_rows: usize,
    ) -> TrendResult<Self> {
        let grid = Self {
            origin_x,
            origin_y,
            cell_size,
            n_cols,
            n_rows,
        };
        grid.validate()?;
        Ok(grid)
    }

    pub fn validate(&self) -> TrendResult<()> {
        if !(self.origin_x.is_finite() && self.origin_y.is_finite()) {
            return Err(TrendError::InvalidGrid {
                reason: "origin must be finite",
            });
        }
        if !(self.cell_size.is_finite() && self.cell_size > 0.0) {
            return Err(TrendError::InvalidGrid {
                reason: "cell size must be finite and positive",
            });
        }
        if self.n_cols < 1 || self.n_rows < 1 {
            return Err(TrendError::InvalidGrid {
                reason: "grid must have at least one row and one column",
            });
        }
        if self.n_cols.checked_mul(self.n_rows).is_none() {
            return Err(TrendError::InvalidGrid {
                reason: "grid cell count overflows",
            });
        }
        Ok(())
    }

    /// Grid spanning `[min_x, min_y, max_x, max_y]`, anchored at `(min_x, max_y)`,
    /// with `max(1, floor(range / cell_size) + 1)` cells along each axis.
    ///
    /// # Errors
    /// [`TrendError::InvalidGrid`] for a non-positive cell size, an inverted
    /// extent, or a cell count that does not fit in `usize`.
    pub fn from_extent(extent: [f64; 4], cell_size: f64) -> TrendResult<Self> {
        if !(cell_size.is_finite() && cell_size > 0.0) {
            return Err(TrendError::InvalidGrid {
                reason: "cell size must be finite and positive",
            });
        }
        let [min_x, min_y, max_x, max_y] = extent;
        if !(max_x >= min_x && max_y >= min_y) {
            return Err(TrendError::InvalidGrid {
                reason: "extent maximum is below its minimum",
            });
        }

        // `as usize` saturates, so an extent too fine for the cell size shows up
        // as an overflow of the `+ 1`.
        let count = |range: f64| {
            ((range / cell_size).floor() as usize)
                .checked_add(1)
                .ok_or(TrendError::InvalidGrid {
                    reason: "extent holds too many cells for the cell size",
                })
        };
        Self::new(min_x, max_y, cell_size, count(max_x - min_x)?, count(max_y - min_y)?)
    }

    /// Grid over the sample bounding box padded by `buffer_fraction` of its
    /// range on every side (e.g. `0.1` for 10%).
    ///
    /// # Errors
    /// [`TrendError::InsufficientSamples`] for an empty sample set, otherwise
    /// as [`GridSpec::from_extent`].
    pub fn covering(samples: &SampleSet, cell_size: f64, buffer_fraction: f64) -> TrendResult<Self> {
        let [min_x, min_y, max_x, max_y] = sample_extents(samples)?;
        let x_pad = (max_x - min_x) * buffer_fraction;
        let y_pad = (max_y - min_y) * buffer_fraction;

        Self::from_extent(
            [min_x - x_pad, min_y - y_pad, max_x + x_pad, max_y + y_pad],
            cell_size,
        )
    }

    /// As [`GridSpec::covering`], with the padded extent snapped outward to
    /// multiples of `cell_size` so cell edges fall on round coordinates.
    pub fn snapped_covering(
        samples: &SampleSet,
        cell_size: f64,
        buffer_fraction: f64,
    ) -> TrendResult<Self> {
        if !(cell_size.is_finite() && cell_size > 0.0) {
            return Err(TrendError::InvalidGrid {
                reason: "cell size must be finite and positive",
            });
        }
        let extent = sample_extents(samples)?;
        Self::from_extent(pad_and_snap_extents(&extent, cell_size, buffer_fraction), cell_size)
    }

    #[inline]
    pub fn num_cells(&self) -> usize {
        self.n_rows * self.n_cols
    }

    /// World coordinate of the centre of cell `(row, col)`.
    #[inline]
    pub fn cell_center(&self, row: usize, col: usize) -> (f64, f64) {
        (
            self.origin_x + (col as f64 + 0.5) * self.cell_size,
            self.origin_y - (row as f64 + 0.5) * self.cell_size,
        )
    }

    /// Cell `(row, col)` containing a world coordinate, `None` outside the grid.
    pub fn cell_of(&self, x: f64, y: f64) -> Option<(usize, usize)> {
        let col = ((x - self.origin_x) / self.cell_size).floor();
        let row = ((self.origin_y - y) / self.cell_size).floor();

        let inside = col >= 0.0
            && row >= 0.0
            && col < self.n_cols as f64
            && row < self.n_rows as f64;

        inside.then_some((row as usize, col as usize))
    }

    /// `[min_x, min_y, max_x, max_y]` of the grid's outer edges.
    pub fn extent(&self) -> [f64; 4] {
        [
            self.origin_x,
            self.origin_y - self.n_rows as f64 * self.cell_size,
            self.origin_x + self.n_cols as f64 * self.cell_size,
            self.origin_y,
        ]
    }
}

fn sample_extents(samples: &SampleSet) -> TrendResult<[f64; 4]> {
    samples.extents().ok_or(TrendError::InsufficientSamples {
        samples: 0,
        required: 1,
    })
}

/// Rasters produced by [`SurfaceEvaluator::evaluate`], all shaped like `grid`.
#[derive(Debug, Clone)]
pub struct EvaluationOutputs {
    pub grid: GridSpec,

    /// Trend value at every cell centre.
    pub surface: Mat<f64>,

    /// Mean residual of the samples inside each cell; `nodata` elsewhere.
    pub residuals: Option<Mat<f64>>,

    /// Standard error at every cell centre, when intervals were requested.
    pub std_error: Option<Mat<f64>>,

    pub lower: Option<Mat<f64>>,
    pub upper: Option<Mat<f64>>,

    /// Marker for cells without a value.
    pub nodata: f64,
}

/// Evaluates a fitted polynomial over grids and at individual points.
///
/// The evaluator only reads the fit; grid rows are evaluated in parallel.
#[derive(Debug, Clone)]
pub struct SurfaceEvaluator<'a> {
    fit: &'a FitResult,
    basis: &'a PolynomialBasis,
    frame: CoordinateFrame,
    estimator: Option<ConfidenceEstimator>,
}

impl<'a> SurfaceEvaluator<'a> {
    /// `basis` and `frame` must be the ones the fit was computed with.
    pub fn new(fit: &'a FitResult, basis: &'a PolynomialBasis, frame: CoordinateFrame) -> Self {
        debug_assert_eq!(fit.num_terms(), basis.num_terms());
        Self {
            fit,
            basis,
            frame,
            estimator: None,
        }
    }

    /// Also produce standard error and lower/upper rasters.
    ///
    /// # Errors
    /// As [`ConfidenceEstimator::new`].
    pub fn with_intervals(mut self, level: f64, kind: IntervalKind) -> TrendResult<Self> {
        self.estimator = Some(ConfidenceEstimator::new(self.fit, level, kind)?);
        Ok(self)
    }

    /// Trend value at a world coordinate.
    #[inline]
    pub fn value_at(&self, x: f64, y: f64) -> f64 {
        let (u, v) = self.frame.to_local(x, y);
        self.basis.evaluate(&self.fit.coefficients, u, v)
    }

    /// Evaluates every cell of `grid`.
    ///
    /// When `residual_samples` is given (the samples the fit was computed
    /// from, in the same order), each sample's residual is assigned to the
    /// cell containing it. Cells holding several samples get their mean;
    /// cells with none, and samples outside the grid, are ignored.
    ///
    /// # Errors
    /// - [`TrendError::InvalidGrid`] for an invalid grid.
    /// - [`TrendError::DimensionMismatch`] if `residual_samples` does not match the fit.
    /// - [`TrendError::Cancelled`] if the progress sink asks to stop between rows.
    pub fn evaluate(
        &self,
        grid: &GridSpec,
        residual_samples: Option<&SampleSet>,
        progress_callback: Option<&Arc<dyn ProgressSink>>,
    ) -> TrendResult<EvaluationOutputs> {
        grid.validate()?;

        let residuals = residual_samples
            .map(|samples| self.rasterize_residuals(grid, samples))
            .transpose()?;

        let done = AtomicUsize::new(0);
        let rows = (0..grid.n_rows)
            .into_par_iter()
            .map(|row| -> TrendResult<Vec<Interval>> {
                progress::checkpoint(progress_callback)?;

                let mut local = vec![0.0; self.basis.num_terms()];
                let cells = (0..grid.n_cols)
                    .map(|col| {
                        let (x, y) = grid.cell_center(row, col);
                        let (u, v) = self.frame.to_local(x, y);
                        self.basis.expand_into(u, v, &mut local);
                        let value = trend_surface_utils::dot(&self.fit.coefficients, &local);

                        match &self.estimator {
                            Some(estimator) => estimator.interval(value, &local),
                            None => Interval {
                                value,
                                std_error: f64::NAN,
                                lower: f64::NAN,
                                upper: f64::NAN,
                            },
                        }
                    })
                    .collect();

                let finished = done.fetch_add(1, Ordering::Relaxed) + 1;
                progress::report(progress_callback, || ProgressMsg::GridRow {
                    row,
                    progress: progress::fraction(finished, grid.n_rows),
                });

                Ok(cells)
            })
            .collect::<TrendResult<Vec<_>>>()?;

        let raster = |field: fn(&Interval) -> f64| {
            Mat::from_fn(grid.n_rows, grid.n_cols, |r, c| field(&rows[r][c]))
        };

        let (std_error, lower, upper) = match self.estimator.is_some() {
            true => (
                Some(raster(|iv| iv.std_error)),
                Some(raster(|iv| iv.lower)),
                Some(raster(|iv| iv.upper)),
            ),
            false => (None, None, None),
        };

        Ok(EvaluationOutputs {
            grid: *grid,
            surface: raster(|iv| iv.value),
            residuals,
            std_error,
            lower,
            upper,
            nodata: NODATA_VALUE,
        })
    }

    fn rasterize_residuals(&self, grid: &GridSpec, samples: &SampleSet) -> TrendResult<Mat<f64>> {
        if samples.len() != self.fit.num_observations() {
            return Err(TrendError::DimensionMismatch {
                expected: self.fit.num_observations(),
                found: samples.len(),
            });
        }

        let mut sum = Mat::<f64>::zeros(grid.n_rows, grid.n_cols);
        let mut count = vec![0usize; grid.num_cells()];

        for (sample, residual) in samples.iter().zip(&self.fit.residuals) {
            if let Some((r, c)) = grid.cell_of(sample.x, sample.y) {
                sum[(r, c)] += residual;
                count[r * grid.n_cols + c] += 1;
            }
        }

        Ok(Mat::from_fn(grid.n_rows, grid.n_cols, |r, c| {
            match count[r * grid.n_cols + c] {
                0 => NODATA_VALUE,
                k => sum[(r, c)] / k as f64,
            }
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        linalg::LeastSquaresSolver,
        polynomials::DesignMatrix,
        progress::tests::RecordingSink,
        samples::Sample,
    };
    use equator::assert;

    /// Samples at the centres of every cell of `grid`, in row-major order.
    fn samples_at_centres(grid: &GridSpec) -> SampleSet {
        let mut samples = Vec::new();
        for r in 0..grid.n_rows {
            for c in 0..grid.n_cols {
                let (x, y) = grid.cell_center(r, c);
                let noise = (((r * 31 + c * 17) % 7) as f64 - 3.0) * 0.1;
                samples.push(Sample::new(x, y, 10.0 + 0.2 * x - 0.1 * y + 0.01 * x * y + noise));
            }
        }
        SampleSet::new(samples).unwrap()
    }

    fn fit(samples: &SampleSet, degree: usize) -> (FitResult, PolynomialBasis) {
        let design = DesignMatrix::build(samples, degree).unwrap();
        let fit = LeastSquaresSolver::default()
            .solve(design.matrix(), &samples.values(), &samples.weights())
            .unwrap();
        (fit, design.basis().clone())
    }

    #[test]
    fn grid_validation() {
        assert!(GridSpec::new(0.0, 0.0, 0.0, 3, 3).is_err());
        assert!(GridSpec::new(0.0, 0.0, -1.0, 3, 3).is_err());
        assert!(GridSpec::new(0.0, 0.0, 1.0, 0, 3).is_err());
        assert!(GridSpec::new(f64::NAN, 0.0, 1.0, 3, 3).is_err());
        assert!(GridSpec::new(0.0, 0.0, 1.0, 1, 1).is_ok());
    }

    #[test]
    fn cell_centres_and_lookup() {
        let grid = GridSpec::new(100.0, 50.0, 10.0, 4, 3).unwrap();

        assert!(grid.cell_center(0, 0) == (105.0, 45.0));
        assert!(grid.cell_center(2, 3) == (135.0, 25.0));

        for r in 0..3 {
            for c in 0..4 {
                let (x, y) = grid.cell_center(r, c);
                assert!(grid.cell_of(x, y) == Some((r, c)));
            }
        }

        assert!(grid.cell_of(99.9, 45.0).is_none());
        assert!(grid.cell_of(105.0, 50.1).is_none());
        assert!(grid.cell_of(140.0, 45.0).is_none());
        assert!(grid.extent() == [100.0, 20.0, 140.0, 50.0]);
    }

    #[test]
    fn extent_cell_counts() {
        let grid = GridSpec::from_extent([0.0, 0.0, 100.0, 50.0], 10.0).unwrap();
        assert!(grid.n_cols == 11);
        assert!(grid.n_rows == 6);
        assert!((grid.origin_x, grid.origin_y) == (0.0, 50.0));

        let point = GridSpec::from_extent([5.0, 5.0, 5.0, 5.0], 1.0).unwrap();
        assert!((point.n_cols, point.n_rows) == (1, 1));
    }

    #[test]
    fn oversized_grids_are_rejected() {
        let err = GridSpec::from_extent([0.0, 0.0, 1e300, 1.0], 1e-300).unwrap_err();
        assert!(
            err == TrendError::InvalidGrid {
                reason: "extent holds too many cells for the cell size"
            }
        );

        assert!(matches!(
            GridSpec::new(0.0, 0.0, 1.0, usize::MAX, 2),
            Err(TrendError::InvalidGrid { .. })
        ));
    }

    #[test]
    fn covering_pads_sample_extent() {
        let samples = SampleSet::new(vec![
            Sample::new(0.0, 0.0, 1.0),
            Sample::new(100.0, 50.0, 2.0),
        ])
        .unwrap();

        let grid = GridSpec::covering(&samples, 10.0, 0.1).unwrap();
        assert!((grid.origin_x, grid.origin_y) == (-10.0, 55.0));
        assert!((grid.n_cols, grid.n_rows) == (13, 7));

        let snapped = GridSpec::snapped_covering(&samples, 10.0, 0.1).unwrap();
        assert!((snapped.origin_x, snapped.origin_y) == (-10.0, 60.0));
        assert!((snapped.n_cols, snapped.n_rows) == (13, 8));
    }

    #[test]
    fn grid_at_sample_locations_reproduces_fitted_values() {
        let grid = GridSpec::new(100.0, 200.0, 25.0, 5, 4).unwrap();
        let samples = samples_at_centres(&grid);
        let (fit, basis) = fit(&samples, 2);

        let out = SurfaceEvaluator::new(&fit, &basis, CoordinateFrame::identity())
            .evaluate(&grid, None, None)
            .unwrap();

        for r in 0..grid.n_rows {
            for c in 0..grid.n_cols {
                let i = r * grid.n_cols + c;
                assert!((out.surface[(r, c)] - fit.fitted[i]).abs() < 1e-8);
            }
        }
        assert!(out.residuals.is_none());
        assert!(out.lower.is_none());
    }

    #[test]
    fn residual_raster_averages_and_marks_nodata() {
        let samples = SampleSet::new(vec![
            Sample::new(0.5, 2.5, 1.0),
            Sample::new(0.6, 2.4, 3.0),
            Sample::new(2.5, 0.5, 2.0),
            Sample::new(1.5, 1.5, 0.0),
            Sample::new(9.0, 9.0, 5.0),
        ])
        .unwrap();
        let (fit, basis) = fit(&samples, 1);
        let grid = GridSpec::new(0.0, 3.0, 1.0, 3, 3).unwrap();

        let out = SurfaceEvaluator::new(&fit, &basis, CoordinateFrame::identity())
            .evaluate(&grid, Some(&samples), None)
            .unwrap();
        let res = out.residuals.unwrap();

        let r = &fit.residuals;
        assert!((res[(0, 0)] - 0.5 * (r[0] + r[1])).abs() < 1e-12);
        assert!((res[(2, 2)] - r[2]).abs() < 1e-12);
        assert!((res[(1, 1)] - r[3]).abs() < 1e-12);
        assert!(res[(0, 2)] == NODATA_VALUE);
        assert!(res[(2, 0)] == NODATA_VALUE);
    }

    #[test]
    fn interval_rasters_bracket_surface() {
        let grid = GridSpec::new(0.0, 100.0, 10.0, 6, 5).unwrap();
        let samples = samples_at_centres(&grid);
        let (fit, basis) = fit(&samples, 1);

        let out = SurfaceEvaluator::new(&fit, &basis, CoordinateFrame::identity())
            .with_intervals(0.95, IntervalKind::Prediction)
            .unwrap()
            .evaluate(&GridSpec::new(-20.0, 120.0, 7.5, 15, 15).unwrap(), None, None)
            .unwrap();

        let (lower, upper, se) = (
            out.lower.unwrap(),
            out.upper.unwrap(),
            out.std_error.unwrap(),
        );
        for r in 0..15 {
            for c in 0..15 {
                assert!(lower[(r, c)] <= out.surface[(r, c)]);
                assert!(out.surface[(r, c)] <= upper[(r, c)]);
                assert!(se[(r, c)] > 0.0);
            }
        }
    }

    #[test]
    fn normalised_frame_gives_same_surface() {
        let grid = GridSpec::new(0.0, 600.0, 100.0, 6, 6).unwrap();
        let samples = samples_at_centres(&grid);

        let (raw_fit, basis) = fit(&samples, 2);
        let frame = CoordinateFrame::chebyshev_square(&samples);
        let design = DesignMatrix::build_in_frame(&samples, &basis, frame).unwrap();
        let scaled_fit = LeastSquaresSolver::default()
            .solve(design.matrix(), &samples.values(), &samples.weights())
            .unwrap();

        let raw = SurfaceEvaluator::new(&raw_fit, &basis, CoordinateFrame::identity());
        let scaled = SurfaceEvaluator::new(&scaled_fit, &basis, frame);

        let (x, y) = grid.cell_center(2, 3);
        assert!((raw.value_at(x, y) - scaled.value_at(x, y)).abs() < 1e-8);
    }

    #[test]
    fn rows_report_progress_and_cancel() {
        let grid = GridSpec::new(0.0, 10.0, 1.0, 5, 5).unwrap();
        let samples = samples_at_centres(&grid);
        let (fit, basis) = fit(&samples, 1);
        let evaluator = SurfaceEvaluator::new(&fit, &basis, CoordinateFrame::identity());

        let sink = Arc::new(RecordingSink::default());
        let dyn_sink: Arc<dyn ProgressSink> = sink.clone();
        evaluator.evaluate(&grid, None, Some(&dyn_sink)).unwrap();
        assert!(sink.messages.lock().unwrap().len() == 5);

        let cancelling: Arc<dyn ProgressSink> = Arc::new(RecordingSink {
            cancel_after: Some(0),
            ..Default::default()
        });
        assert!(evaluator.evaluate(&grid, None, Some(&cancelling)).unwrap_err() == TrendError::Cancelled);
    }
}
