/////////////////////////////////////////////////////////////////////////////////////////////
//
// Runs seeded k-fold cross-validation of a trend surface, fitting folds in parallel.
//
// Created on: 19 Oct 2026     Author: Daniel Owen
//
// Copyright (c) 2026, Maptek Pty Ltd. All rights reserved. Licensed under the MIT License.
//
/////////////////////////////////////////////////////////////////////////////////////////////

use crate::{
    common::CoordinateFrame,
    config::{CrossValidationParams, FitMethod},
    error::{TrendError, TrendResult},
    linalg::{FitResult, LeastSquaresSolver},
    polynomials::{DesignMatrix, PolynomialBasis},
    progress::{self, ProgressMsg, ProgressSink},
    robust::RobustFitter,
    samples::SampleSet,
};
use log::debug;
use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::{
    fmt,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};
use trend_surface_utils::{mean, std_dev};

/// Held-out error metrics aggregated over folds.
///
/// Fold vectors are indexed by fold number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CVMetrics {
    pub mean_rmse: f64,
    pub fold_rmse: Vec<f64>,

    /// Population standard deviation of `fold_rmse`.
    pub std_rmse: f64,

    pub mean_mae: f64,
    pub fold_mae: Vec<f64>,

    /// Held-out `R² = 1 - SSE/SST` per fold; `None` where the held-out
    /// values are constant (e.g. single-sample folds).
    pub fold_r2: Vec<Option<f64>>,

    /// Mean and population standard deviation of the defined `fold_r2`
    /// values; `None` when no fold has one.
    pub mean_r2: Option<f64>,
    pub std_r2: Option<f64>,

    /// Number of held-out samples in each fold.
    pub fold_sizes: Vec<usize>,
}

impl CVMetrics {
    /// Number of folds that were scored.
    pub fn folds(&self) -> usize {
        self.fold_rmse.len()
    }
}

impl fmt::Display for CVMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Cross-Validation ({}-fold):", self.folds())?;
        writeln!(f, "  Mean RMSE: {:.4} ± {:.4}", self.mean_rmse, self.std_rmse)?;
        writeln!(f, "  Mean MAE: {:.4}", self.mean_mae)?;
        match (self.mean_r2, self.std_r2) {
            (Some(mean), Some(std)) => writeln!(f, "  CV R²: {:.4} ± {:.4}", mean, std)?,
            _ => writeln!(f, "  CV R²: undefined (constant held-out values)")?,
        }
        write!(f, "  Fold RMSE:")?;
        for rmse in &self.fold_rmse {
            write!(f, " {:.4}", rmse)?;
        }
        writeln!(f)
    }
}

/// Unweighted held-out errors of one fold.
struct FoldScore {
    rmse: f64,
    mae: f64,
    r2: Option<f64>,
}

/// k-fold cross-validator.
///
/// Samples are shuffled with a seeded [`StdRng`] and the sample at shuffled
/// position `i` is held out in fold `i mod k`, so fold sizes differ by at
/// most one and the same seed always yields the same partition.
#[derive(Debug, Clone, Copy)]
pub struct CrossValidator {
    params: CrossValidationParams,
    fit_method: FitMethod,
    normalize_coordinates: bool,
    solver: LeastSquaresSolver,
}

impl CrossValidator {
    /// Ordinary fits in a normalised frame with the default solver.
    pub fn new(params: CrossValidationParams) -> Self {
        Self {
            params,
            fit_method: FitMethod::Ordinary,
            normalize_coordinates: true,
            solver: LeastSquaresSolver::default(),
        }
    }

    /// Fit each fold with this method.
    pub fn fit_method(mut self, fit_method: FitMethod) -> Self {
        self.fit_method = fit_method;
        self
    }

    pub fn normalize_coordinates(mut self, normalize: bool) -> Self {
        self.normalize_coordinates = normalize;
        self
    }

    pub fn solver(mut self, solver: LeastSquaresSolver) -> Self {
        self.solver = solver;
        self
    }

    /// Fold number of each sample, in sample order.
    pub fn fold_assignment(&self, n: usize) -> Vec<usize> {
        let mut order: Vec<usize> = (0..n).collect();
        let mut rng = StdRng::seed_from_u64(self.params.seed);
        order.shuffle(&mut rng);

        let mut folds = vec![0; n];
        for (position, &index) in order.iter().enumerate() {
            folds[index] = position % self.params.k;
        }
        folds
    }

    /// Fits on `k - 1` folds and scores the held-out fold, for every fold.
    ///
    /// All checks run before any fold is fitted. A single failing fold fails
    /// the whole call; folds are never skipped.
    ///
    /// # Errors
    /// - [`TrendError::InvalidDegree`] if `degree < 1`.
    /// - [`TrendError::InvalidParameter`] if `k < 2`.
    /// - [`TrendError::InsufficientSamples`] if `k > N`, or if the smallest
    ///   training set has fewer than `P + 1` samples.
    /// - [`TrendError::Cancelled`] if the progress sink asks to stop.
    /// - Any fitting error from a fold.
    pub fn validate(
        &self,
        samples: &SampleSet,
        degree: usize,
        progress_callback: Option<&Arc<dyn ProgressSink>>,
    ) -> TrendResult<CVMetrics> {
        let basis = PolynomialBasis::new(degree)?;
        let k = self.params.k;
        let n = samples.len();

        if k < 2 {
            return Err(TrendError::InvalidParameter {
                name: "k",
                value: k as f64,
            });
        }
        if k > n {
            return Err(TrendError::InsufficientSamples {
                samples: n,
                required: k,
            });
        }
        if let FitMethod::Robust(params) = self.fit_method {
            params.validate()?;
        }

        let largest_fold = n.div_ceil(k);
        let smallest_training = n - largest_fold;
        let required = basis.num_terms() + 1;
        if smallest_training < required {
            return Err(TrendError::InsufficientSamples {
                samples: smallest_training,
                required,
            });
        }

        let assignment = self.fold_assignment(n);
        let done = AtomicUsize::new(0);

        let scores = (0..k)
            .into_par_iter()
            .map(|fold| -> TrendResult<(FoldScore, usize)> {
                progress::checkpoint(progress_callback)?;

                let (test_idx, train_idx): (Vec<usize>, Vec<usize>) =
                    (0..n).partition(|&i| assignment[i] == fold);

                let score = self.score_fold(samples, &basis, &train_idx, &test_idx)?;
                let rmse = score.rmse;

                let finished = done.fetch_add(1, Ordering::Relaxed) + 1;
                debug!("cross-validation fold {} of {}: rmse {:.6}", fold + 1, k, rmse);
                progress::report(progress_callback, || ProgressMsg::CrossValidationFold {
                    fold,
                    rmse,
                    progress: progress::fraction(finished, k),
                });

                Ok((score, test_idx.len()))
            })
            .collect::<TrendResult<Vec<_>>>()?;

        let fold_rmse: Vec<f64> = scores.iter().map(|(s, _)| s.rmse).collect();
        let fold_mae: Vec<f64> = scores.iter().map(|(s, _)| s.mae).collect();
        let fold_r2: Vec<Option<f64>> = scores.iter().map(|(s, _)| s.r2).collect();
        let fold_sizes: Vec<usize> = scores.iter().map(|(_, n)| *n).collect();

        let defined_r2: Vec<f64> = fold_r2.iter().flatten().copied().collect();
        let (mean_r2, std_r2) = match defined_r2.is_empty() {
            true => (None, None),
            false => (Some(mean(&defined_r2)), Some(std_dev(&defined_r2))),
        };

        Ok(CVMetrics {
            mean_rmse: mean(&fold_rmse),
            std_rmse: std_dev(&fold_rmse),
            mean_mae: mean(&fold_mae),
            fold_rmse,
            fold_mae,
            fold_r2,
            mean_r2,
            std_r2,
            fold_sizes,
        })
    }

    fn score_fold(
        &self,
        samples: &SampleSet,
        basis: &PolynomialBasis,
        train_idx: &[usize],
        test_idx: &[usize],
    ) -> TrendResult<FoldScore> {
        let train = samples.subset(train_idx);
        let frame = match self.normalize_coordinates {
            true => CoordinateFrame::chebyshev_square(&train),
            false => CoordinateFrame::identity(),
        };

        let design = DesignMatrix::build_in_frame(&train, basis, frame)?;
        let fit = self.fit(&design, &train)?;

        let (observed, errors): (Vec<f64>, Vec<f64>) = test_idx
            .iter()
            .map(|&i| {
                let s = samples.as_slice()[i];
                let (u, v) = frame.to_local(s.x, s.y);
                (s.z, s.z - basis.evaluate(&fit.coefficients, u, v))
            })
            .unzip();

        let m = errors.len() as f64;
        let sse = errors.iter().map(|e| e * e).sum::<f64>();
        let z_bar = mean(&observed);
        let sst = observed.iter().map(|z| (z - z_bar).powi(2)).sum::<f64>();

        Ok(FoldScore {
            rmse: (sse / m).sqrt(),
            mae: errors.iter().map(|e| e.abs()).sum::<f64>() / m,
            r2: (sst > 0.0).then(|| 1.0 - sse / sst),
        })
    }

    fn fit(&self, design: &DesignMatrix, train: &SampleSet) -> TrendResult<FitResult> {
        let z = train.values();
        let w = train.weights();
        match self.fit_method {
            FitMethod::Ordinary => self.solver.solve(design.matrix(), &z, &w),
            FitMethod::Robust(params) => {
                RobustFitter::new(params, self.solver)?.fit(design.matrix(), &z, &w, None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::RobustParams, progress::tests::RecordingSink, samples::Sample};
    use equator::assert;

    fn quadratic_samples(n: usize) -> SampleSet {
        SampleSet::new(
            (0..n)
                .map(|i| {
                    let x = ((i * 37) % 23) as f64 * 0.5;
                    let y = ((i * 11) % 17) as f64 * 0.7;
                    Sample::new(x, y, 1.0 + 0.3 * x - 0.2 * y + 0.05 * x * x - 0.02 * x * y + 0.01 * y * y)
                })
                .collect(),
        )
        .unwrap()
    }

    #[test]
    fn leave_one_out_on_exact_polynomial() {
        let samples = quadratic_samples(30);
        let metrics = CrossValidator::new(CrossValidationParams { k: 30, seed: 1 })
            .validate(&samples, 2, None)
            .unwrap();

        assert!(metrics.folds() == 30);
        assert!(metrics.fold_sizes.iter().all(|s| *s == 1));
        assert!(metrics.mean_rmse < 1e-8);
        assert!(metrics.fold_r2.iter().all(|r2| r2.is_none()));
        assert!(metrics.mean_r2.is_none());
        assert!(metrics.to_string().contains("CV R²: undefined"));
    }

    #[test]
    fn held_out_r2_on_exact_polynomial() {
        let samples = quadratic_samples(40);
        let metrics = CrossValidator::new(CrossValidationParams { k: 5, seed: 3 })
            .validate(&samples, 2, None)
            .unwrap();

        assert!(metrics.fold_r2.len() == 5);
        for r2 in &metrics.fold_r2 {
            assert!((r2.unwrap() - 1.0).abs() < 1e-10);
        }
        assert!((metrics.mean_r2.unwrap() - 1.0).abs() < 1e-10);
        assert!(metrics.std_r2.unwrap() < 1e-10);
    }

    #[test]
    fn held_out_r2_penalises_underfitting() {
        // A plane cannot follow the quadratic terms, so held-out R² drops below 1.
        let samples = quadratic_samples(40);
        let linear = CrossValidator::new(CrossValidationParams { k: 5, seed: 3 })
            .validate(&samples, 1, None)
            .unwrap();

        assert!(linear.mean_r2.unwrap() < 1.0 - 1e-6);
    }

    #[test]
    fn folds_are_balanced_and_reproducible() {
        let cv = CrossValidator::new(CrossValidationParams { k: 4, seed: 42 });
        let a = cv.fold_assignment(23);
        let b = cv.fold_assignment(23);
        assert!(a == b);

        let mut counts = [0usize; 4];
        a.iter().for_each(|f| counts[*f] += 1);
        assert!(counts.iter().sum::<usize>() == 23);
        assert!(counts.iter().max().unwrap() - counts.iter().min().unwrap() <= 1);

        let samples = quadratic_samples(23);
        let m1 = cv.validate(&samples, 1, None).unwrap();
        let m2 = cv.validate(&samples, 1, None).unwrap();
        assert!(m1 == m2);
        assert!(m1.fold_sizes.iter().sum::<usize>() == 23);
    }

    #[test]
    fn small_training_folds_abort() {
        // 7 samples, k = 2: the largest fold holds 4, leaving 3 < P + 1 = 4.
        let samples = quadratic_samples(7);
        let err = CrossValidator::new(CrossValidationParams { k: 2, seed: 0 })
            .validate(&samples, 1, None)
            .unwrap_err();

        assert!(
            err == TrendError::InsufficientSamples {
                samples: 3,
                required: 4
            }
        );
    }

    #[test]
    fn parameter_checks() {
        let samples = quadratic_samples(10);

        let err = CrossValidator::new(CrossValidationParams { k: 1, seed: 0 })
            .validate(&samples, 1, None)
            .unwrap_err();
        assert!(matches!(err, TrendError::InvalidParameter { name: "k", .. }));

        let err = CrossValidator::new(CrossValidationParams { k: 11, seed: 0 })
            .validate(&samples, 1, None)
            .unwrap_err();
        assert!(
            err == TrendError::InsufficientSamples {
                samples: 10,
                required: 11
            }
        );
    }

    #[test]
    fn robust_folds_and_progress() {
        let samples = quadratic_samples(40);
        let sink = Arc::new(RecordingSink::default());
        let dyn_sink: Arc<dyn ProgressSink> = sink.clone();

        let metrics = CrossValidator::new(CrossValidationParams::default())
            .fit_method(FitMethod::Robust(RobustParams::default()))
            .validate(&samples, 2, Some(&dyn_sink))
            .unwrap();

        assert!(metrics.mean_rmse.is_finite());

        let messages = sink.messages.lock().unwrap();
        let fold_messages = messages
            .iter()
            .filter(|m| matches!(m, ProgressMsg::CrossValidationFold { .. }))
            .count();
        assert!(fold_messages == 5);
        assert!(messages.iter().any(|m| matches!(
            m,
            ProgressMsg::CrossValidationFold { progress, .. } if *progress == 1.0
        )));
    }

    #[test]
    fn cancellation_stops_validation() {
        let samples = quadratic_samples(20);
        let sink: Arc<dyn ProgressSink> = Arc::new(RecordingSink {
            cancel_after: Some(0),
            ..Default::default()
        });

        let err = CrossValidator::new(CrossValidationParams::default())
            .validate(&samples, 1, Some(&sink))
            .unwrap_err();
        assert!(err == TrendError::Cancelled);
    }

    #[test]
    fn report_lists_folds() {
        let metrics = CVMetrics {
            mean_rmse: 1.0,
            fold_rmse: vec![0.5, 1.5],
            std_rmse: 0.5,
            mean_mae: 0.8,
            fold_mae: vec![0.4, 1.2],
            fold_r2: vec![Some(0.9), Some(0.7)],
            mean_r2: Some(0.8),
            std_r2: Some(0.1),
            fold_sizes: vec![3, 3],
        };
        let report = metrics.to_string();
        assert!(report.contains("2-fold"));
        assert!(report.contains("1.0000 ± 0.5000"));
        assert!(report.contains("CV R²: 0.8000 ± 0.1000"));
    }
}
