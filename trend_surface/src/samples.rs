/////////////////////////////////////////////////////////////////////////////////////////////
//
// Defines the immutable sample set of (x, y, z, weight) observations fed to the engine.
//
// Created on: 19 Oct 2026     Author: Daniel Owen
//
// Copyright (c) 2026, Maptek Pty Ltd. All rights reserved. Licensed under the MIT License.
//
/////////////////////////////////////////////////////////////////////////////////////////////

//! Scattered observations and their validation.

use crate::error::{TrendError, TrendResult};
use faer::Mat;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// A single observation of the attribute being modelled.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// Easting / x coordinate.
    pub x: f64,

    /// Northing / y coordinate.
    pub y: f64,

    /// Observed value.
    pub z: f64,

    /// Relative weight of the observation in the least squares fit.
    pub weight: f64,
}

impl Sample {
    /// Creates a sample with unit weight.
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self {
            x,
            y,
            z,
            weight: 1.0,
        }
    }

    /// Creates a weighted sample.
    pub fn weighted(x: f64, y: f64, z: f64, weight: f64) -> Self {
        Self { x, y, z, weight }
    }

    fn check(&self, index: usize) -> TrendResult<()> {
        if !self.x.is_finite() || !self.y.is_finite() {
            return Err(TrendError::InvalidSample {
                index,
                reason: "non-finite coordinate",
            });
        }
        if !self.z.is_finite() {
            return Err(TrendError::InvalidSample {
                index,
                reason: "non-finite value",
            });
        }
        if !(self.weight.is_finite() && self.weight > 0.0) {
            return Err(TrendError::InvalidSample {
                index,
                reason: "weight must be finite and positive",
            });
        }
        Ok(())
    }
}

/// Immutable, validated collection of [`Sample`]s.
///
/// Cloning a `SampleSet` is cheap: the underlying storage is shared, so the
/// same snapshot can be handed to concurrent fold fits and grid evaluation.
#[derive(Debug, Clone)]
pub struct SampleSet {
    samples: Arc<[Sample]>,
    skipped: usize,
}

impl SampleSet {
    /// Validates and wraps the given samples.
    ///
    /// # Errors
    /// [`TrendError::InvalidSample`] for the first sample with a non-finite
    /// coordinate or value, or a weight that is not strictly positive.
    pub fn new(samples: Vec<Sample>) -> TrendResult<Self> {
        for (index, sample) in samples.iter().enumerate() {
            sample.check(index)?;
        }

        Ok(Self {
            samples: samples.into(),
            skipped: 0,
        })
    }

    /// Builds a sample set from an `(n × 2)` coordinate matrix and an
    /// `(n × 1)` value matrix, with optional per-sample weights.
    pub fn from_points(
        points: &Mat<f64>,
        values: &Mat<f64>,
        weights: Option<&[f64]>,
    ) -> TrendResult<Self> {
        if points.ncols() != 2 {
            return Err(TrendError::DimensionMismatch {
                expected: 2,
                found: points.ncols(),
            });
        }
        if values.nrows() != points.nrows() {
            return Err(TrendError::DimensionMismatch {
                expected: points.nrows(),
                found: values.nrows(),
            });
        }
        if let Some(w) = weights {
            if w.len() != points.nrows() {
                return Err(TrendError::DimensionMismatch {
                    expected: points.nrows(),
                    found: w.len(),
                });
            }
        }

        let samples = (0..points.nrows())
            .map(|i| Sample {
                x: points[(i, 0)],
                y: points[(i, 1)],
                z: values[(i, 0)],
                weight: weights.map_or(1.0, |w| w[i]),
            })
            .collect();

        Self::new(samples)
    }

    /// Collects raw `(x, y, z, weight)` records the way a point layer is read.
    ///
    /// Records without a finite `z` are skipped and counted (see
    /// [`SampleSet::skipped`]). If any retained record lacks a weight, weights
    /// are dropped for the whole set and the fit becomes unweighted.
    pub fn from_observations<I>(records: I) -> TrendResult<Self>
    where
        I: IntoIterator<Item = (f64, f64, Option<f64>, Option<f64>)>,
    {
        let mut samples = Vec::new();
        let mut skipped = 0;
        let mut all_weighted = true;

        for (x, y, z, weight) in records {
            match z {
                Some(z) if z.is_finite() => {
                    all_weighted &= weight.is_some();
                    samples.push(Sample::weighted(x, y, z, weight.unwrap_or(1.0)));
                }
                _ => skipped += 1,
            }
        }

        if !all_weighted {
            samples.iter_mut().for_each(|s| s.weight = 1.0);
        }

        let mut set = Self::new(samples)?;
        set.skipped = skipped;
        Ok(set)
    }

    /// Number of samples.
    #[inline]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Number of records dropped by [`SampleSet::from_observations`].
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    #[inline]
    pub fn as_slice(&self) -> &[Sample] {
        &self.samples
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Sample> {
        self.samples.iter()
    }

    /// Observed values in sample order.
    pub fn values(&self) -> Vec<f64> {
        self.samples.iter().map(|s| s.z).collect()
    }

    /// Sample weights in sample order.
    pub fn weights(&self) -> Vec<f64> {
        self.samples.iter().map(|s| s.weight).collect()
    }

    /// `true` if any sample carries a weight other than 1.
    pub fn is_weighted(&self) -> bool {
        self.samples.iter().any(|s| s.weight != 1.0)
    }

    /// Returns a new set containing the samples at `indices`, in that order.
    pub fn subset(&self, indices: &[usize]) -> SampleSet {
        SampleSet {
            samples: indices.iter().map(|&i| self.samples[i]).collect(),
            skipped: 0,
        }
    }

    /// Bounding box `[min_x, min_y, max_x, max_y]`, `None` when empty.
    pub fn extents(&self) -> Option<[f64; 4]> {
        trend_surface_utils::get_xy_extents(self.samples.iter().map(|s| (s.x, s.y)))
    }
}

impl<'a> IntoIterator for &'a SampleSet {
    type Item = &'a Sample;
    type IntoIter = std::slice::Iter<'a, Sample>;

    fn into_iter(self) -> Self::IntoIter {
        self.samples.iter()
    }
}
