/////////////////////////////////////////////////////////////////////////////////////////////
//
// Provides synthetic trend surfaces, seeded noise and outlier injection for tests and demos.
//
// Created on: 19 Oct 2026     Author: Daniel Owen
//
// Copyright (c) 2026, Maptek Pty Ltd. All rights reserved. Licensed under the MIT License.
//
/////////////////////////////////////////////////////////////////////////////////////////////

use faer::Mat;
use rand::{rngs::StdRng, seq::index, Rng, SeedableRng};

fn rng_from(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    }
}

/// Struct that implements synthetic 2D trend functions and data corruption
/// helpers for exercising trend surface fitting.
///
/// All functions take an `(n × 2)` point matrix and return an `(n × 1)` value matrix.
pub struct TrendTestFunctions;

impl TrendTestFunctions {
    /// Inclined plane `c + gx·x + gy·y`.
    pub fn plane(points: &Mat<f64>, c: f64, gx: f64, gy: f64) -> Mat<f64> {
        assert_eq!(points.ncols(), 2);
        Mat::from_fn(points.nrows(), 1, |i, _| {
            c + gx * points[(i, 0)] + gy * points[(i, 1)]
        })
    }

    /// Elliptical dome centred at `(cx, cy)`:
    /// `h - ((x - cx)/a)² - ((y - cy)/b)²`.
    pub fn dome(points: &Mat<f64>, centre: (f64, f64), axes: (f64, f64), height: f64) -> Mat<f64> {
        assert_eq!(points.ncols(), 2);
        Mat::from_fn(points.nrows(), 1, |i, _| {
            let dx = (points[(i, 0)] - centre.0) / axes.0;
            let dy = (points[(i, 1)] - centre.1) / axes.1;
            height - dx * dx - dy * dy
        })
    }

    /// A regional cubic trend over the unit square with a short wavelength
    /// local signal on top. Low degree fits leave the local signal in the
    /// residuals; no polynomial reproduces it exactly.
    pub fn regional_with_local(points: &Mat<f64>) -> Mat<f64> {
        assert_eq!(points.ncols(), 2);
        Mat::from_fn(points.nrows(), 1, |i, _| {
            let x = points[(i, 0)];
            let y = points[(i, 1)];

            let regional = 2.0 + 1.5 * x - 0.8 * y + 0.6 * x * y - 0.9 * x * x * x;
            let local = 0.05 * (12.0 * x).sin() * (9.0 * y).cos();

            regional + local
        })
    }

    /// Uniformly distributed points inside `[min_x, min_y, max_x, max_y]`.
    pub fn random_points(n: usize, extent: [f64; 4], seed: Option<u64>) -> Mat<f64> {
        let mut rng = rng_from(seed);
        let [min_x, min_y, max_x, max_y] = extent;

        Mat::from_fn(n, 2, |_, j| match j {
            0 => rng.random_range(min_x..max_x),
            _ => rng.random_range(min_y..max_y),
        })
    }

    /// Adds uniform noise in `[-amplitude, amplitude)` to every value.
    pub fn add_noise(values: &mut Mat<f64>, amplitude: f64, seed: Option<u64>) {
        let mut rng = rng_from(seed);
        for i in 0..values.nrows() {
            values[(i, 0)] += rng.random_range(-amplitude..amplitude);
        }
    }

    /// Adds `magnitude` to `count` distinct randomly chosen values and returns
    /// their row indices, sorted.
    pub fn inject_outliers(
        values: &mut Mat<f64>,
        count: usize,
        magnitude: f64,
        seed: Option<u64>,
    ) -> Vec<usize> {
        let mut rng = rng_from(seed);
        let mut rows = index::sample(&mut rng, values.nrows(), count.min(values.nrows())).into_vec();
        rows.sort_unstable();

        for &i in &rows {
            values[(i, 0)] += magnitude;
        }
        rows
    }
}
