/////////////////////////////////////////////////////////////////////////////////////////////
//
// Enumerates bivariate monomial bases and assembles polynomial design matrices.
//
// Created on: 19 Oct 2026     Author: Daniel Owen
//
// Copyright (c) 2026, Maptek Pty Ltd. All rights reserved. Licensed under the MIT License.
//
/////////////////////////////////////////////////////////////////////////////////////////////

use crate::{
    common::{self, CoordinateFrame},
    error::{TrendError, TrendResult},
    samples::SampleSet,
};
use faer::Mat;
use serde::{Deserialize, Serialize};

/// Number of monomials `x^a y^b` with `a + b <= degree`.
#[inline]
pub const fn num_terms(degree: usize) -> usize {
    (degree + 1) * (degree + 2) / 2
}

/// Ordered monomial basis for a fixed polynomial degree.
///
/// Terms are ordered by increasing total degree and, within a total degree,
/// by increasing power of `y`:
///
/// ```text
/// degree 2: 1, x, y, x², xy, y²
/// ```
///
/// Column `k` of every design matrix and entry `k` of every coefficient
/// vector refer to `powers()[k]`, so a basis built once can be shared between
/// fitting and evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolynomialBasis {
    degree: usize,
    powers: Vec<(u32, u32)>,
}

impl PolynomialBasis {
    /// Builds the basis for `degree`.
    ///
    /// # Errors
    /// [`TrendError::InvalidDegree`] if `degree < 1`.
    pub fn new(degree: usize) -> TrendResult<Self> {
        if degree < 1 {
            return Err(TrendError::InvalidDegree { degree });
        }

        let powers = (0..=degree as u32)
            .flat_map(|d| (0..=d).map(move |j| (d - j, j)))
            .collect::<Vec<_>>();

        debug_assert_eq!(powers.len(), num_terms(degree));

        Ok(Self { degree, powers })
    }

    #[inline]
    pub fn degree(&self) -> usize {
        self.degree
    }

    #[inline]
    pub fn num_terms(&self) -> usize {
        self.powers.len()
    }

    /// `(power_x, power_y)` pairs in column order.
    #[inline]
    pub fn powers(&self) -> &[(u32, u32)] {
        &self.powers
    }

    /// Writes the basis expansion of a local coordinate into `out`.
    pub fn expand_into(&self, u: f64, v: f64, out: &mut [f64]) {
        debug_assert_eq!(out.len(), self.powers.len());

        // Power tables up to the basis degree; avoids powi per term.
        let mut u_pow = vec![1.0; self.degree + 1];
        let mut v_pow = vec![1.0; self.degree + 1];
        for p in 1..=self.degree {
            u_pow[p] = u_pow[p - 1] * u;
            v_pow[p] = v_pow[p - 1] * v;
        }

        out.iter_mut()
            .zip(&self.powers)
            .for_each(|(dst, &(px, py))| *dst = u_pow[px as usize] * v_pow[py as usize]);
    }

    /// Returns the basis expansion of a local coordinate.
    pub fn expand(&self, u: f64, v: f64) -> Vec<f64> {
        let mut row = vec![0.0; self.powers.len()];
        self.expand_into(u, v, &mut row);
        row
    }

    /// Evaluates `Σ βₖ uᵃ vᵇ` at a local coordinate.
    pub fn evaluate(&self, coefficients: &[f64], u: f64, v: f64) -> f64 {
        trend_surface_utils::dot(coefficients, &self.expand(u, v))
    }

    /// Human readable term label, e.g. `x^2*y`.
    pub fn term_label(&self, k: usize) -> String {
        let (px, py) = self.powers[k];
        let factor = |name: &str, p: u32| match p {
            0 => None,
            1 => Some(name.to_string()),
            p => Some(format!("{}^{}", name, p)),
        };

        match (factor("x", px), factor("y", py)) {
            (None, None) => "1".to_string(),
            (Some(a), None) | (None, Some(a)) => a,
            (Some(a), Some(b)) => format!("{}*{}", a, b),
        }
    }
}

/// `N × P` matrix of basis expansions, one row per sample, in sample order.
///
/// Column 0 is always the constant term.
#[derive(Debug, Clone)]
pub struct DesignMatrix {
    matrix: Mat<f64>,
    basis: PolynomialBasis,
    frame: CoordinateFrame,
}

impl DesignMatrix {
    /// Expands the samples into the basis for `degree` using raw coordinates.
    ///
    /// # Errors
    /// - [`TrendError::InvalidDegree`] if `degree < 1`.
    /// - [`TrendError::InsufficientSamples`] if there are fewer samples than
    ///   basis terms.
    pub fn build(samples: &SampleSet, degree: usize) -> TrendResult<Self> {
        let basis = PolynomialBasis::new(degree)?;
        Self::build_in_frame(samples, &basis, CoordinateFrame::identity())
    }

    /// Expands the samples into `basis`, evaluating monomials in `frame`.
    pub fn build_in_frame(
        samples: &SampleSet,
        basis: &PolynomialBasis,
        frame: CoordinateFrame,
    ) -> TrendResult<Self> {
        let terms = basis.num_terms();
        if samples.len() < terms {
            return Err(TrendError::InsufficientSamples {
                samples: samples.len(),
                required: terms,
            });
        }

        let mut matrix = Mat::<f64>::zeros(samples.len(), terms);
        let mut row = vec![0.0; terms];

        for (i, (u, v)) in common::local_coordinates(samples, &frame)
            .into_iter()
            .enumerate()
        {
            basis.expand_into(u, v, &mut row);
            row.iter()
                .enumerate()
                .for_each(|(k, value)| matrix[(i, k)] = *value);
        }

        Ok(Self {
            matrix,
            basis: basis.clone(),
            frame,
        })
    }

    #[inline]
    pub fn matrix(&self) -> &Mat<f64> {
        &self.matrix
    }

    #[inline]
    pub fn basis(&self) -> &PolynomialBasis {
        &self.basis
    }

    #[inline]
    pub fn frame(&self) -> &CoordinateFrame {
        &self.frame
    }

    #[inline]
    pub fn nrows(&self) -> usize {
        self.matrix.nrows()
    }

    #[inline]
    pub fn ncols(&self) -> usize {
        self.matrix.ncols()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::samples::Sample;
    use equator::assert;
    use faer::{mat, utils::approx::*};

    fn samples_from(points: &[(f64, f64)]) -> SampleSet {
        SampleSet::new(points.iter().map(|&(x, y)| Sample::new(x, y, 0.0)).collect()).unwrap()
    }

    fn run_case(points: &[(f64, f64)], degree: usize, expected: Mat<f64>) {
        let design = DesignMatrix::build(&samples_from(points), degree).unwrap();
        let approx_eq = CwiseMat(ApproxEq::eps() * 128.0);
        assert!(design.matrix() ~ &expected);
    }

    #[test]
    fn term_order_degree_three() {
        let basis = PolynomialBasis::new(3).unwrap();
        assert!(
            basis.powers()
                == &[
                    (0, 0),
                    (1, 0),
                    (0, 1),
                    (2, 0),
                    (1, 1),
                    (0, 2),
                    (3, 0),
                    (2, 1),
                    (1, 2),
                    (0, 3)
                ][..]
        );
    }

    #[test]
    fn term_counts() {
        for degree in 1..=6 {
            assert!(PolynomialBasis::new(degree).unwrap().num_terms() == num_terms(degree));
        }
        assert!(num_terms(1) == 3);
        assert!(num_terms(2) == 6);
        assert!(num_terms(3) == 10);
    }

    #[test]
    fn degree_zero_is_rejected() {
        assert!(PolynomialBasis::new(0) == Err(TrendError::InvalidDegree { degree: 0 }));
    }

    #[test]
    fn design_linear() {
        // Basis: [1, x, y]
        let expected = mat![[1.0, 1.0, 2.0], [1.0, 3.0, 4.0], [1.0, -1.0, 0.5]];
        run_case(&[(1.0, 2.0), (3.0, 4.0), (-1.0, 0.5)], 1, expected);
    }

    #[test]
    fn design_quadratic() {
        // Basis: [1, x, y, x^2, x*y, y^2]
        let expected = mat![
            [1.0, 1.0, 2.0, 1.0, 2.0, 4.0],
            [1.0, 3.0, 4.0, 9.0, 12.0, 16.0],
            [1.0, 0.0, 1.0, 0.0, 0.0, 1.0],
            [1.0, 2.0, 0.0, 4.0, 0.0, 0.0],
            [1.0, -1.0, -1.0, 1.0, 1.0, 1.0],
            [1.0, 0.5, 2.0, 0.25, 1.0, 4.0],
        ];
        run_case(
            &[(1.0, 2.0), (3.0, 4.0), (0.0, 1.0), (2.0, 0.0), (-1.0, -1.0), (0.5, 2.0)],
            2,
            expected,
        );
    }

    #[test]
    fn constant_column_is_all_ones() {
        let points: Vec<(f64, f64)> = (0..12).map(|i| (i as f64 * 3.7, (i * i) as f64)).collect();
        let design = DesignMatrix::build(&samples_from(&points), 3).unwrap();
        assert!(design.matrix().col(0).iter().all(|v| *v == 1.0));
    }

    #[test]
    fn too_few_samples_fail_for_every_degree() {
        for degree in 1..=4 {
            let needed = num_terms(degree);
            let points: Vec<(f64, f64)> = (0..needed - 1)
                .map(|i| (i as f64, (i as f64).sin()))
                .collect();

            let err = DesignMatrix::build(&samples_from(&points), degree).unwrap_err();
            assert!(
                err == TrendError::InsufficientSamples {
                    samples: needed - 1,
                    required: needed
                }
            );
        }
    }

    #[test]
    fn frame_is_applied_before_expansion() {
        let samples = samples_from(&[(10.0, 20.0), (30.0, 40.0), (20.0, 20.0)]);
        let frame = CoordinateFrame {
            x_offset: 20.0,
            y_offset: 30.0,
            x_scale: 10.0,
            y_scale: 10.0,
        };
        let basis = PolynomialBasis::new(1).unwrap();
        let design = DesignMatrix::build_in_frame(&samples, &basis, frame).unwrap();

        let expected = mat![[1.0, -1.0, -1.0], [1.0, 1.0, 1.0], [1.0, 0.0, -1.0]];
        let approx_eq = CwiseMat(ApproxEq::eps() * 128.0);
        assert!(design.matrix() ~ &expected);
    }

    #[test]
    fn labels() {
        let basis = PolynomialBasis::new(2).unwrap();
        let labels: Vec<String> = (0..basis.num_terms()).map(|k| basis.term_label(k)).collect();
        assert!(labels == vec!["1", "x", "y", "x^2", "x*y", "y^2"]);
    }
}
