/////////////////////////////////////////////////////////////////////////////////////////////
//
// Supplies slice-level numeric utilities: medians, moments, norms and extents.
//
// Created on: 19 Oct 2026     Author: Daniel Owen
//
// Copyright (c) 2026, Maptek Pty Ltd. All rights reserved. Licensed under the MIT License.
//
/////////////////////////////////////////////////////////////////////////////////////////////

use std::cmp::Ordering;

/// Returns the median of a slice, or `None` when it is empty.
///
/// Even-length inputs return the mean of the two central values.
///
/// # Examples
///
/// ```
/// use trend_surface_utils::median;
///
/// assert_eq!(median(&[3.0, 1.0, 2.0]), Some(2.0));
/// assert_eq!(median(&[4.0, 1.0, 3.0, 2.0]), Some(2.5));
/// assert_eq!(median(&[]), None);
/// ```
pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }

    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));

    let mid = sorted.len() / 2;
    match sorted.len() % 2 {
        0 => Some(0.5 * (sorted[mid - 1] + sorted[mid])),
        _ => Some(sorted[mid]),
    }
}

/// Arithmetic mean; `NaN` for an empty slice.
#[inline]
pub fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// Weighted arithmetic mean `Σ wᵢ vᵢ / Σ wᵢ`.
///
/// # Examples
///
/// ```
/// use trend_surface_utils::weighted_mean;
///
/// let m = weighted_mean(&[1.0, 3.0], &[3.0, 1.0]);
/// assert_eq!(m, 1.5);
/// ```
#[inline]
pub fn weighted_mean(values: &[f64], weights: &[f64]) -> f64 {
    debug_assert_eq!(values.len(), weights.len());
    let (num, den) = values
        .iter()
        .zip(weights)
        .fold((0.0, 0.0), |(num, den), (v, w)| (num + w * v, den + w));
    num / den
}

/// Population standard deviation (divides by `n`).
pub fn std_dev(values: &[f64]) -> f64 {
    let m = mean(values);
    let var = values.iter().map(|v| (v - m) * (v - m)).sum::<f64>() / values.len() as f64;
    var.sqrt()
}

/// Dot product of two equal-length slices.
#[inline(always)]
pub fn dot(a: &[f64], b: &[f64]) -> f64 {
    debug_assert_eq!(a.len(), b.len());
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// Euclidean norm of a slice.
#[inline(always)]
pub fn l2_norm(values: &[f64]) -> f64 {
    dot(values, values).sqrt()
}

/// Computes the axis aligned bounding box of a set of `(x, y)` locations.
///
/// Returns `[min_x, min_y, max_x, max_y]`, or `None` for an empty input.
///
/// # Examples
///
/// ```
/// use trend_surface_utils::get_xy_extents;
///
/// let points = [(1.0, 2.0), (3.0, -1.0), (0.5, 4.0)];
/// let extents = get_xy_extents(points.iter().copied());
/// assert_eq!(extents, Some([0.5, -1.0, 3.0, 4.0]));
/// ```
pub fn get_xy_extents<I>(points: I) -> Option<[f64; 4]>
where
    I: IntoIterator<Item = (f64, f64)>,
{
    let mut iter = points.into_iter();
    let (x0, y0) = iter.next()?;
    let mut extents = [x0, y0, x0, y0];

    for (x, y) in iter {
        extents[0] = extents[0].min(x);
        extents[1] = extents[1].min(y);
        extents[2] = extents[2].max(x);
        extents[3] = extents[3].max(y);
    }

    Some(extents)
}
