/////////////////////////////////////////////////////////////////////////////////////////////
//
// Defines shared helpers for coordinate normalisation, CSV sample loading and extent snapping.
//
// Created on: 19 Oct 2026     Author: Daniel Owen
//
// Copyright (c) 2026, Maptek Pty Ltd. All rights reserved. Licensed under the MIT License.
//
/////////////////////////////////////////////////////////////////////////////////////////////

use crate::samples::{Sample, SampleSet};
use csv::ReaderBuilder;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fs::File;

/// Affine map from world coordinates into the local frame the polynomial
/// basis is evaluated in: `u = (x - x_offset) / x_scale`, likewise for `y`.
///
/// [`CoordinateFrame::identity`] leaves coordinates untouched, so the fitted
/// coefficients are expressed in raw coordinate units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CoordinateFrame {
    pub x_offset: f64,
    pub y_offset: f64,
    pub x_scale: f64,
    pub y_scale: f64,
}

impl Default for CoordinateFrame {
    fn default() -> Self {
        Self::identity()
    }
}

impl CoordinateFrame {
    /// The frame that maps every coordinate to itself.
    pub const fn identity() -> Self {
        Self {
            x_offset: 0.0,
            y_offset: 0.0,
            x_scale: 1.0,
            y_scale: 1.0,
        }
    }

    /// Maps the sample bounding box onto the `[-1, 1]²` square.
    ///
    /// The translation is the midpoint of each coordinate range and the scale
    /// is half the range, with zeros replaced by `1.0` to avoid division by zero.
    pub fn chebyshev_square(samples: &SampleSet) -> Self {
        let Some([xmin, ymin, xmax, ymax]) = samples.extents() else {
            return Self::identity();
        };

        let half_or_one = |lo: f64, hi: f64| match (hi - lo) / 2.0 {
            s if s == 0.0 => 1.0,
            s => s,
        };

        Self {
            x_offset: (xmax + xmin) / 2.0,
            y_offset: (ymax + ymin) / 2.0,
            x_scale: half_or_one(xmin, xmax),
            y_scale: half_or_one(ymin, ymax),
        }
    }

    /// Applies the frame to a world coordinate.
    #[inline(always)]
    pub fn to_local(&self, x: f64, y: f64) -> (f64, f64) {
        (
            (x - self.x_offset) / self.x_scale,
            (y - self.y_offset) / self.y_scale,
        )
    }

    pub fn is_identity(&self) -> bool {
        *self == Self::identity()
    }
}

/// Round a value down to the nearest multiple of resolution
pub(crate) fn round_down(value: f64, resolution: f64) -> f64 {
    (value / resolution).floor() * resolution
}

/// Round a value up to the nearest multiple of resolution
pub(crate) fn round_up(value: f64, resolution: f64) -> f64 {
    (value / resolution).ceil() * resolution
}

/// Pads a 2D extent `[xmin, ymin, xmax, ymax]` by a fraction of its range on
/// each side, then snaps the result outward to multiples of `resolution`.
///
/// # Example
/// ```
/// use trend_surface::pad_and_snap_extents;
///
/// let padded = pad_and_snap_extents(&[0.0, 0.0, 100.0, 50.0], 10.0, 0.1);
/// assert_eq!(padded, [-10.0, -10.0, 110.0, 60.0]);
/// ```
pub fn pad_and_snap_extents(extents: &[f64; 4], resolution: f64, buffer_fraction: f64) -> [f64; 4] {
    let x_pad = (extents[2] - extents[0]) * buffer_fraction;
    let y_pad = (extents[3] - extents[1]) * buffer_fraction;

    [
        round_down(extents[0] - x_pad, resolution),
        round_down(extents[1] - y_pad, resolution),
        round_up(extents[2] + x_pad, resolution),
        round_up(extents[3] + y_pad, resolution),
    ]
}

/// Load a CSV file of observations into a [`SampleSet`].
///
/// Columns are read positionally as `x, y, z` with an optional fourth
/// `weight` column. Rows with an empty or non-numeric `z` are skipped, as
/// are their weights.
///
/// # Arguments
/// * `file_path` - Path to the CSV file.
/// * `has_headers` - Whether the file has a single header row to skip.
pub fn csv_to_samples(file_path: &str, has_headers: bool) -> Result<SampleSet, Box<dyn Error>> {
    let file = File::open(file_path)?;
    let mut reader = ReaderBuilder::new()
        .has_headers(has_headers)
        .from_reader(file);

    let mut records = Vec::new();
    let mut num_cols = 0;

    for result in reader.records() {
        let record = result?;
        if num_cols == 0 {
            num_cols = record.len();
            if !(3..=4).contains(&num_cols) {
                return Err(format!("Expected 3 or 4 columns, got {}", num_cols).into());
            }
        } else if record.len() != num_cols {
            return Err("Inconsistent number of columns in CSV".into());
        }

        let x: f64 = record[0].trim().parse()?;
        let y: f64 = record[1].trim().parse()?;
        let z: Option<f64> = record[2].trim().parse().ok();
        let weight: Option<f64> = match num_cols {
            4 => record[3].trim().parse().ok(),
            _ => Some(1.0),
        };

        records.push((x, y, z, weight));
    }

    Ok(SampleSet::from_observations(records)?)
}

/// Collects the `(x, y)` coordinates of a sample set into the local frame.
pub(crate) fn local_coordinates(samples: &SampleSet, frame: &CoordinateFrame) -> Vec<(f64, f64)> {
    samples
        .iter()
        .map(|&Sample { x, y, .. }| frame.to_local(x, y))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use equator::assert;
    use std::io::Write;

    #[test]
    fn chebyshev_square_maps_extents_to_unit_square() {
        let samples = SampleSet::new(vec![
            Sample::new(500_000.0, 6_000_000.0, 1.0),
            Sample::new(501_000.0, 6_002_000.0, 2.0),
            Sample::new(500_500.0, 6_001_000.0, 3.0),
        ])
        .unwrap();

        let frame = CoordinateFrame::chebyshev_square(&samples);

        assert!(frame.to_local(500_000.0, 6_000_000.0) == (-1.0, -1.0));
        assert!(frame.to_local(501_000.0, 6_002_000.0) == (1.0, 1.0));
        assert!(frame.to_local(500_500.0, 6_001_000.0) == (0.0, 0.0));
    }

    #[test]
    fn degenerate_axis_keeps_unit_scale() {
        let samples = SampleSet::new(vec![
            Sample::new(5.0, 0.0, 1.0),
            Sample::new(5.0, 10.0, 2.0),
        ])
        .unwrap();

        let frame = CoordinateFrame::chebyshev_square(&samples);
        assert!(frame.x_scale == 1.0);
        assert!(frame.y_scale == 5.0);
    }

    #[test]
    fn csv_rows_with_missing_values_are_skipped() {
        let path = std::env::temp_dir().join("trend_surface_csv_to_samples.csv");
        {
            let mut file = File::create(&path).unwrap();
            writeln!(file, "x,y,z").unwrap();
            writeln!(file, "0,0,100").unwrap();
            writeln!(file, "10,0,").unwrap();
            writeln!(file, "0,10,105").unwrap();
        }

        let samples = csv_to_samples(path.to_str().unwrap(), true).unwrap();
        std::fs::remove_file(&path).ok();

        assert!(samples.len() == 2);
        assert!(samples.skipped() == 1);
        assert!(samples.values() == vec![100.0, 105.0]);
    }
}
